//! Tiered on-disk photo cache.
//!
//! Every request for a photo goes through [`PhotoCacheStore::get_photo`],
//! which resolves it through three tiers, each tried only when the previous
//! one misses:
//!
//! 1. **Resized hit**: the exact `(id, w, h)` entry is on disk. Returned
//!    as-is, no remote call.
//! 2. **Full hit**: only reachable for a sized request. The full-size entry
//!    is on disk; it is cover-resized to `w×h`, persisted as the exact entry,
//!    and returned.
//! 3. **Miss**: the original is downloaded and its metadata queried for the
//!    rotation flag. The (possibly rotated) bytes become the full-size entry.
//!    A sized request then continues as tier 2 on those bytes.
//!
//! ## Storage
//!
//! One file per entry, directly under the cache directory:
//!
//! ```text
//! <cache_dir>/<id>-full.jpg
//! <cache_dir>/<id>-<w>x<h>.jpg
//! ```
//!
//! [`PhotoCacheStore::photo_path`] derives that path without touching disk,
//! so a serving layer can hand the file to a static-file responder.
//!
//! ## Persistence
//!
//! Writes are best-effort. Bytes go to a temporary sibling and are renamed
//! into place, so readers never see a partial entry. A failed write is
//! logged and counted in [`CacheStats`]; the caller still gets the bytes.
//! Entries are never evicted.
//!
//! Concurrent requests for the same missing key are not coalesced. Both
//! produce identical bytes (the backend is deterministic) and the last
//! rename wins.

use crate::imaging::{BackendError, CoverParams, ImageBackend, Quality, RotateParams};
use crate::remote::{RemoteError, RemoteStore};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

const ENTRY_EXTENSION: &str = "jpg";

#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("Failed to fetch photo {id} from remote store: {source}")]
    RemoteFetch {
        id: String,
        #[source]
        source: RemoteError,
    },
    #[error("Failed to process photo {id}: {source}")]
    Format {
        id: String,
        #[source]
        source: BackendError,
    },
    #[error("Invalid photo id: {0:?}")]
    InvalidId(String),
    #[error("Invalid size {width}x{height}: both edges must be zero or both non-zero")]
    InvalidSize { width: u32, height: u32 },
}

/// Identity of one cache entry. `(0, 0)` is the full-size original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey<'a> {
    pub id: &'a str,
    pub width: u32,
    pub height: u32,
}

impl<'a> CacheKey<'a> {
    pub fn new(id: &'a str, width: u32, height: u32) -> Self {
        Self { id, width, height }
    }

    pub fn full(id: &'a str) -> Self {
        Self::new(id, 0, 0)
    }

    pub fn is_full(&self) -> bool {
        self.width == 0 && self.height == 0
    }

    /// `full` or `<w>x<h>`.
    pub fn size_suffix(&self) -> String {
        if self.is_full() {
            "full".to_string()
        } else {
            format!("{}x{}", self.width, self.height)
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}-{}.{}", self.id, self.size_suffix(), ENTRY_EXTENSION)
    }
}

impl fmt::Display for CacheKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.size_suffix())
    }
}

/// Snapshot of cache counters since the store was created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub resized_hits: u64,
    pub full_hits: u64,
    pub remote_fetches: u64,
    pub write_failures: u64,
}

impl CacheStats {
    pub fn total(&self) -> u64 {
        self.resized_hits + self.full_hits + self.remote_fetches
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cached, {} derived, {} fetched ({} total)",
            self.resized_hits,
            self.full_hits,
            self.remote_fetches,
            self.total()
        )?;
        if self.write_failures > 0 {
            write!(f, ", {} write failures", self.write_failures)?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct Counters {
    resized_hits: AtomicU64,
    full_hits: AtomicU64,
    remote_fetches: AtomicU64,
    write_failures: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Disk cache in front of the remote store.
///
/// Safe to share across threads: all state is on disk or in atomics.
pub struct PhotoCacheStore {
    dir: PathBuf,
    store: Arc<dyn RemoteStore>,
    backend: Arc<dyn ImageBackend>,
    quality: Quality,
    counters: Counters,
}

impl PhotoCacheStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        store: Arc<dyn RemoteStore>,
        backend: Arc<dyn ImageBackend>,
        quality: Quality,
    ) -> Self {
        Self {
            dir: dir.into(),
            store,
            backend,
            quality,
            counters: Counters::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// On-disk location of the `(id, w, h)` entry. Pure: no I/O, no validation.
    pub fn photo_path(&self, id: &str, width: u32, height: u32) -> PathBuf {
        self.dir.join(CacheKey::new(id, width, height).file_name())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            resized_hits: self.counters.resized_hits.load(Ordering::Relaxed),
            full_hits: self.counters.full_hits.load(Ordering::Relaxed),
            remote_fetches: self.counters.remote_fetches.load(Ordering::Relaxed),
            write_failures: self.counters.write_failures.load(Ordering::Relaxed),
        }
    }

    /// Bytes of photo `id` at `width×height`, or full size for `(0, 0)`.
    pub fn get_photo(&self, id: &str, width: u32, height: u32) -> Result<Vec<u8>, PhotoError> {
        validate_id(id)?;
        if (width == 0) != (height == 0) {
            return Err(PhotoError::InvalidSize { width, height });
        }
        let key = CacheKey::new(id, width, height);

        // Tier 1: exact entry
        if let Some(bytes) = self.read_entry(&key) {
            bump(&self.counters.resized_hits);
            log::debug!("cache hit {key}");
            return Ok(bytes);
        }

        // Tier 2: derive from the full-size entry
        if !key.is_full()
            && let Some(full) = self.read_entry(&CacheKey::full(id))
        {
            bump(&self.counters.full_hits);
            log::debug!("deriving {key} from cached original");
            return self.derive(&key, &full);
        }

        // Tier 3: remote
        bump(&self.counters.remote_fetches);
        log::info!("fetching {id} from remote store");
        let full = self.fetch_original(id)?;
        self.persist(&CacheKey::full(id), &full);

        if key.is_full() {
            Ok(full)
        } else {
            self.derive(&key, &full)
        }
    }

    /// Download the original and apply its rotation once.
    fn fetch_original(&self, id: &str) -> Result<Vec<u8>, PhotoError> {
        let remote_err = |source| PhotoError::RemoteFetch {
            id: id.to_string(),
            source,
        };
        let original = self.store.fetch_bytes(id).map_err(remote_err)?;
        let metadata = self.store.get_metadata(id).map_err(remote_err)?;

        if !metadata.rotation.needs_correction() {
            return Ok(original);
        }
        log::debug!(
            "rotating {id} by {} quarter turns",
            metadata.rotation.quarter_turns()
        );
        self.backend
            .rotate(&RotateParams {
                source: &original,
                rotation: metadata.rotation,
                quality: self.quality,
            })
            .map_err(|source| PhotoError::Format {
                id: id.to_string(),
                source,
            })
    }

    fn derive(&self, key: &CacheKey, full: &[u8]) -> Result<Vec<u8>, PhotoError> {
        let resized = self
            .backend
            .cover(&CoverParams {
                source: full,
                width: key.width,
                height: key.height,
                quality: self.quality,
            })
            .map_err(|source| PhotoError::Format {
                id: key.id.to_string(),
                source,
            })?;
        self.persist(key, &resized);
        Ok(resized)
    }

    /// Read an entry. Anything but a clean read is a miss.
    fn read_entry(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let path = self.dir.join(key.file_name());
        match std::fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!("cache read failed for {}: {e}", path.display());
                None
            }
        }
    }

    fn persist(&self, key: &CacheKey, bytes: &[u8]) {
        let path = self.dir.join(key.file_name());
        if let Err(e) = write_atomic(&path, bytes) {
            bump(&self.counters.write_failures);
            log::warn!("cache write failed for {}: {e}", path.display());
        }
    }
}

/// Ids become file names, so anything that could escape the cache dir is rejected.
fn validate_id(id: &str) -> Result<(), PhotoError> {
    if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
        return Err(PhotoError::InvalidId(id.to_string()));
    }
    Ok(())
}

/// Write to a unique temporary sibling, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    static SEQ: AtomicU64 = AtomicU64::new(0);

    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "entry has no parent"))?;
    std::fs::create_dir_all(dir)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dir.join(format!(
        ".{file_name}.{}.{}.tmp",
        std::process::id(),
        SEQ.fetch_add(1, Ordering::Relaxed)
    ));

    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path).inspect_err(|_| {
        let _ = std::fs::remove_file(&tmp);
    })
}
