//! End-to-end refresh cycle through the public API.
//!
//! An in-memory store stands in for the remote folder; everything else is
//! the production wiring: catalog client, normalizer, `RustBackend` encoding
//! real JPEGs into a temp cache dir, `PrewarmJob` and the supervisor.
//!
//! Run with: cargo test --test refresh_cycle

use gallery_cache::cache::PhotoCacheStore;
use gallery_cache::catalog::{CatalogLimits, RemoteCatalogClient};
use gallery_cache::imaging::{Quality, RustBackend};
use gallery_cache::normalize::PhotoNormalizer;
use gallery_cache::remote::{RemoteError, RemoteStore};
use gallery_cache::supervisor::{RefreshSupervisor, SupervisorConfig};
use gallery_cache::types::{LiteEntry, RemotePhoto, Rotation};
use gallery_cache::worker::PrewarmJob;
use image::{ImageEncoder, RgbImage};
use log::Level;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(30);

struct FolderStore {
    photos: Vec<RemotePhoto>,
    originals: HashMap<String, Vec<u8>>,
    down: AtomicBool,
}

impl FolderStore {
    fn new(photos: Vec<RemotePhoto>) -> Self {
        let originals = photos
            .iter()
            .map(|p| (p.id.clone(), jpeg(p.width, p.height)))
            .collect();
        Self {
            photos,
            originals,
            down: AtomicBool::new(false),
        }
    }

    fn unavailable(&self) -> Result<(), RemoteError> {
        if self.down.load(Ordering::SeqCst) {
            Err(RemoteError::Unavailable("folder offline".into()))
        } else {
            Ok(())
        }
    }
}

impl RemoteStore for FolderStore {
    fn list(&self, _folder_id: &str, _page_size: u32) -> Result<Vec<LiteEntry>, RemoteError> {
        self.unavailable()?;
        Ok(self
            .photos
            .iter()
            .map(|p| LiteEntry { id: p.id.clone() })
            .collect())
    }

    fn get_metadata(&self, id: &str) -> Result<RemotePhoto, RemoteError> {
        self.unavailable()?;
        self.photos
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| RemoteError::Malformed(format!("no such file {id}")))
    }

    fn fetch_bytes(&self, id: &str) -> Result<Vec<u8>, RemoteError> {
        self.unavailable()?;
        self.originals
            .get(id)
            .cloned()
            .ok_or_else(|| RemoteError::Malformed(format!("no such file {id}")))
    }
}

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| image::Rgb([x as u8, y as u8, 90]));
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    out
}

fn photo(id: &str, description: Option<&str>) -> RemotePhoto {
    RemotePhoto {
        id: id.to_string(),
        mime_type: "image/jpeg".to_string(),
        title: format!("{id}.jpg"),
        description: description.map(str::to_string),
        width: 40,
        height: 30,
        rotation: Rotation::NONE,
        trashed: false,
        created: None,
        media_captured: None,
    }
}

fn dimensions(path: &Path) -> (u32, u32) {
    let img = image::open(path).unwrap();
    (img.width(), img.height())
}

fn folder() -> Vec<RemotePhoto> {
    vec![
        photo("older", Some(r#"{"caption":"Lake","date":"2020-07-04"}"#)),
        photo("newer", Some(r#"{"date":"2022-01-15"}"#)),
        RemotePhoto {
            trashed: true,
            ..photo("binned", None)
        },
        RemotePhoto {
            mime_type: "image/png".into(),
            ..photo("drawing", None)
        },
        RemotePhoto {
            rotation: Rotation::CW_90,
            ..photo("sideways", Some("Just a note"))
        },
    ]
}

fn start(store: Arc<FolderStore>, cache_dir: &Path) -> (RefreshSupervisor, Arc<PhotoCacheStore>) {
    let cache = Arc::new(PhotoCacheStore::new(
        cache_dir,
        store.clone(),
        Arc::new(RustBackend::new()),
        Quality::new(85),
    ));
    let limits = CatalogLimits {
        max_concurrent: 3,
        pacing: Duration::ZERO,
        page_size: 100,
    };
    let catalog = RemoteCatalogClient::new(store, limits).unwrap();
    let job = PrewarmJob::new(catalog, PhotoNormalizer::default(), cache.clone(), "folder")
        .with_ratios(vec![1.0, 0.5]);
    let config = SupervisorConfig {
        interval: Duration::from_secs(3600),
        thumb_sizes: [4, 6, 8],
        ..SupervisorConfig::default()
    };
    let supervisor = RefreshSupervisor::spawn(Arc::new(job), config).unwrap();
    (supervisor, cache)
}

#[test]
fn refresh_publishes_ordered_catalog_and_warms_cache() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(FolderStore::new(folder()));
    let (supervisor, cache) = start(store, tmp.path());

    assert!(supervisor.wait_idle(WAIT));

    let catalog = supervisor.catalog();
    let ids: Vec<&str> = catalog.ids().collect();
    assert_eq!(ids, vec!["newer", "older", "sideways"]);

    let older = catalog.get("older").unwrap();
    assert_eq!(older.caption, "Lake (July 4, 2020)");
    let sideways = catalog.get("sideways").unwrap();
    assert_eq!(sideways.caption, "Just a note");
    assert_eq!((sideways.width, sideways.height), (30, 40));

    for id in ids {
        for (w, h) in [(0, 0), (4, 4), (6, 6), (8, 8)] {
            assert!(
                cache.photo_path(id, w, h).exists(),
                "missing {id} {w}x{h}"
            );
        }
    }
    assert_eq!(dimensions(&cache.photo_path("newer", 20, 15)), (20, 15));
    assert_eq!(dimensions(&cache.photo_path("sideways", 0, 0)), (30, 40));
    assert_eq!(dimensions(&cache.photo_path("sideways", 15, 20)), (15, 20));
    assert!(!cache.photo_path("binned", 0, 0).exists());
    assert!(!cache.photo_path("drawing", 0, 0).exists());

    let health = supervisor.health();
    assert!(!health.is_active());
    assert!(health.is_scheduled());
    assert_eq!(health.photo_count, 3);
    assert!(health.last_published_at.is_some());

    supervisor.shutdown();
}

#[test]
fn warm_cache_serves_without_remote() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(FolderStore::new(folder()));
    let (supervisor, cache) = start(store.clone(), tmp.path());
    assert!(supervisor.wait_idle(WAIT));
    supervisor.shutdown();

    store.down.store(true, Ordering::SeqCst);
    let before = cache.stats();
    let bytes = cache.get_photo("older", 6, 6).unwrap();
    assert_eq!(image::load_from_memory(&bytes).unwrap().width(), 6);
    // Not pre-warmed, but derivable from the cached full size.
    let derived = cache.get_photo("older", 10, 10).unwrap();
    assert_eq!(image::load_from_memory(&derived).unwrap().height(), 10);

    let after = cache.stats();
    assert_eq!(after.remote_fetches, before.remote_fetches);
    assert_eq!(after.resized_hits, before.resized_hits + 1);
    assert_eq!(after.full_hits, before.full_hits + 1);
}

#[test]
fn failed_refresh_keeps_published_catalog() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(FolderStore::new(folder()));
    let (supervisor, _cache) = start(store.clone(), tmp.path());
    assert!(supervisor.wait_idle(WAIT));
    let first = supervisor.published();
    assert_eq!(first.snapshot.len(), 3);

    store.down.store(true, Ordering::SeqCst);
    supervisor.refresh_now();
    assert!(supervisor.wait_idle(WAIT));

    let current = supervisor.published();
    assert!(Arc::ptr_eq(&first, &current));
    assert_eq!(supervisor.published_runs().len(), 1);
    assert!(
        supervisor
            .health()
            .logs
            .iter()
            .any(|r| r.level == Level::Error)
    );

    supervisor.shutdown();
}

#[test]
fn manual_trigger_requires_fresh_token() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(FolderStore::new(folder()));
    let (supervisor, _cache) = start(store, tmp.path());
    assert!(supervisor.wait_idle(WAIT));

    assert!(!supervisor.trigger_refresh("guess"));
    let token = supervisor.issue_trigger_token();
    assert!(supervisor.trigger_refresh(&token));
    assert!(supervisor.wait_idle(WAIT));
    assert!(!supervisor.trigger_refresh(&token));

    assert_eq!(supervisor.published_runs().len(), 2);
    supervisor.shutdown();
}
