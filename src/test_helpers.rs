//! Shared test utilities for the gallery-cache test suite.
//!
//! Provides an in-memory [`FakeStore`] that stands in for the remote photo
//! store, with call counters, latency injection, failure injection and a
//! high-water mark of concurrent metadata calls, plus builders for raw
//! photos and synthetic JPEG bytes.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let store = FakeStore::new()
//!     .with_photo(raw_photo("a", 40, 30), jpeg_bytes(40, 30))
//!     .failing_metadata("a", 1)
//!     .into_arc();
//!
//! store.get_metadata("a").unwrap_err();
//! assert_eq!(store.metadata_calls(), 1);
//! ```

use crate::remote::{RemoteError, RemoteStore};
use crate::types::{LiteEntry, RemotePhoto, Rotation};
use image::{ImageEncoder, RgbImage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =========================================================================
// Fixture builders
// =========================================================================

/// A plain, untrashed JPEG photo with no description or timestamps.
pub fn raw_photo(id: &str, width: u32, height: u32) -> RemotePhoto {
    RemotePhoto {
        id: id.to_string(),
        mime_type: "image/jpeg".to_string(),
        title: format!("{id}.jpg"),
        description: None,
        width,
        height,
        rotation: Rotation::NONE,
        trashed: false,
        created: None,
        media_captured: None,
    }
}

/// Encode a small gradient as JPEG bytes with the given dimensions.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 128])
    });
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// Dimensions of encoded image bytes.
pub fn decoded_dimensions(bytes: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(bytes).unwrap();
    (img.width(), img.height())
}

// =========================================================================
// FakeStore
// =========================================================================

/// In-memory remote store. Listing order is insertion order.
#[derive(Default)]
pub struct FakeStore {
    photos: Vec<RemotePhoto>,
    bytes: HashMap<String, Vec<u8>>,
    latency: Duration,
    list_fails: bool,
    metadata_failures: Mutex<HashMap<String, usize>>,
    fetch_fails: AtomicBool,
    list_calls: AtomicUsize,
    metadata_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_photo(mut self, photo: RemotePhoto, bytes: Vec<u8>) -> Self {
        self.bytes.insert(photo.id.clone(), bytes);
        self.photos.push(photo);
        self
    }

    /// Add a photo whose metadata exists but whose bytes cannot be downloaded.
    pub fn with_metadata_only(mut self, photo: RemotePhoto) -> Self {
        self.photos.push(photo);
        self
    }

    /// Every metadata call sleeps this long while counted as in flight.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.list_fails = true;
        self
    }

    /// The next `times` metadata calls for `id` fail.
    pub fn failing_metadata(self, id: &str, times: usize) -> Self {
        self.metadata_failures
            .lock()
            .unwrap()
            .insert(id.to_string(), times);
        self
    }

    pub fn failing_downloads(self) -> Self {
        self.fetch_fails.store(true, Ordering::SeqCst);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Total remote calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.list_calls() + self.metadata_calls() + self.fetch_calls()
    }

    /// Highest number of metadata calls observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl RemoteStore for FakeStore {
    fn list(&self, _folder_id: &str, page_size: u32) -> Result<Vec<LiteEntry>, RemoteError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.list_fails {
            return Err(RemoteError::Unavailable("listing disabled".into()));
        }
        Ok(self
            .photos
            .iter()
            .take(page_size as usize)
            .map(|p| LiteEntry { id: p.id.clone() })
            .collect())
    }

    fn get_metadata(&self, id: &str) -> Result<RemotePhoto, RemoteError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        {
            let mut failures = self.metadata_failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(id)
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(RemoteError::Unavailable(format!("injected failure for {id}")));
            }
        }

        self.photos
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| RemoteError::Unavailable(format!("no such file {id}")))
    }

    fn fetch_bytes(&self, id: &str) -> Result<Vec<u8>, RemoteError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fetch_fails.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("downloads disabled".into()));
        }
        self.bytes
            .get(id)
            .cloned()
            .ok_or_else(|| RemoteError::Unavailable(format!("no bytes for {id}")))
    }
}
