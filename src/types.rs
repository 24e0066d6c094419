//! Shared data model.
//!
//! Raw records come from the remote store ([`LiteEntry`], [`RemotePhoto`]);
//! the normalizer turns them into [`PhotoDescriptor`]s collected in a
//! [`CatalogSnapshot`], which is what the rest of the system publishes and
//! serves from.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Lightweight folder entry returned by the listing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteEntry {
    pub id: String,
}

/// Clockwise quarter turns the remote store reports for an image.
///
/// Any non-zero value means the stored bytes are not in their visually
/// correct orientation. Odd values (90° and 270°) swap width and height.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rotation(u8);

impl Rotation {
    pub const NONE: Rotation = Rotation(0);
    pub const CW_90: Rotation = Rotation(1);

    /// Build from a raw quarter-turn count; values wrap modulo 4.
    pub fn from_quarter_turns(turns: u32) -> Self {
        Self((turns % 4) as u8)
    }

    pub fn quarter_turns(self) -> u8 {
        self.0
    }

    pub fn needs_correction(self) -> bool {
        self.0 != 0
    }

    pub fn swaps_dimensions(self) -> bool {
        self.0 % 2 == 1
    }
}

/// Fully hydrated metadata for one remote file, before normalization.
///
/// Timestamps are kept as the raw strings the remote store returned; parsing
/// them is the normalizer's job and may fail without failing anything else.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePhoto {
    pub id: String,
    pub mime_type: String,
    #[serde(default)]
    pub title: String,
    /// Free-text description; may hold a JSON object with `caption`/`date`.
    pub description: Option<String>,
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
    pub trashed: bool,
    /// Creation timestamp (RFC 3339).
    pub created: Option<String>,
    /// Capture timestamp from the media metadata (EXIF style).
    pub media_captured: Option<String>,
}

/// A normalized photo, ready to be published and served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoDescriptor {
    pub id: String,
    pub mime_type: String,
    /// Width after orientation correction.
    pub width: u32,
    /// Height after orientation correction.
    pub height: u32,
    pub rotation: Rotation,
    pub caption: String,
    /// Resolved capture date. `None` sorts after every dated photo.
    pub capture_date: Option<NaiveDateTime>,
    pub trashed: bool,
}

/// Ordered, filtered list of photos available for serving.
///
/// Only the normalizer builds non-empty snapshots, so every snapshot in
/// circulation satisfies the catalog invariants: no trashed or unsupported
/// entries, sorted by capture date descending with undated photos last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CatalogSnapshot {
    photos: Vec<PhotoDescriptor>,
}

impl CatalogSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_sorted(photos: Vec<PhotoDescriptor>) -> Self {
        Self { photos }
    }

    pub fn photos(&self) -> &[PhotoDescriptor] {
        &self.photos
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&PhotoDescriptor> {
        self.photos.iter().find(|p| p.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.photos.iter().map(|p| p.id.as_str())
    }
}

/// Display strings pulled from the side metadata source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayStrings {
    pub title: String,
    pub subtitle: String,
    pub supporting_text: String,
}
