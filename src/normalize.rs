//! Turn hydrated remote records into a publishable [`CatalogSnapshot`].
//!
//! ## Caption
//!
//! The remote `description` may hold a JSON object:
//!
//! ```json
//! {"caption": "First steps", "date": "2021-06-01"}
//! ```
//!
//! If it does not parse as one, the whole raw text is the caption. The
//! final caption appends the formatted capture date in parentheses when a
//! date resolves (`First steps (June 1, 2021)`); with no caption the date
//! alone is used; with neither the caption is empty.
//!
//! ## Capture date
//!
//! First source that parses wins, each tried independently:
//!
//! 1. structured `date` (`YYYY-MM-DD`)
//! 2. media capture timestamp (`YYYY:MM:DD HH:MM:SS`, dashes accepted too)
//! 3. creation timestamp (RFC 3339)
//! 4. unresolved (`None`), which sorts after every dated photo
//!
//! ## Orientation, filter, order
//!
//! Rotations of 90°/270° swap width and height. Trashed entries and entries
//! whose MIME type is not the supported one are dropped. The rest is sorted
//! by capture date, newest first, stable on ties.

use crate::types::{CatalogSnapshot, PhotoDescriptor, RemotePhoto};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::cmp::Ordering;

pub const DEFAULT_SUPPORTED_MIME: &str = "image/jpeg";

const CAPTION_DATE_FORMAT: &str = "%B %-d, %Y";

#[derive(Debug, Clone)]
pub struct PhotoNormalizer {
    supported_mime: String,
}

impl Default for PhotoNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_SUPPORTED_MIME)
    }
}

impl PhotoNormalizer {
    pub fn new(supported_mime: impl Into<String>) -> Self {
        Self {
            supported_mime: supported_mime.into(),
        }
    }

    pub fn normalize(&self, raw: Vec<RemotePhoto>) -> CatalogSnapshot {
        let mut photos: Vec<PhotoDescriptor> = raw
            .into_iter()
            .filter(|p| self.is_publishable(p))
            .map(describe)
            .collect();
        // sort_by is stable: equal dates keep hydration order
        photos.sort_by(|a, b| newest_first(a.capture_date, b.capture_date));
        CatalogSnapshot::from_sorted(photos)
    }

    fn is_publishable(&self, photo: &RemotePhoto) -> bool {
        !photo.trashed && photo.mime_type == self.supported_mime
    }
}

/// Optional structured payload inside a free-text description.
#[derive(Debug, Default, Deserialize)]
struct StructuredDescription {
    caption: Option<String>,
    date: Option<String>,
}

fn parse_description(description: Option<&str>) -> StructuredDescription {
    let Some(text) = description else {
        return StructuredDescription::default();
    };
    serde_json::from_str(text).unwrap_or_else(|_| StructuredDescription {
        caption: Some(text.to_string()),
        date: None,
    })
}

fn describe(raw: RemotePhoto) -> PhotoDescriptor {
    let structured = parse_description(raw.description.as_deref());
    let capture_date = resolve_capture_date(
        structured.date.as_deref(),
        raw.media_captured.as_deref(),
        raw.created.as_deref(),
    );
    let caption = compose_caption(structured.caption.as_deref(), capture_date);
    let (width, height) = if raw.rotation.swaps_dimensions() {
        (raw.height, raw.width)
    } else {
        (raw.width, raw.height)
    };

    PhotoDescriptor {
        id: raw.id,
        mime_type: raw.mime_type,
        width,
        height,
        rotation: raw.rotation,
        caption,
        capture_date,
        trashed: raw.trashed,
    }
}

/// Resolve the capture date from the three sources in priority order.
pub fn resolve_capture_date(
    structured: Option<&str>,
    media_captured: Option<&str>,
    created: Option<&str>,
) -> Option<NaiveDateTime> {
    structured
        .and_then(parse_structured_date)
        .or_else(|| media_captured.and_then(parse_media_timestamp))
        .or_else(|| created.and_then(parse_created_timestamp))
}

fn parse_structured_date(s: &str) -> Option<NaiveDateTime> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn parse_media_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    ["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

fn parse_created_timestamp(s: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.naive_utc())
}

/// Build the display caption from an optional caption and resolved date.
pub fn compose_caption(caption: Option<&str>, date: Option<NaiveDateTime>) -> String {
    let date_str = date.map(|d| d.format(CAPTION_DATE_FORMAT).to_string());
    match (caption.filter(|c| !c.is_empty()), date_str) {
        (Some(c), Some(d)) => format!("{c} ({d})"),
        (Some(c), None) => c.to_string(),
        (None, Some(d)) => d,
        (None, None) => String::new(),
    }
}

fn newest_first(a: Option<NaiveDateTime>, b: Option<NaiveDateTime>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
