//! Gallery configuration module.
//!
//! Handles loading, validating, and merging `gallery.toml`. Stock defaults
//! are serialized to a TOML table, the user file is deep-merged on top, and
//! the result is deserialized and validated.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [remote]
//! folder_id = ""                 # Remote folder holding the photos
//! api_base = "https://www.googleapis.com/drive/v2"
//! token_env = "GALLERY_ACCESS_TOKEN"
//! page_size = 1000               # Listing page size (1-1000)
//! max_concurrent = 10            # Metadata requests in flight
//! pacing_ms = 1000               # Pause after each metadata request
//! timeout_secs = 60
//!
//! [cache]
//! dir = "/data/photocache"
//! quality = 90                   # JPEG quality (1-100)
//!
//! [catalog]
//! mime_type = "image/jpeg"       # Only this type is published
//!
//! [refresh]
//! interval_secs = 300
//! thumb_size = 250               # Thumbnails at 1x, 1.5x, 2x
//! scale_ratios = [1.0, 0.75, 0.5, 0.25, 0.15]
//! log_capacity = 100
//!
//! [strings]
//! sheet_url = ""                 # Public sheet JSON feed; empty disables
//! title_entry = 1
//! subtitle_entry = 3
//! supporting_text_entry = 5
//! title = "Photo Gallery"        # Served until the sheet provides one
//! subtitle = ""
//! supporting_text = ""
//! ```
//!
//! Config files are sparse: override just the values you want. Unknown keys
//! are rejected to catch typos early.

use crate::catalog::CatalogLimits;
use crate::imaging::thumbnail_sizes;
use crate::strings::EntryIndices;
use crate::supervisor::SupervisorConfig;
use crate::types::DisplayStrings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_FILENAME: &str = "gallery.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Gallery configuration loaded from `gallery.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    /// Remote store access and throttling.
    pub remote: RemoteConfig,
    /// On-disk cache location and encoding.
    pub cache: CacheConfig,
    /// Catalog filtering.
    pub catalog: CatalogConfig,
    /// Background refresh schedule and pre-warm sizes.
    pub refresh: RefreshConfig,
    /// Display strings source and fallbacks.
    pub strings: StringsConfig,
}

impl GalleryConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.api_base.trim().is_empty() {
            return Err(ConfigError::Validation(
                "remote.api_base must not be empty".into(),
            ));
        }
        if !(1..=1000).contains(&self.remote.page_size) {
            return Err(ConfigError::Validation(
                "remote.page_size must be 1-1000".into(),
            ));
        }
        if self.remote.max_concurrent == 0 {
            return Err(ConfigError::Validation(
                "remote.max_concurrent must be at least 1".into(),
            ));
        }
        if !(1..=100).contains(&self.cache.quality) {
            return Err(ConfigError::Validation("cache.quality must be 1-100".into()));
        }
        if self.refresh.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "refresh.interval_secs must be non-zero".into(),
            ));
        }
        if self.refresh.thumb_size == 0 {
            return Err(ConfigError::Validation(
                "refresh.thumb_size must be non-zero".into(),
            ));
        }
        if self.refresh.scale_ratios.is_empty() {
            return Err(ConfigError::Validation(
                "refresh.scale_ratios must not be empty".into(),
            ));
        }
        if self
            .refresh
            .scale_ratios
            .iter()
            .any(|r| !(*r > 0.0 && *r <= 1.0))
        {
            return Err(ConfigError::Validation(
                "refresh.scale_ratios values must be in (0, 1]".into(),
            ));
        }
        if self.refresh.log_capacity == 0 {
            return Err(ConfigError::Validation(
                "refresh.log_capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Supervisor settings derived from `[refresh]` and `[strings]`.
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            interval: Duration::from_secs(self.refresh.interval_secs),
            thumb_sizes: thumbnail_sizes(self.refresh.thumb_size),
            log_capacity: self.refresh.log_capacity,
            start_immediately: true,
            initial_strings: self.strings.initial(),
        }
    }
}

/// Remote store access and throttling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    /// Id of the folder whose photos make up the gallery.
    pub folder_id: String,
    pub api_base: String,
    /// Environment variable holding the bearer token.
    pub token_env: String,
    pub page_size: u32,
    pub max_concurrent: usize,
    pub pacing_ms: u64,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            folder_id: String::new(),
            api_base: "https://www.googleapis.com/drive/v2".to_string(),
            token_env: "GALLERY_ACCESS_TOKEN".to_string(),
            page_size: 1000,
            max_concurrent: 10,
            pacing_ms: 1000,
            timeout_secs: 60,
        }
    }
}

impl RemoteConfig {
    pub fn limits(&self) -> CatalogLimits {
        CatalogLimits {
            max_concurrent: self.max_concurrent,
            pacing: Duration::from_millis(self.pacing_ms),
            page_size: self.page_size,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub dir: PathBuf,
    /// JPEG encoding quality (1-100).
    pub quality: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/data/photocache"),
            quality: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    /// The only MIME type that is published.
    pub mime_type: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            mime_type: crate::normalize::DEFAULT_SUPPORTED_MIME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RefreshConfig {
    pub interval_secs: u64,
    /// Base thumbnail edge; 1.5x and 2x are derived.
    pub thumb_size: u32,
    /// Main-image scales of native size. `1.0` is the original.
    pub scale_ratios: Vec<f64>,
    pub log_capacity: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            thumb_size: 250,
            scale_ratios: crate::worker::DEFAULT_SCALE_RATIOS.to_vec(),
            log_capacity: crate::health::DEFAULT_LOG_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StringsConfig {
    /// Public sheet JSON feed. Empty disables fetching.
    pub sheet_url: String,
    pub title_entry: usize,
    pub subtitle_entry: usize,
    pub supporting_text_entry: usize,
    pub title: String,
    pub subtitle: String,
    pub supporting_text: String,
}

impl Default for StringsConfig {
    fn default() -> Self {
        let entries = EntryIndices::default();
        Self {
            sheet_url: String::new(),
            title_entry: entries.title,
            subtitle_entry: entries.subtitle,
            supporting_text_entry: entries.supporting_text,
            title: "Photo Gallery".to_string(),
            subtitle: String::new(),
            supporting_text: String::new(),
        }
    }
}

impl StringsConfig {
    pub fn entry_indices(&self) -> EntryIndices {
        EntryIndices {
            title: self.title_entry,
            subtitle: self.subtitle_entry,
            supporting_text: self.supporting_text_entry,
        }
    }

    pub fn initial(&self) -> DisplayStrings {
        DisplayStrings {
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            supporting_text: self.supporting_text.clone(),
        }
    }

    pub fn sheet_enabled(&self) -> bool {
        !self.sheet_url.trim().is_empty()
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(GalleryConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `gallery.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no `gallery.toml`.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<GalleryConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: GalleryConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `gallery.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<GalleryConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `gallery.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Gallery Cache Configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Remote photo store
# ---------------------------------------------------------------------------
[remote]
# Id of the folder whose photos make up the gallery. Required for
# `catalog`, `refresh` and `run`.
folder_id = ""

# Base URL of the Drive v2 style REST API.
api_base = "https://www.googleapis.com/drive/v2"

# Environment variable holding the OAuth bearer token. Acquiring and
# refreshing the token is left to an external credential helper.
token_env = "GALLERY_ACCESS_TOKEN"

# Maximum entries returned by the single listing call (1-1000).
page_size = 1000

# Maximum metadata requests in flight while hydrating the catalog.
max_concurrent = 10

# Pause after each metadata request, in milliseconds. Together with
# max_concurrent this caps the request rate against the remote API.
pacing_ms = 1000

# Per-request timeout in seconds.
timeout_secs = 60

# ---------------------------------------------------------------------------
# Disk cache
# ---------------------------------------------------------------------------
[cache]
# Directory holding <id>-full.jpg and <id>-<w>x<h>.jpg entries.
# Entries are never evicted.
dir = "/data/photocache"

# JPEG encoding quality for rotated and resized entries (1 = worst, 100 = best).
quality = 90

# ---------------------------------------------------------------------------
# Catalog
# ---------------------------------------------------------------------------
[catalog]
# Only photos of this MIME type are published.
mime_type = "image/jpeg"

# ---------------------------------------------------------------------------
# Background refresh
# ---------------------------------------------------------------------------
[refresh]
# Seconds between the end of one refresh and the start of the next.
interval_secs = 300

# Base thumbnail edge in pixels. Square thumbnails are pre-warmed at
# 1x, 1.5x and 2x this size.
thumb_size = 250

# Main image scales of the native size to pre-warm. 1.0 is the original.
scale_ratios = [1.0, 0.75, 0.5, 0.25, 0.15]

# Number of recent events kept for the health report.
log_capacity = 100

# ---------------------------------------------------------------------------
# Display strings
# ---------------------------------------------------------------------------
[strings]
# Public spreadsheet JSON cell feed. Leave empty to use the values below.
sheet_url = ""

# Feed entry index of each string.
title_entry = 1
subtitle_entry = 3
supporting_text_entry = 5

# Served until a refresh publishes strings from the sheet.
title = "Photo Gallery"
subtitle = ""
supporting_text = ""
"##
}
