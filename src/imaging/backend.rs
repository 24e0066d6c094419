//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the cache pipeline
//! needs: rotate and cover. Both work on encoded bytes in
//! memory; the pipeline owns reading and writing cache files.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use super::params::{CoverParams, RotateParams};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode image: {0}")]
    Encode(String),
    #[error("Invalid target size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
}

/// Trait for image processing backends.
///
/// Implementations must be deterministic: the same input bytes and
/// parameters always produce the same output bytes. Cache entries rely on
/// this to be safely rewritten by concurrent or repeated requests.
pub trait ImageBackend: Send + Sync {
    /// Rotate clockwise and re-encode.
    fn rotate(&self, params: &RotateParams) -> Result<Vec<u8>, BackendError>;

    /// Cover-resize (fill then center crop) and re-encode.
    fn cover(&self, params: &CoverParams) -> Result<Vec<u8>, BackendError>;
}
