//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG) | `image::load_from_memory` |
//! | Rotate | `DynamicImage::rotate90` / `rotate180` / `rotate270` |
//! | Cover | `imageops::resize` (Lanczos3) to fill dimensions, then centered `crop_imm` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |

use super::backend::{BackendError, ImageBackend};
use super::calculations::{calculate_fill_dimensions, center_crop_offset};
use super::params::{CoverParams, Quality, RotateParams};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

/// Pure Rust backend using the `image` crate.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(bytes: &[u8]) -> Result<DynamicImage, BackendError> {
    image::load_from_memory(bytes).map_err(|e| BackendError::Decode(e.to_string()))
}

/// Encode as baseline JPEG. Alpha is dropped since JPEG has no alpha channel.
fn encode_jpeg(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Vec::new();
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality.value() as u8);
    rgb.write_with_encoder(encoder)
        .map_err(|e| BackendError::Encode(e.to_string()))?;
    Ok(out)
}

impl ImageBackend for RustBackend {
    fn rotate(&self, params: &RotateParams) -> Result<Vec<u8>, BackendError> {
        let img = decode(params.source)?;
        // Applies the full quarter-turn count: 2 and 3 give 180° and 270°
        // rather than a fixed 90° for any non-zero flag.
        let rotated = match params.rotation.quarter_turns() {
            1 => img.rotate90(),
            2 => img.rotate180(),
            3 => img.rotate270(),
            _ => img,
        };
        encode_jpeg(&rotated, params.quality)
    }

    fn cover(&self, params: &CoverParams) -> Result<Vec<u8>, BackendError> {
        if params.width == 0 || params.height == 0 {
            return Err(BackendError::InvalidSize {
                width: params.width,
                height: params.height,
            });
        }
        let img = decode(params.source)?;
        let target = (params.width, params.height);

        // Fill-resize then center-crop to exact dimensions
        let (fill_w, fill_h) = calculate_fill_dimensions(img.dimensions(), target);
        let filled = img.resize_exact(fill_w, fill_h, FilterType::Lanczos3);
        let (x, y) = center_crop_offset((fill_w, fill_h), target);
        let cropped = filled.crop_imm(x, y, params.width, params.height);

        encode_jpeg(&cropped, params.quality)
    }
}
