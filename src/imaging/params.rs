//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the cache pipeline (which decides which variant to
//! produce) and the [`backend`](super::backend) (which does the pixel work),
//! so a mock backend can stand in during tests.
//!
//! ## Types
//!
//! - [`Quality`]: JPEG encoding quality (1–100, default 90). Clamped on construction.
//! - [`RotateParams`]: source bytes plus the quarter turns to apply clockwise.
//! - [`CoverParams`]: source bytes plus the exact box to cover and crop to.

use crate::types::Rotation;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Rotate encoded bytes clockwise by `rotation` quarter turns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotateParams<'a> {
    pub source: &'a [u8],
    pub rotation: Rotation,
    pub quality: Quality,
}

/// Scale encoded bytes to cover `width`×`height`, then center-crop the overflow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverParams<'a> {
    pub source: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
}
