//! Image processing in pure Rust, entirely in memory.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory` |
//! | **Rotate** | `rotate90` / `rotate180` / `rotate270` |
//! | **Cover** | Lanczos3 fill-resize + center crop |
//! | **Encode** | JPEG via `JpegEncoder` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
pub mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use calculations::{prewarm_plan, thumbnail_sizes};
pub use params::{CoverParams, Quality, RotateParams};
pub use rust_backend::RustBackend;
