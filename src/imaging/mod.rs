//! Image processing — pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Resize → WebP/JPEG/PNG** | Lanczos3 + `image` encoders |
//! | **Thumbnail** | center square `crop_imm` + `resize_exact` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension and size math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: [`ImageCodec`], combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{
    aspect_ratio, calculate_target_dimensions, compression_ratio, megapixels, round1,
    square_crop_region,
};
pub use operations::{
    Analysis, CodecSettings, ImageCodec, OPTIMIZATION_THRESHOLD_BYTES, OptimizationResult,
    SizeVariant,
};
pub use params::{OptimizeOptions, OutputFormat, Quality, ResizeParams, ThumbnailParams};
pub use rust_backend::RustBackend;
