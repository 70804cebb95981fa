//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the operations every backend must
//! support: identify, resize (with encode), thumbnail, and an encoder
//! capability probe used for format negotiation.
//!
//! Backends work on in-memory byte buffers: uploads arrive as bytes and
//! leave as bytes for the object store, so nothing touches the filesystem.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use super::params::{OutputFormat, ResizeParams, ThumbnailParams};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("No {0} encoder available on this host")]
    UnsupportedFormat(OutputFormat),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `resize` and `thumbnail` return the encoded bytes in the requested
/// format. A backend without an encoder for that format must return
/// [`BackendError::UnsupportedFormat`] so callers can negotiate the next one.
pub trait ImageBackend: Send + Sync {
    /// Read pixel dimensions without a full decode where possible.
    fn identify(&self, data: &[u8]) -> Result<Dimensions, BackendError>;

    /// Decode, resample to exactly `width`×`height`, and encode.
    fn resize(&self, params: &ResizeParams<'_>) -> Result<Vec<u8>, BackendError>;

    /// Decode, center-crop to a square, resample to `size`×`size`, and encode.
    fn thumbnail(&self, params: &ThumbnailParams<'_>) -> Result<Vec<u8>, BackendError>;

    /// Whether an encoder for `format` is available.
    fn supports(&self, format: OutputFormat) -> bool;
}
