//! High-level image operations.
//!
//! [`ImageCodec`] combines the pure [`calculations`](super::calculations)
//! with a backend: it decides dimensions and formats, calls the backend to
//! do the pixel work, and accounts for the bytes saved.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{aspect_ratio, calculate_target_dimensions, compression_ratio, megapixels};
use super::params::{OptimizeOptions, OutputFormat, Quality, ResizeParams, ThumbnailParams};
use super::rust_backend::RustBackend;
use serde::Serialize;
use tracing::{debug, warn};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Files above this size need optimisation regardless of their dimensions.
pub const OPTIMIZATION_THRESHOLD_BYTES: u64 = 500 * 1024;

/// Thumbnails are always WebP at this quality.
pub const THUMBNAIL_QUALITY: Quality = Quality(80);

/// Codec configuration. See `[codec]` in the config file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodecSettings {
    pub max_width: u32,
    pub max_height: u32,
    pub quality: Quality,
    pub format: OutputFormat,
    pub thumbnail_size: u32,
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self {
            max_width: 1200,
            max_height: 1200,
            quality: Quality::default(),
            format: OutputFormat::Webp,
            thumbnail_size: 300,
        }
    }
}

impl CodecSettings {
    pub fn optimize_options(&self) -> OptimizeOptions {
        OptimizeOptions {
            max_width: self.max_width,
            max_height: self.max_height,
            quality: self.quality,
            format: self.format,
        }
    }
}

/// What [`ImageCodec::analyze`] learns about an image without re-encoding it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub width: u32,
    pub height: u32,
    pub byte_size: u64,
    pub megapixels: f64,
    pub aspect_ratio: f64,
    pub needs_optimization: bool,
}

/// Outcome of one optimize call. Produced and consumed within one ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    pub original_size: u64,
    pub optimized_size: u64,
    /// Percent saved, one decimal place. Negative when the output grew.
    pub compression_ratio: f64,
    pub dimensions: Dimensions,
    pub data: Vec<u8>,
    pub format: OutputFormat,
}

impl OptimizationResult {
    pub fn saved_bytes(&self) -> i64 {
        self.original_size as i64 - self.optimized_size as i64
    }
}

/// One entry of [`ImageCodec::create_size_variants`].
#[derive(Debug, Clone, PartialEq)]
pub struct SizeVariant {
    pub name: &'static str,
    pub result: OptimizationResult,
}

/// Named bounding boxes for [`ImageCodec::create_size_variants`].
pub const SIZE_PRESETS: [(&str, u32, Quality); 3] = [
    ("thumbnail", 300, Quality(80)),
    ("medium", 600, Quality(85)),
    ("large", 1200, Quality(85)),
];

/// Analyzes and re-encodes images through an [`ImageBackend`].
pub struct ImageCodec<B: ImageBackend = RustBackend> {
    backend: B,
    settings: CodecSettings,
}

impl ImageCodec<RustBackend> {
    pub fn with_settings(settings: CodecSettings) -> Self {
        Self::new(RustBackend::new(), settings)
    }
}

impl<B: ImageBackend> ImageCodec<B> {
    pub fn new(backend: B, settings: CodecSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> &CodecSettings {
        &self.settings
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Read dimensions and decide whether the image needs optimisation.
    ///
    /// True when either axis exceeds the configured maximum or the file is
    /// larger than [`OPTIMIZATION_THRESHOLD_BYTES`].
    pub fn analyze(&self, data: &[u8]) -> Result<Analysis> {
        let Dimensions { width, height } = self.backend.identify(data)?;
        let byte_size = data.len() as u64;
        let needs_optimization = width > self.settings.max_width
            || height > self.settings.max_height
            || byte_size > OPTIMIZATION_THRESHOLD_BYTES;

        Ok(Analysis {
            width,
            height,
            byte_size,
            megapixels: megapixels(width, height),
            aspect_ratio: aspect_ratio(width, height),
            needs_optimization,
        })
    }

    /// Fit the image inside the bounding box and encode it as `options.format`.
    ///
    /// Never upscales. Fails with [`BackendError::UnsupportedFormat`] when
    /// the host has no encoder for the requested format; use
    /// [`optimize_negotiated`](Self::optimize_negotiated) to fall back.
    pub fn optimize(&self, data: &[u8], options: &OptimizeOptions) -> Result<OptimizationResult> {
        let original = self.backend.identify(data)?;
        if !self.backend.supports(options.format) {
            return Err(BackendError::UnsupportedFormat(options.format));
        }

        let (width, height) = calculate_target_dimensions(
            (original.width, original.height),
            (options.max_width, options.max_height),
        );
        let encoded = self.backend.resize(&ResizeParams {
            source: data,
            width,
            height,
            format: options.format,
            quality: options.quality,
        })?;

        let original_size = data.len() as u64;
        let optimized_size = encoded.len() as u64;
        debug!(
            from = ?(original.width, original.height),
            to = ?(width, height),
            format = %options.format,
            original_size,
            optimized_size,
            "optimized image"
        );

        Ok(OptimizationResult {
            original_size,
            optimized_size,
            compression_ratio: compression_ratio(original_size, optimized_size),
            dimensions: Dimensions { width, height },
            data: encoded,
            format: options.format,
        })
    }

    /// Formats to try, in order: `preferred` first, then webp → jpeg → png,
    /// keeping only those the backend can encode.
    pub fn format_preference(&self, preferred: OutputFormat) -> Vec<OutputFormat> {
        std::iter::once(preferred)
            .chain(OutputFormat::PREFERENCE.into_iter().filter(|f| *f != preferred))
            .filter(|f| self.backend.supports(*f))
            .collect()
    }

    /// [`optimize`](Self::optimize) with fallback through
    /// [`format_preference`](Self::format_preference).
    pub fn optimize_negotiated(
        &self,
        data: &[u8],
        options: &OptimizeOptions,
    ) -> Result<OptimizationResult> {
        for format in self.format_preference(options.format) {
            match self.optimize(data, &OptimizeOptions { format, ..*options }) {
                Err(BackendError::UnsupportedFormat(skipped)) => {
                    debug!(format = %skipped, "encoder unavailable, trying next format");
                }
                other => return other,
            }
        }
        Err(BackendError::Encode(
            "no supported output encoder on this host".to_string(),
        ))
    }

    /// Center-crop to a square and resize to `size`×`size`. Always WebP at
    /// quality 80.
    pub fn create_thumbnail(&self, data: &[u8], size: u32) -> Result<Vec<u8>> {
        self.backend.thumbnail(&ThumbnailParams {
            source: data,
            size,
            format: OutputFormat::Webp,
            quality: THUMBNAIL_QUALITY,
        })
    }

    /// Encode the [`SIZE_PRESETS`] variants. A variant that fails is logged
    /// and left out; the rest are still returned.
    pub fn create_size_variants(&self, data: &[u8]) -> Vec<SizeVariant> {
        SIZE_PRESETS
            .iter()
            .filter_map(|&(name, edge, quality)| {
                let options = OptimizeOptions {
                    max_width: edge,
                    max_height: edge,
                    quality,
                    format: self.settings.format,
                };
                match self.optimize_negotiated(data, &options) {
                    Ok(result) => Some(SizeVariant { name, result }),
                    Err(e) => {
                        warn!(variant = name, error = %e, "size variant failed");
                        None
                    }
                }
            })
            .collect()
    }
}
