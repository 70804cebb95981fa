//! Admin configuration module.
//!
//! Handles loading, validating, and merging `gallery-admin.toml`. Stock
//! defaults are the base layer; a user file overrides any subset of keys.
//!
//! ## Config File Location
//!
//! The CLI reads `--config <FILE>` when given, otherwise
//! `gallery-admin.toml` at the root of the store directory if present:
//!
//! ```text
//! site/
//! ├── gallery-admin.toml      # Overrides stock defaults
//! ├── data/
//! │   └── gallery.json        # Manifest
//! └── images/
//!     ├── about/
//!     └── speakers/
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [codec]
//! max_width = 1200          # Bounding box for optimized images
//! max_height = 1200
//! quality = 0.85            # Lossy encoding quality, 0 < q <= 1
//! format = "webp"           # Preferred output: webp, jpeg or png
//! thumbnail_size = 300      # Square thumbnail edge
//!
//! [ingest]
//! max_file_size_mb = 10
//! allowed_types = ["image/jpeg", "image/jpg", "image/png", "image/webp"]
//! images_root = "images"
//!
//! [manifest]
//! path = "data/gallery.json"
//! max_attempts = 3          # Total writes before giving up on a conflict
//! retry_backoff_ms = 1000
//!
//! [batch]
//! batch_size = 3
//! pause_ms = 1000
//! skip_optimized = true
//! dry_run = false
//! folders = ["about", "backgrounds", "hero", "highlights", "speakers", "testimonial"]
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse — override just the values you want:
//!
//! ```toml
//! [codec]
//! format = "jpeg"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::batch::BatchSettings;
use crate::imaging::{CodecSettings, OutputFormat, Quality};
use crate::ingest::{DEFAULT_ALLOWED_TYPES, IngestSettings};
use crate::manifest_store::ManifestSettings;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Admin configuration loaded from `gallery-admin.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdminConfig {
    pub codec: CodecConfig,
    pub ingest: IngestConfig,
    pub manifest: ManifestConfig,
    pub batch: BatchConfig,
}

impl AdminConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.codec.quality > 0.0 && self.codec.quality <= 1.0) {
            return Err(ConfigError::Validation(
                "codec.quality must be in (0, 1]".into(),
            ));
        }
        if self.codec.max_width == 0 || self.codec.max_height == 0 {
            return Err(ConfigError::Validation(
                "codec.max_width and codec.max_height must be non-zero".into(),
            ));
        }
        if self.codec.thumbnail_size == 0 {
            return Err(ConfigError::Validation(
                "codec.thumbnail_size must be non-zero".into(),
            ));
        }
        if self.ingest.allowed_types.is_empty() {
            return Err(ConfigError::Validation(
                "ingest.allowed_types must not be empty".into(),
            ));
        }
        if self.ingest.max_file_size_mb == 0 {
            return Err(ConfigError::Validation(
                "ingest.max_file_size_mb must be non-zero".into(),
            ));
        }
        if self.manifest.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "manifest.max_attempts must be at least 1".into(),
            ));
        }
        if self.manifest.path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "manifest.path must not be empty".into(),
            ));
        }
        if self.batch.batch_size == 0 {
            return Err(ConfigError::Validation(
                "batch.batch_size must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn codec_settings(&self) -> CodecSettings {
        CodecSettings {
            max_width: self.codec.max_width,
            max_height: self.codec.max_height,
            quality: Quality::from_fraction(self.codec.quality),
            format: self.codec.format,
            thumbnail_size: self.codec.thumbnail_size,
        }
    }

    pub fn ingest_settings(&self) -> IngestSettings {
        IngestSettings {
            max_file_size: self.ingest.max_file_size_mb * 1024 * 1024,
            allowed_types: self
                .ingest
                .allowed_types
                .iter()
                .map(|t| t.to_ascii_lowercase())
                .collect(),
            images_root: self.ingest.images_root.clone(),
        }
    }

    pub fn manifest_settings(&self) -> ManifestSettings {
        ManifestSettings {
            path: self.manifest.path.clone(),
            images_root: self.ingest.images_root.clone(),
            max_attempts: self.manifest.max_attempts,
            retry_backoff: Duration::from_millis(self.manifest.retry_backoff_ms),
        }
    }

    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            batch_size: self.batch.batch_size,
            pause: Duration::from_millis(self.batch.pause_ms),
            skip_optimized: self.batch.skip_optimized,
            dry_run: self.batch.dry_run,
            folders: self.batch.folders.clone(),
        }
    }
}

/// Image codec settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    pub max_width: u32,
    pub max_height: u32,
    /// Fraction in `(0, 1]`, as in `0.85`.
    pub quality: f64,
    pub format: OutputFormat,
    pub thumbnail_size: u32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_width: 1200,
            max_height: 1200,
            quality: 0.85,
            format: OutputFormat::Webp,
            thumbnail_size: 300,
        }
    }
}

/// Upload validation and placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    pub max_file_size_mb: u64,
    pub allowed_types: Vec<String>,
    /// Store directory holding category folders.
    pub images_root: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 10,
            allowed_types: DEFAULT_ALLOWED_TYPES.iter().map(|s| s.to_string()).collect(),
            images_root: "images".to_string(),
        }
    }
}

/// Manifest location and conflict policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManifestConfig {
    pub path: String,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            path: "data/gallery.json".to_string(),
            max_attempts: 3,
            retry_backoff_ms: 1000,
        }
    }
}

/// Bulk processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub pause_ms: u64,
    pub skip_optimized: bool,
    pub dry_run: bool,
    pub folders: Vec<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        let defaults = BatchSettings::default();
        Self {
            batch_size: defaults.batch_size,
            pause_ms: defaults.pause.as_millis() as u64,
            skip_optimized: defaults.skip_optimized,
            dry_run: defaults.dry_run,
            folders: defaults.folders,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(AdminConfig::default())?)
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

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AdminConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AdminConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when it is absent.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(path: &Path) -> Result<AdminConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `gallery-admin.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Gallery Admin Configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Image codec
# ---------------------------------------------------------------------------
[codec]
# Bounding box for optimized images. Images inside it keep their size;
# larger ones are scaled down preserving aspect ratio. Never upscales.
max_width = 1200
max_height = 1200

# Lossy encoding quality as a fraction (0 < quality <= 1).
# Encoder quality for WebP and JPEG output.
quality = 0.85

# Preferred output format: "webp", "jpeg" or "png".
# If the host cannot encode it, webp -> jpeg -> png is tried in turn.
format = "webp"

# Edge length of square thumbnails.
thumbnail_size = 300

# ---------------------------------------------------------------------------
# Upload validation
# ---------------------------------------------------------------------------
[ingest]
# Files larger than this are rejected.
max_file_size_mb = 10

# Accepted MIME types.
allowed_types = ["image/jpeg", "image/jpg", "image/png", "image/webp"]

# Store directory holding the category folders (about/, speakers/, ...).
images_root = "images"

# ---------------------------------------------------------------------------
# Manifest
# ---------------------------------------------------------------------------
[manifest]
# Store path of the gallery manifest.
path = "data/gallery.json"

# Total write attempts when another writer changed the manifest meanwhile.
max_attempts = 3

# Wait before reloading and retrying after a conflict.
retry_backoff_ms = 1000

# ---------------------------------------------------------------------------
# Bulk processing
# ---------------------------------------------------------------------------
[batch]
# Images processed concurrently per batch.
batch_size = 3

# Pause between batches, to stay under API rate limits.
pause_ms = 1000

# Skip files that already look optimized (.webp, "optimized"/"compressed"
# in the name, under 100 KB) and files that need no work.
skip_optimized = true

# Encode but write nothing.
dry_run = false

# Folders under images_root scanned by optimize-existing (the root itself
# is always included).
folders = ["about", "backgrounds", "hero", "highlights", "speakers", "testimonial"]
"##
}
