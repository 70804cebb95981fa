//! Single-image ingestion: validate → analyze → optimize → upload → manifest.
//!
//! [`IngestionPipeline::ingest`] runs the steps strictly in order for one
//! file. Nothing is written to the manifest unless the upload succeeded, so
//! a failure in any earlier step leaves no trace. The reverse is not
//! guaranteed: when the upload lands but the manifest add fails, the asset
//! stays in the store and the caller gets [`IngestError::PartialSuccess`]
//! naming the orphaned path.
//!
//! Generated asset paths look like
//! `{images_root}/{folder}/{category}-{slug}-{millis}.{ext}`, where the folder
//! comes from [`Category::folder`] and the manifest records the part after
//! `images_root/` as the entry's `src`. Stamps issued by one pipeline strictly
//! increase, and a stamp whose path is already taken in the store is skipped,
//! so two files with the same name never share an asset.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::imaging::{
    Analysis, BackendError, ImageBackend, ImageCodec, OptimizationResult, RustBackend,
};
use crate::manifest::{Category, GalleryEntry, ManifestError, NewEntry};
use crate::manifest_store::ManifestStore;
use crate::naming::{display_title, extension_lowercase, split_name, unique_filename};
use crate::store::{RemoteObjectStore, StoreError, join_path};

/// Raster types accepted for upload.
pub const DEFAULT_ALLOWED_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Image processing failed: {0}")]
    Image(#[from] BackendError),
    #[error("Upload to {path} failed: {source}")]
    Upload {
        path: String,
        #[source]
        source: StoreError,
    },
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("Uploaded {path} but the manifest update failed: {source}")]
    PartialSuccess {
        path: String,
        #[source]
        source: ManifestError,
    },
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Validation(_) => ErrorKind::Validation,
            IngestError::Image(e) => ErrorKind::from_backend(e),
            IngestError::Upload { source, .. } | IngestError::Store(source) => {
                ErrorKind::from_store(source)
            }
            IngestError::Manifest(e) | IngestError::PartialSuccess { source: e, .. } => {
                ErrorKind::from_manifest(e)
            }
        }
    }

    pub fn is_partial_success(&self) -> bool {
        matches!(self, IngestError::PartialSuccess { .. })
    }
}

/// Coarse error class used in batch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Decode,
    Encode,
    NotFound,
    Conflict,
    PermissionDenied,
    Network,
    InvalidRequest,
    Parse,
    Io,
}

impl ErrorKind {
    fn from_backend(e: &BackendError) -> Self {
        match e {
            BackendError::Decode(_) => ErrorKind::Decode,
            BackendError::Encode(_) | BackendError::UnsupportedFormat(_) => ErrorKind::Encode,
        }
    }

    fn from_store(e: &StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::Conflict { .. } => ErrorKind::Conflict,
            StoreError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            StoreError::Network { .. } => ErrorKind::Network,
            StoreError::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            StoreError::Io { .. } => ErrorKind::Io,
        }
    }

    fn from_manifest(e: &ManifestError) -> Self {
        match e {
            ManifestError::Parse(_) | ManifestError::Serialize(_) => ErrorKind::Parse,
            ManifestError::Store(s) => ErrorKind::from_store(s),
            ManifestError::Conflict { .. } | ManifestError::AlreadyExists(_) => ErrorKind::Conflict,
            ManifestError::EntryNotFound(_) => ErrorKind::NotFound,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Decode => "decode",
            ErrorKind::Encode => "encode",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::Network => "network",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Parse => "parse",
            ErrorKind::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Inputs
// ============================================================================

/// Millisecond wall clock, injectable so generated names are predictable.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// An uploaded file as the caller received it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFile {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl RawFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Read a local file, inferring the MIME type from its extension.
    /// Unknown extensions get `application/octet-stream` and fail validation.
    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = mime_from_name(&name).unwrap_or("application/octet-stream");
        Ok(Self::new(name, mime_type, data))
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// MIME type for a raster image filename, by extension.
pub fn mime_from_name(name: &str) -> Option<&'static str> {
    match extension_lowercase(name)?.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Ingestible images below `dir`, sorted by path. Hidden entries are skipped.
pub fn discover_local_images(dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| mime_from_name(&e.file_name().to_string_lossy()).is_some())
        .map(|e| e.into_path())
        .collect();
    found.sort();
    found
}

/// Caller-supplied metadata for a new entry. Empty `title` falls back to a
/// title derived from the filename, empty `alt` to the title.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageMetadata {
    pub title: String,
    pub alt: String,
    pub category: Category,
    pub description: String,
}

/// Upload constraints. See `[ingest]` in the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSettings {
    pub max_file_size: u64,
    pub allowed_types: Vec<String>,
    pub images_root: String,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            allowed_types: DEFAULT_ALLOWED_TYPES.iter().map(|s| s.to_string()).collect(),
            images_root: "images".to_string(),
        }
    }
}

// ============================================================================
// Outputs
// ============================================================================

/// Everything decided before anything is written: the bytes to upload and
/// where they go.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedUpload {
    pub analysis: Analysis,
    pub optimization: Option<OptimizationResult>,
    pub filename: String,
    /// Full store path of the asset.
    pub path: String,
    /// Manifest `src`, relative to the images root.
    pub src: String,
    pub data: Vec<u8>,
    pub entry: NewEntry,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub entry: GalleryEntry,
    pub analysis: Analysis,
    pub optimization: Option<OptimizationResult>,
    pub path: String,
}

// ============================================================================
// Pipeline
// ============================================================================

pub struct IngestionPipeline<S: RemoteObjectStore, B: ImageBackend = RustBackend> {
    store: Arc<S>,
    manifest: Arc<ManifestStore<S>>,
    codec: ImageCodec<B>,
    settings: IngestSettings,
    clock: Arc<dyn Clock>,
    last_stamp: AtomicI64,
}

impl<S: RemoteObjectStore, B: ImageBackend> IngestionPipeline<S, B> {
    pub fn new(
        store: Arc<S>,
        manifest: Arc<ManifestStore<S>>,
        codec: ImageCodec<B>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            store,
            manifest,
            codec,
            settings,
            clock: Arc::new(SystemClock),
            last_stamp: AtomicI64::new(0),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn manifest(&self) -> &Arc<ManifestStore<S>> {
        &self.manifest
    }

    pub fn codec(&self) -> &ImageCodec<B> {
        &self.codec
    }

    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }

    /// Clock reading for a new asset name, bumped past the last one issued.
    fn next_stamp(&self) -> i64 {
        let now = self.clock.now_millis();
        let mut last = self.last_stamp.load(Ordering::Relaxed);
        loop {
            let stamp = now.max(last + 1);
            match self.last_stamp.compare_exchange_weak(
                last,
                stamp,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return stamp,
                Err(current) => last = current,
            }
        }
    }

    /// `(filename, src, path)` for an asset.
    fn asset_name(
        &self,
        original: &str,
        category: &Category,
        ext: &str,
        stamp: i64,
    ) -> (String, String, String) {
        let folder = category.folder();
        let prefix = if category.is_empty() {
            folder
        } else {
            category.as_str()
        };
        let filename = unique_filename(original, prefix, stamp, ext);
        let src = format!("{folder}/{filename}");
        let path = join_path(&self.settings.images_root, &src);
        (filename, src, path)
    }

    async fn asset_exists(&self, path: &str) -> Result<bool, IngestError> {
        match self.store.get(path).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(source) => Err(IngestError::Upload {
                path: path.to_string(),
                source,
            }),
        }
    }

    /// MIME allow-list and size limit.
    pub fn validate(&self, file: &RawFile) -> Result<(), IngestError> {
        let mime = file.mime_type.to_ascii_lowercase();
        if !self.settings.allowed_types.iter().any(|t| *t == mime) {
            return Err(IngestError::Validation(format!(
                "{}: unsupported type '{}' (allowed: {})",
                file.name,
                file.mime_type,
                self.settings.allowed_types.join(", ")
            )));
        }
        if file.size() > self.settings.max_file_size {
            return Err(IngestError::Validation(format!(
                "{}: {} bytes exceeds the {} byte limit",
                file.name,
                file.size(),
                self.settings.max_file_size
            )));
        }
        Ok(())
    }

    /// Steps 1–3: validate, analyze, optimize if needed, and name the asset.
    /// Touches neither the store nor the manifest.
    pub fn prepare(&self, file: &RawFile, meta: &ImageMetadata) -> Result<PreparedUpload, IngestError> {
        self.validate(file)?;

        let analysis = self.codec.analyze(&file.data)?;
        let (optimization, ext) = if analysis.needs_optimization {
            let options = self.codec.settings().optimize_options();
            let result = self.codec.optimize_negotiated(&file.data, &options)?;
            let ext = result.format.extension().to_string();
            (Some(result), ext)
        } else {
            debug!(file = %file.name, "below limits, storing unchanged");
            let ext = extension_lowercase(&file.name)
                .or_else(|| file.mime_type.strip_prefix("image/").map(str::to_string))
                .unwrap_or_else(|| "img".to_string());
            (None, ext)
        };

        let (filename, src, path) =
            self.asset_name(&file.name, &meta.category, &ext, self.next_stamp());

        let title = if meta.title.trim().is_empty() {
            display_title(&file.name)
        } else {
            meta.title.clone()
        };
        let alt = if meta.alt.trim().is_empty() {
            title.clone()
        } else {
            meta.alt.clone()
        };
        let entry = NewEntry {
            src: src.clone(),
            alt,
            category: meta.category.clone(),
            title,
            description: meta.description.clone(),
            optimized: optimization.is_some(),
            original_size: optimization.as_ref().map(|o| o.original_size),
            optimized_size: optimization.as_ref().map(|o| o.optimized_size),
            compression_ratio: optimization.as_ref().map(|o| o.compression_ratio),
        };
        let data = match &optimization {
            Some(result) => result.data.clone(),
            None => file.data.clone(),
        };

        Ok(PreparedUpload {
            analysis,
            optimization,
            filename,
            path,
            src,
            data,
            entry,
        })
    }

    /// Ingest one file end to end.
    pub async fn ingest(&self, file: &RawFile, meta: &ImageMetadata) -> Result<IngestOutcome, IngestError> {
        let mut prepared = self.prepare(file, meta)?;

        while self.asset_exists(&prepared.path).await? {
            let ext = split_name(&prepared.filename).1.unwrap_or_default().to_string();
            let (filename, src, path) =
                self.asset_name(&file.name, &meta.category, &ext, self.next_stamp());
            debug!(taken = %prepared.path, next = %path, "asset name taken");
            prepared.filename = filename;
            prepared.entry.src = src.clone();
            prepared.src = src;
            prepared.path = path;
        }

        self.store
            .put(
                &prepared.path,
                &prepared.data,
                &format!("Upload image: {}", prepared.filename),
                None,
            )
            .await
            .map_err(|source| IngestError::Upload {
                path: prepared.path.clone(),
                source,
            })?;
        info!(path = %prepared.path, bytes = prepared.data.len(), "uploaded asset");

        let entry = self
            .manifest
            .add(prepared.entry)
            .await
            .map_err(|source| IngestError::PartialSuccess {
                path: prepared.path.clone(),
                source,
            })?;
        info!(id = %entry.id, src = %entry.src, optimized = entry.optimized, "ingested");

        Ok(IngestOutcome {
            entry,
            analysis: prepared.analysis,
            optimization: prepared.optimization,
            path: prepared.path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::imaging::{CodecSettings, OutputFormat};
    use crate::manifest::Manifest;
    use crate::store::MemoryStore;
    use crate::test_helpers::{FaultyStore, FixedClock, mock_pipeline, sample_manifest, seeded_store};

    const PATH: &str = "data/gallery.json";

    fn speaker() -> ImageMetadata {
        ImageMetadata {
            title: "Ana Ruiz".into(),
            alt: "Ana on stage".into(),
            category: Category::Ponentes,
            description: String::new(),
        }
    }

    async fn remote_manifest(store: &impl RemoteObjectStore) -> Manifest {
        Manifest::from_json(&store.get(PATH).await.unwrap().content).unwrap()
    }

    // =========================================================================
    // validation
    // =========================================================================

    #[test]
    fn rejects_disallowed_type() {
        let pipeline = mock_pipeline(seeded_store(&sample_manifest()), MockBackend::new());
        let file = RawFile::new("anim.gif", "image/gif", vec![0; 10]);
        let err = pipeline.validate(&file).unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn rejects_oversized_file() {
        let pipeline = mock_pipeline(seeded_store(&sample_manifest()), MockBackend::new());
        let file = RawFile::new("big.jpg", "image/jpeg", vec![0; 10 * 1024 * 1024 + 1]);
        assert!(matches!(
            pipeline.validate(&file),
            Err(IngestError::Validation(_))
        ));
    }

    #[test]
    fn accepts_image_jpg_alias_and_case() {
        let pipeline = mock_pipeline(seeded_store(&sample_manifest()), MockBackend::new());
        assert!(pipeline.validate(&RawFile::new("a.jpg", "image/jpg", vec![1])).is_ok());
        assert!(pipeline.validate(&RawFile::new("a.png", "IMAGE/PNG", vec![1])).is_ok());
    }

    // =========================================================================
    // prepare
    // =========================================================================

    #[test]
    fn prepare_optimizes_large_image() {
        let pipeline = mock_pipeline(
            seeded_store(&sample_manifest()),
            MockBackend::with_dimensions(3000, 2000).encoding_to(150_000),
        );
        let file = RawFile::new("Ana Ruiz.JPG", "image/jpeg", vec![0; 2_000_000]);
        let prepared = pipeline.prepare(&file, &speaker()).unwrap();

        assert_eq!(prepared.filename, "ponentes-ana-ruiz-1718000000000.webp");
        assert_eq!(prepared.src, "speakers/ponentes-ana-ruiz-1718000000000.webp");
        assert_eq!(prepared.path, format!("images/{}", prepared.src));
        let opt = prepared.optimization.as_ref().unwrap();
        assert_eq!((opt.dimensions.width, opt.dimensions.height), (1200, 800));
        assert_eq!(prepared.data.len(), 150_000);
        assert!(prepared.entry.optimized);
        assert_eq!(prepared.entry.original_size, Some(2_000_000));
        assert_eq!(prepared.entry.compression_ratio, Some(92.5));
    }

    #[test]
    fn prepare_passes_small_image_through() {
        let pipeline = mock_pipeline(
            seeded_store(&sample_manifest()),
            MockBackend::with_dimensions(400, 300),
        );
        let data: Vec<u8> = (0..50 * 1024).map(|i| (i % 251) as u8).collect();
        let file = RawFile::new("logo.PNG", "image/png", data.clone());
        let prepared = pipeline.prepare(&file, &ImageMetadata::default()).unwrap();

        assert!(!prepared.analysis.needs_optimization);
        assert!(prepared.optimization.is_none());
        assert_eq!(prepared.data, data);
        assert!(prepared.filename.ends_with(".png"));
        assert_eq!(prepared.src, "misc/misc-logo-1718000000000.png");
        assert!(!prepared.entry.optimized);
        assert_eq!(prepared.entry.title, "logo");
        assert_eq!(prepared.entry.alt, "logo");
    }

    #[test]
    fn prepare_falls_back_when_webp_unavailable() {
        let pipeline = mock_pipeline(
            seeded_store(&sample_manifest()),
            MockBackend::with_dimensions(3000, 2000).without(&[OutputFormat::Webp]),
        );
        let file = RawFile::new("a.jpg", "image/jpeg", vec![0; 1000]);
        let prepared = pipeline.prepare(&file, &speaker()).unwrap();
        assert_eq!(prepared.optimization.unwrap().format, OutputFormat::Jpeg);
        assert!(prepared.filename.ends_with(".jpg"));
    }

    #[test]
    fn prepare_undecodable_is_decode_error() {
        let pipeline = mock_pipeline(seeded_store(&sample_manifest()), MockBackend::undecodable());
        let file = RawFile::new("a.jpg", "image/jpeg", vec![0; 1000]);
        let err = pipeline.prepare(&file, &speaker()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    // =========================================================================
    // ingest
    // =========================================================================

    #[tokio::test]
    async fn ingest_uploads_then_adds_entry() {
        let store = seeded_store(&sample_manifest());
        let pipeline = mock_pipeline(
            store.clone(),
            MockBackend::with_dimensions(3000, 2000).encoding_to(150_000),
        );
        let file = RawFile::new("ana.jpg", "image/jpeg", vec![0; 2_000_000]);
        let outcome = pipeline.ingest(&file, &speaker()).await.unwrap();

        assert_eq!(outcome.entry.id, "4");
        assert_eq!(outcome.entry.category, Category::Ponentes);
        assert!(outcome.entry.src.starts_with("speakers/"));
        assert_eq!(store.read(&outcome.path).unwrap().len(), 150_000);

        let manifest = remote_manifest(store.as_ref()).await;
        assert_eq!(manifest.get("4").unwrap().src, outcome.entry.src);
    }

    #[tokio::test]
    async fn same_name_in_same_millisecond_gets_distinct_assets() {
        let store = seeded_store(&sample_manifest());
        let pipeline = mock_pipeline(store.clone(), MockBackend::with_dimensions(400, 300));

        let first = pipeline
            .ingest(&RawFile::new("photo.png", "image/png", vec![1; 100]), &speaker())
            .await
            .unwrap();
        let second = pipeline
            .ingest(&RawFile::new("photo.png", "image/png", vec![2; 100]), &speaker())
            .await
            .unwrap();

        assert_eq!(first.entry.src, "speakers/ponentes-photo-1718000000000.png");
        assert_eq!(second.entry.src, "speakers/ponentes-photo-1718000000001.png");
        assert_eq!(store.read(&first.path).unwrap(), vec![1; 100]);
        assert_eq!(store.read(&second.path).unwrap(), vec![2; 100]);
    }

    #[tokio::test]
    async fn taken_asset_path_is_skipped() {
        let store = seeded_store(&sample_manifest());
        store.insert("images/speakers/ponentes-photo-1718000000000.png", vec![9; 10]);
        let pipeline = mock_pipeline(store.clone(), MockBackend::with_dimensions(400, 300));

        let outcome = pipeline
            .ingest(&RawFile::new("photo.png", "image/png", vec![1; 100]), &speaker())
            .await
            .unwrap();

        assert_eq!(outcome.path, "images/speakers/ponentes-photo-1718000000001.png");
        assert_eq!(outcome.entry.src, "speakers/ponentes-photo-1718000000001.png");
        assert_eq!(
            store.read("images/speakers/ponentes-photo-1718000000000.png").unwrap(),
            vec![9; 10]
        );
    }

    #[tokio::test]
    async fn failed_upload_creates_no_entry() {
        let inner = seeded_store(&sample_manifest());
        let store = Arc::new(FaultyStore::new(inner.clone()).failing_puts("images/"));
        let manifest = Arc::new(ManifestStore::new(store.clone(), Default::default()));
        let pipeline = IngestionPipeline::new(
            store,
            manifest,
            ImageCodec::new(MockBackend::with_dimensions(400, 300), CodecSettings::default()),
            IngestSettings::default(),
        )
        .with_clock(Arc::new(FixedClock(1)));

        let err = pipeline
            .ingest(&RawFile::new("a.png", "image/png", vec![0; 100]), &speaker())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Upload { .. }));
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(remote_manifest(inner.as_ref()).await.images.len(), 3);
        assert_eq!(inner.put_count(PATH), 0);
    }

    #[tokio::test]
    async fn manifest_failure_after_upload_is_partial_success() {
        // No manifest in the store at all: upload works, add cannot load.
        let store = Arc::new(MemoryStore::new());
        let pipeline = mock_pipeline(store.clone(), MockBackend::with_dimensions(400, 300));
        let err = pipeline
            .ingest(&RawFile::new("a.png", "image/png", vec![0; 100]), &speaker())
            .await
            .unwrap_err();

        let IngestError::PartialSuccess { path, .. } = &err else {
            panic!("expected partial success, got {err:?}");
        };
        assert!(err.is_partial_success());
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(store.read(path).is_some(), "orphaned asset stays in place");
    }

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime_from_name("a.JPG"), Some("image/jpeg"));
        assert_eq!(mime_from_name("a.webp"), Some("image/webp"));
        assert_eq!(mime_from_name("a.gif"), None);
        assert_eq!(mime_from_name("noext"), None);
    }

    #[test]
    fn discover_skips_hidden_and_non_images() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::create_dir_all(root.join(".cache")).unwrap();
        std::fs::write(root.join("b.jpg"), b"x").unwrap();
        std::fs::write(root.join("sub/a.png"), b"x").unwrap();
        std::fs::write(root.join("notes.txt"), b"x").unwrap();
        std::fs::write(root.join(".cache/c.jpg"), b"x").unwrap();

        let found = discover_local_images(root);
        let names: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["b.jpg", "sub/a.png"]);
    }

    #[tokio::test]
    async fn read_infers_mime() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("photo.jpeg");
        std::fs::write(&path, b"data").unwrap();
        let file = RawFile::read(&path).await.unwrap();
        assert_eq!(file.name, "photo.jpeg");
        assert_eq!(file.mime_type, "image/jpeg");
        assert_eq!(file.size(), 4);
    }
}
