//! Shared test utilities for the gallery-admin test suite.
//!
//! Provides synthetic images, a small sample manifest, store fixtures, and
//! a fault-injecting store wrapper for exercising retry and rollback paths.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let store = seeded_store(&sample_manifest());
//! let manifests = manifest_store(store.clone());
//! let entry = manifests.add(new_entry("about/a.jpg", Category::Evento)).await?;
//! assert_eq!(entry.id, "4");
//!
//! // Two conflicts, then the write goes through.
//! let racing = Arc::new(FaultyStore::new(store).with_conflicts("data/gallery.json", 2));
//! ```

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use crate::imaging::backend::tests::MockBackend;
use crate::imaging::{CodecSettings, ImageCodec};
use crate::ingest::{Clock, IngestSettings, IngestionPipeline};
use crate::manifest::{Category, GalleryEntry, Manifest, NewEntry};
use crate::manifest_store::{ManifestSettings, ManifestStore};
use crate::store::{MemoryStore, ObjectInfo, RemoteObjectStore, StoreError, StoredObject};

/// Millisecond timestamp used by [`mock_pipeline`] for generated filenames.
pub const FIXED_MILLIS: i64 = 1_718_000_000_000;

// =========================================================================
// Synthetic images
// =========================================================================

/// Gradient JPEG of the given size.
pub fn synthetic_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
    buf.into_inner()
}

/// Gradient PNG with a varying alpha channel.
pub fn synthetic_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, ((x * 7 + y) % 256) as u8])
    });
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

// =========================================================================
// Manifest fixtures
// =========================================================================

/// Complete entry with placeholder text fields.
pub fn entry(id: &str, src: &str, category: Category) -> GalleryEntry {
    new_entry(src, category).with_id(id.to_string())
}

/// Complete new entry with placeholder text fields.
pub fn new_entry(src: &str, category: Category) -> NewEntry {
    NewEntry {
        src: src.to_string(),
        alt: format!("Photo {src}"),
        title: format!("Image {}", crate::naming::file_name(src)),
        category,
        ..NewEntry::default()
    }
}

/// Three valid entries: an unoptimized jpg, a png, and an optimized webp.
///
/// | id | src                  | category | optimized |
/// |----|----------------------|----------|-----------|
/// | 1  | about/opening.jpg    | evento   | no        |
/// | 2  | keynotes/keynote.png | keynotes | no        |
/// | 3  | speakers/ana.webp    | ponentes | yes       |
pub fn sample_manifest() -> Manifest {
    let mut manifest = Manifest::new("https://cdn.example/images");

    let mut opening = entry("1", "about/opening.jpg", Category::Evento);
    opening.title = "Opening night".into();
    opening.alt = "Crowd at the venue".into();

    let mut keynote = entry("2", "keynotes/keynote.png", Category::Keynotes);
    keynote.title = "Main keynote".into();
    keynote.alt = "Speaker on stage".into();

    let mut ana = entry("3", "speakers/ana.webp", Category::Ponentes);
    ana.title = "Ana".into();
    ana.alt = "Portrait of Ana".into();
    ana.optimized = true;
    ana.original_size = Some(2_400_000);
    ana.optimized_size = Some(180_000);
    ana.compression_ratio = Some(92.5);

    manifest.images = vec![opening, keynote, ana];
    manifest
}

/// Memory store holding `manifest` at the default manifest path.
///
/// Seeding goes through [`MemoryStore::insert`], so it does not count as a put.
pub fn seeded_store(manifest: &Manifest) -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    store.insert(&ManifestSettings::default().path, manifest.to_json().unwrap());
    Arc::new(store)
}

pub fn manifest_store<S: RemoteObjectStore>(store: Arc<S>) -> ManifestStore<S> {
    ManifestStore::new(store, ManifestSettings::default())
}

/// Pipeline over `store` with default settings and a frozen clock.
pub fn mock_pipeline<S: RemoteObjectStore>(
    store: Arc<S>,
    backend: MockBackend,
) -> IngestionPipeline<S, MockBackend> {
    let manifest = Arc::new(manifest_store(store.clone()));
    IngestionPipeline::new(
        store,
        manifest,
        ImageCodec::new(backend, CodecSettings::default()),
        IngestSettings::default(),
    )
    .with_clock(Arc::new(FixedClock(FIXED_MILLIS)))
}

pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

// =========================================================================
// Fault injection
// =========================================================================

/// Wraps a [`MemoryStore`] and fails selected operations.
pub struct FaultyStore {
    inner: Arc<MemoryStore>,
    conflicts: Mutex<HashMap<String, u32>>,
    attempts: Mutex<HashMap<String, usize>>,
    failing_put_prefix: Option<String>,
    failing_deletes: bool,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            conflicts: Mutex::new(HashMap::new()),
            attempts: Mutex::new(HashMap::new()),
            failing_put_prefix: None,
            failing_deletes: false,
        }
    }

    /// The next `n` puts to `path` fail with a conflict and write nothing.
    pub fn with_conflicts(self, path: &str, n: u32) -> Self {
        self.conflicts.lock().unwrap().insert(path.to_string(), n);
        self
    }

    /// Puts below `prefix` fail with a network error.
    pub fn failing_puts(mut self, prefix: &str) -> Self {
        self.failing_put_prefix = Some(prefix.to_string());
        self
    }

    pub fn failing_deletes(mut self) -> Self {
        self.failing_deletes = true;
        self
    }

    /// Every put call against `path`, failed ones included.
    pub fn put_attempts(&self, path: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl RemoteObjectStore for FaultyStore {
    async fn get(&self, path: &str) -> Result<StoredObject, StoreError> {
        self.inner.get(path).await
    }

    async fn put(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        version: Option<&str>,
    ) -> Result<String, StoreError> {
        *self
            .attempts
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default() += 1;

        if let Some(prefix) = &self.failing_put_prefix
            && path.starts_with(prefix.as_str())
        {
            return Err(StoreError::Network {
                message: format!("injected failure writing {path}"),
            });
        }
        {
            let mut conflicts = self.conflicts.lock().unwrap();
            if let Some(remaining) = conflicts.get_mut(path)
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(StoreError::Conflict {
                    path: path.to_string(),
                });
            }
        }
        self.inner.put(path, content, message, version).await
    }

    async fn delete(&self, path: &str, message: &str, version: &str) -> Result<(), StoreError> {
        if self.failing_deletes {
            return Err(StoreError::Network {
                message: format!("injected failure deleting {path}"),
            });
        }
        self.inner.delete(path, message, version).await
    }

    async fn list(&self, path: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        self.inner.list(path).await
    }
}
