//! Bulk processing: many files through the ingestion pipeline, and
//! re-optimisation of images already in the store.
//!
//! Both paths share [`run_batches`]: items are taken `batch_size` at a time
//! (3 by default), every item of a batch is in flight at once, and the
//! runner waits a fixed pause before starting the next batch to bound the
//! request rate against the store.
//!
//! Failures are per item. Each one is caught, classified into an
//! [`ErrorKind`], counted, and recorded in the report; the rest of the run
//! continues.
//!
//! Cancellation is cooperative. A [`BatchObserver`] returning `false` from
//! `on_progress` stops the run before the next batch starts; items already
//! in flight finish and are recorded.

use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::imaging::{ImageBackend, OptimizationResult};
use crate::ingest::{ErrorKind, ImageMetadata, IngestError, IngestionPipeline, RawFile};
use crate::manifest_store::SrcStats;
use crate::naming::{extension_lowercase, replace_extension};
use crate::store::{ObjectInfo, RemoteObjectStore, join_path};

/// Files below this size are considered optimised already.
pub const SMALL_FILE_BYTES: u64 = 100 * 1024;

/// Image extensions picked up when discovering stored files.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// See `[batch]` in the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSettings {
    pub batch_size: usize,
    pub pause: Duration,
    /// Skip stored files that look optimised already, and files the codec
    /// says need no work.
    pub skip_optimized: bool,
    /// Run the codec but write nothing.
    pub dry_run: bool,
    /// Folders under the images root scanned by [`optimize_existing`](IngestionPipeline::optimize_existing).
    pub folders: Vec<String>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 3,
            pause: Duration::from_secs(1),
            skip_optimized: true,
            dry_run: false,
            folders: ["about", "backgrounds", "hero", "highlights", "speakers", "testimonial"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Running counters for one batch run. Never decrease within a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub total: usize,
    pub processed: usize,
    pub optimized: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl BatchProgress {
    fn record(&mut self, status: &ItemStatus) {
        self.processed += 1;
        match status {
            ItemStatus::Optimized | ItemStatus::Simulated => self.optimized += 1,
            ItemStatus::Skipped { .. } => self.skipped += 1,
            ItemStatus::Failed { .. } => self.errors += 1,
            ItemStatus::Stored => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    /// Re-encoded and written.
    Optimized,
    /// Written unchanged.
    Stored,
    Skipped { reason: String },
    /// Dry run: would have been optimised.
    Simulated,
    Failed { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResult {
    pub name: String,
    #[serde(flatten)]
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimized_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f64>,
}

impl ItemResult {
    fn new(name: &str, status: ItemStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
            path: None,
            entry_id: None,
            original_size: None,
            optimized_size: None,
            compression_ratio: None,
        }
    }

    fn failed(name: &str, error: &IngestError) -> Self {
        Self::new(
            name,
            ItemStatus::Failed {
                kind: error.kind(),
                message: error.to_string(),
            },
        )
    }

    fn skipped(name: &str, reason: &str) -> Self {
        Self::new(
            name,
            ItemStatus::Skipped {
                reason: reason.to_string(),
            },
        )
    }

    fn with_sizes(mut self, result: &OptimizationResult) -> Self {
        self.original_size = Some(result.original_size);
        self.optimized_size = Some(result.optimized_size);
        self.compression_ratio = Some(result.compression_ratio);
        self
    }

    fn at(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    /// Bytes saved; negative when the output grew.
    pub fn saved_bytes(&self) -> Option<i64> {
        Some(self.original_size? as i64 - self.optimized_size? as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BatchReport {
    pub progress: BatchProgress,
    pub results: Vec<ItemResult>,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn total_saved_bytes(&self) -> i64 {
        self.results.iter().filter_map(ItemResult::saved_bytes).sum()
    }

    /// Mean compression ratio over items that report one.
    pub fn average_compression(&self) -> Option<f64> {
        let ratios: Vec<f64> = self
            .results
            .iter()
            .filter_map(|r| r.compression_ratio)
            .collect();
        if ratios.is_empty() {
            None
        } else {
            Some(ratios.iter().sum::<f64>() / ratios.len() as f64)
        }
    }
}

/// Progress callback. Return `false` to cancel before the next batch.
pub trait BatchObserver: Send + Sync {
    fn on_progress(&self, progress: &BatchProgress) -> bool;
}

impl<F> BatchObserver for F
where
    F: Fn(&BatchProgress) -> bool + Send + Sync,
{
    fn on_progress(&self, progress: &BatchProgress) -> bool {
        self(progress)
    }
}

/// Observer that never cancels.
pub struct NoProgress;

impl BatchObserver for NoProgress {
    fn on_progress(&self, _progress: &BatchProgress) -> bool {
        true
    }
}

/// Run `work` over `items`, `batch_size` at a time.
///
/// The observer sees the counters after every completed item. Within a
/// batch, results are recorded in completion order. No pause follows the
/// final batch.
pub async fn run_batches<T, F, Fut>(
    items: Vec<T>,
    settings: &BatchSettings,
    observer: &dyn BatchObserver,
    work: F,
) -> BatchReport
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = ItemResult>,
{
    let mut report = BatchReport {
        progress: BatchProgress {
            total: items.len(),
            ..BatchProgress::default()
        },
        ..BatchReport::default()
    };
    let batch_size = settings.batch_size.max(1);
    let mut remaining = items.into_iter().peekable();
    let mut batch_no = 0;
    let mut cancel_requested = false;

    loop {
        let batch: Vec<T> = remaining.by_ref().take(batch_size).collect();
        if batch.is_empty() {
            break;
        }
        batch_no += 1;
        debug!(batch = batch_no, size = batch.len(), "starting batch");

        let mut in_flight: FuturesUnordered<Fut> = batch.into_iter().map(&work).collect();
        while let Some(result) = in_flight.next().await {
            report.progress.record(&result.status);
            if let ItemStatus::Failed { kind, message } = &result.status {
                warn!(item = %result.name, %kind, %message, "item failed");
            }
            report.results.push(result);
            if !observer.on_progress(&report.progress) {
                cancel_requested = true;
            }
        }

        if remaining.peek().is_none() {
            break;
        }
        if cancel_requested {
            info!(
                processed = report.progress.processed,
                total = report.progress.total,
                "batch run cancelled"
            );
            report.cancelled = true;
            break;
        }
        tokio::time::sleep(settings.pause).await;
    }

    info!(
        processed = report.progress.processed,
        optimized = report.progress.optimized,
        skipped = report.progress.skipped,
        errors = report.progress.errors,
        "batch run finished"
    );
    report
}

/// Filename heuristics for "already optimised": WebP, a name saying so, or
/// a file too small to bother with.
pub fn is_already_optimized(name: &str, size: u64) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".webp")
        || lower.contains("optimized")
        || lower.contains("compressed")
        || size < SMALL_FILE_BYTES
}

/// An image discovered in the store by [`optimize_existing`](IngestionPipeline::optimize_existing).
#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    pub name: String,
    pub path: String,
    /// Folder relative to the images root; empty for the root itself.
    pub folder: String,
    pub size: u64,
}

impl StoredImage {
    fn from_info(info: ObjectInfo, folder: &str) -> Self {
        Self {
            name: info.name,
            path: info.path,
            folder: folder.to_string(),
            size: info.size,
        }
    }

    /// Manifest `src` for this file.
    fn src(&self) -> String {
        join_path(&self.folder, &self.name)
    }
}

impl<S: RemoteObjectStore, B: ImageBackend> IngestionPipeline<S, B> {
    /// Ingest many files. Each item succeeds or fails on its own.
    ///
    /// With `dry_run`, files are validated and encoded but nothing is
    /// uploaded and the manifest is untouched.
    pub async fn batch_ingest(
        &self,
        files: Vec<(RawFile, ImageMetadata)>,
        settings: &BatchSettings,
        observer: &dyn BatchObserver,
    ) -> BatchReport {
        info!(files = files.len(), dry_run = settings.dry_run, "batch ingest");
        run_batches(files, settings, observer, |(file, meta)| async move {
            if settings.dry_run {
                return match self.prepare(&file, &meta) {
                    Ok(prepared) => {
                        let result = ItemResult::new(&file.name, ItemStatus::Simulated)
                            .at(&prepared.path);
                        match &prepared.optimization {
                            Some(opt) => result.with_sizes(opt),
                            None => result,
                        }
                    }
                    Err(e) => ItemResult::failed(&file.name, &e),
                };
            }

            match self.ingest(&file, &meta).await {
                Ok(outcome) => {
                    let status = if outcome.entry.optimized {
                        ItemStatus::Optimized
                    } else {
                        ItemStatus::Stored
                    };
                    let mut result = ItemResult::new(&file.name, status).at(&outcome.path);
                    result.entry_id = Some(outcome.entry.id.clone());
                    match &outcome.optimization {
                        Some(opt) => result.with_sizes(opt),
                        None => result,
                    }
                }
                Err(e) => ItemResult::failed(&file.name, &e),
            }
        })
        .await
    }

    /// Images in the configured folders plus the images root itself.
    /// Folders that do not exist are skipped.
    pub async fn discover_stored_images(
        &self,
        settings: &BatchSettings,
    ) -> Result<Vec<StoredImage>, IngestError> {
        let root = &self.settings().images_root;
        let mut found = Vec::new();
        let folders = settings
            .folders
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(""));

        for folder in folders {
            let dir = join_path(root, folder);
            let listing = match self.store().list(&dir).await {
                Ok(listing) => listing,
                Err(e) if e.is_not_found() => {
                    debug!(%dir, "folder absent, skipping");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            found.extend(
                listing
                    .into_iter()
                    .filter(|info| info.is_file())
                    .filter(|info| {
                        extension_lowercase(&info.name)
                            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
                    })
                    .map(|info| StoredImage::from_info(info, folder)),
            );
        }
        info!(images = found.len(), "discovered stored images");
        Ok(found)
    }

    /// Re-encode images already in the store.
    ///
    /// When the optimised file keeps its name it replaces the original in
    /// place. When the extension changes, the new file is uploaded, the old
    /// one deleted, and manifest entries pointing at it are repointed; a
    /// failed repoint is only logged.
    pub async fn optimize_existing(
        &self,
        settings: &BatchSettings,
        observer: &dyn BatchObserver,
    ) -> Result<BatchReport, IngestError> {
        let images = self.discover_stored_images(settings).await?;
        Ok(run_batches(images, settings, observer, |image| async move {
            match self.optimize_stored(&image, settings).await {
                Ok(result) => result,
                Err(e) => ItemResult::failed(&image.name, &e).at(&image.path),
            }
        })
        .await)
    }

    async fn optimize_stored(
        &self,
        image: &StoredImage,
        settings: &BatchSettings,
    ) -> Result<ItemResult, IngestError> {
        if settings.skip_optimized && is_already_optimized(&image.name, image.size) {
            return Ok(ItemResult::skipped(&image.name, "already optimized").at(&image.path));
        }

        let object = self.store().get(&image.path).await?;
        let analysis = self.codec().analyze(&object.content)?;
        if settings.skip_optimized && !analysis.needs_optimization {
            return Ok(ItemResult::skipped(&image.name, "no optimization needed").at(&image.path));
        }

        let options = self.codec().settings().optimize_options();
        let result = self.codec().optimize_negotiated(&object.content, &options)?;
        let new_name = replace_extension(&image.name, result.format.extension());
        let new_path = join_path(&image.folder, &new_name);
        let new_path = join_path(&self.settings().images_root, &new_path);

        if settings.dry_run {
            return Ok(ItemResult::new(&image.name, ItemStatus::Simulated)
                .with_sizes(&result)
                .at(&new_path));
        }

        let message = format!("Optimize image: {new_name}");
        if new_name == image.name {
            self.store()
                .put(&image.path, &result.data, &message, Some(&object.version))
                .await?;
        } else {
            self.store().put(&new_path, &result.data, &message, None).await?;
            self.store()
                .delete(
                    &image.path,
                    &format!("Replace with optimized version: {new_name}"),
                    &object.version,
                )
                .await?;

            let old_src = image.src();
            let new_src = join_path(&image.folder, &new_name);
            let stats = SrcStats {
                original_size: result.original_size,
                optimized_size: result.optimized_size,
                compression_ratio: result.compression_ratio,
            };
            if let Err(e) = self.manifest().rewrite_src(&old_src, &new_src, Some(stats)).await {
                warn!(%old_src, %new_src, error = %e, "manifest paths not updated");
            }
        }
        info!(from = %image.path, to = %new_path, ratio = result.compression_ratio, "re-optimized");

        Ok(ItemResult::new(&image.name, ItemStatus::Optimized)
            .with_sizes(&result)
            .at(&new_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::manifest::{Category, Manifest};
    use crate::test_helpers::{mock_pipeline, new_entry, sample_manifest, seeded_store};
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn quick() -> BatchSettings {
        BatchSettings {
            pause: Duration::from_secs(1),
            ..BatchSettings::default()
        }
    }

    fn ok_item(n: u32) -> ItemResult {
        ItemResult::new(&n.to_string(), ItemStatus::Stored)
    }

    // =========================================================================
    // run_batches
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn processes_all_items_in_batches_of_three() {
        let max_in_flight = AtomicUsize::new(0);
        let in_flight = AtomicUsize::new(0);
        let started = tokio::time::Instant::now();

        let report = run_batches((0..7).collect(), &quick(), &NoProgress, |n: u32| {
            let in_flight = &in_flight;
            let max_in_flight = &max_in_flight;
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                ok_item(n)
            }
        })
        .await;

        assert_eq!(report.progress.total, 7);
        assert_eq!(report.progress.processed, 7);
        assert_eq!(report.results.len(), 7);
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 3);
        assert!(!report.cancelled);
        // Three batches of 10ms work, two pauses in between, none after.
        assert_eq!(started.elapsed(), Duration::from_millis(2030));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_counted_not_fatal() {
        let report = run_batches((0..5).collect(), &quick(), &NoProgress, |n: u32| async move {
            if n % 2 == 0 {
                ItemResult::new(
                    &n.to_string(),
                    ItemStatus::Failed {
                        kind: ErrorKind::Network,
                        message: "reset".into(),
                    },
                )
            } else {
                ItemResult::skipped(&n.to_string(), "already optimized")
            }
        })
        .await;

        assert_eq!(report.progress.errors, 3);
        assert_eq!(report.progress.skipped, 2);
        assert_eq!(report.progress.processed, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn observer_sees_monotonic_counters() {
        let seen = Mutex::new(Vec::new());
        let observer = |p: &BatchProgress| {
            seen.lock().unwrap().push(p.processed);
            true
        };
        run_batches((0..5).collect(), &quick(), &observer, |n: u32| async move { ok_item(n) }).await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_before_next_batch() {
        let calls = AtomicUsize::new(0);
        let observer = |p: &BatchProgress| p.processed < 2;
        let report = run_batches((0..9).collect(), &quick(), &observer, |n: u32| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { ok_item(n) }
        })
        .await;

        assert!(report.cancelled);
        // The first batch was already in flight and completes.
        assert_eq!(report.progress.processed, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.progress.total, 9);
    }

    #[tokio::test]
    async fn empty_run() {
        let report = run_batches(Vec::<u32>::new(), &quick(), &NoProgress, |n| async move {
            ok_item(n)
        })
        .await;
        assert_eq!(report.progress, BatchProgress::default());
    }

    #[test]
    fn report_summaries() {
        let mut a = ItemResult::new("a", ItemStatus::Optimized);
        a.original_size = Some(1000);
        a.optimized_size = Some(400);
        a.compression_ratio = Some(60.0);
        let mut b = ItemResult::new("b", ItemStatus::Simulated);
        b.original_size = Some(500);
        b.optimized_size = Some(400);
        b.compression_ratio = Some(20.0);
        let report = BatchReport {
            results: vec![a, b, ItemResult::skipped("c", "x")],
            ..BatchReport::default()
        };
        assert_eq!(report.total_saved_bytes(), 700);
        assert_eq!(report.average_compression(), Some(40.0));
    }

    #[test]
    fn already_optimized_heuristics() {
        assert!(is_already_optimized("a.webp", 10_000_000));
        assert!(is_already_optimized("hero-OPTIMIZED.jpg", 10_000_000));
        assert!(is_already_optimized("x-compressed.png", 10_000_000));
        assert!(is_already_optimized("tiny.jpg", 50 * 1024));
        assert!(!is_already_optimized("big.jpg", 2_000_000));
    }

    // =========================================================================
    // batch_ingest
    // =========================================================================

    fn speaker_file(name: &str) -> (RawFile, ImageMetadata) {
        (
            RawFile::new(name, "image/jpeg", vec![0; 600 * 1024]),
            ImageMetadata {
                title: name.to_string(),
                alt: name.to_string(),
                category: Category::Ponentes,
                description: String::new(),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn batch_ingest_isolates_failures() {
        let store = seeded_store(&sample_manifest());
        let pipeline = mock_pipeline(store.clone(), MockBackend::with_dimensions(2400, 1600));
        let files = vec![
            speaker_file("a.jpg"),
            (
                RawFile::new("b.gif", "image/gif", vec![0; 10]),
                ImageMetadata::default(),
            ),
            speaker_file("c.jpg"),
        ];

        let report = pipeline.batch_ingest(files, &quick(), &NoProgress).await;
        assert_eq!(report.progress.processed, 3);
        assert_eq!(report.progress.optimized, 2);
        assert_eq!(report.progress.errors, 1);

        let failed = report
            .results
            .iter()
            .find(|r| r.name == "b.gif")
            .unwrap();
        assert!(matches!(
            failed.status,
            ItemStatus::Failed {
                kind: ErrorKind::Validation,
                ..
            }
        ));

        let manifest =
            Manifest::from_json(&store.read("data/gallery.json").unwrap()).unwrap();
        assert_eq!(manifest.images.len(), 5);
        let ids: HashSet<_> = manifest.images.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), 5);
        let srcs: HashSet<_> = manifest.images.iter().map(|e| e.src.as_str()).collect();
        assert_eq!(srcs.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_ingest_same_names_keep_every_image() {
        let store = seeded_store(&sample_manifest());
        let pipeline = mock_pipeline(store.clone(), MockBackend::with_dimensions(8, 8));
        let files = (1..=3u8)
            .map(|n| {
                (
                    RawFile::new("photo.png", "image/png", vec![n; 64]),
                    ImageMetadata {
                        category: Category::Evento,
                        ..ImageMetadata::default()
                    },
                )
            })
            .collect();

        let report = pipeline.batch_ingest(files, &quick(), &NoProgress).await;
        assert_eq!(report.progress.errors, 0);
        assert_eq!(report.progress.processed, 3);

        let manifest =
            Manifest::from_json(&store.read("data/gallery.json").unwrap()).unwrap();
        let added: Vec<_> = manifest.images.iter().skip(3).collect();
        assert_eq!(added.len(), 3);
        let srcs: HashSet<_> = added.iter().map(|e| e.src.as_str()).collect();
        assert_eq!(srcs.len(), 3);

        let mut stored: Vec<Vec<u8>> = added
            .iter()
            .map(|e| store.read(&format!("images/{}", e.src)).unwrap())
            .collect();
        stored.sort();
        assert_eq!(stored, vec![vec![1; 64], vec![2; 64], vec![3; 64]]);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_ingest_dry_run_writes_nothing() {
        let store = seeded_store(&sample_manifest());
        let before = store.paths();
        let pipeline = mock_pipeline(store.clone(), MockBackend::with_dimensions(2400, 1600));
        let settings = BatchSettings {
            dry_run: true,
            ..quick()
        };

        let report = pipeline
            .batch_ingest(vec![speaker_file("a.jpg")], &settings, &NoProgress)
            .await;
        assert_eq!(report.results[0].status, ItemStatus::Simulated);
        assert!(report.results[0].compression_ratio.is_some());
        assert_eq!(store.paths(), before);
    }

    // =========================================================================
    // optimize_existing
    // =========================================================================

    fn manifest_with(srcs: &[&str]) -> Manifest {
        let mut m = Manifest::new("https://cdn.example/images");
        for (i, src) in srcs.iter().enumerate() {
            m.images
                .push(new_entry(src, Category::Evento).with_id((i + 1).to_string()));
        }
        m
    }

    #[tokio::test(start_paused = true)]
    async fn optimize_existing_converts_and_repoints() {
        let store = seeded_store(&manifest_with(&["about/crowd.jpg"]));
        store.insert("images/about/crowd.jpg", vec![0; 800 * 1024]);
        store.insert("images/about/done.webp", vec![0; 800 * 1024]);
        store.insert("images/hero/notes.txt", vec![0; 800 * 1024]);
        let pipeline = mock_pipeline(
            store.clone(),
            MockBackend::with_dimensions(3000, 2000).encoding_to(90_000),
        );

        let report = pipeline.optimize_existing(&quick(), &NoProgress).await.unwrap();

        assert_eq!(report.progress.total, 2);
        assert_eq!(report.progress.optimized, 1);
        assert_eq!(report.progress.skipped, 1);
        assert!(store.read("images/about/crowd.jpg").is_none());
        assert_eq!(store.read("images/about/crowd.webp").unwrap().len(), 90_000);

        let m = Manifest::from_json(&store.read("data/gallery.json").unwrap()).unwrap();
        assert_eq!(m.images[0].src, "about/crowd.webp");
        assert!(m.images[0].optimized);
        assert_eq!(m.images[0].optimized_size, Some(90_000));
    }

    #[tokio::test(start_paused = true)]
    async fn optimize_existing_replaces_in_place_when_name_unchanged() {
        let store = seeded_store(&manifest_with(&["speakers/big.webp"]));
        store.insert("images/speakers/big.webp", vec![0; 800 * 1024]);
        let pipeline = mock_pipeline(
            store.clone(),
            MockBackend::with_dimensions(3000, 2000).encoding_to(70_000),
        );
        let settings = BatchSettings {
            skip_optimized: false,
            ..quick()
        };

        let report = pipeline.optimize_existing(&settings, &NoProgress).await.unwrap();
        assert_eq!(report.progress.optimized, 1);
        assert_eq!(store.read("images/speakers/big.webp").unwrap().len(), 70_000);
        assert_eq!(store.put_count("data/gallery.json"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn optimize_existing_dry_run_leaves_store() {
        let store = seeded_store(&manifest_with(&["about/crowd.jpg"]));
        store.insert("images/about/crowd.jpg", vec![0; 800 * 1024]);
        let before = store.paths();
        let pipeline = mock_pipeline(store.clone(), MockBackend::with_dimensions(3000, 2000));
        let settings = BatchSettings {
            dry_run: true,
            ..quick()
        };

        let report = pipeline.optimize_existing(&settings, &NoProgress).await.unwrap();
        assert_eq!(report.results[0].status, ItemStatus::Simulated);
        assert_eq!(report.progress.optimized, 1);
        assert_eq!(store.paths(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn optimize_existing_skips_images_needing_no_work() {
        let store = seeded_store(&manifest_with(&[]));
        store.insert("images/top.png", vec![0; 200 * 1024]);
        let pipeline = mock_pipeline(store.clone(), MockBackend::with_dimensions(640, 480));

        let report = pipeline.optimize_existing(&quick(), &NoProgress).await.unwrap();
        assert_eq!(
            report.results[0].status,
            ItemStatus::Skipped {
                reason: "no optimization needed".into()
            }
        );
    }
}
