//! Manifest persistence with optimistic concurrency.
//!
//! [`ManifestStore`] owns the single in-memory working copy of the manifest
//! together with the version token it was read at. Every mutation goes
//! through [`ManifestStore::save`], which runs a compare-and-swap loop:
//!
//! ```text
//!   Idle ──► Writing ──ok──► Committed
//!               │
//!           conflict
//!               ▼
//!       ConflictRetry(n) ── backoff, reload, reapply ──► Writing
//!               │
//!        n == max_attempts
//!               ▼
//!             Failed  (ManifestError::Conflict, remote untouched)
//! ```
//!
//! Mutations are closures over `&mut Manifest` and may run more than once,
//! each time against a freshly reloaded base. They must therefore derive
//! everything (new ids, positions) from the manifest they are handed rather
//! than from state captured earlier.
//!
//! The working copy only ever holds remotely-confirmed state: a draft is
//! promoted after the store accepts it, so a failed save leaves nothing
//! half-applied in memory either.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::manifest::{
    EntryFilter, EntryPatch, GalleryEntry, Manifest, ManifestError, ManifestStats, NewEntry,
    ValidationReport,
};
use crate::naming::replace_extension;
use crate::store::{RemoteObjectStore, StoreError, join_path};

/// Extensions probed by [`ManifestStore::reconcile`], in priority order.
pub const RECONCILE_EXTENSIONS: [&str; 4] = ["webp", "jpg", "jpeg", "png"];

/// Where the manifest lives and how hard to fight for it. See `[manifest]`
/// in the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestSettings {
    /// Store path of the manifest document.
    pub path: String,
    /// Store directory that entry `src` values are relative to.
    pub images_root: String,
    /// Total write attempts before giving up on a conflict.
    pub max_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for ManifestSettings {
    fn default() -> Self {
        Self {
            path: "data/gallery.json".to_string(),
            images_root: "images".to_string(),
            max_attempts: 3,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    Idle,
    Writing,
    ConflictRetry(u32),
    Failed,
    Committed,
}

/// Size statistics recorded on an entry after re-encoding its asset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SrcStats {
    pub original_size: u64,
    pub optimized_size: u64,
    pub compression_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SrcRewrite {
    pub id: String,
    pub from: String,
    pub to: String,
}

/// Outcome of [`ManifestStore::reconcile`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ReconcileReport {
    pub checked: usize,
    pub changed: usize,
    pub rewrites: Vec<SrcRewrite>,
    /// Ids whose asset is absent under every candidate extension.
    pub missing: Vec<String>,
}

#[derive(Debug, Clone)]
struct Working {
    manifest: Manifest,
    version: String,
}

pub struct ManifestStore<S: RemoteObjectStore> {
    store: Arc<S>,
    settings: ManifestSettings,
    working: Mutex<Option<Working>>,
    last_state: std::sync::Mutex<SaveState>,
}

impl<S: RemoteObjectStore> ManifestStore<S> {
    pub fn new(store: Arc<S>, settings: ManifestSettings) -> Self {
        Self {
            store,
            settings,
            working: Mutex::new(None),
            last_state: std::sync::Mutex::new(SaveState::Idle),
        }
    }

    pub fn settings(&self) -> &ManifestSettings {
        &self.settings
    }

    pub fn object_store(&self) -> &Arc<S> {
        &self.store
    }

    /// State the most recent [`save`](Self::save) ended in.
    pub fn last_save_state(&self) -> SaveState {
        *self.last_state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store path of an entry's asset.
    pub fn asset_path(&self, src: &str) -> String {
        join_path(&self.settings.images_root, src)
    }

    async fn fetch(&self) -> Result<Working, ManifestError> {
        let object = self.store.get(&self.settings.path).await?;
        let manifest = Manifest::from_json(&object.content)?;
        debug!(path = %self.settings.path, images = manifest.images.len(), "loaded manifest");
        Ok(Working {
            manifest,
            version: object.version,
        })
    }

    /// Fetch the manifest fresh and make it the working copy.
    pub async fn load(&self) -> Result<Manifest, ManifestError> {
        let mut guard = self.working.lock().await;
        let fresh = self.fetch().await?;
        let manifest = fresh.manifest.clone();
        *guard = Some(fresh);
        Ok(manifest)
    }

    /// The working copy, loading it on first use.
    pub async fn current(&self) -> Result<Manifest, ManifestError> {
        let mut guard = self.working.lock().await;
        if let Some(working) = guard.as_ref() {
            return Ok(working.manifest.clone());
        }
        let fresh = self.fetch().await?;
        let manifest = fresh.manifest.clone();
        *guard = Some(fresh);
        Ok(manifest)
    }

    /// Create an empty manifest. Refuses to overwrite an existing one.
    pub async fn initialize(&self, base_url: &str) -> Result<Manifest, ManifestError> {
        let mut guard = self.working.lock().await;
        if self.store.exists(&self.settings.path).await? {
            return Err(ManifestError::AlreadyExists(self.settings.path.clone()));
        }
        let manifest = Manifest::new(base_url);
        let version = self
            .store
            .put(
                &self.settings.path,
                &manifest.to_json()?,
                "Initialize gallery data",
                None,
            )
            .await?;
        info!(path = %self.settings.path, "created empty manifest");
        *guard = Some(Working {
            manifest: manifest.clone(),
            version,
        });
        Ok(manifest)
    }

    pub async fn entries(&self) -> Result<Vec<GalleryEntry>, ManifestError> {
        Ok(self.current().await?.images)
    }

    pub async fn get(&self, id: &str) -> Result<Option<GalleryEntry>, ManifestError> {
        Ok(self.current().await?.get(id).cloned())
    }

    pub async fn filter(&self, filter: &EntryFilter) -> Result<Vec<GalleryEntry>, ManifestError> {
        let manifest = self.current().await?;
        Ok(manifest.filter(filter).cloned().collect())
    }

    pub async fn stats(&self) -> Result<ManifestStats, ManifestError> {
        Ok(self.current().await?.stats())
    }

    pub async fn validate(&self) -> Result<ValidationReport, ManifestError> {
        Ok(self.current().await?.validate())
    }

    fn record(&self, state: SaveState, attempt: u32) {
        debug!(?state, attempt, path = %self.settings.path, "manifest save");
        *self.last_state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Apply `mutation` and persist the whole manifest with compare-and-swap.
    ///
    /// On a version conflict, waits the configured backoff, reloads the
    /// manifest, and reapplies `mutation` to the fresh copy, for at most
    /// `max_attempts` writes in total. An error returned by `mutation` aborts
    /// the save without writing.
    pub async fn save<T, F>(&self, message: &str, mut mutation: F) -> Result<T, ManifestError>
    where
        F: FnMut(&mut Manifest) -> Result<T, ManifestError> + Send,
        T: Send,
    {
        let mut guard = self.working.lock().await;
        let mut base = match guard.as_ref() {
            Some(working) => working.clone(),
            None => {
                let fresh = self.fetch().await?;
                *guard = Some(fresh.clone());
                fresh
            }
        };

        let max_attempts = self.settings.max_attempts.max(1);
        self.record(SaveState::Idle, 0);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut draft = base.manifest.clone();
            let value = mutation(&mut draft)?;
            let bytes = draft.to_json()?;

            self.record(SaveState::Writing, attempt);
            match self
                .store
                .put(&self.settings.path, &bytes, message, Some(&base.version))
                .await
            {
                Ok(version) => {
                    self.record(SaveState::Committed, attempt);
                    info!(commit = message, attempt, "manifest saved");
                    *guard = Some(Working {
                        manifest: draft,
                        version,
                    });
                    return Ok(value);
                }
                Err(StoreError::Conflict { .. }) if attempt < max_attempts => {
                    self.record(SaveState::ConflictRetry(attempt), attempt);
                    warn!(
                        attempt,
                        max_attempts, "manifest changed remotely, reloading and retrying"
                    );
                    tokio::time::sleep(self.settings.retry_backoff).await;
                    base = self.fetch().await?;
                    *guard = Some(base.clone());
                }
                Err(StoreError::Conflict { .. }) => {
                    self.record(SaveState::Failed, attempt);
                    warn!(attempts = attempt, "giving up on manifest save");
                    return Err(ManifestError::Conflict { attempts: attempt });
                }
                Err(e) => {
                    self.record(SaveState::Failed, attempt);
                    return Err(e.into());
                }
            }
        }
    }

    /// Append an entry under a fresh id (`max + 1`, or `1` for an empty
    /// manifest).
    pub async fn add(&self, entry: NewEntry) -> Result<GalleryEntry, ManifestError> {
        let message = format!("Add new image: {}", entry.title);
        self.save(&message, |manifest| {
            let created = entry.clone().with_id(manifest.next_id());
            manifest.images.push(created.clone());
            Ok(created)
        })
        .await
    }

    pub async fn update(&self, id: &str, patch: &EntryPatch) -> Result<GalleryEntry, ManifestError> {
        let message = format!("Update image: {}", patch.title.as_deref().unwrap_or(id));
        self.save(&message, |manifest| {
            let entry = manifest
                .get_mut(id)
                .ok_or_else(|| ManifestError::EntryNotFound(id.to_string()))?;
            patch.apply(entry);
            Ok(entry.clone())
        })
        .await
    }

    /// Delete the asset (best effort) and then the manifest entry.
    ///
    /// A missing asset, or any failure deleting it, is logged and ignored.
    pub async fn remove(&self, id: &str) -> Result<GalleryEntry, ManifestError> {
        let snapshot = self
            .current()
            .await?
            .get(id)
            .cloned()
            .ok_or_else(|| ManifestError::EntryNotFound(id.to_string()))?;

        let message = format!("Delete image: {}", snapshot.title);
        self.delete_asset(&snapshot.src, &message).await;

        self.save(&format!("Remove image: {}", snapshot.title), |manifest| {
            match manifest.images.iter().position(|e| e.id == id) {
                Some(index) => Ok(manifest.images.remove(index)),
                // Someone else removed it first; nothing left to do.
                None => Ok(snapshot.clone()),
            }
        })
        .await
    }

    async fn delete_asset(&self, src: &str, message: &str) {
        let path = self.asset_path(src);
        let result = match self.store.get(&path).await {
            Ok(object) => self.store.delete(&path, message, &object.version).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => debug!(%path, "deleted asset"),
            Err(e) if e.is_not_found() => debug!(%path, "asset already absent"),
            Err(e) => warn!(%path, error = %e, "could not delete asset; removing entry anyway"),
        }
    }

    /// Point entries at whichever candidate extension actually exists.
    ///
    /// For each entry, probes `{base}.webp`, `.jpg`, `.jpeg`, `.png` and
    /// takes the first present. Entries whose `src` differs are rewritten
    /// (and marked optimized when the match is WebP). Saves once, only if
    /// something changed.
    pub async fn reconcile(&self) -> Result<ReconcileReport, ManifestError> {
        let manifest = self.load().await?;
        let mut report = ReconcileReport {
            checked: manifest.images.len(),
            ..ReconcileReport::default()
        };

        let mut targets: HashMap<String, (String, String)> = HashMap::new();
        for entry in &manifest.images {
            match self.probe_candidates(&entry.src).await? {
                Some(found) if found != entry.src => {
                    info!(id = %entry.id, from = %entry.src, to = %found, "reconcile rewrite");
                    report.rewrites.push(SrcRewrite {
                        id: entry.id.clone(),
                        from: entry.src.clone(),
                        to: found.clone(),
                    });
                    targets.insert(entry.id.clone(), (entry.src.clone(), found));
                }
                Some(_) => {}
                None => {
                    debug!(id = %entry.id, src = %entry.src, "asset missing under every extension");
                    report.missing.push(entry.id.clone());
                }
            }
        }

        if targets.is_empty() {
            return Ok(report);
        }

        report.changed = self
            .save("Reconcile gallery paths with stored files", |manifest| {
                let mut changed = 0;
                for entry in &mut manifest.images {
                    if let Some((from, to)) = targets.get(&entry.id)
                        && &entry.src == from
                    {
                        entry.src = to.clone();
                        if to.ends_with(".webp") {
                            entry.optimized = true;
                        }
                        changed += 1;
                    }
                }
                Ok(changed)
            })
            .await?;
        Ok(report)
    }

    async fn probe_candidates(&self, src: &str) -> Result<Option<String>, ManifestError> {
        for ext in RECONCILE_EXTENSIONS {
            let candidate = replace_extension(src, ext);
            if self.store.exists(&self.asset_path(&candidate)).await? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// Repoint entries from `old_src` to `new_src` after the asset was
    /// re-encoded under a new name.
    ///
    /// Reloads first. When no entry references `old_src` this only logs a
    /// warning and returns `0` without writing.
    pub async fn rewrite_src(
        &self,
        old_src: &str,
        new_src: &str,
        stats: Option<SrcStats>,
    ) -> Result<usize, ManifestError> {
        let manifest = self.load().await?;
        if !manifest.images.iter().any(|e| e.src == old_src) {
            warn!(old_src, new_src, "no manifest entry references the old path");
            return Ok(0);
        }

        let message = format!("Update paths for optimized image: {new_src}");
        self.save(&message, |manifest| {
            let mut changed = 0;
            for entry in manifest.images.iter_mut().filter(|e| e.src == old_src) {
                entry.src = new_src.to_string();
                entry.optimized = true;
                if let Some(stats) = stats {
                    entry.original_size = Some(stats.original_size);
                    entry.optimized_size = Some(stats.optimized_size);
                    entry.compression_ratio = Some(stats.compression_ratio);
                }
                changed += 1;
            }
            Ok(changed)
        })
        .await
    }
}
