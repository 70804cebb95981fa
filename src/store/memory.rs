//! In-process object store.
//!
//! Directories are implicit: a path is a directory when some object lives
//! beneath it. Every successful `put` is counted per path so tests can
//! assert how often the manifest was written.

use super::{
    ObjectInfo, ObjectKind, RemoteObjectStore, StoreError, StoredObject, content_version,
    normalize_path,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<String, Vec<u8>>,
    puts: HashMap<String, usize>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed objects without counting them as writes.
    pub fn with_objects<'a>(objects: impl IntoIterator<Item = (&'a str, Vec<u8>)>) -> Self {
        let store = Self::new();
        for (path, content) in objects {
            store.insert(path, content);
        }
        store
    }

    /// Set an object directly, bypassing version checks and the put counter.
    pub fn insert(&self, path: &str, content: Vec<u8>) {
        self.lock().objects.insert(normalize_path(path), content);
    }

    /// Current content of `path`, if any.
    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(&normalize_path(path)).cloned()
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    /// Successful `put` calls against `path` so far.
    pub fn put_count(&self, path: &str) -> usize {
        self.lock()
            .puts
            .get(&normalize_path(path))
            .copied()
            .unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means another test thread panicked mid-write;
        // the map itself is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RemoteObjectStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<StoredObject, StoreError> {
        let key = normalize_path(path);
        let inner = self.lock();
        let content = inner
            .objects
            .get(&key)
            .ok_or(StoreError::NotFound { path: key.clone() })?;
        Ok(StoredObject {
            version: content_version(content),
            content: content.clone(),
        })
    }

    async fn put(
        &self,
        path: &str,
        content: &[u8],
        _message: &str,
        version: Option<&str>,
    ) -> Result<String, StoreError> {
        let key = normalize_path(path);
        if key.is_empty() {
            return Err(StoreError::InvalidRequest {
                path: path.to_string(),
                message: "empty path".to_string(),
            });
        }
        let mut inner = self.lock();
        if let Some(expected) = version {
            let current = inner.objects.get(&key).map(|c| content_version(c));
            if current.as_deref() != Some(expected) {
                return Err(StoreError::Conflict { path: key });
            }
        }
        inner.objects.insert(key.clone(), content.to_vec());
        *inner.puts.entry(key).or_insert(0) += 1;
        Ok(content_version(content))
    }

    async fn delete(&self, path: &str, _message: &str, version: &str) -> Result<(), StoreError> {
        let key = normalize_path(path);
        let mut inner = self.lock();
        let current = inner
            .objects
            .get(&key)
            .map(|c| content_version(c))
            .ok_or(StoreError::NotFound { path: key.clone() })?;
        if current != version {
            return Err(StoreError::Conflict { path: key });
        }
        inner.objects.remove(&key);
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        let dir = normalize_path(path);
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };

        let inner = self.lock();
        let mut children: BTreeMap<String, ObjectInfo> = BTreeMap::new();
        for (key, content) in inner.objects.range(prefix.clone()..) {
            let Some(rest) = key.strip_prefix(&prefix) else {
                break;
            };
            let (name, kind) = match rest.split_once('/') {
                Some((dir_name, _)) => (dir_name, ObjectKind::Dir),
                None => (rest, ObjectKind::File),
            };
            children.entry(name.to_string()).or_insert_with(|| {
                let child_path = format!("{prefix}{name}");
                match kind {
                    ObjectKind::File => ObjectInfo {
                        name: name.to_string(),
                        download_url: Some(format!("memory://{child_path}")),
                        path: child_path,
                        kind,
                        size: content.len() as u64,
                        version: Some(content_version(content)),
                    },
                    ObjectKind::Dir => ObjectInfo {
                        name: name.to_string(),
                        path: child_path,
                        kind,
                        size: 0,
                        version: None,
                        download_url: None,
                    },
                }
            });
        }

        if children.is_empty() && !dir.is_empty() {
            return Err(StoreError::NotFound { path: dir });
        }
        Ok(children.into_values().collect())
    }
}
