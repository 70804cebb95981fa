//! Directory-backed object store.
//!
//! Maps store paths onto files below a root directory. This is what the CLI
//! operates on: a local checkout of the gallery repository. Version tokens
//! are content hashes, exactly as with the remote API, so a checkout edited
//! by hand between two CLI runs is detected as a conflict.

use super::{
    ObjectInfo, ObjectKind, RemoteObjectStore, StoreError, StoredObject, content_version,
    normalize_path,
};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

pub struct DirStore {
    root: PathBuf,
    // Serialises check-then-write within this process.
    write_lock: Mutex<()>,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<(String, PathBuf), StoreError> {
        let key = normalize_path(path);
        if key.split('/').any(|seg| seg == ".." || seg == ".") {
            return Err(StoreError::InvalidRequest {
                path: path.to_string(),
                message: "relative segments are not allowed".to_string(),
            });
        }
        let full = key.split('/').fold(self.root.clone(), |acc, seg| acc.join(seg));
        Ok((key, full))
    }

    async fn current_version(&self, key: &str, full: &Path) -> Result<Option<String>, StoreError> {
        match tokio::fs::read(full).await {
            Ok(bytes) => Ok(Some(content_version(&bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(map_io(key, e)),
        }
    }
}

fn map_io(path: &str, err: std::io::Error) -> StoreError {
    match err.kind() {
        ErrorKind::NotFound => StoreError::NotFound {
            path: path.to_string(),
        },
        ErrorKind::PermissionDenied => StoreError::PermissionDenied {
            path: path.to_string(),
            message: err.to_string(),
        },
        _ => StoreError::Io {
            path: path.to_string(),
            message: err.to_string(),
        },
    }
}

#[async_trait]
impl RemoteObjectStore for DirStore {
    async fn get(&self, path: &str) -> Result<StoredObject, StoreError> {
        let (key, full) = self.resolve(path)?;
        if full.is_dir() {
            return Err(StoreError::InvalidRequest {
                path: key,
                message: "is a directory".to_string(),
            });
        }
        let content = tokio::fs::read(&full).await.map_err(|e| map_io(&key, e))?;
        Ok(StoredObject {
            version: content_version(&content),
            content,
        })
    }

    async fn put(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        version: Option<&str>,
    ) -> Result<String, StoreError> {
        let (key, full) = self.resolve(path)?;
        if key.is_empty() {
            return Err(StoreError::InvalidRequest {
                path: path.to_string(),
                message: "empty path".to_string(),
            });
        }

        let _guard = self.write_lock.lock().await;
        if let Some(expected) = version
            && self.current_version(&key, &full).await?.as_deref() != Some(expected)
        {
            return Err(StoreError::Conflict { path: key });
        }
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io(&key, e))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| map_io(&key, e))?;
        debug!(path = %key, bytes = content.len(), commit = message, "wrote object");
        Ok(content_version(content))
    }

    async fn delete(&self, path: &str, message: &str, version: &str) -> Result<(), StoreError> {
        let (key, full) = self.resolve(path)?;
        let _guard = self.write_lock.lock().await;
        match self.current_version(&key, &full).await? {
            None => return Err(StoreError::NotFound { path: key }),
            Some(current) if current != version => return Err(StoreError::Conflict { path: key }),
            Some(_) => {}
        }
        tokio::fs::remove_file(&full)
            .await
            .map_err(|e| map_io(&key, e))?;
        debug!(path = %key, commit = message, "deleted object");
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        let (key, full) = self.resolve(path)?;
        let mut dir = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| map_io(&key, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| map_io(&key, e))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let child = if key.is_empty() {
                name.clone()
            } else {
                format!("{key}/{name}")
            };
            let file_type = entry.file_type().await.map_err(|e| map_io(&child, e))?;
            if file_type.is_dir() {
                entries.push(ObjectInfo {
                    name,
                    path: child,
                    kind: ObjectKind::Dir,
                    size: 0,
                    version: None,
                    download_url: None,
                });
            } else if file_type.is_file() {
                let content = tokio::fs::read(entry.path())
                    .await
                    .map_err(|e| map_io(&child, e))?;
                entries.push(ObjectInfo {
                    name,
                    download_url: Some(format!("file://{}", entry.path().display())),
                    path: child,
                    kind: ObjectKind::File,
                    size: content.len() as u64,
                    version: Some(content_version(&content)),
                });
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
