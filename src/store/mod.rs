//! Remote object storage interface.
//!
//! The gallery's files and manifest live in a repository reached through a
//! file-hosting API. Everything above this module talks to it through
//! [`RemoteObjectStore`]: path-keyed blobs with a version token per object
//! for optimistic concurrency.
//!
//! Version tokens are the SHA-256 of the stored content ([`content_version`]),
//! so two writers that saw the same bytes hold the same token, and any write
//! in between invalidates both.
//!
//! Implementations:
//! - [`MemoryStore`](memory::MemoryStore): in-process map, for tests and dry runs
//! - [`DirStore`](fs::DirStore): a local directory, used by the CLI

pub mod fs;
pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use fs::DirStore;
pub use memory::MemoryStore;

/// Errors reported by a [`RemoteObjectStore`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Object not found: {path}")]
    NotFound { path: String },

    /// The supplied version token is stale (or the object vanished).
    #[error("Version conflict on {path}")]
    Conflict { path: String },

    #[error("Permission denied for {path}: {message}")]
    PermissionDenied { path: String, message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Invalid request for {path}: {message}")]
    InvalidRequest { path: String, message: String },

    #[error("I/O error for {path}: {message}")]
    Io { path: String, message: String },
}

impl StoreError {
    /// Transient failures worth another attempt later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Network { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Content plus the version token needed to overwrite or delete it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub content: Vec<u8>,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    File,
    Dir,
}

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    pub size: u64,
    pub version: Option<String>,
    pub download_url: Option<String>,
}

impl ObjectInfo {
    pub fn is_file(&self) -> bool {
        self.kind == ObjectKind::File
    }
}

/// Path-keyed blob storage with per-object version tokens.
#[async_trait]
pub trait RemoteObjectStore: Send + Sync {
    /// Fetch content and version. [`StoreError::NotFound`] if absent.
    async fn get(&self, path: &str) -> Result<StoredObject, StoreError>;

    /// Write `content` at `path`, returning the new version token.
    ///
    /// Without `version` the write creates or overwrites unconditionally.
    /// With `version`, the object must exist at exactly that version or the
    /// write fails with [`StoreError::Conflict`].
    async fn put(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        version: Option<&str>,
    ) -> Result<String, StoreError>;

    /// Delete `path` if it is still at `version`.
    async fn delete(&self, path: &str, message: &str, version: &str) -> Result<(), StoreError>;

    /// Direct children of a directory path. [`StoreError::NotFound`] if absent.
    async fn list(&self, path: &str) -> Result<Vec<ObjectInfo>, StoreError>;

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        match self.get(path).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// SHA-256 of `content` as a hex string; the version token for that content.
pub fn content_version(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

/// Join store path segments with `/`, ignoring empty segments and stray slashes.
pub fn join_path(base: &str, child: &str) -> String {
    let base = base.trim_matches('/');
    let child = child.trim_matches('/');
    match (base.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{base}/{child}"),
    }
}

/// Normalize a store path: no leading/trailing slash, no empty segments.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
