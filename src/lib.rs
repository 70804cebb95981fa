//! # Gallery Admin
//!
//! Image ingestion and manifest consistency for a media gallery whose
//! content lives in a repository behind a file-hosting API. Assets are image
//! files under `images/<category-folder>/`. The gallery itself is one JSON
//! manifest (`data/gallery.json`) listing every entry.
//!
//! # Architecture: Two Resources, One Record
//!
//! Every upload touches two remote resources that cannot be written
//! atomically together:
//!
//! ```text
//! raw file ─▶ validate ─▶ analyze ─▶ optimize? ─▶ put asset ─▶ add manifest entry
//!                                                    │               │
//!                                          Upload error     PartialSuccess
//!                                          (no entry)       (asset orphaned)
//! ```
//!
//! The asset is always written first, so a failure never leaves an entry
//! pointing at a missing file. An orphaned asset is reported by path and has
//! to be added to the manifest again, or deleted, by hand.
//!
//! Manifest writes are optimistic: each save sends the version token the
//! manifest was read at. When another writer got there first the store
//! answers with a conflict, and the mutation is replayed against a fresh copy.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Dimension math, backend trait, `image`-crate backend, optimize/thumbnail/analyze |
//! | [`store`] | `RemoteObjectStore` trait with directory and in-memory implementations |
//! | [`manifest`] | Gallery manifest document, entries, categories, validation |
//! | [`manifest_store`] | Versioned load/save with conflict retry, reconcile, src rewrites |
//! | [`ingest`] | Upload validation, naming, optimize-then-upload-then-record pipeline |
//! | [`batch`] | Concurrent batches with progress, bulk ingest, optimize-existing |
//! | [`naming`] | Sanitized unique filenames and display titles |
//! | [`config`] | `gallery-admin.toml` loading, merging, and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Store Behind a Trait
//!
//! All remote I/O goes through [`store::RemoteObjectStore`]: get, put with an
//! optional version, delete, list. The CLI runs against a local checkout via
//! [`store::DirStore`]; tests use [`store::MemoryStore`], which applies the
//! same version rules. Version tokens are content hashes, so a file edited by
//! hand between two runs is detected just like a concurrent API writer.
//!
//! ## Format Negotiation
//!
//! WebP is preferred. If the host cannot encode the configured format, the
//! codec falls back through webp → jpeg → png and reports which one it used;
//! the stored filename always carries the matching extension.
//!
//! ## Working Copy Holds Confirmed State Only
//!
//! [`manifest_store::ManifestStore`] keeps the last manifest the store
//! confirmed. Mutations are applied to a clone and only replace the working
//! copy once the write succeeds, so a failed save needs no rollback.

pub mod batch;
pub mod config;
pub mod imaging;
pub mod ingest;
pub mod manifest;
pub mod manifest_store;
pub mod naming;
pub mod output;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;
