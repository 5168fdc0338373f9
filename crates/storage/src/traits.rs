use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{ListFilter, SchemaMetadata, StorageEntry};

/// Durable byte-level storage for schema documents.
///
/// Documents are opaque bytes keyed by schema id. A write replaces the
/// current document and, when the entry asks for it, also files the
/// document in the id's version history under its version label.
///
/// ## Preconditions
///
/// `set` honours [`Precondition`](crate::Precondition): `Absent` fails with
/// `StorageError::Conflict` if anything is stored under the id, and
/// `Checksum` fails unless the stored checksum matches. The check and the
/// write must be atomic with respect to other writers.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so a registry can share
/// one backend across tasks.
#[async_trait]
pub trait SchemaStorage: Send + Sync + 'static {
    // ── Single documents ──────────────────────────────────────────────────────

    /// Read the current document.
    ///
    /// Returns `Err(StorageError::NotFound)` if nothing is stored under `id`.
    async fn get(&self, id: &str) -> Result<Vec<u8>, StorageError>;

    /// Write the current document for `entry.id`.
    async fn set(&self, entry: StorageEntry) -> Result<(), StorageError>;

    /// Remove the document, its history and its metadata.
    ///
    /// Returns whether anything was stored.
    async fn delete(&self, id: &str) -> Result<bool, StorageError>;

    async fn exists(&self, id: &str) -> Result<bool, StorageError>;

    // ── Listing ───────────────────────────────────────────────────────────────

    /// Ids matching `filter`, in ascending order, paged by offset and limit.
    async fn list(&self, filter: &ListFilter) -> Result<Vec<String>, StorageError>;

    // ── Versions ──────────────────────────────────────────────────────────────

    /// Read one version from the history.
    ///
    /// Returns `Err(StorageError::VersionNotFound)` if the id has no such version.
    async fn get_version(&self, id: &str, version: &str) -> Result<Vec<u8>, StorageError>;

    /// Version labels in the order they were first written. Empty for an
    /// unknown id.
    async fn list_versions(&self, id: &str) -> Result<Vec<String>, StorageError>;

    // ── Batches ───────────────────────────────────────────────────────────────

    /// Read several documents; ids with nothing stored are left out.
    async fn batch_get(&self, ids: &[String]) -> Result<BTreeMap<String, Vec<u8>>, StorageError>;

    /// Write several documents. Either every precondition holds and all are
    /// written, or nothing is written.
    async fn batch_set(&self, entries: Vec<StorageEntry>) -> Result<(), StorageError>;

    // ── Metadata and health ───────────────────────────────────────────────────

    /// Returns `Err(StorageError::NotFound)` if nothing is stored under `id`.
    async fn get_metadata(&self, id: &str) -> Result<SchemaMetadata, StorageError>;

    async fn health(&self) -> Result<(), StorageError>;
}

/// A byte cache with per-entry time to live, shared between registry
/// instances.
#[async_trait]
pub trait CacheBackend: Send + Sync + 'static {
    /// `Ok(None)` on a miss or an expired entry.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store `value` for `ttl`. A zero `ttl` never expires.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    async fn clear(&self) -> Result<(), StorageError>;

    async fn health(&self) -> Result<(), StorageError>;
}
