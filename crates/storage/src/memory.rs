//! In-process backends.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use formweave_core::events::now_rfc3339;

use crate::error::StorageError;
use crate::record::{ListFilter, Precondition, SchemaMetadata, StorageEntry};
use crate::traits::{CacheBackend, SchemaStorage};

// ── Storage ──────────────────────────────────────────────────────────────────

struct Stored {
    data: Vec<u8>,
    meta: SchemaMetadata,
    /// (version label, document) in first-written order.
    history: Vec<(String, Vec<u8>)>,
}

/// [`SchemaStorage`] held in a map. Everything is lost on drop.
#[derive(Default)]
pub struct MemoryStorage {
    docs: RwLock<BTreeMap<String, Stored>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn check(docs: &BTreeMap<String, Stored>, entry: &StorageEntry) -> Result<(), StorageError> {
    let current = docs.get(&entry.id);
    match (&entry.precondition, current) {
        (Precondition::None, _) => Ok(()),
        (Precondition::Absent, None) => Ok(()),
        (Precondition::Absent, Some(_)) => Err(StorageError::Conflict {
            id: entry.id.clone(),
            reason: "already exists".to_string(),
        }),
        (Precondition::Checksum(want), Some(stored)) if stored.meta.checksum.as_ref() == Some(want) => Ok(()),
        (Precondition::Checksum(want), _) => Err(StorageError::Conflict {
            id: entry.id.clone(),
            reason: format!("expected checksum {}", want),
        }),
    }
}

fn apply(docs: &mut BTreeMap<String, Stored>, entry: StorageEntry, now: &str) {
    let size = entry.data.len() as u64;
    let stored = docs.entry(entry.id.clone()).or_insert_with(|| Stored {
        data: Vec::new(),
        meta: SchemaMetadata {
            id: entry.id.clone(),
            version: String::new(),
            index: Default::default(),
            size: 0,
            checksum: None,
            created_at: now.to_string(),
            updated_at: now.to_string(),
            access_count: 0,
            last_access: None,
        },
        history: Vec::new(),
    });

    if entry.versioned {
        match stored.history.iter_mut().find(|(v, _)| *v == entry.version) {
            Some((_, data)) => data.clone_from(&entry.data),
            None => stored.history.push((entry.version.clone(), entry.data.clone())),
        }
    }
    stored.meta.version = entry.version;
    stored.meta.index = entry.index;
    stored.meta.size = size;
    stored.meta.checksum = entry.checksum;
    stored.meta.updated_at = now.to_string();
    stored.data = entry.data;
}

#[async_trait]
impl SchemaStorage for MemoryStorage {
    async fn get(&self, id: &str) -> Result<Vec<u8>, StorageError> {
        let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
        let stored = docs
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })?;
        stored.meta.access_count += 1;
        stored.meta.last_access = Some(now_rfc3339());
        Ok(stored.data.clone())
    }

    async fn set(&self, entry: StorageEntry) -> Result<(), StorageError> {
        let now = now_rfc3339();
        let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
        check(&docs, &entry)?;
        apply(&mut docs, entry, &now);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self
            .docs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some())
    }

    async fn exists(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self
            .docs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id))
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<String>, StorageError> {
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        let ids = docs
            .iter()
            .filter(|(_, s)| filter.matches(&s.meta.index))
            .map(|(id, _)| id.clone())
            .collect();
        Ok(filter.page(ids))
    }

    async fn get_version(&self, id: &str, version: &str) -> Result<Vec<u8>, StorageError> {
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        docs.get(id)
            .and_then(|s| s.history.iter().find(|(v, _)| v == version))
            .map(|(_, data)| data.clone())
            .ok_or_else(|| StorageError::VersionNotFound {
                id: id.to_string(),
                version: version.to_string(),
            })
    }

    async fn list_versions(&self, id: &str) -> Result<Vec<String>, StorageError> {
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(docs
            .get(id)
            .map(|s| s.history.iter().map(|(v, _)| v.clone()).collect())
            .unwrap_or_default())
    }

    async fn batch_get(&self, ids: &[String]) -> Result<BTreeMap<String, Vec<u8>>, StorageError> {
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(ids
            .iter()
            .filter_map(|id| docs.get(id).map(|s| (id.clone(), s.data.clone())))
            .collect())
    }

    async fn batch_set(&self, entries: Vec<StorageEntry>) -> Result<(), StorageError> {
        let now = now_rfc3339();
        let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
        for entry in &entries {
            check(&docs, entry)?;
        }
        for entry in entries {
            apply(&mut docs, entry, &now);
        }
        Ok(())
    }

    async fn get_metadata(&self, id: &str) -> Result<SchemaMetadata, StorageError> {
        self.docs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|s| s.meta.clone())
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })
    }

    async fn health(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

// ── Cache ────────────────────────────────────────────────────────────────────

/// [`CacheBackend`] held in a map, with expiry checked on read.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Vec<u8>, Option<Instant>)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries currently held, expired ones included until next read.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = match entries.get(key) {
            None => return Ok(None),
            Some((_, Some(deadline))) => Instant::now() >= *deadline,
            Some((_, None)) => false,
        };
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|(v, _)| v.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StorageError> {
        let deadline = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), (value, deadline));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    async fn health(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
