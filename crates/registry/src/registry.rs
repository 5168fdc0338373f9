use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use formweave_core::{
    cancellable, validate, CancellationToken, ErrorKind, Event, EventBus, EventKind, Schema,
    SchemaError, SchemaErrors, Value,
};
use formweave_eval::{check_access, User};
use formweave_interchange::{content_hash, to_canonical_json, Parser};
use formweave_storage::{
    CacheBackend, IndexFields, ListFilter, MemoryStorage, Precondition, SchemaMetadata,
    SchemaStorage, StorageEntry, StorageError,
};

use crate::config::RegistryConfig;
use crate::lru::Lru;
use crate::metrics::{Metrics, RegistryMetrics};

fn cache_key(id: &str, version: Option<&str>) -> String {
    match version {
        None => format!("schema:{}", id),
        Some(v) => format!("schema:{}:v:{}", id, v),
    }
}

/// How a write treats an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    /// Create or replace.
    Upsert,
    /// Replace only; missing ids are `not_found`.
    Update,
}

// ──────────────────────────────────────────────
// Builder
// ──────────────────────────────────────────────

pub struct RegistryBuilder {
    storage: Arc<dyn SchemaStorage>,
    cache: Option<Arc<dyn CacheBackend>>,
    bus: Option<Arc<EventBus>>,
    parser: Parser,
    config: RegistryConfig,
}

impl RegistryBuilder {
    /// Shared cache consulted between the memory layer and storage.
    pub fn cache(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Parser used to read stored documents back.
    pub fn parser(mut self, parser: Parser) -> Self {
        self.parser = parser;
        self
    }

    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Registry {
        Registry {
            memory: Mutex::new(Lru::new(self.config.memory_capacity)),
            storage: self.storage,
            cache: self.cache,
            bus: self.bus.unwrap_or_default(),
            parser: self.parser,
            config: self.config,
            metrics: Metrics::default(),
            inflight: Mutex::new(HashMap::new()),
            gate: RwLock::new(()),
        }
    }
}

// ──────────────────────────────────────────────
// Registry
// ──────────────────────────────────────────────

/// Named, versioned schema lookup.
///
/// Reads go memory LRU, then the shared cache, then storage, filling the
/// upper layers on the way back. Concurrent misses on the same key share a
/// single storage read. Writes validate, store canonical JSON with its
/// content hash, then invalidate both cache layers.
///
/// Registration is optimistic: the stored checksum is read first and the
/// write is conditional on it. A concurrent register of the same id that
/// lands in between makes the later write fail with `conflict`.
pub struct Registry {
    storage: Arc<dyn SchemaStorage>,
    cache: Option<Arc<dyn CacheBackend>>,
    memory: Mutex<Lru>,
    bus: Arc<EventBus>,
    parser: Parser,
    config: RegistryConfig,
    metrics: Metrics,
    /// Per-key locks that collapse concurrent cache fills.
    inflight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    /// Readers fill caches under `read`; writers invalidate under `write`,
    /// so a fill never reinstates a document a writer just replaced.
    gate: RwLock<()>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("cached", &self.memory().len())
            .field("shared_cache", &self.cache.is_some())
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::in_memory(RegistryConfig::default())
    }
}

impl Registry {
    pub fn builder(storage: Arc<dyn SchemaStorage>) -> RegistryBuilder {
        RegistryBuilder {
            storage,
            cache: None,
            bus: None,
            parser: Parser::default(),
            config: RegistryConfig::default(),
        }
    }

    /// A registry over a fresh [`MemoryStorage`] with no shared cache.
    pub fn in_memory(config: RegistryConfig) -> Self {
        Registry::builder(Arc::new(MemoryStorage::new()))
            .config(config)
            .build()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn metrics(&self) -> RegistryMetrics {
        self.metrics.snapshot()
    }

    fn memory(&self) -> std::sync::MutexGuard<'_, Lru> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, kind: EventKind, id: &str, payload: Value) {
        self.bus.dispatch(Event::new(kind, id).with_payload(payload));
    }

    async fn timed<T, F>(
        &self,
        op: &'static str,
        token: &CancellationToken,
        fut: F,
    ) -> Result<T, SchemaError>
    where
        F: std::future::Future<Output = Result<T, SchemaError>>,
    {
        let start = Instant::now();
        let result = cancellable(token, fut).await;
        self.metrics.record(op, start.elapsed());
        if let Err(e) = &result {
            log::debug!("registry {} failed: {}", op, e);
        }
        result
    }

    // ── Writes ────────────────────────────────────────────────────────────

    /// Store `schema`, creating or replacing it. Emits `schema.registered`
    /// for a new id and `schema.updated` otherwise.
    pub async fn register(&self, schema: Schema) -> Result<(), SchemaError> {
        self.register_with(schema, &CancellationToken::new()).await
    }

    pub async fn register_with(&self, schema: Schema, token: &CancellationToken) -> Result<(), SchemaError> {
        self.timed("register", token, self.write(schema, WriteMode::Upsert))
            .await
    }

    /// Replace an existing schema; `not_found` if the id was never registered.
    pub async fn update(&self, schema: Schema) -> Result<(), SchemaError> {
        self.timed("update", &CancellationToken::new(), self.write(schema, WriteMode::Update))
            .await
    }

    async fn write(&self, schema: Schema, mode: WriteMode) -> Result<(), SchemaError> {
        validate::check(&schema).map_err(SchemaErrors::into_error)?;
        let data = to_canonical_json(&schema)?;
        let checksum = content_hash(&schema)?;

        let previous = match self.storage.get_metadata(&schema.id).await {
            Ok(meta) => Some(meta),
            Err(StorageError::NotFound { .. }) => None,
            Err(e) => return Err(e.into()),
        };
        if previous.is_none() && mode == WriteMode::Update {
            return Err(SchemaError::not_found(format!("schema '{}' is not registered", schema.id))
                .with_code("schema_not_found")
                .with_detail("id", schema.id.clone()));
        }
        let precondition = match &previous {
            None => Precondition::Absent,
            Some(meta) => meta
                .checksum
                .clone()
                .map_or(Precondition::None, Precondition::Checksum),
        };

        let version = version_label(&schema, &checksum);
        let mut entry = StorageEntry::new(schema.id.clone(), version.clone(), data)
            .with_index(index_of(&schema))
            .with_checksum(checksum.clone())
            .with_precondition(precondition);
        if !self.config.versioning {
            entry = entry.unversioned();
        }

        {
            let _gate = self.gate.write().await;
            self.storage.set(entry).await?;
            self.invalidate_keys(&[
                cache_key(&schema.id, None),
                cache_key(&schema.id, Some(&version)),
            ])
            .await;
        }

        let kind = if previous.is_none() {
            self.metrics.schema_added();
            EventKind::SchemaRegistered
        } else {
            EventKind::SchemaUpdated
        };
        log::debug!("{} '{}' version {} ({})", kind, schema.id, version, checksum);
        self.emit(
            kind,
            &schema.id,
            Value::Map(
                [
                    ("version".to_string(), Value::from(version)),
                    ("checksum".to_string(), Value::from(checksum)),
                ]
                .into_iter()
                .collect(),
            ),
        );
        Ok(())
    }

    /// Remove a schema and its history from every layer.
    pub async fn delete(&self, id: &str) -> Result<(), SchemaError> {
        self.timed("delete", &CancellationToken::new(), async {
            let versions = self.storage.list_versions(id).await?;
            {
                let _gate = self.gate.write().await;
                if !self.storage.delete(id).await? {
                    return Err(StorageError::NotFound { id: id.to_string() }.into());
                }
                let mut keys = vec![cache_key(id, None)];
                keys.extend(versions.iter().map(|v| cache_key(id, Some(v))));
                self.memory().remove_prefix(&format!("schema:{}:v:", id));
                self.invalidate_keys(&keys).await;
            }
            self.metrics.schema_removed();
            log::debug!("schema.deleted '{}'", id);
            self.emit(EventKind::SchemaDeleted, id, Value::Null);
            Ok::<(), SchemaError>(())
        })
        .await
    }

    async fn invalidate_keys(&self, keys: &[String]) {
        {
            let mut memory = self.memory();
            for key in keys {
                memory.remove(key);
            }
        }
        if let Some(cache) = &self.cache {
            for key in keys {
                if let Err(e) = cache.delete(key).await {
                    log::warn!("shared cache delete of {} failed: {}", key, e);
                }
            }
        }
    }

    // ── Reads ─────────────────────────────────────────────────────────────

    /// The current document for `id`. Emits `schema.accessed`.
    pub async fn get(&self, id: &str) -> Result<Arc<Schema>, SchemaError> {
        self.get_with(id, &CancellationToken::new()).await
    }

    pub async fn get_with(&self, id: &str, token: &CancellationToken) -> Result<Arc<Schema>, SchemaError> {
        let schema = self.timed("get", token, self.load(id, None)).await?;
        self.emit(
            EventKind::SchemaAccessed,
            id,
            Value::from(schema.version.clone()),
        );
        Ok(schema)
    }

    /// `get`, restricted to what `user` may see.
    ///
    /// Lacking the configured read permission is a `permission` error
    /// before any lookup. A schema whose security or tenant settings
    /// exclude the user is reported as `not_found`, exactly like a missing
    /// one.
    pub async fn get_for_user(&self, id: &str, user: &dyn User) -> Result<Arc<Schema>, SchemaError> {
        if let Some(required) = &self.config.read_permission {
            if !user.has_permission(required) {
                return Err(SchemaError::permission(format!(
                    "permission '{}' required to read schemas",
                    required
                ))
                .with_code("read_denied"));
            }
        }
        let schema = self.get(id).await?;
        if let Err(e) = check_access(&schema, user) {
            log::debug!("hiding '{}' from user '{}': {}", id, user.id(), e);
            return Err(StorageError::NotFound { id: id.to_string() }.into());
        }
        Ok(schema)
    }

    /// One stored version of `id`.
    pub async fn get_version(&self, id: &str, version: &str) -> Result<Arc<Schema>, SchemaError> {
        self.ensure_versioning()?;
        self.timed("get_version", &CancellationToken::new(), self.load(id, Some(version)))
            .await
    }

    /// Version labels of `id` in the order they were first registered.
    pub async fn list_versions(&self, id: &str) -> Result<Vec<String>, SchemaError> {
        self.ensure_versioning()?;
        self.timed("list_versions", &CancellationToken::new(), async {
            Ok::<_, SchemaError>(self.storage.list_versions(id).await?)
        })
        .await
    }

    pub async fn exists(&self, id: &str) -> Result<bool, SchemaError> {
        if self.memory().get(&cache_key(id, None)).is_some() {
            return Ok(true);
        }
        self.timed("exists", &CancellationToken::new(), async {
            Ok::<_, SchemaError>(self.storage.exists(id).await?)
        })
        .await
    }

    /// Ids matching `filter`, ascending.
    pub async fn list_ids(&self, filter: &ListFilter) -> Result<Vec<String>, SchemaError> {
        Ok(self.storage.list(filter).await?)
    }

    /// Schemas matching `filter`, ascending by id. Ids that vanish or fail
    /// to load between listing and reading are skipped.
    pub async fn list(&self, filter: &ListFilter) -> Result<Vec<Arc<Schema>>, SchemaError> {
        self.timed("list", &CancellationToken::new(), async {
            let ids = self.storage.list(filter).await?;
            let mut out = Vec::with_capacity(ids.len());
            for id in ids {
                match self.load(&id, None).await {
                    Ok(schema) => out.push(schema),
                    Err(e) => log::warn!("skipping '{}' in listing: {}", id, e),
                }
            }
            Ok::<_, SchemaError>(out)
        })
        .await
    }

    pub async fn get_metadata(&self, id: &str) -> Result<SchemaMetadata, SchemaError> {
        Ok(self.storage.get_metadata(id).await?)
    }

    pub async fn health(&self) -> Result<(), SchemaError> {
        self.storage.health().await?;
        if let Some(cache) = &self.cache {
            cache.health().await?;
        }
        Ok(())
    }

    /// Empty the memory layer and the shared cache.
    pub async fn clear_cache(&self) -> Result<(), SchemaError> {
        let _gate = self.gate.write().await;
        self.memory().clear();
        if let Some(cache) = &self.cache {
            cache.clear().await?;
        }
        Ok(())
    }

    /// Drop the cached current document of `id`.
    pub async fn invalidate(&self, id: &str) {
        let _gate = self.gate.write().await;
        self.invalidate_keys(&[cache_key(id, None)]).await;
    }

    fn ensure_versioning(&self) -> Result<(), SchemaError> {
        if self.config.versioning {
            Ok(())
        } else {
            Err(SchemaError::new(ErrorKind::Validation, "versioning is disabled")
                .with_code("versioning_disabled"))
        }
    }

    async fn load(&self, id: &str, version: Option<&str>) -> Result<Arc<Schema>, SchemaError> {
        let key = cache_key(id, version);
        let _gate = self.gate.read().await;
        if let Some(schema) = self.memory().get(&key) {
            self.metrics.hit();
            return Ok(schema);
        }

        let flight = Flight::join(&self.inflight, &key);
        let _leader = flight.slot.lock().await;
        // Whoever held the slot before us may have filled the layer.
        if let Some(schema) = self.memory().get(&key) {
            self.metrics.hit();
            return Ok(schema);
        }

        if let Some(schema) = self.from_shared_cache(&key).await {
            self.metrics.hit();
            self.memory().insert(key, Arc::clone(&schema));
            return Ok(schema);
        }

        self.metrics.miss();
        let bytes = match version {
            None => self.storage.get(id).await?,
            Some(v) => self.storage.get_version(id, v).await?,
        };
        let schema = Arc::new(self.parser.parse_json(&bytes)?);
        if let Some(cache) = &self.cache {
            let ttl = Duration::from_secs(self.config.cache_ttl_secs);
            if let Err(e) = cache.set(&key, bytes, ttl).await {
                log::warn!("shared cache fill of {} failed: {}", key, e);
            }
        }
        self.memory().insert(key, Arc::clone(&schema));
        Ok(schema)
    }

    async fn from_shared_cache(&self, key: &str) -> Option<Arc<Schema>> {
        let cache = self.cache.as_ref()?;
        match cache.get(key).await {
            Ok(Some(bytes)) => match self.parser.parse_json(&bytes) {
                Ok(schema) => Some(Arc::new(schema)),
                Err(e) => {
                    log::warn!("discarding unreadable cache entry {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                log::warn!("shared cache read of {} failed: {}", key, e);
                None
            }
        }
    }
}

/// Membership in the set of callers filling one cache key. The slot is
/// dropped from the map when its creator finishes.
struct Flight<'a> {
    map: &'a Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    key: String,
    slot: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> Flight<'a> {
    fn join(map: &'a Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>, key: &str) -> Self {
        let slot = Arc::clone(
            map.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(key.to_string())
                .or_default(),
        );
        Flight {
            map,
            key: key.to_string(),
            slot,
        }
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        if map.get(&self.key).is_some_and(|s| Arc::ptr_eq(s, &self.slot)) {
            map.remove(&self.key);
        }
    }
}

fn index_of(schema: &Schema) -> IndexFields {
    IndexFields {
        schema_type: Some(schema.schema_type.as_str().to_string()),
        category: schema.category.clone(),
        module: schema.module.clone(),
        tags: schema.tags.clone(),
        tenant_id: schema.tenant_id().map(str::to_string),
    }
}

/// The schema's own version, or a content-derived label when it has none.
fn version_label(schema: &Schema, checksum: &str) -> String {
    if schema.version.trim().is_empty() {
        format!("sha-{}", &checksum[..checksum.len().min(12)])
    } else {
        schema.version.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formweave_core::{FieldBuilder, SchemaBuilder};

    fn schema(id: &str, version: &str) -> Schema {
        SchemaBuilder::form(id)
            .version(version)
            .field(FieldBuilder::text("name").label("Name"))
            .must_build()
    }

    #[test]
    fn cache_keys_separate_versions() {
        assert_eq!(cache_key("u", None), "schema:u");
        assert_eq!(cache_key("u", Some("2")), "schema:u:v:2");
    }

    #[test]
    fn unversioned_schema_gets_content_label() {
        let s = schema("u", "");
        let label = version_label(&s, "0123456789abcdef");
        assert_eq!(label, "sha-0123456789ab");
        assert_eq!(version_label(&schema("u", "7"), "ff"), "7");
    }

    #[tokio::test]
    async fn second_read_hits_memory() {
        let registry = Registry::default();
        registry.register(schema("u", "1")).await.unwrap();
        registry.get("u").await.unwrap();
        registry.get("u").await.unwrap();

        let m = registry.metrics();
        assert_eq!(m.cache_misses, 1);
        assert_eq!(m.cache_hits, 1);
        assert_eq!(m.schema_count, 1);
        assert_eq!(m.operation("get").count, 2);
    }

    #[tokio::test]
    async fn invalid_schema_is_rejected_before_storage() {
        let registry = Registry::default();
        let mut bad = schema("u", "1");
        bad.fields[0].label.clear();
        let err = registry.register(bad).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(!registry.exists("u").await.unwrap());
    }

    #[tokio::test]
    async fn update_requires_existing_schema() {
        let registry = Registry::default();
        let err = registry.update(schema("u", "1")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        registry.register(schema("u", "1")).await.unwrap();
        registry.update(schema("u", "2")).await.unwrap();
        assert_eq!(registry.get("u").await.unwrap().version, "2");
    }

    #[tokio::test]
    async fn versioning_can_be_disabled() {
        let registry = Registry::in_memory(RegistryConfig {
            versioning: false,
            ..RegistryConfig::default()
        });
        registry.register(schema("u", "1")).await.unwrap();
        let err = registry.list_versions("u").await.unwrap_err();
        assert_eq!(err.code, "versioning_disabled");
    }

    #[tokio::test]
    async fn cancelled_get_returns_cancelled() {
        let registry = Registry::default();
        registry.register(schema("u", "1")).await.unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let err = registry.get_with("u", &token).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
