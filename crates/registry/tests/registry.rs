//! Registry behavior over in-memory backends.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use formweave_core::{
    ErrorKind, EventBus, EventKind, FieldBuilder, Schema, SchemaBuilder, SecurityConfig,
};
use formweave_eval::BasicUser;
use formweave_registry::{install_global, reset_global, Registry, RegistryConfig};
use formweave_storage::{
    CacheBackend, ListFilter, MemoryCache, MemoryStorage, SchemaMetadata, SchemaStorage, StorageEntry,
    StorageError,
};

fn schema(id: &str, version: &str) -> Schema {
    SchemaBuilder::form(id)
        .version(version)
        .field(FieldBuilder::text("name").label("Name"))
        .must_build()
}

fn recorded_kinds(bus: &EventBus) -> Arc<Mutex<Vec<EventKind>>> {
    let kinds = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&kinds);
    bus.subscribe_all(move |event| {
        sink.lock().unwrap().push(event.kind.clone());
        Ok(())
    });
    kinds
}

fn count(kinds: &Mutex<Vec<EventKind>>, kind: EventKind) -> usize {
    kinds.lock().unwrap().iter().filter(|k| **k == kind).count()
}

/// Delegates to [`MemoryStorage`] and counts document reads, which are slow.
#[derive(Default)]
struct CountingStorage {
    inner: MemoryStorage,
    reads: AtomicUsize,
}

#[async_trait]
impl SchemaStorage for CountingStorage {
    async fn get(&self, id: &str) -> Result<Vec<u8>, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.inner.get(id).await
    }

    async fn set(&self, entry: StorageEntry) -> Result<(), StorageError> {
        self.inner.set(entry).await
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        self.inner.delete(id).await
    }

    async fn exists(&self, id: &str) -> Result<bool, StorageError> {
        self.inner.exists(id).await
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<String>, StorageError> {
        self.inner.list(filter).await
    }

    async fn get_version(&self, id: &str, version: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.get_version(id, version).await
    }

    async fn list_versions(&self, id: &str) -> Result<Vec<String>, StorageError> {
        self.inner.list_versions(id).await
    }

    async fn batch_get(&self, ids: &[String]) -> Result<BTreeMap<String, Vec<u8>>, StorageError> {
        self.inner.batch_get(ids).await
    }

    async fn batch_set(&self, entries: Vec<StorageEntry>) -> Result<(), StorageError> {
        self.inner.batch_set(entries).await
    }

    async fn get_metadata(&self, id: &str) -> Result<SchemaMetadata, StorageError> {
        self.inner.get_metadata(id).await
    }

    async fn health(&self) -> Result<(), StorageError> {
        self.inner.health().await
    }
}

// ── Versions and events ─────────────────────────────────────────────────────

#[tokio::test]
async fn reregistering_updates_and_keeps_history() {
    let bus = Arc::new(EventBus::inline());
    let kinds = recorded_kinds(&bus);
    let registry = Registry::builder(Arc::new(MemoryStorage::new()))
        .bus(Arc::clone(&bus))
        .build();

    registry.register(schema("u", "1")).await.unwrap();
    registry.register(schema("u", "2")).await.unwrap();

    assert_eq!(registry.get("u").await.unwrap().version, "2");
    let versions = registry.list_versions("u").await.unwrap();
    assert!(versions.contains(&"1".to_string()));
    assert!(versions.contains(&"2".to_string()));
    assert_eq!(registry.get_version("u", "1").await.unwrap().version, "1");

    assert_eq!(count(&kinds, EventKind::SchemaRegistered), 1);
    assert_eq!(count(&kinds, EventKind::SchemaUpdated), 1);
    assert_eq!(count(&kinds, EventKind::SchemaAccessed), 1);
    assert_eq!(registry.metrics().schema_count, 1);
}

#[tokio::test]
async fn stored_document_carries_content_hash() {
    let registry = Registry::default();
    let s = schema("u", "1");
    let expected = formweave_interchange::content_hash(&s).unwrap();
    registry.register(s).await.unwrap();
    let meta = registry.get_metadata("u").await.unwrap();
    assert_eq!(meta.checksum.as_deref(), Some(expected.as_str()));
    assert_eq!(meta.version, "1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registers_of_one_id_conflict() {
    let bus = Arc::new(EventBus::inline());
    let kinds = recorded_kinds(&bus);
    let registry = Arc::new(
        Registry::builder(Arc::new(MemoryStorage::new()))
            .bus(Arc::clone(&bus))
            .build(),
    );

    let mut handles = Vec::new();
    for i in 0..10 {
        let r = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            r.register(schema("u", &i.to_string())).await
        }));
    }
    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => succeeded += 1,
            Err(e) => assert_eq!(e.kind, ErrorKind::Conflict, "{e}"),
        }
    }

    assert!(succeeded >= 1);
    assert_eq!(count(&kinds, EventKind::SchemaRegistered), 1);
    assert_eq!(
        count(&kinds, EventKind::SchemaUpdated),
        succeeded - 1,
        "every other successful write is an update"
    );
}

// ── Cache layers ────────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_misses_share_one_storage_read() {
    let storage = Arc::new(CountingStorage::default());
    let registry = Arc::new(Registry::builder(Arc::clone(&storage) as Arc<dyn SchemaStorage>).build());
    registry.register(schema("u", "1")).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let r = Arc::clone(&registry);
        handles.push(tokio::spawn(async move { r.get("u").await }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().id, "u");
    }

    assert_eq!(storage.reads.load(Ordering::SeqCst), 1);
    let m = registry.metrics();
    assert_eq!(m.cache_misses, 1);
    assert_eq!(m.cache_hits, 7);
}

#[tokio::test]
async fn shared_cache_serves_other_instances() {
    let storage = Arc::new(CountingStorage::default());
    let cache = Arc::new(MemoryCache::new());
    let build = || {
        Registry::builder(Arc::clone(&storage) as Arc<dyn SchemaStorage>)
            .cache(Arc::clone(&cache) as Arc<dyn CacheBackend>)
            .build()
    };
    let first = build();
    let second = build();

    first.register(schema("u", "1")).await.unwrap();
    first.get("u").await.unwrap();
    second.get("u").await.unwrap();

    assert_eq!(storage.reads.load(Ordering::SeqCst), 1);
    assert_eq!(second.metrics().cache_hits, 1);

    // A write through one instance invalidates the shared entry.
    first.register(schema("u", "2")).await.unwrap();
    second.invalidate("u").await;
    assert_eq!(second.get("u").await.unwrap().version, "2");
    assert_eq!(storage.reads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn memory_layer_is_bounded() {
    let storage = Arc::new(CountingStorage::default());
    let registry = Registry::builder(Arc::clone(&storage) as Arc<dyn SchemaStorage>)
        .config(RegistryConfig {
            memory_capacity: 1,
            ..RegistryConfig::default()
        })
        .build();
    registry.register(schema("a", "1")).await.unwrap();
    registry.register(schema("b", "1")).await.unwrap();

    registry.get("a").await.unwrap();
    registry.get("b").await.unwrap();
    registry.get("a").await.unwrap();
    assert_eq!(storage.reads.load(Ordering::SeqCst), 3);

    registry.get("a").await.unwrap();
    assert_eq!(storage.reads.load(Ordering::SeqCst), 3);
}

// ── Delete and listing ──────────────────────────────────────────────────────

#[tokio::test]
async fn delete_clears_every_layer() {
    let bus = Arc::new(EventBus::inline());
    let kinds = recorded_kinds(&bus);
    let registry = Registry::builder(Arc::new(MemoryStorage::new()))
        .cache(Arc::new(MemoryCache::new()))
        .bus(Arc::clone(&bus))
        .build();
    registry.register(schema("u", "1")).await.unwrap();
    registry.get("u").await.unwrap();

    registry.delete("u").await.unwrap();
    assert!(!registry.exists("u").await.unwrap());
    assert_eq!(registry.get("u").await.unwrap_err().kind, ErrorKind::NotFound);
    assert!(registry.list_versions("u").await.unwrap().is_empty());
    assert_eq!(registry.delete("u").await.unwrap_err().kind, ErrorKind::NotFound);

    assert_eq!(count(&kinds, EventKind::SchemaDeleted), 1);
    assert_eq!(registry.metrics().schema_count, 0);
    assert_eq!(registry.metrics().operation("delete").count, 2);
}

#[tokio::test]
async fn list_applies_filters() {
    let registry = Registry::default();
    let tagged = |id: &str, tag: &str, tenant: &str| {
        SchemaBuilder::form(id)
            .version("1")
            .tag(tag)
            .tenant(tenant, false)
            .field(FieldBuilder::text("name").label("Name"))
            .must_build()
    };
    registry.register(tagged("billing", "finance", "acme")).await.unwrap();
    registry.register(tagged("contact", "public", "acme")).await.unwrap();
    registry.register(tagged("payroll", "finance", "globex")).await.unwrap();

    let finance = ListFilter {
        tags: vec!["finance".into()],
        ..ListFilter::default()
    };
    let ids: Vec<String> = registry
        .list(&finance)
        .await
        .unwrap()
        .iter()
        .map(|s| s.id.clone())
        .collect();
    assert_eq!(ids, ["billing", "payroll"]);

    let acme_page = ListFilter {
        tenant_id: Some("acme".into()),
        limit: 1,
        offset: 1,
        ..ListFilter::default()
    };
    assert_eq!(registry.list_ids(&acme_page).await.unwrap(), ["contact"]);
}

// ── Access control ──────────────────────────────────────────────────────────

#[tokio::test]
async fn read_permission_checked_before_lookup() {
    let registry = Registry::in_memory(RegistryConfig {
        read_permission: Some("schemas.read".into()),
        ..RegistryConfig::default()
    });
    let anonymous = BasicUser::new("anon");
    let err = registry.get_for_user("missing", &anonymous).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Permission);

    let reader = BasicUser::new("r").permission("schemas.read");
    let err = registry.get_for_user("missing", &reader).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn hidden_schemas_look_missing() {
    let registry = Registry::default();
    let admin_only = SchemaBuilder::form("audit")
        .version("1")
        .security(SecurityConfig {
            required_permission: Some("admin".into()),
            allowed_roles: Vec::new(),
        })
        .field(FieldBuilder::text("name").label("Name"))
        .must_build();
    let isolated = SchemaBuilder::form("acme-intake")
        .version("1")
        .tenant("acme", true)
        .field(FieldBuilder::text("name").label("Name"))
        .must_build();
    registry.register(admin_only).await.unwrap();
    registry.register(isolated).await.unwrap();

    let outsider = BasicUser::new("o").tenant("globex");
    for id in ["audit", "acme-intake"] {
        let err = registry.get_for_user(id, &outsider).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound, "{id}");
    }

    let admin = BasicUser::new("a").permission("admin");
    assert!(registry.get_for_user("audit", &admin).await.is_ok());
    let member = BasicUser::new("m").tenant("acme");
    assert!(registry.get_for_user("acme-intake", &member).await.is_ok());
}

// ── Process-wide default ────────────────────────────────────────────────────

#[test]
fn global_can_be_replaced_and_reset() {
    let mine = Arc::new(Registry::default());
    install_global(Arc::clone(&mine));
    assert!(Arc::ptr_eq(&formweave_registry::global(), &mine));

    reset_global();
    let fresh = formweave_registry::global();
    assert!(!Arc::ptr_eq(&fresh, &mine));
    assert!(Arc::ptr_eq(&fresh, &formweave_registry::global()));
    reset_global();
}
