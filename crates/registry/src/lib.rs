//! formweave-registry: named, versioned schema lookup.
//!
//! [`Registry`] layers a bounded in-process LRU and an optional shared
//! [`CacheBackend`](formweave_storage::CacheBackend) over a durable
//! [`SchemaStorage`](formweave_storage::SchemaStorage). It records
//! [`RegistryMetrics`] and publishes `schema.*` events on its
//! [`EventBus`](formweave_core::EventBus).
//!
//! # Process-wide default
//!
//! [`global`] returns a shared registry, creating an in-memory one with
//! [`RegistryConfig::default`] on first use. [`install_global`] replaces it
//! (returning the previous instance) and [`reset_global`] drops it. Code
//! that can take a registry as a parameter should.

mod config;
mod lru;
mod metrics;
mod registry;

use std::sync::{Arc, PoisonError, RwLock};

pub use config::RegistryConfig;
pub use metrics::{OperationStats, RegistryMetrics};
pub use registry::{Registry, RegistryBuilder};

static GLOBAL: RwLock<Option<Arc<Registry>>> = RwLock::new(None);

/// The process-wide registry, created in memory on first use.
pub fn global() -> Arc<Registry> {
    if let Some(r) = GLOBAL.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
        return Arc::clone(r);
    }
    let mut slot = GLOBAL.write().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(slot.get_or_insert_with(|| Arc::new(Registry::default())))
}

/// Replace the process-wide registry, returning the previous one.
pub fn install_global(registry: Arc<Registry>) -> Option<Arc<Registry>> {
    GLOBAL
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(registry)
}

/// Drop the process-wide registry.
pub fn reset_global() {
    GLOBAL.write().unwrap_or_else(PoisonError::into_inner).take();
}
