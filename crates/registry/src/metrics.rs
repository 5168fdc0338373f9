//! Registry counters.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;

/// Count and cumulative time of one registry operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OperationStats {
    pub count: u64,
    pub total: Duration,
}

impl OperationStats {
    pub fn average(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total / self.count as u32
        }
    }
}

/// Point-in-time copy of the registry counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegistryMetrics {
    pub schema_count: i64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub operations: BTreeMap<String, OperationStats>,
}

impl RegistryMetrics {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    pub fn operation(&self, name: &str) -> OperationStats {
        self.operations.get(name).copied().unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub(crate) struct Metrics {
    schema_count: AtomicI64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    operations: Mutex<BTreeMap<&'static str, OperationStats>>,
}

impl Metrics {
    pub(crate) fn schema_added(&self) {
        self.schema_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn schema_removed(&self) {
        self.schema_count.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record(&self, op: &'static str, elapsed: Duration) {
        let mut ops = self.operations.lock().unwrap_or_else(PoisonError::into_inner);
        let stats = ops.entry(op).or_default();
        stats.count += 1;
        stats.total += elapsed;
    }

    pub(crate) fn snapshot(&self) -> RegistryMetrics {
        let operations = self
            .operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        RegistryMetrics {
            schema_count: self.schema_count.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            operations,
        }
    }
}
