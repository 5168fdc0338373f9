//! Conformance test suite for `SchemaStorage` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `SchemaStorage` implementation can run to verify correctness. The suite
//! covers:
//!
//! - **Basic**: get/set/delete/exists round trips and metadata
//! - **Versions**: history kept per version label, unversioned writes
//! - **List**: filtering by type, tags, tenant and paging
//! - **Batch**: multi-document reads and all-or-nothing writes
//! - **Error handling**: correct error variants for missing documents
//! - **Concurrency**: create-if-absent races have exactly one winner
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use formweave_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn redis_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_redis_storage().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod basic;
mod batch;
mod concurrent;
mod error;
mod list;
mod versions;

use std::fmt;
use std::future::Future;

use crate::record::{IndexFields, StorageEntry};
use crate::SchemaStorage;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "basic", "versions", "list").
    pub category: String,
    /// Test name (e.g. "set_then_get_returns_bytes").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(basic::run_basic_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(versions::run_version_tests(&factory).await);
    results.extend(list::run_list_tests(&factory).await);
    results.extend(batch::run_batch_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();
    log::debug!("storage conformance: {}/{} passed", passed, total);

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: entry constructors with sensible defaults ───────────────────────

fn make_entry(id: &str, version: &str) -> StorageEntry {
    let body = format!(r#"{{"id":"{}","version":"{}"}}"#, id, version);
    StorageEntry::new(id, version, body.into_bytes()).with_checksum(format!("{}@{}", id, version))
}

fn make_indexed_entry(id: &str, schema_type: &str, tags: &[&str], tenant: Option<&str>) -> StorageEntry {
    make_entry(id, "1").with_index(IndexFields {
        schema_type: Some(schema_type.to_string()),
        category: None,
        module: None,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        tenant_id: tenant.map(String::from),
    })
}
