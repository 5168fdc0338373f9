//! The in-memory backend against the shared conformance suite.

use formweave_storage::conformance::run_conformance_suite;
use formweave_storage::MemoryStorage;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn memory_storage_conforms() {
    let report = run_conformance_suite(|| async { MemoryStorage::new() }).await;
    assert_eq!(report.failed, 0, "{report}");
    assert!(report.total >= 25, "suite shrank to {} tests", report.total);
}

#[tokio::test]
async fn report_lists_failures() {
    let report = run_conformance_suite(|| async { MemoryStorage::new() }).await;
    let text = report.to_string();
    assert!(text.starts_with("Conformance: "));
    assert!(!text.contains("FAIL"));
    let categories: std::collections::BTreeSet<&str> =
        report.results.iter().map(|r| r.category.as_str()).collect();
    assert_eq!(
        categories.into_iter().collect::<Vec<_>>(),
        ["basic", "batch", "concurrent", "error", "list", "versions"]
    );
}
