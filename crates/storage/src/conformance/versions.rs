use std::future::Future;

use super::{make_entry, TestResult};
use crate::SchemaStorage;

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "versions",
            "versions_listed_in_write_order",
            versions_listed_in_write_order(factory).await,
        ),
        TestResult::from_result(
            "versions",
            "old_version_still_readable",
            old_version_still_readable(factory).await,
        ),
        TestResult::from_result(
            "versions",
            "rewriting_label_replaces_history_entry",
            rewriting_label_replaces_history_entry(factory).await,
        ),
        TestResult::from_result(
            "versions",
            "unversioned_write_skips_history",
            unversioned_write_skips_history(factory).await,
        ),
        TestResult::from_result(
            "versions",
            "unknown_id_has_no_versions",
            unknown_id_has_no_versions(factory).await,
        ),
    ]
}

async fn versions_listed_in_write_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for v in ["1", "2", "10"] {
        s.set(make_entry("contact", v))
            .await
            .map_err(|e| format!("set {v}: {e}"))?;
    }
    let versions = s
        .list_versions("contact")
        .await
        .map_err(|e| format!("list_versions: {e}"))?;
    if versions != ["1", "2", "10"] {
        return Err(format!("expected [1, 2, 10], got {:?}", versions));
    }
    Ok(())
}

async fn old_version_still_readable<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let first = make_entry("contact", "1");
    let expected = first.data.clone();
    s.set(first).await.map_err(|e| format!("set v1: {e}"))?;
    s.set(make_entry("contact", "2"))
        .await
        .map_err(|e| format!("set v2: {e}"))?;
    let got = s
        .get_version("contact", "1")
        .await
        .map_err(|e| format!("get_version: {e}"))?;
    if got != expected {
        return Err("version 1 bytes changed after writing version 2".to_string());
    }
    Ok(())
}

async fn rewriting_label_replaces_history_entry<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.set(make_entry("contact", "1"))
        .await
        .map_err(|e| format!("set: {e}"))?;
    let mut again = make_entry("contact", "1");
    again.data = b"{\"patched\":true}".to_vec();
    let expected = again.data.clone();
    s.set(again).await.map_err(|e| format!("set again: {e}"))?;

    let versions = s
        .list_versions("contact")
        .await
        .map_err(|e| format!("list_versions: {e}"))?;
    if versions != ["1"] {
        return Err(format!("expected a single version, got {:?}", versions));
    }
    let got = s
        .get_version("contact", "1")
        .await
        .map_err(|e| format!("get_version: {e}"))?;
    if got != expected {
        return Err("history entry not replaced".to_string());
    }
    Ok(())
}

async fn unversioned_write_skips_history<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.set(make_entry("contact", "1").unversioned())
        .await
        .map_err(|e| format!("set: {e}"))?;
    let versions = s
        .list_versions("contact")
        .await
        .map_err(|e| format!("list_versions: {e}"))?;
    if !versions.is_empty() {
        return Err(format!("expected no history, got {:?}", versions));
    }
    if !s.exists("contact").await.map_err(|e| format!("exists: {e}"))? {
        return Err("unversioned write not stored".to_string());
    }
    Ok(())
}

async fn unknown_id_has_no_versions<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let versions = s
        .list_versions("missing")
        .await
        .map_err(|e| format!("list_versions: {e}"))?;
    if !versions.is_empty() {
        return Err(format!("expected empty, got {:?}", versions));
    }
    Ok(())
}
