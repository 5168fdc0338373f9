use std::future::Future;

use super::{make_entry, TestResult};
use crate::SchemaStorage;

pub(super) async fn run_basic_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "basic",
            "set_then_get_returns_bytes",
            set_then_get_returns_bytes(factory).await,
        ),
        TestResult::from_result(
            "basic",
            "set_overwrites_current_document",
            set_overwrites_current_document(factory).await,
        ),
        TestResult::from_result(
            "basic",
            "exists_tracks_set_and_delete",
            exists_tracks_set_and_delete(factory).await,
        ),
        TestResult::from_result(
            "basic",
            "delete_reports_whether_present",
            delete_reports_whether_present(factory).await,
        ),
        TestResult::from_result(
            "basic",
            "metadata_reflects_latest_write",
            metadata_reflects_latest_write(factory).await,
        ),
        TestResult::from_result("basic", "health_ok", health_ok(factory).await),
    ]
}

async fn set_then_get_returns_bytes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let entry = make_entry("contact", "1");
    let expected = entry.data.clone();
    s.set(entry).await.map_err(|e| format!("set: {e}"))?;
    let got = s.get("contact").await.map_err(|e| format!("get: {e}"))?;
    if got != expected {
        return Err(format!("expected {:?}, got {:?}", expected, got));
    }
    Ok(())
}

async fn set_overwrites_current_document<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.set(make_entry("contact", "1"))
        .await
        .map_err(|e| format!("set v1: {e}"))?;
    let second = make_entry("contact", "2");
    let expected = second.data.clone();
    s.set(second).await.map_err(|e| format!("set v2: {e}"))?;
    let got = s.get("contact").await.map_err(|e| format!("get: {e}"))?;
    if got != expected {
        return Err("current document is not the latest write".to_string());
    }
    Ok(())
}

async fn exists_tracks_set_and_delete<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    if s.exists("contact").await.map_err(|e| format!("exists: {e}"))? {
        return Err("empty store reports contact as existing".to_string());
    }
    s.set(make_entry("contact", "1"))
        .await
        .map_err(|e| format!("set: {e}"))?;
    if !s.exists("contact").await.map_err(|e| format!("exists: {e}"))? {
        return Err("contact missing after set".to_string());
    }
    s.delete("contact").await.map_err(|e| format!("delete: {e}"))?;
    if s.exists("contact").await.map_err(|e| format!("exists: {e}"))? {
        return Err("contact still exists after delete".to_string());
    }
    Ok(())
}

async fn delete_reports_whether_present<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.set(make_entry("contact", "1"))
        .await
        .map_err(|e| format!("set: {e}"))?;
    let first = s.delete("contact").await.map_err(|e| format!("delete: {e}"))?;
    let second = s.delete("contact").await.map_err(|e| format!("delete again: {e}"))?;
    if !first || second {
        return Err(format!("expected (true, false), got ({first}, {second})"));
    }
    let versions = s
        .list_versions("contact")
        .await
        .map_err(|e| format!("list_versions: {e}"))?;
    if !versions.is_empty() {
        return Err(format!("history survived delete: {:?}", versions));
    }
    Ok(())
}

async fn metadata_reflects_latest_write<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.set(make_entry("contact", "1"))
        .await
        .map_err(|e| format!("set v1: {e}"))?;
    let second = make_entry("contact", "2");
    let size = second.data.len() as u64;
    s.set(second).await.map_err(|e| format!("set v2: {e}"))?;
    let meta = s
        .get_metadata("contact")
        .await
        .map_err(|e| format!("get_metadata: {e}"))?;
    if meta.id != "contact" || meta.version != "2" {
        return Err(format!("wrong identity in metadata: {}@{}", meta.id, meta.version));
    }
    if meta.size != size {
        return Err(format!("expected size {size}, got {}", meta.size));
    }
    if meta.checksum.as_deref() != Some("contact@2") {
        return Err(format!("expected checksum contact@2, got {:?}", meta.checksum));
    }
    if meta.created_at.is_empty() || meta.updated_at.is_empty() {
        return Err("timestamps not recorded".to_string());
    }
    Ok(())
}

async fn health_ok<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.health().await.map_err(|e| format!("health: {e}"))
}
