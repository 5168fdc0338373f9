use std::future::Future;

use super::{make_entry, TestResult};
use crate::{StorageError, SchemaStorage};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result("error", "get_nonexistent", get_nonexistent(factory).await),
        TestResult::from_result(
            "error",
            "get_metadata_nonexistent",
            get_metadata_nonexistent(factory).await,
        ),
        TestResult::from_result(
            "error",
            "get_version_unknown_label",
            get_version_unknown_label(factory).await,
        ),
        TestResult::from_result(
            "error",
            "get_version_unknown_id",
            get_version_unknown_id(factory).await,
        ),
        TestResult::from_result(
            "error",
            "create_over_existing_conflicts",
            create_over_existing_conflicts(factory).await,
        ),
    ]
}

// ── get on empty store returns NotFound carrying the id ──────────────────────

async fn get_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get("missing").await {
        Err(StorageError::NotFound { id }) if id == "missing" => Ok(()),
        other => Err(format!("expected NotFound(missing), got {:?}", other)),
    }
}

async fn get_metadata_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_metadata("missing").await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}

async fn get_version_unknown_label<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.set(make_entry("contact", "1"))
        .await
        .map_err(|e| format!("set: {e}"))?;
    match s.get_version("contact", "9").await {
        Err(StorageError::VersionNotFound { id, version }) if id == "contact" && version == "9" => Ok(()),
        other => Err(format!("expected VersionNotFound(contact, 9), got {:?}", other)),
    }
}

async fn get_version_unknown_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_version("missing", "1").await {
        Err(StorageError::VersionNotFound { .. }) => Ok(()),
        other => Err(format!("expected VersionNotFound, got {:?}", other)),
    }
}

async fn create_over_existing_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.set(make_entry("contact", "1"))
        .await
        .map_err(|e| format!("set: {e}"))?;
    let create = make_entry("contact", "2").with_precondition(crate::Precondition::Absent);
    match s.set(create).await {
        Err(StorageError::Conflict { id, .. }) if id == "contact" => {}
        other => return Err(format!("expected Conflict(contact), got {:?}", other)),
    }
    let meta = s
        .get_metadata("contact")
        .await
        .map_err(|e| format!("get_metadata: {e}"))?;
    if meta.version != "1" {
        return Err(format!("rejected write changed the document to {}", meta.version));
    }
    Ok(())
}
