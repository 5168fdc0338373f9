use std::future::Future;

use super::{make_entry, TestResult};
use crate::{Precondition, SchemaStorage, StorageError};

pub(super) async fn run_batch_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "batch",
            "batch_set_then_batch_get",
            batch_set_then_batch_get(factory).await,
        ),
        TestResult::from_result(
            "batch",
            "batch_get_skips_missing",
            batch_get_skips_missing(factory).await,
        ),
        TestResult::from_result(
            "batch",
            "batch_set_is_all_or_nothing",
            batch_set_is_all_or_nothing(factory).await,
        ),
    ]
}

async fn batch_set_then_batch_get<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let entries = vec![make_entry("a", "1"), make_entry("b", "1"), make_entry("c", "1")];
    let expected: Vec<Vec<u8>> = entries.iter().map(|e| e.data.clone()).collect();
    s.batch_set(entries)
        .await
        .map_err(|e| format!("batch_set: {e}"))?;

    let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let got = s
        .batch_get(&ids)
        .await
        .map_err(|e| format!("batch_get: {e}"))?;
    if got.len() != 3 {
        return Err(format!("expected 3 documents, got {}", got.len()));
    }
    for (id, data) in ids.iter().zip(expected) {
        if got.get(id) != Some(&data) {
            return Err(format!("wrong bytes for {id}"));
        }
    }
    Ok(())
}

async fn batch_get_skips_missing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.set(make_entry("a", "1"))
        .await
        .map_err(|e| format!("set: {e}"))?;
    let got = s
        .batch_get(&["a".to_string(), "missing".to_string()])
        .await
        .map_err(|e| format!("batch_get: {e}"))?;
    if got.keys().collect::<Vec<_>>() != ["a"] {
        return Err(format!("expected only a, got {:?}", got.keys().collect::<Vec<_>>()));
    }
    Ok(())
}

/// One entry's precondition fails, so none of the batch may be written.
async fn batch_set_is_all_or_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.set(make_entry("taken", "1"))
        .await
        .map_err(|e| format!("set: {e}"))?;

    let entries = vec![
        make_entry("fresh", "1").with_precondition(Precondition::Absent),
        make_entry("taken", "2").with_precondition(Precondition::Absent),
    ];
    match s.batch_set(entries).await {
        Err(StorageError::Conflict { .. }) => {}
        other => return Err(format!("expected Conflict, got {:?}", other)),
    }
    if s.exists("fresh").await.map_err(|e| format!("exists: {e}"))? {
        return Err("partial batch was committed".to_string());
    }
    Ok(())
}
