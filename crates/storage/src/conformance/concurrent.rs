use std::future::Future;
use std::sync::Arc;

use super::{make_entry, TestResult};
use crate::{Precondition, SchemaStorage, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "concurrent_create_exactly_one_wins",
            concurrent_create_exactly_one_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_checksum_update_exactly_one_wins",
            concurrent_checksum_update_exactly_one_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_writes_different_ids_all_succeed",
            concurrent_writes_different_ids_all_succeed(factory).await,
        ),
    ]
}

/// Spawn N writers and count how many succeeded. Any error other than a
/// conflict fails the test.
async fn race<S, W>(storage: Arc<S>, make: W) -> Result<(usize, usize), String>
where
    S: SchemaStorage,
    W: Fn(usize) -> crate::StorageEntry,
{
    let mut handles = Vec::new();
    for i in 0..N {
        let s = Arc::clone(&storage);
        let entry = make(i);
        handles.push(tokio::spawn(async move {
            match s.set(entry).await {
                Ok(()) => Ok(true),
                Err(StorageError::Conflict { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }
    Ok((winners, losers))
}

// ── Create-if-absent: exactly one wins ──────────────────────────────────────

/// N tasks race to create the same id. Exactly one succeeds; the rest must
/// get Conflict.
async fn concurrent_create_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let (winners, losers) = race(Arc::clone(&storage), |i| {
        make_entry("contact", &i.to_string()).with_precondition(Precondition::Absent)
    })
    .await?;

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }
    Ok(())
}

// ── Compare-and-set on checksum: exactly one wins ───────────────────────────

/// N tasks all read checksum `contact@0` and try to replace it.
async fn concurrent_checksum_update_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    storage
        .set(make_entry("contact", "0"))
        .await
        .map_err(|e| format!("seed: {e}"))?;

    let (winners, _) = race(Arc::clone(&storage), |i| {
        make_entry("contact", &(i + 1).to_string())
            .with_precondition(Precondition::Checksum("contact@0".to_string()))
    })
    .await?;
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }

    let versions = storage
        .list_versions("contact")
        .await
        .map_err(|e| format!("list_versions: {e}"))?;
    if versions.len() != 2 {
        return Err(format!("expected seed plus one winner in history, got {:?}", versions));
    }
    Ok(())
}

// ── Writes to different ids: all succeed ────────────────────────────────────

async fn concurrent_writes_different_ids_all_succeed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SchemaStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let (winners, losers) = race(Arc::clone(&storage), |i| {
        make_entry(&format!("schema-{i}"), "1").with_precondition(Precondition::Absent)
    })
    .await?;
    if winners != N || losers != 0 {
        return Err(format!("expected {N} winners, got {winners} ({losers} conflicts)"));
    }
    let all = storage
        .list(&crate::ListFilter::default())
        .await
        .map_err(|e| format!("list: {e}"))?;
    if all.len() != N {
        return Err(format!("expected {N} documents, got {}", all.len()));
    }
    Ok(())
}
