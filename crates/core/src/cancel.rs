//! Cancellation for long-running operations.

use std::future::Future;

pub use tokio_util::sync::CancellationToken;

use crate::error::SchemaError;

/// Race `fut` against `token`.
///
/// When the token fires first the future is dropped, abandoning its
/// in-flight work, and a cancelled error is returned. A token that is
/// already cancelled wins even if `fut` would complete immediately.
pub async fn cancellable<T, F>(token: &CancellationToken, fut: F) -> Result<T, SchemaError>
where
    F: Future<Output = Result<T, SchemaError>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(SchemaError::cancelled()),
        result = fut => result,
    }
}
