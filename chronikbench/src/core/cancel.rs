//! Run-scoped cooperative cancellation
//!
//! Every network round trip made on behalf of a run goes through
//! [`cancellable`], so an abort is observed at the next suspension point of
//! every in-flight sub-test rather than after the slowest request returns.

use std::future::Future;
use tokio_util::sync::CancellationToken;

/// The run was aborted by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("test aborted")]
pub struct Cancelled;

/// Fail fast if the token is already cancelled
pub fn check(cancel: &CancellationToken) -> Result<(), Cancelled> {
    if cancel.is_cancelled() {
        Err(Cancelled)
    } else {
        Ok(())
    }
}

/// Drive `fut` to completion unless `cancel` fires first
///
/// The token is checked before the future is polled, so a request is never
/// issued once the run has been aborted.
pub async fn cancellable<F>(cancel: &CancellationToken, fut: F) -> Result<F::Output, Cancelled>
where
    F: Future,
{
    check(cancel)?;

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Cancelled),
        output = fut => Ok(output),
    }
}
