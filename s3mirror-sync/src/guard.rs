//! Deadline and cancellation for storage calls.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::SyncError;

/// Wraps every remote call of a run with a per-call deadline and the run's
/// cancellation token.
#[derive(Debug, Clone)]
pub struct OpGuard {
    cancel: CancellationToken,
    timeout: Duration,
}

impl OpGuard {
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        Self { cancel, timeout }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `fut` unless the run is cancelled or `timeout` elapses first.
    pub async fn run<T, E, F>(&self, op: &'static str, fut: F) -> Result<T, SyncError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<SyncError>,
    {
        if self.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(SyncError::Cancelled),
            result = tokio::time::timeout(self.timeout, fut) => match result {
                Ok(inner) => inner.map_err(Into::into),
                Err(_) => Err(SyncError::Timeout { op, after: self.timeout }),
            },
        }
    }

    /// Drive `fut` until it finishes or the run is cancelled, with no
    /// deadline. For transfers whose stalls are bounded elsewhere.
    pub async fn cancellable<T, E, F>(&self, fut: F) -> Result<T, SyncError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<SyncError>,
    {
        if self.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(SyncError::Cancelled),
            result = fut => result.map_err(Into::into),
        }
    }
}
