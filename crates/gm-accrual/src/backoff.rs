//! The single piece of cross-worker shared mutable state: a back-off
//! deadline before which no worker may issue a request to the accrual
//! service.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A monotonic deadline, guarded by a mutex, shared by every worker in the
/// pool. Writes only ever advance the deadline forward (`max(existing,
/// candidate)`) — a worker observing a *later* `Retry-After` than another
/// can never roll the clock backward for everyone else.
#[derive(Debug, Default)]
pub struct SharedBackoff {
    until: Mutex<Option<Instant>>,
}

impl SharedBackoff {
    /// A deadline that is not yet set; workers proceed immediately.
    pub fn new() -> Self {
        SharedBackoff {
            until: Mutex::new(None),
        }
    }

    /// Records a `429 Retry-After: <retry_after>` observation, advancing the
    /// shared deadline if `retry_after` pushes it further into the future.
    pub fn advance(&self, retry_after: Duration) {
        let candidate = Instant::now() + retry_after;
        let mut guard = self.until.lock().expect("backoff mutex poisoned");
        let advanced = match *guard {
            Some(existing) if existing >= candidate => existing,
            _ => candidate,
        };
        debug!(?retry_after, "rate-limit back-off advanced");
        *guard = Some(advanced);
    }

    /// Sleeps until the deadline passes, or returns early if `cancel` fires.
    /// A no-op when no deadline is set or it has already passed.
    pub async fn wait_if_needed(&self, cancel: &CancellationToken) {
        let deadline = *self.until.lock().expect("backoff mutex poisoned");
        let Some(deadline) = deadline else { return };
        let now = Instant::now();
        if deadline <= now {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(deadline - now) => {}
            _ = cancel.cancelled() => {}
        }
    }
}
