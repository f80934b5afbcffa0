//! Cancellation of in-progress backoff waits.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Shared flag that can cut a blocking backoff wait short.
///
/// Cancellation is one-way and permanent: once cancelled, every current and
/// future wait observes it immediately, and the owning retry loop aborts
/// rather than resumes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: Mutex<bool>,
    signal: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the token cancelled and wake every waiter.
    pub fn cancel(&self) {
        let mut cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *cancelled = true;
        self.inner.signal.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Block for up to `timeout`, returning `true` if the token was
    /// cancelled before the time elapsed.
    pub fn wait_cancelled(&self, timeout: Duration) -> bool {
        let cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let (cancelled, _timed_out) = self
            .inner
            .signal
            .wait_timeout_while(cancelled, timeout, |c| !*c)
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        *cancelled
    }
}
