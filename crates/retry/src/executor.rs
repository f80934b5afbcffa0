//! The retry loop itself.

use std::error::Error;
use std::thread;

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::cancel::CancelToken;
use crate::strategy::RetryStrategy;

/// Terminal outcome of a failed [`Retryer::execute`] call.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The strategy declined a re-attempt (budget spent or failure kind not
    /// retryable). Carries the original failure unchanged so callers can
    /// still branch on its kind.
    #[error(transparent)]
    Exhausted(E),

    /// The backoff wait was cancelled. Non-resumable; the operation's own
    /// last failure was already logged.
    #[error("retry wait cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E> {
    /// The original failure, if this call ended by exhaustion.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Exhausted(e) => Some(e),
            Self::Cancelled { .. } => None,
        }
    }

    pub fn inner(&self) -> Option<&E> {
        match self {
            Self::Exhausted(e) => Some(e),
            Self::Cancelled { .. } => None,
        }
    }
}

/// Runs an operation under a [`RetryStrategy`].
///
/// Attempts are strictly sequential; the attempt counter is local to one
/// `execute` call, so nested or back-to-back calls never share budget.
pub struct Retryer<S> {
    strategy: S,
    cancel: Option<CancelToken>,
}

impl<S: RetryStrategy> Retryer<S> {
    pub fn new(strategy: S) -> Self {
        Self {
            strategy,
            cancel: None,
        }
    }

    /// Attach a cancellation token. Cancelling during a backoff wait aborts
    /// the loop with [`RetryError::Cancelled`]; it is never resumed.
    pub fn with_cancel(strategy: S, cancel: CancelToken) -> Self {
        Self {
            strategy,
            cancel: Some(cancel),
        }
    }

    /// Execute `op`, re-attempting per the strategy.
    ///
    /// On exhaustion the original failure comes back unchanged inside
    /// [`RetryError::Exhausted`]; the failure value itself is never wrapped.
    pub fn execute<T, E, F>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Result<T, E>,
        E: Error + 'static,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!(attempt, "executing attempt");

            let err = match op() {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            warn!(attempt, error = %err, "attempt failed");

            if !self.strategy.should_retry(&err, attempt) {
                error!(attempt, error = %err, "not retrying, propagating original failure");
                return Err(RetryError::Exhausted(err));
            }

            let wait = self.strategy.wait_time(attempt);
            debug!(attempt, wait_ms = wait.as_millis() as u64, "backing off");

            match &self.cancel {
                None => thread::sleep(wait),
                Some(token) => {
                    if token.wait_cancelled(wait) {
                        error!(attempt, "backoff wait cancelled, aborting retry loop");
                        return Err(RetryError::Cancelled { attempts: attempt });
                    }
                }
            }
        }
    }
}
