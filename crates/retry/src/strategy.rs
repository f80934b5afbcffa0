//! Backoff strategies.

use std::error::Error;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use txguard_core::AppError;

use crate::condition::{RetryCondition, RetryableError, error_chain};

/// Decides whether a failed attempt is re-tried and how long to wait first.
///
/// `attempt` starts at 1 and is local to one executor call.
pub trait RetryStrategy: Send + Sync {
    fn should_retry(&self, error: &(dyn Error + 'static), attempt: u32) -> bool;

    fn wait_time(&self, attempt: u32) -> Duration;
}

/// Linear backoff: `wait = initial + increment × (attempt − 1)`.
///
/// Retryability is a static allow-list of failure kinds: the explicit
/// [`RetryableError`] marker and the payment kind (the one collaborator
/// known to fail transiently), checked through the source chain.
#[derive(Debug)]
pub struct LinearBackoff {
    max_attempts: u32,
    initial_delay: Duration,
    increment: Duration,
}

impl LinearBackoff {
    pub fn new(max_attempts: u32, initial_delay: Duration, increment: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            increment,
        }
    }

    fn is_allowed(error: &(dyn Error + 'static)) -> bool {
        error_chain(error).any(|err| {
            err.downcast_ref::<RetryableError>().is_some()
                || matches!(err.downcast_ref::<AppError>(), Some(AppError::Payment(_)))
        })
    }
}

impl RetryStrategy for LinearBackoff {
    fn should_retry(&self, error: &(dyn Error + 'static), attempt: u32) -> bool {
        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "attempt budget spent");
            return false;
        }

        let allowed = Self::is_allowed(error);
        if !allowed {
            debug!(attempt, error = %error, "failure kind not in the allow-list");
        }
        allowed
    }

    fn wait_time(&self, attempt: u32) -> Duration {
        self.initial_delay + self.increment * attempt.saturating_sub(1)
    }
}

/// Randomized backoff:
/// `wait = min(base + attempt × step_weight + random(0, jitter_max), cap)`.
///
/// Retryability is delegated to the injected [`RetryCondition`] predicates,
/// combined by logical OR. The jitter de-synchronizes concurrent callers
/// contending for the same locks.
pub struct RandomBackoff {
    max_retries: u32,
    base_wait: Duration,
    step_weight: Duration,
    jitter_max: Duration,
    max_wait: Duration,
    conditions: Vec<Box<dyn RetryCondition>>,
}

impl RandomBackoff {
    /// Default tuning: 10 attempts, 100 ms base, 50 ms per-attempt weight,
    /// up to 200 ms jitter, capped at 2 s.
    pub fn new(conditions: Vec<Box<dyn RetryCondition>>) -> Self {
        Self::with_config(
            10,
            Duration::from_millis(100),
            Duration::from_millis(50),
            Duration::from_millis(200),
            Duration::from_secs(2),
            conditions,
        )
    }

    /// Invariant: `max_wait >= base_wait`, so computed waits always land in
    /// `[base_wait, max_wait]`.
    pub fn with_config(
        max_retries: u32,
        base_wait: Duration,
        step_weight: Duration,
        jitter_max: Duration,
        max_wait: Duration,
        conditions: Vec<Box<dyn RetryCondition>>,
    ) -> Self {
        assert!(max_wait >= base_wait, "max_wait must be at least base_wait");

        info!(
            max_retries,
            conditions = conditions.len(),
            "random backoff strategy active"
        );

        Self {
            max_retries,
            base_wait,
            step_weight,
            jitter_max,
            max_wait,
            conditions,
        }
    }
}

impl RetryStrategy for RandomBackoff {
    fn should_retry(&self, error: &(dyn Error + 'static), attempt: u32) -> bool {
        if attempt >= self.max_retries {
            warn!(max = self.max_retries, "max retries reached, giving up");
            return false;
        }

        self.conditions.iter().any(|c| c.is_retryable(error))
    }

    fn wait_time(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter_max.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
        };

        let wait = (self.base_wait + self.step_weight * attempt + jitter).min(self.max_wait);
        debug!(attempt, wait_ms = wait.as_millis() as u64, "computed backoff wait");
        wait
    }
}
