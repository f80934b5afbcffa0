//! Retry classification predicates.
//!
//! Each condition inspects one failure, recursively through its source
//! chain, for either a marker type or a case-insensitive keyword. New
//! failure classes get a new condition; strategies OR the predicates
//! together, so nothing existing changes.

use std::error::Error;

use thiserror::Error;
use tracing::debug;

use txguard_core::AppError;

/// Decides whether a single failure is worth re-attempting.
pub trait RetryCondition: Send + Sync {
    fn is_retryable(&self, error: &(dyn Error + 'static)) -> bool;
}

/// Explicit application-level transient failure.
///
/// Raise this when a lower-level failure is known to be transient (rate
/// limiting, a briefly unavailable collaborator) but carries no kind the
/// conditions recognize. [`MarkerCondition`] matches it by type.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RetryableError {
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl RetryableError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Iterate an error and every failure in its source chain.
pub fn error_chain<'a>(
    error: &'a (dyn Error + 'static),
) -> impl Iterator<Item = &'a (dyn Error + 'static)> {
    let mut next = Some(error);
    std::iter::from_fn(move || {
        let current = next?;
        next = current.source();
        Some(current)
    })
}

/// Database lock contention (lock timeouts, busy resources).
///
/// Matches the `AppError::LockContention` kind by type, or any of the known
/// driver message fragments, anywhere in the source chain.
#[derive(Debug, Default)]
pub struct LockContentionCondition;

impl LockContentionCondition {
    /// Lock-related message fragments across the usual databases
    /// (Oracle ORA-00054, MySQL/Postgres lock timeouts, generic busy).
    const KEYWORDS: [&'static str; 6] = [
        "ora-00054",
        "timeout trying to lock",
        "lock timeout",
        "busy",
        "lock conflict",
        "could not obtain lock",
    ];

    pub fn new() -> Self {
        Self
    }
}

impl RetryCondition for LockContentionCondition {
    fn is_retryable(&self, error: &(dyn Error + 'static)) -> bool {
        for err in error_chain(error) {
            if matches!(err.downcast_ref::<AppError>(), Some(AppError::LockContention(_))) {
                debug!("lock contention kind detected, retryable");
                return true;
            }

            let msg = err.to_string().to_lowercase();
            if Self::KEYWORDS.iter().any(|kw| msg.contains(kw)) {
                debug!(message = %msg, "lock keyword detected, retryable");
                return true;
            }
        }
        false
    }
}

/// Database deadlock victims.
///
/// Deadlocks are transient by nature: the database already rolled one
/// transaction back, and a re-attempt usually succeeds.
#[derive(Debug, Default)]
pub struct DeadlockCondition;

impl DeadlockCondition {
    pub fn new() -> Self {
        Self
    }
}

impl RetryCondition for DeadlockCondition {
    fn is_retryable(&self, error: &(dyn Error + 'static)) -> bool {
        error_chain(error).any(|err| {
            matches!(err.downcast_ref::<AppError>(), Some(AppError::Deadlock(_)))
                || err.to_string().to_lowercase().contains("deadlock")
        })
    }
}

/// Matches the explicit [`RetryableError`] marker anywhere in the chain.
#[derive(Debug, Default)]
pub struct MarkerCondition;

impl MarkerCondition {
    pub fn new() -> Self {
        Self
    }
}

impl RetryCondition for MarkerCondition {
    fn is_retryable(&self, error: &(dyn Error + 'static)) -> bool {
        error_chain(error).any(|err| err.downcast_ref::<RetryableError>().is_some())
    }
}
