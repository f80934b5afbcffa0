//! Application error model.

use thiserror::Error;

/// Result type used across the toolkit.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error.
///
/// Keep this focused on failure *kinds* callers branch on. The transient
/// variants (`LockContention`, `Deadlock`) are what the retry conditions
/// classify; wrapping layers must not erase them.
#[derive(Debug, Error)]
pub enum AppError {
    /// A row/record lock could not be obtained in time.
    #[error("lock contention: {0}")]
    LockContention(String),

    /// The database aborted this unit of work as a deadlock victim.
    #[error("deadlock detected: {0}")]
    Deadlock(String),

    /// The (stubbed) payment collaborator rejected or failed the charge.
    #[error("payment failed: {0}")]
    Payment(String),

    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A requested business record does not exist.
    #[error("record not found: {0}")]
    NotFound(u64),

    /// The persistence collaborator failed outside the kinds above.
    #[error("store failure: {0}")]
    Store(#[source] anyhow::Error),
}

impl AppError {
    pub fn lock_contention(msg: impl Into<String>) -> Self {
        Self::LockContention(msg.into())
    }

    pub fn deadlock(msg: impl Into<String>) -> Self {
        Self::Deadlock(msg.into())
    }

    pub fn payment(msg: impl Into<String>) -> Self {
        Self::Payment(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether this kind is, by itself, a transient contention failure.
    ///
    /// Retry classification normally goes through the condition predicates,
    /// which also inspect messages and source chains; this is the cheap
    /// variant-only check.
    pub fn is_contention(&self) -> bool {
        matches!(self, Self::LockContention(_) | Self::Deadlock(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_the_kind_keyword() {
        let err = AppError::deadlock("victim of tx 42");
        assert!(err.to_string().contains("deadlock"));

        let err = AppError::lock_contention("ORA-00054");
        assert!(err.to_string().contains("lock contention"));
    }

    #[test]
    fn contention_check_covers_only_transient_kinds() {
        assert!(AppError::lock_contention("busy").is_contention());
        assert!(AppError::deadlock("cycle").is_contention());
        assert!(!AppError::payment("declined").is_contention());
        assert!(!AppError::NotFound(7).is_contention());
    }
}
