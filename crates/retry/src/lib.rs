//! `txguard-retry`: retry-with-backoff execution for transient failures.
//!
//! Three layers, composed bottom up:
//!
//! - [`RetryCondition`] predicates classify a single failure (marker type or
//!   keyword match, recursively through the source chain).
//! - [`RetryStrategy`] decides *whether* to re-attempt and *how long* to
//!   wait, consulting one or more conditions.
//! - [`Retryer`] runs the operation, sleeping between attempts and returning
//!   the original failure unchanged once the budget is spent.
//!
//! The backoff wait is a true blocking sleep. Cancelling it through a
//! [`CancelToken`] is a fatal, non-resumable abort of the whole loop.

pub mod cancel;
pub mod condition;
pub mod executor;
pub mod strategy;

pub use cancel::CancelToken;
pub use condition::{
    DeadlockCondition, LockContentionCondition, MarkerCondition, RetryCondition, RetryableError,
};
pub use executor::{Retryer, RetryError};
pub use strategy::{LinearBackoff, RandomBackoff, RetryStrategy};
