//! The transaction boundary as an explicit deferred-event buffer.
//!
//! Events published during a unit of work are buffered *on the boundary*,
//! not on a global bus. The boundary's exit path is parameterized by the
//! actual outcome: after-commit hooks run only on success, rollback
//! notifications are handed to the dispatcher only on failure. A
//! notification can therefore never fire for an operation that actually
//! succeeded, and never before the boundary has concluded.
//!
//! Real durability lives with the excluded persistence collaborator; this
//! boundary models its commit/rollback phases and owns the phase-conditional
//! dispatch.

use std::fmt::Display;

use tracing::{debug, error, info};

use crate::dispatcher::RollbackDispatcher;
use crate::notification::RollbackNotification;

/// Outcome of one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Committed,
    RolledBack,
}

type CommitHook = Box<dyn FnOnce() + Send>;

/// Deferred-event buffer scoped to one transactional unit of work.
///
/// Obtained only through [`Transaction::execute`] /
/// [`Transaction::execute_isolated`]; the buffer cannot outlive its
/// boundary.
pub struct Transaction {
    on_rollback: Vec<RollbackNotification>,
    on_commit: Vec<CommitHook>,
}

impl Transaction {
    fn new() -> Self {
        Self {
            on_rollback: Vec::new(),
            on_commit: Vec::new(),
        }
    }

    /// Buffer a notification for the rollback phase.
    ///
    /// Ownership passes to the boundary: the event is delivered iff this
    /// transaction rolls back, and discarded unread otherwise.
    pub fn publish_on_rollback(&mut self, notification: RollbackNotification) {
        debug!(
            guid = notification.guid(),
            record_id = notification.record_id(),
            "buffering rollback-phase notification"
        );
        self.on_rollback.push(notification);
    }

    /// Register a hook for the commit phase. Runs synchronously on the
    /// caller's thread once the closure has succeeded.
    pub fn publish_on_commit(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.on_commit.push(Box::new(hook));
    }

    /// Number of rollback-phase events currently buffered.
    pub fn pending_rollback_events(&self) -> usize {
        self.on_rollback.len()
    }

    /// Run `f` inside a transaction boundary wired to `dispatcher`.
    ///
    /// `Ok` concludes as [`TxOutcome::Committed`]; `Err` concludes as
    /// [`TxOutcome::RolledBack`]. The error is passed through unchanged; it
    /// is the re-raise that dooms the transaction.
    pub fn execute<T, E, F>(dispatcher: &RollbackDispatcher, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction) -> Result<T, E>,
        E: Display,
    {
        let mut tx = Transaction::new();
        match f(&mut tx) {
            Ok(value) => {
                tx.conclude(TxOutcome::Committed, Some(dispatcher));
                Ok(value)
            }
            Err(err) => {
                info!(error = %err, "unit of work failed, rolling back");
                tx.conclude(TxOutcome::RolledBack, Some(dispatcher));
                Err(err)
            }
        }
    }

    /// Run `f` inside an independent boundary with no rollback listeners.
    ///
    /// This is what a rollback listener itself uses for its side effect: the
    /// side effect's transaction must survive even though the business
    /// transaction did not, and must never recurse into the dispatcher.
    pub fn execute_isolated<T, E, F>(f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction) -> Result<T, E>,
        E: Display,
    {
        let mut tx = Transaction::new();
        match f(&mut tx) {
            Ok(value) => {
                tx.conclude(TxOutcome::Committed, None);
                Ok(value)
            }
            Err(err) => {
                info!(error = %err, "isolated unit of work failed, rolling back");
                tx.conclude(TxOutcome::RolledBack, None);
                Err(err)
            }
        }
    }

    /// Drain the buffers according to the outcome.
    fn conclude(self, outcome: TxOutcome, dispatcher: Option<&RollbackDispatcher>) {
        match outcome {
            TxOutcome::Committed => {
                if !self.on_rollback.is_empty() {
                    // Notifications must never fire for work that succeeded.
                    debug!(
                        discarded = self.on_rollback.len(),
                        "transaction committed, discarding rollback-phase events unread"
                    );
                }
                for hook in self.on_commit {
                    hook();
                }
            }
            TxOutcome::RolledBack => {
                drop(self.on_commit);
                for notification in self.on_rollback {
                    match dispatcher {
                        Some(d) => {
                            if let Err(err) = d.dispatch(notification) {
                                // Rollback already happened; nothing to do
                                // but record the lost event.
                                error!(error = %err, "failed to dispatch rollback notification");
                            }
                        }
                        None => {
                            error!(
                                guid = notification.guid(),
                                "rollback event raised in an isolated transaction, dropping"
                            );
                        }
                    }
                }
            }
        }
    }
}
