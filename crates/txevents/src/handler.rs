//! The concrete rollback listener.

use std::sync::Arc;

use tracing::info;

use txguard_correlation::ExecutionContext;

use crate::dispatcher::RollbackHandler;
use crate::notification::RollbackNotification;
use crate::store::FailureNotifier;
use crate::transaction::Transaction;

/// Listener that turns a rollback notification into the failure side effect.
///
/// Per invocation, on a pool worker thread:
/// 1. restore the carried context snapshot (or re-initialize a minimal
///    context from the bare correlation id, for the old event shape);
/// 2. send the failure notification inside its own independent transaction;
///    "I notified about this failure" survives even though the business
///    transaction did not;
/// 3. detach the restored context, unconditionally (the guard covers error
///    and panic paths; pool threads are reused).
pub struct FailureHandler<N> {
    notifier: Arc<N>,
}

impl<N: FailureNotifier> FailureHandler<N> {
    pub fn new(notifier: Arc<N>) -> Self {
        Self { notifier }
    }
}

impl<N> Clone for FailureHandler<N> {
    fn clone(&self) -> Self {
        Self {
            notifier: Arc::clone(&self.notifier),
        }
    }
}

impl<N: FailureNotifier + 'static> RollbackHandler for FailureHandler<N> {
    fn on_rollback(&self, notification: &RollbackNotification) -> anyhow::Result<()> {
        let _guard = match notification.context() {
            Some(snapshot) => ExecutionContext::attach(snapshot.clone()),
            None => ExecutionContext::initialize(notification.guid()),
        };

        info!(
            guid = notification.guid(),
            record_id = notification.record_id(),
            reason = notification.reason(),
            "processing failure event after rollback"
        );

        Transaction::execute_isolated(|_tx| {
            self.notifier.send_failure(
                notification.guid(),
                notification.record_id(),
                notification.reason(),
            )
        })?;

        info!(
            guid = notification.guid(),
            "failure notification sent after rollback"
        );
        Ok(())
    }
}
