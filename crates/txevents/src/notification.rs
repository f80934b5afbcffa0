//! The deferred failure event.

use serde::{Deserialize, Serialize};
use tracing::info;

use txguard_correlation::ContextSnapshot;

/// Immutable record of a failure detected inside an active transaction.
///
/// Built the instant the failure is detected, published to the transaction
/// boundary immediately, and delivered to exactly one listener invocation
/// iff the enclosing transaction is later confirmed rolled back. If the
/// transaction commits instead, it is discarded unread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackNotification {
    guid: String,
    record_id: u64,
    reason: String,
    context: Option<ContextSnapshot>,
}

impl RollbackNotification {
    /// Build a notification carrying the full context snapshot. The
    /// correlation id is read out of the snapshot.
    pub fn new(context: ContextSnapshot, record_id: u64, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let guid = context.guid();
        info!(%guid, record_id, %reason, "rollback notification created");

        Self {
            guid,
            record_id,
            reason,
            context: Some(context),
        }
    }

    /// Older event shape: only the bare correlation id travels with the
    /// event. Listeners re-initialize a minimal context from it.
    pub fn without_context(guid: impl Into<String>, record_id: u64, reason: impl Into<String>) -> Self {
        let guid = guid.into();
        let reason = reason.into();
        info!(%guid, record_id, %reason, "rollback notification created (no context)");

        Self {
            guid,
            record_id,
            reason,
            context: None,
        }
    }

    pub fn guid(&self) -> &str {
        &self.guid
    }

    pub fn record_id(&self) -> u64 {
        self.record_id
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn context(&self) -> Option<&ContextSnapshot> {
        self.context.as_ref()
    }
}
