//! `txguard-txevents`: transactional rollback notification pipeline.
//!
//! A unit of work that fails inside an active transaction marks its own
//! record failed, snapshots the execution context, buffers a
//! [`RollbackNotification`] on the transaction boundary and re-raises. The
//! boundary dispatches buffered notifications to listeners **only** once the
//! outcome is a rollback; on commit they are discarded unread. Listeners run
//! on a small worker pool, restore the snapshot, perform their side effect in
//! their own independent transaction and always detach the context.

pub mod dispatcher;
pub mod handler;
pub mod notification;
pub mod store;
pub mod transaction;

pub use dispatcher::{DispatchError, DispatcherHandle, RollbackDispatcher, RollbackHandler};
pub use handler::FailureHandler;
pub use notification::RollbackNotification;
pub use store::{
    FailureNotifier, InMemoryStatusStore, RecordStatus, RecordingNotifier, SentFailure, StatusStore,
};
pub use transaction::{Transaction, TxOutcome};
