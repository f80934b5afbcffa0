//! `txguard-correlation`: correlation identifiers and request-scoped context.
//!
//! Two pieces, used together at the start of every unit of work:
//!
//! - [`GuidQueue`]: a producer/consumer generator of fixed-format 30-char
//!   correlation identifiers.
//! - [`ExecutionContext`]: a thread-bound key/value store for correlation
//!   data, with explicit snapshot/restore as the only sanctioned way to move
//!   context across threads.

pub mod base26;
pub mod context;
pub mod guid;

pub use context::{ContextGuard, ContextSnapshot, CtxMap, ExecutionContext};
pub use guid::{GuidError, GuidQueue, domain_id, GUID_LEN};
