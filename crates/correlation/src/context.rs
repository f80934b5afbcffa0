//! Thread-bound execution context.
//!
//! Each unit of work binds exactly one live [`CtxMap`] to its executing
//! thread. The context is never read or written by another thread directly:
//! the only sanctioned cross-thread transfer is an explicit, immutable
//! [`ContextSnapshot`] which the receiving thread re-attaches.
//!
//! Detaching in every exit path matters: thread pools reuse threads, and a
//! leaked context bleeds one request's correlation data into the next. Both
//! [`ExecutionContext::initialize`] and [`ExecutionContext::attach`] return a
//! [`ContextGuard`] whose `Drop` performs the detach, so panics and early
//! returns are covered.

use std::cell::RefCell;
use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

/// Well-known context keys.
pub mod keys {
    pub const GUID: &str = "guid";
    pub const REQUEST_ID: &str = "requestId";
    pub const REQUEST_TIME: &str = "requestTime";
    pub const THREAD_NAME: &str = "threadName";
    pub const CLIENT_IP: &str = "clientIp";
    pub const USER_AGENT: &str = "userAgent";
    pub const SESSION_ID: &str = "sessionId";
    pub const ENTITY_ID: &str = "entityId";
    pub const AMOUNT: &str = "amount";
    pub const PROCESSING_STATUS: &str = "processingStatus";
    pub const PROCESSING_MESSAGE: &str = "processingMessage";
}

/// Ordered map of heterogeneous correlation values.
///
/// Keys are kept sorted (deterministic serialization); values ride on
/// `serde_json::Value`. All typed readers are total: a missing key or a
/// type mismatch yields the supplied default, never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CtxMap {
    entries: BTreeMap<String, Value>,
}

impl CtxMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Insert a value under `key`, returning `&mut self` for chaining.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        match self.entries.get(key) {
            Some(Value::String(s)) => s.clone(),
            _ => default.to_string(),
        }
    }

    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.entries.get(key).and_then(Value::as_i64).unwrap_or(default)
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.entries.get(key).and_then(Value::as_f64).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.entries.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Correlation id bound into this map, or `"unknown"`.
    pub fn guid(&self) -> String {
        self.get_string(keys::GUID, "unknown")
    }
}

thread_local! {
    static CURRENT: RefCell<Option<CtxMap>> = const { RefCell::new(None) };
}

/// Immutable, independent copy of a context, the only value that may cross
/// a thread boundary.
///
/// Mutating the live context after taking a snapshot never changes the
/// snapshot, and a snapshot exposes no mutators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextSnapshot {
    frozen: CtxMap,
}

impl ContextSnapshot {
    pub fn guid(&self) -> String {
        self.frozen.guid()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.frozen.get(key)
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.frozen.get_string(key, default)
    }

    pub fn is_empty(&self) -> bool {
        self.frozen.is_empty()
    }
}

/// Detaches the context from the owning thread when dropped.
///
/// Hold it for the whole unit of work; the drop is the guaranteed-run block.
#[derive(Debug)]
#[must_use = "dropping the guard immediately detaches the context"]
pub struct ContextGuard {
    _private: (),
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        ExecutionContext::clear();
    }
}

/// Facade over the thread-local context slot.
///
/// Mirrors the unit-of-work lifecycle: `initialize` at entry, `put`/readers
/// during processing, `snapshot` before any asynchronous hop, `clear` (via
/// the guard) at exit.
pub struct ExecutionContext;

impl ExecutionContext {
    /// Bind a fresh context to the calling thread, seeded with the
    /// correlation id, a new request id, the request time and the thread
    /// label. Overwrites any previous context on this thread.
    pub fn initialize(guid: &str) -> ContextGuard {
        let mut ctx = CtxMap::new();
        ctx.put(keys::GUID, guid)
            .put(keys::REQUEST_ID, Uuid::new_v4().to_string())
            .put(keys::REQUEST_TIME, Utc::now().to_rfc3339())
            .put(keys::THREAD_NAME, current_thread_label());

        CURRENT.with(|slot| *slot.borrow_mut() = Some(ctx));
        debug!(guid, "execution context initialized");
        ContextGuard { _private: () }
    }

    /// Re-attach a snapshot on the calling thread (the receiving side of a
    /// cross-thread transfer). Overwrites any previous context.
    pub fn attach(snapshot: ContextSnapshot) -> ContextGuard {
        let guid = snapshot.guid();
        CURRENT.with(|slot| *slot.borrow_mut() = Some(snapshot.frozen));
        debug!(%guid, "execution context attached from snapshot");
        ContextGuard { _private: () }
    }

    /// Whether a context is currently bound to this thread.
    pub fn is_bound() -> bool {
        CURRENT.with(|slot| slot.borrow().is_some())
    }

    /// Run `f` against the current context, lazily binding an empty one if
    /// the thread has none. Relying on the lazy bind instead of
    /// [`initialize`](Self::initialize) is a caller bug; it exists so reads
    /// never fail.
    pub fn with_current<R>(f: impl FnOnce(&mut CtxMap) -> R) -> R {
        CURRENT.with(|slot| {
            let mut borrow = slot.borrow_mut();
            let ctx = borrow.get_or_insert_with(|| {
                debug!("no context bound, lazily creating an empty one");
                CtxMap::new()
            });
            f(ctx)
        })
    }

    pub fn put(key: impl Into<String>, value: impl Into<Value>) {
        Self::with_current(|ctx| {
            ctx.put(key, value);
        });
    }

    pub fn get_string(key: &str, default: &str) -> String {
        Self::with_current(|ctx| ctx.get_string(key, default))
    }

    pub fn get_i64(key: &str, default: i64) -> i64 {
        Self::with_current(|ctx| ctx.get_i64(key, default))
    }

    pub fn get_f64(key: &str, default: f64) -> f64 {
        Self::with_current(|ctx| ctx.get_f64(key, default))
    }

    pub fn get_bool(key: &str, default: bool) -> bool {
        Self::with_current(|ctx| ctx.get_bool(key, default))
    }

    /// Correlation id of the current unit of work, or `"unknown"`.
    pub fn guid() -> String {
        Self::with_current(|ctx| ctx.guid())
    }

    /// Bulk setter: client request metadata.
    pub fn add_client_info(client_ip: &str, user_agent: &str, session_id: Option<&str>) {
        Self::with_current(|ctx| {
            ctx.put(keys::CLIENT_IP, client_ip)
                .put(keys::USER_AGENT, user_agent);
            if let Some(session) = session_id.filter(|s| !s.trim().is_empty()) {
                ctx.put(keys::SESSION_ID, session);
            }
        });
    }

    /// Bulk setter: the business entity this unit of work operates on.
    pub fn add_business_info(entity_id: u64, amount: i64) {
        Self::with_current(|ctx| {
            ctx.put(keys::ENTITY_ID, entity_id).put(keys::AMOUNT, amount);
        });
    }

    /// Bulk setter: the outcome of processing.
    pub fn add_processing_result(status: &str, message: &str) {
        Self::with_current(|ctx| {
            ctx.put(keys::PROCESSING_STATUS, status)
                .put(keys::PROCESSING_MESSAGE, message);
        });
    }

    /// Deep, read-only copy of everything currently bound. Take one before
    /// every asynchronous hop.
    pub fn snapshot() -> ContextSnapshot {
        ContextSnapshot {
            frozen: Self::with_current(|ctx| ctx.clone()),
        }
    }

    /// Detach the context from the calling thread.
    ///
    /// Prefer holding the [`ContextGuard`]; this exists for callers managing
    /// the lifecycle by hand.
    pub fn clear() {
        CURRENT.with(|slot| {
            if let Some(ctx) = slot.borrow_mut().take() {
                debug!(guid = %ctx.guid(), "execution context cleared");
            }
        });
    }
}

fn current_thread_label() -> String {
    std::thread::current()
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{:?}", std::thread::current().id()))
}
