//! Producer/consumer correlation-id generator.
//!
//! A dedicated producer thread pre-computes "unique suffixes"
//! (process identifier + base-26 sequence) into a bounded queue; consumers
//! pop a suffix and stamp it with the wall clock *at consumption time*, so
//! the timestamp reflects actual request time while the consumer-facing call
//! stays cheap.
//!
//! Layout of an id (always exactly [`GUID_LEN`] characters):
//!
//! ```text
//! [ 14-digit timestamp ][ 11-char process id ][ 5-char base-26 sequence ]
//! ```
//!
//! Known narrowing: the sequence resets at [`SEQ_RESET_THRESHOLD`], which is
//! far below what the 5-character width can address, so the effective
//! collision-resistant window within one clock second is the reset threshold,
//! not 26^5. The two constants are kept independent so widening the window
//! is a deliberate one-line change.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Mutex, OnceLock};
use std::thread;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::base26;

/// Fixed width of every generated correlation id.
pub const GUID_LEN: usize = 30;

const POD_ID_WIDTH: usize = 11;
const SEQ_WIDTH: usize = 5;
const QUEUE_CAPACITY: usize = 20;

/// Sequence values reset to zero once the counter reaches this threshold.
pub const SEQ_RESET_THRESHOLD: u64 = 30;

#[derive(Debug, Error)]
pub enum GuidError {
    /// The producer thread is gone; no further ids will ever be supplied.
    ///
    /// The original design blocked consumers forever in this state. Rust's
    /// channel makes producer death observable, so it is surfaced instead;
    /// there is still no timeout or health probe on the healthy path.
    #[error("guid producer thread stopped")]
    ProducerStopped,

    /// Internal receiver lock was poisoned by a panicking consumer.
    #[error("guid queue lock poisoned")]
    Poisoned,
}

/// Bounded queue of pre-computed id suffixes, fed by one background thread.
///
/// `GuidQueue` is the many-consumer side; share it behind an `Arc` across
/// worker threads. Dropping the last handle disconnects the channel, which
/// is the producer's (best-effort) shutdown signal; ids are disposable, so
/// nothing is drained.
#[derive(Debug)]
pub struct GuidQueue {
    receiver: Mutex<Receiver<String>>,
    _producer: thread::JoinHandle<()>,
}

impl GuidQueue {
    /// Start the producer thread and return the consumer handle.
    pub fn start() -> Self {
        let (tx, rx) = mpsc::sync_channel::<String>(QUEUE_CAPACITY);

        let producer = thread::Builder::new()
            .name("guid-producer".to_string())
            .spawn(move || produce_suffixes(&tx))
            .expect("failed to spawn guid producer thread");

        Self {
            receiver: Mutex::new(rx),
            _producer: producer,
        }
    }

    /// Pop one pre-computed suffix, stamp it with the current wall clock and
    /// return the fixed 30-character id.
    ///
    /// Blocks while the queue is empty.
    pub fn next_id(&self) -> Result<String, GuidError> {
        let suffix = {
            let rx = self.receiver.lock().map_err(|_| GuidError::Poisoned)?;
            rx.recv().map_err(|_| GuidError::ProducerStopped)?
        };

        let stamped = format!("{}{}", Utc::now().format("%Y%m%d%H%M%S"), suffix);
        Ok(fix_width(stamped))
    }
}

/// Producer loop: pushes suffixes until the consumer side disconnects.
///
/// `send` blocks while the queue is full, so backpressure lands on this
/// thread, never on consumers.
fn produce_suffixes(tx: &SyncSender<String>) {
    let sequence = AtomicU64::new(0);
    let pod_id = pod_identifier();

    loop {
        let suffix = format!("{pod_id}{}", next_sequence(&sequence));
        if tx.send(suffix).is_err() {
            debug!("guid consumer dropped, stopping producer");
            break;
        }
    }
}

/// Increment the sequence counter, resetting once it reaches the threshold,
/// and encode it base-26 at fixed width.
fn next_sequence(counter: &AtomicU64) -> String {
    let mut value = counter.fetch_add(1, Ordering::Relaxed) + 1;
    if value >= SEQ_RESET_THRESHOLD {
        counter.store(0, Ordering::Relaxed);
        value = counter.fetch_add(1, Ordering::Relaxed) + 1;
    }
    base26::encode_fixed(value, SEQ_WIDTH)
}

/// Process/pod identifier, computed once per process.
///
/// Hashes the host name together with a random salt so two pods sharing a
/// second-resolution clock still mint distinct ids.
fn pod_identifier() -> &'static str {
    static POD_ID: OnceLock<String> = OnceLock::new();

    POD_ID.get_or_init(|| {
        let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| {
            let fallback = "localhost".to_string();
            warn!(fallback = %fallback, "HOSTNAME not set, assuming local environment");
            fallback
        });

        let salt: u128 = rand::random();
        let mut hasher = DefaultHasher::new();
        hostname.hash(&mut hasher);
        salt.hash(&mut hasher);

        base26::encode_fixed(hasher.finish(), POD_ID_WIDTH)
    })
}

/// Fix a raw id to exactly [`GUID_LEN`] characters: truncate when long,
/// right-pad with `'0'` when short.
fn fix_width(raw: String) -> String {
    if raw.len() >= GUID_LEN {
        raw[..GUID_LEN].to_string()
    } else {
        let mut out = raw;
        while out.len() < GUID_LEN {
            out.push('0');
        }
        out
    }
}

/// Mint a simple prefixed id for business records that do not need the
/// queue-backed correlation format: `prefix` + millisecond timestamp +
/// 4 random digits.
pub fn domain_id(prefix: &str) -> String {
    let random_part: u32 = rand::random::<u32>() % 10_000;
    format!("{prefix}{}{random_part:04}", Utc::now().timestamp_millis())
}
