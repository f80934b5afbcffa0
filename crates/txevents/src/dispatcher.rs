//! Asynchronous delivery of rollback notifications.
//!
//! A small pool of named worker threads consumes notifications from an mpsc
//! channel. The channel gives exactly-once consumption (one worker per
//! message); ordering relative to the original caller's response is
//! deliberately unspecified; this is fire-and-forget.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::notification::RollbackNotification;

/// Listener invoked for each rollback-phase notification.
///
/// Runs off the triggering request thread. Returned errors are logged by
/// the worker and never propagated; the business transaction has already
/// concluded and nothing awaits this result.
pub trait RollbackHandler: Send + Sync + 'static {
    fn on_rollback(&self, notification: &RollbackNotification) -> anyhow::Result<()>;
}

impl<H: RollbackHandler + ?Sized> RollbackHandler for Arc<H> {
    fn on_rollback(&self, notification: &RollbackNotification) -> anyhow::Result<()> {
        (**self).on_rollback(notification)
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The worker pool has shut down; the notification is lost.
    #[error("rollback dispatcher is closed")]
    Closed,
}

/// Sending side of the pipeline, handed to transaction boundaries.
#[derive(Debug, Clone)]
pub struct RollbackDispatcher {
    sender: Sender<RollbackNotification>,
}

impl RollbackDispatcher {
    /// Spawn `pool_size` worker threads running `handler` and return the
    /// dispatcher plus the handle that joins them.
    pub fn spawn<H>(pool_size: usize, handler: H) -> (Self, DispatcherHandle)
    where
        H: RollbackHandler + Clone,
    {
        assert!(pool_size > 0, "pool_size must be at least 1");

        let (tx, rx) = mpsc::channel::<RollbackNotification>();
        let rx = Arc::new(Mutex::new(rx));
        let stop = Arc::new(AtomicBool::new(false));

        let joins = (0..pool_size)
            .map(|i| {
                let rx = Arc::clone(&rx);
                let stop = Arc::clone(&stop);
                let handler = handler.clone();
                thread::Builder::new()
                    .name(format!("rollback-notifier-{i}"))
                    .spawn(move || worker_loop(&rx, &stop, &handler))
                    .expect("failed to spawn rollback notifier thread")
            })
            .collect();

        (
            Self { sender: tx },
            DispatcherHandle { stop, joins },
        )
    }

    /// Hand one notification to the pool. Called by the transaction
    /// boundary once rollback is concluded.
    pub fn dispatch(&self, notification: RollbackNotification) -> Result<(), DispatchError> {
        self.sender
            .send(notification)
            .map_err(|_| DispatchError::Closed)
    }
}

/// Handle to stop and join the worker pool.
#[derive(Debug)]
pub struct DispatcherHandle {
    stop: Arc<AtomicBool>,
    joins: Vec<thread::JoinHandle<()>>,
}

impl DispatcherHandle {
    /// Request shutdown and wait for the workers to stop.
    ///
    /// Workers drain notifications already in the channel before exiting,
    /// so events dispatched before this call are still delivered.
    pub fn shutdown(self) {
        self.stop.store(true, Ordering::SeqCst);
        for join in self.joins {
            let _ = join.join();
        }
    }
}

fn worker_loop<H: RollbackHandler>(
    rx: &Mutex<Receiver<RollbackNotification>>,
    stop: &AtomicBool,
    handler: &H,
) {
    let tick = Duration::from_millis(50);

    loop {
        // Holding the lock only for the timed receive keeps the pool fair.
        let received = match rx.lock() {
            Ok(guard) => guard.recv_timeout(tick),
            Err(_) => break,
        };

        match received {
            Ok(notification) => {
                debug!(
                    guid = notification.guid(),
                    record_id = notification.record_id(),
                    "delivering rollback notification"
                );
                if let Err(err) = handler.on_rollback(&notification) {
                    // Nothing awaits this result; log and move on.
                    warn!(
                        guid = notification.guid(),
                        error = %err,
                        "rollback handler failed"
                    );
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
