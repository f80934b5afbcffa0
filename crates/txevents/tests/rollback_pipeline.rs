//! End-to-end pipeline tests: unit of work → retry → transaction boundary →
//! rollback dispatcher → failure handler.
//!
//! The unit of work simulated here follows the shape every business
//! operation uses: draw a correlation id, bind the context, run the
//! persistence-backed step under retry inside a transaction boundary, and on
//! unrecoverable failure mark the record failed, snapshot the context,
//! buffer a rollback notification and re-raise.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use txguard_core::AppError;
use txguard_correlation::{ExecutionContext, GuidQueue};
use txguard_retry::{
    DeadlockCondition, LockContentionCondition, RandomBackoff, RetryError, Retryer,
};
use txguard_txevents::{
    FailureHandler, FailureNotifier, InMemoryStatusStore, RecordStatus, RecordingNotifier,
    RollbackDispatcher, RollbackNotification, StatusStore, Transaction,
};

/// Scenario tuning: 3 attempts, 100 ms base, no per-attempt weight, up to
/// 50 ms jitter, so each backoff wait lands in [100 ms, 150 ms).
fn scenario_retryer() -> Retryer<RandomBackoff> {
    Retryer::new(RandomBackoff::with_config(
        3,
        Duration::from_millis(100),
        Duration::ZERO,
        Duration::from_millis(50),
        Duration::from_secs(2),
        vec![
            Box::new(LockContentionCondition::new()),
            Box::new(DeadlockCondition::new()),
        ],
    ))
}

/// One simulated unit of work. Returns the minted correlation id alongside
/// the outcome so tests can assert on event contents.
fn place_order<F>(
    guids: &GuidQueue,
    dispatcher: &RollbackDispatcher,
    store: &InMemoryStatusStore,
    retryer: &Retryer<RandomBackoff>,
    order_id: u64,
    mut payment: F,
) -> (String, Result<(), RetryError<AppError>>)
where
    F: FnMut() -> Result<(), AppError>,
{
    let guid = guids.next_id().expect("guid producer alive");
    let _ctx = ExecutionContext::initialize(&guid);
    ExecutionContext::add_business_info(order_id, 1_500);

    let result = Transaction::execute(dispatcher, |tx| {
        store.insert(order_id, RecordStatus::Pending);

        match retryer.execute(&mut payment) {
            Ok(()) => {
                store
                    .update_status(order_id, RecordStatus::Completed)
                    .expect("store available");
                ExecutionContext::add_processing_result("SUCCESS", "order completed");
                Ok(())
            }
            Err(err) => {
                // Mark our own record failed inside the doomed transaction,
                // snapshot, buffer the notification, re-raise.
                store
                    .update_status(order_id, RecordStatus::Failed)
                    .expect("store available");
                ExecutionContext::add_processing_result("FAILED", &err.to_string());
                tx.publish_on_rollback(RollbackNotification::new(
                    ExecutionContext::snapshot(),
                    order_id,
                    err.to_string(),
                ));
                Err(err)
            }
        }
    });

    (guid, result)
}

struct Fixture {
    guids: GuidQueue,
    store: Arc<InMemoryStatusStore>,
    notifier: Arc<RecordingNotifier>,
    dispatcher: RollbackDispatcher,
    handle: txguard_txevents::DispatcherHandle,
}

fn setup() -> Fixture {
    txguard_observability::init();

    let notifier = Arc::new(RecordingNotifier::new());
    let (dispatcher, handle) =
        RollbackDispatcher::spawn(2, FailureHandler::new(notifier.clone()));

    Fixture {
        guids: GuidQueue::start(),
        store: Arc::new(InMemoryStatusStore::new()),
        notifier,
        dispatcher,
        handle,
    }
}

#[test]
fn scenario_a_success_on_the_third_attempt() {
    let fx = setup();
    let retryer = scenario_retryer();
    let failures = AtomicU32::new(0);

    let start = Instant::now();
    let (_guid, result) = place_order(&fx.guids, &fx.dispatcher, &fx.store, &retryer, 1, || {
        if failures.fetch_add(1, Ordering::SeqCst) < 2 {
            Err(AppError::lock_contention("order row busy"))
        } else {
            Ok(())
        }
    });
    let elapsed = start.elapsed();

    assert!(result.is_ok());
    assert_eq!(failures.load(Ordering::SeqCst), 3);
    // Two backoff waits, each in [100 ms, 150 ms).
    assert!(elapsed >= Duration::from_millis(200), "elapsed {elapsed:?}");
    assert!(elapsed <= Duration::from_millis(350), "elapsed {elapsed:?}");
    assert_eq!(fx.store.status(1), Some(RecordStatus::Completed));

    fx.handle.shutdown();
    assert!(
        fx.notifier.sent().is_empty(),
        "no rollback notification may fire for a committed unit of work"
    );
}

#[test]
fn scenario_b_exhaustion_raises_the_original_failure_and_notifies_once() {
    let fx = setup();
    let retryer = scenario_retryer();
    let attempts = AtomicU32::new(0);

    let (guid, result) = place_order(&fx.guids, &fx.dispatcher, &fx.store, &retryer, 2, || {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err(AppError::lock_contention("could not obtain lock on order row"))
    });

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    match result.unwrap_err() {
        RetryError::Exhausted(AppError::LockContention(msg)) => {
            assert_eq!(msg, "could not obtain lock on order row");
        }
        other => panic!("kind was not preserved: {other:?}"),
    }

    fx.handle.shutdown();
    let sent = fx.notifier.sent();
    assert_eq!(sent.len(), 1, "exactly one notification after rollback");
    assert_eq!(sent[0].guid, guid);
    assert_eq!(sent[0].record_id, 2);
    assert!(sent[0].reason.contains("could not obtain lock on order row"));
}

#[test]
fn notifications_are_discarded_when_the_transaction_commits() {
    let fx = setup();

    // Publish eagerly, then succeed anyway: the boundary must discard.
    let result: Result<(), AppError> = Transaction::execute(&fx.dispatcher, |tx| {
        tx.publish_on_rollback(RollbackNotification::without_context("G-COMMIT", 9, "spurious"));
        Ok(())
    });
    assert!(result.is_ok());

    fx.handle.shutdown();
    assert!(fx.notifier.sent().is_empty());
}

#[test]
fn delivery_happens_off_the_publishing_thread() {
    struct ThreadRecorder {
        threads: std::sync::Mutex<Vec<String>>,
    }

    impl FailureNotifier for ThreadRecorder {
        fn send_failure(&self, _guid: &str, _record_id: u64, _reason: &str) -> anyhow::Result<()> {
            let name = std::thread::current().name().unwrap_or("").to_string();
            self.threads.lock().unwrap().push(name);
            Ok(())
        }
    }

    let recorder = Arc::new(ThreadRecorder {
        threads: std::sync::Mutex::new(Vec::new()),
    });
    let (dispatcher, handle) = RollbackDispatcher::spawn(1, FailureHandler::new(recorder.clone()));

    let result: Result<(), AppError> = Transaction::execute(&dispatcher, |tx| {
        tx.publish_on_rollback(RollbackNotification::without_context("G-ASYNC", 4, "late"));
        Err(AppError::payment("declined"))
    });
    assert!(result.is_err());

    handle.shutdown();
    let threads = recorder.threads.lock().unwrap();
    assert_eq!(threads.len(), 1);
    assert!(threads[0].starts_with("rollback-notifier-"));
}

#[test]
fn listener_restores_the_snapshot_context() {
    struct ContextProbe {
        seen: std::sync::Mutex<Vec<(String, i64)>>,
    }

    impl FailureNotifier for ContextProbe {
        fn send_failure(&self, _guid: &str, _record_id: u64, _reason: &str) -> anyhow::Result<()> {
            // The handler attached the snapshot before invoking us; the
            // worker thread sees the origin thread's correlation data.
            self.seen.lock().unwrap().push((
                ExecutionContext::guid(),
                ExecutionContext::get_i64(txguard_correlation::context::keys::ENTITY_ID, -1),
            ));
            Ok(())
        }
    }

    let probe = Arc::new(ContextProbe {
        seen: std::sync::Mutex::new(Vec::new()),
    });
    let (dispatcher, handle) = RollbackDispatcher::spawn(1, FailureHandler::new(probe.clone()));

    let _ctx = ExecutionContext::initialize("G-PROBE");
    ExecutionContext::add_business_info(123, 50);

    let result: Result<(), AppError> = Transaction::execute(&dispatcher, |tx| {
        tx.publish_on_rollback(RollbackNotification::new(
            ExecutionContext::snapshot(),
            123,
            "probe",
        ));
        Err(AppError::payment("declined"))
    });
    assert!(result.is_err());

    handle.shutdown();
    let seen = probe.seen.lock().unwrap();
    assert_eq!(seen.as_slice(), &[("G-PROBE".to_string(), 123)]);
}

#[test]
fn handler_failure_never_disturbs_other_deliveries() {
    let fx = setup();
    fx.notifier.set_failing(true);

    let retryer = scenario_retryer();
    let (_, result) = place_order(&fx.guids, &fx.dispatcher, &fx.store, &retryer, 7, || {
        Err(AppError::deadlock("victim"))
    });
    assert!(result.is_err());

    // Let the pool process the first delivery while the notifier is down.
    std::thread::sleep(Duration::from_millis(300));

    // The failing listener is logged and swallowed; subsequent deliveries
    // succeed once the notifier recovers.
    fx.notifier.set_failing(false);
    let (guid, result) = place_order(&fx.guids, &fx.dispatcher, &fx.store, &retryer, 8, || {
        Err(AppError::deadlock("victim"))
    });
    assert!(result.is_err());

    fx.handle.shutdown();
    let sent = fx.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].guid, guid);
    assert_eq!(sent[0].record_id, 8);
}
