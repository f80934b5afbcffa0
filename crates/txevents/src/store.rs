//! Collaborator seams: record status persistence and the notification side
//! effect. Schema, queries and delivery channels live outside this crate;
//! the in-memory implementations are for tests/dev.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Status field of a business record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordStatus {
    Pending,
    Completed,
    Failed,
}

/// Read/update of a business record's status by id.
pub trait StatusStore: Send + Sync {
    fn status(&self, record_id: u64) -> Option<RecordStatus>;

    fn update_status(&self, record_id: u64, status: RecordStatus) -> anyhow::Result<()>;
}

/// The stubbed failure-notification side effect (SMS/email in the real
/// system).
pub trait FailureNotifier: Send + Sync {
    fn send_failure(&self, guid: &str, record_id: u64, reason: &str) -> anyhow::Result<()>;
}

/// In-memory status store.
#[derive(Debug, Default)]
pub struct InMemoryStatusStore {
    records: Mutex<HashMap<u64, RecordStatus>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record_id: u64, status: RecordStatus) {
        if let Ok(mut records) = self.records.lock() {
            records.insert(record_id, status);
        }
    }
}

impl StatusStore for InMemoryStatusStore {
    fn status(&self, record_id: u64) -> Option<RecordStatus> {
        self.records.lock().ok()?.get(&record_id).copied()
    }

    fn update_status(&self, record_id: u64, status: RecordStatus) -> anyhow::Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| anyhow::anyhow!("status store lock poisoned"))?;
        records.insert(record_id, status);
        Ok(())
    }
}

/// A notification the [`RecordingNotifier`] captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFailure {
    pub guid: String,
    pub record_id: u64,
    pub reason: String,
}

/// Notifier that records every delivery; can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentFailure>>,
    failing: std::sync::atomic::AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `send_failure` call fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentFailure> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl FailureNotifier for RecordingNotifier {
    fn send_failure(&self, guid: &str, record_id: u64, reason: &str) -> anyhow::Result<()> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            anyhow::bail!("notification channel unavailable");
        }

        let mut sent = self
            .sent
            .lock()
            .map_err(|_| anyhow::anyhow!("notifier lock poisoned"))?;
        sent.push(SentFailure {
            guid: guid.to_string(),
            record_id,
            reason: reason.to_string(),
        });
        Ok(())
    }
}
