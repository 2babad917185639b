use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::dispatch::JobStatus;

/// Optional persistence collaborator for terminal status transitions.
///
/// The engine emits one `{job_id, item_id, status}` triple per terminal
/// transition when a sink is configured; the dispatch core functions
/// without one.
pub trait StatusSink: Send + Sync {
    fn record(&self, job_id: &str, item_id: &str, status: JobStatus);
}

/// One recorded status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub job_id: String,
    pub item_id: String,
    pub status: JobStatus,
}

/// In-memory sink for tests and the CLI demo.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<StatusRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<StatusRecord> {
        self.records.lock().expect("sink lock poisoned").clone()
    }
}

impl StatusSink for MemorySink {
    fn record(&self, job_id: &str, item_id: &str, status: JobStatus) {
        self.records.lock().expect("sink lock poisoned").push(StatusRecord {
            job_id: job_id.to_string(),
            item_id: item_id.to_string(),
            status,
        });
    }
}
