//! Success and failure accounting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::policy::RecordFailure;
use crate::database::{SessionState, TableTarget};

/// Per-session counters, updated once per record
///
/// `succeeded + failed()` always equals the number of records observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCounters {
    /// Records staged by the writer
    pub succeeded: u64,
    /// Records that failed JSON validation
    pub invalid: u64,
    /// Valid records the writer refused
    pub rejected_by_store: u64,
}

impl SessionCounters {
    /// Count a staged record
    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    /// Count a failed record under its cause
    pub fn record_failure(&mut self, failure: &RecordFailure) {
        match failure {
            RecordFailure::InvalidJson(_) => self.invalid += 1,
            RecordFailure::Store(_) => self.rejected_by_store += 1,
        }
    }

    /// Records that failed for any reason
    pub fn failed(&self) -> u64 {
        self.invalid + self.rejected_by_store
    }

    /// Records observed so far
    pub fn observed(&self) -> u64 {
        self.succeeded + self.failed()
    }
}

/// Terminal summary of an import run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    /// Table the run wrote to
    pub target: TableTarget,
    /// Records staged (and committed when `state` is committed)
    pub succeeded: u64,
    /// Records that failed validation or insertion
    pub failed: u64,
    /// Failed records that were not well-formed JSON
    pub invalid: u64,
    /// Failed records the store refused
    pub rejected_by_store: u64,
    /// Final transaction state
    pub state: SessionState,
    /// Input bytes consumed
    pub bytes_read: u64,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Duration of the run
    #[serde(skip)]
    pub duration: Duration,
}

impl ImportOutcome {
    /// Build an outcome from the session's counters
    pub fn new(
        target: TableTarget,
        counters: SessionCounters,
        state: SessionState,
        bytes_read: u64,
        started_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            target,
            succeeded: counters.succeeded,
            failed: counters.failed(),
            invalid: counters.invalid,
            rejected_by_store: counters.rejected_by_store,
            state,
            bytes_read,
            started_at,
            duration,
        }
    }

    /// Records read from the input
    pub fn records(&self) -> u64 {
        self.succeeded + self.failed
    }

    /// Whether the session committed
    pub fn committed(&self) -> bool {
        self.state == SessionState::Committed
    }

    /// Get records per second throughput
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.records() as f64 / secs
        }
    }

    /// Format duration as human-readable string
    pub fn duration_string(&self) -> String {
        let secs = self.duration.as_secs();
        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else {
            format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }
}
