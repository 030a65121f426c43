//! Streaming import pipeline
//!
//! Records flow one way through the pipeline:
//! - [`RecordReader`] splits the input stream into one record per line
//! - [`is_valid_json`] checks each record is well-formed JSON
//! - a [`RowWriter`](crate::database::RowWriter) stages valid records in one transaction
//! - [`FailurePolicy`] decides whether a failed record aborts the run or is skipped
//!
//! [`ImportDriver`] runs the loop, commits at end of input and reports an
//! [`ImportOutcome`]. Progress observation taps the byte stream through
//! [`progress::CountingReader`] without touching pipeline state.

pub mod driver;
pub mod policy;
pub mod progress;
pub mod reader;
pub mod stats;
pub mod validator;

pub use driver::ImportDriver;
pub use policy::{FailurePolicy, RecordFailure, RejectSink};
pub use reader::{Record, RecordReader};
pub use stats::{ImportOutcome, SessionCounters};
pub use validator::{is_valid_json, validate};

use crate::database::DatabaseError;

/// Longest record excerpt carried in error messages
const PREVIEW_LIMIT: usize = 256;

/// Fatal error that ends an import run
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The input stream failed for a reason other than end of input
    #[error("Could not read record {record}: {source}")]
    Read {
        record: u64,
        #[source]
        source: std::io::Error,
    },

    /// A record failed under the strict policy
    #[error("Record {record} rejected ({reason}): {preview}")]
    Rejected {
        record: u64,
        reason: RecordFailure,
        preview: String,
    },

    /// The session-level commit failed
    #[error("Could not commit: {0}")]
    Commit(#[source] DatabaseError),

    /// The session broke while staging rows
    #[error("Import session failed: {0}")]
    Writer(#[source] DatabaseError),

    /// A rejected record could not be written to the side channel
    #[error("Could not write rejected record: {0}")]
    RejectSink(#[source] std::io::Error),
}

/// A fatal error together with the counts reached before the run stopped
#[derive(Debug, thiserror::Error)]
#[error("{error} ({} records read, {} staged, transaction {})", .outcome.records(), .outcome.succeeded, .outcome.state)]
pub struct ImportFailure {
    /// What stopped the run
    pub error: ImportError,
    /// Counts at the time of the failure
    pub outcome: ImportOutcome,
}

/// Lossy, length-limited rendering of a record for diagnostics
pub(crate) fn preview(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.chars().count() > PREVIEW_LIMIT {
        let truncated: String = text.chars().take(PREVIEW_LIMIT).collect();
        format!("{}...", truncated)
    } else {
        text.into_owned()
    }
}
