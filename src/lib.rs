//! NDJSON Loader - bulk-load newline-delimited JSON into a relational table
//!
//! Provides the streaming import pipeline:
//! - Record reading (one JSON document per line, no line-length limit)
//! - Per-record syntax validation
//! - A transaction-scoped row writer with record-level and session-level failures
//! - Strict / tolerant failure policies with a side channel for rejected records
//! - Byte-level progress observation of the input stream

#[cfg(feature = "cli")]
pub mod cli;
pub mod database;
pub mod import;

pub use database::{
    DatabaseError, DatabaseResult, LoaderConfig, MemoryStore, MemoryWriter, RowWriter,
    SessionState, TableTarget,
};
#[cfg(feature = "postgres-backend")]
pub use database::{PostgresConnection, PostgresWriter};
pub use import::{
    FailurePolicy, ImportDriver, ImportError, ImportFailure, ImportOutcome, Record, RecordReader,
    RejectSink, is_valid_json,
};
