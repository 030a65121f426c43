//! Row writers for the import pipeline
//!
//! A [`RowWriter`] is one transaction-scoped import session bound to a single
//! `schema.table` and a single target column. Each accepted record is stored
//! as an opaque value in that column; JSON fields are never mapped to columns.
//!
//! Failures come in two tiers:
//! - [`RowWriter::add_row`] failures concern one record and leave the session usable
//! - [`RowWriter::commit`] failures concern the whole session and are always fatal

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod config;
pub mod memory;
pub mod naming;
#[cfg(feature = "postgres-backend")]
pub mod postgres;

pub use config::{ConnectionConfig, ImportSection, LoaderConfig, LoaderOverrides};
pub use memory::{MemoryStore, MemoryWriter};
pub use naming::{TableTarget, postgresify, quote_ident, resolve_table_name};
#[cfg(feature = "postgres-backend")]
pub use self::postgres::{PostgresConnection, PostgresWriter};

/// Error type for database operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Target table or column could not be resolved
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// A single row could not be staged
    #[error("Insert failed: {0}")]
    InsertFailed(String),

    /// Transaction could not be started, committed or rolled back
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Session was used after it was committed or rolled back
    #[error("Session already {0}")]
    SessionClosed(SessionState),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}

impl DatabaseError {
    /// Whether the error concerns a single staged record rather than the session
    pub fn is_record_level(&self) -> bool {
        matches!(self, DatabaseError::InsertFailed(_))
    }
}

/// Result type for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Transaction state of an import session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Transaction is open and accepting rows
    Open,
    /// All staged rows were made durable
    Committed,
    /// Staged rows were discarded
    RolledBack,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Open => write!(f, "open"),
            SessionState::Committed => write!(f, "committed"),
            SessionState::RolledBack => write!(f, "rolled back"),
        }
    }
}

/// Transaction-scoped writer for one import run
///
/// Implementations own their connection exclusively for the lifetime of the
/// session. Rows are made visible together at [`commit`](RowWriter::commit)
/// or not at all.
#[async_trait(?Send)]
pub trait RowWriter {
    /// Table and column this session writes to
    fn target(&self) -> &TableTarget;

    /// Current transaction state
    fn state(&self) -> SessionState;

    /// Number of rows staged so far in this session
    fn staged(&self) -> u64;

    /// Stage one raw JSON document for insertion
    ///
    /// An [`DatabaseError::InsertFailed`] error only affects this record; the
    /// session stays usable. Any other error means the session is broken.
    async fn add_row(&mut self, raw_json: &str) -> DatabaseResult<()>;

    /// Make every staged row durable
    ///
    /// Returns the number of rows committed. On failure nothing from this
    /// session is guaranteed durable.
    async fn commit(&mut self) -> DatabaseResult<u64>;

    /// Release the session
    ///
    /// Rolls back if the transaction is still open. Safe to call after commit
    /// and on abort paths.
    async fn close(&mut self) -> DatabaseResult<()>;

    /// Fail with [`DatabaseError::SessionClosed`] unless the transaction is open
    fn ensure_open(&self) -> DatabaseResult<()> {
        match self.state() {
            SessionState::Open => Ok(()),
            state => Err(DatabaseError::SessionClosed(state)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_level_errors() {
        assert!(DatabaseError::InsertFailed("bad row".to_string()).is_record_level());
        assert!(!DatabaseError::TransactionFailed("gone".to_string()).is_record_level());
        assert!(!DatabaseError::SessionClosed(SessionState::Committed).is_record_level());
    }

    #[test]
    fn test_session_state_display() {
        assert_eq!(SessionState::Open.to_string(), "open");
        assert_eq!(SessionState::RolledBack.to_string(), "rolled back");
        assert_eq!(
            DatabaseError::SessionClosed(SessionState::Committed).to_string(),
            "Session already committed"
        );
    }

    #[test]
    fn test_session_state_serialization() {
        let json = serde_json::to_string(&SessionState::RolledBack).unwrap();
        assert_eq!(json, "\"rolled_back\"");
    }
}
