//! In-process row store
//!
//! Backs `--dry-run` imports and the test suite. Tables have to be declared
//! before a session can be opened on them, so a missing table or column fails
//! at open time the same way it does against PostgreSQL. Staged rows only
//! become visible in the store on commit.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::naming::TableTarget;
use super::{DatabaseError, DatabaseResult, RowWriter, SessionState};

/// Predicate deciding whether the store accepts a row
pub type RowCheck = Box<dyn Fn(&str) -> Result<(), String>>;

#[derive(Debug, Default)]
struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<String>,
}

/// Shared in-memory catalog of tables
///
/// Cloning yields another handle to the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<HashMap<(String, String), MemoryTable>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> DatabaseResult<MutexGuard<'_, HashMap<(String, String), MemoryTable>>> {
        self.tables
            .lock()
            .map_err(|e| DatabaseError::ConnectionFailed(format!("Lock error: {}", e)))
    }

    /// Declare a table with the given columns
    ///
    /// Declaring an existing table replaces its columns and keeps its rows.
    pub fn create_table(&self, schema: &str, table: &str, columns: &[&str]) -> DatabaseResult<()> {
        let mut tables = self.lock()?;
        let entry = tables
            .entry((schema.to_string(), table.to_string()))
            .or_default();
        entry.columns = columns.iter().map(|c| c.to_string()).collect();
        Ok(())
    }

    /// Committed values of a table, in insertion order
    pub fn rows(&self, schema: &str, table: &str) -> DatabaseResult<Vec<String>> {
        let tables = self.lock()?;
        tables
            .get(&(schema.to_string(), table.to_string()))
            .map(|t| t.rows.clone())
            .ok_or_else(|| DatabaseError::TableNotFound(format!("{}.{}", schema, table)))
    }

    /// Number of committed rows in a table
    pub fn row_count(&self, schema: &str, table: &str) -> DatabaseResult<usize> {
        self.rows(schema, table).map(|rows| rows.len())
    }

    fn resolve(&self, target: &TableTarget) -> DatabaseResult<()> {
        let tables = self.lock()?;
        let table = tables
            .get(&(target.schema.clone(), target.table.clone()))
            .ok_or_else(|| DatabaseError::TableNotFound(target.to_string()))?;

        if !table.columns.iter().any(|c| c == &target.column) {
            return Err(DatabaseError::TableNotFound(format!(
                "{} has no column {}",
                target, target.column
            )));
        }

        Ok(())
    }

    fn append(&self, target: &TableTarget, rows: Vec<String>) -> DatabaseResult<()> {
        let mut tables = self.lock()?;
        let table = tables
            .get_mut(&(target.schema.clone(), target.table.clone()))
            .ok_or_else(|| DatabaseError::TableNotFound(target.to_string()))?;
        table.rows.extend(rows);
        Ok(())
    }
}

/// Import session against a [`MemoryStore`]
pub struct MemoryWriter {
    store: MemoryStore,
    target: TableTarget,
    pending: Vec<String>,
    state: SessionState,
    check: Option<RowCheck>,
    commit_failure: Option<String>,
}

impl MemoryWriter {
    /// Open a session on a declared table and column
    pub fn open(store: &MemoryStore, target: TableTarget) -> DatabaseResult<Self> {
        store.resolve(&target)?;
        tracing::debug!("Opened in-memory session on {}", target);

        Ok(Self {
            store: store.clone(),
            target,
            pending: Vec::new(),
            state: SessionState::Open,
            check: None,
            commit_failure: None,
        })
    }

    /// Reject rows for which `check` returns an error
    ///
    /// Rejected rows fail with [`DatabaseError::InsertFailed`], like a
    /// constraint or type error in a real store.
    pub fn reject_when(mut self, check: impl Fn(&str) -> Result<(), String> + 'static) -> Self {
        self.check = Some(Box::new(check));
        self
    }

    /// Make the commit fail with the given message
    pub fn fail_commit(mut self, message: impl Into<String>) -> Self {
        self.commit_failure = Some(message.into());
        self
    }
}

#[async_trait(?Send)]
impl RowWriter for MemoryWriter {
    fn target(&self) -> &TableTarget {
        &self.target
    }

    fn state(&self) -> SessionState {
        self.state
    }

    fn staged(&self) -> u64 {
        self.pending.len() as u64
    }

    async fn add_row(&mut self, raw_json: &str) -> DatabaseResult<()> {
        self.ensure_open()?;

        if let Some(check) = &self.check {
            check(raw_json).map_err(DatabaseError::InsertFailed)?;
        }

        self.pending.push(raw_json.to_string());
        Ok(())
    }

    async fn commit(&mut self) -> DatabaseResult<u64> {
        self.ensure_open()?;

        if let Some(message) = self.commit_failure.take() {
            self.pending.clear();
            self.state = SessionState::RolledBack;
            return Err(DatabaseError::TransactionFailed(message));
        }

        let rows = std::mem::take(&mut self.pending);
        let count = rows.len() as u64;
        self.store.append(&self.target, rows)?;
        self.state = SessionState::Committed;

        Ok(count)
    }

    async fn close(&mut self) -> DatabaseResult<()> {
        if self.state == SessionState::Open {
            self.pending.clear();
            self.state = SessionState::RolledBack;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_users() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_table("import", "users", &["data"]).unwrap();
        store
    }

    #[tokio::test]
    async fn test_commit_makes_rows_visible() {
        let store = store_with_users();
        let mut writer =
            MemoryWriter::open(&store, TableTarget::new("import", "users", "data")).unwrap();

        writer.add_row(r#"{"id": 1}"#).await.unwrap();
        writer.add_row(r#"{"id": 2}"#).await.unwrap();
        assert_eq!(writer.staged(), 2);
        assert_eq!(store.row_count("import", "users").unwrap(), 0);

        assert_eq!(writer.commit().await.unwrap(), 2);
        assert_eq!(writer.state(), SessionState::Committed);
        assert_eq!(
            store.rows("import", "users").unwrap(),
            vec![r#"{"id": 1}"#.to_string(), r#"{"id": 2}"#.to_string()]
        );
    }

    #[tokio::test]
    async fn test_close_without_commit_rolls_back() {
        let store = store_with_users();
        let mut writer =
            MemoryWriter::open(&store, TableTarget::new("import", "users", "data")).unwrap();

        writer.add_row("1").await.unwrap();
        writer.close().await.unwrap();

        assert_eq!(writer.state(), SessionState::RolledBack);
        assert_eq!(store.row_count("import", "users").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_close_after_commit_is_safe() {
        let store = store_with_users();
        let mut writer =
            MemoryWriter::open(&store, TableTarget::new("import", "users", "data")).unwrap();

        writer.add_row("true").await.unwrap();
        writer.commit().await.unwrap();
        writer.close().await.unwrap();

        assert_eq!(writer.state(), SessionState::Committed);
        assert_eq!(store.row_count("import", "users").unwrap(), 1);
    }

    #[test]
    fn test_open_unknown_table() {
        let store = store_with_users();
        let result = MemoryWriter::open(&store, TableTarget::new("import", "orders", "data"));
        assert!(matches!(result, Err(DatabaseError::TableNotFound(_))));
    }

    #[test]
    fn test_open_unknown_column() {
        let store = store_with_users();
        let result = MemoryWriter::open(&store, TableTarget::new("import", "users", "payload"));
        assert!(matches!(result, Err(DatabaseError::TableNotFound(_))));
    }

    #[tokio::test]
    async fn test_rejected_row_keeps_session_usable() {
        let store = store_with_users();
        let mut writer = MemoryWriter::open(&store, TableTarget::new("import", "users", "data"))
            .unwrap()
            .reject_when(|raw| {
                if raw.contains("\\u0000") {
                    Err("unsupported Unicode escape sequence".to_string())
                } else {
                    Ok(())
                }
            });

        let err = writer.add_row(r#"{"name": "a\u0000b"}"#).await.unwrap_err();
        assert!(err.is_record_level());

        writer.add_row(r#"{"name": "ab"}"#).await.unwrap();
        assert_eq!(writer.commit().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_commit_failure_discards_rows() {
        let store = store_with_users();
        let mut writer = MemoryWriter::open(&store, TableTarget::new("import", "users", "data"))
            .unwrap()
            .fail_commit("disk full");

        writer.add_row("{}").await.unwrap();
        let err = writer.commit().await.unwrap_err();

        assert!(matches!(err, DatabaseError::TransactionFailed(_)));
        assert_eq!(writer.state(), SessionState::RolledBack);
        assert_eq!(store.row_count("import", "users").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_use_after_commit() {
        let store = store_with_users();
        let mut writer =
            MemoryWriter::open(&store, TableTarget::new("import", "users", "data")).unwrap();

        writer.commit().await.unwrap();
        let err = writer.add_row("{}").await.unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::SessionClosed(SessionState::Committed)
        ));
        assert!(writer.commit().await.is_err());
    }
}
