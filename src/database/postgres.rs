//! PostgreSQL row writer
//!
//! One session is one transaction on a dedicated connection. Every row is
//! inserted under its own savepoint, so a row the server refuses is rolled
//! back alone and the surrounding transaction stays usable.

use async_trait::async_trait;
use tokio_postgres::{Client, NoTls, Statement};

use super::naming::{TableTarget, quote_ident};
use super::{DatabaseError, DatabaseResult, RowWriter, SessionState};

const ROW_SAVEPOINT: &str = "ndjson_row";

const COLUMN_TYPE_SQL: &str = "SELECT udt_schema::text, udt_name::text \
     FROM information_schema.columns \
     WHERE table_schema = $1 AND table_name = $2 AND column_name = $3";

/// Message of a server error, or the client error text
fn describe(e: &tokio_postgres::Error) -> String {
    e.as_db_error()
        .map(|db| db.message().to_string())
        .unwrap_or_else(|| e.to_string())
}

/// An established PostgreSQL connection
pub struct PostgresConnection {
    client: Client,
}

impl PostgresConnection {
    /// Connect using a URL or a `key=value` descriptor
    ///
    /// Must be called inside a tokio runtime; the connection task is spawned
    /// onto it.
    pub async fn connect(descriptor: &str) -> DatabaseResult<Self> {
        let (client, connection) = tokio_postgres::connect(descriptor, NoTls)
            .await
            .map_err(|e| {
                DatabaseError::ConnectionFailed(format!(
                    "Failed to connect to PostgreSQL: {}",
                    describe(&e)
                ))
            })?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });

        Ok(Self { client })
    }

    /// Underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Resolve the declared type of the target column
    async fn column_type(&self, target: &TableTarget) -> DatabaseResult<(String, String)> {
        let row = self
            .client
            .query_opt(
                COLUMN_TYPE_SQL,
                &[&target.schema, &target.table, &target.column],
            )
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(describe(&e)))?
            .ok_or_else(|| {
                DatabaseError::TableNotFound(format!(
                    "{} (column {}) does not exist",
                    target, target.column
                ))
            })?;

        Ok((row.get(0), row.get(1)))
    }
}

/// Import session holding an open transaction on a PostgreSQL table
pub struct PostgresWriter {
    client: Client,
    target: TableTarget,
    insert: Statement,
    staged: u64,
    state: SessionState,
}

impl PostgresWriter {
    /// Begin a session on `target`
    ///
    /// Fails with [`DatabaseError::TableNotFound`] when the table or column
    /// does not exist. Values are sent as text and cast to the column type on
    /// the server, so `json`, `jsonb` and `text` columns all work.
    pub async fn open(conn: PostgresConnection, target: TableTarget) -> DatabaseResult<Self> {
        let (udt_schema, udt_name) = conn.column_type(&target).await?;
        let client = conn.client;

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ($1::text::{}.{})",
            target.qualified_table(),
            target.quoted_column(),
            quote_ident(&udt_schema),
            quote_ident(&udt_name)
        );

        client
            .batch_execute("BEGIN")
            .await
            .map_err(|e| DatabaseError::TransactionFailed(describe(&e)))?;

        let insert = match client.prepare(&sql).await {
            Ok(statement) => statement,
            Err(e) => {
                let _ = client.batch_execute("ROLLBACK").await;
                return Err(DatabaseError::TableNotFound(format!(
                    "Cannot insert into {}: {}",
                    target,
                    describe(&e)
                )));
            }
        };

        tracing::debug!(
            "Opened PostgreSQL session on {} ({}.{})",
            target,
            udt_schema,
            udt_name
        );

        Ok(Self {
            client,
            target,
            insert,
            staged: 0,
            state: SessionState::Open,
        })
    }

    async fn savepoint(&self, command: &str) -> DatabaseResult<()> {
        self.client
            .batch_execute(&format!("{} {}", command, ROW_SAVEPOINT))
            .await
            .map_err(|e| DatabaseError::TransactionFailed(describe(&e)))
    }
}

#[async_trait(?Send)]
impl RowWriter for PostgresWriter {
    fn target(&self) -> &TableTarget {
        &self.target
    }

    fn state(&self) -> SessionState {
        self.state
    }

    fn staged(&self) -> u64 {
        self.staged
    }

    async fn add_row(&mut self, raw_json: &str) -> DatabaseResult<()> {
        self.ensure_open()?;
        self.savepoint("SAVEPOINT").await?;

        match self.client.execute(&self.insert, &[&raw_json]).await {
            Ok(_) => {
                self.savepoint("RELEASE SAVEPOINT").await?;
                self.staged += 1;
                Ok(())
            }
            Err(e) if e.is_closed() => Err(DatabaseError::TransactionFailed(describe(&e))),
            Err(e) => {
                self.savepoint("ROLLBACK TO SAVEPOINT").await?;
                Err(DatabaseError::InsertFailed(describe(&e)))
            }
        }
    }

    async fn commit(&mut self) -> DatabaseResult<u64> {
        self.ensure_open()?;

        match self.client.batch_execute("COMMIT").await {
            Ok(()) => {
                self.state = SessionState::Committed;
                Ok(self.staged)
            }
            Err(e) => {
                self.state = SessionState::RolledBack;
                Err(DatabaseError::TransactionFailed(format!(
                    "Commit failed: {}",
                    describe(&e)
                )))
            }
        }
    }

    async fn close(&mut self) -> DatabaseResult<()> {
        if self.state != SessionState::Open {
            return Ok(());
        }

        self.state = SessionState::RolledBack;
        self.client
            .batch_execute("ROLLBACK")
            .await
            .map_err(|e| DatabaseError::TransactionFailed(describe(&e)))
    }
}
