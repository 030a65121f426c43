//! Import orchestration
//!
//! The driver reads records in stream order, validates each one, stages the
//! valid ones with the writer and applies the failure policy to every record
//! that fails either step. At end of input it commits. It is the only place
//! that turns record-level failures into a fatal outcome.

use chrono::Utc;
use std::io::{BufRead, Write};
use std::time::Instant;

use super::policy::{FailurePolicy, RecordFailure, RejectSink};
use super::reader::{Record, RecordReader};
use super::stats::{ImportOutcome, SessionCounters};
use super::validator;
use super::{ImportError, ImportFailure, preview};
use crate::database::RowWriter;

/// Runs one import session from first record to commit or rollback
pub struct ImportDriver<W, S: Write> {
    writer: W,
    policy: FailurePolicy,
    rejects: RejectSink<S>,
    counters: SessionCounters,
}

impl<W: RowWriter, S: Write> ImportDriver<W, S> {
    /// Create a driver over an already opened session
    pub fn new(writer: W, policy: FailurePolicy, rejects: RejectSink<S>) -> Self {
        Self {
            writer,
            policy,
            rejects,
            counters: SessionCounters::default(),
        }
    }

    /// Counters so far
    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    /// Consume every record, then commit
    ///
    /// The writer is closed on every path. On failure the returned
    /// [`ImportFailure`] carries the counts reached and the rolled-back state.
    pub async fn run<R: BufRead>(
        mut self,
        mut reader: RecordReader<R>,
    ) -> Result<ImportOutcome, ImportFailure> {
        let started_at = Utc::now();
        let start = Instant::now();
        tracing::info!(
            "Importing into {} with {} policy",
            self.writer.target(),
            self.policy
        );

        let mut result = self.process(&mut reader).await;
        if result.is_ok() {
            result = self.finalize().await;
        }

        if let Err(e) = self.writer.close().await {
            tracing::warn!("Failed to release import session: {}", e);
        }
        if let Err(e) = self.rejects.flush() {
            if result.is_ok() {
                result = Err(ImportError::RejectSink(e));
            } else {
                tracing::warn!("Failed to flush rejected records: {}", e);
            }
        }

        let outcome = ImportOutcome::new(
            self.writer.target().clone(),
            self.counters,
            self.writer.state(),
            reader.bytes_read(),
            started_at,
            start.elapsed(),
        );

        match result {
            Ok(()) => Ok(outcome),
            Err(error) => {
                tracing::debug!(
                    "Import into {} aborted after {} records: {}",
                    outcome.target,
                    outcome.records(),
                    error
                );
                Err(ImportFailure { error, outcome })
            }
        }
    }

    async fn process<R: BufRead>(&mut self, reader: &mut RecordReader<R>) -> Result<(), ImportError> {
        while let Some(record) = reader.next_record().map_err(|source| ImportError::Read {
            record: reader.records_read() + 1,
            source,
        })? {
            self.handle(record).await?;
        }
        Ok(())
    }

    async fn handle(&mut self, record: Record) -> Result<(), ImportError> {
        let failure = match validator::validate(record.as_bytes()) {
            Err(e) => RecordFailure::InvalidJson(e.to_string()),
            Ok(()) => match std::str::from_utf8(record.as_bytes()) {
                Err(e) => RecordFailure::InvalidJson(e.to_string()),
                Ok(raw_json) => match self.writer.add_row(raw_json).await {
                    Ok(()) => {
                        self.counters.record_success();
                        return Ok(());
                    }
                    Err(e) if e.is_record_level() => RecordFailure::Store(e.to_string()),
                    Err(e) => return Err(ImportError::Writer(e)),
                },
            },
        };

        self.reject(record, failure)
    }

    fn reject(&mut self, record: Record, failure: RecordFailure) -> Result<(), ImportError> {
        self.counters.record_failure(&failure);

        if !self.policy.tolerates_failures() {
            return Err(ImportError::Rejected {
                record: record.number(),
                reason: failure,
                preview: preview(record.as_bytes()),
            });
        }

        tracing::debug!("Skipping record {}: {}", record.number(), failure);
        self.rejects
            .emit(record.as_bytes())
            .map_err(ImportError::RejectSink)
    }

    async fn finalize(&mut self) -> Result<(), ImportError> {
        let committed = self.writer.commit().await.map_err(ImportError::Commit)?;
        tracing::info!(
            "Committed {} rows into {} ({} failed)",
            committed,
            self.writer.target(),
            self.counters.failed()
        );
        if self.counters.failed() > 0 {
            tracing::info!(
                "{} records skipped ({} invalid JSON, {} refused by the store)",
                self.counters.failed(),
                self.counters.invalid,
                self.counters.rejected_by_store
            );
        }
        Ok(())
    }
}
