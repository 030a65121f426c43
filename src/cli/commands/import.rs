//! `json` command: stream an NDJSON file or stdin into a table

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::cli::error::CliError;
use crate::database::{
    ImportSection, LoaderConfig, MemoryStore, MemoryWriter, RowWriter, TableTarget,
};
use crate::import::progress::{CountingReader, ProgressReporter};
use crate::import::{ImportDriver, ImportOutcome, RecordReader, RejectSink};

/// Read buffer in front of the record splitter
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Input source for import operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    File(PathBuf),
    Stdin,
}

impl InputSource {
    /// `-` means standard input, anything else is a path
    pub fn parse(input: &str) -> Self {
        if input == "-" {
            InputSource::Stdin
        } else {
            InputSource::File(PathBuf::from(input))
        }
    }

    /// Path of a file input
    pub fn path(&self) -> Option<&Path> {
        match self {
            InputSource::File(path) => Some(path),
            InputSource::Stdin => None,
        }
    }

    /// Open the source, with its total size when known
    fn open(&self) -> Result<(Box<dyn Read>, Option<u64>), CliError> {
        match self {
            InputSource::File(path) => {
                if !path.exists() {
                    return Err(CliError::FileNotFound(path.clone()));
                }
                let file = File::open(path)
                    .map_err(|e| CliError::FileReadError(path.clone(), e.to_string()))?;
                let total = file.metadata().ok().map(|m| m.len());
                Ok((Box::new(file), total))
            }
            InputSource::Stdin => Ok((Box::new(io::stdin().lock()), None)),
        }
    }
}

/// Arguments for the `json` command
#[derive(Debug, Clone)]
pub struct ImportJsonArgs {
    pub input: InputSource,
    /// Fully resolved configuration (file, environment and flags applied)
    pub config: LoaderConfig,
    /// Run against an in-memory table instead of the database
    pub dry_run: bool,
    /// Print the outcome as JSON
    pub json: bool,
}

/// Reject channel: the `--rejects` file, or standard error
fn open_rejects(path: Option<&Path>) -> Result<RejectSink<Box<dyn Write>>, CliError> {
    let out: Box<dyn Write> = match path {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| CliError::FileWriteError(path.to_path_buf(), e.to_string()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(io::stderr()),
    };
    Ok(RejectSink::new(out))
}

/// Import every record of the input into the configured table
pub fn handle_import_json(args: &ImportJsonArgs) -> Result<ImportOutcome, CliError> {
    let config = &args.config;
    let target = config.target(args.input.path());

    let (source, total) = args.input.open()?;
    let source = CountingReader::new(source);
    let progress = ProgressReporter::start(source.counter(), total, config.import.progress);
    let reader = RecordReader::new(BufReader::with_capacity(READ_BUFFER_SIZE, source));

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))?;

    let result = rt.block_on(async {
        if args.dry_run {
            import_dry_run(&config.import, target, reader).await
        } else {
            import_postgres(config, target, reader).await
        }
    });

    match &result {
        Ok(_) => progress.finish(),
        Err(_) => progress.abandon(),
    }

    let outcome = result?;
    print_summary(&outcome, args.json, args.dry_run)?;
    Ok(outcome)
}

/// Drive an opened session
///
/// The reject channel is opened only now, so a run that fails to open its
/// session leaves an existing rejects file untouched.
async fn run<W, R>(
    mut writer: W,
    settings: &ImportSection,
    reader: RecordReader<R>,
) -> Result<ImportOutcome, CliError>
where
    W: RowWriter,
    R: BufRead,
{
    let rejects = match open_rejects(settings.rejects.as_deref()) {
        Ok(rejects) => rejects,
        Err(e) => {
            if let Err(close) = writer.close().await {
                tracing::debug!("Failed to release import session: {}", close);
            }
            return Err(e);
        }
    };

    Ok(ImportDriver::new(writer, settings.policy, rejects)
        .run(reader)
        .await?)
}

async fn import_dry_run<R: BufRead>(
    settings: &ImportSection,
    target: TableTarget,
    reader: RecordReader<R>,
) -> Result<ImportOutcome, CliError> {
    let store = MemoryStore::new();
    store.create_table(&target.schema, &target.table, &[target.column.as_str()])?;
    let writer = MemoryWriter::open(&store, target)?;
    tracing::info!("Dry run: rows are staged in memory only");

    run(writer, settings, reader).await
}

#[cfg(feature = "postgres-backend")]
async fn import_postgres<R: BufRead>(
    config: &LoaderConfig,
    target: TableTarget,
    reader: RecordReader<R>,
) -> Result<ImportOutcome, CliError> {
    use crate::database::{PostgresConnection, PostgresWriter};

    tracing::info!("Connecting to {}", config.connection.masked());
    let conn = PostgresConnection::connect(&config.connection.descriptor()).await?;
    let writer = PostgresWriter::open(conn, target).await?;

    run(writer, &config.import, reader).await
}

#[cfg(not(feature = "postgres-backend"))]
async fn import_postgres<R: BufRead>(
    _config: &LoaderConfig,
    _target: TableTarget,
    _reader: RecordReader<R>,
) -> Result<ImportOutcome, CliError> {
    Err(CliError::InvalidArgument(
        "PostgreSQL support not enabled. Enable 'postgres-backend' feature or use --dry-run."
            .to_string(),
    ))
}

fn print_summary(outcome: &ImportOutcome, json: bool, dry_run: bool) -> Result<(), CliError> {
    if json {
        let output = serde_json::to_string_pretty(outcome)
            .map_err(|e| CliError::IoError(format!("Failed to serialize outcome: {}", e)))?;
        println!("{}", output);
        return Ok(());
    }

    let verb = if dry_run { "validated for" } else { "imported into" };
    println!(
        "{} rows {} {} in {}",
        outcome.succeeded,
        verb,
        outcome.target,
        outcome.duration_string()
    );
    if outcome.failed > 0 {
        println!(
            "{} records skipped ({} invalid JSON, {} refused by the store)",
            outcome.failed, outcome.invalid, outcome.rejected_by_store
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_source_parse() {
        assert_eq!(InputSource::parse("-"), InputSource::Stdin);
        assert_eq!(
            InputSource::parse("events.ndjson"),
            InputSource::File(PathBuf::from("events.ndjson"))
        );
        assert!(InputSource::Stdin.path().is_none());
    }

    #[test]
    fn test_missing_input_file() {
        let args = ImportJsonArgs {
            input: InputSource::File(PathBuf::from("/nonexistent/events.ndjson")),
            config: LoaderConfig::new(),
            dry_run: true,
            json: false,
        };

        assert!(matches!(
            handle_import_json(&args),
            Err(CliError::FileNotFound(_))
        ));
    }
}
