//! CLI binary entry point for ndjson-loader

use clap::{Parser, Subcommand};
use ndjson_loader::LoaderConfig;
use ndjson_loader::cli::commands::import::{ImportJsonArgs, InputSource, handle_import_json};
use ndjson_loader::cli::error::CliError;
use ndjson_loader::cli::logging;
use ndjson_loader::database::LoaderOverrides;
use ndjson_loader::database::config::sample_config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ndjson-loader")]
#[command(about = "Bulk-load newline-delimited JSON into a PostgreSQL table")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Full connection URL; wins over the individual connection flags
    #[arg(long, global = true)]
    url: Option<String>,

    /// Database host
    #[arg(long, global = true)]
    host: Option<String>,

    /// Database port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Database name
    #[arg(long, global = true)]
    dbname: Option<String>,

    /// Database user
    #[arg(long, global = true)]
    username: Option<String>,

    /// Database password
    #[arg(long, global = true)]
    pass: Option<String>,

    /// Target schema
    #[arg(long, global = true)]
    schema: Option<String>,

    /// Target table (defaults to the input file name)
    #[arg(long, global = true)]
    table: Option<String>,

    /// Column receiving each JSON document
    #[arg(long, global = true)]
    column: Option<String>,

    /// Skip records that fail validation or insertion instead of aborting
    #[arg(long, global = true)]
    ignore_errors: bool,

    /// Write skipped records to this file instead of standard error
    #[arg(long, global = true)]
    rejects: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long, global = true)]
    no_progress: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Import an NDJSON file (or '-' for stdin) into a table
    Json {
        /// Input file path, or '-' for stdin
        input: String,
        /// Validate and count records without touching the database
        #[arg(long)]
        dry_run: bool,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a sample configuration file
    Config,
}

impl Cli {
    fn overrides(&self) -> LoaderOverrides {
        LoaderOverrides {
            url: self.url.clone(),
            host: self.host.clone(),
            port: self.port,
            dbname: self.dbname.clone(),
            user: self.username.clone(),
            password: self.pass.clone(),
            schema: self.schema.clone(),
            table: self.table.clone(),
            column: self.column.clone(),
            ignore_errors: self.ignore_errors,
            rejects: self.rejects.clone(),
            no_progress: self.no_progress,
        }
    }

    fn loader_config(&self) -> Result<LoaderConfig, CliError> {
        let mut config = LoaderConfig::load(self.config.as_deref())?;
        config.apply(self.overrides());
        Ok(config)
    }
}

fn main() {
    let cli = Cli::parse();

    let result = logging::init(cli.verbose).and_then(|()| match &cli.command {
        Commands::Json {
            input,
            dry_run,
            json,
        } => cli.loader_config().and_then(|config| {
            let args = ImportJsonArgs {
                input: InputSource::parse(input),
                config,
                dry_run: *dry_run,
                json: *json,
            };
            handle_import_json(&args).map(|_| ())
        }),
        Commands::Config => {
            print!("{}", sample_config());
            Ok(())
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
