//! Log output for the binary
//!
//! Logs share standard error with the default reject channel, so nothing at
//! or above the default level may be emitted by a run that succeeds.

use std::io::IsTerminal;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::MakeWriter;

use crate::cli::error::CliError;

/// Maximum level for a `-v` count
pub fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Subscriber writing log lines to `writer`
pub fn subscriber<W>(
    verbose: u8,
    writer: W,
    ansi: bool,
) -> impl tracing::Subscriber + Send + Sync + 'static
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    FmtSubscriber::builder()
        .with_max_level(log_level(verbose))
        .with_target(false)
        .with_ansi(ansi)
        .with_writer(writer)
        .finish()
}

/// Install the global subscriber on standard error
///
/// Colours are only used when standard error is a terminal.
pub fn init(verbose: u8) -> Result<(), CliError> {
    let ansi = std::io::stderr().is_terminal();
    tracing::subscriber::set_global_default(subscriber(verbose, std::io::stderr, ansi))
        .map_err(|e| CliError::IoError(format!("Failed to initialize logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level_is_warn() {
        assert_eq!(log_level(0), Level::WARN);
        assert_eq!(log_level(1), Level::INFO);
        assert_eq!(log_level(2), Level::DEBUG);
        assert_eq!(log_level(9), Level::TRACE);
    }
}
