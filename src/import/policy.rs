//! Failure policy and the rejected-record side channel

use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// How the pipeline reacts to a record that fails validation or insertion
///
/// Chosen once at startup and fixed for the run. Both kinds of record
/// failure go through the same branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Abort the run on the first failed record; nothing is committed
    #[default]
    Strict,
    /// Count failed records, emit them to the side channel and continue
    Tolerant,
}

impl FailurePolicy {
    /// Whether record-level failures let the run continue
    pub fn tolerates_failures(self) -> bool {
        matches!(self, FailurePolicy::Tolerant)
    }
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(FailurePolicy::Strict),
            "tolerant" => Ok(FailurePolicy::Tolerant),
            _ => Err(format!(
                "Unknown failure policy: {}. Use 'strict' or 'tolerant'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::Strict => write!(f, "strict"),
            FailurePolicy::Tolerant => write!(f, "tolerant"),
        }
    }
}

/// Why a record was not imported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFailure {
    /// The record is not well-formed JSON
    InvalidJson(String),
    /// The store refused the row
    Store(String),
}

impl std::fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordFailure::InvalidJson(msg) => write!(f, "invalid JSON: {}", msg),
            RecordFailure::Store(msg) => write!(f, "insert failed: {}", msg),
        }
    }
}

/// Side channel for rejected records
///
/// Each record is written verbatim followed by a single `\n`.
pub struct RejectSink<W: Write> {
    out: W,
    written: u64,
}

impl<W: Write> RejectSink<W> {
    /// Wrap a writer
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    /// Write one rejected record
    pub fn emit(&mut self, raw: &[u8]) -> io::Result<()> {
        self.out.write_all(raw)?;
        self.out.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Number of records written
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush buffered records
    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Unwrap the underlying writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_strict() {
        assert_eq!(FailurePolicy::default(), FailurePolicy::Strict);
        assert!(!FailurePolicy::Strict.tolerates_failures());
        assert!(FailurePolicy::Tolerant.tolerates_failures());
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "strict".parse::<FailurePolicy>().unwrap(),
            FailurePolicy::Strict
        );
        assert_eq!(
            "Tolerant".parse::<FailurePolicy>().unwrap(),
            FailurePolicy::Tolerant
        );
        assert!("lenient".parse::<FailurePolicy>().is_err());
    }

    #[test]
    fn test_policy_display_round_trips() {
        for policy in [FailurePolicy::Strict, FailurePolicy::Tolerant] {
            assert_eq!(policy.to_string().parse::<FailurePolicy>().unwrap(), policy);
        }
    }

    #[test]
    fn test_sink_writes_verbatim_lines() {
        let mut sink = RejectSink::new(Vec::new());
        sink.emit(b"{\"broken\": ").unwrap();
        sink.emit(b"").unwrap();
        sink.emit(b"not json \xff").unwrap();

        assert_eq!(sink.written(), 3);
        assert_eq!(sink.into_inner(), b"{\"broken\": \n\nnot json \xff\n".to_vec());
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(
            RecordFailure::Store("value too long".to_string()).to_string(),
            "insert failed: value too long"
        );
    }
}
