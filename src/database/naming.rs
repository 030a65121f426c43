//! Target table naming
//!
//! Derives the target table name from the input file when none is given and
//! quotes identifiers for use in generated SQL.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

static RE_NON_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9_]").expect("Invalid regex"));

/// Table name used when reading from standard input
pub const STDIN_TABLE_NAME: &str = "stdin";

/// Normalize a name into a lowercase PostgreSQL identifier
///
/// Every character outside `[a-z0-9_]` becomes `_` and a leading digit is
/// prefixed with `_`.
pub fn postgresify(identifier: &str) -> String {
    let lowered = identifier.trim().to_lowercase();
    let mut name = RE_NON_IDENTIFIER.replace_all(&lowered, "_").into_owned();

    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }

    name
}

/// Resolve the target table name
///
/// An explicit name wins. Otherwise the input file's base name without its
/// extension is used, or `stdin` when there is no input file.
pub fn resolve_table_name(explicit: Option<&str>, input: Option<&Path>) -> String {
    if let Some(name) = explicit.filter(|n| !n.trim().is_empty()) {
        return postgresify(name);
    }

    let stem = input
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| STDIN_TABLE_NAME.to_string());

    postgresify(&stem)
}

/// Quote an identifier for PostgreSQL
pub fn quote_ident(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Table and column an import session writes to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableTarget {
    /// Schema name
    pub schema: String,
    /// Table name
    pub table: String,
    /// Column receiving the raw JSON document
    pub column: String,
}

impl TableTarget {
    /// Create a new target
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            column: column.into(),
        }
    }

    /// Quoted `"schema"."table"` for SQL statements
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }

    /// Quoted column name for SQL statements
    pub fn quoted_column(&self) -> String {
        quote_ident(&self.column)
    }
}

impl std::fmt::Display for TableTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_postgresify() {
        assert_eq!(postgresify("Users"), "users");
        assert_eq!(postgresify("friends-of friends"), "friends_of_friends");
        assert_eq!(postgresify("2015_sales"), "_2015_sales");
        assert_eq!(postgresify("  events.2024 "), "events_2024");
        assert_eq!(postgresify(""), "_");
    }

    #[test]
    fn test_resolve_from_filename() {
        let path = PathBuf::from("/data/exports/Customer Orders.json");
        assert_eq!(resolve_table_name(None, Some(&path)), "customer_orders");

        let path = PathBuf::from("dump.2024-01.jsonl");
        assert_eq!(resolve_table_name(None, Some(&path)), "dump_2024_01");
    }

    #[test]
    fn test_resolve_explicit_wins() {
        let path = PathBuf::from("ignored.json");
        assert_eq!(resolve_table_name(Some("Events"), Some(&path)), "events");
        assert_eq!(resolve_table_name(Some("  "), Some(&path)), "ignored");
    }

    #[test]
    fn test_resolve_stdin() {
        assert_eq!(resolve_table_name(None, None), "stdin");
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("data"), "\"data\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_table_target() {
        let target = TableTarget::new("import", "users", "data");
        assert_eq!(target.qualified_table(), "\"import\".\"users\"");
        assert_eq!(target.quoted_column(), "\"data\"");
        assert_eq!(target.to_string(), "import.users");
    }
}
