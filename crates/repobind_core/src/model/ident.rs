//! Identifier validation shared by registries and query construction.

use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));
static PATH_IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(::[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("valid path identifier regex")
});

/// Plain identifier: table, column, alias.
pub(crate) fn is_identifier(value: &str) -> bool {
    IDENTIFIER_RE.is_match(value)
}

/// Wraps a validated identifier in double quotes so SQL keywords stay usable
/// as aliases, tables and columns.
pub(crate) fn quoted(value: &str) -> String {
    format!("\"{value}\"")
}

/// Identifier optionally qualified with `::` segments: repository and entity names.
pub(crate) fn is_path_identifier(value: &str) -> bool {
    PATH_IDENTIFIER_RE.is_match(value)
}
