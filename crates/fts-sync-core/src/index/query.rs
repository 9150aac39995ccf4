//! FTS5 query translation.

use std::fmt;

/// A raw search string translated into FTS5 match syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedQuery(String);

impl ProcessedQuery {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Quote a single term and mark it for prefix matching.
///
/// Embedded quotes are doubled before the term is wrapped.
pub fn escape_fts5_term(term: &str) -> String {
    format!("\"{}\"*", term.replace('"', "\"\""))
}

/// Translate a raw search string into an FTS5 expression.
///
/// Every whitespace-separated term must match as a prefix; terms are joined with AND:
/// - "hello world" → `"hello"* AND "world"*`
/// - `say "hi"` → `"say"* AND """hi"""*`
///
/// Returns `None` when the input is blank, in which case no search should run.
pub fn translate(raw: &str) -> Option<ProcessedQuery> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let terms: Vec<String> = trimmed.split_whitespace().map(escape_fts5_term).collect();
    Some(ProcessedQuery(terms.join(" AND ")))
}
