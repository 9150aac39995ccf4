//! SQLite FTS5 collection indexes.
//!
//! This module provides:
//! - Index field selection from a collection schema
//! - DDL for external-content FTS5 tables and their sync triggers
//! - Index build, teardown and maintenance
//! - Query translation and ranked search with record hydration

pub mod ddl;
mod definition;
mod lifecycle;
mod query;
mod search;

pub use ddl::{quote_ident, validate_identifier, IndexNames};
pub use definition::{build_index_definition, IndexDefinition};
pub use lifecycle::{IndexLifecycle, IndexStats};
pub use query::{escape_fts5_term, translate, ProcessedQuery};
pub use search::{Fts5Matcher, MatchExecutor, SearchEngine, SearchOutcome};
