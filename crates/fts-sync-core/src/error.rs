//! Error types for the full-text sync engine.
//!
//! Every failure the engine can surface maps onto one of these variants, and
//! each variant knows which HTTP status it should be reported as.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for fts-sync.
#[derive(Debug, Error)]
pub enum FtsError {
    // Schema errors
    #[error("Collection not found: {collection}")]
    SchemaLookup { collection: String },

    // Index lifecycle errors
    #[error("DDL failed for {collection} during {step}: {message}")]
    Ddl {
        collection: String,
        /// Which lifecycle step failed (e.g. "create index table")
        step: &'static str,
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // Search errors
    #[error("Search failed for {collection}: {message}")]
    QueryExecution {
        collection: String,
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("Hydration failed for {collection}: {message}")]
    Hydration { collection: String, message: String },

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for fts-sync operations.
pub type Result<T> = std::result::Result<T, FtsError>;

impl From<std::io::Error> for FtsError {
    fn from(err: std::io::Error) -> Self {
        FtsError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for FtsError {
    fn from(err: serde_json::Error) -> Self {
        FtsError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for FtsError {
    fn from(err: rusqlite::Error) -> Self {
        FtsError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl FtsError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        FtsError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Wrap a failed DDL statement with the collection and step it belonged to.
    pub fn ddl(collection: &str, step: &'static str, err: rusqlite::Error) -> Self {
        FtsError::Ddl {
            collection: collection.to_string(),
            step,
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Wrap a failed search statement.
    pub fn query_execution(collection: &str, err: rusqlite::Error) -> Self {
        FtsError::QueryExecution {
            collection: collection.to_string(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Convert to an HTTP status code.
    ///
    /// - 400: invalid input (validation)
    /// - 404: unknown collection
    /// - 500: everything else
    pub fn status_code(&self) -> u16 {
        match self {
            FtsError::SchemaLookup { .. } => 404,
            FtsError::Validation { .. } => 400,
            _ => 500,
        }
    }

    /// Check whether the error came from the index lifecycle.
    pub fn is_ddl(&self) -> bool {
        matches!(self, FtsError::Ddl { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FtsError::SchemaLookup {
            collection: "bookmarks".into(),
        };
        assert_eq!(err.to_string(), "Collection not found: bookmarks");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            FtsError::SchemaLookup {
                collection: "x".into()
            }
            .status_code(),
            404
        );
        assert_eq!(
            FtsError::Hydration {
                collection: "x".into(),
                message: "boom".into()
            }
            .status_code(),
            500
        );
        assert_eq!(
            FtsError::Validation {
                field: "name".into(),
                message: "bad".into()
            }
            .status_code(),
            400
        );
    }

    #[test]
    fn test_ddl_wraps_step() {
        let err = FtsError::ddl(
            "bookmarks",
            "create index table",
            rusqlite::Error::InvalidQuery,
        );
        assert!(err.is_ddl());
        assert!(err.to_string().contains("create index table"));
    }
}
