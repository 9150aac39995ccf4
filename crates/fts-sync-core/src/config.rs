//! Centralized configuration for fts-sync.
//!
//! `IndexConfig` carries the naming and tokenizer constants used when generating
//! index DDL. `SyncConfig` is the runtime configuration loaded once at startup:
//! which collections get an index, and how each one selects its fields.

use crate::error::{FtsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Index naming and tokenizer constants.
pub struct IndexConfig;

impl IndexConfig {
    pub const TABLE_SUFFIX: &'static str = "_fts";
    pub const INSERT_TRIGGER_SUFFIX: &'static str = "_fts_insert";
    pub const UPDATE_TRIGGER_SUFFIX: &'static str = "_fts_update";
    pub const DELETE_TRIGGER_SUFFIX: &'static str = "_fts_delete";
    pub const DEFAULT_TOKENIZER: &'static str = "unicode61 remove_diacritics 1";
    pub const DEFAULT_PRIMARY_KEY: &'static str = "id";
    /// Table name endings owned by an index and its FTS5 shadow tables.
    pub const RESERVED_TABLE_SUFFIXES: &'static [&'static str] = &[
        "_fts",
        "_fts_data",
        "_fts_idx",
        "_fts_content",
        "_fts_docsize",
        "_fts_config",
    ];
    /// Column names FTS5 and SQLite reserve on an index table.
    pub const RESERVED_FIELD_NAMES: &'static [&'static str] = &["rank", "rowid", "oid", "_rowid_"];
    /// Upper bound on bound parameters per hydration statement.
    pub const MAX_IDS_PER_STATEMENT: usize = 500;
}

/// Server and store configuration.
pub struct ServerConfig;

impl ServerConfig {
    pub const DEFAULT_API_PREFIX: &'static str = "api/collections";
    pub const DEFAULT_DATABASE_FILE: &'static str = "fts_sync.db";
    pub const DEFAULT_EXPAND: &'static [&'static str] = &["tags", "category"];
}

/// Which fields of a collection go into its index (besides the primary key).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum InclusionPolicy {
    /// Every non-key field, in schema order.
    #[default]
    AllFields,
    /// Only the named fields, still in schema order.
    Only { fields: Vec<String> },
}

impl InclusionPolicy {
    /// Whether a (non-key) field is selected by this policy.
    pub fn includes(&self, field: &str) -> bool {
        match self {
            InclusionPolicy::AllFields => true,
            InclusionPolicy::Only { fields } => fields.iter().any(|f| f == field),
        }
    }
}

/// A collection that receives a full-text index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCollectionConfig {
    pub name: String,
    #[serde(default)]
    pub policy: InclusionPolicy,
}

impl TargetCollectionConfig {
    pub fn all_fields(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            policy: InclusionPolicy::AllFields,
        }
    }

    pub fn only(name: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            name: name.into(),
            policy: InclusionPolicy::Only {
                fields: fields.iter().map(|f| f.to_string()).collect(),
            },
        }
    }
}

/// Runtime configuration, fixed for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// SQLite database holding both the base tables and their indexes.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Route prefix for the search endpoint, without leading/trailing slashes.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// Collections that get a full-text index.
    #[serde(default = "default_targets")]
    pub targets: Vec<TargetCollectionConfig>,
    /// Relation fields expanded on every search hit.
    #[serde(default = "default_expand")]
    pub expand: Vec<String>,
    /// FTS5 tokenizer specification.
    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,
}

fn default_database_path() -> PathBuf {
    PathBuf::from(ServerConfig::DEFAULT_DATABASE_FILE)
}

fn default_api_prefix() -> String {
    ServerConfig::DEFAULT_API_PREFIX.to_string()
}

fn default_targets() -> Vec<TargetCollectionConfig> {
    vec![TargetCollectionConfig::only("bookmarks", &["url"])]
}

fn default_expand() -> Vec<String> {
    ServerConfig::DEFAULT_EXPAND
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_tokenizer() -> String {
    IndexConfig::DEFAULT_TOKENIZER.to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            api_prefix: default_api_prefix(),
            targets: default_targets(),
            expand: default_expand(),
            tokenizer: default_tokenizer(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from a JSON file. Missing keys fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| FtsError::io_with_path(e, path))?;
        let config: SyncConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject duplicate targets and names that could never be a table.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for target in &self.targets {
            crate::index::validate_identifier(&target.name)?;
            let lower = target.name.to_ascii_lowercase();
            if IndexConfig::RESERVED_TABLE_SUFFIXES
                .iter()
                .any(|suffix| lower.ends_with(suffix))
            {
                return Err(FtsError::Validation {
                    field: target.name.clone(),
                    message: "Target names must not end in an index table suffix".to_string(),
                });
            }
            if !seen.insert(target.name.as_str()) {
                return Err(FtsError::Config {
                    message: format!("Duplicate target collection: {}", target.name),
                });
            }
        }
        if self.tokenizer.trim().is_empty() {
            return Err(FtsError::Config {
                message: "Tokenizer must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_targets_bookmarks_url() {
        let config = SyncConfig::default();
        let target = config
            .targets
            .iter()
            .find(|t| t.name == "bookmarks")
            .expect("default target");
        assert!(target.policy.includes("url"));
        assert!(!target.policy.includes("description"));
        assert_eq!(config.expand, vec!["tags", "category"]);
    }

    #[test]
    fn test_from_file_with_partial_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "apiPrefix": "v1",
                "targets": [
                    {"name": "notes"},
                    {"name": "bookmarks", "policy": {"mode": "only", "fields": ["url", "title"]}}
                ]
            }"#,
        )
        .unwrap();

        let config = SyncConfig::from_file(&path).unwrap();
        assert_eq!(config.api_prefix, "v1");
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.targets[0].policy, InclusionPolicy::AllFields);
        assert!(config.targets[1].policy.includes("title"));
        assert_eq!(config.tokenizer, IndexConfig::DEFAULT_TOKENIZER);
    }

    #[test]
    fn test_duplicate_targets_rejected() {
        let config = SyncConfig {
            targets: vec![
                TargetCollectionConfig::all_fields("notes"),
                TargetCollectionConfig::all_fields("notes"),
            ],
            ..SyncConfig::default()
        };
        assert!(matches!(config.validate(), Err(FtsError::Config { .. })));
    }

    #[test]
    fn test_invalid_target_name_rejected() {
        let config = SyncConfig {
            targets: vec![TargetCollectionConfig::all_fields("notes; DROP TABLE x")],
            ..SyncConfig::default()
        };
        assert!(matches!(config.validate(), Err(FtsError::Validation { .. })));
    }

    #[test]
    fn test_index_table_target_name_rejected() {
        let config = SyncConfig {
            targets: vec![TargetCollectionConfig::all_fields("Notes_FTS_data")],
            ..SyncConfig::default()
        };
        assert!(matches!(config.validate(), Err(FtsError::Validation { .. })));
    }
}
