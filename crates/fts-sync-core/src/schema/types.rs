//! Collection schema definitions.

use crate::config::IndexConfig;
use crate::error::{FtsError, Result};
use crate::index::validate_identifier;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Storage kind of a collection field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    Number,
    Bool,
    Json,
    /// Reference to records of another collection. Multi-relations are stored
    /// as a JSON array of ids, single relations as a plain id.
    #[serde(rename_all = "camelCase")]
    Relation { collection: String, multiple: bool },
}

impl FieldKind {
    /// Column type used for the base table.
    pub fn column_type(&self) -> &'static str {
        match self {
            FieldKind::Text | FieldKind::Relation { .. } => "TEXT",
            FieldKind::Number => "NUMERIC",
            FieldKind::Bool => "BOOLEAN",
            FieldKind::Json => "JSON",
        }
    }

    /// Column default used for the base table.
    pub fn column_default(&self) -> &'static str {
        match self {
            FieldKind::Text => "''",
            FieldKind::Number | FieldKind::Bool => "0",
            FieldKind::Json => "NULL",
            FieldKind::Relation { multiple: true, .. } => "'[]'",
            FieldKind::Relation { multiple: false, .. } => "''",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn relation(
        name: impl Into<String>,
        collection: impl Into<String>,
        multiple: bool,
    ) -> Self {
        Self::new(
            name,
            FieldKind::Relation {
                collection: collection.into(),
                multiple,
            },
        )
    }
}

/// Definition of one collection: its name, primary key and ordered fields.
///
/// `fields` includes the primary-key field itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSchema {
    pub name: String,
    pub primary_key: String,
    pub fields: Vec<FieldSchema>,
}

impl CollectionSchema {
    /// Create a schema with a text `id` primary key followed by `fields`.
    pub fn new(name: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        let mut all = vec![FieldSchema::text(IndexConfig::DEFAULT_PRIMARY_KEY)];
        all.extend(fields);
        Self {
            name: name.into(),
            primary_key: IndexConfig::DEFAULT_PRIMARY_KEY.to_string(),
            fields: all,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Check that every identifier is safe to interpolate and the primary key is present.
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.name)?;
        if self.name.starts_with('_') {
            return Err(FtsError::Validation {
                field: "name".to_string(),
                message: format!("Collection names starting with '_' are reserved: {}", self.name),
            });
        }
        let lower_name = self.name.to_ascii_lowercase();
        if let Some(suffix) = IndexConfig::RESERVED_TABLE_SUFFIXES
            .iter()
            .find(|suffix| lower_name.ends_with(*suffix))
        {
            return Err(FtsError::Validation {
                field: "name".to_string(),
                message: format!(
                    "Collection names ending in '{}' collide with index tables: {}",
                    suffix, self.name
                ),
            });
        }
        // FTS5 exposes a hidden column named after the index table itself.
        let index_table = format!("{}{}", lower_name, IndexConfig::TABLE_SUFFIX);

        let mut seen = HashSet::new();
        for field in &self.fields {
            validate_identifier(&field.name)?;
            let lower = field.name.to_ascii_lowercase();
            if lower == index_table || IndexConfig::RESERVED_FIELD_NAMES.contains(&lower.as_str()) {
                return Err(FtsError::Validation {
                    field: field.name.clone(),
                    message: format!("Reserved by the full-text index: {}", field.name),
                });
            }
            if !seen.insert(lower) {
                return Err(FtsError::Validation {
                    field: field.name.clone(),
                    message: format!("Duplicate field in {}", self.name),
                });
            }
            if let FieldKind::Relation { collection, .. } = &field.kind {
                validate_identifier(collection)?;
            }
        }

        match self.field(&self.primary_key) {
            Some(pk) if pk.kind == FieldKind::Text => Ok(()),
            Some(_) => Err(FtsError::Validation {
                field: self.primary_key.clone(),
                message: "Primary key must be a text field".to_string(),
            }),
            None => Err(FtsError::Validation {
                field: self.primary_key.clone(),
                message: format!("Primary key is not a field of {}", self.name),
            }),
        }
    }
}
