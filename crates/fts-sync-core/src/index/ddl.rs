//! Statement generation for external-content FTS5 indexes.
//!
//! All identifiers reaching these builders come from a registered collection
//! schema and are validated before interpolation. Search text never passes
//! through here; it is always bound as a parameter.

use super::definition::IndexDefinition;
use crate::config::IndexConfig;
use crate::error::{FtsError, Result};
use regex::Regex;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Reject anything that is not a plain SQL identifier.
pub fn validate_identifier(name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(FtsError::Validation {
            field: name.to_string(),
            message: "Identifiers must match [A-Za-z_][A-Za-z0-9_]*".to_string(),
        })
    }
}

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quote a string literal, doubling embedded quotes.
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Whether a table's creation SQL declares an FTS5 virtual table.
pub fn is_fts5_table_sql(sql: &str) -> bool {
    let normalized = sql
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase();
    normalized.starts_with("create virtual table") && normalized.contains(" using fts5")
}

/// Names of the objects owned by one collection's index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNames {
    pub collection: String,
    pub table: String,
    pub insert_trigger: String,
    pub update_trigger: String,
    pub delete_trigger: String,
}

impl IndexNames {
    pub fn for_collection(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            table: format!("{}{}", collection, IndexConfig::TABLE_SUFFIX),
            insert_trigger: format!("{}{}", collection, IndexConfig::INSERT_TRIGGER_SUFFIX),
            update_trigger: format!("{}{}", collection, IndexConfig::UPDATE_TRIGGER_SUFFIX),
            delete_trigger: format!("{}{}", collection, IndexConfig::DELETE_TRIGGER_SUFFIX),
        }
    }

    pub fn triggers(&self) -> [&str; 3] {
        [
            &self.insert_trigger,
            &self.update_trigger,
            &self.delete_trigger,
        ]
    }
}

fn column_list(definition: &IndexDefinition) -> String {
    definition
        .fields
        .iter()
        .map(|f| quote_ident(f))
        .collect::<Vec<_>>()
        .join(", ")
}

fn value_list(definition: &IndexDefinition, row: &str) -> String {
    definition
        .fields
        .iter()
        .map(|f| format!("{}.{}", row, quote_ident(f)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `CREATE VIRTUAL TABLE` in external-content mode against the base table.
pub fn create_index_table(definition: &IndexDefinition, tokenizer: &str) -> String {
    let names = IndexNames::for_collection(&definition.collection);
    format!(
        "CREATE VIRTUAL TABLE {} USING fts5({}, content={}, tokenize={})",
        quote_ident(&names.table),
        column_list(definition),
        quote_literal(&definition.collection),
        quote_literal(tokenizer),
    )
}

/// After-insert trigger copying the new row into the index.
pub fn create_insert_trigger(definition: &IndexDefinition) -> String {
    let names = IndexNames::for_collection(&definition.collection);
    format!(
        "CREATE TRIGGER {trigger} AFTER INSERT ON {base} BEGIN \
         INSERT INTO {table}(rowid, {cols}) VALUES (new.rowid, {new}); \
         END",
        trigger = quote_ident(&names.insert_trigger),
        base = quote_ident(&definition.collection),
        table = quote_ident(&names.table),
        cols = column_list(definition),
        new = value_list(definition, "new"),
    )
}

/// After-update trigger: remove the pre-image, then insert the new values.
pub fn create_update_trigger(definition: &IndexDefinition) -> String {
    let names = IndexNames::for_collection(&definition.collection);
    format!(
        "CREATE TRIGGER {trigger} AFTER UPDATE ON {base} BEGIN \
         INSERT INTO {table}({table}, rowid, {cols}) VALUES ('delete', old.rowid, {old}); \
         INSERT INTO {table}(rowid, {cols}) VALUES (new.rowid, {new}); \
         END",
        trigger = quote_ident(&names.update_trigger),
        base = quote_ident(&definition.collection),
        table = quote_ident(&names.table),
        cols = column_list(definition),
        old = value_list(definition, "old"),
        new = value_list(definition, "new"),
    )
}

/// After-delete trigger removing the row's tokens from the index.
pub fn create_delete_trigger(definition: &IndexDefinition) -> String {
    let names = IndexNames::for_collection(&definition.collection);
    format!(
        "CREATE TRIGGER {trigger} AFTER DELETE ON {base} BEGIN \
         INSERT INTO {table}({table}, rowid, {cols}) VALUES ('delete', old.rowid, {old}); \
         END",
        trigger = quote_ident(&names.delete_trigger),
        base = quote_ident(&definition.collection),
        table = quote_ident(&names.table),
        cols = column_list(definition),
        old = value_list(definition, "old"),
    )
}

/// Special FTS5 command issued against the index table itself.
pub fn index_command(names: &IndexNames, command: &str) -> String {
    let table = quote_ident(&names.table);
    format!("INSERT INTO {table}({table}) VALUES ({})", quote_literal(command))
}

pub fn drop_trigger(name: &str) -> String {
    format!("DROP TRIGGER IF EXISTS {}", quote_ident(name))
}

pub fn drop_table(name: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(name))
}

/// Ranked match over the index, yielding the primary key of each hit.
pub fn ranked_match(names: &IndexNames, primary_key: &str) -> String {
    let table = quote_ident(&names.table);
    format!(
        "SELECT {} FROM {table} WHERE {table} MATCH ?1 ORDER BY rank",
        quote_ident(primary_key)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bookmarks() -> IndexDefinition {
        IndexDefinition {
            collection: "bookmarks".to_string(),
            fields: vec!["id".to_string(), "url".to_string()],
        }
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("bookmarks").is_ok());
        assert!(validate_identifier("_tmp_1").is_ok());
        assert!(validate_identifier("1abc").is_err());
        assert!(validate_identifier("a-b").is_err());
        assert!(validate_identifier("x\"; DROP TABLE y; --").is_err());
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("url"), "\"url\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_names() {
        let names = IndexNames::for_collection("bookmarks");
        assert_eq!(names.table, "bookmarks_fts");
        assert_eq!(
            names.triggers(),
            ["bookmarks_fts_insert", "bookmarks_fts_update", "bookmarks_fts_delete"]
        );
    }

    #[test]
    fn test_create_index_table() {
        let sql = create_index_table(&bookmarks(), "unicode61 remove_diacritics 1");
        assert_eq!(
            sql,
            "CREATE VIRTUAL TABLE \"bookmarks_fts\" USING fts5(\"id\", \"url\", \
             content='bookmarks', tokenize='unicode61 remove_diacritics 1')"
        );
    }

    #[test]
    fn test_is_fts5_table_sql() {
        let sql = create_index_table(&bookmarks(), IndexConfig::DEFAULT_TOKENIZER);
        assert!(is_fts5_table_sql(&sql));
        assert!(is_fts5_table_sql("create virtual table t using\n  FTS5 (a)"));
        assert!(!is_fts5_table_sql("CREATE TABLE bookmarks_fts (id TEXT)"));
        assert!(!is_fts5_table_sql("CREATE VIRTUAL TABLE t USING rtree(id, x0, x1)"));
    }

    #[test]
    fn test_update_trigger_deletes_pre_image_first() {
        let sql = create_update_trigger(&bookmarks());
        let delete_at = sql.find("'delete', old.rowid, old.\"id\", old.\"url\"").unwrap();
        let insert_at = sql.find("VALUES (new.rowid, new.\"id\", new.\"url\")").unwrap();
        assert!(delete_at < insert_at);
    }

    #[test]
    fn test_index_command() {
        let names = IndexNames::for_collection("bookmarks");
        assert_eq!(
            index_command(&names, "rebuild"),
            "INSERT INTO \"bookmarks_fts\"(\"bookmarks_fts\") VALUES ('rebuild')"
        );
    }

    #[test]
    fn test_ranked_match_binds_query() {
        let names = IndexNames::for_collection("bookmarks");
        assert_eq!(
            ranked_match(&names, "id"),
            "SELECT \"id\" FROM \"bookmarks_fts\" WHERE \"bookmarks_fts\" MATCH ?1 ORDER BY rank"
        );
    }
}
