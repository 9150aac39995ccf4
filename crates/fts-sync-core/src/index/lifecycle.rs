//! FTS5 index setup and teardown.
//!
//! An index is an external-content FTS5 table over the collection's base
//! table plus three row-level triggers that keep its tokens in sync. The field
//! list is fixed when the table is created, so any schema change goes through
//! a full teardown and build.
//!
//! Build and teardown run as a sequence of independent statements. They are
//! not wrapped in a transaction: a failure part-way leaves whatever was
//! already created in place, and calling [`IndexLifecycle::build`] again is
//! the recovery path.

use super::ddl::{self, IndexNames};
use super::definition::{build_index_definition, IndexDefinition};
use crate::config::{IndexConfig, InclusionPolicy};
use crate::error::{FtsError, Result};
use crate::schema::CollectionSchema;
use crate::store::Store;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Builds and tears down per-collection indexes.
#[derive(Debug, Clone)]
pub struct IndexLifecycle {
    tokenizer: String,
}

impl Default for IndexLifecycle {
    fn default() -> Self {
        Self::new(IndexConfig::DEFAULT_TOKENIZER)
    }
}

impl IndexLifecycle {
    pub fn new(tokenizer: impl Into<String>) -> Self {
        Self {
            tokenizer: tokenizer.into(),
        }
    }

    /// Check if the index table exists.
    pub fn table_exists(&self, conn: &Connection, collection: &str) -> Result<bool> {
        Store::table_exists(conn, &IndexNames::for_collection(collection).table)
    }

    /// Check that all three maintenance triggers exist.
    pub fn triggers_exist(&self, conn: &Connection, collection: &str) -> Result<bool> {
        let names = IndexNames::for_collection(collection);
        for trigger in names.triggers() {
            if !Store::trigger_exists(conn, trigger)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Field list of the live index table, in declaration order.
    pub fn index_fields(&self, conn: &Connection, collection: &str) -> Result<Vec<String>> {
        let names = IndexNames::for_collection(collection);
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
        let rows = stmt.query_map([&names.table], |row| row.get(0))?;

        let mut fields = Vec::new();
        for row in rows {
            fields.push(row?);
        }
        Ok(fields)
    }

    /// Tear down any existing index, then create table, triggers and backfill.
    ///
    /// Returns the definition the index was built from. The first failing step
    /// aborts the build and is returned as [`FtsError::Ddl`].
    pub fn build(
        &self,
        conn: &Connection,
        schema: &CollectionSchema,
        policy: &InclusionPolicy,
    ) -> Result<IndexDefinition> {
        schema.validate()?;
        let definition = build_index_definition(schema, policy);
        let names = IndexNames::for_collection(&schema.name);

        // Triggers can outlive their table, so teardown runs whether or not the table exists.
        self.teardown(conn, &schema.name)?;

        let steps = [
            (
                "create index table",
                ddl::create_index_table(&definition, &self.tokenizer),
            ),
            ("create insert trigger", ddl::create_insert_trigger(&definition)),
            ("create update trigger", ddl::create_update_trigger(&definition)),
            ("create delete trigger", ddl::create_delete_trigger(&definition)),
            ("rebuild index", ddl::index_command(&names, "rebuild")),
        ];

        for (step, sql) in steps {
            if let Err(e) = conn.execute(&sql, []) {
                error!("Index build for {} failed at {}: {}", schema.name, step, e);
                return Err(FtsError::ddl(&schema.name, step, e));
            }
            debug!("{}: {}", schema.name, step);
        }

        info!(
            "Built full-text index {} with fields [{}]",
            names.table,
            definition.fields.join(", ")
        );
        Ok(definition)
    }

    /// Remove the index table and its triggers.
    ///
    /// A table under the index name that is not an FTS5 table is left alone
    /// and reported as [`FtsError::Ddl`] before anything is dropped.
    /// Trigger drops and the content clear are best-effort and only logged.
    /// Dropping the table itself is the one step whose failure is returned.
    pub fn teardown(&self, conn: &Connection, collection: &str) -> Result<()> {
        let names = IndexNames::for_collection(collection);

        let existing = Store::table_sql(conn, &names.table)?;
        if let Some(sql) = existing.filter(|sql| !ddl::is_fts5_table_sql(sql)) {
            error!("Refusing to drop {}: not an FTS5 index table ({})", names.table, sql);
            return Err(FtsError::Ddl {
                collection: collection.to_string(),
                step: "drop index table",
                message: format!("{} exists and is not an FTS5 index table", names.table),
                source: None,
            });
        }

        for trigger in names.triggers() {
            if let Err(e) = conn.execute(&ddl::drop_trigger(trigger), []) {
                warn!("Failed to drop trigger {}: {}", trigger, e);
            }
        }

        match self.table_exists(conn, collection) {
            Ok(true) => {
                if let Err(e) = conn.execute(&ddl::index_command(&names, "delete-all"), []) {
                    warn!("Failed to clear index table {}: {}", names.table, e);
                }
            }
            Ok(false) => {}
            Err(e) => warn!("Failed to inspect index table {}: {}", names.table, e),
        }

        if let Err(e) = conn.execute(&ddl::drop_table(&names.table), []) {
            error!("Failed to drop index table {}: {}", names.table, e);
            return Err(FtsError::ddl(collection, "drop index table", e));
        }

        info!("Tore down full-text index {}", names.table);
        Ok(())
    }

    /// Merge the index b-trees.
    pub fn optimize(&self, conn: &Connection, collection: &str) -> Result<()> {
        let names = IndexNames::for_collection(collection);
        conn.execute(&ddl::index_command(&names, "optimize"), [])
            .map_err(|e| FtsError::ddl(collection, "optimize index", e))?;
        debug!("Optimized full-text index {}", names.table);
        Ok(())
    }

    /// Get statistics about a collection's index.
    pub fn stats(&self, conn: &Connection, collection: &str) -> Result<IndexStats> {
        let names = IndexNames::for_collection(collection);
        let exists = self.table_exists(conn, collection)?;

        let (fields, row_count) = if exists {
            // The docsize shadow table holds one row per indexed document.
            let row_count: usize = conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM {}",
                    ddl::quote_ident(&format!("{}_docsize", names.table))
                ),
                [],
                |row| row.get(0),
            )?;
            (self.index_fields(conn, collection)?, row_count)
        } else {
            (Vec::new(), 0)
        };

        Ok(IndexStats {
            collection: collection.to_string(),
            table_name: names.table,
            exists,
            triggers_present: self.triggers_exist(conn, collection)?,
            fields,
            row_count,
            tokenizer: self.tokenizer.clone(),
        })
    }
}

/// Statistics about one collection's index.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub collection: String,
    pub table_name: String,
    pub exists: bool,
    pub triggers_present: bool,
    pub fields: Vec<String>,
    pub row_count: usize,
    pub tokenizer: String,
}
