//! Read side of the schema registry.
//!
//! Collection definitions live in the `_collections` table as JSON. The
//! catalog never caches them, so every lookup reflects the committed state.

use super::types::CollectionSchema;
use crate::error::{FtsError, Result};
use crate::store::Store;
use rusqlite::{Connection, OptionalExtension};
use tracing::error;

/// Lookup of collection schemas by name.
pub trait SchemaSource: Send + Sync {
    /// Resolve a collection, failing with `FtsError::SchemaLookup` when unknown.
    fn find_collection(&self, name: &str) -> Result<CollectionSchema>;
}

#[derive(Clone)]
pub struct SchemaCatalog {
    store: Store,
}

impl SchemaCatalog {
    /// Open the catalog, creating its metadata table if needed.
    pub fn new(store: Store) -> Result<Self> {
        store.with_conn(Self::ensure_schema)?;
        Ok(Self { store })
    }

    fn ensure_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _collections (
                name TEXT PRIMARY KEY NOT NULL,
                schema_json TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Load a collection definition using an already-held connection.
    pub fn load(conn: &Connection, name: &str) -> Result<Option<CollectionSchema>> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT schema_json FROM _collections WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        let conn = self.store.lock()?;
        Ok(Self::load(&conn, name)?.is_some())
    }
}

impl SchemaSource for SchemaCatalog {
    fn find_collection(&self, name: &str) -> Result<CollectionSchema> {
        let conn = self.store.lock()?;
        match Self::load(&conn, name)? {
            Some(schema) => Ok(schema),
            None => {
                error!("Collection lookup failed: {}", name);
                Err(FtsError::SchemaLookup {
                    collection: name.to_string(),
                })
            }
        }
    }
}
