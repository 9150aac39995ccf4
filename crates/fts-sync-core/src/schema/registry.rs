//! Collection schema registry.
//!
//! Owns the base entity tables: creates them, evolves their columns when a
//! collection's fields change, and drops them. Every committed change is
//! published on the [`EventBus`]; deletion additionally publishes a
//! pre-commit request that subscribers may veto.

use super::catalog::SchemaCatalog;
use super::events::{CollectionEventKind, EventBus};
use super::types::CollectionSchema;
use crate::error::{FtsError, Result};
use crate::index::quote_ident;
use crate::store::Store;
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info};

pub struct SchemaRegistry {
    store: Store,
    catalog: SchemaCatalog,
    events: Arc<EventBus>,
}

impl SchemaRegistry {
    pub fn new(store: Store, events: Arc<EventBus>) -> Result<Self> {
        let catalog = SchemaCatalog::new(store.clone())?;
        Ok(Self {
            store,
            catalog,
            events,
        })
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Create a collection and its base table, then publish `Created`.
    pub fn create_collection(&self, schema: CollectionSchema) -> Result<CollectionSchema> {
        schema.validate()?;

        {
            let mut conn = self.store.lock()?;
            if SchemaCatalog::load(&conn, &schema.name)?.is_some() {
                return Err(FtsError::Validation {
                    field: "name".to_string(),
                    message: format!("Collection already exists: {}", schema.name),
                });
            }

            let tx = conn.transaction()?;
            tx.execute(&create_table_sql(&schema, &schema.name), [])?;
            tx.execute(
                "INSERT INTO _collections (name, schema_json) VALUES (?1, ?2)",
                params![schema.name, serde_json::to_string(&schema)?],
            )?;
            tx.commit()?;
        }

        info!("Created collection {}", schema.name);
        self.publish(CollectionEventKind::Created, &schema)?;
        Ok(schema)
    }

    /// Replace a collection's field list, then publish `Updated`.
    ///
    /// Added fields become new columns. When any field is removed the base
    /// table is rebuilt with the surviving columns, keeping row ids stable.
    pub fn update_collection(&self, schema: CollectionSchema) -> Result<CollectionSchema> {
        schema.validate()?;

        {
            let mut conn = self.store.lock()?;
            let current = SchemaCatalog::load(&conn, &schema.name)?.ok_or_else(|| {
                FtsError::SchemaLookup {
                    collection: schema.name.clone(),
                }
            })?;

            if current.primary_key != schema.primary_key {
                return Err(FtsError::Validation {
                    field: "primaryKey".to_string(),
                    message: format!("Primary key of {} cannot change", schema.name),
                });
            }

            let tx = conn.transaction()?;
            evolve_table(&tx, &current, &schema)?;
            tx.execute(
                "UPDATE _collections SET schema_json = ?2 WHERE name = ?1",
                params![schema.name, serde_json::to_string(&schema)?],
            )?;
            tx.commit()?;
        }

        info!("Updated collection {}", schema.name);
        self.publish(CollectionEventKind::Updated, &schema)?;
        Ok(schema)
    }

    /// Drop a collection.
    ///
    /// `DeleteRequest` subscribers run first, while the base table still
    /// exists; any of them failing aborts the deletion.
    pub fn delete_collection(&self, name: &str) -> Result<()> {
        let schema = {
            let conn = self.store.lock()?;
            SchemaCatalog::load(&conn, name)?.ok_or_else(|| FtsError::SchemaLookup {
                collection: name.to_string(),
            })?
        };

        if let Err(e) = self.events.emit(CollectionEventKind::DeleteRequest, &schema) {
            error!("Delete of {} aborted by subscriber: {}", name, e);
            return Err(e);
        }

        {
            let mut conn = self.store.lock()?;
            let tx = conn.transaction()?;
            tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(name)), [])?;
            tx.execute("DELETE FROM _collections WHERE name = ?1", [name])?;
            tx.commit()?;
        }

        info!("Deleted collection {}", name);
        self.publish(CollectionEventKind::Deleted, &schema)
    }

    fn publish(&self, kind: CollectionEventKind, schema: &CollectionSchema) -> Result<()> {
        self.events.emit(kind, schema).map_err(|e| {
            error!(
                "{} handler failed for {} after commit: {}",
                kind.as_str(),
                schema.name,
                e
            );
            e
        })
    }
}

fn create_table_sql(schema: &CollectionSchema, table: &str) -> String {
    let columns: Vec<String> = schema
        .fields
        .iter()
        .map(|field| {
            if field.name == schema.primary_key {
                format!("{} TEXT PRIMARY KEY NOT NULL", quote_ident(&field.name))
            } else {
                format!(
                    "{} {} DEFAULT {}",
                    quote_ident(&field.name),
                    field.kind.column_type(),
                    field.kind.column_default()
                )
            }
        })
        .collect();

    format!("CREATE TABLE {} ({})", quote_ident(table), columns.join(", "))
}

fn evolve_table(
    conn: &Connection,
    current: &CollectionSchema,
    next: &CollectionSchema,
) -> Result<()> {
    let next_names: HashSet<&str> = next.field_names().collect();
    let current_names: HashSet<&str> = current.field_names().collect();
    let removed = current.field_names().any(|name| !next_names.contains(name));

    if removed {
        let tmp = format!("_tmp_{}", next.name);
        let kept: Vec<String> = next
            .field_names()
            .filter(|name| current_names.contains(name))
            .map(quote_ident)
            .collect();

        conn.execute(&create_table_sql(next, &tmp), [])?;
        conn.execute(
            &format!(
                "INSERT INTO {tmp} (rowid, {cols}) SELECT rowid, {cols} FROM {table}",
                tmp = quote_ident(&tmp),
                cols = kept.join(", "),
                table = quote_ident(&next.name),
            ),
            [],
        )?;
        conn.execute(&format!("DROP TABLE {}", quote_ident(&next.name)), [])?;
        conn.execute(
            &format!(
                "ALTER TABLE {} RENAME TO {}",
                quote_ident(&tmp),
                quote_ident(&next.name)
            ),
            [],
        )?;
        debug!("Rebuilt base table {}", next.name);
        return Ok(());
    }

    for field in next.fields.iter().filter(|f| !current_names.contains(f.name.as_str())) {
        conn.execute(
            &format!(
                "ALTER TABLE {} ADD COLUMN {} {} DEFAULT {}",
                quote_ident(&next.name),
                quote_ident(&field.name),
                field.kind.column_type(),
                field.kind.column_default()
            ),
            [],
        )?;
        debug!("Added column {}.{}", next.name, field.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSchema, SchemaSource};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> (SchemaRegistry, Store) {
        let store = Store::open_in_memory().unwrap();
        let registry = SchemaRegistry::new(store.clone(), Arc::new(EventBus::new())).unwrap();
        (registry, store)
    }

    fn columns(store: &Store, table: &str) -> Vec<String> {
        store
            .with_conn(|conn| {
                let mut stmt =
                    conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
                let rows = stmt.query_map([table], |row| row.get(0))?;
                Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
            })
            .unwrap()
    }

    #[test]
    fn test_create_collection_creates_table_and_publishes() {
        let (registry, store) = registry();
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        registry.events().on_collection_created(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        registry
            .create_collection(CollectionSchema::new(
                "bookmarks",
                vec![FieldSchema::text("url")],
            ))
            .unwrap();

        assert_eq!(columns(&store, "bookmarks"), vec!["id", "url"]);
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(registry.catalog().find_collection("bookmarks").is_ok());

        let again = registry.create_collection(CollectionSchema::new("bookmarks", vec![]));
        assert!(matches!(again, Err(FtsError::Validation { .. })));
    }

    #[test]
    fn test_reserved_field_name_creates_nothing() {
        let (registry, store) = registry();
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        registry.events().on_collection_created(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let result = registry.create_collection(CollectionSchema::new(
            "notes",
            vec![FieldSchema::text("body"), FieldSchema::text("Rank")],
        ));
        assert!(matches!(result, Err(FtsError::Validation { .. })));

        assert!(columns(&store, "notes").is_empty());
        assert!(!registry.catalog().exists("notes").unwrap());
        assert_eq!(created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_update_adds_and_removes_columns_keeping_rows() {
        let (registry, store) = registry();
        registry
            .create_collection(CollectionSchema::new(
                "bookmarks",
                vec![FieldSchema::text("url"), FieldSchema::text("note")],
            ))
            .unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO bookmarks (id, url, note) VALUES ('b1', 'https://a.dev', 'x')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        registry
            .update_collection(CollectionSchema::new(
                "bookmarks",
                vec![
                    FieldSchema::text("url"),
                    FieldSchema::text("note"),
                    FieldSchema::text("title"),
                ],
            ))
            .unwrap();
        assert_eq!(columns(&store, "bookmarks"), vec!["id", "url", "note", "title"]);

        registry
            .update_collection(CollectionSchema::new(
                "bookmarks",
                vec![FieldSchema::text("url"), FieldSchema::text("title")],
            ))
            .unwrap();
        assert_eq!(columns(&store, "bookmarks"), vec!["id", "url", "title"]);

        let url: String = store
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT url FROM bookmarks WHERE id = 'b1'", [], |row| {
                    row.get(0)
                })?)
            })
            .unwrap();
        assert_eq!(url, "https://a.dev");
    }

    #[test]
    fn test_delete_request_veto_keeps_collection() {
        let (registry, store) = registry();
        registry
            .create_collection(CollectionSchema::new("notes", vec![]))
            .unwrap();
        registry
            .events()
            .on_collection_delete_request(|_| Err(FtsError::Other("busy".into())));

        assert!(registry.delete_collection("notes").is_err());
        assert!(registry.catalog().exists("notes").unwrap());
        assert!(store
            .with_conn(|conn| Store::table_exists(conn, "notes"))
            .unwrap());
    }

    #[test]
    fn test_delete_collection_drops_table() {
        let (registry, store) = registry();
        registry
            .create_collection(CollectionSchema::new("notes", vec![]))
            .unwrap();
        registry.delete_collection("notes").unwrap();

        assert!(!registry.catalog().exists("notes").unwrap());
        assert!(!store
            .with_conn(|conn| Store::table_exists(conn, "notes"))
            .unwrap());
        assert!(matches!(
            registry.delete_collection("notes"),
            Err(FtsError::SchemaLookup { .. })
        ));
    }
}
