//! Record hydration: fetch rows by id and expand relation fields.

use crate::config::IndexConfig;
use crate::error::Result;
use crate::index::quote_ident;
use crate::schema::{CollectionSchema, FieldKind, SchemaCatalog, SchemaSource};
use crate::store::Store;
use rusqlite::types::ValueRef;
use rusqlite::Row;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A hydrated record: column values keyed by field name.
pub type Record = Map<String, Value>;

/// Key under which expanded relations are attached.
pub const EXPAND_KEY: &str = "expand";
/// Key carrying the owning collection's name.
pub const COLLECTION_KEY: &str = "collectionName";

/// Fetches records by id and expands their relations.
pub trait RecordHydrator: Send + Sync {
    /// Fetch records of `collection` whose primary key is in `ids`. Order is unspecified.
    fn find_by_ids(&self, collection: &CollectionSchema, ids: &[String]) -> Result<Vec<Record>>;

    /// Attach related records for each named relation field under `expand`.
    fn expand(
        &self,
        collection: &CollectionSchema,
        records: &mut [Record],
        relations: &[String],
    ) -> Result<()>;
}

/// SQLite-backed hydrator reading the base entity tables.
#[derive(Clone)]
pub struct RecordStore {
    store: Store,
    catalog: SchemaCatalog,
}

impl RecordStore {
    pub fn new(store: Store, catalog: SchemaCatalog) -> Self {
        Self { store, catalog }
    }

    fn row_to_record(
        schema: &CollectionSchema,
        columns: &[String],
        row: &Row,
    ) -> rusqlite::Result<Record> {
        let mut record = Record::new();
        record.insert(COLLECTION_KEY.to_string(), Value::String(schema.name.clone()));

        for (i, column) in columns.iter().enumerate() {
            let kind = schema.field(column).map(|f| &f.kind);
            record.insert(column.clone(), column_value(kind, row.get_ref(i)?));
        }
        Ok(record)
    }
}

fn column_value(kind: Option<&FieldKind>, value: ValueRef<'_>) -> Value {
    match (kind, value) {
        (_, ValueRef::Null) => Value::Null,
        (Some(FieldKind::Bool), ValueRef::Integer(n)) => Value::Bool(n != 0),
        (Some(FieldKind::Json), ValueRef::Text(raw))
        | (Some(FieldKind::Relation { multiple: true, .. }), ValueRef::Text(raw)) => {
            let text = String::from_utf8_lossy(raw);
            serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.into_owned()))
        }
        (_, ValueRef::Integer(n)) => Value::from(n),
        (_, ValueRef::Real(f)) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        (_, ValueRef::Text(raw)) => Value::String(String::from_utf8_lossy(raw).into_owned()),
        (_, ValueRef::Blob(raw)) => Value::String(hex::encode(raw)),
    }
}

/// Ids referenced by a relation value: a single id or an array of ids.
fn relation_ids(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(id)) if !id.is_empty() => vec![id.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

impl RecordHydrator for RecordStore {
    fn find_by_ids(&self, collection: &CollectionSchema, ids: &[String]) -> Result<Vec<Record>> {
        collection.validate()?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.store.lock()?;
        let mut records = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(IndexConfig::MAX_IDS_PER_STATEMENT) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT * FROM {} WHERE {} IN ({})",
                quote_ident(&collection.name),
                quote_ident(&collection.primary_key),
                placeholders
            );

            let mut stmt = conn.prepare(&sql)?;
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let rows = stmt.query_map(rusqlite::params_from_iter(chunk.iter()), |row| {
                Self::row_to_record(collection, &columns, row)
            })?;
            for row in rows {
                records.push(row?);
            }
        }

        debug!(
            "Hydrated {} of {} requested {} record(s)",
            records.len(),
            ids.len(),
            collection.name
        );
        Ok(records)
    }

    fn expand(
        &self,
        collection: &CollectionSchema,
        records: &mut [Record],
        relations: &[String],
    ) -> Result<()> {
        for relation in relations {
            let Some(field) = collection.field(relation) else {
                continue;
            };
            let FieldKind::Relation {
                collection: target,
                multiple,
            } = &field.kind
            else {
                continue;
            };

            let mut seen = HashSet::new();
            let ids: Vec<String> = records
                .iter()
                .flat_map(|r| relation_ids(r.get(relation)))
                .filter(|id| seen.insert(id.clone()))
                .collect();
            if ids.is_empty() {
                continue;
            }

            let target_schema = self.catalog.find_collection(target)?;
            let related: HashMap<String, Record> = self
                .find_by_ids(&target_schema, &ids)?
                .into_iter()
                .filter_map(|r| {
                    let id = r.get(&target_schema.primary_key)?.as_str()?.to_string();
                    Some((id, r))
                })
                .collect();

            for record in records.iter_mut() {
                let found: Vec<Value> = relation_ids(record.get(relation))
                    .iter()
                    .filter_map(|id| related.get(id).cloned().map(Value::Object))
                    .collect();

                let expanded = if *multiple {
                    if found.is_empty() {
                        continue;
                    }
                    Value::Array(found)
                } else {
                    match found.into_iter().next() {
                        Some(value) => value,
                        None => continue,
                    }
                };

                let slot = record
                    .entry(EXPAND_KEY.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(map) = slot {
                    map.insert(relation.clone(), expanded);
                }
            }
        }
        Ok(())
    }
}
