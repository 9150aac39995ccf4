//! Full-text search over a collection's index.
//!
//! A search resolves the collection, translates the raw query, runs a ranked
//! match against the index, then hydrates and expands the matching records.
//! Hydration fetches by id set, so the final list is re-sorted to the rank
//! order the match produced.

use super::ddl::{self, IndexNames};
use super::query::{translate, ProcessedQuery};
use crate::error::{FtsError, Result};
use crate::records::{Record, RecordHydrator};
use crate::schema::{CollectionSchema, SchemaSource};
use crate::store::Store;
use rusqlite::types::ValueRef;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// Runs a processed query against a collection's index.
pub trait MatchExecutor: Send + Sync {
    /// Primary keys of matching rows, best match first. Unreadable keys are `None`.
    fn ranked_ids(
        &self,
        collection: &CollectionSchema,
        query: &ProcessedQuery,
    ) -> Result<Vec<Option<String>>>;
}

/// SQLite FTS5 match executor.
#[derive(Clone)]
pub struct Fts5Matcher {
    store: Store,
}

impl Fts5Matcher {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

impl MatchExecutor for Fts5Matcher {
    fn ranked_ids(
        &self,
        collection: &CollectionSchema,
        query: &ProcessedQuery,
    ) -> Result<Vec<Option<String>>> {
        collection.validate()?;
        let names = IndexNames::for_collection(&collection.name);
        let sql = ddl::ranked_match(&names, &collection.primary_key);

        let conn = self.store.lock()?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| FtsError::query_execution(&collection.name, e))?;
        let rows = stmt
            .query_map([query.as_str()], |row| {
                Ok(match row.get_ref(0)? {
                    ValueRef::Text(raw) => Some(String::from_utf8_lossy(raw).into_owned()),
                    _ => None,
                })
            })
            .map_err(|e| FtsError::query_execution(&collection.name, e))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row.map_err(|e| FtsError::query_execution(&collection.name, e))?);
        }
        Ok(ids)
    }
}

/// Result of a search request.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// The query was blank; nothing was executed.
    NoContent,
    /// Hydrated records, best match first. May be empty.
    Matches(Vec<Record>),
}

/// Resolves free-text searches into hydrated records.
#[derive(Clone)]
pub struct SearchEngine {
    schemas: Arc<dyn SchemaSource>,
    matcher: Arc<dyn MatchExecutor>,
    hydrator: Arc<dyn RecordHydrator>,
    expand: Vec<String>,
}

impl SearchEngine {
    pub fn new(
        schemas: Arc<dyn SchemaSource>,
        matcher: Arc<dyn MatchExecutor>,
        hydrator: Arc<dyn RecordHydrator>,
        expand: Vec<String>,
    ) -> Self {
        Self {
            schemas,
            matcher,
            hydrator,
            expand,
        }
    }

    /// Search `collection` for `raw`.
    pub fn search(&self, collection: &str, raw: &str) -> Result<SearchOutcome> {
        let start = Instant::now();
        let schema = self.schemas.find_collection(collection)?;

        let Some(query) = translate(raw) else {
            debug!("Blank search on {}, nothing to run", collection);
            return Ok(SearchOutcome::NoContent);
        };

        let ranked = self.matcher.ranked_ids(&schema, &query).map_err(|e| {
            error!("Search on {} for {} failed: {}", collection, query, e);
            e
        })?;

        let mut seen = HashSet::new();
        let ids: Vec<String> = ranked
            .into_iter()
            .flatten()
            .filter(|id| seen.insert(id.clone()))
            .collect();

        let records = self.hydrate(&schema, &ids)?;

        debug!(
            "Search on {} for {} returned {} record(s) in {:.2}ms",
            collection,
            query,
            records.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(SearchOutcome::Matches(records))
    }

    fn hydrate(&self, schema: &CollectionSchema, ids: &[String]) -> Result<Vec<Record>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let hydration_error = |e: FtsError| {
            error!("Hydration for {} failed: {}", schema.name, e);
            FtsError::Hydration {
                collection: schema.name.clone(),
                message: e.to_string(),
            }
        };

        let mut records = self
            .hydrator
            .find_by_ids(schema, ids)
            .map_err(hydration_error)?;
        sort_by_rank(&mut records, ids, &schema.primary_key);

        self.hydrator
            .expand(schema, &mut records, &self.expand)
            .map_err(hydration_error)?;
        Ok(records)
    }
}

/// Reorder records to follow `ranked_ids`. Records without a ranked id go last.
fn sort_by_rank(records: &mut [Record], ranked_ids: &[String], primary_key: &str) {
    let position: HashMap<&str, usize> = ranked_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    records.sort_by_key(|record| {
        record
            .get(primary_key)
            .and_then(|v| v.as_str())
            .and_then(|id| position.get(id).copied())
            .unwrap_or(usize::MAX)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSchema;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FixedSchemas;

    impl SchemaSource for FixedSchemas {
        fn find_collection(&self, name: &str) -> Result<CollectionSchema> {
            if name == "bookmarks" {
                Ok(CollectionSchema::new(
                    "bookmarks",
                    vec![FieldSchema::text("url")],
                ))
            } else {
                Err(FtsError::SchemaLookup {
                    collection: name.to_string(),
                })
            }
        }
    }

    #[derive(Default)]
    struct CountingMatcher {
        calls: AtomicUsize,
        queries: Mutex<Vec<String>>,
        ids: Vec<Option<String>>,
    }

    impl MatchExecutor for CountingMatcher {
        fn ranked_ids(
            &self,
            _collection: &CollectionSchema,
            query: &ProcessedQuery,
        ) -> Result<Vec<Option<String>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.ids.clone())
        }
    }

    struct FailingMatcher;

    impl MatchExecutor for FailingMatcher {
        fn ranked_ids(
            &self,
            collection: &CollectionSchema,
            _query: &ProcessedQuery,
        ) -> Result<Vec<Option<String>>> {
            Err(FtsError::QueryExecution {
                collection: collection.name.clone(),
                message: "no such table: bookmarks_fts".to_string(),
                source: None,
            })
        }
    }

    /// Returns records sorted by id, regardless of the requested order.
    #[derive(Default)]
    struct SortedHydrator {
        requested: Mutex<Vec<Vec<String>>>,
        fail_expand: bool,
    }

    impl RecordHydrator for SortedHydrator {
        fn find_by_ids(
            &self,
            _collection: &CollectionSchema,
            ids: &[String],
        ) -> Result<Vec<Record>> {
            self.requested.lock().unwrap().push(ids.to_vec());
            let mut sorted = ids.to_vec();
            sorted.sort();
            Ok(sorted
                .into_iter()
                .map(|id| {
                    let mut record = Record::new();
                    record.insert("id".into(), Value::String(id));
                    record
                })
                .collect())
        }

        fn expand(
            &self,
            _collection: &CollectionSchema,
            records: &mut [Record],
            relations: &[String],
        ) -> Result<()> {
            if self.fail_expand {
                return Err(FtsError::Other("relation target missing".into()));
            }
            for record in records.iter_mut() {
                record.insert("expand".into(), json!({ "relations": relations }));
            }
            Ok(())
        }
    }

    fn engine(matcher: Arc<dyn MatchExecutor>, hydrator: Arc<dyn RecordHydrator>) -> SearchEngine {
        SearchEngine::new(
            Arc::new(FixedSchemas),
            matcher,
            hydrator,
            vec!["tags".into(), "category".into()],
        )
    }

    fn ids_of(outcome: SearchOutcome) -> Vec<String> {
        match outcome {
            SearchOutcome::Matches(records) => records
                .iter()
                .map(|r| r["id"].as_str().unwrap().to_string())
                .collect(),
            SearchOutcome::NoContent => panic!("expected matches"),
        }
    }

    #[test]
    fn test_blank_query_executes_nothing() {
        let matcher = Arc::new(CountingMatcher::default());
        let engine = engine(matcher.clone(), Arc::new(SortedHydrator::default()));

        assert_eq!(engine.search("bookmarks", "").unwrap(), SearchOutcome::NoContent);
        assert_eq!(engine.search("bookmarks", "   ").unwrap(), SearchOutcome::NoContent);
        assert_eq!(matcher.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unknown_collection() {
        let matcher = Arc::new(CountingMatcher::default());
        let engine = engine(matcher.clone(), Arc::new(SortedHydrator::default()));

        let err = engine.search("nope", "rust").unwrap_err();
        assert!(matches!(err, FtsError::SchemaLookup { .. }));
        assert_eq!(matcher.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_translated_query_reaches_matcher() {
        let matcher = Arc::new(CountingMatcher::default());
        let engine = engine(matcher.clone(), Arc::new(SortedHydrator::default()));

        let outcome = engine.search("bookmarks", "hello world").unwrap();
        assert_eq!(outcome, SearchOutcome::Matches(vec![]));
        assert_eq!(
            *matcher.queries.lock().unwrap(),
            vec!["\"hello\"* AND \"world\"*".to_string()]
        );
    }

    #[test]
    fn test_rank_order_preserved_through_hydration() {
        let matcher = Arc::new(CountingMatcher {
            ids: vec![Some("id3".into()), Some("id1".into()), Some("id2".into())],
            ..Default::default()
        });
        let hydrator = Arc::new(SortedHydrator::default());
        let engine = engine(matcher, hydrator.clone());

        let outcome = engine.search("bookmarks", "rust").unwrap();
        if let SearchOutcome::Matches(records) = &outcome {
            assert!(records
                .iter()
                .all(|r| r["expand"]["relations"] == json!(["tags", "category"])));
        }
        assert_eq!(ids_of(outcome), vec!["id3", "id1", "id2"]);
    }

    #[test]
    fn test_unreadable_and_duplicate_ids_skipped() {
        let matcher = Arc::new(CountingMatcher {
            ids: vec![Some("b".into()), None, Some("a".into()), Some("b".into())],
            ..Default::default()
        });
        let hydrator = Arc::new(SortedHydrator::default());
        let engine = engine(matcher, hydrator.clone());

        assert_eq!(ids_of(engine.search("bookmarks", "x").unwrap()), vec!["b", "a"]);
        assert_eq!(
            *hydrator.requested.lock().unwrap(),
            vec![vec!["b".to_string(), "a".to_string()]]
        );
    }

    #[test]
    fn test_query_failure_surfaces() {
        let engine = engine(Arc::new(FailingMatcher), Arc::new(SortedHydrator::default()));
        let err = engine.search("bookmarks", "rust").unwrap_err();
        assert!(matches!(err, FtsError::QueryExecution { .. }));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_hydration_failure_returns_no_partial_results() {
        let matcher = Arc::new(CountingMatcher {
            ids: vec![Some("a".into())],
            ..Default::default()
        });
        let hydrator = Arc::new(SortedHydrator {
            fail_expand: true,
            ..Default::default()
        });
        let engine = engine(matcher, hydrator);

        let err = engine.search("bookmarks", "rust").unwrap_err();
        assert!(matches!(err, FtsError::Hydration { .. }));
    }

    #[test]
    fn test_sort_by_rank_puts_unknown_last() {
        let mut records: Vec<Record> = ["z", "b", "a"]
            .iter()
            .map(|id| {
                let mut r = Record::new();
                r.insert("id".into(), json!(id));
                r
            })
            .collect();
        sort_by_rank(&mut records, &["a".to_string(), "b".to_string()], "id");
        let ids: Vec<_> = records.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "z"]);
    }
}
