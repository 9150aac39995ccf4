//! fts-sync - Full-text search index synchronization for SQLite collections.
//!
//! Each target collection gets an external-content FTS5 index whose field list
//! follows the collection's schema and whose content follows its rows. Schema
//! changes arrive through the [`EventBus`] and trigger a full rebuild; row
//! changes are applied by triggers inside the database.
//!
//! # Example
//!
//! ```rust,ignore
//! use fts_sync::{CollectionSchema, FieldSchema, FtsSync, SearchOutcome, SyncConfig};
//!
//! fn main() -> fts_sync::Result<()> {
//!     let sync = FtsSync::open(SyncConfig::default())?;
//!     sync.serve()?;
//!
//!     sync.registry().create_collection(CollectionSchema::new(
//!         "bookmarks",
//!         vec![FieldSchema::text("url")],
//!     ))?;
//!
//!     if let SearchOutcome::Matches(records) = sync.search("bookmarks", "docs rs")? {
//!         println!("Found {} bookmarks", records.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod index;
pub mod listener;
pub mod records;
pub mod schema;
pub mod store;

pub use config::{InclusionPolicy, IndexConfig, ServerConfig, SyncConfig, TargetCollectionConfig};
pub use error::{FtsError, Result};
pub use index::{
    build_index_definition, translate, Fts5Matcher, IndexDefinition, IndexLifecycle, IndexStats,
    MatchExecutor, ProcessedQuery, SearchEngine, SearchOutcome,
};
pub use listener::SchemaChangeListener;
pub use records::{Record, RecordHydrator, RecordStore};
pub use schema::{
    CollectionEventKind, CollectionSchema, EventBus, FieldKind, FieldSchema, SchemaCatalog,
    SchemaRegistry, SchemaSource,
};
pub use store::Store;

use std::sync::Arc;
use tracing::info;

/// Engine entry point: wires the store, schema registry, listener and search.
pub struct FtsSync {
    config: SyncConfig,
    store: Store,
    registry: SchemaRegistry,
    listener: Arc<SchemaChangeListener>,
    lifecycle: IndexLifecycle,
    search: SearchEngine,
}

impl FtsSync {
    /// Open the database named in `config` and register the listener.
    ///
    /// Indexes are not touched until [`FtsSync::serve`] is called.
    pub fn open(config: SyncConfig) -> Result<Self> {
        let store = Store::open(&config.database_path)?;
        Self::with_store(config, store)
    }

    /// Same as [`FtsSync::open`], on an existing store.
    pub fn with_store(config: SyncConfig, store: Store) -> Result<Self> {
        config.validate()?;

        let events = Arc::new(EventBus::new());
        let registry = SchemaRegistry::new(store.clone(), Arc::clone(&events))?;
        let lifecycle = IndexLifecycle::new(config.tokenizer.clone());

        let listener = Arc::new(SchemaChangeListener::new(
            store.clone(),
            lifecycle.clone(),
            config.targets.clone(),
        ));
        listener.register(&events);

        let search = SearchEngine::new(
            Arc::new(registry.catalog().clone()),
            Arc::new(Fts5Matcher::new(store.clone())),
            Arc::new(RecordStore::new(store.clone(), registry.catalog().clone())),
            config.expand.clone(),
        );

        info!(
            "fts-sync ready with {} target collection(s)",
            config.targets.len()
        );

        Ok(Self {
            config,
            store,
            registry,
            listener,
            lifecycle,
            search,
        })
    }

    /// Signal that the host is about to serve; reconciles every target index.
    pub fn serve(&self) -> Result<()> {
        self.registry.events().emit_serve()
    }

    /// Full-text search over one collection.
    pub fn search(&self, collection: &str, raw: &str) -> Result<SearchOutcome> {
        self.search.search(collection, raw)
    }

    /// Rebuild one target's index from its current schema.
    pub fn rebuild_index(&self, collection: &str) -> Result<IndexDefinition> {
        self.listener.rebuild(collection)
    }

    pub fn index_stats(&self, collection: &str) -> Result<IndexStats> {
        let conn = self.store.lock()?;
        self.lifecycle.stats(&conn, collection)
    }

    /// Merge a collection's index segments.
    pub fn optimize_index(&self, collection: &str) -> Result<()> {
        let conn = self.store.lock()?;
        self.lifecycle.optimize(&conn, collection)
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }
}
