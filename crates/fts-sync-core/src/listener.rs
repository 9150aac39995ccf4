//! Keeps target collection indexes in step with their schemas.
//!
//! The listener subscribes to the schema event bus and rebuilds or tears down
//! an index whenever its collection is created, changed or removed. It also
//! reconciles every target once at startup. Row-level changes are handled by
//! the index triggers, never here.

use crate::config::TargetCollectionConfig;
use crate::error::{FtsError, Result};
use crate::index::{IndexDefinition, IndexLifecycle};
use crate::schema::{CollectionSchema, EventBus, SchemaCatalog};
use crate::store::Store;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct SchemaChangeListener {
    store: Store,
    lifecycle: IndexLifecycle,
    targets: Vec<TargetCollectionConfig>,
}

impl SchemaChangeListener {
    pub fn new(
        store: Store,
        lifecycle: IndexLifecycle,
        targets: Vec<TargetCollectionConfig>,
    ) -> Self {
        Self {
            store,
            lifecycle,
            targets,
        }
    }

    /// Target configuration for a collection, if it is indexed.
    pub fn target(&self, collection: &str) -> Option<&TargetCollectionConfig> {
        self.targets.iter().find(|t| t.name == collection)
    }

    /// Subscribe to every schema event this listener handles.
    pub fn register(self: &Arc<Self>, bus: &EventBus) {
        let this = Arc::clone(self);
        bus.on_serve(move || this.reconcile_all().map(|_| ()));

        let this = Arc::clone(self);
        bus.on_collection_created(move |schema| this.on_created(schema));

        let this = Arc::clone(self);
        bus.on_collection_updated(move |schema| this.on_updated(schema));

        let this = Arc::clone(self);
        bus.on_collection_deleted(move |schema| this.on_removed(schema));

        let this = Arc::clone(self);
        bus.on_collection_delete_request(move |schema| this.on_removed(schema));

        debug!(
            "Schema change listener registered for {} target(s)",
            self.targets.len()
        );
    }

    /// Build the index of every target collection that currently exists.
    ///
    /// Targets missing from the catalog are skipped; their index is built when
    /// the collection is created. The first build failure is returned.
    pub fn reconcile_all(&self) -> Result<Vec<IndexDefinition>> {
        let mut built = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            let Some(schema) = self.lookup(&target.name)? else {
                warn!(
                    "Target collection {} does not exist yet, skipping index build",
                    target.name
                );
                continue;
            };
            built.push(self.build(target, &schema)?);
        }
        info!("Reconciled {} full-text index(es)", built.len());
        Ok(built)
    }

    /// Rebuild one target's index from the catalog's current schema.
    pub fn rebuild(&self, collection: &str) -> Result<IndexDefinition> {
        let target = self
            .target(collection)
            .ok_or_else(|| FtsError::Validation {
                field: "collection".to_string(),
                message: format!("{} is not a full-text target", collection),
            })?;
        let schema = self
            .lookup(collection)?
            .ok_or_else(|| FtsError::SchemaLookup {
                collection: collection.to_string(),
            })?;
        self.build(target, &schema)
    }

    fn lookup(&self, collection: &str) -> Result<Option<CollectionSchema>> {
        let conn = self.store.lock()?;
        SchemaCatalog::load(&conn, collection)
    }

    fn build(
        &self,
        target: &TargetCollectionConfig,
        schema: &CollectionSchema,
    ) -> Result<IndexDefinition> {
        let conn = self.store.lock()?;
        self.lifecycle
            .build(&conn, schema, &target.policy)
            .map_err(|e| {
                error!("Failed to build full-text index for {}: {}", schema.name, e);
                e
            })
    }

    fn on_created(&self, schema: &CollectionSchema) -> Result<()> {
        let Some(target) = self.target(&schema.name) else {
            return Ok(());
        };
        self.build(target, schema).map(|_| ())
    }

    fn on_updated(&self, schema: &CollectionSchema) -> Result<()> {
        let Some(target) = self.target(&schema.name) else {
            return Ok(());
        };
        info!("Schema of {} changed, rebuilding its full-text index", schema.name);
        self.teardown(&schema.name)?;
        self.build(target, schema).map(|_| ())
    }

    fn on_removed(&self, schema: &CollectionSchema) -> Result<()> {
        if self.target(&schema.name).is_none() {
            return Ok(());
        }
        self.teardown(&schema.name)
    }

    fn teardown(&self, collection: &str) -> Result<()> {
        let conn = self.store.lock()?;
        self.lifecycle.teardown(&conn, collection).map_err(|e| {
            error!("Failed to tear down full-text index for {}: {}", collection, e);
            e
        })
    }
}
