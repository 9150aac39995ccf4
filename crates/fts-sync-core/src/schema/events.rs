//! Typed event bus for collection lifecycle notifications.
//!
//! Subscribers register one handler per event class. Handlers run
//! synchronously, in registration order, on the thread that emits the event.
//! The first handler error stops dispatch and is returned to the emitter, so a
//! failing pre-commit handler aborts the operation it guards.

use super::types::CollectionSchema;
use crate::error::{FtsError, Result};
use std::sync::RwLock;
use tracing::debug;

/// Handler for collection-scoped events.
pub type CollectionHook = Box<dyn Fn(&CollectionSchema) -> Result<()> + Send + Sync + 'static>;

/// Handler for the once-per-process serve notification.
pub type ServeHook = Box<dyn Fn() -> Result<()> + Send + Sync + 'static>;

/// Classes of collection event published by the schema registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionEventKind {
    /// Collection created and committed.
    Created,
    /// Collection schema changed and committed.
    Updated,
    /// Collection dropped and committed.
    Deleted,
    /// Collection about to be dropped; nothing committed yet.
    DeleteRequest,
}

impl CollectionEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionEventKind::Created => "created",
            CollectionEventKind::Updated => "updated",
            CollectionEventKind::Deleted => "deleted",
            CollectionEventKind::DeleteRequest => "delete_request",
        }
    }
}

#[derive(Default)]
pub struct EventBus {
    serve: RwLock<Vec<ServeHook>>,
    created: RwLock<Vec<CollectionHook>>,
    updated: RwLock<Vec<CollectionHook>>,
    deleted: RwLock<Vec<CollectionHook>>,
    delete_request: RwLock<Vec<CollectionHook>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to the serve-ready notification.
    pub fn on_serve(&self, hook: impl Fn() -> Result<()> + Send + Sync + 'static) {
        let hook: ServeHook = Box::new(hook);
        push(&self.serve, hook);
    }

    pub fn on_collection_created(
        &self,
        hook: impl Fn(&CollectionSchema) -> Result<()> + Send + Sync + 'static,
    ) {
        let hook: CollectionHook = Box::new(hook);
        push(&self.created, hook);
    }

    pub fn on_collection_updated(
        &self,
        hook: impl Fn(&CollectionSchema) -> Result<()> + Send + Sync + 'static,
    ) {
        let hook: CollectionHook = Box::new(hook);
        push(&self.updated, hook);
    }

    pub fn on_collection_deleted(
        &self,
        hook: impl Fn(&CollectionSchema) -> Result<()> + Send + Sync + 'static,
    ) {
        let hook: CollectionHook = Box::new(hook);
        push(&self.deleted, hook);
    }

    /// Subscribe to delete requests, fired before the drop is committed.
    pub fn on_collection_delete_request(
        &self,
        hook: impl Fn(&CollectionSchema) -> Result<()> + Send + Sync + 'static,
    ) {
        let hook: CollectionHook = Box::new(hook);
        push(&self.delete_request, hook);
    }

    /// Fire the serve notification.
    pub fn emit_serve(&self) -> Result<()> {
        let hooks = self.serve.read().map_err(|_| poisoned("serve"))?;
        debug!("Dispatching serve event to {} handler(s)", hooks.len());
        for hook in hooks.iter() {
            hook()?;
        }
        Ok(())
    }

    /// Fire a collection event.
    pub fn emit(&self, kind: CollectionEventKind, collection: &CollectionSchema) -> Result<()> {
        let slot = match kind {
            CollectionEventKind::Created => &self.created,
            CollectionEventKind::Updated => &self.updated,
            CollectionEventKind::Deleted => &self.deleted,
            CollectionEventKind::DeleteRequest => &self.delete_request,
        };
        let hooks = slot.read().map_err(|_| poisoned(kind.as_str()))?;
        debug!(
            "Dispatching {} event for {} to {} handler(s)",
            kind.as_str(),
            collection.name,
            hooks.len()
        );
        for hook in hooks.iter() {
            hook(collection)?;
        }
        Ok(())
    }
}

fn push<T>(slot: &RwLock<Vec<T>>, hook: T) {
    let mut hooks = slot.write().unwrap_or_else(|e| e.into_inner());
    hooks.push(hook);
}

fn poisoned(event: &str) -> FtsError {
    FtsError::Other(format!("Event handler list for {} is poisoned", event))
}
