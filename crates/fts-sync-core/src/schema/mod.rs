//! Collection schemas and their lifecycle events.
//!
//! This module provides:
//! - Collection and field definitions
//! - A catalog for looking collections up by name
//! - A registry that owns base tables and publishes schema changes
//! - The typed event bus those changes are published on

mod catalog;
mod events;
mod registry;
mod types;

pub use catalog::{SchemaCatalog, SchemaSource};
pub use events::{CollectionEventKind, CollectionHook, EventBus, ServeHook};
pub use registry::SchemaRegistry;
pub use types::{CollectionSchema, FieldKind, FieldSchema};
