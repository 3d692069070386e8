// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Named record schemas used to resolve `ref` types.

use core::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use super::RecordSchema;

/// Errors that can occur when interacting with the SchemaRegistry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaRegistryError {
    AlreadyExists(Arc<str>),
    InvalidName(Arc<str>),
}

impl fmt::Display for SchemaRegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaRegistryError::AlreadyExists(name) => {
                write!(f, "Record registration failed: a record named '{name}' is already registered.")
            }
            SchemaRegistryError::InvalidName(name) => {
                write!(f, "Record registration failed: the name '{name}' is invalid (empty or whitespace-only names are not allowed).")
            }
        }
    }
}

impl core::error::Error for SchemaRegistryError {}

fn validate_name(name: &str) -> Result<(), SchemaRegistryError> {
    if name.trim().is_empty() {
        Err(SchemaRegistryError::InvalidName(Arc::from(name)))
    } else {
        Ok(())
    }
}

/// Thread-safe registry of record schemas keyed by name.
#[derive(Clone, Default)]
pub struct SchemaRegistry {
    inner: DashMap<Arc<str>, Arc<RecordSchema>>,
}

lazy_static::lazy_static! {
    /// Process-wide registry consulted when resolving `ref` types.
    pub static ref RECORD_REGISTRY: SchemaRegistry = SchemaRegistry::new();
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Register a record under a given name. Returns Err if the name is taken.
    pub fn register_as(
        &self,
        name: impl Into<Arc<str>>,
        schema: Arc<RecordSchema>,
    ) -> Result<(), SchemaRegistryError> {
        let name = name.into();
        validate_name(&name)?;

        use dashmap::mapref::entry::Entry;
        match self.inner.entry(name) {
            Entry::Occupied(e) => Err(SchemaRegistryError::AlreadyExists(Arc::clone(e.key()))),
            Entry::Vacant(e) => {
                tracing::debug!(record = %e.key(), id = schema.id(), "registered record");
                e.insert(schema);
                Ok(())
            }
        }
    }

    /// Register a record under its own name.
    pub fn register(&self, schema: Arc<RecordSchema>) -> Result<(), SchemaRegistryError> {
        self.register_as(Arc::clone(schema.name()), schema)
    }

    pub fn get(&self, name: &str) -> Option<Arc<RecordSchema>> {
        self.inner.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, name: &str) -> Option<Arc<RecordSchema>> {
        self.inner.remove(name).map(|(_, v)| v)
    }

    pub fn list_names(&self) -> Vec<Arc<str>> {
        self.inner.iter().map(|entry| Arc::clone(entry.key())).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&self) {
        self.inner.clear();
    }
}

/// Register a record in the global registry under its own name.
pub fn register(schema: Arc<RecordSchema>) -> Result<(), SchemaRegistryError> {
    RECORD_REGISTRY.register(schema)
}

/// Register a record in the global registry under a given name.
pub fn register_as(
    name: impl Into<Arc<str>>,
    schema: Arc<RecordSchema>,
) -> Result<(), SchemaRegistryError> {
    RECORD_REGISTRY.register_as(name, schema)
}

/// Retrieve a record from the global registry.
pub fn get(name: &str) -> Option<Arc<RecordSchema>> {
    RECORD_REGISTRY.get(name)
}

pub fn remove(name: &str) -> Option<Arc<RecordSchema>> {
    RECORD_REGISTRY.remove(name)
}

pub fn contains(name: &str) -> bool {
    RECORD_REGISTRY.contains(name)
}

pub fn list_names() -> Vec<Arc<str>> {
    RECORD_REGISTRY.list_names()
}
