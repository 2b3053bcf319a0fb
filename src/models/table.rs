//! Adapter table: how to construct the adapter for each kind.
//!
//! Built once by the strategy selector. Adding a kind means adding one
//! registration, not touching dispatch.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::adapters::{ModelAdapter, ModelKind};

/// Constructs a fresh, unloaded adapter instance.
pub type AdapterFactory = Arc<dyn Fn() -> Box<dyn ModelAdapter> + Send + Sync>;

/// One table entry.
#[derive(Clone)]
pub struct AdapterRegistration {
    /// Weights file or remote model name, shown in slot status.
    pub backing_id: String,
    factory: AdapterFactory,
}

impl AdapterRegistration {
    pub fn build(&self) -> Box<dyn ModelAdapter> {
        (self.factory)()
    }
}

/// Kind → registration map.
#[derive(Clone, Default)]
pub struct AdapterTable {
    entries: BTreeMap<ModelKind, AdapterRegistration>,
}

impl AdapterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the factory for `kind`.
    pub fn register<F>(&mut self, kind: ModelKind, backing_id: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn ModelAdapter> + Send + Sync + 'static,
    {
        self.entries.insert(
            kind,
            AdapterRegistration { backing_id: backing_id.into(), factory: Arc::new(factory) },
        );
        self
    }

    pub fn with<F>(mut self, kind: ModelKind, backing_id: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn ModelAdapter> + Send + Sync + 'static,
    {
        self.register(kind, backing_id, factory);
        self
    }

    pub fn get(&self, kind: ModelKind) -> Option<&AdapterRegistration> {
        self.entries.get(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = ModelKind> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for AdapterTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, r)| (k, &r.backing_id)))
            .finish()
    }
}
