//! Recency ordering of resident kinds for LRU eviction.

use std::collections::VecDeque;

use crate::adapters::ModelKind;

/// Loaded kinds, least recently used at the front.
#[derive(Debug, Default, Clone)]
pub struct RecencyQueue {
    order: VecDeque<ModelKind>,
}

impl RecencyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `kind` to the most-recent position, inserting it if absent.
    pub fn touch(&mut self, kind: ModelKind) {
        self.remove(kind);
        self.order.push_back(kind);
    }

    pub fn remove(&mut self, kind: ModelKind) -> bool {
        match self.order.iter().position(|k| *k == kind) {
            Some(idx) => {
                self.order.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, kind: ModelKind) -> bool {
        self.order.contains(&kind)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Least recently used kind that is not `exclude` and passes `evictable`.
    pub fn victim<F>(&self, exclude: ModelKind, evictable: F) -> Option<ModelKind>
    where
        F: Fn(ModelKind) -> bool,
    {
        self.order
            .iter()
            .copied()
            .find(|k| *k != exclude && evictable(*k))
    }

    /// Kinds from least to most recently used.
    pub fn iter(&self) -> impl Iterator<Item = ModelKind> + '_ {
        self.order.iter().copied()
    }
}
