//! Resident adapter cells and the leases handed to callers.
//!
//! A lease pins its kind against eviction until dropped, and dropping a
//! kind's last lease wakes callers waiting for capacity. Each cell
//! serialises `generate` calls, so at most one call per kind is in flight.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use crate::adapters::{AdapterError, ModelAdapter, ModelKind, TaskInput, TaskOutput};

/// A loaded adapter owned by its slot.
pub(crate) struct AdapterCell {
    kind: ModelKind,
    adapter: Mutex<Box<dyn ModelAdapter>>,
    leases: AtomicUsize,
    retired: AtomicBool,
    released: Arc<Notify>,
}

impl AdapterCell {
    pub(crate) fn new(kind: ModelKind, adapter: Box<dyn ModelAdapter>, released: Arc<Notify>) -> Self {
        Self {
            kind,
            adapter: Mutex::new(adapter),
            leases: AtomicUsize::new(0),
            retired: AtomicBool::new(false),
            released,
        }
    }

    pub(crate) fn lease_count(&self) -> usize {
        self.leases.load(Ordering::SeqCst)
    }

    pub(crate) fn is_pinned(&self) -> bool {
        self.lease_count() > 0
    }

    /// Wait for any in-flight call, then clean up. Later calls on
    /// outstanding leases fail with `NotLoaded`.
    pub(crate) async fn retire(&self) -> Result<(), AdapterError> {
        let mut adapter = self.adapter.lock().await;
        self.retired.store(true, Ordering::SeqCst);
        adapter.cleanup().await
    }
}

/// Lease on a resident adapter.
pub struct AdapterHandle {
    cell: Arc<AdapterCell>,
}

impl AdapterHandle {
    pub(crate) fn lease(cell: Arc<AdapterCell>) -> Self {
        cell.leases.fetch_add(1, Ordering::SeqCst);
        Self { cell }
    }

    pub fn kind(&self) -> ModelKind {
        self.cell.kind
    }

    /// True if both handles lease the same loaded instance.
    pub fn same_instance(&self, other: &AdapterHandle) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    /// Run the adapter. Waits for the kind's single-flight lock first.
    pub async fn generate(
        &self,
        input: TaskInput,
        cancel: &CancellationToken,
    ) -> Result<TaskOutput, AdapterError> {
        let adapter = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(AdapterError::Cancelled),
            guard = self.cell.adapter.lock() => guard,
        };
        if self.cell.retired.load(Ordering::SeqCst) {
            return Err(AdapterError::NotLoaded(self.cell.kind));
        }
        adapter.generate(input, cancel).await
    }
}

impl Clone for AdapterHandle {
    fn clone(&self) -> Self {
        Self::lease(self.cell.clone())
    }
}

impl Drop for AdapterHandle {
    fn drop(&mut self) {
        if self.cell.leases.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.cell.released.notify_waiters();
        }
    }
}

impl std::fmt::Debug for AdapterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterHandle")
            .field("kind", &self.cell.kind)
            .field("leases", &self.cell.lease_count())
            .finish()
    }
}
