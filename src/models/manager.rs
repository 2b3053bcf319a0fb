//! Bounded residency of model adapters.
//!
//! The manager owns one slot per kind and never lets more than
//! `max_concurrent` adapters be resident. When a new kind is needed at
//! capacity, the least recently used unpinned kind is evicted first; if
//! every resident kind is leased, admission waits for a release.
//! All slot mutation happens under a single async lock.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{oneshot, Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::adapters::{AdapterError, ModelAdapter, ModelKind};
use crate::config::ConfigError;
use crate::telemetry;

use super::handle::{AdapterCell, AdapterHandle};
use super::recency::RecencyQueue;
use super::slot::{ModelSlot, SlotState, SlotStatus};
use super::table::AdapterTable;

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("{kind} adapter unavailable: {source}")]
    AdapterUnavailable {
        kind: ModelKind,
        #[source]
        source: AdapterError,
    },

    #[error("{0} is not loaded")]
    NotLoaded(ModelKind),

    #[error("cannot admit {kind}: all {max} resident adapters are in use")]
    CapacityExhausted { kind: ModelKind, max: usize },
}

impl ResourceError {
    pub fn kind(&self) -> ModelKind {
        match self {
            Self::AdapterUnavailable { kind, .. } => *kind,
            Self::NotLoaded(kind) => *kind,
            Self::CapacityExhausted { kind, .. } => *kind,
        }
    }
}

/// Result of a successful `acquire`.
#[derive(Debug)]
pub struct Acquired {
    pub handle: AdapterHandle,
    /// Kind evicted to make room, if any.
    pub evicted: Option<ModelKind>,
}

/// Snapshot of the manager.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceStatus {
    pub max_concurrent: usize,
    /// Resident kinds, least recently used first.
    pub resident: Vec<ModelKind>,
    /// Sum of the memory estimates of resident kinds.
    pub resident_memory_bytes: u64,
    pub slots: Vec<SlotStatus>,
}

impl ResourceStatus {
    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    pub fn slot(&self, kind: ModelKind) -> Option<&SlotStatus> {
        self.slots.iter().find(|s| s.kind == kind)
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct PreloadReport {
    pub loaded: Vec<ModelKind>,
    pub failed: Vec<(ModelKind, String)>,
}

impl PreloadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct UnloadReport {
    pub unloaded: Vec<ModelKind>,
    /// Kinds whose cleanup reported an error. They are still unloaded.
    pub cleanup_errors: Vec<(ModelKind, String)>,
}

struct ManagerState {
    slots: BTreeMap<ModelKind, ModelSlot>,
    recency: RecencyQueue,
}

/// How long `acquire` waits for a pinned adapter to be released.
pub const DEFAULT_ADMISSION_WAIT: Duration = Duration::from_secs(30);

pub struct ResourceManager {
    max_concurrent: NonZeroUsize,
    admission_wait: Duration,
    table: AdapterTable,
    state: Mutex<ManagerState>,
    /// Signalled when a kind's last lease drops or a slot is evicted.
    released: Arc<Notify>,
}

impl ResourceManager {
    pub fn new(max_concurrent: NonZeroUsize, table: AdapterTable) -> Self {
        let slots = ModelKind::ALL
            .iter()
            .map(|&kind| {
                let backing = table
                    .get(kind)
                    .map(|r| r.backing_id.clone())
                    .unwrap_or_else(|| "unregistered".to_string());
                (kind, ModelSlot::new(kind, backing))
            })
            .collect();
        Self {
            max_concurrent,
            admission_wait: DEFAULT_ADMISSION_WAIT,
            table,
            state: Mutex::new(ManagerState { slots, recency: RecencyQueue::new() }),
            released: Arc::new(Notify::new()),
        }
    }

    pub fn with_admission_wait(mut self, wait: Duration) -> Self {
        self.admission_wait = wait;
        self
    }

    /// Like `new`, rejecting a zero limit.
    pub fn with_limit(max_concurrent: usize, table: AdapterTable) -> Result<Self, ConfigError> {
        let limit =
            NonZeroUsize::new(max_concurrent).ok_or(ConfigError::InvalidMaxConcurrent(max_concurrent))?;
        Ok(Self::new(limit, table))
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.get()
    }

    pub fn admission_wait(&self) -> Duration {
        self.admission_wait
    }

    pub fn table(&self) -> &AdapterTable {
        &self.table
    }

    /// Obtain a leased handle for `kind`, loading it if needed.
    pub async fn get(&self, kind: ModelKind) -> Result<AdapterHandle, ResourceError> {
        self.acquire(kind).await.map(|a| a.handle)
    }

    /// Same as `get`, also reporting which kind (if any) was evicted.
    pub async fn acquire(&self, kind: ModelKind) -> Result<Acquired, ResourceError> {
        self.acquire_within(kind, self.admission_wait).await
    }

    /// Like `acquire`, but when every resident kind is leased, wait up to
    /// `wait` for a lease to be released before giving up.
    pub async fn acquire_within(
        &self,
        kind: ModelKind,
        wait: Duration,
    ) -> Result<Acquired, ResourceError> {
        let deadline = Instant::now() + wait;
        loop {
            // Registered before the pin check, so a release in between wakes us.
            let released = self.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            let result = self.admit(kind).await;
            if !matches!(result, Err(ResourceError::CapacityExhausted { .. })) {
                return result;
            }
            debug!(kind = %kind, "all resident adapters leased, waiting for a release");
            if Instant::now() >= deadline
                || tokio::time::timeout_at(deadline, released).await.is_err()
            {
                warn!(
                    kind = %kind,
                    max = self.max_concurrent.get(),
                    waited_ms = wait.as_millis() as u64,
                    "every resident adapter stayed pinned, cannot admit"
                );
                return result;
            }
        }
    }

    /// One admission attempt under the manager lock.
    async fn admit(&self, kind: ModelKind) -> Result<Acquired, ResourceError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if let Some(cell) = resident_cell(&state.slots, kind) {
            state.recency.touch(kind);
            debug!(kind = %kind, "adapter already resident");
            return Ok(Acquired { handle: AdapterHandle::lease(cell), evicted: None });
        }

        let registration = self.table.get(kind).ok_or_else(|| ResourceError::AdapterUnavailable {
            kind,
            source: AdapterError::Unavailable("no adapter registered".to_string()),
        })?;

        let mut evicted = None;
        if state.recency.len() >= self.max_concurrent.get() {
            let slots = &state.slots;
            let victim = state
                .recency
                .victim(kind, |k| slots.get(&k).is_some_and(|s| !s.is_pinned()));
            let Some(victim) = victim else {
                return Err(ResourceError::CapacityExhausted { kind, max: self.max_concurrent.get() });
            };
            info!(victim = %victim, admitting = %kind, "evicting least recently used adapter");
            self.evict_locked(state, victim).await?;
            evicted = Some(victim);
        }

        let mut mark = LoadingMark::new(slot_mut(&mut state.slots, kind));
        let loaded = load_detached(kind, registration.build()).await;

        let slot = &mut *mark.0;
        match loaded {
            Ok(adapter) => {
                let cell = Arc::new(AdapterCell::new(kind, adapter, self.released.clone()));
                slot.cell = Some(cell.clone());
                slot.state = SlotState::Loaded;
                slot.loads += 1;
                state.recency.touch(kind);
                telemetry::record_adapter_load(kind, true);
                telemetry::set_resident_adapters(state.recency.len());
                info!(
                    kind = %kind,
                    backing = %registration.backing_id,
                    resident = state.recency.len(),
                    "adapter loaded"
                );
                Ok(Acquired { handle: AdapterHandle::lease(cell), evicted })
            }
            Err(err) => {
                slot.state = SlotState::Unloaded;
                slot.load_failures += 1;
                telemetry::record_adapter_load(kind, false);
                warn!(kind = %kind, error = %err, "adapter load failed");
                Err(ResourceError::AdapterUnavailable { kind, source: err })
            }
        }
    }

    /// Unload `kind`, waiting for an in-flight call to finish first.
    pub async fn evict(&self, kind: ModelKind) -> Result<(), ResourceError> {
        let mut guard = self.state.lock().await;
        self.evict_locked(&mut guard, kind).await.map(|_| ())
    }

    /// Returns the cleanup error, if cleanup failed. The slot ends up
    /// Unloaded either way.
    async fn evict_locked(
        &self,
        state: &mut ManagerState,
        kind: ModelKind,
    ) -> Result<Option<AdapterError>, ResourceError> {
        let slot = slot_mut(&mut state.slots, kind);
        if slot.state != SlotState::Loaded {
            return Err(ResourceError::NotLoaded(kind));
        }
        let Some(cell) = slot.cell.take() else {
            slot.state = SlotState::Unloaded;
            return Err(ResourceError::NotLoaded(kind));
        };
        slot.state = SlotState::Unloading;

        let mark = UnloadingMark { state: &mut *state, kind, released: &self.released };
        // On its own task, so cleanup still runs if this caller goes away.
        let cleanup = match tokio::spawn(async move { cell.retire().await }).await {
            Ok(result) => result,
            Err(err) => Err(AdapterError::Unavailable(format!("cleanup task failed: {err}"))),
        };
        drop(mark);

        match cleanup {
            Ok(()) => {
                info!(kind = %kind, "adapter evicted");
                Ok(None)
            }
            Err(err) => {
                warn!(kind = %kind, error = %err, "adapter cleanup failed during eviction");
                Ok(Some(err))
            }
        }
    }

    /// Load each kind in order. Failures are reported, not raised.
    pub async fn preload(&self, kinds: &[ModelKind]) -> PreloadReport {
        let mut report = PreloadReport::default();
        for &kind in kinds {
            match self.get(kind).await {
                Ok(_) => report.loaded.push(kind),
                Err(err) => report.failed.push((kind, err.to_string())),
            }
        }
        report
    }

    /// Evict everything, least recently used first.
    pub async fn unload_all(&self) -> UnloadReport {
        let mut guard = self.state.lock().await;
        let resident: Vec<ModelKind> = guard.recency.iter().collect();
        let mut report = UnloadReport::default();
        for kind in resident {
            match self.evict_locked(&mut guard, kind).await {
                Ok(None) => report.unloaded.push(kind),
                Ok(Some(err)) => {
                    report.unloaded.push(kind);
                    report.cleanup_errors.push((kind, err.to_string()));
                }
                Err(err) => debug!(kind = %kind, error = %err, "skipped during unload"),
            }
        }
        report
    }

    pub async fn is_loaded(&self, kind: ModelKind) -> bool {
        let guard = self.state.lock().await;
        guard.slots.get(&kind).is_some_and(|s| s.state == SlotState::Loaded)
    }

    pub async fn status(&self) -> ResourceStatus {
        let guard = self.state.lock().await;
        let resident: Vec<ModelKind> = guard.recency.iter().collect();
        ResourceStatus {
            max_concurrent: self.max_concurrent.get(),
            resident_memory_bytes: resident.iter().map(|k| k.memory_estimate_bytes()).sum(),
            resident,
            slots: guard.slots.values().map(ModelSlot::status).collect(),
        }
    }
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("max_concurrent", &self.max_concurrent)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

/// Holds a slot in `Loading`. If the load is abandoned before it settles,
/// dropping the mark puts the slot back to `Unloaded`.
struct LoadingMark<'a>(&'a mut ModelSlot);

impl<'a> LoadingMark<'a> {
    fn new(slot: &'a mut ModelSlot) -> Self {
        slot.state = SlotState::Loading;
        Self(slot)
    }
}

impl Drop for LoadingMark<'_> {
    fn drop(&mut self) {
        if self.0.state == SlotState::Loading {
            self.0.state = SlotState::Unloaded;
            self.0.load_failures += 1;
            warn!(kind = %self.0.kind, "adapter load abandoned by its caller");
        }
    }
}

/// Finishes an eviction's bookkeeping when dropped, whether or not the
/// evicting caller waited for cleanup.
struct UnloadingMark<'a> {
    state: &'a mut ManagerState,
    kind: ModelKind,
    released: &'a Notify,
}

impl Drop for UnloadingMark<'_> {
    fn drop(&mut self) {
        let slot = slot_mut(&mut self.state.slots, self.kind);
        slot.state = SlotState::Unloaded;
        slot.evictions += 1;
        self.state.recency.remove(self.kind);
        self.released.notify_waiters();
        telemetry::record_eviction(self.kind);
        telemetry::set_resident_adapters(self.state.recency.len());
    }
}

/// Load `adapter` on its own task. A failed load is cleaned up there, and
/// so is a successful one whose caller is gone by the time it finishes.
async fn load_detached(
    kind: ModelKind,
    mut adapter: Box<dyn ModelAdapter>,
) -> Result<Box<dyn ModelAdapter>, AdapterError> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let result = if adapter.kind() != kind {
            Err(AdapterError::Unavailable(format!(
                "factory for {kind} produced a {} adapter",
                adapter.kind()
            )))
        } else {
            adapter.load().await
        };
        let settled = match result {
            Ok(()) => Ok(adapter),
            Err(err) => {
                if let Err(cleanup) = adapter.cleanup().await {
                    debug!(kind = %kind, error = %cleanup, "cleanup after failed load");
                }
                Err(err)
            }
        };
        if let Err(Ok(mut orphan)) = tx.send(settled) {
            debug!(kind = %kind, "load finished after its caller left, cleaning up");
            if let Err(err) = orphan.cleanup().await {
                debug!(kind = %kind, error = %err, "cleanup of orphaned load failed");
            }
        }
    });
    rx.await
        .unwrap_or_else(|_| Err(AdapterError::Unavailable(format!("{kind} load task failed"))))
}

fn resident_cell(slots: &BTreeMap<ModelKind, ModelSlot>, kind: ModelKind) -> Option<Arc<AdapterCell>> {
    slots
        .get(&kind)
        .filter(|s| s.state == SlotState::Loaded)
        .and_then(|s| s.cell.clone())
}

fn slot_mut(slots: &mut BTreeMap<ModelKind, ModelSlot>, kind: ModelKind) -> &mut ModelSlot {
    slots
        .entry(kind)
        .or_insert_with(|| ModelSlot::new(kind, "unregistered".to_string()))
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
