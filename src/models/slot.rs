//! Per-kind lifecycle records.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::adapters::ModelKind;

use super::handle::AdapterCell;

/// Slot lifecycle: Unloaded → Loading → Loaded → Unloading → Unloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Unloaded,
    Loading,
    Loaded,
    Unloading,
}

/// Lifecycle record for one kind. Mutated only by the resource manager.
pub(crate) struct ModelSlot {
    pub(crate) kind: ModelKind,
    pub(crate) backing_id: String,
    pub(crate) state: SlotState,
    pub(crate) cell: Option<Arc<AdapterCell>>,
    pub(crate) memory_estimate_bytes: u64,
    pub(crate) loads: u64,
    pub(crate) load_failures: u64,
    pub(crate) evictions: u64,
}

impl ModelSlot {
    pub(crate) fn new(kind: ModelKind, backing_id: String) -> Self {
        Self {
            kind,
            backing_id,
            state: SlotState::Unloaded,
            cell: None,
            memory_estimate_bytes: kind.memory_estimate_bytes(),
            loads: 0,
            load_failures: 0,
            evictions: 0,
        }
    }

    pub(crate) fn is_pinned(&self) -> bool {
        self.cell.as_ref().is_some_and(|c| c.is_pinned())
    }

    pub(crate) fn status(&self) -> SlotStatus {
        SlotStatus {
            kind: self.kind,
            backing_id: self.backing_id.clone(),
            state: self.state,
            memory_estimate_bytes: self.memory_estimate_bytes,
            leases: self.cell.as_ref().map_or(0, |c| c.lease_count()),
            loads: self.loads,
            load_failures: self.load_failures,
            evictions: self.evictions,
        }
    }
}

/// Observable snapshot of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotStatus {
    pub kind: ModelKind,
    pub backing_id: String,
    pub state: SlotState,
    pub memory_estimate_bytes: u64,
    pub leases: usize,
    pub loads: u64,
    pub load_failures: u64,
    pub evictions: u64,
}
