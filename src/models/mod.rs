//! Model residency for the generation pipeline.
//!
//! Tracks one slot per adapter kind, loads adapters on demand, and keeps
//! the number of resident adapters within the configured limit.

mod handle;
mod manager;
mod recency;
mod slot;
mod table;

pub use handle::AdapterHandle;
pub use manager::{
    Acquired, PreloadReport, ResourceError, ResourceManager, ResourceStatus, UnloadReport,
    DEFAULT_ADMISSION_WAIT,
};
pub use recency::RecencyQueue;
pub use slot::{SlotState, SlotStatus};
pub use table::{AdapterFactory, AdapterRegistration, AdapterTable};
