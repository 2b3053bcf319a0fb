//! Stage execution scheduling.
//!
//! Adapter calls never run on the orchestrating task itself.

mod offload;

pub use offload::{run_offloaded, OffloadError};
