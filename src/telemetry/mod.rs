//! Telemetry for forge-core.
//!
//! Structured logging via `tracing`, run and stage spans, and metrics via
//! the `metrics` facade.

mod logging;
mod metrics;
mod spans;

pub use logging::{build_filter, init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    record_adapter_load, record_enhancement, record_eviction, record_pipeline_run, record_stage,
    record_strategy, set_resident_adapters,
};
pub use spans::{PipelineSpan, SpanExt, StageSpan};
