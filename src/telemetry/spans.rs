//! Span helpers for pipeline runs and stages.

use tracing::{info_span, Span};

use crate::adapters::ModelKind;

/// Extension trait for recording an outcome into a span.
pub trait SpanExt {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Span covering one `process` call.
///
/// `status`, `quality` and `fallbacks` are filled in when the run ends.
pub struct PipelineSpan;

impl PipelineSpan {
    pub fn new(request_id: &str, mode: &str, tech_stack: &str) -> Span {
        info_span!(
            "pipeline_run",
            request_id = %request_id,
            mode = %mode,
            tech_stack = %tech_stack,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
            quality = tracing::field::Empty,
            fallbacks = tracing::field::Empty,
        )
    }
}

/// Span covering one stage inside a run.
pub struct StageSpan;

impl StageSpan {
    pub fn new(kind: ModelKind) -> Span {
        info_span!(
            "pipeline_stage",
            stage = %kind,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
            elapsed_ms = tracing::field::Empty,
        )
    }
}
