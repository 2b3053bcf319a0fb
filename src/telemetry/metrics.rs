//! Metric recording through the `metrics` facade.
//!
//! Nothing is exported unless the host installs a recorder, in which case
//! these calls feed it. Names are prefixed `forge_core_`.

use std::time::Duration;

use ::metrics::{counter, gauge, histogram};

use crate::adapters::ModelKind;
use crate::strategy::StrategyMode;

pub fn record_adapter_load(kind: ModelKind, ok: bool) {
    let outcome = if ok { "ok" } else { "failed" };
    counter!("forge_core_adapter_loads_total", "kind" => kind.as_str(), "outcome" => outcome)
        .increment(1);
}

pub fn record_eviction(kind: ModelKind) {
    counter!("forge_core_adapter_evictions_total", "kind" => kind.as_str()).increment(1);
}

pub fn set_resident_adapters(count: usize) {
    gauge!("forge_core_resident_adapters").set(count as f64);
}

pub fn record_strategy(mode: StrategyMode, fell_back: bool) {
    counter!(
        "forge_core_strategy_selected_total",
        "mode" => mode.as_str(),
        "fell_back" => if fell_back { "true" } else { "false" }
    )
    .increment(1);
}

/// One stage finished. `fallback` is true when its static output was used.
pub fn record_stage(kind: ModelKind, elapsed: Duration, fallback: bool) {
    histogram!("forge_core_stage_seconds", "stage" => kind.as_str()).record(elapsed.as_secs_f64());
    if fallback {
        counter!("forge_core_stage_fallbacks_total", "stage" => kind.as_str()).increment(1);
    }
}

pub fn record_pipeline_run(mode: StrategyMode, outcome: &'static str, quality: Option<f64>) {
    counter!("forge_core_pipeline_runs_total", "mode" => mode.as_str(), "outcome" => outcome)
        .increment(1);
    if let Some(score) = quality {
        histogram!("forge_core_quality_score").record(score);
    }
}

pub fn record_enhancement(ok: bool) {
    let outcome = if ok { "ok" } else { "failed" };
    counter!("forge_core_enhancements_total", "outcome" => outcome).increment(1);
}
