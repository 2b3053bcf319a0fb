//! forge-core
//!
//! Core of a prompt-to-backend project generator: a model resource manager
//! that bounds how many generative adapters are resident, and a pipeline
//! orchestrator that drives schema extraction, code generation, review and
//! documentation through it with per-stage fallback.
//!
//! # Layout
//!
//! - `engine`: text backends (local GGUF, hosted endpoint)
//! - `adapters`: per-kind model adapters, model-backed and rule-based
//! - `models`: the resource manager
//! - `scheduler`: stage offload with cancellation and deadlines
//! - `strategy`: one-time selection of how kinds are backed
//! - `pipeline`: the orchestrator, fallbacks, progress and quality
//! - `generation`: the record lifecycle the persistence layer stores

pub mod adapters;
pub mod artifacts;
pub mod cli;
pub mod config;
pub mod engine;
pub mod generation;
pub mod models;
pub mod pipeline;
pub mod scheduler;
pub mod strategy;
pub mod telemetry;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use config::{ConfigError, EnvConfig};
use generation::{run_generation, GenerationRecord, TransitionError};
use models::{ResourceManager, ResourceStatus, UnloadReport};
use pipeline::{
    ContextAnalyzer, EnhancedOrchestrator, GenerationContext, OrchestratorConfig,
    PipelineOrchestrator, ProgressSink, TracingProgress,
};
use strategy::{StrategyMode, StrategyOutcome, StrategySelector};

/// A configured generator: strategy chosen, manager built, orchestrator ready.
pub struct Runtime {
    config: EnvConfig,
    strategy: StrategyOutcome,
    orchestrator: EnhancedOrchestrator,
}

/// Optional collaborators supplied by the host.
#[derive(Default)]
pub struct RuntimeParts {
    pub analyzer: Option<Arc<dyn ContextAnalyzer>>,
    pub progress: Option<Arc<dyn ProgressSink>>,
}

impl Runtime {
    /// Validate `config`, select a strategy and wire the orchestrator.
    pub async fn new(config: EnvConfig) -> Result<Self, ConfigError> {
        let selector = StrategySelector::new(config.strategy_config()?)?;
        Self::with_selector(config, selector, RuntimeParts::default()).await
    }

    pub async fn with_selector(
        config: EnvConfig,
        selector: StrategySelector,
        parts: RuntimeParts,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let strategy = selector.initialize().await;

        let progress = parts.progress.unwrap_or_else(|| Arc::new(TracingProgress));
        let inner = PipelineOrchestrator::new(strategy.manager.clone(), strategy.mode)
            .with_config(OrchestratorConfig { stage_timeout: config.stage_timeout })
            .with_progress(progress);
        let mut orchestrator = EnhancedOrchestrator::new(inner).with_enabled(config.enhancement);
        if let Some(analyzer) = parts.analyzer {
            orchestrator = orchestrator.with_analyzer(analyzer);
        }

        Ok(Self { config, strategy, orchestrator })
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn mode(&self) -> StrategyMode {
        self.strategy.mode
    }

    pub fn strategy(&self) -> &StrategyOutcome {
        &self.strategy
    }

    pub fn manager(&self) -> &Arc<ResourceManager> {
        &self.strategy.manager
    }

    pub fn orchestrator(&self) -> &EnhancedOrchestrator {
        &self.orchestrator
    }

    pub async fn status(&self) -> ResourceStatus {
        self.strategy.manager.status().await
    }

    /// Run one generation to a terminal record.
    pub async fn generate(
        &self,
        ctx: &GenerationContext,
        cancel: &CancellationToken,
    ) -> Result<GenerationRecord, TransitionError> {
        let mut record = GenerationRecord::new(ctx);
        run_generation(&mut record, &self.orchestrator, ctx, cancel).await?;
        Ok(record)
    }

    /// Unload every resident adapter.
    pub async fn shutdown(&self) -> UnloadReport {
        self.strategy.manager.unload_all().await
    }
}
