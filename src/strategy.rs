//! One-time strategy selection at warm-up.
//!
//! Decides how the four adapter kinds are backed and builds the resource
//! manager for that choice. Attempts walk the chain
//! FullPipeline → InferenceOnly → MinimalFallback until one succeeds; the
//! last one cannot fail.

use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sysinfo::{MemoryRefreshKind, RefreshKind, System};
use thiserror::Error;
use tracing::{info, warn};

use crate::adapters::{
    CodeGenerator, CodeReviewer, DocGenerator, HeuristicReviewer, HeuristicSchemaExtractor,
    ModelAdapter, ModelKind, SchemaExtractor, TemplateDocGenerator,
};
use crate::config::{ConfigError, ModelFiles};
use crate::engine::{GgufConfig, LocalBackend, RemoteBackend, RemoteConfig, TextBackend, WeightsLocator};
use crate::models::{AdapterTable, ResourceManager};
use crate::telemetry;

/// How the pipeline reaches its models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyMode {
    /// Local weights for every kind.
    FullPipeline,
    /// Remote code generation, rule-based everything else.
    InferenceOnly,
    /// No adapters; every stage uses its fallback.
    MinimalFallback,
}

impl StrategyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullPipeline => "full_pipeline",
            Self::InferenceOnly => "inference_only",
            Self::MinimalFallback => "minimal_fallback",
        }
    }

    /// This mode and every mode after it in the fallback chain.
    pub fn chain(self) -> &'static [StrategyMode] {
        const CHAIN: [StrategyMode; 3] = [
            StrategyMode::FullPipeline,
            StrategyMode::InferenceOnly,
            StrategyMode::MinimalFallback,
        ];
        match self {
            Self::FullPipeline => &CHAIN,
            Self::InferenceOnly => &CHAIN[1..],
            Self::MinimalFallback => &CHAIN[2..],
        }
    }
}

impl fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator override for the starting mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForceMode {
    #[default]
    Auto,
    Full,
    Inference,
    Minimal,
}

impl FromStr for ForceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "full" | "full_pipeline" => Ok(Self::Full),
            "inference" | "inference_only" => Ok(Self::Inference),
            "minimal" | "minimal_fallback" => Ok(Self::Minimal),
            other => Err(format!("unknown force mode: {other}")),
        }
    }
}

/// Reports available system memory.
#[async_trait]
pub trait MemoryProbe: Send + Sync {
    /// Available bytes, or `None` if the probe could not run.
    async fn available_bytes(&self) -> Option<u64>;
}

/// Probe backed by `sysinfo`, run on a blocking thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMemoryProbe;

#[async_trait]
impl MemoryProbe for SystemMemoryProbe {
    async fn available_bytes(&self) -> Option<u64> {
        tokio::task::spawn_blocking(|| {
            let mut sys = System::new_with_specifics(
                RefreshKind::new().with_memory(MemoryRefreshKind::everything()),
            );
            sys.refresh_memory();
            sys.available_memory()
        })
        .await
        .ok()
    }
}

/// Everything the selector needs to build adapter tables.
#[derive(Debug, Clone)]
pub struct StrategyConfig {
    pub force_mode: ForceMode,
    pub max_concurrent: usize,
    pub full_min_memory: u64,
    pub model_dir: PathBuf,
    pub models: ModelFiles,
    pub remote: Option<RemoteConfig>,
    pub gguf: GgufConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            force_mode: ForceMode::Auto,
            max_concurrent: crate::config::DEFAULT_MAX_CONCURRENT,
            full_min_memory: crate::config::DEFAULT_FULL_MIN_MEMORY,
            model_dir: PathBuf::from("models"),
            models: ModelFiles::default(),
            remote: None,
            gguf: GgufConfig::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("preload failed: {0}")]
    Preload(String),

    #[error("no inference endpoint configured")]
    NoEndpoint,
}

/// One entry in the selection log.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyAttempt {
    pub mode: StrategyMode,
    /// Failure reason; `None` for the attempt that succeeded.
    pub error: Option<String>,
}

/// What `initialize` settled on.
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub mode: StrategyMode,
    pub manager: Arc<ResourceManager>,
    pub attempts: Vec<StrategyAttempt>,
    pub available_memory: Option<u64>,
}

impl StrategyOutcome {
    /// True if the first attempted mode was not the one selected.
    pub fn fell_back(&self) -> bool {
        self.attempts.len() > 1
    }
}

/// Picks and prepares the strategy.
pub struct StrategySelector {
    config: StrategyConfig,
    max_concurrent: NonZeroUsize,
    probe: Box<dyn MemoryProbe>,
    full_table: Option<AdapterTable>,
    inference_table: Option<AdapterTable>,
}

impl StrategySelector {
    pub fn new(config: StrategyConfig) -> Result<Self, ConfigError> {
        let max_concurrent = NonZeroUsize::new(config.max_concurrent)
            .ok_or(ConfigError::InvalidMaxConcurrent(config.max_concurrent))?;
        Ok(Self {
            config,
            max_concurrent,
            probe: Box::new(SystemMemoryProbe),
            full_table: None,
            inference_table: None,
        })
    }

    pub fn with_probe(mut self, probe: impl MemoryProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    /// Replace the local adapter table used for FullPipeline.
    pub fn with_full_table(mut self, table: AdapterTable) -> Self {
        self.full_table = Some(table);
        self
    }

    /// Replace the adapter table used for InferenceOnly.
    pub fn with_inference_table(mut self, table: AdapterTable) -> Self {
        self.inference_table = Some(table);
        self
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// The mode the chain starts from.
    pub fn starting_mode(&self, available_memory: Option<u64>) -> StrategyMode {
        match self.config.force_mode {
            ForceMode::Full => StrategyMode::FullPipeline,
            ForceMode::Inference => StrategyMode::InferenceOnly,
            ForceMode::Minimal => StrategyMode::MinimalFallback,
            ForceMode::Auto => {
                if available_memory.is_some_and(|m| m >= self.config.full_min_memory) {
                    StrategyMode::FullPipeline
                } else if self.has_endpoint() {
                    StrategyMode::InferenceOnly
                } else {
                    StrategyMode::MinimalFallback
                }
            }
        }
    }

    fn has_endpoint(&self) -> bool {
        self.inference_table.is_some() || self.config.remote.is_some()
    }

    /// Select a strategy. Never fails: the chain ends in MinimalFallback.
    pub async fn initialize(&self) -> StrategyOutcome {
        let available_memory = self.probe.available_bytes().await;
        let start = self.starting_mode(available_memory);
        info!(
            start = %start,
            available_memory = ?available_memory,
            force_mode = ?self.config.force_mode,
            "selecting strategy"
        );

        let mut attempts = Vec::new();
        for &mode in start.chain() {
            match self.attempt(mode).await {
                Ok(manager) => {
                    attempts.push(StrategyAttempt { mode, error: None });
                    telemetry::record_strategy(mode, attempts.len() > 1);
                    info!(mode = %mode, attempts = attempts.len(), "strategy selected");
                    return StrategyOutcome { mode, manager, attempts, available_memory };
                }
                Err(err) => {
                    warn!(mode = %mode, error = %err, "strategy failed, falling back");
                    attempts.push(StrategyAttempt { mode, error: Some(err.to_string()) });
                }
            }
        }

        // Only reachable if the chain were to exclude MinimalFallback.
        let mode = StrategyMode::MinimalFallback;
        attempts.push(StrategyAttempt { mode, error: None });
        telemetry::record_strategy(mode, true);
        StrategyOutcome { mode, manager: self.minimal(), attempts, available_memory }
    }

    async fn attempt(&self, mode: StrategyMode) -> Result<Arc<ResourceManager>, StrategyError> {
        match mode {
            StrategyMode::FullPipeline => {
                let table = self.full_table.clone().unwrap_or_else(|| self.local_table());
                self.prepared(table, &[ModelKind::SchemaExtractor, ModelKind::CodeGenerator]).await
            }
            StrategyMode::InferenceOnly => {
                let table = match &self.inference_table {
                    Some(table) => table.clone(),
                    None => self.remote_table()?,
                };
                self.prepared(table, &[ModelKind::CodeGenerator]).await
            }
            StrategyMode::MinimalFallback => Ok(self.minimal()),
        }
    }

    /// Build a manager and preload `kinds`. Any failure unloads what did
    /// load and fails the attempt.
    async fn prepared(
        &self,
        table: AdapterTable,
        kinds: &[ModelKind],
    ) -> Result<Arc<ResourceManager>, StrategyError> {
        let manager = ResourceManager::new(self.max_concurrent, table);
        let report = manager.preload(kinds).await;
        if !report.is_complete() {
            manager.unload_all().await;
            let reasons: Vec<String> =
                report.failed.iter().map(|(k, e)| format!("{k}: {e}")).collect();
            return Err(StrategyError::Preload(reasons.join("; ")));
        }
        Ok(Arc::new(manager))
    }

    fn minimal(&self) -> Arc<ResourceManager> {
        Arc::new(ResourceManager::new(self.max_concurrent, AdapterTable::new()))
    }

    fn local_table(&self) -> AdapterTable {
        let mut table = AdapterTable::new();
        for (kind, construct) in model_backed_constructors() {
            let file = self.config.models.for_kind(kind).to_string();
            let locator = WeightsLocator::new(self.config.model_dir.clone());
            let gguf = self.config.gguf.clone();
            let backing = file.clone();
            table.register(kind, backing, move || {
                construct(Box::new(LocalBackend::new(&file, locator.clone(), gguf.clone())))
            });
        }
        table
    }

    fn remote_table(&self) -> Result<AdapterTable, StrategyError> {
        let remote = self.config.remote.clone().ok_or(StrategyError::NoEndpoint)?;
        let backing = format!("remote:{}", remote.model);
        let table = AdapterTable::new()
            .with(ModelKind::CodeGenerator, backing, move || {
                Box::new(CodeGenerator::new(Box::new(RemoteBackend::new(remote.clone()))))
                    as Box<dyn ModelAdapter>
            })
            .with(ModelKind::SchemaExtractor, "heuristic", || {
                Box::new(HeuristicSchemaExtractor::new()) as Box<dyn ModelAdapter>
            })
            .with(ModelKind::CodeReviewer, "heuristic", || {
                Box::new(HeuristicReviewer::new()) as Box<dyn ModelAdapter>
            })
            .with(ModelKind::DocGenerator, "template", || {
                Box::new(TemplateDocGenerator::new()) as Box<dyn ModelAdapter>
            });
        Ok(table)
    }
}

/// Wraps a text backend in the model-backed adapter for one kind.
type BackedConstructor = fn(Box<dyn TextBackend>) -> Box<dyn ModelAdapter>;

fn model_backed_constructors() -> [(ModelKind, BackedConstructor); 4] {
    [
        (ModelKind::SchemaExtractor, |backend| Box::new(SchemaExtractor::new(backend))),
        (ModelKind::CodeGenerator, |backend| Box::new(CodeGenerator::new(backend))),
        (ModelKind::CodeReviewer, |backend| Box::new(CodeReviewer::new(backend))),
        (ModelKind::DocGenerator, |backend| Box::new(DocGenerator::new(backend))),
    ]
}
