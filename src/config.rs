//! Runtime configuration loading from environment variables.
//!
//! All values are read from `FORGE_CORE_*` environment variables with
//! sensible defaults. Unparseable numbers fall back to defaults; values that
//! parse but make no sense (a zero adapter limit, an unknown mode) are kept
//! as given and rejected by [`EnvConfig::validate`] before any generation.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `FORGE_CORE_MAX_CONCURRENT` | 2 | Max resident adapters |
//! | `FORGE_CORE_FORCE_MODE` | auto | auto, full, inference or minimal |
//! | `FORGE_CORE_FULL_MIN_MEMORY` | 17179869184 | Bytes needed to try FullPipeline |
//! | `FORGE_CORE_MODEL_DIR` | models | Directory holding GGUF weights |
//! | `FORGE_CORE_SCHEMA_MODEL` | schema-extractor.gguf | Schema weights file |
//! | `FORGE_CORE_CODEGEN_MODEL` | code-generator.gguf | Code generation weights file |
//! | `FORGE_CORE_REVIEW_MODEL` | code-reviewer.gguf | Review weights file |
//! | `FORGE_CORE_DOCS_MODEL` | doc-generator.gguf | Documentation weights file |
//! | `FORGE_CORE_INFERENCE_URL` | unset | Hosted chat-completion endpoint |
//! | `FORGE_CORE_INFERENCE_TOKEN` | unset | Bearer token for the endpoint |
//! | `FORGE_CORE_INFERENCE_MODEL` | code-generator | Remote model name |
//! | `FORGE_CORE_INFERENCE_TIMEOUT` | 120 | Remote request timeout (secs) |
//! | `FORGE_CORE_STAGE_TIMEOUT` | 300 | Per-stage deadline (secs, 0 = none) |
//! | `FORGE_CORE_ENHANCEMENT` | true | Run context analysis when available |
//! | `FORGE_CORE_N_CTX` | 4096 | GGUF context window size |
//! | `FORGE_CORE_N_THREADS` | 0 | Inference threads (0 = auto) |
//! | `FORGE_CORE_GPU_LAYERS` | 0 | Layers offloaded to the GPU |
//! | `FORGE_CORE_LOG_FORMAT` | json | json or pretty |
//! | `FORGE_CORE_LOG_LEVEL` | info | `EnvFilter` directive |
//! | `FORGE_CORE_LOG_FILE` | unset | Write JSON logs to this file |

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::adapters::ModelKind;
use crate::engine::{GgufConfig, RemoteConfig};
use crate::strategy::{ForceMode, StrategyConfig};
use crate::telemetry::{LogConfig, LogFormat};

pub const DEFAULT_MAX_CONCURRENT: usize = 2;
pub const DEFAULT_FULL_MIN_MEMORY: u64 = 16 * 1024 * 1024 * 1024;
pub const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 300;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_concurrent must be at least 1, got {0}")]
    InvalidMaxConcurrent(usize),

    #[error("unknown force mode {0:?} (expected auto, full, inference or minimal)")]
    InvalidForceMode(String),

    #[error("unknown log format {0:?} (expected json or pretty)")]
    InvalidLogFormat(String),

    #[error("inference URL must start with http:// or https://, got {0:?}")]
    InvalidInferenceUrl(String),

    #[error("{key} must not be empty")]
    Empty { key: &'static str },
}

/// Weights file name per model kind.
#[derive(Debug, Clone, Serialize)]
pub struct ModelFiles {
    pub schema: String,
    pub codegen: String,
    pub review: String,
    pub docs: String,
}

impl ModelFiles {
    pub fn for_kind(&self, kind: ModelKind) -> &str {
        match kind {
            ModelKind::SchemaExtractor => &self.schema,
            ModelKind::CodeGenerator => &self.codegen,
            ModelKind::CodeReviewer => &self.review,
            ModelKind::DocGenerator => &self.docs,
        }
    }
}

impl Default for ModelFiles {
    fn default() -> Self {
        Self {
            schema: "schema-extractor.gguf".to_string(),
            codegen: "code-generator.gguf".to_string(),
            review: "code-reviewer.gguf".to_string(),
            docs: "doc-generator.gguf".to_string(),
        }
    }
}

/// Hosted inference endpoint settings.
#[derive(Debug, Clone)]
pub struct InferenceEnvConfig {
    pub url: Option<String>,
    pub token: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl Default for InferenceEnvConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            model: "code-generator".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl InferenceEnvConfig {
    /// Remote backend settings, if an endpoint is configured.
    pub fn remote(&self) -> Option<RemoteConfig> {
        let url = self.url.as_ref()?;
        let mut remote = RemoteConfig::new(url.clone(), self.model.clone());
        remote.api_token = self.token.clone();
        remote.timeout = self.timeout;
        Some(remote)
    }
}

#[derive(Debug, Clone)]
pub struct LogEnvConfig {
    pub format: String,
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LogEnvConfig {
    fn default() -> Self {
        Self { format: "json".to_string(), level: "info".to_string(), file: None }
    }
}

/// All runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub max_concurrent: usize,
    pub force_mode: String,
    pub full_min_memory: u64,
    pub model_dir: PathBuf,
    pub models: ModelFiles,
    pub inference: InferenceEnvConfig,
    pub stage_timeout: Option<Duration>,
    pub enhancement: bool,
    pub gguf: GgufConfig,
    pub log: LogEnvConfig,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            force_mode: "auto".to_string(),
            full_min_memory: DEFAULT_FULL_MIN_MEMORY,
            model_dir: PathBuf::from("models"),
            models: ModelFiles::default(),
            inference: InferenceEnvConfig::default(),
            stage_timeout: Some(Duration::from_secs(DEFAULT_STAGE_TIMEOUT_SECS)),
            enhancement: true,
            gguf: GgufConfig::default(),
            log: LogEnvConfig::default(),
        }
    }
}

/// Effective configuration summary (serializable).
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub max_concurrent: usize,
    pub force_mode: String,
    pub full_min_memory: u64,
    pub model_dir: PathBuf,
    pub models: ModelFiles,
    pub inference_url: Option<String>,
    pub inference_token_set: bool,
    pub inference_model: String,
    pub inference_timeout_secs: u64,
    pub stage_timeout_secs: u64,
    pub enhancement: bool,
    pub n_ctx: u32,
    pub n_threads: u32,
    pub n_gpu_layers: u32,
    pub log_format: String,
    pub log_level: String,
}

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_usize(key: &str, default: usize) -> usize {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_u32(key: &str, default: u32) -> u32 {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_bool(key: &str, default: bool) -> bool {
    match var(key).map(|v| v.to_ascii_lowercase()).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

fn load_models() -> ModelFiles {
    let defaults = ModelFiles::default();
    ModelFiles {
        schema: var("FORGE_CORE_SCHEMA_MODEL").unwrap_or(defaults.schema),
        codegen: var("FORGE_CORE_CODEGEN_MODEL").unwrap_or(defaults.codegen),
        review: var("FORGE_CORE_REVIEW_MODEL").unwrap_or(defaults.review),
        docs: var("FORGE_CORE_DOCS_MODEL").unwrap_or(defaults.docs),
    }
}

fn load_inference() -> InferenceEnvConfig {
    let defaults = InferenceEnvConfig::default();
    let timeout_secs = parse_u64("FORGE_CORE_INFERENCE_TIMEOUT", defaults.timeout.as_secs()).max(1);
    InferenceEnvConfig {
        url: var("FORGE_CORE_INFERENCE_URL"),
        token: var("FORGE_CORE_INFERENCE_TOKEN"),
        model: var("FORGE_CORE_INFERENCE_MODEL").unwrap_or(defaults.model),
        timeout: Duration::from_secs(timeout_secs),
    }
}

fn load_gguf() -> GgufConfig {
    let defaults = GgufConfig::default();
    GgufConfig {
        n_ctx: parse_u32("FORGE_CORE_N_CTX", defaults.n_ctx).max(128),
        n_threads: parse_u32("FORGE_CORE_N_THREADS", defaults.n_threads),
        n_gpu_layers: parse_u32("FORGE_CORE_GPU_LAYERS", defaults.n_gpu_layers),
    }
}

fn load_log() -> LogEnvConfig {
    let defaults = LogEnvConfig::default();
    LogEnvConfig {
        format: var("FORGE_CORE_LOG_FORMAT").unwrap_or(defaults.format),
        level: var("FORGE_CORE_LOG_LEVEL").unwrap_or(defaults.level),
        file: var("FORGE_CORE_LOG_FILE").map(PathBuf::from),
    }
}

/// Load all configuration from environment variables.
///
/// Never panics. Call [`EnvConfig::validate`] before using the result.
pub fn load() -> EnvConfig {
    let defaults = EnvConfig::default();
    let stage_secs = parse_u64("FORGE_CORE_STAGE_TIMEOUT", DEFAULT_STAGE_TIMEOUT_SECS);

    EnvConfig {
        max_concurrent: parse_usize("FORGE_CORE_MAX_CONCURRENT", DEFAULT_MAX_CONCURRENT),
        force_mode: var("FORGE_CORE_FORCE_MODE").unwrap_or(defaults.force_mode),
        full_min_memory: parse_u64("FORGE_CORE_FULL_MIN_MEMORY", DEFAULT_FULL_MIN_MEMORY),
        model_dir: var("FORGE_CORE_MODEL_DIR").map(PathBuf::from).unwrap_or(defaults.model_dir),
        models: load_models(),
        inference: load_inference(),
        stage_timeout: (stage_secs > 0).then(|| Duration::from_secs(stage_secs)),
        enhancement: parse_bool("FORGE_CORE_ENHANCEMENT", true),
        gguf: load_gguf(),
        log: load_log(),
    }
}

impl EnvConfig {
    /// Reject settings that would make generation meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::InvalidMaxConcurrent(self.max_concurrent));
        }
        self.force_mode()?;
        self.log_format()?;
        if let Some(url) = &self.inference.url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidInferenceUrl(url.clone()));
            }
            if self.inference.model.trim().is_empty() {
                return Err(ConfigError::Empty { key: "FORGE_CORE_INFERENCE_MODEL" });
            }
        }
        for kind in ModelKind::ALL {
            if self.models.for_kind(kind).trim().is_empty() {
                return Err(ConfigError::Empty { key: "model file" });
            }
        }
        Ok(())
    }

    pub fn force_mode(&self) -> Result<ForceMode, ConfigError> {
        self.force_mode
            .parse()
            .map_err(|_| ConfigError::InvalidForceMode(self.force_mode.clone()))
    }

    pub fn log_format(&self) -> Result<LogFormat, ConfigError> {
        self.log
            .format
            .parse()
            .map_err(|_| ConfigError::InvalidLogFormat(self.log.format.clone()))
    }

    pub fn log_config(&self) -> Result<LogConfig, ConfigError> {
        Ok(LogConfig {
            format: self.log_format()?,
            level: self.log.level.clone(),
            output_path: self.log.file.clone(),
        })
    }

    /// Settings for the strategy selector. Validates first.
    pub fn strategy_config(&self) -> Result<StrategyConfig, ConfigError> {
        self.validate()?;
        Ok(StrategyConfig {
            force_mode: self.force_mode()?,
            max_concurrent: self.max_concurrent,
            full_min_memory: self.full_min_memory,
            model_dir: self.model_dir.clone(),
            models: self.models.clone(),
            remote: self.inference.remote(),
            gguf: self.gguf.clone(),
        })
    }

    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            max_concurrent: self.max_concurrent,
            force_mode: self.force_mode.clone(),
            full_min_memory: self.full_min_memory,
            model_dir: self.model_dir.clone(),
            models: self.models.clone(),
            inference_url: self.inference.url.clone(),
            inference_token_set: self.inference.token.is_some(),
            inference_model: self.inference.model.clone(),
            inference_timeout_secs: self.inference.timeout.as_secs(),
            stage_timeout_secs: self.stage_timeout.map_or(0, |d| d.as_secs()),
            enhancement: self.enhancement,
            n_ctx: self.gguf.n_ctx,
            n_threads: self.gguf.n_threads,
            n_gpu_layers: self.gguf.n_gpu_layers,
            log_format: self.log.format.clone(),
            log_level: self.log.level.clone(),
        }
    }
}
