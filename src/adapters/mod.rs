//! Model adapters: one capability set per generation task kind.
//!
//! The orchestrator only ever calls the shared `ModelAdapter` contract.
//! Model-backed variants delegate to a `TextBackend`; degraded variants
//! are rule-based and need no model at all.

mod backed;
mod codegen;
pub mod degraded;
mod docs;
mod kind;
pub mod parse;
mod review;
mod schema;
mod task;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::engine::BackendError;

pub use codegen::CodeGenerator;
pub use degraded::{HeuristicReviewer, HeuristicSchemaExtractor, TemplateDocGenerator};
pub use docs::DocGenerator;
pub use kind::ModelKind;
pub use review::CodeReviewer;
pub use schema::SchemaExtractor;
pub use task::{CodeTask, DocsTask, ReviewTask, SchemaTask, TaskInput, TaskOutput};

/// Errors raised by adapters.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Adapter unavailable: {0}")]
    Unavailable(String),

    #[error("load() already called on this {0} adapter")]
    AlreadyLoaded(ModelKind),

    #[error("{0} adapter is not loaded")]
    NotLoaded(ModelKind),

    #[error("Backend error: {0}")]
    Backend(BackendError),

    #[error("Could not parse {kind} output: {reason}")]
    Parse { kind: ModelKind, reason: String },

    #[error("{kind} adapter cannot handle {got} input")]
    UnexpectedInput { kind: ModelKind, got: ModelKind },

    #[error("Generation cancelled")]
    Cancelled,
}

impl From<BackendError> for AdapterError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Cancelled => Self::Cancelled,
            BackendError::Unavailable(msg) => Self::Unavailable(msg),
            other => Self::Backend(other),
        }
    }
}

/// Shared contract for every task kind.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// The task role this adapter serves.
    fn kind(&self) -> ModelKind;

    /// Perform all expensive setup. At most once per instance.
    async fn load(&mut self) -> Result<(), AdapterError>;

    /// Run the task. May fail; must observe `cancel`.
    async fn generate(
        &self,
        input: TaskInput,
        cancel: &CancellationToken,
    ) -> Result<TaskOutput, AdapterError>;

    /// Release held resources. Idempotent.
    async fn cleanup(&mut self) -> Result<(), AdapterError>;
}

/// Per-instance load lifecycle enforcing load-once and idempotent cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Fresh,
    Loading,
    Loaded,
    Released,
}

/// Tracks `LoadState` for one adapter instance.
#[derive(Debug)]
pub struct LoadGuard {
    kind: ModelKind,
    state: LoadState,
}

impl LoadGuard {
    pub fn new(kind: ModelKind) -> Self {
        Self { kind, state: LoadState::Fresh }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Enter `Loading`. Fails if `load()` was already attempted.
    pub fn begin(&mut self) -> Result<(), AdapterError> {
        if self.state != LoadState::Fresh {
            return Err(AdapterError::AlreadyLoaded(self.kind));
        }
        self.state = LoadState::Loading;
        Ok(())
    }

    pub fn finish(&mut self) {
        self.state = LoadState::Loaded;
    }

    pub fn ensure_loaded(&self) -> Result<(), AdapterError> {
        match self.state {
            LoadState::Loaded => Ok(()),
            _ => Err(AdapterError::NotLoaded(self.kind)),
        }
    }

    /// Mark released. Returns true only on the first call after a load attempt.
    pub fn release(&mut self) -> bool {
        let was_held = matches!(self.state, LoadState::Loading | LoadState::Loaded);
        self.state = LoadState::Released;
        was_held
    }
}

/// Reject inputs meant for another kind.
pub(crate) fn unexpected(kind: ModelKind, input: &TaskInput) -> AdapterError {
    AdapterError::UnexpectedInput { kind, got: input.kind() }
}
