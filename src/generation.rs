//! Generation record lifecycle.
//!
//! PENDING → PROCESSING → {COMPLETED, FAILED, CANCELLED}. PROCESSING is
//! entered once; CANCELLED is reachable from PENDING or PROCESSING only.
//! The persistence layer stores these records; nothing here does I/O.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::pipeline::{EnhancedOrchestrator, GenerationContext, PipelineError, PipelineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl GenerationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("illegal transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: GenerationStatus,
    pub to: GenerationStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationRecord {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub prompt: String,
    pub status: GenerationStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub result: Option<PipelineResult>,
}

impl GenerationRecord {
    /// A pending record sharing the context's request id.
    pub fn new(ctx: &GenerationContext) -> Self {
        Self {
            id: ctx.request_id(),
            user_id: ctx.user_id().map(str::to_string),
            prompt: ctx.prompt().to_string(),
            status: GenerationStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error: None,
            result: None,
        }
    }

    fn transition(&mut self, to: GenerationStatus) -> Result<(), TransitionError> {
        use GenerationStatus::*;
        let allowed = matches!(
            (self.status, to),
            (Pending, Processing) | (Processing, Completed) | (Processing, Failed) | (Pending | Processing, Cancelled)
        );
        if !allowed {
            return Err(TransitionError { from: self.status, to });
        }
        self.status = to;
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(GenerationStatus::Processing)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn complete(&mut self, result: PipelineResult) -> Result<(), TransitionError> {
        self.transition(GenerationStatus::Completed)?;
        self.result = Some(result);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(GenerationStatus::Failed)?;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        self.transition(GenerationStatus::Cancelled)?;
        self.finished_at = Some(Utc::now());
        Ok(())
    }
}

/// Drive `record` from PENDING to a terminal state by running the pipeline.
pub async fn run_generation(
    record: &mut GenerationRecord,
    orchestrator: &EnhancedOrchestrator,
    ctx: &GenerationContext,
    cancel: &CancellationToken,
) -> Result<(), TransitionError> {
    if cancel.is_cancelled() {
        return record.cancel();
    }
    record.start()?;
    match orchestrator.process_with_cancel(ctx, cancel).await {
        Ok(result) => {
            info!(id = %record.id, quality = result.quality_score, "generation completed");
            record.complete(result)
        }
        Err(PipelineError::Cancelled) => {
            info!(id = %record.id, "generation cancelled");
            record.cancel()
        }
        Err(err @ PipelineError::Assembly(_)) => {
            info!(id = %record.id, error = %err, "generation failed");
            record.fail(err.to_string())
        }
    }
}
