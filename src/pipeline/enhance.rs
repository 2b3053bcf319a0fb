//! Optional context analysis ahead of the pipeline.
//!
//! When enabled and an analyzer is configured, the prompt is analysed first
//! and each stage sees its rewritten prompt. Analysis failure never fails
//! the run; the stages then use the original prompt.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::telemetry;

use super::context::{Enhancement, GenerationContext};
use super::orchestrator::{PipelineError, PipelineOrchestrator};
use super::progress::{PipelineStage, ProgressTracker};
use super::result::PipelineResult;

/// Request sent to the context-analysis service.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    pub prompt: String,
    pub user_id: Option<String>,
    pub domain: String,
    pub tech_stack: String,
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("context analysis unavailable: {0}")]
    Unavailable(String),

    #[error("context analysis failed: {0}")]
    Failed(String),

    #[error("context analysis timed out after {0:?}")]
    Timeout(Duration),
}

/// External context-analysis service.
#[async_trait]
pub trait ContextAnalyzer: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest) -> Result<Enhancement, AnalysisError>;
}

pub const DEFAULT_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(30);

/// Wraps a `PipelineOrchestrator` with optional context analysis.
pub struct EnhancedOrchestrator {
    inner: PipelineOrchestrator,
    analyzer: Option<Arc<dyn ContextAnalyzer>>,
    enabled: bool,
    analysis_timeout: Duration,
}

impl EnhancedOrchestrator {
    pub fn new(inner: PipelineOrchestrator) -> Self {
        Self { inner, analyzer: None, enabled: true, analysis_timeout: DEFAULT_ANALYSIS_TIMEOUT }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn ContextAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_analysis_timeout(mut self, timeout: Duration) -> Self {
        self.analysis_timeout = timeout;
        self
    }

    pub fn inner(&self) -> &PipelineOrchestrator {
        &self.inner
    }

    /// True when `process` will call the analyzer.
    pub fn is_active(&self) -> bool {
        self.enabled && self.analyzer.is_some()
    }

    pub async fn process(&self, ctx: &GenerationContext) -> Result<PipelineResult, PipelineError> {
        self.process_with_cancel(ctx, &CancellationToken::new()).await
    }

    pub async fn process_with_cancel(
        &self,
        ctx: &GenerationContext,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult, PipelineError> {
        let mut tracker = ProgressTracker::new(self.inner.progress());
        let analyzer = match &self.analyzer {
            Some(analyzer) if self.enabled => analyzer,
            _ => return self.inner.run(ctx, cancel, &mut tracker, None).await,
        };

        tracker.emit(PipelineStage::Initializing, "starting generation").await;
        tracker.emit(PipelineStage::ContextAnalysis, "analysing prompt").await;
        let started = Instant::now();
        let analysis = self.analyze(analyzer.as_ref(), ctx, cancel).await;
        let elapsed = started.elapsed();

        let effective = match analysis {
            Ok(enhancement) => {
                telemetry::record_enhancement(true);
                info!(
                    request_id = %ctx.request_id(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    recommendations = enhancement.analysis.recommendations.len(),
                    "context analysis applied"
                );
                ctx.enhanced(enhancement)
            }
            Err(None) => return Err(PipelineError::Cancelled),
            Err(Some(err)) => {
                telemetry::record_enhancement(false);
                warn!(request_id = %ctx.request_id(), error = %err, "context analysis failed, using original prompt");
                ctx.clone()
            }
        };

        self.inner.run(&effective, cancel, &mut tracker, Some(elapsed)).await
    }

    /// `Err(None)` means the caller cancelled.
    async fn analyze(
        &self,
        analyzer: &dyn ContextAnalyzer,
        ctx: &GenerationContext,
        cancel: &CancellationToken,
    ) -> Result<Enhancement, Option<AnalysisError>> {
        let request = AnalysisRequest {
            prompt: ctx.prompt().to_string(),
            user_id: ctx.user_id().map(str::to_string),
            domain: ctx.domain().to_string(),
            tech_stack: ctx.tech_stack().to_string(),
        };
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(None),
            res = tokio::time::timeout(self.analysis_timeout, analyzer.analyze(request)) => match res {
                Ok(Ok(enhancement)) => Ok(enhancement),
                Ok(Err(err)) => Err(Some(err)),
                Err(_) => Err(Some(AnalysisError::Timeout(self.analysis_timeout))),
            },
        }
    }
}
