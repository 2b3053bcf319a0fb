//! Fixed four-stage generation pipeline.
//!
//! Each stage leases its adapter from the resource manager only for the
//! duration of that stage, runs it through the offload scheduler and falls
//! back to a static output on any failure. A stage whose adapter is busy
//! with another run waits for it, within the stage deadline. Only
//! cancellation and assembly errors end a run early.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};

use crate::adapters::{
    AdapterError, CodeTask, DocsTask, ModelKind, ReviewTask, SchemaTask, TaskInput, TaskOutput,
};
use crate::artifacts::{Documentation, FileSet, ProjectSchema, ReviewFeedback};
use crate::models::{ResourceError, ResourceManager};
use crate::scheduler::{run_offloaded, OffloadError};
use crate::strategy::StrategyMode;
use crate::telemetry::{self, PipelineSpan, SpanExt, StageSpan};

use super::context::GenerationContext;
use super::fallback::{fallback_docs, fallback_files, fallback_review, fallback_schema};
use super::progress::{NoopProgress, PipelineStage, ProgressSink, ProgressTracker};
use super::quality::quality_score;
use super::result::{millis, PipelineResult, RunMetadata, StageReport, StageTimings};

/// Why a single stage did not produce output. Recovered by fallback,
/// except `Cancelled`.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("adapter failed: {0}")]
    Adapter(AdapterError),

    #[error("stage exceeded its {0:?} deadline")]
    Timeout(Duration),

    #[error("expected {expected} output, got {got}")]
    WrongOutput { expected: ModelKind, got: ModelKind },

    #[error("stage task failed: {0}")]
    Join(String),

    #[error("stage cancelled")]
    Cancelled,
}

impl From<OffloadError> for StageError {
    fn from(err: OffloadError) -> Self {
        match err {
            OffloadError::Cancelled => Self::Cancelled,
            OffloadError::Timeout(limit) => Self::Timeout(limit),
            OffloadError::Join(msg) => Self::Join(msg),
            OffloadError::Adapter(err) => Self::Adapter(err),
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("generation cancelled")]
    Cancelled,

    #[error("could not assemble result: {0}")]
    Assembly(String),
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Deadline per stage. `None` waits indefinitely.
    pub stage_timeout: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { stage_timeout: Some(Duration::from_secs(crate::config::DEFAULT_STAGE_TIMEOUT_SECS)) }
    }
}

/// Runs the fixed stage sequence against a resource manager.
pub struct PipelineOrchestrator {
    manager: Arc<ResourceManager>,
    mode: StrategyMode,
    config: OrchestratorConfig,
    progress: Arc<dyn ProgressSink>,
}

/// Per-run bookkeeping.
struct RunState {
    used: BTreeSet<ModelKind>,
    timings: StageTimings,
    stages: Vec<StageReport>,
}

impl RunState {
    fn new() -> Self {
        Self { used: BTreeSet::new(), timings: StageTimings::default(), stages: Vec::new() }
    }
}

impl PipelineOrchestrator {
    pub fn new(manager: Arc<ResourceManager>, mode: StrategyMode) -> Self {
        Self {
            manager,
            mode,
            config: OrchestratorConfig::default(),
            progress: Arc::new(NoopProgress),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    pub fn mode(&self) -> StrategyMode {
        self.mode
    }

    pub fn manager(&self) -> &Arc<ResourceManager> {
        &self.manager
    }

    pub(crate) fn progress(&self) -> &dyn ProgressSink {
        self.progress.as_ref()
    }

    pub async fn process(&self, ctx: &GenerationContext) -> Result<PipelineResult, PipelineError> {
        self.process_with_cancel(ctx, &CancellationToken::new()).await
    }

    pub async fn process_with_cancel(
        &self,
        ctx: &GenerationContext,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult, PipelineError> {
        let mut tracker = ProgressTracker::new(self.progress.as_ref());
        self.run(ctx, cancel, &mut tracker, None).await
    }

    /// Run with the caller's tracker. `analysis` is the time already spent
    /// on context analysis, if any.
    pub(crate) async fn run(
        &self,
        ctx: &GenerationContext,
        cancel: &CancellationToken,
        tracker: &mut ProgressTracker<'_>,
        analysis: Option<Duration>,
    ) -> Result<PipelineResult, PipelineError> {
        let request_id = ctx.request_id().to_string();
        let span = PipelineSpan::new(&request_id, self.mode.as_str(), ctx.tech_stack());
        let result = self.run_stages(ctx, cancel, tracker, analysis).instrument(span.clone()).await;
        span.record_result(&result);

        match &result {
            Ok(res) => {
                span.record("quality", res.quality_score);
                span.record("fallbacks", res.metadata.fallback_stages().len());
                telemetry::record_pipeline_run(self.mode, "completed", Some(res.quality_score));
            }
            Err(PipelineError::Cancelled) => telemetry::record_pipeline_run(self.mode, "cancelled", None),
            Err(PipelineError::Assembly(_)) => telemetry::record_pipeline_run(self.mode, "failed", None),
        }
        result
    }

    async fn run_stages(
        &self,
        ctx: &GenerationContext,
        cancel: &CancellationToken,
        tracker: &mut ProgressTracker<'_>,
        analysis: Option<Duration>,
    ) -> Result<PipelineResult, PipelineError> {
        let started = Instant::now();
        let mut run = RunState::new();
        run.timings.context_analysis_ms = analysis.map(millis);
        if !tracker.started() {
            tracker.emit(PipelineStage::Initializing, "starting generation").await;
        }

        ensure_live(cancel)?;
        tracker.emit(PipelineStage::SchemaExtraction, "extracting schema").await;
        let input = TaskInput::Schema(SchemaTask {
            prompt: ctx.prompt_for(ModelKind::SchemaExtractor).to_string(),
            domain: ctx.domain().to_string(),
            tech_stack: ctx.tech_stack().to_string(),
            constraints: ctx.constraints().to_vec(),
        });
        let schema = self
            .stage(&mut run, input, cancel, take_schema, |_| fallback_schema())
            .await?;

        ensure_live(cancel)?;
        tracker.emit(PipelineStage::CodeGeneration, "generating code").await;
        let input = TaskInput::Code(CodeTask {
            prompt: ctx.prompt_for(ModelKind::CodeGenerator).to_string(),
            domain: ctx.domain().to_string(),
            tech_stack: ctx.tech_stack().to_string(),
            constraints: ctx.constraints().to_vec(),
            schema: schema.clone(),
        });
        let files = self
            .stage(&mut run, input, cancel, take_files, |_| fallback_files(ctx, &schema))
            .await?;

        ensure_live(cancel)?;
        tracker.emit(PipelineStage::CodeReview, "reviewing code").await;
        let input = TaskInput::Review(ReviewTask {
            prompt: ctx.prompt_for(ModelKind::CodeReviewer).to_string(),
            tech_stack: ctx.tech_stack().to_string(),
            schema: schema.clone(),
            files: files.clone(),
        });
        let review = self
            .stage(&mut run, input, cancel, take_review, |_| fallback_review())
            .await?;

        ensure_live(cancel)?;
        tracker.emit(PipelineStage::Documentation, "writing documentation").await;
        let input = TaskInput::Docs(DocsTask {
            prompt: ctx.prompt_for(ModelKind::DocGenerator).to_string(),
            project_name: ctx.project_name(),
            tech_stack: ctx.tech_stack().to_string(),
            schema: schema.clone(),
            files: files.clone(),
            review: review.clone(),
        });
        let documentation = self
            .stage(&mut run, input, cancel, take_docs, |_| fallback_docs(ctx, &schema, &files))
            .await?;

        let result = assemble(ctx, self.mode, run, started, files, schema, review, documentation)?;
        tracker.emit(PipelineStage::Done, "generation complete").await;
        Ok(result)
    }

    /// Run one stage, substituting `fallback` on any recoverable error.
    async fn stage<T, X, F>(
        &self,
        run: &mut RunState,
        input: TaskInput,
        cancel: &CancellationToken,
        extract: X,
        fallback: F,
    ) -> Result<T, PipelineError>
    where
        X: FnOnce(TaskOutput) -> Result<T, StageError>,
        F: FnOnce(&StageError) -> T,
    {
        let kind = input.kind();
        let span = StageSpan::new(kind);
        let started = Instant::now();
        let outcome = self
            .attempt(run, input, cancel)
            .instrument(span.clone())
            .await
            .and_then(extract);
        let elapsed = started.elapsed();
        span.record_result(&outcome);
        span.record("elapsed_ms", millis(elapsed));
        run.timings.record(kind, elapsed);

        let (value, report) = match outcome {
            Ok(value) => {
                debug!(stage = %kind, elapsed_ms = millis(elapsed), "stage completed");
                (value, StageReport { stage: kind, fallback: false, reason: None, elapsed_ms: millis(elapsed) })
            }
            Err(StageError::Cancelled) => return Err(PipelineError::Cancelled),
            Err(err) => {
                warn!(stage = %kind, error = %err, "stage failed, using fallback");
                let value = fallback(&err);
                (
                    value,
                    StageReport {
                        stage: kind,
                        fallback: true,
                        reason: Some(err.to_string()),
                        elapsed_ms: millis(elapsed),
                    },
                )
            }
        };
        telemetry::record_stage(kind, elapsed, report.fallback);
        run.stages.push(report);
        Ok(value)
    }

    async fn attempt(
        &self,
        run: &mut RunState,
        input: TaskInput,
        cancel: &CancellationToken,
    ) -> Result<TaskOutput, StageError> {
        let kind = input.kind();
        // Waiting for a busy adapter counts against the stage deadline.
        let wait = self.config.stage_timeout.unwrap_or_else(|| self.manager.admission_wait());
        let acquired = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(StageError::Cancelled),
            acquired = self.manager.acquire_within(kind, wait) => acquired?,
        };
        if let Some(victim) = acquired.evicted {
            if run.used.contains(&victim) {
                warn!(
                    stage = %kind,
                    evicted = %victim,
                    max_concurrent = self.manager.max_concurrent(),
                    "run evicted an adapter it used earlier; raise max_concurrent to avoid reloads"
                );
            }
        }
        run.used.insert(kind);
        let output = run_offloaded(acquired.handle, input, cancel, self.config.stage_timeout).await?;
        Ok(output)
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    Ok(())
}

fn wrong(expected: ModelKind, got: &TaskOutput) -> StageError {
    StageError::WrongOutput { expected, got: got.kind() }
}

fn take_schema(out: TaskOutput) -> Result<ProjectSchema, StageError> {
    match out {
        TaskOutput::Schema(schema) => Ok(schema),
        other => Err(wrong(ModelKind::SchemaExtractor, &other)),
    }
}

fn take_files(out: TaskOutput) -> Result<FileSet, StageError> {
    match out {
        TaskOutput::Code(files) if !files.is_empty() => Ok(files),
        TaskOutput::Code(_) => Err(StageError::Adapter(AdapterError::Parse {
            kind: ModelKind::CodeGenerator,
            reason: "no files generated".to_string(),
        })),
        other => Err(wrong(ModelKind::CodeGenerator, &other)),
    }
}

fn take_review(out: TaskOutput) -> Result<ReviewFeedback, StageError> {
    match out {
        TaskOutput::Review(mut review) => {
            review.scores = review.scores.normalized();
            Ok(review)
        }
        other => Err(wrong(ModelKind::CodeReviewer, &other)),
    }
}

fn take_docs(out: TaskOutput) -> Result<Documentation, StageError> {
    match out {
        TaskOutput::Docs(docs) => Ok(docs),
        other => Err(wrong(ModelKind::DocGenerator, &other)),
    }
}

#[allow(clippy::too_many_arguments)]
fn assemble(
    ctx: &GenerationContext,
    mode: StrategyMode,
    mut run: RunState,
    started: Instant,
    files: FileSet,
    schema: ProjectSchema,
    review: ReviewFeedback,
    documentation: Documentation,
) -> Result<PipelineResult, PipelineError> {
    if files.is_empty() {
        return Err(PipelineError::Assembly("no files in result".to_string()));
    }
    if documentation.is_empty() {
        return Err(PipelineError::Assembly("no documentation in result".to_string()));
    }
    let quality = quality_score(&files, &schema, &review);
    if !quality.is_finite() {
        return Err(PipelineError::Assembly(format!("non-finite quality score {quality}")));
    }
    run.timings.total_ms = millis(started.elapsed()) + run.timings.context_analysis_ms.unwrap_or(0);

    let recommendations = ctx
        .enhancement()
        .map(|e| e.analysis.recommendations.clone())
        .unwrap_or_default();

    Ok(PipelineResult {
        files,
        schema,
        review,
        documentation,
        quality_score: quality,
        timings: run.timings,
        metadata: RunMetadata {
            request_id: ctx.request_id(),
            mode,
            enhanced: ctx.is_enhanced(),
            stages: run.stages,
            recommendations,
        },
    })
}
