//! Assembled output of one pipeline run.

use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::adapters::ModelKind;
use crate::artifacts::{Documentation, FileSet, ProjectSchema, ReviewFeedback};
use crate::strategy::StrategyMode;

/// Elapsed time per stage, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageTimings {
    pub context_analysis_ms: Option<u64>,
    pub schema_extraction_ms: u64,
    pub code_generation_ms: u64,
    pub code_review_ms: u64,
    pub documentation_ms: u64,
    pub total_ms: u64,
}

impl StageTimings {
    pub fn record(&mut self, kind: ModelKind, elapsed: Duration) {
        let ms = millis(elapsed);
        match kind {
            ModelKind::SchemaExtractor => self.schema_extraction_ms = ms,
            ModelKind::CodeGenerator => self.code_generation_ms = ms,
            ModelKind::CodeReviewer => self.code_review_ms = ms,
            ModelKind::DocGenerator => self.documentation_ms = ms,
        }
    }

    pub fn get(&self, kind: ModelKind) -> u64 {
        match kind {
            ModelKind::SchemaExtractor => self.schema_extraction_ms,
            ModelKind::CodeGenerator => self.code_generation_ms,
            ModelKind::CodeReviewer => self.code_review_ms,
            ModelKind::DocGenerator => self.documentation_ms,
        }
    }
}

pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// How one stage went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: ModelKind,
    /// True when the static fallback replaced the stage output.
    pub fallback: bool,
    pub reason: Option<String>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub request_id: Uuid,
    pub mode: StrategyMode,
    pub enhanced: bool,
    pub stages: Vec<StageReport>,
    pub recommendations: Vec<String>,
}

impl RunMetadata {
    pub fn fallback_stages(&self) -> Vec<ModelKind> {
        self.stages.iter().filter(|s| s.fallback).map(|s| s.stage).collect()
    }

    pub fn stage(&self, kind: ModelKind) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == kind)
    }
}

/// Always fully populated, whatever fell back along the way.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub files: FileSet,
    pub schema: ProjectSchema,
    pub review: ReviewFeedback,
    pub documentation: Documentation,
    pub quality_score: f64,
    pub timings: StageTimings,
    pub metadata: RunMetadata,
}
