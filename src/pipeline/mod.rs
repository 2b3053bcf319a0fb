//! Generation pipeline: schema → code → review → docs.

mod context;
mod enhance;
pub mod fallback;
mod orchestrator;
mod progress;
mod quality;
mod result;

pub use context::{ContextAnalysis, Enhancement, GenerationContext, StagePrompts};
pub use enhance::{
    AnalysisError, AnalysisRequest, ContextAnalyzer, EnhancedOrchestrator, DEFAULT_ANALYSIS_TIMEOUT,
};
pub use fallback::TechStack;
pub use orchestrator::{OrchestratorConfig, PipelineError, PipelineOrchestrator, StageError};
pub use progress::{
    ChannelProgress, NoopProgress, PipelineStage, ProgressEvent, ProgressSink, TracingProgress,
};
pub use quality::quality_score;
pub use result::{PipelineResult, RunMetadata, StageReport, StageTimings};
