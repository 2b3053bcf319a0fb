//! Tests for progress event ordering.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use common::{manager, scripted_table, uniform, Behavior, Counters};
use forge_core::models::AdapterTable;
use forge_core::pipeline::{
    AnalysisError, AnalysisRequest, ChannelProgress, ContextAnalyzer, EnhancedOrchestrator,
    Enhancement, GenerationContext, PipelineOrchestrator, PipelineStage, ProgressEvent,
};
use forge_core::strategy::StrategyMode;

fn drain(mut rx: mpsc::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

fn stages(events: &[ProgressEvent]) -> Vec<PipelineStage> {
    events.iter().map(|e| e.stage).collect()
}

fn assert_non_decreasing(events: &[ProgressEvent]) {
    for pair in events.windows(2) {
        assert!(pair[0].percent <= pair[1].percent, "{:?} then {:?}", pair[0], pair[1]);
    }
}

struct Identity;

#[async_trait]
impl ContextAnalyzer for Identity {
    async fn analyze(&self, _request: AnalysisRequest) -> Result<Enhancement, AnalysisError> {
        Ok(Enhancement::default())
    }
}

#[tokio::test]
async fn test_plain_run_reports_every_stage_in_order() {
    let (sink, rx) = ChannelProgress::channel(32);
    let counters = Arc::new(Counters::default());
    let orch = PipelineOrchestrator::new(
        manager(2, scripted_table(&uniform(Behavior::Succeed), &counters)),
        StrategyMode::FullPipeline,
    )
    .with_progress(Arc::new(sink));

    orch.process(&GenerationContext::new("Fleet tracking")).await.unwrap();
    drop(orch);

    let events = drain(rx);
    assert_eq!(
        stages(&events),
        vec![
            PipelineStage::Initializing,
            PipelineStage::SchemaExtraction,
            PipelineStage::CodeGeneration,
            PipelineStage::CodeReview,
            PipelineStage::Documentation,
            PipelineStage::Done,
        ]
    );
    assert_non_decreasing(&events);
    assert_eq!(events.first().unwrap().percent, 0);
    assert_eq!(events.last().unwrap().percent, 100);
}

#[tokio::test]
async fn test_enhanced_run_reports_context_analysis_once() {
    let (sink, rx) = ChannelProgress::channel(32);
    let inner = PipelineOrchestrator::new(manager(2, AdapterTable::new()), StrategyMode::MinimalFallback)
        .with_progress(Arc::new(sink));
    let orch = EnhancedOrchestrator::new(inner).with_analyzer(Arc::new(Identity));

    orch.process(&GenerationContext::new("Fleet tracking")).await.unwrap();
    drop(orch);

    let events = drain(rx);
    let seen = stages(&events);
    assert_eq!(seen[0], PipelineStage::Initializing);
    assert_eq!(seen[1], PipelineStage::ContextAnalysis);
    assert_eq!(seen.iter().filter(|s| **s == PipelineStage::Initializing).count(), 1);
    assert_eq!(seen.last(), Some(&PipelineStage::Done));
    assert_non_decreasing(&events);
}

#[tokio::test]
async fn test_fallback_run_still_reaches_done() {
    let (sink, rx) = ChannelProgress::channel(32);
    let orch = PipelineOrchestrator::new(manager(1, AdapterTable::new()), StrategyMode::MinimalFallback)
        .with_progress(Arc::new(sink));

    orch.process(&GenerationContext::new("Fleet tracking")).await.unwrap();
    drop(orch);

    let events = drain(rx);
    assert_eq!(events.len(), 6);
    assert_eq!(events.last().unwrap().stage, PipelineStage::Done);
}
