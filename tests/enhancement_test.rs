//! Tests for EnhancedOrchestrator context analysis.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use common::{manager, CannedBackend, PromptLog};
use forge_core::adapters::{ModelAdapter, ModelKind, SchemaExtractor};
use forge_core::models::AdapterTable;
use forge_core::pipeline::{
    AnalysisError, AnalysisRequest, ContextAnalysis, ContextAnalyzer, EnhancedOrchestrator,
    Enhancement, GenerationContext, PipelineOrchestrator, StagePrompts,
};
use forge_core::strategy::StrategyMode;

const SCHEMA_REPLY: &str = r#"{"entities":[{"name":"Patient","fields":[{"name":"id","type":"integer","required":true}]}],"endpoints":[{"method":"GET","path":"/patients"}]}"#;

enum Reply {
    Rewrite,
    Fail,
    Hang,
}

struct StubAnalyzer {
    reply: Reply,
    calls: AtomicUsize,
    seen: Mutex<Option<AnalysisRequest>>,
}

impl StubAnalyzer {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self { reply, calls: AtomicUsize::new(0), seen: Mutex::new(None) })
    }
}

#[async_trait]
impl ContextAnalyzer for StubAnalyzer {
    async fn analyze(&self, request: AnalysisRequest) -> Result<Enhancement, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen.lock().unwrap() = Some(request);
        match self.reply {
            Reply::Rewrite => Ok(Enhancement {
                analysis: ContextAnalysis {
                    summary: "clinic records".to_string(),
                    detected_domain: Some("healthcare".to_string()),
                    complexity: Some("medium".to_string()),
                    recommendations: vec!["encrypt patient data at rest".to_string()],
                },
                prompts: StagePrompts {
                    schema: Some("Extract Patient and Appointment entities for a clinic".to_string()),
                    ..StagePrompts::default()
                },
            }),
            Reply::Fail => Err(AnalysisError::Failed("upstream 502".to_string())),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(AnalysisError::Unavailable("never".to_string()))
            }
        }
    }
}

fn orchestrator(log: &PromptLog) -> EnhancedOrchestrator {
    let log = log.clone();
    let table = AdapterTable::new().with(ModelKind::SchemaExtractor, "canned", move || {
        Box::new(SchemaExtractor::new(Box::new(CannedBackend::sharing(SCHEMA_REPLY, log.clone()))))
            as Box<dyn ModelAdapter>
    });
    EnhancedOrchestrator::new(PipelineOrchestrator::new(manager(2, table), StrategyMode::InferenceOnly))
}

fn schema_prompt(log: &PromptLog) -> String {
    log.lock().unwrap().first().map(|r| r.prompt.clone()).unwrap_or_default()
}

#[tokio::test]
async fn test_enhancement_rewrites_stage_prompt() {
    let log = PromptLog::default();
    let analyzer = StubAnalyzer::new(Reply::Rewrite);
    let orch = orchestrator(&log).with_analyzer(analyzer.clone());
    let ctx = GenerationContext::new("clinic app").with_user("u-9").with_domain("health");

    let result = orch.process(&ctx).await.unwrap();

    assert!(result.metadata.enhanced);
    assert_eq!(result.metadata.recommendations, vec!["encrypt patient data at rest".to_string()]);
    assert!(result.timings.context_analysis_ms.is_some());
    assert!(schema_prompt(&log).contains("Extract Patient and Appointment entities"));
    assert_eq!(result.schema.entities[0].name, "Patient");

    let seen = analyzer.seen.lock().unwrap().clone().unwrap();
    assert_eq!(seen.prompt, "clinic app");
    assert_eq!(seen.user_id.as_deref(), Some("u-9"));
    assert_eq!(seen.domain, "health");
}

#[tokio::test]
async fn test_analysis_failure_uses_original_prompt() {
    let log = PromptLog::default();
    let orch = orchestrator(&log).with_analyzer(StubAnalyzer::new(Reply::Fail));

    let result = orch.process(&GenerationContext::new("clinic app")).await.unwrap();

    assert!(!result.metadata.enhanced);
    assert!(result.metadata.recommendations.is_empty());
    assert!(schema_prompt(&log).contains("clinic app"));
    assert!(!result.files.is_empty());
}

#[tokio::test]
async fn test_analysis_timeout_is_not_fatal() {
    let log = PromptLog::default();
    let orch = orchestrator(&log)
        .with_analyzer(StubAnalyzer::new(Reply::Hang))
        .with_analysis_timeout(Duration::from_millis(50));

    let result = orch.process(&GenerationContext::new("clinic app")).await.unwrap();

    assert!(!result.metadata.enhanced);
    assert!(result.timings.context_analysis_ms.unwrap() >= 50);
}

#[tokio::test]
async fn test_disabled_enhancement_skips_analyzer() {
    let log = PromptLog::default();
    let analyzer = StubAnalyzer::new(Reply::Rewrite);
    let orch = orchestrator(&log).with_analyzer(analyzer.clone()).with_enabled(false);

    assert!(!orch.is_active());
    let result = orch.process(&GenerationContext::new("clinic app")).await.unwrap();

    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
    assert!(!result.metadata.enhanced);
    assert!(result.timings.context_analysis_ms.is_none());
}

#[tokio::test]
async fn test_no_analyzer_runs_plain_pipeline() {
    let log = PromptLog::default();
    let orch = orchestrator(&log);

    assert!(!orch.is_active());
    let result = orch.process(&GenerationContext::new("clinic app")).await.unwrap();
    assert_eq!(result.metadata.mode, StrategyMode::InferenceOnly);
    assert!(!result.metadata.enhanced);
}
