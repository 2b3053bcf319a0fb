//! Tests for model-backed and rule-based adapters against the shared contract.

mod common;

use tokio_util::sync::CancellationToken;

use common::{sample_schema, CannedBackend};
use forge_core::adapters::{
    AdapterError, CodeGenerator, CodeReviewer, CodeTask, DocGenerator, DocsTask,
    HeuristicReviewer, HeuristicSchemaExtractor, ModelAdapter, ModelKind, ReviewTask,
    SchemaExtractor, SchemaTask, TaskInput, TaskOutput, TemplateDocGenerator,
};
use forge_core::artifacts::{FileSet, ReviewFeedback, ReviewScores};

fn schema_input(prompt: &str) -> TaskInput {
    TaskInput::Schema(SchemaTask {
        prompt: prompt.to_string(),
        domain: "general".to_string(),
        tech_stack: "python".to_string(),
        constraints: Vec::new(),
    })
}

fn code_input() -> TaskInput {
    TaskInput::Code(CodeTask {
        prompt: "library".to_string(),
        domain: "general".to_string(),
        tech_stack: "python".to_string(),
        constraints: vec!["use sqlite".to_string()],
        schema: sample_schema(),
    })
}

fn files() -> FileSet {
    [
        ("main.py".to_string(), "import os\npassword = \"hunter2\"\n".to_string()),
        ("requirements.txt".to_string(), "fastapi\n".to_string()),
    ]
    .into_iter()
    .collect()
}

fn review_input() -> TaskInput {
    TaskInput::Review(ReviewTask {
        prompt: "library".to_string(),
        tech_stack: "python".to_string(),
        schema: sample_schema(),
        files: files(),
    })
}

fn docs_input() -> TaskInput {
    TaskInput::Docs(DocsTask {
        prompt: "library".to_string(),
        project_name: "library".to_string(),
        tech_stack: "python".to_string(),
        schema: sample_schema(),
        files: files(),
        review: ReviewFeedback { issues: Vec::new(), suggestions: Vec::new(), scores: ReviewScores::neutral() },
    })
}

async fn loaded(mut adapter: Box<dyn ModelAdapter>) -> Box<dyn ModelAdapter> {
    adapter.load().await.unwrap();
    adapter
}

#[tokio::test]
async fn test_schema_extractor_parses_fenced_json() {
    let reply = "Here is the schema:\n```json\n{\"entities\":[{\"name\":\"Book\",\"fields\":[{\"name\":\"title\",\"type\":\"string\",\"required\":true}]}],\"endpoints\":[]}\n```";
    let adapter = loaded(Box::new(SchemaExtractor::new(Box::new(CannedBackend::new(reply))))).await;

    let out = adapter.generate(schema_input("books"), &CancellationToken::new()).await.unwrap();
    let TaskOutput::Schema(schema) = out else { panic!("expected schema output") };
    assert_eq!(schema.entities[0].name, "Book");
    assert_eq!(schema.entities[0].fields[0].field_type, "string");
}

#[tokio::test]
async fn test_schema_extractor_rejects_prose() {
    let adapter = loaded(Box::new(SchemaExtractor::new(Box::new(CannedBackend::new("I cannot help with that."))))).await;
    let err = adapter.generate(schema_input("books"), &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, AdapterError::Parse { kind: ModelKind::SchemaExtractor, .. }));
}

#[tokio::test]
async fn test_code_generator_drops_unsafe_paths() {
    let reply = "### File: app/main.py\n```python\nprint('hi')\n```\n\n### File: ../../etc/passwd\n```\nroot\n```\n";
    let backend = CannedBackend::new(reply);
    let prompts = backend.prompts.clone();
    let adapter = loaded(Box::new(CodeGenerator::new(Box::new(backend)))).await;

    let out = adapter.generate(code_input(), &CancellationToken::new()).await.unwrap();
    let TaskOutput::Code(files) = out else { panic!("expected code output") };
    assert_eq!(files.keys().collect::<Vec<_>>(), vec!["app/main.py"]);

    let sent = prompts.lock().unwrap()[0].prompt.clone();
    assert!(sent.contains("use sqlite"));
    assert!(sent.contains("\"Book\""), "schema is rendered into the prompt");
}

#[tokio::test]
async fn test_code_generator_empty_output_is_error() {
    let adapter = loaded(Box::new(CodeGenerator::new(Box::new(CannedBackend::new("no code today"))))).await;
    let err = adapter.generate(code_input(), &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, AdapterError::Parse { kind: ModelKind::CodeGenerator, .. }));
}

#[tokio::test]
async fn test_code_reviewer_rescales_flat_score() {
    let reply = r#"{"overall_score": 8.5, "suggestions": ["add tests"]}"#;
    let adapter = loaded(Box::new(CodeReviewer::new(Box::new(CannedBackend::new(reply))))).await;

    let out = adapter.generate(review_input(), &CancellationToken::new()).await.unwrap();
    let TaskOutput::Review(review) = out else { panic!("expected review output") };
    assert!((review.scores.overall - 0.85).abs() < 1e-9);
    assert_eq!(review.scores.security, ReviewScores::NEUTRAL);
    assert_eq!(review.suggestions, vec!["add tests".to_string()]);
}

#[tokio::test]
async fn test_doc_generator_wraps_markdown_as_readme() {
    let adapter = loaded(Box::new(DocGenerator::new(Box::new(CannedBackend::new("# Library\n\nRun it."))))).await;
    let out = adapter.generate(docs_input(), &CancellationToken::new()).await.unwrap();
    let TaskOutput::Docs(docs) = out else { panic!("expected docs output") };
    assert!(docs["README.md"].starts_with("# Library"));
}

#[tokio::test]
async fn test_generate_before_load_fails() {
    let adapter = CodeGenerator::new(Box::new(CannedBackend::new("x")));
    let err = adapter.generate(code_input(), &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, AdapterError::NotLoaded(ModelKind::CodeGenerator)));
}

#[tokio::test]
async fn test_load_is_once_and_cleanup_idempotent() {
    let mut adapter = DocGenerator::new(Box::new(CannedBackend::new("# x")));
    adapter.load().await.unwrap();
    assert!(matches!(adapter.load().await, Err(AdapterError::AlreadyLoaded(ModelKind::DocGenerator))));
    adapter.cleanup().await.unwrap();
    adapter.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_wrong_input_variant_rejected() {
    let adapter = loaded(Box::new(SchemaExtractor::new(Box::new(CannedBackend::new("{}"))))).await;
    let err = adapter.generate(code_input(), &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(
        err,
        AdapterError::UnexpectedInput { kind: ModelKind::SchemaExtractor, got: ModelKind::CodeGenerator }
    ));
}

#[tokio::test]
async fn test_cancelled_backend_call_maps_to_cancelled() {
    let adapter = loaded(Box::new(CodeGenerator::new(Box::new(CannedBackend::new("x"))))).await;
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = adapter.generate(code_input(), &cancel).await.unwrap_err();
    assert!(matches!(err, AdapterError::Cancelled));
}

#[tokio::test]
async fn test_rule_based_adapters_need_no_model() {
    let cancel = CancellationToken::new();

    let schema = loaded(Box::new(HeuristicSchemaExtractor::new())).await;
    let TaskOutput::Schema(found) = schema
        .generate(schema_input("customers place orders for products, jwt login"), &cancel)
        .await
        .unwrap()
    else {
        panic!("expected schema output")
    };
    let names: Vec<&str> = found.entities.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Customer", "Order", "Product"]);
    assert!(found.endpoints.iter().any(|e| e.path == "/auth/login"));

    let reviewer = loaded(Box::new(HeuristicReviewer::new())).await;
    let TaskOutput::Review(review) = reviewer.generate(review_input(), &cancel).await.unwrap() else {
        panic!("expected review output")
    };
    assert!(!review.issues.is_empty(), "hardcoded password is flagged");
    assert!((0.0..=1.0).contains(&review.scores.overall));

    let docs = loaded(Box::new(TemplateDocGenerator::new())).await;
    let TaskOutput::Docs(docs) = docs.generate(docs_input(), &cancel).await.unwrap() else {
        panic!("expected docs output")
    };
    assert!(docs.contains_key("README.md"));
}
