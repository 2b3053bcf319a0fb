//! Shared fixtures for integration tests: a scripted adapter whose
//! behaviour is chosen per kind, and a canned-text backend.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use forge_core::adapters::{AdapterError, ModelAdapter, ModelKind, TaskInput, TaskOutput};
use forge_core::artifacts::{Endpoint, Entity, Field, ProjectSchema, ReviewFeedback, ReviewScores};
use forge_core::engine::{BackendError, CompletionRequest, TextBackend};
use forge_core::models::{AdapterTable, ResourceManager};

/// What a scripted adapter does when asked to work.
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed,
    FailLoad,
    FailGenerate,
    /// Return the output variant of a different kind.
    WrongOutput,
    /// Wait this long (observing cancellation) and then succeed.
    Sleep(Duration),
}

/// Per-kind counters shared between a table and the test.
#[derive(Debug, Default)]
pub struct Counters {
    loads: Mutex<BTreeMap<ModelKind, usize>>,
    cleanups: Mutex<BTreeMap<ModelKind, usize>>,
    calls: AtomicUsize,
}

impl Counters {
    pub fn loads(&self, kind: ModelKind) -> usize {
        self.loads.lock().unwrap().get(&kind).copied().unwrap_or(0)
    }

    pub fn cleanups(&self, kind: ModelKind) -> usize {
        self.cleanups.lock().unwrap().get(&kind).copied().unwrap_or(0)
    }

    pub fn total_loads(&self) -> usize {
        self.loads.lock().unwrap().values().sum()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn bump(map: &Mutex<BTreeMap<ModelKind, usize>>, kind: ModelKind) {
        *map.lock().unwrap().entry(kind).or_default() += 1;
    }
}

pub struct Scripted {
    kind: ModelKind,
    behavior: Behavior,
    counters: Arc<Counters>,
}

#[async_trait]
impl ModelAdapter for Scripted {
    fn kind(&self) -> ModelKind {
        self.kind
    }

    async fn load(&mut self) -> Result<(), AdapterError> {
        if matches!(self.behavior, Behavior::FailLoad) {
            return Err(AdapterError::Unavailable(format!("{} weights missing", self.kind)));
        }
        Counters::bump(&self.counters.loads, self.kind);
        Ok(())
    }

    async fn generate(
        &self,
        input: TaskInput,
        cancel: &CancellationToken,
    ) -> Result<TaskOutput, AdapterError> {
        self.counters.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(input.kind(), self.kind, "orchestrator routed the wrong input");
        match &self.behavior {
            Behavior::Succeed | Behavior::FailLoad => Ok(canned_output(self.kind)),
            Behavior::FailGenerate => Err(AdapterError::Unavailable("model crashed".into())),
            Behavior::WrongOutput => Ok(canned_output(other_kind(self.kind))),
            Behavior::Sleep(delay) => {
                tokio::select! {
                    () = cancel.cancelled() => Err(AdapterError::Cancelled),
                    () = tokio::time::sleep(*delay) => Ok(canned_output(self.kind)),
                }
            }
        }
    }

    async fn cleanup(&mut self) -> Result<(), AdapterError> {
        Counters::bump(&self.counters.cleanups, self.kind);
        Ok(())
    }
}

fn other_kind(kind: ModelKind) -> ModelKind {
    match kind {
        ModelKind::SchemaExtractor => ModelKind::DocGenerator,
        _ => ModelKind::SchemaExtractor,
    }
}

pub fn sample_schema() -> ProjectSchema {
    ProjectSchema {
        entities: vec![
            Entity {
                name: "Book".to_string(),
                fields: vec![Field::new("id", "integer", true), Field::new("title", "string", true)],
            },
            Entity {
                name: "Author".to_string(),
                fields: vec![Field::new("id", "integer", true), Field::new("name", "string", true)],
            },
        ],
        relationships: Vec::new(),
        endpoints: vec![Endpoint::new("GET", "/books", "List books")],
        constraints: Vec::new(),
    }
}

/// A valid output for `kind`, distinguishable from any fallback.
pub fn canned_output(kind: ModelKind) -> TaskOutput {
    match kind {
        ModelKind::SchemaExtractor => TaskOutput::Schema(sample_schema()),
        ModelKind::CodeGenerator => {
            let mut files = BTreeMap::new();
            for (path, body) in [
                ("app/main.py", "from fastapi import FastAPI\napp = FastAPI()\n"),
                ("app/models.py", "class Book: ...\nclass Author: ...\n"),
                ("app/routes.py", "# routes\n"),
                ("requirements.txt", "fastapi\nuvicorn\n"),
                ("tests/test_books.py", "def test_list(): ...\n"),
                ("Dockerfile", "FROM python:3.12\n"),
            ] {
                files.insert(path.to_string(), body.to_string());
            }
            TaskOutput::Code(files)
        }
        ModelKind::CodeReviewer => TaskOutput::Review(ReviewFeedback {
            issues: Vec::new(),
            suggestions: vec!["add pagination".to_string()],
            scores: ReviewScores { overall: 0.9, correctness: 0.9, security: 0.8, maintainability: 0.85 },
        }),
        ModelKind::DocGenerator => {
            let mut docs = BTreeMap::new();
            docs.insert("README.md".to_string(), "# Library\n\nScripted docs.\n".to_string());
            docs.insert("API.md".to_string(), "# API\n".to_string());
            TaskOutput::Docs(docs)
        }
    }
}

/// A table registering a `Scripted` adapter for each listed kind.
pub fn scripted_table(behaviors: &[(ModelKind, Behavior)], counters: &Arc<Counters>) -> AdapterTable {
    let mut table = AdapterTable::new();
    for (kind, behavior) in behaviors.iter().cloned() {
        let counters = counters.clone();
        table.register(kind, format!("scripted:{}", kind), move || {
            Box::new(Scripted { kind, behavior: behavior.clone(), counters: counters.clone() })
                as Box<dyn ModelAdapter>
        });
    }
    table
}

/// Every kind with the same behaviour.
pub fn uniform(behavior: Behavior) -> Vec<(ModelKind, Behavior)> {
    ModelKind::ALL.iter().map(|&k| (k, behavior.clone())).collect()
}

pub fn manager(limit: usize, table: AdapterTable) -> Arc<ResourceManager> {
    Arc::new(ResourceManager::with_limit(limit, table).unwrap())
}

/// Backend returning a fixed reply and recording every prompt.
pub struct CannedBackend {
    reply: String,
    pub prompts: Arc<Mutex<Vec<CompletionRequest>>>,
    loaded: bool,
}

impl CannedBackend {
    pub fn new(reply: impl Into<String>) -> Self {
        Self::sharing(reply, Arc::new(Mutex::new(Vec::new())))
    }

    /// A backend that records into an existing log.
    pub fn sharing(reply: impl Into<String>, prompts: Arc<Mutex<Vec<CompletionRequest>>>) -> Self {
        Self { reply: reply.into(), prompts, loaded: false }
    }
}

pub type PromptLog = Arc<Mutex<Vec<CompletionRequest>>>;

#[async_trait]
impl TextBackend for CannedBackend {
    fn name(&self) -> &str {
        "canned"
    }

    async fn load(&mut self) -> Result<(), BackendError> {
        self.loaded = true;
        Ok(())
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, BackendError> {
        if cancel.is_cancelled() {
            return Err(BackendError::Cancelled);
        }
        self.prompts.lock().unwrap().push(request.clone());
        Ok(self.reply.clone())
    }

    async fn unload(&mut self) {
        self.loaded = false;
    }
}
