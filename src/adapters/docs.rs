//! Model-backed documentation generation.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::artifacts::Documentation;
use crate::engine::TextBackend;

use super::backed::BackedCore;
use super::parse::parse_files;
use super::{unexpected, AdapterError, DocsTask, ModelAdapter, ModelKind, TaskInput, TaskOutput};

const SYSTEM: &str = "Write project documentation in markdown. Emit each document as a \
`### File: <name>.md` heading followed by one fenced block. Always include README.md.";

/// Writes markdown documents for the generated project.
pub struct DocGenerator {
    core: BackedCore,
}

impl DocGenerator {
    pub fn new(backend: Box<dyn TextBackend>) -> Self {
        Self { core: BackedCore::new(ModelKind::DocGenerator, backend) }
    }
}

fn render(task: &DocsTask) -> String {
    let endpoints = task
        .schema
        .endpoints
        .iter()
        .map(|e| format!("- {} {} {}", e.method, e.path, e.description))
        .collect::<Vec<_>>()
        .join("\n");
    let files = task.files.keys().map(|p| format!("- {p}")).collect::<Vec<_>>().join("\n");
    format!(
        "Project: {}\nRequest:\n{}\n\nTech stack: {}\nEndpoints:\n{}\n\nFiles:\n{}\n\nReview score: {:.2}\n",
        task.project_name, task.prompt, task.tech_stack, endpoints, files, task.review.scores.overall
    )
}

/// Treat unstructured markdown as the README.
fn into_documents(text: &str) -> Documentation {
    let docs = parse_files(text);
    if docs.is_empty() && !text.trim().is_empty() {
        let mut single = Documentation::new();
        single.insert("README.md".to_string(), format!("{}\n", text.trim()));
        return single;
    }
    docs
}

#[async_trait]
impl ModelAdapter for DocGenerator {
    fn kind(&self) -> ModelKind {
        self.core.kind()
    }

    async fn load(&mut self) -> Result<(), AdapterError> {
        self.core.load().await
    }

    async fn generate(
        &self,
        input: TaskInput,
        cancel: &CancellationToken,
    ) -> Result<TaskOutput, AdapterError> {
        let task = match input {
            TaskInput::Docs(task) => task,
            other => return Err(unexpected(self.kind(), &other)),
        };
        let text = self.core.complete(self.core.request(SYSTEM, render(&task)), cancel).await?;
        let docs = into_documents(&text);
        if docs.is_empty() {
            return Err(AdapterError::Parse { kind: self.kind(), reason: "empty documentation".into() });
        }
        Ok(TaskOutput::Docs(docs))
    }

    async fn cleanup(&mut self) -> Result<(), AdapterError> {
        self.core.cleanup().await
    }
}
