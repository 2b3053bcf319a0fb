//! Model-backed code review.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::engine::TextBackend;

use super::backed::{render_files, BackedCore};
use super::parse::parse_review;
use super::{unexpected, AdapterError, ModelAdapter, ModelKind, ReviewTask, TaskInput, TaskOutput};

const SYSTEM: &str = "Review the generated backend project. Reply with one JSON object with keys \
issues (file, message, severity: info|warning|error), suggestions (strings) and scores \
(overall, correctness, security, maintainability, each between 0 and 1).";

/// Maximum characters of source passed to the reviewer.
const REVIEW_SOURCE_BUDGET: usize = 24_000;

/// Scores generated files and lists issues.
pub struct CodeReviewer {
    core: BackedCore,
}

impl CodeReviewer {
    pub fn new(backend: Box<dyn TextBackend>) -> Self {
        Self { core: BackedCore::new(ModelKind::CodeReviewer, backend) }
    }
}

fn render(task: &ReviewTask) -> String {
    format!(
        "Original request:\n{}\n\nTech stack: {}\nEntities: {}\n\n{}",
        task.prompt,
        task.tech_stack,
        task.schema.entities.iter().map(|e| e.name.as_str()).collect::<Vec<_>>().join(", "),
        render_files(&task.files, REVIEW_SOURCE_BUDGET)
    )
}

#[async_trait]
impl ModelAdapter for CodeReviewer {
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
            TaskInput::Review(task) => task,
            other => return Err(unexpected(self.kind(), &other)),
        };
        let text = self.core.complete(self.core.request(SYSTEM, render(&task)), cancel).await?;
        parse_review(&text)
            .map(TaskOutput::Review)
            .map_err(|reason| AdapterError::Parse { kind: self.kind(), reason })
    }

    async fn cleanup(&mut self) -> Result<(), AdapterError> {
        self.core.cleanup().await
    }
}
