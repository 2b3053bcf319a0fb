//! Model-backed schema extraction.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::engine::TextBackend;

use super::backed::{render_list, BackedCore};
use super::parse::parse_schema;
use super::{unexpected, AdapterError, ModelAdapter, ModelKind, SchemaTask, TaskInput, TaskOutput};

const SYSTEM: &str = "Extract the data model for the requested backend. Reply with one JSON object \
with keys entities (name, fields[name,type,required]), relationships (from,to,kind), \
endpoints (method,path,description) and constraints.";

/// Turns a natural-language request into a `ProjectSchema`.
pub struct SchemaExtractor {
    core: BackedCore,
}

impl SchemaExtractor {
    pub fn new(backend: Box<dyn TextBackend>) -> Self {
        Self { core: BackedCore::new(ModelKind::SchemaExtractor, backend) }
    }
}

fn render(task: &SchemaTask) -> String {
    format!(
        "Project request:\n{}\n\nDomain: {}\nTech stack: {}\nConstraints:\n{}\n",
        task.prompt,
        task.domain,
        task.tech_stack,
        render_list(&task.constraints)
    )
}

#[async_trait]
impl ModelAdapter for SchemaExtractor {
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
            TaskInput::Schema(task) => task,
            other => return Err(unexpected(self.kind(), &other)),
        };
        let text = self.core.complete(self.core.request(SYSTEM, render(&task)), cancel).await?;
        parse_schema(&text)
            .map(TaskOutput::Schema)
            .map_err(|reason| AdapterError::Parse { kind: self.kind(), reason })
    }

    async fn cleanup(&mut self) -> Result<(), AdapterError> {
        self.core.cleanup().await
    }
}
