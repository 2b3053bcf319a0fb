//! Model-backed code generation.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::engine::TextBackend;

use super::backed::{render_list, BackedCore};
use super::parse::parse_files;
use super::{unexpected, AdapterError, CodeTask, ModelAdapter, ModelKind, TaskInput, TaskOutput};

const SYSTEM: &str = "Generate a complete, runnable backend project. Emit every file as a \
`### File: <relative path>` heading followed by one fenced code block. Include an entry point \
and a dependency manifest.";

/// Produces project files from a schema.
pub struct CodeGenerator {
    core: BackedCore,
}

impl CodeGenerator {
    pub fn new(backend: Box<dyn TextBackend>) -> Self {
        Self { core: BackedCore::new(ModelKind::CodeGenerator, backend) }
    }
}

fn render(task: &CodeTask) -> Result<String, AdapterError> {
    let schema = serde_json::to_string_pretty(&task.schema).map_err(|e| AdapterError::Parse {
        kind: ModelKind::CodeGenerator,
        reason: format!("schema encode: {e}"),
    })?;
    Ok(format!(
        "Project request:\n{}\n\nDomain: {}\nTech stack: {}\nConstraints:\n{}\n\nSchema:\n{}\n",
        task.prompt,
        task.domain,
        task.tech_stack,
        render_list(&task.constraints),
        schema
    ))
}

#[async_trait]
impl ModelAdapter for CodeGenerator {
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
            TaskInput::Code(task) => task,
            other => return Err(unexpected(self.kind(), &other)),
        };
        let text = self.core.complete(self.core.request(SYSTEM, render(&task)?), cancel).await?;
        let files = parse_files(&text);
        if files.is_empty() {
            return Err(AdapterError::Parse {
                kind: self.kind(),
                reason: "no files in output".into(),
            });
        }
        Ok(TaskOutput::Code(files))
    }

    async fn cleanup(&mut self) -> Result<(), AdapterError> {
        self.core.cleanup().await
    }
}
