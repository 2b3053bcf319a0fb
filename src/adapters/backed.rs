//! Shared plumbing for adapters that delegate to a `TextBackend`.

use tokio_util::sync::CancellationToken;

use crate::engine::{CompletionRequest, TextBackend};

use super::{AdapterError, LoadGuard, ModelKind};

/// A text backend plus the load-once lifecycle for one adapter instance.
pub(crate) struct BackedCore {
    kind: ModelKind,
    backend: Box<dyn TextBackend>,
    guard: LoadGuard,
}

impl BackedCore {
    pub(crate) fn new(kind: ModelKind, backend: Box<dyn TextBackend>) -> Self {
        Self { kind, backend, guard: LoadGuard::new(kind) }
    }

    pub(crate) fn kind(&self) -> ModelKind {
        self.kind
    }

    pub(crate) async fn load(&mut self) -> Result<(), AdapterError> {
        self.guard.begin()?;
        self.backend.load().await?;
        self.guard.finish();
        tracing::info!(kind = %self.kind, backend = %self.backend.name(), "adapter loaded");
        Ok(())
    }

    /// Build a request with this kind's default limits.
    pub(crate) fn request(&self, system: &str, prompt: String) -> CompletionRequest {
        CompletionRequest::new(prompt)
            .with_system(system)
            .with_limits(self.kind.default_max_tokens(), self.kind.default_temperature())
    }

    pub(crate) async fn complete(
        &self,
        request: CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, AdapterError> {
        self.guard.ensure_loaded()?;
        let text = self.backend.complete(&request, cancel).await?;
        tracing::debug!(kind = %self.kind, chars = text.len(), "backend completion");
        Ok(text)
    }

    pub(crate) async fn cleanup(&mut self) -> Result<(), AdapterError> {
        if self.guard.release() {
            self.backend.unload().await;
            tracing::info!(kind = %self.kind, backend = %self.backend.name(), "adapter released");
        }
        Ok(())
    }
}

/// Render files for inclusion in a prompt, truncated to `budget` chars.
pub(crate) fn render_files(files: &crate::artifacts::FileSet, budget: usize) -> String {
    let mut out = String::new();
    for (path, content) in files {
        if out.len() >= budget {
            out.push_str("\n[remaining files omitted]\n");
            break;
        }
        let remaining = budget - out.len();
        let body: String = content.chars().take(remaining).collect();
        out.push_str(&format!("### File: {path}\n```\n{body}\n```\n"));
    }
    out
}

pub(crate) fn render_list(items: &[String]) -> String {
    if items.is_empty() {
        return "- none".to_string();
    }
    items.iter().map(|c| format!("- {c}")).collect::<Vec<_>>().join("\n")
}
