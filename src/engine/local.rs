//! Local GGUF text backend.
//!
//! Weights are loaded through llama-cpp-2 when the `gguf` feature is
//! enabled. Without it, `load()` reports the backend as unavailable so
//! strategy selection can fall back to remote inference.

#[cfg(feature = "gguf")]
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::weights::WeightsLocator;
use super::{BackendError, CompletionRequest, GgufConfig, TextBackend};

/// Text backend over local GGUF weights.
pub struct LocalBackend {
    name: String,
    file_name: String,
    locator: WeightsLocator,
    #[allow(dead_code)]
    config: GgufConfig,
    #[cfg(feature = "gguf")]
    session: Option<Arc<super::gguf::LlamaSession>>,
}

impl LocalBackend {
    pub fn new(file_name: &str, locator: WeightsLocator, config: GgufConfig) -> Self {
        Self {
            name: format!("local:{file_name}"),
            file_name: file_name.to_string(),
            locator,
            config,
            #[cfg(feature = "gguf")]
            session: None,
        }
    }
}

/// Join system and user text into a single completion prompt.
pub(crate) fn render_prompt(request: &CompletionRequest) -> String {
    match &request.system {
        Some(system) => format!("{system}\n\n{}\n", request.prompt),
        None => format!("{}\n", request.prompt),
    }
}

#[async_trait]
impl TextBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&mut self) -> Result<(), BackendError> {
        let weights = self.locator.resolve(&self.file_name)?;
        tracing::info!(
            backend = %self.name,
            path = %weights.as_path().display(),
            size_bytes = weights.size_bytes(),
            "loading local weights"
        );

        #[cfg(feature = "gguf")]
        {
            let path = weights.as_path().to_path_buf();
            let config = self.config.clone();
            let session = tokio::task::spawn_blocking(move || {
                super::gguf::LlamaSession::load(&path, &config)
            })
            .await
            .map_err(|e| BackendError::Unavailable(format!("load task: {e}")))??;
            tracing::debug!(backend = %self.name, model_bytes = session.model_size(), "weights resident");
            self.session = Some(Arc::new(session));
            Ok(())
        }
        #[cfg(not(feature = "gguf"))]
        {
            Err(BackendError::Unavailable(format!(
                "{} requires the gguf feature",
                self.name
            )))
        }
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, BackendError> {
        request.validate()?;

        #[cfg(feature = "gguf")]
        {
            let session = self
                .session
                .clone()
                .ok_or_else(|| BackendError::NotLoaded(self.name.clone()))?;
            let prompt = render_prompt(request);
            let request = request.clone();
            let token = cancel.clone();
            tokio::task::spawn_blocking(move || {
                let is_cancelled = move || token.is_cancelled();
                session.generate(&prompt, &request, &is_cancelled)
            })
            .await
            .map_err(|e| BackendError::Generation(format!("generation task: {e}")))?
        }
        #[cfg(not(feature = "gguf"))]
        {
            let _ = (cancel, render_prompt(request));
            Err(BackendError::NotLoaded(self.name.clone()))
        }
    }

    async fn unload(&mut self) {
        #[cfg(feature = "gguf")]
        {
            // Dropping the last Arc frees the llama context and weights.
            self.session = None;
        }
    }
}
