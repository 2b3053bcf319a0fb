//! Hosted inference text backend.
//!
//! Talks to an OpenAI-compatible chat completion endpoint. Hugging Face
//! style `generated_text` responses are accepted as well.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::{BackendError, CompletionRequest, TextBackend};

/// Connection settings for the hosted endpoint.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL, e.g. `https://api-inference.huggingface.co/v1`.
    pub base_url: String,
    /// Bearer token, if the endpoint requires one.
    pub api_token: Option<String>,
    /// Model name sent with every request.
    pub model: String,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: None,
            model: model.into(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Full completion URL derived from the base URL.
    pub fn completions_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{base}/chat/completions")
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

/// Text backend over a hosted inference endpoint.
pub struct RemoteBackend {
    name: String,
    config: RemoteConfig,
    client: Option<reqwest::Client>,
}

impl RemoteBackend {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            name: format!("remote:{}", config.model),
            config,
            client: None,
        }
    }

    fn build_body<'a>(&'a self, request: &'a CompletionRequest) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: &request.prompt });
        ChatRequest {
            model: &self.config.model,
            messages,
            max_tokens: request.max_output_tokens,
            temperature: request.temperature,
            stream: false,
        }
    }

    async fn send(
        &self,
        client: &reqwest::Client,
        request: &CompletionRequest,
    ) -> Result<String, BackendError> {
        let mut builder = client
            .post(self.config.completions_url())
            .json(&self.build_body(request));
        if let Some(token) = &self.config.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(backend = %self.name, status = status.as_u16(), "inference endpoint error");
            return Err(BackendError::Status { status: status.as_u16(), body });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        extract_text(&value)
            .ok_or_else(|| BackendError::InvalidResponse("no generated text in response".into()))
    }
}

/// Pull generated text out of a chat-completion or text-generation response.
pub(crate) fn extract_text(value: &serde_json::Value) -> Option<String> {
    if let Some(content) = value
        .pointer("/choices/0/message/content")
        .or_else(|| value.pointer("/choices/0/text"))
        .and_then(|v| v.as_str())
    {
        return Some(content.to_string());
    }
    value
        .pointer("/0/generated_text")
        .or_else(|| value.get("generated_text"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[async_trait]
impl TextBackend for RemoteBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&mut self) -> Result<(), BackendError> {
        let url = self.config.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(BackendError::InvalidConfig(format!(
                "inference url must be http(s): '{url}'"
            )));
        }
        if self.config.model.trim().is_empty() {
            return Err(BackendError::InvalidConfig("inference model name is empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .build()
            .map_err(|e| BackendError::Unavailable(format!("http client: {e}")))?;
        tracing::info!(backend = %self.name, url = %self.config.completions_url(), "remote inference configured");
        self.client = Some(client);
        Ok(())
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, BackendError> {
        request.validate()?;
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| BackendError::NotLoaded(self.name.clone()))?;

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(BackendError::Cancelled),
            result = self.send(client, request) => result,
        }
    }

    async fn unload(&mut self) {
        // Dropping the client closes pooled connections.
        self.client = None;
    }
}
