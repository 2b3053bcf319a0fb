//! Completion request types for text backends.
//!
//! All fields have safe defaults. Requests are validated before dispatch.

use serde::{Deserialize, Serialize};

use super::error::BackendError;

/// One text completion call against a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Optional system instruction (sent as a separate message for chat endpoints).
    pub system: Option<String>,
    /// User prompt text.
    pub prompt: String,
    /// Maximum tokens to generate.
    pub max_output_tokens: u32,
    /// Sampling temperature (0.0 = deterministic).
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_output_tokens: 1024,
            temperature: 0.2,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_limits(mut self, max_output_tokens: u32, temperature: f32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self.temperature = temperature;
        self
    }

    /// Validate sampling fields. Returns error on invalid values.
    pub fn validate(&self) -> Result<(), BackendError> {
        if self.prompt.trim().is_empty() {
            return Err(BackendError::InvalidConfig("prompt cannot be empty".into()));
        }
        if self.max_output_tokens == 0 {
            return Err(BackendError::InvalidConfig("max_output_tokens must be > 0".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(BackendError::InvalidConfig(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        Ok(())
    }
}

/// Local GGUF backend settings.
#[derive(Debug, Clone)]
pub struct GgufConfig {
    /// Context window size in tokens.
    pub n_ctx: u32,
    /// Inference threads (0 = auto).
    pub n_threads: u32,
    /// Layers offloaded to the GPU (0 = CPU only).
    pub n_gpu_layers: u32,
}

impl Default for GgufConfig {
    fn default() -> Self {
        Self { n_ctx: 4096, n_threads: 0, n_gpu_layers: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_request_is_valid() {
        assert!(CompletionRequest::new("build a todo api").validate().is_ok());
    }

    #[test]
    fn test_empty_prompt_rejected() {
        let req = CompletionRequest::new("   ");
        assert!(matches!(req.validate(), Err(BackendError::InvalidConfig(_))));
    }

    #[test]
    fn test_temperature_bounds() {
        let req = CompletionRequest::new("x").with_limits(16, 2.5);
        assert!(req.validate().is_err());
        let req = CompletionRequest::new("x").with_limits(16, 0.0);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_zero_tokens_rejected() {
        let req = CompletionRequest::new("x").with_limits(0, 0.2);
        assert!(req.validate().is_err());
    }
}
