//! llama-cpp-2 session for GGUF inference.
//!
//! Model loading, context creation, and token generation
//! via the llama-cpp-2 Rust bindings. All calls here block and
//! must run on a blocking thread.
//!
//! llama.cpp allows one initialised backend per process, so every
//! session borrows the shared one from [`shared_backend`].

use std::num::NonZeroU32;
use std::path::Path;
use std::sync::OnceLock;

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::context::LlamaContext;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel};
use llama_cpp_2::sampling::LlamaSampler;
use llama_cpp_2::token::LlamaToken;

use crate::engine::{BackendError, CompletionRequest, GgufConfig};

static BACKEND: OnceLock<Result<LlamaBackend, String>> = OnceLock::new();

/// The process-wide llama.cpp backend, initialised on first use.
pub fn shared_backend() -> Result<&'static LlamaBackend, BackendError> {
    BACKEND
        .get_or_init(|| LlamaBackend::init().map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|e| BackendError::Unavailable(format!("backend init: {e}")))
}

/// Holds one loaded llama-cpp-2 model.
pub struct LlamaSession {
    backend: &'static LlamaBackend,
    model: LlamaModel,
    n_ctx: u32,
    n_threads: i32,
}

// SAFETY: LlamaModel is Send+Sync in llama-cpp-2 and the backend is a
// process-wide static.
unsafe impl Send for LlamaSession {}
unsafe impl Sync for LlamaSession {}

impl LlamaSession {
    /// Load a GGUF model from disk.
    pub fn load(path: &Path, config: &GgufConfig) -> Result<Self, BackendError> {
        let backend = shared_backend()?;
        let model_params = LlamaModelParams::default().with_n_gpu_layers(config.n_gpu_layers);
        let model = LlamaModel::load_from_file(backend, path, &model_params)
            .map_err(|e| BackendError::Unavailable(format!("load: {e}")))?;
        let n_threads = resolve_threads(config.n_threads);
        Ok(Self { backend, model, n_ctx: config.n_ctx, n_threads })
    }

    pub fn model_size(&self) -> usize {
        self.model.size() as usize
    }

    /// Generate text, checking `is_cancelled` once per token.
    pub fn generate(
        &self,
        prompt: &str,
        request: &CompletionRequest,
        is_cancelled: &(dyn Fn() -> bool + Send + Sync),
    ) -> Result<String, BackendError> {
        let tokens = self.tokenize(prompt)?;
        let mut ctx = self.create_context()?;
        let mut batch = LlamaBatch::new(tokens.len().max(1), 1);
        add_seq(&mut batch, &tokens)?;
        decode(&mut ctx, &mut batch)?;
        let mut sampler = build_sampler(request.temperature);
        sampler.accept_many(tokens.iter().copied());
        let mut out = Vec::new();
        let mut pos = tokens.len() as i32;
        for _ in 0..request.max_output_tokens {
            if is_cancelled() {
                return Err(BackendError::Cancelled);
            }
            // -1 samples from the last token that had logits computed
            let tok = sampler.sample(&ctx, -1);
            sampler.accept(tok);
            if self.model.is_eog_token(tok) {
                break;
            }
            out.push(tok);
            batch.clear();
            add_one(&mut batch, tok, pos)?;
            decode(&mut ctx, &mut batch)?;
            pos += 1;
        }
        self.detokenize(&out)
    }

    fn tokenize(&self, text: &str) -> Result<Vec<LlamaToken>, BackendError> {
        self.model
            .str_to_token(text, AddBos::Always)
            .map_err(|e| BackendError::Generation(format!("tokenize: {e}")))
    }

    fn detokenize(&self, tokens: &[LlamaToken]) -> Result<String, BackendError> {
        let mut dec = encoding_rs::UTF_8.new_decoder();
        let mut out = String::new();
        for &t in tokens {
            let piece = self
                .model
                .token_to_piece(t, &mut dec, false, None)
                .map_err(|e| BackendError::Generation(format!("detok: {e}")))?;
            out.push_str(&piece);
        }
        Ok(out)
    }

    fn create_context(&self) -> Result<LlamaContext<'_>, BackendError> {
        let p = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(self.n_ctx))
            .with_n_threads(self.n_threads)
            .with_n_threads_batch(self.n_threads);
        self.model
            .new_context(self.backend, p)
            .map_err(|e| BackendError::Generation(format!("ctx: {e}")))
    }
}

fn add_seq(batch: &mut LlamaBatch, tokens: &[LlamaToken]) -> Result<(), BackendError> {
    // Only the last prompt token needs logits
    let n = tokens.len();
    for (i, &tok) in tokens.iter().enumerate() {
        batch
            .add(tok, i as i32, &[0], i + 1 == n)
            .map_err(|e| BackendError::Generation(format!("batch: {e}")))?;
    }
    Ok(())
}

fn add_one(batch: &mut LlamaBatch, tok: LlamaToken, pos: i32) -> Result<(), BackendError> {
    batch
        .add(tok, pos, &[0], true)
        .map_err(|e| BackendError::Generation(format!("batch: {e}")))
}

fn decode(ctx: &mut LlamaContext<'_>, batch: &mut LlamaBatch) -> Result<(), BackendError> {
    ctx.decode(batch)
        .map_err(|e| BackendError::Generation(format!("decode: {e}")))
}

fn build_sampler(temperature: f32) -> LlamaSampler {
    if temperature <= f32::EPSILON {
        return LlamaSampler::greedy();
    }
    LlamaSampler::chain_simple([
        LlamaSampler::penalties(64, 1.1, 0.0, 0.0),
        LlamaSampler::top_k(40),
        LlamaSampler::top_p(0.9, 1),
        LlamaSampler::temp(temperature),
        LlamaSampler::dist(42),
    ])
}

fn resolve_threads(n: u32) -> i32 {
    if n == 0 {
        // Cap at 16 to avoid diminishing returns on high-core systems
        let optimal = num_cpus::get().clamp(1, 16);
        i32::try_from(optimal).unwrap_or(4)
    } else {
        i32::try_from(n).unwrap_or(4)
    }
}
