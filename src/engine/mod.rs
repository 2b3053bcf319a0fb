//! Text inference backends for forge-core.
//!
//! Provides the `TextBackend` trait that model-backed adapters delegate to,
//! plus local GGUF and hosted-endpoint implementations.

pub mod config;
pub mod error;
#[cfg(feature = "gguf")]
pub mod gguf;
pub mod local;
pub mod remote;
pub mod weights;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use config::{CompletionRequest, GgufConfig};
pub use error::BackendError;
pub use local::LocalBackend;
pub use remote::{RemoteBackend, RemoteConfig};
pub use weights::{WeightsLocator, WeightsPath};

/// Text-in/text-out inference engine behind a model-backed adapter.
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Identifier used in logs and slot status.
    fn name(&self) -> &str;

    /// Perform expensive setup (weights, clients).
    async fn load(&mut self) -> Result<(), BackendError>;

    /// Run one completion. Implementations must observe `cancel`.
    async fn complete(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, BackendError>;

    /// Release held resources. Safe to call more than once.
    async fn unload(&mut self);
}
