//! Runs one stage's adapter call off the orchestrating task.
//!
//! The call is spawned onto the runtime and raced against the caller's
//! cancel token and an optional deadline. Whichever fires first wins;
//! a losing adapter task is signalled, aborted and awaited, so its lease
//! on the adapter is dropped before `run_offloaded` returns.

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::adapters::{AdapterError, TaskInput, TaskOutput};
use crate::models::AdapterHandle;

#[derive(Error, Debug)]
pub enum OffloadError {
    #[error("stage cancelled")]
    Cancelled,

    #[error("stage timed out after {0:?}")]
    Timeout(Duration),

    #[error("stage task failed: {0}")]
    Join(String),

    #[error(transparent)]
    Adapter(AdapterError),
}

impl From<AdapterError> for OffloadError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Cancelled => Self::Cancelled,
            other => Self::Adapter(other),
        }
    }
}

/// Execute `handle.generate(input)` on a spawned task.
pub async fn run_offloaded(
    handle: AdapterHandle,
    input: TaskInput,
    cancel: &CancellationToken,
    timeout: Option<Duration>,
) -> Result<TaskOutput, OffloadError> {
    if cancel.is_cancelled() {
        return Err(OffloadError::Cancelled);
    }

    let stage_token = cancel.child_token();
    let task_token = stage_token.clone();
    let mut task = tokio::spawn(async move { handle.generate(input, &task_token).await });

    let deadline = async move {
        match timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };

    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => Err(OffloadError::Cancelled),
        joined = &mut task => {
            return match joined {
                Ok(result) => result.map_err(OffloadError::from),
                Err(err) if err.is_cancelled() => Err(OffloadError::Cancelled),
                Err(err) => Err(OffloadError::Join(err.to_string())),
            };
        }
        () = deadline => Err(OffloadError::Timeout(timeout.unwrap_or_default())),
    };

    stage_token.cancel();
    task.abort();
    // Resolves once the task is dropped, so the lease is gone on return.
    let _ = task.await;
    outcome
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::adapters::{ModelAdapter, ModelKind, SchemaTask};
    use crate::artifacts::ProjectSchema;
    use crate::models::{AdapterTable, ResourceManager};

    struct Sleepy {
        delay: Duration,
    }

    #[async_trait]
    impl ModelAdapter for Sleepy {
        fn kind(&self) -> ModelKind {
            ModelKind::SchemaExtractor
        }

        async fn load(&mut self) -> Result<(), AdapterError> {
            Ok(())
        }

        async fn generate(
            &self,
            _input: TaskInput,
            _cancel: &CancellationToken,
        ) -> Result<TaskOutput, AdapterError> {
            tokio::time::sleep(self.delay).await;
            Ok(TaskOutput::Schema(ProjectSchema::default()))
        }

        async fn cleanup(&mut self) -> Result<(), AdapterError> {
            Ok(())
        }
    }

    async fn handle(delay: Duration) -> (Arc<ResourceManager>, AdapterHandle) {
        let table = AdapterTable::new().with(ModelKind::SchemaExtractor, "sleepy", move || {
            Box::new(Sleepy { delay }) as Box<dyn ModelAdapter>
        });
        let mgr = Arc::new(ResourceManager::with_limit(1, table).unwrap());
        let h = mgr.get(ModelKind::SchemaExtractor).await.unwrap();
        (mgr, h)
    }

    fn input() -> TaskInput {
        TaskInput::Schema(SchemaTask {
            prompt: "blog".into(),
            domain: String::new(),
            tech_stack: "python".into(),
            constraints: vec![],
        })
    }

    #[tokio::test]
    async fn completes_within_deadline() {
        let (_mgr, h) = handle(Duration::from_millis(5)).await;
        let out = run_offloaded(h, input(), &CancellationToken::new(), Some(Duration::from_secs(5))).await;
        assert!(matches!(out, Ok(TaskOutput::Schema(_))));
    }

    #[tokio::test]
    async fn deadline_wins_over_slow_adapter() {
        let (mgr, h) = handle(Duration::from_secs(30)).await;
        let out = run_offloaded(h, input(), &CancellationToken::new(), Some(Duration::from_millis(20))).await;
        assert!(matches!(out, Err(OffloadError::Timeout(_))));

        // The aborted task released its lease before returning.
        let status = mgr.status().await;
        assert_eq!(status.slot(ModelKind::SchemaExtractor).unwrap().leases, 0);
    }

    #[tokio::test]
    async fn cancel_wins_over_slow_adapter() {
        let (_mgr, h) = handle(Duration::from_secs(30)).await;
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let out = run_offloaded(h, input(), &token, None).await;
        assert!(matches!(out, Err(OffloadError::Cancelled)));
    }

    #[tokio::test]
    async fn already_cancelled_token_short_circuits() {
        let (_mgr, h) = handle(Duration::from_millis(1)).await;
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(run_offloaded(h, input(), &token, None).await, Err(OffloadError::Cancelled)));
    }
}
