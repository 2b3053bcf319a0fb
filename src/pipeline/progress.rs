//! Ordered progress reporting for pipeline runs.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

/// Per-run pipeline states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Initializing,
    ContextAnalysis,
    SchemaExtraction,
    CodeGeneration,
    CodeReview,
    Documentation,
    Done,
}

impl PipelineStage {
    /// Percentage reported when the stage starts.
    pub fn percent(&self) -> u8 {
        match self {
            Self::Initializing => 0,
            Self::ContextAnalysis => 5,
            Self::SchemaExtraction => 10,
            Self::CodeGeneration => 30,
            Self::CodeReview => 70,
            Self::Documentation => 85,
            Self::Done => 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub stage: PipelineStage,
    pub percent: u8,
    pub message: String,
}

/// Receives progress events. Must not block for long.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn emit(&self, event: ProgressEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

#[async_trait]
impl ProgressSink for NoopProgress {
    async fn emit(&self, _event: ProgressEvent) {}
}

/// Forwards events to a channel. A closed receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx }
    }

    /// A sink plus the receiving end.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ProgressSink for ChannelProgress {
    async fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(event).await;
    }
}

/// Logs each event at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

#[async_trait]
impl ProgressSink for TracingProgress {
    async fn emit(&self, event: ProgressEvent) {
        tracing::info!(stage = ?event.stage, percent = event.percent, "{}", event.message);
    }
}

/// Keeps one run's percentages non-decreasing.
pub(crate) struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    last: Option<u8>,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressSink) -> Self {
        Self { sink, last: None }
    }

    pub(crate) fn started(&self) -> bool {
        self.last.is_some()
    }

    pub(crate) async fn emit(&mut self, stage: PipelineStage, message: impl Into<String>) {
        let percent = self.last.map_or(stage.percent(), |last| last.max(stage.percent()));
        self.last = Some(percent);
        self.sink
            .emit(ProgressEvent { stage, percent, message: message.into() })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tracker_never_decreases() {
        let (sink, mut rx) = ChannelProgress::channel(8);
        let mut tracker = ProgressTracker::new(&sink);
        tracker.emit(PipelineStage::CodeGeneration, "code").await;
        tracker.emit(PipelineStage::SchemaExtraction, "late schema").await;
        tracker.emit(PipelineStage::Done, "done").await;
        drop(sink);

        let percents: Vec<u8> = std::iter::from_fn(|| rx.try_recv().ok()).map(|e| e.percent).collect();
        assert_eq!(percents, [30, 30, 100]);
    }

    #[tokio::test]
    async fn test_closed_channel_is_ignored() {
        let (sink, rx) = ChannelProgress::channel(1);
        drop(rx);
        sink.emit(ProgressEvent { stage: PipelineStage::Done, percent: 100, message: String::new() }).await;
    }
}
