//! Outbound observations the supervisor pushes to the UI layer (§6).
//!
//! `PipelineEvent` is the wire shape; ordering guarantees (§5) are the
//! supervisor's job to uphold, not this type's — this module only
//! describes what an event looks like.

use serde::{Deserialize, Serialize};

use crate::chapter::Chapter;
use crate::pipeline::PipelineState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Emitted before any `progress_update` for `new` (§5 ordering guarantee).
    StepChange {
        old: PipelineState,
        new: PipelineState,
        extras: Option<serde_json::Value>,
    },
    /// `percent` and `message` are monotonic within one step.
    ProgressUpdate {
        step: PipelineState,
        percent: f64,
        message: String,
        details: Option<serde_json::Value>,
    },
    /// A consistent snapshot of the chapter list taken under the store's
    /// lock.
    ChapterUpdate { chapters: Vec<Chapter> },
    HistoryUpdate { can_undo: bool, can_redo: bool },
    Error { message: String, recoverable: bool },
}

impl PipelineEvent {
    pub fn step_change(old: PipelineState, new: PipelineState) -> Self {
        PipelineEvent::StepChange { old, new, extras: None }
    }

    pub fn progress(step: PipelineState, percent: f64, message: impl Into<String>) -> Self {
        PipelineEvent::ProgressUpdate {
            step,
            percent,
            message: message.into(),
            details: None,
        }
    }

    pub fn error(message: impl Into<String>, recoverable: bool) -> Self {
        PipelineEvent::Error {
            message: message.into(),
            recoverable,
        }
    }
}

/// A channel the supervisor fans events out on. Kept as a trait rather
/// than a concrete `tokio::sync::broadcast::Sender` so tests can assert on
/// a plain `Vec` sink instead of draining a real channel.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Collects every emitted event in order, for tests and for any caller
/// that wants replay rather than a live channel.
#[derive(Default)]
pub struct RecordingSink {
    events: std::sync::Mutex<Vec<PipelineEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: PipelineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_preserves_emission_order() {
        let sink = RecordingSink::new();
        sink.emit(PipelineEvent::step_change(PipelineState::Idle, PipelineState::Validating));
        sink.emit(PipelineEvent::progress(PipelineState::Validating, 50.0, "checking"));
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], PipelineEvent::StepChange { .. }));
        assert!(matches!(events[1], PipelineEvent::ProgressUpdate { .. }));
    }
}
