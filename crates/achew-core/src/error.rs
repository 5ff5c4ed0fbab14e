//! Unified error types for achew-core
//!
//! This module provides a hierarchical error type system, rooted the same
//! way the rest of this codebase roots domain-specific errors rather than
//! passing a single stringly-typed `anyhow::Error` across module boundaries.
//!
//! # Error Hierarchy
//!
//! ```text
//! PipelineError
//!   ├── Media(MediaError)     - External media-tool invocation failures
//!   ├── Scan(ScanError)       - Silence / VAD scanning failures
//!   ├── Store(StoreError)     - Chapter store / history invariant violations
//!   ├── State(StateError)     - Pipeline state machine misuse
//!   ├── Cluster(String)       - Clustering failures
//!   ├── Align(String)         - Alignment failures
//!   ├── Cancelled             - Step aborted by cancellation, not a failure
//!   └── Io(std::io::Error)    - Generic I/O errors
//! ```
//!
//! Every variant reports whether it is [`PipelineError::recoverable`] so the
//! supervisor can decide between rewinding to a prior settled step and a
//! fatal abort without re-deriving that decision at every call site.

use std::path::PathBuf;

/// Convenience result type using [`PipelineError`].
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised by the external media-tool wrapper ([`crate::media_io`]).
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("media tool exited with status {status}: {stderr}")]
    ToolFailed { status: i32, stderr: String },

    #[error("media tool could not be spawned: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("unsupported audio mime type: {0}")]
    UnsupportedMime(String),

    #[error("expected {expected} output file(s) from media tool, found {found}")]
    OutputCountMismatch { expected: usize, found: usize },
}

/// Errors raised by [`crate::scanner`].
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("silence scan was cancelled")]
    Cancelled,

    #[error("vad worker {index} failed: {message}")]
    WorkerFailed { index: usize, message: String },

    #[error("failed to parse worker output line: {0}")]
    MalformedWorkerLine(String),
}

/// Errors raised by [`crate::chapter_store`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown chapter id: {0}")]
    UnknownChapter(String),

    #[error("add-chapter timestamp {timestamp} is outside the allowed window [{min}, {max}]")]
    TimestampOutsideWindow { timestamp: f64, min: f64, max: f64 },

    #[error("no operation to undo")]
    NothingToUndo,

    #[error("no operation to redo")]
    NothingToRedo,

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

/// Errors raised by [`crate::pipeline`] state-machine misuse.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("operation '{operation}' is not valid in state {state:?}")]
    InvalidTransition {
        operation: &'static str,
        state: crate::pipeline::PipelineState,
    },

    #[error("no pipeline exists")]
    NoPipeline,

    #[error("a pipeline already exists for item {0}")]
    AlreadyExists(String),
}

/// Top-level error type for achew-core operations.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("media error: {0}")]
    Media(#[from] MediaError),

    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("clustering error: {0}")]
    Cluster(String),

    #[error("alignment error: {0}")]
    Align(String),

    #[error("input error: {0}")]
    Input(String),

    #[error("library server unreachable: {0}")]
    LibraryServerUnreachable(String),

    #[error("path error: {0}")]
    Path(PathBuf),

    #[error("step cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Whether this error should surface as a recoverable `error` event
    /// (step restarted at the nearest settled level) vs. a fatal assertion.
    ///
    /// Per the error taxonomy: input errors and transient external errors
    /// are recoverable; invariant violations are not.
    pub fn recoverable(&self) -> bool {
        match self {
            PipelineError::Input(_) => true,
            PipelineError::LibraryServerUnreachable(_) => true,
            PipelineError::Media(_) => true,
            PipelineError::Scan(_) => true,
            PipelineError::Cancelled => true,
            PipelineError::Store(StoreError::InvariantViolation(_)) => false,
            PipelineError::Store(_) => true,
            PipelineError::State(_) => false,
            PipelineError::Cluster(_) => true,
            PipelineError::Align(_) => true,
            PipelineError::Path(_) => true,
            PipelineError::Io(_) => true,
            PipelineError::Other(_) => false,
        }
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }
}

// Allow converting from anyhow::Error at the seams where it is still used
// (ad hoc subprocess/file glue), the same migration bridge the predecessor
// crate used while moving off anyhow wholesale.
impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Other(err.to_string())
    }
}
