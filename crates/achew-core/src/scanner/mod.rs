//! Silence detection: a single-stream energy scanner (§4.2) and a
//! worker-parallel VAD scanner for large files (§4.3).

pub mod silence;
pub mod vad;

pub use silence::SilenceScanner;
pub use vad::VadScanner;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag, the same `Arc<AtomicBool>` shape this codebase
/// uses to cancel in-flight chunked work (`transcribe.rs`'s `error_flag`).
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
