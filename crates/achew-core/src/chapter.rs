//! The editable chapter record (§3 Data model).

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable opaque identifier, minted at creation and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChapterId(u64);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl ChapterId {
    /// Mint a fresh id, unique for the lifetime of the process.
    pub fn new() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for ChapterId {
    fn default() -> Self {
        Self::new()
    }
}

/// Recorded when a chapter's placement came from [`crate::aligner`]'s best
/// guess rather than a directly detected cue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RealignmentData {
    pub original_timestamp: f64,
    pub confidence: f64,
    pub is_guess: bool,
}

/// One editable chapter. `selected` is observable as `selected && !deleted`;
/// `deleted` is soft — deleted chapters remain in the list and can be
/// restored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: ChapterId,
    pub timestamp: f64,
    pub asr_title: String,
    pub current_title: String,
    pub selected: bool,
    pub deleted: bool,
    pub audio_segment_path: Option<std::path::PathBuf>,
    pub realignment: Option<RealignmentData>,
}

impl Chapter {
    pub fn new(timestamp: f64, title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            id: ChapterId::new(),
            timestamp,
            asr_title: title.clone(),
            current_title: title,
            selected: true,
            deleted: false,
            audio_segment_path: None,
            realignment: None,
        }
    }

    /// `selected && !deleted`, per the spec's observable-selection rule.
    pub fn is_effectively_selected(&self) -> bool {
        self.selected && !self.deleted
    }
}
