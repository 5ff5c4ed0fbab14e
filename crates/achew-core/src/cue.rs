//! Cue sources, silence spans, and candidate cue sets.

use crate::book::SimpleChapter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifies where a [`CueSource`]'s cues came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CueSourceKind {
    /// Supplied directly by the library server for this item.
    ServerSupplied,
    /// Extracted from a constituent audio file's own container metadata.
    Embedded,
    /// Fetched from an external metadata provider keyed by e.g. ASIN.
    Audnexus,
    /// One cue per constituent file boundary.
    FileStarts,
    /// Produced by [`crate::scanner::silence::SilenceScanner`] + clustering.
    SmartDetect,
    /// Produced by [`crate::scanner::vad::VadScanner`] + clustering.
    SmartDetectVad,
}

impl CueSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServerSupplied => "server-supplied",
            Self::Embedded => "embedded",
            Self::Audnexus => "audnexus",
            Self::FileStarts => "file-starts",
            Self::SmartDetect => "smart-detect",
            Self::SmartDetectVad => "smart-detect-vad",
        }
    }

    /// Whether this source is produced by in-crate scanning rather than
    /// supplied externally.
    pub fn is_scanner_produced(&self) -> bool {
        matches!(self, Self::SmartDetect | Self::SmartDetectVad)
    }
}

/// A labelled provider of a list of cues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CueSource {
    pub id: CueSourceKind,
    pub short_name: String,
    pub description: String,
    pub cues: Vec<SimpleChapter>,
}

/// A maximal `[start, end]` interval of low/no audio energy, with
/// `end - start >= min_silence_duration`. Spans are non-overlapping and
/// sorted by `start`; produced fresh on every scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SilenceSpan {
    pub start: f64,
    pub end: f64,
}

impl SilenceSpan {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A family of candidate cue-timestamp lists, keyed by cardinality
/// (`cardinality -> sorted timestamps`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CueSet(pub BTreeMap<usize, Vec<f64>>);

impl CueSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, cardinality: usize, timestamps: Vec<f64>) {
        self.0.insert(cardinality, timestamps);
    }

    pub fn cardinalities(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.keys().copied()
    }

    pub fn get(&self, cardinality: usize) -> Option<&[f64]> {
        self.0.get(&cardinality).map(|v| v.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_span_duration() {
        let s = SilenceSpan {
            start: 10.0,
            end: 13.5,
        };
        assert_eq!(s.duration(), 3.5);
    }

    #[test]
    fn cue_source_kind_round_trips_str() {
        assert_eq!(CueSourceKind::SmartDetectVad.as_str(), "smart-detect-vad");
        assert!(CueSourceKind::SmartDetectVad.is_scanner_produced());
        assert!(!CueSourceKind::Embedded.is_scanner_produced());
    }
}
