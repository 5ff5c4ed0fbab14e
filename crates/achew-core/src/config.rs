//! Configuration objects for smart detection, alignment, and pipeline tuning.
//!
//! Mirrors the predecessor crate's `settings`/`configuration` split: plain
//! `serde`-derived records with explicit `Default` impls carrying the spec's
//! numeric defaults, instead of scattering magic numbers through call sites.

use serde::{Deserialize, Serialize};

/// User-tunable knobs for the silence-detection → clustering path.
///
/// Ranges (enforced by [`SmartDetectConfig::validate`]):
/// - `segment_length` ∈ [3, 30]
/// - `min_clip_length` ∈ [0.5, 5]
/// - `asr_buffer` ∈ [0, 1]
/// - `min_silence_duration` ∈ [1, 5]
/// - cross-constraint: `segment_length >= min_clip_length`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmartDetectConfig {
    pub segment_length: f64,
    pub min_clip_length: f64,
    pub asr_buffer: f64,
    pub min_silence_duration: f64,
}

impl Default for SmartDetectConfig {
    fn default() -> Self {
        Self {
            segment_length: 8.0,
            min_clip_length: 1.0,
            asr_buffer: 0.25,
            min_silence_duration: 2.0,
        }
    }
}

impl SmartDetectConfig {
    /// Validate the configuration against the spec's declared ranges.
    pub fn validate(&self) -> Result<(), String> {
        if !(3.0..=30.0).contains(&self.segment_length) {
            return Err(format!(
                "segment_length must be in [3, 30], got {}",
                self.segment_length
            ));
        }
        if !(0.5..=5.0).contains(&self.min_clip_length) {
            return Err(format!(
                "min_clip_length must be in [0.5, 5], got {}",
                self.min_clip_length
            ));
        }
        if !(0.0..=1.0).contains(&self.asr_buffer) {
            return Err(format!(
                "asr_buffer must be in [0, 1], got {}",
                self.asr_buffer
            ));
        }
        if !(1.0..=5.0).contains(&self.min_silence_duration) {
            return Err(format!(
                "min_silence_duration must be in [1, 5], got {}",
                self.min_silence_duration
            ));
        }
        if self.segment_length < self.min_clip_length {
            return Err(format!(
                "segment_length ({}) must be >= min_clip_length ({})",
                self.segment_length, self.min_clip_length
            ));
        }
        Ok(())
    }
}

/// Tunables for the VAD worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VadConfig {
    /// Length of each chunk handed to a worker, in seconds.
    pub chunk_seconds: f64,
    /// Fraction of available cores to use as worker count.
    pub worker_fraction: f64,
    /// Gaps separated by less than this are coalesced during merge.
    pub merge_gap_seconds: f64,
    /// Minimum interval between progress reports from a single worker.
    pub progress_throttle_ms: u64,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            chunk_seconds: 600.0,
            worker_fraction: 2.0 / 3.0,
            merge_gap_seconds: 1.0,
            progress_throttle_ms: 100,
        }
    }
}

impl VadConfig {
    /// `W = max(1, floor(worker_fraction * cores))`.
    pub fn worker_count(&self, cores: usize) -> usize {
        let scaled = (cores as f64 * self.worker_fraction).floor() as usize;
        scaled.max(1)
    }
}

/// Tunables for [`crate::aligner::ChapterAligner`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignerConfig {
    /// Radius (seconds) within which a source timestamp may anchor to a cue.
    pub anchor_search_radius: f64,
    /// Maximum allowed drift for a non-guess match.
    pub max_drift: f64,
    /// Scale sanity clamp, e.g. `(0.90, 1.10)`.
    pub scale_bounds: (f64, f64),
    /// Offset sanity clamp magnitude in seconds.
    pub max_offset: f64,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            anchor_search_radius: 120.0,
            max_drift: 120.0,
            scale_bounds: (0.90, 1.10),
            max_offset: 300.0,
        }
    }
}

/// Aggregate runtime configuration for one pipeline run.
///
/// Mirrors `Settings`'s hierarchical, per-concern composition in the
/// predecessor crate, minus any on-disk persistence: the persistent
/// configuration store is out of scope for this crate (§1), but callers
/// can freely serialize this type into whatever store they own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    pub smart_detect: SmartDetectConfig,
    pub vad: VadConfig,
    pub aligner: AlignerConfig,
    /// Reachability probe timeout for the (out-of-scope) library server, seconds.
    pub library_server_timeout_secs: u64,
}

/// Options controlling LLM-driven cosmetic title clean-up.
///
/// The LLM provider itself is an external collaborator (§6); this crate
/// only defines the options record consumed by the `AICleanup` chapter
/// operation (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AiCleanupOptions {
    pub infer_opening_credits: bool,
    pub infer_end_credits: bool,
    pub deselect_non_chapters: bool,
    pub keep_deselected_titles: bool,
    pub use_preferred_titles: bool,
    pub preferred_titles_source: Option<String>,
    pub additional_instructions: Option<String>,
    pub provider_id: String,
    pub model_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_smart_detect_config_is_valid() {
        assert!(SmartDetectConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_segment_length_below_min_clip_length() {
        let cfg = SmartDetectConfig {
            segment_length: 1.0,
            min_clip_length: 2.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn worker_count_has_floor_of_one() {
        let vad = VadConfig::default();
        assert_eq!(vad.worker_count(0), 1);
        assert_eq!(vad.worker_count(1), 1);
        assert_eq!(vad.worker_count(3), 2); // floor(2/3 * 3) = 2
        assert_eq!(vad.worker_count(12), 8); // floor(2/3 * 12) = 8
    }
}
