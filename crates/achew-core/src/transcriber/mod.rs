//! Pluggable ASR backend over head-trimmed clips (§4.6).
//!
//! Mirrors the predecessor crate's `TranscriptionBackend` /
//! `ProviderRegistry` shape: a narrow trait keyed by a stable `name()`,
//! registered behind a string-id registry that tie-breaks on declared
//! priority when the caller's preferred backend is missing or unavailable.

mod null;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{instrument, warn};

pub use null::NullTranscriber;

use crate::error::PipelineError;

/// Sentinel substituted for a single clip that failed to transcribe,
/// per §4.6/§7's per-item failure taxonomy: one bad file never aborts
/// the batch.
pub const TRANSCRIPTION_ERROR_SENTINEL: &str = "[Transcription Error]";

/// A pluggable ASR backend.
///
/// Implementations own whatever process or network call actually performs
/// recognition; this crate only prescribes the shape of the contract.
#[async_trait]
pub trait TranscriberBackend: Send + Sync {
    /// Stable identifier used for registry lookup (e.g. `"whisper-local"`).
    fn name(&self) -> &'static str;

    /// Tie-break order when a preferred backend is absent or unavailable.
    /// Higher runs first.
    fn priority(&self) -> i32 {
        0
    }

    /// Whether this backend is currently usable (model loaded, API key
    /// present, binary on `PATH`, ...). Registries skip unavailable
    /// backends when resolving a preference.
    fn is_available(&self) -> bool {
        true
    }

    /// Transcribe each clip independently, returning one string per input
    /// path in the same order. A clip that fails to transcribe is reported
    /// as [`TRANSCRIPTION_ERROR_SENTINEL`] rather than failing the batch.
    async fn transcribe(&self, clip_paths: &[&Path]) -> Vec<String>;
}

/// Registry of all available ASR backends, keyed by [`TranscriberBackend::name`].
pub struct TranscriberRegistry {
    backends: HashMap<&'static str, Arc<dyn TranscriberBackend>>,
}

impl TranscriberRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    pub fn register(&mut self, backend: Arc<dyn TranscriberBackend>) {
        self.backends.insert(backend.name(), backend);
    }

    /// Get a backend by its exact name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn TranscriberBackend>> {
        self.backends.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&'static str> {
        self.backends.keys().copied().collect()
    }

    /// Resolve the caller's persisted preference, falling back to the
    /// highest-priority available backend when `preferred` names nothing
    /// registered or something currently unavailable.
    #[instrument(skip(self))]
    pub fn get_preferred(&self, preferred: &str) -> Result<Arc<dyn TranscriberBackend>, PipelineError> {
        if let Some(backend) = self.backends.get(preferred) {
            if backend.is_available() {
                return Ok(backend.clone());
            }
            warn!(backend = preferred, "preferred transcriber unavailable, falling back");
        }

        self.backends
            .values()
            .filter(|b| b.is_available())
            .max_by_key(|b| b.priority())
            .cloned()
            .ok_or_else(|| PipelineError::input("no transcriber backend is available"))
    }
}

impl Default for TranscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives a chosen backend over segment clips and mints initial chapter
/// titles, or empty titles when ASR is configured to be skipped (§4.6:
/// `configure_asr({transcribe | skip})`).
pub struct Transcriber;

impl Transcriber {
    /// Run `backend` over every clip, one call per path so a single
    /// failure never drops the rest of the batch, returning
    /// `transcription.strip()`'d strings one-to-one with `clip_paths`.
    #[instrument(skip(backend, clip_paths))]
    pub async fn transcribe_all(backend: &dyn TranscriberBackend, clip_paths: &[&Path]) -> Vec<String> {
        if clip_paths.is_empty() {
            return Vec::new();
        }
        backend
            .transcribe(clip_paths)
            .await
            .into_iter()
            .map(|s| s.trim().to_string())
            .collect()
    }

    /// Titles to use when ASR is skipped entirely: empty strings, one per
    /// clip, per §4.6.
    pub fn skip_titles(clip_count: usize) -> Vec<String> {
        vec![String::new(); clip_count]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct FlakyBackend;

    #[async_trait]
    impl TranscriberBackend for FlakyBackend {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn transcribe(&self, clip_paths: &[&Path]) -> Vec<String> {
            clip_paths
                .iter()
                .map(|p| {
                    if p.to_string_lossy().contains("bad") {
                        TRANSCRIPTION_ERROR_SENTINEL.to_string()
                    } else {
                        format!("  hello from {}  ", p.display())
                    }
                })
                .collect()
        }
    }

    #[tokio::test]
    async fn a_single_failing_clip_does_not_abort_the_batch() {
        let backend = FlakyBackend;
        let paths = [PathBuf::from("good_0.wav"), PathBuf::from("bad_1.wav"), PathBuf::from("good_2.wav")];
        let refs: Vec<&Path> = paths.iter().map(|p| p.as_path()).collect();
        let out = Transcriber::transcribe_all(&backend, &refs).await;
        assert_eq!(out.len(), 3);
        assert_eq!(out[1], TRANSCRIPTION_ERROR_SENTINEL);
        assert!(out[0].starts_with("hello from"));
        assert_eq!(out[0], out[0].trim()); // whitespace stripped
    }

    #[test]
    fn skip_titles_are_all_empty() {
        assert_eq!(Transcriber::skip_titles(3), vec!["", "", ""]);
    }

    #[test]
    fn registry_falls_back_to_highest_priority_available_backend() {
        struct Backend(&'static str, i32, bool);
        #[async_trait]
        impl TranscriberBackend for Backend {
            fn name(&self) -> &'static str {
                self.0
            }
            fn priority(&self) -> i32 {
                self.1
            }
            fn is_available(&self) -> bool {
                self.2
            }
            async fn transcribe(&self, _clip_paths: &[&Path]) -> Vec<String> {
                Vec::new()
            }
        }

        let mut registry = TranscriberRegistry::new();
        registry.register(Arc::new(Backend("low", 1, true)));
        registry.register(Arc::new(Backend("high-but-down", 10, false)));
        registry.register(Arc::new(Backend("mid", 5, true)));

        let resolved = registry.get_preferred("unregistered-preference").unwrap();
        assert_eq!(resolved.name(), "mid");
    }

    #[test]
    fn registry_honors_an_available_preference_over_priority() {
        struct Backend(&'static str, i32);
        #[async_trait]
        impl TranscriberBackend for Backend {
            fn name(&self) -> &'static str {
                self.0
            }
            fn priority(&self) -> i32 {
                self.1
            }
            async fn transcribe(&self, _clip_paths: &[&Path]) -> Vec<String> {
                Vec::new()
            }
        }

        let mut registry = TranscriberRegistry::new();
        registry.register(Arc::new(Backend("low", 1)));
        registry.register(Arc::new(Backend("high", 10)));

        let resolved = registry.get_preferred("low").unwrap();
        assert_eq!(resolved.name(), "low");
    }
}
