//! The pipeline state machine gluing every other module together (§4.9, §5).
//!
//! `PipelineState` generalizes this codebase's `RecordingState` (a plain
//! `Copy` enum with no transition logic of its own) into a full state
//! machine: each named operation in §4.9 gets an explicit method that
//! either returns the next state or a [`StateError::InvalidTransition`],
//! so illegal transitions are a typed error rather than a silent no-op.

pub mod events;
pub mod supervisor;

use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// A step in the pipeline's fixed sequence (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Idle,
    Validating,
    Downloading,
    FilePrep,
    SelectCueSource,
    AudioAnalysis,
    VadPrep,
    VadAnalysis,
    CueSetSelection,
    AudioExtraction,
    ConfigureAsr,
    Trimming,
    AsrProcessing,
    ChapterEditing,
    Reviewing,
    Completed,
}

/// The five "settled" states a cancelled run can rewind to, in increasing
/// order (§4.9's restart-at-step policy: `IDLE < SELECT_CUE_SOURCE <
/// CUE_SET_SELECTION < CONFIGURE_ASR < CHAPTER_EDITING`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RestartLevel {
    Idle,
    SelectCueSource,
    CueSetSelection,
    ConfigureAsr,
    ChapterEditing,
}

impl RestartLevel {
    pub fn state(&self) -> PipelineState {
        match self {
            RestartLevel::Idle => PipelineState::Idle,
            RestartLevel::SelectCueSource => PipelineState::SelectCueSource,
            RestartLevel::CueSetSelection => PipelineState::CueSetSelection,
            RestartLevel::ConfigureAsr => PipelineState::ConfigureAsr,
            RestartLevel::ChapterEditing => PipelineState::ChapterEditing,
        }
    }
}

/// Which cue-source choice drove `SELECT_CUE_SOURCE`'s fan-out (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueSourceChoice {
    Existing,
    SmartDetect,
    SmartDetectVad,
}

/// Whether `CONFIGURE_ASR` should run the transcriber or skip it (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsrChoice {
    Transcribe,
    Skip,
}

impl PipelineState {
    /// Whether this state is one of the five rewindable levels.
    pub fn restart_level(&self) -> Option<RestartLevel> {
        match self {
            PipelineState::Idle => Some(RestartLevel::Idle),
            PipelineState::SelectCueSource => Some(RestartLevel::SelectCueSource),
            PipelineState::CueSetSelection => Some(RestartLevel::CueSetSelection),
            PipelineState::ConfigureAsr => Some(RestartLevel::ConfigureAsr),
            PipelineState::ChapterEditing => Some(RestartLevel::ChapterEditing),
            _ => None,
        }
    }

    /// `create_pipeline(item_id)`: only legal from `IDLE`.
    pub fn on_create_pipeline(self) -> Result<PipelineState, StateError> {
        self.require(PipelineState::Idle, "create_pipeline")?;
        Ok(PipelineState::Validating)
    }

    /// Successful validation moves straight into the download/prep chain.
    pub fn on_validate_ok(self) -> Result<PipelineState, StateError> {
        self.require(PipelineState::Validating, "validate_ok")?;
        Ok(PipelineState::Downloading)
    }

    pub fn on_validate_fail(self) -> Result<PipelineState, StateError> {
        self.require(PipelineState::Validating, "validate_fail")?;
        Ok(PipelineState::Idle)
    }

    pub fn on_download_ok(self) -> Result<PipelineState, StateError> {
        self.require(PipelineState::Downloading, "download_ok")?;
        Ok(PipelineState::FilePrep)
    }

    pub fn on_file_prep_ok(self) -> Result<PipelineState, StateError> {
        self.require(PipelineState::FilePrep, "file_prep_ok")?;
        Ok(PipelineState::SelectCueSource)
    }

    /// `choose(source)`: fans out to one of three successor chains.
    pub fn on_select_cue_source(self, choice: CueSourceChoice) -> Result<PipelineState, StateError> {
        self.require(PipelineState::SelectCueSource, "select_cue_source")?;
        Ok(match choice {
            CueSourceChoice::Existing => PipelineState::AudioExtraction,
            CueSourceChoice::SmartDetect => PipelineState::AudioAnalysis,
            CueSourceChoice::SmartDetectVad => PipelineState::VadPrep,
        })
    }

    pub fn on_audio_analysis_ok(self) -> Result<PipelineState, StateError> {
        self.require(PipelineState::AudioAnalysis, "audio_analysis_ok")?;
        Ok(PipelineState::CueSetSelection)
    }

    pub fn on_vad_prep_ok(self) -> Result<PipelineState, StateError> {
        self.require(PipelineState::VadPrep, "vad_prep_ok")?;
        Ok(PipelineState::VadAnalysis)
    }

    pub fn on_vad_analysis_ok(self) -> Result<PipelineState, StateError> {
        self.require(PipelineState::VadAnalysis, "vad_analysis_ok")?;
        Ok(PipelineState::CueSetSelection)
    }

    /// `pick(cardinality, include_unaligned[])`.
    pub fn on_select_cue_set(self) -> Result<PipelineState, StateError> {
        self.require(PipelineState::CueSetSelection, "select_cue_set")?;
        Ok(PipelineState::AudioExtraction)
    }

    pub fn on_audio_extraction_ok(self) -> Result<PipelineState, StateError> {
        self.require(PipelineState::AudioExtraction, "audio_extraction_ok")?;
        Ok(PipelineState::ConfigureAsr)
    }

    /// `configure_asr({transcribe | skip})`.
    pub fn on_configure_asr(self, choice: AsrChoice) -> Result<PipelineState, StateError> {
        self.require(PipelineState::ConfigureAsr, "configure_asr")?;
        Ok(match choice {
            AsrChoice::Transcribe => PipelineState::Trimming,
            AsrChoice::Skip => PipelineState::ChapterEditing,
        })
    }

    pub fn on_trimming_ok(self) -> Result<PipelineState, StateError> {
        self.require(PipelineState::Trimming, "trimming_ok")?;
        Ok(PipelineState::AsrProcessing)
    }

    pub fn on_asr_processing_ok(self) -> Result<PipelineState, StateError> {
        self.require(PipelineState::AsrProcessing, "asr_processing_ok")?;
        Ok(PipelineState::ChapterEditing)
    }

    pub fn on_review(self) -> Result<PipelineState, StateError> {
        self.require(PipelineState::ChapterEditing, "review")?;
        Ok(PipelineState::Reviewing)
    }

    pub fn on_submit(self) -> Result<PipelineState, StateError> {
        self.require(PipelineState::Reviewing, "submit")?;
        Ok(PipelineState::Completed)
    }

    /// Whether a cancel arriving in this state deletes the pipeline outright
    /// (only true during validate/download, per §4.9) rather than
    /// restarting at a prior settled level.
    pub fn cancel_deletes_pipeline(&self) -> bool {
        matches!(self, PipelineState::Validating | PipelineState::Downloading | PipelineState::FilePrep)
    }

    fn require(self, expected: PipelineState, operation: &'static str) -> Result<(), StateError> {
        if self == expected {
            Ok(())
        } else {
            Err(StateError::InvalidTransition { operation, state: self })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transcribe_reaches_completed() {
        let s = PipelineState::Idle;
        let s = s.on_create_pipeline().unwrap();
        let s = s.on_validate_ok().unwrap();
        let s = s.on_download_ok().unwrap();
        let s = s.on_file_prep_ok().unwrap();
        assert_eq!(s, PipelineState::SelectCueSource);
        let s = s.on_select_cue_source(CueSourceChoice::SmartDetectVad).unwrap();
        assert_eq!(s, PipelineState::VadPrep);
        let s = s.on_vad_prep_ok().unwrap();
        let s = s.on_vad_analysis_ok().unwrap();
        assert_eq!(s, PipelineState::CueSetSelection);
        let s = s.on_select_cue_set().unwrap();
        let s = s.on_audio_extraction_ok().unwrap();
        assert_eq!(s, PipelineState::ConfigureAsr);
        let s = s.on_configure_asr(AsrChoice::Transcribe).unwrap();
        assert_eq!(s, PipelineState::Trimming);
        let s = s.on_trimming_ok().unwrap();
        let s = s.on_asr_processing_ok().unwrap();
        assert_eq!(s, PipelineState::ChapterEditing);
        let s = s.on_review().unwrap();
        let s = s.on_submit().unwrap();
        assert_eq!(s, PipelineState::Completed);
    }

    #[test]
    fn skipping_asr_goes_straight_to_chapter_editing() {
        let s = PipelineState::ConfigureAsr.on_configure_asr(AsrChoice::Skip).unwrap();
        assert_eq!(s, PipelineState::ChapterEditing);
    }

    #[test]
    fn illegal_transition_is_a_typed_error() {
        let err = PipelineState::Idle.on_select_cue_set().unwrap_err();
        assert!(matches!(err, StateError::InvalidTransition { operation: "select_cue_set", state: PipelineState::Idle }));
    }

    #[test]
    fn validate_failure_returns_to_idle() {
        let s = PipelineState::Validating.on_validate_fail().unwrap();
        assert_eq!(s, PipelineState::Idle);
    }

    #[test]
    fn restart_levels_are_ordered_as_specified() {
        assert!(RestartLevel::Idle < RestartLevel::SelectCueSource);
        assert!(RestartLevel::SelectCueSource < RestartLevel::CueSetSelection);
        assert!(RestartLevel::CueSetSelection < RestartLevel::ConfigureAsr);
        assert!(RestartLevel::ConfigureAsr < RestartLevel::ChapterEditing);
    }

    #[test]
    fn cancel_deletes_pipeline_only_during_validate_download_prep() {
        assert!(PipelineState::Validating.cancel_deletes_pipeline());
        assert!(PipelineState::Downloading.cancel_deletes_pipeline());
        assert!(PipelineState::FilePrep.cancel_deletes_pipeline());
        assert!(!PipelineState::ChapterEditing.cancel_deletes_pipeline());
        assert!(!PipelineState::AudioAnalysis.cancel_deletes_pipeline());
    }
}
