//! The single per-process pipeline supervisor (§4.9, §5, §6).
//!
//! Owns the state machine, the temp-file tree, the process registry, and
//! the chapter store; serializes every step transition the way this
//! codebase's `transcribe.rs` serializes one in-flight transcription at a
//! time behind a mutable flag rather than allowing overlapping runs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::aligner::{ChapterAligner, DetectedCue};
use crate::book::{Book, SimpleChapter};
use crate::chapter::Chapter;
use crate::chapter_store::{AddOptions, ChapterStore, SelectionStats};
use crate::cluster::CueClusterer;
use crate::config::PipelineConfig;
use crate::cue::{CueSet, CueSource, CueSourceKind, SilenceSpan};
use crate::error::{PipelineError, StateError};
use crate::export;
use crate::extractor::SegmentExtractor;
use crate::library_server::LibraryServerClient;
use crate::media_io::MediaIO;
use crate::pipeline::events::{EventSink, PipelineEvent};
use crate::pipeline::{AsrChoice, CueSourceChoice, PipelineState, RestartLevel};
use crate::process::ProcessRegistry;
use crate::scanner::vad::WorkerCommandFactory;
use crate::scanner::{CancelFlag, SilenceScanner, VadScanner};
use crate::transcriber::{Transcriber, TranscriberRegistry};

/// Everything the supervisor needs injected rather than constructing
/// itself, so tests can swap in fakes the way [`crate::media_io`]'s own
/// tests swap `FakeMediaIO` in for `FfmpegMediaIO`.
pub struct PipelineDeps {
    pub media_io: Arc<dyn MediaIO>,
    pub library_server: Arc<dyn LibraryServerClient>,
    pub vad_worker_factory: Arc<dyn WorkerCommandFactory>,
    pub transcribers: Arc<TranscriberRegistry>,
}

/// The full set of working state accumulated across a run, beyond the
/// bare `PipelineState` tag.
#[derive(Default)]
struct RunData {
    book: Option<Book>,
    source_audio_path: Option<PathBuf>,
    actual_duration: f64,
    cue_sources: Vec<CueSource>,
    detected_silences: Vec<SilenceSpan>,
    cue_set: Option<CueSet>,
    chosen_cues: Vec<f64>,
    segment_paths: Vec<PathBuf>,
    store: Option<ChapterStore>,
}

pub struct PipelineSupervisor {
    state: PipelineState,
    config: PipelineConfig,
    registry: Arc<ProcessRegistry>,
    cancel: CancelFlag,
    sink: Arc<dyn EventSink>,
    deps: PipelineDeps,
    temp_dir: tempfile::TempDir,
    cores: usize,
    item_id: Option<String>,
    run: RunData,
}

impl PipelineSupervisor {
    pub fn new(config: PipelineConfig, deps: PipelineDeps, sink: Arc<dyn EventSink>) -> Result<Self, PipelineError> {
        let temp_dir = tempfile::tempdir()?;
        Ok(Self {
            state: PipelineState::Idle,
            config,
            registry: ProcessRegistry::new(),
            cancel: CancelFlag::new(),
            sink,
            deps,
            temp_dir,
            cores: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            item_id: None,
            run: RunData::default(),
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn dir_for(&self, name: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        path
    }

    fn transition(&mut self, new: PipelineState) {
        let old = self.state;
        self.state = new;
        self.sink.emit(PipelineEvent::step_change(old, new));
    }

    fn emit_progress(&self, percent: f64, message: impl Into<String>) {
        self.sink.emit(PipelineEvent::progress(self.state, percent, message));
    }

    fn emit_chapters(&self) {
        if let Some(store) = &self.run.store {
            self.sink.emit(PipelineEvent::ChapterUpdate {
                chapters: store.chapters().to_vec(),
            });
            self.sink.emit(PipelineEvent::HistoryUpdate {
                can_undo: store.history().can_undo(),
                can_redo: store.history().can_redo(),
            });
        }
    }

    fn store_mut(&mut self) -> Result<&mut ChapterStore, PipelineError> {
        self.run.store.as_mut().ok_or(PipelineError::State(StateError::NoPipeline))
    }

    /// `create_pipeline(item_id)`: fetches metadata, downloads and
    /// concatenates every constituent file, then settles at
    /// `SELECT_CUE_SOURCE` with the non-scanner cue sources populated.
    #[instrument(skip(self))]
    pub async fn create_pipeline(&mut self, item_id: &str) -> Result<(), PipelineError> {
        if self.state != PipelineState::Idle {
            return Err(PipelineError::State(StateError::AlreadyExists(item_id.to_string())));
        }
        self.item_id = Some(item_id.to_string());
        self.state = self
            .state
            .on_create_pipeline()
            .map_err(PipelineError::State)?;
        self.sink.emit(PipelineEvent::step_change(PipelineState::Idle, self.state));

        let book = match self.deps.library_server.fetch_book(item_id).await {
            Ok(book) => book,
            Err(err) => {
                self.transition(self.state.on_validate_fail().map_err(PipelineError::State)?);
                return Err(err);
            }
        };
        self.transition(self.state.on_validate_ok().map_err(PipelineError::State)?);

        let downloads_dir = self.dir_for("downloads");
        tokio::fs::create_dir_all(&downloads_dir).await?;
        let mut file_paths = Vec::with_capacity(book.files.len());
        for (i, file) in book.files.iter().enumerate() {
            let dest = downloads_dir.join(format!("file_{i:03}"));
            let cancel = self.cancel.clone();
            self.deps
                .library_server
                .download_file(
                    item_id,
                    &file.ino,
                    &dest,
                    None,
                    Arc::new(move || cancel.is_cancelled()),
                )
                .await?;
            file_paths.push(dest);
            self.emit_progress(
                100.0 * (i + 1) as f64 / book.files.len().max(1) as f64,
                format!("downloaded {}/{}", i + 1, book.files.len()),
            );
        }
        self.transition(self.state.on_download_ok().map_err(PipelineError::State)?);

        let prep_dir = self.dir_for("prep");
        tokio::fs::create_dir_all(&prep_dir).await?;
        let source_audio_path = self.deps.media_io.concat(&file_paths, &prep_dir).await?;
        let actual_duration = self.deps.media_io.probe_duration(&source_audio_path).await?;

        let mut cue_sources = vec![CueSource {
            id: CueSourceKind::FileStarts,
            short_name: "File starts".to_string(),
            description: "One cue per constituent audio file boundary".to_string(),
            cues: book.file_start_cues(),
        }];
        let embedded = book.embedded_cues();
        if !embedded.is_empty() {
            cue_sources.push(CueSource {
                id: CueSourceKind::Embedded,
                short_name: "Embedded chapters".to_string(),
                description: "Chapters embedded in the source files' container metadata".to_string(),
                cues: embedded,
            });
        }

        self.run.book = Some(book);
        self.run.source_audio_path = Some(source_audio_path);
        self.run.actual_duration = actual_duration;
        self.run.cue_sources = cue_sources;

        self.transition(self.state.on_file_prep_ok().map_err(PipelineError::State)?);
        Ok(())
    }

    pub fn cue_sources(&self) -> &[CueSource] {
        &self.run.cue_sources
    }

    /// `choose(existing_source)`: skips straight to `AUDIO_EXTRACTION` using
    /// that source's cues.
    #[instrument(skip(self))]
    pub async fn select_existing_cue_source(&mut self, source_id: CueSourceKind) -> Result<(), PipelineError> {
        self.state = self
            .state
            .on_select_cue_source(CueSourceChoice::Existing)
            .map_err(PipelineError::State)?;
        self.sink.emit(PipelineEvent::step_change(PipelineState::SelectCueSource, self.state));

        let source = self
            .run
            .cue_sources
            .iter()
            .find(|s| s.id == source_id)
            .ok_or_else(|| PipelineError::input(format!("unknown cue source: {}", source_id.as_str())))?;
        let cues: Vec<f64> = source.cues.iter().map(|c| c.timestamp).collect();
        self.run.chosen_cues = cues;
        self.extract_segments().await
    }

    /// `choose(smart_detect)`: energy-threshold scan over the whole file.
    #[instrument(skip(self))]
    pub async fn run_smart_detect(&mut self) -> Result<(), PipelineError> {
        self.state = self
            .state
            .on_select_cue_source(CueSourceChoice::SmartDetect)
            .map_err(PipelineError::State)?;
        self.sink.emit(PipelineEvent::step_change(PipelineState::SelectCueSource, self.state));

        let path = self
            .run
            .source_audio_path
            .clone()
            .ok_or(PipelineError::State(StateError::NoPipeline))?;
        let samples = self.deps.media_io.decode_pcm_f32(&path, 16_000).await?;
        let scan = SilenceScanner::scan(&samples, 16_000, self.run.actual_duration, &self.config.smart_detect, &self.cancel);
        match scan {
            Some(silences) => {
                self.run.detected_silences = silences;
                self.finish_scan_and_cluster(CueSourceKind::SmartDetect)
            }
            None => Err(PipelineError::Cancelled),
        }
    }

    /// `choose(smart_detect_vad)`: chunked worker-parallel VAD scan.
    #[instrument(skip(self))]
    pub async fn run_smart_detect_vad(&mut self) -> Result<(), PipelineError> {
        self.state = self
            .state
            .on_select_cue_source(CueSourceChoice::SmartDetectVad)
            .map_err(PipelineError::State)?;
        self.sink.emit(PipelineEvent::step_change(PipelineState::SelectCueSource, self.state));
        self.transition(self.state.on_vad_prep_ok().map_err(PipelineError::State)?);

        let path = self
            .run
            .source_audio_path
            .clone()
            .ok_or(PipelineError::State(StateError::NoPipeline))?;
        let vad_dir = self.dir_for("vad_chunks");
        tokio::fs::create_dir_all(&vad_dir).await?;

        let result = VadScanner::scan(
            &path,
            self.run.actual_duration,
            self.cores,
            &self.config.smart_detect,
            &self.config.vad,
            self.deps.media_io.as_ref(),
            self.deps.vad_worker_factory.as_ref(),
            &self.registry,
            &vad_dir,
            &self.cancel,
        )
        .await?;

        match result {
            Some(silences) => {
                self.run.detected_silences = silences;
                self.transition(self.state.on_vad_analysis_ok().map_err(PipelineError::State)?);
                self.cluster_detected_silences(CueSourceKind::SmartDetectVad);
                Ok(())
            }
            None => Err(PipelineError::Cancelled),
        }
    }

    fn finish_scan_and_cluster(&mut self, kind: CueSourceKind) -> Result<(), PipelineError> {
        self.transition(self.state.on_audio_analysis_ok().map_err(PipelineError::State)?);
        self.cluster_detected_silences(kind);
        Ok(())
    }

    fn cluster_detected_silences(&mut self, kind: CueSourceKind) {
        let cue_set = CueClusterer::cluster(&self.run.detected_silences, self.run.actual_duration, &self.config.smart_detect);
        self.run.cue_set = Some(cue_set);
        info!(kind = kind.as_str(), "clustering produced candidate cue sets");
    }

    pub fn cue_set(&self) -> Option<&CueSet> {
        self.run.cue_set.as_ref()
    }

    /// `pick(cardinality, include_unaligned[])`: extracts the chosen
    /// cardinality's cues, optionally appending unaligned extra cues from
    /// other sources, sorted ascending.
    #[instrument(skip(self, include_unaligned))]
    pub async fn select_cue_set(&mut self, cardinality: usize, include_unaligned: Vec<f64>) -> Result<(), PipelineError> {
        self.state = self.state.on_select_cue_set().map_err(PipelineError::State)?;
        self.sink.emit(PipelineEvent::step_change(PipelineState::CueSetSelection, self.state));

        let mut cues = self
            .run
            .cue_set
            .as_ref()
            .and_then(|set| set.get(cardinality))
            .ok_or_else(|| PipelineError::input(format!("no cue set for cardinality {cardinality}")))?
            .to_vec();
        cues.extend(include_unaligned);
        cues.sort_by(|a, b| a.partial_cmp(b).expect("cue timestamps are finite"));
        cues.dedup_by(|a, b| (*a - *b).abs() < self.config.smart_detect.min_clip_length);

        self.run.chosen_cues = cues;
        self.extract_segments().await
    }

    /// Aligns `source_chapters` (from a foreign timeline) onto the
    /// currently chosen cues via [`ChapterAligner`], replacing the chosen
    /// cue list with the aligned timestamps.
    pub fn align_to_source_chapters(&mut self, source_chapters: &[SimpleChapter], source_duration: f64) {
        let detected: Vec<DetectedCue> = self
            .run
            .chosen_cues
            .iter()
            .map(|&time| {
                let silence = self
                    .run
                    .detected_silences
                    .iter()
                    .find(|s| (s.end - time).abs() < 0.5)
                    .map(SilenceSpan::duration)
                    .unwrap_or(0.0);
                DetectedCue { time, silence }
            })
            .collect();

        let aligned = ChapterAligner::align(
            source_chapters,
            &detected,
            source_duration,
            self.run.actual_duration,
            &self.config.aligner,
        );
        self.run.chosen_cues = aligned.iter().map(|c| c.timestamp).collect();
    }

    async fn extract_segments(&mut self) -> Result<(), PipelineError> {
        let source_path = self
            .run
            .source_audio_path
            .clone()
            .ok_or(PipelineError::State(StateError::NoPipeline))?;
        let segments_dir = self.dir_for("segments");
        tokio::fs::create_dir_all(&segments_dir).await?;

        let segment_paths = SegmentExtractor::extract(
            self.deps.media_io.as_ref(),
            &source_path,
            &self.run.chosen_cues,
            self.run.actual_duration,
            &segments_dir,
        )
        .await?;
        let chapters = SegmentExtractor::mint_chapters(&self.run.chosen_cues, &segment_paths);

        self.run.segment_paths = segment_paths;
        self.run.store = Some(ChapterStore::new(chapters, self.run.actual_duration));
        self.transition(self.state.on_audio_extraction_ok().map_err(PipelineError::State)?);
        Ok(())
    }

    /// `configure_asr({transcribe | skip})`.
    #[instrument(skip(self))]
    pub async fn configure_asr(&mut self, choice: AsrChoice, preferred_transcriber: &str) -> Result<(), PipelineError> {
        self.state = self.state.on_configure_asr(choice).map_err(PipelineError::State)?;
        self.sink.emit(PipelineEvent::step_change(PipelineState::ConfigureAsr, self.state));

        match choice {
            AsrChoice::Skip => {
                self.emit_chapters();
                Ok(())
            }
            AsrChoice::Transcribe => {
                let head_dir = self.dir_for("trimmed");
                tokio::fs::create_dir_all(&head_dir).await?;
                let mut clip_paths = Vec::with_capacity(self.run.segment_paths.len());
                for seg in &self.run.segment_paths {
                    let clip = self
                        .deps
                        .media_io
                        .trim_head(seg, true, self.config.smart_detect.segment_length)
                        .await?;
                    clip_paths.push(clip);
                }
                self.transition(self.state.on_trimming_ok().map_err(PipelineError::State)?);

                let backend = self.deps.transcribers.get_preferred(preferred_transcriber)?;
                let refs: Vec<&std::path::Path> = clip_paths.iter().map(|p| p.as_path()).collect();
                let titles = Transcriber::transcribe_all(backend.as_ref(), &refs).await;

                let store = self.store_mut()?;
                for (chapter, title) in store.chapters_mut().iter_mut().zip(titles.into_iter()) {
                    chapter.asr_title = title.clone();
                    chapter.current_title = title;
                }
                self.transition(self.state.on_asr_processing_ok().map_err(PipelineError::State)?);
                self.emit_chapters();
                Ok(())
            }
        }
    }

    // -- ChapterStore-delegating operations --

    pub fn list_chapters(&self) -> Result<&[Chapter], PipelineError> {
        Ok(self.run.store.as_ref().ok_or(PipelineError::State(StateError::NoPipeline))?.chapters())
    }

    pub fn edit_title(&mut self, id: crate::chapter::ChapterId, title: impl Into<String>) -> Result<(), PipelineError> {
        self.store_mut()?.edit_title(id, title)?;
        self.emit_chapters();
        Ok(())
    }

    pub fn toggle_selection(&mut self, id: crate::chapter::ChapterId, selected: bool) -> Result<(), PipelineError> {
        self.store_mut()?.toggle_selection(id, selected)?;
        self.emit_chapters();
        Ok(())
    }

    pub fn delete(&mut self, id: crate::chapter::ChapterId) -> Result<(), PipelineError> {
        self.store_mut()?.delete(id)?;
        self.emit_chapters();
        Ok(())
    }

    pub fn add(&mut self, timestamp: f64, title: impl Into<String>) -> Result<crate::chapter::ChapterId, PipelineError> {
        let asr_buffer = self.config.smart_detect.asr_buffer;
        let id = self.store_mut()?.add_chapter(timestamp, title, asr_buffer)?;
        self.emit_chapters();
        Ok(id)
    }

    pub fn add_options(&self, anchor_id: crate::chapter::ChapterId) -> Result<AddOptions, PipelineError> {
        let store = self.run.store.as_ref().ok_or(PipelineError::State(StateError::NoPipeline))?;
        let other_source_cues: Vec<f64> = self
            .run
            .cue_sources
            .iter()
            .flat_map(|s| s.cues.iter().map(|c| c.timestamp))
            .collect();
        Ok(store.add_options(
            anchor_id,
            self.config.smart_detect.asr_buffer,
            &self.run.detected_silences,
            &other_source_cues,
        )?)
    }

    pub fn undo(&mut self) -> Result<(), PipelineError> {
        self.store_mut()?.undo()?;
        self.emit_chapters();
        Ok(())
    }

    pub fn redo(&mut self) -> Result<(), PipelineError> {
        self.store_mut()?.redo()?;
        self.emit_chapters();
        Ok(())
    }

    pub fn select_all(&mut self) -> Result<(), PipelineError> {
        self.store_mut()?.select_all();
        self.emit_chapters();
        Ok(())
    }

    pub fn deselect_all(&mut self) -> Result<(), PipelineError> {
        self.store_mut()?.deselect_all();
        self.emit_chapters();
        Ok(())
    }

    pub fn selection_stats(&self) -> Result<SelectionStats, PipelineError> {
        Ok(self.run.store.as_ref().ok_or(PipelineError::State(StateError::NoPipeline))?.selection_stats())
    }

    pub fn export_csv(&self) -> Result<String, PipelineError> {
        export::export_csv(self.list_chapters()?)
    }

    pub fn export_json(&self, export_timestamp: impl Into<String>) -> Result<String, PipelineError> {
        export::export_json(self.list_chapters()?, export_timestamp)
    }

    pub fn export_cue(&self) -> Result<String, PipelineError> {
        Ok(export::export_cue(self.list_chapters()?))
    }

    /// `review` → `REVIEWING`.
    pub fn review(&mut self) -> Result<(), PipelineError> {
        self.transition(self.state.on_review().map_err(PipelineError::State)?);
        Ok(())
    }

    /// `submit()`: uploads every selected, non-deleted chapter.
    #[instrument(skip(self))]
    pub async fn submit(&mut self) -> Result<(), PipelineError> {
        let item_id = self.item_id.clone().ok_or(PipelineError::State(StateError::NoPipeline))?;
        let store = self.run.store.as_ref().ok_or(PipelineError::State(StateError::NoPipeline))?;
        let selected: Vec<Chapter> = store.chapters().iter().filter(|c| c.is_effectively_selected()).cloned().collect();
        self.deps.library_server.submit_chapters(&item_id, &selected).await?;
        self.transition(self.state.on_submit().map_err(PipelineError::State)?);
        Ok(())
    }

    /// Tear everything down and rewind to `level`, discarding all derived
    /// data strictly above it (§4.9/§5).
    #[instrument(skip(self))]
    pub async fn restart_at_step(&mut self, level: RestartLevel) -> Result<(), PipelineError> {
        self.cancel.cancel();
        self.registry.terminate_all(Duration::from_secs(2)).await;

        if level < RestartLevel::ChapterEditing {
            self.run.store = None;
            self.run.segment_paths.clear();
            let _ = tokio::fs::remove_dir_all(self.dir_for("trimmed")).await;
            let _ = tokio::fs::remove_dir_all(self.dir_for("segments")).await;
        }
        if level < RestartLevel::CueSetSelection {
            self.run.cue_set = None;
            self.run.chosen_cues.clear();
        }
        if level < RestartLevel::SelectCueSource {
            self.run.detected_silences.clear();
            self.run.cue_sources.clear();
            self.run.book = None;
            self.run.source_audio_path = None;
            let _ = tokio::fs::remove_dir_all(self.dir_for("vad_chunks")).await;
            let _ = tokio::fs::remove_dir_all(self.dir_for("downloads")).await;
            let _ = tokio::fs::remove_dir_all(self.dir_for("prep")).await;
        }

        self.cancel = CancelFlag::new();
        self.transition(level.state());
        Ok(())
    }

    /// `cancel`: either deletes the pipeline (during validate/download) or
    /// restarts at the nearest settled prior level (§4.9).
    #[instrument(skip(self))]
    pub async fn cancel(&mut self) -> Result<(), PipelineError> {
        if self.state.cancel_deletes_pipeline() {
            self.cancel.cancel();
            self.registry.terminate_all(Duration::from_secs(2)).await;
            let _ = tokio::fs::remove_dir_all(self.temp_dir.path()).await;
            self.run = RunData::default();
            self.item_id = None;
            self.cancel = CancelFlag::new();
            self.transition(PipelineState::Idle);
            return Ok(());
        }

        let level = self
            .state
            .restart_level()
            .or_else(|| self.nearest_prior_settled_level())
            .unwrap_or(RestartLevel::Idle);
        self.restart_at_step(level).await?;
        warn!(state = ?self.state, "pipeline cancelled, restarted at nearest settled level");
        Ok(())
    }

    /// For states between two settled levels (e.g. `AUDIO_ANALYSIS`, which
    /// sits between `SELECT_CUE_SOURCE` and `CUE_SET_SELECTION`), walk back
    /// to whichever settled level this state's progress has not yet
    /// surpassed.
    fn nearest_prior_settled_level(&self) -> Option<RestartLevel> {
        use PipelineState::*;
        match self.state {
            AudioAnalysis | VadPrep | VadAnalysis => Some(RestartLevel::SelectCueSource),
            AudioExtraction => Some(RestartLevel::CueSetSelection),
            Trimming | AsrProcessing => Some(RestartLevel::ConfigureAsr),
            Reviewing => Some(RestartLevel::ChapterEditing),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library_server::{CancelPredicate, DownloadProgress};
    use std::path::Path;
    use std::sync::Mutex;

    struct FakeLibraryServer {
        book: Book,
    }

    #[async_trait::async_trait]
    impl LibraryServerClient for FakeLibraryServer {
        async fn fetch_book(&self, _item_id: &str) -> Result<Book, PipelineError> {
            Ok(self.book.clone())
        }

        async fn download_file(
            &self,
            _item_id: &str,
            _file_ino: &str,
            dest: &Path,
            _progress: Option<DownloadProgress>,
            _cancel: CancelPredicate,
        ) -> Result<(), PipelineError> {
            tokio::fs::write(dest, b"fake audio bytes").await?;
            Ok(())
        }

        async fn submit_chapters(&self, _item_id: &str, _chapters: &[Chapter]) -> Result<(), PipelineError> {
            Ok(())
        }
    }

    struct FakeMediaIO;

    #[async_trait::async_trait]
    impl MediaIO for FakeMediaIO {
        async fn concat(&self, _paths: &[PathBuf], out_dir: &Path) -> Result<PathBuf, crate::error::MediaError> {
            Ok(out_dir.join("concat.m4a"))
        }
        async fn extract_segments(
            &self,
            _path: &Path,
            cut_points: &[f64],
            _total_duration: f64,
            out_dir: &Path,
        ) -> Result<Vec<PathBuf>, crate::error::MediaError> {
            Ok((0..cut_points.len()).map(|i| out_dir.join(format!("segment_{i:05}.m4a"))).collect())
        }
        async fn trim_head(&self, seg_path: &Path, _trim: bool, _max_seconds: f64) -> Result<PathBuf, crate::error::MediaError> {
            Ok(seg_path.with_extension("head.m4a"))
        }
        async fn split_uniform(&self, _path: &Path, _chunk_seconds: f64, _out_dir: &Path) -> Result<Vec<PathBuf>, crate::error::MediaError> {
            Ok(Vec::new())
        }
        async fn probe_duration(&self, _path: &Path) -> Result<f64, crate::error::MediaError> {
            Ok(120.0)
        }
        async fn decode_pcm_f32(&self, _path: &Path, _sample_rate: u32) -> Result<Vec<f32>, crate::error::MediaError> {
            Ok(vec![0.0; 16_000 * 120])
        }
    }

    struct FakeWorkerFactory;
    impl WorkerCommandFactory for FakeWorkerFactory {
        fn command(&self, _worker_index: usize) -> tokio::process::Command {
            tokio::process::Command::new("true")
        }
    }

    fn deps() -> PipelineDeps {
        let book = Book {
            id: "book-1".to_string(),
            duration: 120.0,
            files: vec![crate::book::AudioFile {
                ino: "ino-1".to_string(),
                mime: "audio/mpeg".to_string(),
                duration: 120.0,
                embedded_chapters: None,
            }],
        };
        PipelineDeps {
            media_io: Arc::new(FakeMediaIO),
            library_server: Arc::new(FakeLibraryServer { book }),
            vad_worker_factory: Arc::new(FakeWorkerFactory),
            transcribers: Arc::new(TranscriberRegistry::new()),
        }
    }

    struct VecSink(Mutex<Vec<PipelineEvent>>);
    impl EventSink for VecSink {
        fn emit(&self, event: PipelineEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[tokio::test]
    async fn create_pipeline_settles_at_select_cue_source_with_file_starts_cue() {
        let mut sup = PipelineSupervisor::new(PipelineConfig::default(), deps(), Arc::new(VecSink(Mutex::new(Vec::new())))).unwrap();
        sup.create_pipeline("item-1").await.unwrap();
        assert_eq!(sup.state(), PipelineState::SelectCueSource);
        assert!(sup.cue_sources().iter().any(|s| s.id == CueSourceKind::FileStarts));
    }

    #[tokio::test]
    async fn choosing_existing_source_reaches_configure_asr_with_minted_chapters() {
        let mut sup = PipelineSupervisor::new(PipelineConfig::default(), deps(), Arc::new(VecSink(Mutex::new(Vec::new())))).unwrap();
        sup.create_pipeline("item-1").await.unwrap();
        sup.select_existing_cue_source(CueSourceKind::FileStarts).await.unwrap();
        assert_eq!(sup.state(), PipelineState::ConfigureAsr);
        assert_eq!(sup.list_chapters().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn skipping_asr_leaves_empty_titles_and_reaches_chapter_editing() {
        let mut sup = PipelineSupervisor::new(PipelineConfig::default(), deps(), Arc::new(VecSink(Mutex::new(Vec::new())))).unwrap();
        sup.create_pipeline("item-1").await.unwrap();
        sup.select_existing_cue_source(CueSourceKind::FileStarts).await.unwrap();
        sup.configure_asr(AsrChoice::Skip, "null").await.unwrap();
        assert_eq!(sup.state(), PipelineState::ChapterEditing);
        assert!(sup.list_chapters().unwrap()[0].current_title.is_empty());
    }

    #[tokio::test]
    async fn cancel_during_chapter_editing_restarts_at_chapter_editing_and_keeps_chapters() {
        let mut sup = PipelineSupervisor::new(PipelineConfig::default(), deps(), Arc::new(VecSink(Mutex::new(Vec::new())))).unwrap();
        sup.create_pipeline("item-1").await.unwrap();
        sup.select_existing_cue_source(CueSourceKind::FileStarts).await.unwrap();
        sup.configure_asr(AsrChoice::Skip, "null").await.unwrap();
        sup.cancel().await.unwrap();
        assert_eq!(sup.state(), PipelineState::ChapterEditing);
        assert_eq!(sup.list_chapters().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancel_during_download_deletes_the_pipeline() {
        let mut sup = PipelineSupervisor::new(PipelineConfig::default(), deps(), Arc::new(VecSink(Mutex::new(Vec::new())))).unwrap();
        // Drive state to Downloading directly to exercise the delete-on-cancel path
        // without racing the real download.
        sup.item_id = Some("item-1".to_string());
        sup.state = PipelineState::Downloading;
        sup.cancel().await.unwrap();
        assert_eq!(sup.state(), PipelineState::Idle);
        assert!(sup.item_id.is_none());
    }
}
