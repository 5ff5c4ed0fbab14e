// Domain modules (organized by concern, leaves first)
pub mod book;
pub mod cue;
pub mod chapter;
pub mod chapter_operation;
pub mod chapter_store;
pub mod config;
pub mod kmeans;
pub mod cluster;
pub mod aligner;
pub mod media_io;
pub mod scanner;
pub mod extractor;
pub mod transcriber;
pub mod export;
pub mod pipeline;

// External-collaborator interfaces (§6): this crate only defines the
// contract, not the concrete client.
pub mod library_server;
pub mod llm;

// Utility modules (cross-cutting concerns)
pub mod error;
pub mod process;

// Re-export the most commonly reached-for types at the crate root, the
// same curation this codebase's own `lib.rs` applies to its provider and
// configuration modules.
pub use book::{AudioFile, Book, SimpleChapter};
pub use chapter::{Chapter, ChapterId, RealignmentData};
pub use chapter_store::{AddOptions, ChapterStore, History, SelectionStats};
pub use config::{AiCleanupOptions, AlignerConfig, PipelineConfig, SmartDetectConfig, VadConfig};
pub use cue::{CueSet, CueSource, CueSourceKind, SilenceSpan};
pub use error::{MediaError, PipelineError, Result, ScanError, StateError, StoreError};
pub use pipeline::events::{EventSink, PipelineEvent, RecordingSink};
pub use pipeline::supervisor::{PipelineDeps, PipelineSupervisor};
pub use pipeline::{AsrChoice, CueSourceChoice, PipelineState, RestartLevel};
pub use process::{ManagedChild, ProcessRegistry};
pub use transcriber::{TranscriberBackend, TranscriberRegistry, TRANSCRIPTION_ERROR_SENTINEL};
