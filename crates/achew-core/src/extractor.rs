//! Turns a chosen cue list into numbered segment files (§4.6).

use std::path::{Path, PathBuf};

use crate::chapter::Chapter;
use crate::error::MediaError;
use crate::media_io::MediaIO;

pub struct SegmentExtractor;

impl SegmentExtractor {
    /// Cut `source` at `cues` (sorted, ascending, starting at or near 0)
    /// into `cues.len()` adjacent segments `[cue_i, cue_{i+1})`, the last
    /// running to `book_duration`.
    pub async fn extract(
        media_io: &dyn MediaIO,
        source: &Path,
        cues: &[f64],
        book_duration: f64,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, MediaError> {
        media_io.extract_segments(source, cues, book_duration, out_dir).await
    }

    /// Mint one chapter per cue/segment pair, in cue order, with empty
    /// titles (ASR fills them in separately via [`crate::transcriber`]).
    pub fn mint_chapters(cues: &[f64], segment_paths: &[PathBuf]) -> Vec<Chapter> {
        cues.iter()
            .zip(segment_paths.iter())
            .map(|(&timestamp, path)| {
                let mut chapter = Chapter::new(timestamp, "");
                chapter.audio_segment_path = Some(path.clone());
                chapter
            })
            .collect()
    }
}
