//! The editable chapter list with bidirectional history (§4.7).

use crate::chapter::{Chapter, ChapterId};
use crate::chapter_operation::ChapterOperation;
use crate::cue::SilenceSpan;
use crate::error::StoreError;

/// Undo/redo history over a sequence of applied operations. Appending after
/// an undo truncates the redo tail.
#[derive(Debug, Default)]
pub struct History {
    ops: Vec<ChapterOperation>,
    /// Index of the most recently applied operation; `-1` means nothing has
    /// been applied yet.
    index: isize,
}

impl History {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            index: -1,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.index >= 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.ops.len() as isize
    }

    fn push(&mut self, op: ChapterOperation) {
        self.ops.truncate((self.index + 1).max(0) as usize);
        self.ops.push(op);
        self.index += 1;
    }

    pub fn index(&self) -> isize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The operations currently "live" (applied), in apply order.
    pub fn applied_ops(&self) -> &[ChapterOperation] {
        if self.index < 0 {
            &[]
        } else {
            &self.ops[..=self.index as usize]
        }
    }
}

/// Selection counts, excluding deleted chapters from both totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionStats {
    pub total: usize,
    pub selected: usize,
    pub unselected: usize,
}

/// The window and surrounding context for a manual chapter insertion
/// between `anchor` and the next non-deleted chapter.
#[derive(Debug, Clone, PartialEq)]
pub struct AddOptions {
    pub min_timestamp: f64,
    pub max_timestamp: f64,
    pub silence_cues: Vec<f64>,
    pub other_source_cues: Vec<f64>,
    pub deleted_chapters_in_window: Vec<Chapter>,
}

/// The live, editable chapter list plus its history.
pub struct ChapterStore {
    chapters: Vec<Chapter>,
    history: History,
    book_duration: f64,
    initial_chapters: Vec<Chapter>,
}

impl ChapterStore {
    /// Construct a store from freshly-minted chapters (already sorted by
    /// timestamp, as produced by [`crate::extractor::SegmentExtractor`]).
    pub fn new(chapters: Vec<Chapter>, book_duration: f64) -> Self {
        Self {
            initial_chapters: chapters.clone(),
            chapters,
            history: History::new(),
            book_duration,
        }
    }

    /// The chapter list exactly as constructed, before any operation.
    pub fn initial_chapters(&self) -> &[Chapter] {
        &self.initial_chapters
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// Direct mutable access for the ASR-titling step (§4.6), which writes
    /// `asr_title`/`current_title` before any undoable edit exists for
    /// these chapters and so bypasses the history mechanism entirely.
    pub fn chapters_mut(&mut self) -> &mut [Chapter] {
        &mut self.chapters
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    fn apply_and_record(&mut self, mut op: ChapterOperation) -> Result<(), StoreError> {
        op.apply(&mut self.chapters)?;
        self.history.push(op);
        Ok(())
    }

    /// Rejects `timestamp` outside `[0, book_duration)` or outside the
    /// `[prev + asr_buffer, next − asr_buffer]` window around the nearest
    /// non-deleted neighbors, matching [`ChapterStore::add_options`]'s window
    /// for the chapter the point would actually land next to.
    pub fn add_chapter(
        &mut self,
        timestamp: f64,
        title: impl Into<String>,
        asr_buffer: f64,
    ) -> Result<ChapterId, StoreError> {
        if timestamp < 0.0 || timestamp >= self.book_duration {
            return Err(StoreError::TimestampOutsideWindow {
                timestamp,
                min: 0.0,
                max: self.book_duration,
            });
        }
        if self
            .chapters
            .iter()
            .any(|c| !c.deleted && (c.timestamp - timestamp).abs() < f64::EPSILON)
        {
            return Err(StoreError::InvariantViolation(format!(
                "a non-deleted chapter already exists at timestamp {timestamp}"
            )));
        }

        let prev = self
            .chapters
            .iter()
            .filter(|c| !c.deleted && c.timestamp < timestamp)
            .map(|c| c.timestamp)
            .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.max(t))));
        let next = self
            .chapters
            .iter()
            .filter(|c| !c.deleted && c.timestamp > timestamp)
            .map(|c| c.timestamp)
            .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.min(t))));

        let min = prev.map(|t| t + asr_buffer).unwrap_or(0.0);
        let max = next.map(|t| t - asr_buffer).unwrap_or(self.book_duration);
        if timestamp < min || timestamp > max {
            return Err(StoreError::TimestampOutsideWindow { timestamp, min, max });
        }

        let chapter = Chapter::new(timestamp, title);
        let id = chapter.id;
        self.apply_and_record(ChapterOperation::AddChapter { chapter })?;
        Ok(id)
    }

    pub fn delete(&mut self, id: ChapterId) -> Result<(), StoreError> {
        self.apply_and_record(ChapterOperation::DeleteChapter { chapter_id: id })
    }

    pub fn restore(&mut self, id: ChapterId, new_title: Option<String>) -> Result<(), StoreError> {
        self.apply_and_record(ChapterOperation::RestoreChapter {
            chapter_id: id,
            old_title: String::new(),
            new_title,
        })
    }

    pub fn edit_title(&mut self, id: ChapterId, new_title: impl Into<String>) -> Result<(), StoreError> {
        self.apply_and_record(ChapterOperation::EditTitle {
            chapter_id: id,
            old_title: String::new(),
            new_title: new_title.into(),
        })
    }

    pub fn ai_cleanup(&mut self, id: ChapterId, new_title: impl Into<String>, selected: bool) -> Result<(), StoreError> {
        self.apply_and_record(ChapterOperation::AiCleanup {
            chapter_id: id,
            old_title: String::new(),
            old_selected: false,
            new_title: new_title.into(),
            selected,
        })
    }

    pub fn batch(&mut self, ops: Vec<ChapterOperation>) -> Result<(), StoreError> {
        self.apply_and_record(ChapterOperation::Batch(ops))
    }

    pub fn toggle_selection(&mut self, id: ChapterId, selected: bool) -> Result<(), StoreError> {
        let chapter = self
            .chapters
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::UnknownChapter(format!("{id:?}")))?;
        chapter.selected = selected;
        Ok(())
    }

    pub fn select_all(&mut self) {
        for chapter in self.chapters.iter_mut().filter(|c| !c.deleted) {
            chapter.selected = true;
        }
    }

    pub fn deselect_all(&mut self) {
        for chapter in self.chapters.iter_mut().filter(|c| !c.deleted) {
            chapter.selected = false;
        }
    }

    pub fn undo(&mut self) -> Result<(), StoreError> {
        if !self.history.can_undo() {
            return Err(StoreError::NothingToUndo);
        }
        let index = self.history.index as usize;
        self.history.ops[index].undo(&mut self.chapters)?;
        self.history.index -= 1;
        Ok(())
    }

    pub fn redo(&mut self) -> Result<(), StoreError> {
        if !self.history.can_redo() {
            return Err(StoreError::NothingToRedo);
        }
        let next_index = (self.history.index + 1) as usize;
        self.history.ops[next_index].apply(&mut self.chapters)?;
        self.history.index += 1;
        Ok(())
    }

    /// Computed on demand from the live list; excludes `deleted` from both
    /// the total and selected counts.
    pub fn selection_stats(&self) -> SelectionStats {
        let live: Vec<&Chapter> = self.chapters.iter().filter(|c| !c.deleted).collect();
        let selected = live.iter().filter(|c| c.selected).count();
        SelectionStats {
            total: live.len(),
            selected,
            unselected: live.len() - selected,
        }
    }

    /// The window permitted for a manual insertion after `anchor_id`:
    /// `[anchor + asr_buffer, next_non_deleted - asr_buffer]`.
    pub fn add_options(
        &self,
        anchor_id: ChapterId,
        asr_buffer: f64,
        silences: &[SilenceSpan],
        other_source_cues: &[f64],
    ) -> Result<AddOptions, StoreError> {
        let anchor_index = self
            .chapters
            .iter()
            .position(|c| c.id == anchor_id)
            .ok_or_else(|| StoreError::UnknownChapter(format!("{anchor_id:?}")))?;
        let anchor = &self.chapters[anchor_index];

        let next_timestamp = self.chapters[anchor_index + 1..]
            .iter()
            .find(|c| !c.deleted)
            .map(|c| c.timestamp)
            .unwrap_or(self.book_duration);

        let min_timestamp = anchor.timestamp + asr_buffer;
        let max_timestamp = next_timestamp - asr_buffer;

        let silence_cues = silences
            .iter()
            .map(|s| s.end)
            .filter(|&t| t >= min_timestamp && t <= max_timestamp)
            .collect();
        let other_source_cues = other_source_cues
            .iter()
            .copied()
            .filter(|&t| t >= min_timestamp && t <= max_timestamp)
            .collect();
        let deleted_chapters_in_window = self.chapters[anchor_index + 1..]
            .iter()
            .take_while(|c| c.timestamp <= max_timestamp)
            .filter(|c| c.deleted)
            .cloned()
            .collect();

        Ok(AddOptions {
            min_timestamp,
            max_timestamp,
            silence_cues,
            other_source_cues,
            deleted_chapters_in_window,
        })
    }

    /// Validate the universal invariants from §8; used in tests and as an
    /// assertion hook for callers that want extra paranoia after a batch.
    pub fn validate_invariants(&self) -> Result<(), StoreError> {
        let mut prev_timestamp: Option<f64> = None;
        for chapter in &self.chapters {
            if chapter.timestamp < 0.0 || chapter.timestamp >= self.book_duration {
                return Err(StoreError::InvariantViolation(format!(
                    "chapter {:?} timestamp {} outside [0, {})",
                    chapter.id, chapter.timestamp, self.book_duration
                )));
            }
            if let Some(prev) = prev_timestamp {
                if chapter.timestamp < prev {
                    return Err(StoreError::InvariantViolation(
                        "chapter list is not ordered by timestamp".to_string(),
                    ));
                }
            }
            prev_timestamp = Some(chapter.timestamp);
            if chapter.selected && chapter.deleted {
                return Err(StoreError::InvariantViolation(format!(
                    "chapter {:?} is selected while deleted",
                    chapter.id
                )));
            }
        }

        for (i, a) in self.chapters.iter().enumerate() {
            if a.deleted {
                continue;
            }
            for b in &self.chapters[i + 1..] {
                if !b.deleted && (a.timestamp - b.timestamp).abs() < f64::EPSILON {
                    return Err(StoreError::InvariantViolation(format!(
                        "chapters {:?} and {:?} share timestamp {}",
                        a.id, b.id, a.timestamp
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ChapterStore {
        ChapterStore::new(
            vec![Chapter::new(0.0, "Intro"), Chapter::new(100.0, "Chapter 1")],
            200.0,
        )
    }

    #[test]
    fn edit_title_then_undo_restores_state() {
        let mut store = store();
        let id = store.chapters()[0].id;
        let before = store.chapters().to_vec();
        store.edit_title(id, "New title").unwrap();
        assert_eq!(store.chapters()[0].current_title, "New title");
        store.undo().unwrap();
        assert_eq!(store.chapters(), before.as_slice());
    }

    #[test]
    fn undo_then_redo_is_a_no_op_on_chapter_state() {
        let mut store = store();
        let id = store.chapters()[0].id;
        store.edit_title(id, "New title").unwrap();
        let after_edit = store.chapters().to_vec();
        let index_after_edit = store.history().index();

        store.undo().unwrap();
        store.redo().unwrap();

        assert_eq!(store.chapters(), after_edit.as_slice());
        assert_eq!(store.history().index(), index_after_edit);
    }

    #[test]
    fn appending_after_undo_truncates_redo_tail() {
        let mut store = store();
        let id = store.chapters()[0].id;
        store.edit_title(id, "First edit").unwrap();
        store.undo().unwrap();
        assert!(store.history().can_redo());

        store.edit_title(id, "Second edit").unwrap();
        assert!(!store.history().can_redo());
        assert_eq!(store.chapters()[0].current_title, "Second edit");
    }

    #[test]
    fn selection_stats_exclude_deleted_chapters() {
        let mut store = store();
        let id = store.chapters()[1].id;
        store.delete(id).unwrap();
        let stats = store.selection_stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.selected, 1);
        assert_eq!(stats.unselected, 0);
    }

    #[test]
    fn add_chapter_outside_window_is_rejected() {
        let mut store = store();
        let err = store.add_chapter(500.0, "Out of range", 0.25).unwrap_err();
        assert!(matches!(err, StoreError::TimestampOutsideWindow { .. }));
    }

    #[test]
    fn add_chapter_too_close_to_a_neighbor_is_rejected() {
        let mut store = ChapterStore::new(
            vec![Chapter::new(100.0, "ch 1"), Chapter::new(200.0, "ch 2")],
            300.0,
        );
        let err = store.add_chapter(100.1, "Too close", 0.25).unwrap_err();
        assert!(matches!(err, StoreError::TimestampOutsideWindow { .. }));
    }

    #[test]
    fn add_chapter_at_edge_of_window_succeeds() {
        let mut store = ChapterStore::new(
            vec![Chapter::new(100.0, "ch 1"), Chapter::new(200.0, "ch 2")],
            300.0,
        );
        store.add_chapter(100.25, "Right at the edge", 0.25).unwrap();
        assert_eq!(store.chapters().len(), 3);
    }

    #[test]
    fn ai_cleanup_then_undo_restores_title_and_selection() {
        let mut store = store();
        let id = store.chapters()[1].id;
        store.deselect_all();
        store.toggle_selection(id, false).unwrap();
        let before_title = store.chapters()[1].current_title.clone();
        let before_selected = store.chapters()[1].selected;

        store.ai_cleanup(id, "ch 2", true).unwrap();
        assert_eq!(store.chapters()[1].current_title, "ch 2");
        assert!(store.chapters()[1].selected);

        store.undo().unwrap();
        assert_eq!(store.chapters()[1].current_title, before_title);
        assert_eq!(store.chapters()[1].selected, before_selected);
    }

    #[test]
    fn add_options_reports_window_between_anchor_and_next() {
        let store = store();
        let anchor = store.chapters()[0].id;
        let options = store.add_options(anchor, 0.25, &[], &[]).unwrap();
        assert_eq!(options.min_timestamp, 0.25);
        assert_eq!(options.max_timestamp, 99.75);
    }

    #[test]
    fn invariants_hold_for_a_freshly_built_store() {
        let store = store();
        assert!(store.validate_invariants().is_ok());
    }

    #[test]
    fn replaying_history_reproduces_current_state() {
        let mut store = store();
        let id = store.chapters()[0].id;
        store.edit_title(id, "Replayed").unwrap();
        store.delete(store.chapters()[1].id).unwrap();
        store.undo().unwrap(); // exercise a partially-rewound history too
        store.redo().unwrap();

        let mut replayed = store.initial_chapters().to_vec();
        for op in store.history().applied_ops() {
            let mut op = op.clone();
            op.apply(&mut replayed).unwrap();
        }

        assert_eq!(replayed.as_slice(), store.chapters());
    }
}
