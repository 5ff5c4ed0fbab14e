//! Reversible chapter edits (§4.7).
//!
//! Mirrors the predecessor's `ChapterOperation` hierarchy one-for-one:
//! each variant captures whatever state its own `undo` needs at `apply`
//! time, rather than recomputing it from a diff.

use serde::{Deserialize, Serialize};

use crate::chapter::{Chapter, ChapterId};
use crate::error::StoreError;

/// A single reversible edit to a chapter list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChapterOperation {
    AddChapter {
        chapter: Chapter,
    },
    DeleteChapter {
        chapter_id: ChapterId,
    },
    RestoreChapter {
        chapter_id: ChapterId,
        old_title: String,
        new_title: Option<String>,
    },
    EditTitle {
        chapter_id: ChapterId,
        old_title: String,
        new_title: String,
    },
    AiCleanup {
        chapter_id: ChapterId,
        old_title: String,
        old_selected: bool,
        new_title: String,
        selected: bool,
    },
    Batch(Vec<ChapterOperation>),
}

fn find_mut(chapters: &mut [Chapter], id: ChapterId) -> Result<&mut Chapter, StoreError> {
    chapters
        .iter_mut()
        .find(|c| c.id == id)
        .ok_or_else(|| StoreError::UnknownChapter(format!("{id:?}")))
}

impl ChapterOperation {
    pub fn apply(&mut self, chapters: &mut Vec<Chapter>) -> Result<(), StoreError> {
        match self {
            ChapterOperation::AddChapter { chapter } => {
                let insert_index = chapters
                    .iter()
                    .position(|existing| existing.timestamp > chapter.timestamp)
                    .unwrap_or(chapters.len());
                chapters.insert(insert_index, chapter.clone());
                Ok(())
            }
            ChapterOperation::DeleteChapter { chapter_id } => {
                find_mut(chapters, *chapter_id)?.deleted = true;
                Ok(())
            }
            ChapterOperation::RestoreChapter {
                chapter_id,
                old_title,
                new_title,
            } => {
                let chapter = find_mut(chapters, *chapter_id)?;
                chapter.selected = true;
                chapter.deleted = false;
                if let Some(new_title) = new_title {
                    *old_title = chapter.current_title.clone();
                    chapter.current_title = new_title.clone();
                }
                Ok(())
            }
            ChapterOperation::EditTitle {
                chapter_id,
                old_title,
                new_title,
            } => {
                let chapter = find_mut(chapters, *chapter_id)?;
                *old_title = chapter.current_title.clone();
                chapter.current_title = new_title.clone();
                Ok(())
            }
            ChapterOperation::AiCleanup {
                chapter_id,
                old_title,
                old_selected,
                new_title,
                selected,
            } => {
                let chapter = find_mut(chapters, *chapter_id)?;
                *old_title = chapter.current_title.clone();
                *old_selected = chapter.selected;
                chapter.current_title = new_title.clone();
                chapter.selected = *selected;
                Ok(())
            }
            ChapterOperation::Batch(ops) => {
                for op in ops.iter_mut() {
                    op.apply(chapters)?;
                }
                Ok(())
            }
        }
    }

    pub fn undo(&mut self, chapters: &mut Vec<Chapter>) -> Result<(), StoreError> {
        match self {
            ChapterOperation::AddChapter { chapter } => {
                let id = chapter.id;
                let before = chapters.len();
                chapters.retain(|c| c.id != id);
                if chapters.len() == before {
                    return Err(StoreError::UnknownChapter(format!("{id:?}")));
                }
                Ok(())
            }
            ChapterOperation::DeleteChapter { chapter_id } => {
                find_mut(chapters, *chapter_id)?.deleted = false;
                Ok(())
            }
            ChapterOperation::RestoreChapter {
                chapter_id,
                old_title,
                new_title,
            } => {
                let chapter = find_mut(chapters, *chapter_id)?;
                if new_title.is_some() {
                    chapter.current_title = old_title.clone();
                }
                chapter.deleted = true;
                Ok(())
            }
            ChapterOperation::EditTitle {
                chapter_id,
                old_title,
                ..
            } => {
                find_mut(chapters, *chapter_id)?.current_title = old_title.clone();
                Ok(())
            }
            ChapterOperation::AiCleanup {
                chapter_id,
                old_title,
                old_selected,
                ..
            } => {
                let chapter = find_mut(chapters, *chapter_id)?;
                chapter.current_title = old_title.clone();
                chapter.selected = *old_selected;
                Ok(())
            }
            ChapterOperation::Batch(ops) => {
                for op in ops.iter_mut().rev() {
                    op.undo(chapters)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapters(titles: &[(f64, &str)]) -> Vec<Chapter> {
        titles.iter().map(|&(t, title)| Chapter::new(t, title)).collect()
    }

    #[test]
    fn add_then_undo_restores_prior_list() {
        let mut chapters = chapters(&[(0.0, "A"), (10.0, "B")]);
        let before = chapters.clone();
        let new_chapter = Chapter::new(5.0, "Inserted");
        let mut op = ChapterOperation::AddChapter {
            chapter: new_chapter.clone(),
        };
        op.apply(&mut chapters).unwrap();
        assert_eq!(chapters[1].id, new_chapter.id);
        op.undo(&mut chapters).unwrap();
        assert_eq!(chapters, before);
    }

    #[test]
    fn edit_title_round_trips() {
        let mut chapters = chapters(&[(0.0, "Original")]);
        let before = chapters.clone();
        let id = chapters[0].id;
        let mut op = ChapterOperation::EditTitle {
            chapter_id: id,
            old_title: String::new(),
            new_title: "Renamed".to_string(),
        };
        op.apply(&mut chapters).unwrap();
        assert_eq!(chapters[0].current_title, "Renamed");
        op.undo(&mut chapters).unwrap();
        assert_eq!(chapters, before);
    }

    #[test]
    fn restore_with_new_title_round_trips() {
        let mut chapters = chapters(&[(0.0, "Keep")]);
        chapters[0].deleted = true;
        chapters[0].selected = false;
        let before = chapters.clone();
        let id = chapters[0].id;
        let mut op = ChapterOperation::RestoreChapter {
            chapter_id: id,
            old_title: String::new(),
            new_title: Some("Retitled".to_string()),
        };
        op.apply(&mut chapters).unwrap();
        assert!(!chapters[0].deleted);
        assert_eq!(chapters[0].current_title, "Retitled");
        op.undo(&mut chapters).unwrap();
        assert_eq!(chapters, before);
    }

    #[test]
    fn batch_undoes_in_reverse_order() {
        let mut chapters = chapters(&[(0.0, "A")]);
        let before = chapters.clone();
        let id = chapters[0].id;
        let mut batch = ChapterOperation::Batch(vec![
            ChapterOperation::EditTitle {
                chapter_id: id,
                old_title: String::new(),
                new_title: "First".to_string(),
            },
            ChapterOperation::EditTitle {
                chapter_id: id,
                old_title: String::new(),
                new_title: "Second".to_string(),
            },
        ]);
        batch.apply(&mut chapters).unwrap();
        assert_eq!(chapters[0].current_title, "Second");
        batch.undo(&mut chapters).unwrap();
        assert_eq!(chapters, before);
    }
}
