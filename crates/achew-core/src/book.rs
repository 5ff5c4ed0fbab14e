//! Book metadata and the virtual timeline it defines.
//!
//! A `Book` is fetched from the (out-of-scope) library server as metadata
//! only; this crate never decodes audio itself — see [`crate::media_io`].

use serde::{Deserialize, Serialize};

/// Audio MIME types the library server is documented to hand us (§6).
/// Anything else is ignored by the caller before it ever reaches this crate.
pub const SUPPORTED_MIME_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/mp4",
    "audio/flac",
    "audio/x-flac",
    "audio/wav",
    "audio/x-wav",
    "audio/aac",
    "audio/ogg",
];

pub fn is_supported_mime(mime: &str) -> bool {
    SUPPORTED_MIME_TYPES.contains(&mime)
}

/// One physical audio file making up part of a book's virtual timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFile {
    /// Inode-like identifier from the library server, used to request bytes.
    pub ino: String,
    pub mime: String,
    pub duration: f64,
    /// Chapter markers embedded in this file's own container metadata, if any.
    pub embedded_chapters: Option<Vec<SimpleChapter>>,
}

/// A book's metadata and the ordered list of files forming its timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub duration: f64,
    pub files: Vec<AudioFile>,
}

/// Maps a global timestamp on the virtual (concatenated) timeline back to
/// the contributing file and the local offset within it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileOffset<'a> {
    pub file_index: usize,
    pub file: &'a AudioFile,
    pub local_offset: f64,
}

impl Book {
    /// Cumulative start offset of each file on the virtual timeline.
    pub fn file_start_offsets(&self) -> Vec<f64> {
        let mut offsets = Vec::with_capacity(self.files.len());
        let mut acc = 0.0;
        for file in &self.files {
            offsets.push(acc);
            acc += file.duration;
        }
        offsets
    }

    /// Resolve a global timestamp to the (file, local offset) that contains it.
    ///
    /// Returns `None` if `timestamp` is outside `[0, duration)` or the book
    /// has no files.
    pub fn resolve(&self, timestamp: f64) -> Option<FileOffset<'_>> {
        if timestamp < 0.0 || timestamp >= self.duration || self.files.is_empty() {
            return None;
        }
        let offsets = self.file_start_offsets();
        let mut file_index = 0;
        for (i, start) in offsets.iter().enumerate() {
            if *start <= timestamp {
                file_index = i;
            } else {
                break;
            }
        }
        let file = &self.files[file_index];
        Some(FileOffset {
            file_index,
            file,
            local_offset: timestamp - offsets[file_index],
        })
    }

    /// Every embedded chapter list from constituent files, concatenated and
    /// retimed onto the virtual timeline (used to build the `embedded`
    /// cue source).
    pub fn embedded_cues(&self) -> Vec<SimpleChapter> {
        let offsets = self.file_start_offsets();
        let mut cues = Vec::new();
        for (file, start) in self.files.iter().zip(offsets.iter()) {
            if let Some(chapters) = &file.embedded_chapters {
                for chapter in chapters {
                    cues.push(SimpleChapter {
                        timestamp: start + chapter.timestamp,
                        title: chapter.title.clone(),
                    });
                }
            }
        }
        cues
    }

    /// The `file-starts` cue source: one cue at the beginning of each
    /// constituent file on the virtual timeline.
    pub fn file_start_cues(&self) -> Vec<SimpleChapter> {
        self.file_start_offsets()
            .into_iter()
            .enumerate()
            .map(|(i, start)| SimpleChapter {
                timestamp: start,
                title: format!("File {}", i + 1),
            })
            .collect()
    }
}

/// A `(timestamp, title)` pair. Timestamps are non-negative and strictly
/// less than the book's duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleChapter {
    pub timestamp: f64,
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(durations: &[f64]) -> Book {
        Book {
            id: "book-1".into(),
            duration: durations.iter().sum(),
            files: durations
                .iter()
                .map(|d| AudioFile {
                    ino: "ino".into(),
                    mime: "audio/mpeg".into(),
                    duration: *d,
                    embedded_chapters: None,
                })
                .collect(),
        }
    }

    #[test]
    fn resolves_timestamp_to_correct_file() {
        let b = book(&[100.0, 200.0, 50.0]);
        let r = b.resolve(150.0).unwrap();
        assert_eq!(r.file_index, 1);
        assert_eq!(r.local_offset, 50.0);

        let r = b.resolve(0.0).unwrap();
        assert_eq!(r.file_index, 0);
        assert_eq!(r.local_offset, 0.0);

        let r = b.resolve(349.99).unwrap();
        assert_eq!(r.file_index, 2);
    }

    #[test]
    fn resolve_rejects_out_of_range() {
        let b = book(&[10.0]);
        assert!(b.resolve(-1.0).is_none());
        assert!(b.resolve(10.0).is_none());
    }

    #[test]
    fn file_start_cues_match_offsets() {
        let b = book(&[10.0, 20.0]);
        let cues = b.file_start_cues();
        assert_eq!(cues[0].timestamp, 0.0);
        assert_eq!(cues[1].timestamp, 10.0);
    }

    #[test]
    fn mime_allowlist() {
        assert!(is_supported_mime("audio/mp4"));
        assert!(!is_supported_mime("video/mp4"));
    }
}
