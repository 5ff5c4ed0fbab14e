//! Chapter export formats (§4.8): CSV, JSON, and CUE sheet.

use serde::Serialize;

use crate::chapter::Chapter;
use crate::error::PipelineError;

/// Format `seconds` as `HH:MM:SS`, or `MM:SS` when under one hour.
fn format_timestamp(seconds: f64) -> String {
    let total = seconds.floor() as u64;
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

/// CD-audio frame within the current second (75 frames/s).
fn cd_frame(seconds: f64) -> u64 {
    ((seconds.rem_euclid(1.0)) * 75.0).floor() as u64
}

fn selected_chapters(chapters: &[Chapter]) -> impl Iterator<Item = &Chapter> {
    chapters.iter().filter(|c| c.is_effectively_selected())
}

#[derive(Debug, Serialize)]
struct JsonChapter {
    chapter: usize,
    timestamp: f64,
    timestamp_formatted: String,
    title: String,
}

#[derive(Debug, Serialize)]
struct JsonExport {
    export_timestamp: String,
    total_chapters: usize,
    chapters: Vec<JsonChapter>,
}

/// CSV with header `Chapter,Timestamp,Timestamp_Seconds,Title`.
pub fn export_csv(chapters: &[Chapter]) -> Result<String, PipelineError> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer
        .write_record(["Chapter", "Timestamp", "Timestamp_Seconds", "Title"])
        .map_err(|e| PipelineError::other(e.to_string()))?;

    for (i, chapter) in selected_chapters(chapters).enumerate() {
        writer
            .write_record([
                (i + 1).to_string(),
                format_timestamp(chapter.timestamp),
                chapter.timestamp.to_string(),
                chapter.current_title.clone(),
            ])
            .map_err(|e| PipelineError::other(e.to_string()))?;
    }

    let bytes = writer.into_inner().map_err(|e| PipelineError::other(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| PipelineError::other(e.to_string()))
}

/// `{export_timestamp, total_chapters, chapters: [...]}`, serialized with
/// `serde_json` like every other wire-shaped type in this crate.
///
/// `export_timestamp` is supplied by the caller (this crate does not call
/// the wall clock itself) so exports stay reproducible in tests.
pub fn export_json(chapters: &[Chapter], export_timestamp: impl Into<String>) -> Result<String, PipelineError> {
    let json_chapters: Vec<JsonChapter> = selected_chapters(chapters)
        .enumerate()
        .map(|(i, c)| JsonChapter {
            chapter: i + 1,
            timestamp: c.timestamp,
            timestamp_formatted: format_timestamp(c.timestamp),
            title: c.current_title.clone(),
        })
        .collect();

    let export = JsonExport {
        export_timestamp: export_timestamp.into(),
        total_chapters: json_chapters.len(),
        chapters: json_chapters,
    };
    serde_json::to_string_pretty(&export).map_err(|e| PipelineError::other(e.to_string()))
}

/// A CUE sheet naming every selected chapter as its own track.
pub fn export_cue(chapters: &[Chapter]) -> String {
    let mut out = String::new();
    out.push_str("TITLE \"Audiobook Chapters\"\n");
    out.push_str("PERFORMER \"Unknown\"\n");
    out.push_str("FILE \"audiobook.mp3\" MP3\n");

    for (i, chapter) in selected_chapters(chapters).enumerate() {
        let track = i + 1;
        let total = chapter.timestamp.floor() as u64;
        let m = total / 60;
        let s = total % 60;
        let ff = cd_frame(chapter.timestamp);
        out.push_str(&format!("  TRACK {track:02} AUDIO\n"));
        out.push_str(&format!("    TITLE \"{}\"\n", chapter.current_title));
        out.push_str(&format!("    INDEX 01 {m:02}:{s:02}:{ff:02}\n"));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapters() -> Vec<Chapter> {
        let mut a = Chapter::new(0.0, "Opening Credits");
        let mut b = Chapter::new(3725.5, "Chapter One");
        let mut c = Chapter::new(4000.0, "Deleted Bit");
        c.deleted = true;
        a.selected = true;
        b.selected = true;
        vec![a, b, c]
    }

    #[test]
    fn format_timestamp_below_an_hour_omits_hours() {
        assert_eq!(format_timestamp(90.0), "01:30");
    }

    #[test]
    fn format_timestamp_above_an_hour_includes_hours() {
        assert_eq!(format_timestamp(3725.5), "01:02:05");
    }

    #[test]
    fn cd_frame_computes_75ths_of_a_second() {
        assert_eq!(cd_frame(1.5), 37); // 0.5 * 75 = 37.5 -> floor 37
        assert_eq!(cd_frame(2.0), 0);
    }

    #[test]
    fn csv_export_excludes_deleted_chapters() {
        let csv = export_csv(&chapters()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3); // header + 2 selected chapters
        assert!(csv.contains("Chapter,Timestamp,Timestamp_Seconds,Title"));
        assert!(!csv.contains("Deleted Bit"));
    }

    #[test]
    fn json_export_reports_total_and_formatted_timestamps() {
        let json = export_json(&chapters(), "2026-07-26T00:00:00Z").unwrap();
        assert!(json.contains("\"total_chapters\": 2"));
        assert!(json.contains("01:02:05"));
        assert!(!json.contains("Deleted Bit"));
    }

    #[test]
    fn cue_export_numbers_tracks_from_one() {
        let cue = export_cue(&chapters());
        assert!(cue.contains("TRACK 01 AUDIO"));
        assert!(cue.contains("TRACK 02 AUDIO"));
        assert!(!cue.contains("TRACK 03"));
        assert!(!cue.contains("Deleted Bit"));
    }
}
