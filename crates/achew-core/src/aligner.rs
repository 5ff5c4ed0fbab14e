//! Source-chapter-to-detected-cue alignment under time dilation and drift.
//!
//! Implements §4.5: an affine transform fit from weighted anchor pairs,
//! followed by dynamic-programming matching of the transformed expected
//! times against detected cues.

use crate::book::SimpleChapter;
use crate::config::AlignerConfig;

/// A detected cue with its associated silence duration, as produced by
/// [`crate::scanner`] + [`crate::cluster::CueClusterer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedCue {
    pub time: f64,
    pub silence: f64,
}

/// Recorded when a chapter's placement came from the aligner's best guess
/// rather than a directly detected cue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealignmentData {
    pub original_timestamp: f64,
    pub confidence: f64,
    pub is_guess: bool,
}

/// One source chapter after alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedChapter {
    pub title: String,
    pub timestamp: f64,
    pub realignment: RealignmentData,
}

pub struct ChapterAligner;

impl ChapterAligner {
    /// Align `source_chapters` (from a foreign timeline of length
    /// `source_duration`) onto `detected_cues` (on a timeline of length
    /// `actual_duration`).
    pub fn align(
        source_chapters: &[SimpleChapter],
        detected_cues: &[DetectedCue],
        source_duration: f64,
        actual_duration: f64,
        config: &AlignerConfig,
    ) -> Vec<AlignedChapter> {
        if detected_cues.is_empty() {
            return source_chapters
                .iter()
                .map(|c| {
                    let timestamp = (c.timestamp * (actual_duration / source_duration)).max(0.0);
                    AlignedChapter {
                        title: c.title.clone(),
                        timestamp,
                        realignment: RealignmentData {
                            original_timestamp: c.timestamp,
                            confidence: 0.2,
                            is_guess: true,
                        },
                    }
                })
                .collect();
        }

        let (scale, offset) =
            Self::fit_affine(source_chapters, detected_cues, source_duration, actual_duration, config);

        let expected: Vec<f64> = source_chapters
            .iter()
            .map(|c| scale * c.timestamp + offset)
            .collect();

        Self::dp_match(source_chapters, &expected, detected_cues, config)
    }

    /// Step 1: fit `t_actual ≈ scale * t_source + offset` from weighted
    /// anchor pairs, with the sanity clamps from §4.5.
    fn fit_affine(
        source_chapters: &[SimpleChapter],
        detected_cues: &[DetectedCue],
        source_duration: f64,
        actual_duration: f64,
        config: &AlignerConfig,
    ) -> (f64, f64) {
        let s0 = if source_duration > 0.0 {
            actual_duration / source_duration
        } else {
            1.0
        };

        let mut anchors: Vec<(f64, f64, f64)> = Vec::new(); // (source_t, cue_t, weight)
        for chapter in source_chapters {
            let predicted = s0 * chapter.timestamp;
            let mut best: Option<(f64, f64)> = None; // (cue_time, score)
            for cue in detected_cues {
                let dt = (cue.time - predicted).abs();
                if dt > config.anchor_search_radius {
                    continue;
                }
                let silence_score = (cue.silence / 3.0).min(1.0);
                let time_score = (1.0 - dt / 60.0).max(0.0);
                let score = 0.6 * silence_score + 0.4 * time_score;
                if best.is_none_or(|(_, best_score)| score > best_score) {
                    best = Some((cue.time, score));
                }
            }
            if let Some((cue_time, score)) = best {
                anchors.push((chapter.timestamp, cue_time, score));
            }
        }

        if anchors.len() < 2 {
            return (s0, 0.0);
        }

        // Weighted least squares for y = scale * x + offset.
        let w_sum: f64 = anchors.iter().map(|(_, _, w)| w).sum();
        let x_mean: f64 = anchors.iter().map(|(x, _, w)| x * w).sum::<f64>() / w_sum;
        let y_mean: f64 = anchors.iter().map(|(_, y, w)| y * w).sum::<f64>() / w_sum;

        let mut num = 0.0;
        let mut den = 0.0;
        for (x, y, w) in &anchors {
            num += w * (x - x_mean) * (y - y_mean);
            den += w * (x - x_mean).powi(2);
        }

        let (mut scale, mut offset) = if den.abs() > f64::EPSILON {
            let scale = num / den;
            let offset = y_mean - scale * x_mean;
            (scale, offset)
        } else {
            (s0, 0.0)
        };

        if scale < config.scale_bounds.0 || scale > config.scale_bounds.1 {
            scale = s0;
            offset = 0.0;
        }
        if offset.abs() > config.max_offset {
            offset = 0.0;
        }

        (scale, offset)
    }

    /// Step 2: dynamic-programming match of `expected_times` against
    /// `detected_cues`, per the cost model in §4.5.
    fn dp_match(
        source_chapters: &[SimpleChapter],
        expected: &[f64],
        detected_cues: &[DetectedCue],
        config: &AlignerConfig,
    ) -> Vec<AlignedChapter> {
        let n = source_chapters.len();
        let m = detected_cues.len();

        // dp[i][j]: min cost aligning first i chapters using cues up to index j.
        // back[i][j]: how we got there, for reconstruction.
        #[derive(Clone, Copy, PartialEq)]
        enum Back {
            Start,
            Match,
            SkipCue,
            NoMatch,
        }

        let mut dp = vec![vec![f64::INFINITY; m + 1]; n + 1];
        let mut back = vec![vec![Back::Start; m + 1]; n + 1];

        dp[0][0] = 0.0;
        for j in 1..=m {
            dp[0][j] = 0.0;
            back[0][j] = Back::SkipCue;
        }
        for i in 1..=n {
            dp[i][0] = dp[i - 1][0] + 50.0;
            back[i][0] = Back::NoMatch;
        }

        for i in 1..=n {
            for j in 1..=m {
                let mut best_cost = f64::INFINITY;
                let mut best_back = Back::NoMatch;

                let cue = &detected_cues[j - 1];
                let match_cost_val =
                    dp[i - 1][j - 1] + match_cost(expected[i - 1], cue.time, cue.silence, config);
                if match_cost_val < best_cost {
                    best_cost = match_cost_val;
                    best_back = Back::Match;
                }

                let skip_cost = dp[i][j - 1];
                if skip_cost < best_cost {
                    best_cost = skip_cost;
                    best_back = Back::SkipCue;
                }

                let no_match_cost = dp[i - 1][j] + 50.0;
                if no_match_cost < best_cost {
                    best_cost = no_match_cost;
                    best_back = Back::NoMatch;
                }

                dp[i][j] = best_cost;
                back[i][j] = best_back;
            }
        }

        // Reconstruct from dp[n][m].
        let mut assignment: Vec<Option<usize>> = vec![None; n];
        let (mut i, mut j) = (n, m);
        while i > 0 {
            match back[i][j] {
                Back::Match => {
                    assignment[i - 1] = Some(j - 1);
                    i -= 1;
                    j -= 1;
                }
                Back::SkipCue => {
                    j -= 1;
                }
                Back::NoMatch | Back::Start => {
                    assignment[i - 1] = None;
                    i -= 1;
                }
            }
        }

        source_chapters
            .iter()
            .zip(expected.iter())
            .zip(assignment.iter())
            .map(|((chapter, &exp), cue_idx)| match cue_idx {
                Some(idx) => {
                    let cue = &detected_cues[*idx];
                    let dt = (exp - cue.time).abs();
                    let confidence = (0.65 * (-dt / 30.0).exp() + 0.35 * (cue.silence / 4.0).min(1.0))
                        .clamp(0.0, 1.0);
                    AlignedChapter {
                        title: chapter.title.clone(),
                        timestamp: cue.time,
                        realignment: RealignmentData {
                            original_timestamp: chapter.timestamp,
                            confidence,
                            is_guess: false,
                        },
                    }
                }
                None => AlignedChapter {
                    title: chapter.title.clone(),
                    timestamp: exp.max(0.0),
                    realignment: RealignmentData {
                        original_timestamp: chapter.timestamp,
                        confidence: 0.3,
                        is_guess: true,
                    },
                },
            })
            .collect()
    }
}

/// `match_cost(e, t, s) = (|e-t|/2)^1.5 - min(7.5*s, 25)`, plus a
/// prohibitive `+1000` penalty when `|e-t| > max_drift`.
fn match_cost(expected: f64, cue_time: f64, silence: f64, config: &AlignerConfig) -> f64 {
    let dt = (expected - cue_time).abs();
    let mut cost = (dt / 2.0).powf(1.5) - (7.5 * silence).min(25.0);
    if dt > config.max_drift {
        cost += 1000.0;
    }
    cost
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cues(pairs: &[(f64, f64)]) -> Vec<DetectedCue> {
        pairs
            .iter()
            .map(|&(time, silence)| DetectedCue { time, silence })
            .collect()
    }

    fn chapters(pairs: &[(f64, &str)]) -> Vec<SimpleChapter> {
        pairs
            .iter()
            .map(|&(timestamp, title)| SimpleChapter {
                timestamp,
                title: title.to_string(),
            })
            .collect()
    }

    /// Scenario 3 from §8: identity.
    #[test]
    fn identity_case() {
        let src = chapters(&[(0.0, "A"), (600.0, "B")]);
        let detected = cues(&[(0.0, 3.0), (600.0, 3.0)]);
        let result = ChapterAligner::align(&src, &detected, 1200.0, 1200.0, &AlignerConfig::default());

        assert_eq!(result[0].timestamp, 0.0);
        assert_eq!(result[1].timestamp, 600.0);
        assert!(!result[0].realignment.is_guess);
        assert!(!result[1].realignment.is_guess);
        assert!(result[0].realignment.confidence >= 0.9);
        assert!(result[1].realignment.confidence >= 0.9);
    }

    /// Scenario 4 from §8: dilation.
    #[test]
    fn dilation_case() {
        let src = chapters(&[(0.0, "A"), (600.0, "B")]);
        let detected = cues(&[(0.0, 3.0), (660.0, 3.0)]);
        let result = ChapterAligner::align(&src, &detected, 1200.0, 1320.0, &AlignerConfig::default());

        assert_eq!(result[0].timestamp, 0.0);
        assert_eq!(result[1].timestamp, 660.0);
        assert!(!result[1].realignment.is_guess);
    }

    #[test]
    fn empty_detected_cues_falls_back_to_scaled_guess() {
        let src = chapters(&[(0.0, "A"), (300.0, "B")]);
        let result = ChapterAligner::align(&src, &[], 600.0, 1200.0, &AlignerConfig::default());
        assert_eq!(result[0].timestamp, 0.0);
        assert_eq!(result[1].timestamp, 600.0);
        assert!(result.iter().all(|c| c.realignment.is_guess));
        assert!(result.iter().all(|c| c.realignment.confidence == 0.2));
    }

    #[test]
    fn unmatched_chapter_is_a_guess_with_fixed_confidence() {
        let src = chapters(&[(0.0, "A"), (10_000.0, "Way out there")]);
        let detected = cues(&[(0.0, 3.0)]);
        let result = ChapterAligner::align(&src, &detected, 20_000.0, 20_000.0, &AlignerConfig::default());
        let guess = result.iter().find(|c| c.title == "Way out there").unwrap();
        assert!(guess.realignment.is_guess);
        assert_eq!(guess.realignment.confidence, 0.3);
    }

    #[test]
    fn all_non_guess_results_are_within_max_drift() {
        let src = chapters(&[(0.0, "A"), (500.0, "B"), (1000.0, "C")]);
        let detected = cues(&[(5.0, 2.0), (520.0, 4.0), (990.0, 1.0)]);
        let config = AlignerConfig::default();
        let result = ChapterAligner::align(&src, &detected, 1000.0, 1000.0, &config);
        for (chapter, expected_time) in result.iter().zip([0.0, 500.0, 1000.0]) {
            if !chapter.realignment.is_guess {
                assert!((chapter.timestamp - expected_time).abs() <= config.max_drift);
            }
        }
    }
}
