//! Single-stream energy-threshold silence detection (§4.2).

use crate::config::SmartDetectConfig;
use crate::cue::SilenceSpan;
use crate::scanner::CancelFlag;

/// Frame size used for RMS energy estimation.
const FRAME_MS: f64 = 20.0;

/// Hysteresis band: energy must drop below `enter_silence` to start a span,
/// and rise above `exit_silence` to end one, so a signal oscillating right
/// at a single threshold doesn't fragment into many tiny spans.
const ENTER_SILENCE_RMS: f32 = 0.01;
const EXIT_SILENCE_RMS: f32 = 0.02;

pub struct SilenceScanner;

impl SilenceScanner {
    /// Scan a mono PCM buffer (already decoded by the caller via the
    /// external media tool) for silence. Returns `None` if `cancel` fires
    /// mid-scan; the pipeline treats that as "no result, step aborted".
    pub fn scan(
        samples: &[f32],
        sample_rate: u32,
        duration: f64,
        config: &SmartDetectConfig,
        cancel: &CancelFlag,
    ) -> Option<Vec<SilenceSpan>> {
        let frame_len = ((FRAME_MS / 1000.0) * sample_rate as f64).round().max(1.0) as usize;
        let mut spans = Vec::new();
        let mut in_silence = false;
        let mut silence_start = 0.0f64;

        for (frame_index, frame) in samples.chunks(frame_len).enumerate() {
            if frame_index % 256 == 0 && cancel.is_cancelled() {
                return None;
            }

            let rms = rms_energy(frame);
            let frame_time = frame_index as f64 * frame_len as f64 / sample_rate as f64;

            if !in_silence && rms < ENTER_SILENCE_RMS {
                in_silence = true;
                silence_start = frame_time;
            } else if in_silence && rms > EXIT_SILENCE_RMS {
                in_silence = false;
                push_span(&mut spans, silence_start, frame_time, duration, config);
            }
        }

        if in_silence {
            push_span(&mut spans, silence_start, duration, duration, config);
        }

        Some(spans)
    }
}

fn push_span(spans: &mut Vec<SilenceSpan>, start: f64, end: f64, duration: f64, config: &SmartDetectConfig) {
    let start = start.max(0.0);
    let end = end.min(duration);
    if end - start >= config.min_silence_duration {
        spans.push(SilenceSpan { start, end });
    }
}

fn rms_energy(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = frame.iter().map(|s| s * s).sum();
    (sum_sq / frame.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silence(n: usize) -> Vec<f32> {
        vec![0.0; n]
    }

    fn tone(n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (i as f32 * 0.3).sin() * 0.8)
            .collect()
    }

    #[test]
    fn detects_a_silent_gap_between_speech() {
        let sample_rate = 16_000;
        let mut samples = tone(sample_rate * 2);
        samples.extend(silence(sample_rate * 3));
        samples.extend(tone(sample_rate * 2));
        let duration = samples.len() as f64 / sample_rate as f64;

        let config = SmartDetectConfig::default();
        let cancel = CancelFlag::new();
        let spans = SilenceScanner::scan(&samples, sample_rate as u32, duration, &config, &cancel).unwrap();

        assert_eq!(spans.len(), 1);
        assert!((spans[0].start - 2.0).abs() < 0.1);
        assert!((spans[0].end - 5.0).abs() < 0.1);
    }

    #[test]
    fn drops_gaps_shorter_than_min_silence_duration() {
        let sample_rate = 16_000;
        let mut samples = tone(sample_rate * 2);
        samples.extend(silence(sample_rate / 2)); // 0.5s, below the 2.0s floor
        samples.extend(tone(sample_rate * 2));
        let duration = samples.len() as f64 / sample_rate as f64;

        let config = SmartDetectConfig::default();
        let cancel = CancelFlag::new();
        let spans = SilenceScanner::scan(&samples, sample_rate as u32, duration, &config, &cancel).unwrap();
        assert!(spans.is_empty());
    }

    #[test]
    fn returns_none_when_cancelled() {
        let sample_rate = 16_000;
        let samples = silence(sample_rate * 10);
        let config = SmartDetectConfig::default();
        let cancel = CancelFlag::new();
        cancel.cancel();
        assert!(SilenceScanner::scan(&samples, sample_rate as u32, 10.0, &config, &cancel).is_none());
    }
}
