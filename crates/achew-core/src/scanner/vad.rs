//! Chunked, worker-parallel VAD scanning for large files (§4.3).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::config::{SmartDetectConfig, VadConfig};
use crate::cue::SilenceSpan;
use crate::error::ScanError;
use crate::media_io::MediaIO;
use crate::process::ProcessRegistry;
use crate::scanner::CancelFlag;

/// Job handed to a worker on stdin: the chunk files it owns, in order, and
/// its first chunk's global index (for coordinate translation).
#[derive(Debug, Serialize)]
struct WorkerJob {
    chunk_paths: Vec<PathBuf>,
    first_chunk_index: usize,
    chunk_seconds: f64,
}

#[derive(Debug, Deserialize)]
struct WorkerProgress {
    #[allow(dead_code)]
    chunk_index: usize,
    #[allow(dead_code)]
    fraction_complete: f64,
}

#[derive(Debug, Deserialize)]
struct WorkerResult {
    chunk_index: usize,
    /// `(start, end)` speech intervals, local to the chunk.
    speech_intervals: Vec<(f64, f64)>,
}

/// Builds the command used to launch one VAD worker process. Kept abstract
/// so the actual model binary is supplied by the caller.
pub trait WorkerCommandFactory: Send + Sync {
    fn command(&self, worker_index: usize) -> Command;
}

pub struct VadScanner;

impl VadScanner {
    /// Run the full chunk → worker-pool → merge pipeline described in §4.3.
    #[instrument(skip(media_io, worker_factory, registry, cancel))]
    pub async fn scan(
        path: &std::path::Path,
        duration: f64,
        cores: usize,
        config: &SmartDetectConfig,
        vad_config: &VadConfig,
        media_io: &dyn MediaIO,
        worker_factory: &dyn WorkerCommandFactory,
        registry: &Arc<ProcessRegistry>,
        out_dir: &std::path::Path,
        cancel: &CancelFlag,
    ) -> Result<Option<Vec<SilenceSpan>>, ScanError> {
        let chunks = media_io
            .split_uniform(path, vad_config.chunk_seconds, out_dir)
            .await
            .map_err(|e| ScanError::WorkerFailed {
                index: 0,
                message: e.to_string(),
            })?;

        if chunks.is_empty() {
            return Ok(Some(Vec::new()));
        }

        let worker_count = vad_config.worker_count(cores).min(chunks.len());
        let ranges = partition_ranges(chunks.len(), worker_count);

        let mut handles = Vec::with_capacity(ranges.len());
        for (worker_index, range) in ranges.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            let job_chunks = chunks[range.clone()].to_vec();
            let job = WorkerJob {
                chunk_paths: job_chunks,
                first_chunk_index: range.start,
                chunk_seconds: vad_config.chunk_seconds,
            };
            let command = worker_factory.command(worker_index);
            let registry = registry.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                run_worker(worker_index, job, command, &registry, &cancel).await
            }));
        }

        let mut all_intervals: Vec<(f64, f64)> = Vec::new();
        for (worker_index, handle) in handles.into_iter().enumerate() {
            let result = handle
                .await
                .map_err(|e| ScanError::WorkerFailed {
                    index: worker_index,
                    message: e.to_string(),
                })?;
            match result? {
                Some(intervals) => all_intervals.extend(intervals),
                None => return Ok(None),
            }
        }

        if cancel.is_cancelled() {
            return Ok(None);
        }

        let gaps = invert_to_silence(&all_intervals, duration);
        let merged = merge_gaps(gaps, vad_config.merge_gap_seconds);
        let filtered = merged
            .into_iter()
            .filter(|g| g.duration() >= config.min_silence_duration)
            .collect();

        Ok(Some(filtered))
    }
}

/// Split `n` items into `workers` contiguous, near-equal ranges.
fn partition_ranges(n: usize, workers: usize) -> Vec<std::ops::Range<usize>> {
    let workers = workers.max(1);
    let base = n / workers;
    let remainder = n % workers;
    let mut ranges = Vec::with_capacity(workers);
    let mut start = 0;
    for w in 0..workers {
        let size = base + usize::from(w < remainder);
        if size == 0 {
            continue;
        }
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

async fn run_worker(
    worker_index: usize,
    job: WorkerJob,
    mut command: Command,
    registry: &Arc<ProcessRegistry>,
    cancel: &CancelFlag,
) -> Result<Option<Vec<(f64, f64)>>, ScanError> {
    command.stdin(std::process::Stdio::piped());
    command.stdout(std::process::Stdio::piped());
    command.stderr(std::process::Stdio::piped());

    let mut child = registry.spawn(command).map_err(|e| ScanError::WorkerFailed {
        index: worker_index,
        message: e.to_string(),
    })?;

    let mut stdin = child.stdin.take().ok_or_else(|| ScanError::WorkerFailed {
        index: worker_index,
        message: "worker process has no stdin".to_string(),
    })?;
    let job_line = serde_json::to_string(&job).map_err(|e| ScanError::WorkerFailed {
        index: worker_index,
        message: e.to_string(),
    })?;
    stdin
        .write_all(job_line.as_bytes())
        .await
        .map_err(|e| ScanError::WorkerFailed {
            index: worker_index,
            message: e.to_string(),
        })?;
    stdin.write_all(b"\n").await.ok();
    drop(stdin); // EOF: worker knows the job list is complete.

    let stdout = child.stdout.take().ok_or_else(|| ScanError::WorkerFailed {
        index: worker_index,
        message: "worker process has no stdout".to_string(),
    })?;
    let mut lines = BufReader::new(stdout).lines();

    let mut results: Vec<(usize, Vec<(f64, f64)>)> = Vec::new();
    loop {
        if cancel.is_cancelled() {
            child.terminate().await;
            return Ok(None);
        }
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                return Err(ScanError::WorkerFailed {
                    index: worker_index,
                    message: err.to_string(),
                });
            }
        };

        if let Some(payload) = line.strip_prefix("PROGRESS:") {
            match serde_json::from_str::<WorkerProgress>(payload) {
                Ok(progress) => debug!(worker_index, chunk_index = progress.chunk_index, "vad worker progress"),
                Err(err) => warn!(worker_index, error = %err, "malformed PROGRESS line"),
            }
        } else if let Some(payload) = line.strip_prefix("RESULT:") {
            let result: WorkerResult = serde_json::from_str(payload)
                .map_err(|_| ScanError::MalformedWorkerLine(payload.to_string()))?;
            let global_offset = (job.first_chunk_index + result.chunk_index) as f64 * job.chunk_seconds;
            let global_intervals = result
                .speech_intervals
                .into_iter()
                .map(|(s, e)| (s + global_offset, e + global_offset))
                .collect();
            results.push((result.chunk_index, global_intervals));
        }
    }

    let status = child.wait().await.map_err(|e| ScanError::WorkerFailed {
        index: worker_index,
        message: e.to_string(),
    })?;
    if !status.success() {
        let stderr = child.read_stderr_to_string().await;
        return Err(ScanError::WorkerFailed {
            index: worker_index,
            message: stderr,
        });
    }

    results.sort_by_key(|(idx, _)| *idx);
    Ok(Some(results.into_iter().flat_map(|(_, intervals)| intervals).collect()))
}

/// Invert speech intervals on `[0, duration)` into the silence they leave
/// behind.
fn invert_to_silence(speech: &[(f64, f64)], duration: f64) -> Vec<(f64, f64)> {
    let mut sorted = speech.to_vec();
    sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).expect("speech interval starts are finite"));

    let mut gaps = Vec::new();
    let mut cursor = 0.0;
    for (start, end) in sorted {
        if start > cursor {
            gaps.push((cursor, start));
        }
        cursor = cursor.max(end);
    }
    if cursor < duration {
        gaps.push((cursor, duration));
    }
    gaps
}

/// Sort gaps by start and coalesce any pair separated by `<= merge_gap`.
fn merge_gaps(mut gaps: Vec<(f64, f64)>, merge_gap: f64) -> Vec<SilenceSpan> {
    gaps.sort_by(|a, b| a.0.partial_cmp(&b.0).expect("gap starts are finite"));

    let mut merged: Vec<(f64, f64)> = Vec::new();
    for (start, end) in gaps {
        if let Some(last) = merged.last_mut() {
            if start - last.1 <= merge_gap {
                last.1 = last.1.max(end);
                continue;
            }
        }
        merged.push((start, end));
    }

    merged.into_iter().map(|(start, end)| SilenceSpan { start, end }).collect()
}

/// Unused in production but documents the intended worker poll cadence.
#[allow(dead_code)]
const WORKER_PROGRESS_MIN_INTERVAL: Duration = Duration::from_millis(100);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_ranges_distributes_remainder_to_early_workers() {
        let ranges = partition_ranges(10, 3);
        assert_eq!(ranges, vec![0..4, 4..7, 7..10]);
    }

    #[test]
    fn partition_ranges_never_produces_empty_range_when_n_ge_workers() {
        let ranges = partition_ranges(5, 5);
        assert_eq!(ranges.len(), 5);
        assert!(ranges.iter().all(|r| r.len() == 1));
    }

    #[test]
    fn invert_to_silence_handles_leading_and_trailing_silence() {
        let speech = vec![(5.0, 10.0), (15.0, 18.0)];
        let gaps = invert_to_silence(&speech, 20.0);
        assert_eq!(gaps, vec![(0.0, 5.0), (10.0, 15.0), (18.0, 20.0)]);
    }

    #[test]
    fn invert_to_silence_handles_overlapping_speech() {
        let speech = vec![(0.0, 10.0), (5.0, 12.0)];
        let gaps = invert_to_silence(&speech, 20.0);
        assert_eq!(gaps, vec![(12.0, 20.0)]);
    }

    #[test]
    fn merge_gaps_coalesces_close_pairs() {
        let gaps = vec![(0.0, 5.0), (5.5, 8.0), (20.0, 25.0)];
        let merged = merge_gaps(gaps, 1.0);
        assert_eq!(
            merged,
            vec![
                SilenceSpan { start: 0.0, end: 8.0 },
                SilenceSpan { start: 20.0, end: 25.0 },
            ]
        );
    }

    #[test]
    fn merge_gaps_keeps_distant_pairs_separate() {
        let gaps = vec![(0.0, 5.0), (8.0, 10.0)];
        let merged = merge_gaps(gaps, 1.0);
        assert_eq!(merged.len(), 2);
    }
}
