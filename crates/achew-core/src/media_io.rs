//! Thin contract over an external media tool (§4.1).
//!
//! Grounded on this codebase's `FfmpegEncoder` (`audio/encoder/ffmpeg.rs`):
//! a command-line tool invoked with an explicit argument list, failures
//! surfaced via captured stderr rather than a bare exit code.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::instrument;

use crate::error::MediaError;
use crate::process::ProcessRegistry;
use std::sync::Arc;

/// Operations this crate needs from an external media tool. Kept narrow and
/// synchronous-in-spirit (one call, one result) even though the underlying
/// implementation shells out asynchronously, so a test double can swap in
/// trivially.
#[async_trait]
pub trait MediaIO: Send + Sync {
    /// Lossless concatenation of `paths` in order; returns the path to the
    /// combined file.
    async fn concat(&self, paths: &[PathBuf], out_dir: &Path) -> Result<PathBuf, MediaError>;

    /// Cuts `path` at `cut_points` (ascending, first is implicitly 0) into
    /// `cut_points.len()` segments, the last running to `total_duration`.
    async fn extract_segments(
        &self,
        path: &Path,
        cut_points: &[f64],
        total_duration: f64,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, MediaError>;

    /// A short head-only clip bounded by `max_seconds`, for ASR. When
    /// `trim` is false a byte-copy is an acceptable implementation.
    async fn trim_head(&self, seg_path: &Path, trim: bool, max_seconds: f64) -> Result<PathBuf, MediaError>;

    /// Fixed-stride segmentation into `chunk_seconds`-long pieces.
    async fn split_uniform(
        &self,
        path: &Path,
        chunk_seconds: f64,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, MediaError>;

    /// Probe a single file's duration in seconds.
    async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError>;

    /// Decode `path` to mono 32-bit float PCM at `sample_rate`, for feeding
    /// [`crate::scanner::silence::SilenceScanner`]. This is the one place
    /// this crate touches raw samples; everywhere else audio stays opaque
    /// file paths the external tool operates on.
    async fn decode_pcm_f32(&self, path: &Path, sample_rate: u32) -> Result<Vec<f32>, MediaError>;
}

/// FFmpeg/ffprobe-backed implementation. Every invocation is registered
/// with a [`ProcessRegistry`] so cancellation can terminate it promptly.
pub struct FfmpegMediaIO {
    registry: Arc<ProcessRegistry>,
}

impl FfmpegMediaIO {
    pub fn new(registry: Arc<ProcessRegistry>) -> Self {
        Self { registry }
    }

    async fn run(&self, mut command: Command) -> Result<(), MediaError> {
        command.stdin(std::process::Stdio::null());
        command.stdout(std::process::Stdio::null());
        command.stderr(std::process::Stdio::piped());
        let mut child = self.registry.spawn(command)?;
        let status = child.wait().await.map_err(MediaError::Spawn)?;
        if !status.success() {
            let message = child.read_stderr_to_string().await;
            return Err(MediaError::ToolFailed {
                status: status.code().unwrap_or(-1),
                stderr: message,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MediaIO for FfmpegMediaIO {
    #[instrument(skip(self, paths))]
    async fn concat(&self, paths: &[PathBuf], out_dir: &Path) -> Result<PathBuf, MediaError> {
        let list_path = out_dir.join("concat_list.txt");
        let list_body = paths
            .iter()
            .map(|p| format!("file '{}'", p.display()))
            .collect::<Vec<_>>()
            .join("\n");
        tokio::fs::write(&list_path, list_body)
            .await
            .map_err(MediaError::Spawn)?;

        let out_path = out_dir.join("concat.m4a");
        let mut command = Command::new("ffmpeg");
        command.args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "concat",
            "-safe",
            "0",
            "-i",
        ]);
        command.arg(&list_path);
        command.args(["-c", "copy", "-y"]).arg(&out_path);

        self.run(command).await?;
        Ok(out_path)
    }

    #[instrument(skip(self, cut_points))]
    async fn extract_segments(
        &self,
        path: &Path,
        cut_points: &[f64],
        total_duration: f64,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, MediaError> {
        let mut bounds = cut_points.to_vec();
        bounds.push(total_duration);
        let mut outputs = Vec::with_capacity(cut_points.len());

        for (i, window) in bounds.windows(2).enumerate() {
            let (start, end) = (window[0], window[1]);
            let out_path = out_dir.join(format!("segment_{i:05}.m4a"));
            let mut command = Command::new("ffmpeg");
            command.args(["-hide_banner", "-loglevel", "error", "-ss"]);
            command.arg(start.to_string());
            command.arg("-to").arg(end.to_string());
            command.arg("-i").arg(path);
            command.args(["-c", "copy", "-y"]).arg(&out_path);
            self.run(command).await?;
            outputs.push(out_path);
        }

        if outputs.len() != cut_points.len() {
            return Err(MediaError::OutputCountMismatch {
                expected: cut_points.len(),
                found: outputs.len(),
            });
        }
        Ok(outputs)
    }

    #[instrument(skip(self))]
    async fn trim_head(&self, seg_path: &Path, trim: bool, max_seconds: f64) -> Result<PathBuf, MediaError> {
        let out_path = seg_path.with_file_name(format!(
            "{}_head.m4a",
            seg_path.file_stem().and_then(|s| s.to_str()).unwrap_or("segment")
        ));

        if !trim {
            tokio::fs::copy(seg_path, &out_path)
                .await
                .map_err(MediaError::Spawn)?;
            return Ok(out_path);
        }

        let mut command = Command::new("ffmpeg");
        command.args(["-hide_banner", "-loglevel", "error", "-i"]);
        command.arg(seg_path);
        command.arg("-t").arg(max_seconds.to_string());
        command.args(["-c", "copy", "-y"]).arg(&out_path);
        self.run(command).await?;
        Ok(out_path)
    }

    #[instrument(skip(self))]
    async fn split_uniform(
        &self,
        path: &Path,
        chunk_seconds: f64,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, MediaError> {
        let pattern = out_dir.join("chunk_%05d.wav");
        let mut command = Command::new("ffmpeg");
        command.args(["-hide_banner", "-loglevel", "error", "-i"]);
        command.arg(path);
        command.args(["-f", "segment", "-segment_time"]);
        command.arg(chunk_seconds.to_string());
        command.args(["-ar", "16000", "-ac", "1", "-y"]);
        command.arg(&pattern);
        self.run(command).await?;

        let mut entries = tokio::fs::read_dir(out_dir).await.map_err(MediaError::Spawn)?;
        let mut chunks = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(MediaError::Spawn)? {
            let path = entry.path();
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("chunk_") && n.ends_with(".wav"))
            {
                chunks.push(path);
            }
        }
        chunks.sort();
        Ok(chunks)
    }

    #[instrument(skip(self))]
    async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError> {
        let mut command = Command::new("ffprobe");
        command.args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ]);
        command.arg(path);
        command.stdin(std::process::Stdio::null());
        command.stdout(std::process::Stdio::piped());
        command.stderr(std::process::Stdio::piped());

        let output = command.output().await.map_err(MediaError::Spawn)?;
        if !output.status.success() {
            return Err(MediaError::ToolFailed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse::<f64>()
            .map_err(|_| MediaError::ToolFailed {
                status: 0,
                stderr: "ffprobe returned a non-numeric duration".to_string(),
            })
    }

    #[instrument(skip(self))]
    async fn decode_pcm_f32(&self, path: &Path, sample_rate: u32) -> Result<Vec<f32>, MediaError> {
        let mut command = Command::new("ffmpeg");
        command.args(["-hide_banner", "-loglevel", "error", "-i"]);
        command.arg(path);
        command.args(["-f", "f32le", "-ar"]);
        command.arg(sample_rate.to_string());
        command.args(["-ac", "1", "pipe:1"]);
        command.stdin(std::process::Stdio::null());
        command.stdout(std::process::Stdio::piped());
        command.stderr(std::process::Stdio::piped());

        let mut child = self.registry.spawn(command)?;
        let mut raw = Vec::new();
        if let Some(mut out) = child.stdout.take() {
            use tokio::io::AsyncReadExt;
            out.read_to_end(&mut raw).await.map_err(MediaError::Spawn)?;
        }
        let status = child.wait().await.map_err(MediaError::Spawn)?;
        if !status.success() {
            let stderr = child.read_stderr_to_string().await;
            return Err(MediaError::ToolFailed {
                status: status.code().unwrap_or(-1),
                stderr,
            });
        }

        Ok(raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A fake implementation for exercising callers without shelling out.
    pub struct FakeMediaIO {
        pub file_durations: Vec<f64>,
    }

    #[async_trait]
    impl MediaIO for FakeMediaIO {
        async fn concat(&self, paths: &[PathBuf], out_dir: &Path) -> Result<PathBuf, MediaError> {
            Ok(out_dir.join(format!("concat_{}.m4a", paths.len())))
        }

        async fn extract_segments(
            &self,
            _path: &Path,
            cut_points: &[f64],
            _total_duration: f64,
            out_dir: &Path,
        ) -> Result<Vec<PathBuf>, MediaError> {
            Ok((0..cut_points.len())
                .map(|i| out_dir.join(format!("segment_{i:05}.m4a")))
                .collect())
        }

        async fn trim_head(&self, seg_path: &Path, _trim: bool, _max_seconds: f64) -> Result<PathBuf, MediaError> {
            Ok(seg_path.with_extension("head.m4a"))
        }

        async fn split_uniform(
            &self,
            _path: &Path,
            chunk_seconds: f64,
            out_dir: &Path,
        ) -> Result<Vec<PathBuf>, MediaError> {
            let total: f64 = self.file_durations.iter().sum();
            let n = (total / chunk_seconds).ceil() as usize;
            Ok((0..n).map(|i| out_dir.join(format!("chunk_{i:05}.wav"))).collect())
        }

        async fn probe_duration(&self, _path: &Path) -> Result<f64, MediaError> {
            Ok(self.file_durations.first().copied().unwrap_or(0.0))
        }

        async fn decode_pcm_f32(&self, _path: &Path, _sample_rate: u32) -> Result<Vec<f32>, MediaError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn fake_extract_segments_returns_one_per_cut_point() {
        let dir = tempfile::tempdir().unwrap();
        let io = FakeMediaIO {
            file_durations: vec![100.0],
        };
        let segments = io
            .extract_segments(Path::new("book.m4a"), &[0.0, 12.75], 100.0, dir.path())
            .await
            .unwrap();
        assert_eq!(segments.len(), 2);
    }

    #[tokio::test]
    async fn fake_split_uniform_ceils_chunk_count() {
        let dir = tempfile::tempdir().unwrap();
        let io = FakeMediaIO {
            file_durations: vec![1250.0],
        };
        let chunks = io.split_uniform(Path::new("book.m4a"), 600.0, dir.path()).await.unwrap();
        assert_eq!(chunks.len(), 3); // ceil(1250 / 600) = 3
    }
}
