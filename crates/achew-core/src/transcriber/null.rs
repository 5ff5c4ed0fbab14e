//! A trivial reference backend and a subprocess-backed one.
//!
//! Concrete cloud/local ASR clients (Whisper, Deepgram, ...) are the
//! out-of-scope network/ML surface this crate only defines a contract for
//! (§4.6/§6); what lives here is the shape callers wire real backends into.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::warn;

use super::{TranscriberBackend, TRANSCRIPTION_ERROR_SENTINEL};
use crate::process::ProcessRegistry;

/// Always reports every clip as a transcription error. Useful as a
/// registry fallback of last resort and in tests that exercise the
/// per-item failure path without a real ASR backend.
pub struct NullTranscriber;

#[async_trait]
impl TranscriberBackend for NullTranscriber {
    fn name(&self) -> &'static str {
        "null"
    }

    fn priority(&self) -> i32 {
        i32::MIN
    }

    async fn transcribe(&self, clip_paths: &[&Path]) -> Vec<String> {
        vec![TRANSCRIPTION_ERROR_SENTINEL.to_string(); clip_paths.len()]
    }
}

/// Shells out to an external recognizer binary, one invocation per clip,
/// writing the clip path as its sole argument and reading recognized text
/// from stdout. The same invoke-and-capture-stderr shape as
/// [`crate::media_io::FfmpegMediaIO`], generalized to a caller-supplied
/// command name so any CLI-shaped ASR tool can be plugged in without a
/// new backend type.
pub struct CommandLineTranscriber {
    program: String,
    /// Leaked once at construction, not per `name()` call: registries are
    /// long-lived but call `name()` repeatedly (on every `register`/
    /// `get_preferred`), so leaking there would grow unboundedly.
    name: &'static str,
    priority: i32,
    registry: Arc<ProcessRegistry>,
}

impl CommandLineTranscriber {
    pub fn new(program: impl Into<String>, priority: i32, registry: Arc<ProcessRegistry>) -> Self {
        let program = program.into();
        let name = Box::leak(program.clone().into_boxed_str());
        Self {
            program,
            name,
            priority,
            registry,
        }
    }

    async fn transcribe_one(&self, clip_path: &Path) -> String {
        let mut command = Command::new(&self.program);
        command.arg(clip_path);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let mut child = match self.registry.spawn(command) {
            Ok(child) => child,
            Err(err) => {
                warn!(program = %self.program, error = %err, "failed to spawn transcriber");
                return TRANSCRIPTION_ERROR_SENTINEL.to_string();
            }
        };

        let mut stdout = String::new();
        if let Some(mut out) = child.stdout.take() {
            use tokio::io::AsyncReadExt;
            if out.read_to_string(&mut stdout).await.is_err() {
                return TRANSCRIPTION_ERROR_SENTINEL.to_string();
            }
        }

        match child.wait().await {
            Ok(status) if status.success() => stdout,
            Ok(_) => {
                let stderr = child.read_stderr_to_string().await;
                warn!(program = %self.program, stderr, "transcriber exited non-zero");
                TRANSCRIPTION_ERROR_SENTINEL.to_string()
            }
            Err(err) => {
                warn!(program = %self.program, error = %err, "transcriber wait failed");
                TRANSCRIPTION_ERROR_SENTINEL.to_string()
            }
        }
    }
}

#[async_trait]
impl TranscriberBackend for CommandLineTranscriber {
    fn name(&self) -> &'static str {
        self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn transcribe(&self, clip_paths: &[&Path]) -> Vec<String> {
        let mut out = Vec::with_capacity(clip_paths.len());
        for path in clip_paths {
            out.push(self.transcribe_one(path).await);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_transcriber_reports_every_clip_as_failed() {
        let backend = NullTranscriber;
        let paths = [Path::new("a.wav"), Path::new("b.wav")];
        let out = backend.transcribe(&paths).await;
        assert_eq!(out, vec![TRANSCRIPTION_ERROR_SENTINEL, TRANSCRIPTION_ERROR_SENTINEL]);
    }

    #[tokio::test]
    async fn command_line_transcriber_reports_failure_for_a_missing_binary() {
        let backend = CommandLineTranscriber::new("definitely-not-a-real-binary-xyz", 1, ProcessRegistry::new());
        let out = backend.transcribe(&[Path::new("clip.wav")]).await;
        assert_eq!(out, vec![TRANSCRIPTION_ERROR_SENTINEL.to_string()]);
    }
}
