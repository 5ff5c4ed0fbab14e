//! Subprocess registry shared by [`crate::media_io`] and [`crate::scanner::vad`].
//!
//! Every spawned helper process (ffmpeg, a VAD worker) is registered here so
//! a cancelled pipeline step can tear it down promptly, the same shape this
//! codebase uses for its Ollama server lifecycle: a typed command, a handle
//! kept around after spawn, and an explicit teardown path instead of relying
//! on `Drop` alone.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::error::MediaError;

/// A spawned child process, registered for cancellation, with its stdio
/// handles already detached for the caller to drive directly.
pub struct ManagedChild {
    pub id: u64,
    pub stdin: Option<ChildStdin>,
    pub stdout: Option<ChildStdout>,
    pub stderr: Option<ChildStderr>,
    inner: Arc<AsyncMutex<Child>>,
    registry: Arc<ProcessRegistry>,
}

impl ManagedChild {
    /// Wait for the process to exit, yielding its status.
    pub async fn wait(&self) -> std::io::Result<std::process::ExitStatus> {
        self.inner.lock().await.wait().await
    }

    /// Drain and return the process's full stderr output, if not already
    /// taken by the caller.
    pub async fn read_stderr_to_string(&mut self) -> String {
        let Some(mut stderr) = self.stderr.take() else {
            return String::new();
        };
        let mut buf = String::new();
        let _ = stderr.read_to_string(&mut buf).await;
        buf
    }

    /// Tear the process down: drop `stdin` first so a worker using the
    /// stdin-EOF protocol (§4.3) can exit on its own, then force-kill.
    pub async fn terminate(&mut self) {
        self.stdin.take();
        let mut guard = self.inner.lock().await;
        if let Err(err) = guard.start_kill() {
            debug!(process_id = self.id, error = %err, "process already exited");
        }
        self.registry.unregister(self.id);
    }
}

impl Drop for ManagedChild {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}

/// Tracks every process spawned for the lifetime of one pipeline run.
pub struct ProcessRegistry {
    children: StdMutex<HashMap<u64, Arc<AsyncMutex<Child>>>>,
    next_id: AtomicU64,
}

impl ProcessRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            children: StdMutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Spawn `command`, registering the child for later cancellation.
    pub fn spawn(self: &Arc<Self>, mut command: Command) -> Result<ManagedChild, MediaError> {
        let mut child = command.spawn().map_err(MediaError::Spawn)?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let inner = Arc::new(AsyncMutex::new(child));
        self.children.lock().unwrap().insert(id, inner.clone());
        Ok(ManagedChild {
            id,
            stdin,
            stdout,
            stderr,
            inner,
            registry: self.clone(),
        })
    }

    fn unregister(&self, id: u64) {
        self.children.lock().unwrap().remove(&id);
    }

    /// Give every process still registered up to `grace_period` to exit on
    /// its own (a caller that wants the graceful stdin-EOF signal of §4.3
    /// drops its `ManagedChild`'s `stdin` before calling this), then
    /// force-kill whatever is still alive. Called when a pipeline step is
    /// cancelled (§5).
    pub async fn terminate_all(&self, grace_period: std::time::Duration) {
        let handles: Vec<Arc<AsyncMutex<Child>>> =
            self.children.lock().unwrap().values().cloned().collect();

        for handle in &handles {
            let waited = tokio::time::timeout(grace_period, async {
                let mut guard = handle.lock().await;
                guard.wait().await
            })
            .await;
            if waited.is_err() {
                let mut guard = handle.lock().await;
                if let Err(err) = guard.start_kill() {
                    warn!(error = %err, "failed to force-kill subprocess during cancellation");
                }
            }
        }
        self.children.lock().unwrap().clear();
    }

    pub fn active_count(&self) -> usize {
        self.children.lock().unwrap().len()
    }
}
