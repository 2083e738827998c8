//! Transcoder process wrapper
//!
//! Spawns the external transcoder, keeps its pipes drained, and waits
//! for exit under combined cancellation (external cancel plus a hard
//! deadline). The wrapper never interprets output files; playlist and
//! segment semantics live with the readiness probe and the cache.
//!
//! Draining is a correctness requirement: an undrained stderr pipe
//! fills its kernel buffer and blocks a long transcode mid-write. Only
//! a bounded tail of stderr is retained for diagnostics.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, StreamError};

/// Retained stderr tail size
const STDERR_TAIL_BYTES: usize = 4 * 1024;

/// Lifecycle of a transcode job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Spawning,
    Running,
    Completed,
    Cancelled,
    Failed,
    TimedOut,
}

impl JobStatus {
    /// Whether the job may still produce output.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Spawning | JobStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Spawning => "spawning",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Failed => "failed",
            JobStatus::TimedOut => "timed_out",
        }
    }
}

/// How a transcode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process exited on its own
    Exited,
    /// Killed after external cancellation
    Cancelled,
    /// Killed after the hard deadline elapsed
    TimedOut,
}

/// Result of waiting a transcode out.
#[derive(Debug)]
pub struct JobExit {
    pub termination: Termination,
    pub exit_code: Option<i32>,
    pub stderr_tail: String,
}

impl JobExit {
    pub fn success(&self) -> bool {
        self.termination == Termination::Exited && self.exit_code == Some(0)
    }
}

/// Fully-built transcoder invocation.
#[derive(Debug, Clone)]
pub struct TranscodeArgs {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Working directory for the child; segment and playlist paths in
    /// `args` are relative to it, so the playlist references bare
    /// segment filenames.
    pub current_dir: PathBuf,
}

/// One spawned transcoder subprocess.
#[derive(Debug)]
pub struct TranscoderJob {
    child: Child,
    stderr_drain: JoinHandle<Vec<u8>>,
    stdout_drain: JoinHandle<()>,
}

impl TranscoderJob {
    /// Spawn the transcoder. A missing executable surfaces as
    /// `TranscoderUnavailable`.
    pub fn spawn(argv: &TranscodeArgs) -> Result<Self> {
        let mut cmd = Command::new(&argv.program);
        cmd.args(&argv.args)
            .current_dir(&argv.current_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StreamError::TranscoderUnavailable(argv.program.display().to_string())
            } else {
                StreamError::Io(e)
            }
        })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| StreamError::Io(std::io::Error::other("transcoder stderr not captured")))?;
        let stderr_drain =
            tokio::spawn(async move { drain_tail(stderr, STDERR_TAIL_BYTES).await });

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StreamError::Io(std::io::Error::other("transcoder stdout not captured")))?;
        let stdout_drain = tokio::spawn(async move {
            let _ = tokio::io::copy(&mut tokio::io::BufReader::new(stdout), &mut tokio::io::sink())
                .await;
        });

        Ok(Self {
            child,
            stderr_drain,
            stdout_drain,
        })
    }

    /// Wait for the process under combined cancellation: whichever of
    /// process exit, external cancel, or the deadline fires first wins.
    /// Cancel and deadline both kill the process.
    pub async fn wait(mut self, cancel: &CancellationToken, deadline: Duration) -> JobExit {
        let mut termination = Termination::Exited;

        let mut exit_code = tokio::select! {
            status = self.child.wait() => status.ok().and_then(|s| s.code()),
            _ = cancel.cancelled() => {
                termination = Termination::Cancelled;
                None
            }
            _ = tokio::time::sleep(deadline) => {
                termination = Termination::TimedOut;
                None
            }
        };
        if termination != Termination::Exited {
            exit_code = self.kill_and_reap().await;
        }

        let _ = self.stdout_drain.await;
        let stderr_tail = match self.stderr_drain.await {
            Ok(tail) => String::from_utf8_lossy(&tail).into_owned(),
            Err(_) => String::new(),
        };

        JobExit {
            termination,
            exit_code,
            stderr_tail,
        }
    }

    async fn kill_and_reap(&mut self) -> Option<i32> {
        if let Err(e) = self.child.start_kill() {
            tracing::warn!("failed to kill transcoder process: {}", e);
        }
        self.child.wait().await.ok().and_then(|s| s.code())
    }
}

/// Read a stream to completion, keeping only the last `cap` bytes.
async fn drain_tail<R>(mut reader: R, cap: usize) -> Vec<u8>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut tail = Vec::with_capacity(1024);
    let mut buf = [0u8; 1024];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > cap {
                    let excess = tail.len() - cap;
                    tail.drain(..excess);
                }
            }
        }
    }
    tail
}
