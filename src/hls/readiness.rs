//! First-response readiness detection
//!
//! Decides when a work directory holds enough transcoder output for
//! the server to answer the client's playlist request. Requiring two
//! segments avoids a known HLS client stall where a single-segment
//! live playlist offers no next segment at the 3-second mark; the
//! short fallback bounds worst-case client-visible latency when the
//! transcoder is slow to emit a second segment.

use std::path::Path;
use std::time::Instant;

use crate::config::ReadinessConfig;
use crate::error::{Result, StreamError};
use crate::hls::playlist;

/// Liveness view of the transcode the probe is waiting on.
pub trait JobSentinel: Send + Sync {
    fn is_running(&self) -> bool;
}

/// Polls a work directory's playlist until a first response is safe.
#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    config: ReadinessConfig,
}

impl ReadinessProbe {
    pub fn new(config: ReadinessConfig) -> Self {
        Self { config }
    }

    /// Block until the playlist in `work_dir` may be served.
    ///
    /// Ready when the playlist references `min_segments` segments and
    /// the last one exists non-empty, or references at least one
    /// segment and carries the end marker (short tracks finish in a
    /// single segment). After `fallback` has elapsed a single-segment
    /// playlist is accepted as-is. If the job dies first the playlist
    /// gets one final look; output salvageable means ready, otherwise
    /// `TranscoderExitedWithoutOutput`. Gives up with
    /// `ReadinessTimeout` after `timeout`.
    pub async fn wait_ready(&self, work_dir: &Path, job: &dyn JobSentinel) -> Result<()> {
        let started = Instant::now();
        let playlist_path = work_dir.join(playlist::PLAYLIST_FILE);

        loop {
            if let Some(text) = read_playlist(&playlist_path) {
                let refs = playlist::segment_refs(&text);
                if refs.len() >= self.config.min_segments {
                    let last = refs[refs.len() - 1];
                    if playlist::segment_nonempty(work_dir, last) {
                        return Ok(());
                    }
                }
                if !refs.is_empty() && playlist::has_end_marker(&text) {
                    return Ok(());
                }
                if !refs.is_empty() && started.elapsed() >= self.config.fallback() {
                    tracing::debug!(
                        "serving single-segment playlist after {:?} wait",
                        started.elapsed()
                    );
                    return Ok(());
                }
            }

            if !job.is_running() {
                if let Some(text) = read_playlist(&playlist_path) {
                    let any_output = playlist::segment_refs(&text)
                        .iter()
                        .any(|name| playlist::segment_nonempty(work_dir, name));
                    if any_output {
                        return Ok(());
                    }
                }
                return Err(StreamError::TranscoderExitedWithoutOutput);
            }

            if started.elapsed() >= self.config.timeout() {
                return Err(StreamError::ReadinessTimeout);
            }

            tokio::time::sleep(self.config.poll()).await;
        }
    }
}

fn read_playlist(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hls::playlist::{END_MARKER, PLAYLIST_FILE};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Sentinel(Arc<AtomicBool>);

    impl JobSentinel for Sentinel {
        fn is_running(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn running() -> (Sentinel, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(true));
        (Sentinel(flag.clone()), flag)
    }

    fn probe(fallback_ms: u64, timeout_ms: u64) -> ReadinessProbe {
        ReadinessProbe::new(ReadinessConfig {
            min_segments: 2,
            timeout_ms,
            poll_ms: 10,
            fallback_ms,
        })
    }

    fn write_playlist(dir: &Path, segments: usize, ended: bool) {
        let mut text = String::from("#EXTM3U\n");
        for i in 0..segments {
            text.push_str("#EXTINF:3.0,\n");
            text.push_str(&format!("segment_{:03}.ts\n", i));
            std::fs::write(dir.join(format!("segment_{:03}.ts", i)), b"ts").unwrap();
        }
        if ended {
            text.push_str(END_MARKER);
            text.push('\n');
        }
        std::fs::write(dir.join(PLAYLIST_FILE), text).unwrap();
    }

    #[tokio::test]
    async fn test_ready_with_two_segments() {
        let dir = TempDir::new().unwrap();
        write_playlist(dir.path(), 2, false);
        let (sentinel, _flag) = running();

        probe(2_000, 30_000)
            .wait_ready(dir.path(), &sentinel)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ready_with_single_segment_and_end_marker() {
        let dir = TempDir::new().unwrap();
        write_playlist(dir.path(), 1, true);
        let (sentinel, _flag) = running();

        probe(2_000, 30_000)
            .wait_ready(dir.path(), &sentinel)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_fallback_accepts_single_segment() {
        let dir = TempDir::new().unwrap();
        write_playlist(dir.path(), 1, false);
        let (sentinel, _flag) = running();

        let started = Instant::now();
        probe(50, 30_000)
            .wait_ready(dir.path(), &sentinel)
            .await
            .unwrap();
        assert!(started.elapsed() >= std::time::Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_job_exit_without_output_fails() {
        let dir = TempDir::new().unwrap();
        let flag = Arc::new(AtomicBool::new(false));
        let sentinel = Sentinel(flag);

        let err = probe(2_000, 30_000)
            .wait_ready(dir.path(), &sentinel)
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::TranscoderExitedWithoutOutput));
    }

    #[tokio::test]
    async fn test_job_exit_with_partial_output_is_served() {
        let dir = TempDir::new().unwrap();
        // one non-empty segment, no end marker, job already dead
        write_playlist(dir.path(), 1, false);
        let flag = Arc::new(AtomicBool::new(false));
        let sentinel = Sentinel(flag);

        probe(10_000, 30_000)
            .wait_ready(dir.path(), &sentinel)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_timeout() {
        let dir = TempDir::new().unwrap();
        let (sentinel, _flag) = running();

        let err = probe(2_000, 60)
            .wait_ready(dir.path(), &sentinel)
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::ReadinessTimeout));
    }

    #[tokio::test]
    async fn test_min_segments_requires_nonempty_last_segment() {
        let dir = TempDir::new().unwrap();
        write_playlist(dir.path(), 2, false);
        // truncate the most recent segment; probe must keep waiting
        std::fs::write(dir.path().join("segment_001.ts"), b"").unwrap();
        let (sentinel, _flag) = running();

        let err = probe(10_000, 60)
            .wait_ready(dir.path(), &sentinel)
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::ReadinessTimeout));
    }
}
