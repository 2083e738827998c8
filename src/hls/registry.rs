//! Per-item transcode coordination
//!
//! Serializes and bounds concurrent transcodes: at most one active job
//! per item, variant-mismatch preemption, and a global cap where the
//! newest demand always wins and the oldest running job is cancelled.
//! The registry lock is held only across map mutation and the spawn
//! call, never while waiting on I/O.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::JobConfig;
use crate::error::Result;
use crate::hls::job::{JobStatus, Termination, TranscodeArgs, TranscoderJob};
use crate::hls::readiness::JobSentinel;
use crate::hls::variant::Variant;

/// Handle onto one transcode job, live from spawn until the registry
/// drops it at terminal status.
pub struct JobHandle {
    pub item_id: String,
    pub variant: Variant,
    pub work_dir: PathBuf,
    started_at: Instant,
    cancel: CancellationToken,
    status: watch::Receiver<JobStatus>,
}

impl JobHandle {
    pub fn status(&self) -> JobStatus {
        *self.status.borrow()
    }

    /// Request termination of the underlying process.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Wait until the job reaches a terminal status.
    pub async fn wait_terminal(&self) -> JobStatus {
        let mut status = self.status.clone();
        loop {
            let current = *status.borrow();
            if !current.is_active() {
                return current;
            }
            if status.changed().await.is_err() {
                return *status.borrow();
            }
        }
    }
}

impl JobSentinel for JobHandle {
    fn is_running(&self) -> bool {
        self.status().is_active()
    }
}

/// Snapshot of one registered job, for diagnostics.
#[derive(Debug, Clone)]
pub struct JobInfo {
    pub item_id: String,
    pub variant_key: String,
    pub status: JobStatus,
    pub running_secs: u64,
}

/// Registry of active transcode jobs, keyed by item.
pub struct JobRegistry {
    jobs: Arc<Mutex<HashMap<String, Arc<JobHandle>>>>,
    config: JobConfig,
}

impl JobRegistry {
    pub fn new(config: JobConfig) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    /// Ensure a job for this item + variant is running.
    ///
    /// An active job with the same variant is reused. An active job
    /// with a different variant is cancelled first; its work directory
    /// becomes eligible for cache eviction. When the registry is at
    /// capacity the job with the oldest start time is cancelled to
    /// admit the new one. On the start path the work directory is
    /// wiped and recreated before the process spawns, so a fresh job
    /// never appends to stale output.
    pub fn ensure_running(
        &self,
        item_id: &str,
        variant: &Variant,
        work_dir: &Path,
        argv: TranscodeArgs,
    ) -> Result<Arc<JobHandle>> {
        let mut jobs = self.jobs.lock();

        if let Some(existing) = jobs.get(item_id) {
            if existing.variant == *variant && existing.status().is_active() {
                return Ok(Arc::clone(existing));
            }
            if existing.variant != *variant {
                tracing::info!(
                    item_id,
                    old_variant = %existing.variant,
                    new_variant = %variant,
                    "preempting transcode for variant change"
                );
            }
            existing.cancel();
            jobs.remove(item_id);
        }

        while jobs.len() >= self.config.max_concurrent {
            let victim = jobs
                .iter()
                .min_by_key(|(_, handle)| handle.started_at)
                .map(|(key, _)| key.clone());
            match victim {
                Some(key) => {
                    if let Some(handle) = jobs.remove(&key) {
                        tracing::warn!(
                            victim = %key,
                            "transcode capacity reached, cancelling oldest job"
                        );
                        handle.cancel();
                    }
                }
                None => break,
            }
        }

        if work_dir.exists() {
            std::fs::remove_dir_all(work_dir)?;
        }
        std::fs::create_dir_all(work_dir)?;

        let cancel = CancellationToken::new();
        let (status_tx, status_rx) = watch::channel(JobStatus::Spawning);
        let job = TranscoderJob::spawn(&argv)?;

        let handle = Arc::new(JobHandle {
            item_id: item_id.to_string(),
            variant: variant.clone(),
            work_dir: work_dir.to_path_buf(),
            started_at: Instant::now(),
            cancel: cancel.clone(),
            status: status_rx,
        });

        let jobs_map = Arc::clone(&self.jobs);
        let watcher_handle = Arc::clone(&handle);
        let deadline = self.config.timeout();
        tokio::spawn(async move {
            let _ = status_tx.send(JobStatus::Running);
            let exit = job.wait(&cancel, deadline).await;

            let status = match exit.termination {
                Termination::Cancelled => JobStatus::Cancelled,
                Termination::TimedOut => {
                    tracing::error!(
                        item_id = %watcher_handle.item_id,
                        "transcode exceeded its deadline and was killed"
                    );
                    JobStatus::TimedOut
                }
                Termination::Exited if exit.success() => JobStatus::Completed,
                Termination::Exited => {
                    tracing::error!(
                        item_id = %watcher_handle.item_id,
                        exit_code = ?exit.exit_code,
                        stderr = %exit.stderr_tail,
                        "transcoder exited with an error"
                    );
                    JobStatus::Failed
                }
            };
            let _ = status_tx.send(status);

            // Drop the registration, unless the item was already
            // re-registered with a newer job.
            let mut jobs = jobs_map.lock();
            if let Some(current) = jobs.get(&watcher_handle.item_id) {
                if Arc::ptr_eq(current, &watcher_handle) {
                    jobs.remove(&watcher_handle.item_id);
                }
            }
        });

        jobs.insert(item_id.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Snapshot of registered jobs for the debug endpoint.
    pub fn snapshot(&self) -> Vec<JobInfo> {
        self.jobs
            .lock()
            .values()
            .map(|handle| JobInfo {
                item_id: handle.item_id.clone(),
                variant_key: handle.variant.variant_key(),
                status: handle.status(),
                running_secs: handle.started_at.elapsed().as_secs(),
            })
            .collect()
    }
}
