//! Background cache janitor
//!
//! Owns its ticker, sweeps the segment cache for expired variants once
//! a minute, and is joined on process teardown. After a sweep error
//! the loop backs off to ten minutes before resuming the normal
//! cadence, so a persistent filesystem problem cannot spin it hot.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::hls::CacheStore;

/// Sweep period
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Back-off after a failed sweep
const ERROR_BACKOFF: Duration = Duration::from_secs(600);

/// Handle onto the running janitor loop.
pub struct Janitor {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Janitor {
    /// Spawn the janitor loop for a cache store.
    pub fn spawn(cache: Arc<CacheStore>) -> Self {
        let (shutdown, mut signal) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = signal.changed() => break,
                }

                match cache.sweep_expired() {
                    Ok(0) => {}
                    Ok(removed) => {
                        tracing::info!("evicted {} expired variant(s)", removed);
                    }
                    Err(e) => {
                        tracing::error!("cache sweep failed: {}", e);
                        tokio::select! {
                            _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                            _ = signal.changed() => break,
                        }
                        interval.reset();
                    }
                }
            }
            tracing::debug!("janitor loop stopped");
        });

        Self { shutdown, task }
    }

    /// Signal the loop to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}
