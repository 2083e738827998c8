//! Segment cache store
//!
//! Maps cache keys to on-disk work directories holding a playlist and
//! its segments, with an in-memory FIFO registry bounding entry count
//! and age. Eviction order is insertion order, not LRU: a completed
//! transcode is as useful later as now, and first-in wins protects
//! long-lived playlists from a burst of novel items. `last_accessed_at`
//! is recorded but does not participate in eviction.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

use crate::config::CacheConfig;
use crate::error::Result;
use crate::hls::playlist;

/// In-memory record of one cached variant.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub work_dir: PathBuf,
    pub created_at: SystemTime,
    pub last_accessed_at: SystemTime,
    /// Set once the on-disk playlist has passed the completeness check
    pub complete: bool,
}

impl CacheEntry {
    fn new(key: String, work_dir: PathBuf) -> Self {
        let now = SystemTime::now();
        Self {
            key,
            work_dir,
            created_at: now,
            last_accessed_at: now,
            complete: false,
        }
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed().unwrap_or_default()
    }
}

#[derive(Default)]
struct Registry {
    entries: HashMap<String, CacheEntry>,
    /// Insertion order; front is the eviction candidate
    order: VecDeque<String>,
}

impl Registry {
    fn detach(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        Some(entry)
    }
}

/// Cache statistics
#[derive(Debug)]
pub struct CacheStats {
    pub entry_count: usize,
    pub complete_count: usize,
    pub max_entries: usize,
}

/// Durable directory layout plus in-memory FIFO registry.
pub struct CacheStore {
    registry: Mutex<Registry>,
    root: PathBuf,
    canonical_root: PathBuf,
    config: CacheConfig,
}

impl CacheStore {
    /// Create the store, ensuring the cache root exists on disk.
    pub fn new(root: PathBuf, config: CacheConfig) -> Result<Self> {
        std::fs::create_dir_all(&root)?;
        let canonical_root = root.canonicalize()?;
        Ok(Self {
            registry: Mutex::new(Registry::default()),
            root,
            canonical_root,
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The canonicalized cache root, the ancestor every served segment
    /// path must resolve under.
    pub fn canonical_root(&self) -> &Path {
        &self.canonical_root
    }

    /// The work directory a cache key maps to.
    pub fn work_dir_for(&self, key: &str) -> PathBuf {
        self.root.join(key.trim_start_matches('/'))
    }

    /// Look up an entry.
    ///
    /// Returns `None` when the key is unknown, the work directory has
    /// vanished, or the entry outlived its TTL (the latter two evict).
    /// An entry whose playlist passes the on-disk completeness check is
    /// returned (and upgraded to) complete; an entry that claims
    /// completeness but fails the check is evicted, which makes the
    /// cache self-healing after a crash left a partial directory
    /// behind. A pending entry is returned as-is: its transcoder may
    /// still be running, so `get` never deletes it.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        if !self.config.enabled {
            return None;
        }
        let snapshot = self.registry.lock().entries.get(key).cloned()?;

        if !snapshot.work_dir.is_dir() {
            self.registry.lock().detach(key);
            return None;
        }
        if snapshot.age() > self.config.max_age() {
            self.evict(key);
            return None;
        }

        // Disk inspection happens outside the registry lock.
        let on_disk_complete = playlist::is_complete(&snapshot.work_dir);
        if snapshot.complete && !on_disk_complete {
            tracing::warn!(key, "cached variant no longer complete on disk, evicting");
            self.evict(key);
            return None;
        }

        let mut registry = self.registry.lock();
        let entry = registry.entries.get_mut(key)?;
        if on_disk_complete {
            entry.complete = true;
        }
        entry.last_accessed_at = SystemTime::now();
        Some(entry.clone())
    }

    /// Record a (pending) entry for a key.
    ///
    /// A previous entry under the same key loses its FIFO position; its
    /// work directory is deleted only if it differs from the new one.
    /// When the registry exceeds the cap, the head of the queue is
    /// evicted and its directory deleted asynchronously.
    pub fn put(&self, key: &str, work_dir: PathBuf) {
        if !self.config.enabled {
            return;
        }
        let mut registry = self.registry.lock();
        if let Some(old) = registry.detach(key) {
            if old.work_dir != work_dir {
                delete_dir_async(old.work_dir);
            }
        }
        registry
            .entries
            .insert(key.to_string(), CacheEntry::new(key.to_string(), work_dir));
        registry.order.push_back(key.to_string());

        while registry.entries.len() > self.config.max_entries {
            let victim = match registry.order.pop_front() {
                Some(victim) => victim,
                None => break,
            };
            if let Some(entry) = registry.entries.remove(&victim) {
                tracing::debug!(key = %victim, "cache full, evicting oldest variant");
                delete_dir_async(entry.work_dir);
            }
        }
    }

    /// Flag an entry complete, provided the on-disk playlist actually
    /// passes the completeness check.
    pub fn mark_complete(&self, key: &str) {
        if !self.config.enabled {
            return;
        }
        let work_dir = match self.registry.lock().entries.get(key) {
            Some(entry) => entry.work_dir.clone(),
            None => return,
        };
        if playlist::is_complete(&work_dir) {
            if let Some(entry) = self.registry.lock().entries.get_mut(key) {
                entry.complete = true;
            }
        }
    }

    /// Explicit eviction: drop the entry and delete its directory.
    pub fn remove(&self, key: &str) {
        self.evict(key);
    }

    /// Evict the key and delete its work directory, registered or not.
    ///
    /// A transcode that fails before its playlist becomes servable has
    /// a work directory on disk but no registry entry yet; plain
    /// `remove` cannot find it.
    pub fn discard(&self, key: &str) {
        let detached = self.registry.lock().detach(key);
        let work_dir = match detached {
            Some(entry) => entry.work_dir,
            None => self.work_dir_for(key),
        };
        delete_dir_async(work_dir);
    }

    fn evict(&self, key: &str) {
        let detached = self.registry.lock().detach(key);
        if let Some(entry) = detached {
            delete_dir_async(entry.work_dir);
        }
    }

    /// Evict entries past their TTL or whose directory vanished.
    /// Returns the number of evicted entries.
    pub fn sweep_expired(&self) -> Result<usize> {
        // An unreachable root (unmounted volume, stripped permissions)
        // makes every work dir look missing; failing here keeps a bad
        // root from mass-evicting the registry.
        std::fs::read_dir(&self.root)?;

        let max_age = self.config.max_age();
        let victims: Vec<String> = {
            let registry = self.registry.lock();
            registry
                .entries
                .values()
                .filter(|e| e.age() > max_age || !e.work_dir.is_dir())
                .map(|e| e.key.clone())
                .collect()
        };
        for key in &victims {
            tracing::debug!(key = %key, "sweeping expired variant");
            self.evict(key);
        }
        Ok(victims.len())
    }

    pub fn stats(&self) -> CacheStats {
        let registry = self.registry.lock();
        CacheStats {
            entry_count: registry.entries.len(),
            complete_count: registry.entries.values().filter(|e| e.complete).count(),
            max_entries: self.config.max_entries,
        }
    }

    pub fn len(&self) -> usize {
        self.registry.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.lock().entries.is_empty()
    }

    /// Keys currently registered, oldest first.
    pub fn keys(&self) -> Vec<String> {
        self.registry.lock().order.iter().cloned().collect()
    }
}

/// Best-effort background directory deletion: failures are logged and
/// never block the registry.
fn delete_dir_async(dir: PathBuf) {
    tokio::spawn(async move {
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!("failed to delete work dir {}: {}", dir.display(), e);
            }
        }
    });
}
