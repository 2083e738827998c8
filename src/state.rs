//! Application state management
//!
//! The `AppState` shared across all request handlers: configuration,
//! the streaming facade, and the cache and job registries it
//! coordinates.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::hls::{CacheStore, JobRegistry, Streamer};
use crate::library::LibraryIndex;

/// Application state shared across all handlers
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,

    /// Segment cache store
    pub cache: Arc<CacheStore>,

    /// Transcode job registry
    pub registry: Arc<JobRegistry>,

    /// Streaming facade
    pub streamer: Streamer,
}

impl AppState {
    /// Create a new AppState with the given configuration and library
    /// index. Creates the cache root on disk.
    pub fn new(config: ServerConfig, library: Arc<dyn LibraryIndex>) -> Result<Self> {
        let cache = Arc::new(CacheStore::new(
            config.effective_cache_root(),
            config.cache.clone(),
        )?);
        let registry = Arc::new(JobRegistry::new(config.jobs.clone()));
        let streamer = Streamer::new(
            config.clone(),
            library,
            Arc::clone(&cache),
            Arc::clone(&registry),
        );

        Ok(Self {
            config,
            cache,
            registry,
            streamer,
        })
    }

    /// The root-relative segment route for this deployment.
    pub fn segment_base_path(&self) -> String {
        format!("{}/hls", self.config.path_base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::MemoryLibrary;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_app_state_creation() {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig {
            working_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let state = AppState::new(config, Arc::new(MemoryLibrary::new())).unwrap();

        assert!(state.cache.is_empty());
        assert!(state.registry.is_empty());
        assert!(dir.path().join("hls_segments").is_dir());
        assert_eq!(state.segment_base_path(), "/hls");
    }

    #[tokio::test]
    async fn test_segment_base_path_with_prefix() {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig {
            working_dir: dir.path().to_path_buf(),
            path_base: "/rest".to_string(),
            ..Default::default()
        };
        let state = AppState::new(config, Arc::new(MemoryLibrary::new())).unwrap();
        assert_eq!(state.segment_base_path(), "/rest/hls");
    }
}
