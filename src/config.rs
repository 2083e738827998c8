//! Server configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Segment cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached variants (FIFO cap)
    pub max_entries: usize,

    /// Time-to-live for a cached variant in minutes
    pub max_age_minutes: u64,

    /// If false, every playlist request re-spawns the transcoder
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            max_age_minutes: 60,
            enabled: true,
        }
    }
}

impl CacheConfig {
    /// Get the per-entry TTL as a Duration
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_minutes * 60)
    }
}

/// External transcoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    /// Path to the transcoder executable
    pub path: PathBuf,

    /// Target HLS segment duration in seconds
    pub segment_seconds: u32,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("ffmpeg"),
            segment_seconds: 3,
        }
    }
}

impl TranscoderConfig {
    /// Resolve the executable path; the TRANSCODER_PATH environment
    /// variable overrides the configured value.
    pub fn effective_path(&self) -> PathBuf {
        std::env::var_os("TRANSCODER_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| self.path.clone())
    }
}

/// First-response readiness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessConfig {
    /// Segments required before the playlist is served
    pub min_segments: usize,

    /// Give up waiting for transcoder output after this long
    pub timeout_ms: u64,

    /// Interval between playlist inspections
    pub poll_ms: u64,

    /// Accept a single-segment playlist after this long
    pub fallback_ms: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            min_segments: 2,
            timeout_ms: 30_000,
            poll_ms: 200,
            fallback_ms: 2_000,
        }
    }
}

impl ReadinessConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn fallback(&self) -> Duration {
        Duration::from_millis(self.fallback_ms)
    }
}

/// Transcode job limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Maximum concurrent transcoder processes
    pub max_concurrent: usize,

    /// Hard deadline for a single transcode in minutes
    pub timeout_minutes: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            timeout_minutes: 10,
        }
    }
}

impl JobConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes * 60)
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Path prefix the HLS routes are mounted under ("" for root)
    pub path_base: String,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Parent directory for server-owned state
    pub working_dir: PathBuf,

    /// Directory holding per-variant segment directories.
    /// Defaults to `<working_dir>/hls_segments`.
    pub cache_root: Option<PathBuf>,

    /// Root of the music library served by the filesystem index
    pub library_root: PathBuf,

    /// Segment cache configuration
    pub cache: CacheConfig,

    /// Transcoder configuration
    pub transcoder: TranscoderConfig,

    /// Readiness configuration
    pub readiness: ReadinessConfig,

    /// Job limits
    pub jobs: JobConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            path_base: String::new(),
            cors_enabled: true,
            log_level: "info".to_string(),
            working_dir: PathBuf::from("."),
            cache_root: None,
            library_root: PathBuf::from("music"),
            cache: CacheConfig::default(),
            transcoder: TranscoderConfig::default(),
            readiness: ReadinessConfig::default(),
            jobs: JobConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolve the segment cache root directory
    pub fn effective_cache_root(&self) -> PathBuf {
        self.cache_root
            .clone()
            .unwrap_or_else(|| self.working_dir.join("hls_segments"))
    }
}
