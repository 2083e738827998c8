//! Configuration file support
//!
//! Loads server configuration from TOML files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{
    CacheConfig, JobConfig, ReadinessConfig, ServerConfig, TranscoderConfig,
};

/// Configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Server settings
    pub server: ServerSettings,
    /// Filesystem locations
    pub paths: PathSettings,
    /// Cache settings
    pub cache: Option<CacheSettings>,
    /// Transcoder settings
    pub transcoder: Option<TranscoderSettings>,
    /// Readiness settings
    pub readiness: Option<ReadinessSettings>,
    /// Job limit settings
    pub jobs: Option<JobSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Path prefix the HLS routes are mounted under
    pub path_base: Option<String>,
    /// Enable CORS
    pub cors_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Parent directory for server-owned state
    pub working_dir: Option<PathBuf>,
    /// Directory holding per-variant segment directories
    pub cache_root: Option<PathBuf>,
    /// Root of the music library
    pub library_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Maximum number of cached variants
    pub max_entries: Option<usize>,
    /// Time-to-live for a cached variant in minutes
    pub max_age_minutes: Option<u64>,
    /// Disable to re-spawn the transcoder on every request
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderSettings {
    /// Path to the transcoder executable
    pub path: Option<PathBuf>,
    /// Target HLS segment duration in seconds
    pub segment_seconds: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessSettings {
    pub min_segments: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub poll_ms: Option<u64>,
    pub fallback_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSettings {
    /// Maximum concurrent transcoder processes
    pub max_concurrent: Option<usize>,
    /// Hard deadline for a single transcode in minutes
    pub timeout_minutes: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ConfigFile = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Convert to ServerConfig, filling unspecified keys with defaults
    pub fn into_server_config(self) -> ServerConfig {
        let defaults = ServerConfig::default();
        let cache_defaults = CacheConfig::default();
        let transcoder_defaults = TranscoderConfig::default();
        let readiness_defaults = ReadinessConfig::default();
        let job_defaults = JobConfig::default();

        ServerConfig {
            host: self.server.host,
            port: self.server.port,
            path_base: self.server.path_base.unwrap_or_default(),
            cors_enabled: self.server.cors_enabled.unwrap_or(true),
            log_level: self
                .logging
                .map(|l| l.level)
                .unwrap_or(defaults.log_level),
            working_dir: self.paths.working_dir.unwrap_or(defaults.working_dir),
            cache_root: self.paths.cache_root,
            library_root: self.paths.library_root,
            cache: match self.cache {
                Some(c) => CacheConfig {
                    max_entries: c.max_entries.unwrap_or(cache_defaults.max_entries),
                    max_age_minutes: c.max_age_minutes.unwrap_or(cache_defaults.max_age_minutes),
                    enabled: c.enabled.unwrap_or(cache_defaults.enabled),
                },
                None => cache_defaults,
            },
            transcoder: match self.transcoder {
                Some(t) => TranscoderConfig {
                    path: t.path.unwrap_or(transcoder_defaults.path),
                    segment_seconds: t
                        .segment_seconds
                        .unwrap_or(transcoder_defaults.segment_seconds),
                },
                None => transcoder_defaults,
            },
            readiness: match self.readiness {
                Some(r) => ReadinessConfig {
                    min_segments: r.min_segments.unwrap_or(readiness_defaults.min_segments),
                    timeout_ms: r.timeout_ms.unwrap_or(readiness_defaults.timeout_ms),
                    poll_ms: r.poll_ms.unwrap_or(readiness_defaults.poll_ms),
                    fallback_ms: r.fallback_ms.unwrap_or(readiness_defaults.fallback_ms),
                },
                None => readiness_defaults,
            },
            jobs: match self.jobs {
                Some(j) => JobConfig {
                    max_concurrent: j.max_concurrent.unwrap_or(job_defaults.max_concurrent),
                    timeout_minutes: j.timeout_minutes.unwrap_or(job_defaults.timeout_minutes),
                },
                None => job_defaults,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample() -> ConfigFile {
        ConfigFile {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 4040,
                path_base: Some("/rest".to_string()),
                cors_enabled: Some(false),
            },
            paths: PathSettings {
                working_dir: Some(PathBuf::from("/srv/audio")),
                cache_root: None,
                library_root: PathBuf::from("/srv/music"),
            },
            cache: Some(CacheSettings {
                max_entries: Some(20),
                max_age_minutes: None,
                enabled: None,
            }),
            transcoder: None,
            readiness: None,
            jobs: Some(JobSettings {
                max_concurrent: Some(2),
                timeout_minutes: None,
            }),
            logging: Some(LoggingSettings {
                level: "debug".to_string(),
            }),
        }
    }

    #[test]
    fn test_config_file_roundtrip() {
        let config = sample();

        let mut temp_file = NamedTempFile::new().unwrap();
        let content = toml::to_string_pretty(&config).unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let loaded = ConfigFile::from_file(temp_file.path()).unwrap();
        assert_eq!(loaded.server.port, config.server.port);
        assert_eq!(loaded.paths.library_root, config.paths.library_root);
    }

    #[test]
    fn test_into_server_config() {
        let server_config = sample().into_server_config();

        assert_eq!(server_config.port, 4040);
        assert_eq!(server_config.path_base, "/rest");
        assert!(!server_config.cors_enabled);
        assert_eq!(server_config.log_level, "debug");
        assert_eq!(server_config.cache.max_entries, 20);
        // unspecified keys fall back to defaults
        assert_eq!(server_config.cache.max_age_minutes, 60);
        assert!(server_config.cache.enabled);
        assert_eq!(server_config.jobs.max_concurrent, 2);
        assert_eq!(server_config.jobs.timeout_minutes, 10);
        assert_eq!(server_config.readiness.min_segments, 2);
        assert_eq!(
            server_config.effective_cache_root(),
            PathBuf::from("/srv/audio/hls_segments")
        );
    }

    #[test]
    fn test_minimal_config_parses() {
        let toml_text = r#"
            [server]
            host = "0.0.0.0"
            port = 3000

            [paths]
            library_root = "/music"
        "#;
        let parsed: ConfigFile = toml::from_str(toml_text).unwrap();
        let config = parsed.into_server_config();
        assert_eq!(config.library_root, PathBuf::from("/music"));
        assert_eq!(config.transcoder.path, PathBuf::from("ffmpeg"));
    }
}
