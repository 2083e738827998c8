use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the audio streaming server
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("item not found: {0}")]
    ItemNotFound(String),

    #[error("source file missing: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("transcoder unavailable: {0}")]
    TranscoderUnavailable(String),

    #[error("timed out waiting for transcoder output")]
    ReadinessTimeout,

    #[error("transcoder exited without producing output")]
    TranscoderExitedWithoutOutput,

    #[error("path escapes the segment cache root: {0}")]
    PathEscape(String),

    #[error("segment not found: {0}")]
    SegmentNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, StreamError>;
