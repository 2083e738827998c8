//! HTTP request handlers
//!
//! Implements handlers for the HLS endpoints and debug surfaces.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::StreamError;
use crate::hls::streamer::MIME_HLS_PLAYLIST;
use crate::hls::Variant;
use crate::state::AppState;

/// HTTP error type
#[derive(Debug)]
pub enum HttpError {
    NotFound(String),
    Forbidden(String),
    InternalError(String),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            HttpError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            HttpError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            HttpError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, body).into_response()
    }
}

impl From<StreamError> for HttpError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::ItemNotFound(_)
            | StreamError::SourceMissing(_)
            | StreamError::SegmentNotFound(_) => HttpError::NotFound(err.to_string()),
            StreamError::PathEscape(_) => HttpError::Forbidden(err.to_string()),
            _ => HttpError::InternalError(err.to_string()),
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

/// Version endpoint
pub async fn version_check() -> &'static str {
    concat!("hls-audio-server v", env!("CARGO_PKG_VERSION"))
}

/// Query parameters for the playlist endpoint
#[derive(Debug, Deserialize)]
pub struct PlaylistQuery {
    pub id: String,
    #[serde(rename = "bitRate", default = "default_bit_rate")]
    pub bit_rate: u32,
    #[serde(rename = "audioTrack")]
    pub audio_track: Option<String>,
}

fn default_bit_rate() -> u32 {
    128
}

/// HLS playlist endpoint
/// GET {path_base}/hls.m3u8?id=...&bitRate=...&audioTrack=...
pub async fn hls_playlist(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PlaylistQuery>,
) -> Result<Response, HttpError> {
    let variant = Variant::new(query.bit_rate, query.audio_track);
    let base_path = state.segment_base_path();

    let text = state
        .streamer
        .generate_playlist(&query.id, &variant, &base_path)
        .await?;

    let mut headers = HeaderMap::new();
    headers.insert("Content-Type", HeaderValue::from_static(MIME_HLS_PLAYLIST));
    // live playlists change between requests; keep proxies out of the way
    headers.insert(
        "Cache-Control",
        HeaderValue::from_static("no-store, no-cache, must-revalidate"),
    );
    headers.insert("Pragma", HeaderValue::from_static("no-cache"));
    headers.insert("Expires", HeaderValue::from_static("0"));

    Ok((headers, text).into_response())
}

/// Query parameters for the segment endpoint
#[derive(Debug, Deserialize)]
pub struct SegmentQuery {
    pub key: String,
}

/// HLS segment endpoint
/// GET {path_base}/hls?key=<path under the cache root>
pub async fn hls_segment(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SegmentQuery>,
) -> Result<Response, HttpError> {
    let (path, mime) = state.streamer.serve_segment(&query.key)?;

    let data = match tokio::fs::read(&path).await {
        Ok(data) => Bytes::from(data),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            // evicted between resolution and read
            return Err(StreamError::SegmentNotFound(query.key).into());
        }
        Err(e) => return Err(StreamError::Io(e).into()),
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        "Content-Type",
        HeaderValue::from_str(mime)
            .map_err(|e| HttpError::InternalError(e.to_string()))?,
    );

    Ok((headers, data).into_response())
}

/// Debug endpoint - cache statistics
pub async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let stats = state.cache.stats();

    Json(serde_json::json!({
        "entry_count": stats.entry_count,
        "complete_count": stats.complete_count,
        "max_entries": stats.max_entries,
    }))
}

/// Debug endpoint - active transcode jobs
pub async fn active_jobs(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let jobs: Vec<_> = state
        .registry
        .snapshot()
        .into_iter()
        .map(|job| {
            serde_json::json!({
                "item_id": job.item_id,
                "variant": job.variant_key,
                "status": job.status.as_str(),
                "running_secs": job.running_secs,
            })
        })
        .collect();

    Json(serde_json::json!({
        "count": jobs.len(),
        "jobs": jobs,
    }))
}
