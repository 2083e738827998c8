//! Axum router configuration

use axum::{
    http::{header, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

use super::handlers::{
    active_jobs, cache_stats, health_check, hls_playlist, hls_segment, version_check,
};

/// Create the Axum router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS, Method::HEAD])
        .allow_headers([header::ACCEPT, header::RANGE, header::ORIGIN])
        .max_age(Duration::from_secs(3600));

    let hls = Router::new()
        .route("/hls.m3u8", get(hls_playlist))
        .route("/hls", get(hls_segment));

    let router = Router::new()
        // Health and version endpoints
        .route("/health", get(health_check))
        .route("/version", get(version_check))
        // Debug endpoints
        .route("/debug/cache", get(cache_stats))
        .route("/debug/jobs", get(active_jobs));

    // Mount the streaming routes under the configured path prefix
    let router = if state.config.path_base.is_empty() {
        router.merge(hls)
    } else {
        router.nest(&state.config.path_base, hls)
    };

    let router = router.layer(TraceLayer::new_for_http());
    let router = if state.config.cors_enabled {
        router.layer(cors)
    } else {
        router
    };

    router.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::library::{MediaSource, MemoryLibrary};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;
    use tower::util::ServiceExt; // for oneshot

    const FAKE_TRANSCODER: &str = "#!/bin/sh\n\
        printf 'tsdata' > segment_000.ts\n\
        printf 'tsdata' > segment_001.ts\n\
        {\n\
        echo '#EXTM3U'\n\
        echo '#EXTINF:3.000000,'\n\
        echo 'segment_000.ts'\n\
        echo '#EXTINF:3.000000,'\n\
        echo 'segment_001.ts'\n\
        echo '#EXT-X-ENDLIST'\n\
        } > playlist.m3u8\n";

    fn test_state(dir: &TempDir) -> Arc<AppState> {
        let script_path = dir.path().join("fake-transcoder.sh");
        std::fs::write(&script_path, FAKE_TRANSCODER).unwrap();
        std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let source_path = dir.path().join("b.flac");
        std::fs::write(&source_path, b"flac").unwrap();

        let library = Arc::new(MemoryLibrary::new());
        library.insert("/a/b.flac", MediaSource::file(source_path));

        let config = ServerConfig {
            working_dir: dir.path().to_path_buf(),
            transcoder: crate::config::TranscoderConfig {
                path: script_path,
                segment_seconds: 3,
            },
            ..Default::default()
        };

        Arc::new(AppState::new(config, library).unwrap())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = TempDir::new().unwrap();
        let app = create_router(test_state(&dir));

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_playlist_endpoint() {
        let dir = TempDir::new().unwrap();
        let app = create_router(test_state(&dir));

        let response = app
            .oneshot(
                Request::get("/hls.m3u8?id=/a/b.flac&bitRate=128")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("Content-Type").unwrap(),
            "application/vnd.apple.mpegurl"
        );
        assert_eq!(
            response.headers().get("Cache-Control").unwrap(),
            "no-store, no-cache, must-revalidate"
        );

        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("/hls?key=%2Fa%2Fb.flac%2F128_default%2Fsegment_000.ts"));
    }

    #[tokio::test]
    async fn test_playlist_unknown_item_is_404() {
        let dir = TempDir::new().unwrap();
        let app = create_router(test_state(&dir));

        let response = app
            .oneshot(
                Request::get("/hls.m3u8?id=/missing.flac")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_segment_path_escape_is_403() {
        let dir = TempDir::new().unwrap();
        let app = create_router(test_state(&dir));

        let response = app
            .oneshot(
                Request::get("/hls?key=../../etc/passwd")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_segment_missing_is_404() {
        let dir = TempDir::new().unwrap();
        let app = create_router(test_state(&dir));

        let response = app
            .oneshot(
                Request::get("/hls?key=/a/b.flac/128_default/segment_042.ts")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_playlist_then_segment_roundtrip() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);

        let response = create_router(state.clone())
            .oneshot(
                Request::get("/hls.m3u8?id=/a/b.flac&bitRate=128")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = create_router(state)
            .oneshot(
                Request::get("/hls?key=%2Fa%2Fb.flac%2F128_default%2Fsegment_000.ts")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("Content-Type").unwrap(),
            "video/MP2T"
        );
    }

    #[tokio::test]
    async fn test_debug_endpoints() {
        let dir = TempDir::new().unwrap();
        let app = create_router(test_state(&dir));

        let response = app
            .clone()
            .oneshot(Request::get("/debug/cache").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::get("/debug/jobs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
