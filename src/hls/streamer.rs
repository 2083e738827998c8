//! Streaming facade
//!
//! Entry points the HTTP layer calls: `generate_playlist` resolves an
//! item, coordinates the transcode, waits for first output, and
//! returns rewritten playlist text; `serve_segment` maps a client key
//! back to a file under the cache root, refusing anything that escapes
//! it.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::error::{Result, StreamError};
use crate::hls::cache::CacheStore;
use crate::hls::job::{JobStatus, TranscodeArgs};
use crate::hls::playlist;
use crate::hls::readiness::ReadinessProbe;
use crate::hls::registry::JobRegistry;
use crate::hls::variant::{cache_key, Variant};
use crate::library::{LibraryIndex, MediaSource};

/// MIME type for MPEG-TS segments
pub const MIME_MPEGTS: &str = "video/MP2T";

/// MIME type for HLS playlists
pub const MIME_HLS_PLAYLIST: &str = "application/vnd.apple.mpegurl";

/// On-demand HLS streaming service.
pub struct Streamer {
    config: ServerConfig,
    library: Arc<dyn LibraryIndex>,
    cache: Arc<CacheStore>,
    registry: Arc<JobRegistry>,
    probe: ReadinessProbe,
}

impl Streamer {
    pub fn new(
        config: ServerConfig,
        library: Arc<dyn LibraryIndex>,
        cache: Arc<CacheStore>,
        registry: Arc<JobRegistry>,
    ) -> Self {
        let probe = ReadinessProbe::new(config.readiness.clone());
        Self {
            config,
            library,
            cache,
            registry,
            probe,
        }
    }

    /// Produce playlist text for an item + variant, spawning or reusing
    /// a transcode as needed.
    ///
    /// `base_path` is the root-relative segment route for this request
    /// (e.g. `/hls` or `/rest/hls`); rewriting happens in memory on
    /// every response so one cached playlist serves any base path.
    pub async fn generate_playlist(
        &self,
        item_id: &str,
        variant: &Variant,
        base_path: &str,
    ) -> Result<String> {
        let key = cache_key(item_id, variant);
        let work_dir = self.cache.work_dir_for(&key);

        if let Some(entry) = self.cache.get(&key) {
            if entry.complete {
                tracing::debug!(key = %key, "serving completed variant from cache");
                let text =
                    tokio::fs::read_to_string(entry.work_dir.join(playlist::PLAYLIST_FILE)).await?;
                return Ok(playlist::rewrite_segment_urls(&text, base_path, &key));
            }
        }

        let source = self
            .library
            .lookup(item_id)
            .ok_or_else(|| StreamError::ItemNotFound(item_id.to_string()))?;
        if !source.absolute_path.is_file() {
            return Err(StreamError::SourceMissing(source.absolute_path));
        }

        let argv = build_transcode_args(
            &self.config.transcoder.effective_path(),
            &source,
            variant,
            &work_dir,
            self.config.transcoder.segment_seconds,
        );
        let handle = self
            .registry
            .ensure_running(item_id, variant, &work_dir, argv)?;

        if let Err(e) = self.probe.wait_ready(&handle.work_dir, handle.as_ref()).await {
            if matches!(e, StreamError::ReadinessTimeout) {
                handle.cancel();
            }
            // the work dir is on disk but was never registered with the
            // cache, so eviction alone would leak it
            self.cache.discard(&key);
            return Err(e);
        }

        let text =
            tokio::fs::read_to_string(handle.work_dir.join(playlist::PLAYLIST_FILE)).await?;
        let rewritten = playlist::rewrite_segment_urls(&text, base_path, &key);

        self.cache.put(&key, handle.work_dir.clone());

        // Completion continuation: once the transcoder exits cleanly the
        // entry is flagged complete; the on-disk check on later lookups
        // remains the source of truth.
        let cache = Arc::clone(&self.cache);
        let continuation_key = key.clone();
        tokio::spawn(async move {
            if handle.wait_terminal().await == JobStatus::Completed {
                cache.mark_complete(&continuation_key);
            }
        });

        Ok(rewritten)
    }

    /// Resolve a client-supplied segment key to a file under the cache
    /// root plus its MIME type.
    pub fn serve_segment(&self, key: &str) -> Result<(PathBuf, &'static str)> {
        let relative = Path::new(key.trim_start_matches('/'));
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                Component::CurDir => {}
                _ => return Err(StreamError::PathEscape(key.to_string())),
            }
        }

        let candidate = self.cache.root().join(relative);
        let canonical = match candidate.canonicalize() {
            Ok(path) => path,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StreamError::SegmentNotFound(key.to_string()));
            }
            Err(e) => return Err(StreamError::Io(e)),
        };
        if !canonical.starts_with(self.cache.canonical_root()) {
            return Err(StreamError::PathEscape(key.to_string()));
        }
        if !canonical.is_file() {
            return Err(StreamError::SegmentNotFound(key.to_string()));
        }

        let mime = mime_for(&canonical);
        Ok((canonical, mime))
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ts") => MIME_MPEGTS,
        Some("m3u8") => MIME_HLS_PLAYLIST,
        _ => "application/octet-stream",
    }
}

/// Build the transcoder invocation for a source + variant.
///
/// Cue tracks pre-seek with `-ss` before the input and bound the read
/// with `-t` when the slice length is known. Output is audio-only AAC
/// HLS with 3-second segments, an unbounded list, and zero-padded
/// segment names relative to the work directory.
pub fn build_transcode_args(
    transcoder: &Path,
    source: &MediaSource,
    variant: &Variant,
    work_dir: &Path,
    segment_seconds: u32,
) -> TranscodeArgs {
    let mut args: Vec<OsString> = vec!["-v".into(), "error".into(), "-y".into()];
    if let Some(cue) = &source.cue {
        args.push("-ss".into());
        args.push(format!("{}", cue.start_seconds).into());
        if let Some(duration) = cue.duration_seconds {
            args.push("-t".into());
            args.push(format!("{}", duration).into());
        }
    }
    args.push("-i".into());
    args.push(source.absolute_path.as_os_str().to_os_string());
    args.extend(["-vn".into(), "-c:a".into(), "aac".into()]);
    if variant.bitrate_kbps > 0 {
        args.push("-b:a".into());
        args.push(format!("{}k", variant.bitrate_kbps).into());
    }
    args.extend([
        "-f".into(),
        "hls".into(),
        "-hls_time".into(),
        segment_seconds.to_string().into(),
        "-hls_list_size".into(),
        "0".into(),
        "-hls_segment_filename".into(),
        "segment_%03d.ts".into(),
        "-start_number".into(),
        "0".into(),
        playlist::PLAYLIST_FILE.into(),
    ]);

    TranscodeArgs {
        program: transcoder.to_path_buf(),
        args,
        current_dir: work_dir.to_path_buf(),
    }
}
