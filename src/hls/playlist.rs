//! Playlist text inspection and URL rewriting
//!
//! The transcoder writes a live playlist referencing bare segment
//! filenames. This module owns everything the server needs to read out
//! of that file (segment references, end-of-stream detection, the
//! on-disk completeness check) and the in-memory rewrite that turns
//! bare filenames into client-resolvable URLs.

use std::path::Path;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Playlist filename inside a work directory
pub const PLAYLIST_FILE: &str = "playlist.m3u8";

/// Prefix the transcoder uses for segment filenames
pub const SEGMENT_PREFIX: &str = "segment_";

/// HLS playlist header magic
pub const HEADER_MAGIC: &str = "#EXTM3U";

/// End-of-stream marker appended on clean transcoder completion
pub const END_MARKER: &str = "#EXT-X-ENDLIST";

/// RFC 3986: everything except unreserved characters is escaped, so
/// identifiers containing `#`, `?`, `+`, spaces or slashes round-trip
/// through the `key` query parameter unchanged.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Ordered segment filenames referenced by the playlist text.
pub fn segment_refs(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && line.ends_with(".ts"))
        .collect()
}

/// Whether the playlist carries the end-of-stream marker.
pub fn has_end_marker(text: &str) -> bool {
    text.lines().any(|line| line.trim() == END_MARKER)
}

/// On-disk completeness check for a work directory: the playlist holds
/// both the header magic and the end marker, and every referenced
/// segment exists in the directory with non-zero size.
pub fn is_complete(work_dir: &Path) -> bool {
    let text = match std::fs::read_to_string(work_dir.join(PLAYLIST_FILE)) {
        Ok(text) => text,
        Err(_) => return false,
    };
    if !text.contains(HEADER_MAGIC) || !has_end_marker(&text) {
        return false;
    }
    let refs = segment_refs(&text);
    if refs.is_empty() {
        return false;
    }
    refs.iter().all(|name| segment_nonempty(work_dir, name))
}

/// Whether a referenced segment file exists with size > 0.
pub fn segment_nonempty(work_dir: &Path, name: &str) -> bool {
    std::fs::metadata(work_dir.join(name))
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Percent-encode a cache key (plus trailing slash) for the `key`
/// query parameter.
pub fn encode_key(cache_key: &str) -> String {
    utf8_percent_encode(&format!("{}/", cache_key), QUERY_VALUE).to_string()
}

/// Rewrite bare segment references into root-relative URLs.
///
/// Every occurrence of the literal `segment_` prefix becomes
/// `<base_path>?key=<encoded cache_key/>segment_`, leaving the rest of
/// the line (sequence number, extension) intact. The on-disk playlist
/// is never modified; the same cached file can be served under any
/// base path.
pub fn rewrite_segment_urls(text: &str, base_path: &str, cache_key: &str) -> String {
    let prefix = format!("{}?key={}{}", base_path, encode_key(cache_key), SEGMENT_PREFIX);
    text.replace(SEGMENT_PREFIX, &prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use percent_encoding::percent_decode_str;
    use tempfile::TempDir;

    const LIVE_PLAYLIST: &str = "#EXTM3U\n\
        #EXT-X-VERSION:3\n\
        #EXT-X-TARGETDURATION:3\n\
        #EXT-X-MEDIA-SEQUENCE:0\n\
        #EXTINF:3.000000,\n\
        segment_000.ts\n\
        #EXTINF:3.000000,\n\
        segment_001.ts\n";

    fn ended(playlist: &str) -> String {
        format!("{}{}\n", playlist, END_MARKER)
    }

    #[test]
    fn test_segment_refs() {
        assert_eq!(
            segment_refs(LIVE_PLAYLIST),
            vec!["segment_000.ts", "segment_001.ts"]
        );
        assert!(segment_refs("#EXTM3U\n").is_empty());
    }

    #[test]
    fn test_has_end_marker() {
        assert!(!has_end_marker(LIVE_PLAYLIST));
        assert!(has_end_marker(&ended(LIVE_PLAYLIST)));
    }

    #[test]
    fn test_is_complete() {
        let dir = TempDir::new().unwrap();
        let work_dir = dir.path();

        // no playlist at all
        assert!(!is_complete(work_dir));

        // live playlist without end marker
        std::fs::write(work_dir.join(PLAYLIST_FILE), LIVE_PLAYLIST).unwrap();
        std::fs::write(work_dir.join("segment_000.ts"), b"ts").unwrap();
        std::fs::write(work_dir.join("segment_001.ts"), b"ts").unwrap();
        assert!(!is_complete(work_dir));

        // ended playlist with all segments present
        std::fs::write(work_dir.join(PLAYLIST_FILE), ended(LIVE_PLAYLIST)).unwrap();
        assert!(is_complete(work_dir));

        // a referenced segment is empty
        std::fs::write(work_dir.join("segment_001.ts"), b"").unwrap();
        assert!(!is_complete(work_dir));

        // a referenced segment is missing
        std::fs::remove_file(work_dir.join("segment_001.ts")).unwrap();
        assert!(!is_complete(work_dir));
    }

    #[test]
    fn test_rewrite_segment_urls() {
        let rewritten =
            rewrite_segment_urls(LIVE_PLAYLIST, "/hls", "/a/b.flac/128_default");
        assert!(rewritten
            .contains("/hls?key=%2Fa%2Fb.flac%2F128_default%2Fsegment_000.ts"));
        assert!(rewritten
            .contains("/hls?key=%2Fa%2Fb.flac%2F128_default%2Fsegment_001.ts"));
        // every bare reference was rewritten
        for line in rewritten.lines() {
            if line.ends_with(".ts") {
                assert!(line.starts_with("/hls?key="));
            }
        }
    }

    #[test]
    fn test_rewrite_under_path_base() {
        let rewritten = rewrite_segment_urls("segment_000.ts\n", "/rest/hls", "/x/1.flac/128_default");
        assert_eq!(
            rewritten,
            "/rest/hls?key=%2Fx%2F1.flac%2F128_default%2Fsegment_000.ts\n"
        );
    }

    #[test]
    fn test_encode_key_roundtrips_awkward_identifiers() {
        let key = "/Weird #1? + more/Album/01 track.flac/128_default";
        let encoded = encode_key(key);
        assert!(!encoded.contains('#'));
        assert!(!encoded.contains('?'));
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains(' '));

        let decoded = percent_decode_str(&encoded).decode_utf8().unwrap();
        assert_eq!(decoded, format!("{}/", key));
    }
}
