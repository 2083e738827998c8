//! Transcode variants and cache keys

use std::fmt;

/// A bitrate + audio-track selection distinguishing different
/// transcodes of the same source item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variant {
    /// Target bitrate in kbit/s; 0 means "codec default"
    pub bitrate_kbps: u32,
    /// Passthrough audio-track tag, when the client sent one
    pub audio_track: Option<String>,
}

impl Variant {
    pub fn new(bitrate_kbps: u32, audio_track: Option<String>) -> Self {
        Self {
            bitrate_kbps,
            audio_track: audio_track.filter(|t| !t.is_empty()),
        }
    }

    /// The `<bitrate>_<track>` key naming this variant's work directory.
    pub fn variant_key(&self) -> String {
        let track = self.audio_track.as_deref().unwrap_or("default");
        match self.bitrate_kbps {
            0 => format!("default_{}", track),
            kbps => format!("{}_{}", kbps, track),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.variant_key())
    }
}

/// Canonical cache key for an item + variant pair.
///
/// Doubles as the work directory subpath under the cache root, so
/// identifiers containing forward slashes nest directories.
pub fn cache_key(item_id: &str, variant: &Variant) -> String {
    format!("{}/{}", item_id, variant.variant_key())
}
