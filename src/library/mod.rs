//! Library index
//!
//! Maps opaque item identifiers to playable media sources. The streaming
//! core only depends on the `LibraryIndex` trait; the backing store can
//! be the filesystem, a database, or an in-memory map.

mod fs;
mod memory;

pub use fs::FsLibrary;
pub use memory::MemoryLibrary;

use std::path::PathBuf;

/// A time slice of a larger physical audio file.
#[derive(Debug, Clone, PartialEq)]
pub struct CueRange {
    /// Offset of the track within the physical file, in seconds
    pub start_seconds: f64,
    /// Track length in seconds, when known
    pub duration_seconds: Option<f64>,
}

/// A playable media source resolved from an item identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSource {
    /// Absolute path of the physical audio file
    pub absolute_path: PathBuf,
    /// Set when the item is a virtual cue track
    pub cue: Option<CueRange>,
}

impl MediaSource {
    /// A source covering a whole physical file
    pub fn file(absolute_path: PathBuf) -> Self {
        Self {
            absolute_path,
            cue: None,
        }
    }

    /// A source covering a slice of a physical file
    pub fn cue_track(
        absolute_path: PathBuf,
        start_seconds: f64,
        duration_seconds: Option<f64>,
    ) -> Self {
        Self {
            absolute_path,
            cue: Some(CueRange {
                start_seconds,
                duration_seconds,
            }),
        }
    }

    pub fn is_cue_track(&self) -> bool {
        self.cue.is_some()
    }
}

/// Lookup contract the streaming core consumes.
///
/// Returns `None` when the identifier does not resolve to a playable
/// file (unknown id, directory, vanished file).
pub trait LibraryIndex: Send + Sync {
    fn lookup(&self, item_id: &str) -> Option<MediaSource>;
}
