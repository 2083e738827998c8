//! In-memory library index
//!
//! Backs tests and programmatic registration of virtual cue tracks.

use dashmap::DashMap;

use super::{LibraryIndex, MediaSource};

/// Concurrent map of item identifiers to media sources.
#[derive(Debug, Default)]
pub struct MemoryLibrary {
    entries: DashMap<String, MediaSource>,
}

impl MemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace an item
    pub fn insert(&self, item_id: impl Into<String>, source: MediaSource) {
        self.entries.insert(item_id.into(), source);
    }

    /// Remove an item
    pub fn remove(&self, item_id: &str) {
        self.entries.remove(item_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LibraryIndex for MemoryLibrary {
    fn lookup(&self, item_id: &str) -> Option<MediaSource> {
        self.entries.get(item_id).map(|entry| entry.value().clone())
    }
}
