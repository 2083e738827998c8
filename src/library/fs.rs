//! Filesystem-backed library index
//!
//! Resolves item identifiers as relative paths under a configured
//! library root. Lookups hit the live filesystem, so the index never
//! goes stale and needs no scanner to stay current.

use std::path::{Component, Path, PathBuf};

use super::{LibraryIndex, MediaSource};

/// Library index rooted at a music directory.
#[derive(Debug, Clone)]
pub struct FsLibrary {
    root: PathBuf,
}

impl FsLibrary {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an identifier to a path under the root, refusing
    /// identifiers that lexically step outside it.
    fn resolve(&self, item_id: &str) -> Option<PathBuf> {
        let relative = item_id.trim_start_matches('/');
        if relative.is_empty() {
            return None;
        }
        let candidate = Path::new(relative);
        for component in candidate.components() {
            match component {
                Component::Normal(_) => {}
                _ => return None,
            }
        }
        Some(self.root.join(candidate))
    }
}

impl LibraryIndex for FsLibrary {
    fn lookup(&self, item_id: &str) -> Option<MediaSource> {
        let path = self.resolve(item_id)?;
        if !path.is_file() {
            return None;
        }
        Some(MediaSource::file(path))
    }
}
