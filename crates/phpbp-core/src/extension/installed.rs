use indexmap::IndexSet;
use std::path::{Path, PathBuf};

/// Install locations of native libraries pulled in by extensions.
///
/// Deduplicated and kept in first-insertion order, so relocation into the
/// runtime layout is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledLibs {
    paths: IndexSet<PathBuf>,
}

impl InstalledLibs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the location was already recorded
    pub fn insert(&mut self, location: impl Into<PathBuf>) -> bool {
        self.paths.insert(location.into())
    }

    pub fn contains(&self, location: &Path) -> bool {
        self.paths.contains(location)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
