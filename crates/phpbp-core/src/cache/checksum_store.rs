use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::downloader::Catalog;
use crate::package::PackageId;
use crate::Result;

/// Last-known checksums of cached tarballs.
///
/// A cache entry is reusable only while its recorded checksum equals the one
/// the catalog currently reports. Entries never expire by age.
///
/// Writes keep the invariant that a recorded checksum always describes the
/// tarball bytes on disk: the old checksum is removed before a tarball is
/// replaced, tarballs and checksums are written to temporary files in the
/// same directory and renamed into place.
#[derive(Debug, Clone)]
pub struct ChecksumStore {
    root: PathBuf,
}

impl ChecksumStore {
    /// Create a store rooted at the build cache directory
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self { root: cache_root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the cached tarball for `id`
    pub fn tarball_path(&self, id: &PackageId) -> PathBuf {
        self.root.join(id.tarball_path())
    }

    fn checksum_file(&self, id: &PackageId) -> PathBuf {
        self.root.join(id.checksum_path())
    }

    /// Checksum currently published by the catalog.
    ///
    /// Lookup failures are logged and reported as `None`, which never matches
    /// a cached checksum and therefore forces a download.
    pub async fn current(&self, catalog: &dyn Catalog, id: &PackageId) -> Option<String> {
        match catalog.checksum(id).await {
            Ok(body) => normalize_checksum(&body),
            Err(e) => {
                log::warn!("Checksum lookup for {} failed, treating as changed: {}", id, e);
                None
            }
        }
    }

    /// Checksum recorded for the cached tarball, if any
    pub fn cached(&self, id: &PackageId) -> Result<Option<String>> {
        match fs::read_to_string(self.checksum_file(id)) {
            Ok(body) => Ok(normalize_checksum(&body)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a cached entry can be reused without downloading
    pub fn is_fresh(&self, id: &PackageId, current: Option<&str>) -> Result<bool> {
        let cached = self.cached(id)?;

        Ok(match (cached.as_deref(), current) {
            (Some(cached), Some(current)) => cached == current && self.tarball_path(id).is_file(),
            _ => false,
        })
    }

    /// Forget the recorded checksum so the tarball is never trusted again
    /// until a new one is recorded.
    pub fn invalidate(&self, id: &PackageId) -> Result<()> {
        match fs::remove_file(self.checksum_file(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Temporary file next to the tarball location, for downloading into
    pub fn staging_file(&self, id: &PackageId) -> Result<NamedTempFile> {
        let dir = parent_dir(&self.tarball_path(id));
        fs::create_dir_all(&dir)?;
        Ok(NamedTempFile::new_in(dir)?)
    }

    /// Move a fully written staging file over the cached tarball
    pub fn commit_tarball(&self, id: &PackageId, staged: NamedTempFile) -> Result<PathBuf> {
        let path = self.tarball_path(id);
        staged.persist(&path).map_err(io::Error::from)?;
        Ok(path)
    }

    /// Record the checksum of the tarball that was just committed
    pub fn record(&self, id: &PackageId, checksum: &str) -> Result<()> {
        let path = self.checksum_file(id);
        let dir = parent_dir(&path);
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(checksum.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&path).map_err(io::Error::from)?;

        log::debug!("Recorded checksum {} for {}", checksum, id);
        Ok(())
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// First token of a checksum body (`md5sum` output carries a file name).
fn normalize_checksum(body: &str) -> Option<String> {
    body.split_whitespace().next().map(str::to_string)
}
