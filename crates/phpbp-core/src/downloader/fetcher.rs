//! Cache-aware package fetching.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::ChecksumStore;
use crate::package::PackageId;
use crate::{BuildpackError, Result};

use super::archive::ArchiveExtractor;
use super::catalog::Catalog;
use super::checksum::verify_checksum;

/// Result of a fetch operation
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub id: PackageId,
    /// Directory the package was extracted into
    pub target: PathBuf,
    /// Checksum reported by the catalog, if the lookup succeeded
    pub checksum: Option<String>,
    /// Whether the tarball was reused from the build cache
    pub from_cache: bool,
}

/// Downloads packages into the build cache and extracts them.
///
/// The expensive step (download) happens only when the catalog checksum
/// differs from the recorded one. Extraction always happens, since the
/// target is usually a fresh build directory while the cache persists.
pub struct Fetcher {
    catalog: Arc<dyn Catalog>,
    store: ChecksumStore,
    verify_digests: bool,
}

impl Fetcher {
    pub fn new(catalog: Arc<dyn Catalog>, store: ChecksumStore) -> Self {
        Self {
            catalog,
            store,
            verify_digests: false,
        }
    }

    /// Check downloaded tarballs against checksums that look like hex digests.
    /// Off by default: a catalog checksum only has to change when the
    /// tarball does, so it is compared, never computed.
    pub fn with_digest_verification(mut self, verify: bool) -> Self {
        self.verify_digests = verify;
        self
    }

    pub fn store(&self) -> &ChecksumStore {
        &self.store
    }

    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }

    /// Fetch `id` and extract it into `target`
    pub async fn fetch(&self, id: &PackageId, target: &Path) -> Result<FetchResult> {
        tokio::fs::create_dir_all(target).await?;

        let remote = self.store.current(self.catalog.as_ref(), id).await;
        let from_cache = self.store.is_fresh(id, remote.as_deref())?;

        if from_cache {
            log::info!("Using cached {} (checksum {})", id, remote.as_deref().unwrap_or_default());
        } else {
            log::info!("Downloading {} from {}", id, self.catalog.location());
            self.refresh(id, remote.as_deref()).await?;
        }

        let tarball = self.store.tarball_path(id);
        let entries = ArchiveExtractor::extract_tgz(&tarball, target).map_err(|e| match e {
            BuildpackError::ExtractionFailed { reason, .. } => BuildpackError::ExtractionFailed {
                package: id.to_string(),
                reason,
            },
            other => other,
        })?;
        log::debug!("Extracted {} entries of {} into {}", entries, id, target.display());

        Ok(FetchResult {
            id: id.clone(),
            target: target.to_path_buf(),
            checksum: remote,
            from_cache,
        })
    }

    /// Replace the cached tarball and record the checksum it was fetched for
    async fn refresh(&self, id: &PackageId, remote: Option<&str>) -> Result<()> {
        self.store.invalidate(id)?;

        let staged = self.store.staging_file(id)?;
        let bytes = self.catalog.download(id, staged.path()).await?;
        log::debug!("Downloaded {} ({} bytes)", id, bytes);

        if let (true, Some(expected)) = (self.verify_digests, remote) {
            if let Some((actual, false)) = verify_checksum(staged.path(), expected)? {
                return Err(BuildpackError::ChecksumMismatch {
                    package: id.to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        self.store.commit_tarball(id, staged)?;

        if let Some(checksum) = remote {
            self.store.record(id, checksum)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory catalog that counts downloads
    struct MemoryCatalog {
        checksum: Mutex<Option<String>>,
        tarball: Vec<u8>,
        downloads: AtomicUsize,
    }

    impl MemoryCatalog {
        fn new(checksum: Option<&str>, tarball: Vec<u8>) -> Self {
            Self {
                checksum: Mutex::new(checksum.map(str::to_string)),
                tarball,
                downloads: AtomicUsize::new(0),
            }
        }

        fn set_checksum(&self, checksum: Option<&str>) {
            *self.checksum.lock().unwrap() = checksum.map(str::to_string);
        }

        fn downloads(&self) -> usize {
            self.downloads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Catalog for MemoryCatalog {
        async fn checksum(&self, id: &PackageId) -> Result<String> {
            self.checksum.lock().unwrap().clone().ok_or_else(|| BuildpackError::DownloadFailed {
                package: id.to_string(),
                reason: "connection refused".to_string(),
            })
        }

        async fn download(&self, _id: &PackageId, dest: &Path) -> Result<u64> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            tokio::fs::write(dest, &self.tarball).await?;
            Ok(self.tarball.len() as u64)
        }

        fn location(&self) -> String {
            "memory".to_string()
        }
    }

    fn tgz(files: &[(&str, &str)]) -> Vec<u8> {
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn fetcher(catalog: &Arc<MemoryCatalog>, cache: &Path) -> Fetcher {
        Fetcher::new(catalog.clone(), ChecksumStore::new(cache))
    }

    #[tokio::test]
    async fn test_first_fetch_downloads_and_records() {
        let cache = TempDir::new().unwrap();
        let build = TempDir::new().unwrap();
        let catalog = Arc::new(MemoryCatalog::new(Some("abc123\n"), tgz(&[("sbin/nginx", "bin")])));
        let id = PackageId::new("web-1.4.4").unwrap();

        let result = fetcher(&catalog, cache.path())
            .fetch(&id, &build.path().join("vendor/nginx"))
            .await
            .unwrap();

        assert!(!result.from_cache);
        assert_eq!(catalog.downloads(), 1);
        assert_eq!(
            std::fs::read_to_string(cache.path().join("package/web-1.4.4.md5")).unwrap(),
            "abc123"
        );
        assert!(build.path().join("vendor/nginx/sbin/nginx").is_file());
    }

    #[tokio::test]
    async fn test_unchanged_checksum_skips_download_but_extracts() {
        let cache = TempDir::new().unwrap();
        let catalog = Arc::new(MemoryCatalog::new(Some("abc123"), tgz(&[("bin/php", "php")])));
        let id = PackageId::new("php-5.5.7").unwrap();
        let fetcher = fetcher(&catalog, cache.path());

        let first = TempDir::new().unwrap();
        fetcher.fetch(&id, first.path()).await.unwrap();

        let second = TempDir::new().unwrap();
        let result = fetcher.fetch(&id, second.path()).await.unwrap();

        assert!(result.from_cache);
        assert_eq!(catalog.downloads(), 1);
        assert!(second.path().join("bin/php").is_file());
    }

    #[tokio::test]
    async fn test_changed_checksum_downloads_once_and_updates() {
        let cache = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let catalog = Arc::new(MemoryCatalog::new(Some("abc123"), tgz(&[("a", "1")])));
        let id = PackageId::new("php-5.5.7").unwrap();
        let fetcher = fetcher(&catalog, cache.path());

        fetcher.fetch(&id, target.path()).await.unwrap();
        catalog.set_checksum(Some("def456"));
        let result = fetcher.fetch(&id, target.path()).await.unwrap();

        assert!(!result.from_cache);
        assert_eq!(catalog.downloads(), 2);
        assert_eq!(fetcher.store().cached(&id).unwrap(), Some("def456".to_string()));
    }

    #[tokio::test]
    async fn test_checksum_lookup_failure_forces_download() {
        let cache = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let catalog = Arc::new(MemoryCatalog::new(Some("abc123"), tgz(&[("a", "1")])));
        let id = PackageId::new("php-5.5.7").unwrap();
        let fetcher = fetcher(&catalog, cache.path());

        fetcher.fetch(&id, target.path()).await.unwrap();
        catalog.set_checksum(None);
        let result = fetcher.fetch(&id, target.path()).await.unwrap();

        assert!(!result.from_cache);
        assert_eq!(result.checksum, None);
        assert_eq!(catalog.downloads(), 2);
        // Nothing trustworthy to record
        assert_eq!(fetcher.store().cached(&id).unwrap(), None);
    }

    #[tokio::test]
    async fn test_digest_mismatch_is_fatal() {
        let cache = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let digest = "0".repeat(32);
        let catalog = Arc::new(MemoryCatalog::new(Some(&digest), tgz(&[("a", "1")])));
        let id = PackageId::new("php-5.5.7").unwrap();

        let result = fetcher(&catalog, cache.path())
            .with_digest_verification(true)
            .fetch(&id, target.path())
            .await;

        assert!(matches!(result, Err(BuildpackError::ChecksumMismatch { .. })));
        assert_eq!(ChecksumStore::new(cache.path()).cached(&id).unwrap(), None);
        assert!(!cache.path().join("package/php-5.5.7.tgz").exists());
    }

    #[tokio::test]
    async fn test_digest_shaped_checksum_is_opaque_by_default() {
        let cache = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let digest = "0".repeat(32);
        let catalog = Arc::new(MemoryCatalog::new(Some(&digest), tgz(&[("a", "1")])));
        let id = PackageId::new("php-5.5.7").unwrap();
        let fetcher = fetcher(&catalog, cache.path());

        let result = fetcher.fetch(&id, target.path()).await.unwrap();
        assert!(!result.from_cache);
        assert_eq!(result.checksum.as_deref(), Some(digest.as_str()));
        assert_eq!(fetcher.store().cached(&id).unwrap().as_deref(), Some(digest.as_str()));

        let again = fetcher.fetch(&id, target.path()).await.unwrap();
        assert!(again.from_cache);
        assert_eq!(catalog.downloads(), 1);
    }

    #[tokio::test]
    async fn test_malformed_tarball_is_fatal() {
        let cache = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let catalog = Arc::new(MemoryCatalog::new(Some("abc123"), b"garbage".to_vec()));
        let id = PackageId::new("php-5.5.7").unwrap();

        let result = fetcher(&catalog, cache.path()).fetch(&id, target.path()).await;

        match result {
            Err(BuildpackError::ExtractionFailed { package, .. }) => assert_eq!(package, "php-5.5.7"),
            other => panic!("expected extraction failure, got {:?}", other),
        }
    }
}
