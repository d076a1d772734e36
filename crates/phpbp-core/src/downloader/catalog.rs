//! Remote package catalogs.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::http::{HttpClient, HttpClientConfig};
use crate::package::PackageId;
use crate::{BuildpackError, Result};

/// Source of package checksums and tarballs.
///
/// `<catalog>/package/<id>.md5` holds the checksum, `<catalog>/package/<id>.tgz`
/// the tarball.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Raw checksum body for a package
    async fn checksum(&self, id: &PackageId) -> Result<String>;

    /// Write the package tarball to `dest`, returning its size in bytes
    async fn download(&self, id: &PackageId, dest: &Path) -> Result<u64>;

    /// Human readable location, for logging
    fn location(&self) -> String;
}

/// Catalog served over HTTP(S)
pub struct HttpCatalog {
    base_url: String,
    client: Arc<HttpClient>,
}

impl HttpCatalog {
    pub fn new(base_url: impl Into<String>, client: Arc<HttpClient>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn checksum_url(&self, id: &PackageId) -> String {
        format!("{}/package/{}.md5", self.base_url, id)
    }

    pub fn tarball_url(&self, id: &PackageId) -> String {
        format!("{}/package/{}.tgz", self.base_url, id)
    }
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn checksum(&self, id: &PackageId) -> Result<String> {
        Ok(self.client.get_text(&self.checksum_url(id)).await?)
    }

    async fn download(&self, id: &PackageId, dest: &Path) -> Result<u64> {
        let url = self.tarball_url(id);
        self.client
            .download(&url, dest)
            .await
            .map_err(|e| BuildpackError::DownloadFailed {
                package: id.to_string(),
                reason: e.to_string(),
            })
    }

    fn location(&self) -> String {
        self.base_url.clone()
    }
}

/// Catalog mirrored on the local filesystem (`file://` URLs)
pub struct DirCatalog {
    root: PathBuf,
}

impl DirCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Catalog for DirCatalog {
    async fn checksum(&self, id: &PackageId) -> Result<String> {
        Ok(tokio::fs::read_to_string(self.root.join(id.checksum_path())).await?)
    }

    async fn download(&self, id: &PackageId, dest: &Path) -> Result<u64> {
        let source = self.root.join(id.tarball_path());
        tokio::fs::copy(&source, dest)
            .await
            .map_err(|e| BuildpackError::DownloadFailed {
                package: id.to_string(),
                reason: format!("{}: {}", source.display(), e),
            })
    }

    fn location(&self) -> String {
        format!("file://{}", self.root.display())
    }
}

/// Open the catalog behind a URL. `file://` URLs map to [`DirCatalog`],
/// everything else is fetched over HTTP.
pub fn open_catalog(url: &str, http_config: HttpClientConfig) -> Result<Arc<dyn Catalog>> {
    if let Some(path) = url.strip_prefix("file://") {
        return Ok(Arc::new(DirCatalog::new(path)));
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(BuildpackError::Config(format!("Unsupported catalog URL: {}", url)));
    }

    let client = Arc::new(HttpClient::with_config(http_config)?);
    Ok(Arc::new(HttpCatalog::new(url, client)))
}
