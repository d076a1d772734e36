//! HTTP access to the package catalog.
//!
//! Catalog traffic is two kinds of GET: a tiny checksum body and a tarball
//! streamed to disk. Nothing is retried here. A failed tarball download
//! fails the package; the fetcher decides what a failed checksum lookup
//! means.
//!
//! ```no_run
//! use phpbp_core::http::{HttpClient, HttpClientConfig};
//!
//! # async fn example() -> Result<(), phpbp_core::http::HttpError> {
//! let client = HttpClient::with_config(HttpClientConfig::from_env())?;
//! let checksum = client.get_text("https://packages.example.com/package/php-5.5.7.md5").await?;
//! # Ok(())
//! # }
//! ```

use futures_util::StreamExt;
use reqwest::{Client, Response, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

const USER_AGENT: &str = concat!("phpbp/", env!("CARGO_PKG_VERSION"), " (+buildpack)");

/// Whole-request limit; runtime tarballs are tens of megabytes
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Cannot build HTTP client: {0}")]
    Setup(#[source] reqwest::Error),

    #[error("GET {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("GET {url} returned {status}")]
    Status { url: String, status: StatusCode },

    #[error("Cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HttpError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, HttpError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }

    fn transport(url: &str, source: reqwest::Error) -> Self {
        HttpError::Transport {
            url: url.to_string(),
            source,
        }
    }

    fn write(path: &Path, source: std::io::Error) -> Self {
        HttpError::Write {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Connection settings for catalog requests
#[derive(Debug, Clone, PartialEq)]
pub struct HttpClientConfig {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Proxy for every scheme
    pub proxy: Option<String>,
    /// Extra PEM root certificate
    pub ca_bundle: Option<PathBuf>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: REQUEST_TIMEOUT,
            connect_timeout: CONNECT_TIMEOUT,
            proxy: None,
            ca_bundle: None,
        }
    }
}

impl HttpClientConfig {
    /// Defaults overridden by `PHPBP_HTTP_TIMEOUT` (seconds),
    /// `PHPBP_HTTP_PROXY` and `PHPBP_CA_BUNDLE`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(timeout) = lookup("PHPBP_HTTP_TIMEOUT") {
            match timeout.parse::<u64>() {
                Ok(secs) if secs > 0 => config.request_timeout = Duration::from_secs(secs),
                _ => log::warn!("Ignoring invalid PHPBP_HTTP_TIMEOUT {}", timeout),
            }
        }
        config.proxy = lookup("PHPBP_HTTP_PROXY");
        config.ca_bundle = lookup("PHPBP_CA_BUNDLE").map(PathBuf::from);
        config
    }

    pub fn with_timeouts(mut self, request: Duration, connect: Duration) -> Self {
        self.request_timeout = request;
        self.connect_timeout = connect;
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_ca_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_bundle = Some(path.into());
        self
    }
}

pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Result<Self, HttpError> {
        Self::with_config(HttpClientConfig::default())
    }

    pub fn with_config(config: HttpClientConfig) -> Result<Self, HttpError> {
        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true);

        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy).map_err(HttpError::Setup)?);
        }

        // An unreadable bundle only loses the extra root
        if let Some(path) = &config.ca_bundle {
            match std::fs::read(path) {
                Ok(pem) => {
                    let cert = reqwest::Certificate::from_pem(&pem).map_err(HttpError::Setup)?;
                    builder = builder.add_root_certificate(cert);
                }
                Err(e) => log::warn!("Ignoring CA bundle {}: {}", path.display(), e),
            }
        }

        Ok(Self {
            client: builder.build().map_err(HttpError::Setup)?,
        })
    }

    async fn get_ok(&self, url: &str) -> Result<Response, HttpError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HttpError::transport(url, e))?;

        let status = response.status();
        log::debug!("GET {} -> {}", url, status.as_u16());
        if !status.is_success() {
            return Err(HttpError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(response)
    }

    pub async fn get_text(&self, url: &str) -> Result<String, HttpError> {
        self.get_ok(url)
            .await?
            .text()
            .await
            .map_err(|e| HttpError::transport(url, e))
    }

    /// Stream `url` into `dest`. The body lands in a `.part` sibling first so
    /// `dest` never holds a truncated download.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64, HttpError> {
        let response = self.get_ok(url).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HttpError::write(parent, e))?;
        }
        let part = part_path(dest);
        let written = match write_body(response, url, &part).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e);
            }
        };

        tokio::fs::rename(&part, dest)
            .await
            .map_err(|e| HttpError::write(dest, e))?;
        log::debug!("Saved {} bytes from {}", written, url);
        Ok(written)
    }
}

async fn write_body(response: Response, url: &str, part: &Path) -> Result<u64, HttpError> {
    let mut file = tokio::fs::File::create(part)
        .await
        .map_err(|e| HttpError::write(part, e))?;

    let mut written = 0u64;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| HttpError::transport(url, e))?;
        file.write_all(&chunk).await.map_err(|e| HttpError::write(part, e))?;
        written += chunk.len() as u64;
    }
    file.sync_all().await.map_err(|e| HttpError::write(part, e))?;
    Ok(written)
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}
