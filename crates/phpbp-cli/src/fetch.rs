//! Fetch command - download and unpack one catalog package.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use phpbp_core::config::DEFAULT_CATALOG_URL;
use phpbp_core::downloader::open_catalog;
use phpbp_core::http::HttpClientConfig;
use phpbp_core::{ChecksumStore, Fetcher, PackageId};

use crate::output::Output;

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Package id, e.g. `php-5.5.7` or `ext/20121212/php-redis`
    #[arg(value_name = "PACKAGE")]
    pub package: String,

    /// Directory to extract into
    #[arg(value_name = "TARGET")]
    pub target: PathBuf,

    /// Cache directory holding tarballs and checksums
    #[arg(long)]
    pub cache: PathBuf,

    /// Catalog URL (`file://` for a local directory), defaults to
    /// `PHPBP_CATALOG_URL` or the public catalog
    #[arg(long)]
    pub catalog: Option<String>,

    /// Fail when a md5/sha shaped checksum does not match the tarball
    #[arg(long)]
    pub verify: bool,
}

fn catalog_url(explicit: Option<String>) -> String {
    explicit
        .or_else(|| std::env::var("PHPBP_CATALOG_URL").ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string())
}

pub async fn execute(args: FetchArgs, output: &Output) -> Result<i32> {
    let id = PackageId::new(&args.package).context("Invalid package id")?;
    let catalog = open_catalog(&catalog_url(args.catalog), HttpClientConfig::from_env())?;
    let fetcher = Fetcher::new(catalog, ChecksumStore::new(&args.cache))
        .with_digest_verification(args.verify);

    output.section(&format!("Fetching {}", id));
    let result = fetcher
        .fetch(&id, &args.target)
        .await
        .with_context(|| format!("Failed to fetch {}", id))?;

    output.info(&format!(
        "{} {} into {}",
        if result.from_cache { "Reused cached" } else { "Downloaded" },
        result.id,
        result.target.display()
    ));
    if let Some(checksum) = &result.checksum {
        output.verbose(&format!("checksum {}", checksum));
    }
    Ok(0)
}
