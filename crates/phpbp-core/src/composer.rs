//! Application dependency installation through Composer.

use std::path::PathBuf;

use crate::context::BuildContext;
use crate::downloader::Fetcher;
use crate::package::PackageId;
use crate::{BuildpackError, Result};

/// Catalog package carrying `composer.phar`
pub const COMPOSER_PACKAGE: &str = "composer";

const INSTALL_ARGS: &[&str] = &[
    "install",
    "--no-dev",
    "--prefer-dist",
    "--optimize-autoloader",
    "--no-interaction",
];

pub struct ComposerInstaller<'a> {
    fetcher: &'a Fetcher,
}

impl<'a> ComposerInstaller<'a> {
    pub fn new(fetcher: &'a Fetcher) -> Self {
        Self { fetcher }
    }

    /// Install locked dependencies. Returns false when the application has
    /// no composer.json.
    pub async fn install(&self, ctx: &BuildContext) -> Result<bool> {
        if !ctx.has_file("composer.json") {
            log::debug!("No composer.json, skipping dependency install");
            return Ok(false);
        }

        if !ctx.has_file("composer.lock") {
            return Err(BuildpackError::MissingLockFile);
        }

        let phar = self.locate_phar(ctx).await?;
        let composer_home = ctx.cache_dir.join("composer");
        std::fs::create_dir_all(&composer_home)?;

        log::info!("Installing dependencies with {}", phar.display());

        let status = ctx
            .php_command()
            .arg(&phar)
            .args(INSTALL_ARGS)
            .env("COMPOSER_HOME", &composer_home)
            .status()
            .await
            .map_err(|source| BuildpackError::Spawn {
                name: "composer".to_string(),
                source,
            })?;

        if !status.success() {
            return Err(BuildpackError::DependencyInstall(format!(
                "composer install exited with {}",
                status
            )));
        }

        Ok(true)
    }

    /// The application's own composer.phar, or one from the catalog
    async fn locate_phar(&self, ctx: &BuildContext) -> Result<PathBuf> {
        let bundled = ctx.build_dir.join("composer.phar");
        if bundled.is_file() {
            return Ok(bundled);
        }

        let target = ctx.build_dir.join("vendor").join("composer");
        self.fetcher
            .fetch(&PackageId::new(COMPOSER_PACKAGE)?, &target)
            .await?;

        let phar = target.join("composer.phar");
        if !phar.is_file() {
            return Err(BuildpackError::DependencyInstall(format!(
                "package {} does not contain composer.phar",
                COMPOSER_PACKAGE
            )));
        }
        Ok(phar)
    }
}
