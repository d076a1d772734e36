use std::path::{Path, PathBuf};

use crate::downloader::Fetcher;
use crate::outcome::Outcome;
use crate::package::PackageId;
use crate::{BuildpackError, Result};

use super::graph::ExtensionGraph;
use super::installed::InstalledLibs;

/// Extensions that must be loaded with `zend_extension=`.
const ZEND_EXTENSIONS: &[&str] = &["opcache", "xdebug"];

/// Where the PHP runtime keeps its extensions and their config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    /// Runtime root, remote extension packages are extracted here
    pub root: PathBuf,
    /// Directory scanned for `<ext>.ini` files (`PHP_INI_SCAN_DIR`)
    pub conf_dir: PathBuf,
    /// Directory holding bundled shared objects
    pub extension_dir: PathBuf,
}

impl RuntimePaths {
    /// Standard layout of a runtime built for the given extension API
    pub fn new(root: impl Into<PathBuf>, api_tag: &str) -> Self {
        let root = root.into();
        Self {
            conf_dir: root.join("etc/conf.d"),
            extension_dir: root.join(format!("lib/php/extensions/no-debug-non-zts-{}", api_tag)),
            root,
        }
    }

    pub fn marker(&self, extension: &str) -> PathBuf {
        self.conf_dir.join(format!("{}.ini", extension))
    }

    pub fn shared_object(&self, extension: &str) -> PathBuf {
        self.extension_dir.join(format!("{}.so", extension))
    }
}

/// How an extension ended up enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionStatus {
    /// Its config marker already existed
    AlreadyInstalled,
    /// A shared object shipped with the runtime was enabled
    Bundled,
    /// Its package was fetched from the catalog
    Fetched,
}

/// Result of resolving a list of extensions
#[derive(Debug, Default)]
pub struct Resolution {
    /// Enabling config files written during this resolution
    pub stubs: Vec<PathBuf>,
    /// Per-extension outcome, in request order. Never contains `Fatal`.
    pub outcomes: Vec<(String, Outcome<ExtensionStatus>)>,
}

impl Resolution {
    /// Extensions that could not be installed
    pub fn degraded(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes
            .iter()
            .filter_map(|(name, outcome)| outcome.warning().map(|w| (name.as_str(), w)))
    }

    pub fn status_of(&self, extension: &str) -> Option<&Outcome<ExtensionStatus>> {
        self.outcomes
            .iter()
            .rev()
            .find(|(name, _)| name == extension)
            .map(|(_, outcome)| outcome)
    }
}

/// Installs PHP extensions and the native libraries they depend on.
///
/// Resolution is best effort for extensions: one missing from the catalog is
/// reported as degraded and the next one is resolved. Native libraries are
/// required, failing to fetch one aborts the resolution. A successful
/// resolution therefore does not mean every extension was installed; check
/// [`Resolution::degraded`].
pub struct ExtensionResolver<'a> {
    fetcher: &'a Fetcher,
    graph: &'a ExtensionGraph,
    runtime: RuntimePaths,
    api_tag: String,
}

impl<'a> ExtensionResolver<'a> {
    pub fn new(fetcher: &'a Fetcher, graph: &'a ExtensionGraph, runtime: RuntimePaths, api_tag: impl Into<String>) -> Self {
        Self {
            fetcher,
            graph,
            runtime,
            api_tag: api_tag.into(),
        }
    }

    pub fn runtime(&self) -> &RuntimePaths {
        &self.runtime
    }

    /// Resolve `extensions` in order, recording native library locations in `libs`
    pub async fn resolve(&self, extensions: &[String], libs: &mut InstalledLibs) -> Result<Resolution> {
        let mut resolution = Resolution::default();

        for name in extensions {
            let outcome = self.resolve_one(name, libs, &mut resolution.stubs).await;

            match outcome {
                Outcome::Fatal(err) => return Err(err),
                Outcome::Degraded(ref warning) => {
                    log::warn!("Extension {} not installed: {}", name, warning);
                }
                Outcome::Ok(status) => {
                    log::debug!("Extension {}: {:?}", name, status);
                }
            }

            resolution.outcomes.push((name.clone(), outcome));
        }

        Ok(resolution)
    }

    async fn resolve_one(&self, name: &str, libs: &mut InstalledLibs, stubs: &mut Vec<PathBuf>) -> Outcome<ExtensionStatus> {
        if self.runtime.marker(name).exists() {
            log::info!("Extension {} already installed", name);
            self.remember_installed_dependency(name, libs);
            return Outcome::Ok(ExtensionStatus::AlreadyInstalled);
        }

        if self.runtime.shared_object(name).is_file() {
            return match self.write_stub(name) {
                Ok(stub) => {
                    stubs.push(stub);
                    Outcome::Ok(ExtensionStatus::Bundled)
                }
                Err(err) => Outcome::Fatal(err),
            };
        }

        if let Err(err) = self.install_dependency(name, libs).await {
            return Outcome::Fatal(err);
        }

        let id = match PackageId::extension(&self.api_tag, name) {
            Ok(id) => id,
            Err(_) => return Outcome::Degraded(format!("'{}' is not a valid extension name", name)),
        };

        match self.fetcher.fetch(&id, &self.runtime.root).await {
            Ok(_) => {}
            Err(BuildpackError::DownloadFailed { reason, .. }) => {
                return Outcome::Degraded(format!("no package {} in catalog ({})", id, reason));
            }
            Err(err) => return Outcome::Fatal(err),
        }

        // Packages may ship their own ini; only write one when they don't
        if !self.runtime.marker(name).exists() {
            match self.write_stub(name) {
                Ok(stub) => stubs.push(stub),
                Err(err) => return Outcome::Fatal(err),
            }
        }

        Outcome::Ok(ExtensionStatus::Fetched)
    }

    /// Fetch the native library `extension` links against, once per location
    async fn install_dependency(&self, extension: &str, libs: &mut InstalledLibs) -> Result<()> {
        let Some(dependency) = self.graph.dependency_of(extension) else {
            return Ok(());
        };

        let Some(location) = dependency.location else {
            log::debug!("No install location for {}, skipping", dependency.name);
            return Ok(());
        };

        if libs.contains(location) {
            log::debug!("{} already installed at {}", dependency.name, location.display());
            return Ok(());
        }

        let id = PackageId::new(dependency.name)?;
        self.fetcher.fetch(&id, location).await?;
        libs.insert(location);

        Ok(())
    }

    fn remember_installed_dependency(&self, extension: &str, libs: &mut InstalledLibs) {
        if let Some(location) = self.graph.dependency_of(extension).and_then(|d| d.location) {
            if location.is_dir() {
                libs.insert(location);
            }
        }
    }

    fn write_stub(&self, extension: &str) -> Result<PathBuf> {
        let directive = if ZEND_EXTENSIONS.contains(&extension) {
            "zend_extension"
        } else {
            "extension"
        };

        let path = self.runtime.marker(extension);
        std::fs::create_dir_all(&self.runtime.conf_dir)?;
        std::fs::write(&path, format!("{}={}.so\n", directive, extension))?;

        log::info!("Enabled extension {} ({})", extension, display(&path));
        Ok(path)
    }
}

fn display(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
