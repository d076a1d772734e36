use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::env::Environment;
use crate::extension::ExtensionGraph;
use crate::{BuildpackError, Result};

use super::composer::AppSettings;

pub const DEFAULT_CATALOG_URL: &str = "https://phpbp-packages.s3.amazonaws.com";
pub const DEFAULT_PHP_VERSION: &str = "5.5.7";
pub const DEFAULT_NGINX_VERSION: &str = "1.4.4";
pub const DEFAULT_LIBS_ROOT: &str = "/app/vendor";

/// Zend module API numbers per PHP minor version
const EXTENSION_APIS: &[(&str, &str)] = &[
    ("5.3", "20090626"),
    ("5.4", "20100525"),
    ("5.5", "20121212"),
    ("5.6", "20131226"),
];

/// Extension API tag for a PHP version (`5.5.7` → `20121212`)
pub fn extension_api_for(php_version: &str) -> Option<&'static str> {
    let mut parts = php_version.split('.');
    let minor = format!("{}.{}", parts.next()?, parts.next()?);

    EXTENSION_APIS
        .iter()
        .find(|(version, _)| *version == minor)
        .map(|(_, api)| *api)
}

/// The `phpbp.toml` file at the application root
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct PhpbpToml {
    buildpack: BuildpackSection,
    extension_dependencies: IndexMap<String, String>,
    libraries: IndexMap<String, PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct BuildpackSection {
    catalog_url: Option<String>,
    php_version: Option<String>,
    nginx_version: Option<String>,
    extension_api: Option<String>,
    libs_root: Option<PathBuf>,
    verify_digests: Option<bool>,
}

/// Settings that drive a build, merged from all sources.
///
/// Priority, lowest to highest: defaults, `composer.json` `extra.phpbp`,
/// `phpbp.toml`, environment (`PHPBP_*`, imported variables first).
#[derive(Debug, Clone, PartialEq)]
pub struct BuildpackConfig {
    pub catalog_url: String,
    pub php_version: String,
    pub nginx_version: String,
    /// Overrides the API tag derived from `php_version`
    pub extension_api: Option<String>,
    /// Default parent of native library install locations
    pub libs_root: PathBuf,
    /// Opt-in; the catalog checksum is otherwise only compared
    pub verify_digests: bool,
    pub extension_dependencies: IndexMap<String, String>,
    pub libraries: IndexMap<String, PathBuf>,
}

impl Default for BuildpackConfig {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            php_version: DEFAULT_PHP_VERSION.to_string(),
            nginx_version: DEFAULT_NGINX_VERSION.to_string(),
            extension_api: None,
            libs_root: PathBuf::from(DEFAULT_LIBS_ROOT),
            verify_digests: false,
            extension_dependencies: IndexMap::new(),
            libraries: IndexMap::new(),
        }
    }
}

impl BuildpackConfig {
    /// Build the configuration for the application in `build_dir`
    pub fn load(build_dir: &Path, settings: &AppSettings, env: &Environment) -> Result<Self> {
        let mut config = Self::default();
        config.apply_settings(settings);

        let toml_path = build_dir.join("phpbp.toml");
        if toml_path.is_file() {
            log::debug!("Reading {}", toml_path.display());
            let content = std::fs::read_to_string(&toml_path)?;
            config.apply_toml(&content)?;
        }

        config.apply_env(env);
        config.validate()?;
        Ok(config)
    }

    fn apply_settings(&mut self, settings: &AppSettings) {
        if let Some(version) = &settings.php_version {
            self.php_version = version.clone();
        }
        if let Some(version) = &settings.nginx_version {
            self.nginx_version = version.clone();
        }
    }

    fn apply_toml(&mut self, content: &str) -> Result<()> {
        let file: PhpbpToml = toml::from_str(content)?;
        let section = file.buildpack;

        if let Some(url) = section.catalog_url {
            self.catalog_url = url;
        }
        if let Some(version) = section.php_version {
            self.php_version = version;
        }
        if let Some(version) = section.nginx_version {
            self.nginx_version = version;
        }
        if let Some(api) = section.extension_api {
            self.extension_api = Some(api);
        }
        if let Some(root) = section.libs_root {
            self.libs_root = root;
        }
        if let Some(verify) = section.verify_digests {
            self.verify_digests = verify;
        }

        self.extension_dependencies.extend(file.extension_dependencies);
        self.libraries.extend(file.libraries);
        Ok(())
    }

    fn apply_env(&mut self, env: &Environment) {
        if let Some(url) = env.lookup("PHPBP_CATALOG_URL") {
            self.catalog_url = url;
        }
        if let Some(version) = env.lookup("PHPBP_PHP_VERSION") {
            self.php_version = version;
        }
        if let Some(version) = env.lookup("PHPBP_NGINX_VERSION") {
            self.nginx_version = version;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.extension_api().is_none() {
            return Err(BuildpackError::Config(format!(
                "Unsupported PHP version {}, set extension-api in phpbp.toml",
                self.php_version
            )));
        }
        Ok(())
    }

    /// API tag used to namespace extension packages
    pub fn extension_api(&self) -> Option<&str> {
        self.extension_api
            .as_deref()
            .or_else(|| extension_api_for(&self.php_version))
    }

    /// Built-in extension dependencies overlaid with configured ones
    pub fn extension_graph(&self) -> ExtensionGraph {
        let mut graph = ExtensionGraph::with_defaults(&self.libs_root);

        let mut overrides = ExtensionGraph::new();
        for (extension, library) in &self.extension_dependencies {
            overrides.add_dependency(extension, library);
            if !self.libraries.contains_key(library) {
                overrides.set_location(library, self.libs_root.join(library));
            }
        }
        for (library, location) in &self.libraries {
            overrides.set_location(library, location);
        }

        graph.merge(&overrides);
        graph
    }

    pub fn php_package(&self) -> String {
        format!("php-{}", self.php_version)
    }

    pub fn nginx_package(&self) -> String {
        format!("nginx-{}", self.nginx_version)
    }
}
