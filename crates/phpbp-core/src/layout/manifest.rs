use serde::{Deserialize, Serialize};
use std::path::Path;

use super::RuntimeLayout;
use crate::{BuildpackError, Result};

/// Build decisions the runtime needs, written once per compile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuntimeManifest {
    pub framework: String,
    pub php_version: String,
    pub extension_api: String,

    /// Relative to the application directory, empty for the root
    pub document_root: String,
    pub index_document: String,

    #[serde(default)]
    pub server_rules: Vec<String>,

    #[serde(default)]
    pub nginx_includes: Vec<String>,

    #[serde(default)]
    pub php_config: Vec<String>,

    /// Application log files to stream, relative to the application directory
    #[serde(default)]
    pub log_files: Vec<String>,

    /// Native libraries relocated under `vendor/`
    #[serde(default)]
    pub libraries: Vec<String>,
}

impl RuntimeManifest {
    pub fn load(app_dir: &Path) -> Result<Self> {
        let path = RuntimeLayout::new(app_dir).manifest_path();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            BuildpackError::Layout(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str(&content)?)
    }

    pub fn write(&self, app_dir: &Path) -> Result<()> {
        let path = RuntimeLayout::new(app_dir).manifest_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}
