use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::path::Path;

use crate::Result;

/// The parts of `composer.json` the buildpack reads
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ComposerJson {
    pub require: IndexMap<String, serde_json::Value>,

    #[serde(rename = "require-dev")]
    pub require_dev: IndexMap<String, serde_json::Value>,

    pub extra: IndexMap<String, serde_json::Value>,
}

/// Application settings from `composer.json` → `extra.phpbp`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AppSettings {
    /// Web root relative to the application directory
    pub document_root: Option<String>,

    /// Front controller, used when no file matches a request
    pub index_document: Option<String>,

    /// Force a framework instead of detecting one
    pub framework: Option<String>,

    pub php_version: Option<String>,

    pub nginx_version: Option<String>,

    /// Extensions to install in addition to `ext-*` requirements
    pub extensions: Vec<String>,

    /// Application log files to stream at runtime
    pub log_files: Vec<String>,

    /// Extra php.ini lines
    pub php_config: Vec<String>,

    /// Extra nginx config files, relative to the application directory
    pub nginx_includes: Vec<String>,
}

impl ComposerJson {
    /// Load `composer.json` from `dir`, `None` when the file does not exist
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join("composer.json");
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)?;
        Ok(Some(Self::parse(&content)?))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Buildpack settings, defaults when absent
    pub fn settings(&self) -> Result<AppSettings> {
        match self.extra.get("phpbp") {
            Some(value) => Ok(serde_json::from_value(value.clone())?),
            None => Ok(AppSettings::default()),
        }
    }

    /// Whether the application requires `package` (runtime requirements only)
    pub fn requires(&self, package: &str) -> bool {
        self.require.contains_key(package)
    }

    /// Extensions named by `ext-<name>` requirements, lowercased, in order
    pub fn required_extensions(&self) -> Vec<String> {
        self.require
            .keys()
            .filter_map(|name| name.strip_prefix("ext-"))
            .map(str::to_lowercase)
            .collect()
    }
}

/// Merge extension lists, dropping duplicates and keeping first occurrence order
pub fn merge_extensions<'a>(lists: impl IntoIterator<Item = &'a [String]>) -> Vec<String> {
    let mut merged = IndexSet::new();
    for list in lists {
        for name in list {
            let name = name.trim().to_lowercase();
            if !name.is_empty() {
                merged.insert(name);
            }
        }
    }
    merged.into_iter().collect()
}
