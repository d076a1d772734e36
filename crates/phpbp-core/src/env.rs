//! Application environment imported from the platform's env directory.
//!
//! Each regular file in the directory is one variable: the file name is the
//! key, the contents (minus a trailing newline) the value. Variables are kept
//! in an [`Environment`] and handed to child processes explicitly; the
//! buildpack's own process environment is never modified.

use indexmap::IndexMap;
use std::path::Path;

use crate::Result;

/// Variables that would change how the build itself runs.
const BLACKLIST: &[&str] = &["PATH", "GIT_DIR", "CPATH", "CPPATH", "LD_PRELOAD", "LIBRARY_PATH"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: IndexMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Import every variable found in `dir`, sorted by name
    pub fn import(dir: &Path) -> Result<Self> {
        let mut env = Self::new();

        let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            if !entry.file_type()?.is_file() {
                continue;
            }

            let Some(key) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };

            if BLACKLIST.contains(&key.as_str()) {
                log::debug!("Not importing blacklisted variable {}", key);
                continue;
            }

            let value = std::fs::read_to_string(entry.path())?;
            let value = value.strip_suffix('\n').unwrap_or(&value).to_string();
            env.set(key, value);
        }

        log::debug!("Imported {} variables from {}", env.len(), dir.display());
        Ok(env)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Imported value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Imported value, falling back to the process environment
    pub fn lookup(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(str::to_string)
            .or_else(|| std::env::var(key).ok())
            .filter(|value| !value.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}
