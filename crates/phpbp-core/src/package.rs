//! Package identifiers.

use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::{BuildpackError, Result};

fn identifier_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9._+-]+(/[A-Za-z0-9._+-]+)*$").unwrap())
}

/// Catalog key of a package, e.g. `php-5.5.7` or `ext/20121212/php-redis`.
///
/// The identifier alone determines the remote tarball and checksum URLs and
/// the cache entry. Slashes namespace the key and become directories in the
/// cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(String);

impl PackageId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();

        if !identifier_regex().is_match(&id) || id.split('/').any(|part| part == "." || part == "..") {
            return Err(BuildpackError::InvalidIdentifier(id));
        }

        Ok(Self(id))
    }

    /// Identifier of a PHP extension built against the given extension API.
    pub fn extension(api_tag: &str, name: &str) -> Result<Self> {
        Self::new(format!("ext/{}/php-{}", api_tag, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of the checksum resource, relative to a catalog or cache root.
    pub fn checksum_path(&self) -> PathBuf {
        PathBuf::from(format!("package/{}.md5", self.0))
    }

    /// Path of the tarball resource, relative to a catalog or cache root.
    pub fn tarball_path(&self) -> PathBuf {
        PathBuf::from(format!("package/{}.tgz", self.0))
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PackageId {
    type Err = BuildpackError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
