use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Native libraries some extensions link against, with the library they need.
const DEFAULT_DEPENDENCIES: &[(&str, &str)] = &[
    ("memcached", "libmemcached"),
    ("redis", "libhiredis"),
    ("gearman", "libgearman"),
    ("imagick", "imagemagick"),
];

/// Extension → native library → install location.
///
/// An extension without an entry in `dependencies` is a leaf. A library
/// without a location cannot be installed and is ignored by the resolver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionGraph {
    dependencies: IndexMap<String, String>,
    locations: IndexMap<String, PathBuf>,
}

/// A resolved native-library dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeDependency<'a> {
    pub name: &'a str,
    pub location: Option<&'a Path>,
}

impl ExtensionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in dependencies, each library installed under `libs_root/<name>`
    pub fn with_defaults(libs_root: &Path) -> Self {
        let mut graph = Self::new();
        for (extension, library) in DEFAULT_DEPENDENCIES {
            graph.add_dependency(*extension, *library);
            graph.set_location(*library, libs_root.join(library));
        }
        graph
    }

    pub fn add_dependency(&mut self, extension: impl Into<String>, library: impl Into<String>) {
        self.dependencies.insert(extension.into(), library.into());
    }

    pub fn set_location(&mut self, library: impl Into<String>, location: impl Into<PathBuf>) {
        self.locations.insert(library.into(), location.into());
    }

    /// Overlay another graph; its entries win
    pub fn merge(&mut self, other: &ExtensionGraph) {
        for (extension, library) in &other.dependencies {
            self.dependencies.insert(extension.clone(), library.clone());
        }
        for (library, location) in &other.locations {
            self.locations.insert(library.clone(), location.clone());
        }
    }

    pub fn dependency_of(&self, extension: &str) -> Option<NativeDependency<'_>> {
        let name = self.dependencies.get(extension)?;
        Some(NativeDependency {
            name,
            location: self.locations.get(name).map(PathBuf::as_path),
        })
    }

    pub fn location_of(&self, library: &str) -> Option<&Path> {
        self.locations.get(library).map(PathBuf::as_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_extension_has_no_dependency() {
        let graph = ExtensionGraph::with_defaults(Path::new("/app/vendor"));
        assert!(graph.dependency_of("apcu").is_none());
    }

    #[test]
    fn test_defaults() {
        let graph = ExtensionGraph::with_defaults(Path::new("/app/vendor"));
        let dep = graph.dependency_of("memcached").unwrap();

        assert_eq!(dep.name, "libmemcached");
        assert_eq!(dep.location, Some(Path::new("/app/vendor/libmemcached")));
    }

    #[test]
    fn test_dependency_without_location() {
        let mut graph = ExtensionGraph::new();
        graph.add_dependency("mongo", "libmongoc");

        let dep = graph.dependency_of("mongo").unwrap();
        assert_eq!(dep.name, "libmongoc");
        assert_eq!(dep.location, None);
    }

    #[test]
    fn test_merge_overrides() {
        let mut graph = ExtensionGraph::with_defaults(Path::new("/app/vendor"));
        let mut overrides = ExtensionGraph::new();
        overrides.set_location("libhiredis", "/opt/hiredis");
        graph.merge(&overrides);

        assert_eq!(graph.location_of("libhiredis"), Some(Path::new("/opt/hiredis")));
    }
}
