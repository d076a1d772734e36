use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{RuntimeLayout, RuntimeManifest};
use crate::extension::InstalledLibs;
use crate::template;
use crate::{BuildpackError, Result};

/// Assembles fetched artifacts into the runtime layout of a build dir
pub struct LayoutBuilder {
    layout: RuntimeLayout,
}

impl LayoutBuilder {
    pub fn new(build_dir: impl Into<PathBuf>) -> Self {
        Self {
            layout: RuntimeLayout::new(build_dir),
        }
    }

    pub fn layout(&self) -> &RuntimeLayout {
        &self.layout
    }

    /// Move `source` to `vendor/<name>`, replacing what is there
    pub fn relocate(&self, source: &Path, name: &str) -> Result<PathBuf> {
        let dest = self.layout.library_dir(name);

        if same_path(source, &dest) {
            log::debug!("{} already in place", dest.display());
            return Ok(dest);
        }

        if !source.exists() {
            return Err(BuildpackError::Layout(format!(
                "{} does not exist",
                source.display()
            )));
        }

        remove_path(&dest)?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        log::debug!("Moving {} to {}", source.display(), dest.display());
        if let Err(e) = std::fs::rename(source, &dest) {
            log::debug!("Rename failed ({}), copying instead", e);
            mirror_directory(source, &dest)?;
            remove_path(source)?;
        }

        Ok(dest)
    }

    /// Relocate every installed native library, returning their names
    pub fn relocate_libraries(&self, libs: &InstalledLibs) -> Result<Vec<String>> {
        let mut names = Vec::with_capacity(libs.len());

        for location in libs.iter() {
            let name = location
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    BuildpackError::Layout(format!("invalid library path {}", location.display()))
                })?
                .to_string();

            self.relocate(location, &name)?;
            names.push(name);
        }

        Ok(names)
    }

    /// Write the config templates rendered at boot
    pub fn write_templates(&self) -> Result<()> {
        let dir = self.layout.template_dir();
        std::fs::create_dir_all(&dir)?;

        std::fs::write(dir.join("nginx.conf.tpl"), template::NGINX_CONF)?;
        std::fs::write(dir.join("php-fpm.conf.tpl"), template::PHP_FPM_CONF)?;
        std::fs::write(dir.join("php.ini.tpl"), template::PHP_INI)?;
        Ok(())
    }

    pub fn write_manifest(&self, manifest: &RuntimeManifest) -> Result<()> {
        manifest.write(self.layout.app_dir())
    }

    /// Copy the running binary into the slug so it can supervise at boot
    pub fn install_binary(&self, exe: &Path) -> Result<PathBuf> {
        let dest = self.layout.binary_path();
        if same_path(exe, &dest) {
            return Ok(dest);
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(exe, &dest)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(0o755))?;
        }

        Ok(dest)
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn remove_path(path: &Path) -> Result<()> {
    if path.is_symlink() || path.is_file() {
        std::fs::remove_file(path)?;
    } else if path.is_dir() {
        std::fs::remove_dir_all(path)?;
    }
    Ok(())
}

/// Recursive copy keeping symlinks (shared libraries rely on them)
fn mirror_directory(source: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;

    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(|e| BuildpackError::Layout(e.to_string()))?;
        let path = entry.path();
        let relative = path.strip_prefix(source).unwrap_or(path);
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            #[cfg(unix)]
            std::os::unix::fs::symlink(std::fs::read_link(path)?, &target)?;
        } else {
            std::fs::copy(path, &target)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_relocate_replaces_destination() {
        let dir = TempDir::new().unwrap();
        let stage = dir.path().join("stage/php");
        std::fs::create_dir_all(stage.join("bin")).unwrap();
        std::fs::write(stage.join("bin/php"), "new").unwrap();

        let build = dir.path().join("build");
        std::fs::create_dir_all(build.join("vendor/php/old")).unwrap();

        let builder = LayoutBuilder::new(&build);
        let dest = builder.relocate(&stage, "php").unwrap();

        assert_eq!(dest, build.join("vendor/php"));
        assert_eq!(std::fs::read_to_string(dest.join("bin/php")).unwrap(), "new");
        assert!(!dest.join("old").exists());
        assert!(!stage.exists());
    }

    #[test]
    fn test_relocate_in_place_is_noop() {
        let dir = TempDir::new().unwrap();
        let lib = dir.path().join("vendor/libhiredis");
        std::fs::create_dir_all(&lib).unwrap();
        std::fs::write(lib.join("libhiredis.so"), "so").unwrap();

        let builder = LayoutBuilder::new(dir.path());
        builder.relocate(&lib, "libhiredis").unwrap();

        assert!(lib.join("libhiredis.so").is_file());
    }

    #[test]
    fn test_relocate_missing_source() {
        let dir = TempDir::new().unwrap();
        let builder = LayoutBuilder::new(dir.path());

        let err = builder.relocate(&dir.path().join("nope"), "nope").unwrap_err();
        assert!(matches!(err, BuildpackError::Layout(_)));
    }

    #[test]
    fn test_relocate_libraries() {
        let dir = TempDir::new().unwrap();
        let mut libs = InstalledLibs::new();
        for name in ["libhiredis", "libmemcached"] {
            let path = dir.path().join("libs").join(name);
            std::fs::create_dir_all(path.join("lib")).unwrap();
            libs.insert(path);
        }

        let builder = LayoutBuilder::new(dir.path().join("build"));
        let names = builder.relocate_libraries(&libs).unwrap();

        assert_eq!(names, vec!["libhiredis", "libmemcached"]);
        assert!(dir.path().join("build/vendor/libmemcached/lib").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_mirror_keeps_symlinks() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src");
        std::fs::create_dir_all(source.join("lib")).unwrap();
        std::fs::write(source.join("lib/libfoo.so.1"), "elf").unwrap();
        std::os::unix::fs::symlink("libfoo.so.1", source.join("lib/libfoo.so")).unwrap();

        let dest = dir.path().join("dest");
        mirror_directory(&source, &dest).unwrap();

        assert_eq!(std::fs::read_link(dest.join("lib/libfoo.so")).unwrap(), PathBuf::from("libfoo.so.1"));
        assert_eq!(std::fs::read_to_string(dest.join("lib/libfoo.so.1")).unwrap(), "elf");
    }

    #[test]
    fn test_templates_and_binary() {
        let dir = TempDir::new().unwrap();
        let exe = dir.path().join("phpbp-bin");
        std::fs::write(&exe, "binary").unwrap();

        let builder = LayoutBuilder::new(dir.path().join("build"));
        builder.write_templates().unwrap();
        let installed = builder.install_binary(&exe).unwrap();

        let conf = dir.path().join("build/vendor/phpbp/conf");
        assert!(conf.join("nginx.conf.tpl").is_file());
        assert!(conf.join("php-fpm.conf.tpl").is_file());
        assert!(conf.join("php.ini.tpl").is_file());
        assert_eq!(std::fs::read_to_string(installed).unwrap(), "binary");
    }
}
