//! Tarball extraction.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use crate::{BuildpackError, Result};

/// Extracts catalog tarballs (`.tgz`) into install locations
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    /// Extract a gzipped tar archive into `dest_dir`, returning the number of
    /// entries written.
    ///
    /// Existing files are overwritten; files not present in the archive are
    /// left alone.
    pub fn extract_tgz(archive_path: &Path, dest_dir: &Path) -> Result<usize> {
        let file = File::open(archive_path).map_err(|e| extraction_error(archive_path, e))?;
        let decoder = GzDecoder::new(BufReader::new(file));

        std::fs::create_dir_all(dest_dir)?;
        Self::extract_tar_with_strip(decoder, dest_dir, 0)
            .map_err(|e| match e {
                BuildpackError::ExtractionFailed { reason, .. } => extraction_error(archive_path, reason),
                other => other,
            })
    }

    /// Extract tar with prefix stripping.
    ///
    /// Every entry must land inside `dest_dir`: `..` and absolute paths are
    /// rejected, and so is writing through a symlink that resolves outside
    /// it. Hard links are resolved against `dest_dir`.
    pub fn extract_tar_with_strip<R: Read>(reader: R, dest_dir: &Path, strip_components: usize) -> Result<usize> {
        let mut archive = tar::Archive::new(reader);
        archive.set_preserve_permissions(true);
        archive.set_overwrite(true);

        let root = dest_dir.canonicalize().map_err(|e| extraction_error(dest_dir, e))?;
        let mut extracted = 0;

        for entry in archive.entries().map_err(|e| extraction_error(dest_dir, e))? {
            let mut entry = entry.map_err(|e| extraction_error(dest_dir, e))?;

            let path = entry.path().map_err(|e| extraction_error(dest_dir, e))?.into_owned();
            let stripped = match strip_prefix(&path, strip_components) {
                Some(stripped) => stripped,
                None => continue,
            };
            check_inside(&root, &stripped)?;

            let outpath = root.join(&stripped);
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent)?;
            }

            if entry.header().entry_type().is_hard_link() {
                let link = entry
                    .link_name()
                    .map_err(|e| extraction_error(dest_dir, e))?
                    .and_then(|name| strip_prefix(&name, strip_components))
                    .ok_or_else(|| extraction_error(dest_dir, format!("{}: hard link without target", stripped.display())))?;
                check_inside(&root, &link)?;

                if outpath.symlink_metadata().is_ok() {
                    std::fs::remove_file(&outpath)?;
                }
                std::fs::hard_link(root.join(&link), &outpath)
                    .map_err(|e| extraction_error(dest_dir, format!("{}: {}", stripped.display(), e)))?;
            } else {
                entry
                    .unpack(&outpath)
                    .map_err(|e| extraction_error(dest_dir, format!("{}: {}", stripped.display(), e)))?;
            }
            extracted += 1;
        }

        Ok(extracted)
    }
}

/// `path` without its first `count` components, or `None` when nothing is left
fn strip_prefix(path: &Path, count: usize) -> Option<PathBuf> {
    let stripped: PathBuf = path.components().skip(count).collect();
    if stripped.as_os_str().is_empty() || stripped == Path::new(".") {
        None
    } else {
        Some(stripped)
    }
}

/// Reject `relative` when it, or any symlinked directory on the way to it,
/// leaves `root`. `root` must be canonical.
fn check_inside(root: &Path, relative: &Path) -> Result<()> {
    let escape = || extraction_error(root, format!("path traversal detected in archive: {}", relative.display()));

    if relative
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return Err(escape());
    }

    let mut current = root.to_path_buf();
    if let Some(parent) = relative.parent() {
        for component in parent.components() {
            current.push(component);
            let is_symlink = current
                .symlink_metadata()
                .map(|meta| meta.file_type().is_symlink())
                .unwrap_or(false);
            if is_symlink {
                // Dangling links count as escapes: create_dir_all would follow them
                current = current.canonicalize().map_err(|_| escape())?;
                if !current.starts_with(root) {
                    return Err(escape());
                }
            }
        }
    }
    Ok(())
}

fn extraction_error(path: &Path, reason: impl ToString) -> BuildpackError {
    BuildpackError::ExtractionFailed {
        package: path.display().to_string(),
        reason: reason.to_string(),
    }
}
