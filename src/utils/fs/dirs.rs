//! Directory operations for creating, copying, and removing directories.
//!
//! Traversals use [`walkdir`] and visit entries in file-name order.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Create a directory and all its parents if they don't exist.
///
/// # Errors
///
/// Fails if the path exists but is not a directory, or cannot be created.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}

/// Whether `name` can be joined onto a directory without leaving it: not
/// empty, not `.` or `..`, not absolute, and free of path separators.
#[must_use]
pub fn is_path_component(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(first)), None) if first == name
    )
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }
    Ok(())
}

/// Lazily walk the regular files below `root`, yielding paths relative to it.
///
/// Symlinks are followed, so linked task files are treated like regular ones.
/// Calling the function again restarts the walk from the beginning.
pub fn walk_files(root: &Path) -> impl Iterator<Item = Result<PathBuf>> + '_ {
    WalkDir::new(root).follow_links(true).sort_by_file_name().into_iter().filter_map(
        move |entry| match entry {
            Ok(entry) if entry.file_type().is_file() => Some(
                entry
                    .path()
                    .strip_prefix(root)
                    .map(Path::to_path_buf)
                    .with_context(|| format!("Walked outside of {}", root.display())),
            ),
            Ok(_) => None,
            Err(e) => Some(Err(anyhow::Error::new(e)
                .context(format!("Failed to walk directory: {}", root.display())))),
        },
    )
}

/// Recursively copy `src` into `dst`, creating `dst` if needed.
///
/// Empty subdirectories are recreated; existing files in `dst` are overwritten.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    ensure_dir(dst)?;

    for entry in WalkDir::new(src).follow_links(true).sort_by_file_name().min_depth(1) {
        let entry =
            entry.with_context(|| format!("Failed to read directory: {}", src.display()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("Walked outside of {}", src.display()))?;
        let dst_path = dst.join(relative);

        if entry.file_type().is_dir() {
            ensure_dir(&dst_path)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &dst_path).with_context(|| {
                format!(
                    "Failed to copy file from {} to {}",
                    entry.path().display(),
                    dst_path.display()
                )
            })?;
        }
    }

    Ok(())
}

/// Remove a directory tree if it exists.
pub fn remove_dir_all(path: &Path) -> Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory: {}", path.display()))?;
    } else if path.exists() {
        fs::remove_file(path)
            .with_context(|| format!("Failed to remove file: {}", path.display()))?;
    }
    Ok(())
}

/// Replace `dst` with a fresh copy of `src`.
pub fn replace_dir(src: &Path, dst: &Path) -> Result<()> {
    remove_dir_all(dst)?;
    copy_dir(src, dst)
}
