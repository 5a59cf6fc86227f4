//! Filesystem path and timestamp helpers.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to:
/// - Return as-is if already absolute
/// - Join with current directory if relative
///
/// Deleted files can't be canonicalized, so their parent is canonicalized
/// instead. This keeps a `deleted` event's path equal to the path earlier
/// events reported for the same file.
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name())
        && let Ok(parent) = parent.canonicalize()
    {
        return parent.join(name);
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    }
}

/// Resolve a config-relative path against `base`, expanding `~` first.
pub fn resolve_path(path: &Path, base: &Path) -> PathBuf {
    let expanded = path
        .to_str()
        .map(|s| PathBuf::from(shellexpand::tilde(s).as_ref()))
        .unwrap_or_else(|| path.to_path_buf());

    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

/// Get the modification time of a file
///
/// Returns `None` if the file doesn't exist or mtime cannot be read
pub fn get_mtime(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|m| m.modified()).ok()
}

/// Latest modification time among `paths`; unreadable paths are skipped.
pub fn newest_mtime<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Option<SystemTime> {
    paths.into_iter().filter_map(|p| get_mtime(p.as_ref())).max()
}
