//! Configuration utility functions.

use std::path::{Path, PathBuf};

/// Find config file by searching upward from current directory
///
/// # Example
/// ```text
/// /home/user/site/pages/blog/   ← cwd
/// /home/user/site/chtl.toml     ← found!
/// ```
pub fn find_config_file(config_name: &Path) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_file_from(&cwd, config_name)
}

/// Walk up from `start` until a directory contains `config_name`.
pub fn find_config_file_from(start: &Path, config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    let mut current = start;
    loop {
        let candidate = current.join(config_name);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_config_walks_upward() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("pages/blog");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("chtl.toml"), "").unwrap();

        let found = find_config_file_from(&nested, Path::new("chtl.toml")).unwrap();
        assert_eq!(found, dir.path().join("chtl.toml"));
    }

    #[test]
    fn test_find_config_prefers_nearest() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("sub");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("chtl.toml"), "").unwrap();
        std::fs::write(nested.join("chtl.toml"), "").unwrap();

        let found = find_config_file_from(&nested, Path::new("chtl.toml")).unwrap();
        assert_eq!(found, nested.join("chtl.toml"));
    }

    #[test]
    fn test_find_config_absolute_missing() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(find_config_file_from(dir.path(), &missing).is_none());
    }

    #[test]
    fn test_directory_named_like_config_is_skipped() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a");
        std::fs::create_dir_all(nested.join("chtl.toml")).unwrap();
        std::fs::write(dir.path().join("chtl.toml"), "").unwrap();

        let found = find_config_file_from(&nested, Path::new("chtl.toml")).unwrap();
        assert_eq!(found, dir.path().join("chtl.toml"));
    }
}
