//! Common utilities shared across CLI commands.

use std::path::{Path, PathBuf};

use jwalk::WalkDir;

use crate::utils::fs::normalize_path;
use crate::watch::WatchFilter;

/// Expand `paths` into source files.
///
/// Files are taken as given; directories are walked and filtered like the
/// watcher filters events. Sorted and deduplicated.
pub fn collect_sources(paths: &[PathBuf], filter: &WatchFilter) -> Vec<PathBuf> {
    let mut sources: Vec<PathBuf> = paths
        .iter()
        .map(|p| normalize_path(p))
        .flat_map(|path| {
            if path.is_dir() {
                walk_sources(&path, filter)
            } else {
                vec![path]
            }
        })
        .collect();
    sources.sort();
    sources.dedup();
    sources
}

fn walk_sources(dir: &Path, filter: &WatchFilter) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .skip_hidden(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|path| filter.matches(dir, path))
        .collect()
}

/// `path` relative to `root` for display, or as-is outside it.
pub fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// `1 file`, `3 files`.
pub fn plural_count(count: usize, noun: &str) -> String {
    let suffix = if count == 1 { "" } else { "s" };
    format!("{count} {noun}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn filter() -> WatchFilter {
        WatchFilter::new(&["chtl".into()], &["node_modules".into(), "dist".into()])
    }

    #[test]
    fn test_collect_walks_directories() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("pages/blog")).unwrap();
        fs::create_dir_all(root.join("node_modules/x")).unwrap();
        fs::create_dir_all(root.join("dist")).unwrap();
        fs::write(root.join("index.chtl"), "").unwrap();
        fs::write(root.join("pages/blog/post.CHTL"), "").unwrap();
        fs::write(root.join("pages/readme.md"), "").unwrap();
        fs::write(root.join("pages/.draft.chtl"), "").unwrap();
        fs::write(root.join("node_modules/x/dep.chtl"), "").unwrap();
        fs::write(root.join("dist/out.chtl"), "").unwrap();

        let sources = collect_sources(&[root.clone()], &filter());
        assert_eq!(
            sources,
            vec![root.join("index.chtl"), root.join("pages/blog/post.CHTL")]
        );
    }

    #[test]
    fn test_explicit_files_are_kept_and_deduped() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::write(root.join("a.chtl"), "").unwrap();
        fs::write(root.join("notes.txt"), "").unwrap();

        let sources = collect_sources(
            &[root.join("notes.txt"), root.clone(), root.join("a.chtl")],
            &filter(),
        );
        assert_eq!(sources, vec![root.join("a.chtl"), root.join("notes.txt")]);
    }

    #[test]
    fn test_plural_count() {
        assert_eq!(plural_count(0, "source"), "0 sources");
        assert_eq!(plural_count(1, "source"), "1 source");
    }

    #[test]
    fn test_display_path() {
        assert_eq!(
            display_path(Path::new("/p/pages/a.chtl"), Path::new("/p")),
            "pages/a.chtl"
        );
        assert_eq!(display_path(Path::new("/q/a.chtl"), Path::new("/p")), "/q/a.chtl");
    }
}
