use std::path::Path;

/// Decides which paths under the watch root are worth reporting.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    /// Accepted suffixes, without the dot
    extensions: Vec<String>,
    /// Directory names skipped anywhere below the root
    exclude: Vec<String>,
}

impl WatchFilter {
    pub fn new(extensions: &[String], exclude: &[String]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            exclude: exclude.to_vec(),
        }
    }

    /// `path` must be absolute and normalized like `root`.
    pub fn matches(&self, root: &Path, path: &Path) -> bool {
        if is_temp_file(path) || !self.has_extension(path) {
            return false;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        !relative.components().any(|c| {
            c.as_os_str()
                .to_str()
                .is_some_and(|name| self.exclude.iter().any(|ex| ex == name))
        })
    }

    fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            })
    }
}

/// Check if path is a temp/backup file (editor artifacts).
pub(super) fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}
