//! `[watch]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [watch]
//! root = "."                                  # Directory to observe
//! extensions = ["chtl"]                       # Suffixes that trigger builds
//! exclude = [".git", "node_modules", "target", "dist"]
//! debounce_ms = 100                           # Quiet period per file
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigDiagnostics;
use crate::watch::{WatchFilter, WatchOptions};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub root: PathBuf,
    /// File suffixes without the leading dot, matched case-insensitively.
    pub extensions: Vec<String>,
    /// Directory names skipped anywhere below the root.
    pub exclude: Vec<String>,
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        let options = WatchOptions::default();
        Self {
            root: PathBuf::from("."),
            extensions: options.extensions,
            exclude: options.exclude,
            debounce_ms: options.debounce.as_millis() as u64,
        }
    }
}

impl WatchConfig {
    pub fn options(&self) -> WatchOptions {
        WatchOptions {
            extensions: self.extensions.clone(),
            exclude: self.exclude.clone(),
            debounce: Duration::from_millis(self.debounce_ms),
        }
    }

    pub fn filter(&self) -> WatchFilter {
        WatchFilter::new(&self.extensions, &self.exclude)
    }

    pub(crate) fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.debounce_ms == 0 {
            diag.error_with_hint(
                "watch.debounce_ms",
                "debounce window must be positive",
                "the default is 100",
            );
        }
        if self.extensions.iter().all(|e| e.trim().is_empty()) {
            diag.error_with_hint(
                "watch.extensions",
                "at least one file extension is required",
                r#"extensions = ["chtl"]"#,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;
    use std::path::Path;

    #[test]
    fn test_watch_config_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.watch.root, Path::new("."));
        assert_eq!(config.watch.extensions, vec!["chtl"]);
        assert!(config.watch.exclude.iter().any(|e| e == "node_modules"));
        assert_eq!(config.watch.debounce_ms, 100);
    }

    #[test]
    fn test_watch_config_custom() {
        let config = test_parse_config(
            "[watch]\nroot = \"src\"\nextensions = [\"chtl\", \"cjjs\"]\ndebounce_ms = 250",
        );
        assert_eq!(config.watch.root, Path::new("src"));
        assert_eq!(config.watch.options().debounce.as_millis(), 250);
        let filter = config.watch.filter();
        assert!(filter.matches(Path::new("/p"), Path::new("/p/a/b.CJJS")));
        assert!(!filter.matches(Path::new("/p"), Path::new("/p/a/b.html")));
    }
}
