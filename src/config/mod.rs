//! Project configuration management for `chtl.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # One file per TOML section
//! ├── error          # ConfigError, ConfigDiagnostics
//! ├── util           # find_config_file
//! └── mod.rs         # ProjectConfig (this file)
//! ```
//!
//! A missing config file means all defaults. Relative paths in the file are
//! resolved against the file's directory, except `build.output`, which is
//! relative to each source file.

mod error;
pub mod section;
mod util;

pub use error::{ConfigDiagnostic, ConfigDiagnostics, ConfigError};
pub use section::{BuildConfig, LiveConfig, ModulesConfig, ServeConfig, WatchConfig};
pub use util::{find_config_file, find_config_file_from};

use crate::{
    cli::{Cli, Commands},
    debug, log,
    utils::fs::{normalize_path, resolve_path},
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Root configuration structure representing chtl.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Absolute path to the config file, which may not exist
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub live: LiveConfig,

    #[serde(default)]
    pub serve: ServeConfig,

    #[serde(default)]
    pub modules: ModulesConfig,
}

impl ProjectConfig {
    /// Load configuration for the CLI invocation.
    ///
    /// Searches upward from cwd for the config file; the project root is the
    /// config file's directory, or cwd when there is none.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let (mut config, config_path) = match find_config_file(&cli.config) {
            Some(path) => (Self::from_path(&path)?, path),
            None => {
                debug!("config"; "no {} found, using defaults", cli.config.display());
                (Self::default(), cwd.join(&cli.config))
            }
        };

        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or(cwd);
        config.config_path = normalize_path(&config_path);
        config.finalize(&root);
        config.apply_command_options(cli);
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)
            .with_context(|| format!("in {}", path.display()))?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    /// Resolve every path against `root` and locate the compiler.
    pub fn finalize(&mut self, root: &Path) {
        let root = normalize_path(root);

        self.watch.root = normalize_path(&resolve_path(&self.watch.root, &root));
        self.serve.root = self
            .serve
            .root
            .as_ref()
            .map(|p| normalize_path(&resolve_path(p, &root)));
        self.modules.paths = self
            .modules
            .paths
            .iter()
            .map(|p| normalize_path(&resolve_path(p, &root)))
            .collect();
        self.modules.snapshot = resolve_path(&self.modules.snapshot, &root);
        // stays relative: it is taken against each source's directory
        self.build.output = resolve_path(&self.build.output, Path::new(""));
        self.build.resolve_program(&root);

        self.root = root;
    }

    /// Directory the preview server serves.
    pub fn serve_root(&self) -> &Path {
        self.serve.root.as_deref().unwrap_or(&self.watch.root)
    }

    /// Whether `path` lies under one of the module roots.
    pub fn is_module_path(&self, path: &Path) -> bool {
        self.modules.paths.iter().any(|root| path.starts_with(root))
    }

    /// Apply command-specific configuration options.
    fn apply_command_options(&mut self, cli: &Cli) {
        if let Commands::Serve {
            port, live_port, ..
        } = &cli.command
        {
            Self::update_option(&mut self.serve.port, port.as_ref());
            Self::update_option(&mut self.live.port, live_port.as_ref());
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Validate configuration, collecting all errors at once.
    pub fn validate(&self) -> Result<()> {
        let mut diag = ConfigDiagnostics::new();

        self.watch.validate(&mut diag);
        self.build.validate(&mut diag);

        diag.into_result()
            .map_err(|e| ConfigError::Diagnostics(e).into())
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config, panicking on unknown fields to catch typos in tests.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> ProjectConfig {
    let (parsed, ignored) = ProjectConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_from_str_invalid_toml() {
        assert!(ProjectConfig::from_str("[watch\nroot = \".\"").is_err());
    }

    #[test]
    fn test_unknown_fields_detected() {
        let content = "[watch]\ndebounce_ms = 50\n[unknown_section]\nfield = \"value\"";
        let (config, ignored) = ProjectConfig::parse_with_ignored(content).unwrap();

        assert_eq!(config.watch.debounce_ms, 50);
        assert!(ignored.iter().any(|f| f.contains("unknown_section")));
    }

    #[test]
    fn test_no_unknown_fields() {
        let (_, ignored) = ProjectConfig::parse_with_ignored("[live]\nport = 1").unwrap();
        assert!(ignored.is_empty());
    }

    #[test]
    fn test_finalize_resolves_against_root() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        let mut config = test_parse_config(
            "[watch]\nroot = \"src\"\n[modules]\npaths = [\"mods\"]\n[build]\noutput = \"dist\"",
        );
        config.finalize(dir.path());

        let root = dir.path().canonicalize().unwrap();
        assert_eq!(config.root, root);
        assert_eq!(config.watch.root, root.join("src"));
        assert_eq!(config.modules.paths, vec![root.join("mods")]);
        assert_eq!(
            config.modules.snapshot,
            root.join(".chtl/cache/module-registry.json")
        );
        assert_eq!(config.build.output, Path::new("dist"));
        // serve root falls back to the watch root
        assert_eq!(config.serve_root(), root.join("src"));
    }

    #[test]
    fn test_validate_collects_errors() {
        let config = test_parse_config(
            "[watch]\ndebounce_ms = 0\nextensions = []\n[build]\ncompiler = []\ntimeout_ms = 0",
        );
        let err = config.validate().unwrap_err();
        let Some(ConfigError::Diagnostics(diag)) = err.downcast_ref::<ConfigError>() else {
            panic!("expected diagnostics, got {err:?}");
        };
        let fields: Vec<_> = diag.errors().iter().map(|d| d.field).collect();
        assert_eq!(
            fields,
            vec![
                "watch.debounce_ms",
                "watch.extensions",
                "build.compiler",
                "build.timeout_ms"
            ]
        );
    }

    #[test]
    fn test_cli_overrides_ports() {
        let cli = Cli::parse_from(["chtl-live", "serve", "-p", "9000", "-l", "9001"]);
        let mut config = ProjectConfig::default();
        config.apply_command_options(&cli);
        assert_eq!(config.serve.port, 9000);
        assert_eq!(config.live.port, 9001);
    }
}
