//! `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! compiler = ["chtl"]     # Program plus optional leading arguments
//! output = "dist"         # Relative to each source file's directory
//! timeout_ms = 30000      # Compiler runs longer than this are killed
//! workers = 0             # Concurrent compilers; 0 = available parallelism
//! ```
//!
//! The compiler is invoked as `<compiler...> <source> -o <output>`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::build::Compiler;
use crate::config::ConfigDiagnostics;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub compiler: Vec<String>,
    pub output: PathBuf,
    pub timeout_ms: u64,
    pub workers: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            compiler: vec!["chtl".into()],
            output: PathBuf::from("dist"),
            timeout_ms: 30_000,
            workers: 0,
        }
    }
}

impl BuildConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Compiler for this configuration, or `None` if the command is empty.
    pub fn compiler(&self) -> Option<Compiler> {
        Compiler::from_slice(&self.compiler, self.output.clone(), self.timeout()).ok()
    }

    /// Replace the program name with its full path when `PATH` has it.
    ///
    /// A program that can't be found is left untouched; spawning it later
    /// reports the fault.
    pub(crate) fn resolve_program(&mut self, root: &Path) {
        let Some(program) = self.compiler.first_mut() else {
            return;
        };
        let program_path = crate::utils::fs::resolve_path(Path::new(program.as_str()), root);
        let found = if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
            program_path.is_file().then_some(program_path)
        } else {
            which::which_in(program.as_str(), std::env::var_os("PATH"), root).ok()
        };
        if let Some(found) = found {
            *program = found.to_string_lossy().into_owned();
        }
    }

    pub(crate) fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.compiler.first().is_none_or(|p| p.trim().is_empty()) {
            diag.error_with_hint(
                "build.compiler",
                "compiler command must not be empty",
                r#"compiler = ["chtl"]"#,
            );
        }
        if self.timeout_ms == 0 {
            diag.error("build.timeout_ms", "timeout must be positive");
        }
    }
}
