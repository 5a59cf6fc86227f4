//! `[modules]` section configuration.
//!
//! ```toml
//! [modules]
//! paths = ["modules"]                               # Module roots
//! snapshot = ".chtl/cache/module-registry.json"    # Registry cache
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulesConfig {
    /// Each direct child directory of a root is a module.
    pub paths: Vec<PathBuf>,
    pub snapshot: PathBuf,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            paths: vec![PathBuf::from("modules")],
            snapshot: PathBuf::from(".chtl/cache/module-registry.json"),
        }
    }
}
