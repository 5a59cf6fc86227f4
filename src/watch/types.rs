use std::path::PathBuf;
use std::time::SystemTime;

use thiserror::Error;

/// What happened to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

/// One debounced change to a watched source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    /// When the last raw event for this change was observed.
    pub timestamp: SystemTime,
    pub kind: ChangeKind,
}

/// OS-level watch failure. Ends the watch loop.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watch root `{0}` does not exist")]
    MissingRoot(PathBuf),

    #[error("file watcher failed")]
    Notify(#[from] notify::Error),
}
