use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Identity of one `request_build` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Who asked for a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Watch,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureReason {
    None,
    /// Compiler ran and exited non-zero
    CompilerRejected,
    /// Killed after exceeding the build timeout
    Timeout,
    /// Compiler could not be launched at all
    ConfigurationFault,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    pub request: RequestId,
    pub trigger: Trigger,
    pub source_path: PathBuf,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub output_artifact_path: Option<PathBuf>,
    #[serde(rename = "durationMs", serialize_with = "as_millis")]
    pub duration: Duration,
    pub failure_reason: FailureReason,
}

fn as_millis<S: serde::Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u128(duration.as_millis())
}

impl BuildResult {
    /// Compiler diagnostics: stderr, or stdout when stderr is empty.
    pub fn diagnostics(&self) -> &str {
        if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// What a [`BuildTicket`](super::BuildTicket) resolves to.
#[derive(Debug, Clone)]
pub enum BuildResponse {
    Completed(BuildResult),
    /// A newer request for the same file replaced this one before it started.
    Superseded,
    /// Dropped before starting (`cancel_pending` or shutdown).
    Cancelled,
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("compiler command is empty")]
    EmptyCommand,
}
