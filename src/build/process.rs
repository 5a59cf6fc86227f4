//! External compiler invocation.
//!
//! `<program> [args...] <source> -o <output dir>`, run from the source's
//! directory. Output is captured verbatim and never parsed.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;

use super::types::{BuildError, BuildResult, FailureReason, RequestId, Trigger};

#[derive(Debug, Clone)]
pub struct Compiler {
    program: String,
    args: Vec<String>,
    /// Relative paths are resolved against each source's directory
    output: PathBuf,
    timeout: Duration,
}

/// Why a compiler run never produced an exit status.
enum Launch {
    Fault(String),
    TimedOut,
}

impl Compiler {
    /// Build from a command vector: program first, then any leading args.
    pub fn from_slice(command: &[String], output: PathBuf, timeout: Duration) -> Result<Self, BuildError> {
        let (program, args) = command.split_first().ok_or(BuildError::EmptyCommand)?;
        if program.trim().is_empty() {
            return Err(BuildError::EmptyCommand);
        }
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            output,
            timeout,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn output_dir(&self, source: &Path) -> PathBuf {
        if self.output.is_absolute() {
            return self.output.clone();
        }
        source
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&self.output)
    }

    /// Run the compiler once and classify the outcome.
    pub(super) async fn run(&self, source: &Path, request: RequestId, trigger: Trigger) -> BuildResult {
        let started = Instant::now();
        let output_dir = self.output_dir(source);

        let mut result = BuildResult {
            request,
            trigger,
            source_path: source.to_path_buf(),
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            output_artifact_path: None,
            duration: Duration::ZERO,
            failure_reason: FailureReason::ConfigurationFault,
        };

        match self.execute(source, &output_dir).await {
            Ok(output) => {
                result.stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                result.stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                result.exit_code = output.status.code();
                if output.status.success() {
                    result.success = true;
                    result.failure_reason = FailureReason::None;
                    result.output_artifact_path = Some(artifact_path(source, &output_dir));
                } else {
                    result.failure_reason = FailureReason::CompilerRejected;
                }
            }
            Err(Launch::TimedOut) => {
                result.failure_reason = FailureReason::Timeout;
                result.stderr = format!(
                    "compiler exceeded {}ms and was killed",
                    self.timeout.as_millis()
                );
            }
            Err(Launch::Fault(message)) => {
                result.failure_reason = FailureReason::ConfigurationFault;
                result.stderr = message;
            }
        }

        result.duration = started.elapsed();
        result
    }

    async fn execute(&self, source: &Path, output_dir: &Path) -> Result<std::process::Output, Launch> {
        std::fs::create_dir_all(output_dir).map_err(|e| {
            Launch::Fault(format!(
                "cannot create output directory `{}`: {e}",
                output_dir.display()
            ))
        })?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(source)
            .arg("-o")
            .arg(output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = source.parent().filter(|d| !d.as_os_str().is_empty()) {
            cmd.current_dir(dir);
        }

        let child = cmd
            .spawn()
            .map_err(|e| Launch::Fault(format!("cannot launch `{}`: {e}", self.program)))?;

        // on timeout the child is dropped, and `kill_on_drop` kills it
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(Launch::Fault(format!(
                "failed to wait for `{}`: {e}",
                self.program
            ))),
            Err(_) => Err(Launch::TimedOut),
        }
    }
}

/// `<out>/<stem>.html` when the compiler wrote it, else the output directory.
fn artifact_path(source: &Path, output_dir: &Path) -> PathBuf {
    source
        .file_stem()
        .map(|stem| output_dir.join(format!("{}.html", stem.to_string_lossy())))
        .filter(|html| html.is_file())
        .unwrap_or_else(|| output_dir.to_path_buf())
}
