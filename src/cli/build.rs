//! `build` command: compile the given sources once.
//!
//! Uses the same orchestrator as `serve`, so sources build in parallel up to
//! `build.workers` and each gets a classified [`BuildResult`].

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};

use crate::build::{BuildResponse, BuildResult, FailureReason, Orchestrator, Trigger};
use crate::cli::common::{collect_sources, display_path, plural_count};
use crate::config::ProjectConfig;
use crate::log;

/// Build every source under `paths` (default: the watch root).
///
/// Returns `false` if any build failed.
pub async fn build_paths(config: &ProjectConfig, paths: &[PathBuf]) -> Result<bool> {
    let sources = if paths.is_empty() {
        let mut sources = collect_sources(std::slice::from_ref(&config.watch.root), &config.watch.filter());
        sources.retain(|source| !config.is_module_path(source));
        sources
    } else {
        collect_sources(paths, &config.watch.filter())
    };
    if sources.is_empty() {
        log!("build"; "no sources found");
        return Ok(true);
    }

    let compiler = config
        .build
        .compiler()
        .context("build.compiler is empty")?;
    let orchestrator = Orchestrator::start(compiler, config.build.workers, None);

    let started = Instant::now();
    let tickets: Vec<_> = sources
        .iter()
        .map(|source| orchestrator.request_build(source, Trigger::Manual))
        .collect();

    let mut failed = 0usize;
    for ticket in tickets {
        match ticket.wait().await {
            BuildResponse::Completed(result) => {
                if !report(&result, config) {
                    failed += 1;
                }
            }
            // paths are deduplicated, so nothing can supersede
            BuildResponse::Superseded | BuildResponse::Cancelled => failed += 1,
        }
    }
    orchestrator.shutdown().await;

    let total = sources.len();
    if failed == 0 {
        log!("build"; "built {} in {:.2?}", plural_count(total, "file"), started.elapsed());
    } else {
        log!("error"; "{} of {} failed", failed, plural_count(total, "file"));
    }
    Ok(failed == 0)
}

fn report(result: &BuildResult, config: &ProjectConfig) -> bool {
    let source = display_path(&result.source_path, &config.root);

    match result.failure_reason {
        FailureReason::None => {
            let artifact = result
                .output_artifact_path
                .as_deref()
                .map(|p| display_path(p, &config.root))
                .unwrap_or_default();
            log!("build"; "{} → {} ({:.0?})", source, artifact, result.duration);
            true
        }
        FailureReason::CompilerRejected => {
            let code = result.exit_code.map_or_else(|| "signal".into(), |c| c.to_string());
            log!("error"; "{} (exit {})", source, code);
            print_diagnostics(result.diagnostics());
            false
        }
        FailureReason::Timeout => {
            log!("error"; "{} timed out after {:.1?}", source, result.duration);
            false
        }
        // logged once by the orchestrator
        FailureReason::ConfigurationFault => false,
    }
}

fn print_diagnostics(text: &str) {
    let text = text.trim_end();
    if !text.is_empty() {
        eprintln!("{text}");
    }
}
