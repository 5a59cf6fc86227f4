use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::reindex::Reindexer;
use crate::build::{BuildResult, FailureReason, Orchestrator, Trigger};
use crate::cli::common::display_path;
use crate::config::ProjectConfig;
use crate::live::{LiveMessage, LiveServer};
use crate::logger::{status_error, status_success};
use crate::module::Registry;
use crate::watch::{ChangeEvent, ChangeKind, WatchError};
use crate::{debug, log};

/// Routes watcher events and build results between the components.
pub(super) struct Session {
    root: PathBuf,
    module_roots: Vec<PathBuf>,
    orchestrator: Orchestrator,
    live: LiveServer,
    reindexer: Reindexer,
}

impl Session {
    /// Must be called from within a tokio runtime.
    pub fn new(config: &ProjectConfig, orchestrator: Orchestrator, live: LiveServer, registry: Registry) -> Self {
        let reindexer = Reindexer::start(
            Arc::new(registry),
            config.modules.paths.clone(),
            config.modules.snapshot.clone(),
        );
        Self {
            root: config.root.clone(),
            module_roots: config.modules.paths.clone(),
            orchestrator,
            live,
            reindexer,
        }
    }

    pub fn on_watch(&self, event: Result<ChangeEvent, WatchError>) {
        match event {
            Ok(event) => self.on_change(event),
            // builds already queued still run; `build` keeps working
            Err(e) => log!("error"; "watcher stopped: {}", e),
        }
    }

    fn on_change(&self, event: ChangeEvent) {
        let path = display_path(&event.path, &self.root);
        debug!("watch"; "{} {}", event.kind.label(), path);

        if self.is_module_document(&event.path) {
            self.reindexer.request();
            return;
        }

        match event.kind {
            ChangeKind::Created | ChangeKind::Modified => {
                let ticket = self.orchestrator.request_build(&event.path, Trigger::Watch);
                debug!("build"; "queued {} {}", ticket.id(), path);
            }
            ChangeKind::Deleted => {
                if self.orchestrator.cancel_pending(&event.path) {
                    debug!("build"; "dropped queued build of {}", path);
                }
            }
        }
    }

    pub fn on_result(&self, result: &BuildResult) {
        let source = display_path(&result.source_path, &self.root);
        match result.failure_reason {
            FailureReason::None => {
                let reached = self.live.broadcast(LiveMessage::Reload);
                status_success(&format!("built {source}"));
                debug!("live"; "reload sent to {} clients", reached);
            }
            FailureReason::CompilerRejected => {
                status_error(&format!("failed to build {source}"), result.diagnostics());
            }
            FailureReason::Timeout => {
                status_error(
                    &format!("build of {source} timed out"),
                    &format!("compiler killed after {:.1?}", result.duration),
                );
            }
            // reported once by the orchestrator
            FailureReason::ConfigurationFault => {}
        }
    }

    fn is_module_document(&self, path: &Path) -> bool {
        self.module_roots.iter().any(|root| path.starts_with(root))
    }

    /// Stop taking work and let in-flight builds finish.
    ///
    /// Results that complete meanwhile are still reported; returns how many.
    pub async fn shutdown(self, results: &mut mpsc::UnboundedReceiver<BuildResult>) -> usize {
        self.orchestrator.shutdown().await;

        let mut reported = 0;
        while let Ok(result) = results.try_recv() {
            self.on_result(&result);
            reported += 1;
        }

        self.reindexer.shutdown().await;
        let mut live = self.live;
        live.stop();
        reported
    }
}
