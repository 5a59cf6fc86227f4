//! Background re-indexing of the module registry.
//!
//! One pass runs at a time. Requests made while a pass is running collapse
//! into a single follow-up pass, which reads the documents after every one of
//! those requests was made. Generations therefore land in order and the
//! snapshot file has a single writer.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::cli::modules::report_extraction;
use crate::log;
use crate::module::Registry;

pub(super) struct Reindexer {
    /// Capacity 1: a queued pass covers every later request
    tx: Option<mpsc::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Reindexer {
    /// Must be called from within a tokio runtime.
    pub fn start(registry: Arc<Registry>, roots: Vec<PathBuf>, snapshot: PathBuf) -> Self {
        let (tx, mut rx) = mpsc::channel::<()>(1);
        let task = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                let registry = Arc::clone(&registry);
                let roots = roots.clone();
                let snapshot = snapshot.clone();
                let pass = tokio::task::spawn_blocking(move || {
                    let report = registry.extract(&roots);
                    report_extraction(&report);
                    if let Err(e) = registry.save(&snapshot) {
                        log!("warning"; "{}", e);
                    }
                    log!("module"; "re-indexed {} modules", registry.current().len());
                });
                if let Err(e) = pass.await {
                    log!("error"; "module re-index failed: {}", e);
                }
            }
        });

        Self {
            tx: Some(tx),
            task: Some(task),
        }
    }

    /// Ask for a pass. Never blocks.
    pub fn request(&self) {
        if let Some(tx) = &self.tx {
            // full: a pass that has not started yet will pick this change up
            let _ = tx.try_send(());
        }
    }

    /// Let the running and queued passes finish, then stop.
    pub async fn shutdown(mut self) {
        self.tx.take();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Reindexer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
