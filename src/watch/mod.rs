//! Source watcher.
//!
//! Watches a directory tree and delivers debounced [`ChangeEvent`]s.
//!
//! Architecture:
//! ```text
//! notify thread → bridge thread → watch task (Filter → Debouncer) → subscriber
//! ```
//!
//! The notify watcher is created and attached before [`subscribe`] returns,
//! so edits made while the caller runs its initial build are buffered, not
//! lost.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::utils::fs::normalize_path;

// Pure timing and deduplication.
mod debouncer;
// Extension, exclusion and temp-file rules.
mod filter;
// Shared event types.
mod types;


use debouncer::Debouncer;
pub use filter::WatchFilter;
pub use types::{ChangeEvent, ChangeKind, WatchError};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub extensions: Vec<String>,
    pub exclude: Vec<String>,
    pub debounce: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["chtl".into()],
            exclude: [".git", "node_modules", "target", "dist"]
                .map(String::from)
                .to_vec(),
            debounce: Duration::from_millis(100),
        }
    }
}

/// A live watch. Dropping it (or calling [`unsubscribe`](Self::unsubscribe))
/// stops the OS watcher and the watch task.
pub struct WatchSubscription {
    root: PathBuf,
    events: mpsc::Receiver<Result<ChangeEvent, WatchError>>,
    watcher: Option<RecommendedWatcher>,
    task: JoinHandle<()>,
}

impl WatchSubscription {
    /// Next event. `None` once the watch loop has ended.
    ///
    /// After an `Err` the loop is gone; the caller decides whether to
    /// subscribe again.
    pub async fn recv(&mut self) -> Option<Result<ChangeEvent, WatchError>> {
        self.events.recv().await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Release the OS watch handles and stop the watch task.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        // dropping the watcher closes the notify channel, ending the bridge thread
        self.watcher.take();
        self.task.abort();
    }
}

impl Drop for WatchSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// Start watching `root` recursively.
///
/// Must be called from within a tokio runtime.
pub fn subscribe(root: &Path, options: WatchOptions) -> Result<WatchSubscription, WatchError> {
    if !root.is_dir() {
        return Err(WatchError::MissingRoot(root.to_path_buf()));
    }
    let root = normalize_path(root);

    let (notify_tx, notify_rx) = std::sync::mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = notify_tx.send(res);
    })?;
    watcher.watch(&root, RecursiveMode::Recursive)?;

    // Sync -> async bridge
    let (raw_tx, raw_rx) = mpsc::channel::<notify::Result<notify::Event>>(CHANNEL_CAPACITY);
    std::thread::spawn(move || {
        while let Ok(result) = notify_rx.recv() {
            if raw_tx.blocking_send(result).is_err() {
                break; // watch task gone
            }
        }
    });

    let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let filter = WatchFilter::new(&options.extensions, &options.exclude);
    let debouncer = Debouncer::new(options.debounce);
    let task = tokio::spawn(run(root.clone(), filter, debouncer, raw_rx, event_tx));

    crate::debug!("watch"; "watching {}", root.display());

    Ok(WatchSubscription {
        root,
        events: event_rx,
        watcher: Some(watcher),
        task,
    })
}

async fn run(
    root: PathBuf,
    filter: WatchFilter,
    mut debouncer: Debouncer,
    mut raw_rx: mpsc::Receiver<notify::Result<notify::Event>>,
    event_tx: mpsc::Sender<Result<ChangeEvent, WatchError>>,
) {
    loop {
        tokio::select! {
            biased;
            raw = raw_rx.recv() => match raw {
                Some(Ok(event)) => {
                    let now = Instant::now();
                    for (path, kind) in classify(&event) {
                        let path = normalize_path(&path);
                        if !filter.matches(&root, &path) {
                            continue;
                        }
                        crate::debug!("watch"; "raw {}: {}", kind.label(), path.display());
                        if let Some(immediate) = debouncer.add(path, kind, now)
                            && event_tx.send(Ok(immediate)).await.is_err()
                        {
                            return;
                        }
                    }
                }
                Some(Err(e)) => {
                    let _ = event_tx.send(Err(WatchError::Notify(e))).await;
                    return;
                }
                None => return,
            },
            _ = tokio::time::sleep(debouncer.sleep_duration(Instant::now())) => {
                for event in debouncer.take_ready(Instant::now()) {
                    if event_tx.send(Ok(event)).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// Map a raw notify event to per-path changes.
///
/// Metadata-only changes and access events yield nothing. Renames become a
/// delete of the old name and a create of the new one.
fn classify(event: &notify::Event) -> Vec<(PathBuf, ChangeKind)> {
    use notify::EventKind;
    use notify::event::{ModifyKind, RenameMode};

    let all = |kind: ChangeKind| -> Vec<(PathBuf, ChangeKind)> {
        event.paths.iter().map(|p| (p.clone(), kind)).collect()
    };

    match event.kind {
        EventKind::Create(_) => all(ChangeKind::Created),
        EventKind::Remove(_) => all(ChangeKind::Deleted),
        // Ignore metadata-only changes (mtime/atime/chmod noise)
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => all(ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => all(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut changes = Vec::with_capacity(2);
            if let Some(from) = event.paths.first() {
                changes.push((from.clone(), ChangeKind::Deleted));
            }
            if let Some(to) = event.paths.get(1) {
                changes.push((to.clone(), ChangeKind::Created));
            }
            changes
        }
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| {
                let kind = if p.exists() {
                    ChangeKind::Created
                } else {
                    ChangeKind::Deleted
                };
                (p.clone(), kind)
            })
            .collect(),
        EventKind::Modify(_) => all(ChangeKind::Modified),
        _ => Vec::new(),
    }
}
