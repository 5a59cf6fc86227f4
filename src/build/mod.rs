//! Build orchestrator.
//!
//! Single entry point for all build requests, from the watcher or manual.
//!
//! Per file, at most one build is in flight and at most one is queued:
//!
//! ```text
//! request ──▶ queued slot ──(worker picks)──▶ in flight ──▶ BuildResult
//!               ▲   │
//!               │   └─ replaced by a newer request → old ticket: Superseded
//!               └───── filled while in flight → runs right after it
//! ```
//!
//! Different files build in parallel on a fixed pool of worker tasks.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::{Notify, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{debug, log};

mod process;
mod types;


pub use process::Compiler;
pub use types::{BuildError, BuildResponse, BuildResult, FailureReason, RequestId, Trigger};

/// Resolves once to the outcome of one `request_build` call.
#[derive(Debug)]
pub struct BuildTicket {
    id: RequestId,
    rx: oneshot::Receiver<BuildResponse>,
}

impl BuildTicket {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub async fn wait(self) -> BuildResponse {
        // a dropped sender means the orchestrator went away before starting it
        self.rx.await.unwrap_or(BuildResponse::Cancelled)
    }
}

pub struct Orchestrator {
    inner: Arc<Inner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

struct Inner {
    state: Mutex<State>,
    wakeup: Notify,
    compiler: Compiler,
    next_id: AtomicU64,
    /// Every completed result, in completion order
    sink: Option<mpsc::UnboundedSender<BuildResult>>,
    /// First configuration fault is an operator-visible error, later ones debug
    fault_reported: AtomicBool,
}

#[derive(Default)]
struct State {
    /// Paths with a queued request, in request order
    queue: VecDeque<PathBuf>,
    files: FxHashMap<PathBuf, FileSlot>,
    stopped: bool,
}

#[derive(Default)]
struct FileSlot {
    in_flight: bool,
    queued: Option<Request>,
}

struct Request {
    id: RequestId,
    trigger: Trigger,
    reply: oneshot::Sender<BuildResponse>,
}

impl Orchestrator {
    /// Start `workers` worker tasks (0 = available parallelism).
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        compiler: Compiler,
        workers: usize,
        sink: Option<mpsc::UnboundedSender<BuildResult>>,
    ) -> Self {
        let workers = if workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            workers
        };

        let inner = Arc::new(Inner {
            state: Mutex::new(State::default()),
            wakeup: Notify::new(),
            compiler,
            next_id: AtomicU64::new(1),
            sink,
            fault_reported: AtomicBool::new(false),
        });

        let handles = (0..workers)
            .map(|_| tokio::spawn(run_worker(Arc::clone(&inner))))
            .collect();

        debug!("build"; "started {} build workers", workers);
        Self {
            inner,
            workers: Mutex::new(handles),
        }
    }

    /// Queue a build of `source`.
    ///
    /// A request still waiting for an earlier one of the same file replaces
    /// it; the earlier ticket resolves to [`BuildResponse::Superseded`].
    pub fn request_build(&self, source: &Path, trigger: Trigger) -> BuildTicket {
        let id = RequestId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (reply, rx) = oneshot::channel();
        let ticket = BuildTicket { id, rx };

        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        if state.stopped {
            let _ = reply.send(BuildResponse::Cancelled);
            return ticket;
        }

        let slot = state.files.entry(source.to_path_buf()).or_default();
        let request = Request { id, trigger, reply };
        match slot.queued.replace(request) {
            Some(previous) => {
                debug!("build"; "{} supersedes {} for {}", id, previous.id, source.display());
                let _ = previous.reply.send(BuildResponse::Superseded);
            }
            // a path in flight is re-queued by its worker when done
            None if !slot.in_flight => state.queue.push_back(source.to_path_buf()),
            None => {}
        }
        drop(guard);

        self.inner.wakeup.notify_one();
        ticket
    }

    /// Drop the queued, unstarted request for `source`, if any.
    ///
    /// An in-flight build is left alone.
    pub fn cancel_pending(&self, source: &Path) -> bool {
        let mut state = self.inner.state.lock();
        let Some(slot) = state.files.get_mut(source) else {
            return false;
        };
        let Some(request) = slot.queued.take() else {
            return false;
        };
        if !slot.in_flight {
            state.files.remove(source);
        }
        state.queue.retain(|p| p != source);
        drop(state);

        debug!("build"; "cancelled {} for {}", request.id, source.display());
        let _ = request.reply.send(BuildResponse::Cancelled);
        true
    }

    /// Paths with a queued or in-flight build.
    #[cfg(test)]
    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().files.len()
    }

    /// Cancel all queued work and wait for in-flight builds to finish.
    ///
    /// Later requests resolve to [`BuildResponse::Cancelled`] at once.
    pub async fn shutdown(&self) {
        let cancelled: Vec<Request> = {
            let mut state = self.inner.state.lock();
            state.stopped = true;
            state.queue.clear();
            let cancelled = state
                .files
                .values_mut()
                .filter_map(|slot| slot.queued.take())
                .collect();
            state.files.retain(|_, slot| slot.in_flight);
            cancelled
        };
        for request in cancelled {
            let _ = request.reply.send(BuildResponse::Cancelled);
        }

        self.inner.wakeup.notify_waiters();
        let handles = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            let _ = handle.await;
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.inner.state.lock().stopped = true;
        self.inner.wakeup.notify_waiters();
    }
}

// =============================================================================
// Worker
// =============================================================================

async fn run_worker(inner: Arc<Inner>) {
    loop {
        // register interest before checking, so a notify in between isn't lost
        let notified = inner.wakeup.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let job = {
            let mut state = inner.state.lock();
            if state.stopped {
                return;
            }
            state.claim_next()
        };

        match job {
            Some((path, request)) => inner.execute(path, request).await,
            None => notified.await,
        }
    }
}

impl State {
    fn claim_next(&mut self) -> Option<(PathBuf, Request)> {
        while let Some(path) = self.queue.pop_front() {
            let Some(slot) = self.files.get_mut(&path) else {
                continue;
            };
            if slot.in_flight {
                continue;
            }
            if let Some(request) = slot.queued.take() {
                slot.in_flight = true;
                return Some((path, request));
            }
        }
        None
    }
}

impl Inner {
    async fn execute(&self, path: PathBuf, request: Request) {
        debug!("build"; "{} building {}", request.id, path.display());
        let result = self.compiler.run(&path, request.id, request.trigger).await;
        self.report_fault(&result);

        let requeued = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let next = if state.stopped {
                None
            } else {
                state.files.get_mut(&path).filter(|slot| slot.queued.is_some())
            };
            match next {
                Some(slot) => {
                    slot.in_flight = false;
                    state.queue.push_back(path.clone());
                    true
                }
                None => {
                    state.files.remove(&path);
                    false
                }
            }
        };
        if requeued {
            self.wakeup.notify_one();
        }

        if let Some(sink) = &self.sink {
            let _ = sink.send(result.clone());
        }
        let _ = request.reply.send(BuildResponse::Completed(result));
    }

    fn report_fault(&self, result: &BuildResult) {
        if result.failure_reason != FailureReason::ConfigurationFault {
            return;
        }
        if self.fault_reported.swap(true, Ordering::SeqCst) {
            debug!("build"; "{}", result.stderr);
        } else {
            log!("error"; "compiler unavailable: {}", result.stderr);
        }
    }
}
