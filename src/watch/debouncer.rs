use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime};

use rustc_hash::FxHashMap;

use super::types::{ChangeEvent, ChangeKind};

/// Idle sleep when nothing is pending.
const IDLE: Duration = Duration::from_secs(86400);

struct Pending {
    kind: ChangeKind,
    /// Arrival order of the first raw event, used for flush order
    seq: u64,
    last_seen: Instant,
    observed: SystemTime,
}

/// Per-path debouncer: only handles timing and event deduplication.
///
/// A path becomes ready once no raw event arrived for it during `window`.
/// Deletes never wait.
pub(super) struct Debouncer {
    window: Duration,
    pending: FxHashMap<PathBuf, Pending>,
    next_seq: u64,
}

impl Debouncer {
    pub(super) fn new(window: Duration) -> Self {
        Self {
            window,
            pending: FxHashMap::default(),
            next_seq: 0,
        }
    }

    /// Record a raw change. Returns an event to emit right away (deletes only).
    ///
    /// Rules:
    /// - Delete → drop whatever is pending for the path, emit immediately
    /// - Created + Modified → Created
    /// - Modified + Created → Modified (atomic save of a known file)
    pub(super) fn add(&mut self, path: PathBuf, kind: ChangeKind, now: Instant) -> Option<ChangeEvent> {
        if kind == ChangeKind::Deleted {
            if let Some(dropped) = self.pending.remove(&path) {
                crate::debug!("watch"; "discard pending {}: {}", dropped.kind.label(), path.display());
            }
            return Some(ChangeEvent {
                path,
                timestamp: SystemTime::now(),
                kind,
            });
        }

        if let Some(pending) = self.pending.get_mut(&path) {
            pending.last_seen = now;
            pending.observed = SystemTime::now();
            return None;
        }

        self.pending.insert(
            path,
            Pending {
                kind,
                seq: self.next_seq,
                last_seen: now,
                observed: SystemTime::now(),
            },
        );
        self.next_seq += 1;
        None
    }

    /// Remove and return every path whose window elapsed, in first-seen order.
    pub(super) fn take_ready(&mut self, now: Instant) -> Vec<ChangeEvent> {
        let window = self.window;
        let ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, p)| now.saturating_duration_since(p.last_seen) >= window)
            .map(|(path, _)| path.clone())
            .collect();

        let mut events: Vec<(u64, ChangeEvent)> = ready
            .into_iter()
            .filter_map(|path| {
                let pending = self.pending.remove(&path)?;
                Some((
                    pending.seq,
                    ChangeEvent {
                        path,
                        timestamp: pending.observed,
                        kind: pending.kind,
                    },
                ))
            })
            .collect();
        events.sort_by_key(|(seq, _)| *seq);
        events.into_iter().map(|(_, event)| event).collect()
    }

    /// Time until the earliest pending path becomes ready.
    pub(super) fn sleep_duration(&self, now: Instant) -> Duration {
        self.pending
            .values()
            .map(|p| self.window.saturating_sub(now.saturating_duration_since(p.last_seen)))
            .min()
            .map_or(IDLE, |d| d.max(Duration::from_millis(1)))
    }

    pub(super) fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
