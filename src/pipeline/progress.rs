// file: src/pipeline/progress.rs
// description: lock-guarded batch progress state, per-batch registry and terminal rendering
// reference: uses indicatif for progress bars and parking_lot for the shared record

use dashmap::DashMap;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

pub type BatchId = Uuid;

/// Point-in-time view handed to pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub current: usize,
    pub total: usize,
    pub percentage: usize,
    pub status: String,
}

impl ProgressSnapshot {
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.current >= self.total
    }
}

#[derive(Debug, Default)]
struct ProgressState {
    current: usize,
    total: usize,
    status: String,
}

/// One exclusive lock covers the whole record, so a snapshot never mixes two updates.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    state: Mutex<ProgressState>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self, total: usize) {
        let mut state = self.state.lock();
        state.current = 0;
        state.total = total;
        state.status = "starting".to_string();
    }

    /// `current` is clamped to `total`.
    pub fn update(&self, current: usize, status: impl Into<String>) {
        let mut state = self.state.lock();
        state.current = current.min(state.total);
        state.status = status.into();
    }

    /// Marks the batch complete; the state stays until the next reset.
    pub fn finish(&self, status: impl Into<String>) {
        let mut state = self.state.lock();
        state.current = state.total;
        state.status = status.into();
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.state.lock();
        let percentage = if state.total > 0 {
            state.current * 100 / state.total
        } else {
            0
        };

        ProgressSnapshot {
            current: state.current,
            total: state.total,
            percentage,
            status: state.status.clone(),
        }
    }
}

/// Tracker for one batch, shared between the worker and its pollers.
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    id: BatchId,
    tracker: Arc<ProgressTracker>,
}

impl ProgressHandle {
    /// A handle that is not registered anywhere.
    pub fn detached() -> Self {
        Self {
            id: Uuid::new_v4(),
            tracker: Arc::new(ProgressTracker::new()),
        }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.tracker.snapshot()
    }
}

const DEFAULT_RETAINED_BATCHES: usize = 32;

/// Progress records keyed by batch, so concurrent batches never overwrite each other.
///
/// Only the most recent `retained` batches are kept; starting another one replaces the oldest.
#[derive(Debug)]
pub struct ProgressRegistry {
    batches: DashMap<BatchId, Arc<ProgressTracker>>,
    order: Mutex<VecDeque<BatchId>>,
    retained: usize,
}

impl Default for ProgressRegistry {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETAINED_BATCHES)
    }
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retained: usize) -> Self {
        Self {
            batches: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            retained: retained.max(1),
        }
    }

    pub fn begin(&self, total: usize) -> ProgressHandle {
        let id = Uuid::new_v4();
        let tracker = Arc::new(ProgressTracker::new());
        tracker.reset(total);

        let mut order = self.order.lock();
        self.batches.insert(id, Arc::clone(&tracker));
        order.push_back(id);
        while order.len() > self.retained {
            if let Some(oldest) = order.pop_front() {
                self.batches.remove(&oldest);
            }
        }

        ProgressHandle { id, tracker }
    }

    pub fn snapshot(&self, id: &BatchId) -> Option<ProgressSnapshot> {
        self.batches.get(id).map(|tracker| tracker.snapshot())
    }

    /// Most recently started batch, for pollers that don't track ids.
    pub fn latest(&self) -> Option<(BatchId, ProgressSnapshot)> {
        let id = *self.order.lock().back()?;
        self.snapshot(&id).map(|snapshot| (id, snapshot))
    }

    pub fn forget(&self, id: &BatchId) -> bool {
        let mut order = self.order.lock();
        order.retain(|kept| kept != id);
        self.batches.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

/// Renders snapshots onto a terminal progress bar.
pub struct ProgressView {
    bar: ProgressBar,
}

impl ProgressView {
    pub fn new(colored: bool) -> Self {
        let bar = ProgressBar::new(0);
        let template = if colored {
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}"
        } else {
            "{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}"
        };
        if let Ok(style) = ProgressStyle::default_bar().template(template) {
            let chars = if colored { "█▓▒░" } else { "=>-" };
            bar.set_style(style.progress_chars(chars));
        }
        Self { bar }
    }

    pub fn render(&self, snapshot: &ProgressSnapshot) {
        self.bar.set_length(snapshot.total as u64);
        self.bar.set_position(snapshot.current as u64);
        self.bar.set_message(snapshot.status.clone());
    }

    pub fn finish(&self, snapshot: &ProgressSnapshot) {
        self.render(snapshot);
        self.bar.finish_with_message(snapshot.status.clone());
    }
}
