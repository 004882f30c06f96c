//! Search control — per-move time budgeting and cooperative cancellation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Safety margin subtracted from a configured `movetime`.
pub const MARGIN_MS: u64 = 20;
/// Floor for any computed per-move budget.
pub const MIN_MOVE_TIME_MS: u64 = 200;
/// Assumed growth factor of the next iteration relative to the last one,
/// used by [`SearchControl::can_search_deeper`] to estimate whether there is
/// time left for one more ply.
pub const BRANCHING_FACTOR_ESTIMATE: u32 = 3;

/// Per-move time budget, computed once at the start of a search by
/// [`crate::time::allocate`].
#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    /// Milliseconds allocated to this move, or `None` if unbounded (`go infinite`).
    pub allocated: Option<Duration>,
    /// Remaining clock time for the side to move at the start of the search.
    pub own_time: Option<Duration>,
    /// Increment granted per move for the side to move.
    pub increment: Duration,
}

impl TimeBudget {
    /// A budget with no time pressure at all.
    pub fn unbounded() -> Self {
        Self {
            allocated: None,
            own_time: None,
            increment: Duration::ZERO,
        }
    }
}

/// Controls when an in-flight search should stop.
///
/// Grounded on the teacher's stop-flag + mutex-guarded start-time pattern: an
/// `Arc<AtomicBool>` cancellation token shared with a watcher thread, and a
/// `Mutex<Option<Instant>>` start time that `ponder_hit` rebases.
pub struct SearchControl {
    stopped: Arc<AtomicBool>,
    start: Mutex<Option<Instant>>,
    budget: TimeBudget,
    infinite: bool,
    pondering: AtomicBool,
    max_depth: Option<u8>,
    max_nodes: Option<u64>,
    last_interval_ms: AtomicU64,
}

impl SearchControl {
    /// Construct a new control. The clock starts immediately; pondering
    /// searches are rebased later by [`ponder_hit`](Self::ponder_hit).
    pub fn new(
        stopped: Arc<AtomicBool>,
        budget: TimeBudget,
        infinite: bool,
        pondering: bool,
        max_depth: Option<u8>,
        max_nodes: Option<u64>,
    ) -> Self {
        Self {
            stopped,
            start: Mutex::new(Some(Instant::now())),
            budget,
            infinite,
            pondering: AtomicBool::new(pondering),
            max_depth,
            max_nodes,
            last_interval_ms: AtomicU64::new(0),
        }
    }

    /// Elapsed time since the clock was (re)started.
    pub fn elapsed(&self) -> Duration {
        self.start
            .lock()
            .expect("start mutex poisoned")
            .map_or(Duration::ZERO, |s| s.elapsed())
    }

    /// Rebase the clock to "now" and clear the pondering flag (`ponderhit`).
    pub fn ponder_hit(&self) {
        *self.start.lock().expect("start mutex poisoned") = Some(Instant::now());
        self.pondering.store(false, Ordering::Release);
    }

    /// Whether the search is currently in ponder mode (clock not charged
    /// against the budget yet).
    pub fn is_pondering(&self) -> bool {
        self.pondering.load(Ordering::Acquire)
    }

    /// Record how long the just-finished iteration took; consulted by the
    /// next [`can_search_deeper`](Self::can_search_deeper) call's
    /// branching-factor estimate.
    pub fn record_iteration(&self, duration: Duration) {
        self.last_interval_ms
            .store(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Cooperative hard-stop check, polled periodically from inside the
    /// search hot path (every 2048 nodes, matching the teacher's cadence).
    pub fn should_stop(&self, nodes: u64) -> bool {
        if self.stopped.load(Ordering::Relaxed) {
            return true;
        }
        if nodes & 2047 != 0 {
            return false;
        }
        if self.pondering.load(Ordering::Acquire) || self.infinite {
            return false;
        }
        if let Some(allocated) = self.budget.allocated
            && self.elapsed() >= allocated
        {
            self.stopped.store(true, Ordering::Release);
            return true;
        }
        false
    }

    /// Iteration admission: may the driver start searching one ply deeper?
    ///
    /// See SPEC_FULL.md §4.4 for the exact rule set this implements.
    pub fn can_search_deeper(&self, depth: u8, nodes: u64) -> bool {
        if self.stopped.load(Ordering::Relaxed) {
            return false;
        }
        if self.pondering.load(Ordering::Acquire) {
            return true;
        }
        if let Some(max_depth) = self.max_depth
            && depth > max_depth
        {
            return false;
        }
        if let Some(max_nodes) = self.max_nodes
            && nodes > max_nodes
        {
            return false;
        }
        if self.infinite {
            return true;
        }

        let Some(allocated) = self.budget.allocated else {
            return true;
        };
        let elapsed = self.elapsed();
        if elapsed > allocated {
            return false;
        }

        let last_interval =
            Duration::from_millis(self.last_interval_ms.load(Ordering::Relaxed));
        let estimate = elapsed + last_interval * BRANCHING_FACTOR_ESTIMATE;
        if estimate > allocated + self.budget.increment {
            return false;
        }

        if let Some(own_time) = self.budget.own_time {
            let remaining = own_time.saturating_sub(elapsed);
            if estimate > remaining {
                return false;
            }
        }

        true
    }

    /// Reference to the shared cancellation token, for the watcher thread.
    pub fn stop_flag(&self) -> &Arc<AtomicBool> {
        &self.stopped
    }

    /// Time-only cancellation check, for the dedicated watcher thread that
    /// polls independently of node counts (unlike [`should_stop`](Self::should_stop),
    /// which is gated by a node-count cadence so the hot path only pays for
    /// the `Instant` read every 2048 nodes).
    pub fn watcher_tick(&self) {
        if self.pondering.load(Ordering::Acquire) || self.infinite {
            return;
        }
        if let Some(allocated) = self.budget.allocated
            && self.elapsed() >= allocated
        {
            self.stopped.store(true, Ordering::Release);
        }
    }
}
