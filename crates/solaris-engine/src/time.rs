//! Time management — convert UCI `go` clock parameters into a per-move budget.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use solaris_core::Color;

use crate::search::control::{SearchControl, TimeBudget, MARGIN_MS, MIN_MOVE_TIME_MS};

/// Compute the per-move time budget from clock parameters and the current
/// game phase.
///
/// - `movetime` overrides everything: `allocated = movetime - margin`.
/// - With `moves_to_go`: `own_time / moves_to_go - margin + lead`.
/// - Sudden death otherwise: `t = clamp(own_time * max(0.6, phase), MIN_MOVE_TIME, 500_000)`,
///   `allocated = max(MIN_MOVE_TIME, -1e-7*t^2 + 0.07*t + 100) + lead`.
/// - `lead = clamp((own_time - opp_time) * 0.2, 0, 4000)`.
/// - No clock info at all -> unbounded.
pub fn allocate(
    own_time: Option<Duration>,
    opp_time: Option<Duration>,
    increment: Duration,
    moves_to_go: Option<u32>,
    movetime: Option<Duration>,
    phase: f64,
) -> TimeBudget {
    if let Some(mt) = movetime {
        let allocated = mt.saturating_sub(Duration::from_millis(MARGIN_MS));
        return TimeBudget {
            allocated: Some(allocated),
            own_time,
            increment,
        };
    }

    let Some(own) = own_time else {
        return TimeBudget::unbounded();
    };

    let own_ms = own.as_millis() as f64;
    let opp_ms = opp_time.map_or(own_ms, |d| d.as_millis() as f64);
    let lead_ms = ((own_ms - opp_ms) * 0.2).clamp(0.0, 4000.0);

    let allocated_ms = if let Some(mtg) = moves_to_go.filter(|&m| m > 0) {
        own_ms / mtg as f64 - MARGIN_MS as f64 + lead_ms
    } else {
        let t = (own_ms * phase.max(0.6)).clamp(MIN_MOVE_TIME_MS as f64, 500_000.0);
        (-1e-7 * t * t + 0.07 * t + 100.0).max(MIN_MOVE_TIME_MS as f64) + lead_ms
    };
    // A computed budget must never be zero or negative — practical floor,
    // not part of the formula itself.
    let allocated_ms = allocated_ms.max(1.0);

    TimeBudget {
        allocated: Some(Duration::from_millis(allocated_ms as u64)),
        own_time: Some(own),
        increment,
    }
}

/// Build a [`SearchControl`] from UCI `go` parameters, the side to move, and
/// the current game phase (used by the sudden-death budget formula).
#[allow(clippy::too_many_arguments)]
pub fn limits_from_go(
    wtime: Option<Duration>,
    btime: Option<Duration>,
    winc: Option<Duration>,
    binc: Option<Duration>,
    movestogo: Option<u32>,
    movetime: Option<Duration>,
    infinite: bool,
    ponder: bool,
    max_depth: Option<u8>,
    max_nodes: Option<u64>,
    side: Color,
    phase: f64,
    stopped: Arc<AtomicBool>,
) -> SearchControl {
    let (own_time, own_inc) = match side {
        Color::White => (wtime, winc),
        Color::Black => (btime, binc),
    };
    let opp_time = match side {
        Color::White => btime,
        Color::Black => wtime,
    };

    if infinite {
        return SearchControl::new(stopped, TimeBudget::unbounded(), true, ponder, max_depth, max_nodes);
    }

    let increment = own_inc.unwrap_or(Duration::ZERO);
    let budget = allocate(own_time, opp_time, increment, movestogo, movetime, phase);
    SearchControl::new(stopped, budget, false, ponder, max_depth, max_nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movetime_overrides_everything() {
        let budget = allocate(
            Some(Duration::from_secs(300)),
            Some(Duration::from_secs(300)),
            Duration::ZERO,
            None,
            Some(Duration::from_millis(500)),
            0.5,
        );
        assert_eq!(budget.allocated, Some(Duration::from_millis(480)));
    }

    #[test]
    fn moves_to_go_uses_even_split() {
        let budget = allocate(
            Some(Duration::from_secs(60)),
            Some(Duration::from_secs(60)),
            Duration::ZERO,
            Some(10),
            None,
            0.3,
        );
        // 60000 / 10 - 20 + 0 (lead=0 since equal clocks) = 5980ms
        assert_eq!(budget.allocated, Some(Duration::from_millis(5980)));
    }

    #[test]
    fn lead_rewards_time_advantage() {
        let ahead = allocate(
            Some(Duration::from_secs(60)),
            Some(Duration::from_secs(30)),
            Duration::ZERO,
            Some(10),
            None,
            0.3,
        );
        let even = allocate(
            Some(Duration::from_secs(60)),
            Some(Duration::from_secs(60)),
            Duration::ZERO,
            Some(10),
            None,
            0.3,
        );
        assert!(ahead.allocated.unwrap() > even.allocated.unwrap());
    }

    #[test]
    fn sudden_death_respects_min_move_time() {
        let budget = allocate(
            Some(Duration::from_millis(100)),
            Some(Duration::from_millis(100)),
            Duration::ZERO,
            None,
            None,
            0.5,
        );
        assert!(budget.allocated.unwrap() >= Duration::from_millis(200));
    }

    #[test]
    fn sudden_death_scales_with_phase() {
        let opening = allocate(
            Some(Duration::from_secs(300)),
            Some(Duration::from_secs(300)),
            Duration::ZERO,
            None,
            None,
            0.0,
        );
        let endgame = allocate(
            Some(Duration::from_secs(300)),
            Some(Duration::from_secs(300)),
            Duration::ZERO,
            None,
            None,
            1.0,
        );
        // Both use max(0.6, phase) so opening and a mild endgame phase differ
        // only once phase pushes past 0.6.
        assert!(endgame.allocated.unwrap() >= opening.allocated.unwrap());
    }

    #[test]
    fn no_clock_info_is_unbounded() {
        let budget = allocate(None, None, Duration::ZERO, None, None, 0.0);
        assert!(budget.allocated.is_none());
    }

    #[test]
    fn limits_from_go_infinite_ignores_clock() {
        let stopped = Arc::new(AtomicBool::new(false));
        let control = limits_from_go(
            Some(Duration::from_secs(1)),
            Some(Duration::from_secs(1)),
            None,
            None,
            None,
            None,
            true,
            false,
            None,
            None,
            Color::White,
            0.0,
            stopped,
        );
        assert!(control.can_search_deeper(1000, 0));
    }

    #[test]
    fn limits_from_go_builds_timed_budget() {
        let stopped = Arc::new(AtomicBool::new(false));
        let control = limits_from_go(
            Some(Duration::from_secs(300)),
            Some(Duration::from_secs(300)),
            Some(Duration::from_secs(2)),
            Some(Duration::from_secs(2)),
            None,
            None,
            false,
            false,
            None,
            None,
            Color::White,
            0.1,
            stopped,
        );
        assert!(control.can_search_deeper(1, 1));
    }
}
