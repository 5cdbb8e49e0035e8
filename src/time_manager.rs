/*
 * Riptide, a UCI-compatible chess engine
 * Copyright (C) 2025 Ewan Crawford
 *
 * Riptide is free software: you can redistribute it and/or modify it under
 * the terms of the GNU General Public License as published by the Free
 * Software Foundation, either version 3 of the License, or (at your option)
 * any later version.
 *
 * Riptide is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
 * FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
 * details.
 *
 * You should have received a copy of the GNU General Public License along
 * with Riptide. If not, see <https://www.gnu.org/licenses/>.
 */

use std::{
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::{Duration, Instant},
};

use crate::{
    board::Board,
    defs::Side,
    evaluation::Eval,
    movegen::Move,
};

/// The sentinel for "no limit".
const NO_LIMIT: u64 = u64::MAX;

/// Everything `go` can say about how long to think.
#[derive(Clone, Copy, Default)]
pub struct Limits {
    pub white_time: Option<Duration>,
    pub black_time: Option<Duration>,
    pub white_inc: Option<Duration>,
    pub black_inc: Option<Duration>,
    pub moves_to_go: Option<u32>,
    pub move_time: Option<Duration>,
    pub depth: Option<i32>,
    pub infinite: bool,
    pub ponder: bool,
}

/// An estimate of the moves still to come when the GUI gives none, indexed
/// by the fullmove number: a linear descent through the opening, flattening
/// out and trailing off in long games.
static MOVES_LEFT: [u8; 100] = make_moves_left();

/// Builds the moves-left estimate table.
const fn make_moves_left() -> [u8; 100] {
    let mut table = [0u8; 100];
    let mut fullmove = 0;
    while fullmove < 100 {
        table[fullmove] = if fullmove < 40 {
            (50 - fullmove) as u8
        } else if fullmove < 60 {
            (10 - (fullmove - 40) / 5) as u8
        } else if fullmove < 70 {
            (7 + (fullmove - 60) / 2) as u8
        } else if fullmove < 80 {
            9
        } else if fullmove < 90 {
            10
        } else {
            (11 + (fullmove - 90) / 10) as u8
        };
        fullmove += 1;
    }
    table
}

/// The worker-visible face of the time manager.
///
/// Everything in here is an atomic over a fixed epoch, so any worker can
/// poll the clock without locks. Only the engine (between searches) and
/// the primary worker (flagging the timeout, starting the clock on
/// `ponderhit`) ever write.
pub struct TimeKeeper {
    /// The fixed reference instant all the atomics count from.
    epoch: Instant,
    /// When the clock started, in ms since the epoch.
    start_ms: AtomicU64,
    /// The soft limit in ms, [`NO_LIMIT`] for none. Consulted between
    /// iterations.
    soft_ms: AtomicU64,
    /// The hard limit in ms, [`NO_LIMIT`] for none. Enforced inside the
    /// tree.
    hard_ms: AtomicU64,
    /// Raised once the hard limit passes; every worker polls it.
    timed_out: AtomicBool,
    /// While raised the clocks are parked: we are pondering.
    pondering: AtomicBool,
}

impl TimeKeeper {
    /// Creates a keeper with no limits set.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            start_ms: AtomicU64::new(0),
            soft_ms: AtomicU64::new(NO_LIMIT),
            hard_ms: AtomicU64::new(NO_LIMIT),
            timed_out: AtomicBool::new(false),
            pondering: AtomicBool::new(false),
        }
    }

    /// Milliseconds since the epoch.
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Arms the clock for a new search.
    pub fn start(&self, soft: Option<Duration>, hard: Option<Duration>, pondering: bool) {
        self.start_ms.store(self.now_ms(), Ordering::Relaxed);
        self.soft_ms.store(
            soft.map_or(NO_LIMIT, |limit| limit.as_millis() as u64),
            Ordering::Relaxed,
        );
        self.hard_ms.store(
            hard.map_or(NO_LIMIT, |limit| limit.as_millis() as u64),
            Ordering::Relaxed,
        );
        self.timed_out.store(false, Ordering::Relaxed);
        self.pondering.store(pondering, Ordering::Relaxed);
    }

    /// Time spent searching so far.
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.now_ms() - self.start_ms.load(Ordering::Relaxed))
    }

    /// Checks the hard limit and raises the timeout flag when it has
    /// passed. The primary worker calls this every couple of thousand
    /// nodes.
    pub fn update_timeout(&self) {
        if self.pondering.load(Ordering::Relaxed) {
            return;
        }
        let hard = self.hard_ms.load(Ordering::Relaxed);
        if hard != NO_LIMIT && self.now_ms() - self.start_ms.load(Ordering::Relaxed) >= hard {
            self.timed_out.store(true, Ordering::Relaxed);
        }
    }

    /// Whether the hard limit has passed. Lock free; polled from the search
    /// loop.
    pub fn has_timed_out(&self) -> bool {
        self.timed_out.load(Ordering::Relaxed)
    }

    /// Forces the timeout, for `stop`.
    pub fn stop(&self) {
        self.pondering.store(false, Ordering::Relaxed);
        self.timed_out.store(true, Ordering::Relaxed);
    }

    /// Whether the clocks are parked.
    pub fn is_pondering(&self) -> bool {
        self.pondering.load(Ordering::Relaxed)
    }

    /// The move we pondered on was played: the clock starts now.
    pub fn on_ponder_hit(&self) {
        self.start_ms.store(self.now_ms(), Ordering::Relaxed);
        self.pondering.store(false, Ordering::Relaxed);
    }

    /// The soft limit, if one is armed.
    fn soft_limit_ms(&self) -> Option<u64> {
        let soft = self.soft_ms.load(Ordering::Relaxed);
        (soft != NO_LIMIT).then_some(soft)
    }
}

/// The engine-side time manager: computes the limits for a search and
/// scales the soft limit by how stable the search looks.
///
/// Only the driver thread touches this; the workers see the clock through
/// the [`TimeKeeper`].
pub struct TimeManager {
    /// The PV move of the previous iteration.
    previous_pv_move: Option<Move>,
    /// The score of the previous iteration.
    previous_pv_score: Option<Eval>,
    /// Consecutive iterations with the same PV move.
    pv_move_stability: u32,
    /// Consecutive iterations with a near-identical score.
    pv_score_stability: u32,
    /// The current soft-limit multipliers.
    pv_move_factor: f64,
    pv_score_factor: f64,
    node_factor: f64,
}

/// A score within this margin of the previous iteration still counts as
/// stable.
const SCORE_STABILITY_MARGIN: Eval = 10;

/// Soft-limit multipliers by how long the PV move has been stable.
// pretty much standardized tables used by several engines (originally from
// Stash)
static PV_MOVE_STABILITY: [f64; 5] = [2.5, 1.2, 0.9, 0.8, 0.75];
/// Soft-limit multipliers by how long the score has been stable.
static PV_SCORE_STABILITY: [f64; 5] = [1.25, 1.15, 1.0, 0.94, 0.88];

impl TimeManager {
    /// Creates a manager with neutral factors.
    pub fn new() -> Self {
        Self {
            previous_pv_move: None,
            previous_pv_score: None,
            pv_move_stability: 0,
            pv_score_stability: 0,
            pv_move_factor: 1.0,
            pv_score_factor: 1.0,
            node_factor: 1.0,
        }
    }

    /// Computes the limits for a search and arms `keeper` with them.
    ///
    /// A fixed `movetime` pins both limits; with clock-style input the soft
    /// limit gets a fraction of an even time split and the hard limit a
    /// few multiples of it, both capped by a fraction of the remaining
    /// clock.
    pub fn setup(
        &mut self,
        keeper: &TimeKeeper,
        limits: &Limits,
        board: &Board,
        move_overhead: Duration,
    ) {
        *self = Self::new();

        let (time, inc) = if board.side_to_move() == Side::WHITE {
            (limits.white_time, limits.white_inc)
        } else {
            (limits.black_time, limits.black_inc)
        };

        if let Some(move_time) = limits.move_time {
            keeper.start(Some(move_time), Some(move_time), limits.ponder);
            return;
        }

        if limits.infinite || time.is_none() {
            // depth-limited and infinite searches run until told otherwise
            keeper.start(None, None, limits.ponder);
            return;
        }

        let time = time.unwrap_or_default().saturating_sub(move_overhead);
        let inc = inc.unwrap_or_default();

        let moves_to_go = limits.moves_to_go.unwrap_or_else(|| {
            u32::from(MOVES_LEFT[(board.fullmoves() as usize).min(MOVES_LEFT.len() - 1)])
        });

        let base = time / moves_to_go.max(1) + inc.mul_f64(0.75);
        let cap = time.mul_f64(0.75);

        let soft = cap.min(base.mul_f64(0.5));
        let hard = cap.min(base.mul_f64(3.0));

        keeper.start(Some(soft), Some(hard), limits.ponder);
    }

    /// Decides whether starting another iteration at `depth` is worth it.
    ///
    /// Depth one always runs so a move exists to play; after that the soft
    /// limit, scaled by the stability factors, decides.
    pub fn time_for_another_search(&self, keeper: &TimeKeeper, depth: i32) -> bool {
        if depth <= 1 {
            return true;
        }
        if keeper.has_timed_out() {
            return false;
        }
        if keeper.is_pondering() {
            return true;
        }
        let Some(soft) = keeper.soft_limit_ms() else {
            return true;
        };

        let mut scale = self.pv_move_factor * self.node_factor;
        // early scores swing wildly; only trust their stability later
        if depth >= 7 {
            scale *= self.pv_score_factor;
        }

        (keeper.elapsed().as_millis() as f64) < soft as f64 * scale
    }

    /// Feeds one finished iteration into the stability tracking.
    ///
    /// A PV move that keeps being best, a score that stops moving and a
    /// best move that soaks up most of the nodes all shrink the soft limit.
    pub fn update_stability(&mut self, pv_move: Move, pv_score: Eval, node_fraction: f64) {
        if self.previous_pv_move == Some(pv_move) {
            self.pv_move_stability += 1;
        } else {
            self.pv_move_stability = 0;
        }

        let stable_score = self.previous_pv_score.is_some_and(|previous| {
            (pv_score - previous).abs() <= SCORE_STABILITY_MARGIN
        });
        if stable_score {
            self.pv_score_stability += 1;
        } else {
            self.pv_score_stability = 0;
        }

        self.node_factor = (1.5 - node_fraction) * 1.7;
        self.pv_move_factor = PV_MOVE_STABILITY[(self.pv_move_stability as usize).min(4)];
        self.pv_score_factor = PV_SCORE_STABILITY[(self.pv_score_stability as usize).min(4)];

        self.previous_pv_move = Some(pv_move);
        self.previous_pv_score = Some(pv_score);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::Square;

    #[test]
    fn movetime_pins_both_limits() {
        let keeper = TimeKeeper::new();
        let mut manager = TimeManager::new();
        let limits = Limits {
            move_time: Some(Duration::from_millis(500)),
            ..Limits::default()
        };
        manager.setup(&keeper, &limits, &Board::default(), Duration::from_millis(50));

        assert_eq!(keeper.soft_ms.load(Ordering::Relaxed), 500);
        assert_eq!(keeper.hard_ms.load(Ordering::Relaxed), 500);
        assert!(!keeper.has_timed_out());
    }

    #[test]
    fn clock_input_leaves_headroom() {
        let keeper = TimeKeeper::new();
        let mut manager = TimeManager::new();
        let limits = Limits {
            white_time: Some(Duration::from_secs(60)),
            white_inc: Some(Duration::from_secs(1)),
            ..Limits::default()
        };
        manager.setup(&keeper, &limits, &Board::default(), Duration::from_millis(50));

        let soft = keeper.soft_ms.load(Ordering::Relaxed);
        let hard = keeper.hard_ms.load(Ordering::Relaxed);
        assert!(soft < hard);
        // never budget anywhere near the whole clock
        assert!(hard <= 45_000);
    }

    #[test]
    fn infinite_searches_never_time_out() {
        let keeper = TimeKeeper::new();
        let mut manager = TimeManager::new();
        let limits = Limits {
            infinite: true,
            ..Limits::default()
        };
        manager.setup(&keeper, &limits, &Board::default(), Duration::ZERO);

        keeper.update_timeout();
        assert!(!keeper.has_timed_out());
        assert!(manager.time_for_another_search(&keeper, 40));
    }

    #[test]
    fn stop_forces_the_timeout() {
        let keeper = TimeKeeper::new();
        keeper.start(None, None, false);
        keeper.stop();
        assert!(keeper.has_timed_out());
    }

    #[test]
    fn stability_walks_along_the_tables() {
        let mut manager = TimeManager::new();
        let mv = Move::new(Square(12), Square(28), Move::QUIET);

        manager.update_stability(mv, 20, 0.5);
        assert_eq!(manager.pv_move_stability, 0);
        let first_factor = manager.pv_move_factor;

        for _ in 0..5 {
            manager.update_stability(mv, 22, 0.5);
        }
        assert_eq!(manager.pv_move_stability, 5);
        assert!(manager.pv_move_factor < first_factor);
        assert!(manager.pv_score_factor < 1.0);

        // a new best move resets the count
        manager.update_stability(Move::new(Square(11), Square(27), Move::QUIET), 22, 0.5);
        assert_eq!(manager.pv_move_stability, 0);
    }

    #[test]
    fn pondering_parks_the_clock() {
        let keeper = TimeKeeper::new();
        keeper.start(Some(Duration::ZERO), Some(Duration::ZERO), true);
        keeper.update_timeout();
        assert!(!keeper.has_timed_out());

        keeper.on_ponder_hit();
        assert!(!keeper.is_pondering());
        keeper.update_timeout();
        assert!(keeper.has_timed_out());
    }
}
