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

//! The endgame tablebase oracle.
//!
//! The rest of the engine treats the tablebases as an opaque oracle behind
//! this interface: a win/draw/loss verdict for quiet probes inside the
//! search, and a ranked root move list for the primary worker. No probing
//! backend is compiled into this build, so [`init`] reports failure, every
//! probe declines to answer and the engine simply plays on; a backend only
//! needs to fill in these functions.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::{
    board::Board,
    error::SyzygyError,
    evaluation::{Eval, DRAW},
    movegen::MoveList,
};

/// The verdict of a WDL probe, from the side to move's point of view.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Wdl {
    Loss,
    /// A loss saved by the fifty-move rule.
    BlessedLoss,
    Draw,
    /// A win spoiled by the fifty-move rule.
    CursedWin,
    Win,
}

impl Wdl {
    /// Converts the verdict into a search score at `ply`.
    ///
    /// Cursed wins and blessed losses are draws under the fifty-move rule.
    pub fn to_score(self, ply: usize) -> Eval {
        match self {
            Self::Win => 2000 - ply as Eval,
            Self::Loss => -2000 + ply as Eval,
            _ => DRAW,
        }
    }
}

/// The piece count of the largest loaded table; zero while disabled.
static MAX_PIECES: AtomicU8 = AtomicU8::new(0);

/// Loads the tablebase files under `path`.
///
/// This build carries no probing backend, so any path is refused; the
/// caller reports the failure and continues without tablebases.
pub fn init(_path: &str) -> Result<(), SyzygyError> {
    Err(SyzygyError::BackendUnavailable)
}

/// Releases the loaded tables.
pub fn deinit() {
    MAX_PIECES.store(0, Ordering::Relaxed);
}

/// The piece count the loaded tables cover.
pub fn max_pieces() -> u8 {
    MAX_PIECES.load(Ordering::Relaxed)
}

/// Checks if `board` has few enough pieces for the loaded tables.
pub fn is_active(board: &Board) -> bool {
    let limit = max_pieces();
    limit != 0 && board.occupancies().count() <= u32::from(limit)
}

/// Probes the win/draw/loss tables.
pub fn probe_wdl(board: &Board) -> Option<Wdl> {
    debug_assert!(is_active(board), "probing with tablebases inactive");
    None
}

/// Fills `moves` with the root moves ranked best-first by WDL then DTZ.
///
/// Returns whether the probe succeeded. NOT thread safe; only the primary
/// worker may call it, and only at the root.
pub fn generate_root_moves(_board: &Board, _moves: &mut MoveList) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_oracle_stays_out_of_the_way() {
        assert!(init("/nonexistent/path").is_err());
        assert_eq!(max_pieces(), 0);
        assert!(!is_active(&Board::default()));

        let mut moves = MoveList::new();
        assert!(!generate_root_moves(&Board::default(), &mut moves));
        assert!(moves.is_empty());
    }

    #[test]
    fn wdl_scores_prefer_quick_wins() {
        assert!(Wdl::Win.to_score(2) > Wdl::Win.to_score(6));
        assert_eq!(Wdl::CursedWin.to_score(3), DRAW);
        assert_eq!(Wdl::BlessedLoss.to_score(3), DRAW);
        assert!(Wdl::Loss.to_score(2) < DRAW);
    }
}
