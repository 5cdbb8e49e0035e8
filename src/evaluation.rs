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

use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use crate::{
    board::Board,
    defs::{PieceType, Side},
};
pub use pawn_cache::PawnCache;
use terms::{king_safety, piece_terms, threats, EvalContext};

/// A king-pawn-hash-keyed cache of the pawn and king structure score.
mod pawn_cache;
/// The individual evaluation terms.
mod terms;
/// The tuned weight blob.
pub mod tuned;

/// The result of an evaluation, in centipawns.
pub type Eval = i32;

/// The highest representable score.
pub const INF: Eval = 30_000;
/// The score of delivering mate at the root.
pub const MATE: Eval = 20_000;
/// Scores at or above this magnitude are mate scores.
pub const MATE_BOUND: Eval = 19_000;
/// The score of a draw.
pub const DRAW: Eval = 0;
/// The sentinel stored in the transposition table when no search score is
/// known. Outside the valid score range.
pub const NO_SCORE: i16 = i16::MIN;

/// The phase value of the starting material; greater values (from early
/// promotions) are clamped to it.
pub const MAX_PHASE: Eval = 24;

/// A blend of a middlegame and an endgame value.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct S(pub i32, pub i32);

impl Add for S {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0, self.1 + rhs.1)
    }
}

impl AddAssign for S {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
        self.1 += rhs.1;
    }
}

impl Sub for S {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0, self.1 - rhs.1)
    }
}

impl SubAssign for S {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
        self.1 -= rhs.1;
    }
}

impl Neg for S {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0, -self.1)
    }
}

/// The score if we mate after `ply` halfmoves.
pub const fn mate_in(ply: usize) -> Eval {
    MATE - ply as Eval
}

/// The score if we are mated after `ply` halfmoves.
pub const fn mated_in(ply: usize) -> Eval {
    -MATE + ply as Eval
}

/// Checks if a score is within mating range of either side.
pub const fn is_mate_score(score: Eval) -> bool {
    score >= MATE_BOUND || score <= -MATE_BOUND
}

/// The number of full moves to the mate a score promises, negative if we are
/// the one being mated.
pub const fn mate_distance(score: Eval) -> Eval {
    if score > 0 {
        (MATE - score) / 2 + 1
    } else {
        -((MATE + score) / 2 + 1)
    }
}

/// A draw score lightly jittered by the node count, steering the search
/// away from blindly shuffling into repetitions.
pub const fn draw_jitter(nodes: u64) -> Eval {
    1 - (nodes & 2) as Eval
}

/// Statically evaluates the position from the side to move's point of view.
///
/// White-minus-black terms are accumulated as `(mg, eg)` pairs, tapered by
/// the remaining material and finally signed for the mover. The pawn and
/// king structure sub-score is served from `cache` when the king-pawn hash
/// hits.
pub fn evaluate(board: &Board, cache: &mut PawnCache) -> Eval {
    let mut ctx = EvalContext::new(board);

    let structure = cache.probe_or_insert(board.kp_hash(), || terms::pawn_structure(board));

    let mut phase = 0;
    let mut score = structure;
    score += piece_terms(board, &mut ctx, &mut phase);
    score += king_safety(board, &ctx);
    score += threats(board, &ctx);

    score += if board.side_to_move().is_white() {
        tuned::TEMPO
    } else {
        -tuned::TEMPO
    };

    let eval = taper(score, phase, scale_factor(board));

    if board.side_to_move().is_white() {
        eval
    } else {
        -eval
    }
}

/// Blends the middlegame and endgame halves of `score` by the phase, with
/// the endgame half attenuated by `scale` (out of 128).
fn taper(score: S, phase: Eval, scale: Eval) -> Eval {
    let phase = phase.min(MAX_PHASE);
    (score.0 * phase + score.1 * (MAX_PHASE - phase) * scale / 128) / MAX_PHASE
}

/// The endgame scale factor: opposite-coloured-bishop endings are notorious
/// draws, so their endgame half is halved.
fn scale_factor(board: &Board) -> Eval {
    const LIGHT_SQUARES: crate::bitboard::Bitboard =
        crate::bitboard::Bitboard(0x55aa_55aa_55aa_55aa);

    let white_bishops = board.piece_bb(Side::WHITE, PieceType::BISHOP);
    let black_bishops = board.piece_bb(Side::BLACK, PieceType::BISHOP);

    let only_bishops = board.piece_bb(Side::WHITE, PieceType::KNIGHT).is_empty()
        && board.piece_bb(Side::BLACK, PieceType::KNIGHT).is_empty()
        && board.piece_bb(Side::WHITE, PieceType::ROOK).is_empty()
        && board.piece_bb(Side::BLACK, PieceType::ROOK).is_empty()
        && board.piece_bb(Side::WHITE, PieceType::QUEEN).is_empty()
        && board.piece_bb(Side::BLACK, PieceType::QUEEN).is_empty();

    if only_bishops
        && white_bishops.count() == 1
        && black_bishops.count() == 1
        && (white_bishops & LIGHT_SQUARES).is_empty() != (black_bishops & LIGHT_SQUARES).is_empty()
    {
        64
    } else {
        128
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::STARTPOS;

    #[test]
    fn startpos_is_roughly_balanced() {
        let board: Board = STARTPOS.parse().unwrap();
        let mut cache = PawnCache::new();
        let eval = evaluate(&board, &mut cache);
        // the mover keeps the tempo bonus and nothing else
        assert!(eval.abs() < 50, "startpos evaluated at {eval}");
    }

    #[test]
    fn evaluation_is_symmetric_in_sign() {
        let board: Board = "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3"
            .parse()
            .unwrap();
        let mirrored: Board = "rnbqkb1r/pppp1ppp/5n2/4p3/4P3/2N5/PPPP1PPP/R1BQKBNR b KQkq - 2 3"
            .parse()
            .unwrap();
        let mut cache = PawnCache::new();
        assert_eq!(
            evaluate(&board, &mut cache),
            evaluate(&mirrored, &mut PawnCache::new()),
        );
    }

    #[test]
    fn extra_material_shows_up() {
        // white is a whole queen up
        let board: Board = "4k3/8/8/8/8/8/8/Q3K3 w - - 0 1".parse().unwrap();
        let mut cache = PawnCache::new();
        assert!(evaluate(&board, &mut cache) > 300);

        // and from black's point of view it's bleak
        let board: Board = "4k3/8/8/8/8/8/8/Q3K3 b - - 0 1".parse().unwrap();
        assert!(evaluate(&board, &mut PawnCache::new()) < -300);
    }

    #[test]
    fn mate_score_helpers() {
        assert!(is_mate_score(mate_in(3)));
        assert!(is_mate_score(mated_in(5)));
        assert!(!is_mate_score(250));
        assert_eq!(mate_distance(MATE - 1), 1);
        assert_eq!(mate_distance(-(MATE - 2)), -2);
    }

    #[test]
    fn draw_jitter_stays_tiny() {
        for nodes in 0..8 {
            assert!(draw_jitter(nodes).abs() <= 1);
        }
    }
}
