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

use crate::{
    bitboard::Bitboard,
    board::Board,
    defs::{PieceType, Side},
    evaluation::Eval,
    movegen::Move,
};

/// Static exchange evaluation of `mv`: the material outcome of a full
/// swap-off on the destination square, in centipawns from the mover's point
/// of view.
///
/// Each side always recaptures with its least valuable attacker; sliders
/// revealed by a departing piece join the exchange. Non-captures score 0.
pub fn see(board: &Board, mv: Move) -> Eval {
    if mv.is_castling() || (!mv.is_capture() && !mv.is_promotion()) {
        return 0;
    }

    let target = mv.end();
    let mut gain: [Eval; 32] = [0; 32];
    let mut depth = 0;

    // the mover is assumed to have landed on the target already
    let mut occupancy = board.occupancies() ^ Bitboard::from(mv.start());
    let mut attackers = board.attackers_to(target, occupancy) & occupancy;

    gain[0] = if mv.is_en_passant() {
        PieceType::PAWN.see_value()
    } else {
        board
            .piece_kind_on(board.side_to_move().flip(), target)
            .map_or(0, PieceType::see_value)
    };

    // the piece the next capture wins; a queen promotion stands on the
    // square as a queen
    let mut on_square = if mv.promotion_piece() == Some(PieceType::QUEEN) {
        PieceType::QUEEN
    } else {
        board
            .piece_kind_on(board.side_to_move(), mv.start())
            .unwrap_or(PieceType::PAWN)
    };

    let mut side = board.side_to_move();
    while !attackers.is_empty() {
        side = side.flip();
        let Some((attacker, from_bb)) = least_valuable_attacker(board, attackers, side) else {
            break;
        };

        depth += 1;
        gain[depth] = on_square.see_value() - gain[depth - 1];
        on_square = attacker;

        occupancy ^= from_bb;
        attackers = board.attackers_to(target, occupancy) & occupancy;
    }

    while depth > 0 {
        gain[depth - 1] = -((-gain[depth - 1]).max(gain[depth]));
        depth -= 1;
    }

    gain[0]
}

/// The cheapest piece of `side` among `attackers`, with its square bit.
fn least_valuable_attacker(
    board: &Board,
    attackers: Bitboard,
    side: Side,
) -> Option<(PieceType, Bitboard)> {
    for piece in 0..PieceType::TOTAL as u8 {
        let piece = PieceType(piece);
        let mut subset = attackers & board.piece_bb(side, piece);
        if !subset.is_empty() {
            return Some((piece, subset.pop_lsb()));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movegen::{generate_moves, MoveKind, MoveList};

    fn capture_with(board: &Board, text: &str) -> Move {
        let mut moves = MoveList::new();
        generate_moves::<{ MoveKind::CAPTURES }>(board, &mut moves);
        let result = moves
            .iter()
            .find(|mv| mv.to_string() == text)
            .unwrap_or_else(|| panic!("{text} not generated"));
        result
    }

    #[test]
    fn undefended_pawn_is_worth_a_pawn() {
        let board: Board = "1k1r4/1pp4p/p7/4p3/8/P5P1/1PP4P/2K1R3 w - - 0 1"
            .parse()
            .unwrap();
        assert_eq!(see(&board, capture_with(&board, "e1e5")), 100);
    }

    #[test]
    fn defended_pawn_loses_the_rook() {
        // the e5 pawn is guarded by the d6 pawn
        let board: Board = "1k1r4/1pp4p/p2p4/4p3/8/P5P1/1PP4P/2K1R3 w - - 0 1"
            .parse()
            .unwrap();
        assert_eq!(see(&board, capture_with(&board, "e1e5")), 100 - 642);
    }

    #[test]
    fn recapture_chains_balance_out() {
        // NxP, PxN: pawn for knight
        let board: Board = "4k3/8/2p5/3p4/8/2N5/8/4K3 w - - 0 1".parse().unwrap();
        assert_eq!(see(&board, capture_with(&board, "c3d5")), 100 - 422);
    }

    #[test]
    fn quiet_moves_score_zero() {
        let board = Board::default();
        let mut moves = MoveList::new();
        generate_moves::<{ MoveKind::PSEUDO_LEGAL }>(&board, &mut moves);
        for mv in moves.iter() {
            assert_eq!(see(&board, mv), 0, "{mv}");
        }
    }

    #[test]
    fn xray_attackers_join_in() {
        // rook takes d5 pawn; the defence wins it back, the doubled rook
        // recaptures: net a pawn for a rook against two defended captures
        let board: Board = "1k1r4/3r4/8/3p4/8/8/3R4/1K1R4 w - - 0 1".parse().unwrap();
        // RxP, rxR, RxR, rxR: 100 - 642 + 642 - 642 < 0 after
        // back-propagation the capture is losing
        assert!(see(&board, capture_with(&board, "d2d5")) < 0);
    }
}
