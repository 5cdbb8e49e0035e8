use super::{tuned, Eval, S};
use crate::{
    bitboard::Bitboard,
    board::Board,
    defs::{PieceType, Rank, Side, Square},
    lookups::LOOKUPS,
};

/// The ranks on which a minor piece counts as an outpost, per side.
static OUTPOST_RANKS: [Bitboard; 2] = [
    Bitboard(0x0000_ffff_ff00_0000),
    Bitboard(0x0000_00ff_ffff_0000),
];

/// The two long diagonals.
const LONG_DIAGONALS: Bitboard = Bitboard(0x8142_2418_1824_4281);
/// The four centre squares.
const CENTRE: Bitboard = Bitboard(0x0000_0018_1800_0000);

/// Attack information accumulated while the piece terms run, consumed by
/// the king-safety and threat terms.
pub struct EvalContext {
    /// The squares each side's pawns attack.
    pawn_attacks: [Bitboard; 2],
    /// The squares around each side's own king.
    king_zone: [Bitboard; 2],
    /// Attacks of each side, by piece type.
    attacked_by: [[Bitboard; PieceType::TOTAL]; 2],
    /// The union of each side's attacks.
    attacks: [Bitboard; 2],
    /// How many attacked squares each side has inside the enemy king zone.
    king_zone_hits: [usize; 2],
}

impl EvalContext {
    /// Prepares the context: pawn attacks and king zones.
    pub fn new(board: &Board) -> Self {
        let mut ctx = Self {
            pawn_attacks: [Bitboard::empty(); 2],
            king_zone: [Bitboard::empty(); 2],
            attacked_by: [[Bitboard::empty(); PieceType::TOTAL]; 2],
            attacks: [Bitboard::empty(); 2],
            king_zone_hits: [0; 2],
        };
        for side in [Side::WHITE, Side::BLACK] {
            let pawns = board.piece_bb(side, PieceType::PAWN);
            let pushed = forward(side, pawns);
            let attacks = pushed.east() | pushed.west();
            ctx.pawn_attacks[side.to_index()] = attacks;
            ctx.attacked_by[side.to_index()][PieceType::PAWN.to_index()] = attacks;
            ctx.attacks[side.to_index()] = attacks;
            ctx.king_zone[side.to_index()] = LOOKUPS.king_attacks(board.king_square(side));
        }
        ctx.king_zone_hits[Side::WHITE.to_index()] =
            (ctx.pawn_attacks[0] & ctx.king_zone[1]).count() as usize;
        ctx.king_zone_hits[Side::BLACK.to_index()] =
            (ctx.pawn_attacks[1] & ctx.king_zone[0]).count() as usize;
        ctx
    }
}

/// Shifts a bitboard one rank towards the opponent of `side`.
fn forward(side: Side, bb: Bitboard) -> Bitboard {
    if side.is_white() {
        bb.north()
    } else {
        bb.south()
    }
}

/// The pawn and king structure score, white minus black.
///
/// Everything here depends only on the pawns and kings, so the result is
/// cached under the king-pawn hash.
pub fn pawn_structure(board: &Board) -> S {
    let mut score = S::default();
    for side in [Side::WHITE, Side::BLACK] {
        let us = side_score(board, side);
        score += if side.is_white() { us } else { -us };
    }
    score
}

/// One side's pawn and king structure.
fn side_score(board: &Board, side: Side) -> S {
    let mut score = S::default();
    let pawns = board.piece_bb(side, PieceType::PAWN);
    let enemy_pawns = board.piece_bb(side.flip(), PieceType::PAWN);
    let king_square = board.king_square(side);

    let pushed = forward(side, pawns);
    let own_pawn_attacks = pushed.east() | pushed.west();

    for square in pawns {
        let square_bb = Bitboard::from(square);
        let relative = relative_square(side, square);

        score += tuned::PIECE_VALUES[PieceType::PAWN.to_index()];
        score += tuned::PSQT_PAWNS[relative.to_index()];

        if (pawns & Bitboard::file_bb(square.file())).count() > 1 {
            score += tuned::DOUBLED_PAWN;
        }
        if (pawns & LOOKUPS.adjacent_files(square)).is_empty() {
            score += tuned::ISOLATED_PAWN;
        }
        if (enemy_pawns & LOOKUPS.passed_mask(side, square)).is_empty() {
            score += tuned::PASSED_PAWN[square.relative_rank(side).0 as usize];
        }
        if !(LOOKUPS.passed_mask(side, king_square) & square_bb).is_empty() {
            let distance = square.rank().0.abs_diff(king_square.rank().0).clamp(1, 3);
            score += tuned::PAWN_SHIELD[distance as usize - 1];
        }
        if !(pawns & square_bb.east()).is_empty() {
            score += tuned::PAWN_PHALANX;
        }
        if !(own_pawn_attacks & square_bb).is_empty() {
            score += tuned::PROTECTED_PAWN;
        }
    }

    score += tuned::PSQT_KINGS[relative_square(side, king_square).to_index()];
    score
}

/// The material, placement, mobility, outpost and file terms of the
/// knights, bishops, rooks, queens and kings, white minus black.
///
/// Fills the context's attack sets and king-zone hit counts as it walks,
/// and adds each non-pawn piece into `phase`.
pub fn piece_terms(board: &Board, ctx: &mut EvalContext, phase: &mut Eval) -> S {
    let mut score = S::default();
    for side in [Side::WHITE, Side::BLACK] {
        let us = single_side_pieces(board, ctx, phase, side);
        score += if side.is_white() { us } else { -us };
    }
    score
}

/// All non-pawn piece terms of one side.
fn single_side_pieces(
    board: &Board,
    ctx: &mut EvalContext,
    phase: &mut Eval,
    side: Side,
) -> S {
    let mut score = S::default();
    let occupancies = board.occupancies();
    let us_bb = board.side_bb(side);
    let pawns = board.piece_bb(side, PieceType::PAWN);
    let enemy_pawns = board.piece_bb(side.flip(), PieceType::PAWN);
    let all_pawns = pawns | enemy_pawns;
    let enemy_zone = ctx.king_zone[side.flip().to_index()];

    let track = |ctx: &mut EvalContext, piece: PieceType, attacks: Bitboard| {
        ctx.attacked_by[side.to_index()][piece.to_index()] |= attacks;
        ctx.attacks[side.to_index()] |= attacks;
        ctx.king_zone_hits[side.to_index()] += (attacks & enemy_zone).count() as usize;
    };

    let knights = board.piece_bb(side, PieceType::KNIGHT);
    for square in knights {
        *phase += Eval::from(PieceType::KNIGHT.phase_value());
        score += tuned::PIECE_VALUES[PieceType::KNIGHT.to_index()];
        score += tuned::PSQT_KNIGHTS[relative_square(side, square).to_index()];

        let attacks = LOOKUPS.knight_attacks(square);
        track(ctx, PieceType::KNIGHT, attacks);
        score += tuned::KNIGHT_MOBILITY[(attacks & !us_bb).count() as usize];

        if is_outpost(side, square, ctx.pawn_attacks[side.to_index()], enemy_pawns) {
            score += tuned::KNIGHT_OUTPOST;
        }
    }

    let bishops = board.piece_bb(side, PieceType::BISHOP);
    if bishops.count() >= 2 {
        score += tuned::BISHOP_PAIR;
    }
    for square in bishops {
        *phase += Eval::from(PieceType::BISHOP.phase_value());
        score += tuned::PIECE_VALUES[PieceType::BISHOP.to_index()];
        score += tuned::PSQT_BISHOPS[relative_square(side, square).to_index()];

        let attacks = LOOKUPS.bishop_attacks(square, occupancies);
        track(ctx, PieceType::BISHOP, attacks);
        score += tuned::BISHOP_MOBILITY[(attacks.count() as usize).min(13)];

        if is_outpost(side, square, ctx.pawn_attacks[side.to_index()], enemy_pawns) {
            score += tuned::BISHOP_OUTPOST;
        }

        // pawns stuck on the bishop's colour complex blunt it
        let same_colour = if (Bitboard::from(square) & Bitboard(0x55aa_55aa_55aa_55aa)).is_empty() {
            pawns & Bitboard(0xaa55_aa55_aa55_aa55)
        } else {
            pawns & Bitboard(0x55aa_55aa_55aa_55aa)
        };
        score += tuned::BAD_BISHOP[(same_colour.count() as usize).min(8)];

        if !(Bitboard::from(square) & LONG_DIAGONALS).is_empty()
            && !(attacks & CENTRE).is_empty()
        {
            score += tuned::BISHOP_LONG_DIAGONAL;
        }
    }

    let seventh = Bitboard::rank_bb(if side.is_white() { Rank::R7 } else { Rank::R2 });
    let eighth = Bitboard::rank_bb(if side.is_white() { Rank::R8 } else { Rank::R1 });
    let enemy_king = board.piece_bb(side.flip(), PieceType::KING);
    for square in board.piece_bb(side, PieceType::ROOK) {
        *phase += Eval::from(PieceType::ROOK.phase_value());
        score += tuned::PIECE_VALUES[PieceType::ROOK.to_index()];
        score += tuned::PSQT_ROOKS[relative_square(side, square).to_index()];

        let attacks = LOOKUPS.rook_attacks(square, occupancies);
        track(ctx, PieceType::ROOK, attacks);
        score += tuned::ROOK_MOBILITY[(attacks.count() as usize).min(14)];

        let file = Bitboard::file_bb(square.file());
        if (all_pawns & file).is_empty() {
            score += tuned::ROOK_OPEN_FILE;
        } else if (pawns & file).is_empty() {
            score += tuned::ROOK_SEMI_OPEN_FILE;
        }

        if !(Bitboard::from(square) & seventh).is_empty()
            && (!(enemy_pawns & seventh).is_empty() || !(enemy_king & eighth).is_empty())
        {
            score += tuned::ROOK_ON_SEVENTH;
        }
    }

    for square in board.piece_bb(side, PieceType::QUEEN) {
        *phase += Eval::from(PieceType::QUEEN.phase_value());
        score += tuned::PIECE_VALUES[PieceType::QUEEN.to_index()];
        score += tuned::PSQT_QUEENS[relative_square(side, square).to_index()];

        let attacks = LOOKUPS.queen_attacks(square, occupancies);
        track(ctx, PieceType::QUEEN, attacks);
        score += tuned::QUEEN_MOBILITY[(attacks.count() as usize).min(27)];

        let file = Bitboard::file_bb(square.file());
        if (all_pawns & file).is_empty() {
            score += tuned::QUEEN_OPEN_FILE;
        } else if (pawns & file).is_empty() {
            score += tuned::QUEEN_SEMI_OPEN_FILE;
        }
    }

    let king_square = board.king_square(side);
    let king_attacks = LOOKUPS.king_attacks(king_square);
    track(ctx, PieceType::KING, king_attacks);
    // virtual mobility: pretend the king is a queen and count the lines
    // sliders could use against it
    let virtual_moves = LOOKUPS.queen_attacks(king_square, occupancies);
    score += tuned::KING_VIRTUAL_MOBILITY[(virtual_moves.count() as usize).min(27)];

    score
}

/// Checks if `square` is an outpost for `side`: on the outpost ranks,
/// defended by a pawn and out of reach of enemy pawns forever.
fn is_outpost(side: Side, square: Square, own_pawn_attacks: Bitboard, enemy_pawns: Bitboard) -> bool {
    let square_bb = Bitboard::from(square);
    !(square_bb & OUTPOST_RANKS[side.to_index()]).is_empty()
        && !(square_bb & own_pawn_attacks).is_empty()
        && (enemy_pawns & LOOKUPS.passed_mask(side, square) & LOOKUPS.adjacent_files(square))
            .is_empty()
}

/// King-zone pressure and checking chances, white minus black.
pub fn king_safety(board: &Board, ctx: &EvalContext) -> S {
    let mut score = S::default();
    for side in [Side::WHITE, Side::BLACK] {
        let us = single_side_king_safety(board, ctx, side);
        score += if side.is_white() { us } else { -us };
    }
    score
}

/// One side's attacking chances against the enemy king.
fn single_side_king_safety(board: &Board, ctx: &EvalContext, side: Side) -> S {
    let mut score = S::default();
    let them = side.flip();
    let occupancies = board.occupancies();
    let enemy_king = board.king_square(them);

    score += tuned::KING_ZONE_ATTACKS[ctx.king_zone_hits[side.to_index()].min(15)];

    // where each piece type could deliver a check from
    let knight_checks = LOOKUPS.knight_attacks(enemy_king);
    let bishop_checks = LOOKUPS.bishop_attacks(enemy_king, occupancies);
    let rook_checks = LOOKUPS.rook_attacks(enemy_king, occupancies);
    let check_squares = [
        knight_checks,
        bishop_checks,
        rook_checks,
        bishop_checks | rook_checks,
    ];

    for (index, &squares) in check_squares.iter().enumerate() {
        let piece = PieceType(index as u8 + 1);
        let candidates =
            ctx.attacked_by[side.to_index()][piece.to_index()] & squares & !board.side_bb(side);
        if candidates.is_empty() {
            continue;
        }
        let safe = candidates & !ctx.attacks[them.to_index()];
        score += scaled(tuned::SAFE_CHECK[index], safe.count());
        score += scaled(tuned::UNSAFE_CHECK[index], (candidates ^ safe).count());
    }

    score
}

/// Threats against loose enemy pieces and pawn-push threats, white minus
/// black.
pub fn threats(board: &Board, ctx: &EvalContext) -> S {
    let mut score = S::default();
    for side in [Side::WHITE, Side::BLACK] {
        let us = single_side_threats(board, ctx, side);
        score += if side.is_white() { us } else { -us };
    }
    score
}

/// One side's threats.
fn single_side_threats(board: &Board, ctx: &EvalContext, side: Side) -> S {
    let mut score = S::default();
    let them = side.flip();
    let our_attacks = ctx.attacks[side.to_index()];
    let their_pawn_cover = ctx.pawn_attacks[them.to_index()];

    let weak_pawns =
        board.piece_bb(them, PieceType::PAWN) & !their_pawn_cover & our_attacks;
    score += scaled(tuned::WEAK_PAWN_ATTACKED, weak_pawns.count());

    let minors =
        board.piece_bb(them, PieceType::KNIGHT) | board.piece_bb(them, PieceType::BISHOP);
    let weak_minors = minors & !their_pawn_cover & our_attacks;
    score += scaled(tuned::WEAK_MINOR_ATTACKED, weak_minors.count());

    let cheap_attacks = ctx.attacked_by[side.to_index()][PieceType::PAWN.to_index()]
        | ctx.attacked_by[side.to_index()][PieceType::KNIGHT.to_index()]
        | ctx.attacked_by[side.to_index()][PieceType::BISHOP.to_index()];
    let harassed_rooks = board.piece_bb(them, PieceType::ROOK) & cheap_attacks;
    score += scaled(tuned::WEAK_ROOK_ATTACKED, harassed_rooks.count());

    // pawns that can step forward safely and hit a piece
    let pushes = forward(side, board.piece_bb(side, PieceType::PAWN))
        & !board.occupancies()
        & !their_pawn_cover;
    let push_attacks = forward(side, pushes).east() | forward(side, pushes).west();
    let threatened =
        push_attacks & (board.side_bb(them) ^ board.piece_bb(them, PieceType::PAWN));
    score += scaled(tuned::PAWN_PUSH_THREAT, threatened.count());

    score
}

/// A weight applied `count` times.
fn scaled(weight: S, count: u32) -> S {
    S(weight.0 * count as i32, weight.1 * count as i32)
}

/// The square from `side`'s point of view: White reads the PSQTs directly,
/// Black reads them vertically flipped.
fn relative_square(side: Side, square: Square) -> Square {
    if side.is_white() {
        square
    } else {
        square.flip()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outposts_need_pawn_support_and_safety() {
        // knight on d5, supported by c4 pawn, no black pawns to chase it
        let board: Board = "4k3/8/8/3N4/2P5/8/8/4K3 w - - 0 1".parse().unwrap();
        let ctx = EvalContext::new(&board);
        assert!(is_outpost(
            Side::WHITE,
            Square(35),
            ctx.pawn_attacks[0],
            board.piece_bb(Side::BLACK, PieceType::PAWN),
        ));

        // the e7 pawn can eventually play e6 and evict it
        let board: Board = "4k3/4p3/8/3N4/2P5/8/8/4K3 w - - 0 1".parse().unwrap();
        let ctx = EvalContext::new(&board);
        assert!(!is_outpost(
            Side::WHITE,
            Square(35),
            ctx.pawn_attacks[0],
            board.piece_bb(Side::BLACK, PieceType::PAWN),
        ));
    }

    #[test]
    fn passed_pawns_score_by_rank() {
        let far: Board = "4k3/8/1P6/8/8/8/8/4K3 w - - 0 1".parse().unwrap();
        let near: Board = "4k3/8/8/8/8/1P6/8/4K3 w - - 0 1".parse().unwrap();
        let far_score = pawn_structure(&far);
        let near_score = pawn_structure(&near);
        assert!(far_score.1 > near_score.1, "{far_score:?} vs {near_score:?}");
    }

    #[test]
    fn structure_is_antisymmetric() {
        let board: Board = "4k3/pp6/8/8/8/8/PP6/4K3 w - - 0 1".parse().unwrap();
        assert_eq!(pawn_structure(&board), S::default());
    }
}
