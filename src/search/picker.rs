use super::tables::SearchTables;
use crate::{
    board::Board,
    defs::PieceType,
    evaluation::Eval,
    movegen::{generate_moves, Move, MoveKind, MoveList, MAX_MOVES},
    see::see,
    syzygy,
};

/// A large enough penalty to park underpromotions behind every quiet.
const UNDERPROMOTION_SCORE: Eval = -10_000;

/// The phases of move picking, walked strictly in order.
#[derive(Clone, Copy, Eq, PartialEq)]
enum Stage {
    /// Ask the tablebase oracle for ranked root moves.
    GenerateSyzygy,
    /// Yield the ranked tablebase moves as they come.
    Syzygy,
    /// Generate the pseudo-legal (or capture-only) moves.
    Generate,
    /// Yield the previous iteration's PV move for this ply.
    PvMove,
    /// Yield the transposition-table move.
    TtMove,
    /// Score the noisy moves.
    ScoreNoisy,
    /// Yield noisy moves that win or break even, best first.
    GoodNoisy,
    /// Yield the first killer.
    KillerOne,
    /// Yield the second killer.
    KillerTwo,
    /// Yield the counter to the opponent's last move.
    Counter,
    /// Yield the remaining quiets, best history first.
    History,
    /// Yield the losing noisy moves, least bad first.
    BadNoisy,
    /// Nothing left.
    Done,
}

/// A pull-based staged move picker.
///
/// Yields one move per call in the order the search wants to try them:
/// hash move, winning noisy moves, killers, the counter move, history
/// quiets, then the losing noisy moves. Yielded moves are struck out of the
/// list so no stage repeats one.
pub struct MovePicker<const KIND: u8> {
    stage: Stage,
    moves: MoveList,
    /// The SEE score of each generated move, promotion-adjusted. The sign
    /// splits good noisy from bad noisy.
    sees: [Eval; MAX_MOVES],
    /// The ordering score of each noisy move.
    scores: [Eval; MAX_MOVES],
    ply: usize,
    tt_move: Option<Move>,
    pv_move: Option<Move>,
    /// The opponent's previous move, for the counter-move stage.
    prev_move: Option<Move>,
    /// The piece index and destination of the previous move, for
    /// continuation history.
    prev_ctx: Option<(usize, crate::defs::Square)>,
    /// Raised by the search once static pruning decides no quiet can still
    /// matter; the killer, counter and history stages then fall through.
    skip_quiets: bool,
}

impl<const KIND: u8> MovePicker<KIND> {
    /// Creates a picker starting at move generation.
    pub fn new(
        ply: usize,
        tt_move: Option<Move>,
        pv_move: Option<Move>,
        prev_move: Option<Move>,
        prev_ctx: Option<(usize, crate::defs::Square)>,
    ) -> Self {
        let tt_move = if KIND == MoveKind::CAPTURES {
            // a quiet hash move has no business in a noisy-only walk
            tt_move.filter(|mv| mv.is_noisy())
        } else {
            tt_move
        };
        Self {
            stage: Stage::Generate,
            moves: MoveList::new(),
            sees: [0; MAX_MOVES],
            scores: [0; MAX_MOVES],
            ply,
            tt_move,
            pv_move,
            prev_move,
            prev_ctx,
            skip_quiets: false,
        }
    }

    /// Creates a picker that asks the tablebase oracle first. Root only,
    /// and only from the primary worker: the root probe is not thread safe.
    pub fn new_syzygy_root(tt_move: Option<Move>, pv_move: Option<Move>) -> Self {
        let mut picker = Self::new(0, tt_move, pv_move, None, None);
        picker.stage = Stage::GenerateSyzygy;
        picker
    }

    /// Stops the quiet stages from yielding anything further.
    pub fn skip_quiets(&mut self) {
        self.skip_quiets = true;
    }

    /// Whether the quiet stages are switched off.
    pub const fn is_skipping_quiets(&self) -> bool {
        self.skip_quiets
    }

    /// The next move to try, or [`None`] when every stage is exhausted.
    pub fn next(&mut self, board: &Board, tables: &SearchTables) -> Option<Move> {
        loop {
            match self.stage {
                Stage::GenerateSyzygy => {
                    self.stage = if syzygy::generate_root_moves(board, &mut self.moves) {
                        Stage::Syzygy
                    } else {
                        Stage::Generate
                    };
                }

                Stage::Syzygy => {
                    // ranked by the oracle: first remaining is best
                    for index in 0..self.moves.len() {
                        let mv = self.moves.get(index);
                        if !mv.is_null() {
                            self.moves.nullify(index);
                            return Some(mv);
                        }
                    }
                    self.stage = Stage::Done;
                }

                Stage::Generate => {
                    if KIND == MoveKind::CAPTURES {
                        generate_moves::<{ MoveKind::CAPTURES }>(board, &mut self.moves);
                    } else {
                        generate_moves::<{ MoveKind::PSEUDO_LEGAL }>(board, &mut self.moves);
                    }
                    self.stage = Stage::PvMove;
                }

                Stage::PvMove => {
                    self.stage = Stage::TtMove;
                    if let Some(mv) = self.take_exact(self.pv_move) {
                        return Some(mv);
                    }
                }

                Stage::TtMove => {
                    self.stage = Stage::ScoreNoisy;
                    if let Some(mv) = self.take_exact(self.tt_move) {
                        return Some(mv);
                    }
                }

                Stage::ScoreNoisy => {
                    self.score_noisy(board, tables);
                    self.stage = Stage::GoodNoisy;
                }

                Stage::GoodNoisy => {
                    if let Some(mv) = self.take_best_noisy(true) {
                        return Some(mv);
                    }
                    self.stage = if KIND == MoveKind::CAPTURES {
                        Stage::BadNoisy
                    } else {
                        Stage::KillerOne
                    };
                }

                Stage::KillerOne => {
                    self.stage = Stage::KillerTwo;
                    if !self.skip_quiets {
                        if let Some(mv) = self.take_quiet_exact(tables.killers(self.ply)[0]) {
                            return Some(mv);
                        }
                    }
                }

                Stage::KillerTwo => {
                    self.stage = Stage::Counter;
                    if !self.skip_quiets {
                        if let Some(mv) = self.take_quiet_exact(tables.killers(self.ply)[1]) {
                            return Some(mv);
                        }
                    }
                }

                Stage::Counter => {
                    self.stage = Stage::History;
                    if !self.skip_quiets {
                        if let Some(prev) = self.prev_move {
                            let counter = tables.counter_move(prev);
                            if let Some(mv) = self.take_quiet_exact(counter) {
                                return Some(mv);
                            }
                        }
                    }
                }

                Stage::History => {
                    if !self.skip_quiets {
                        if let Some(mv) = self.take_best_quiet(board, tables) {
                            return Some(mv);
                        }
                    }
                    self.stage = Stage::BadNoisy;
                }

                Stage::BadNoisy => {
                    if let Some(mv) = self.take_best_noisy(false) {
                        return Some(mv);
                    }
                    self.stage = Stage::Done;
                }

                Stage::Done => return None,
            }
        }
    }

    /// Strikes `wanted` out of the list and yields it, if it is present.
    fn take_exact(&mut self, wanted: Option<Move>) -> Option<Move> {
        let wanted = wanted?;
        for index in 0..self.moves.len() {
            let mv = self.moves.get(index);
            if !mv.is_null() && mv == wanted {
                self.moves.nullify(index);
                return Some(mv);
            }
        }
        None
    }

    /// Like [`Self::take_exact`], but only for a quiet move.
    fn take_quiet_exact(&mut self, wanted: Move) -> Option<Move> {
        if wanted.is_null() || !wanted.is_quiet() {
            return None;
        }
        self.take_exact(Some(wanted))
    }

    /// Scores every remaining noisy move: its exchange outcome, a queen
    /// promotion's windfall or an underpromotion's penalty, refined by the
    /// capture history for ordering among equals.
    fn score_noisy(&mut self, board: &Board, tables: &SearchTables) {
        let us = board.side_to_move();
        for index in 0..self.moves.len() {
            let mv = self.moves.get(index);
            if mv.is_null() || !mv.is_noisy() {
                continue;
            }

            let mut exchange = if mv.is_capture() { see(board, mv) } else { 0 };
            match mv.promotion_piece() {
                Some(PieceType::QUEEN) => exchange += PieceType::QUEEN.see_value(),
                Some(_) => exchange += UNDERPROMOTION_SCORE,
                None => (),
            }
            self.sees[index] = exchange;

            let mut order = exchange * 32;
            if mv.is_capture() {
                let victim = if mv.is_en_passant() {
                    PieceType::PAWN
                } else {
                    board
                        .piece_kind_on(us.flip(), mv.end())
                        .unwrap_or(PieceType::PAWN)
                };
                if let Some(piece) = board.piece_kind_on(us, mv.start()) {
                    order += tables.capture_score(us, piece, mv.end(), victim) / 16;
                }
            }
            self.scores[index] = order;
        }
    }

    /// Yields the best remaining noisy move of the requested class.
    fn take_best_noisy(&mut self, good: bool) -> Option<Move> {
        let mut best: Option<(usize, Eval)> = None;
        for index in 0..self.moves.len() {
            let mv = self.moves.get(index);
            if mv.is_null() || !mv.is_noisy() {
                continue;
            }
            if (self.sees[index] >= 0) != good {
                continue;
            }
            if best.is_none_or(|(_, score)| self.scores[index] > score) {
                best = Some((index, self.scores[index]));
            }
        }
        let (index, _) = best?;
        let mv = self.moves.get(index);
        self.moves.nullify(index);
        Some(mv)
    }

    /// Yields the remaining quiet with the best history.
    fn take_best_quiet(&mut self, board: &Board, tables: &SearchTables) -> Option<Move> {
        let us = board.side_to_move();
        let mut best: Option<(usize, i32)> = None;
        for index in 0..self.moves.len() {
            let mv = self.moves.get(index);
            if mv.is_null() || !mv.is_quiet() {
                continue;
            }
            let piece = board
                .piece_kind_on(us, mv.start())
                .unwrap_or(PieceType::PAWN);
            let mut score = tables.history_score(us, piece, mv.end());
            if let Some((prev_piece, prev_to)) = self.prev_ctx {
                score += tables.continuation_score(prev_piece, prev_to, us, piece, mv.end());
            }
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((index, score));
            }
        }
        let (index, _) = best?;
        let mv = self.moves.get(index);
        self.moves.nullify(index);
        Some(mv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::Square;

    /// Drains a picker into a vector.
    fn drain<const KIND: u8>(picker: &mut MovePicker<KIND>, board: &Board) -> Vec<Move> {
        let tables = SearchTables::new();
        let mut out = Vec::new();
        while let Some(mv) = picker.next(board, &tables) {
            out.push(mv);
        }
        out
    }

    #[test]
    fn yields_every_generated_move_exactly_once() {
        let board: Board = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1"
            .parse()
            .unwrap();
        let mut picker = MovePicker::<{ MoveKind::PSEUDO_LEGAL }>::new(0, None, None, None, None);
        let picked = drain(&mut picker, &board);

        let mut generated = MoveList::new();
        generate_moves::<{ MoveKind::PSEUDO_LEGAL }>(&board, &mut generated);
        assert_eq!(picked.len(), generated.len());

        let mut seen = std::collections::HashSet::new();
        for mv in &picked {
            assert!(seen.insert(mv.raw()), "{mv} yielded twice");
        }
    }

    #[test]
    fn tt_move_comes_first_and_winning_captures_before_losing() {
        let board: Board = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1"
            .parse()
            .unwrap();
        let tt_move = Move::new(Square(8), Square(16), Move::QUIET); // a2a3
        let mut picker =
            MovePicker::<{ MoveKind::PSEUDO_LEGAL }>::new(0, Some(tt_move), None, None, None);
        let picked = drain(&mut picker, &board);
        assert_eq!(picked[0], tt_move);

        // every good capture must precede every bad capture
        let sees: Vec<Eval> = picked
            .iter()
            .skip(1)
            .filter(|mv| mv.is_capture())
            .map(|&mv| see(&board, mv))
            .collect();
        let first_losing = sees.iter().position(|&score| score < 0);
        if let Some(first_losing) = first_losing {
            assert!(
                sees[first_losing..].iter().all(|&score| score < 0),
                "losing capture yielded before a winning one: {sees:?}",
            );
        }
    }

    #[test]
    fn skip_quiets_suppresses_the_quiet_stages() {
        let board = Board::default();
        let tables = SearchTables::new();
        let mut picker = MovePicker::<{ MoveKind::PSEUDO_LEGAL }>::new(0, None, None, None, None);
        picker.skip_quiets();
        assert!(picker.next(&board, &tables).is_none());
    }

    #[test]
    fn capture_picker_only_yields_noisy_moves() {
        let board: Board = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1"
            .parse()
            .unwrap();
        let mut picker = MovePicker::<{ MoveKind::CAPTURES }>::new(0, None, None, None, None);
        for mv in drain(&mut picker, &board) {
            assert!(mv.is_noisy(), "{mv} is quiet");
        }
    }

    #[test]
    fn killers_come_after_good_captures_but_before_other_quiets() {
        let board = Board::default();
        let mut tables = SearchTables::new();
        let killer = Move::new(Square(12), Square(28), Move::QUIET); // e2e4
        tables.update_killers(0, killer);

        let mut picker = MovePicker::<{ MoveKind::PSEUDO_LEGAL }>::new(0, None, None, None, None);
        let mut out = Vec::new();
        while let Some(mv) = picker.next(&board, &tables) {
            out.push(mv);
        }
        // no captures at the startpos, so the killer leads
        assert_eq!(out[0], killer);
    }
}
