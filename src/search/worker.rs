use std::sync::atomic::Ordering;

use super::{
    picker::MovePicker, repetition::Repetition, tables, tables::SearchTables, Node, NonPvNode,
    PvNode, SharedState, WorkerReport, MAX_PLY,
};
use crate::{
    board::{Board, Key},
    defs::PieceType,
    evaluation::{
        draw_jitter, evaluate, is_mate_score, mated_in, Eval, PawnCache, DRAW, INF, NO_SCORE,
    },
    lookups::LOOKUPS,
    movegen::{Move, MoveKind},
    syzygy,
    transposition_table::{Bound, TtHit},
};

// search parameters; tuning outputs, not design
/// Reverse futility applies below this depth.
const RFP_DEPTH_LIMIT: i32 = 3;
/// The reverse-futility margin per remaining depth.
const RFP_MARGIN: Eval = 120;
/// Null-move margins: the static eval must clear beta by this much.
const NMP_BASE_MARGIN: Eval = -120;
const NMP_MARGIN_PER_DEPTH: Eval = 20;
/// The null-move reduction is this plus a fraction of the depth.
const NMP_REDUCTION_BASE: i32 = 4;
const NMP_REDUCTION_DIVISOR: i32 = 4;
/// Razoring margins and limits (the Strelka scheme).
const RAZOR_DEPTH_LIMIT: i32 = 3;
const RAZOR_MARGIN_SHALLOW: Eval = 125;
const RAZOR_MARGIN_DEEP: Eval = 175;
const RAZOR_DEEP_DEPTH_LIMIT: i32 = 2;
/// Internal iterative reduction kicks in from this depth.
const IIR_DEPTH_MIN: i32 = 4;
/// Moves before late-move reductions start.
const FULL_DEPTH_MOVES: u32 = 4;
/// Extended futility pruning: margin and depth bound.
const EFP_BASE: Eval = 80;
const EFP_MARGIN_PER_DEPTH: Eval = 90;
const EFP_IMPROVING: Eval = 50;
const EFP_DEPTH_LIMIT: i32 = 6;
/// Late-move pruning applies up to this depth.
const LMP_DEPTH_LIMIT: i32 = 8;

/// One ply of the search stack: the board that was reached, the move that
/// reached it and its static evaluation.
#[derive(Clone, Copy)]
struct Frame {
    board: Board,
    mv: Move,
    eval: Eval,
}

/// One searcher.
///
/// Each worker owns its whole search state: the copy-make stack, the
/// ordering tables, the repetition ring and the pawn cache. The only thing
/// it shares with its siblings is the transposition table and the stop
/// flag, which is what makes the Lazy-SMP fan-out safe.
pub struct Worker {
    /// The copy-make stack; `stack[ply].board` is the position being
    /// searched at `ply`.
    stack: Vec<Frame>,
    /// The current distance from the root.
    ply: usize,
    /// Positions visited this search.
    nodes: u64,
    /// Tablebase probes that answered this search.
    tb_hits: u64,
    /// The deepest ply visited this search.
    sel_depth: usize,
    /// Move ordering and correction tables.
    tables: SearchTables,
    /// Hashes of the game prefix and the current line.
    repetition: Repetition,
    /// The pawn/king structure cache.
    pawn_cache: PawnCache,
    /// The primary worker drives the clock and may probe the tablebase
    /// root interface.
    is_primary: bool,
}

impl Worker {
    /// Creates a fresh worker.
    pub fn new(is_primary: bool) -> Self {
        Self {
            stack: vec![
                Frame {
                    board: Board::new(),
                    mv: Move::null(),
                    eval: 0,
                };
                MAX_PLY + 4
            ],
            ply: 0,
            nodes: 0,
            tb_hits: 0,
            sel_depth: 0,
            tables: SearchTables::new(),
            repetition: Repetition::new(),
            pawn_cache: PawnCache::new(),
            is_primary,
        }
    }

    /// Forgets everything learnt, for `ucinewgame`.
    pub fn new_game(&mut self) {
        self.tables.clear();
        self.pawn_cache.clear();
        self.repetition.clear();
    }

    /// Points the worker at the position to search and the hashes of the
    /// game that led there. Called once per `go`.
    pub fn prepare(&mut self, board: &Board, game_history: &[Key]) {
        self.repetition.clear();
        for &key in game_history {
            self.repetition.push(key);
        }
        self.stack[0] = Frame {
            board: *board,
            mv: Move::null(),
            eval: 0,
        };
        self.ply = 0;
        self.nodes = 0;
        self.tb_hits = 0;
        self.sel_depth = 0;
        self.tables.reset_root_nodes();
    }

    /// The fraction of this search's nodes spent below the root move `mv`.
    pub fn node_fraction(&self, mv: Move) -> f64 {
        if self.nodes == 0 {
            0.0
        } else {
            self.tables.root_nodes(mv) as f64 / self.nodes as f64
        }
    }

    /// Runs one iteration to `depth` within the window `(alpha, beta)`.
    ///
    /// The report's `completed` flag is only set if this worker finished
    /// before any sibling raised the stop flag, making its result the
    /// authoritative one for the iteration.
    pub fn start_search(
        &mut self,
        shared: &SharedState,
        depth: i32,
        alpha: Eval,
        beta: Eval,
    ) -> WorkerReport {
        debug_assert!(self.ply == 0, "search stack not unwound");
        self.tables.pv.set_following(true);

        let score = self.negamax::<super::RootNode>(shared, depth, alpha, beta, false, false);

        let finished = score != -INF;
        let was_stopped = shared.stop.swap(true, Ordering::Relaxed);
        self.ply = 0;

        WorkerReport {
            score,
            best_move: self.tables.pv.best_move(),
            ponder_move: self.tables.pv.ponder_move(),
            pv: self.tables.pv.line().collect(),
            depth: self.tables.pv.len().max(1) as i32,
            seldepth: self.sel_depth,
            nodes: self.nodes,
            tb_hits: self.tb_hits,
            completed: finished && !was_stopped,
        }
    }

    /// The trunk: negamax with alpha-beta and the whole pruning stack.
    #[allow(clippy::too_many_lines, clippy::cognitive_complexity)]
    fn negamax<NT: Node>(
        &mut self,
        shared: &SharedState,
        mut depth: i32,
        mut alpha: Eval,
        mut beta: Eval,
        cut_node: bool,
        null_search: bool,
    ) -> Eval {
        let board = self.stack[self.ply].board;
        self.tables.pv.update_length(self.ply);

        if !NT::IS_ROOT
            && (board.halfmoves() >= 100
                || self.repetition.is_repetition(board.hash(), board.halfmoves())
                || board.has_insufficient_material())
        {
            return draw_jitter(self.nodes);
        }

        let tt_hit = shared.tt.probe(board.hash(), self.ply);
        if !NT::IS_PV && !NT::IS_ROOT {
            if let Some(hit) = &tt_hit {
                if let Some(score) = hit.cutoff_score(depth, alpha, beta) {
                    return score;
                }
            }
        }

        // the stack simply is not any deeper than this
        if self.ply >= MAX_PLY - 2 {
            return evaluate(&board, &mut self.pawn_cache);
        }

        let in_check = board.is_in_check();
        if in_check {
            // rarely many legal replies here, so the extension is cheap
            depth += 1;
        }

        if depth <= 0 {
            return if NT::IS_PV {
                self.quiescence::<true>(shared, alpha, beta)
            } else {
                self.quiescence::<false>(shared, alpha, beta)
            };
        }

        self.nodes += 1;

        let tt_pv = NT::IS_PV || tt_hit.as_ref().is_some_and(|hit| hit.was_pv);

        let mut correction = 0;
        if in_check {
            // the evaluation terms know nothing about being in check
            self.stack[self.ply].eval = mated_in(self.ply);
        } else {
            correction = self.tables.correction(&board);
            let raw = self.fetch_or_store_eval(shared, &board, tt_hit.as_ref(), tt_pv);
            self.stack[self.ply].eval = raw + correction;
        }
        let static_eval = self.stack[self.ply].eval;

        // has the position improved since our previous move?
        let improving =
            !in_check && self.ply >= 2 && self.stack[self.ply - 2].eval < static_eval;

        let lmp_max_moves = (3 + depth * depth) / (2 - i32::from(improving));

        // static forward pruning: prove the whole branch pointless before
        // generating a single move
        if !NT::IS_PV && !in_check {
            // reverse futility
            if depth < RFP_DEPTH_LIMIT && !is_mate_score(beta) {
                let margin = RFP_MARGIN * depth;
                if static_eval - margin >= beta {
                    return static_eval - margin;
                }
            }

            // null move: hand the opponent a free shot; surviving it above
            // beta means the real move surely would too. Unsound in
            // zugzwang, hence the material gate.
            if !null_search
                && !NT::IS_ROOT
                && static_eval + NMP_BASE_MARGIN + NMP_MARGIN_PER_DEPTH * depth >= beta
                && board.has_non_pawn_material(board.side_to_move())
            {
                if let Some(score) = self.null_move_prune(shared, &board, depth, beta, cut_node)
                {
                    return score;
                }
            }

            // razoring near the leaves
            if depth <= RAZOR_DEPTH_LIMIT {
                let mut razor = static_eval + RAZOR_MARGIN_SHALLOW;
                if razor < beta {
                    if depth == 1 {
                        let verified = self.quiescence::<false>(shared, alpha, beta);
                        return verified.max(razor);
                    }
                    razor += RAZOR_MARGIN_DEEP;
                    if razor < beta && depth <= RAZOR_DEEP_DEPTH_LIMIT {
                        let verified = self.quiescence::<false>(shared, alpha, beta);
                        if verified < beta {
                            return verified.max(razor);
                        }
                    }
                }
            }
        }

        let tt_move = tt_hit.as_ref().and_then(TtHit::hash_move);

        // internal iterative reduction: a node the table has no move for
        // probably is not important; shrink it and let a later, deeper
        // visit sort it out
        if depth >= IIR_DEPTH_MIN && (NT::IS_PV || cut_node) && tt_move.is_none() {
            depth -= 1;
        }

        let mut syzygy_root = false;
        if syzygy::is_active(&board) {
            if NT::IS_ROOT && self.is_primary {
                // the root probe is not thread safe; primary only
                syzygy_root = true;
            } else if !NT::IS_ROOT {
                if let Some(wdl) = syzygy::probe_wdl(&board) {
                    self.tb_hits += 1;
                    let score = wdl.to_score(self.ply);
                    let bound = match wdl {
                        syzygy::Wdl::Win => Bound::Lower,
                        syzygy::Wdl::Loss => Bound::Upper,
                        _ => Bound::Exact,
                    };
                    let cuts = match bound {
                        Bound::Exact => true,
                        Bound::Upper => score <= alpha,
                        Bound::Lower => score >= beta,
                    };
                    if cuts {
                        shared.tt.store(
                            board.hash(),
                            score,
                            Eval::from(NO_SCORE),
                            Move::null(),
                            tt_pv,
                            depth,
                            self.ply,
                            bound,
                        );
                        return score;
                    }
                    // in PV nodes keep searching for a real line, but let
                    // the verdict tighten the window
                    if NT::IS_PV && bound == Bound::Lower {
                        alpha = alpha.max(score);
                    } else if NT::IS_PV && bound == Bound::Upper {
                        beta = beta.min(score);
                    }
                }
            }
        }

        // keep feeding the previous iteration's line first
        let pv_move = if self.tables.pv.is_following() {
            let mv = self.tables.pv.line_move(self.ply);
            if mv.is_null() {
                self.tables.pv.set_following(false);
                None
            } else {
                Some(mv)
            }
        } else {
            None
        };

        let prev_move = (!NT::IS_ROOT && !self.stack[self.ply].mv.is_null())
            .then(|| self.stack[self.ply].mv);
        let prev_ctx = prev_move.and_then(|prev| {
            let them = board.side_to_move().flip();
            board
                .piece_kind_on(them, prev.end())
                .map(|piece| (tables::piece_index(them, piece), prev.end()))
        });

        let mut picker = if syzygy_root {
            MovePicker::<{ MoveKind::PSEUDO_LEGAL }>::new_syzygy_root(tt_move, pv_move)
        } else {
            MovePicker::<{ MoveKind::PSEUDO_LEGAL }>::new(
                self.ply, tt_move, pv_move, prev_move, prev_ctx,
            )
        };

        let mut bound = Bound::Upper;
        let mut best_move = Move::null();
        let mut best_score = -INF;
        let mut moves_searched: u32 = 0;

        while let Some(mv) = picker.next(&board, &self.tables) {
            // late-move pruning and extended futility: once enough moves
            // (or a hopeless eval) prove the quiets dead, stop feeding them
            if !NT::IS_PV && !in_check && !picker.is_skipping_quiets() && best_score > -INF {
                let lmr_depth =
                    depth - LOOKUPS.lmr_reduction(depth, moves_searched).min(depth);
                let margin =
                    EFP_BASE + EFP_MARGIN_PER_DEPTH * lmr_depth + EFP_IMPROVING * Eval::from(improving);
                if lmr_depth <= EFP_DEPTH_LIMIT && static_eval + margin < alpha {
                    picker.skip_quiets();
                }
                if depth <= LMP_DEPTH_LIMIT && moves_searched as i32 >= lmp_max_moves {
                    picker.skip_quiets();
                }
            }

            let Some(child) = board.make_move(mv) else {
                // pseudo-legal moves that leave the king hanging die here
                continue;
            };
            shared.tt.prefetch(child.hash());
            self.push_frame(child, mv, board.hash());

            let nodes_before = self.nodes;
            let mut score;
            if moves_searched == 0 {
                // the move ordering's best candidate gets the full window
                score = -self.child_search(
                    shared,
                    NT::IS_PV,
                    depth - 1,
                    -beta,
                    -alpha,
                    !(NT::IS_PV || cut_node),
                );
            } else {
                // late moves first try a reduced zero window; a fail high
                // re-searches unreduced, and a second fail high within the
                // window earns the full-window search
                let mut reduction = 0;
                if moves_searched >= FULL_DEPTH_MOVES && mv.is_quiet() {
                    let gives_check = child.is_in_check();
                    reduction = LOOKUPS.lmr_reduction(depth, moves_searched)
                        - i32::from(in_check)
                        - i32::from(gives_check)
                        + i32::from(!NT::IS_PV)
                        + i32::from(!improving)
                        + i32::from(cut_node);
                    reduction = reduction.clamp(0, depth - 1);
                }

                score = -self.zero_window(shared, depth - 1 - reduction, -alpha, true);
                if score > alpha && reduction > 0 {
                    score = -self.zero_window(shared, depth - 1, -alpha, !cut_node);
                }
                if score > alpha && score < beta {
                    score = -self.child_search(
                        shared,
                        NT::IS_PV,
                        depth - 1,
                        -beta,
                        -alpha,
                        !(NT::IS_PV || cut_node),
                    );
                }
            }

            self.pop_frame();

            if self.is_search_stopped(shared) {
                return -INF;
            }

            moves_searched += 1;
            if NT::IS_ROOT {
                self.tables.add_root_nodes(mv, self.nodes - nodes_before);
            }

            if score > best_score {
                best_score = score;
            }

            if score > alpha {
                alpha = score;
                bound = Bound::Exact;
                best_move = mv;

                if mv.is_quiet() {
                    if let Some(piece) = board.piece_kind_on(board.side_to_move(), mv.start()) {
                        self.tables
                            .update_history(board.side_to_move(), piece, mv.end(), depth);
                    }
                }
                self.tables.pv.update(mv, self.ply);
            }

            if score >= beta {
                best_move = mv;
                bound = Bound::Lower;

                let us = board.side_to_move();
                let piece = board.piece_kind_on(us, mv.start());
                if mv.is_quiet() {
                    self.tables.update_killers(self.ply, mv);
                    if let Some(prev) = prev_move {
                        self.tables.update_counter_move(prev, mv);
                    }
                    if let (Some((prev_piece, prev_to)), Some(piece)) = (prev_ctx, piece) {
                        self.tables
                            .update_continuation(prev_piece, prev_to, us, piece, mv.end(), depth);
                    }
                } else if mv.is_capture() {
                    let victim = if mv.is_en_passant() {
                        Some(PieceType::PAWN)
                    } else {
                        board.piece_kind_on(us.flip(), mv.end())
                    };
                    if let (Some(piece), Some(victim)) = (piece, victim) {
                        self.tables.update_capture(us, piece, mv.end(), victim, depth);
                    }
                }
                break;
            }
        }

        if moves_searched == 0 {
            return if in_check {
                // closer mates score better
                mated_in(self.ply)
            } else {
                DRAW
            };
        }

        // only stable outcomes teach the correction history: quiet best
        // move, not in check, and no cutoff contradicting the eval
        if !in_check
            && !best_move.is_null()
            && best_move.is_quiet()
            && !(bound == Bound::Upper && best_score >= static_eval)
            && !(bound == Bound::Lower && best_score <= static_eval)
        {
            self.tables
                .update_correction(&board, depth, best_score, static_eval);
        }

        // the uncorrected eval goes in; the probe re-applies a fresh
        // correction
        shared.tt.store(
            board.hash(),
            best_score,
            if in_check {
                Eval::from(NO_SCORE)
            } else {
                static_eval - correction
            },
            best_move,
            tt_pv,
            depth,
            self.ply,
            bound,
        );

        best_score
    }

    /// A full-window child search, PV-ness inherited from the parent.
    fn child_search(
        &mut self,
        shared: &SharedState,
        is_pv: bool,
        depth: i32,
        alpha: Eval,
        beta: Eval,
        cut_node: bool,
    ) -> Eval {
        if is_pv {
            self.negamax::<PvNode>(shared, depth, alpha, beta, cut_node, false)
        } else {
            self.negamax::<NonPvNode>(shared, depth, alpha, beta, cut_node, false)
        }
    }

    /// A zero-window search around `window`.
    fn zero_window(&mut self, shared: &SharedState, depth: i32, window: Eval, cut_node: bool) -> Eval {
        self.negamax::<NonPvNode>(shared, depth, window - 1, window, cut_node, false)
    }

    /// Tries a null move: the stack advances two plies so the improving
    /// heuristic keeps comparing same-side evaluations.
    fn null_move_prune(
        &mut self,
        shared: &SharedState,
        board: &Board,
        depth: i32,
        beta: Eval,
        cut_node: bool,
    ) -> Option<Eval> {
        self.repetition.push(board.hash());
        self.ply += 2;
        self.stack[self.ply] = Frame {
            board: board.make_null_move(),
            mv: Move::null(),
            eval: 0,
        };

        let reduction = (NMP_REDUCTION_BASE + depth / NMP_REDUCTION_DIVISOR).min(depth);
        let score = -self.negamax::<NonPvNode>(
            shared,
            depth - reduction,
            -beta,
            -beta + 1,
            !cut_node,
            true,
        );

        self.ply -= 2;
        self.repetition.pop();

        (score >= beta).then_some(beta)
    }

    /// Captures-only search at the horizon: stand pat on the evaluation
    /// and only look at the moves that could still swing it.
    fn quiescence<const IS_PV: bool>(
        &mut self,
        shared: &SharedState,
        mut alpha: Eval,
        beta: Eval,
    ) -> Eval {
        let board = self.stack[self.ply].board;
        self.nodes += 1;
        self.sel_depth = self.sel_depth.max(self.ply);

        if board.halfmoves() >= 100
            || self.repetition.is_repetition(board.hash(), board.halfmoves())
            || board.has_insufficient_material()
        {
            return draw_jitter(self.nodes);
        }

        if self.ply >= MAX_PLY - 2 {
            return evaluate(&board, &mut self.pawn_cache);
        }

        let tt_hit = shared.tt.probe(board.hash(), self.ply);
        let in_check = board.is_in_check();
        let tt_pv = IS_PV || tt_hit.as_ref().is_some_and(|hit| hit.was_pv);

        let mut correction = 0;
        let eval = if in_check {
            // cutoffs on the raw eval would be reckless here
            mated_in(self.ply)
        } else {
            correction = self.tables.correction(&board);
            self.fetch_or_store_eval(shared, &board, tt_hit.as_ref(), tt_pv) + correction
        };
        self.stack[self.ply].eval = eval;

        // stand pat
        if eval >= beta {
            return eval;
        }
        alpha = alpha.max(eval);

        // most lines end on a quiescence result, so a stored one usually
        // settles this node outright
        if let Some(hit) = &tt_hit {
            if !IS_PV {
                if let Some(score) = hit.cutoff_score(0, alpha, beta) {
                    return score;
                }
            }
        }

        let tt_move = tt_hit.as_ref().and_then(TtHit::hash_move);
        let mut picker =
            MovePicker::<{ MoveKind::CAPTURES }>::new(self.ply, tt_move, None, None, None);

        let mut bound = Bound::Upper;
        let mut best_move = Move::null();
        let mut best_score = eval;

        while let Some(mv) = picker.next(&board, &self.tables) {
            let Some(child) = board.make_move(mv) else {
                continue;
            };
            shared.tt.prefetch(child.hash());
            self.push_frame(child, mv, board.hash());

            let score = -self.quiescence::<IS_PV>(shared, -beta, -alpha);

            self.pop_frame();

            if self.is_search_stopped(shared) {
                return -INF;
            }

            if score > best_score {
                best_score = score;
            }
            if score >= beta {
                best_move = mv;
                bound = Bound::Lower;
                break;
            }
            if score > alpha {
                best_move = mv;
                bound = Bound::Exact;
                alpha = score;
            }
        }

        shared.tt.store(
            board.hash(),
            best_score,
            if in_check {
                Eval::from(NO_SCORE)
            } else {
                eval - correction
            },
            best_move,
            tt_pv,
            0,
            self.ply,
            bound,
        );

        best_score
    }

    /// The static evaluation: from the table if a previous visit stored
    /// one, otherwise computed and stored for the next visit.
    fn fetch_or_store_eval(
        &mut self,
        shared: &SharedState,
        board: &Board,
        tt_hit: Option<&TtHit>,
        tt_pv: bool,
    ) -> Eval {
        if let Some(eval) = tt_hit.and_then(TtHit::static_eval) {
            return eval;
        }
        let eval = evaluate(board, &mut self.pawn_cache);
        shared.tt.store(
            board.hash(),
            Eval::from(NO_SCORE),
            eval,
            Move::null(),
            tt_pv,
            0,
            self.ply,
            Bound::Upper,
        );
        eval
    }

    /// Descends one ply: the parent's hash joins the repetition ring and
    /// the child becomes the current frame.
    fn push_frame(&mut self, child: Board, mv: Move, parent_hash: Key) {
        self.repetition.push(parent_hash);
        self.ply += 1;
        self.stack[self.ply] = Frame {
            board: child,
            mv,
            eval: 0,
        };
    }

    /// Unwinds one ply.
    fn pop_frame(&mut self) {
        self.ply -= 1;
        self.repetition.pop();
    }

    /// Checks the stop flag, and every couple of thousand nodes lets the
    /// primary worker service the command stream and the clock.
    fn is_search_stopped(&mut self, shared: &SharedState) -> bool {
        if shared.stop.load(Ordering::Relaxed) {
            return true;
        }

        if self.is_primary && self.nodes % 2048 == 0 {
            self.poll_commands(shared);
            shared.keeper.update_timeout();
        }

        shared.keeper.has_timed_out()
    }

    /// Services commands that must work mid-search.
    fn poll_commands(&self, shared: &SharedState) {
        let Ok(command) = shared.uci_rx.lock() else {
            return;
        };
        let Ok(command) = command.try_recv() else {
            return;
        };

        match command.split_whitespace().next() {
            Some("stop") => {
                shared.keeper.stop();
                shared.stop.store(true, Ordering::Relaxed);
            }
            Some("quit") => {
                shared.keeper.stop();
                shared.stop.store(true, Ordering::Relaxed);
                shared.quit.store(true, Ordering::Relaxed);
            }
            Some("isready") => println!("readyok"),
            Some("ponderhit") => shared.keeper.on_ponder_hit(),
            _ => (),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        evaluation::{mate_distance, MATE_BOUND},
        time_manager::TimeKeeper,
        transposition_table::TranspositionTable,
    };
    use std::sync::{atomic::AtomicBool, mpsc::channel, Mutex};

    fn shared_state() -> SharedState {
        let (_tx, rx) = channel();
        SharedState {
            uci_rx: Mutex::new(rx),
            tt: TranspositionTable::with_size_mb(16),
            keeper: TimeKeeper::new(),
            stop: AtomicBool::new(false),
            quit: AtomicBool::new(false),
        }
    }

    fn search_to_depth(fen: &str, depth: i32) -> WorkerReport {
        let shared = shared_state();
        shared.keeper.start(None, None, false);
        let board: Board = fen.parse().unwrap();
        let mut worker = Worker::new(true);
        worker.prepare(&board, &[]);
        worker.start_search(&shared, depth, -INF, INF)
    }

    #[test]
    fn finds_mate_in_one_at_depth_one() {
        let report = search_to_depth("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1", 1);
        assert!(report.completed);
        assert_eq!(report.best_move.to_string(), "a1a8");
        assert!(report.score >= MATE_BOUND);
        assert_eq!(mate_distance(report.score), 1);
    }

    #[test]
    fn prefers_winning_material() {
        // white can simply take the loose rook
        let report = search_to_depth("4k3/8/8/8/8/8/8/r2QK3 w - - 0 1", 4);
        assert!(report.completed);
        assert_eq!(report.best_move.to_string(), "d1a1");
        assert!(report.score > 300);
    }

    #[test]
    fn always_returns_a_legal_move() {
        let report = search_to_depth(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            3,
        );
        assert!(!report.best_move.is_null());
        let board: Board =
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1"
                .parse()
                .unwrap();
        assert!(board.make_move(report.best_move).is_some());
    }

    #[test]
    fn repetition_lines_read_as_draws() {
        // a bare-bones shuffle: the worker must not score a repeated
        // position as anything but a draw
        let board: Board = "4k3/8/8/8/8/8/8/4K2R w - - 0 1".parse().unwrap();
        let shared = shared_state();
        shared.keeper.start(None, None, false);
        let mut worker = Worker::new(true);

        // seed the game history with the same position twice on our turns
        worker.prepare(&board, &[0x1234, board.hash(), 0x5678, board.hash()]);
        worker.push_frame(board, Move::null(), 0x9abc);
        assert!(worker.repetition.is_repetition(board.hash(), 100));
    }
}
