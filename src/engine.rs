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
    str::FromStr,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{channel, Receiver},
        Arc, Mutex,
    },
    time::Duration,
};

use arrayvec::ArrayVec;

use crate::{
    board::{Board, Key},
    defs::{PieceType, Square},
    evaluation::{is_mate_score, mate_distance, Eval, INF},
    movegen::{generate_moves, Move, MoveKind, MoveList},
    search::{SharedState, Worker, WorkerReport, ASPIRATION_WINDOW, MAX_PLY},
    syzygy,
    thread_pool::ThreadPool,
    time_manager::{Limits, TimeKeeper, TimeManager},
    transposition_table::TranspositionTable,
    uci::UciOptions,
};

/// The most game positions the history stack remembers; far beyond any
/// real game.
const MAX_GAME_LENGTH: usize = 1024;

/// The engine: the current position, the options, the searchers and the
/// state they share.
///
/// The time manager and the transposition table live behind one shared
/// context that every searcher holds by reference; no searcher owns any
/// global state.
pub struct Engine {
    /// The position the next `go` will search.
    board: Board,
    /// The hashes of every position of the game so far, oldest first.
    /// Truncated at each irreversible move: nothing before one can repeat.
    game_history: ArrayVec<Key, MAX_GAME_LENGTH>,
    /// The current option values.
    options: UciOptions,
    /// The state all searchers share.
    shared: Arc<SharedState>,
    /// The searchers; index 0 is the primary.
    workers: Vec<Arc<Mutex<Worker>>>,
    /// The pool the searchers fan out on.
    pool: ThreadPool,
    /// The engine-side time manager.
    time: TimeManager,
}

impl Engine {
    /// Creates an engine that reads mid-search commands from `uci_rx`.
    pub fn new(uci_rx: Receiver<String>) -> Self {
        let options = UciOptions::default();
        let shared = Arc::new(SharedState {
            uci_rx: Mutex::new(uci_rx),
            tt: TranspositionTable::with_size_mb(options.hash_mb),
            keeper: TimeKeeper::new(),
            stop: AtomicBool::new(false),
            quit: AtomicBool::new(false),
        });

        Self {
            board: Board::default(),
            game_history: ArrayVec::new(),
            options,
            shared,
            workers: vec![Arc::new(Mutex::new(Worker::new(true)))],
            pool: ThreadPool::new(1),
            time: TimeManager::new(),
        }
    }

    /// The current position.
    pub const fn board(&self) -> &Board {
        &self.board
    }

    /// The current options.
    pub const fn options(&self) -> &UciOptions {
        &self.options
    }

    /// Whether a `quit` arrived while a search was running.
    pub fn quit_requested(&self) -> bool {
        self.shared.quit.load(Ordering::Relaxed)
    }

    /// Blocks until the next UCI command arrives.
    ///
    /// The same receiver the primary worker polls mid-search, so commands
    /// answered there never reappear here.
    pub fn recv_command(&self) -> Option<String> {
        self.shared
            .uci_rx
            .lock()
            .ok()
            .and_then(|receiver| receiver.recv().ok())
    }

    /// An out-of-search `ponderhit`: just start the clock.
    pub fn ponder_hit(&self) {
        self.shared.keeper.on_ponder_hit();
    }

    /// Clears the transposition table and every worker's learnt tables
    /// without touching the position. For `debug clear`.
    pub fn clear_tables(&mut self) {
        self.exclusive_shared().tt.clear();
        for worker in &self.workers {
            worker.lock().expect("worker lock poisoned").new_game();
        }
    }

    /// Mutable access to the options, for toggles the UCI layer owns.
    pub fn options_mut(&mut self) -> &mut UciOptions {
        &mut self.options
    }

    /// Resets for a new game: starting position, cleared tables.
    pub fn new_game(&mut self) {
        self.board = Board::default();
        self.game_history.clear();
        self.exclusive_shared().tt.clear();
        for worker in &self.workers {
            worker.lock().expect("worker lock poisoned").new_game();
        }
    }

    /// Handles `position {startpos|fen <fen>} [moves ...]`.
    ///
    /// A command that fails to parse leaves the engine untouched.
    pub fn set_position<'a, T>(&mut self, mut tokens: T)
    where
        T: Iterator<Item = &'a str>,
    {
        let mut board = match tokens.next() {
            Some("startpos") => Board::default(),
            Some("fen") => {
                let mut fen = String::with_capacity(128);
                for token in tokens.by_ref().take_while(|&token| token != "moves") {
                    fen.push_str(token);
                    fen.push(' ');
                }
                match fen.parse() {
                    Ok(board) => board,
                    Err(error) => {
                        println!("info string bad fen: {error}");
                        return;
                    }
                }
            }
            _ => return,
        };

        let mut history = ArrayVec::new();
        for token in tokens.by_ref() {
            if token == "moves" {
                continue;
            }
            let Some(mv) = parse_move(&board, token) else {
                println!("info string bad move: {token}");
                return;
            };
            let Some(next) = board.make_move(mv) else {
                println!("info string illegal move: {token}");
                return;
            };
            if history.is_full() {
                return;
            }
            history.push(board.hash());
            board = next;

            // nothing before an irreversible move can repeat
            if board.halfmoves() == 0 {
                history.clear();
            }
        }

        self.board = board;
        self.game_history = history;
    }

    /// Handles `setoption name <N> value <V>`.
    pub fn set_option<'a, T>(&mut self, mut tokens: T)
    where
        T: Iterator<Item = &'a str>,
    {
        if tokens.next() != Some("name") {
            return;
        }
        let name: Vec<&str> = tokens.by_ref().take_while(|&token| token != "value").collect();
        let value = tokens.collect::<Vec<&str>>().join(" ");

        match name.join(" ").as_str() {
            "Ponder" => self.options.ponder = value == "true",
            "SyzygyPath" => {
                syzygy::deinit();
                self.options.syzygy_path = value.clone();
                if !value.is_empty() && value != "<empty>" {
                    if let Err(error) = syzygy::init(&value) {
                        println!("info string syzygy init failed: {error}");
                    }
                }
            }
            "SyzygyProbeLimit" => {
                // accepted but unenforced: probes are gated by the size of
                // the loaded tables themselves
                if let Ok(limit) = value.parse::<u8>() {
                    self.options.syzygy_probe_limit = limit.min(7);
                }
            }
            "Hash" => {
                if let Ok(size) = value.parse::<usize>() {
                    let size = size.clamp(1, 1024);
                    self.options.hash_mb = size;
                    self.exclusive_shared().tt.resize(size);
                }
            }
            "Threads" => {
                if let Ok(threads) = value.parse::<usize>() {
                    let threads = threads.clamp(1, 128);
                    self.options.threads = threads;
                    self.resize_searchers(threads);
                }
            }
            "MoveOverhead" => {
                if let Ok(overhead) = value.parse::<u64>() {
                    self.options.move_overhead = Duration::from_millis(overhead.min(10_000));
                }
            }
            _ => (),
        }
    }

    /// Rebuilds the pool and the searcher set for a new thread count.
    fn resize_searchers(&mut self, threads: usize) {
        self.pool = ThreadPool::new(threads);
        self.workers = (0..threads)
            .map(|index| Arc::new(Mutex::new(Worker::new(index == 0))))
            .collect();
    }

    /// Runs a search under `limits` and prints its `bestmove`.
    ///
    /// Iterative deepening with an aspiration window around the previous
    /// score; each depth fans every searcher out onto the pool, and the
    /// first one home is believed.
    pub fn search(&mut self, limits: &Limits) {
        self.time
            .setup(&self.shared.keeper, limits, &self.board, self.options.move_overhead);

        for worker in &self.workers {
            worker
                .lock()
                .expect("worker lock poisoned")
                .prepare(&self.board, &self.game_history);
        }

        let max_depth = limits
            .depth
            .unwrap_or(MAX_PLY as i32 - 4)
            .clamp(1, MAX_PLY as i32 - 4);

        let mut best: Option<WorkerReport> = None;
        let mut previous_score: Option<Eval> = None;

        for depth in 1..=max_depth {
            if !self.time.time_for_another_search(&self.shared.keeper, depth) {
                break;
            }

            let (mut alpha, mut beta) = match previous_score {
                Some(score) => (
                    score.saturating_sub(ASPIRATION_WINDOW).max(-INF),
                    score.saturating_add(ASPIRATION_WINDOW).min(INF),
                ),
                None => (-INF, INF),
            };

            loop {
                let Some(report) = self.run_iteration(depth, alpha, beta) else {
                    break;
                };

                if !report.completed {
                    break;
                }

                // the search fell outside the window: retry this depth wide
                // open
                if report.score <= alpha || report.score >= beta {
                    alpha = -INF;
                    beta = INF;
                    continue;
                }

                self.print_iteration(&report, depth);

                let node_fraction = self
                    .workers[0]
                    .lock()
                    .expect("worker lock poisoned")
                    .node_fraction(report.best_move);
                self.time
                    .update_stability(report.best_move, report.score, node_fraction);

                previous_score = Some(report.score);
                best = Some(report);
                break;
            }

            if self.shared.keeper.has_timed_out() || self.quit_requested() {
                break;
            }
        }

        self.print_best_move(best.as_ref());
    }

    /// Fans one depth out to every searcher and collects the verdict.
    ///
    /// Returns [`None`] only if nothing reported at all.
    fn run_iteration(&mut self, depth: i32, alpha: Eval, beta: Eval) -> Option<WorkerReport> {
        self.shared.stop.store(false, Ordering::Relaxed);

        let (tx, rx) = channel();
        for worker in &self.workers {
            let worker = Arc::clone(worker);
            let shared = Arc::clone(&self.shared);
            let tx = tx.clone();

            let mut job: Box<dyn FnOnce() + Send> = Box::new(move || {
                let mut worker = worker.lock().expect("worker lock poisoned");
                let report = worker.start_search(&shared, depth, alpha, beta);
                let _ = tx.send(report);
            });

            // the queue holds two slots per thread, so a refusal only means
            // the previous iteration is still draining; retry
            while let Err(rejected) = self.pool.submit(job) {
                job = rejected;
                std::thread::yield_now();
            }
        }
        drop(tx);

        let mut authoritative: Option<WorkerReport> = None;
        let mut fallback: Option<WorkerReport> = None;
        let mut nodes = 0;
        let mut tb_hits = 0;
        let mut seldepth = 0;

        while let Ok(report) = rx.recv() {
            nodes += report.nodes;
            tb_hits += report.tb_hits;
            seldepth = seldepth.max(report.seldepth);
            if report.completed && authoritative.is_none() {
                authoritative = Some(report);
            } else if fallback.is_none() {
                fallback = Some(report);
            }
        }

        let mut report = authoritative.or(fallback)?;
        report.nodes = nodes;
        report.tb_hits = tb_hits;
        report.seldepth = report.seldepth.max(seldepth);
        Some(report)
    }

    /// Prints the `info` line of a completed iteration.
    fn print_iteration(&self, report: &WorkerReport, depth: i32) {
        let elapsed = self.shared.keeper.elapsed();
        let millis = elapsed.as_millis().max(1);
        let nps = report.nodes as u128 * 1000 / millis;

        let score = if is_mate_score(report.score) {
            format!("mate {}", mate_distance(report.score))
        } else {
            format!("cp {}", report.score)
        };

        let mut line = format!(
            "info score {score} time {millis} depth {depth} seldepth {} nodes {} hashfull {} nps {nps}",
            report.seldepth,
            report.nodes,
            self.shared.tt.hashfull(),
        );
        if syzygy::max_pieces() != 0 {
            line.push_str(&format!(" tbhits {}", report.tb_hits));
        }
        line.push_str(" pv");
        for mv in &report.pv {
            line.push_str(&format!(" {mv}"));
        }
        println!("{line}");
    }

    /// Prints `bestmove`, falling back to any legal move if the search
    /// never finished an iteration, and `(none)` if no legal move exists.
    fn print_best_move(&self, best: Option<&WorkerReport>) {
        let best_move = best
            .map(|report| report.best_move)
            .filter(|mv| !mv.is_null())
            .or_else(|| self.any_legal_move());

        match best_move {
            None => println!("bestmove (none)"),
            Some(mv) => {
                let ponder = best.and_then(|report| report.ponder_move);
                match ponder.filter(|_| self.options.ponder) {
                    Some(ponder) => println!("bestmove {mv} ponder {ponder}"),
                    None => println!("bestmove {mv}"),
                }
            }
        }
    }

    /// The first legal move of the current position, if any.
    fn any_legal_move(&self) -> Option<Move> {
        let mut moves = MoveList::new();
        generate_moves::<{ MoveKind::PSEUDO_LEGAL }>(&self.board, &mut moves);
        let result = moves
            .iter()
            .find(|&mv| !mv.is_null() && self.board.make_move(mv).is_some());
        result
    }

    /// Exclusive access to the shared state, for resizes and clears.
    ///
    /// Searchers only hold the context while a search runs and every path
    /// here first waits searches out, so the spin is a formality against a
    /// job that has sent its report but not yet returned.
    fn exclusive_shared(&mut self) -> &mut SharedState {
        loop {
            // limitation of the borrow checker: get_mut in a loop condition
            // extends the borrow
            if Arc::get_mut(&mut self.shared).is_some() {
                break;
            }
            std::thread::yield_now();
        }
        Arc::get_mut(&mut self.shared).expect("no searcher can still hold the context")
    }
}

/// Parses a move in coordinate notation against the legal moves of
/// `board`.
pub fn parse_move(board: &Board, text: &str) -> Option<Move> {
    let start = Square::from_str(text.get(0..2)?).ok()?;
    let end = Square::from_str(text.get(2..4)?).ok()?;
    let promotion = match text.get(4..5) {
        Some(piece) => Some(PieceType::try_from(piece.chars().next()?).ok()?),
        None => None,
    };

    let mut moves = MoveList::new();
    generate_moves::<{ MoveKind::PSEUDO_LEGAL }>(board, &mut moves);
    moves.find(start, end, promotion)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        let (_tx, rx) = channel();
        Engine::new(rx)
    }

    #[test]
    fn position_command_applies_moves() {
        let mut engine = engine();
        engine.set_position("startpos moves e2e4 e7e5 g1f3".split_whitespace());
        assert_eq!(
            engine.board().to_string(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2",
        );
        assert_eq!(engine.game_history.len(), 1);
    }

    #[test]
    fn bad_positions_leave_state_alone() {
        let mut engine = engine();
        engine.set_position("startpos moves e2e4".split_whitespace());
        let before = engine.board().to_string();

        engine.set_position("startpos moves e2e5".split_whitespace());
        assert_eq!(engine.board().to_string(), before);

        engine.set_position("fen not a fen at all".split_whitespace());
        assert_eq!(engine.board().to_string(), before);
    }

    #[test]
    fn move_parsing_needs_legality() {
        let board = Board::default();
        assert!(parse_move(&board, "e2e4").is_some());
        assert!(parse_move(&board, "e2e5").is_none());
        assert!(parse_move(&board, "garbage").is_none());

        let board: Board = "8/2P5/8/8/8/8/k6K/8 w - - 0 1".parse().unwrap();
        let promo = parse_move(&board, "c7c8q").unwrap();
        assert_eq!(promo.promotion_piece(), Some(PieceType::QUEEN));
    }

    #[test]
    fn searches_return_a_move_within_the_budget() {
        let mut engine = engine();
        engine.set_position("startpos".split_whitespace());
        let limits = Limits {
            move_time: Some(Duration::from_millis(100)),
            ..Limits::default()
        };
        // prints `bestmove`; mostly this asserts the fan-out terminates
        let start = std::time::Instant::now();
        engine.search(&limits);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn depth_limited_search_stops_at_the_depth() {
        let mut engine = engine();
        engine.set_position("startpos".split_whitespace());
        let limits = Limits {
            depth: Some(3),
            ..Limits::default()
        };
        engine.search(&limits);
    }

    #[test]
    fn option_changes_clamp() {
        let mut engine = engine();
        engine.set_option("name Hash value 4096".split_whitespace());
        assert_eq!(engine.options().hash_mb, 1024);
        engine.set_option("name Threads value 2".split_whitespace());
        assert_eq!(engine.options().threads, 2);
        engine.set_option("name MoveOverhead value 99999".split_whitespace());
        assert_eq!(engine.options().move_overhead, Duration::from_millis(10_000));
        engine.set_option("name Ponder value true".split_whitespace());
        assert!(engine.options().ponder);
    }
}
