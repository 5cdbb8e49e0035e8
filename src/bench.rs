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

//! A fixed benchmark: search a handful of positions to a fixed depth and
//! report the node count. The total doubles as a quick regression check,
//! since any functional search change moves it.

use std::{
    sync::{atomic::AtomicBool, mpsc::channel, Mutex},
    time::Instant,
};

use crate::{
    board::Board,
    evaluation::INF,
    search::{SharedState, Worker},
    time_manager::TimeKeeper,
    transposition_table::TranspositionTable,
};

/// The depth each position is searched to when none is given.
const DEFAULT_DEPTH: i32 = 8;
/// The transposition table size the benchmark runs with.
const TT_SIZE_MB: usize = 16;

/// A spread of openings, middlegames and endgames.
static BENCH_POSITIONS: [&str; 10] = [
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
    "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
    "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
    "3r1rk1/p1q2ppp/1pnbbn2/2pp4/8/1P1P1NP1/PBPN1PBP/R2QR1K1 w - - 0 1",
    "8/8/1p1k2p1/p1prp2p/P2n3P/6P1/5P2/4R1K1 w - - 0 1",
    "8/3k4/8/8/8/8/6PP/6K1 w - - 0 1",
    "1k1r4/1pp4p/p7/4p3/8/P5P1/1PP4P/2K1R3 w - - 0 1",
];

/// Runs the suite and prints the classic two summary lines.
pub fn bench(depth: Option<i32>) {
    let depth = depth.unwrap_or(DEFAULT_DEPTH).max(1);

    let (_tx, rx) = channel();
    let shared = SharedState {
        uci_rx: Mutex::new(rx),
        tt: TranspositionTable::with_size_mb(TT_SIZE_MB),
        keeper: TimeKeeper::new(),
        stop: AtomicBool::new(false),
        quit: AtomicBool::new(false),
    };
    shared.keeper.start(None, None, false);

    let mut worker = Worker::new(true);
    let start = Instant::now();
    let mut total_nodes = 0;

    for (index, fen) in BENCH_POSITIONS.iter().enumerate() {
        let board: Board = fen.parse().expect("the bench FENs are valid");
        worker.new_game();
        worker.prepare(&board, &[]);

        let mut report = None;
        for iteration in 1..=depth {
            shared.stop.store(false, std::sync::atomic::Ordering::Relaxed);
            report = Some(worker.start_search(&shared, iteration, -INF, INF));
        }

        let report = report.expect("depth is at least one");
        println!(
            "position {:>2} [{fen}]: {} nodes, best {}",
            index + 1,
            report.nodes,
            report.best_move,
        );
        total_nodes += report.nodes;
    }

    let elapsed_us = start.elapsed().as_micros().max(1) as u64;
    println!("{total_nodes} nodes");
    println!("{} nps", 1_000_000 * total_nodes / elapsed_us);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bench_positions_all_parse() {
        for fen in BENCH_POSITIONS {
            assert!(fen.parse::<Board>().is_ok(), "{fen}");
        }
    }

    #[test]
    fn shallow_bench_runs() {
        bench(Some(2));
    }
}
