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
    io::stdin,
    sync::mpsc::channel,
    thread::spawn,
    time::Duration,
};

use crate::{
    bench::bench,
    defs::PieceType,
    engine::Engine,
    evaluation::{evaluate, PawnCache},
    lookups::magic::find_magics,
    perft,
    syzygy,
    time_manager::Limits,
};

/// The name of this engine.
const ID_NAME: &str = "Riptide";
/// The author of this engine.
const ID_AUTHOR: &str = "Ewan Crawford";
/// The version of this engine.
const ID_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The current values of the UCI options.
#[derive(Clone)]
pub struct UciOptions {
    /// Whether pondering is enabled.
    pub ponder: bool,
    /// Where the tablebase files live; empty disables them.
    pub syzygy_path: String,
    /// Accepted for GUI compatibility; probes are gated by the loaded
    /// tables themselves.
    pub syzygy_probe_limit: u8,
    /// The transposition table size in MiB.
    pub hash_mb: usize,
    /// How many searchers run in parallel.
    pub threads: usize,
    /// Subtracted from the clock before any time is allocated.
    pub move_overhead: Duration,
    /// Whether `debug position` draws the board instead of printing FEN.
    pub pretty_print: bool,
}

impl Default for UciOptions {
    fn default() -> Self {
        Self {
            ponder: false,
            syzygy_path: String::new(),
            syzygy_probe_limit: 0,
            hash_mb: 16,
            threads: 1,
            move_overhead: Duration::from_millis(50),
            pretty_print: true,
        }
    }
}

/// Prints the identification block and the supported options.
fn print_uci() {
    println!("id name {ID_NAME} {ID_VERSION}");
    println!("id author {ID_AUTHOR}");
    println!("option name Ponder type check default false");
    println!("option name SyzygyPath type string default <empty>");
    println!("option name SyzygyProbeLimit type spin default 0 min 0 max 7");
    println!("option name Hash type spin default 16 min 1 max 1024");
    println!("option name Threads type spin default 1 min 1 max 128");
    println!("option name MoveOverhead type spin default 50 min 0 max 10000");
    println!("uciok");
}

/// Reads commands forever and executes them.
///
/// A dedicated thread owns stdin and feeds a channel; during a search the
/// primary worker polls the same channel, which is how `stop`, `isready`
/// and `ponderhit` keep working mid-search.
pub fn main_loop() {
    let (uci_tx, uci_rx) = channel();

    spawn(move || {
        let stdin = stdin();
        for command in stdin.lines() {
            let Ok(command) = command else { break };
            if uci_tx.send(command).is_err() {
                break;
            }
        }
    });

    let mut engine = Engine::new(uci_rx);

    loop {
        let Some(command) = engine.recv_command() else {
            break;
        };
        let mut tokens = command.split_whitespace();

        match tokens.next() {
            Some("uci") => print_uci(),
            Some("isready") => println!("readyok"),
            Some("ucinewgame") => engine.new_game(),
            Some("position") => engine.set_position(tokens),
            Some("go") => {
                if go(&mut engine, tokens) {
                    break;
                }
            }
            Some("ponderhit") => engine.ponder_hit(),
            // nothing to stop outside a search
            Some("stop") => (),
            Some("setoption") => engine.set_option(tokens),
            Some("perft") => {
                if let Some(depth) = tokens.next().and_then(|depth| depth.parse().ok()) {
                    perft::run(engine.board(), depth);
                } else {
                    println!("info string perft needs a depth");
                }
            }
            Some("bench") => {
                let depth = tokens.next().and_then(|depth| depth.parse().ok());
                bench(depth);
            }
            Some("debug") => debug(&mut engine, tokens),
            Some("pprint") => match tokens.next() {
                Some("on") => engine.options_mut().pretty_print = true,
                Some("off") => engine.options_mut().pretty_print = false,
                _ => (),
            },
            Some("findmagics") => {
                find_magics::<{ PieceType::BISHOP.0 }>();
                find_magics::<{ PieceType::ROOK.0 }>();
            }
            Some("authors") => println!("{ID_AUTHOR}"),
            Some("version") => println!("{ID_NAME} {ID_VERSION}"),
            Some("help") => print_help(),
            Some("quit" | "exit") => break,
            _ => (),
        }

        if engine.quit_requested() {
            break;
        }
    }
}

/// Parses and runs a `go` command. Returns whether a `quit` arrived during
/// the search.
fn go<'a, T>(engine: &mut Engine, mut tokens: T) -> bool
where
    T: Iterator<Item = &'a str>,
{
    let mut limits = Limits::default();

    while let Some(token) = tokens.next() {
        match token {
            "infinite" => limits.infinite = true,
            "ponder" => limits.ponder = true,
            "wtime" => limits.white_time = parse_clock(tokens.next()),
            "btime" => limits.black_time = parse_clock(tokens.next()),
            "winc" => limits.white_inc = parse_clock(tokens.next()),
            "binc" => limits.black_inc = parse_clock(tokens.next()),
            "movestogo" => limits.moves_to_go = tokens.next().and_then(|value| value.parse().ok()),
            "movetime" => limits.move_time = parse_clock(tokens.next()),
            "depth" => limits.depth = tokens.next().and_then(|value| value.parse().ok()),
            "perft" => {
                if let Some(depth) = tokens.next().and_then(|depth| depth.parse().ok()) {
                    perft::run(engine.board(), depth);
                }
                return false;
            }
            _ => (),
        }
    }

    engine.search(&limits);
    engine.quit_requested()
}

/// Parses a millisecond clock value.
///
/// Some GUIs send a slightly negative clock; take the customary five-second
/// grace period at face value and pretend we have a moment left.
fn parse_clock(token: Option<&str>) -> Option<Duration> {
    let millis: i64 = token?.parse().ok()?;
    Some(Duration::from_millis(if millis < 0 {
        1000
    } else {
        millis as u64
    }))
}

/// Handles the `debug` command family.
fn debug<'a, T>(engine: &mut Engine, mut tokens: T)
where
    T: Iterator<Item = &'a str>,
{
    match tokens.next() {
        Some("position") => {
            if engine.options().pretty_print {
                engine.board().pretty_print();
            } else {
                println!("{}", engine.board());
            }
        }
        Some("eval") => {
            let mut cache = PawnCache::new();
            println!("static eval: {}", evaluate(engine.board(), &mut cache));
        }
        Some("options") => {
            let options = engine.options();
            println!("Ponder: {}", options.ponder);
            println!(
                "SyzygyPath: {}",
                if options.syzygy_path.is_empty() {
                    "<empty>"
                } else {
                    &options.syzygy_path
                }
            );
            println!("SyzygyProbeLimit: {}", options.syzygy_probe_limit);
            println!("Hash: {}", options.hash_mb);
            println!("Threads: {}", options.threads);
            println!("MoveOverhead: {}", options.move_overhead.as_millis());
        }
        Some("clear") => engine.clear_tables(),
        Some("syzygy") => {
            if syzygy::is_active(engine.board()) {
                println!("wdl: {:?}", syzygy::probe_wdl(engine.board()));
            } else {
                println!("syzygy: inactive (largest table: {})", syzygy::max_pieces());
            }
        }
        _ => (),
    }
}

/// The `help` text.
fn print_help() {
    println!(
        "\nRiptide speaks the UCI protocol; the common handles all work.\n\
         Extra commands:\n\
         ============================================================\n\
         perft <depth>       run perft on the current position\n\
         bench [depth]       run the fixed benchmark suite\n\
         debug position      print the current position\n\
         debug eval          print the static evaluation\n\
         debug options       print the current option values\n\
         debug clear         clear every table\n\
         debug syzygy        probe the tablebases for this position\n\
         pprint <on|off>     toggle pretty printing\n\
         findmagics          regenerate the slider magic numbers\n\
         authors             print author information\n\
         version             print version information\n\
         quit                stop the engine\n"
    );
}
