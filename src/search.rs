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

use std::sync::{
    atomic::AtomicBool,
    mpsc::Receiver,
    Mutex,
};

use crate::{
    evaluation::Eval, movegen::Move, time_manager::TimeKeeper,
    transposition_table::TranspositionTable,
};

/// The staged move picker.
pub mod picker;
/// The triangular principal-variation table.
pub mod pv_table;
/// The repetition ring.
pub mod repetition;
/// The killer/history/counter/continuation/correction tables.
pub mod tables;
/// The searcher itself.
pub mod worker;

pub use worker::Worker;

/// The deepest ply the search may reach.
pub const MAX_PLY: usize = 128;

/// The width of the first aspiration window around the previous score.
pub const ASPIRATION_WINDOW: Eval = 50;

/// A marker for a type of node, letting one search function compile into
/// specialised PV, non-PV and root variants.
#[allow(clippy::missing_docs_in_private_items)]
pub trait Node {
    const IS_PV: bool;
    const IS_ROOT: bool;
}

/// A node searched with a zero window: not expected to end up in the PV.
pub struct NonPvNode;
/// A node that could be part of the final PV.
pub struct PvNode;
/// The node the search starts from.
pub struct RootNode;

impl Node for NonPvNode {
    const IS_PV: bool = false;
    const IS_ROOT: bool = false;
}

impl Node for PvNode {
    const IS_PV: bool = true;
    const IS_ROOT: bool = false;
}

impl Node for RootNode {
    const IS_PV: bool = true;
    const IS_ROOT: bool = true;
}

/// Everything the workers share during a search.
///
/// The transposition table is the only mutable state shared between
/// workers; everything else here is a flag, a clock or the command
/// receiver.
pub struct SharedState {
    /// The receiver of UCI commands. The primary worker polls it during a
    /// search so `stop`, `isready` and `ponderhit` keep working.
    pub uci_rx: Mutex<Receiver<String>>,
    /// The transposition table.
    pub tt: TranspositionTable,
    /// The worker-visible side of the time manager.
    pub keeper: TimeKeeper,
    /// Raised when the current search should wind down. The first worker to
    /// finish an iteration raises it, cancelling the rest.
    pub stop: AtomicBool,
    /// Raised when a `quit` arrived mid-search.
    pub quit: AtomicBool,
}

/// What one worker brought back from one search depth.
#[derive(Clone)]
pub struct WorkerReport {
    /// The score of the iteration.
    pub score: Eval,
    /// The move to play.
    pub best_move: Move,
    /// The expected reply, if the PV was at least two deep.
    pub ponder_move: Option<Move>,
    /// The whole principal variation.
    pub pv: Vec<Move>,
    /// The depth the PV actually reached.
    pub depth: i32,
    /// The deepest ply visited.
    pub seldepth: usize,
    /// Positions visited by this worker so far this search.
    pub nodes: u64,
    /// Tablebase probes that answered.
    pub tb_hits: u64,
    /// Whether this worker finished the iteration before anyone raised the
    /// stop flag. The first completed report of an iteration is the
    /// authoritative one.
    pub completed: bool,
}
