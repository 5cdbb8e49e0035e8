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

use thiserror::Error;

/// An error raised while parsing a FEN string, a move or an option value.
///
/// Parse errors never disturb engine state: the offending command is
/// reported and dropped.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("expected another token")]
    MissingToken,
    #[error("invalid square")]
    InvalidSquare,
    #[error("invalid piece character '{0}'")]
    InvalidPiece(char),
    #[error("invalid FEN field: {0}")]
    InvalidFen(&'static str),
}

/// An error raised while initialising the tablebase oracle.
#[derive(Debug, Error)]
pub enum SyzygyError {
    #[error("no tablebase backend is compiled in")]
    BackendUnavailable,
}
