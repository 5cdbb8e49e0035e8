use super::Board;
use crate::defs::{CastlingRights, File, PieceType, Side, Square};

/// The type of a zobrist key.
pub type Key = u64;

/// `piece_keys[side][piece][square]`.
static PIECE_KEYS: [[[Key; Square::TOTAL]; PieceType::TOTAL]; Side::TOTAL] = make_piece_keys();
/// One key per castling-rights combination.
static CASTLING_KEYS: [Key; 16] = make_keys::<16>(0x5d39_1d7e_1a2b_3c4d);
/// One key per en passant file.
static EP_FILE_KEYS: [Key; File::TOTAL] = make_keys::<8>(0xc0ff_ee12_3456_789a);
/// The key toggled in when Black is to move.
static SIDE_KEY: Key = make_keys::<1>(0x7f4a_9e37_79b9_7c15)[0];

/// One step of the splitmix64 sequence: the next state and the output.
const fn splitmix64(state: u64) -> (u64, u64) {
    let state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut output = state;
    output = (output ^ (output >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    output = (output ^ (output >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    (state, output ^ (output >> 31))
}

/// Generates `N` keys from a seed.
const fn make_keys<const N: usize>(seed: u64) -> [Key; N] {
    let mut keys = [0; N];
    let mut state = seed;
    let mut index = 0;
    while index < N {
        let (next_state, key) = splitmix64(state);
        state = next_state;
        keys[index] = key;
        index += 1;
    }
    keys
}

/// Generates the per-piece keys.
const fn make_piece_keys() -> [[[Key; Square::TOTAL]; PieceType::TOTAL]; Side::TOTAL] {
    let mut keys = [[[0; Square::TOTAL]; PieceType::TOTAL]; Side::TOTAL];
    let mut state = 0xdead_beef_cafe_babeu64;
    let mut side = 0;
    while side < Side::TOTAL {
        let mut piece = 0;
        while piece < PieceType::TOTAL {
            let mut square = 0;
            while square < Square::TOTAL {
                let (next_state, key) = splitmix64(state);
                state = next_state;
                keys[side][piece][square] = key;
                square += 1;
            }
            piece += 1;
        }
        side += 1;
    }
    keys
}

impl Board {
    /// Toggles the key of `piece` of `side` on `square` into the hash.
    ///
    /// Pawns and kings are part of the king-pawn hash too, so their keys are
    /// toggled into both.
    pub fn toggle_piece_key(&mut self, side: Side, piece: PieceType, square: Square) {
        let key = PIECE_KEYS[side.to_index()][piece.to_index()][square.to_index()];
        self.hash ^= key;
        if piece == PieceType::PAWN || piece == PieceType::KING {
            self.kp_hash ^= key;
        }
    }

    /// Toggles the key of the given castling rights.
    pub fn toggle_castling_key(&mut self, rights: CastlingRights) {
        self.hash ^= CASTLING_KEYS[rights.to_index()];
    }

    /// Toggles the key of the en passant file.
    pub fn toggle_ep_key(&mut self, square: Square) {
        self.hash ^= EP_FILE_KEYS[square.file().0 as usize];
    }

    /// Toggles the side-to-move key.
    pub fn toggle_side_key(&mut self) {
        self.hash ^= SIDE_KEY;
    }

    /// Recomputes both hashes from scratch.
    ///
    /// Used when a FEN string is loaded; every other path maintains the
    /// hashes incrementally.
    pub fn refresh_hashes(&mut self) {
        self.hash = 0;
        self.kp_hash = 0;

        for side in [Side::WHITE, Side::BLACK] {
            for piece in 0..PieceType::TOTAL as u8 {
                let piece = PieceType(piece);
                for square in self.piece_bb(side, piece) {
                    self.toggle_piece_key(side, piece, square);
                }
            }
        }

        self.toggle_castling_key(self.castling_rights);
        if let Some(square) = self.ep_square {
            self.toggle_ep_key(square);
        }
        if self.side_to_move == Side::BLACK {
            self.toggle_side_key();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        board::STARTPOS,
        movegen::{generate_moves, MoveKind, MoveList},
    };

    /// Walks a deterministic pseudo-random line and checks the incremental
    /// hashes against from-scratch recomputation after every move.
    #[test]
    fn incremental_hashes_match_recomputation() {
        let mut board: Board = STARTPOS.parse().unwrap();
        let mut rng: u64 = 0x9e37_79b9;

        for _ in 0..120 {
            let mut moves = MoveList::new();
            generate_moves::<{ MoveKind::PSEUDO_LEGAL }>(&board, &mut moves);

            rng ^= rng << 13;
            rng ^= rng >> 7;
            rng ^= rng << 17;

            let mut next = None;
            for offset in 0..moves.len() {
                let mv = moves.get((rng as usize + offset) % moves.len());
                if let Some(child) = board.make_move(mv) {
                    next = Some(child);
                    break;
                }
            }
            let Some(child) = next else { break };
            board = child;

            let mut fresh = board;
            fresh.refresh_hashes();
            assert_eq!(board.hash(), fresh.hash(), "hash diverged at {board}");
            assert_eq!(board.kp_hash(), fresh.kp_hash(), "kp hash diverged at {board}");
        }
    }

    #[test]
    fn ep_keys_are_per_file() {
        let with_ep: Board = "4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 2".parse().unwrap();
        let without: Board = "4k3/8/8/3pP3/8/8/8/4K3 w - - 0 2".parse().unwrap();
        assert_ne!(with_ep.hash(), without.hash());
        assert_eq!(with_ep.kp_hash(), without.kp_hash());
    }
}
