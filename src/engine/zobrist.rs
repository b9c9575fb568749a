// Zobrist position hashing.
//
// Each (square, piece, color) combination, each castling right, each en
// passant file, and the side to move get a random 64-bit key; a position's
// hash is the XOR of the applicable keys. XOR is its own inverse, so a move
// only has to toggle the keys it touches — `update_hash` maintains the hash
// down the search recursion without rescanning the board.
//
// Key tables are per-engine values, not process globals. Two engines may
// carry different tables; a transposition table must only ever be probed
// with hashes from the table that filled it.

use chess::{Board, ChessMove, Color, File, Piece, Square, ALL_SQUARES};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Default key-generation seed. Any seed works; a fixed one keeps hashes
/// reproducible across runs.
pub const DEFAULT_ZOBRIST_SEED: u64 = 0x517cc1b727220a95;

/// Random key material for one engine instance.
pub struct ZobristKeys {
    /// One key per (square, piece-kind × color); white kinds 0..6, black 6..12.
    piece: [[u64; 12]; 64],
    /// White kingside, white queenside, black kingside, black queenside.
    castle: [u64; 4],
    /// One key per en passant file.
    ep: [u64; 8],
    /// Toggled when Black is to move.
    side: u64,
}

impl ZobristKeys {
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut piece = [[0u64; 12]; 64];
        for square in &mut piece {
            for key in square {
                *key = rng.gen();
            }
        }
        let mut castle = [0u64; 4];
        for key in &mut castle {
            *key = rng.gen();
        }
        let mut ep = [0u64; 8];
        for key in &mut ep {
            *key = rng.gen();
        }
        Self {
            piece,
            castle,
            ep,
            side: rng.gen(),
        }
    }

    /// Hash a position from scratch.
    pub fn full_hash(&self, board: &Board) -> u64 {
        let mut hash = 0u64;

        for sq in ALL_SQUARES {
            if let Some(piece) = board.piece_on(sq) {
                let color = board.color_on(sq).expect("occupied square has a color");
                hash ^= self.piece[sq.to_index()][piece_kind(piece, color)];
            }
        }

        for (index, set) in castle_right_flags(board) {
            if set {
                hash ^= self.castle[index];
            }
        }

        if let Some(sq) = board.en_passant() {
            hash ^= self.ep[sq.get_file().to_index()];
        }

        if board.side_to_move() == Color::Black {
            hash ^= self.side;
        }

        hash
    }

    /// Advance `hash` across `mv` without rescanning the board.
    ///
    /// `board` is the position *before* the move. The castling-right and en
    /// passant deltas are read off a board copy with the move applied; every
    /// piece toggle is derived from the move itself.
    pub fn update_hash(&self, hash: u64, board: &Board, mv: ChessMove) -> u64 {
        let next = board.make_move_new(mv);
        let mut h = hash;

        let us = board.side_to_move();
        let src = mv.get_source();
        let dest = mv.get_dest();
        let piece = board
            .piece_on(src)
            .expect("move source square is occupied");

        // Clear any pre-existing en passant file.
        if let Some(sq) = board.en_passant() {
            h ^= self.ep[sq.get_file().to_index()];
        }

        // Mover leaves its square.
        h ^= self.piece[src.to_index()][piece_kind(piece, us)];

        // Captured piece leaves the square it actually occupied.
        if let Some(victim) = board.piece_on(dest) {
            h ^= self.piece[dest.to_index()][piece_kind(victim, !us)];
        } else if piece == Piece::Pawn && src.get_file() != dest.get_file() {
            // En passant: the victim stands beside the source, not on dest.
            let victim_sq = Square::make_square(src.get_rank(), dest.get_file());
            h ^= self.piece[victim_sq.to_index()][piece_kind(Piece::Pawn, !us)];
        }

        // Castling also moves the rook.
        if piece == Piece::King
            && src.get_file().to_index().abs_diff(dest.get_file().to_index()) == 2
        {
            let back_rank = src.get_rank();
            let (rook_from, rook_to) = if dest.get_file() == File::G {
                (File::H, File::F)
            } else {
                (File::A, File::D)
            };
            h ^= self.piece[Square::make_square(back_rank, rook_from).to_index()]
                [piece_kind(Piece::Rook, us)];
            h ^= self.piece[Square::make_square(back_rank, rook_to).to_index()]
                [piece_kind(Piece::Rook, us)];
        }

        // Arriving piece: the promotion kind if the move promotes.
        let arriving = mv.get_promotion().unwrap_or(piece);
        h ^= self.piece[dest.to_index()][piece_kind(arriving, us)];

        // Toggle every castling right the move changed.
        let before = castle_right_flags(board);
        let after = castle_right_flags(&next);
        for ((index, old), (_, new)) in before.into_iter().zip(after) {
            if old != new {
                h ^= self.castle[index];
            }
        }

        // New en passant file, if the move created one.
        if let Some(sq) = next.en_passant() {
            h ^= self.ep[sq.get_file().to_index()];
        }

        h ^= self.side;
        h
    }

    /// Hash after a null move: flip the side, clear any en passant file.
    pub fn null_hash(&self, hash: u64, board: &Board) -> u64 {
        let mut h = hash ^ self.side;
        if let Some(sq) = board.en_passant() {
            h ^= self.ep[sq.get_file().to_index()];
        }
        h
    }
}

impl Default for ZobristKeys {
    fn default() -> Self {
        Self::new(DEFAULT_ZOBRIST_SEED)
    }
}

/// Key index for a piece of a given color: white 0..6, black 6..12.
fn piece_kind(piece: Piece, color: Color) -> usize {
    let kind = match piece {
        Piece::Pawn => 0,
        Piece::Knight => 1,
        Piece::Bishop => 2,
        Piece::Rook => 3,
        Piece::Queen => 4,
        Piece::King => 5,
    };
    match color {
        Color::White => kind,
        Color::Black => kind + 6,
    }
}

/// The four castling rights in key order, with their current state.
fn castle_right_flags(board: &Board) -> [(usize, bool); 4] {
    let white = board.castle_rights(Color::White);
    let black = board.castle_rights(Color::Black);
    [
        (0, white.has_kingside()),
        (1, white.has_queenside()),
        (2, black.has_kingside()),
        (3, black.has_queenside()),
    ]
}
