// Game state on top of the `chess` board library.
//
// `chess::Board` is a copy-make position with legal move generation and
// terminal detection, but no history: no push/pop, no repetition counting,
// no halfmove clock. This wrapper adds exactly that, which is what the
// search core needs — moves are applied with `push` and rewound with `pop`,
// and the stack restores the position bit-exact on unwind.

use chess::{Board, BoardStatus, ChessMove, Color, File, MoveGen, Piece, Rank, Square, EMPTY};
use smallvec::SmallVec;
use std::str::FromStr;

/// A chess game: the current position plus the full position history.
#[derive(Clone, Debug)]
pub struct Game {
    /// Position stack; the last element is the current position.
    boards: Vec<Board>,
    /// Halfmove clock per stack entry (moves since the last pawn move or capture).
    clocks: Vec<u32>,
    /// Fullmove number of the first stack entry.
    base_fullmove: u32,
}

impl Game {
    /// Start a game from the standard initial position.
    pub fn new() -> Self {
        Self {
            boards: vec![Board::default()],
            clocks: vec![0],
            base_fullmove: 1,
        }
    }

    /// Start a game from a FEN string.
    ///
    /// The halfmove clock and fullmove number fields are honored when
    /// present; the board library ignores them, so they are parsed here.
    pub fn from_fen(fen: &str) -> Result<Self, chess::Error> {
        let board = Board::from_str(fen)?;
        let mut fields = fen.split_whitespace().skip(4);
        let clock = fields.next().and_then(|f| f.parse().ok()).unwrap_or(0);
        let fullmove = fields.next().and_then(|f| f.parse().ok()).unwrap_or(1);
        Ok(Self {
            boards: vec![board],
            clocks: vec![clock],
            base_fullmove: fullmove,
        })
    }

    /// The current position.
    pub fn board(&self) -> &Board {
        self.boards.last().expect("position stack is never empty")
    }

    pub fn side_to_move(&self) -> Color {
        self.board().side_to_move()
    }

    /// Number of halfmoves played on this stack.
    pub fn ply(&self) -> usize {
        self.boards.len() - 1
    }

    /// Moves since the last pawn move or capture.
    pub fn halfmove_clock(&self) -> u32 {
        *self.clocks.last().expect("clock stack is never empty")
    }

    pub fn fullmove_number(&self) -> u32 {
        self.base_fullmove + (self.ply() as u32) / 2
    }

    /// Serialize the current position as a FEN string.
    pub fn fen(&self) -> String {
        let board = self.board();
        let mut out = String::new();
        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                let sq = Square::make_square(Rank::from_index(rank), File::from_index(file));
                match board.piece_on(sq) {
                    Some(piece) => {
                        if empty > 0 {
                            out.push_str(&empty.to_string());
                            empty = 0;
                        }
                        let white = board.color_on(sq) == Some(Color::White);
                        out.push(piece_char(piece, white));
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                out.push_str(&empty.to_string());
            }
            if rank > 0 {
                out.push('/');
            }
        }

        out.push(' ');
        out.push(match board.side_to_move() {
            Color::White => 'w',
            Color::Black => 'b',
        });

        out.push(' ');
        let mut rights = String::new();
        if board.castle_rights(Color::White).has_kingside() {
            rights.push('K');
        }
        if board.castle_rights(Color::White).has_queenside() {
            rights.push('Q');
        }
        if board.castle_rights(Color::Black).has_kingside() {
            rights.push('k');
        }
        if board.castle_rights(Color::Black).has_queenside() {
            rights.push('q');
        }
        if rights.is_empty() {
            rights.push('-');
        }
        out.push_str(&rights);

        out.push(' ');
        match board.en_passant() {
            // The library stores the square of the capturable pawn; FEN wants
            // the square behind it.
            Some(sq) => {
                let target_rank = match board.side_to_move() {
                    Color::White => 5,
                    Color::Black => 2,
                };
                let target =
                    Square::make_square(Rank::from_index(target_rank), sq.get_file());
                out.push_str(&target.to_string());
            }
            None => out.push('-'),
        }

        out.push_str(&format!(" {} {}", self.halfmove_clock(), self.fullmove_number()));
        out
    }

    /// All legal moves in the current position.
    pub fn legal_moves(&self) -> SmallVec<[ChessMove; 64]> {
        MoveGen::new_legal(self.board()).collect()
    }

    /// Apply a move. The move must be legal.
    pub fn push(&mut self, mv: ChessMove) {
        debug_assert!(self.board().legal(mv), "push of illegal move {mv}");
        let resets_clock = self.is_capture(mv) || self.board().piece_on(mv.get_source()) == Some(Piece::Pawn);
        let next = self.board().make_move_new(mv);
        self.boards.push(next);
        let clock = if resets_clock { 0 } else { self.halfmove_clock() + 1 };
        self.clocks.push(clock);
    }

    /// Apply a null move (pass). Returns false if the side to move is in
    /// check, in which case the position is unchanged.
    pub fn push_null(&mut self) -> bool {
        match self.board().null_move() {
            Some(next) => {
                self.boards.push(next);
                self.clocks.push(self.halfmove_clock() + 1);
                true
            }
            None => false,
        }
    }

    /// Rewind the last `push` or `push_null`.
    pub fn pop(&mut self) {
        debug_assert!(self.boards.len() > 1, "pop past the root position");
        if self.boards.len() > 1 {
            self.boards.pop();
            self.clocks.pop();
        }
    }

    pub fn in_check(&self) -> bool {
        *self.board().checkers() != EMPTY
    }

    pub fn is_checkmate(&self) -> bool {
        self.board().status() == BoardStatus::Checkmate
    }

    pub fn is_stalemate(&self) -> bool {
        self.board().status() == BoardStatus::Stalemate
    }

    /// Draw by bare kings, a lone minor piece, or same-colored bishops only.
    pub fn is_insufficient_material(&self) -> bool {
        let board = self.board();
        if *board.pieces(Piece::Pawn) != EMPTY
            || *board.pieces(Piece::Rook) != EMPTY
            || *board.pieces(Piece::Queen) != EMPTY
        {
            return false;
        }
        let knights = board.pieces(Piece::Knight).popcnt();
        let bishops = board.pieces(Piece::Bishop).popcnt();
        match (knights, bishops) {
            (0, 0) | (1, 0) | (0, 1) => true,
            (0, _) => {
                // Any number of bishops all on one square color cannot mate.
                let mut light = 0;
                let mut dark = 0;
                for sq in *board.pieces(Piece::Bishop) {
                    if (sq.get_rank().to_index() + sq.get_file().to_index()) % 2 == 0 {
                        dark += 1;
                    } else {
                        light += 1;
                    }
                }
                light == 0 || dark == 0
            }
            _ => false,
        }
    }

    /// Checkmate, stalemate, or dead position.
    pub fn is_terminal(&self) -> bool {
        self.board().status() != BoardStatus::Ongoing || self.is_insufficient_material()
    }

    /// True if the current position has occurred at least `count` times in
    /// the game history, the current occurrence included.
    pub fn is_repetition(&self, count: usize) -> bool {
        let current = self.board().get_hash();
        let mut seen = 0;
        for board in &self.boards {
            if board.get_hash() == current {
                seen += 1;
                if seen >= count {
                    return true;
                }
            }
        }
        false
    }

    /// True if `mv` captures a piece, en passant included.
    pub fn is_capture(&self, mv: ChessMove) -> bool {
        self.board().piece_on(mv.get_dest()).is_some() || self.is_en_passant(mv)
    }

    pub fn is_en_passant(&self, mv: ChessMove) -> bool {
        self.board().piece_on(mv.get_source()) == Some(Piece::Pawn)
            && mv.get_source().get_file() != mv.get_dest().get_file()
            && self.board().piece_on(mv.get_dest()).is_none()
    }

    pub fn is_castling(&self, mv: ChessMove) -> bool {
        self.board().piece_on(mv.get_source()) == Some(Piece::King)
            && mv.get_source().get_file().to_index().abs_diff(mv.get_dest().get_file().to_index())
                == 2
    }

    pub fn is_double_pawn_push(&self, mv: ChessMove) -> bool {
        self.board().piece_on(mv.get_source()) == Some(Piece::Pawn)
            && mv
                .get_source()
                .get_rank()
                .to_index()
                .abs_diff(mv.get_dest().get_rank().to_index())
                == 2
    }

    /// True if `mv` leaves the opponent in check.
    pub fn gives_check(&self, mv: ChessMove) -> bool {
        *self.board().make_move_new(mv).checkers() != EMPTY
    }

    /// True if `mv` checkmates the opponent.
    pub fn is_mating_move(&self, mv: ChessMove) -> bool {
        self.board().make_move_new(mv).status() == BoardStatus::Checkmate
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

fn piece_char(piece: Piece, white: bool) -> char {
    let c = match piece {
        Piece::Pawn => 'p',
        Piece::Knight => 'n',
        Piece::Bishop => 'b',
        Piece::Rook => 'r',
        Piece::Queen => 'q',
        Piece::King => 'k',
    };
    if white {
        c.to_ascii_uppercase()
    } else {
        c
    }
}
