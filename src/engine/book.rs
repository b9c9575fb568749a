// Polyglot opening book.
//
// A Polyglot `.bin` file is a sorted array of 16-byte big-endian records:
// {key: u64, move: u16, weight: u16, learn: u32}. Probing binary-searches
// the file for the position key, aggregates the weights of equal moves
// across every configured book, and picks one by weighted random choice,
// so play varies between games. Any I/O problem, malformed file, or
// missing position quietly means "no book move".
//
// The key layout is Polyglot's: 768 piece keys ordered black-pawn,
// white-pawn, black-knight, ... then 4 castling keys (wk, wq, bk, bq),
// 8 en-passant file keys, and the white-to-move key. The canonical
// PolyGlot constant table is not vendored; the table below is generated
// from a fixed seed, so books must be built against the same table. A
// book keyed differently simply never matches a position, which degrades
// like a missing file.

use chess::{Board, ChessMove, Color, File, Piece, Rank, Square, ALL_SQUARES};
use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::fs;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

const RECORD_SIZE: u64 = 16;

const PIECE_KEY_COUNT: usize = 768;
const CASTLE_KEY_OFFSET: usize = 768;
const EP_KEY_OFFSET: usize = 772;
const TURN_KEY_OFFSET: usize = 780;
const KEY_COUNT: usize = 781;

const KEY_TABLE_SEED: u64 = 0x70f5_79b6_55a5_02e5;

static KEYS: Lazy<[u64; KEY_COUNT]> = Lazy::new(|| {
    let mut rng = StdRng::seed_from_u64(KEY_TABLE_SEED);
    let mut keys = [0u64; KEY_COUNT];
    for key in &mut keys {
        *key = rng.gen();
    }
    keys
});

/// Polyglot hash of a position.
pub fn polyglot_hash(board: &Board) -> u64 {
    let mut hash = 0u64;

    for sq in ALL_SQUARES {
        if let Some(piece) = board.piece_on(sq) {
            let color = board.color_on(sq).expect("occupied square has a color");
            let kind = 2 * piece_offset(piece) + if color == Color::White { 1 } else { 0 };
            let index =
                64 * kind + 8 * sq.get_rank().to_index() + sq.get_file().to_index();
            hash ^= KEYS[index];
        }
    }

    if board.castle_rights(Color::White).has_kingside() {
        hash ^= KEYS[CASTLE_KEY_OFFSET];
    }
    if board.castle_rights(Color::White).has_queenside() {
        hash ^= KEYS[CASTLE_KEY_OFFSET + 1];
    }
    if board.castle_rights(Color::Black).has_kingside() {
        hash ^= KEYS[CASTLE_KEY_OFFSET + 2];
    }
    if board.castle_rights(Color::Black).has_queenside() {
        hash ^= KEYS[CASTLE_KEY_OFFSET + 3];
    }

    // The board library keeps the en-passant square only while a pawn of
    // the side to move can actually capture, which is Polyglot's rule.
    if let Some(sq) = board.en_passant() {
        hash ^= KEYS[EP_KEY_OFFSET + sq.get_file().to_index()];
    }

    if board.side_to_move() == Color::White {
        hash ^= KEYS[TURN_KEY_OFFSET];
    }

    hash
}

fn piece_offset(piece: Piece) -> usize {
    match piece {
        Piece::Pawn => 0,
        Piece::Knight => 1,
        Piece::Bishop => 2,
        Piece::Rook => 3,
        Piece::Queen => 4,
        Piece::King => 5,
    }
}

/// A set of Polyglot book files probed before every search.
pub struct OpeningBook {
    paths: Vec<PathBuf>,
}

impl OpeningBook {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    pub fn empty() -> Self {
        Self { paths: Vec::new() }
    }

    /// Weighted random book move for the position, `None` if the books
    /// have nothing to say (or cannot be read).
    pub fn probe(&self, board: &Board, rng: &mut StdRng) -> Option<ChessMove> {
        if self.paths.is_empty() {
            return None;
        }

        let key = polyglot_hash(board);
        let mut candidates: Vec<(ChessMove, u64)> = Vec::new();

        for path in &self.paths {
            let entries = match read_entries(path, key) {
                Ok(entries) => entries,
                Err(err) => {
                    log::debug!("book {} unreadable: {err}", path.display());
                    continue;
                }
            };
            for (raw_move, weight) in entries {
                let Some(mv) = decode_move(board, raw_move) else {
                    continue;
                };
                if !board.legal(mv) {
                    continue;
                }
                match candidates.iter_mut().find(|(m, _)| *m == mv) {
                    Some((_, total)) => *total += weight as u64,
                    None => candidates.push((mv, weight as u64)),
                }
            }
        }

        weighted_choice(&candidates, rng)
    }
}

/// All records for `key` in one book file.
fn read_entries(path: &Path, key: u64) -> io::Result<Vec<(u16, u16)>> {
    let mut file = fs::File::open(path)?;
    let len = file.metadata()?.len();
    let count = len / RECORD_SIZE;
    if count == 0 {
        return Ok(Vec::new());
    }

    // Binary search for the first record with the key.
    let mut lo = 0u64;
    let mut hi = count;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if record_key(&mut file, mid)? < key {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }

    let mut entries = Vec::new();
    let mut index = lo;
    while index < count {
        let record = read_record(&mut file, index)?;
        if record.0 != key {
            break;
        }
        entries.push((record.1, record.2));
        index += 1;
    }
    Ok(entries)
}

fn record_key(file: &mut fs::File, index: u64) -> io::Result<u64> {
    Ok(read_record(file, index)?.0)
}

fn read_record(file: &mut fs::File, index: u64) -> io::Result<(u64, u16, u16)> {
    file.seek(SeekFrom::Start(index * RECORD_SIZE))?;
    let mut buf = [0u8; RECORD_SIZE as usize];
    file.read_exact(&mut buf)?;
    let key = u64::from_be_bytes(buf[0..8].try_into().expect("8-byte slice"));
    let mv = u16::from_be_bytes(buf[8..10].try_into().expect("2-byte slice"));
    let weight = u16::from_be_bytes(buf[10..12].try_into().expect("2-byte slice"));
    Ok((key, mv, weight))
}

/// Decode a Polyglot move field against the current position.
///
/// Bits: 0-2 to-file, 3-5 to-rank, 6-8 from-file, 9-11 from-rank, 12-14
/// promotion (0 none, 1 knight .. 4 queen). Castling is encoded as the
/// king capturing its own rook and is translated to the king-to-g/c form.
fn decode_move(board: &Board, raw: u16) -> Option<ChessMove> {
    let to_file = (raw & 0x7) as usize;
    let to_rank = ((raw >> 3) & 0x7) as usize;
    let from_file = ((raw >> 6) & 0x7) as usize;
    let from_rank = ((raw >> 9) & 0x7) as usize;
    let promotion = match (raw >> 12) & 0x7 {
        0 => None,
        1 => Some(Piece::Knight),
        2 => Some(Piece::Bishop),
        3 => Some(Piece::Rook),
        4 => Some(Piece::Queen),
        _ => return None,
    };

    let source = Square::make_square(Rank::from_index(from_rank), File::from_index(from_file));
    let dest = Square::make_square(Rank::from_index(to_rank), File::from_index(to_file));

    // e1h1 / e1a1 / e8h8 / e8a8 with the king on the source square.
    if board.piece_on(source) == Some(Piece::King) && source.get_file() == File::E {
        let castled_file = match dest.get_file() {
            File::H if dest.get_rank() == source.get_rank() => Some(File::G),
            File::A if dest.get_rank() == source.get_rank() => Some(File::C),
            _ => None,
        };
        if let Some(file) = castled_file {
            return Some(ChessMove::new(
                source,
                Square::make_square(source.get_rank(), file),
                None,
            ));
        }
    }

    Some(ChessMove::new(source, dest, promotion))
}

fn weighted_choice(candidates: &[(ChessMove, u64)], rng: &mut StdRng) -> Option<ChessMove> {
    if candidates.is_empty() {
        return None;
    }
    let total: u64 = candidates.iter().map(|(_, w)| w).sum();
    if total == 0 {
        // All-zero weights: any entry is as good as another.
        let index = rng.gen_range(0..candidates.len());
        return Some(candidates[index].0);
    }
    let mut ticket = rng.gen_range(0..total);
    for (mv, weight) in candidates {
        if ticket < *weight {
            return Some(*mv);
        }
        ticket -= weight;
    }
    Some(candidates[candidates.len() - 1].0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::str::FromStr;

    /// Write a book file with the given records, sorted by key as the
    /// Polyglot format requires.
    fn write_book(path: &Path, mut records: Vec<(u64, u16, u16)>) {
        records.sort_by_key(|r| r.0);
        let mut file = fs::File::create(path).unwrap();
        for (key, mv, weight) in records {
            file.write_all(&key.to_be_bytes()).unwrap();
            file.write_all(&mv.to_be_bytes()).unwrap();
            file.write_all(&weight.to_be_bytes()).unwrap();
            file.write_all(&0u32.to_be_bytes()).unwrap();
        }
    }

    fn temp_book(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("scholar-book-{name}-{}.bin", std::process::id()))
    }

    /// Polyglot encoding of a plain from/to move.
    fn encode(mv: ChessMove) -> u16 {
        let to = mv.get_dest();
        let from = mv.get_source();
        (to.get_file().to_index() as u16)
            | ((to.get_rank().to_index() as u16) << 3)
            | ((from.get_file().to_index() as u16) << 6)
            | ((from.get_rank().to_index() as u16) << 9)
    }

    #[test]
    fn test_probe_returns_stored_move() {
        let path = temp_book("single");
        let board = Board::default();
        let e4 = ChessMove::new(Square::E2, Square::E4, None);
        write_book(&path, vec![(polyglot_hash(&board), encode(e4), 10)]);

        let book = OpeningBook::new(vec![path.clone()]);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(book.probe(&board, &mut rng), Some(e4));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_probe_is_deterministic_for_fixed_seed() {
        let path = temp_book("seeded");
        let board = Board::default();
        let e4 = ChessMove::new(Square::E2, Square::E4, None);
        let d4 = ChessMove::new(Square::D2, Square::D4, None);
        let nf3 = ChessMove::new(Square::G1, Square::F3, None);
        let key = polyglot_hash(&board);
        write_book(
            &path,
            vec![(key, encode(e4), 40), (key, encode(d4), 35), (key, encode(nf3), 25)],
        );

        let book = OpeningBook::new(vec![path.clone()]);
        let first = book.probe(&board, &mut StdRng::seed_from_u64(99));
        let second = book.probe(&board, &mut StdRng::seed_from_u64(99));
        assert!(first.is_some());
        assert_eq!(first, second, "same seed must pick the same move");
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_weights_aggregate_across_files() {
        let path_a = temp_book("agg-a");
        let path_b = temp_book("agg-b");
        let board = Board::default();
        let e4 = ChessMove::new(Square::E2, Square::E4, None);
        let key = polyglot_hash(&board);
        // The same move in both files; the totals merge into one candidate.
        write_book(&path_a, vec![(key, encode(e4), 3)]);
        write_book(&path_b, vec![(key, encode(e4), 7)]);

        let book = OpeningBook::new(vec![path_a.clone(), path_b.clone()]);
        for seed in 0..8 {
            let mut rng = StdRng::seed_from_u64(seed);
            assert_eq!(book.probe(&board, &mut rng), Some(e4));
        }
        fs::remove_file(&path_a).ok();
        fs::remove_file(&path_b).ok();
    }

    #[test]
    fn test_missing_file_means_no_move() {
        let book = OpeningBook::new(vec![PathBuf::from("/no/such/book.bin")]);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(book.probe(&Board::default(), &mut rng), None);
    }

    #[test]
    fn test_unknown_position_means_no_move() {
        let path = temp_book("unknown");
        let board = Board::default();
        let e4 = ChessMove::new(Square::E2, Square::E4, None);
        write_book(&path, vec![(polyglot_hash(&board), encode(e4), 1)]);

        let after_e4 = board.make_move_new(e4);
        let book = OpeningBook::new(vec![path.clone()]);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(book.probe(&after_e4, &mut rng), None);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_illegal_book_move_is_skipped() {
        let path = temp_book("illegal");
        let board = Board::default();
        let key = polyglot_hash(&board);
        // e2e5 is not a legal pawn move.
        let bogus = encode(ChessMove::new(Square::E2, Square::E5, None));
        write_book(&path, vec![(key, bogus, 50)]);

        let book = OpeningBook::new(vec![path.clone()]);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(book.probe(&board, &mut rng), None);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_castling_translation() {
        let board = Board::from_str("r3k2r/pppq1ppp/2n2n2/3pp3/3PP3/2N2N2/PPPQ1PPP/R3K2R w KQkq - 0 1")
            .unwrap();
        // Polyglot writes O-O as e1h1.
        let raw = encode(ChessMove::new(Square::E1, Square::H1, None));
        let decoded = decode_move(&board, raw).unwrap();
        assert_eq!(decoded, ChessMove::new(Square::E1, Square::G1, None));
        assert!(board.legal(decoded));

        let raw_long = encode(ChessMove::new(Square::E1, Square::A1, None));
        let decoded_long = decode_move(&board, raw_long).unwrap();
        assert_eq!(decoded_long, ChessMove::new(Square::E1, Square::C1, None));
    }

    #[test]
    fn test_promotion_decoding() {
        let board = Board::from_str("8/P6k/8/8/8/8/8/K7 w - - 0 1").unwrap();
        let raw = encode(ChessMove::new(Square::A7, Square::A8, None)) | (4 << 12);
        let decoded = decode_move(&board, raw).unwrap();
        assert_eq!(decoded, ChessMove::new(Square::A7, Square::A8, Some(Piece::Queen)));
    }

    #[test]
    fn test_binary_search_finds_key_among_many() {
        let path = temp_book("many");
        let board = Board::default();
        let key = polyglot_hash(&board);
        let e4 = ChessMove::new(Square::E2, Square::E4, None);

        let mut records = Vec::new();
        for filler in 0..200u64 {
            // Surround the real key with unrelated records.
            let fake_key = key.wrapping_add(filler.wrapping_mul(0x9e37_79b9));
            if fake_key != key {
                records.push((fake_key, 0, 1));
            }
        }
        records.push((key, encode(e4), 9));
        write_book(&path, records);

        let book = OpeningBook::new(vec![path.clone()]);
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(book.probe(&board, &mut rng), Some(e4));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_hash_distinguishes_castling_and_side() {
        let both = Board::from_str("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let none = Board::from_str("r3k2r/8/8/8/8/8/8/R3K2R w - - 0 1").unwrap();
        assert_ne!(polyglot_hash(&both), polyglot_hash(&none));

        let black = Board::from_str("r3k2r/8/8/8/8/8/8/R3K2R b KQkq - 0 1").unwrap();
        assert_ne!(polyglot_hash(&both), polyglot_hash(&black));
    }
}
