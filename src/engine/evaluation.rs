// Position evaluation.
//
// The score is a weighted sum of feature values, in centipawns, from the
// side-to-move perspective (negamax convention: positive favors the side
// to move). Features are a fixed registry indexed by a small enum; each
// slot carries a weight and an enable flag, and the learning harness
// adjusts the weights between games. Terminal positions short-circuit the
// feature sum.

use crate::engine::phase::Phase;
use crate::engine::psqt::{piece_index, PieceSquareTables};
use crate::game::Game;
use chess::{get_adjacent_files, Board, BitBoard, Color, MoveGen, Piece, Square, EMPTY};

/// Score of a checkmated side to move.
pub const MATE_SCORE: i32 = 100_000;

/// Hard bound on any feature weight. A loaded weight outside this range
/// means the weight file is corrupt.
pub const W_MAX: f32 = 50.0;

/// A position counts as repeated once it has occurred this many times.
const REPETITION_THRESHOLD: usize = 2;
const REPETITION_PENALTY_LATE: i32 = -200;
const REPETITION_PENALTY_EARLY: i32 = -80;

const DOUBLED_PAWN_PENALTY: i32 = -20;
const ISOLATED_PAWN_PENALTY: i32 = -15;
const SHIELD_PENALTY_PER_MISSING_PAWN: i32 = -18;
const ROOK_OPEN_FILE_BONUS: i32 = 20;
const ROOK_SEMI_OPEN_FILE_BONUS: i32 = 10;
const BISHOP_PAIR_BONUS: i32 = 30;

const DEFAULT_PIECE_VALUES: [i32; 6] = [100, 320, 330, 500, 900, 20_000];

/// The evaluation feature registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Material,
    Psqt,
    Mobility,
    PawnStructure,
    KingSafety,
    RookOpenFile,
    BishopPair,
}

impl Feature {
    pub const COUNT: usize = 7;

    pub const ALL: [Feature; Feature::COUNT] = [
        Feature::Material,
        Feature::Psqt,
        Feature::Mobility,
        Feature::PawnStructure,
        Feature::KingSafety,
        Feature::RookOpenFile,
        Feature::BishopPair,
    ];

    pub fn index(self) -> usize {
        match self {
            Feature::Material => 0,
            Feature::Psqt => 1,
            Feature::Mobility => 2,
            Feature::PawnStructure => 3,
            Feature::KingSafety => 4,
            Feature::RookOpenFile => 5,
            Feature::BishopPair => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Feature::Material => "material",
            Feature::Psqt => "psqt",
            Feature::Mobility => "mobility",
            Feature::PawnStructure => "pawn_structure",
            Feature::KingSafety => "king_safety",
            Feature::RookOpenFile => "rook_open_file",
            Feature::BishopPair => "bishop_pair",
        }
    }

    pub fn from_name(name: &str) -> Option<Feature> {
        Feature::ALL.iter().copied().find(|f| f.name() == name)
    }
}

/// Weighted-feature static evaluator.
///
/// An `Evaluator` is a plain value: search borrows it immutably, the
/// training harness owns the mutable copy and serializes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluator {
    weights: [f32; Feature::COUNT],
    enabled: [bool; Feature::COUNT],
    piece_values: [i32; 6],
    psqt: PieceSquareTables,
}

impl Evaluator {
    /// Static score of the current position, side-to-move view.
    pub fn evaluate(&self, game: &Game) -> i32 {
        if game.is_checkmate() {
            return -MATE_SCORE;
        }
        if game.is_stalemate() || game.is_insufficient_material() {
            return 0;
        }

        let phase = Phase::of(game.board());
        if game.is_repetition(REPETITION_THRESHOLD) {
            return if phase.is_endgame() {
                REPETITION_PENALTY_LATE
            } else {
                REPETITION_PENALTY_EARLY
            };
        }

        let values = self.feature_values(game);
        let mut score = 0.0f32;
        for feature in Feature::ALL {
            let i = feature.index();
            if self.enabled[i] {
                score += self.weights[i] * values[i] as f32;
            }
        }
        score as i32
    }

    /// Raw feature values of the position, side-to-move view, unweighted.
    /// This is the vector the learning step multiplies into the weights.
    pub fn feature_values(&self, game: &Game) -> [i32; Feature::COUNT] {
        let board = game.board();
        let us = board.side_to_move();
        let them = !us;
        let phase = Phase::of(board);

        let mut values = [0i32; Feature::COUNT];
        values[Feature::Material.index()] = self.material(board, us) - self.material(board, them);
        values[Feature::Psqt.index()] = self.psqt_sum(board, us) - self.psqt_sum(board, them);
        // Mobility is deliberately one-sided: it counts the options of the
        // side to move only. The weights are tuned against this shape.
        values[Feature::Mobility.index()] = MoveGen::new_legal(board).len() as i32;
        values[Feature::PawnStructure.index()] =
            pawn_structure(board, us, phase) - pawn_structure(board, them, phase);
        values[Feature::KingSafety.index()] =
            self.king_safety(board, us, phase) - self.king_safety(board, them, phase);
        values[Feature::RookOpenFile.index()] =
            rook_open_file(board, us) - rook_open_file(board, them);
        values[Feature::BishopPair.index()] =
            bishop_pair(board, us) - bishop_pair(board, them);
        values
    }

    fn material(&self, board: &Board, color: Color) -> i32 {
        let mut total = 0;
        for piece in chess::ALL_PIECES {
            let count = (*board.pieces(piece) & *board.color_combined(color)).popcnt() as i32;
            total += count * self.piece_values[piece_index(piece)];
        }
        total
    }

    fn psqt_sum(&self, board: &Board, color: Color) -> i32 {
        let mut total = 0;
        for sq in *board.color_combined(color) {
            let piece = board.piece_on(sq).expect("occupied square has a piece");
            total += self.psqt.value(piece, sq, color);
        }
        total
    }

    fn king_safety(&self, board: &Board, color: Color, phase: Phase) -> i32 {
        let king = board.king_square(color);
        if phase.is_endgame() {
            return self.endgame_king_activity(board, color, king);
        }

        // Opening/middlegame: count the pawn shield in the 2x3 block in
        // front of the king and punish the holes.
        let king_rank = king.get_rank().to_index() as i32;
        let king_file = king.get_file().to_index() as i32;
        let forward: i32 = match color {
            Color::White => 1,
            Color::Black => -1,
        };

        let own_pawns = *board.pieces(Piece::Pawn) & *board.color_combined(color);
        let mut shield = 0;
        for rank_step in 1..=2 {
            let rank = king_rank + forward * rank_step;
            if !(0..8).contains(&rank) {
                continue;
            }
            for file in (king_file - 1)..=(king_file + 1) {
                if !(0..8).contains(&file) {
                    continue;
                }
                let sq = square_at(rank as usize, file as usize);
                if own_pawns & BitBoard::from_square(sq) != EMPTY {
                    shield += 1;
                }
            }
        }
        SHIELD_PENALTY_PER_MISSING_PAWN * (3 - shield.min(3))
    }

    fn endgame_king_activity(&self, board: &Board, color: Color, king: Square) -> i32 {
        // An endgame king fights in the center.
        let mut score = (7 - center_distance(king)) * 8;

        let enemy_king = board.king_square(!color);
        let separation = manhattan(king, enemy_king);
        let own = self.non_king_material(board, color);
        let enemy = self.non_king_material(board, !color);
        if own >= enemy {
            // The stronger king chases.
            score += (14 - separation) * 5;
        } else {
            // The weaker king runs.
            score += separation * 3;
        }
        score
    }

    fn non_king_material(&self, board: &Board, color: Color) -> i32 {
        self.material(board, color) - self.piece_values[piece_index(Piece::King)]
    }

    // -- accessors used by the store and the learning harness --

    pub fn weight(&self, feature: Feature) -> f32 {
        self.weights[feature.index()]
    }

    pub fn set_weight(&mut self, feature: Feature, weight: f32) {
        self.weights[feature.index()] = weight.clamp(-W_MAX, W_MAX);
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.enabled[feature.index()]
    }

    pub fn set_enabled(&mut self, feature: Feature, enabled: bool) {
        self.enabled[feature.index()] = enabled;
    }

    pub fn piece_value(&self, piece: Piece) -> i32 {
        self.piece_values[piece_index(piece)]
    }

    pub fn set_piece_value(&mut self, piece: Piece, value: i32) {
        self.piece_values[piece_index(piece)] = value;
    }

    pub fn psqt(&self) -> &PieceSquareTables {
        &self.psqt
    }

    pub fn psqt_mut(&mut self) -> &mut PieceSquareTables {
        &mut self.psqt
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self {
            weights: [1.0; Feature::COUNT],
            enabled: [true; Feature::COUNT],
            piece_values: DEFAULT_PIECE_VALUES,
            psqt: PieceSquareTables::default(),
        }
    }
}

fn square_at(rank: usize, file: usize) -> Square {
    Square::make_square(chess::Rank::from_index(rank), chess::File::from_index(file))
}

fn manhattan(a: Square, b: Square) -> i32 {
    let dr = a.get_rank().to_index() as i32 - b.get_rank().to_index() as i32;
    let df = a.get_file().to_index() as i32 - b.get_file().to_index() as i32;
    dr.abs() + df.abs()
}

/// Manhattan distance to the nearest of the four center squares.
fn center_distance(sq: Square) -> i32 {
    [Square::D4, Square::D5, Square::E4, Square::E5]
        .into_iter()
        .map(|c| manhattan(sq, c))
        .min()
        .expect("center square list is non-empty")
}

fn pawn_structure(board: &Board, color: Color, phase: Phase) -> i32 {
    let own_pawns = *board.pieces(Piece::Pawn) & *board.color_combined(color);
    let enemy_pawns = *board.pieces(Piece::Pawn) & *board.color_combined(!color);

    let mut per_file = [0i32; 8];
    for sq in own_pawns {
        per_file[sq.get_file().to_index()] += 1;
    }

    let mut score = 0;
    for count in per_file {
        if count > 1 {
            score += DOUBLED_PAWN_PENALTY * (count - 1);
        }
    }

    for sq in own_pawns {
        let file = sq.get_file();
        let neighbors = get_adjacent_files(file) & own_pawns;
        if neighbors == EMPTY {
            score += ISOLATED_PAWN_PENALTY;
        }

        if is_passed(sq, color, enemy_pawns) {
            let rank = sq.get_rank().to_index() as i32;
            let advance = match color {
                Color::White => rank - 1,
                Color::Black => 6 - rank,
            };
            score += if phase.is_endgame() {
                20 + 20 * advance
            } else {
                10 + 8 * advance
            };
        }
    }
    score
}

/// A pawn is passed iff no enemy pawn sits ahead of it on its own or an
/// adjacent file.
fn is_passed(sq: Square, color: Color, enemy_pawns: BitBoard) -> bool {
    let file = sq.get_file().to_index() as i32;
    let rank = sq.get_rank().to_index() as i32;
    for enemy in enemy_pawns {
        let ef = enemy.get_file().to_index() as i32;
        if (ef - file).abs() > 1 {
            continue;
        }
        let er = enemy.get_rank().to_index() as i32;
        let ahead = match color {
            Color::White => er > rank,
            Color::Black => er < rank,
        };
        if ahead {
            return false;
        }
    }
    true
}

fn rook_open_file(board: &Board, color: Color) -> i32 {
    let own_pawns = *board.pieces(Piece::Pawn) & *board.color_combined(color);
    let enemy_pawns = *board.pieces(Piece::Pawn) & *board.color_combined(!color);
    let rooks = *board.pieces(Piece::Rook) & *board.color_combined(color);

    let mut score = 0;
    for rook in rooks {
        let file_mask = chess::get_file(rook.get_file());
        let own_blocked = own_pawns & file_mask != EMPTY;
        let enemy_blocked = enemy_pawns & file_mask != EMPTY;
        if !own_blocked && !enemy_blocked {
            score += ROOK_OPEN_FILE_BONUS;
        } else if !own_blocked {
            score += ROOK_SEMI_OPEN_FILE_BONUS;
        }
    }
    score
}

fn bishop_pair(board: &Board, color: Color) -> i32 {
    if (*board.pieces(Piece::Bishop) & *board.color_combined(color)).popcnt() >= 2 {
        BISHOP_PAIR_BONUS
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Swap colors and flip ranks, producing the same position from the
    /// other side's point of view.
    fn mirror_fen(fen: &str) -> String {
        let mut fields = fen.split_whitespace();
        let placement = fields.next().unwrap();
        let side = fields.next().unwrap();
        let castling = fields.next().unwrap();
        let ep = fields.next().unwrap();
        let rest: Vec<&str> = fields.collect();

        let flipped: Vec<String> = placement
            .split('/')
            .rev()
            .map(|rank| {
                rank.chars()
                    .map(|c| {
                        if c.is_ascii_alphabetic() {
                            if c.is_ascii_uppercase() {
                                c.to_ascii_lowercase()
                            } else {
                                c.to_ascii_uppercase()
                            }
                        } else {
                            c
                        }
                    })
                    .collect()
            })
            .collect();

        let side = if side == "w" { "b" } else { "w" };
        let castling = if castling == "-" {
            "-".to_string()
        } else {
            let mut swapped: Vec<char> = castling
                .chars()
                .map(|c| {
                    if c.is_ascii_uppercase() {
                        c.to_ascii_lowercase()
                    } else {
                        c.to_ascii_uppercase()
                    }
                })
                .collect();
            swapped.sort_by_key(|c| "KQkq".find(*c).unwrap_or(4));
            swapped.into_iter().collect()
        };
        let ep = if ep == "-" {
            "-".to_string()
        } else {
            let file = &ep[..1];
            let rank = if &ep[1..] == "3" { "6" } else { "3" };
            format!("{file}{rank}")
        };

        format!("{} {} {} {} {}", flipped.join("/"), side, castling, ep, rest.join(" "))
    }

    fn eval_fen(fen: &str) -> i32 {
        Evaluator::default().evaluate(&Game::from_fen(fen).unwrap())
    }

    #[test]
    fn test_starting_position_is_near_balanced() {
        let score = eval_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1");
        assert!(score.abs() < 50, "start position score: {}", score);
    }

    #[test]
    fn test_mirror_symmetry() {
        let fens = [
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "r1bqkb1r/pppp1ppp/2n2n2/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4",
            "r3k2r/pppq1ppp/2n2n2/3pp3/3PP3/2N2N2/PPPQ1PPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/5p1k/8/4P1P1/1R6 w - - 0 1",
            "4k3/8/8/8/8/8/PPP5/4K3 b - - 0 1",
        ];
        for fen in fens {
            let mirrored = mirror_fen(fen);
            assert_eq!(
                eval_fen(fen),
                eval_fen(&mirrored),
                "evaluation must be symmetric: {fen} vs {mirrored}"
            );
        }
    }

    #[test]
    fn test_checkmate_scores_exactly_minus_mate() {
        // Fool's mate: White to move, mated.
        let score = eval_fen("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3");
        assert_eq!(score, -MATE_SCORE);
    }

    #[test]
    fn test_stalemate_scores_zero() {
        assert_eq!(eval_fen("7k/8/5KQ1/8/8/8/8/8 b - - 0 1"), 0);
    }

    #[test]
    fn test_bare_kings_score_zero() {
        assert_eq!(eval_fen("8/8/8/4k3/8/4K3/8/8 w - - 0 1"), 0);
    }

    #[test]
    fn test_material_advantage_is_seen_by_both_sides() {
        // White is up a knight.
        let fen = "rnbqkb1r/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        assert!(eval_fen(fen) > 200, "side to move is up a knight");
        let fen_black = "rnbqkb1r/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR b KQkq - 0 1";
        assert!(eval_fen(fen_black) < -100, "side to move is down a knight");
    }

    #[test]
    fn test_repetition_penalty_applies_at_second_occurrence() {
        use chess::{ChessMove, Square};
        let mut game = Game::new();
        game.push(ChessMove::new(Square::G1, Square::F3, None));
        game.push(ChessMove::new(Square::G8, Square::F6, None));
        game.push(ChessMove::new(Square::F3, Square::G1, None));
        game.push(ChessMove::new(Square::F6, Square::G8, None));

        // Start position, second occurrence, opening phase.
        let score = Evaluator::default().evaluate(&game);
        assert_eq!(score, REPETITION_PENALTY_EARLY);
    }

    #[test]
    fn test_doubled_and_isolated_pawns_penalized() {
        let clean = pawn_structure(
            Game::from_fen("4k3/8/8/8/8/8/4PP2/4K3 w - - 0 1")
                .unwrap()
                .board(),
            Color::White,
            Phase::Opening,
        );
        let doubled = pawn_structure(
            Game::from_fen("4k3/8/8/8/8/4P3/4P3/4K3 w - - 0 1")
                .unwrap()
                .board(),
            Color::White,
            Phase::Opening,
        );
        assert!(doubled < clean, "doubled {doubled} vs clean {clean}");

        let isolated = pawn_structure(
            Game::from_fen("4k3/8/8/8/8/8/P3P3/4K3 w - - 0 1")
                .unwrap()
                .board(),
            Color::White,
            Phase::Opening,
        );
        assert!(isolated < clean, "isolated {isolated} vs clean {clean}");
    }

    #[test]
    fn test_passed_pawn_bonus_grows_with_advance_and_phase() {
        let far = Game::from_fen("4k3/8/4P3/8/8/8/8/4K3 w - - 0 1").unwrap();
        let near = Game::from_fen("4k3/8/8/8/8/4P3/8/4K3 w - - 0 1").unwrap();
        let far_mg = pawn_structure(far.board(), Color::White, Phase::Opening);
        let near_mg = pawn_structure(near.board(), Color::White, Phase::Opening);
        assert!(far_mg > near_mg, "advance must grow the bonus");

        let far_eg = pawn_structure(far.board(), Color::White, Phase::LateEndgame);
        assert!(far_eg > far_mg, "endgame passers are worth more");
    }

    #[test]
    fn test_pawn_is_not_passed_with_enemy_guard() {
        let board = Game::from_fen("4k3/5p2/4P3/8/8/8/8/4K3 w - - 0 1").unwrap();
        // f7 guards e6 from an adjacent file ahead of it: not passed.
        let enemy =
            *board.board().pieces(Piece::Pawn) & *board.board().color_combined(Color::Black);
        assert!(!is_passed(Square::E6, Color::White, enemy));
    }

    #[test]
    fn test_rook_file_bonuses() {
        // Rook a1 on an open file, rook h1 behind its own pawn.
        let board = Game::from_fen("4k3/7p/8/8/8/8/7P/R3K2R w - - 0 1").unwrap();
        assert_eq!(rook_open_file(board.board(), Color::White), ROOK_OPEN_FILE_BONUS);

        // Remove the white h-pawn: h1 now sees only the enemy pawn.
        let board = Game::from_fen("4k3/7p/8/8/8/8/8/R3K2R w - - 0 1").unwrap();
        assert_eq!(
            rook_open_file(board.board(), Color::White),
            ROOK_OPEN_FILE_BONUS + ROOK_SEMI_OPEN_FILE_BONUS
        );
    }

    #[test]
    fn test_bishop_pair() {
        let two = Game::from_fen("4k3/8/8/8/8/8/8/2B1KB2 w - - 0 1").unwrap();
        assert_eq!(bishop_pair(two.board(), Color::White), BISHOP_PAIR_BONUS);
        let one = Game::from_fen("4k3/8/8/8/8/8/8/4KB2 w - - 0 1").unwrap();
        assert_eq!(bishop_pair(one.board(), Color::White), 0);
    }

    #[test]
    fn test_shield_penalty_counts_missing_pawns() {
        let evaluator = Evaluator::default();
        // Castled king with an intact f2/g2/h2 shield.
        let intact = Game::from_fen("4k3/8/8/8/8/8/5PPP/6K1 w - - 0 1").unwrap();
        assert_eq!(
            evaluator.king_safety(intact.board(), Color::White, Phase::Opening),
            0
        );
        // Shield stripped bare.
        let bare = Game::from_fen("4k3/8/8/8/8/8/8/6K1 w - - 0 1").unwrap();
        assert_eq!(
            evaluator.king_safety(bare.board(), Color::White, Phase::Opening),
            3 * SHIELD_PENALTY_PER_MISSING_PAWN
        );
    }

    #[test]
    fn test_endgame_king_prefers_center() {
        let evaluator = Evaluator::default();
        let central = Game::from_fen("8/8/8/8/4K3/8/8/6k1 w - - 0 1").unwrap();
        let cornered = Game::from_fen("8/8/8/8/8/8/8/K5k1 w - - 0 1").unwrap();
        let central_score =
            evaluator.king_safety(central.board(), Color::White, Phase::LateEndgame);
        let cornered_score =
            evaluator.king_safety(cornered.board(), Color::White, Phase::LateEndgame);
        assert!(central_score > cornered_score);
    }

    #[test]
    fn test_disabled_feature_does_not_contribute() {
        let fen = "rnbqkb1r/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        let mut evaluator = Evaluator::default();
        let with_material = evaluator.evaluate(&Game::from_fen(fen).unwrap());
        evaluator.set_enabled(Feature::Material, false);
        let without_material = evaluator.evaluate(&Game::from_fen(fen).unwrap());
        assert!(with_material - without_material >= 250, "material term must vanish");
    }

    #[test]
    fn test_weight_setter_clamps() {
        let mut evaluator = Evaluator::default();
        evaluator.set_weight(Feature::Material, 500.0);
        assert_eq!(evaluator.weight(Feature::Material), W_MAX);
        evaluator.set_weight(Feature::Material, -500.0);
        assert_eq!(evaluator.weight(Feature::Material), -W_MAX);
    }

    #[test]
    fn test_feature_names_round_trip() {
        for feature in Feature::ALL {
            assert_eq!(Feature::from_name(feature.name()), Some(feature));
        }
        assert_eq!(Feature::from_name("no_such_feature"), None);
    }
}
