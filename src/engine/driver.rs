// Iterative-deepening driver.
//
// `best_move` first consults the opening book, then runs the alpha-beta
// search at increasing depths up to the phase-mapped target. Shallow
// iterations seed move ordering, killers, history, and the transposition
// table for the deeper ones. From depth 3 on, the root starts with a
// narrow aspiration window around the previous score and falls back to a
// full-width re-search when the result lands outside it. The wall clock
// is checked between depths only; an interrupted engine keeps the move
// from the last completed iteration.

use crate::engine::book::OpeningBook;
use crate::engine::evaluation::{Evaluator, MATE_SCORE};
use crate::engine::ordering::ordered_moves;
use crate::engine::phase::{Phase, PhaseSchedule};
use crate::engine::quiescence::QUIESCENCE_MAX_DEPTH;
use crate::engine::search::{alpha_beta, SearchContext};
use crate::engine::transposition::TranspositionTable;
use crate::engine::zobrist::{ZobristKeys, DEFAULT_ZOBRIST_SEED};
use crate::game::Game;
use chess::ChessMove;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::PathBuf;
use std::time::Instant;

/// Half-width of the root aspiration window, in centipawns.
const ASPIRATION_WINDOW: i32 = 50;

/// Root search window bound; wider than any mate score.
const INFINITY: i32 = MATE_SCORE * 2;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-phase search depth and time budget.
    pub schedule: PhaseSchedule,
    /// Opening book files, probed in order before any search.
    pub book_paths: Vec<PathBuf>,
    pub use_transposition: bool,
    pub use_null_move: bool,
    pub quiescence_depth: u8,
    /// Seed for this engine's Zobrist key table.
    pub zobrist_seed: u64,
    /// Seed for book selection and fallback moves; `None` draws from the OS.
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schedule: PhaseSchedule::default(),
            book_paths: Vec::new(),
            use_transposition: true,
            use_null_move: true,
            quiescence_depth: QUIESCENCE_MAX_DEPTH,
            zobrist_seed: DEFAULT_ZOBRIST_SEED,
            rng_seed: None,
        }
    }
}

/// One playing instance: key table, transposition table, evaluator, book.
///
/// Every engine owns its own Zobrist keys and its own transposition table;
/// hashes from one engine are meaningless to another.
pub struct Engine {
    evaluator: Evaluator,
    config: EngineConfig,
    zobrist: ZobristKeys,
    tt: TranspositionTable,
    book: OpeningBook,
    rng: StdRng,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_evaluator(Evaluator::default(), EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_evaluator(Evaluator::default(), config)
    }

    pub fn with_evaluator(evaluator: Evaluator, config: EngineConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            evaluator,
            zobrist: ZobristKeys::new(config.zobrist_seed),
            tt: TranspositionTable::new(),
            book: OpeningBook::new(config.book_paths.clone()),
            rng,
            config,
        }
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Pick a move for the side to move, or `None` on a terminal position.
    pub fn best_move(&mut self, game: &mut Game) -> Option<ChessMove> {
        let legal = game.legal_moves();
        if legal.is_empty() {
            return None;
        }

        if let Some(book_move) = self.book.probe(game.board(), &mut self.rng) {
            log::debug!("book move {book_move}");
            return Some(book_move);
        }

        let phase = Phase::of(game.board());
        let max_depth = self.config.schedule.depth(phase).max(1);
        let budget = self.config.schedule.time_budget(phase);
        let started = Instant::now();

        let root_hash = self.zobrist.full_hash(game.board());
        let mut ctx = SearchContext::new(&self.evaluator, &self.zobrist, &mut self.tt);
        ctx.use_tt = self.config.use_transposition;
        ctx.use_null_move = self.config.use_null_move;
        ctx.quiescence_depth = self.config.quiescence_depth;

        // Any legal move is a valid answer from the first iteration on.
        let mut best = legal[0];
        let mut prev_score = 0;

        for depth in 1..=max_depth {
            let iteration = if depth <= 2 {
                root_search(game, depth, -INFINITY, INFINITY, Some(best), root_hash, &mut ctx)
            } else {
                // Aspiration: assume the score stays near the previous
                // iteration; re-search wide if it escapes the window.
                let alpha = prev_score - ASPIRATION_WINDOW;
                let beta = prev_score + ASPIRATION_WINDOW;
                match root_search(game, depth, alpha, beta, Some(best), root_hash, &mut ctx) {
                    Some((mv, score))
                        if score > alpha
                            && score < beta
                            && (score - prev_score).abs() <= ASPIRATION_WINDOW =>
                    {
                        Some((mv, score))
                    }
                    Some((mv, _)) => {
                        root_search(game, depth, -INFINITY, INFINITY, Some(mv), root_hash, &mut ctx)
                    }
                    None => {
                        root_search(game, depth, -INFINITY, INFINITY, Some(best), root_hash, &mut ctx)
                    }
                }
            };

            if let Some((mv, score)) = iteration {
                best = mv;
                prev_score = score;
            }

            log::debug!(
                "depth {depth} score {prev_score} best {best} nodes {} elapsed {:?}",
                ctx.nodes,
                started.elapsed()
            );

            if started.elapsed() >= budget {
                break;
            }
        }

        Some(best)
    }

    /// Last-resort move choice when the search yields nothing usable.
    fn random_legal(&mut self, game: &Game) -> Option<ChessMove> {
        game.legal_moves().choose(&mut self.rng).copied()
    }

    /// Pick a move, falling back to a uniformly random legal move if the
    /// search somehow produced none.
    pub fn best_move_or_random(&mut self, game: &mut Game) -> Option<ChessMove> {
        match self.best_move(game) {
            Some(mv) => Some(mv),
            None if !game.is_terminal() => {
                log::error!("search returned no move on a non-terminal position");
                self.random_legal(game)
            }
            None => None,
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Search every root move within `[alpha, beta]`, `first` ordered ahead.
/// Returns the best move with its score, or `None` with no legal moves.
fn root_search(
    game: &mut Game,
    depth: u8,
    mut alpha: i32,
    beta: i32,
    first: Option<ChessMove>,
    root_hash: u64,
    ctx: &mut SearchContext,
) -> Option<(ChessMove, i32)> {
    let moves = ordered_moves(game, first, &ctx.killers, &ctx.history, depth);

    let mut best: Option<(ChessMove, i32)> = None;
    for mv in moves {
        let child_hash = ctx.zobrist.update_hash(root_hash, game.board(), mv);
        game.push(mv);
        let score = -alpha_beta(game, depth - 1, -beta, -alpha, child_hash, true, ctx);
        game.pop();

        if best.map_or(true, |(_, s)| score > s) {
            best = Some((mv, score));
        }
        if score > alpha {
            alpha = score;
        }
        if alpha >= beta {
            break;
        }
    }
    best
}
