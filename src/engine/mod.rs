// Search-and-evaluation kernel.
//
// The engine is a classical alpha-beta negamax searcher:
// - Incremental Zobrist hashing over a per-engine key table
// - Bounded transposition table with depth-preferred replacement
// - Weighted-feature evaluator with phase-aware terms
// - Quiescence extension, null-move pruning, killer/history ordering
// - Iterative deepening with aspiration windows and phase-based time control
// - Polyglot opening-book probe ahead of the search
// - Sigmoid-gradient weight updates between games

mod book;
mod driver;
mod evaluation;
mod learning;
mod ordering;
mod phase;
mod psqt;
mod quiescence;
mod search;
mod store;
mod transposition;
mod zobrist;

pub use book::OpeningBook;
pub use driver::{Engine, EngineConfig};
pub use evaluation::{Evaluator, Feature, MATE_SCORE, W_MAX};
pub use learning::{is_important_move, learn, DEFAULT_LEARNING_RATE};
pub use ordering::{score_move, HistoryTable, KillerMoves};
pub use phase::{Phase, PhaseSchedule};
pub use psqt::PieceSquareTables;
pub use quiescence::quiesce;
pub use search::{alpha_beta, SearchContext};
pub use store::WeightStore;
pub use transposition::{Bound, TranspositionTable, TtEntry};
pub use zobrist::ZobristKeys;
