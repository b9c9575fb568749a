// Alpha-beta negamax.
//
// One recursive function searches for both sides: scores negate across
// each recursion, and the window [alpha, beta] flips sign with them. The
// node order is: terminal check, transposition probe, quiescence handoff
// at depth zero, null-move pruning, then the ordered move loop with
// killer/history bookkeeping and a bound-flagged table store at the end.

use crate::engine::evaluation::Evaluator;
use crate::engine::ordering::{ordered_moves, HistoryTable, KillerMoves};
use crate::engine::quiescence::{quiesce, QUIESCENCE_MAX_DEPTH};
use crate::engine::transposition::{Bound, TranspositionTable, TtEntry};
use crate::engine::zobrist::ZobristKeys;
use crate::game::Game;
use chess::{Piece, EMPTY};

/// Depth reduction for the null-move probe.
const NULL_MOVE_REDUCTION: u8 = 2;

/// Everything one root search threads through the recursion.
pub struct SearchContext<'a> {
    pub evaluator: &'a Evaluator,
    pub zobrist: &'a ZobristKeys,
    pub tt: &'a mut TranspositionTable,
    pub killers: KillerMoves,
    pub history: HistoryTable,
    pub use_tt: bool,
    pub use_null_move: bool,
    pub quiescence_depth: u8,
    pub nodes: u64,
}

impl<'a> SearchContext<'a> {
    pub fn new(
        evaluator: &'a Evaluator,
        zobrist: &'a ZobristKeys,
        tt: &'a mut TranspositionTable,
    ) -> Self {
        Self {
            evaluator,
            zobrist,
            tt,
            killers: KillerMoves::new(),
            history: HistoryTable::new(),
            use_tt: true,
            use_null_move: true,
            quiescence_depth: QUIESCENCE_MAX_DEPTH,
            nodes: 0,
        }
    }
}

/// Negamax search of `game` to `depth` plies within `[alpha, beta]`.
///
/// `hash` is the Zobrist hash of the current position, maintained
/// incrementally by the caller; `null_ok` gates null-move pruning so two
/// null moves are never stacked.
pub fn alpha_beta(
    game: &mut Game,
    depth: u8,
    mut alpha: i32,
    mut beta: i32,
    hash: u64,
    null_ok: bool,
    ctx: &mut SearchContext,
) -> i32 {
    ctx.nodes += 1;
    debug_assert_eq!(
        hash,
        ctx.zobrist.full_hash(game.board()),
        "incremental hash out of sync with the position"
    );

    if game.is_terminal() {
        return ctx.evaluator.evaluate(game);
    }

    let alpha_original = alpha;
    let mut hash_move = None;

    if ctx.use_tt {
        if let Some(entry) = ctx.tt.probe(hash) {
            if entry.depth >= depth {
                match entry.bound {
                    Bound::Exact => return entry.score,
                    Bound::Lower => alpha = alpha.max(entry.score),
                    Bound::Upper => beta = beta.min(entry.score),
                }
                if alpha >= beta {
                    return entry.score;
                }
            }
            // Even a too-shallow entry knows a good first move.
            hash_move = entry.best;
        }
    }

    if depth == 0 {
        return quiesce(game, ctx.evaluator, alpha, beta, ctx.quiescence_depth);
    }

    // Null-move pruning: if passing still beats beta after a reduced
    // search, a real move will too. Skipped in check and without a minor
    // or major piece on our side, where zugzwang breaks the assumption.
    if ctx.use_null_move
        && null_ok
        && depth >= NULL_MOVE_REDUCTION + 1
        && !game.in_check()
        && has_piece_material(game)
    {
        let null_hash = ctx.zobrist.null_hash(hash, game.board());
        if game.push_null() {
            let score = -alpha_beta(
                game,
                depth - NULL_MOVE_REDUCTION - 1,
                -beta,
                -beta + 1,
                null_hash,
                false,
                ctx,
            );
            game.pop();
            if score >= beta {
                return beta;
            }
        }
    }

    let side = game.side_to_move();
    let moves = ordered_moves(game, hash_move, &ctx.killers, &ctx.history, depth);

    let mut best_score = i32::MIN + 1;
    let mut best_move = None;

    for mv in moves {
        let child_hash = ctx.zobrist.update_hash(hash, game.board(), mv);
        let is_capture = game.is_capture(mv);

        game.push(mv);
        let score = -alpha_beta(game, depth - 1, -beta, -alpha, child_hash, true, ctx);
        game.pop();

        if score > best_score {
            best_score = score;
            best_move = Some(mv);
        }

        if score > alpha {
            alpha = score;
            if !is_capture {
                ctx.history.update(side, mv, depth);
            }
        }

        if alpha >= beta {
            if !is_capture {
                ctx.killers.store(depth, mv);
            }
            break;
        }
    }

    if ctx.use_tt {
        let bound = if best_score <= alpha_original {
            Bound::Upper
        } else if best_score >= beta {
            Bound::Lower
        } else {
            Bound::Exact
        };
        ctx.tt.store(
            hash,
            TtEntry {
                score: best_score,
                depth,
                bound,
                best: best_move,
            },
        );
    }

    best_score
}

/// True if the side to move still owns a knight, bishop, rook, or queen.
fn has_piece_material(game: &Game) -> bool {
    let board = game.board();
    let own = *board.color_combined(game.side_to_move());
    let pieces = *board.pieces(Piece::Knight)
        | *board.pieces(Piece::Bishop)
        | *board.pieces(Piece::Rook)
        | *board.pieces(Piece::Queen);
    own & pieces != EMPTY
}
