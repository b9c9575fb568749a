// Quiescence search.
//
// Evaluating a position mid-exchange misreads it badly (the "horizon
// effect"): stopping right after QxP but before the recapture looks like a
// free pawn. Quiescence keeps searching capture moves only until the
// position is quiet, using the static evaluation as a stand-pat floor.
// The capture depth is bounded so the extension always terminates.

use crate::engine::evaluation::Evaluator;
use crate::engine::ordering::mvv_lva;
use crate::game::Game;
use chess::ChessMove;
use smallvec::SmallVec;

/// Default bound on consecutive quiescence captures.
pub const QUIESCENCE_MAX_DEPTH: u8 = 5;

/// Capture-only fail-hard search within `[alpha, beta]`.
pub fn quiesce(
    game: &mut Game,
    evaluator: &Evaluator,
    mut alpha: i32,
    beta: i32,
    remaining: u8,
) -> i32 {
    let stand_pat = evaluator.evaluate(game);
    if stand_pat >= beta {
        return beta;
    }
    if stand_pat > alpha {
        alpha = stand_pat;
    }
    if remaining == 0 {
        return alpha;
    }

    for mv in capture_moves(game) {
        game.push(mv);
        let score = -quiesce(game, evaluator, -beta, -alpha, remaining - 1);
        game.pop();

        if score >= beta {
            return beta;
        }
        if score > alpha {
            alpha = score;
        }
    }

    alpha
}

/// Legal captures (en passant included), best victims first.
fn capture_moves(game: &Game) -> SmallVec<[ChessMove; 32]> {
    let mut captures: SmallVec<[ChessMove; 32]> = game
        .legal_moves()
        .into_iter()
        .filter(|&mv| game.is_capture(mv))
        .collect();
    captures.sort_by_cached_key(|&mv| -mvv_lva(game, mv));
    captures
}
