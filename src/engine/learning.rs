// Weight learning.
//
// After a game, each recorded position feeds one gradient step: the raw
// feature score is squashed to (-1, 1) through a scaled sigmoid and every
// enabled weight moves toward the game result in proportion to its
// feature value. Moves that mattered (captures, promotions, checks,
// mates) count double. The evaluator stays within the W_MAX bound at all
// times; the store clamps again on save.

use crate::engine::evaluation::{Evaluator, Feature};
use crate::game::Game;
use chess::ChessMove;

pub const DEFAULT_LEARNING_RATE: f32 = 0.01;

/// Map a centipawn score to (-1, 1); 400 cp ≈ one piece of advantage
/// saturates slowly.
fn squash(score: f32) -> f32 {
    2.0 / (1.0 + (-score / 400.0).exp()) - 1.0
}

/// One supervised update toward `result` (-1 loss, 0 draw, +1 win, from
/// the side to move at `game`'s position).
pub fn learn(evaluator: &mut Evaluator, game: &Game, result: i32, mv: ChessMove, rate: f32) {
    let values = evaluator.feature_values(game);

    let mut raw = 0.0f32;
    for feature in Feature::ALL {
        if evaluator.is_enabled(feature) {
            raw += evaluator.weight(feature) * values[feature.index()] as f32;
        }
    }

    let error = result as f32 - squash(raw);
    let passes = if is_important_move(game, mv) { 2 } else { 1 };

    for _ in 0..passes {
        for feature in Feature::ALL {
            if !evaluator.is_enabled(feature) {
                continue;
            }
            let delta = rate * error * values[feature.index()] as f32;
            evaluator.set_weight(feature, evaluator.weight(feature) + delta);
        }
    }
}

/// A move worth learning from twice: a capture, a promotion, a check, or
/// a mate.
pub fn is_important_move(game: &Game, mv: ChessMove) -> bool {
    game.is_capture(mv)
        || mv.get_promotion().is_some()
        || game.gives_check(mv)
        || game.is_mating_move(mv)
}
