// Headless self-play training loop.
//
// Plays the engine against itself, collects the important moves of each
// game, applies one learning pass per recorded position with the final
// result, and saves the weight file after every game. Runs until
// interrupted; the last save is never more than one game old. Verbosity
// comes from RUST_LOG (env_logger).

use chess::{ChessMove, Color};
use scholar::engine::{
    is_important_move, learn, Engine, EngineConfig, PhaseSchedule, WeightStore,
    DEFAULT_LEARNING_RATE,
};
use scholar::game::Game;

/// Draw cutoffs so a training game always ends.
const HALFMOVE_DRAW_CLOCK: u32 = 100;
const MAX_PLIES: usize = 400;

const WEIGHT_FILE: &str = "weights.json";

/// Fast schedule for training throughput; strength comes from volume.
fn training_schedule() -> PhaseSchedule {
    PhaseSchedule::new([(3, 1000), (3, 1000), (4, 1000), (5, 1000)])
}

struct PlayedGame {
    /// Winner, if any.
    winner: Option<Color>,
    /// Important positions as (FEN before the move, move).
    lessons: Vec<(String, ChessMove)>,
    plies: usize,
}

fn play_game(engine: &mut Engine) -> PlayedGame {
    let mut game = Game::new();
    let mut lessons = Vec::new();

    while !game.is_terminal()
        && game.halfmove_clock() < HALFMOVE_DRAW_CLOCK
        && game.ply() < MAX_PLIES
    {
        let Some(mv) = engine.best_move_or_random(&mut game) else {
            break;
        };
        if is_important_move(&game, mv) {
            lessons.push((game.fen(), mv));
        }
        game.push(mv);
    }

    let winner = if game.is_checkmate() {
        // The side that just moved delivered the mate.
        Some(!game.side_to_move())
    } else {
        None
    };

    PlayedGame {
        winner,
        lessons,
        plies: game.ply(),
    }
}

fn main() {
    env_logger::init();

    let store = WeightStore::new(WEIGHT_FILE);
    // Games run on the fast training schedule; the stored play schedule is
    // written back untouched.
    let (mut evaluator, play_schedule) = store.load();
    let schedule = training_schedule();

    log::info!(
        "self-play training started, weights in {}",
        store.path().display()
    );

    let mut games = 0u64;
    loop {
        games += 1;

        // Each game plays on a fresh engine with a snapshot of the
        // weights; the master evaluator only changes between games.
        let mut engine = Engine::with_evaluator(
            evaluator.clone(),
            EngineConfig {
                schedule: schedule.clone(),
                ..EngineConfig::default()
            },
        );
        let played = play_game(&mut engine);

        let mut updates = 0;
        for (fen, mv) in &played.lessons {
            let Ok(position) = Game::from_fen(fen) else {
                continue;
            };
            let result = match played.winner {
                None => 0,
                Some(winner) if winner == position.side_to_move() => 1,
                Some(_) => -1,
            };
            learn(&mut evaluator, &position, result, *mv, DEFAULT_LEARNING_RATE);
            updates += 1;
        }

        if let Err(err) = store.save(&evaluator, &play_schedule) {
            log::error!("failed to save weights: {err}");
        }

        let outcome = match played.winner {
            Some(Color::White) => "1-0",
            Some(Color::Black) => "0-1",
            None => "1/2-1/2",
        };
        log::info!(
            "game {games}: {outcome} in {} plies, {updates} weight updates",
            played.plies
        );
    }
}
