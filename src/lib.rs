pub mod engine;
pub mod game;

pub use engine::{Engine, EngineConfig};
pub use game::Game;
