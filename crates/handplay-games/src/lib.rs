//! handplay-games — Gesture-driven arcade games.
//!
//! Every game is a headless state machine advanced once per tick with a
//! [`ControlInput`]. Games expose their full state for a renderer and queue
//! [`GameEvent`]s for audio or logging. Randomness comes from a seeded
//! `StdRng`, so a given seed and input sequence always replays identically.

pub mod adventure;
pub mod ball;
pub mod control;
pub mod geometry;
pub mod particles;
pub mod platformer;
pub mod runner;

pub use adventure::AdventureGame;
pub use ball::{BallGame, ObstacleRule};
pub use control::{ControlInput, HandInput};
pub use geometry::{Rect, Vec2};
pub use platformer::PlatformerGame;
pub use runner::{LaneSteering, RunnerGame};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Title,
    Playing,
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GameStatus {
    pub phase: Phase,
    pub score: i32,
    pub lives: u32,
    pub level: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    Jump,
    Collect { value: i32 },
    SpeedBoost,
    Hit { lives_left: u32 },
    LevelUp { level: u32 },
    GameOver { score: i32 },
}

pub trait Game: Send {
    fn name(&self) -> &'static str;

    /// Advance one tick. `dt` is the elapsed time in seconds.
    fn update(&mut self, input: &ControlInput, dt: f32);

    fn status(&self) -> GameStatus;

    /// Back to the starting state, keeping the RNG stream.
    fn reset(&mut self);

    /// Events queued since the last call.
    fn drain_events(&mut self) -> Vec<GameEvent>;
}

/// The playable games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    Platformer,
    /// Ball steered by the pointing finger; obstacles bounce.
    Pointer,
    /// Ball steered by the hand's long axis; obstacles are fatal.
    Orientation,
    Runner,
    Adventure,
}

impl GameKind {
    pub const ALL: [GameKind; 5] = [
        GameKind::Platformer,
        GameKind::Pointer,
        GameKind::Orientation,
        GameKind::Runner,
        GameKind::Adventure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameKind::Platformer => "platformer",
            GameKind::Pointer => "pointer",
            GameKind::Orientation => "orientation",
            GameKind::Runner => "runner",
            GameKind::Adventure => "adventure",
        }
    }

    /// Build a fresh game. `steering` only applies to the runner.
    pub fn create(&self, seed: u64, steering: LaneSteering) -> Box<dyn Game> {
        match self {
            GameKind::Platformer => Box::new(PlatformerGame::new(seed)),
            GameKind::Pointer => Box::new(BallGame::new(ObstacleRule::Bounce, seed)),
            GameKind::Orientation => Box::new(BallGame::new(ObstacleRule::Fatal, seed)),
            GameKind::Runner => Box::new(RunnerGame::new(steering, seed)),
            GameKind::Adventure => Box::new(AdventureGame::new(seed)),
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown game '{0}' (expected platformer, pointer, orientation, runner or adventure)")]
pub struct UnknownGame(pub String);

impl FromStr for GameKind {
    type Err = UnknownGame;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GameKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownGame(s.to_string()))
    }
}
