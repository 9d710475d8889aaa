//! Three-lane endless runner. Sideways hand movement switches lanes.

use crate::control::ControlInput;
use crate::{Game, GameEvent, GameStatus, Phase};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::VecDeque;

pub const SCREEN_WIDTH: i32 = 800;
pub const SCREEN_HEIGHT: i32 = 600;
const LANE_WIDTH: i32 = SCREEN_WIDTH / 3;
/// Lane centre x positions.
pub const LANES: [i32; 3] = [LANE_WIDTH / 2, SCREEN_WIDTH / 2, SCREEN_WIDTH - LANE_WIDTH / 2];

const PLAYER_WIDTH: i32 = 50;
const PLAYER_HEIGHT: i32 = 80;
pub const PLAYER_Y: i32 = SCREEN_HEIGHT - PLAYER_HEIGHT - 20;
const SCROLL_SPEED: i32 = 5;

const OBSTACLE_SIZE: i32 = 60;
/// Ticks between spawns.
const OBSTACLE_INTERVAL: u32 = 60;
const COIN_INTERVAL: u32 = 30;
const COIN_SIZE: i32 = 30;
const COIN_VALUE: i32 = 5;

/// How hand x positions turn into lane changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LaneSteering {
    /// Shift when the hand moves more than `threshold` camera pixels since
    /// the previous tick.
    Displacement { threshold: f32 },
    /// Shift when the net movement over the last `window` positions (scaled
    /// to the game width) exceeds `threshold`.
    Swipe { window: usize, threshold: f32 },
}

impl LaneSteering {
    pub const DISPLACEMENT: LaneSteering = LaneSteering::Displacement { threshold: 50.0 };
    pub const SWIPE: LaneSteering = LaneSteering::Swipe {
        window: 10,
        threshold: 30.0,
    };
}

impl Default for LaneSteering {
    fn default() -> Self {
        Self::SWIPE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleKind {
    Barrier,
    Hole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Obstacle {
    pub x: i32,
    pub y: i32,
    pub lane: usize,
    pub kind: ObstacleKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Coin {
    pub x: i32,
    pub y: i32,
    pub lane: usize,
}

pub struct RunnerGame {
    steering: LaneSteering,
    rng: StdRng,
    phase: Phase,
    score: i32,
    lane: usize,
    obstacles: Vec<Obstacle>,
    coins: Vec<Coin>,
    obstacle_timer: u32,
    coin_timer: u32,
    previous_x: Option<f32>,
    history: VecDeque<f32>,
    events: Vec<GameEvent>,
}

impl RunnerGame {
    pub fn new(steering: LaneSteering, seed: u64) -> Self {
        Self {
            steering,
            rng: StdRng::seed_from_u64(seed),
            phase: Phase::Playing,
            score: 0,
            lane: 1,
            obstacles: Vec::new(),
            coins: Vec::new(),
            obstacle_timer: 0,
            coin_timer: 0,
            previous_x: None,
            history: VecDeque::new(),
            events: Vec::new(),
        }
    }

    pub fn lane(&self) -> usize {
        self.lane
    }

    pub fn player_x(&self) -> i32 {
        LANES[self.lane] - PLAYER_WIDTH / 2
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn coins(&self) -> &[Coin] {
        &self.coins
    }

    fn shift(&mut self, movement: f32) {
        if movement > 0.0 && self.lane < LANES.len() - 1 {
            self.lane += 1;
        } else if movement < 0.0 && self.lane > 0 {
            self.lane -= 1;
        }
        tracing::debug!(lane = self.lane, movement, "lane change");
    }

    fn steer(&mut self, input: &ControlInput) {
        match self.steering {
            LaneSteering::Displacement { threshold } => {
                let Some(hand) = input.hand else {
                    self.previous_x = None;
                    return;
                };
                let x = hand.position.x;
                if let Some(prev) = self.previous_x {
                    let movement = x - prev;
                    if movement.abs() > threshold {
                        self.shift(movement);
                    }
                }
                self.previous_x = Some(x);
            }
            LaneSteering::Swipe { window, threshold } => {
                let Some(screen) = input.to_screen(SCREEN_WIDTH as f32, SCREEN_HEIGHT as f32) else {
                    return;
                };
                self.history.push_back(screen.x);
                while self.history.len() > window.max(2) {
                    self.history.pop_front();
                }
                let (Some(first), Some(last)) = (self.history.front(), self.history.back()) else {
                    return;
                };
                if self.history.len() < 2 {
                    return;
                }
                let movement = last - first;
                if movement.abs() > threshold {
                    self.shift(movement);
                    self.history.clear();
                }
            }
        }
    }

    fn scroll(&mut self) {
        let before = self.obstacles.len();
        for o in &mut self.obstacles {
            o.y += SCROLL_SPEED;
        }
        self.obstacles.retain(|o| o.y <= SCREEN_HEIGHT);
        self.score += (before - self.obstacles.len()) as i32;

        self.obstacle_timer += 1;
        if self.obstacle_timer >= OBSTACLE_INTERVAL {
            let lane = self.rng.gen_range(0..LANES.len());
            let kind = if self.rng.gen_bool(0.5) {
                ObstacleKind::Barrier
            } else {
                ObstacleKind::Hole
            };
            self.obstacles.push(Obstacle {
                x: LANES[lane] - OBSTACLE_SIZE / 2,
                y: -OBSTACLE_SIZE,
                lane,
                kind,
            });
            self.obstacle_timer = 0;
        }

        for c in &mut self.coins {
            c.y += SCROLL_SPEED;
        }
        self.coins.retain(|c| c.y <= SCREEN_HEIGHT);

        self.coin_timer += 1;
        if self.coin_timer >= COIN_INTERVAL {
            let lane = self.rng.gen_range(0..LANES.len());
            self.coins.push(Coin {
                x: LANES[lane] - COIN_SIZE / 2,
                y: -COIN_SIZE,
                lane,
            });
            self.coin_timer = 0;
        }
    }

    fn collide(&mut self) {
        let (px, py) = (self.player_x(), PLAYER_Y);
        if self
            .obstacles
            .iter()
            .any(|o| (o.x - px).abs() < OBSTACLE_SIZE && (o.y - py).abs() < OBSTACLE_SIZE)
        {
            self.phase = Phase::GameOver;
            self.events.push(GameEvent::GameOver { score: self.score });
            tracing::info!(game = "runner", score = self.score, "game over");
            return;
        }

        let before = self.coins.len();
        self.coins
            .retain(|c| !((c.x - px).abs() < COIN_SIZE && (c.y - py).abs() < COIN_SIZE));
        for _ in self.coins.len()..before {
            self.score += COIN_VALUE;
            self.events.push(GameEvent::Collect { value: COIN_VALUE });
        }
    }
}

impl Game for RunnerGame {
    fn name(&self) -> &'static str {
        "runner"
    }

    fn update(&mut self, input: &ControlInput, _dt: f32) {
        if self.phase != Phase::Playing {
            if input.restart {
                self.reset();
            }
            return;
        }
        self.steer(input);
        self.scroll();
        self.collide();
    }

    fn status(&self) -> GameStatus {
        GameStatus {
            phase: self.phase,
            score: self.score,
            lives: u32::from(self.phase == Phase::Playing),
            level: 1,
        }
    }

    fn reset(&mut self) {
        self.phase = Phase::Playing;
        self.score = 0;
        self.lane = 1;
        self.obstacles.clear();
        self.coins.clear();
        self.obstacle_timer = 0;
        self.coin_timer = 0;
        self.previous_x = None;
        self.history.clear();
    }

    fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::HandInput;
    use crate::geometry::Vec2;
    use handplay_core::Gesture;

    fn hand_at(x: f32) -> ControlInput {
        ControlInput::from_hand(HandInput {
            position: Vec2::new(x, 240.0),
            frame_size: (800, 480),
            gesture: Gesture::Pointing,
        })
    }

    #[test]
    fn test_lane_layout() {
        assert_eq!(LANES, [133, 400, 667]);
        assert_eq!(PLAYER_Y, 500);
        let game = RunnerGame::new(LaneSteering::SWIPE, 1);
        assert_eq!(game.lane(), 1);
        assert_eq!(game.player_x(), 375);
    }

    #[test]
    fn test_displacement_steering() {
        let mut game = RunnerGame::new(LaneSteering::DISPLACEMENT, 1);
        game.update(&hand_at(300.0), 1.0 / 60.0);
        game.update(&hand_at(340.0), 1.0 / 60.0);
        assert_eq!(game.lane(), 1);
        game.update(&hand_at(400.0), 1.0 / 60.0);
        assert_eq!(game.lane(), 2);
        game.update(&hand_at(500.0), 1.0 / 60.0);
        assert_eq!(game.lane(), 2);

        // Losing the hand forgets the previous position.
        game.update(&ControlInput::default(), 1.0 / 60.0);
        game.update(&hand_at(100.0), 1.0 / 60.0);
        assert_eq!(game.lane(), 2);
        game.update(&hand_at(20.0), 1.0 / 60.0);
        assert_eq!(game.lane(), 1);
    }

    #[test]
    fn test_swipe_steering() {
        let mut game = RunnerGame::new(LaneSteering::SWIPE, 1);
        for x in [400.0, 410.0, 420.0] {
            game.update(&hand_at(x), 1.0 / 60.0);
        }
        assert_eq!(game.lane(), 1);
        game.update(&hand_at(435.0), 1.0 / 60.0);
        assert_eq!(game.lane(), 2);
        // History was cleared; a single sample cannot move.
        game.update(&hand_at(300.0), 1.0 / 60.0);
        assert_eq!(game.lane(), 2);
        game.update(&hand_at(260.0), 1.0 / 60.0);
        assert_eq!(game.lane(), 1);
    }

    #[test]
    fn test_swipe_window_forgets_old_samples() {
        let mut game = RunnerGame::new(LaneSteering::Swipe { window: 3, threshold: 30.0 }, 1);
        for x in [400.0, 410.0, 420.0, 430.0, 440.0] {
            game.update(&hand_at(x), 1.0 / 60.0);
        }
        // Net movement inside any three-sample window is only 20.
        assert_eq!(game.lane(), 1);
    }

    #[test]
    fn test_spawning_and_scoring() {
        let mut game = RunnerGame::new(LaneSteering::SWIPE, 4);
        game.obstacle_timer = OBSTACLE_INTERVAL - 1;
        game.update(&ControlInput::default(), 1.0 / 60.0);
        assert_eq!(game.obstacles().len(), 1);
        let o = game.obstacles()[0];
        assert_eq!(o.y, -60);
        assert_eq!(o.x, LANES[o.lane] - 30);

        // Move it to a side lane past the player so it scores on leaving.
        game.obstacles[0] = Obstacle { x: LANES[0] - 30, y: 598, lane: 0, kind: ObstacleKind::Hole };
        game.update(&ControlInput::default(), 1.0 / 60.0);
        assert!(game.obstacles().iter().all(|o| o.y < 600));
        assert_eq!(game.status().score, 1);
    }

    #[test]
    fn test_coin_pickup() {
        let mut game = RunnerGame::new(LaneSteering::SWIPE, 4);
        game.coins.push(Coin { x: LANES[1] - 15, y: 490, lane: 1 });
        game.update(&ControlInput::default(), 1.0 / 60.0);
        assert!(game.coins().is_empty());
        assert_eq!(game.status().score, 5);
        assert_eq!(game.drain_events(), vec![GameEvent::Collect { value: 5 }]);
    }

    #[test]
    fn test_obstacle_in_lane_ends_game() {
        let mut game = RunnerGame::new(LaneSteering::SWIPE, 4);
        game.obstacles.push(Obstacle { x: LANES[1] - 30, y: 450, lane: 1, kind: ObstacleKind::Barrier });
        game.update(&ControlInput::default(), 1.0 / 60.0);
        assert_eq!(game.status().phase, Phase::GameOver);

        let wave = ControlInput { restart: true, ..ControlInput::default() };
        game.update(&wave, 1.0 / 60.0);
        assert_eq!(game.status(), GameStatus { phase: Phase::Playing, score: 0, lives: 1, level: 1 });
        assert!(game.obstacles().is_empty());
    }

    #[test]
    fn test_side_lane_obstacle_is_safe() {
        let mut game = RunnerGame::new(LaneSteering::SWIPE, 4);
        game.obstacles.push(Obstacle { x: LANES[0] - 30, y: 495, lane: 0, kind: ObstacleKind::Barrier });
        game.update(&ControlInput::default(), 1.0 / 60.0);
        assert_eq!(game.status().phase, Phase::Playing);
    }
}
