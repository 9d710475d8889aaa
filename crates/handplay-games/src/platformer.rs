//! Side-scrolling platformer: point left or right to run, make a fist to jump.

use crate::control::ControlInput;
use crate::geometry::{Rect, Vec2};
use crate::{Game, GameEvent, GameStatus, Phase};
use handplay_core::{Direction, Gesture};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

pub const SCREEN_WIDTH: f32 = 800.0;
pub const SCREEN_HEIGHT: f32 = 600.0;
pub const GROUND_Y: f32 = 500.0;
pub const GRAVITY: f32 = 0.8;

const PLAYER_WIDTH: f32 = 40.0;
const PLAYER_HEIGHT: f32 = 60.0;
const PLAYER_START_X: f32 = 100.0;
const RUN_SPEED: f32 = 5.0;
/// Horizontal damping while the hand points up or down.
const POINT_AWAY_DAMPING: f32 = 0.8;
const FRICTION: f32 = 0.9;
const JUMP_VELOCITY: f32 = -15.0;
/// Ticks between jumps.
const JUMP_COOLDOWN: u32 = 20;
/// A falling player this far into a platform top still lands on it.
const LANDING_TOLERANCE: f32 = 20.0;

const COIN_COUNT: usize = 20;
const COIN_SIZE: f32 = 20.0;
const COIN_VALUE: i32 = 10;

const MAX_WORLD_OFFSET: f32 = 2000.0;
const CAMERA_EASE: f32 = 0.1;

const PLATFORMS: [Rect; 6] = [
    Rect::new(0.0, GROUND_Y, SCREEN_WIDTH * 3.0, 100.0),
    Rect::new(200.0, 400.0, 100.0, 20.0),
    Rect::new(400.0, 350.0, 120.0, 20.0),
    Rect::new(600.0, 300.0, 100.0, 20.0),
    Rect::new(300.0, 250.0, 80.0, 20.0),
    Rect::new(100.0, 200.0, 120.0, 20.0),
];

/// An obstacle pacing back and forth on the ground.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Patroller {
    pub rect: Rect,
    pub velocity_x: f32,
    pub start_x: f32,
    pub range: f32,
}

impl Patroller {
    const fn on_ground(x: f32, velocity_x: f32, range: f32) -> Self {
        Self {
            rect: Rect::new(x, GROUND_Y - 30.0, 30.0, 30.0),
            velocity_x,
            start_x: x,
            range,
        }
    }

    fn step(&mut self) {
        self.rect.x += self.velocity_x;
        if self.rect.x > self.start_x + self.range || self.rect.x < self.start_x - self.range {
            self.velocity_x = -self.velocity_x;
        }
    }
}

const PATROLLERS: [Patroller; 2] = [
    Patroller::on_ground(300.0, 2.0, 200.0),
    Patroller::on_ground(500.0, -2.0, 150.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coin {
    pub rect: Rect,
    pub collected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Player {
    pub rect: Rect,
    pub velocity: Vec2,
    pub grounded: bool,
    pub facing_right: bool,
}

impl Player {
    fn standing() -> Self {
        Self {
            rect: Rect::new(PLAYER_START_X, GROUND_Y - PLAYER_HEIGHT, PLAYER_WIDTH, PLAYER_HEIGHT),
            velocity: Vec2::ZERO,
            grounded: true,
            facing_right: true,
        }
    }
}

pub struct PlatformerGame {
    rng: StdRng,
    phase: Phase,
    score: i32,
    player: Player,
    patrollers: Vec<Patroller>,
    coins: Vec<Coin>,
    jump_cooldown: u32,
    world_offset: f32,
    events: Vec<GameEvent>,
}

impl PlatformerGame {
    pub fn new(seed: u64) -> Self {
        let mut game = Self {
            rng: StdRng::seed_from_u64(seed),
            phase: Phase::Playing,
            score: 0,
            player: Player::standing(),
            patrollers: PATROLLERS.to_vec(),
            coins: Vec::new(),
            jump_cooldown: 0,
            world_offset: 0.0,
            events: Vec::new(),
        };
        game.reset();
        game
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn platforms(&self) -> &[Rect] {
        &PLATFORMS
    }

    pub fn patrollers(&self) -> &[Patroller] {
        &self.patrollers
    }

    pub fn coins(&self) -> &[Coin] {
        &self.coins
    }

    /// Horizontal scroll of the view, eased towards the player.
    pub fn world_offset(&self) -> f32 {
        self.world_offset
    }

    fn scatter_coins(&mut self) {
        let max_x = (SCREEN_WIDTH * 2.0) as i32;
        let max_y = (GROUND_Y - 150.0) as i32;
        self.coins = (0..COIN_COUNT)
            .map(|_| Coin {
                rect: Rect::new(
                    self.rng.gen_range(100..=max_x) as f32,
                    self.rng.gen_range(100..=max_y) as f32,
                    COIN_SIZE,
                    COIN_SIZE,
                ),
                collected: false,
            })
            .collect();
    }

    fn apply_control(&mut self, input: &ControlInput) {
        let Some(hand) = input.hand else {
            return;
        };
        match input.direction {
            Some(Direction::Left) => {
                self.player.velocity.x = -RUN_SPEED;
                self.player.facing_right = false;
            }
            Some(Direction::Right) => {
                self.player.velocity.x = RUN_SPEED;
                self.player.facing_right = true;
            }
            Some(Direction::Up | Direction::Down) => self.player.velocity.x *= POINT_AWAY_DAMPING,
            None => {}
        }

        if hand.gesture == Gesture::ClosedFist && self.player.grounded && self.jump_cooldown == 0 {
            self.player.velocity.y = JUMP_VELOCITY;
            self.player.grounded = false;
            self.jump_cooldown = JUMP_COOLDOWN;
            self.events.push(GameEvent::Jump);
        }
    }

    fn move_player(&mut self) {
        let p = &mut self.player;
        p.velocity.y += GRAVITY;
        p.rect.x = (p.rect.x + p.velocity.x).clamp(0.0, SCREEN_WIDTH - p.rect.width);
        p.rect.y += p.velocity.y;
        p.velocity.x *= FRICTION;
    }

    fn land(&mut self) {
        let p = &mut self.player;
        p.grounded = false;
        for platform in &PLATFORMS {
            let bottom = p.rect.bottom();
            if bottom >= platform.top()
                && bottom <= platform.top() + LANDING_TOLERANCE
                && p.rect.right() > platform.left()
                && p.rect.left() < platform.right()
                && p.velocity.y > 0.0
            {
                p.rect.y = platform.top() - p.rect.height;
                p.velocity.y = 0.0;
                p.grounded = true;
            }
        }
    }

    fn collect_coins(&mut self) {
        for coin in self.coins.iter_mut().filter(|c| !c.collected) {
            if self.player.rect.collides(&coin.rect) {
                coin.collected = true;
                self.score += COIN_VALUE;
                self.events.push(GameEvent::Collect { value: COIN_VALUE });
            }
        }
    }

    fn follow_camera(&mut self) {
        let target = (self.player.rect.x - (SCREEN_WIDTH / 3.0).trunc()).clamp(0.0, MAX_WORLD_OFFSET);
        self.world_offset += (target - self.world_offset) * CAMERA_EASE;
    }

    fn game_over(&mut self) {
        self.phase = Phase::GameOver;
        self.events.push(GameEvent::GameOver { score: self.score });
        tracing::info!(game = "platformer", score = self.score, "game over");
    }
}

impl Game for PlatformerGame {
    fn name(&self) -> &'static str {
        "platformer"
    }

    fn update(&mut self, input: &ControlInput, _dt: f32) {
        if self.phase != Phase::Playing {
            if input.restart {
                self.reset();
            }
            return;
        }

        self.apply_control(input);
        self.jump_cooldown = self.jump_cooldown.saturating_sub(1);

        self.move_player();
        if self.player.rect.y > SCREEN_HEIGHT {
            self.game_over();
            return;
        }

        for patroller in &mut self.patrollers {
            patroller.step();
        }
        self.land();
        if self.patrollers.iter().any(|o| self.player.rect.collides(&o.rect)) {
            self.game_over();
            return;
        }
        self.collect_coins();
        self.follow_camera();
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
        self.world_offset = 0.0;
        self.player = Player::standing();
        self.jump_cooldown = 0;
        self.patrollers = PATROLLERS.to_vec();
        self.scatter_coins();
    }

    fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}
