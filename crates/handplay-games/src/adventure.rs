//! Collect-and-avoid adventure: steer a character toward the hand, pick up
//! targets before the level timer runs out and stay clear of obstacles.

use crate::control::ControlInput;
use crate::geometry::{Rect, Vec2};
use crate::particles::{Burst, ParticleSystem};
use crate::{Game, GameEvent, GameStatus, Phase};
use handplay_core::Gesture;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::f32::consts::TAU;

pub const SCREEN_WIDTH: f32 = 1024.0;
pub const SCREEN_HEIGHT: f32 = 768.0;
const START_LIVES: u32 = 3;

pub const CHARACTER_SIZE: f32 = 50.0;
const MAX_SPEED: f32 = 10.0;
/// Fraction of the target speed added per tick.
const ACCELERATION: f32 = 0.2;
/// Stop steering inside this distance of the hand.
const ARRIVE_RADIUS: f32 = 5.0;
const POINTING_BOOST: f32 = 1.5;
const PALM_SLOWDOWN: f32 = 0.8;
const FIST_COAST: f32 = 0.9;
const ATTACK_COOLDOWN: f32 = 1.0;

pub const TARGET_SIZE: f32 = 30.0;
const TARGET_MARGIN: i32 = 50;
const TARGETS_PER_LEVEL: usize = 5;
const OBSTACLE_MARGIN: i32 = 100;
const MAX_OBSTACLES_PER_LEVEL: usize = 8;
const INVULNERABLE_SECONDS: f32 = 2.0;

const COLLECT_BURST: Burst = Burst {
    count: 15,
    size: 5.0,
    life: 1.0,
    speed: 3.0,
};
const HIT_BURST: Burst = Burst {
    count: 30,
    size: 8.0,
    life: 1.5,
    speed: 3.0,
};
const HIT_COLOR: [u8; 3] = [255, 0, 0];

/// Difficulty knobs for one level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelParams {
    /// Seconds between target spawns.
    pub target_delay: f32,
    pub obstacle_delay: f32,
    /// Obstacles placed when the level starts.
    pub obstacles: usize,
    pub time_limit: f32,
}

impl LevelParams {
    pub fn for_level(level: u32) -> Self {
        let step = level.saturating_sub(1) as f32;
        Self {
            target_delay: (1.5 - 0.1 * step).max(0.5),
            obstacle_delay: (5.0 - 0.3 * step).max(2.0),
            obstacles: (level as usize).min(MAX_OBSTACLES_PER_LEVEL),
            time_limit: (60.0 - 5.0 * step).max(30.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Standard,
    Bonus,
    Special,
    /// Costs points.
    Negative,
}

impl TargetKind {
    /// Kind for a uniform roll in `[0, 1)`.
    pub fn from_roll(r: f64) -> Self {
        if r > 0.95 {
            TargetKind::Negative
        } else if r > 0.9 {
            TargetKind::Special
        } else if r > 0.7 {
            TargetKind::Bonus
        } else {
            TargetKind::Standard
        }
    }

    pub fn value(&self) -> i32 {
        match self {
            TargetKind::Standard => 1,
            TargetKind::Bonus => 2,
            TargetKind::Special => 5,
            TargetKind::Negative => -2,
        }
    }

    pub fn color(&self) -> [u8; 3] {
        match self {
            TargetKind::Standard => [0, 255, 0],
            TargetKind::Bonus => [255, 255, 0],
            TargetKind::Special => [255, 0, 255],
            TargetKind::Negative => [255, 0, 0],
        }
    }

    fn drifts(&self) -> bool {
        matches!(self, TargetKind::Bonus | TargetKind::Special)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Target {
    pub position: Vec2,
    pub velocity: Vec2,
    pub kind: TargetKind,
}

impl Target {
    pub fn rect(&self) -> Rect {
        Rect::centered(self.position, TARGET_SIZE)
    }

    fn step(&mut self) {
        if !self.kind.drifts() {
            return;
        }
        self.position += self.velocity;
        let half = TARGET_SIZE / 2.0;
        if self.position.x - half < 0.0 || self.position.x + half > SCREEN_WIDTH {
            self.velocity.x = -self.velocity.x;
        }
        if self.position.y - half < 0.0 || self.position.y + half > SCREEN_HEIGHT {
            self.velocity.y = -self.velocity.y;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Obstacle {
    pub rect: Rect,
    /// Pixels per second; zero for static obstacles.
    pub speed: f32,
    pub vertical: bool,
    direction: f32,
    travelled: f32,
    max_distance: f32,
}

impl Obstacle {
    pub fn fixed(rect: Rect) -> Self {
        Self {
            rect,
            speed: 0.0,
            vertical: false,
            direction: 1.0,
            travelled: 0.0,
            max_distance: 0.0,
        }
    }

    pub fn moving(&self) -> bool {
        self.speed > 0.0
    }

    fn step(&mut self, dt: f32) {
        if !self.moving() {
            return;
        }
        let amount = self.speed * dt * self.direction;
        if self.vertical {
            self.rect.y += amount;
        } else {
            self.rect.x += amount;
        }
        self.travelled += amount.abs();
        if self.travelled >= self.max_distance {
            self.direction = -self.direction;
            self.travelled = 0.0;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Character {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Screen point the character steers toward.
    pub target: Vec2,
    pub gesture: Option<Gesture>,
    pub attacking: bool,
    attack_cooldown: f32,
}

impl Character {
    fn at(position: Vec2) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            target: position,
            gesture: None,
            attacking: false,
            attack_cooldown: 0.0,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::centered(self.position, CHARACTER_SIZE)
    }

    fn set_gesture(&mut self, gesture: Gesture) {
        self.gesture = Some(gesture);
        self.attacking = gesture == Gesture::ThumbsUp && self.attack_cooldown <= 0.0;
        if self.attacking {
            self.attack_cooldown = ATTACK_COOLDOWN;
        }
    }

    /// Unit vector toward the target, unless already within arrival range.
    fn heading(&self) -> Option<Vec2> {
        let offset = self.target - self.position;
        if offset.length() > ARRIVE_RADIUS {
            offset.normalized()
        } else {
            None
        }
    }

    fn step(&mut self, dt: f32) {
        if self.gesture == Some(Gesture::ClosedFist) {
            self.velocity *= FIST_COAST;
        } else if let Some(heading) = self.heading() {
            let top_speed = match self.gesture {
                Some(Gesture::Pointing) => MAX_SPEED * POINTING_BOOST,
                Some(Gesture::OpenPalm) => MAX_SPEED * PALM_SLOWDOWN,
                _ => MAX_SPEED,
            };
            self.velocity += heading * (ACCELERATION * top_speed);
            let speed = self.velocity.length();
            if speed > top_speed {
                self.velocity *= top_speed / speed;
            }
        }
        self.position += self.velocity;
        if self.attack_cooldown > 0.0 {
            self.attack_cooldown -= dt;
        }
    }
}

pub struct AdventureGame {
    rng: StdRng,
    particles: ParticleSystem,
    phase: Phase,
    score: i32,
    lives: u32,
    level: u32,
    params: LevelParams,
    time_left: f32,
    invulnerable: f32,
    target_timer: f32,
    obstacle_timer: f32,
    character: Character,
    targets: Vec<Target>,
    obstacles: Vec<Obstacle>,
    events: Vec<GameEvent>,
}

impl AdventureGame {
    pub fn new(seed: u64) -> Self {
        let mut game = Self {
            rng: StdRng::seed_from_u64(seed),
            particles: ParticleSystem::new(seed.wrapping_add(1)),
            phase: Phase::Title,
            score: 0,
            lives: START_LIVES,
            level: 1,
            params: LevelParams::for_level(1),
            time_left: 0.0,
            invulnerable: 0.0,
            target_timer: 0.0,
            obstacle_timer: 0.0,
            character: Character::at(Self::center()),
            targets: Vec::new(),
            obstacles: Vec::new(),
            events: Vec::new(),
        };
        game.reset();
        game
    }

    fn center() -> Vec2 {
        Vec2::new(SCREEN_WIDTH / 2.0, SCREEN_HEIGHT / 2.0)
    }

    pub fn character(&self) -> &Character {
        &self.character
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn time_left(&self) -> f32 {
        self.time_left
    }

    pub fn is_invulnerable(&self) -> bool {
        self.invulnerable > 0.0
    }

    fn setup_level(&mut self, level: u32) {
        self.level = level;
        self.params = LevelParams::for_level(level);
        self.targets.clear();
        self.obstacles.clear();
        for _ in 0..TARGETS_PER_LEVEL {
            self.spawn_target();
        }
        for _ in 0..self.params.obstacles {
            self.spawn_obstacle();
        }
        self.target_timer = 0.0;
        self.obstacle_timer = 0.0;
        self.time_left = self.params.time_limit;
        tracing::debug!(level, time_limit = self.time_left, "level ready");
    }

    fn spawn_target(&mut self) {
        let x = self.rng.gen_range(TARGET_MARGIN..=SCREEN_WIDTH as i32 - TARGET_MARGIN);
        let y = self.rng.gen_range(TARGET_MARGIN..=SCREEN_HEIGHT as i32 - TARGET_MARGIN);
        let kind = TargetKind::from_roll(self.rng.gen());
        let speed = self.rng.gen_range(0.5..2.0);
        let heading = self.rng.gen_range(0.0..TAU);
        self.targets.push(Target {
            position: Vec2::new(x as f32, y as f32),
            velocity: Vec2::from_angle(heading) * speed,
            kind,
        });
    }

    fn spawn_obstacle(&mut self) {
        // Capped so the placement range stays non-empty on very late levels.
        let largest = (50 + 5 * self.level as i32).min(SCREEN_HEIGHT as i32 - 2 * OBSTACLE_MARGIN - 1);
        let width = self.rng.gen_range(30..=largest);
        let height = self.rng.gen_range(30..=largest);
        let x = self.rng.gen_range(OBSTACLE_MARGIN..=SCREEN_WIDTH as i32 - width - OBSTACLE_MARGIN);
        let y = self.rng.gen_range(OBSTACLE_MARGIN..=SCREEN_HEIGHT as i32 - height - OBSTACLE_MARGIN);
        let rect = Rect::new(x as f32, y as f32, width as f32, height as f32);

        let moving = self.rng.gen::<f32>() < 0.2 * self.level as f32;
        let obstacle = if moving {
            Obstacle {
                speed: self.rng.gen_range(50.0..100.0),
                vertical: self.rng.gen_bool(0.5),
                max_distance: self.rng.gen_range(100..=300) as f32,
                ..Obstacle::fixed(rect)
            }
        } else {
            Obstacle::fixed(rect)
        };
        self.obstacles.push(obstacle);
    }

    fn end(&mut self) {
        self.phase = Phase::GameOver;
        self.events.push(GameEvent::GameOver { score: self.score });
        tracing::info!(game = "adventure", score = self.score, level = self.level, "game over");
    }

    fn check_collisions(&mut self) {
        let body = self.character.rect();

        let mut kept = Vec::with_capacity(self.targets.len());
        for target in self.targets.drain(..) {
            if body.collides(&target.rect()) {
                let value = target.kind.value();
                self.score += value;
                self.particles
                    .explode(target.position, target.kind.color(), COLLECT_BURST);
                self.events.push(GameEvent::Collect { value });
            } else {
                kept.push(target);
            }
        }
        self.targets = kept;

        if self.obstacles.iter().any(|o| body.collides(&o.rect)) {
            self.lives = self.lives.saturating_sub(1);
            self.invulnerable = INVULNERABLE_SECONDS;
            self.particles
                .explode(self.character.position, HIT_COLOR, HIT_BURST);
            self.events.push(GameEvent::Hit {
                lives_left: self.lives,
            });
            if self.lives == 0 {
                self.end();
            }
        }
    }

    fn level_up(&mut self) {
        let level = self.level + 1;
        self.setup_level(level);
        self.events.push(GameEvent::LevelUp { level });
        tracing::info!(level, score = self.score, "level up");
    }
}

impl Game for AdventureGame {
    fn name(&self) -> &'static str {
        "adventure"
    }

    fn update(&mut self, input: &ControlInput, dt: f32) {
        if self.phase != Phase::Playing {
            if input.restart {
                self.reset();
                self.phase = Phase::Playing;
            }
            return;
        }

        // The last seen gesture and target stay in effect while the hand is lost.
        if let Some(hand) = input.hand {
            self.character.target = hand.to_screen(SCREEN_WIDTH, SCREEN_HEIGHT);
            self.character.set_gesture(hand.gesture);
        }

        self.time_left -= dt;
        if self.time_left <= 0.0 {
            self.end();
            return;
        }

        self.target_timer += dt;
        if self.target_timer >= self.params.target_delay {
            self.spawn_target();
            self.target_timer = 0.0;
        }
        self.obstacle_timer += dt;
        if self.obstacle_timer >= self.params.obstacle_delay {
            self.spawn_obstacle();
            self.obstacle_timer = 0.0;
        }

        self.character.step(dt);
        for target in &mut self.targets {
            target.step();
        }
        for obstacle in &mut self.obstacles {
            obstacle.step(dt);
        }
        self.particles.update(dt);

        if self.invulnerable > 0.0 {
            self.invulnerable -= dt;
        } else {
            self.check_collisions();
            if self.phase != Phase::Playing {
                return;
            }
        }

        if self.targets.is_empty() {
            self.level_up();
        }
    }

    fn status(&self) -> GameStatus {
        GameStatus {
            phase: self.phase,
            score: self.score,
            lives: self.lives,
            level: self.level,
        }
    }

    /// Back to the title screen with a fresh first level.
    fn reset(&mut self) {
        self.phase = Phase::Title;
        self.score = 0;
        self.lives = START_LIVES;
        self.invulnerable = 0.0;
        self.character = Character::at(Self::center());
        self.particles.clear();
        self.setup_level(1);
    }

    fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::HandInput;

    const DT: f32 = 1.0 / 60.0;

    fn wave() -> ControlInput {
        ControlInput {
            restart: true,
            ..ControlInput::default()
        }
    }

    fn hand(x: f32, y: f32, gesture: Gesture) -> ControlInput {
        ControlInput::from_hand(HandInput {
            position: Vec2::new(x, y),
            frame_size: (1024, 768),
            gesture,
        })
    }

    fn far_target() -> Target {
        Target {
            position: Vec2::new(60.0, 60.0),
            velocity: Vec2::ZERO,
            kind: TargetKind::Standard,
        }
    }

    /// A started game with no obstacles and one target out of the way.
    fn playing(seed: u64) -> AdventureGame {
        let mut game = AdventureGame::new(seed);
        game.update(&wave(), DT);
        game.obstacles.clear();
        game.targets = vec![far_target()];
        game
    }

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "{a} != {b}");
    }

    #[test]
    fn test_level_params() {
        let first = LevelParams::for_level(1);
        assert_eq!(first.obstacles, 1);
        assert_close(first.target_delay, 1.5);
        assert_close(first.obstacle_delay, 5.0);
        assert_close(first.time_limit, 60.0);

        let third = LevelParams::for_level(3);
        assert_close(third.target_delay, 1.3);
        assert_close(third.obstacle_delay, 4.4);
        assert_close(third.time_limit, 50.0);

        let late = LevelParams::for_level(20);
        assert_eq!(late.obstacles, 8);
        assert_close(late.target_delay, 0.5);
        assert_close(late.obstacle_delay, 2.0);
        assert_close(late.time_limit, 30.0);
    }

    #[test]
    fn test_target_rolls() {
        assert_eq!(TargetKind::from_roll(0.1), TargetKind::Standard);
        assert_eq!(TargetKind::from_roll(0.8), TargetKind::Bonus);
        assert_eq!(TargetKind::from_roll(0.93), TargetKind::Special);
        assert_eq!(TargetKind::from_roll(0.99), TargetKind::Negative);
        assert_eq!(TargetKind::Negative.value(), -2);
    }

    #[test]
    fn test_wave_starts_from_title() {
        let mut game = AdventureGame::new(3);
        assert_eq!(game.status().phase, Phase::Title);
        game.update(&ControlInput::default(), DT);
        assert_eq!(game.status().phase, Phase::Title);

        game.update(&wave(), DT);
        assert_eq!(
            game.status(),
            GameStatus {
                phase: Phase::Playing,
                score: 0,
                lives: 3,
                level: 1
            }
        );
        assert_eq!(game.targets().len(), 5);
        assert_eq!(game.obstacles().len(), 1);
        assert_close(game.time_left(), 60.0);
    }

    #[test]
    fn test_spawns_stay_inside_margins() {
        let mut game = AdventureGame::new(11);
        for _ in 0..50 {
            game.spawn_target();
            game.spawn_obstacle();
        }
        for t in game.targets() {
            assert!((50.0..=974.0).contains(&t.position.x));
            assert!((50.0..=718.0).contains(&t.position.y));
            let speed = t.velocity.length();
            assert!((0.5 - 1e-4..2.0).contains(&speed));
        }
        for o in game.obstacles() {
            assert!((30.0..=55.0).contains(&o.rect.width));
            assert!(o.rect.left() >= 100.0 && o.rect.right() <= 924.0);
            assert!(o.rect.top() >= 100.0 && o.rect.bottom() <= 668.0);
        }
    }

    #[test]
    fn test_character_accelerates_toward_hand() {
        let mut game = playing(1);
        game.update(&hand(712.0, 384.0, Gesture::Unknown), DT);
        assert_close(game.character().velocity.x, 2.0);
        assert_close(game.character().position.x, 514.0);

        for _ in 0..10 {
            game.update(&hand(712.0, 384.0, Gesture::Unknown), DT);
        }
        assert_close(game.character().velocity.length(), 10.0);

        for _ in 0..5 {
            game.update(&hand(1000.0, 384.0, Gesture::Pointing), DT);
        }
        assert_close(game.character().velocity.length(), 15.0);
    }

    #[test]
    fn test_fist_coasts() {
        let mut game = playing(1);
        game.character.velocity = Vec2::new(10.0, 0.0);
        game.update(&hand(0.0, 0.0, Gesture::ClosedFist), DT);
        assert_close(game.character().velocity.x, 9.0);
        assert_close(game.character().position.x, 521.0);
    }

    #[test]
    fn test_character_holds_still_near_target() {
        let mut game = playing(1);
        game.update(&hand(514.0, 386.0, Gesture::Unknown), DT);
        assert_eq!(game.character().velocity, Vec2::ZERO);
    }

    #[test]
    fn test_thumbs_up_attack_cooldown() {
        let mut game = playing(1);
        let thumbs = hand(512.0, 384.0, Gesture::ThumbsUp);
        game.update(&thumbs, 0.25);
        assert!(game.character().attacking);
        for _ in 0..3 {
            game.update(&thumbs, 0.25);
            assert!(!game.character().attacking);
        }
        game.update(&thumbs, 0.25);
        assert!(game.character().attacking);
    }

    #[test]
    fn test_collect_target() {
        let mut game = playing(1);
        game.targets.push(Target {
            position: Vec2::new(520.0, 390.0),
            velocity: Vec2::ZERO,
            kind: TargetKind::Special,
        });
        game.update(&ControlInput::default(), DT);
        assert_eq!(game.status().score, 5);
        assert_eq!(game.targets().len(), 1);
        assert_eq!(game.particles().len(), 15);
        assert_eq!(game.drain_events(), vec![GameEvent::Collect { value: 5 }]);
    }

    #[test]
    fn test_obstacle_hit_then_invulnerable() {
        let mut game = playing(1);
        game.obstacles
            .push(Obstacle::fixed(Rect::new(500.0, 370.0, 40.0, 40.0)));
        game.update(&ControlInput::default(), DT);
        assert_eq!(game.status().lives, 2);
        assert!(game.is_invulnerable());
        assert_eq!(game.particles().len(), 30);
        assert_eq!(game.drain_events(), vec![GameEvent::Hit { lives_left: 2 }]);

        game.update(&ControlInput::default(), DT);
        assert_eq!(game.status().lives, 2);

        game.invulnerable = 0.0;
        game.lives = 1;
        game.update(&ControlInput::default(), DT);
        assert_eq!(game.status().phase, Phase::GameOver);
        assert_eq!(
            game.drain_events(),
            vec![GameEvent::Hit { lives_left: 0 }, GameEvent::GameOver { score: 0 }]
        );

        game.update(&wave(), DT);
        assert_eq!(game.status().phase, Phase::Playing);
        assert_eq!(game.status().lives, 3);
    }

    #[test]
    fn test_clearing_targets_levels_up() {
        let mut game = playing(1);
        game.targets.clear();
        game.update(&ControlInput::default(), DT);
        assert_eq!(game.status().level, 2);
        assert_eq!(game.targets().len(), 5);
        assert_eq!(game.obstacles().len(), 2);
        assert_close(game.time_left(), 55.0);
        assert_eq!(game.drain_events(), vec![GameEvent::LevelUp { level: 2 }]);
    }

    #[test]
    fn test_timer_runs_out() {
        let mut game = playing(1);
        game.time_left = 0.01;
        game.update(&ControlInput::default(), DT);
        assert_eq!(game.status().phase, Phase::GameOver);
        assert_eq!(game.drain_events(), vec![GameEvent::GameOver { score: 0 }]);
    }

    #[test]
    fn test_spawn_timer_adds_target() {
        let mut game = playing(1);
        for _ in 0..100 {
            game.update(&ControlInput::default(), DT);
        }
        // A spawn landing on the character is collected straight away.
        assert_eq!(game.targets().len() + game.drain_events().len(), 2);
    }

    #[test]
    fn test_drifting_target_bounces() {
        let mut bonus = Target {
            position: Vec2::new(10.0, 300.0),
            velocity: Vec2::new(-1.0, 0.0),
            kind: TargetKind::Bonus,
        };
        bonus.step();
        assert_eq!(bonus.position, Vec2::new(9.0, 300.0));
        assert_eq!(bonus.velocity, Vec2::new(1.0, 0.0));

        let mut standard = Target {
            kind: TargetKind::Standard,
            ..bonus
        };
        standard.step();
        assert_eq!(standard.position, bonus.position);
    }

    #[test]
    fn test_moving_obstacle_reverses() {
        let mut o = Obstacle {
            speed: 100.0,
            max_distance: 100.0,
            ..Obstacle::fixed(Rect::new(200.0, 200.0, 40.0, 40.0))
        };
        o.step(0.5);
        assert_close(o.rect.x, 250.0);
        o.step(0.5);
        assert_close(o.rect.x, 300.0);
        o.step(0.5);
        assert_close(o.rect.x, 250.0);
        assert_close(o.rect.y, 200.0);
    }
}
