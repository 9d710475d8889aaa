//! Ball steering: roll the ball into targets while avoiding obstacles.
//!
//! The same field backs two games. With [`ObstacleRule::Bounce`] the ball
//! follows the pointing finger and glances off obstacles; with
//! [`ObstacleRule::Fatal`] it follows the hand's long axis and any obstacle
//! contact ends the game.

use crate::control::ControlInput;
use crate::geometry::{circle_rect_contact, Contact, Rect, Vec2};
use crate::{Game, GameEvent, GameStatus, Phase};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

pub const FIELD_WIDTH: f32 = 800.0;
pub const FIELD_HEIGHT: f32 = 600.0;
pub const BALL_RADIUS: f32 = 20.0;
pub const BASE_SPEED: f32 = 5.0;
pub const MAX_SPEED: f32 = 10.0;

const INITIAL_TARGETS: usize = 5;
const INITIAL_OBSTACLES: usize = 3;
/// Seconds between spawns.
const TARGET_INTERVAL: f32 = 2.0;
const OBSTACLE_INTERVAL: f32 = 5.0;
const TARGET_MARGIN: i32 = 50;
const OBSTACLE_MARGIN: i32 = 100;
/// Spawns keep at least this far from the ball.
const TARGET_CLEARANCE: f32 = 100.0;
const OBSTACLE_CLEARANCE: f32 = 150.0;
const MAX_PLACEMENT_ATTEMPTS: usize = 100;
/// Velocity factor per tick without steering.
const COAST: f32 = 0.95;
const WALL_BOUNCE: f32 = -0.5;
/// Distance the ball is pushed off an obstacle after a bounce.
const UNSTICK_DISTANCE: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleRule {
    Bounce,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Standard,
    Bonus,
    /// Raises the ball speed instead of scoring.
    Speed,
}

impl TargetKind {
    /// Kind for a uniform roll in `[0, 1)`.
    pub fn from_roll(r: f64) -> Self {
        if r > 0.95 {
            TargetKind::Speed
        } else if r > 0.9 {
            TargetKind::Bonus
        } else {
            TargetKind::Standard
        }
    }

    pub fn value(&self) -> i32 {
        match self {
            TargetKind::Bonus => 3,
            TargetKind::Standard | TargetKind::Speed => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Target {
    pub position: Vec2,
    pub radius: f32,
    pub kind: TargetKind,
}

pub struct BallGame {
    rule: ObstacleRule,
    rng: StdRng,
    phase: Phase,
    score: i32,
    speed: f32,
    ball: Vec2,
    velocity: Vec2,
    targets: Vec<Target>,
    obstacles: Vec<Rect>,
    target_timer: f32,
    obstacle_timer: f32,
    events: Vec<GameEvent>,
}

impl BallGame {
    pub fn new(rule: ObstacleRule, seed: u64) -> Self {
        let mut game = Self {
            rule,
            rng: StdRng::seed_from_u64(seed),
            phase: Phase::Playing,
            score: 0,
            speed: BASE_SPEED,
            ball: Vec2::ZERO,
            velocity: Vec2::ZERO,
            targets: Vec::new(),
            obstacles: Vec::new(),
            target_timer: 0.0,
            obstacle_timer: 0.0,
            events: Vec::new(),
        };
        game.reset();
        game
    }

    pub fn rule(&self) -> ObstacleRule {
        self.rule
    }

    pub fn ball(&self) -> Vec2 {
        self.ball
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn obstacles(&self) -> &[Rect] {
        &self.obstacles
    }

    fn spawn_target(&mut self) {
        let radius = self.rng.gen_range(15..=30) as f32;
        let ball = self.ball;
        let position = place(&mut self.rng, |rng| {
            let p = Vec2::new(
                rng.gen_range(TARGET_MARGIN..=FIELD_WIDTH as i32 - TARGET_MARGIN) as f32,
                rng.gen_range(TARGET_MARGIN..=FIELD_HEIGHT as i32 - TARGET_MARGIN) as f32,
            );
            (p.distance(ball) > TARGET_CLEARANCE).then_some(p)
        });
        let Some(position) = position else {
            tracing::debug!("no room for a target");
            return;
        };
        let kind = TargetKind::from_roll(self.rng.gen());
        self.targets.push(Target { position, radius, kind });
    }

    fn spawn_obstacle(&mut self) {
        let width = self.rng.gen_range(30..=80);
        let height = self.rng.gen_range(30..=80);
        let ball = self.ball;
        let rect = place(&mut self.rng, |rng| {
            let x = rng.gen_range(OBSTACLE_MARGIN..=FIELD_WIDTH as i32 - OBSTACLE_MARGIN - width);
            let y = rng.gen_range(OBSTACLE_MARGIN..=FIELD_HEIGHT as i32 - OBSTACLE_MARGIN - height);
            let rect = Rect::new(x as f32, y as f32, width as f32, height as f32);
            (rect.center().distance(ball) > OBSTACLE_CLEARANCE).then_some(rect)
        });
        match rect {
            Some(rect) => self.obstacles.push(rect),
            None => tracing::debug!("no room for an obstacle"),
        }
    }

    fn steer(&mut self, input: &ControlInput) {
        match input.pointing {
            Some(dir) => self.velocity = dir * self.speed,
            None => self.velocity *= COAST,
        }
        self.ball += self.velocity;

        let (min_x, max_x) = (BALL_RADIUS, FIELD_WIDTH - BALL_RADIUS);
        let (min_y, max_y) = (BALL_RADIUS, FIELD_HEIGHT - BALL_RADIUS);
        if self.ball.x < min_x || self.ball.x > max_x {
            self.ball.x = self.ball.x.clamp(min_x, max_x);
            self.velocity.x *= WALL_BOUNCE;
        }
        if self.ball.y < min_y || self.ball.y > max_y {
            self.ball.y = self.ball.y.clamp(min_y, max_y);
            self.velocity.y *= WALL_BOUNCE;
        }
    }

    fn tick_spawns(&mut self, dt: f32) {
        self.target_timer += dt;
        if self.target_timer >= TARGET_INTERVAL {
            self.spawn_target();
            self.target_timer = 0.0;
        }
        self.obstacle_timer += dt;
        if self.obstacle_timer >= OBSTACLE_INTERVAL {
            self.spawn_obstacle();
            self.obstacle_timer = 0.0;
        }
    }

    fn collect_targets(&mut self) {
        let ball = self.ball;
        let mut collected = Vec::new();
        self.targets.retain(|t| {
            let hit = t.position.distance(ball) < BALL_RADIUS + t.radius;
            if hit {
                collected.push(t.kind);
            }
            !hit
        });
        for kind in collected {
            if kind == TargetKind::Speed {
                self.speed = (self.speed + 1.0).min(MAX_SPEED);
                self.events.push(GameEvent::SpeedBoost);
            } else {
                self.score += kind.value();
                self.events.push(GameEvent::Collect { value: kind.value() });
            }
        }
    }

    fn hit_obstacles(&mut self) {
        for i in 0..self.obstacles.len() {
            let contact = circle_rect_contact(self.ball, BALL_RADIUS, &self.obstacles[i]);
            match (self.rule, contact) {
                (_, Contact::None) => {}
                (ObstacleRule::Fatal, _) => {
                    self.game_over();
                    return;
                }
                (ObstacleRule::Bounce, Contact::Corner) => {}
                (ObstacleRule::Bounce, edge) => {
                    if edge == Contact::HorizontalEdge {
                        self.velocity.y = -self.velocity.y;
                    } else {
                        self.velocity.x = -self.velocity.x;
                    }
                    if let Some(dir) = self.velocity.normalized() {
                        self.ball += dir * UNSTICK_DISTANCE;
                    }
                }
            }
        }
    }

    fn game_over(&mut self) {
        self.phase = Phase::GameOver;
        self.events.push(GameEvent::GameOver { score: self.score });
        tracing::info!(game = self.name(), score = self.score, "game over");
    }
}

/// Draw candidates until one is accepted, giving up after
/// `MAX_PLACEMENT_ATTEMPTS` draws.
fn place<T>(rng: &mut StdRng, mut candidate: impl FnMut(&mut StdRng) -> Option<T>) -> Option<T> {
    (0..MAX_PLACEMENT_ATTEMPTS).find_map(|_| candidate(rng))
}

impl Game for BallGame {
    fn name(&self) -> &'static str {
        match self.rule {
            ObstacleRule::Bounce => "pointer",
            ObstacleRule::Fatal => "orientation",
        }
    }

    fn update(&mut self, input: &ControlInput, dt: f32) {
        if self.phase != Phase::Playing {
            if input.restart {
                self.reset();
            }
            return;
        }
        self.steer(input);
        self.tick_spawns(dt);
        self.collect_targets();
        self.hit_obstacles();
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
        self.speed = BASE_SPEED;
        self.ball = Vec2::new(FIELD_WIDTH / 2.0, FIELD_HEIGHT / 2.0);
        self.velocity = Vec2::ZERO;
        self.targets.clear();
        self.obstacles.clear();
        self.target_timer = 0.0;
        self.obstacle_timer = 0.0;
        for _ in 0..INITIAL_TARGETS {
            self.spawn_target();
        }
        for _ in 0..INITIAL_OBSTACLES {
            self.spawn_obstacle();
        }
    }

    fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steer(x: f32, y: f32) -> ControlInput {
        ControlInput {
            pointing: Some(Vec2::new(x, y)),
            ..ControlInput::default()
        }
    }

    fn empty_field(rule: ObstacleRule) -> BallGame {
        let mut game = BallGame::new(rule, 3);
        game.targets.clear();
        game.obstacles.clear();
        game
    }

    #[test]
    fn test_initial_layout() {
        let game = BallGame::new(ObstacleRule::Bounce, 11);
        assert_eq!(game.targets().len(), 5);
        assert_eq!(game.obstacles().len(), 3);
        for t in game.targets() {
            assert!(t.position.distance(game.ball()) > 100.0);
            assert!((15.0..=30.0).contains(&t.radius));
        }
        for o in game.obstacles() {
            assert!(o.center().distance(game.ball()) > 150.0);
            assert!(o.left() >= 100.0 && o.right() <= 700.0);
            assert!(o.top() >= 100.0 && o.bottom() <= 500.0);
        }
    }

    #[test]
    fn test_target_kind_rolls() {
        assert_eq!(TargetKind::from_roll(0.5), TargetKind::Standard);
        assert_eq!(TargetKind::from_roll(0.92), TargetKind::Bonus);
        assert_eq!(TargetKind::from_roll(0.97), TargetKind::Speed);
        assert_eq!(TargetKind::Bonus.value(), 3);
    }

    #[test]
    fn test_steering_and_coasting() {
        let mut game = empty_field(ObstacleRule::Bounce);
        game.update(&steer(1.0, 0.0), 0.016);
        assert_eq!(game.ball(), Vec2::new(405.0, 300.0));
        game.update(&ControlInput::default(), 0.016);
        assert_eq!(game.velocity(), Vec2::new(4.75, 0.0));
        assert_eq!(game.ball(), Vec2::new(409.75, 300.0));
    }

    #[test]
    fn test_wall_bounce() {
        let mut game = empty_field(ObstacleRule::Bounce);
        game.ball = Vec2::new(778.0, 300.0);
        game.update(&steer(1.0, 0.0), 0.016);
        assert_eq!(game.ball().x, 780.0);
        assert_eq!(game.velocity().x, -2.5);
    }

    #[test]
    fn test_collect_and_speed_boost() {
        let mut game = empty_field(ObstacleRule::Bounce);
        game.targets.push(Target { position: Vec2::new(400.0, 300.0), radius: 20.0, kind: TargetKind::Bonus });
        game.targets.push(Target { position: Vec2::new(410.0, 300.0), radius: 20.0, kind: TargetKind::Speed });
        game.update(&ControlInput::default(), 0.016);
        assert_eq!(game.status().score, 3);
        assert_eq!(game.speed(), 6.0);
        assert!(game.targets().is_empty());
        assert_eq!(game.drain_events(), vec![GameEvent::Collect { value: 3 }, GameEvent::SpeedBoost]);
    }

    #[test]
    fn test_speed_is_capped() {
        let mut game = empty_field(ObstacleRule::Bounce);
        game.speed = MAX_SPEED;
        game.targets.push(Target { position: game.ball(), radius: 20.0, kind: TargetKind::Speed });
        game.update(&ControlInput::default(), 0.016);
        assert_eq!(game.speed(), MAX_SPEED);
    }

    #[test]
    fn test_obstacle_bounce() {
        let mut game = empty_field(ObstacleRule::Bounce);
        // Ball rolling down onto the top edge of an obstacle.
        game.obstacles.push(Rect::new(380.0, 320.0, 40.0, 40.0));
        game.update(&steer(0.0, 1.0), 0.016);
        assert_eq!(game.velocity(), Vec2::new(0.0, -5.0));
        assert_eq!(game.ball(), Vec2::new(400.0, 300.0));
        assert_eq!(game.status().phase, Phase::Playing);
    }

    #[test]
    fn test_fatal_obstacle_and_restart() {
        let mut game = empty_field(ObstacleRule::Fatal);
        game.obstacles.push(Rect::new(380.0, 320.0, 40.0, 40.0));
        game.update(&steer(0.0, 1.0), 0.016);
        assert_eq!(game.status().phase, Phase::GameOver);
        assert_eq!(game.drain_events(), vec![GameEvent::GameOver { score: 0 }]);

        // Frozen until a wave.
        let ball = game.ball();
        game.update(&steer(1.0, 0.0), 0.016);
        assert_eq!(game.ball(), ball);

        let wave = ControlInput { restart: true, ..ControlInput::default() };
        game.update(&wave, 0.016);
        assert_eq!(game.status().phase, Phase::Playing);
        assert_eq!(game.ball(), Vec2::new(400.0, 300.0));
        assert_eq!(game.targets().len(), 5);
    }

    #[test]
    fn test_corner_contact() {
        // Ball at rest, overlapping only the obstacle's top-left corner.
        let corner = Rect::new(410.0, 310.0, 40.0, 40.0);
        assert_eq!(circle_rect_contact(Vec2::new(400.0, 300.0), BALL_RADIUS, &corner), Contact::Corner);

        let mut bounce = empty_field(ObstacleRule::Bounce);
        bounce.obstacles.push(corner);
        bounce.update(&ControlInput::default(), 0.016);
        assert_eq!(bounce.status().phase, Phase::Playing);
        assert_eq!(bounce.ball(), Vec2::new(400.0, 300.0));
        assert_eq!(bounce.velocity(), Vec2::ZERO);

        let mut fatal = empty_field(ObstacleRule::Fatal);
        fatal.obstacles.push(corner);
        fatal.update(&ControlInput::default(), 0.016);
        assert_eq!(fatal.status().phase, Phase::GameOver);
        assert_eq!(fatal.drain_events(), vec![GameEvent::GameOver { score: 0 }]);
    }

    #[test]
    fn test_placement_gives_up() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut draws = 0;
        let spot: Option<()> = place(&mut rng, |_| {
            draws += 1;
            None
        });
        assert_eq!(spot, None);
        assert_eq!(draws, MAX_PLACEMENT_ATTEMPTS);

        let mut draws = 0;
        let spot = place(&mut rng, |_| {
            draws += 1;
            (draws == 7).then_some(draws)
        });
        assert_eq!(spot, Some(7));
    }

    #[test]
    fn test_spawn_skipped_without_room() {
        let mut game = empty_field(ObstacleRule::Bounce);
        // No point is farther than any distance from a NaN ball.
        game.ball = Vec2::new(f32::NAN, f32::NAN);
        game.spawn_target();
        game.spawn_obstacle();
        assert!(game.targets().is_empty());
        assert!(game.obstacles().is_empty());
    }

    #[test]
    fn test_spawn_timers() {
        let mut game = empty_field(ObstacleRule::Bounce);
        for _ in 0..4 {
            game.update(&ControlInput::default(), 0.5);
        }
        assert_eq!(game.targets().len(), 1);
        for _ in 0..6 {
            game.update(&ControlInput::default(), 0.5);
        }
        assert_eq!(game.targets().len(), 2);
        assert_eq!(game.obstacles().len(), 1);
    }
}
