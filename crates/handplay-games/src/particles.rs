//! Short-lived particle bursts for collect and hit effects.

use crate::geometry::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::f32::consts::TAU;

const VELOCITY_DECAY: f32 = 0.95;
const MIN_PARTICLE_SPEED: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
    pub color: [u8; 3],
    pub size: f32,
    /// Seconds left.
    pub life: f32,
    pub max_life: f32,
}

impl Particle {
    /// Advance one tick; returns whether the particle is still alive.
    fn step(&mut self, dt: f32) -> bool {
        self.position += self.velocity;
        self.life -= dt;
        self.velocity *= VELOCITY_DECAY;
        self.size = (self.size * (self.life / self.max_life)).max(0.0);
        self.life > 0.0
    }

    /// Opacity in `[0, 1]` for a renderer.
    pub fn alpha(&self) -> f32 {
        (self.life / self.max_life).clamp(0.0, 1.0)
    }
}

/// Burst parameters, each jittered ±50% per particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Burst {
    pub count: usize,
    pub size: f32,
    pub life: f32,
    pub speed: f32,
}

impl Default for Burst {
    fn default() -> Self {
        Self {
            count: 20,
            size: 5.0,
            life: 1.0,
            speed: 3.0,
        }
    }
}

pub struct ParticleSystem {
    particles: Vec<Particle>,
    rng: StdRng,
}

fn uniform(rng: &mut StdRng, lo: f32, hi: f32) -> f32 {
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}

impl ParticleSystem {
    pub fn new(seed: u64) -> Self {
        Self {
            particles: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    /// Spray `burst.count` particles in random directions from `position`.
    pub fn explode(&mut self, position: Vec2, color: [u8; 3], burst: Burst) {
        for _ in 0..burst.count {
            let size = uniform(&mut self.rng, burst.size * 0.5, burst.size * 1.5);
            let life = uniform(&mut self.rng, burst.life * 0.5, burst.life * 1.5);
            let top_speed = uniform(&mut self.rng, burst.speed * 0.5, burst.speed * 1.5);
            let angle = uniform(&mut self.rng, 0.0, TAU);
            let speed = uniform(&mut self.rng, MIN_PARTICLE_SPEED, top_speed);
            self.particles.push(Particle {
                position,
                velocity: Vec2::from_angle(angle) * speed,
                color,
                size,
                life,
                max_life: life,
            });
        }
    }

    pub fn update(&mut self, dt: f32) {
        self.particles.retain_mut(|p| p.step(dt));
    }
}
