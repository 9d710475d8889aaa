//! Moving-average filters for positions and angles.

use crate::types::Point;
use std::collections::VecDeque;

/// A filter for values of type `V`.
pub trait Filter<V> {
    /// Adds a new value and returns the filtered one.
    fn push(&mut self, value: V) -> V;

    /// Forgets all history, as if freshly constructed.
    fn reset(&mut self);
}

/// Equal-weight average over the last `window` values.
#[derive(Debug, Clone)]
pub struct MovingAvg {
    history: VecDeque<f32>,
    window: usize,
}

impl MovingAvg {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            history: VecDeque::with_capacity(window),
            window,
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

impl Filter<f32> for MovingAvg {
    fn push(&mut self, value: f32) -> f32 {
        self.history.push_back(value);
        if self.history.len() > self.window {
            self.history.pop_front();
        }
        self.history.iter().sum::<f32>() / self.history.len() as f32
    }

    fn reset(&mut self) {
        self.history.clear();
    }
}

/// Integer mean of the last `window` points, rounded towards negative infinity.
#[derive(Debug, Clone)]
pub struct PointAverager {
    history: VecDeque<Point>,
    window: usize,
}

impl PointAverager {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            history: VecDeque::with_capacity(window),
            window,
        }
    }
}

impl Filter<Point> for PointAverager {
    fn push(&mut self, value: Point) -> Point {
        self.history.push_back(value);
        if self.history.len() > self.window {
            self.history.pop_front();
        }
        let n = self.history.len() as i64;
        let (sx, sy) = self
            .history
            .iter()
            .fold((0i64, 0i64), |(sx, sy), p| (sx + p.x as i64, sy + p.y as i64));
        Point::new(sx.div_euclid(n) as i32, sy.div_euclid(n) as i32)
    }

    fn reset(&mut self) {
        self.history.clear();
    }
}
