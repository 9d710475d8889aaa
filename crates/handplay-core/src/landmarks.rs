//! Gesture rules over 21-point hand landmarks.
//!
//! The landmarks come from an external hand-landmark model, normalised to
//! `[0, 1]` image coordinates. Only the finger-extension heuristics live here.

use crate::gesture::Gesture;
use crate::types::Point;
use serde::{Deserialize, Serialize};

pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_PIP: usize = 6;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_TIP: usize = 12;
pub const RING_PIP: usize = 14;
pub const RING_TIP: usize = 16;
pub const PINKY_PIP: usize = 18;
pub const PINKY_TIP: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

/// One detected hand, serialised as a JSON array of 21 `{x, y}` objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandLandmarks {
    pub points: [Landmark; LANDMARK_COUNT],
}

/// Fingertip positions in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Fingertips {
    pub thumb: Point,
    pub index: Point,
    pub middle: Point,
    pub ring: Point,
    pub pinky: Point,
}

/// Which fingers are extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FingerState {
    pub thumb: bool,
    pub index: bool,
    pub middle: bool,
    pub ring: bool,
    pub pinky: bool,
}

impl FingerState {
    pub fn count(&self) -> usize {
        [self.thumb, self.index, self.middle, self.ring, self.pinky]
            .iter()
            .filter(|&&up| up)
            .count()
    }
}

impl HandLandmarks {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    fn lm(&self, i: usize) -> Landmark {
        self.points[i]
    }

    fn tip_above_pip(&self, tip: usize, pip: usize) -> bool {
        self.lm(tip).y < self.lm(pip).y
    }

    /// Extension state of every finger. The thumb counts as up when its tip
    /// is left of the wrist; the others when the tip is above the middle joint.
    pub fn fingers(&self) -> FingerState {
        FingerState {
            thumb: self.lm(THUMB_TIP).x < self.lm(WRIST).x,
            index: self.tip_above_pip(INDEX_TIP, INDEX_PIP),
            middle: self.tip_above_pip(MIDDLE_TIP, MIDDLE_PIP),
            ring: self.tip_above_pip(RING_TIP, RING_PIP),
            pinky: self.tip_above_pip(PINKY_TIP, PINKY_PIP),
        }
    }

    pub fn count_fingers_up(&self) -> usize {
        self.fingers().count()
    }

    /// First matching rule wins: open palm, fist, pointing, victory, thumbs-up.
    pub fn recognize(&self) -> Gesture {
        let f = self.fingers();
        let up = f.count();

        if up >= 4 {
            Gesture::OpenPalm
        } else if up <= 1 {
            Gesture::ClosedFist
        } else if f.index && !f.middle && !f.ring && !f.pinky {
            Gesture::Pointing
        } else if f.index && f.middle && !f.ring && !f.pinky {
            Gesture::Victory
        } else if f.thumb && up == 1 {
            Gesture::ThumbsUp
        } else {
            Gesture::Unknown
        }
    }

    fn to_pixels(&self, i: usize, width: u32, height: u32) -> Point {
        let p = self.lm(i);
        Point::new((p.x * width as f32) as i32, (p.y * height as f32) as i32)
    }

    /// Wrist position in image pixels.
    pub fn wrist_position(&self, width: u32, height: u32) -> Point {
        self.to_pixels(WRIST, width, height)
    }

    pub fn fingertip_positions(&self, width: u32, height: u32) -> Fingertips {
        Fingertips {
            thumb: self.to_pixels(THUMB_TIP, width, height),
            index: self.to_pixels(INDEX_TIP, width, height),
            middle: self.to_pixels(MIDDLE_TIP, width, height),
            ring: self.to_pixels(RING_TIP, width, height),
            pinky: self.to_pixels(PINKY_TIP, width, height),
        }
    }

    /// Horizontal index fingertip position scaled to `width`.
    pub fn index_tip_x(&self, width: f32) -> f32 {
        self.lm(INDEX_TIP).x * width
    }
}

/// Pixels per second between two positions; zero when either is missing or
/// no time has passed.
pub fn velocity(current: Option<Point>, previous: Option<Point>, dt: f32) -> (f32, f32) {
    match (current, previous) {
        (Some(c), Some(p)) if dt != 0.0 => ((c.x - p.x) as f32 / dt, (c.y - p.y) as f32 / dt),
        _ => (0.0, 0.0),
    }
}
