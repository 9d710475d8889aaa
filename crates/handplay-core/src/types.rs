use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Integer pixel coordinate (x right, y down).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: Point) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VisionError {
    #[error("invalid frame: expected {expected} bytes, got {actual}")]
    InvalidFrame { expected: usize, actual: usize },
    #[error("mask size mismatch: {left:?} vs {right:?}")]
    DimensionMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },
    #[error("convex hull needs at least 3 vertices, got {0}")]
    DegenerateHull(usize),
}

/// Check that `rgb` holds at least `width * height` RGB24 pixels.
pub(crate) fn check_rgb(rgb: &[u8], width: u32, height: u32) -> Result<(usize, usize), VisionError> {
    let (w, h) = (width as usize, height as usize);
    let expected = w * h * 3;
    if rgb.len() < expected {
        return Err(VisionError::InvalidFrame {
            expected,
            actual: rgb.len(),
        });
    }
    Ok((w, h))
}
