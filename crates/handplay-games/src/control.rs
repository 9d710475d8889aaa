//! Per-tick control input built from the vision pipeline.

use crate::geometry::Vec2;
use handplay_core::{Direction, Gesture};
use serde::Serialize;

/// The tracked hand, in camera frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HandInput {
    pub position: Vec2,
    pub frame_size: (u32, u32),
    pub gesture: Gesture,
}

impl HandInput {
    /// Scale the frame position into a `width` × `height` game field.
    pub fn to_screen(&self, width: f32, height: f32) -> Vec2 {
        let (fw, fh) = self.frame_size;
        if fw == 0 || fh == 0 {
            return Vec2::ZERO;
        }
        Vec2::new(
            (self.position.x * width / fw as f32).trunc(),
            (self.position.y * height / fh as f32).trunc(),
        )
    }
}

/// Everything a game reads from the camera on one tick. An empty input means
/// no hand was seen.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ControlInput {
    pub hand: Option<HandInput>,
    /// Unit steering vector, screen coordinates.
    pub pointing: Option<Vec2>,
    pub direction: Option<Direction>,
    /// A wave gesture is showing: start or restart.
    pub restart: bool,
}

impl ControlInput {
    pub fn from_hand(hand: HandInput) -> Self {
        Self {
            restart: hand.gesture.is_wave(),
            hand: Some(hand),
            ..Self::default()
        }
    }

    pub fn gesture(&self) -> Option<Gesture> {
        self.hand.map(|h| h.gesture)
    }

    pub fn to_screen(&self, width: f32, height: f32) -> Option<Vec2> {
        self.hand.map(|h| h.to_screen(width, height))
    }
}
