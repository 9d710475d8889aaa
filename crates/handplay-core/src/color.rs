//! Colour-space conversion and colour-range masks.

use crate::mask::Mask;
use crate::types::{check_rgb, VisionError};
use serde::{Deserialize, Serialize};

/// Convert one RGB pixel to 8-bit HSV with hue halved into 0..180.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v == 0 {
        0
    } else {
        (255 * diff + v / 2) / v
    };

    if diff == 0 {
        return [0, s as u8, v as u8];
    }

    let diff = diff as f32;
    let mut h = if v == r {
        60.0 * (g - b) as f32 / diff
    } else if v == g {
        120.0 + 60.0 * (b - r) as f32 / diff
    } else {
        240.0 + 60.0 * (r - g) as f32 / diff
    };
    if h < 0.0 {
        h += 360.0;
    }

    let h = (h / 2.0).round() as i32 % 180;
    [h as u8, s as u8, v as u8]
}

/// Inclusive HSV bounds, in the same 0..180 hue scale as [`rgb_to_hsv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    /// Broad skin range used by the gesture detector.
    pub const HAND: HsvRange = HsvRange {
        lower: [0, 30, 60],
        upper: [30, 255, 255],
    };

    /// Tighter range used for the finger-orientation tracker.
    pub const ORIENTATION: HsvRange = HsvRange {
        lower: [0, 48, 80],
        upper: [20, 255, 255],
    };

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| hsv[c] >= self.lower[c] && hsv[c] <= self.upper[c])
    }
}

impl Default for HsvRange {
    fn default() -> Self {
        Self::HAND
    }
}

/// 255 where the pixel's HSV value falls inside `range`.
pub fn skin_mask(rgb: &[u8], width: u32, height: u32, range: &HsvRange) -> Result<Mask, VisionError> {
    let (w, h) = check_rgb(rgb, width, height)?;
    let data = rgb[..w * h * 3]
        .chunks_exact(3)
        .map(|p| if range.contains(rgb_to_hsv(p[0], p[1], p[2])) { 255 } else { 0 })
        .collect();
    Mask::from_raw(w, h, data)
}

/// 255 where the pixel's luma is above `threshold`.
pub fn brightness_mask(rgb: &[u8], width: u32, height: u32, threshold: u8) -> Result<Mask, VisionError> {
    let (w, h) = check_rgb(rgb, width, height)?;
    let data = rgb[..w * h * 3]
        .chunks_exact(3)
        .map(|p| {
            let luma = (77 * p[0] as u32 + 150 * p[1] as u32 + 29 * p[2] as u32) >> 8;
            if luma > threshold as u32 { 255 } else { 0 }
        })
        .collect();
    Mask::from_raw(w, h, data)
}
