//! Adaptive per-pixel background model for motion gating.
//!
//! Each pixel keeps a running colour mean and a single isotropic variance.
//! A pixel is foreground when its squared colour distance from the mean
//! exceeds `var_threshold` times the variance.

use crate::mask::Mask;
use crate::types::{check_rgb, VisionError};

pub const DEFAULT_HISTORY: u32 = 200;
pub const DEFAULT_VAR_THRESHOLD: f32 = 25.0;
const VAR_INIT: f32 = 15.0;
const VAR_MIN: f32 = 4.0;
const VAR_MAX: f32 = 75.0;

pub struct BackgroundModel {
    history: u32,
    var_threshold: f32,
    width: usize,
    height: usize,
    mean: Vec<[f32; 3]>,
    variance: Vec<f32>,
    frames_seen: u32,
}

impl BackgroundModel {
    pub fn new(history: u32, var_threshold: f32) -> Self {
        Self {
            history: history.max(1),
            var_threshold,
            width: 0,
            height: 0,
            mean: Vec::new(),
            variance: Vec::new(),
            frames_seen: 0,
        }
    }

    pub fn frames_seen(&self) -> u32 {
        self.frames_seen
    }

    pub fn reset(&mut self) {
        self.frames_seen = 0;
        self.mean.clear();
        self.variance.clear();
    }

    /// Update the model without producing a foreground mask.
    pub fn learn(&mut self, rgb: &[u8], width: u32, height: u32) -> Result<(), VisionError> {
        self.update(rgb, width, height, false).map(|_| ())
    }

    /// Classify every pixel against the model, then update it.
    ///
    /// The first frame (or the first after a resolution change) only seeds
    /// the model and yields an all-background mask.
    pub fn apply(&mut self, rgb: &[u8], width: u32, height: u32) -> Result<Mask, VisionError> {
        let (w, h) = check_rgb(rgb, width, height)?;
        let data = self.update(rgb, width, height, true)?;
        Mask::from_raw(w, h, data)
    }

    fn update(&mut self, rgb: &[u8], width: u32, height: u32, classify: bool) -> Result<Vec<u8>, VisionError> {
        let (w, h) = check_rgb(rgb, width, height)?;

        if self.frames_seen == 0 || w != self.width || h != self.height {
            self.seed(rgb, w, h);
            return Ok(if classify { vec![0; w * h] } else { Vec::new() });
        }

        self.frames_seen = self.frames_seen.saturating_add(1);
        let alpha = 1.0 / self.frames_seen.min(self.history) as f32;
        let mut out = if classify { vec![0u8; w * h] } else { Vec::new() };

        for (i, px) in rgb[..w * h * 3].chunks_exact(3).enumerate() {
            let mean = &mut self.mean[i];
            let d = [
                px[0] as f32 - mean[0],
                px[1] as f32 - mean[1],
                px[2] as f32 - mean[2],
            ];
            let dist2 = d[0] * d[0] + d[1] * d[1] + d[2] * d[2];
            let var = &mut self.variance[i];

            if classify && dist2 > self.var_threshold * *var {
                out[i] = 255;
            }

            for c in 0..3 {
                mean[c] += alpha * d[c];
            }
            *var = (*var + alpha * (dist2 - *var)).clamp(VAR_MIN, VAR_MAX);
        }

        Ok(out)
    }

    fn seed(&mut self, rgb: &[u8], w: usize, h: usize) {
        self.width = w;
        self.height = h;
        self.mean = rgb[..w * h * 3]
            .chunks_exact(3)
            .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
            .collect();
        self.variance = vec![VAR_INIT; w * h];
        self.frames_seen = 1;
        tracing::debug!(width = w, height = h, "background model seeded");
    }
}

impl Default for BackgroundModel {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY, DEFAULT_VAR_THRESHOLD)
    }
}
