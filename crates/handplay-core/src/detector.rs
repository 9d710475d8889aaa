//! Per-frame hand detectors.
//!
//! [`HandDetector`] drives the gesture games: skin colour gated by motion,
//! morphology, the largest contour, a smoothed centroid and a gesture label.
//! [`OrientationDetector`] reads the long axis of the hand for the
//! orientation game, and [`MotionTracker`] follows the brightest blob for
//! the simple lane runner.

use crate::background::{BackgroundModel, DEFAULT_HISTORY, DEFAULT_VAR_THRESHOLD};
use crate::color::{brightness_mask, skin_mask, HsvRange};
use crate::contour::{find_contours, largest_contour, Contour};
use crate::gesture::{classify_contour, Gesture};
use crate::hull::min_area_rect;
use crate::mask::Mask;
use crate::orientation::Direction;
use crate::smoothing::{Filter, MovingAvg, PointAverager};
use crate::types::{Point, VisionError};
use serde::{Deserialize, Serialize};

/// Square kernel used for the skin-mask erode/dilate passes.
const MORPH_KERNEL: usize = 5;
/// Motion mask clean-up kernels.
const MOTION_OPEN_KERNEL: usize = 3;
const MOTION_CLOSE_KERNEL: usize = 5;
/// Only confident foreground survives the motion threshold.
const MOTION_THRESHOLD: u8 = 200;
/// Luma cut-off for the bright-blob tracker.
const BRIGHT_THRESHOLD: u8 = 127;

/// Skin segmentation and mask clean-up parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    pub skin: HsvRange,
    pub erode_iterations: usize,
    pub dilate_iterations: usize,
    /// Binarise after the blur; `None` keeps the blurred grey levels.
    pub final_threshold: Option<u8>,
}

impl SegmentationConfig {
    /// Broad skin range, heavy dilation to join fingers to the palm.
    pub const HAND: SegmentationConfig = SegmentationConfig {
        skin: HsvRange::HAND,
        erode_iterations: 1,
        dilate_iterations: 3,
        final_threshold: Some(60),
    };

    pub const ORIENTATION: SegmentationConfig = SegmentationConfig {
        skin: HsvRange::ORIENTATION,
        erode_iterations: 1,
        dilate_iterations: 2,
        final_threshold: None,
    };

    /// Erode, dilate, blur and optionally threshold a raw mask.
    pub fn clean(&self, mask: &Mask) -> Mask {
        let mask = mask
            .erode(MORPH_KERNEL, self.erode_iterations)
            .dilate(MORPH_KERNEL, self.dilate_iterations)
            .gaussian_blur5();
        match self.final_threshold {
            Some(t) => mask.threshold(t),
            None => mask,
        }
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self::HAND
    }
}

/// Hand detector tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub segmentation: SegmentationConfig,
    /// Contours must be strictly larger than this to count as a hand.
    pub min_contour_area: f64,
    /// Number of centroids averaged for the reported position.
    pub smoothing_window: usize,
    /// Frames fed to the background model before it gates the skin mask.
    pub background_learning_frames: u32,
    pub background_history: u32,
    pub background_var_threshold: f32,
    /// Gate the skin mask with background subtraction. Off for still images.
    pub use_background: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            segmentation: SegmentationConfig::HAND,
            min_contour_area: 3000.0,
            smoothing_window: 5,
            background_learning_frames: 30,
            background_history: DEFAULT_HISTORY,
            background_var_threshold: DEFAULT_VAR_THRESHOLD,
            use_background: true,
        }
    }
}

/// A hand found in one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandObservation {
    /// Centroid averaged over the recent frames.
    pub center: Point,
    /// Centroid of this frame's contour.
    pub raw_center: Point,
    pub contour: Contour,
    pub area: f64,
    pub gesture: Gesture,
    pub frame_width: u32,
    pub frame_height: u32,
}

/// Skin and motion hand detector with centroid smoothing.
pub struct HandDetector {
    config: DetectorConfig,
    background: BackgroundModel,
    learned_frames: u32,
    positions: PointAverager,
    gesture: Gesture,
}

impl HandDetector {
    pub fn new(config: DetectorConfig) -> Self {
        tracing::debug!(
            min_area = config.min_contour_area,
            smoothing = config.smoothing_window,
            background = config.use_background,
            "hand detector created"
        );
        Self {
            background: BackgroundModel::new(config.background_history, config.background_var_threshold),
            learned_frames: 0,
            positions: PointAverager::new(config.smoothing_window),
            gesture: Gesture::Unknown,
            config,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Last classified gesture; kept while no hand is visible.
    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    /// Whether the background model has seen enough frames to gate skin.
    pub fn background_ready(&self) -> bool {
        self.config.use_background && self.learned_frames >= self.config.background_learning_frames
    }

    pub fn reset(&mut self) {
        self.background.reset();
        self.learned_frames = 0;
        self.positions.reset();
        self.gesture = Gesture::Unknown;
    }

    /// Build the cleaned hand mask for one frame, updating the background model.
    ///
    /// `exclusion` zeroes regions (such as a face) that must never count as hand.
    pub fn segment(&mut self, rgb: &[u8], width: u32, height: u32, exclusion: Option<&Mask>) -> Result<Mask, VisionError> {
        let motion = self.motion_mask(rgb, width, height)?;
        let mut mask = skin_mask(rgb, width, height, &self.config.segmentation.skin)?;
        if let Some(motion) = &motion {
            mask = mask.and(motion)?;
        }
        if let Some(exclusion) = exclusion {
            mask = mask.and(exclusion)?;
        }
        Ok(self.config.segmentation.clean(&mask))
    }

    fn motion_mask(&mut self, rgb: &[u8], width: u32, height: u32) -> Result<Option<Mask>, VisionError> {
        if !self.config.use_background {
            return Ok(None);
        }
        if self.learned_frames < self.config.background_learning_frames {
            self.background.learn(rgb, width, height)?;
            self.learned_frames += 1;
            if self.learned_frames == self.config.background_learning_frames {
                tracing::info!(frames = self.learned_frames, "background model ready");
            }
        }
        if !self.background_ready() {
            return Ok(None);
        }
        let fg = self.background.apply(rgb, width, height)?;
        Ok(Some(
            fg.open(MOTION_OPEN_KERNEL)
                .close(MOTION_CLOSE_KERNEL)
                .threshold(MOTION_THRESHOLD),
        ))
    }

    /// Find the hand in an RGB24 frame.
    ///
    /// `Ok(None)` when no contour is large enough or its centroid is undefined.
    pub fn process_frame(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
        exclusion: Option<&Mask>,
    ) -> Result<Option<HandObservation>, VisionError> {
        let mask = self.segment(rgb, width, height, exclusion)?;
        let Some(contour) = largest_contour(find_contours(&mask), self.config.min_contour_area) else {
            return Ok(None);
        };
        let Some(raw_center) = contour.centroid() else {
            return Ok(None);
        };

        let center = self.positions.push(raw_center);
        self.gesture = classify_contour(&contour);
        let area = contour.area();
        tracing::trace!(x = center.x, y = center.y, area, gesture = %self.gesture, "hand");

        Ok(Some(HandObservation {
            center,
            raw_center,
            contour,
            area,
            gesture: self.gesture,
            frame_width: width,
            frame_height: height,
        }))
    }
}

impl Default for HandDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

/// Contours below this area are ignored by the orientation detector.
pub const ORIENTATION_MIN_AREA: f64 = 3000.0;
const ORIENTATION_SMOOTHING: usize = 5;

/// Long-axis reading of the hand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrientationReading {
    pub center: Point,
    pub contour: Contour,
    /// Smoothed long-axis angle in degrees.
    pub angle_degrees: f64,
    /// Unit vector along `angle_degrees`, screen coordinates.
    pub direction_vector: (f64, f64),
    pub direction: Direction,
}

/// Hand orientation from the minimum-area rectangle around the skin blob.
pub struct OrientationDetector {
    segmentation: SegmentationConfig,
    angles: MovingAvg,
    direction: Option<Direction>,
}

impl OrientationDetector {
    pub fn new() -> Self {
        Self {
            segmentation: SegmentationConfig::ORIENTATION,
            angles: MovingAvg::new(ORIENTATION_SMOOTHING),
            direction: None,
        }
    }

    /// Last direction read, `None` before the first hand.
    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn reset(&mut self) {
        self.angles.reset();
        self.direction = None;
    }

    pub fn process_frame(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
        exclusion: Option<&Mask>,
    ) -> Result<Option<OrientationReading>, VisionError> {
        let mut mask = skin_mask(rgb, width, height, &self.segmentation.skin)?;
        if let Some(exclusion) = exclusion {
            mask = mask.and(exclusion)?;
        }
        let mask = self.segmentation.clean(&mask);

        let Some(contour) = largest_contour(find_contours(&mask), 0.0) else {
            return Ok(None);
        };
        if contour.area() < ORIENTATION_MIN_AREA {
            return Ok(None);
        }
        let (Some(center), Some(rect)) = (contour.centroid(), min_area_rect(&contour.points)) else {
            return Ok(None);
        };

        let angle = self.angles.push(rect.long_axis_degrees() as f32) as f64;
        let rad = angle.to_radians();
        let direction = Direction::from_degrees(angle);
        self.direction = Some(direction);

        Ok(Some(OrientationReading {
            center,
            contour,
            angle_degrees: angle,
            direction_vector: (rad.cos(), rad.sin()),
            direction,
        }))
    }
}

impl Default for OrientationDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Follows the largest bright blob horizontally.
#[derive(Debug, Default)]
pub struct MotionTracker;

impl MotionTracker {
    pub fn new() -> Self {
        Self
    }

    /// Centroid x of the largest region brighter than mid-grey.
    pub fn track(&self, rgb: &[u8], width: u32, height: u32) -> Result<Option<i32>, VisionError> {
        let mask = brightness_mask(rgb, width, height, BRIGHT_THRESHOLD)?;
        Ok(largest_contour(find_contours(&mask), 0.0)
            .and_then(|c| c.centroid())
            .map(|p| p.x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SKIN: [u8; 3] = [200, 140, 100];

    /// Black RGB frame with skin-coloured rectangles.
    fn frame(w: usize, h: usize, rects: &[(usize, usize, usize, usize)]) -> Vec<u8> {
        let mut rgb = vec![0u8; w * h * 3];
        for &(x0, y0, x1, y1) in rects {
            for y in y0..y1 {
                for x in x0..x1 {
                    rgb[(y * w + x) * 3..(y * w + x) * 3 + 3].copy_from_slice(&SKIN);
                }
            }
        }
        rgb
    }

    fn still_config() -> DetectorConfig {
        DetectorConfig {
            use_background: false,
            ..DetectorConfig::default()
        }
    }

    #[test]
    fn test_finds_hand_blob() {
        let rgb = frame(160, 120, &[(40, 30, 110, 100)]);
        let mut det = HandDetector::new(still_config());
        let obs = det.process_frame(&rgb, 160, 120, None).unwrap().unwrap();
        assert!((obs.raw_center.x - 75).abs() <= 1, "{:?}", obs.raw_center);
        assert!((obs.raw_center.y - 65).abs() <= 1, "{:?}", obs.raw_center);
        assert_eq!(obs.center, obs.raw_center);
        assert!(obs.area > 4900.0);
        assert_eq!(obs.gesture, Gesture::ClosedFist);
        assert_eq!(det.gesture(), Gesture::ClosedFist);
        assert_eq!((obs.frame_width, obs.frame_height), (160, 120));
    }

    #[test]
    fn test_small_blob_is_ignored() {
        let rgb = frame(160, 120, &[(40, 30, 60, 50)]);
        let mut det = HandDetector::new(still_config());
        assert!(det.process_frame(&rgb, 160, 120, None).unwrap().is_none());
        assert_eq!(det.gesture(), Gesture::Unknown);
    }

    #[test]
    fn test_exclusion_removes_face() {
        let rgb = frame(160, 120, &[(40, 30, 110, 100)]);
        let face = Mask::exclusion(160, 120, &[crate::mask::PixelRect { x: 40, y: 30, width: 70, height: 70 }], 10);
        let mut det = HandDetector::new(still_config());
        assert!(det.process_frame(&rgb, 160, 120, Some(&face)).unwrap().is_none());

        let wrong_size = Mask::filled(10, 10, 255);
        assert!(matches!(
            det.process_frame(&rgb, 160, 120, Some(&wrong_size)),
            Err(VisionError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_position_is_smoothed() {
        let mut det = HandDetector::new(still_config());
        let a = det.process_frame(&frame(200, 120, &[(20, 30, 90, 100)]), 200, 120, None).unwrap().unwrap();
        let b = det.process_frame(&frame(200, 120, &[(100, 30, 170, 100)]), 200, 120, None).unwrap().unwrap();
        assert_eq!(b.center.x, (a.raw_center.x + b.raw_center.x).div_euclid(2));
        assert!(b.center.x < b.raw_center.x);
    }

    #[test]
    fn test_background_gates_static_skin() {
        let config = DetectorConfig {
            background_learning_frames: 3,
            ..DetectorConfig::default()
        };
        let mut det = HandDetector::new(config);
        let still = frame(160, 120, &[(10, 10, 80, 80)]);
        for _ in 0..3 {
            assert!(!det.background_ready());
            det.process_frame(&still, 160, 120, None).unwrap();
        }
        assert!(det.background_ready());
        // The learned skin patch is background now; nothing moves.
        assert!(det.process_frame(&still, 160, 120, None).unwrap().is_none());

        det.reset();
        assert!(!det.background_ready());
        assert_eq!(det.gesture(), Gesture::Unknown);
    }

    #[test]
    fn test_rejects_short_frame() {
        let mut det = HandDetector::default();
        assert!(matches!(
            det.process_frame(&[0; 10], 160, 120, None),
            Err(VisionError::InvalidFrame { .. })
        ));
    }

    #[test]
    fn test_segmentation_without_threshold_keeps_grey() {
        let mut raw = Mask::new(40, 40);
        raw.fill_rect(10, 10, 30, 30, 255);
        let cleaned = SegmentationConfig::ORIENTATION.clean(&raw);
        assert!(cleaned.data().iter().any(|&v| v > 0 && v < 255));
        let binary = SegmentationConfig::HAND.clean(&raw);
        assert!(binary.data().iter().all(|&v| v == 0 || v == 255));
    }

    #[test]
    fn test_orientation_reads_long_axis() {
        let mut det = OrientationDetector::new();
        assert_eq!(det.direction(), None);

        // Tall skin bar: long axis vertical, which bins as down.
        let rgb = frame(160, 160, &[(60, 10, 100, 150)]);
        let reading = det.process_frame(&rgb, 160, 160, None).unwrap().unwrap();
        assert!((reading.angle_degrees - 90.0).abs() < 1.0, "{}", reading.angle_degrees);
        assert_eq!(reading.direction, Direction::Down);
        assert!(reading.direction_vector.1 > 0.99);
        assert_eq!(det.direction(), Some(Direction::Down));

        // Wide bar: the averaged angle lands between the two readings.
        let rgb = frame(160, 160, &[(10, 60, 150, 100)]);
        let reading = det.process_frame(&rgb, 160, 160, None).unwrap().unwrap();
        assert!((reading.angle_degrees - 45.0).abs() < 1.0, "{}", reading.angle_degrees);
    }

    #[test]
    fn test_orientation_ignores_small_blobs() {
        let mut det = OrientationDetector::new();
        let rgb = frame(160, 160, &[(60, 60, 80, 80)]);
        assert!(det.process_frame(&rgb, 160, 160, None).unwrap().is_none());
    }

    #[test]
    fn test_motion_tracker() {
        let mut rgb = vec![0u8; 100 * 50 * 3];
        for y in 10..40 {
            for x in 60..80 {
                rgb[(y * 100 + x) * 3..(y * 100 + x) * 3 + 3].copy_from_slice(&[250, 250, 250]);
            }
        }
        let tracker = MotionTracker::new();
        let x = tracker.track(&rgb, 100, 50).unwrap().unwrap();
        assert!((x - 70).abs() <= 1, "{x}");
        assert_eq!(tracker.track(&vec![0u8; 100 * 50 * 3], 100, 50).unwrap(), None);
    }
}
