//! handplay-core — Hand detection and gesture classification.
//!
//! A classical per-frame pipeline: HSV skin segmentation gated by an
//! adaptive background model, binary morphology, contour tracing, then
//! convex hull / convexity defect heuristics to name the gesture and the
//! pointing direction. A separate classifier handles 21-point hand
//! landmarks produced by an external model.

pub mod background;
pub mod color;
pub mod contour;
pub mod detector;
pub mod gesture;
pub mod hull;
pub mod landmarks;
pub mod mask;
pub mod orientation;
pub mod smoothing;
pub mod types;

pub use color::HsvRange;
pub use contour::Contour;
pub use detector::{
    DetectorConfig, HandDetector, HandObservation, MotionTracker, OrientationDetector,
    OrientationReading, SegmentationConfig,
};
pub use gesture::Gesture;
pub use landmarks::HandLandmarks;
pub use mask::Mask;
pub use orientation::Direction;
pub use types::{Point, VisionError};
