//! handplay-hw — Frame acquisition for the gesture games.
//!
//! Provides V4L2 webcam capture (YUYV or MJPEG converted to RGB24), a
//! still-image replay source, and the [`FrameSource`] trait the engine
//! pulls frames through.

pub mod camera;
pub mod frame;
pub mod source;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use frame::{Frame, FrameError};
pub use source::{FrameSource, ImageSequence, SourceError};
