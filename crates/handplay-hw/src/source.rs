//! Frame sources: live camera or a directory of still images replayed in order.

use crate::camera::{Camera, CameraError};
use crate::frame::{Frame, FrameError};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File extensions picked up by [`ImageSequence`].
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no images found in {0}")]
    Empty(PathBuf),
    #[error("frame source exhausted")]
    Exhausted,
}

/// Anything that can hand the engine one RGB frame at a time.
///
/// Sources are opened on the thread that reads them, so no `Send` bound.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Frame, SourceError>;

    /// Nominal frame size.
    fn resolution(&self) -> (u32, u32);

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

impl FrameSource for Camera {
    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        Ok(self.capture_frame()?)
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn describe(&self) -> String {
        format!("camera {} ({:?})", self.device_path, self.fourcc)
    }
}

/// Replays the images of a directory in file-name order.
pub struct ImageSequence {
    dir: PathBuf,
    paths: Vec<PathBuf>,
    cursor: usize,
    looping: bool,
    resolution: (u32, u32),
    sequence: u32,
}

impl ImageSequence {
    /// Collect the images in `dir`. The first image fixes the nominal resolution.
    pub fn open(dir: &Path, looping: bool) -> Result<Self, SourceError> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && has_image_extension(p))
            .collect();
        paths.sort();

        let first = paths
            .first()
            .ok_or_else(|| SourceError::Empty(dir.to_path_buf()))?;
        let resolution = image::image_dimensions(first)?;

        tracing::info!(
            dir = %dir.display(),
            images = paths.len(),
            width = resolution.0,
            height = resolution.1,
            looping,
            "opened image sequence"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            paths,
            cursor: 0,
            looping,
            resolution,
            sequence: 0,
        })
    }

    /// Number of images in the sequence.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Path of the image the next call to `next_frame` will decode.
    pub fn peek_path(&self) -> Option<&Path> {
        self.paths.get(self.cursor).map(PathBuf::as_path)
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        if self.cursor >= self.paths.len() {
            if !self.looping {
                return Err(SourceError::Exhausted);
            }
            self.cursor = 0;
        }

        let path = &self.paths[self.cursor];
        self.cursor += 1;

        let img = image::open(path)?.to_rgb8();
        let (width, height) = img.dimensions();
        let frame = Frame::from_rgb(img.into_raw(), width, height, self.sequence)?;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(frame)
    }

    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    fn describe(&self) -> String {
        format!("image sequence {} ({} frames)", self.dir.display(), self.paths.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("handplay-source-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(dir: &Path, name: &str, shade: u8) {
        image::RgbImage::from_pixel(4, 3, image::Rgb([shade, shade, shade]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn test_sequence_replays_in_name_order() {
        let dir = scratch_dir("order");
        write_png(&dir, "b.png", 20);
        write_png(&dir, "a.png", 10);
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let mut seq = ImageSequence::open(&dir, false).unwrap();
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.resolution(), (4, 3));

        let first = seq.next_frame().unwrap();
        assert_eq!(first.pixel(0, 0), [10, 10, 10]);
        assert_eq!(first.sequence, 0);
        let second = seq.next_frame().unwrap();
        assert_eq!(second.pixel(0, 0), [20, 20, 20]);
        assert!(matches!(seq.next_frame(), Err(SourceError::Exhausted)));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_sequence_loops() {
        let dir = scratch_dir("loop");
        write_png(&dir, "only.png", 50);

        let mut seq = ImageSequence::open(&dir, true).unwrap();
        for _ in 0..3 {
            assert_eq!(seq.next_frame().unwrap().pixel(3, 2), [50, 50, 50]);
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_empty_directory() {
        let dir = scratch_dir("empty");
        assert!(matches!(ImageSequence::open(&dir, false), Err(SourceError::Empty(_))));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
