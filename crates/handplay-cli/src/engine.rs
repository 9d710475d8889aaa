//! Vision engine: a dedicated thread that reads frames, runs the detectors
//! a game needs and streams one [`ControlInput`] per frame to the game loop.

use handplay_core::orientation::{hand_orientation, pointing_direction};
use handplay_core::{
    DetectorConfig, HandDetector, HandObservation, MotionTracker, OrientationDetector, VisionError,
};
use handplay_games::runner::LaneSteering;
use handplay_games::{ControlInput, GameKind, HandInput, Vec2};
use handplay_hw::frame::{is_dark_frame, rgb_to_luma};
use handplay_hw::{Camera, Frame, FrameSource, ImageSequence, SourceError};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};

/// Inputs buffered between the engine thread and the game loop.
const CHANNEL_CAPACITY: usize = 4;
/// Give up on a source after this many capture failures in a row.
const MAX_CONSECUTIVE_ERRORS: u32 = 30;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("frame source error: {0}")]
    Source(#[from] SourceError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Where frames come from.
#[derive(Debug, Clone)]
pub enum SourceSpec {
    Camera {
        device: String,
        width: u32,
        height: u32,
        warmup_frames: usize,
    },
    /// Still images replayed in file-name order.
    Replay { dir: PathBuf, looping: bool },
}

impl SourceSpec {
    pub fn input_policy(&self) -> InputPolicy {
        match self {
            SourceSpec::Camera { .. } => InputPolicy::Latest,
            SourceSpec::Replay { .. } => InputPolicy::Lockstep,
        }
    }

    fn open(&self) -> Result<Box<dyn FrameSource>, SourceError> {
        match self {
            SourceSpec::Camera {
                device,
                width,
                height,
                warmup_frames,
            } => {
                let mut camera = Camera::open(device, *width, *height)?;
                camera.discard_warmup(*warmup_frames);
                Ok(Box::new(camera))
            }
            SourceSpec::Replay { dir, looping } => Ok(Box::new(ImageSequence::open(dir, *looping)?)),
        }
    }
}

/// How the game loop takes inputs off the engine channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputPolicy {
    /// Keep only the newest input each tick. The camera runs at its own pace.
    Latest,
    /// Take exactly one input per tick, waiting for it if needed, so a replay
    /// produces the same game every run.
    Lockstep,
}

impl InputPolicy {
    /// Update `latest` from the channel. Returns `false` once the engine has
    /// stopped and nothing is left to read.
    pub async fn pull(self, inputs: &mut mpsc::Receiver<ControlInput>, latest: &mut ControlInput) -> bool {
        match self {
            InputPolicy::Latest => loop {
                match inputs.try_recv() {
                    Ok(input) => *latest = input,
                    Err(TryRecvError::Empty) => return true,
                    Err(TryRecvError::Disconnected) => return false,
                }
            },
            InputPolicy::Lockstep => match inputs.recv().await {
                Some(input) => {
                    *latest = input;
                    true
                }
                None => false,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub source: SourceSpec,
    pub mirror: bool,
    pub dark_threshold: f32,
    pub detector: DetectorConfig,
    pub game: GameKind,
    pub steering: LaneSteering,
}

/// Which extra reading a game steers with, on top of the tracked hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlMode {
    /// Pointing-finger vector from the hand contour.
    Pointer,
    /// Long-axis vector from the orientation detector.
    Orientation,
    /// Quadrant direction of the hand contour.
    Direction,
    /// Smoothed hand centre only.
    Hand,
    /// Centroid x of the brightest region, gestures from the hand detector.
    Motion,
}

impl ControlMode {
    fn for_game(game: GameKind, steering: LaneSteering) -> Self {
        match game {
            GameKind::Pointer => ControlMode::Pointer,
            GameKind::Orientation => ControlMode::Orientation,
            GameKind::Platformer => ControlMode::Direction,
            GameKind::Runner => match steering {
                LaneSteering::Displacement { .. } => ControlMode::Motion,
                LaneSteering::Swipe { .. } => ControlMode::Hand,
            },
            GameKind::Adventure => ControlMode::Hand,
        }
    }
}

/// Turns frames into control inputs for one game.
pub struct ControlTracker {
    mode: ControlMode,
    hands: HandDetector,
    orientation: OrientationDetector,
    motion: MotionTracker,
}

impl ControlTracker {
    pub fn new(game: GameKind, steering: LaneSteering, detector: DetectorConfig) -> Self {
        Self {
            mode: ControlMode::for_game(game, steering),
            hands: HandDetector::new(detector),
            orientation: OrientationDetector::new(),
            motion: MotionTracker::new(),
        }
    }

    pub fn process(&mut self, frame: &Frame) -> Result<ControlInput, VisionError> {
        let (width, height) = (frame.width, frame.height);
        let observed = self.hands.process_frame(&frame.data, width, height, None)?;
        let mut input = observed
            .as_ref()
            .map(|obs| ControlInput::from_hand(hand_input(obs)))
            .unwrap_or_default();

        match self.mode {
            ControlMode::Hand => {}
            ControlMode::Pointer => {
                input.pointing = observed
                    .as_ref()
                    .and_then(|obs| pointing_direction(&obs.contour, obs.center))
                    .map(|p| Vec2::new(p.vector.0 as f32, p.vector.1 as f32));
            }
            ControlMode::Direction => {
                input.direction = observed
                    .as_ref()
                    .and_then(|obs| hand_orientation(&obs.contour, obs.center))
                    .map(|o| o.direction);
            }
            ControlMode::Orientation => {
                if let Some(reading) = self.orientation.process_frame(&frame.data, width, height, None)? {
                    let (dx, dy) = reading.direction_vector;
                    input.pointing = Some(Vec2::new(dx as f32, dy as f32));
                    input.direction = Some(reading.direction);
                }
            }
            ControlMode::Motion => {
                let gesture = observed.as_ref().map(|obs| obs.gesture).unwrap_or_default();
                input.hand = self.motion.track(&frame.data, width, height)?.map(|x| HandInput {
                    position: Vec2::new(x as f32, height as f32 / 2.0),
                    frame_size: (width, height),
                    gesture,
                });
            }
        }
        Ok(input)
    }
}

fn hand_input(obs: &HandObservation) -> HandInput {
    HandInput {
        position: Vec2::new(obs.center.x as f32, obs.center.y as f32),
        frame_size: (obs.frame_width, obs.frame_height),
        gesture: obs.gesture,
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The frame source is opened on the engine thread; an open failure is
/// returned here. The receiver closes when the source is exhausted or keeps
/// failing.
pub async fn spawn_engine(settings: EngineSettings) -> Result<mpsc::Receiver<ControlInput>, EngineError> {
    let (tx, rx) = mpsc::channel::<ControlInput>(CHANNEL_CAPACITY);
    let (ready_tx, ready_rx) = oneshot::channel::<Result<String, SourceError>>();
    let game = settings.game;

    std::thread::Builder::new()
        .name("handplay-vision".into())
        .spawn(move || {
            let mut source = match settings.source.open() {
                Ok(source) => {
                    let _ = ready_tx.send(Ok(source.describe()));
                    source
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let mut tracker = ControlTracker::new(settings.game, settings.steering, settings.detector);
            run(source.as_mut(), &mut tracker, &settings, &tx);
            tracing::info!("engine thread exiting");
        })?;

    let description = ready_rx.await.map_err(|_| EngineError::ChannelClosed)??;
    tracing::info!(source = %description, %game, "engine started");
    Ok(rx)
}

fn run(
    source: &mut dyn FrameSource,
    tracker: &mut ControlTracker,
    settings: &EngineSettings,
    tx: &mpsc::Sender<ControlInput>,
) {
    let mut failures = 0u32;
    let mut dark_frames = 0u64;
    loop {
        // Every frame slot yields an input; unusable frames yield an empty one.
        let input = match source.next_frame() {
            Ok(mut frame) => {
                failures = 0;
                frame_input(&mut frame, tracker, settings, &mut dark_frames)
            }
            Err(SourceError::Exhausted) => {
                tracing::info!("frame source exhausted");
                break;
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(error = %e, failures, "capture failed; sending empty input");
                if failures >= MAX_CONSECUTIVE_ERRORS {
                    tracing::error!("too many consecutive capture failures; stopping engine");
                    break;
                }
                ControlInput::default()
            }
        };
        if tx.blocking_send(input).is_err() {
            // Game loop is gone.
            break;
        }
    }
}

fn frame_input(
    frame: &mut Frame,
    tracker: &mut ControlTracker,
    settings: &EngineSettings,
    dark_frames: &mut u64,
) -> ControlInput {
    if settings.mirror {
        frame.mirror();
    }
    if is_dark_frame(&rgb_to_luma(&frame.data), settings.dark_threshold) {
        *dark_frames += 1;
        tracing::debug!(sequence = frame.sequence, dark_frames = *dark_frames, "dark frame");
        return ControlInput::default();
    }
    tracker.process(frame).unwrap_or_else(|e| {
        tracing::warn!(error = %e, sequence = frame.sequence, "vision failed; sending empty input");
        ControlInput::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use handplay_core::Gesture;
    use std::collections::VecDeque;

    const SKIN: [u8; 3] = [200, 140, 100];

    fn still_detector() -> DetectorConfig {
        DetectorConfig {
            use_background: false,
            smoothing_window: 1,
            ..DetectorConfig::default()
        }
    }

    /// 160×120 frame with one filled rectangle on black.
    fn frame(rect: Option<(usize, usize, usize, usize)>, color: [u8; 3]) -> Frame {
        let (w, h) = (160usize, 120usize);
        let mut rgb = vec![0u8; w * h * 3];
        if let Some((x0, y0, x1, y1)) = rect {
            for y in y0..y1 {
                for x in x0..x1 {
                    rgb[(y * w + x) * 3..(y * w + x) * 3 + 3].copy_from_slice(&color);
                }
            }
        }
        Frame::from_rgb(rgb, w as u32, h as u32, 0).unwrap()
    }

    /// Frame source that plays back a fixed script of results.
    struct Scripted(VecDeque<Result<Frame, SourceError>>);

    impl FrameSource for Scripted {
        fn next_frame(&mut self) -> Result<Frame, SourceError> {
            self.0.pop_front().unwrap_or(Err(SourceError::Exhausted))
        }

        fn resolution(&self) -> (u32, u32) {
            (160, 120)
        }

        fn describe(&self) -> String {
            "scripted".into()
        }
    }

    fn settings(game: GameKind) -> EngineSettings {
        EngineSettings {
            source: SourceSpec::Replay {
                dir: PathBuf::new(),
                looping: false,
            },
            mirror: false,
            dark_threshold: 0.95,
            detector: still_detector(),
            game,
            steering: LaneSteering::SWIPE,
        }
    }

    fn run_script(game: GameKind, script: Vec<Result<Frame, SourceError>>) -> Vec<ControlInput> {
        let settings = settings(game);
        let mut tracker = ControlTracker::new(game, settings.steering, settings.detector);
        let (tx, mut rx) = mpsc::channel(64);
        run(&mut Scripted(script.into()), &mut tracker, &settings, &tx);
        drop(tx);
        let mut inputs = Vec::new();
        while let Ok(input) = rx.try_recv() {
            inputs.push(input);
        }
        inputs
    }

    #[test]
    fn test_unusable_frames_release_the_hand() {
        let hand = frame(Some((40, 30, 110, 100)), SKIN);
        let mut truncated = frame(Some((0, 0, 160, 120)), SKIN);
        truncated.data.truncate(100);
        let inputs = run_script(
            GameKind::Pointer,
            vec![
                Ok(hand.clone()),
                Ok(frame(None, SKIN)),
                Err(SourceError::Io(std::io::Error::other("dropped frame"))),
                Ok(hand),
                Ok(truncated),
            ],
        );

        assert_eq!(inputs.len(), 5);
        assert!(inputs[0].hand.is_some());
        // Dark frame.
        assert_eq!(inputs[1], ControlInput::default());
        // Capture error.
        assert_eq!(inputs[2], ControlInput::default());
        assert!(inputs[3].hand.is_some());
        // Vision error on a short buffer.
        assert_eq!(inputs[4], ControlInput::default());
    }

    #[test]
    fn test_engine_stops_after_repeated_capture_failures() {
        let script = (0..40)
            .map(|_| Err(SourceError::Io(std::io::Error::other("no signal"))))
            .collect();
        let inputs = run_script(GameKind::Adventure, script);
        // The last failure stops the engine instead of sending.
        assert_eq!(inputs.len(), MAX_CONSECUTIVE_ERRORS as usize - 1);
        assert!(inputs.iter().all(|i| *i == ControlInput::default()));
    }

    #[test]
    fn test_input_policy_per_source() {
        assert_eq!(settings(GameKind::Runner).source.input_policy(), InputPolicy::Lockstep);
        let camera = SourceSpec::Camera {
            device: "/dev/video0".into(),
            width: 640,
            height: 480,
            warmup_frames: 0,
        };
        assert_eq!(camera.input_policy(), InputPolicy::Latest);
    }

    fn numbered(n: u32) -> ControlInput {
        ControlInput {
            hand: Some(HandInput {
                position: Vec2::new(n as f32, 0.0),
                frame_size: (160, 120),
                gesture: Gesture::OpenPalm,
            }),
            ..ControlInput::default()
        }
    }

    #[tokio::test]
    async fn test_lockstep_takes_every_input_in_order() {
        let (tx, mut rx) = mpsc::channel(8);
        for n in 0..3 {
            tx.send(numbered(n)).await.unwrap();
        }
        drop(tx);

        let mut latest = ControlInput::default();
        for n in 0..3 {
            assert!(InputPolicy::Lockstep.pull(&mut rx, &mut latest).await);
            assert_eq!(latest, numbered(n));
        }
        assert!(!InputPolicy::Lockstep.pull(&mut rx, &mut latest).await);
    }

    #[tokio::test]
    async fn test_latest_keeps_newest_input() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut latest = ControlInput::default();
        assert!(InputPolicy::Latest.pull(&mut rx, &mut latest).await);
        assert_eq!(latest, ControlInput::default());

        for n in 0..3 {
            tx.send(numbered(n)).await.unwrap();
        }
        assert!(InputPolicy::Latest.pull(&mut rx, &mut latest).await);
        assert_eq!(latest, numbered(2));

        drop(tx);
        assert!(!InputPolicy::Latest.pull(&mut rx, &mut latest).await);
    }

    #[test]
    fn test_tracker_reports_hand() {
        let mut tracker = ControlTracker::new(GameKind::Adventure, LaneSteering::SWIPE, still_detector());
        let input = tracker.process(&frame(Some((40, 30, 110, 100)), SKIN)).unwrap();
        let hand = input.hand.unwrap();
        assert!((hand.position.x - 75.0).abs() <= 1.0, "{:?}", hand.position);
        assert!((hand.position.y - 65.0).abs() <= 1.0, "{:?}", hand.position);
        assert_eq!(hand.frame_size, (160, 120));
        assert_eq!(hand.gesture, Gesture::ClosedFist);
        assert!(!input.restart);
        assert_eq!(input.pointing, None);
    }

    #[test]
    fn test_tracker_without_hand_is_empty() {
        let mut tracker = ControlTracker::new(GameKind::Pointer, LaneSteering::SWIPE, still_detector());
        let input = tracker.process(&frame(None, SKIN)).unwrap();
        assert_eq!(input, ControlInput::default());
    }

    #[test]
    fn test_motion_mode_tracks_bright_region() {
        let mut tracker =
            ControlTracker::new(GameKind::Runner, LaneSteering::DISPLACEMENT, still_detector());
        let input = tracker
            .process(&frame(Some((100, 20, 140, 100)), [250, 250, 250]))
            .unwrap();
        let hand = input.hand.unwrap();
        assert!((hand.position.x - 120.0).abs() <= 1.0, "{:?}", hand.position);
        assert_eq!(hand.position.y, 60.0);
        assert_eq!(hand.gesture, Gesture::Unknown);
    }

    #[test]
    fn test_control_modes() {
        assert_eq!(ControlMode::for_game(GameKind::Platformer, LaneSteering::SWIPE), ControlMode::Direction);
        assert_eq!(ControlMode::for_game(GameKind::Orientation, LaneSteering::SWIPE), ControlMode::Orientation);
        assert_eq!(ControlMode::for_game(GameKind::Runner, LaneSteering::SWIPE), ControlMode::Hand);
        assert_eq!(ControlMode::for_game(GameKind::Runner, LaneSteering::DISPLACEMENT), ControlMode::Motion);
    }

    #[tokio::test]
    async fn test_replay_engine_streams_until_exhausted() {
        let dir = std::env::temp_dir().join(format!("handplay-engine-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for (i, rect) in [Some((40, 30, 110, 100)), None, Some((20, 30, 90, 100))].into_iter().enumerate() {
            let f = frame(rect, SKIN);
            image::RgbImage::from_raw(f.width, f.height, f.data)
                .unwrap()
                .save(dir.join(format!("{i:02}.png")))
                .unwrap();
        }

        let mut rx = spawn_engine(EngineSettings {
            source: SourceSpec::Replay {
                dir: dir.clone(),
                looping: false,
            },
            mirror: true,
            dark_threshold: 0.95,
            detector: still_detector(),
            game: GameKind::Adventure,
            steering: LaneSteering::SWIPE,
        })
        .await
        .unwrap();

        let mut inputs = Vec::new();
        while let Some(input) = rx.recv().await {
            inputs.push(input);
        }
        std::fs::remove_dir_all(&dir).unwrap();

        // One input per image; the all-black frame reads as no hand.
        assert_eq!(inputs.len(), 3);
        // Mirrored: the blob at x 40..110 lands at 50..120.
        let first = inputs[0].hand.unwrap();
        assert!((first.position.x - 85.0).abs() <= 1.0, "{:?}", first.position);
        assert_eq!(inputs[1], ControlInput::default());
        let third = inputs[2].hand.unwrap();
        assert!((third.position.x - 105.0).abs() <= 1.0, "{:?}", third.position);
    }

    #[tokio::test]
    async fn test_missing_replay_dir_fails_fast() {
        let err = spawn_engine(EngineSettings {
            source: SourceSpec::Replay {
                dir: PathBuf::from("/nonexistent/handplay-frames"),
                looping: false,
            },
            mirror: false,
            dark_threshold: 0.95,
            detector: still_detector(),
            game: GameKind::Runner,
            steering: LaneSteering::SWIPE,
        })
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::Source(SourceError::Io(_))));
    }
}
