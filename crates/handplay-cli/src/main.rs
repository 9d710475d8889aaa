use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use handplay_core::orientation::pointing_direction;
use handplay_core::{DetectorConfig, Gesture, HandDetector, HandLandmarks, Point};
use handplay_games::{ControlInput, GameKind, GameStatus, LaneSteering};
use handplay_hw::{Camera, FrameSource, ImageSequence};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;

use config::Config;
use engine::{EngineSettings, SourceSpec};

#[derive(Parser)]
#[command(name = "handplay", about = "Gesture-controlled arcade games")]
struct Cli {
    /// TOML configuration file; HANDPLAY_* variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SteeringArg {
    /// Net movement over the last few frames
    Swipe,
    /// Bright-region jump between consecutive frames
    Displacement,
}

impl From<SteeringArg> for LaneSteering {
    fn from(arg: SteeringArg) -> Self {
        match arg {
            SteeringArg::Swipe => LaneSteering::SWIPE,
            SteeringArg::Displacement => LaneSteering::DISPLACEMENT,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Play a game with the webcam or a directory of recorded frames
    Play {
        /// platformer, pointer, orientation, runner or adventure
        game: GameKind,
        /// Replay still images from this directory instead of the camera
        #[arg(long)]
        frames: Option<PathBuf>,
        /// Restart the replay when it runs out
        #[arg(long = "loop")]
        looping: bool,
        /// Stop after this many game ticks
        #[arg(long)]
        ticks: Option<u64>,
        /// RNG seed for the game layout
        #[arg(long)]
        seed: Option<u64>,
        /// Lane-change detection for the runner
        #[arg(long, value_enum, default_value = "swipe")]
        steering: SteeringArg,
    },
    /// List V4L2 capture devices
    Devices,
    /// Run hand detection over a directory of images
    Detect {
        dir: PathBuf,
        /// Write each segmentation mask as PNG into this directory
        #[arg(long)]
        dump_masks: Option<PathBuf>,
    },
    /// Classify a JSON file of 21 hand landmarks
    Landmarks { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            game,
            frames,
            looping,
            ticks,
            seed,
            steering,
        } => {
            let config = Config::load(cli.config.as_deref())?;
            let source = match frames {
                Some(dir) => SourceSpec::Replay { dir, looping },
                None => SourceSpec::Camera {
                    device: config.camera_device.clone(),
                    width: config.frame_width,
                    height: config.frame_height,
                    warmup_frames: config.warmup_frames,
                },
            };
            let seed = seed.or(config.seed).unwrap_or_else(rand::random);
            play(&config, game, source, steering.into(), seed, ticks).await
        }
        Commands::Devices => {
            list_devices();
            Ok(())
        }
        Commands::Detect { dir, dump_masks } => {
            let config = Config::load(cli.config.as_deref())?;
            detect(&dir, dump_masks.as_deref(), config.detector)
        }
        Commands::Landmarks { file } => landmarks(&file),
    }
}

#[derive(Serialize)]
struct PlayReport {
    game: &'static str,
    seed: u64,
    ticks: u64,
    #[serde(flatten)]
    status: GameStatus,
}

async fn play(
    config: &Config,
    kind: GameKind,
    source: SourceSpec,
    steering: LaneSteering,
    seed: u64,
    max_ticks: Option<u64>,
) -> Result<()> {
    let policy = source.input_policy();
    let mut inputs = engine::spawn_engine(EngineSettings {
        source,
        mirror: config.mirror,
        dark_threshold: config.dark_threshold,
        detector: config.detector,
        game: kind,
        steering,
    })
    .await
    .context("failed to start vision engine")?;

    let mut game = kind.create(seed, steering);
    let dt = config.tick_seconds();
    tracing::info!(game = game.name(), seed, tick_rate = config.tick_rate, ?policy, "game started");

    let mut interval = tokio::time::interval(Duration::from_secs_f32(dt));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut latest = ControlInput::default();
    let mut ticks = 0u64;
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut ctrl_c => {
                tracing::info!("interrupted");
                break;
            }
        }

        if !policy.pull(&mut inputs, &mut latest).await {
            tracing::info!(ticks, "frame source finished");
            break;
        }

        let phase = game.status().phase;
        game.update(&latest, dt);
        for event in game.drain_events() {
            tracing::info!(game = game.name(), ?event, "game event");
        }
        let status = game.status();
        if status.phase != phase {
            tracing::info!(from = ?phase, to = ?status.phase, score = status.score, "phase changed");
        }

        ticks += 1;
        if max_ticks.is_some_and(|max| ticks >= max) {
            break;
        }
    }

    let report = PlayReport {
        game: game.name(),
        seed,
        ticks,
        status: game.status(),
    };
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn list_devices() {
    let devices = Camera::list_devices();
    if devices.is_empty() {
        println!("No V4L2 capture devices found");
        return;
    }
    for d in devices {
        println!("{}\t{} (driver {}, bus {})", d.path, d.name, d.driver, d.bus);
    }
}

/// One line of `detect` output.
#[derive(Serialize)]
struct Detection {
    file: String,
    gesture: Option<Gesture>,
    center: Option<Point>,
    area: Option<f64>,
    /// Unit vector from the hand centre toward the fingertip.
    pointing: Option<(f64, f64)>,
}

fn detect(dir: &Path, dump_masks: Option<&Path>, detector: DetectorConfig) -> Result<()> {
    // Still images share no background and should not be averaged together.
    let mut detector = HandDetector::new(DetectorConfig {
        use_background: false,
        smoothing_window: 1,
        ..detector
    });
    let mut frames = ImageSequence::open(dir, false)?;
    if let Some(out) = dump_masks {
        std::fs::create_dir_all(out).with_context(|| format!("failed to create {}", out.display()))?;
    }

    while let Some(path) = frames.peek_path().map(Path::to_path_buf) {
        let frame = frames.next_frame()?;
        let observed = detector.process_frame(&frame.data, frame.width, frame.height, None)?;
        let line = Detection {
            file: path.display().to_string(),
            gesture: observed.as_ref().map(|o| o.gesture),
            center: observed.as_ref().map(|o| o.center),
            area: observed.as_ref().map(|o| o.area),
            pointing: observed
                .as_ref()
                .and_then(|o| pointing_direction(&o.contour, o.center))
                .map(|p| p.vector),
        };
        println!("{}", serde_json::to_string(&line)?);

        if let Some(out) = dump_masks {
            let mask = detector.segment(&frame.data, frame.width, frame.height, None)?;
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "frame".to_string());
            let target = out.join(format!("{stem}_mask.png"));
            mask.to_image()
                .save(&target)
                .with_context(|| format!("failed to write {}", target.display()))?;
        }
    }
    Ok(())
}

fn landmarks(file: &Path) -> Result<()> {
    let json = std::fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;
    let hand = HandLandmarks::from_json(&json)
        .with_context(|| format!("invalid landmark file {}", file.display()))?;
    let report = serde_json::json!({
        "file": file.display().to_string(),
        "gesture": hand.recognize(),
        "fingers_up": hand.count_fingers_up(),
    });
    println!("{report}");
    Ok(())
}
