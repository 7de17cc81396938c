use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{bail, Context, Result};
use crossbeam_channel::bounded;
use image::{Rgb, RgbImage};
use rand::Rng;

use bounceback_vision::{Engine, EngineConfig, FrameInput, Region};

/// Frames buffered between the decoder thread and the analysis loop
const FRAME_QUEUE_DEPTH: usize = 4;

const SYNTHETIC_WIDTH: u32 = 320;
const SYNTHETIC_HEIGHT: u32 = 240;

#[derive(Debug, Default)]
struct CliOptions {
    config: Option<PathBuf>,
    mode: Option<String>,
    goal: Option<Region>,
    calibrate: Option<PathBuf>,
    synthetic: Option<usize>,
    frames: Vec<PathBuf>,
}

/// A decoded frame handed from the producer to the analysis loop
struct FrameJob {
    label: String,
    image: RgbImage,
}

fn main() -> Result<()> {
    initialize_tracing();

    let options = parse_args(std::env::args().skip(1))?;
    if options.frames.is_empty() && options.synthetic.is_none() {
        eprintln!("Usage: bounceback-vision [--config FILE] [--mode fast|balanced|accurate]");
        eprintln!("                         [--goal x,y,w,h] [--calibrate FILE]");
        eprintln!("                         [--synthetic N] [FRAME ...]");
        std::process::exit(2);
    }

    let config = match &options.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::load_or_default().context("Failed to load config")?,
    };
    let engine = Engine::new(config);

    if let Some(mode) = &options.mode {
        engine.set_mode(mode)?;
    }

    if let Some(path) = &options.calibrate {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read calibration frame {}", path.display()))?;
        engine
            .calibrate(&FrameInput::Encoded(&bytes))
            .with_context(|| format!("Failed to calibrate from {}", path.display()))?;
    }

    let goal = options.goal.or_else(|| {
        options
            .synthetic
            .map(|_| Region::new(200.0, 60.0, 120.0, 120.0))
    });

    // Decode on a separate thread so capture overlaps analysis
    let (tx, rx) = bounded::<FrameJob>(FRAME_QUEUE_DEPTH);
    let frames = options.frames.clone();
    let synthetic = options.synthetic;
    let producer = thread::spawn(move || {
        if let Some(count) = synthetic {
            let mut rng = rand::thread_rng();
            for i in 0..count {
                let job = FrameJob {
                    label: format!("synthetic #{}", i),
                    image: synthetic_frame(i, &mut rng),
                };
                if tx.send(job).is_err() {
                    return;
                }
            }
        }
        for path in frames {
            match load_frame(&path) {
                Ok(image) => {
                    let job = FrameJob {
                        label: path.display().to_string(),
                        image,
                    };
                    if tx.send(job).is_err() {
                        return;
                    }
                }
                Err(e) => tracing::warn!("Skipping {}: {:#}", path.display(), e),
            }
        }
    });

    for job in rx {
        let frame = FrameInput::from(&job.image);
        let goal = goal.unwrap_or_else(|| {
            Region::new(0.0, 0.0, job.image.width() as f32, job.image.height() as f32)
        });

        let ball = engine.detect_ball(&frame)?;
        let targets = engine.detect_targets(&frame, goal)?;
        let impact = engine.detect_impact(ball.as_ref(), &targets, goal);

        match &ball {
            Some(ball) => tracing::debug!(
                "{}: ball ({:.1}, {:.1}) conf {:.2}, {} target(s){}",
                job.label,
                ball.x,
                ball.y,
                ball.confidence,
                targets.len(),
                if impact { ", IMPACT" } else { "" }
            ),
            None => tracing::debug!("{}: no ball, {} target(s)", job.label, targets.len()),
        }
    }

    if producer.join().is_err() {
        bail!("Frame producer thread panicked");
    }

    let stats = engine.statistics();
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliOptions> {
    let mut options = CliOptions::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .with_context(|| format!("{} requires a value", flag))
        };
        match arg.as_str() {
            "--config" => options.config = Some(PathBuf::from(value("--config")?)),
            "--mode" => options.mode = Some(value("--mode")?),
            "--goal" => options.goal = Some(parse_region(&value("--goal")?)?),
            "--calibrate" => options.calibrate = Some(PathBuf::from(value("--calibrate")?)),
            "--synthetic" => {
                let raw = value("--synthetic")?;
                options.synthetic = Some(
                    raw.parse()
                        .with_context(|| format!("Invalid frame count: {}", raw))?,
                );
            }
            flag if flag.starts_with("--") => bail!("Unknown option: {}", flag),
            _ => options.frames.push(PathBuf::from(&arg)),
        }
    }

    Ok(options)
}

/// Parse `x,y,w,h`
fn parse_region(raw: &str) -> Result<Region> {
    let parts: Vec<f32> = raw
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Invalid region: {}", raw))?;

    match parts.as_slice() {
        [x, y, w, h] => Ok(Region::new(*x, *y, *w, *h)),
        _ => bail!("Region needs 4 values (x,y,w,h), got {}", parts.len()),
    }
}

fn load_frame(path: &Path) -> Result<RgbImage> {
    let image = image::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(image.to_rgb8())
}

/// Dark wall with one blue target pad and an orange ball bouncing between
/// the left edge and the pad, with a little positional jitter.
fn synthetic_frame(index: usize, rng: &mut impl Rng) -> RgbImage {
    let mut img = RgbImage::from_pixel(SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, Rgb([30, 30, 34]));

    for y in 108..132 {
        for x in 250..274 {
            img.put_pixel(x, y, Rgb([20, 60, 230]));
        }
    }

    // Triangle wave over 24 frames between x = 20 and x = 242
    let phase = (index % 24) as f32 / 12.0;
    let t = if phase <= 1.0 { phase } else { 2.0 - phase };
    let cx = (20.0 + t * 222.0) as i32 + rng.gen_range(-2..=2);
    let cy = 120 + rng.gen_range(-2..=2);
    let radius = 9;

    for y in (cy - radius)..=(cy + radius) {
        for x in (cx - radius)..=(cx + radius) {
            if (x - cx).pow(2) + (y - cy).pow(2) <= radius * radius
                && x >= 0
                && y >= 0
                && (x as u32) < SYNTHETIC_WIDTH
                && (y as u32) < SYNTHETIC_HEIGHT
            {
                img.put_pixel(x as u32, y as u32, Rgb([255, 120, 0]));
            }
        }
    }
    img
}

/// Log to the console and to a daily-rotated file in the user config folder:
/// - macOS: ~/Library/Application Support/BounceBackVision/logs/
/// - Windows: %APPDATA%/BounceBackVision/logs/
/// - Linux: ~/.config/BounceBackVision/logs/
fn initialize_tracing() {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = dirs::config_dir()
        .map(|dir| dir.join("BounceBackVision").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(&log_dir, "bounceback-vision.log");

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    // Console goes to stderr; stdout carries the JSON statistics
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    tracing::debug!("Log directory: {}", log_dir.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        let options = parse_args(args(&[
            "--mode", "fast", "--goal", "10,20,30,40", "--synthetic", "5", "a.png", "b.jpg",
        ]))
        .unwrap();
        assert_eq!(options.mode.as_deref(), Some("fast"));
        assert_eq!(options.goal, Some(Region::new(10.0, 20.0, 30.0, 40.0)));
        assert_eq!(options.synthetic, Some(5));
        assert_eq!(options.frames.len(), 2);
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse_args(args(&["--goal"])).is_err());
        assert!(parse_args(args(&["--goal", "1,2,3"])).is_err());
        assert!(parse_args(args(&["--synthetic", "many"])).is_err());
        assert!(parse_args(args(&["--verbose"])).is_err());
    }

    #[test]
    fn test_synthetic_frames_hit_the_pad() {
        let engine = Engine::default();
        let goal = Region::new(200.0, 60.0, 120.0, 120.0);
        let mut rng = rand::thread_rng();

        let mut impacts = 0;
        for i in 0..48 {
            let img = synthetic_frame(i, &mut rng);
            let frame = FrameInput::from(&img);
            let ball = engine.detect_ball(&frame).unwrap();
            let targets = engine.detect_targets(&frame, goal).unwrap();
            assert_eq!(targets.len(), 1);
            if engine.detect_impact(ball.as_ref(), &targets, goal) {
                impacts += 1;
            }
        }
        assert!(impacts >= 2, "expected one impact per bounce, got {}", impacts);
    }
}
