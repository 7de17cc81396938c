/// Frame quality analysis
///
/// Cheap per-frame measurements a host can use to pick a processing mode:
/// brightness, contrast, sharpness and how much of the frame is ball-coloured.
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;

use crate::calibration::CalibrationProfile;
use crate::config::ColorRange;
use crate::frame::CanonicalFrame;
use crate::mode::ProcessingMode;

/// Frames darker than this (mean luma) need the slower, more sensitive mode
const DARK_MEAN_LUMA: f32 = 60.0;
/// Laplacian variance below this is treated as motion blur / defocus
const BLUR_SHARPNESS: f32 = 50.0;
/// Source frames with a longer side than this default to the fast mode
const LARGE_FRAME_SIDE: u32 = 1920;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameAnalysis {
    /// Source dimensions
    pub width: u32,
    pub height: u32,
    /// Mean luma (0-255)
    pub mean_brightness: f32,
    /// Luma standard deviation
    pub contrast: f32,
    /// Variance of the 4-neighbour Laplacian
    pub sharpness: f32,
    /// Fraction of pixels inside the ball colour window
    pub ball_color_fraction: f32,
    pub analysis_time_ms: f64,
    pub suggested_mode: ProcessingMode,
}

impl FrameAnalysis {
    pub fn is_dark(&self) -> bool {
        self.mean_brightness < DARK_MEAN_LUMA
    }

    pub fn is_blurred(&self) -> bool {
        self.sharpness < BLUR_SHARPNESS
    }
}

/// Analyse a frame. `started` is when the caller began handling it, so the
/// reported time includes frame conversion.
pub fn analyze(
    frame: &CanonicalFrame,
    ball_color: &ColorRange,
    calibration: &CalibrationProfile,
    started: Instant,
) -> FrameAnalysis {
    let (mean_brightness, contrast) = luma_mean_std(frame);
    let sharpness = laplacian_variance(frame);
    let ball_color_fraction = color_fraction(frame, ball_color, calibration);
    let (width, height) = frame.source_dimensions();

    let suggested_mode = if mean_brightness < DARK_MEAN_LUMA || sharpness < BLUR_SHARPNESS {
        ProcessingMode::Accurate
    } else if width.max(height) > LARGE_FRAME_SIDE {
        ProcessingMode::Fast
    } else {
        ProcessingMode::Balanced
    };

    FrameAnalysis {
        width,
        height,
        mean_brightness,
        contrast,
        sharpness,
        ball_color_fraction,
        analysis_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        suggested_mode,
    }
}

fn luma_mean_std(frame: &CanonicalFrame) -> (f32, f32) {
    let raw = frame.luma().as_raw();
    if raw.is_empty() {
        return (0.0, 0.0);
    }
    let n = raw.len() as f64;
    let (sum, sum_sq) = raw
        .par_iter()
        .map(|&v| (v as f64, (v as f64) * (v as f64)))
        .reduce(|| (0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1));
    let mean = sum / n;
    let variance = (sum_sq / n - mean * mean).max(0.0);
    (mean as f32, variance.sqrt() as f32)
}

/// Variance of the Laplacian over interior pixels, rows in parallel
fn laplacian_variance(frame: &CanonicalFrame) -> f32 {
    let luma = frame.luma();
    let (width, height) = luma.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let row_len = width as usize;
    let raw = luma.as_raw();
    let (sum, sum_sq, count) = (1..height as usize - 1)
        .into_par_iter()
        .map(|y| {
            let above = &raw[(y - 1) * row_len..y * row_len];
            let row = &raw[y * row_len..(y + 1) * row_len];
            let below = &raw[(y + 1) * row_len..(y + 2) * row_len];

            let mut sum = 0.0f64;
            let mut sum_sq = 0.0f64;
            for x in 1..row_len - 1 {
                let lap = 4.0 * row[x] as f64
                    - row[x - 1] as f64
                    - row[x + 1] as f64
                    - above[x] as f64
                    - below[x] as f64;
                sum += lap;
                sum_sq += lap * lap;
            }
            (sum, sum_sq, (row_len - 2) as u64)
        })
        .reduce(|| (0.0, 0.0, 0), |a, b| (a.0 + b.0, a.1 + b.1, a.2 + b.2));

    let n = count as f64;
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0) as f32
}

fn color_fraction(
    frame: &CanonicalFrame,
    color: &ColorRange,
    calibration: &CalibrationProfile,
) -> f32 {
    let rgb = frame.rgb();
    let total = rgb.width() as usize * rgb.height() as usize;
    if total == 0 {
        return 0.0;
    }

    let matching: usize = rgb
        .as_raw()
        .par_chunks(3)
        .filter(|px| {
            let (h, s, v) = calibration.corrected_hsv([px[0], px[1], px[2]]);
            color.matches(h, s, v)
        })
        .count();
    matching as f32 / total as f32
}
