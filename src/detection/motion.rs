/// Frame-difference ball strategy
///
/// Compares the current luma against the previously analysed frame and reports
/// round regions that changed. Only useful once a reference frame exists.
///
/// A changed pixel only counts when the current frame is further from the
/// scene background than the reference was. The spot an object just left
/// returns to background and is ignored; the spot it arrived at is kept.
use image::GrayImage;

use super::blob::{SampledMask, MIN_BLOB_CELLS};
use super::strategy::{BallStrategy, Detection, DetectorKind, StrategyInput};
use crate::calibration::luma_histogram;
use crate::config::EngineConfig;
use crate::frame::CanonicalFrame;
use crate::geometry::Region;

/// Motion blobs are inherently noisier than colour matches
const MOTION_CONFIDENCE: f32 = 0.85;

pub struct MotionStrategy {
    threshold: u8,
    min_radius: f32,
    max_radius: f32,
}

impl MotionStrategy {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            threshold: config.motion_threshold,
            min_radius: config.min_ball_radius,
            max_radius: config.max_ball_radius,
        }
    }
}

impl BallStrategy for MotionStrategy {
    fn detect(&self, input: &StrategyInput<'_>) -> Option<Detection> {
        let previous = input.previous_luma?;
        motion_blobs(
            input.frame,
            previous,
            self.threshold,
            input.params.stride,
            (self.min_radius, self.max_radius),
        )
        .into_iter()
        .next()
    }

    fn name(&self) -> &'static str {
        "MotionStrategy"
    }
}

/// All changed regions between `previous` and the frame's luma, in source
/// coordinates, ordered by confidence descending.
///
/// Returns nothing when the reference has different dimensions (the stream
/// changed resolution).
pub fn motion_blobs(
    frame: &CanonicalFrame,
    previous: &GrayImage,
    threshold: u8,
    stride: u32,
    radius_range: (f32, f32),
) -> Vec<Detection> {
    let current = frame.luma();
    if current.dimensions() != previous.dimensions() {
        tracing::debug!(
            "Motion reference is {:?}, frame is {:?}; skipping",
            previous.dimensions(),
            current.dimensions()
        );
        return Vec::new();
    }

    let background = background_luma(current);
    let mask = SampledMask::build((0, 0, frame.width(), frame.height()), stride, |x, y| {
        let now = current.get_pixel(x, y)[0];
        let before = previous.get_pixel(x, y)[0];
        let arrived = now.abs_diff(background) > before.abs_diff(background);
        arrived && now.abs_diff(before) > threshold
    });

    let scale = frame.scale();
    let (min_radius, max_radius) = radius_range;
    let mut detections: Vec<Detection> = mask
        .blobs(MIN_BLOB_CELLS)
        .into_iter()
        .filter(|blob| {
            let radius = blob.radius_px() * scale;
            radius >= min_radius && radius <= max_radius
        })
        .map(|blob| {
            let bounds = Region::new(
                blob.left * scale,
                blob.top * scale,
                blob.width_px() * scale,
                blob.height_px() * scale,
            );
            Detection::new(
                blob.center_x * scale,
                blob.center_y * scale,
                MOTION_CONFIDENCE * blob.roundness(),
                DetectorKind::Motion,
            )
            .with_radius(blob.radius_px() * scale)
            .with_bounds(bounds)
        })
        .collect();

    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    detections
}

/// Median luma; the ball never covers most of the frame
fn background_luma(luma: &GrayImage) -> u8 {
    let histogram = luma_histogram(luma);
    let half = histogram.iter().map(|&c| c as u64).sum::<u64>() / 2;

    let mut seen = 0u64;
    for (value, &count) in histogram.iter().enumerate() {
        seen += count as u64;
        if seen > half {
            return value as u8;
        }
    }
    0
}
