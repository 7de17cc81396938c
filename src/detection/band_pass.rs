/// Band-pass ball strategy
///
/// Difference of box means computed from an integral image: a narrow box
/// minus a wide box keeps structures about the size of a ball and suppresses
/// both pixel noise and slow illumination gradients. This is the spatial
/// equivalent of an FFT band-pass filter, without the transform.
use rayon::prelude::*;

use super::blob::{SampledMask, MIN_BLOB_CELLS};
use super::strategy::{BallStrategy, Detection, DetectorKind, StrategyInput};
use crate::config::EngineConfig;
use crate::frame::CanonicalFrame;

const INNER_RADIUS: u32 = 1;
const MIN_OUTER_RADIUS: f32 = 8.0;
const MAX_OUTER_RADIUS: f32 = 64.0;
/// Responses below this are never foreground, even on a flat frame
const MIN_RESPONSE: f32 = 24.0;
const BAND_PASS_CONFIDENCE: f32 = 0.8;

pub struct BandPassStrategy {
    enabled: bool,
    min_radius: f32,
    max_radius: f32,
}

impl BandPassStrategy {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            enabled: config.enable_band_pass_strategy,
            min_radius: config.min_ball_radius,
            max_radius: config.max_ball_radius,
        }
    }
}

impl BallStrategy for BandPassStrategy {
    fn detect(&self, input: &StrategyInput<'_>) -> Option<Detection> {
        let frame = input.frame;
        let scale = frame.scale();
        let integral = IntegralImage::from_frame(frame);
        let outer = ((self.max_radius / scale).clamp(MIN_OUTER_RADIUS, MAX_OUTER_RADIUS)) as u32;
        let stride = input.params.stride.max(1);

        let response = |x: u32, y: u32| {
            (integral.box_mean(x, y, INNER_RADIUS) - integral.box_mean(x, y, outer)).abs()
        };

        let samples: Vec<f32> = (0..frame.height())
            .into_par_iter()
            .step_by(stride as usize)
            .flat_map_iter(|y| {
                (0..frame.width())
                    .step_by(stride as usize)
                    .map(move |x| response(x, y))
            })
            .collect();
        if samples.is_empty() {
            return None;
        }

        let n = samples.len() as f32;
        let mean = samples.iter().sum::<f32>() / n;
        let variance = samples.iter().map(|r| (r - mean).powi(2)).sum::<f32>() / n;
        let threshold = (mean + 3.0 * variance.sqrt()).max(MIN_RESPONSE);

        let mask = SampledMask::build((0, 0, frame.width(), frame.height()), stride, |x, y| {
            response(x, y) > threshold
        });

        mask.blobs(MIN_BLOB_CELLS)
            .into_iter()
            .filter(|blob| {
                let radius = blob.radius_px() * scale;
                radius >= self.min_radius && radius <= self.max_radius
            })
            .map(|blob| {
                Detection::new(
                    blob.center_x * scale,
                    blob.center_y * scale,
                    BAND_PASS_CONFIDENCE * blob.roundness(),
                    DetectorKind::BandPass,
                )
                .with_radius(blob.radius_px() * scale)
            })
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }

    fn name(&self) -> &'static str {
        "BandPassStrategy"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Summed-area table over the luma plane
struct IntegralImage {
    width: u32,
    height: u32,
    sums: Vec<u64>,
}

impl IntegralImage {
    fn from_frame(frame: &CanonicalFrame) -> Self {
        let luma = frame.luma();
        let (width, height) = luma.dimensions();
        let stride = width as usize + 1;
        let mut sums = vec![0u64; stride * (height as usize + 1)];

        for y in 0..height as usize {
            let mut row_sum = 0u64;
            for x in 0..width as usize {
                row_sum += luma.get_pixel(x as u32, y as u32)[0] as u64;
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row_sum;
            }
        }

        Self { width, height, sums }
    }

    /// Mean of the box of half-size `radius` around (x, y), clipped to the image
    fn box_mean(&self, x: u32, y: u32, radius: u32) -> f32 {
        let x0 = x.saturating_sub(radius) as usize;
        let y0 = y.saturating_sub(radius) as usize;
        let x1 = (x + radius + 1).min(self.width) as usize;
        let y1 = (y + radius + 1).min(self.height) as usize;
        let stride = self.width as usize + 1;

        let total = self.sums[y1 * stride + x1] + self.sums[y0 * stride + x0]
            - self.sums[y0 * stride + x1]
            - self.sums[y1 * stride + x0];
        let count = ((x1 - x0) * (y1 - y0)).max(1);
        total as f32 / count as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationProfile;
    use crate::frame::FrameInput;
    use crate::mode::ProcessingMode;
    use image::{Rgb, RgbImage};

    fn enabled_config() -> EngineConfig {
        EngineConfig {
            enable_band_pass_strategy: true,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_disabled_by_default() {
        assert!(!BandPassStrategy::new(&EngineConfig::default()).is_enabled());
        assert!(BandPassStrategy::new(&enabled_config()).is_enabled());
    }

    #[test]
    fn test_box_mean() {
        let img = RgbImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                Rgb([0, 0, 0])
            } else {
                Rgb([200, 200, 200])
            }
        });
        let frame = CanonicalFrame::from_input(&FrameInput::from(&img), 0).unwrap();
        let integral = IntegralImage::from_frame(&frame);
        assert_eq!(integral.box_mean(1, 1, 1), 0.0);
        assert!((integral.box_mean(8, 8, 1) - 200.0).abs() < 1.0);
        // Clipped box at the corner covers 2x2 pixels
        assert!((integral.box_mean(9, 9, 1) - 200.0).abs() < 1.0);
    }

    #[test]
    fn test_finds_bright_disc() {
        let mut img = RgbImage::from_pixel(200, 150, Rgb([30, 30, 30]));
        for y in 60..=90 {
            for x in 65..=95 {
                if (x - 80i32).pow(2) + (y - 75i32).pow(2) <= 100 {
                    img.put_pixel(x as u32, y as u32, Rgb([240, 240, 240]));
                }
            }
        }
        let frame = CanonicalFrame::from_input(&FrameInput::from(&img), 0).unwrap();
        let calibration = CalibrationProfile::default();
        let strategy = BandPassStrategy::new(&enabled_config());

        let detection = strategy
            .detect(&StrategyInput {
                frame: &frame,
                previous_luma: None,
                calibration: &calibration,
                params: ProcessingMode::Accurate.params(),
            })
            .unwrap();
        assert_eq!(detection.kind, DetectorKind::BandPass);
        assert!((detection.x - 80.0).abs() < 3.0);
        assert!((detection.y - 75.0).abs() < 3.0);
        assert!(detection.confidence <= BAND_PASS_CONFIDENCE);
    }

    #[test]
    fn test_flat_frame_has_no_response() {
        let img = RgbImage::from_pixel(64, 64, Rgb([120, 120, 120]));
        let frame = CanonicalFrame::from_input(&FrameInput::from(&img), 0).unwrap();
        let calibration = CalibrationProfile::default();
        let strategy = BandPassStrategy::new(&enabled_config());
        assert!(strategy
            .detect(&StrategyInput {
                frame: &frame,
                previous_luma: None,
                calibration: &calibration,
                params: ProcessingMode::Balanced.params(),
            })
            .is_none());
    }
}
