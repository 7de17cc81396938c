/// Low-latency soccer ball detector
///
/// Single pass over a coarse grid looking for a bright, weakly saturated round
/// blob (a white ball). Independent of the unified detector and free to
/// disagree with it.
use super::blob::{SampledMask, MIN_BLOB_CELLS};
use super::strategy::{BallStrategy, Detection, DetectorKind, StrategyInput};
use crate::config::EngineConfig;

/// Never sample finer than this, whatever the mode
const MIN_STRIDE: u32 = 3;
const MAX_SATURATION: f32 = 0.35;

pub struct SimpleBallDetector {
    min_radius: f32,
    max_radius: f32,
}

impl SimpleBallDetector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            min_radius: config.min_ball_radius,
            max_radius: config.max_ball_radius,
        }
    }
}

impl BallStrategy for SimpleBallDetector {
    fn detect(&self, input: &StrategyInput<'_>) -> Option<Detection> {
        let frame = input.frame;
        let rgb = frame.rgb();
        let luma = frame.luma();
        let calibration = input.calibration;
        let bright = calibration.bright_threshold();

        let mask = SampledMask::build(
            (0, 0, frame.width(), frame.height()),
            input.params.stride.max(MIN_STRIDE),
            |x, y| {
                if luma.get_pixel(x, y)[0] < bright {
                    return false;
                }
                let (_, saturation, _) = calibration.corrected_hsv(rgb.get_pixel(x, y).0);
                saturation < MAX_SATURATION
            },
        );

        let scale = frame.scale();
        mask.blobs(MIN_BLOB_CELLS)
            .into_iter()
            .filter(|blob| {
                let radius = blob.radius_px() * scale;
                radius >= self.min_radius && radius <= self.max_radius
            })
            .max_by(|a, b| {
                a.roundness()
                    .total_cmp(&b.roundness())
                    .then(a.cells.cmp(&b.cells))
            })
            .map(|blob| {
                Detection::new(
                    blob.center_x * scale,
                    blob.center_y * scale,
                    blob.roundness(),
                    DetectorKind::SimpleBall,
                )
                .with_radius(blob.radius_px() * scale)
            })
    }

    fn name(&self) -> &'static str {
        "SimpleBallDetector"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationProfile;
    use crate::frame::{CanonicalFrame, FrameInput};
    use crate::mode::ProcessingMode;
    use image::{Rgb, RgbImage};

    fn detect(img: &RgbImage) -> Option<Detection> {
        let frame = CanonicalFrame::from_input(&FrameInput::from(img), 0).unwrap();
        let calibration = CalibrationProfile::default();
        SimpleBallDetector::new(&EngineConfig::default()).detect(&StrategyInput {
            frame: &frame,
            previous_luma: None,
            calibration: &calibration,
            params: ProcessingMode::Accurate.params(),
        })
    }

    fn pitch_with_disc(color: Rgb<u8>) -> RgbImage {
        let mut img = RgbImage::from_pixel(240, 160, Rgb([40, 110, 40]));
        for y in 60..=100i32 {
            for x in 100..=140i32 {
                if (x - 120).pow(2) + (y - 80).pow(2) <= 15 * 15 {
                    img.put_pixel(x as u32, y as u32, color);
                }
            }
        }
        img
    }

    #[test]
    fn test_finds_white_ball_on_pitch() {
        let detection = detect(&pitch_with_disc(Rgb([245, 245, 245]))).unwrap();
        assert_eq!(detection.kind, DetectorKind::SimpleBall);
        assert!((detection.x - 120.0).abs() < 4.0);
        assert!((detection.y - 80.0).abs() < 4.0);
        assert!(detection.radius.unwrap() > 10.0);
    }

    #[test]
    fn test_saturated_ball_is_ignored() {
        assert!(detect(&pitch_with_disc(Rgb([255, 200, 0]))).is_none());
    }

    #[test]
    fn test_empty_pitch() {
        assert!(detect(&RgbImage::from_pixel(240, 160, Rgb([40, 110, 40]))).is_none());
    }
}
