/// Colour/shape ball strategy
///
/// Segments pixels whose calibrated colour falls in the ball's HSV window and
/// scores each blob by how disc-like it is.
use super::blob::{SampledMask, MIN_BLOB_CELLS};
use super::strategy::{BallStrategy, Detection, DetectorKind, StrategyInput};
use crate::config::{ColorRange, EngineConfig};

pub struct ColorShapeStrategy {
    color: ColorRange,
    min_radius: f32,
    max_radius: f32,
}

impl ColorShapeStrategy {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            color: config.ball_color,
            min_radius: config.min_ball_radius,
            max_radius: config.max_ball_radius,
        }
    }
}

impl BallStrategy for ColorShapeStrategy {
    fn detect(&self, input: &StrategyInput<'_>) -> Option<Detection> {
        let frame = input.frame;
        let rgb = frame.rgb();
        let calibration = input.calibration;
        let color = self.color;

        let mask = SampledMask::build(
            (0, 0, frame.width(), frame.height()),
            input.params.stride,
            |x, y| {
                let (h, s, v) = calibration.corrected_hsv(rgb.get_pixel(x, y).0);
                color.matches(h, s, v)
            },
        );

        let scale = frame.scale();
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
                    blob.roundness(),
                    DetectorKind::ColorShape,
                )
                .with_radius(blob.radius_px() * scale)
            })
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }

    fn name(&self) -> &'static str {
        "ColorShapeStrategy"
    }
}
