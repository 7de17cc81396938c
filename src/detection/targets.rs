/// Target marker detection inside the goal region
use std::cmp::Ordering;

use serde::Serialize;

use super::blob::{SampledMask, MIN_BLOB_CELLS};
use super::strategy::{Detection, DetectorKind};
use crate::calibration::CalibrationProfile;
use crate::config::{ColorRange, EngineConfig};
use crate::frame::CanonicalFrame;
use crate::geometry::Region;
use crate::mode::ModeParams;

/// Targets ordered by confidence descending, ties by y then x ascending
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TargetSet {
    targets: Vec<Detection>,
}

impl TargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from arbitrary detections, applying the canonical ordering
    pub fn from_detections(mut targets: Vec<Detection>) -> Self {
        targets.sort_by(target_order);
        Self { targets }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.targets.iter()
    }

    pub fn as_slice(&self) -> &[Detection] {
        &self.targets
    }

    fn truncate(&mut self, len: usize) {
        self.targets.truncate(len);
    }
}

impl<'a> IntoIterator for &'a TargetSet {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}

fn target_order(a: &Detection, b: &Detection) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then(a.y.total_cmp(&b.y))
        .then(a.x.total_cmp(&b.x))
}

pub struct TargetDetector {
    color: ColorRange,
    min_area: f32,
    max_targets: usize,
}

impl TargetDetector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            color: config.target_color,
            min_area: config.min_target_area,
            max_targets: config.max_targets,
        }
    }

    /// Find target markers whose centres lie inside `goal` (source coordinates)
    pub fn detect(
        &self,
        frame: &CanonicalFrame,
        goal: &Region,
        calibration: &CalibrationProfile,
        params: ModeParams,
    ) -> TargetSet {
        let scale = frame.scale();
        let (source_w, source_h) = frame.source_dimensions();
        let Some(goal) = goal.clip(source_w, source_h) else {
            tracing::debug!("Goal region {:?} is empty after clipping", goal);
            return TargetSet::new();
        };

        // Canonical-pixel window covering the clipped goal
        let window = goal.scaled(1.0 / scale);
        let x0 = window.x.floor().max(0.0) as u32;
        let y0 = window.y.floor().max(0.0) as u32;
        let x1 = (window.right().ceil() as u32).min(frame.width());
        let y1 = (window.bottom().ceil() as u32).min(frame.height());
        if x1 <= x0 || y1 <= y0 {
            return TargetSet::new();
        }

        let rgb = frame.rgb();
        let color = self.color;
        let mask = SampledMask::build((x0, y0, x1, y1), params.stride, |x, y| {
            let (h, s, v) = calibration.corrected_hsv(rgb.get_pixel(x, y).0);
            color.matches(h, s, v)
        });

        let detections: Vec<Detection> = mask
            .blobs(MIN_BLOB_CELLS)
            .into_iter()
            .filter(|blob| blob.area_px() * scale * scale >= self.min_area)
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
                    blob.solidity(),
                    DetectorKind::Target,
                )
                .with_radius(bounds.width.min(bounds.height) / 2.0)
                .with_bounds(bounds)
            })
            .filter(|d| goal.contains(&d.position()))
            .collect();

        let mut targets = TargetSet::from_detections(detections);
        targets.truncate(self.max_targets);
        targets
    }
}
