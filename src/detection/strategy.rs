/// Detection types and the ball strategy trait
///
/// Defines the interface shared by all ball detection strategies.
use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationProfile;
use crate::frame::CanonicalFrame;
use crate::geometry::{Point, Region};
use crate::mode::ModeParams;

/// Which detector produced a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    /// Colour segmentation scored by blob roundness
    ColorShape,
    /// Frame difference against the previous frame
    Motion,
    /// Band-pass (difference of box means) blob response
    BandPass,
    /// Low-latency bright round blob detector
    SimpleBall,
    /// Target marker inside the goal region
    Target,
}

impl DetectorKind {
    /// True for strategies that compare against the previous frame
    pub fn is_motion_based(&self) -> bool {
        matches!(self, DetectorKind::Motion)
    }
}

/// A single detector's estimate of an object in source-frame coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub radius: Option<f32>,
    pub bounds: Option<Region>,
    /// Always within [0, 1]
    pub confidence: f32,
    pub kind: DetectorKind,
}

impl Detection {
    /// Create a detection; confidence is clamped into [0, 1] (NaN becomes 0)
    pub fn new(x: f32, y: f32, confidence: f32, kind: DetectorKind) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            x,
            y,
            radius: None,
            bounds: None,
            confidence,
            kind,
        }
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = Some(radius.max(0.0));
        self
    }

    pub fn with_bounds(mut self, bounds: Region) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Radius used for proximity tests: explicit radius, else half the
    /// shorter side of the bounds, else zero
    pub fn effective_radius(&self) -> f32 {
        self.radius
            .or_else(|| self.bounds.map(|b| b.width.min(b.height) / 2.0))
            .unwrap_or(0.0)
    }
}

/// Everything a strategy may read for one frame
pub struct StrategyInput<'a> {
    pub frame: &'a CanonicalFrame,
    /// Luma of the previously analysed frame, if any
    pub previous_luma: Option<&'a GrayImage>,
    pub calibration: &'a CalibrationProfile,
    pub params: ModeParams,
}

/// Ball detection strategy
///
/// Strategies are read-only over the frame, so the unified detector can run
/// several of them in parallel and fuse the proposals afterwards.
pub trait BallStrategy: Send + Sync {
    /// Propose at most one ball candidate
    fn detect(&self, input: &StrategyInput<'_>) -> Option<Detection>;

    /// Get strategy name (for logging)
    fn name(&self) -> &'static str;

    /// Check if strategy is enabled
    fn is_enabled(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(Detection::new(0.0, 0.0, 1.7, DetectorKind::Motion).confidence, 1.0);
        assert_eq!(Detection::new(0.0, 0.0, -0.2, DetectorKind::Motion).confidence, 0.0);
        assert_eq!(Detection::new(0.0, 0.0, f32::NAN, DetectorKind::Motion).confidence, 0.0);
    }

    #[test]
    fn test_effective_radius() {
        let plain = Detection::new(1.0, 1.0, 0.5, DetectorKind::Target);
        assert_eq!(plain.effective_radius(), 0.0);

        let boxed = plain.with_bounds(Region::new(0.0, 0.0, 10.0, 4.0));
        assert_eq!(boxed.effective_radius(), 2.0);

        let round = boxed.with_radius(7.5);
        assert_eq!(round.effective_radius(), 7.5);
    }

    #[test]
    fn test_only_motion_is_motion_based() {
        assert!(DetectorKind::Motion.is_motion_based());
        assert!(!DetectorKind::ColorShape.is_motion_based());
        assert!(!DetectorKind::BandPass.is_motion_based());
    }
}
