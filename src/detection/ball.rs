/// Unified ball detector
///
/// Runs the strategies the current mode allows and fuses their proposals into
/// a single answer. Strategy order is priority order: colour/shape first, then
/// motion, then band-pass.
use rayon::prelude::*;

use super::band_pass::BandPassStrategy;
use super::color::ColorShapeStrategy;
use super::motion::MotionStrategy;
use super::strategy::{BallStrategy, Detection, StrategyInput};
use crate::config::EngineConfig;

pub struct BallDetector {
    strategies: Vec<Box<dyn BallStrategy>>,
}

impl BallDetector {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_strategies(vec![
            Box::new(ColorShapeStrategy::new(config)),
            Box::new(MotionStrategy::new(config)),
            Box::new(BandPassStrategy::new(config)),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn BallStrategy>>) -> Self {
        Self { strategies }
    }

    /// Names of the strategies that would run with `max_strategies`
    pub fn active_strategies(&self, max_strategies: usize) -> Vec<&'static str> {
        self.active(max_strategies).map(|s| s.name()).collect()
    }

    fn active(&self, max_strategies: usize) -> impl Iterator<Item = &dyn BallStrategy> {
        self.strategies
            .iter()
            .map(|s| s.as_ref())
            .filter(|s| s.is_enabled())
            .take(max_strategies.max(1))
    }

    pub fn detect(&self, input: &StrategyInput<'_>) -> Option<Detection> {
        let active: Vec<&dyn BallStrategy> = self.active(input.params.max_strategies).collect();

        let candidates: Vec<Detection> = if active.len() > 1 {
            active
                .par_iter()
                .filter_map(|strategy| strategy.detect(input))
                .collect()
        } else {
            active.iter().filter_map(|strategy| strategy.detect(input)).collect()
        };

        for candidate in &candidates {
            tracing::debug!(
                "{:?} candidate at ({:.1}, {:.1}) confidence {:.3}",
                candidate.kind,
                candidate.x,
                candidate.y,
                candidate.confidence
            );
        }

        let fused = fuse(&candidates, input.params.confidence_threshold);
        match &fused {
            Some(d) => tracing::debug!("Fused ball: {:?} ({:.3})", d.kind, d.confidence),
            None => tracing::debug!(
                "No candidate above threshold {:.2} ({} proposed)",
                input.params.confidence_threshold,
                candidates.len()
            ),
        }
        fused
    }
}

/// Pick the winning candidate.
///
/// Highest confidence at or above `threshold` wins. On an exact tie a motion
/// detection beats a static one; remaining ties go to the earlier candidate.
pub fn fuse(candidates: &[Detection], threshold: f32) -> Option<Detection> {
    let mut best: Option<&Detection> = None;
    for candidate in candidates.iter().filter(|c| c.confidence >= threshold) {
        best = match best {
            None => Some(candidate),
            Some(current) if candidate.confidence > current.confidence => Some(candidate),
            Some(current)
                if candidate.confidence == current.confidence
                    && candidate.kind.is_motion_based()
                    && !current.kind.is_motion_based() =>
            {
                Some(candidate)
            }
            keep => keep,
        };
    }
    best.copied()
}
