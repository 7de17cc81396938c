/// Impact evaluation with duplicate suppression
///
/// A ball touching a target stays in contact for several frames; only the
/// first of those frames counts as an impact.
use crate::config::ImpactConfig;
use crate::detection::{Detection, TargetSet};
use crate::geometry::Region;

/// State of the impact evaluator
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ImpactState {
    /// Ready to register the next impact
    #[default]
    Armed,

    /// An impact was just registered; suppress for `remaining` more frames
    Cooldown { remaining: u32 },
}

impl ImpactState {
    pub fn is_armed(&self) -> bool {
        matches!(self, ImpactState::Armed)
    }
}

#[derive(Debug)]
pub struct ImpactEvaluator {
    config: ImpactConfig,
    state: ImpactState,
}

impl ImpactEvaluator {
    pub fn new(config: ImpactConfig) -> Self {
        Self {
            config,
            state: ImpactState::Armed,
        }
    }

    pub fn state(&self) -> ImpactState {
        self.state
    }

    /// Evaluate one frame. Returns true only for a newly registered impact.
    pub fn evaluate(
        &mut self,
        ball: Option<&Detection>,
        targets: &TargetSet,
        goal: &Region,
    ) -> bool {
        let in_goal = ball.is_some_and(|b| goal.contains(&b.position()));

        match self.state {
            ImpactState::Cooldown { remaining } => {
                let left_goal = ball.is_some() && !in_goal;
                self.state = if left_goal || remaining <= 1 {
                    ImpactState::Armed
                } else {
                    ImpactState::Cooldown {
                        remaining: remaining - 1,
                    }
                };
                false
            }
            ImpactState::Armed => {
                let Some(ball) = ball else {
                    return false;
                };
                if !in_goal || !self.touches_target(ball, targets) {
                    return false;
                }

                if self.config.cooldown_frames > 0 {
                    self.state = ImpactState::Cooldown {
                        remaining: self.config.cooldown_frames,
                    };
                }
                true
            }
        }
    }

    fn touches_target(&self, ball: &Detection, targets: &TargetSet) -> bool {
        let position = ball.position();
        let ball_radius = ball.effective_radius();
        targets.iter().any(|target| {
            let reach = ball_radius + target.effective_radius() + self.config.proximity_px;
            position.distance(&target.position()) <= reach
        })
    }

    pub fn reset(&mut self) {
        self.state = ImpactState::Armed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::DetectorKind;

    fn goal() -> Region {
        Region::new(0.0, 0.0, 100.0, 100.0)
    }

    fn ball(x: f32, y: f32) -> Detection {
        Detection::new(x, y, 0.9, DetectorKind::ColorShape).with_radius(5.0)
    }

    fn targets() -> TargetSet {
        TargetSet::from_detections(vec![
            Detection::new(50.0, 50.0, 1.0, DetectorKind::Target).with_radius(10.0),
        ])
    }

    fn evaluator(cooldown_frames: u32) -> ImpactEvaluator {
        ImpactEvaluator::new(ImpactConfig {
            cooldown_frames,
            proximity_px: 12.0,
        })
    }

    #[test]
    fn test_hit_within_reach() {
        let mut impact = evaluator(5);
        // 5 + 10 + 12 = 27 px reach
        assert!(!impact.evaluate(Some(&ball(50.0, 80.0)), &targets(), &goal()));
        assert!(impact.evaluate(Some(&ball(50.0, 76.0)), &targets(), &goal()));
        assert!(!impact.state().is_armed());
    }

    #[test]
    fn test_no_ball_no_impact() {
        let mut impact = evaluator(5);
        assert!(!impact.evaluate(None, &targets(), &goal()));
        assert!(impact.state().is_armed());
    }

    #[test]
    fn test_no_targets_no_impact() {
        let mut impact = evaluator(5);
        assert!(!impact.evaluate(Some(&ball(50.0, 50.0)), &TargetSet::new(), &goal()));
    }

    #[test]
    fn test_ball_outside_goal_is_ignored() {
        let mut impact = evaluator(5);
        let goal = Region::new(0.0, 0.0, 50.0, 50.0);
        // Near the target but outside the goal rectangle
        assert!(!impact.evaluate(Some(&ball(55.0, 55.0)), &targets(), &goal));
    }

    #[test]
    fn test_cooldown_suppresses_duplicates() {
        let cooldown = 4;
        let mut impact = evaluator(cooldown);
        let frames: Vec<bool> = (0..12)
            .map(|_| impact.evaluate(Some(&ball(50.0, 50.0)), &targets(), &goal()))
            .collect();
        let fired: Vec<usize> = frames
            .iter()
            .enumerate()
            .filter(|(_, &hit)| hit)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(fired, vec![0, 5, 10]);
    }

    #[test]
    fn test_absent_ball_counts_towards_cooldown() {
        let mut impact = evaluator(2);
        assert!(impact.evaluate(Some(&ball(50.0, 50.0)), &targets(), &goal()));
        assert!(!impact.evaluate(None, &targets(), &goal()));
        assert!(!impact.evaluate(None, &targets(), &goal()));
        assert!(impact.state().is_armed());
        assert!(impact.evaluate(Some(&ball(50.0, 50.0)), &targets(), &goal()));
    }

    #[test]
    fn test_leaving_goal_rearms() {
        let mut impact = evaluator(30);
        assert!(impact.evaluate(Some(&ball(50.0, 50.0)), &targets(), &goal()));
        assert!(!impact.evaluate(Some(&ball(150.0, 50.0)), &targets(), &goal()));
        assert!(impact.state().is_armed());
        assert!(impact.evaluate(Some(&ball(50.0, 50.0)), &targets(), &goal()));
    }

    #[test]
    fn test_zero_cooldown_fires_every_frame() {
        let mut impact = evaluator(0);
        assert!(impact.evaluate(Some(&ball(50.0, 50.0)), &targets(), &goal()));
        assert!(impact.evaluate(Some(&ball(50.0, 50.0)), &targets(), &goal()));
    }

    #[test]
    fn test_reset_rearms() {
        let mut impact = evaluator(30);
        assert!(impact.evaluate(Some(&ball(50.0, 50.0)), &targets(), &goal()));
        impact.reset();
        assert!(impact.evaluate(Some(&ball(50.0, 50.0)), &targets(), &goal()));
    }
}
