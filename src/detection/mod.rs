/// Detection module
///
/// Ball and target detectors operating on a `CanonicalFrame`.
///
/// ## Architecture
///
/// ```text
/// BallDetector (fuses per mode)
///   ├── ColorShapeStrategy   colour window + roundness
///   ├── MotionStrategy       difference against the previous frame
///   └── BandPassStrategy     difference of box means (off by default)
/// SimpleBallDetector         coarse bright/white ball pass
/// TargetDetector             coloured markers inside the goal region
/// ```
///
/// Every strategy samples the frame through `blob::SampledMask` and scores the
/// resulting connected components.
///
/// ## Usage
///
/// ```rust,ignore
/// let detector = BallDetector::new(&config);
/// let input = StrategyInput {
///     frame: &frame,
///     previous_luma: None,
///     calibration: &CalibrationProfile::default(),
///     params: ProcessingMode::Balanced.params(),
/// };
/// if let Some(ball) = detector.detect(&input) {
///     println!("ball at ({}, {})", ball.x, ball.y);
/// }
/// ```
pub mod ball;
pub mod band_pass;
pub mod blob;
pub mod color;
pub mod motion;
pub mod soccer;
pub mod strategy;
pub mod targets;

pub use ball::{fuse, BallDetector};
pub use band_pass::BandPassStrategy;
pub use color::ColorShapeStrategy;
pub use motion::{motion_blobs, MotionStrategy};
pub use soccer::SimpleBallDetector;
pub use strategy::{BallStrategy, Detection, DetectorKind, StrategyInput};
pub use targets::{TargetDetector, TargetSet};
