//! BounceBack Vision
//!
//! Real-time ball and target detection for a rebound-wall trainer. Feed frames
//! to an [`Engine`]; it finds the ball, finds target markers inside a goal
//! region, keeps session statistics and decides when the ball hits a target.
//!
//! ```rust,ignore
//! use bounceback_vision::{Engine, FrameInput, Region};
//!
//! let engine = Engine::default();
//! let goal = Region::new(200.0, 60.0, 120.0, 120.0);
//! let ball = engine.detect_ball(&FrameInput::from(&frame))?;
//! let targets = engine.detect_targets(&FrameInput::from(&frame), goal)?;
//! if engine.detect_impact(ball.as_ref(), &targets, goal) {
//!     println!("hit!");
//! }
//! ```

pub mod analysis;
pub mod calibration;
pub mod config;
pub mod detection;
pub mod engine;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod impact;
pub mod mode;
pub mod tracking;

pub use analysis::FrameAnalysis;
pub use calibration::CalibrationProfile;
pub use config::{ColorRange, EngineConfig, ImpactConfig};
pub use detection::{Detection, DetectorKind, TargetSet};
pub use engine::Engine;
pub use error::{ConfigError, EngineError, Result};
pub use frame::{CanonicalFrame, FrameInput, PixelFormat};
pub use geometry::{Point, Region};
pub use impact::ImpactState;
pub use mode::{ModeParams, ProcessingMode};
pub use tracking::StatsSnapshot;
