/// Detection engine context
///
/// Owns everything that persists between frames: calibration, processing
/// mode, tracking statistics (with the motion reference frame) and impact
/// cooldown.
/// Each engine is an independent session; create one per camera/stream.
///
/// Every operation takes `&self`. Results are computed without holding any
/// lock and then applied in a short critical section, so a failing call never
/// leaves shared state half-updated.
///
/// Lock order is impact, then tracker. Reset holds the impact lock while it
/// starts the new session, so an impact is always evaluated and counted in
/// the same session.
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::analysis::{self, FrameAnalysis};
use crate::calibration::CalibrationProfile;
use crate::config::EngineConfig;
use crate::detection::{
    motion_blobs, BallDetector, BallStrategy, Detection, SimpleBallDetector, StrategyInput,
    TargetDetector, TargetSet,
};
use crate::error::Result;
use crate::frame::{CanonicalFrame, FrameInput};
use crate::geometry::Region;
use crate::impact::ImpactEvaluator;
use crate::mode::ProcessingMode;
use crate::tracking::{StatsSnapshot, Tracker};

pub struct Engine {
    config: EngineConfig,
    ball_detector: BallDetector,
    simple_detector: SimpleBallDetector,
    target_detector: TargetDetector,
    calibration: RwLock<CalibrationProfile>,
    mode: RwLock<ProcessingMode>,
    tracker: Tracker,
    impact: Mutex<ImpactEvaluator>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let ball_detector = BallDetector::new(&config);
        tracing::info!(
            "Engine created (mode: {}, strategies: {:?})",
            config.default_mode,
            ball_detector.active_strategies(config.default_mode.params().max_strategies)
        );

        Self {
            ball_detector,
            simple_detector: SimpleBallDetector::new(&config),
            target_detector: TargetDetector::new(&config),
            calibration: RwLock::new(CalibrationProfile::default()),
            mode: RwLock::new(config.default_mode),
            tracker: Tracker::new(config.latency_window),
            impact: Mutex::new(ImpactEvaluator::new(config.impact)),
            config,
        }
    }

    fn canonical(&self, frame: &FrameInput<'_>) -> Result<CanonicalFrame> {
        CanonicalFrame::from_input(frame, self.config.max_frame_dimension).map_err(|e| {
            tracing::warn!("Rejected frame: {}", e);
            e
        })
    }

    /// Run one ball strategy with the current calibration, mode and motion
    /// reference, then record the outcome.
    fn run_ball_detection(
        &self,
        frame: &FrameInput<'_>,
        detect: impl Fn(&StrategyInput<'_>) -> Option<Detection>,
    ) -> Result<Option<Detection>> {
        let started = Instant::now();
        let (generation, previous) = self.tracker.session();
        let canonical = self.canonical(frame)?;

        let calibration = *self.calibration.read();
        let params = self.mode().params();

        let ball = detect(&StrategyInput {
            frame: &canonical,
            previous_luma: previous.as_deref(),
            calibration: &calibration,
            params,
        });

        if self.tracker.record_ball(generation, ball.as_ref(), started.elapsed()) {
            self.tracker
                .set_motion_reference(generation, Arc::new(canonical.luma().clone()));
        }
        Ok(ball)
    }

    /// Unified ball detection. `Ok(None)` means no ball in this frame.
    pub fn detect_ball(&self, frame: &FrameInput<'_>) -> Result<Option<Detection>> {
        self.run_ball_detection(frame, |input| self.ball_detector.detect(input))
    }

    /// Single-pass white ball detector, cheaper than `detect_ball` and
    /// independent of it.
    pub fn detect_simple_ball(&self, frame: &FrameInput<'_>) -> Result<Option<Detection>> {
        self.run_ball_detection(frame, |input| {
            self.simple_detector
                .detect(input)
                .filter(|d| d.confidence >= input.params.confidence_threshold)
        })
    }

    /// Target markers inside `goal`. A goal outside the frame or with zero
    /// area yields an empty set.
    pub fn detect_targets(&self, frame: &FrameInput<'_>, goal: Region) -> Result<TargetSet> {
        let started = Instant::now();
        let generation = self.tracker.generation();
        let canonical = self.canonical(frame)?;

        let calibration = *self.calibration.read();
        let params = self.mode().params();
        let targets = self
            .target_detector
            .detect(&canonical, &goal, &calibration, params);

        tracing::debug!("{} target(s) in goal region", targets.len());
        self.tracker
            .record_targets(generation, targets.len(), started.elapsed());
        Ok(targets)
    }

    /// Decide whether this frame registers a new impact.
    ///
    /// Returns true once per physical hit; subsequent frames are suppressed
    /// until the cooldown elapses or the ball leaves the goal.
    pub fn detect_impact(
        &self,
        ball: Option<&Detection>,
        targets: &TargetSet,
        goal: Region,
    ) -> bool {
        let mut impact = self.impact.lock();
        let generation = self.tracker.generation();
        let hit = impact.evaluate(ball, targets, &goal);

        if hit && self.tracker.record_impact(generation) {
            if let Some(ball) = ball {
                tracing::info!("💥 Impact at ({:.1}, {:.1})", ball.x, ball.y);
            }
        }
        hit
    }

    /// Start a new session: zero statistics, forget the last ball, re-arm
    /// impacts and drop the motion reference.
    pub fn reset_tracking(&self) {
        let mut impact = self.impact.lock();
        let generation = self.tracker.reset();
        impact.reset();
        drop(impact);
        tracing::info!("Tracking reset (session {})", generation);
    }

    pub fn statistics(&self) -> StatsSnapshot {
        self.tracker.snapshot()
    }

    /// Switch mode by name. Unknown names leave the current mode unchanged.
    pub fn set_mode(&self, mode: &str) -> Result<()> {
        match mode.parse::<ProcessingMode>() {
            Ok(mode) => {
                self.set_processing_mode(mode);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("{}", e);
                Err(e)
            }
        }
    }

    pub fn set_processing_mode(&self, mode: ProcessingMode) {
        let previous = std::mem::replace(&mut *self.mode.write(), mode);
        if previous != mode {
            tracing::info!("Processing mode: {} -> {}", previous, mode);
        }
    }

    pub fn mode(&self) -> ProcessingMode {
        *self.mode.read()
    }

    /// Derive and store a calibration profile from a representative frame.
    /// Takes effect on the next detection call.
    pub fn calibrate(&self, frame: &FrameInput<'_>) -> Result<CalibrationProfile> {
        let canonical = self.canonical(frame)?;
        let profile = CalibrationProfile::from_frame(&canonical);
        *self.calibration.write() = profile;

        tracing::info!(
            "Calibrated: mean luma {:.1}, gains [{:.2}, {:.2}, {:.2}], offset {:+.1}",
            profile.mean_luma,
            profile.channel_gains[0],
            profile.channel_gains[1],
            profile.channel_gains[2],
            profile.brightness_offset
        );
        Ok(profile)
    }

    pub fn calibration(&self) -> CalibrationProfile {
        *self.calibration.read()
    }

    /// All moving regions against the previous frame, most confident first.
    /// Empty on the first call; the frame becomes the next reference.
    pub fn detect_motion(&self, frame: &FrameInput<'_>) -> Result<Vec<Detection>> {
        let (generation, previous) = self.tracker.session();
        let canonical = self.canonical(frame)?;
        let params = self.mode().params();

        let blobs = match previous.as_deref() {
            Some(previous) => motion_blobs(
                &canonical,
                previous,
                self.config.motion_threshold,
                params.stride,
                (0.0, f32::INFINITY),
            ),
            None => Vec::new(),
        };

        self.tracker
            .set_motion_reference(generation, Arc::new(canonical.luma().clone()));
        tracing::debug!("{} motion region(s)", blobs.len());
        Ok(blobs)
    }

    /// Frame quality measurements and a suggested processing mode.
    /// Does not touch tracking state.
    pub fn analyze_frame(&self, frame: &FrameInput<'_>) -> Result<FrameAnalysis> {
        let started = Instant::now();
        let canonical = self.canonical(frame)?;
        let calibration = *self.calibration.read();
        Ok(analysis::analyze(
            &canonical,
            &self.config.ball_color,
            &calibration,
            started,
        ))
    }
}
