/// Cross-frame tracking state and session statistics
///
/// One `Tracker` per engine. Detectors compute their result without holding
/// the lock, then hand it here together with the session generation they
/// observed when they started. A `reset()` in between bumps the generation,
/// and the late result is dropped instead of leaking into the new session.
///
/// The motion reference frame lives under the same lock, so a reset clears it
/// in the same step that starts the new session.
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::GrayImage;
use parking_lot::Mutex;
use serde::Serialize;

use crate::detection::Detection;
use crate::geometry::Point;

#[derive(Debug)]
struct TrackState {
    generation: u64,
    session_start: Instant,

    frames_processed: u64,
    detections_succeeded: u64,
    detections_failed: u64,
    target_frames: u64,
    targets_detected: u64,
    impacts: u64,

    last_ball: Option<Detection>,
    /// `frames_processed` value when `last_ball` was seen
    last_ball_frame: u64,
    /// Pixels per processed frame
    last_velocity: Option<Point>,

    latencies: VecDeque<Duration>,
    latency_total: Duration,
    latency_count: u64,

    /// Luma of the last analysed frame
    motion_reference: Option<Arc<GrayImage>>,
}

impl TrackState {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            session_start: Instant::now(),
            frames_processed: 0,
            detections_succeeded: 0,
            detections_failed: 0,
            target_frames: 0,
            targets_detected: 0,
            impacts: 0,
            last_ball: None,
            last_ball_frame: 0,
            last_velocity: None,
            latencies: VecDeque::new(),
            latency_total: Duration::ZERO,
            latency_count: 0,
            motion_reference: None,
        }
    }

    fn push_latency(&mut self, latency: Duration, window: usize) {
        if self.latencies.len() == window {
            self.latencies.pop_front();
        }
        self.latencies.push_back(latency);
        self.latency_total += latency;
        self.latency_count += 1;
    }
}

/// Point-in-time copy of the session statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub frames_processed: u64,
    pub detections_succeeded: u64,
    pub detections_failed: u64,
    /// Succeeded / (succeeded + failed), 0 when nothing was attempted
    pub detection_success_rate: f32,
    pub target_frames: u64,
    pub targets_detected: u64,
    pub impacts: u64,
    pub average_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub last_ball: Option<Detection>,
    pub last_velocity: Option<Point>,
    pub session_elapsed_secs: f64,
    pub frames_per_second: f64,
}

pub struct Tracker {
    state: Mutex<TrackState>,
    latency_window: usize,
}

impl Tracker {
    pub fn new(latency_window: usize) -> Self {
        Self {
            state: Mutex::new(TrackState::new(0)),
            latency_window: latency_window.max(1),
        }
    }

    /// Current session generation
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Current generation together with that session's motion reference
    pub fn session(&self) -> (u64, Option<Arc<GrayImage>>) {
        let state = self.state.lock();
        (state.generation, state.motion_reference.clone())
    }

    /// Store the frame later motion is measured against. Ignored if the
    /// session was reset after `generation` was taken.
    pub fn set_motion_reference(&self, generation: u64, luma: Arc<GrayImage>) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        state.motion_reference = Some(luma);
        true
    }

    /// Record one ball detection attempt. Returns false if the session was
    /// reset after `generation` was taken.
    pub fn record_ball(
        &self,
        generation: u64,
        ball: Option<&Detection>,
        latency: Duration,
    ) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            tracing::debug!("Dropping ball result from stale session {}", generation);
            return false;
        }

        state.frames_processed += 1;
        match ball {
            Some(ball) => {
                state.detections_succeeded += 1;
                if let Some(previous) = state.last_ball {
                    let frames = state
                        .frames_processed
                        .saturating_sub(state.last_ball_frame)
                        .max(1) as f32;
                    state.last_velocity = Some(Point::new(
                        (ball.x - previous.x) / frames,
                        (ball.y - previous.y) / frames,
                    ));
                }
                state.last_ball = Some(*ball);
                state.last_ball_frame = state.frames_processed;
            }
            None => state.detections_failed += 1,
        }
        state.push_latency(latency, self.latency_window);
        true
    }

    pub fn record_targets(&self, generation: u64, count: usize, latency: Duration) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            tracing::debug!("Dropping target result from stale session {}", generation);
            return false;
        }

        state.target_frames += 1;
        state.targets_detected += count as u64;
        state.push_latency(latency, self.latency_window);
        true
    }

    pub fn record_impact(&self, generation: u64) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        state.impacts += 1;
        true
    }

    pub fn last_ball(&self) -> Option<Detection> {
        self.state.lock().last_ball
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let state = self.state.lock();

        let attempts = state.detections_succeeded + state.detections_failed;
        let detection_success_rate = if attempts == 0 {
            0.0
        } else {
            state.detections_succeeded as f32 / attempts as f32
        };

        let average_latency_ms = if state.latency_count == 0 {
            0.0
        } else {
            state.latency_total.as_secs_f64() * 1000.0 / state.latency_count as f64
        };

        let mut window: Vec<f64> = state
            .latencies
            .iter()
            .map(|d| d.as_secs_f64() * 1000.0)
            .collect();
        window.sort_by(|a, b| a.total_cmp(b));

        let elapsed = state.session_start.elapsed().as_secs_f64();
        let frames_per_second = if elapsed > 0.0 {
            state.frames_processed as f64 / elapsed
        } else {
            0.0
        };

        StatsSnapshot {
            frames_processed: state.frames_processed,
            detections_succeeded: state.detections_succeeded,
            detections_failed: state.detections_failed,
            detection_success_rate,
            target_frames: state.target_frames,
            targets_detected: state.targets_detected,
            impacts: state.impacts,
            average_latency_ms,
            p95_latency_ms: percentile(&window, 95.0),
            last_ball: state.last_ball,
            last_velocity: state.last_velocity,
            session_elapsed_secs: elapsed,
            frames_per_second,
        }
    }

    /// Clear all counters and history and start a new session
    pub fn reset(&self) -> u64 {
        let mut state = self.state.lock();
        let generation = state.generation + 1;
        *state = TrackState::new(generation);
        generation
    }
}

/// Nearest-rank percentile of sorted data
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx]
}
