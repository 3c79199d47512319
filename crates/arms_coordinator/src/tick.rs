//! Fixed-timestep frame loop.
//!
//! Each frame:
//!
//! 1. Advance the frame counter and publish the delta.
//! 2. Tick `PreTick`, `Tick` and `PostTick` in order.
//! 3. Cross the frame boundary, draining the end-of-frame queue.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::coordinator::{Coordinator, TickReport};
use crate::deferred::DrainReport;
use crate::descriptor::Phase;
use crate::error::CoordinatorError;

/// Configuration for the frame loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Target frames per second.
    pub tick_rate: f64,
    /// Maximum number of frames to run (0 = unlimited).
    pub max_frames: u64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_frames: 0,
        }
    }
}

impl FrameConfig {
    /// Duration of one frame at the target rate.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::InvalidTickRate`] unless the rate is finite,
    /// positive and yields a representable, non-zero frame time.
    pub fn frame_duration(&self) -> Result<Duration, CoordinatorError> {
        let invalid = || CoordinatorError::InvalidTickRate(self.tick_rate);
        if !self.tick_rate.is_finite() || self.tick_rate <= 0.0 {
            return Err(invalid());
        }
        let duration = Duration::try_from_secs_f64(1.0 / self.tick_rate).map_err(|_| invalid())?;
        if duration.is_zero() {
            return Err(invalid());
        }
        Ok(duration)
    }
}

/// Everything that happened in one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: u64,
    /// One report per phase, in execution order.
    pub phases: Vec<TickReport>,
    pub end_of_frame: DrainReport,
}

impl FrameReport {
    /// Processor and deferred-action failures across the whole frame.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.phases
            .iter()
            .map(|p| p.failures + p.deferred.failures.len())
            .sum::<usize>()
            + self.end_of_frame.failures.len()
    }
}

/// Drives a [`Coordinator`] through whole frames.
#[derive(Debug)]
pub struct FrameLoop {
    coordinator: Rc<Coordinator>,
    config: FrameConfig,
    stop: Rc<Cell<bool>>,
}

impl FrameLoop {
    #[must_use]
    pub fn new(coordinator: Rc<Coordinator>, config: FrameConfig) -> Self {
        Self {
            coordinator,
            config,
            stop: Rc::new(Cell::new(false)),
        }
    }

    #[must_use]
    pub fn coordinator(&self) -> &Rc<Coordinator> {
        &self.coordinator
    }

    #[must_use]
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// A flag that ends [`FrameLoop::run`] after the current frame once set.
    #[must_use]
    pub fn stop_handle(&self) -> Rc<Cell<bool>> {
        self.stop.clone()
    }

    /// Run one frame with the given delta.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::Reentrant`] if called from inside a tick.
    pub fn run_frame(&self, delta_seconds: f32) -> Result<FrameReport, CoordinatorError> {
        let frame = self.coordinator.begin_frame(delta_seconds);
        debug!(frame, delta_seconds, "frame start");

        let mut phases = Vec::with_capacity(Phase::ALL.len());
        for phase in Phase::ALL {
            phases.push(self.coordinator.tick(phase)?);
        }
        let end_of_frame = self.coordinator.on_frame_boundary()?;

        Ok(FrameReport {
            frame,
            phases,
            end_of_frame,
        })
    }

    /// Run frames at the configured rate until `max_frames` is reached or
    /// the stop flag is set. Returns the number of frames run.
    ///
    /// This is a blocking loop; each frame receives the fixed delta.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::InvalidTickRate`] before any frame runs if the
    /// configured rate is unusable; otherwise the first error of a frame.
    pub fn run(&self) -> Result<u64, CoordinatorError> {
        let frame_duration = self.config.frame_duration()?;
        let delta = frame_duration.as_secs_f32();
        let mut frame_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_frames = self.config.max_frames,
            "starting frame loop"
        );

        loop {
            let start = Instant::now();

            let report = self.run_frame(delta)?;
            let failures = report.failure_count();
            if failures > 0 {
                warn!(frame = report.frame, failures, "frame completed with failures");
            }

            frame_count += 1;
            if self.config.max_frames > 0 && frame_count >= self.config.max_frames {
                info!(frames = frame_count, "frame loop complete");
                break;
            }
            if self.stop.get() {
                info!(frames = frame_count, "frame loop stopped");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            } else {
                warn!(
                    frame = report.frame,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = frame_duration.as_millis() as u64,
                    "frame exceeded time budget"
                );
            }
        }

        Ok(frame_count)
    }
}
