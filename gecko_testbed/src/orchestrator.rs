//! Sequence runner.
//!
//! Runs every active axis program of a sequence in parallel, once per
//! iteration, and resets the axes to zero between iterations. The run log
//! is opened when the run starts and written when it ends, however it ends.

use crate::context::MotionContext;
use crate::events::MotionEvent;
use crate::executor::{AxisOutcome, run_program};
use crate::persistence::LogStore;
use crate::state::{RunGuard, RunToken};
use chrono::Local;
use gecko_common::prelude::*;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

/// Banner width of run-log section headers.
const BANNER: &str = "***************************";

/// How a run ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// All iterations completed.
    Completed,
    /// Operator stopped the run.
    Cancelled,
    /// Emergency stop or hardware fault.
    Halted(String),
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// How it ended.
    pub outcome: RunOutcome,
    /// Iterations that ran to completion, including the reset.
    pub iterations_completed: u32,
    /// Where the run log was written.
    pub log_location: Option<String>,
    /// Why the run log could not be written.
    pub log_error: Option<TestbedError>,
}

type AxisHandle = (Axis, JoinHandle<Result<AxisOutcome, TestbedError>>);

/// Runs sequences against a motion context.
#[derive(Clone)]
pub struct Sequencer {
    ctx: MotionContext,
    store: Arc<dyn LogStore>,
}

impl Sequencer {
    /// Sequencer writing run logs to `store`.
    pub fn new(ctx: MotionContext, store: Arc<dyn LogStore>) -> Self {
        Self { ctx, store }
    }

    /// Claim the run flag and execute `sequence`, blocking until it ends.
    ///
    /// # Errors
    ///
    /// - `ActivityAlreadyRunning` if another activity holds the run flag
    /// - `SensorTransport` if the sensor link is down
    /// - `Persistence` if the run log cannot be created (nothing moves)
    pub fn run(&self, sequence: &Sequence) -> Result<RunReport, TestbedError> {
        self.ctx.state.ensure_sensor_healthy()?;
        let guard = self.ctx.state.try_begin()?;
        self.run_claimed(guard, sequence)
    }

    /// Execute `sequence` under an already-claimed run flag.
    pub fn run_claimed(&self, guard: RunGuard, sequence: &Sequence) -> Result<RunReport, TestbedError> {
        let token = guard.token();
        let state = &self.ctx.state;
        let events = &self.ctx.events;

        state.reset_positions();
        events.step_count();

        let started = Local::now();
        let mut writer = self.store.create(started)?;

        events.run_log().open();
        self.write_header(sequence);
        info!(
            "Sequence started: {} axes, {} iterations",
            sequence.active_axes().count(),
            sequence.repeat
        );

        let mut outcome = RunOutcome::Completed;
        let mut iterations_completed = 0;
        for iteration in 0..sequence.repeat {
            if !token.is_live() {
                outcome = self.stopped_outcome();
                break;
            }
            events
                .run_log()
                .append(format!("{BANNER} Execution {iteration} {BANNER}"));
            events.publish(MotionEvent::IterationStarted { iteration });

            if let Some(stopped) = self.run_iteration(sequence, &token) {
                outcome = stopped;
                break;
            }

            events.publish(MotionEvent::IterationCompleted {
                iteration,
                positions: state.positions(),
            });
            events
                .run_log()
                .append(format!("{BANNER} Experiment {iteration} Finished {BANNER}"));

            events.publish(MotionEvent::ResettingAxes);
            if let Some(stopped) = self.reset_axes(&token) {
                outcome = stopped;
                break;
            }
            iterations_completed += 1;
        }

        if let RunOutcome::Cancelled = outcome {
            events.publish(MotionEvent::RunStopped);
        }

        let lines = events.run_log().close().unwrap_or_default();
        let written = lines
            .iter()
            .try_for_each(|line| writer.append_line(line))
            .and_then(|()| writer.close());
        let (log_location, log_error) = match written {
            Ok(location) => {
                events.publish(MotionEvent::LogWritten {
                    location: location.clone(),
                });
                (Some(location), None)
            }
            Err(e) => {
                error!("Run log lost: {}", e);
                events.publish(MotionEvent::LogFailed {
                    reason: e.to_string(),
                });
                (None, Some(e))
            }
        };

        info!("Sequence ended: {:?} after {} iterations", outcome, iterations_completed);
        drop(guard);
        Ok(RunReport {
            outcome,
            iterations_completed,
            log_location,
            log_error,
        })
    }

    fn write_header(&self, sequence: &Sequence) {
        let log = self.ctx.events.run_log();
        log.append(format!("{BANNER} TestBed Config {BANNER}"));
        log.append(format!(
            "Force Sensor Calibration: {}",
            self.ctx.state.calibration()
        ));
        log.append(format!("Max force limit: {} N", self.ctx.max_force_limit));
        log.append(format!("{BANNER} Sequence {BANNER}"));
        log.append(sequence.to_json().to_string());
    }

    fn stopped_outcome(&self) -> RunOutcome {
        if self.ctx.state.emergency_raised() {
            RunOutcome::Halted("emergency stop".to_string())
        } else {
            RunOutcome::Cancelled
        }
    }

    /// Spawn one thread per active axis and wait for all of them.
    ///
    /// Returns `Some` if the run must end. On cancellation the axis threads
    /// are not joined; they exit on their own at their next token check.
    fn run_iteration(&self, sequence: &Sequence, token: &RunToken) -> Option<RunOutcome> {
        let mut handles: Vec<AxisHandle> = Vec::new();
        for (axis, program) in sequence.active_axes() {
            let ctx = self.ctx.clone();
            let program = program.clone();
            let token = token.clone();
            let spawned = thread::Builder::new()
                .name(format!("axis-{}", axis.label().to_ascii_lowercase()))
                .spawn(move || run_program(&ctx, axis, &program, &token));
            match spawned {
                Ok(handle) => handles.push((axis, handle)),
                Err(e) => {
                    let err = TestbedError::Spawn(format!("axis {axis}: {e}"));
                    self.ctx.halt(&err.to_string());
                    return Some(RunOutcome::Halted(err.to_string()));
                }
            }
        }

        let poll = self.ctx.motion.orchestrator_poll();
        while !handles.is_empty() {
            if !token.is_live() {
                return Some(self.stopped_outcome());
            }

            let (finished, running): (Vec<_>, Vec<_>) =
                handles.into_iter().partition(|(_, h)| h.is_finished());
            handles = running;

            for (axis, handle) in finished {
                let reason = match handle.join() {
                    Ok(Ok(_)) => continue,
                    Ok(Err(e)) => format!("axis {axis}: {e}"),
                    Err(_) => format!("axis {axis} worker panicked"),
                };
                error!("Axis {} failed: {}", axis, reason);
                self.ctx.halt(&reason);
                return Some(RunOutcome::Halted(reason));
            }

            if !handles.is_empty() {
                thread::sleep(poll);
            }
        }

        // An axis may have seen the flag drop just before finishing.
        if !token.is_live() {
            return Some(self.stopped_outcome());
        }
        None
    }

    /// Drive each axis back to zero, one after another.
    fn reset_axes(&self, token: &RunToken) -> Option<RunOutcome> {
        let width = self.ctx.motion.reset_pulse();
        for axis in Axis::ALL {
            match self.ctx.actuator.return_to_zero(axis, width, token) {
                Ok(true) => {}
                Ok(false) => return Some(self.stopped_outcome()),
                Err(e) => {
                    warn!("Reset of axis {} failed: {}", axis, e);
                    let reason = format!("reset of axis {axis}: {e}");
                    self.ctx.halt(&reason);
                    return Some(RunOutcome::Halted(reason));
                }
            }
        }
        None
    }
}
