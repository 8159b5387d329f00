//! Manual motion outside of sequences.
//!
//! - [`move_until_trigger`] - pulse one axis until any trigger fires
//! - [`Jogger`] - continuous per-axis jog, started and stopped by axis name
//! - [`motor_check`] - square wave on every axis, both directions
//!
//! Move-until-trigger and motor check hold the run flag. Jogs do not hold it
//! but cannot start while it is held, and a held flag cannot be taken while
//! any axis jogs.

use crate::context::MotionContext;
use crate::events::{MotionEvent, TriggerPhase};
use crate::state::{JogPermit, RunGuard, RunToken};
use crate::trigger::TriggerGroup;
use gecko_common::prelude::*;
use parking_lot::Mutex;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

// ─── Move until trigger ─────────────────────────────────────────────

/// How a manual move ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualOutcome {
    /// A trigger fired.
    Triggered,
    /// The run flag was cleared.
    Stopped,
}

/// Claim the run flag and move `axis` until any of `triggers` fires.
///
/// With no triggers the axis moves until stopped.
///
/// # Errors
///
/// - `InvalidAxis` for an unknown axis label (nothing changes)
/// - `SensorTransport` while the sensor is faulted (nothing moves)
/// - `ActivityAlreadyRunning` if another activity holds the run flag
/// - `ActuatorTransport` if a pulse fails (the move is halted)
pub fn move_until_trigger(
    ctx: &MotionContext,
    axis: &str,
    direction: Direction,
    triggers: &[Trigger],
    pulse_width: Duration,
) -> Result<ManualOutcome, TestbedError> {
    let axis: Axis = axis.parse()?;
    ctx.state.ensure_sensor_healthy()?;
    let guard = ctx.state.try_begin()?;
    run_manual_move(ctx, guard, axis, direction, triggers, pulse_width)
}

/// Manual move under an already-claimed run flag.
pub fn run_manual_move(
    ctx: &MotionContext,
    guard: RunGuard,
    axis: Axis,
    direction: Direction,
    triggers: &[Trigger],
    pulse_width: Duration,
) -> Result<ManualOutcome, TestbedError> {
    let token = guard.token();
    ctx.events
        .publish(MotionEvent::ManualMoveStarted { axis, direction });

    let mut group = TriggerGroup::new(triggers, false);
    let started = Instant::now();
    let mut steps = 0u64;
    let outcome = loop {
        if !token.is_live() {
            break ManualOutcome::Stopped;
        }
        let result = group.evaluate(&ctx.inputs(started.elapsed(), steps), ctx.max_force_limit);
        for i in result.newly_fired {
            if let Some(trigger) = group.trigger(i) {
                ctx.events.publish(MotionEvent::TriggerFired {
                    axis,
                    phase: TriggerPhase::ManualMove,
                    trigger: trigger.clone(),
                });
            }
        }
        if result.satisfied {
            ctx.events.publish(MotionEvent::ManualMoveTriggered);
            break ManualOutcome::Triggered;
        }
        match ctx.actuator.pulse(axis, direction, pulse_width, &token) {
            Ok(Some(_)) => steps += 1,
            Ok(None) => break ManualOutcome::Stopped,
            Err(e) => {
                ctx.halt(&format!("manual move on {axis}: {e}"));
                return Err(e);
            }
        }
    };

    ctx.events.publish(MotionEvent::ManualMoveCompleted);
    drop(guard);
    Ok(outcome)
}

// ─── Continuous jog ─────────────────────────────────────────────────

/// Per-axis continuous jog threads.
pub struct Jogger {
    ctx: MotionContext,
    handles: Mutex<[Option<JoinHandle<()>>; AXIS_COUNT]>,
}

impl Jogger {
    /// Jogger over `ctx`.
    pub fn new(ctx: MotionContext) -> Self {
        Self {
            ctx,
            handles: Mutex::new(Default::default()),
        }
    }

    /// Start jogging `axis`; `positive` selects the direction.
    ///
    /// Starting an axis that already jogs is a no-op.
    ///
    /// # Errors
    ///
    /// - `InvalidAxis` for an unknown axis label
    /// - `SensorTransport` while the sensor is faulted
    /// - `ActivityAlreadyRunning` while an activity holds the run flag
    pub fn start(&self, axis: &str, positive: bool) -> Result<(), TestbedError> {
        let axis: Axis = axis.parse()?;
        self.ctx.state.ensure_sensor_healthy()?;
        if !self.ctx.state.try_start_jog(axis)? {
            debug!("Axis {} already jogging", axis);
            return Ok(());
        }

        let ctx = self.ctx.clone();
        let direction = Direction::from_flag(positive);
        let spawned = thread::Builder::new()
            .name(format!("jog-{}", axis.label().to_ascii_lowercase()))
            .spawn(move || jog_loop(&ctx, axis, direction));
        match spawned {
            Ok(handle) => {
                info!("Jog started on {} ({})", axis, direction);
                // A previous thread, if any, has already seen its flag drop.
                let _ = self.handles.lock()[axis.index()].replace(handle);
                Ok(())
            }
            Err(e) => {
                self.ctx.state.stop_jog(axis);
                Err(TestbedError::Spawn(format!("jog {axis}: {e}")))
            }
        }
    }

    /// Stop jogging `axis` and wait for its last pulse to finish.
    pub fn stop(&self, axis: &str) -> Result<(), TestbedError> {
        let axis: Axis = axis.parse()?;
        self.stop_axis(axis);
        Ok(())
    }

    /// Stop every jog.
    pub fn stop_all(&self) {
        for axis in Axis::ALL {
            self.stop_axis(axis);
        }
    }

    fn stop_axis(&self, axis: Axis) {
        self.ctx.state.stop_jog(axis);
        let handle = self.handles.lock()[axis.index()].take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Jog thread of axis {} panicked", axis);
            }
            info!("Jog stopped on {}", axis);
        }
    }
}

fn jog_loop(ctx: &MotionContext, axis: Axis, direction: Direction) {
    let width = ctx.motion.jog_pulse();
    let permit = JogPermit::new(&ctx.state, axis);
    loop {
        match ctx.actuator.pulse(axis, direction, width, &permit) {
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(e) => {
                ctx.halt(&format!("jog on {axis}: {e}"));
                break;
            }
        }
    }
}

// ─── Motor check ────────────────────────────────────────────────────

/// Claim the run flag and run the motor self-check.
///
/// Refused while the sensor is faulted, like every other activity.
pub fn motor_check(ctx: &MotionContext) -> Result<(), TestbedError> {
    ctx.state.ensure_sensor_healthy()?;
    let guard = ctx.state.try_begin()?;
    run_motor_check(ctx, guard)
}

/// Motor self-check under an already-claimed run flag.
///
/// Every axis runs concurrently: a square wave in the positive direction
/// for the configured duration, then the same in the negative direction.
/// Position counters are not touched.
pub fn run_motor_check(ctx: &MotionContext, guard: RunGuard) -> Result<(), TestbedError> {
    let token = guard.token();
    ctx.events.publish(MotionEvent::MotorCheckStarted);

    let mut handles = Vec::with_capacity(AXIS_COUNT);
    for axis in Axis::ALL {
        let worker = ctx.clone();
        let token = token.clone();
        let handle = thread::Builder::new()
            .name(format!("check-{}", axis.label().to_ascii_lowercase()))
            .spawn(move || check_axis(&worker, axis, &token))
            .map_err(|e| TestbedError::Spawn(format!("motor check {axis}: {e}")));
        match handle {
            Ok(h) => handles.push((axis, h)),
            Err(e) => {
                ctx.halt(&e.to_string());
                return Err(e);
            }
        }
    }

    let mut failure = None;
    for (axis, handle) in handles {
        let result = handle
            .join()
            .unwrap_or_else(|_| Err(TestbedError::Spawn(format!("motor check {axis} panicked"))));
        if let Err(e) = result {
            failure.get_or_insert(e);
        }
    }

    if let Some(e) = failure {
        ctx.halt(&format!("motor check: {e}"));
        return Err(e);
    }
    ctx.events.publish(MotionEvent::MotorCheckCompleted);
    drop(guard);
    Ok(())
}

fn check_axis(ctx: &MotionContext, axis: Axis, token: &RunToken) -> Result<(), TestbedError> {
    let duration = ctx.motion.motor_check_duration();
    let half_period = ctx.motion.motor_check_half_period();
    for direction in [Direction::Positive, Direction::Negative] {
        let started = Instant::now();
        while started.elapsed() < duration {
            if !ctx.actuator.toggle(axis, direction, half_period, token)? {
                return Ok(());
            }
        }
    }
    Ok(())
}
