//! Bang-bang force hold.
//!
//! Compares the axis force component with the target and issues correction
//! pulses until it is within tolerance. Force above target backs off
//! (positive direction), force below target presses in (negative).

use crate::context::MotionContext;
use crate::state::RunToken;
use gecko_common::prelude::*;

/// How a hold correction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldOutcome {
    /// Force is within tolerance of the target.
    OnTarget,
    /// The run flag was lost.
    Cancelled,
}

/// Direction that moves the force towards `target`, `None` when on target.
#[inline]
pub fn correction(current: f64, target: f64, tolerance: f64) -> Option<Direction> {
    let error = current - target;
    if error.abs() <= tolerance {
        None
    } else if error > 0.0 {
        Some(Direction::Positive)
    } else {
        Some(Direction::Negative)
    }
}

/// Pulse `axis` until its force component is within tolerance of `target`.
pub fn hold_force(
    ctx: &MotionContext,
    axis: Axis,
    target: f64,
    token: &RunToken,
) -> Result<HoldOutcome, TestbedError> {
    let width = ctx.motion.hold_pulse();
    let tolerance = ctx.motion.hold_tolerance;
    loop {
        if !token.is_live() {
            return Ok(HoldOutcome::Cancelled);
        }
        let current = ctx.state.latest_force().component(axis.force_axis());
        match correction(current, target, tolerance) {
            None => return Ok(HoldOutcome::OnTarget),
            Some(direction) => {
                if ctx.actuator.pulse(axis, direction, width, token)?.is_none() {
                    return Ok(HoldOutcome::Cancelled);
                }
            }
        }
    }
}
