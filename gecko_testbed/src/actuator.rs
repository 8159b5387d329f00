//! Step pulse generation and position counting.
//!
//! Each axis has its own lock, so axes pulse concurrently. A lock is held
//! only while pins are written, never across the pulse sleep. A pulse starts
//! only if its permit is still live under that lock, so once a halt has
//! idled an axis no new pulse begins on it.

use crate::events::EventBus;
use crate::state::{MotionPermit, RunToken, TestbedState};
use crate::transport::{AxisPins, Level};
use gecko_common::prelude::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Drives the step/direction outputs of all axes.
pub struct Actuator {
    axes: [Mutex<AxisPins>; AXIS_COUNT],
    state: Arc<TestbedState>,
    events: Arc<EventBus>,
    settle: Duration,
}

impl Actuator {
    /// Actuator over the pins of X, Y and Z (in that order).
    pub fn new(
        pins: [AxisPins; AXIS_COUNT],
        state: Arc<TestbedState>,
        events: Arc<EventBus>,
        settle: Duration,
    ) -> Self {
        Self {
            axes: pins.map(Mutex::new),
            state,
            events,
            settle,
        }
    }

    /// Set direction and raise the step output, unless `permit` has lapsed.
    fn rise(
        &self,
        axis: Axis,
        direction: Direction,
        permit: &impl MotionPermit,
    ) -> Result<bool, TestbedError> {
        let mut pins = self.axes[axis.index()].lock();
        if !permit.is_live() {
            return Ok(false);
        }
        pins.dir.set(Level::from_bool(direction.pin_high()))?;
        pins.step.set(Level::High)?;
        Ok(true)
    }

    fn fall(&self, axis: Axis) -> Result<(), TestbedError> {
        self.axes[axis.index()].lock().step.set(Level::Low)
    }

    /// Issue one step pulse and update the axis counter.
    ///
    /// Sets the direction, holds the step output high for `width`, drives it
    /// low and waits the settle time. Returns the new counter value, or
    /// `None` without touching the outputs if `permit` has lapsed.
    pub fn pulse(
        &self,
        axis: Axis,
        direction: Direction,
        width: Duration,
        permit: &impl MotionPermit,
    ) -> Result<Option<i64>, TestbedError> {
        if !self.rise(axis, direction, permit)? {
            return Ok(None);
        }
        thread::sleep(width);
        self.fall(axis)?;
        thread::sleep(self.settle);

        let position = self
            .state
            .apply_position_delta(axis, direction.position_delta());
        self.events.step_count();
        Ok(Some(position))
    }

    /// One square-wave period without counting (motor check).
    ///
    /// Returns `false` without touching the outputs if `permit` has lapsed.
    pub fn toggle(
        &self,
        axis: Axis,
        direction: Direction,
        half_period: Duration,
        permit: &impl MotionPermit,
    ) -> Result<bool, TestbedError> {
        if !self.rise(axis, direction, permit)? {
            return Ok(false);
        }
        thread::sleep(half_period);
        self.fall(axis)?;
        thread::sleep(half_period);
        Ok(true)
    }

    /// Pulse an axis until its counter is zero.
    ///
    /// Returns `Ok(false)` if `token` lost the run flag first.
    pub fn return_to_zero(
        &self,
        axis: Axis,
        width: Duration,
        token: &RunToken,
    ) -> Result<bool, TestbedError> {
        let start = self.state.position(axis);
        let mut position = start;
        while position != 0 {
            match self.pulse(axis, Direction::towards_zero(position), width, token)? {
                Some(next) => position = next,
                None => return Ok(false),
            }
        }
        if start != 0 {
            debug!("Axis {} returned to zero from {}", axis, start);
        }
        Ok(true)
    }

    /// Drive every output low.
    ///
    /// All axes are attempted; the first failure is returned.
    pub fn idle_all(&self) -> Result<(), TestbedError> {
        let mut first = Ok(());
        for axis in Axis::ALL {
            if let Err(e) = self.axes[axis.index()].lock().idle() {
                warn!("Axis {} outputs not idled: {}", axis, e);
                if first.is_ok() {
                    first = Err(e);
                }
            }
        }
        first
    }
}
