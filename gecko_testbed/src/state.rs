//! Shared testbed state.
//!
//! One [`TestbedState`] is shared by the poller, the axis executors, the
//! orchestrator and the operator facade. It holds:
//!
//! - the run flag, as an activity ticket so that a stale activity can never
//!   clear the flag of a newer one
//! - the emergency and sensor-fault flags
//! - the latest force reading and the active calibration
//! - per-axis position counters and jog flags

use gecko_common::prelude::*;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

/// Ticket value meaning no activity holds the run flag.
const IDLE: u64 = 0;

/// State shared by all testbed threads.
pub struct TestbedState {
    active: AtomicU64,
    next_ticket: AtomicU64,
    emergency: AtomicBool,
    sensor_fault: AtomicBool,
    latest_force: RwLock<ForceReading>,
    calibration: RwLock<CalibrationProfile>,
    positions: [AtomicI64; AXIS_COUNT],
    jogging: [AtomicBool; AXIS_COUNT],
}

impl TestbedState {
    /// Idle state with zeroed counters.
    pub fn new(calibration: CalibrationProfile) -> Self {
        Self {
            active: AtomicU64::new(IDLE),
            next_ticket: AtomicU64::new(1),
            emergency: AtomicBool::new(false),
            sensor_fault: AtomicBool::new(false),
            latest_force: RwLock::new(ForceReading::default()),
            calibration: RwLock::new(calibration),
            positions: Default::default(),
            jogging: Default::default(),
        }
    }

    // ─── Run flag ───────────────────────────────────────────────────

    /// Take the run flag for a new motion activity.
    ///
    /// # Errors
    ///
    /// `ActivityAlreadyRunning` if another activity holds the flag or an
    /// axis is jogging.
    pub fn try_begin(self: &Arc<Self>) -> Result<RunGuard, TestbedError> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        self.active
            .compare_exchange(IDLE, ticket, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| TestbedError::ActivityAlreadyRunning)?;

        if self.any_jogging() {
            self.release(ticket);
            return Err(TestbedError::ActivityAlreadyRunning);
        }

        self.emergency.store(false, Ordering::SeqCst);
        Ok(RunGuard {
            token: RunToken {
                ticket,
                state: Arc::clone(self),
            },
        })
    }

    /// Whether any activity holds the run flag.
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst) != IDLE
    }

    /// Clear the run flag without raising the emergency flag.
    pub fn stop(&self) {
        self.active.store(IDLE, Ordering::SeqCst);
    }

    /// Clear the run flag, stop all jogs and raise the emergency flag.
    pub fn halt(&self) {
        self.active.store(IDLE, Ordering::SeqCst);
        self.emergency.store(true, Ordering::SeqCst);
        for flag in &self.jogging {
            flag.store(false, Ordering::SeqCst);
        }
    }

    /// Whether the last activity ended by emergency stop.
    pub fn emergency_raised(&self) -> bool {
        self.emergency.load(Ordering::SeqCst)
    }

    fn release(&self, ticket: u64) {
        let _ = self
            .active
            .compare_exchange(ticket, IDLE, Ordering::SeqCst, Ordering::SeqCst);
    }

    // ─── Sensor ─────────────────────────────────────────────────────

    /// Replace the latest reading.
    pub fn publish_force(&self, reading: ForceReading) {
        *self.latest_force.write() = reading;
    }

    /// Latest decoded reading.
    pub fn latest_force(&self) -> ForceReading {
        *self.latest_force.read()
    }

    /// Active calibration.
    pub fn calibration(&self) -> CalibrationProfile {
        *self.calibration.read()
    }

    /// Swap the active calibration.
    pub fn set_calibration(&self, profile: CalibrationProfile) {
        *self.calibration.write() = profile;
    }

    /// Record whether the sensor link has failed.
    pub fn set_sensor_fault(&self, fault: bool) {
        self.sensor_fault.store(fault, Ordering::SeqCst);
    }

    /// Whether the sensor link has failed.
    pub fn sensor_fault(&self) -> bool {
        self.sensor_fault.load(Ordering::SeqCst)
    }

    /// Fail fast when readings can no longer be trusted.
    pub fn ensure_sensor_healthy(&self) -> Result<(), TestbedError> {
        if self.sensor_fault() {
            return Err(TestbedError::SensorTransport(
                "sensor link is down".to_string(),
            ));
        }
        Ok(())
    }

    // ─── Positions ──────────────────────────────────────────────────

    /// Counter of one axis.
    pub fn position(&self, axis: Axis) -> i64 {
        self.positions[axis.index()].load(Ordering::SeqCst)
    }

    /// All counters in X, Y, Z order.
    pub fn positions(&self) -> [i64; AXIS_COUNT] {
        Axis::ALL.map(|a| self.position(a))
    }

    /// Add `delta` to an axis counter and return the new value.
    pub fn apply_position_delta(&self, axis: Axis, delta: i64) -> i64 {
        self.positions[axis.index()].fetch_add(delta, Ordering::SeqCst) + delta
    }

    /// Zero every counter.
    pub fn reset_positions(&self) {
        for p in &self.positions {
            p.store(0, Ordering::SeqCst);
        }
    }

    // ─── Jog flags ──────────────────────────────────────────────────

    /// Mark an axis as jogging.
    ///
    /// Returns `Ok(false)` if it already was.
    ///
    /// # Errors
    ///
    /// `ActivityAlreadyRunning` while an activity holds the run flag.
    pub fn try_start_jog(&self, axis: Axis) -> Result<bool, TestbedError> {
        let flag = &self.jogging[axis.index()];
        if flag.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        if self.is_running() {
            flag.store(false, Ordering::SeqCst);
            return Err(TestbedError::ActivityAlreadyRunning);
        }
        Ok(true)
    }

    /// Clear an axis jog flag.
    pub fn stop_jog(&self, axis: Axis) {
        self.jogging[axis.index()].store(false, Ordering::SeqCst);
    }

    /// Whether an axis is jogging.
    pub fn is_jogging(&self, axis: Axis) -> bool {
        self.jogging[axis.index()].load(Ordering::SeqCst)
    }

    /// Whether any axis is jogging.
    pub fn any_jogging(&self) -> bool {
        Axis::ALL.iter().any(|a| self.is_jogging(*a))
    }
}

/// Right to drive the outputs, checked again before every pulse.
pub trait MotionPermit {
    /// Whether motion is still allowed.
    fn is_live(&self) -> bool;
}

/// Permit of one jogging axis; lapses when its jog flag drops.
pub struct JogPermit<'a> {
    state: &'a TestbedState,
    axis: Axis,
}

impl<'a> JogPermit<'a> {
    /// Permit tied to the jog flag of `axis`.
    pub fn new(state: &'a TestbedState, axis: Axis) -> Self {
        Self { state, axis }
    }
}

impl MotionPermit for JogPermit<'_> {
    fn is_live(&self) -> bool {
        self.state.is_jogging(self.axis)
    }
}

/// Cheap, cloneable view of one activity's hold on the run flag.
#[derive(Clone)]
pub struct RunToken {
    ticket: u64,
    state: Arc<TestbedState>,
}

impl RunToken {
    /// Whether this activity still holds the run flag.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.state.active.load(Ordering::SeqCst) == self.ticket
    }
}

impl MotionPermit for RunToken {
    fn is_live(&self) -> bool {
        RunToken::is_live(self)
    }
}

/// Ownership of the run flag; releases it on drop if still held.
pub struct RunGuard {
    token: RunToken,
}

impl RunGuard {
    /// Token for worker threads.
    pub fn token(&self) -> RunToken {
        self.token.clone()
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.token.state.release(self.token.ticket);
    }
}
