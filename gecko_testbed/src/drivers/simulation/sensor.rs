//! Simulated force sensor.
//!
//! Frames are synthesised from a linear spring contact model evaluated at
//! the current axis position counters, so closed-loop behaviour (break on
//! force, hold force) works without hardware.

use crate::sensor::frame::{RawSample, encode_frame};
use crate::state::TestbedState;
use crate::transport::SensorTransport;
use gecko_common::prelude::*;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

/// Spring contact between the specimen and the substrate.
///
/// Z counts up when pressing in. Below `contact_steps` there is no force;
/// past it Fz grows linearly with depth and Fx/Fy with the shear offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactModel {
    /// Z position at first contact [steps].
    pub contact_steps: i64,
    /// Normal stiffness [N/step].
    pub normal_stiffness: f64,
    /// Shear stiffness while in contact [N/step].
    pub shear_stiffness: f64,
}

impl Default for ContactModel {
    fn default() -> Self {
        Self {
            contact_steps: 50,
            normal_stiffness: 0.05,
            shear_stiffness: 0.02,
        }
    }
}

impl ContactModel {
    /// Force at the given X/Y/Z positions.
    pub fn force_at(&self, positions: [i64; AXIS_COUNT]) -> ForceReading {
        let depth = positions[Axis::Z.index()] - self.contact_steps;
        if depth <= 0 {
            return ForceReading::default();
        }
        ForceReading::new(
            self.shear_stiffness * positions[Axis::X.index()] as f64,
            self.shear_stiffness * positions[Axis::Y.index()] as f64,
            self.normal_stiffness * depth as f64,
        )
    }
}

#[derive(Default)]
struct SensorShared {
    forced: Mutex<Option<ForceReading>>,
    failing: AtomicBool,
    commands: Mutex<Vec<Vec<u8>>>,
}

/// Observer and fault injector for a [`SimulatedSensor`].
#[derive(Clone, Default)]
pub struct SensorTap {
    inner: Arc<SensorShared>,
}

impl SensorTap {
    /// Report `reading` instead of the contact model until cleared.
    pub fn force(&self, reading: Option<ForceReading>) {
        *self.inner.forced.lock() = reading;
    }

    /// Make subsequent reads and writes fail.
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    /// Commands written to the sensor so far.
    pub fn commands(&self) -> Vec<Vec<u8>> {
        self.inner.commands.lock().clone()
    }
}

/// Sensor transport backed by a [`ContactModel`].
pub struct SimulatedSensor {
    state: Arc<TestbedState>,
    model: ContactModel,
    calibration: CalibrationProfile,
    frame_period: Duration,
    tap: SensorTap,
    pending: VecDeque<u8>,
}

impl SimulatedSensor {
    /// Sensor emitting one frame every `frame_period`.
    ///
    /// `calibration` converts model forces to channel voltages; it is the
    /// simulated sensor's own characteristic and does not follow later
    /// recalibration.
    pub fn new(
        state: Arc<TestbedState>,
        model: ContactModel,
        calibration: CalibrationProfile,
        frame_period: Duration,
        tap: SensorTap,
    ) -> Self {
        Self {
            state,
            model,
            calibration,
            frame_period,
            tap,
            pending: VecDeque::with_capacity(FRAME_LEN),
        }
    }

    fn check_failing(&self) -> Result<(), TestbedError> {
        if self.tap.inner.failing.load(Ordering::SeqCst) {
            return Err(TestbedError::SensorTransport(
                "simulated link failure".to_string(),
            ));
        }
        Ok(())
    }

    fn next_frame(&mut self) {
        std::thread::sleep(self.frame_period);
        let forced = *self.tap.inner.forced.lock();
        let force = forced.unwrap_or_else(|| self.model.force_at(self.state.positions()));
        let volts = self.calibration.volts_for(force.fx, force.fy, force.fz);
        self.pending
            .extend(encode_frame(RawSample::from_volts(volts)));
    }
}

impl SensorTransport for SimulatedSensor {
    fn name(&self) -> &str {
        "simulation"
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TestbedError> {
        self.check_failing()?;
        if self.pending.is_empty() {
            self.next_frame();
        }
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TestbedError> {
        self.check_failing()?;
        debug!("Simulated sensor command {:02X?}", bytes);
        self.tap.inner.commands.lock().push(bytes.to_vec());
        Ok(())
    }
}
