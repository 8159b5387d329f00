//! Simulation driver.
//!
//! Provides a software rig for development and testing without a sensor or
//! stepper drivers attached.

mod pins;
mod sensor;

pub use pins::{PinTap, RiseHook, SimulatedPin};
pub use sensor::{ContactModel, SensorTap, SimulatedSensor};

use crate::driver::TestbedDriver;
use crate::state::TestbedState;
use crate::transport::{AxisPins, SensorTransport};
use gecko_common::config::{AxisPinConfig, TestbedConfig};
use gecko_common::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Factory function to create a simulation driver instance.
pub fn create_driver() -> Box<dyn TestbedDriver> {
    Box::new(SimulationDriver::new())
}

/// Driver wiring a [`SimulatedSensor`] and [`SimulatedPin`]s together.
pub struct SimulationDriver {
    model: ContactModel,
    frame_period: Duration,
    sensor_tap: SensorTap,
    step_taps: [PinTap; AXIS_COUNT],
    dir_taps: [PinTap; AXIS_COUNT],
}

impl SimulationDriver {
    /// Driver with the default contact model and a 2 ms frame period.
    pub fn new() -> Self {
        Self {
            model: ContactModel::default(),
            frame_period: Duration::from_millis(2),
            sensor_tap: SensorTap::default(),
            step_taps: Default::default(),
            dir_taps: Default::default(),
        }
    }

    /// Builder: replace the contact model.
    pub fn with_model(mut self, model: ContactModel) -> Self {
        self.model = model;
        self
    }

    /// Builder: change the frame period.
    pub fn with_frame_period(mut self, period: Duration) -> Self {
        self.frame_period = period;
        self
    }

    /// Tap of the sensor opened by this driver.
    pub fn sensor_tap(&self) -> SensorTap {
        self.sensor_tap.clone()
    }

    /// Tap of an axis step output.
    pub fn step_tap(&self, axis: Axis) -> PinTap {
        self.step_taps[axis.index()].clone()
    }

    /// Tap of an axis direction output.
    pub fn dir_tap(&self, axis: Axis) -> PinTap {
        self.dir_taps[axis.index()].clone()
    }
}

impl Default for SimulationDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl TestbedDriver for SimulationDriver {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn open_sensor(
        &mut self,
        config: &TestbedConfig,
        state: &Arc<TestbedState>,
    ) -> Result<Box<dyn SensorTransport>, TestbedError> {
        info!(
            "Simulated sensor: contact at {} steps, {} N/step",
            self.model.contact_steps, self.model.normal_stiffness
        );
        Ok(Box::new(SimulatedSensor::new(
            Arc::clone(state),
            self.model,
            config.calibration.defaults(),
            self.frame_period,
            self.sensor_tap.clone(),
        )))
    }

    fn open_axis(&mut self, axis: Axis, pins: AxisPinConfig) -> Result<AxisPins, TestbedError> {
        let i = axis.index();
        Ok(AxisPins::new(
            Box::new(SimulatedPin::new(
                format!("{axis}.step (BCM {})", pins.step_pin),
                self.step_taps[i].clone(),
            )),
            Box::new(SimulatedPin::new(
                format!("{axis}.dir (BCM {})", pins.dir_pin),
                self.dir_taps[i].clone(),
            )),
        ))
    }

    fn sensor_init_delays(&self) -> bool {
        false
    }
}
