//! Hardware driver: serial force sensor and Raspberry Pi GPIO.

mod gpio;
mod serial;

pub use gpio::GpioPin;
pub use serial::SerialSensor;

use crate::driver::TestbedDriver;
use crate::state::TestbedState;
use crate::transport::{AxisPins, SensorTransport};
use gecko_common::config::{AxisPinConfig, TestbedConfig};
use gecko_common::prelude::*;
use rppal::gpio::Gpio;
use std::sync::Arc;
use tracing::info;

/// Factory function to create a hardware driver instance.
pub fn create_driver() -> Box<dyn TestbedDriver> {
    Box::new(HardwareDriver::new())
}

/// Driver for the physical rig.
pub struct HardwareDriver {
    gpio: Option<Gpio>,
}

impl HardwareDriver {
    /// Driver with the GPIO controller opened lazily.
    pub fn new() -> Self {
        Self { gpio: None }
    }

    fn gpio(&mut self) -> Result<&Gpio, TestbedError> {
        if self.gpio.is_none() {
            let gpio = Gpio::new()
                .map_err(|e| TestbedError::ActuatorTransport(format!("GPIO: {e}")))?;
            self.gpio = Some(gpio);
        }
        self.gpio
            .as_ref()
            .ok_or_else(|| TestbedError::ActuatorTransport("GPIO unavailable".to_string()))
    }
}

impl Default for HardwareDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl TestbedDriver for HardwareDriver {
    fn name(&self) -> &'static str {
        "hardware"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn open_sensor(
        &mut self,
        config: &TestbedConfig,
        _state: &Arc<TestbedState>,
    ) -> Result<Box<dyn SensorTransport>, TestbedError> {
        info!(
            "Opening sensor on {} at {} baud",
            config.sensor.port, config.sensor.baud_rate
        );
        Ok(Box::new(SerialSensor::open(&config.sensor)?))
    }

    fn open_axis(&mut self, axis: Axis, pins: AxisPinConfig) -> Result<AxisPins, TestbedError> {
        let gpio = self.gpio()?;
        let step = GpioPin::open(gpio, pins.step_pin)?;
        let dir = GpioPin::open(gpio, pins.dir_pin)?;
        info!(
            "Axis {axis}: step BCM {}, dir BCM {}",
            pins.step_pin, pins.dir_pin
        );
        Ok(AxisPins::new(Box::new(step), Box::new(dir)))
    }
}
