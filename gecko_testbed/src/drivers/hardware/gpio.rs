//! Raspberry Pi GPIO outputs.

use crate::transport::{Level, OutputPin};
use gecko_common::prelude::*;
use rppal::gpio::Gpio;

/// One BCM-numbered output.
pub struct GpioPin {
    pin: rppal::gpio::OutputPin,
}

impl GpioPin {
    /// Claim `bcm` as an output, initially low.
    pub fn open(gpio: &Gpio, bcm: u8) -> Result<Self, TestbedError> {
        let pin = gpio
            .get(bcm)
            .map_err(|e| TestbedError::ActuatorTransport(format!("BCM {bcm}: {e}")))?
            .into_output_low();
        Ok(Self { pin })
    }
}

impl OutputPin for GpioPin {
    fn set(&mut self, level: Level) -> Result<(), TestbedError> {
        match level {
            Level::High => self.pin.set_high(),
            Level::Low => self.pin.set_low(),
        }
        Ok(())
    }
}
