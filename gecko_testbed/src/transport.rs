//! Byte-stream and digital-output seams.
//!
//! Everything above this module talks to hardware only through
//! [`SensorTransport`] and [`OutputPin`], so the motion engine runs unchanged
//! against the simulation driver or a real serial port and GPIO header.

use gecko_common::prelude::*;

/// Bidirectional byte stream to the force sensor.
///
/// # Contract
///
/// - `read` blocks for at most the configured timeout and returns `Ok(0)`
///   when no byte arrived in time
/// - Any other failure is reported as `TestbedError::SensorTransport`
pub trait SensorTransport: Send {
    /// Transport identifier for logs (device path, "simulation", ...).
    fn name(&self) -> &str;

    /// Read available bytes into `buf`.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TestbedError>;

    /// Write a complete command.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TestbedError>;

    /// Release the underlying device.
    fn close(&mut self) -> Result<(), TestbedError> {
        Ok(())
    }
}

/// Output level of a digital pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Logic 0.
    Low,
    /// Logic 1.
    High,
}

impl Level {
    /// `High` for `true`.
    #[inline]
    pub const fn from_bool(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }
}

/// A single digital output.
pub trait OutputPin: Send {
    /// Drive the pin; failures are `TestbedError::ActuatorTransport`.
    fn set(&mut self, level: Level) -> Result<(), TestbedError>;
}

/// Step and direction outputs of one axis driver.
pub struct AxisPins {
    /// Rising edge advances the motor one step.
    pub step: Box<dyn OutputPin>,
    /// Selects rotation direction.
    pub dir: Box<dyn OutputPin>,
}

impl AxisPins {
    /// Bundle two outputs.
    pub fn new(step: Box<dyn OutputPin>, dir: Box<dyn OutputPin>) -> Self {
        Self { step, dir }
    }

    /// Drive both outputs low.
    pub fn idle(&mut self) -> Result<(), TestbedError> {
        let step = self.step.set(Level::Low);
        let dir = self.dir.set(Level::Low);
        step.and(dir)
    }
}
