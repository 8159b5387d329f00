//! Error types for testbed operations.
//!
//! - `FrameError` - why a sensor frame was discarded
//! - `TestbedError` - every error surfaced by the motion engine and its
//!   collaborators

use crate::config::ConfigError;
use thiserror::Error;

/// Reasons a sensor frame is rejected.
///
/// Malformed frames are dropped by the force channel; they never stop it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Frame is not exactly [`FRAME_LEN`](crate::consts::FRAME_LEN) bytes.
    #[error("frame length {0}, expected 11")]
    WrongLength(usize),

    /// First byte is not the start marker.
    #[error("bad sync byte 0x{0:02X}")]
    BadSync(u8),

    /// Trailing bytes are not CR LF.
    #[error("bad terminator {0:02X?}")]
    BadTerminator([u8; 2]),
}

/// Error types for testbed operations.
#[derive(Debug, Clone, Error)]
pub enum TestbedError {
    /// Sensor frame failed validation.
    #[error("Malformed frame: {0}")]
    MalformedFrame(#[from] FrameError),

    /// Trigger type string not recognised.
    #[error("Unknown trigger type: {0}")]
    UnknownTriggerType(String),

    /// Comparator string not recognised.
    #[error("Unknown comparator: {0}")]
    UnknownComparator(String),

    /// Axis label not recognised.
    #[error("Invalid axis: {0}")]
    InvalidAxis(String),

    /// A motion activity already holds the run flag.
    #[error("Another motion activity is already running")]
    ActivityAlreadyRunning,

    /// Sequence document has the wrong shape.
    #[error("Invalid sequence: {0}")]
    InvalidSequence(String),

    /// Sensor byte stream cannot be read or written.
    #[error("Sensor transport failure: {0}")]
    SensorTransport(String),

    /// Step/direction outputs cannot be driven.
    #[error("Actuator transport failure: {0}")]
    ActuatorTransport(String),

    /// Run log or calibration file could not be written.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// No driver registered under the requested name.
    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    /// A worker thread could not be started.
    #[error("Failed to spawn worker: {0}")]
    Spawn(String),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl TestbedError {
    /// Whether this error means the hardware state is no longer trustworthy.
    ///
    /// Transport failures during a run halt it like an emergency stop.
    pub fn is_hardware_fault(&self) -> bool {
        matches!(
            self,
            TestbedError::SensorTransport(_) | TestbedError::ActuatorTransport(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_error_display() {
        let err = FrameError::BadSync(0x5A);
        assert_eq!(err.to_string(), "bad sync byte 0x5A");

        let err: TestbedError = FrameError::WrongLength(7).into();
        assert!(err.to_string().contains("frame length 7"));
    }

    #[test]
    fn test_hardware_fault_classification() {
        assert!(TestbedError::SensorTransport("eof".into()).is_hardware_fault());
        assert!(TestbedError::ActuatorTransport("gpio".into()).is_hardware_fault());
        assert!(!TestbedError::ActivityAlreadyRunning.is_hardware_fault());
        assert!(!TestbedError::InvalidAxis("W".into()).is_hardware_fault());
    }
}
