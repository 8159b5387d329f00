//! Configuration loading traits and types.
//!
//! This module provides the TOML configuration of the testbed and a blanket
//! loader usable by any deserializable configuration struct.
//!
//! # Usage
//!
//! ```rust,no_run
//! use gecko_common::config::{ConfigLoader, TestbedConfig, ConfigError};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = TestbedConfig::load(Path::new("testbed.toml"))?;
//!     config.validate()?;
//!     println!("Sensor on {}", config.sensor.port);
//!     Ok(())
//! }
//! ```

use crate::axis::Axis;
use crate::consts::{
    DEFAULT_BAUD_RATE, DEFAULT_HOLD_TOLERANCE, DEFAULT_MAX_FORCE_LIMIT, DEFAULT_SERIAL_PORT,
};
use crate::force::{CalibrationProfile, ChannelValues};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Why a configuration could not be used.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// No file at the given path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// Unreadable file or invalid TOML.
    #[error("Invalid configuration file: {0}")]
    ParseError(String),

    /// Values parse but are unusable.
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Diagnostic log verbosity, written in lowercase in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Per-frame and per-pulse detail.
    Trace,
    /// Dropped frames, trigger evaluation.
    Debug,
    /// Run lifecycle.
    #[default]
    Info,
    /// Recoverable problems.
    Warn,
    /// Halts and lost run logs.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Common fields shared by every testbed process.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "gecko-testbed-lab2"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Name of this testbed instance, used in diagnostics.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_service_name() -> String {
    "gecko-testbed".to_string()
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
        }
    }
}

impl SharedConfig {
    /// Reject an empty `service_name`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "shared.service_name is empty".into(),
            ));
        }
        Ok(())
    }
}

/// Force sensor link and safety ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensorConfig {
    /// Serial device path.
    pub port: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Blocking read timeout [ms]; a timed-out read yields no data.
    pub read_timeout_ms: u64,
    /// Sleep between decoded frames in the poller [ms].
    pub poll_interval_ms: u64,
    /// Longest gap between valid frames before the link counts as lost [ms].
    pub stale_after_ms: u64,
    /// Hard force ceiling [N]; any force trigger fires above it.
    pub max_force_limit: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERIAL_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: 1000,
            poll_interval_ms: 10,
            stale_after_ms: 2000,
            max_force_limit: DEFAULT_MAX_FORCE_LIMIT,
        }
    }
}

impl SensorConfig {
    /// Poller sleep after each reading.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Silence after which the sensor is declared lost.
    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

/// Calibration defaults and where recalibrations are stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalibrationConfig {
    /// JSON calibration record, loaded at startup when present.
    pub file: PathBuf,
    /// Factors [N/V] used when the file is absent.
    pub calibration_factors: ChannelValues,
    /// Offsets [N] used when the file is absent.
    pub calibration_offsets: ChannelValues,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        let profile = CalibrationProfile::default();
        Self {
            file: PathBuf::from("calibration.json"),
            calibration_factors: profile.factors,
            calibration_offsets: profile.offsets,
        }
    }
}

impl CalibrationConfig {
    /// Profile built from the configured defaults.
    pub fn defaults(&self) -> CalibrationProfile {
        CalibrationProfile {
            factors: self.calibration_factors,
            offsets: self.calibration_offsets,
        }
    }
}

/// Motion timing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MotionConfig {
    /// Step output low time after each pulse [ms].
    pub settle_ms: u64,
    /// Pulse width of hold-force corrections [ms].
    pub hold_pulse_ms: u64,
    /// Hold target band [N].
    pub hold_tolerance: f64,
    /// Pulse width used when returning axes to zero [ms].
    pub reset_pulse_ms: u64,
    /// Orchestrator wait-for-axes poll interval [ms].
    pub orchestrator_poll_ms: u64,
    /// Idle sleep of trigger-waiting loops [ms].
    pub trigger_poll_ms: u64,
    /// Continuous jog pulse width [ms].
    pub jog_pulse_ms: u64,
    /// Motor check run time per direction [s].
    pub motor_check_secs: f64,
    /// Motor check half-period [ms].
    pub motor_check_half_period_ms: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            settle_ms: 1,
            hold_pulse_ms: 20,
            hold_tolerance: DEFAULT_HOLD_TOLERANCE,
            reset_pulse_ms: 1,
            orchestrator_poll_ms: 100,
            trigger_poll_ms: 1,
            jog_pulse_ms: 1,
            motor_check_secs: 3.0,
            motor_check_half_period_ms: 10,
        }
    }
}

impl MotionConfig {
    /// Settle time as a `Duration`.
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Hold correction pulse width.
    pub fn hold_pulse(&self) -> Duration {
        Duration::from_millis(self.hold_pulse_ms)
    }

    /// Reset pulse width.
    pub fn reset_pulse(&self) -> Duration {
        Duration::from_millis(self.reset_pulse_ms)
    }

    /// Orchestrator poll interval.
    pub fn orchestrator_poll(&self) -> Duration {
        Duration::from_millis(self.orchestrator_poll_ms)
    }

    /// Trigger poll interval.
    pub fn trigger_poll(&self) -> Duration {
        Duration::from_millis(self.trigger_poll_ms)
    }

    /// Jog pulse width.
    pub fn jog_pulse(&self) -> Duration {
        Duration::from_millis(self.jog_pulse_ms)
    }

    /// Motor check run time per direction.
    pub fn motor_check_duration(&self) -> Duration {
        Duration::from_secs_f64(self.motor_check_secs.max(0.0))
    }

    /// Motor check half-period.
    pub fn motor_check_half_period(&self) -> Duration {
        Duration::from_millis(self.motor_check_half_period_ms)
    }
}

/// BCM pin numbers of one axis driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AxisPinConfig {
    /// Step output.
    pub step_pin: u8,
    /// Direction output.
    pub dir_pin: u8,
}

/// Pin assignment of all axes.
///
/// # TOML Example
///
/// ```toml
/// [axes.X]
/// step_pin = 24
/// dir_pin = 25
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AxesConfig {
    /// X axis pins.
    #[serde(rename = "X")]
    pub x: AxisPinConfig,
    /// Y axis pins.
    #[serde(rename = "Y")]
    pub y: AxisPinConfig,
    /// Z axis pins.
    #[serde(rename = "Z")]
    pub z: AxisPinConfig,
}

impl Default for AxesConfig {
    fn default() -> Self {
        Self {
            x: AxisPinConfig {
                step_pin: 24,
                dir_pin: 25,
            },
            y: AxisPinConfig {
                step_pin: 16,
                dir_pin: 26,
            },
            z: AxisPinConfig {
                step_pin: 27,
                dir_pin: 17,
            },
        }
    }
}

impl AxesConfig {
    /// Pins of one axis.
    pub fn pins(&self, axis: Axis) -> AxisPinConfig {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

/// Run-log output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Directory receiving one `log_<timestamp>.txt` per run.
    pub log_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("."),
        }
    }
}

/// Complete testbed configuration.
///
/// Every section is optional; omitted values take the lab defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestbedConfig {
    /// Common fields.
    pub shared: SharedConfig,
    /// Force sensor link.
    pub sensor: SensorConfig,
    /// Calibration defaults.
    pub calibration: CalibrationConfig,
    /// Motion timing.
    pub motion: MotionConfig,
    /// Pin assignment.
    pub axes: AxesConfig,
    /// Run logs.
    pub logging: LoggingConfig,
}

impl TestbedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `service_name` is empty
    /// - the force limit is not positive
    /// - a timing that paces a loop is zero
    /// - calibration defaults are not finite and non-zero
    /// - two outputs share a pin
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        let limit = self.sensor.max_force_limit;
        if !(limit.is_finite() && limit > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "sensor.max_force_limit must be positive, got {limit}"
            )));
        }
        if self.sensor.baud_rate == 0 {
            return Err(ConfigError::ValidationError(
                "sensor.baud_rate cannot be zero".to_string(),
            ));
        }
        if self.sensor.stale_after_ms <= self.sensor.read_timeout_ms {
            return Err(ConfigError::ValidationError(format!(
                "sensor.stale_after_ms ({}) must exceed sensor.read_timeout_ms ({})",
                self.sensor.stale_after_ms, self.sensor.read_timeout_ms
            )));
        }

        let m = &self.motion;
        for (name, value) in [
            ("motion.orchestrator_poll_ms", m.orchestrator_poll_ms),
            ("motion.trigger_poll_ms", m.trigger_poll_ms),
            ("motion.hold_pulse_ms", m.hold_pulse_ms),
            ("motion.reset_pulse_ms", m.reset_pulse_ms),
            ("motion.jog_pulse_ms", m.jog_pulse_ms),
            ("motion.motor_check_half_period_ms", m.motor_check_half_period_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        if !(m.hold_tolerance.is_finite() && m.hold_tolerance > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "motion.hold_tolerance must be positive, got {}",
                m.hold_tolerance
            )));
        }

        self.calibration
            .defaults()
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        let mut pins = HashSet::new();
        for axis in Axis::ALL {
            let p = self.axes.pins(axis);
            for pin in [p.step_pin, p.dir_pin] {
                if !pins.insert(pin) {
                    return Err(ConfigError::ValidationError(format!(
                        "pin {pin} assigned twice (axis {axis})"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Load the file if it exists, otherwise return defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::FileNotFound) => {
                tracing::info!("No configuration at {:?}, using defaults", path);
                Ok(Self::default())
            }
            other => other,
        }
    }
}

/// TOML loading for any deserializable configuration type.
///
/// A missing file is `FileNotFound`; anything else that stops parsing is
/// `ParseError`. Validation is left to the caller.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Read and parse `path`.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::FileNotFound);
            }
            Err(e) => return Err(ConfigError::ParseError(format!("{}: {e}", path.display()))),
        };
        toml::from_str(&text).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
