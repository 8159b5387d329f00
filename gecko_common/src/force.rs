//! Force readings and calibration profiles.

use crate::axis::ForceAxis;
use crate::consts::{DEFAULT_FX_FACTOR, DEFAULT_FY_FACTOR, DEFAULT_FZ_FACTOR};
use crate::error::TestbedError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Round to two decimal places, the resolution of every published force.
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Calibrated force snapshot [N].
///
/// Immutable; a new reading replaces the shared latest value as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ForceReading {
    /// Force along X.
    #[serde(rename = "Fx")]
    pub fx: f64,
    /// Force along Y.
    #[serde(rename = "Fy")]
    pub fy: f64,
    /// Force along Z.
    #[serde(rename = "Fz")]
    pub fz: f64,
    /// Shear magnitude, derived from `fx` and `fy`.
    #[serde(rename = "F_shear")]
    pub shear: f64,
}

impl ForceReading {
    /// Build a reading from components, rounding each and deriving shear.
    pub fn new(fx: f64, fy: f64, fz: f64) -> Self {
        let fx = round2(fx);
        let fy = round2(fy);
        Self {
            fx,
            fy,
            fz: round2(fz),
            shear: round2((fx * fx + fy * fy).sqrt()),
        }
    }

    /// Value of one component.
    #[inline]
    pub fn component(&self, axis: ForceAxis) -> f64 {
        match axis {
            ForceAxis::Fx => self.fx,
            ForceAxis::Fy => self.fy,
            ForceAxis::Fz => self.fz,
            ForceAxis::Shear => self.shear,
        }
    }
}

impl fmt::Display for ForceReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{Fx: {:.2}, Fy: {:.2}, Fz: {:.2}, F_shear: {:.2}}}",
            self.fx, self.fy, self.fz, self.shear
        )
    }
}

/// One value per sensor channel, keyed `Fx`/`Fy`/`Fz` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelValues {
    /// Fx channel.
    #[serde(rename = "Fx")]
    pub fx: f64,
    /// Fy channel.
    #[serde(rename = "Fy")]
    pub fy: f64,
    /// Fz channel.
    #[serde(rename = "Fz")]
    pub fz: f64,
}

impl ChannelValues {
    /// Same value on every channel.
    pub const fn splat(value: f64) -> Self {
        Self {
            fx: value,
            fy: value,
            fz: value,
        }
    }

    fn all_finite(&self) -> bool {
        self.fx.is_finite() && self.fy.is_finite() && self.fz.is_finite()
    }
}

/// Sensor calibration: scale factors [N/V] and offsets [N] per channel.
///
/// # JSON Example
///
/// ```json
/// {
///   "calibration_factors": {"Fx": 20.0, "Fy": 20.0, "Fz": 20.41},
///   "calibration_offsets": {"Fx": 0.0, "Fy": 0.0, "Fz": 0.0}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    /// Newtons per volt.
    #[serde(rename = "calibration_factors")]
    pub factors: ChannelValues,
    /// Subtracted after scaling.
    #[serde(rename = "calibration_offsets", default = "zero_offsets")]
    pub offsets: ChannelValues,
}

fn zero_offsets() -> ChannelValues {
    ChannelValues::splat(0.0)
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self {
            factors: ChannelValues {
                fx: DEFAULT_FX_FACTOR,
                fy: DEFAULT_FY_FACTOR,
                fz: DEFAULT_FZ_FACTOR,
            },
            offsets: zero_offsets(),
        }
    }
}

impl CalibrationProfile {
    /// Profile with the given factors and zero offsets.
    pub fn with_factors(fx: f64, fy: f64, fz: f64) -> Self {
        Self {
            factors: ChannelValues { fx, fy, fz },
            offsets: zero_offsets(),
        }
    }

    /// Reject non-finite or zero factors and non-finite offsets.
    pub fn validate(&self) -> Result<(), TestbedError> {
        let f = &self.factors;
        if !f.all_finite() || f.fx == 0.0 || f.fy == 0.0 || f.fz == 0.0 {
            return Err(TestbedError::Config(
                crate::config::ConfigError::ValidationError(format!(
                    "calibration factors must be finite and non-zero, got {f:?}"
                )),
            ));
        }
        if !self.offsets.all_finite() {
            return Err(TestbedError::Config(
                crate::config::ConfigError::ValidationError(
                    "calibration offsets must be finite".to_string(),
                ),
            ));
        }
        Ok(())
    }

    /// Convert channel voltages to a calibrated reading.
    pub fn apply(&self, volts: ChannelValues) -> ForceReading {
        ForceReading::new(
            volts.fx * self.factors.fx - self.offsets.fx,
            volts.fy * self.factors.fy - self.offsets.fy,
            volts.fz * self.factors.fz - self.offsets.fz,
        )
    }

    /// Inverse of [`apply`](Self::apply) for one set of forces.
    pub fn volts_for(&self, fx: f64, fy: f64, fz: f64) -> ChannelValues {
        ChannelValues {
            fx: (fx + self.offsets.fx) / self.factors.fx,
            fy: (fy + self.offsets.fy) / self.factors.fy,
            fz: (fz + self.offsets.fz) / self.factors.fz,
        }
    }
}

impl fmt::Display for CalibrationProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "factors {{Fx: {}, Fy: {}, Fz: {}}} offsets {{Fx: {}, Fy: {}, Fz: {}}}",
            self.factors.fx,
            self.factors.fy,
            self.factors.fz,
            self.offsets.fx,
            self.offsets.fy,
            self.offsets.fz
        )
    }
}
