//! Axis labels, movement direction and force components.

use crate::error::TestbedError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three stepper-driven axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Axis {
    /// Shear axis along Fx.
    X,
    /// Shear axis along Fy.
    Y,
    /// Normal (loading) axis along Fz.
    Z,
}

impl Axis {
    /// All axes in canonical order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Dense index for per-axis arrays.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Force component measured along this axis (X → Fx).
    #[inline]
    pub const fn force_axis(self) -> ForceAxis {
        match self {
            Axis::X => ForceAxis::Fx,
            Axis::Y => ForceAxis::Fy,
            Axis::Z => ForceAxis::Fz,
        }
    }

    /// Upper-case label.
    pub const fn label(self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Axis {
    type Err = TestbedError;

    /// Accepts `X`, `Y`, `Z` in either case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "X" => Ok(Axis::X),
            "Y" => Ok(Axis::Y),
            "Z" => Ok(Axis::Z),
            _ => Err(TestbedError::InvalidAxis(s.to_string())),
        }
    }
}

/// Human-readable movement direction.
///
/// The direction output is driven high for `Positive`. Position counters use
/// the opposite sign: a `Negative` pulse increments the stored position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Direction pin high.
    Positive,
    /// Direction pin low.
    Negative,
}

impl Direction {
    /// Map the UI jog flag (`true` = positive).
    #[inline]
    pub const fn from_flag(positive: bool) -> Self {
        if positive {
            Direction::Positive
        } else {
            Direction::Negative
        }
    }

    /// Get the opposite direction.
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Direction::Positive => Direction::Negative,
            Direction::Negative => Direction::Positive,
        }
    }

    /// Level of the direction output.
    #[inline]
    pub const fn pin_high(self) -> bool {
        matches!(self, Direction::Positive)
    }

    /// Change applied to the position counter by one pulse.
    #[inline]
    pub const fn position_delta(self) -> i64 {
        match self {
            Direction::Negative => 1,
            Direction::Positive => -1,
        }
    }

    /// Direction whose pulses move the counter from `position` towards zero.
    #[inline]
    pub const fn towards_zero(position: i64) -> Self {
        if position > 0 {
            Direction::Positive
        } else {
            Direction::Negative
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Positive => f.write_str("positive"),
            Direction::Negative => f.write_str("negative"),
        }
    }
}

/// A measured force component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForceAxis {
    /// Force along X.
    Fx,
    /// Force along Y.
    Fy,
    /// Force along Z.
    Fz,
    /// Shear magnitude `sqrt(Fx² + Fy²)`.
    #[serde(rename = "F_shear")]
    Shear,
}

impl ForceAxis {
    /// Label used in trigger types and logs.
    pub const fn label(self) -> &'static str {
        match self {
            ForceAxis::Fx => "Fx",
            ForceAxis::Fy => "Fy",
            ForceAxis::Fz => "Fz",
            ForceAxis::Shear => "F_shear",
        }
    }
}

impl fmt::Display for ForceAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ForceAxis {
    type Err = TestbedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Fx" => Ok(ForceAxis::Fx),
            "Fy" => Ok(ForceAxis::Fy),
            "Fz" => Ok(ForceAxis::Fz),
            "F_shear" => Ok(ForceAxis::Shear),
            other => Err(TestbedError::UnknownTriggerType(format!("{other} (N)"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_parse() {
        assert_eq!("x".parse::<Axis>().unwrap(), Axis::X);
        assert_eq!(" Z ".parse::<Axis>().unwrap(), Axis::Z);
        assert!(matches!(
            "W".parse::<Axis>(),
            Err(TestbedError::InvalidAxis(_))
        ));
    }

    #[test]
    fn test_axis_force_mapping() {
        assert_eq!(Axis::X.force_axis(), ForceAxis::Fx);
        assert_eq!(Axis::Y.force_axis(), ForceAxis::Fy);
        assert_eq!(Axis::Z.force_axis(), ForceAxis::Fz);
    }

    #[test]
    fn test_direction_counter_convention() {
        assert_eq!(Direction::Negative.position_delta(), 1);
        assert_eq!(Direction::Positive.position_delta(), -1);

        // Pulsing towards zero must shrink |position|.
        for pos in [-5i64, -1, 1, 7] {
            let dir = Direction::towards_zero(pos);
            assert!((pos + dir.position_delta()).abs() < pos.abs());
        }
    }

    #[test]
    fn test_direction_serde() {
        let dir: Direction = serde_json::from_str("\"negative\"").unwrap();
        assert_eq!(dir, Direction::Negative);
        assert!(Direction::Positive.pin_high());
        assert_eq!(Direction::Positive.opposite(), Direction::Negative);
    }
}
