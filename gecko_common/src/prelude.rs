//! Common re-exports for convenience.
//!
//! ```rust
//! use gecko_common::prelude::*;
//! ```

pub use crate::axis::{Axis, Direction, ForceAxis};
pub use crate::config::{ConfigError, ConfigLoader, TestbedConfig};
pub use crate::consts::*;
pub use crate::error::{FrameError, TestbedError};
pub use crate::force::{CalibrationProfile, ChannelValues, ForceReading};
pub use crate::sequence::{AxisProgram, Comparator, Sequence, Step, Trigger, TriggerKind};
