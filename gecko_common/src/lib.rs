//! Gecko Testbed Common Library
//!
//! Shared domain types, constants and configuration loading for the gecko
//! adhesion testbed workspace.
//!
//! # Module Structure
//!
//! - [`axis`] - Axis labels, movement direction, force components
//! - [`force`] - Force readings and calibration profiles
//! - [`sequence`] - Triggers, steps, axis programs and sequences
//! - [`config`] - TOML configuration loading
//! - [`consts`] - Protocol and safety constants
//! - [`error`] - Error types shared by every crate
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use gecko_common::prelude::*;
//!
//! let reading = ForceReading::new(3.0, 4.0, 1.25);
//! assert_eq!(reading.shear, 5.0);
//! assert_eq!(reading.component(ForceAxis::Fz), 1.25);
//! ```

pub mod axis;
pub mod config;
pub mod consts;
pub mod error;
pub mod force;
pub mod prelude;
pub mod sequence;
