//! # Gecko Testbed
//!
//! Triggered motion sequencing for a three-axis force testbed.
//!
//! A triaxial force sensor (Fx, Fy, Fz) streams framed samples over a serial
//! link; three stepper axes are driven by step/direction outputs. Experiments
//! are axis programs whose steps start, move, break and hold on force, time and
//! step triggers.
//!
//! # Module Structure
//!
//! - [`transport`] - Byte stream and output pin seams
//! - [`driver`] / [`drivers`] - Pluggable backends (simulation, hardware)
//! - [`sensor`] - Frame decoding, force channel and background poller
//! - [`state`] - Shared run flag, positions and latest force
//! - [`events`] - Telemetry sink and motion event bus
//! - [`runlog`] / [`persistence`] - Per-run log buffer, log files, calibration file
//! - [`trigger`] - Trigger evaluation and firing latches
//! - [`actuator`] - Pulse generation and position counting
//! - [`hold`] - Force hold controller
//! - [`executor`] - Per-axis step state machine
//! - [`orchestrator`] - Sequence runner
//! - [`manual`] - Manual move, jog and motor check
//! - [`testbed`] - Operator facade
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                         Testbed (facade)                          │
//! │  ┌────────────┐   ┌──────────────┐   ┌─────────────────────────┐  │
//! │  │ ForcePoller│──►│ TestbedState │◄──│ Sequencer / manual ops  │  │
//! │  └─────┬──────┘   └──────┬───────┘   └───────────┬─────────────┘  │
//! │        │                 │                       │                │
//! │        ▼                 ▼                       ▼                │
//! │  SensorTransport     EventBus ──► TelemetrySink  Actuator ──► pins│
//! └───────────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod actuator;
pub mod context;
pub mod driver;
pub mod drivers;
pub mod events;
pub mod executor;
pub mod hold;
pub mod manual;
pub mod orchestrator;
pub mod persistence;
pub mod runlog;
pub mod sensor;
pub mod state;
pub mod testbed;
pub mod transport;
pub mod trigger;

pub use crate::context::MotionContext;
pub use crate::driver::{DriverRegistry, TestbedDriver};
pub use crate::events::{ChannelSink, EventBus, MotionEvent, Telemetry, TelemetrySink, TracingSink};
pub use crate::orchestrator::{RunOutcome, RunReport, Sequencer};
pub use crate::state::TestbedState;
pub use crate::testbed::{Testbed, TestbedStatus};
