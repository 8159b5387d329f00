//! Telemetry and motion events.
//!
//! Operator-facing output flows through two layers:
//!
//! - [`TelemetrySink`] - fire-and-forget channel to whatever front end is
//!   attached (tracing, an mpsc consumer, ...); carries force samples, log
//!   messages and step counters
//! - [`EventBus`] - turns [`MotionEvent`]s into log messages, forwards them
//!   to the sink and records them in the run log with the force at that
//!   moment

use crate::runlog::RunLog;
use crate::state::TestbedState;
use chrono::Local;
use gecko_common::prelude::*;
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use tracing::{debug, info, trace};

// ─── Telemetry ──────────────────────────────────────────────────────

/// One outbound telemetry message.
#[derive(Debug, Clone, PartialEq)]
pub enum Telemetry {
    /// Latest calibrated reading.
    Force(ForceReading),
    /// Human-readable log line.
    Log(String),
    /// Position counters in X, Y, Z order.
    StepCount([i64; AXIS_COUNT]),
}

impl Telemetry {
    /// Channel name (`force`, `log`, `step_count`).
    pub const fn channel(&self) -> &'static str {
        match self {
            Telemetry::Force(_) => "force",
            Telemetry::Log(_) => "log",
            Telemetry::StepCount(_) => "step_count",
        }
    }

    /// Payload as JSON.
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Telemetry::Force(reading) => serde_json::json!({
                "Fx": reading.fx,
                "Fy": reading.fy,
                "Fz": reading.fz,
                "F_shear": reading.shear,
            }),
            Telemetry::Log(text) => serde_json::Value::String(text.clone()),
            Telemetry::StepCount([x, y, z]) => serde_json::json!({"X": x, "Y": y, "Z": z}),
        }
    }
}

/// Non-blocking telemetry consumer.
///
/// Implementations must not block the caller; failures are swallowed.
pub trait TelemetrySink: Send + Sync {
    /// Deliver one message.
    fn emit(&self, message: &Telemetry);
}

/// Sink writing telemetry to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn emit(&self, message: &Telemetry) {
        match message {
            Telemetry::Log(text) => info!(target: "telemetry", "{text}"),
            Telemetry::Force(reading) => trace!(target: "telemetry", "force {reading}"),
            Telemetry::StepCount([x, y, z]) => {
                debug!(target: "telemetry", "steps X {x} | Y {y} | Z {z}")
            }
        }
    }
}

/// Sink forwarding telemetry over an mpsc channel.
#[derive(Clone)]
pub struct ChannelSink {
    tx: Sender<Telemetry>,
}

impl ChannelSink {
    /// Forward into `tx`.
    pub fn new(tx: Sender<Telemetry>) -> Self {
        Self { tx }
    }
}

impl TelemetrySink for ChannelSink {
    fn emit(&self, message: &Telemetry) {
        // Receiver gone means nobody is listening.
        let _ = self.tx.send(message.clone());
    }
}

/// Sink duplicating every message to several sinks.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl FanoutSink {
    /// Builder: add a sink.
    pub fn with(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl TelemetrySink for FanoutSink {
    fn emit(&self, message: &Telemetry) {
        for sink in &self.sinks {
            sink.emit(message);
        }
    }
}

// ─── Motion events ──────────────────────────────────────────────────

/// Trigger group a firing belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPhase {
    /// Movement initiation triggers.
    MovementStart,
    /// Movement breaking triggers.
    MovementBreak,
    /// Hold ending triggers.
    HoldBreak,
    /// Manual move stop triggers.
    ManualMove,
}

impl TriggerPhase {
    /// Phrase used in log messages.
    pub const fn label(self) -> &'static str {
        match self {
            TriggerPhase::MovementStart => "movement starting",
            TriggerPhase::MovementBreak => "movement break",
            TriggerPhase::HoldBreak => "force hold break",
            TriggerPhase::ManualMove => "manual move",
        }
    }
}

/// Something worth telling the operator about.
#[derive(Debug, Clone, PartialEq)]
pub enum MotionEvent {
    /// Iteration `iteration` (0-based) began.
    IterationStarted {
        /// Iteration index.
        iteration: u32,
    },
    /// Iteration finished on every axis.
    IterationCompleted {
        /// Iteration index.
        iteration: u32,
        /// Counters before the reset.
        positions: [i64; AXIS_COUNT],
    },
    /// Axes are being driven back to zero.
    ResettingAxes,
    /// A step began executing.
    StepStarted {
        /// Axis.
        axis: Axis,
        /// Step index within the program.
        index: usize,
    },
    /// A trigger fired for the first time in its activation.
    TriggerFired {
        /// Axis.
        axis: Axis,
        /// Trigger group.
        phase: TriggerPhase,
        /// The trigger.
        trigger: Trigger,
    },
    /// Breaking triggers satisfied; movement stops.
    MovementBroken {
        /// Axis.
        axis: Axis,
    },
    /// Hold phase entered.
    HoldStarted {
        /// Axis.
        axis: Axis,
        /// Hold target [N].
        target: f64,
    },
    /// Hold triggers satisfied.
    HoldCompleted {
        /// Axis.
        axis: Axis,
        /// Hold target [N].
        target: f64,
    },
    /// A step finished.
    StepCompleted {
        /// Axis.
        axis: Axis,
        /// Step index within the program.
        index: usize,
    },
    /// Operator stopped the run.
    RunStopped,
    /// Run halted by emergency stop or a hardware fault.
    Halted {
        /// Why.
        reason: String,
    },
    /// Run log written.
    LogWritten {
        /// Where.
        location: String,
    },
    /// Run log could not be written.
    LogFailed {
        /// Why.
        reason: String,
    },
    /// Manual move started.
    ManualMoveStarted {
        /// Axis.
        axis: Axis,
        /// Direction.
        direction: Direction,
    },
    /// Manual move stopped by its triggers.
    ManualMoveTriggered,
    /// Manual move ended.
    ManualMoveCompleted,
    /// Motor check started.
    MotorCheckStarted,
    /// Motor check ended.
    MotorCheckCompleted,
    /// Sensor link failed.
    SensorFault {
        /// Why.
        reason: String,
    },
}

impl fmt::Display for MotionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionEvent::IterationStarted { iteration } => {
                write!(f, "Experiment {iteration} started")
            }
            MotionEvent::IterationCompleted {
                iteration,
                positions: [x, y, z],
            } => write!(
                f,
                "Experiment {iteration} completed. Total steps: X {x} | Y {y} | Z {z}"
            ),
            MotionEvent::ResettingAxes => f.write_str("Resetting motors to their initial state"),
            MotionEvent::StepStarted { axis, index } => {
                write!(f, "{axis}: step {index} initiated")
            }
            MotionEvent::TriggerFired {
                axis,
                phase,
                trigger,
            } => write!(f, "Axis {axis}: {trigger}, {} trigger fired", phase.label()),
            MotionEvent::MovementBroken { axis } => {
                write!(f, "Breaking movement on {axis} axis")
            }
            MotionEvent::HoldStarted { axis, target } => write!(
                f,
                "Holding force: F{} = {target}N",
                axis.label().to_ascii_lowercase()
            ),
            MotionEvent::HoldCompleted { axis, target } => write!(
                f,
                "Holding force: F{} = {target}N completed",
                axis.label().to_ascii_lowercase()
            ),
            MotionEvent::StepCompleted { axis, index } => {
                write!(f, "{axis}: step {index} completed")
            }
            MotionEvent::RunStopped => f.write_str("Experiment manually stopped"),
            MotionEvent::Halted { reason } => write!(f, "Emergency stop: {reason}"),
            MotionEvent::LogWritten { location } => {
                write!(f, "Experiment logs written to {location}")
            }
            MotionEvent::LogFailed { reason } => {
                write!(f, "Failed to write experiment logs: {reason}")
            }
            MotionEvent::ManualMoveStarted { axis, direction } => {
                write!(f, "Manual move on {axis} axis ({direction})")
            }
            MotionEvent::ManualMoveTriggered => f.write_str("Manual move stopped due to trigger"),
            MotionEvent::ManualMoveCompleted => f.write_str("Manual move completed"),
            MotionEvent::MotorCheckStarted => f.write_str("Motor check started"),
            MotionEvent::MotorCheckCompleted => f.write_str("Motor check completed"),
            MotionEvent::SensorFault { reason } => write!(f, "Force sensor failure: {reason}"),
        }
    }
}

// ─── Bus ────────────────────────────────────────────────────────────

/// Dispatcher shared by every motion component.
pub struct EventBus {
    sink: Arc<dyn TelemetrySink>,
    run_log: RunLog,
    state: Arc<TestbedState>,
}

impl EventBus {
    /// Bus forwarding to `sink`, stamping log lines with `state`'s force.
    pub fn new(sink: Arc<dyn TelemetrySink>, state: Arc<TestbedState>) -> Self {
        Self {
            sink,
            run_log: RunLog::new(),
            state,
        }
    }

    /// Report an event to the operator and the run log.
    pub fn publish(&self, event: MotionEvent) {
        let text = event.to_string();
        self.run_log
            .record(Local::now(), &self.state.latest_force(), &text);
        self.sink.emit(&Telemetry::Log(text));
    }

    /// Report a fresh force reading.
    ///
    /// While a run is recorded, the reading and the current counters are
    /// appended to the run log.
    pub fn force(&self, reading: ForceReading) {
        let [x, y, z] = self.state.positions();
        self.run_log
            .record(Local::now(), &reading, &format!("steps X {x} | Y {y} | Z {z}"));
        self.sink.emit(&Telemetry::Force(reading));
    }

    /// Report the position counters.
    pub fn step_count(&self) {
        self.sink.emit(&Telemetry::StepCount(self.state.positions()));
    }

    /// Raw telemetry passthrough.
    pub fn emit(&self, message: &Telemetry) {
        self.sink.emit(message);
    }

    /// The run-log buffer.
    pub fn run_log(&self) -> &RunLog {
        &self.run_log
    }
}
