//! Operator facade.
//!
//! [`Testbed`] wires a driver's transports to the motion engine and exposes
//! the control operations: sequence start/stop, emergency stop, manual move,
//! jog, motor check, recalibration and sensor zeroing.
//!
//! # Lifecycle
//!
//! ```text
//! Testbed::new() → start() → [operations]* → shutdown()
//! ```

use crate::actuator::Actuator;
use crate::context::MotionContext;
use crate::driver::TestbedDriver;
use crate::events::{EventBus, Telemetry, TelemetrySink};
use crate::manual::{self, Jogger, ManualOutcome};
use crate::orchestrator::{RunReport, Sequencer};
use crate::persistence::{CalibrationFile, FileLogStore};
use crate::sensor::{ForceChannel, ForcePoller};
use crate::state::TestbedState;
use gecko_common::prelude::*;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};

/// Snapshot of the testbed for status queries.
#[derive(Debug, Clone, Serialize)]
pub struct TestbedStatus {
    /// Latest calibrated reading.
    pub force: ForceReading,
    /// Position counters in X, Y, Z order.
    pub positions: [i64; AXIS_COUNT],
    /// Whether an activity holds the run flag.
    pub running: bool,
    /// Whether the last activity was halted.
    pub emergency: bool,
    /// Whether the sensor link has failed.
    pub sensor_fault: bool,
    /// Location of the most recent run log.
    pub last_log: Option<String>,
}

/// The testbed controller.
pub struct Testbed {
    ctx: MotionContext,
    channel: Arc<ForceChannel>,
    sequencer: Sequencer,
    jogger: Jogger,
    calibration_file: CalibrationFile,
    poll_interval: Duration,
    stale_after: Duration,
    poller: Mutex<Option<ForcePoller>>,
    last_log: Arc<Mutex<Option<String>>>,
}

impl Testbed {
    /// Build a testbed on the transports opened by `driver`.
    ///
    /// Loads the calibration file, falling back to the configured defaults.
    pub fn new(
        config: &TestbedConfig,
        driver: &mut dyn TestbedDriver,
        sink: Arc<dyn TelemetrySink>,
    ) -> Result<Self, TestbedError> {
        config.validate()?;
        info!("Using driver {} v{}", driver.name(), driver.version());

        let calibration_file = CalibrationFile::new(&config.calibration.file);
        let calibration = calibration_file.load_or(config.calibration.defaults())?;
        calibration.validate()?;
        let state = Arc::new(TestbedState::new(calibration));

        let transport = driver.open_sensor(config, &state)?;
        let mut channel = ForceChannel::new(transport, Arc::clone(&state));
        if !driver.sensor_init_delays() {
            channel = channel.without_command_delays();
        }

        let pins = [
            driver.open_axis(Axis::X, config.axes.pins(Axis::X))?,
            driver.open_axis(Axis::Y, config.axes.pins(Axis::Y))?,
            driver.open_axis(Axis::Z, config.axes.pins(Axis::Z))?,
        ];

        let events = Arc::new(EventBus::new(sink, Arc::clone(&state)));
        let actuator = Arc::new(Actuator::new(
            pins,
            Arc::clone(&state),
            Arc::clone(&events),
            config.motion.settle(),
        ));
        actuator.idle_all()?;

        let ctx = MotionContext {
            state,
            actuator,
            events,
            motion: Arc::new(config.motion.clone()),
            max_force_limit: config.sensor.max_force_limit,
        };
        let store = Arc::new(FileLogStore::new(&config.logging.log_dir));

        Ok(Self {
            sequencer: Sequencer::new(ctx.clone(), store),
            jogger: Jogger::new(ctx.clone()),
            ctx,
            channel: Arc::new(channel),
            calibration_file,
            poll_interval: config.sensor.poll_interval(),
            stale_after: config.sensor.stale_after(),
            poller: Mutex::new(None),
            last_log: Arc::new(Mutex::new(None)),
        })
    }

    /// Initialise the sensor and start the force poller.
    pub fn start(&self) -> Result<(), TestbedError> {
        let mut poller = self.poller.lock();
        if poller.as_ref().is_some_and(ForcePoller::is_running) {
            return Ok(());
        }
        self.channel.initialize()?;
        self.ctx.state.set_sensor_fault(false);
        *poller = Some(ForcePoller::spawn(
            Arc::clone(&self.channel),
            self.ctx.clone(),
            self.poll_interval,
            self.stale_after,
        )?);
        Ok(())
    }

    /// Stop every activity, the poller and the sensor stream.
    pub fn shutdown(&self) -> Result<(), TestbedError> {
        info!("Testbed shutting down");
        self.jogger.stop_all();
        self.ctx.state.stop();
        if let Some(mut poller) = self.poller.lock().take() {
            poller.stop();
        }
        self.ctx.actuator.idle_all()?;
        self.channel.shutdown()
    }

    // ─── Sequences ──────────────────────────────────────────────────

    /// Start `sequence` in the background.
    ///
    /// The run flag is claimed before this returns, so a rejected start
    /// never spawns anything.
    pub fn start_sequence(
        &self,
        sequence: Sequence,
    ) -> Result<JoinHandle<Result<RunReport, TestbedError>>, TestbedError> {
        self.ctx.state.ensure_sensor_healthy()?;
        let guard = self.ctx.state.try_begin()?;
        let sequencer = self.sequencer.clone();
        let last_log = Arc::clone(&self.last_log);
        thread::Builder::new()
            .name("sequencer".into())
            .spawn(move || {
                let report = sequencer.run_claimed(guard, &sequence)?;
                if let Some(location) = &report.log_location {
                    *last_log.lock() = Some(location.clone());
                }
                Ok(report)
            })
            .map_err(|e| TestbedError::Spawn(format!("sequencer: {e}")))
    }

    /// Run `sequence` on the calling thread.
    pub fn run_sequence(&self, sequence: &Sequence) -> Result<RunReport, TestbedError> {
        let report = self.sequencer.run(sequence)?;
        if let Some(location) = &report.log_location {
            *self.last_log.lock() = Some(location.clone());
        }
        Ok(report)
    }

    /// Ask the running activity to stop at its next check.
    pub fn stop_sequence(&self) {
        info!("Stop requested");
        self.ctx.state.stop();
    }

    /// Stop everything now and idle all outputs. Always succeeds.
    pub fn emergency_stop(&self) {
        self.ctx.halt("operator emergency stop");
        self.jogger.stop_all();
    }

    // ─── Manual motion ──────────────────────────────────────────────

    /// Move `axis` until any of `triggers` fires.
    pub fn move_until_trigger(
        &self,
        axis: &str,
        direction: Direction,
        triggers: &[Trigger],
        pulse_width: Duration,
    ) -> Result<ManualOutcome, TestbedError> {
        manual::move_until_trigger(&self.ctx, axis, direction, triggers, pulse_width)
    }

    /// Start a continuous jog.
    pub fn start_jog(&self, axis: &str, positive: bool) -> Result<(), TestbedError> {
        self.jogger.start(axis, positive)
    }

    /// Stop a continuous jog.
    pub fn stop_jog(&self, axis: &str) -> Result<(), TestbedError> {
        self.jogger.stop(axis)
    }

    /// Run the motor self-check.
    pub fn motor_check(&self) -> Result<(), TestbedError> {
        manual::motor_check(&self.ctx)
    }

    // ─── Sensor ─────────────────────────────────────────────────────

    /// Replace the calibration and persist it.
    ///
    /// The new profile is active even if saving fails; the error is
    /// returned so the operator knows it will not survive a restart.
    pub fn recalibrate(&self, profile: CalibrationProfile) -> Result<(), TestbedError> {
        profile.validate()?;
        self.ctx.state.set_calibration(profile);
        self.ctx
            .events
            .emit(&Telemetry::Log(format!("Calibration updated: {profile}")));
        self.calibration_file.save(&profile).inspect_err(|e| {
            warn!("Calibration not saved: {}", e);
        })
    }

    /// Re-run the sensor init procedure, which tares it.
    pub fn zero_sensor(&self) -> Result<(), TestbedError> {
        if self.ctx.state.is_running() {
            return Err(TestbedError::ActivityAlreadyRunning);
        }
        self.channel.initialize().inspect_err(|e| {
            error!("Sensor zeroing failed: {}", e);
            self.ctx.state.set_sensor_fault(true);
        })
    }

    // ─── Queries ────────────────────────────────────────────────────

    /// Current status snapshot.
    pub fn status(&self) -> TestbedStatus {
        let state = &self.ctx.state;
        TestbedStatus {
            force: state.latest_force(),
            positions: state.positions(),
            running: state.is_running(),
            emergency: state.emergency_raised(),
            sensor_fault: state.sensor_fault(),
            last_log: self.last_log_location(),
        }
    }

    /// Location of the most recent run log.
    pub fn last_log_location(&self) -> Option<String> {
        self.last_log.lock().clone()
    }

    /// Motion context, for embedding front ends.
    pub fn context(&self) -> &MotionContext {
        &self.ctx
    }

    /// Sequence runner.
    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }
}

impl Drop for Testbed {
    fn drop(&mut self) {
        self.jogger.stop_all();
        self.ctx.state.stop();
        if let Some(mut poller) = self.poller.lock().take() {
            poller.stop();
        }
    }
}
