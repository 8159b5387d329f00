//! Shared rig for integration tests.
//!
//! Builds a motion context over simulated pins with fast timings. Force is
//! either set directly or scripted from the rising edges of a step output.

#![allow(dead_code)]

use chrono::{DateTime, Local};
use gecko_common::config::MotionConfig;
use gecko_common::prelude::*;
use gecko_testbed::actuator::Actuator;
use gecko_testbed::drivers::simulation::{PinTap, SimulatedPin};
use gecko_testbed::persistence::{LogStore, RunLogWriter};
use gecko_testbed::transport::AxisPins;
use gecko_testbed::{EventBus, MotionContext, Sequencer, Telemetry, TelemetrySink, TestbedState};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Timings short enough for tests.
pub fn fast_motion() -> MotionConfig {
    MotionConfig {
        settle_ms: 0,
        hold_pulse_ms: 1,
        reset_pulse_ms: 1,
        orchestrator_poll_ms: 5,
        trigger_poll_ms: 1,
        jog_pulse_ms: 1,
        motor_check_secs: 0.05,
        motor_check_half_period_ms: 1,
        ..MotionConfig::default()
    }
}

// ─── Telemetry capture ──────────────────────────────────────────────

/// Sink recording each message with the counters at that moment.
pub struct Recorder {
    state: Arc<TestbedState>,
    entries: Mutex<Vec<(Telemetry, [i64; AXIS_COUNT])>>,
}

impl Recorder {
    pub fn new(state: Arc<TestbedState>) -> Self {
        Self {
            state,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Log messages so far.
    pub fn logs(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter_map(|(t, _)| match t {
                Telemetry::Log(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Counters when the first log message equal to `text` was emitted.
    pub fn positions_at(&self, text: &str) -> Option<[i64; AXIS_COUNT]> {
        self.entries.lock().iter().find_map(|(t, p)| match t {
            Telemetry::Log(line) if line == text => Some(*p),
            _ => None,
        })
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.logs().iter().filter(|l| l.contains(needle)).count()
    }
}

impl TelemetrySink for Recorder {
    fn emit(&self, message: &Telemetry) {
        let positions = self.state.positions();
        self.entries.lock().push((message.clone(), positions));
    }
}

// ─── Run-log storage ────────────────────────────────────────────────

/// Log store keeping finished logs in memory.
#[derive(Default)]
pub struct MemoryLogStore {
    logs: Arc<Mutex<Vec<Vec<String>>>>,
    fail_create: AtomicBool,
}

impl MemoryLogStore {
    pub fn logs(&self) -> Vec<Vec<String>> {
        self.logs.lock().clone()
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }
}

impl LogStore for MemoryLogStore {
    fn create(&self, started: DateTime<Local>) -> Result<Box<dyn RunLogWriter>, TestbedError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(TestbedError::Persistence("disk full".into()));
        }
        Ok(Box::new(MemoryWriter {
            name: format!("memory://{}", started.timestamp_millis()),
            lines: Vec::new(),
            logs: Arc::clone(&self.logs),
        }))
    }
}

struct MemoryWriter {
    name: String,
    lines: Vec<String>,
    logs: Arc<Mutex<Vec<Vec<String>>>>,
}

impl RunLogWriter for MemoryWriter {
    fn append_line(&mut self, line: &str) -> Result<(), TestbedError> {
        self.lines.push(line.to_string());
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<String, TestbedError> {
        self.logs.lock().push(self.lines);
        Ok(self.name)
    }
}

// ─── Rig ────────────────────────────────────────────────────────────

/// Motion context over simulated pins.
pub struct Rig {
    pub ctx: MotionContext,
    pub steps: [PinTap; AXIS_COUNT],
    pub dirs: [PinTap; AXIS_COUNT],
    pub recorder: Arc<Recorder>,
    pub store: Arc<MemoryLogStore>,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_motion(fast_motion())
    }

    pub fn with_motion(motion: MotionConfig) -> Self {
        let state = Arc::new(TestbedState::new(CalibrationProfile::default()));
        let recorder = Arc::new(Recorder::new(Arc::clone(&state)));
        let events = Arc::new(EventBus::new(recorder.clone(), Arc::clone(&state)));

        let steps: [PinTap; AXIS_COUNT] = Default::default();
        let dirs: [PinTap; AXIS_COUNT] = Default::default();
        let pins = Axis::ALL.map(|axis| {
            let i = axis.index();
            AxisPins::new(
                Box::new(SimulatedPin::new(format!("{axis}.step"), steps[i].clone())),
                Box::new(SimulatedPin::new(format!("{axis}.dir"), dirs[i].clone())),
            )
        });

        let actuator = Arc::new(Actuator::new(
            pins,
            Arc::clone(&state),
            Arc::clone(&events),
            motion.settle(),
        ));
        let ctx = MotionContext {
            state,
            actuator,
            events,
            motion: Arc::new(motion),
            max_force_limit: DEFAULT_MAX_FORCE_LIMIT,
        };

        Self {
            ctx,
            steps,
            dirs,
            recorder,
            store: Arc::new(MemoryLogStore::default()),
        }
    }

    pub fn state(&self) -> &Arc<TestbedState> {
        &self.ctx.state
    }

    pub fn sequencer(&self) -> Sequencer {
        Sequencer::new(self.ctx.clone(), self.store.clone())
    }

    /// Publish the force produced by the `n`th rising edge (1-based) of
    /// `axis`'s step output.
    pub fn force_on_pulse<F>(&self, axis: Axis, script: F)
    where
        F: Fn(u64) -> ForceReading + Send + Sync + 'static,
    {
        let state = Arc::clone(&self.ctx.state);
        let count = AtomicU64::new(0);
        self.steps[axis.index()].on_rise(Arc::new(move || {
            let n = count.fetch_add(1, Ordering::SeqCst) + 1;
            state.publish_force(script(n));
        }));
    }

    pub fn rises(&self, axis: Axis) -> u64 {
        self.steps[axis.index()].rises()
    }
}

/// Step moving until `steps >= n`.
pub fn step_until(axis: Axis, direction: Direction, n: f64) -> Step {
    let mut step = Step::new(axis, direction, Duration::from_millis(1));
    step.triggers
        .push(Trigger::new(TriggerKind::Steps, Comparator::Ge, n));
    step
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    cond()
}
