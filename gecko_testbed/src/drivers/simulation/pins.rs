//! Recording output pins.

use crate::transport::{Level, OutputPin};
use gecko_common::prelude::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Callback run on every rising edge of a simulated pin.
pub type RiseHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct PinShared {
    high: AtomicBool,
    rises: AtomicU64,
    failing: AtomicBool,
    on_rise: Mutex<Option<RiseHook>>,
}

/// Observer and fault injector for a [`SimulatedPin`].
#[derive(Clone, Default)]
pub struct PinTap {
    inner: Arc<PinShared>,
}

impl PinTap {
    /// Current output level.
    pub fn is_high(&self) -> bool {
        self.inner.high.load(Ordering::SeqCst)
    }

    /// Rising edges seen so far.
    pub fn rises(&self) -> u64 {
        self.inner.rises.load(Ordering::SeqCst)
    }

    /// Run `hook` on each rising edge (replaces any previous hook).
    pub fn on_rise(&self, hook: RiseHook) {
        *self.inner.on_rise.lock() = Some(hook);
    }

    /// Make subsequent writes fail.
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }
}

/// Output pin that only records what it is driven to.
pub struct SimulatedPin {
    label: String,
    tap: PinTap,
}

impl SimulatedPin {
    /// Pin reporting through `tap`.
    pub fn new(label: impl Into<String>, tap: PinTap) -> Self {
        Self {
            label: label.into(),
            tap,
        }
    }
}

impl OutputPin for SimulatedPin {
    fn set(&mut self, level: Level) -> Result<(), TestbedError> {
        let shared = &self.tap.inner;
        if shared.failing.load(Ordering::SeqCst) {
            return Err(TestbedError::ActuatorTransport(format!(
                "{} write failed",
                self.label
            )));
        }
        let high = level == Level::High;
        let was_high = shared.high.swap(high, Ordering::SeqCst);
        if high && !was_high {
            shared.rises.fetch_add(1, Ordering::SeqCst);
            let hook = shared.on_rise.lock().clone();
            if let Some(hook) = hook {
                hook();
            }
        }
        Ok(())
    }
}
