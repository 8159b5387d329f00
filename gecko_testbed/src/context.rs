//! Handles shared by every motion activity.

use crate::actuator::Actuator;
use crate::events::{EventBus, MotionEvent};
use crate::state::TestbedState;
use crate::trigger::TriggerInputs;
use gecko_common::config::MotionConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Everything an executor, the orchestrator or a manual activity needs.
///
/// Cloning is cheap; all members are shared.
#[derive(Clone)]
pub struct MotionContext {
    /// Shared state.
    pub state: Arc<TestbedState>,
    /// Pin driver.
    pub actuator: Arc<Actuator>,
    /// Event dispatch.
    pub events: Arc<EventBus>,
    /// Timing parameters.
    pub motion: Arc<MotionConfig>,
    /// Force ceiling [N] applied to every force trigger.
    pub max_force_limit: f64,
}

impl MotionContext {
    /// Measurements for trigger evaluation, using the latest force.
    pub fn inputs(&self, elapsed: Duration, steps: u64) -> TriggerInputs {
        TriggerInputs {
            force: self.state.latest_force(),
            elapsed,
            steps,
        }
    }

    /// Emergency stop: clear the run flag, stop jogs, idle every output.
    ///
    /// Never fails; output errors are logged.
    pub fn halt(&self, reason: &str) {
        self.state.halt();
        warn!("Halting motion: {}", reason);
        if let Err(e) = self.actuator.idle_all() {
            error!("Outputs could not be idled: {}", e);
        }
        self.events.publish(MotionEvent::Halted {
            reason: reason.to_string(),
        });
    }
}
