//! Backend driver trait and registry.
//!
//! A driver opens the sensor transport and the axis outputs. The registry
//! maps names to factories and is passed to the [`Testbed`](crate::Testbed)
//! by value; there is no global state.

use crate::state::TestbedState;
use crate::transport::{AxisPins, SensorTransport};
use gecko_common::config::{AxisPinConfig, TestbedConfig};
use gecko_common::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Constructor of a named backend.
pub type DriverFactory = fn() -> Box<dyn TestbedDriver>;

/// Interface for pluggable hardware backends.
///
/// # Lifecycle
///
/// 1. `open_sensor()` - once, before the force poller starts
/// 2. `open_axis()` - once per axis
/// 3. The returned handles are owned by the testbed; dropping them releases
///    the hardware
pub trait TestbedDriver: Send {
    /// Registry key, e.g. "simulation".
    fn name(&self) -> &'static str;

    /// Backend version, logged at startup.
    fn version(&self) -> &'static str;

    /// Open the force sensor link.
    ///
    /// `state` gives simulated backends access to the axis positions.
    fn open_sensor(
        &mut self,
        config: &TestbedConfig,
        state: &Arc<TestbedState>,
    ) -> Result<Box<dyn SensorTransport>, TestbedError>;

    /// Open the step and direction outputs of one axis.
    fn open_axis(&mut self, axis: Axis, pins: AxisPinConfig) -> Result<AxisPins, TestbedError>;

    /// Whether the sensor needs the real inter-command delays on init.
    fn sensor_init_delays(&self) -> bool {
        true
    }
}

/// Backends selectable by name.
pub struct DriverRegistry {
    factories: HashMap<&'static str, DriverFactory>,
}

impl DriverRegistry {
    /// No backends.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry populated with every built-in driver.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        crate::drivers::register_all(&mut registry);
        registry
    }

    /// Add a backend under `name`.
    ///
    /// # Panics
    /// If `name` is taken; built-in registration is static, so this is a
    /// programming error.
    pub fn register(&mut self, name: &'static str, factory: DriverFactory) {
        let previous = self.factories.insert(name, factory);
        assert!(previous.is_none(), "driver {name:?} already registered");
    }

    /// Construct the backend registered as `name`.
    pub fn create_driver(&self, name: &str) -> Result<Box<dyn TestbedDriver>, TestbedError> {
        match self.factories.get(name) {
            Some(factory) => Ok(factory()),
            None => Err(TestbedError::DriverNotFound(name.to_string())),
        }
    }

    /// Registered names, sorted.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
