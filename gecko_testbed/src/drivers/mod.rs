//! Driver implementations.
//!
//! - [`simulation`] - Spring contact model and recording pins, no hardware
//! - `hardware` - Serial sensor and Raspberry Pi GPIO (feature `hardware`)
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement [`TestbedDriver`](crate::driver::TestbedDriver)
//! 3. Register it in [`register_all`]

#[cfg(feature = "hardware")]
pub mod hardware;
pub mod simulation;

use crate::driver::DriverRegistry;

/// Register every built-in driver.
pub fn register_all(registry: &mut DriverRegistry) {
    registry.register("simulation", simulation::create_driver);

    #[cfg(feature = "hardware")]
    registry.register("hardware", hardware::create_driver);
}
