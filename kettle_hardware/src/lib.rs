//! Peripherals for the kettle filler: simulators for host runs and tests,
//! EEPROM image stores, and Raspberry Pi drivers behind the `hardware` feature.

pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod hx711;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod pi;
pub mod sim;
pub mod store;

pub use error::HwError;
pub use sim::{OutputLevels, SimulatedButton, SimulatedLoadCell, SimulatedOutputs};
pub use store::{FileStore, MemoryStore};
