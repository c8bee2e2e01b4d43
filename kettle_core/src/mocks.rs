//! Inert peripherals for tests and for tools that only need the store.

use kettle_traits::{Actuators, ButtonInput, LoadCell};

/// A load cell that never produces a conversion.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLoadCell;

impl LoadCell for NoLoadCell {
    fn available(&mut self) -> bool {
        false
    }

    fn read(&mut self) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("no load cell attached")))
    }
}

/// A button nobody presses.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReleasedButton;

impl ButtonInput for ReleasedButton {
    fn is_low(&mut self) -> bool {
        false
    }
}

/// Outputs that go nowhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullActuators;

impl Actuators for NullActuators {
    fn set_pump_relay(&mut self, _on: bool) {}
    fn set_power_relay(&mut self, _on: bool) {}
    fn write_servo_angle(&mut self, _degrees: u8) {}
    fn set_buzzer(&mut self, _on: bool) {}
}
