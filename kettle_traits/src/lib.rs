pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Load-cell ADC channel delivering signed conversions.
pub trait LoadCell {
    /// True when a fresh conversion can be read without waiting.
    fn available(&mut self) -> bool;
    fn read(&mut self) -> Result<i32, Box<dyn std::error::Error + Send + Sync>>;
}

/// Single momentary push button wired active-low with a pull-up.
pub trait ButtonInput {
    /// Raw pin level; `true` while the contact is closed.
    fn is_low(&mut self) -> bool;
}

/// Appliance outputs. Writes are fire-and-forget: logical levels in,
/// polarity and PWM shaping are the implementation's business.
pub trait Actuators {
    fn set_pump_relay(&mut self, on: bool);
    fn set_power_relay(&mut self, on: bool);
    fn write_servo_angle(&mut self, degrees: u8);
    fn set_buzzer(&mut self, on: bool);
}

/// Byte-addressed non-volatile image (EEPROM or a file standing in for it).
pub trait NvStore {
    fn read(
        &mut self,
        addr: usize,
        buf: &mut [u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn write(
        &mut self,
        addr: usize,
        bytes: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    /// Flush staged writes to the backing medium.
    fn commit(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
