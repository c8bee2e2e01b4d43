use tracing::trace;

use crate::error::{HwError, Result};

/// Bit-banged HX711 24-bit load-cell ADC.
///
/// Never waits: callers poll `is_ready()` (DT pulled low by the chip) and only
/// then clock out a conversion.
pub struct Hx711 {
    dt: rppal::gpio::InputPin,
    sck: rppal::gpio::OutputPin,
    gain_pulses: u8, // 1..=3 extra pulses select channel/gain for the next conversion
}

impl Hx711 {
    pub fn new(
        dt_pin: rppal::gpio::InputPin,
        mut sck_pin: rppal::gpio::OutputPin,
        gain_pulses: u8,
    ) -> Result<Self> {
        if !(1..=3).contains(&gain_pulses) {
            return Err(HwError::Gpio(format!(
                "hx711 gain pulses must be 1..=3, got {gain_pulses}"
            )));
        }
        sck_pin.set_low(); // clock idle low; high for >60us powers the chip down
        Ok(Self {
            dt: dt_pin,
            sck: sck_pin,
            gain_pulses,
        })
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.dt.is_low()
    }

    pub fn read(&mut self) -> Result<i32> {
        if !self.is_ready() {
            return Err(HwError::NotReady);
        }

        let mut value: i32 = 0;
        for _ in 0..24 {
            self.sck.set_high();
            spin_delay_100ns();
            value = (value << 1) | i32::from(self.dt.is_high());
            self.sck.set_low();
            spin_delay_100ns();
        }

        for _ in 0..self.gain_pulses {
            self.sck.set_high();
            spin_delay_100ns();
            self.sck.set_low();
            spin_delay_100ns();
        }

        // Sign extend 24-bit
        if (value & 0x80_0000) != 0 {
            value |= !0xFF_FFFF;
        }
        trace!(raw = value, "hx711 raw read");
        Ok(value)
    }
}

#[inline(always)]
fn spin_delay_100ns() {
    std::hint::spin_loop();
}
