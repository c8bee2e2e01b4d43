//! Raspberry Pi peripherals (rppal).
//!
//! Relays are active-low modules; the servo is driven with software PWM at
//! 50 Hz, 0.5-2.5 ms pulses for 0-180 degrees.

use std::time::Duration;

use kettle_traits::{Actuators, ButtonInput, LoadCell};
use rppal::gpio::{Gpio, InputPin, OutputPin};
use tracing::{debug, warn};

use crate::error::{HwError, Result};
use crate::hx711::Hx711;

const SERVO_PERIOD: Duration = Duration::from_millis(20);
const SERVO_MIN_PULSE_US: u64 = 500;
const SERVO_SPAN_US: u64 = 2_000;

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

fn output(gpio: &Gpio, pin: u8) -> Result<OutputPin> {
    Ok(gpio.get(pin).map_err(gpio_err)?.into_output())
}

fn input(gpio: &Gpio, pin: u8) -> Result<InputPin> {
    Ok(gpio.get(pin).map_err(gpio_err)?.into_input())
}

/// Logical pin assignment (BCM numbering).
#[derive(Debug, Clone, Copy)]
pub struct PiPins {
    pub hx711_dt: u8,
    pub hx711_sck: u8,
    pub button: u8,
    pub pump_relay: u8,
    pub power_relay: u8,
    pub servo: u8,
    pub buzzer: u8,
}

pub struct HardwareLoadCell {
    hx711: Hx711,
}

impl HardwareLoadCell {
    pub fn open(gpio: &Gpio, dt_pin: u8, sck_pin: u8, gain_pulses: u8) -> Result<Self> {
        let hx711 = Hx711::new(input(gpio, dt_pin)?, output(gpio, sck_pin)?, gain_pulses)?;
        Ok(Self { hx711 })
    }
}

impl LoadCell for HardwareLoadCell {
    fn available(&mut self) -> bool {
        self.hx711.is_ready()
    }

    fn read(&mut self) -> std::result::Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.hx711.read()?)
    }
}

pub struct HardwareButton {
    pin: InputPin,
}

impl HardwareButton {
    pub fn open(gpio: &Gpio, pin: u8) -> Result<Self> {
        let pin = gpio.get(pin).map_err(gpio_err)?.into_input_pullup();
        Ok(Self { pin })
    }
}

impl ButtonInput for HardwareButton {
    fn is_low(&mut self) -> bool {
        self.pin.is_low()
    }
}

pub struct HardwareOutputs {
    pump: OutputPin,
    power: OutputPin,
    servo: OutputPin,
    buzzer: OutputPin,
}

impl HardwareOutputs {
    /// Open every output in its safe state: relays released, buzzer silent.
    pub fn open(gpio: &Gpio, pins: &PiPins) -> Result<Self> {
        let mut pump = output(gpio, pins.pump_relay)?;
        let mut power = output(gpio, pins.power_relay)?;
        let servo = output(gpio, pins.servo)?;
        let mut buzzer = output(gpio, pins.buzzer)?;
        pump.set_high();
        power.set_high();
        buzzer.set_low();
        debug!(?pins, "outputs initialized");
        Ok(Self {
            pump,
            power,
            servo,
            buzzer,
        })
    }
}

fn drive_active_low(pin: &mut OutputPin, on: bool) {
    if on { pin.set_low() } else { pin.set_high() }
}

impl Actuators for HardwareOutputs {
    fn set_pump_relay(&mut self, on: bool) {
        drive_active_low(&mut self.pump, on);
    }

    fn set_power_relay(&mut self, on: bool) {
        drive_active_low(&mut self.power, on);
    }

    fn write_servo_angle(&mut self, degrees: u8) {
        let deg = u64::from(degrees.min(180));
        let pulse = Duration::from_micros(SERVO_MIN_PULSE_US + deg * SERVO_SPAN_US / 180);
        if let Err(e) = self.servo.set_pwm(SERVO_PERIOD, pulse) {
            warn!(error = %e, degrees, "servo pwm update failed");
        }
    }

    fn set_buzzer(&mut self, on: bool) {
        if on {
            self.buzzer.set_high();
        } else {
            self.buzzer.set_low();
        }
    }
}

/// Open every appliance peripheral on the local GPIO controller.
pub fn open_all(
    pins: &PiPins,
    gain_pulses: u8,
) -> Result<(HardwareLoadCell, HardwareButton, HardwareOutputs)> {
    let gpio = Gpio::new().map_err(gpio_err)?;
    let cell = HardwareLoadCell::open(&gpio, pins.hx711_dt, pins.hx711_sck, gain_pulses)?;
    let button = HardwareButton::open(&gpio, pins.button)?;
    let outputs = HardwareOutputs::open(&gpio, pins)?;
    Ok((cell, button, outputs))
}
