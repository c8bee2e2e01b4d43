//! Simulated peripherals for host runs and tests.
//!
//! Every type here is a cheap handle: clones share state, so a test (or the
//! CLI's plant model) keeps one copy while the control loop owns another.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use kettle_traits::{Actuators, ButtonInput, LoadCell};
use tracing::trace;

use crate::error::HwError;

#[derive(Debug, Default)]
struct CellState {
    raw: i32,
    stalled: bool,
    failing: bool,
    queued: VecDeque<i32>,
    reads: usize,
}

/// Simulated load cell producing a settable raw level.
#[derive(Debug, Clone, Default)]
pub struct SimulatedLoadCell {
    state: Rc<RefCell<CellState>>,
}

impl SimulatedLoadCell {
    pub fn new(raw: i32) -> Self {
        let cell = Self::default();
        cell.set_raw(raw);
        cell
    }

    pub fn set_raw(&self, raw: i32) {
        self.state.borrow_mut().raw = raw;
    }

    pub fn add_raw(&self, delta: i32) {
        let mut s = self.state.borrow_mut();
        s.raw = s.raw.saturating_add(delta);
    }

    pub fn raw(&self) -> i32 {
        self.state.borrow().raw
    }

    /// Queue one-off conversions (spikes) returned before the steady level.
    pub fn push_conversion(&self, raw: i32) {
        self.state.borrow_mut().queued.push_back(raw);
    }

    /// While stalled the converter never reports data-ready.
    pub fn set_stalled(&self, stalled: bool) {
        self.state.borrow_mut().stalled = stalled;
    }

    /// While failing, reads return an error even though data-ready is set.
    pub fn set_failing(&self, failing: bool) {
        self.state.borrow_mut().failing = failing;
    }

    pub fn reads(&self) -> usize {
        self.state.borrow().reads
    }
}

impl LoadCell for SimulatedLoadCell {
    fn available(&mut self) -> bool {
        !self.state.borrow().stalled
    }

    fn read(&mut self) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.state.borrow_mut();
        if s.stalled {
            return Err(Box::new(HwError::NotReady));
        }
        if s.failing {
            return Err(Box::new(HwError::Gpio("simulated read failure".into())));
        }
        s.reads += 1;
        let raw = match s.queued.pop_front() {
            Some(spike) => spike,
            None => s.raw,
        };
        trace!(raw, "sim load cell read");
        Ok(raw)
    }
}

/// Simulated button; `press()` closes the contact (pin reads low).
#[derive(Debug, Clone, Default)]
pub struct SimulatedButton {
    low: Rc<Cell<bool>>,
}

impl SimulatedButton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self) {
        self.low.set(true);
    }

    pub fn release(&self) {
        self.low.set(false);
    }
}

impl ButtonInput for SimulatedButton {
    fn is_low(&mut self) -> bool {
        self.low.get()
    }
}

/// Last written output levels plus a few edge counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputLevels {
    pub pump: bool,
    pub power: bool,
    pub servo_angle: u8,
    pub buzzer: bool,
    /// Buzzer off->on edges since construction.
    pub buzzer_edges: u32,
    /// Power relay level changes since construction.
    pub power_toggles: u32,
    pub servo_writes: u32,
}

/// Recording output bank.
#[derive(Debug, Clone, Default)]
pub struct SimulatedOutputs {
    levels: Rc<RefCell<OutputLevels>>,
}

impl SimulatedOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> OutputLevels {
        *self.levels.borrow()
    }
}

impl Actuators for SimulatedOutputs {
    fn set_pump_relay(&mut self, on: bool) {
        self.levels.borrow_mut().pump = on;
    }

    fn set_power_relay(&mut self, on: bool) {
        let mut l = self.levels.borrow_mut();
        if l.power != on {
            l.power_toggles += 1;
        }
        l.power = on;
    }

    fn write_servo_angle(&mut self, degrees: u8) {
        let mut l = self.levels.borrow_mut();
        l.servo_angle = degrees;
        l.servo_writes += 1;
    }

    fn set_buzzer(&mut self, on: bool) {
        let mut l = self.levels.borrow_mut();
        if on && !l.buzzer {
            l.buzzer_edges += 1;
        }
        l.buzzer = on;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_conversions_precede_steady_level() {
        let mut cell = SimulatedLoadCell::new(100);
        cell.push_conversion(9_000);
        assert_eq!(cell.read().unwrap(), 9_000);
        assert_eq!(cell.read().unwrap(), 100);
        assert_eq!(cell.reads(), 2);
    }

    #[test]
    fn stalled_cell_is_not_available() {
        let mut cell = SimulatedLoadCell::new(1);
        cell.set_stalled(true);
        assert!(!cell.available());
        assert!(cell.read().is_err());
    }

    #[test]
    fn outputs_count_edges() {
        let mut out = SimulatedOutputs::new();
        let observer = out.clone();
        out.set_buzzer(true);
        out.set_buzzer(true);
        out.set_buzzer(false);
        out.set_buzzer(true);
        out.set_power_relay(false);
        out.set_power_relay(true);
        let l = observer.levels();
        assert_eq!(l.buzzer_edges, 2);
        assert_eq!(l.power_toggles, 1);
    }
}
