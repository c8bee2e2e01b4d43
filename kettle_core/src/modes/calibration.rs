use crate::error::CalibrationError;
use crate::gesture::GestureDetector;
use crate::logger::ControlEvent;
use crate::presentation::Notice;

use super::{CalibrationStep, DeviceMode, ModeContext};

/// Two-step empty-kettle calibration driven by raw button presses.
///
/// Each step fires once on the press edge and not again until the button
/// has been released. After a successful measurement the mode stays put
/// until the presentation hold returns it to Idle.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationMode {
    step: CalibrationStep,
    press_handled: bool,
    completed: bool,
}

impl Default for CalibrationMode {
    fn default() -> Self {
        Self {
            step: CalibrationStep::WaitRemove,
            press_handled: false,
            completed: false,
        }
    }
}

impl CalibrationMode {
    pub fn step(&self) -> CalibrationStep {
        self.step
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub(super) fn enter(&mut self, ctx: &mut ModeContext, now: u32) -> Option<DeviceMode> {
        ctx.actuators.pump_off();
        ctx.actuators.set_power(false, now);
        *self = Self::default();
        None
    }

    /// The power relay may still be in its cooldown on entry.
    pub(super) fn update(&mut self, ctx: &mut ModeContext, now: u32) -> Option<DeviceMode> {
        if ctx.actuators.is_power_on() {
            ctx.actuators.set_power(false, now);
        }
        None
    }

    pub(super) fn handle_button(
        &mut self,
        ctx: &mut ModeContext,
        gesture: &mut GestureDetector,
        now: u32,
    ) -> Option<DeviceMode> {
        // Presses here are steps, never clicks.
        gesture.reset_clicks();

        if self.completed {
            return None;
        }
        if !gesture.is_pressed() {
            self.press_handled = false;
            return None;
        }
        if self.press_handled || !ctx.weight.has_fresh_sample() {
            return None;
        }
        self.press_handled = true;

        match self.step {
            CalibrationStep::WaitRemove => {
                if ctx.weight.tare() {
                    self.step = CalibrationStep::WaitPlace;
                }
            }
            CalibrationStep::WaitPlace => {
                let grams = ctx.weight.current_weight();
                match ctx.weight.calibrate_empty(grams) {
                    Ok(()) | Err(CalibrationError::Store(_)) => {
                        ctx.actuators.beep_short(1, now);
                        ctx.notice = Some(Notice::CalibrationSuccess);
                        self.completed = true;
                    }
                    Err(_) => {
                        ctx.actuators.beep_long(1, now);
                        ctx.notice = Some(Notice::CalibrationError);
                        ctx.log.record(ControlEvent::CalibrationRejected { grams });
                    }
                }
            }
        }
        None
    }
}
