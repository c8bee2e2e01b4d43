use crate::error::FaultCode;
use crate::gesture::GestureDetector;
use crate::logger::ControlEvent;

use super::{DeviceMode, ModeContext};

/// Terminal fault mode. Only a reboot leaves it.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMode {
    code: FaultCode,
}

impl ErrorMode {
    pub fn new(code: FaultCode) -> Self {
        Self { code }
    }

    pub fn code(&self) -> FaultCode {
        self.code
    }

    pub(super) fn enter(&mut self, ctx: &mut ModeContext, now: u32) -> Option<DeviceMode> {
        ctx.actuators.shutdown(now);
        ctx.actuators.error_loop(now);
        ctx.log.record(ControlEvent::Fault { code: self.code });
        None
    }

    pub(super) fn update(&mut self, ctx: &mut ModeContext, now: u32) -> Option<DeviceMode> {
        ctx.actuators.error_loop(now);
        None
    }

    pub(super) fn handle_button(&mut self, gesture: &mut GestureDetector) -> Option<DeviceMode> {
        gesture.reset_clicks();
        None
    }
}
