use crate::actuator::{ServoPosition, ServoState};
use crate::error::FaultCode;
use crate::gesture::GestureDetector;
use crate::logger::ControlEvent;
use crate::util::has_exceeded;

use super::{DeviceMode, ModeContext};

#[derive(Debug, Clone, PartialEq)]
pub struct FillingMode {
    target_g: f32,
    start_g: f32,
    start_ms: u32,
    emergency_stop: bool,
}

impl FillingMode {
    pub fn new(target_g: f32, start_g: f32) -> Self {
        Self {
            target_g,
            start_g,
            start_ms: 0,
            emergency_stop: false,
        }
    }

    pub fn target_g(&self) -> f32 {
        self.target_g
    }

    pub fn start_g(&self) -> f32 {
        self.start_g
    }

    pub fn start_ms(&self) -> u32 {
        self.start_ms
    }

    pub fn is_stopping(&self) -> bool {
        self.emergency_stop
    }

    /// Stop on the next `update`.
    pub fn request_stop(&mut self) {
        self.emergency_stop = true;
    }

    pub(super) fn enter(&mut self, ctx: &mut ModeContext, now: u32) -> Option<DeviceMode> {
        let fresh = ctx.weight.has_fresh_sample();
        if fresh && !ctx.weight.is_kettle_present() {
            ctx.actuators.beep_short(2, now);
            return Some(DeviceMode::idle());
        }
        self.start_ms = now;
        if fresh {
            self.start_g = ctx.weight.current_weight();
        }
        self.emergency_stop = false;
        ctx.actuators.move_servo(ServoPosition::OverKettle, now);
        ctx.actuators.beep_short(1, now);
        ctx.log.record(ControlEvent::FillStarted {
            target_g: self.target_g,
            start_g: self.start_g,
        });
        None
    }

    /// Pump off and servo home on every way out.
    pub(super) fn exit(&mut self, ctx: &mut ModeContext, now: u32) {
        ctx.actuators.pump_off();
        ctx.actuators.park_servo(now);
    }

    pub(super) fn update(&mut self, ctx: &mut ModeContext, now: u32) -> Option<DeviceMode> {
        let fresh = ctx.weight.has_fresh_sample();
        let current = ctx.weight.current_weight();

        if self.emergency_stop {
            ctx.actuators.emergency_stop(now);
            ctx.log.record(ControlEvent::FillStopped { weight_g: current });
            return Some(DeviceMode::idle());
        }
        if fresh && !ctx.weight.is_kettle_present() {
            return Some(DeviceMode::error(FaultCode::NoFlow));
        }
        if has_exceeded(now, self.start_ms, ctx.fill.timeout_ms) {
            return Some(DeviceMode::error(FaultCode::FillTimeout));
        }
        if fresh
            && has_exceeded(now, self.start_ms, ctx.fill.no_flow_grace_ms)
            && ctx.weight.is_weight_stable(now)
            && (current - self.start_g).abs() < ctx.fill.no_flow_delta_g
        {
            return Some(DeviceMode::error(FaultCode::NoFlow));
        }

        match ctx.actuators.servo_state() {
            ServoState::Idle => ctx.actuators.move_servo(ServoPosition::OverKettle, now),
            ServoState::OverKettle if !ctx.actuators.is_pump_on() => ctx.actuators.pump_on(),
            _ => {}
        }

        if fresh && current >= self.target_g - ctx.fill.hysteresis_g {
            ctx.actuators.beep_short(2, now);
            ctx.log.record(ControlEvent::FillCompleted { weight_g: current });
            return Some(DeviceMode::idle());
        }
        None
    }

    pub(super) fn handle_button(
        &mut self,
        ctx: &mut ModeContext,
        gesture: &mut GestureDetector,
        now: u32,
    ) -> Option<DeviceMode> {
        if gesture.is_long_press() {
            self.emergency_stop = true;
            ctx.actuators.beep_short(3, now);
            gesture.reset_clicks();
        } else if gesture.resolved_clicks().is_some() {
            gesture.reset_clicks();
        }
        None
    }
}
