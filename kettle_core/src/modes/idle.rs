use crate::gesture::GestureDetector;
use crate::logger::{ControlEvent, RejectReason};
use crate::presentation::Notice;
use crate::util::{has_elapsed, water_volume};

use super::{DeviceMode, FillPreset, ModeContext};

/// Waiting for a request; keeps the kettle's power relay in step with the
/// water level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdleMode {
    last_power_check: u32,
}

impl IdleMode {
    pub(super) fn enter(&mut self, ctx: &mut ModeContext, now: u32) -> Option<DeviceMode> {
        ctx.actuators.pump_off();
        self.last_power_check = now;
        None
    }

    /// Two-point power control: on at the minimum level, off below
    /// minimum minus hysteresis, always off without a kettle.
    pub(super) fn update(&mut self, ctx: &mut ModeContext, now: u32) -> Option<DeviceMode> {
        if !ctx.weight.has_fresh_sample()
            || !has_elapsed(now, self.last_power_check, ctx.fill.power_check_ms)
        {
            return None;
        }
        self.last_power_check = now;

        if ctx.weight.is_kettle_present() {
            let water = water_volume(ctx.weight.current_weight(), ctx.weight.empty_weight());
            if water >= ctx.fill.min_level_g && !ctx.actuators.is_pump_on() {
                ctx.actuators.set_power(true, now);
            } else if water < ctx.fill.min_level_g - ctx.fill.hysteresis_g {
                ctx.actuators.set_power(false, now);
            }
        } else {
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
        if gesture.is_very_long_press() {
            // Store failures are already logged by the channel.
            let _ = ctx.weight.reset_calibration();
            ctx.actuators.beep_long(2, now);
            ctx.notice = Some(Notice::CalibrationReset);
            gesture.reset_clicks();
            return None;
        }

        let clicks = gesture.resolved_clicks()?;
        // Presence is undefined on a tick without a conversion; keep the
        // series for the next one.
        if !ctx.weight.has_fresh_sample() {
            return None;
        }
        gesture.reset_clicks();

        let present = ctx.weight.is_kettle_present();
        match clicks {
            1 | 2 => {
                if !present {
                    return reject(ctx, RejectReason::KettleAbsent, now);
                }
                if !ctx.weight.is_ready() {
                    return reject(ctx, RejectReason::NotReady, now);
                }
                let preset = if clicks == 1 {
                    FillPreset::TopUp
                } else {
                    FillPreset::Full
                };
                let current = ctx.weight.current_weight();
                let target = preset.target_g(current, ctx.weight.empty_weight(), &ctx.fill);
                Some(DeviceMode::filling(target, current))
            }
            3 if present => Some(DeviceMode::calibration()),
            3 => {
                ctx.actuators.beep_short(2, now);
                None
            }
            _ => None,
        }
    }
}

fn reject(ctx: &mut ModeContext, reason: RejectReason, now: u32) -> Option<DeviceMode> {
    ctx.actuators.beep_short(2, now);
    ctx.log.record(ControlEvent::FillRejected { reason });
    None
}
