//! The authoritative device mode and its transition discipline.
//!
//! Requests (from modes, the watchdog, remote commands or the presentation
//! hold) are checked against [`ModeKind::can_transition_to`] and parked as
//! a single pending transition. The next [`ModeController::update`]
//! commits it: `exit` on the old mode, the old value dropped, `enter` on
//! the new one, entry time reset. A pending Error cannot be replaced.

use std::sync::Arc;

use crate::actuator::ActuatorSequencer;
use crate::config::FillCfg;
use crate::error::FaultCode;
use crate::gesture::GestureDetector;
use crate::logger::{ControlEvent, EventLog, RejectReason};
use crate::modes::{DeviceMode, FillPreset, ModeContext, ModeKind};
use crate::presentation::Notice;
use crate::status::Snapshot;
use crate::util::{cups, elapsed_ms, water_volume};
use crate::weight::WeightChannel;

/// Remote code that stops a running fill.
pub const REMOTE_STOP: i32 = 8;

/// Bound on transitions requested from `enter` hooks within one commit.
const MAX_CHAINED_ENTRIES: usize = 4;

pub struct ModeController {
    mode: DeviceMode,
    pending: Option<DeviceMode>,
    entered_at: u32,
    ctx: ModeContext,
}

impl ModeController {
    /// Starts in Idle, with Idle's `enter` already run.
    pub fn new(
        weight: WeightChannel,
        actuators: ActuatorSequencer,
        fill: FillCfg,
        log: Arc<dyn EventLog + Send + Sync>,
        now: u32,
    ) -> Self {
        let mut ctrl = Self {
            mode: DeviceMode::idle(),
            pending: None,
            entered_at: now,
            ctx: ModeContext {
                weight,
                actuators,
                fill,
                log,
                notice: None,
            },
        };
        ctrl.ctx.log.record(ControlEvent::ModeEntered {
            mode: ModeKind::Idle,
        });
        if let Some(next) = ctrl.mode.enter(&mut ctrl.ctx, now) {
            ctrl.request_transition(next);
        }
        ctrl
    }

    pub fn mode(&self) -> &DeviceMode {
        &self.mode
    }

    pub fn kind(&self) -> ModeKind {
        self.mode.kind()
    }

    pub fn pending_kind(&self) -> Option<ModeKind> {
        self.pending.as_ref().map(DeviceMode::kind)
    }

    pub fn fault(&self) -> Option<FaultCode> {
        self.mode.fault()
    }

    pub fn time_in_mode(&self, now: u32) -> i32 {
        elapsed_ms(now, self.entered_at)
    }

    pub fn weight(&self) -> &WeightChannel {
        &self.ctx.weight
    }

    pub fn weight_mut(&mut self) -> &mut WeightChannel {
        &mut self.ctx.weight
    }

    pub fn actuators(&self) -> &ActuatorSequencer {
        &self.ctx.actuators
    }

    /// Park `next` for the next `update`. Returns false when the table
    /// forbids it (logged) or an Error is already pending.
    pub fn request_transition(&mut self, next: DeviceMode) -> bool {
        if self
            .pending
            .as_ref()
            .is_some_and(|p| p.kind() == ModeKind::Error)
        {
            return false;
        }
        let from = self.mode.kind();
        let to = next.kind();
        if !from.can_transition_to(to) {
            self.ctx
                .log
                .record(ControlEvent::TransitionDenied { from, to });
            return false;
        }
        self.pending = Some(next);
        true
    }

    pub fn request_idle(&mut self) -> bool {
        self.request_transition(DeviceMode::idle())
    }

    /// Read the weight channel and run the sensor watchdog. Returns whether
    /// a fresh conversion arrived.
    pub fn sample(&mut self, now: u32) -> bool {
        let fresh = self.ctx.weight.update(now);
        if self.mode.kind() != ModeKind::Error && self.ctx.weight.sensor_silent(now) {
            self.request_transition(DeviceMode::error(FaultCode::SensorTimeout));
        }
        fresh
    }

    pub fn handle_button(&mut self, gesture: &mut GestureDetector, now: u32) {
        if let Some(next) = self.mode.handle_button(&mut self.ctx, gesture, now) {
            self.request_transition(next);
        }
    }

    /// Advance actuators, commit any pending transition, then run the
    /// active mode.
    pub fn update(&mut self, now: u32) {
        self.ctx.actuators.update(now);
        self.commit_pending(now);
        if let Some(next) = self.mode.update(&mut self.ctx, now) {
            self.request_transition(next);
        }
    }

    fn commit_pending(&mut self, now: u32) {
        for _ in 0..MAX_CHAINED_ENTRIES {
            let Some(next) = self.pending.take() else {
                return;
            };
            self.mode.exit(&mut self.ctx, now);
            self.mode = next;
            self.entered_at = now;
            self.ctx.log.record(ControlEvent::ModeEntered {
                mode: self.mode.kind(),
            });
            if let Some(follow) = self.mode.enter(&mut self.ctx, now) {
                self.request_transition(follow);
            }
        }
    }

    /// Remote preset entry point. Codes 1..=7 are fill presets, 8 stops a
    /// running fill. The outcome is only observable through the mode and
    /// the buzzer.
    pub fn handle_remote_command(&mut self, code: i32, now: u32) {
        self.ctx.log.record(ControlEvent::RemoteCommand { code });

        if !(1..=REMOTE_STOP).contains(&code) {
            self.reject_remote(code, RejectReason::InvalidCode, true, now);
            return;
        }

        if code == REMOTE_STOP {
            if let DeviceMode::Filling(_) = self.mode {
                self.ctx.actuators.emergency_stop(now);
                self.ctx.actuators.beep_short(3, now);
                self.ctx.log.record(ControlEvent::FillStopped {
                    weight_g: self.ctx.weight.current_weight(),
                });
                self.request_idle();
            } else {
                self.ctx.log.record(ControlEvent::RemoteStopIgnored {
                    mode: self.mode.kind(),
                });
            }
            return;
        }

        match self.mode.kind() {
            ModeKind::Idle => {}
            // Leave the error cadence alone.
            ModeKind::Error => {
                self.reject_remote(code, RejectReason::NotIdle, false, now);
                return;
            }
            ModeKind::Filling | ModeKind::Calibration => {
                self.reject_remote(code, RejectReason::NotIdle, true, now);
                return;
            }
        }

        // Remote commands arrive between ticks; judge the last accepted
        // weight rather than a conversion that may have been missed.
        let weight = &self.ctx.weight;
        if weight.last_known_presence() != Some(true) {
            self.reject_remote(code, RejectReason::KettleAbsent, true, now);
            return;
        }
        if !weight.is_ready() {
            self.reject_remote(code, RejectReason::NotReady, true, now);
            return;
        }
        let Some(preset) = FillPreset::from_code(code) else {
            self.reject_remote(code, RejectReason::InvalidCode, true, now);
            return;
        };
        let current = weight.last_known_weight().unwrap_or(0.0);
        let target = preset.target_g(current, weight.empty_weight(), &self.ctx.fill);
        if target <= current + self.ctx.fill.remote_margin_g {
            self.reject_remote(code, RejectReason::TargetReached, true, now);
            return;
        }
        self.request_transition(DeviceMode::filling(target, current));
    }

    fn reject_remote(&mut self, code: i32, reason: RejectReason, beep: bool, now: u32) {
        if beep {
            self.ctx.actuators.beep_short(2, now);
        }
        self.ctx
            .log
            .record(ControlEvent::RemoteRejected { code, reason });
    }

    /// Notice posted by a mode since the last call.
    pub fn take_notice(&mut self) -> Option<Notice> {
        self.ctx.notice.take()
    }

    /// Read-only view for presentation and transport layers. `notice` is
    /// left empty; the hold timer owns it. Weight fields show the last
    /// accepted value, so a missed conversion does not blank them.
    pub fn snapshot(&self) -> Snapshot {
        let w = &self.ctx.weight;
        let a = &self.ctx.actuators;
        let current = w.last_known_weight().unwrap_or(0.0);
        let water = water_volume(current, w.empty_weight());
        let (target_g, start_g) = match &self.mode {
            DeviceMode::Filling(f) => (Some(f.target_g()), Some(f.start_g())),
            _ => (None, None),
        };
        let calibration_step = match &self.mode {
            DeviceMode::Calibration(c) => Some(c.step()),
            _ => None,
        };
        Snapshot {
            mode: self.mode.kind(),
            error: self.mode.fault(),
            kettle_present: w.last_known_presence().unwrap_or(false),
            current_g: current,
            target_g,
            start_g,
            empty_g: w.empty_weight(),
            power_on: a.is_power_on(),
            pump_on: a.is_pump_on(),
            servo: a.servo_state(),
            calibration_step,
            notice: None,
            water_g: water,
            cups: cups(water, self.ctx.fill.cup_g),
            ready: w.is_ready(),
        }
    }
}
