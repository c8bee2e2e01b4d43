//! Timed presentation notices.
//!
//! Messages such as "calibration saved" are shown for a fixed time without
//! blocking the loop. When a success notice expires the hold returns the
//! device to Idle through the controller's public entry point.

use crate::config::NoticeCfg;
use crate::controller::ModeController;
use crate::util::has_elapsed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    CalibrationSuccess,
    CalibrationError,
    CalibrationReset,
}

impl Notice {
    pub fn message(self) -> &'static str {
        match self {
            Self::CalibrationSuccess => "calibration saved",
            Self::CalibrationError => "implausible empty weight, try again",
            Self::CalibrationReset => "calibration reset to defaults",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NoticeHold {
    hold_ms: u32,
    active: Option<(Notice, u32)>,
}

impl NoticeHold {
    pub fn new(cfg: NoticeCfg) -> Self {
        Self {
            hold_ms: cfg.hold_ms,
            active: None,
        }
    }

    /// Show `notice` from `now`, replacing any current one.
    pub fn show(&mut self, notice: Notice, now: u32) {
        self.active = Some((notice, now));
    }

    pub fn active(&self) -> Option<Notice> {
        self.active.map(|(n, _)| n)
    }

    pub fn tick(&mut self, now: u32, ctrl: &mut ModeController) {
        let Some((notice, since)) = self.active else {
            return;
        };
        if !has_elapsed(now, since, self.hold_ms) {
            return;
        }
        self.active = None;
        if notice == Notice::CalibrationSuccess {
            ctrl.request_idle();
        }
    }
}
