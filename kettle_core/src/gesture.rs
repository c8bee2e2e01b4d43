//! Debounced single-button gesture detection.
//!
//! The detector is fed the raw pin level once per tick and classifies it
//! into press/release, click series (1..=3) and two edge-triggered hold
//! gestures. It performs no I/O.
//!
//! Click series are level-triggered: once a series resolves, the
//! `is_*_click` predicates keep answering until the caller consumes them
//! with [`GestureDetector::reset_clicks`]. A new press after an unconsumed
//! series starts a fresh one.

use crate::config::ButtonCfg;
use crate::util::{elapsed_ms, has_elapsed, has_exceeded};

const MAX_CLICKS: u8 = 3;

#[derive(Debug, Clone)]
pub struct GestureDetector {
    cfg: ButtonCfg,
    last_raw_low: bool,
    last_change: u32,
    stable_low: bool,
    press_start: Option<u32>,
    click_count: u8,
    last_click: u32,
    resolved: bool,
    long_reported: bool,
    very_long_reported: bool,
    now: u32,
}

impl GestureDetector {
    /// Starts released, with the debounce timer anchored at `now`.
    pub fn new(cfg: ButtonCfg, now: u32) -> Self {
        Self {
            cfg,
            last_raw_low: false,
            last_change: now,
            stable_low: false,
            press_start: None,
            click_count: 0,
            last_click: now,
            resolved: false,
            long_reported: false,
            very_long_reported: false,
            now,
        }
    }

    /// Feed one raw sample. `raw_low` is the active-low contact state.
    pub fn tick(&mut self, raw_low: bool, now: u32) {
        self.now = now;

        if raw_low != self.last_raw_low {
            self.last_raw_low = raw_low;
            self.last_change = now;
        } else if raw_low != self.stable_low
            && has_exceeded(now, self.last_change, self.cfg.debounce_ms)
        {
            self.stable_low = raw_low;
            if raw_low {
                self.on_press(now);
            } else {
                self.on_release(now);
            }
        }

        if !self.resolved
            && !self.stable_low
            && self.click_count > 0
            && has_exceeded(now, self.last_click, self.cfg.multi_click_ms)
        {
            self.resolved = true;
        }
    }

    fn on_press(&mut self, now: u32) {
        if self.resolved {
            self.click_count = 0;
            self.resolved = false;
        }
        self.press_start = Some(now);
        self.long_reported = false;
        self.very_long_reported = false;
    }

    fn on_release(&mut self, now: u32) {
        let Some(start) = self.press_start.take() else {
            return;
        };
        if !has_elapsed(now, start, self.cfg.long_press_ms) {
            self.click_count = (self.click_count + 1).min(MAX_CLICKS);
            self.last_click = now;
        }
    }

    /// Debounced level: true while the button is held.
    pub fn is_pressed(&self) -> bool {
        self.stable_low
    }

    /// Milliseconds the current press has been held, 0 when released.
    pub fn held_ms(&self) -> u32 {
        match self.press_start {
            Some(start) if self.stable_low => elapsed_ms(self.now, start).max(0).unsigned_abs(),
            _ => 0,
        }
    }

    /// Clicks counted in the current series, resolved or not.
    pub fn click_count(&self) -> u8 {
        self.click_count
    }

    /// Count of a resolved series, `None` while a series is still open.
    pub fn resolved_clicks(&self) -> Option<u8> {
        self.resolved.then_some(self.click_count)
    }

    pub fn is_single_click(&self) -> bool {
        self.resolved_clicks() == Some(1)
    }

    pub fn is_double_click(&self) -> bool {
        self.resolved_clicks() == Some(2)
    }

    pub fn is_triple_click(&self) -> bool {
        self.resolved_clicks() == Some(3)
    }

    /// Consume the current click series.
    pub fn reset_clicks(&mut self) {
        self.click_count = 0;
        self.resolved = false;
    }

    /// True once per press, the first time it is asked after the hold
    /// reaches `long_press_ms`.
    pub fn is_long_press(&mut self) -> bool {
        if self.long_reported || self.press_start.is_none() || !self.stable_low {
            return false;
        }
        if self.held_ms() >= self.cfg.long_press_ms {
            self.long_reported = true;
            return true;
        }
        false
    }

    /// True once per press after the hold reaches `very_long_press_ms`.
    /// Also marks the long press as reported. A press whose long press was
    /// already consumed never turns into a very long one.
    pub fn is_very_long_press(&mut self) -> bool {
        if self.very_long_reported
            || self.long_reported
            || self.press_start.is_none()
            || !self.stable_low
        {
            return false;
        }
        if self.held_ms() >= self.cfg.very_long_press_ms {
            self.very_long_reported = true;
            self.long_reported = true;
            return true;
        }
        false
    }
}
