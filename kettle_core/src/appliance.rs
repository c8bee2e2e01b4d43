//! The assembled appliance: button, controller and presentation hold,
//! driven one tick at a time.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use kettle_traits::{Actuators, ButtonInput, Clock, LoadCell, NvStore};

use crate::actuator::ActuatorSequencer;
use crate::calibration::{CalibrationStore, RECORD_LEN};
use crate::config::ApplianceCfg;
use crate::controller::ModeController;
use crate::error::{BuildError, FaultCode, Result};
use crate::gesture::GestureDetector;
use crate::logger::{EventLog, TracingLog};
use crate::modes::ModeKind;
use crate::presentation::NoticeHold;
use crate::status::Snapshot;
use crate::util::elapsed_ms;
use crate::weight::WeightChannel;

/// Why `run_until` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The shutdown flag was raised.
    Shutdown,
    /// The loop ended while the device was in its terminal Error mode.
    Fault(FaultCode),
    /// The per-tick callback asked to stop.
    Stopped,
}

pub struct Appliance {
    button: Box<dyn ButtonInput>,
    gesture: GestureDetector,
    controller: ModeController,
    hold: NoticeHold,
}

impl Appliance {
    pub fn builder() -> ApplianceBuilder {
        ApplianceBuilder::default()
    }

    /// One control cycle: gesture, weight sample, button dispatch,
    /// transition commit and mode update, then presentation timers.
    pub fn tick(&mut self, now: u32) {
        let raw_low = self.button.is_low();
        self.gesture.tick(raw_low, now);
        self.controller.sample(now);
        self.controller.handle_button(&mut self.gesture, now);
        self.controller.update(now);
        if let Some(notice) = self.controller.take_notice() {
            self.hold.show(notice, now);
        }
        self.hold.tick(now, &mut self.controller);
    }

    /// Deliver a remote preset code (1..=8).
    pub fn remote_command(&mut self, code: i32, now: u32) {
        self.controller.handle_remote_command(code, now);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            notice: self.hold.active(),
            ..self.controller.snapshot()
        }
    }

    pub fn mode(&self) -> ModeKind {
        self.controller.kind()
    }

    pub fn controller(&self) -> &ModeController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ModeController {
        &mut self.controller
    }

    pub fn gesture(&self) -> &GestureDetector {
        &self.gesture
    }

    /// Tick every `period` until `shutdown` is raised or `on_tick` breaks.
    ///
    /// Error mode is not a reason to stop: the loop keeps ticking so the
    /// outputs stay safe and the error cadence keeps sounding. Whichever way
    /// the loop ends, it reports `Fault` if the device is in Error by then.
    /// `on_tick` runs after each tick with the tick's timestamp.
    pub fn run_until<F>(
        &mut self,
        clock: &dyn Clock,
        period: Duration,
        shutdown: &AtomicBool,
        mut on_tick: F,
    ) -> RunOutcome
    where
        F: FnMut(&mut Self, u32) -> ControlFlow<()>,
    {
        let period_ms = u32::try_from(period.as_millis()).unwrap_or(u32::MAX).max(1);
        let mut faulted = false;
        let outcome = loop {
            if shutdown.load(Ordering::Relaxed) {
                break RunOutcome::Shutdown;
            }
            let now = clock.now_ms();
            self.tick(now);
            if !faulted && let Some(code) = self.controller.fault() {
                faulted = true;
                tracing::error!(fault = code.name(), "in Error mode; holding until shutdown");
            }
            if on_tick(self, now).is_break() {
                break RunOutcome::Stopped;
            }
            let spent = elapsed_ms(clock.now_ms(), now).max(0).unsigned_abs();
            if spent < period_ms {
                clock.sleep(Duration::from_millis(u64::from(period_ms - spent)));
            }
        };
        self.controller.fault().map_or(outcome, RunOutcome::Fault)
    }
}

// ── Builder ──────────────────────────────────────────────────────────────────

/// Collects the peripherals and configuration. All are checked on `build`.
#[derive(Default)]
pub struct ApplianceBuilder {
    cell: Option<Box<dyn LoadCell>>,
    button: Option<Box<dyn ButtonInput>>,
    outputs: Option<Box<dyn Actuators>>,
    store: Option<Box<dyn NvStore>>,
    cfg: ApplianceCfg,
    log: Option<Arc<dyn EventLog + Send + Sync>>,
}

impl ApplianceBuilder {
    pub fn with_load_cell(mut self, cell: impl LoadCell + 'static) -> Self {
        self.cell = Some(Box::new(cell));
        self
    }

    pub fn with_button(mut self, button: impl ButtonInput + 'static) -> Self {
        self.button = Some(Box::new(button));
        self
    }

    pub fn with_actuators(mut self, outputs: impl Actuators + 'static) -> Self {
        self.outputs = Some(Box::new(outputs));
        self
    }

    pub fn with_store(mut self, store: impl NvStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn with_config(mut self, cfg: ApplianceCfg) -> Self {
        self.cfg = cfg;
        self
    }

    /// Defaults to [`TracingLog`].
    pub fn with_log(mut self, log: Arc<dyn EventLog + Send + Sync>) -> Self {
        self.log = Some(log);
        self
    }

    fn validate(cfg: &ApplianceCfg) -> std::result::Result<(), BuildError> {
        if cfg.button.debounce_ms == 0 {
            return Err(BuildError::InvalidConfig("debounce_ms must be >= 1"));
        }
        if cfg.scale.median_window == 0 {
            return Err(BuildError::InvalidConfig("median_window must be >= 1"));
        }
        if !(cfg.scale.default_factor.is_finite() && cfg.scale.default_factor > 0.0) {
            return Err(BuildError::InvalidConfig("default_factor must be > 0"));
        }
        if cfg.scale.outlier_reseed_after < 2 {
            return Err(BuildError::InvalidConfig("outlier_reseed_after must be >= 2"));
        }
        if cfg.fill.min_level_g >= cfg.fill.full_level_g {
            return Err(BuildError::InvalidConfig(
                "min_level_g must be below full_level_g",
            ));
        }
        match cfg.storage.base_addr.checked_add(RECORD_LEN) {
            Some(end) if end <= cfg.storage.size => Ok(()),
            _ => Err(BuildError::InvalidConfig(
                "calibration record does not fit in the store",
            )),
        }
    }

    /// Wire everything up with `now` as the start of every timer.
    pub fn build(self, now: u32) -> Result<Appliance> {
        let cell = self
            .cell
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLoadCell))?;
        let button = self
            .button
            .ok_or_else(|| eyre::Report::new(BuildError::MissingButton))?;
        let outputs = self
            .outputs
            .ok_or_else(|| eyre::Report::new(BuildError::MissingActuators))?;
        let store = self
            .store
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStore))?;
        Self::validate(&self.cfg).map_err(eyre::Report::new)?;

        let cfg = self.cfg;
        let log: Arc<dyn EventLog + Send + Sync> =
            self.log.unwrap_or_else(|| Arc::new(TracingLog));

        let actuators = ActuatorSequencer::new(outputs, cfg.actuators, log.clone());
        let store = CalibrationStore::new(store, cfg.storage.base_addr);
        let weight = WeightChannel::open(cell, store, cfg.scale, log.clone(), now);
        let controller = ModeController::new(weight, actuators, cfg.fill, log, now);

        tracing::debug!(
            empty_g = controller.weight().empty_weight(),
            factor = controller.weight().factor(),
            ready = controller.weight().is_ready(),
            "appliance assembled"
        );

        Ok(Appliance {
            button,
            gesture: GestureDetector::new(cfg.button, now),
            controller,
            hold: NoticeHold::new(cfg.notice),
        })
    }
}
