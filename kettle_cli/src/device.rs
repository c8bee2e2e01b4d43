//! Backend selection and appliance assembly.

use std::sync::Arc;
use std::time::Duration;

use eyre::{Result, WrapErr};
use kettle_config::{Config, StorageCfg};
use kettle_core::{
    Appliance, ApplianceBuilder, ApplianceCfg, ControlEvent, EventLog, MemoryLog, TracingLog,
};
use kettle_hardware::{FileStore, MemoryStore};
use kettle_traits::Clock;

use crate::sim::Plant;

/// Events kept for reporting; `run` can go on for days.
const RECENT_EVENTS: usize = 256;

/// Forwards to `tracing` and keeps the latest events so commands can report
/// what the kernel decided.
#[derive(Debug)]
pub struct CliLog {
    recent: MemoryLog,
}

impl Default for CliLog {
    fn default() -> Self {
        Self {
            recent: MemoryLog::bounded(RECENT_EVENTS),
        }
    }
}

impl CliLog {
    pub fn events(&self) -> Vec<ControlEvent> {
        self.recent.events()
    }

    pub fn clear(&self) {
        self.recent.clear();
    }
}

impl EventLog for CliLog {
    fn record(&self, event: ControlEvent) {
        TracingLog.record(event.clone());
        self.recent.record(event);
    }
}

/// An assembled appliance plus whatever drives it.
pub struct Device {
    pub app: Appliance,
    pub plant: Option<Plant>,
    pub clock: Box<dyn Clock>,
    pub period: Duration,
    pub log: Arc<CliLog>,
    /// Calibration changes survive the process.
    pub persistent: bool,
    /// Ticks follow the wall clock, so someone may be next to the device.
    pub realtime: bool,
}

fn with_store(builder: ApplianceBuilder, st: &StorageCfg) -> Result<ApplianceBuilder> {
    Ok(match st.path.as_deref() {
        Some(path) => {
            let store = FileStore::open(path, st.size)
                .wrap_err_with(|| format!("open calibration store {path}"))?;
            builder.with_store(store)
        }
        None => builder.with_store(MemoryStore::new(st.size)),
    })
}

impl Device {
    /// Open the configured backend. `realtime` only matters for the
    /// simulator, which otherwise runs on a virtual clock.
    pub fn open(cfg: &Config, realtime: bool) -> Result<Self> {
        let log = Arc::new(CliLog::default());
        let builder = with_store(
            Appliance::builder()
                .with_config(ApplianceCfg::from(cfg))
                .with_log(log.clone()),
            &cfg.storage,
        )?;
        let period = Duration::from_millis(u64::from(cfg.runner.period_ms));
        let persistent = cfg.storage.path.is_some();

        #[cfg(all(feature = "hardware", target_os = "linux"))]
        {
            let _ = realtime;
            let p = &cfg.pins;
            let pins = kettle_hardware::pi::PiPins {
                hx711_dt: p.hx711_dt,
                hx711_sck: p.hx711_sck,
                button: p.button,
                pump_relay: p.pump_relay,
                power_relay: p.power_relay,
                servo: p.servo,
                buzzer: p.buzzer,
            };
            let (cell, button, outputs) =
                kettle_hardware::pi::open_all(&pins, cfg.scale.gain_pulses)
                    .wrap_err("open hardware peripherals")?;
            let clock = kettle_traits::MonotonicClock::new();
            let app = builder
                .with_load_cell(cell)
                .with_button(button)
                .with_actuators(outputs)
                .build(clock.now_ms())?;
            tracing::info!(backend = "hardware", persistent, "device ready");
            Ok(Self {
                app,
                plant: None,
                clock: Box::new(clock),
                period,
                log,
                persistent,
                realtime: true,
            })
        }

        #[cfg(not(all(feature = "hardware", target_os = "linux")))]
        {
            use kettle_hardware::{SimulatedButton, SimulatedLoadCell, SimulatedOutputs};

            let cell = SimulatedLoadCell::new(0);
            if std::env::var_os("KETTLEFILL_TEST_SIM_STALL").is_some() {
                cell.set_stalled(true);
            }
            let outputs = SimulatedOutputs::new();
            let clock: Box<dyn Clock> = if realtime {
                Box::new(kettle_traits::MonotonicClock::new())
            } else {
                Box::new(kettle_traits::ManualClock::new())
            };
            let app = builder
                .with_load_cell(cell.clone())
                .with_button(SimulatedButton::new())
                .with_actuators(outputs.clone())
                .build(clock.now_ms())?;
            let mut plant = Plant::new(
                cell,
                outputs,
                cfg.sim.start_g,
                cfg.sim.flow_g_per_s,
                cfg.actuators.servo_kettle_deg,
            );
            plant.advance(clock.now_ms(), &app);
            tracing::info!(backend = "sim", persistent, realtime, "device ready");
            Ok(Self {
                app,
                plant: Some(plant),
                clock,
                period,
                log,
                persistent,
                realtime,
            })
        }
    }

    /// One tick at the configured cadence. Returns the tick's timestamp.
    pub fn step(&mut self) -> u32 {
        let now = self.clock.now_ms();
        self.app.tick(now);
        if let Some(plant) = self.plant.as_mut() {
            plant.advance(now, &self.app);
        }
        self.clock.sleep(self.period);
        now
    }

    /// Enough ticks for the median window to fill.
    pub fn settle(&mut self) {
        let n = self.app.controller().weight().config().median_window + 1;
        for _ in 0..n {
            self.step();
        }
    }

    pub fn now(&self) -> u32 {
        self.clock.now_ms()
    }

    pub fn warn_if_volatile(&self) {
        if !self.persistent {
            tracing::warn!("storage.path is not set; calibration changes are lost on exit");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_log_stays_bounded() {
        let log = CliLog::default();
        for on in (0..RECENT_EVENTS * 4).map(|i| i % 2 == 0) {
            log.record(ControlEvent::PowerRelay { on });
        }
        assert_eq!(log.events().len(), RECENT_EVENTS);
        assert_eq!(
            log.events().last(),
            Some(&ControlEvent::PowerRelay { on: false })
        );
    }
}
