#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the kettle filler.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section except `[pins]` may be omitted; the defaults are the
//!   appliance's factory constants.
use serde::Deserialize;

/// Bytes occupied by the persisted calibration record in the store image.
pub const CALIBRATION_RECORD_LEN: usize = 17;

/// BCM pin numbers. Unused by the simulated backend but always required so a
/// config file can be moved to the device unchanged.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Pins {
    pub hx711_dt: u8,
    pub hx711_sck: u8,
    pub button: u8,
    pub pump_relay: u8,
    pub power_relay: u8,
    pub servo: u8,
    pub buzzer: u8,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ButtonCfg {
    pub debounce_ms: u32,
    pub long_press_ms: u32,
    pub very_long_press_ms: u32,
    /// Quiet period that closes a click series
    pub multi_click_ms: u32,
}

impl Default for ButtonCfg {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            long_press_ms: 3_000,
            very_long_press_ms: 10_000,
            multi_click_ms: 400,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScaleCfg {
    pub median_window: usize,
    /// Samples further than this from the filtered weight are dropped
    pub outlier_jump_g: f32,
    /// Consecutive drops after which the window is re-seeded at the new level
    pub outlier_reseed_after: u32,
    pub stable_band_g: f32,
    pub stable_ms: u32,
    pub kettle_hysteresis_g: f32,
    /// No conversion for this long is a sensor fault
    pub sensor_timeout_ms: u32,
    /// Grams per raw count until a factor calibration is stored
    pub default_factor: f32,
    /// Exclusive plausibility range for the empty-kettle weight
    pub empty_min_g: f32,
    pub empty_max_g: f32,
    /// Raw conversions averaged by a factor calibration
    pub factor_samples: usize,
    /// HX711 extra clock pulses: 1 = A/128, 2 = B/32, 3 = A/64
    pub gain_pulses: u8,
}

impl Default for ScaleCfg {
    fn default() -> Self {
        Self {
            median_window: 5,
            outlier_jump_g: 500.0,
            outlier_reseed_after: 5,
            stable_band_g: 5.0,
            stable_ms: 2_000,
            kettle_hysteresis_g: 20.0,
            sensor_timeout_ms: 3_000,
            default_factor: 0.000_42,
            empty_min_g: 100.0,
            empty_max_g: 5_000.0,
            factor_samples: 20,
            gain_pulses: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ActuatorCfg {
    /// Minimum spacing between power relay toggles
    pub power_cooldown_ms: u32,
    pub servo_travel_ms: u32,
    pub servo_idle_deg: u8,
    pub servo_kettle_deg: u8,
    /// Short tone length; long tones are 3x, gaps 2x
    pub beep_unit_ms: u32,
    /// Error cadence period
    pub error_cycle_ms: u32,
}

impl Default for ActuatorCfg {
    fn default() -> Self {
        Self {
            power_cooldown_ms: 2_000,
            servo_travel_ms: 1_000,
            servo_idle_deg: 0,
            servo_kettle_deg: 90,
            beep_unit_ms: 100,
            error_cycle_ms: 5_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FillCfg {
    pub cup_g: f32,
    /// Water level that single-click tops up to, and that enables kettle power
    pub min_level_g: f32,
    pub full_level_g: f32,
    pub hysteresis_g: f32,
    pub timeout_ms: u32,
    pub no_flow_grace_ms: u32,
    /// Minimum weight gain expected once the grace period is over
    pub no_flow_delta_g: f32,
    /// Remote targets must exceed the current weight by more than this
    pub remote_margin_g: f32,
    pub power_check_ms: u32,
}

impl Default for FillCfg {
    fn default() -> Self {
        Self {
            cup_g: 250.0,
            min_level_g: 500.0,
            full_level_g: 1_700.0,
            hysteresis_g: 20.0,
            timeout_ms: 120_000,
            no_flow_grace_ms: 5_000,
            no_flow_delta_g: 10.0,
            remote_margin_g: 10.0,
            power_check_ms: 1_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NoticeCfg {
    pub hold_ms: u32,
}

impl Default for NoticeCfg {
    fn default() -> Self {
        Self { hold_ms: 2_000 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageCfg {
    /// EEPROM image file; absent means an in-memory image (lost on exit)
    pub path: Option<String>,
    pub base_addr: usize,
    pub size: usize,
}

impl Default for StorageCfg {
    fn default() -> Self {
        Self {
            path: None,
            base_addr: 0,
            size: 512,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunnerCfg {
    /// Control loop cadence
    pub period_ms: u32,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self { period_ms: 100 }
    }
}

/// Plant model for the simulated backend.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimCfg {
    /// Load on the scale at start (kettle plus water)
    pub start_g: f32,
    /// Water delivered while the pump runs over the kettle
    pub flow_g_per_s: f32,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            start_g: 0.0,
            flow_g_per_s: 50.0,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub button: ButtonCfg,
    #[serde(default)]
    pub scale: ScaleCfg,
    #[serde(default)]
    pub actuators: ActuatorCfg,
    #[serde(default)]
    pub fill: FillCfg,
    #[serde(default)]
    pub notice: NoticeCfg,
    #[serde(default)]
    pub storage: StorageCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub runner: RunnerCfg,
    #[serde(default)]
    pub sim: SimCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

fn non_negative(v: f32) -> bool {
    v.is_finite() && v >= 0.0
}

fn positive(v: f32) -> bool {
    v.is_finite() && v > 0.0
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Button
        let b = &self.button;
        if b.debounce_ms == 0 {
            eyre::bail!("button.debounce_ms must be >= 1");
        }
        if b.long_press_ms <= b.debounce_ms {
            eyre::bail!("button.long_press_ms must be > button.debounce_ms");
        }
        if b.very_long_press_ms <= b.long_press_ms {
            eyre::bail!("button.very_long_press_ms must be > button.long_press_ms");
        }
        if b.multi_click_ms == 0 {
            eyre::bail!("button.multi_click_ms must be >= 1");
        }

        // Scale
        let s = &self.scale;
        if s.median_window == 0 || s.median_window > 64 {
            eyre::bail!("scale.median_window must be in [1, 64]");
        }
        if !positive(s.outlier_jump_g) {
            eyre::bail!("scale.outlier_jump_g must be > 0");
        }
        if s.outlier_reseed_after < 2 {
            eyre::bail!("scale.outlier_reseed_after must be >= 2");
        }
        if !positive(s.stable_band_g) {
            eyre::bail!("scale.stable_band_g must be > 0");
        }
        if s.stable_ms == 0 {
            eyre::bail!("scale.stable_ms must be >= 1");
        }
        if !non_negative(s.kettle_hysteresis_g) {
            eyre::bail!("scale.kettle_hysteresis_g must be >= 0");
        }
        if s.sensor_timeout_ms == 0 {
            eyre::bail!("scale.sensor_timeout_ms must be >= 1");
        }
        if !positive(s.default_factor) {
            eyre::bail!("scale.default_factor must be a positive finite number");
        }
        if !non_negative(s.empty_min_g) || !s.empty_max_g.is_finite() {
            eyre::bail!("scale.empty_min_g/empty_max_g must be finite and >= 0");
        }
        if s.empty_min_g >= s.empty_max_g {
            eyre::bail!("scale.empty_min_g must be < scale.empty_max_g");
        }
        if s.factor_samples == 0 {
            eyre::bail!("scale.factor_samples must be >= 1");
        }
        if !(1..=3).contains(&s.gain_pulses) {
            eyre::bail!("scale.gain_pulses must be in [1, 3]");
        }

        // Actuators
        let a = &self.actuators;
        if a.servo_idle_deg > 180 || a.servo_kettle_deg > 180 {
            eyre::bail!("actuators servo angles must be <= 180");
        }
        if a.servo_idle_deg == a.servo_kettle_deg {
            eyre::bail!("actuators.servo_idle_deg and servo_kettle_deg must differ");
        }
        if a.servo_travel_ms == 0 {
            eyre::bail!("actuators.servo_travel_ms must be >= 1");
        }
        if a.beep_unit_ms == 0 {
            eyre::bail!("actuators.beep_unit_ms must be >= 1");
        }
        // 3 long + 1 short tone with three gaps spans 16 units
        if u64::from(a.error_cycle_ms) <= 16 * u64::from(a.beep_unit_ms) {
            eyre::bail!("actuators.error_cycle_ms must exceed the error burst (16 x beep_unit_ms)");
        }

        // Fill
        let f = &self.fill;
        if !positive(f.cup_g) {
            eyre::bail!("fill.cup_g must be > 0");
        }
        if !positive(f.min_level_g) || !f.full_level_g.is_finite() {
            eyre::bail!("fill.min_level_g must be > 0 and fill.full_level_g finite");
        }
        if f.min_level_g >= f.full_level_g {
            eyre::bail!("fill.min_level_g must be < fill.full_level_g");
        }
        if !non_negative(f.hysteresis_g) || f.hysteresis_g >= f.min_level_g {
            eyre::bail!("fill.hysteresis_g must be in [0, fill.min_level_g)");
        }
        if f.no_flow_grace_ms == 0 {
            eyre::bail!("fill.no_flow_grace_ms must be >= 1");
        }
        if f.timeout_ms <= f.no_flow_grace_ms {
            eyre::bail!("fill.timeout_ms must be > fill.no_flow_grace_ms");
        }
        if f.timeout_ms > i32::MAX as u32 {
            eyre::bail!("fill.timeout_ms is unreasonably large (>24 days)");
        }
        if !positive(f.no_flow_delta_g) {
            eyre::bail!("fill.no_flow_delta_g must be > 0");
        }
        if !non_negative(f.remote_margin_g) {
            eyre::bail!("fill.remote_margin_g must be >= 0");
        }
        if f.power_check_ms == 0 {
            eyre::bail!("fill.power_check_ms must be >= 1");
        }

        // Notice
        if self.notice.hold_ms == 0 {
            eyre::bail!("notice.hold_ms must be >= 1");
        }

        // Storage
        let st = &self.storage;
        match st.base_addr.checked_add(CALIBRATION_RECORD_LEN) {
            Some(end) if end <= st.size => {}
            _ => eyre::bail!(
                "storage.base_addr + {CALIBRATION_RECORD_LEN} must fit in storage.size ({})",
                st.size
            ),
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Runner
        if self.runner.period_ms == 0 || self.runner.period_ms > 1_000 {
            eyre::bail!("runner.period_ms must be in [1, 1000]");
        }

        // Sim
        if !non_negative(self.sim.start_g) || !non_negative(self.sim.flow_g_per_s) {
            eyre::bail!("sim.start_g and sim.flow_g_per_s must be >= 0");
        }

        Ok(())
    }
}
