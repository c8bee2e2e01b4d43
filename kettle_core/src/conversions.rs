//! `From` implementations bridging `kettle_config` types to `kettle_core` types.

use crate::config::{
    ActuatorCfg, ApplianceCfg, ButtonCfg, FillCfg, NoticeCfg, ScaleCfg, StorageCfg,
};

// ── ButtonCfg ────────────────────────────────────────────────────────────────

impl From<&kettle_config::ButtonCfg> for ButtonCfg {
    fn from(c: &kettle_config::ButtonCfg) -> Self {
        Self {
            debounce_ms: c.debounce_ms,
            long_press_ms: c.long_press_ms,
            very_long_press_ms: c.very_long_press_ms,
            multi_click_ms: c.multi_click_ms,
        }
    }
}

// ── ScaleCfg ─────────────────────────────────────────────────────────────────

impl From<&kettle_config::ScaleCfg> for ScaleCfg {
    fn from(c: &kettle_config::ScaleCfg) -> Self {
        Self {
            median_window: c.median_window,
            outlier_jump_g: c.outlier_jump_g,
            outlier_reseed_after: c.outlier_reseed_after,
            stable_band_g: c.stable_band_g,
            stable_ms: c.stable_ms,
            kettle_hysteresis_g: c.kettle_hysteresis_g,
            sensor_timeout_ms: c.sensor_timeout_ms,
            default_factor: c.default_factor,
            empty_min_g: c.empty_min_g,
            empty_max_g: c.empty_max_g,
            factor_samples: c.factor_samples,
        }
    }
}

// ── ActuatorCfg ──────────────────────────────────────────────────────────────

impl From<&kettle_config::ActuatorCfg> for ActuatorCfg {
    fn from(c: &kettle_config::ActuatorCfg) -> Self {
        Self {
            power_cooldown_ms: c.power_cooldown_ms,
            servo_travel_ms: c.servo_travel_ms,
            servo_idle_deg: c.servo_idle_deg,
            servo_kettle_deg: c.servo_kettle_deg,
            beep_unit_ms: c.beep_unit_ms,
            error_cycle_ms: c.error_cycle_ms,
        }
    }
}

// ── FillCfg ──────────────────────────────────────────────────────────────────

impl From<&kettle_config::FillCfg> for FillCfg {
    fn from(c: &kettle_config::FillCfg) -> Self {
        Self {
            cup_g: c.cup_g,
            min_level_g: c.min_level_g,
            full_level_g: c.full_level_g,
            hysteresis_g: c.hysteresis_g,
            timeout_ms: c.timeout_ms,
            no_flow_grace_ms: c.no_flow_grace_ms,
            no_flow_delta_g: c.no_flow_delta_g,
            remote_margin_g: c.remote_margin_g,
            power_check_ms: c.power_check_ms,
        }
    }
}

// ── NoticeCfg / StorageCfg ───────────────────────────────────────────────────

impl From<&kettle_config::NoticeCfg> for NoticeCfg {
    fn from(c: &kettle_config::NoticeCfg) -> Self {
        Self { hold_ms: c.hold_ms }
    }
}

impl From<&kettle_config::StorageCfg> for StorageCfg {
    fn from(c: &kettle_config::StorageCfg) -> Self {
        Self {
            base_addr: c.base_addr,
            size: c.size,
        }
    }
}

// ── ApplianceCfg ─────────────────────────────────────────────────────────────

impl From<&kettle_config::Config> for ApplianceCfg {
    fn from(c: &kettle_config::Config) -> Self {
        Self {
            button: (&c.button).into(),
            scale: (&c.scale).into(),
            actuators: (&c.actuators).into(),
            fill: (&c.fill).into(),
            notice: (&c.notice).into(),
            storage: (&c.storage).into(),
        }
    }
}
