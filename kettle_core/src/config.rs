//! Runtime configuration for the control kernel.
//!
//! These are the structs the kernel components consume. They are separate
//! from the TOML-deserialized config in `kettle_config`; `Default` is the
//! appliance's factory calibration.

/// Button gesture timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonCfg {
    /// A level must hold strictly longer than this to count.
    pub debounce_ms: u32,
    /// Hold time at which a press stops being a click and becomes a long press.
    pub long_press_ms: u32,
    pub very_long_press_ms: u32,
    /// Quiet period after the last click that closes a click series.
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

/// Weight acquisition and filtering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleCfg {
    /// Median window length (accepted samples).
    pub median_window: usize,
    /// Samples further than this from the filtered weight are dropped.
    pub outlier_jump_g: f32,
    /// This many consecutive drops at a consistent level re-seed the window.
    pub outlier_reseed_after: u32,
    /// The weight is "stable" while it stays within this band...
    pub stable_band_g: f32,
    /// ...for longer than this.
    pub stable_ms: u32,
    /// Kettle counts as present from `empty - hysteresis` upwards.
    pub kettle_hysteresis_g: f32,
    /// No conversion for longer than this is a sensor fault.
    pub sensor_timeout_ms: u32,
    pub default_factor: f32,
    /// Exclusive plausibility bounds for a calibrated empty weight.
    pub empty_min_g: f32,
    pub empty_max_g: f32,
    /// Raw conversions averaged for a factor calibration.
    pub factor_samples: usize,
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
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorCfg {
    pub power_cooldown_ms: u32,
    pub servo_travel_ms: u32,
    pub servo_idle_deg: u8,
    pub servo_kettle_deg: u8,
    /// Short tone length. Long tones last 3 units, gaps 2 units.
    pub beep_unit_ms: u32,
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

/// Fill targets and supervision. Levels are grams of water above the empty kettle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillCfg {
    pub cup_g: f32,
    pub min_level_g: f32,
    pub full_level_g: f32,
    pub hysteresis_g: f32,
    pub timeout_ms: u32,
    pub no_flow_grace_ms: u32,
    pub no_flow_delta_g: f32,
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoticeCfg {
    pub hold_ms: u32,
}

impl Default for NoticeCfg {
    fn default() -> Self {
        Self { hold_ms: 2_000 }
    }
}

/// Placement of the calibration record in the store image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageCfg {
    pub base_addr: usize,
    pub size: usize,
}

impl Default for StorageCfg {
    fn default() -> Self {
        Self {
            base_addr: 0,
            size: 512,
        }
    }
}

/// Everything the appliance kernel needs, in one place.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ApplianceCfg {
    pub button: ButtonCfg,
    pub scale: ScaleCfg,
    pub actuators: ActuatorCfg,
    pub fill: FillCfg,
    pub notice: NoticeCfg,
    pub storage: StorageCfg,
}
