use crate::actuator::ServoState;
use crate::error::FaultCode;
use crate::modes::{CalibrationStep, ModeKind};
use crate::presentation::Notice;

/// Per-tick state for presentation and transport collaborators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub mode: ModeKind,
    pub error: Option<FaultCode>,
    pub kettle_present: bool,
    pub current_g: f32,
    /// Set while Filling.
    pub target_g: Option<f32>,
    pub start_g: Option<f32>,
    pub empty_g: f32,
    pub power_on: bool,
    pub pump_on: bool,
    pub servo: ServoState,
    pub calibration_step: Option<CalibrationStep>,
    pub notice: Option<Notice>,
    pub water_g: f32,
    pub cups: u32,
    /// Factor calibrated, fills allowed.
    pub ready: bool,
}
