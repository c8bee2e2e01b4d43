//! Device modes and their transition table.
//!
//! `DeviceMode` is a closed enum owned by value inside the controller. Each
//! variant carries its own payload and implements `enter`, `exit`, `update`
//! and `handle_button`; a handler asks for a transition by returning the
//! next mode, and the controller decides whether it is allowed.

mod calibration;
mod error;
mod filling;
mod idle;

use std::sync::Arc;

pub use calibration::CalibrationMode;
pub use error::ErrorMode;
pub use filling::FillingMode;
pub use idle::IdleMode;

use crate::actuator::ActuatorSequencer;
use crate::config::FillCfg;
use crate::error::FaultCode;
use crate::gesture::GestureDetector;
use crate::logger::EventLog;
use crate::presentation::Notice;
use crate::util::water_volume;
use crate::weight::WeightChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeKind {
    Idle,
    Filling,
    Calibration,
    Error,
}

impl ModeKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Filling => "Filling",
            Self::Calibration => "Calibration",
            Self::Error => "Error",
        }
    }

    /// Error is terminal: it only "transitions" to itself.
    pub fn can_transition_to(self, to: ModeKind) -> bool {
        use ModeKind::*;
        match self {
            Idle => matches!(to, Filling | Calibration | Error),
            Filling | Calibration => matches!(to, Idle | Error),
            Error => to == Error,
        }
    }
}

impl std::fmt::Display for ModeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStep {
    /// Scale must be empty; next press tares.
    WaitRemove,
    /// Empty kettle on the scale; next press measures it.
    WaitPlace,
}

/// Fill presets shared by the button and remote commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPreset {
    /// Up to the minimum level, or one more cup once above it.
    TopUp,
    /// `n` cups above the empty weight.
    Cups(u8),
    Full,
}

impl FillPreset {
    /// Remote command codes 1..=7. Code 8 (stop) is not a preset.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::TopUp),
            2..=6 => Some(Self::Cups(code as u8)),
            7 => Some(Self::Full),
            _ => None,
        }
    }

    /// Absolute target weight, capped at the full level.
    pub fn target_g(self, current_g: f32, empty_g: f32, fill: &FillCfg) -> f32 {
        let target = match self {
            Self::TopUp => {
                if water_volume(current_g, empty_g) < fill.min_level_g {
                    empty_g + fill.min_level_g
                } else {
                    current_g + fill.cup_g
                }
            }
            Self::Cups(n) => empty_g + f32::from(n) * fill.cup_g,
            Self::Full => empty_g + fill.full_level_g,
        };
        target.min(empty_g + fill.full_level_g)
    }
}

/// Everything a mode may touch while it runs.
pub struct ModeContext {
    pub weight: WeightChannel,
    pub actuators: ActuatorSequencer,
    pub fill: FillCfg,
    pub log: Arc<dyn EventLog + Send + Sync>,
    /// Presentation notice posted this tick, picked up by the hold timer.
    pub notice: Option<Notice>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceMode {
    Idle(IdleMode),
    Filling(FillingMode),
    Calibration(CalibrationMode),
    Error(ErrorMode),
}

impl DeviceMode {
    pub fn idle() -> Self {
        Self::Idle(IdleMode::default())
    }

    pub fn filling(target_g: f32, start_g: f32) -> Self {
        Self::Filling(FillingMode::new(target_g, start_g))
    }

    pub fn calibration() -> Self {
        Self::Calibration(CalibrationMode::default())
    }

    pub fn error(code: FaultCode) -> Self {
        Self::Error(ErrorMode::new(code))
    }

    pub fn kind(&self) -> ModeKind {
        match self {
            Self::Idle(_) => ModeKind::Idle,
            Self::Filling(_) => ModeKind::Filling,
            Self::Calibration(_) => ModeKind::Calibration,
            Self::Error(_) => ModeKind::Error,
        }
    }

    pub fn enter(&mut self, ctx: &mut ModeContext, now: u32) -> Option<DeviceMode> {
        match self {
            Self::Idle(m) => m.enter(ctx, now),
            Self::Filling(m) => m.enter(ctx, now),
            Self::Calibration(m) => m.enter(ctx, now),
            Self::Error(m) => m.enter(ctx, now),
        }
    }

    pub fn exit(&mut self, ctx: &mut ModeContext, now: u32) {
        match self {
            Self::Filling(m) => m.exit(ctx, now),
            Self::Idle(_) | Self::Calibration(_) | Self::Error(_) => {}
        }
    }

    pub fn update(&mut self, ctx: &mut ModeContext, now: u32) -> Option<DeviceMode> {
        match self {
            Self::Idle(m) => m.update(ctx, now),
            Self::Filling(m) => m.update(ctx, now),
            Self::Calibration(m) => m.update(ctx, now),
            Self::Error(m) => m.update(ctx, now),
        }
    }

    pub fn handle_button(
        &mut self,
        ctx: &mut ModeContext,
        gesture: &mut GestureDetector,
        now: u32,
    ) -> Option<DeviceMode> {
        match self {
            Self::Idle(m) => m.handle_button(ctx, gesture, now),
            Self::Filling(m) => m.handle_button(ctx, gesture, now),
            Self::Calibration(m) => m.handle_button(ctx, gesture, now),
            Self::Error(m) => m.handle_button(gesture),
        }
    }

    pub fn fault(&self) -> Option<FaultCode> {
        match self {
            Self::Error(m) => Some(m.code()),
            _ => None,
        }
    }
}
