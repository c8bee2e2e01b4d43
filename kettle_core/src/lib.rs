#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Control kernel for an automatic kettle filler (hardware-agnostic).
//!
//! All hardware goes through the `kettle_traits` seams: `LoadCell`,
//! `ButtonInput`, `Actuators` and `NvStore`. The kernel is a single-threaded
//! poll loop; every wait is a stored start tick compared against `now`.
//!
//! ## Architecture
//!
//! - **Gesture**: debounced click series and hold detection (`gesture`)
//! - **Weight**: median-filtered, outlier-rejecting grams with calibration (`weight`)
//! - **Actuators**: pump, cooldown-gated power relay, timed servo, buzzer (`actuator`)
//! - **Modes**: Idle / Filling / Calibration / Error as a closed enum (`modes`)
//! - **Controller**: transition table, remote presets, watchdog (`controller`)
//! - **Appliance**: tick ordering, run loop and builder (`appliance`)
//!
//! Decisions are reported through an injected [`EventLog`] rather than
//! direct logging, so tests can assert on them.

pub mod actuator;
pub mod appliance;
pub mod calibration;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod gesture;
pub mod hw_error;
pub mod logger;
pub mod mocks;
pub mod modes;
pub mod presentation;
pub mod status;
pub mod util;
pub mod weight;

pub use actuator::{ActuatorSequencer, BeepKind, BuzzerStatus, ServoPosition, ServoState};
pub use appliance::{Appliance, ApplianceBuilder, RunOutcome};
pub use calibration::{CalibrationRecord, CalibrationStore};
pub use config::{
    ActuatorCfg, ApplianceCfg, ButtonCfg, FillCfg, NoticeCfg, ScaleCfg, StorageCfg,
};
pub use controller::{ModeController, REMOTE_STOP};
pub use error::{BuildError, CalibrationError, FaultCode, Report, Result, StoreError};
pub use gesture::GestureDetector;
pub use logger::{ControlEvent, EventLog, Level, MemoryLog, RejectReason, TracingLog};
pub use modes::{CalibrationStep, DeviceMode, FillPreset, ModeKind};
pub use presentation::{Notice, NoticeHold};
pub use status::Snapshot;
pub use util::{cups, water_volume};
pub use weight::{FactorCalibration, MedianWindow, WeightChannel, kettle_present};
