//! Injected structured event log.
//!
//! The kernel never calls `tracing` directly for control decisions; it records
//! typed `ControlEvent`s through an `EventLog` so tests can assert on them.
//! `TracingLog` is the production sink.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::FaultCode;
use crate::modes::ModeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Info,
    Warn,
    Error,
}

/// Why a fill request (local or remote) was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    InvalidCode,
    NotIdle,
    KettleAbsent,
    NotReady,
    TargetReached,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    ModeEntered { mode: ModeKind },
    TransitionDenied { from: ModeKind, to: ModeKind },
    FillStarted { target_g: f32, start_g: f32 },
    FillCompleted { weight_g: f32 },
    FillStopped { weight_g: f32 },
    FillRejected { reason: RejectReason },
    Fault { code: FaultCode },
    PowerRelay { on: bool },
    CooldownViolation { requested_on: bool, since_last_ms: i32 },
    OutlierDropped { sample_g: f32, filtered_g: f32 },
    FilterReseeded { level_g: f32 },
    SensorReadFailed { error: String },
    TareCompleted { offset: i32 },
    EmptyWeightCalibrated { grams: f32 },
    CalibrationRejected { grams: f32 },
    FactorCalibrated { factor: f32 },
    CalibrationReset,
    FactorReset,
    PersistFailed { error: String },
    RemoteCommand { code: i32 },
    RemoteRejected { code: i32, reason: RejectReason },
    RemoteStopIgnored { mode: ModeKind },
}

impl ControlEvent {
    pub fn level(&self) -> Level {
        match self {
            Self::Fault { .. } | Self::PersistFailed { .. } => Level::Error,
            Self::TransitionDenied { .. }
            | Self::OutlierDropped { .. }
            | Self::FilterReseeded { .. }
            | Self::SensorReadFailed { .. }
            | Self::CalibrationRejected { .. }
            | Self::CalibrationReset
            | Self::FactorReset
            | Self::FillStopped { .. } => Level::Warn,
            _ => Level::Info,
        }
    }

    /// Stable event name for log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ModeEntered { .. } => "mode_entered",
            Self::TransitionDenied { .. } => "transition_denied",
            Self::FillStarted { .. } => "fill_started",
            Self::FillCompleted { .. } => "fill_completed",
            Self::FillStopped { .. } => "fill_stopped",
            Self::FillRejected { .. } => "fill_rejected",
            Self::Fault { .. } => "fault",
            Self::PowerRelay { .. } => "power_relay",
            Self::CooldownViolation { .. } => "cooldown_violation",
            Self::OutlierDropped { .. } => "outlier_dropped",
            Self::FilterReseeded { .. } => "filter_reseeded",
            Self::SensorReadFailed { .. } => "sensor_read_failed",
            Self::TareCompleted { .. } => "tare_completed",
            Self::EmptyWeightCalibrated { .. } => "empty_weight_calibrated",
            Self::CalibrationRejected { .. } => "calibration_rejected",
            Self::FactorCalibrated { .. } => "factor_calibrated",
            Self::CalibrationReset => "calibration_reset",
            Self::FactorReset => "factor_reset",
            Self::PersistFailed { .. } => "persist_failed",
            Self::RemoteCommand { .. } => "remote_command",
            Self::RemoteRejected { .. } => "remote_rejected",
            Self::RemoteStopIgnored { .. } => "remote_stop_ignored",
        }
    }
}

pub trait EventLog {
    fn record(&self, event: ControlEvent);
}

/// Forwards events to `tracing` under the `kettle` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl EventLog for TracingLog {
    fn record(&self, event: ControlEvent) {
        let name = event.name();
        match event.level() {
            Level::Info => tracing::info!(target: "kettle", event = name, detail = ?event),
            Level::Warn => tracing::warn!(target: "kettle", event = name, detail = ?event),
            Level::Error => tracing::error!(target: "kettle", event = name, detail = ?event),
        }
    }
}

/// Keeps events in memory, optionally only the most recent `capacity`.
#[derive(Debug, Default)]
pub struct MemoryLog {
    events: Mutex<VecDeque<ControlEvent>>,
    capacity: Option<usize>,
}

impl MemoryLog {
    /// Unbounded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ring of the last `capacity` events; older ones are dropped.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            capacity: Some(capacity.max(1)),
        }
    }

    pub fn events(&self) -> Vec<ControlEvent> {
        self.events
            .lock()
            .map(|g| g.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, pred: impl Fn(&ControlEvent) -> bool) -> usize {
        self.events
            .lock()
            .map(|g| g.iter().filter(|e| pred(e)).count())
            .unwrap_or(0)
    }

    pub fn contains(&self, pred: impl Fn(&ControlEvent) -> bool) -> bool {
        self.count(pred) > 0
    }

    pub fn at_level(&self, level: Level) -> Vec<ControlEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.level() == level)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut g) = self.events.lock() {
            g.clear();
        }
    }
}

impl EventLog for MemoryLog {
    fn record(&self, event: ControlEvent) {
        if let Ok(mut g) = self.events.lock() {
            if self.capacity.is_some_and(|cap| g.len() >= cap) {
                g.pop_front();
            }
            g.push_back(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_log_keeps_the_latest_events() {
        let log = MemoryLog::bounded(3);
        for on in [true, false, true, false, true] {
            log.record(ControlEvent::PowerRelay { on });
        }
        assert_eq!(log.len(), 3);
        assert_eq!(
            log.events(),
            vec![
                ControlEvent::PowerRelay { on: true },
                ControlEvent::PowerRelay { on: false },
                ControlEvent::PowerRelay { on: true },
            ]
        );
    }

    #[test]
    fn default_log_is_unbounded() {
        let log = MemoryLog::new();
        for code in 0..1_000 {
            log.record(ControlEvent::RemoteCommand { code });
        }
        assert_eq!(log.len(), 1_000);
    }
}
