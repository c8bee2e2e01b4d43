mod common;

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use common::{Rig, calibrated, image_with, raw_for};
use kettle_core::mocks::{NoLoadCell, NullActuators, ReleasedButton};
use kettle_core::{
    Appliance, ApplianceCfg, BuildError, FaultCode, ModeKind, RunOutcome, ServoState,
};
use kettle_hardware::{MemoryStore, SimulatedLoadCell};
use kettle_traits::ManualClock;
use rstest::rstest;

const PERIOD: Duration = Duration::from_millis(100);

fn build_error(err: &kettle_core::Report) -> &BuildError {
    err.downcast_ref::<BuildError>()
        .unwrap_or_else(|| panic!("not a build error: {err:?}"))
}

#[rstest]
fn each_missing_peripheral_is_named() {
    let err = Appliance::builder()
        .with_button(ReleasedButton)
        .with_actuators(NullActuators)
        .with_store(MemoryStore::new(512))
        .build(0)
        .err()
        .unwrap();
    assert!(matches!(build_error(&err), BuildError::MissingLoadCell));

    let err = Appliance::builder()
        .with_load_cell(NoLoadCell)
        .with_actuators(NullActuators)
        .with_store(MemoryStore::new(512))
        .build(0)
        .err()
        .unwrap();
    assert!(matches!(build_error(&err), BuildError::MissingButton));

    let err = Appliance::builder()
        .with_load_cell(NoLoadCell)
        .with_button(ReleasedButton)
        .with_store(MemoryStore::new(512))
        .build(0)
        .err()
        .unwrap();
    assert!(matches!(build_error(&err), BuildError::MissingActuators));

    let err = Appliance::builder()
        .with_load_cell(NoLoadCell)
        .with_button(ReleasedButton)
        .with_actuators(NullActuators)
        .build(0)
        .err()
        .unwrap();
    assert!(matches!(build_error(&err), BuildError::MissingStore));
}

fn zero_debounce() -> ApplianceCfg {
    let mut cfg = ApplianceCfg::default();
    cfg.button.debounce_ms = 0;
    cfg
}

fn inverted_levels() -> ApplianceCfg {
    let mut cfg = ApplianceCfg::default();
    cfg.fill.min_level_g = cfg.fill.full_level_g;
    cfg
}

fn tiny_store() -> ApplianceCfg {
    let mut cfg = ApplianceCfg::default();
    cfg.storage.size = 8;
    cfg
}

fn record_past_end() -> ApplianceCfg {
    let mut cfg = ApplianceCfg::default();
    cfg.storage.base_addr = cfg.storage.size - 4;
    cfg
}

#[rstest]
#[case(zero_debounce(), "debounce_ms")]
#[case(inverted_levels(), "min_level_g")]
#[case(tiny_store(), "does not fit")]
#[case(record_past_end(), "does not fit")]
fn inconsistent_config_is_refused(#[case] cfg: ApplianceCfg, #[case] needle: &str) {
    let err = Appliance::builder()
        .with_load_cell(NoLoadCell)
        .with_button(ReleasedButton)
        .with_actuators(NullActuators)
        .with_store(MemoryStore::new(512))
        .with_config(cfg)
        .build(0)
        .err()
        .unwrap();
    match build_error(&err) {
        BuildError::InvalidConfig(msg) => assert!(msg.contains(needle), "{msg}"),
        other => panic!("unexpected {other:?}"),
    }
}

#[rstest]
fn boots_idle_in_the_safe_state() {
    let rig = Rig::new();
    assert_eq!(rig.mode(), ModeKind::Idle);
    let levels = rig.levels();
    assert!(!levels.pump);
    assert!(!levels.power);
    assert_eq!(levels.servo_angle, 0);
    assert!(!levels.buzzer);

    let snap = rig.app.snapshot();
    assert!(snap.ready);
    assert_eq!(snap.empty_g, 400.0);
    assert_eq!(snap.servo, ServoState::Idle);
    assert!(snap.notice.is_none());
}

#[rstest]
fn default_tracing_log_is_used_when_none_is_given() {
    let cell = SimulatedLoadCell::new(raw_for(400.0));
    let mut app = Appliance::builder()
        .with_load_cell(cell)
        .with_button(ReleasedButton)
        .with_actuators(NullActuators)
        .with_store(MemoryStore::from_image(image_with(Some(calibrated(400.0)))))
        .build(0)
        .unwrap();
    for t in 1..=10 {
        app.tick(t * 100);
    }
    assert_eq!(app.mode(), ModeKind::Idle);
}

#[rstest]
fn run_until_reports_a_fault_when_the_caller_stops() {
    let mut rig = Rig::new();
    let clock = ManualClock::starting_at(rig.now);
    let stop = AtomicBool::new(false);
    rig.cell.set_stalled(true);
    let mut ticks = 0;
    let outcome = rig.app.run_until(&clock, PERIOD, &stop, |app, _| {
        ticks += 1;
        if app.mode() == ModeKind::Error || ticks > 500 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    assert_eq!(outcome, RunOutcome::Fault(FaultCode::SensorTimeout));
    assert!((30..=40).contains(&ticks), "faulted after {ticks} ticks");
}

#[rstest]
fn run_until_keeps_sounding_the_error_cadence_until_shutdown() {
    let mut rig = Rig::new();
    let clock = ManualClock::starting_at(rig.now);
    let stop = AtomicBool::new(false);
    rig.cell.set_stalled(true);
    let out = rig.out.clone();
    let mut in_error = 0;
    let mut edges_at_entry = 0;
    let outcome = rig.app.run_until(&clock, PERIOD, &stop, |app, _| {
        if app.mode() == ModeKind::Error {
            if in_error == 0 {
                edges_at_entry = out.levels().buzzer_edges;
            }
            in_error += 1;
            // Two more cadence periods.
            if in_error == 120 {
                stop.store(true, Ordering::Relaxed);
            }
        }
        ControlFlow::Continue(())
    });
    assert_eq!(outcome, RunOutcome::Fault(FaultCode::SensorTimeout));
    assert_eq!(in_error, 120);
    assert!(
        out.levels().buzzer_edges >= edges_at_entry + 2,
        "cadence repeats while held in Error"
    );
    let l = out.levels();
    assert!(!l.pump && !l.power);
}

#[rstest]
fn run_until_honours_the_shutdown_flag() {
    let mut rig = Rig::new();
    let clock = ManualClock::starting_at(rig.now);
    let stop = AtomicBool::new(false);
    let mut ticks = 0;
    let outcome = rig.app.run_until(&clock, PERIOD, &stop, |_, _| {
        ticks += 1;
        if ticks == 5 {
            stop.store(true, Ordering::Relaxed);
        }
        ControlFlow::Continue(())
    });
    assert_eq!(outcome, RunOutcome::Shutdown);
    assert_eq!(ticks, 5);
}

#[rstest]
fn run_until_paces_ticks_by_the_period() {
    let mut rig = Rig::new();
    let clock = ManualClock::starting_at(rig.now);
    let stop = AtomicBool::new(false);
    let mut stamps = Vec::new();
    let outcome = rig.app.run_until(&clock, PERIOD, &stop, |app, now| {
        stamps.push(now);
        if stamps.len() == 3 {
            app.remote_command(2, now);
        }
        if stamps.len() == 6 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    assert_eq!(outcome, RunOutcome::Stopped);
    assert_eq!(stamps, vec![1_000, 1_100, 1_200, 1_300, 1_400, 1_500]);
    assert_eq!(rig.mode(), ModeKind::Filling);
}
