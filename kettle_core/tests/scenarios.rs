//! End-to-end behaviour of the assembled appliance on simulated hardware.

mod common;

use common::{Rig, calibrated, raw_for};
use kettle_core::{
    ApplianceCfg, BeepKind, BuzzerStatus, CalibrationRecord, CalibrationStep, ControlEvent,
    ModeKind, Notice, ServoState,
};
use rstest::rstest;

#[rstest]
fn single_click_on_empty_kettle_targets_minimum_level() {
    let mut rig = Rig::new();
    rig.settle();
    assert!(rig.app.snapshot().kettle_present);

    rig.click(1);

    assert_eq!(rig.mode(), ModeKind::Filling);
    let snap = rig.app.snapshot();
    assert_eq!(snap.target_g, Some(900.0));
    assert_eq!(snap.start_g, Some(400.0));
}

#[rstest]
fn reaching_target_within_hysteresis_returns_to_idle_with_two_beeps() {
    let mut rig = Rig::new();
    rig.settle();
    rig.click(1);
    rig.ticks(3);
    let before = rig.beeps();

    rig.set_grams(885.0);
    let reached = rig.tick_until(10, |r| r.app.controller().weight().current_weight() >= 880.0);
    assert!(reached);
    assert_eq!(rig.app.controller().pending_kind(), Some(ModeKind::Idle));

    rig.tick();
    assert_eq!(rig.mode(), ModeKind::Idle);
    assert!(!rig.levels().pump);

    rig.ticks(10);
    assert_eq!(rig.beeps() - before, 2);
    assert!(rig.log.contains(|e| matches!(e, ControlEvent::FillCompleted { .. })));
}

#[rstest]
fn filling_exit_parks_the_servo() {
    let mut rig = Rig::new();
    rig.settle();
    rig.click(1);
    rig.run_ms(1_200);
    assert!(rig.levels().pump, "pump runs once the servo is over the kettle");
    assert_eq!(rig.levels().servo_angle, 90);

    rig.set_grams(890.0);
    assert!(rig.tick_until(10, |r| r.mode() == ModeKind::Idle));
    assert!(!rig.levels().pump);
    assert_eq!(rig.levels().servo_angle, 0);
    rig.run_ms(1_100);
    assert_eq!(rig.app.controller().actuators().servo_state(), ServoState::Idle);
}

#[rstest]
fn remote_two_cups_starts_fill_with_single_beep() {
    let mut rig = Rig::new();
    rig.settle();
    let before = rig.beeps();

    rig.app.remote_command(2, rig.now);
    rig.tick();

    assert_eq!(rig.mode(), ModeKind::Filling);
    assert_eq!(rig.app.snapshot().target_g, Some(900.0));
    rig.ticks(10);
    assert_eq!(rig.beeps() - before, 1);
}

#[rstest]
fn remote_stop_while_filling_stops_pump_immediately() {
    let mut rig = Rig::new();
    rig.settle();
    rig.click(1);
    rig.run_ms(1_200);
    assert!(rig.levels().pump);
    let before = rig.beeps();

    rig.app.remote_command(8, rig.now);
    assert!(!rig.levels().pump, "pump is off before the next tick");

    rig.tick();
    assert_eq!(rig.mode(), ModeKind::Idle);
    rig.ticks(15);
    assert_eq!(rig.beeps() - before, 3);
    assert!(!rig.levels().pump);
}

fn enter_calibration_and_tare(rig: &mut Rig) {
    rig.settle();
    rig.click(3);
    assert_eq!(rig.mode(), ModeKind::Calibration);
    rig.set_grams(0.0);
    rig.settle();
    rig.button.press();
    rig.ticks(2);
    rig.button.release();
    rig.ticks(2);
    assert_eq!(
        rig.app.snapshot().calibration_step,
        Some(CalibrationStep::WaitPlace)
    );
}

#[rstest]
fn implausible_empty_weight_is_rejected_without_persisting() {
    let mut rig = Rig::new();
    enter_calibration_and_tare(&mut rig);

    rig.set_grams(50.0);
    rig.settle();
    let commits = rig.store.commits();
    rig.button.press();
    rig.ticks(2);

    let snap = rig.app.snapshot();
    assert_eq!(snap.mode, ModeKind::Calibration);
    assert_eq!(snap.calibration_step, Some(CalibrationStep::WaitPlace));
    assert_eq!(snap.notice, Some(Notice::CalibrationError));
    assert_eq!(
        rig.app.controller().actuators().buzzer_status(),
        BuzzerStatus::Playing {
            kind: BeepKind::Long,
            count: 1
        }
    );
    assert_eq!(rig.store.commits(), commits);
    assert!(rig.log.contains(|e| matches!(e, ControlEvent::CalibrationRejected { .. })));
}

#[rstest]
fn holding_the_button_does_not_repeat_a_calibration_step() {
    let mut rig = Rig::new();
    enter_calibration_and_tare(&mut rig);
    rig.set_grams(50.0);
    rig.settle();
    let before = rig.beeps();
    rig.button.press();
    rig.run_ms(2_000);
    assert_eq!(rig.beeps() - before, 1);
}

#[rstest]
fn accepted_empty_weight_persists_and_returns_to_idle_after_notice() {
    let mut rig = Rig::new();
    enter_calibration_and_tare(&mut rig);

    rig.set_grams(450.0);
    rig.settle();
    let commits = rig.store.commits();
    rig.button.press();
    rig.ticks(2);
    rig.button.release();

    assert_eq!(rig.store.commits(), commits + 1);
    assert_eq!(rig.app.snapshot().notice, Some(Notice::CalibrationSuccess));
    assert_eq!(rig.mode(), ModeKind::Calibration);

    assert!(rig.tick_until(25, |r| r.mode() == ModeKind::Idle));
    assert_eq!(rig.app.snapshot().notice, None);

    let image = rig.store.image();
    let mut buf = [0u8; kettle_core::calibration::RECORD_LEN];
    buf.copy_from_slice(&image[..kettle_core::calibration::RECORD_LEN]);
    let stored = CalibrationRecord::decode(&buf, 0.1);
    assert_eq!(stored.empty_weight_g, 450.0);
    assert!(stored.factor_calibrated);
}

#[rstest]
fn stalled_sensor_ends_in_sensor_timeout() {
    let mut rig = Rig::new();
    rig.settle();
    rig.cell.set_stalled(true);
    assert!(rig.tick_until(40, |r| r.mode() == ModeKind::Error));
    assert_eq!(rig.app.snapshot().error, Some(kettle_core::FaultCode::SensorTimeout));
    let l = rig.levels();
    assert!(!l.pump && !l.power);
}

#[rstest]
fn reboot_restores_persisted_empty_weight() {
    let mut rig = Rig::build(
        Some(calibrated(612.0)),
        612.0,
        ApplianceCfg::default(),
    );
    rig.settle();
    let snap = rig.app.snapshot();
    assert_eq!(snap.empty_g, 612.0);
    assert!(snap.ready);
    assert_eq!(rig.cell.raw(), raw_for(612.0));
}

#[rstest]
fn calibration_against_a_biased_cell_survives_reboot() {
    let mut rig = Rig::new();
    // 1000 raw counts (500 g) with nothing on the scale.
    rig.bias = 1_000;
    rig.set_grams(0.0);
    enter_calibration_and_tare(&mut rig);
    assert_eq!(rig.app.controller().weight().tare_offset(), 1_000);

    rig.set_grams(400.0);
    rig.settle();
    rig.button.press();
    rig.ticks(2);
    rig.button.release();
    assert!(rig.tick_until(25, |r| r.mode() == ModeKind::Idle));
    assert_eq!(rig.app.snapshot().current_g, 400.0);

    let mut rebooted = rig.reboot();
    rebooted.settle();
    let snap = rebooted.app.snapshot();
    assert_eq!(snap.empty_g, 400.0);
    assert_eq!(snap.current_g, 400.0);
    assert_eq!(snap.water_g, 0.0);
    rebooted.run_ms(3_000);
    assert!(!rebooted.levels().power, "an empty kettle stays unpowered");
}

#[rstest]
fn holding_on_after_an_emergency_stop_keeps_the_calibration() {
    let mut rig = Rig::new();
    rig.settle();
    rig.click(1);
    rig.run_ms(1_200);
    assert_eq!(rig.mode(), ModeKind::Filling);

    rig.hold_button(10_500);

    assert_eq!(rig.mode(), ModeKind::Idle);
    assert!(rig.app.snapshot().ready);
    assert_eq!(rig.app.controller().weight().record(), calibrated(400.0));
    assert!(!rig.log.contains(|e| matches!(e, ControlEvent::CalibrationReset)));
    assert!(rig.log.contains(|e| matches!(e, ControlEvent::FillStopped { .. })));
}

#[rstest]
fn remote_fill_after_a_missed_conversion_is_accepted() {
    let mut rig = Rig::new();
    rig.settle();
    rig.cell.set_stalled(true);
    rig.tick();
    let weight = rig.app.controller().weight();
    assert!(!weight.has_fresh_sample());
    assert_eq!(weight.current_weight(), 0.0);
    assert!(rig.app.snapshot().kettle_present, "presence carries over the gap");
    assert_eq!(rig.app.snapshot().current_g, 400.0);

    rig.cell.set_stalled(false);
    rig.app.remote_command(2, rig.now);
    rig.tick();

    assert_eq!(rig.mode(), ModeKind::Filling);
    assert_eq!(rig.app.snapshot().target_g, Some(900.0));
    assert!(!rig.log.contains(|e| matches!(e, ControlEvent::RemoteRejected { .. })));
}
