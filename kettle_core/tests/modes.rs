mod common;

use common::{Rig, calibrated, raw_for};
use kettle_core::{
    ApplianceCfg, BuzzerStatus, CalibrationRecord, ControlEvent, DeviceMode, FaultCode, ModeKind,
    Notice, RejectReason, ServoState,
};
use rstest::rstest;

fn filling_rig(cfg: ApplianceCfg) -> Rig {
    let mut rig = Rig::build(Some(calibrated(400.0)), 400.0, cfg);
    rig.settle();
    rig.click(1);
    assert_eq!(rig.mode(), ModeKind::Filling);
    rig
}

// ── transition table ─────────────────────────────────────────────────────────

#[rstest]
fn filling_never_jumps_to_calibration() {
    let mut rig = filling_rig(ApplianceCfg::default());
    let accepted = rig
        .app
        .controller_mut()
        .request_transition(DeviceMode::calibration());
    assert!(!accepted);
    rig.tick();
    assert_eq!(rig.mode(), ModeKind::Filling);
    assert!(rig.log.contains(|e| matches!(
        e,
        ControlEvent::TransitionDenied {
            from: ModeKind::Filling,
            to: ModeKind::Calibration
        }
    )));
}

#[rstest]
fn error_is_terminal() {
    let mut rig = Rig::new();
    rig.settle();
    rig.cell.set_stalled(true);
    assert!(rig.tick_until(40, |r| r.mode() == ModeKind::Error));
    rig.cell.set_stalled(false);

    assert!(!rig.app.controller_mut().request_idle());
    let before = rig.beeps();
    rig.app.remote_command(1, rig.now);
    rig.click(1);
    rig.ticks(10);
    assert_eq!(rig.mode(), ModeKind::Error);
    assert_eq!(
        rig.app.controller().actuators().buzzer_status(),
        BuzzerStatus::ErrorLoop
    );
    // Only the error cadence may have sounded: one burst is four tones.
    assert!(rig.beeps() - before <= 4);
}

#[rstest]
fn pending_error_is_not_overwritten() {
    let mut rig = filling_rig(ApplianceCfg::default());
    let ctrl = rig.app.controller_mut();
    assert!(ctrl.request_transition(DeviceMode::error(FaultCode::FillTimeout)));
    assert!(!ctrl.request_idle());
    rig.tick();
    assert_eq!(rig.app.snapshot().error, Some(FaultCode::FillTimeout));
}

// ── fill supervision ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum ExitCause {
    TargetReached,
    Timeout,
    NoFlow,
    EmergencyStop,
}

#[rstest]
#[case::target(ExitCause::TargetReached, ModeKind::Idle)]
#[case::timeout(ExitCause::Timeout, ModeKind::Error)]
#[case::no_flow(ExitCause::NoFlow, ModeKind::Error)]
#[case::emergency_stop(ExitCause::EmergencyStop, ModeKind::Idle)]
fn every_fill_exit_leaves_pump_off_and_servo_home(
    #[case] cause: ExitCause,
    #[case] expected: ModeKind,
) {
    let mut cfg = ApplianceCfg::default();
    cfg.fill.timeout_ms = 8_000;
    let mut rig = filling_rig(cfg);
    rig.run_ms(1_200);
    assert!(rig.levels().pump);

    match cause {
        ExitCause::TargetReached => rig.set_grams(895.0),
        ExitCause::Timeout => {}
        ExitCause::NoFlow => {}
        ExitCause::EmergencyStop => rig.button.press(),
    }
    let left = rig.tick_until(200, |r| {
        if let ExitCause::Timeout = cause {
            // Keep the weight moving so only the timeout can fire.
            r.cell.add_raw(raw_for(1.0));
        }
        r.mode() != ModeKind::Filling
    });
    rig.button.release();
    assert!(left);
    assert_eq!(rig.mode(), expected);

    let l = rig.levels();
    assert!(!l.pump);
    assert_eq!(l.servo_angle, 0);
    rig.run_ms(1_100);
    assert_eq!(rig.app.controller().actuators().servo_state(), ServoState::Idle);

    let fault = rig.app.snapshot().error;
    match cause {
        ExitCause::Timeout => assert_eq!(fault, Some(FaultCode::FillTimeout)),
        ExitCause::NoFlow => assert_eq!(fault, Some(FaultCode::NoFlow)),
        _ => assert_eq!(fault, None),
    }
}

#[rstest]
fn removing_the_kettle_mid_fill_is_a_no_flow_fault() {
    let mut rig = filling_rig(ApplianceCfg::default());
    rig.set_grams(0.0);
    assert!(rig.tick_until(10, |r| r.mode() == ModeKind::Error));
    assert_eq!(rig.app.snapshot().error, Some(FaultCode::NoFlow));
    assert!(!rig.levels().power);
}

#[rstest]
fn long_press_while_filling_beeps_three_times_then_stops() {
    let mut rig = filling_rig(ApplianceCfg::default());
    rig.ticks(3);
    let before = rig.beeps();
    rig.button.press();
    assert!(rig.tick_until(40, |r| r.mode() == ModeKind::Idle));
    rig.button.release();
    rig.ticks(15);
    assert_eq!(rig.beeps() - before, 3);
    assert!(rig.log.contains(|e| matches!(e, ControlEvent::FillStopped { .. })));
}

// ── idle behaviour ───────────────────────────────────────────────────────────

#[rstest]
fn click_without_kettle_is_rejected_with_two_beeps() {
    let mut rig = Rig::new();
    rig.set_grams(0.0);
    rig.settle();
    let before = rig.beeps();
    rig.click(1);
    rig.ticks(10);
    assert_eq!(rig.mode(), ModeKind::Idle);
    assert_eq!(rig.beeps() - before, 2);
    assert!(rig.log.contains(|e| matches!(
        e,
        ControlEvent::FillRejected {
            reason: RejectReason::KettleAbsent
        }
    )));
}

#[rstest]
fn double_click_fills_to_full_level() {
    let mut rig = Rig::new();
    rig.settle();
    rig.click(2);
    assert_eq!(rig.mode(), ModeKind::Filling);
    assert_eq!(rig.app.snapshot().target_g, Some(2_100.0));
}

#[rstest]
fn top_up_adds_one_cup_above_minimum() {
    let mut rig = Rig::new();
    rig.set_grams(1_000.0);
    rig.settle();
    rig.click(1);
    assert_eq!(rig.app.snapshot().target_g, Some(1_250.0));
}

#[rstest]
fn idle_power_relay_follows_water_level_with_hysteresis() {
    let mut rig = Rig::new();
    rig.set_grams(1_000.0);
    rig.run_ms(1_500);
    assert!(rig.levels().power, "600 g of water switches the kettle on");

    rig.set_grams(885.0);
    rig.run_ms(3_000);
    assert!(rig.levels().power, "485 g stays inside the hysteresis band");

    rig.set_grams(870.0);
    rig.run_ms(3_000);
    assert!(!rig.levels().power);

    rig.set_grams(1_000.0);
    rig.run_ms(3_000);
    assert!(rig.levels().power);
    rig.set_grams(0.0);
    rig.run_ms(3_000);
    assert!(!rig.levels().power, "no kettle, no power");
}

#[rstest]
fn very_long_press_resets_calibration() {
    let mut rig = Rig::new();
    rig.settle();
    let commits = rig.store.commits();
    rig.hold_button(10_300);

    assert_eq!(rig.store.commits(), commits + 1);
    let rec = rig.app.controller().weight().record();
    assert_eq!(rec, CalibrationRecord::defaults(rig.app.controller().weight().config().default_factor));
    assert_eq!(rig.app.snapshot().notice, Some(Notice::CalibrationReset));
    assert!(rig.log.contains(|e| matches!(e, ControlEvent::CalibrationReset)));

    rig.run_ms(2_100);
    rig.click(1);
    assert_eq!(rig.mode(), ModeKind::Idle);
    assert!(rig.log.contains(|e| matches!(
        e,
        ControlEvent::FillRejected {
            reason: RejectReason::NotReady
        }
    )));
}

// ── remote commands ──────────────────────────────────────────────────────────

#[rstest]
#[case::zero(0, RejectReason::InvalidCode)]
#[case::nine(9, RejectReason::InvalidCode)]
#[case::negative(-3, RejectReason::InvalidCode)]
fn out_of_range_codes_are_rejected(#[case] code: i32, #[case] reason: RejectReason) {
    let mut rig = Rig::new();
    rig.settle();
    let before = rig.beeps();
    rig.app.remote_command(code, rig.now);
    rig.ticks(10);
    assert_eq!(rig.mode(), ModeKind::Idle);
    assert_eq!(rig.beeps() - before, 2);
    assert!(rig.log.contains(|e| *e == ControlEvent::RemoteRejected { code, reason }));
}

#[rstest]
fn remote_needs_a_kettle() {
    let mut rig = Rig::new();
    rig.set_grams(0.0);
    rig.settle();
    rig.app.remote_command(3, rig.now);
    rig.tick();
    assert_eq!(rig.mode(), ModeKind::Idle);
    assert!(rig.log.contains(|e| *e
        == ControlEvent::RemoteRejected {
            code: 3,
            reason: RejectReason::KettleAbsent
        }));
}

#[rstest]
fn remote_needs_a_calibrated_factor() {
    let mut rec = calibrated(400.0);
    rec.factor_calibrated = false;
    let mut rig = Rig::build(Some(rec), 400.0, ApplianceCfg::default());
    rig.settle();
    rig.app.remote_command(3, rig.now);
    rig.tick();
    assert_eq!(rig.mode(), ModeKind::Idle);
    assert!(rig.log.contains(|e| *e
        == ControlEvent::RemoteRejected {
            code: 3,
            reason: RejectReason::NotReady
        }));
}

#[rstest]
fn remote_full_on_full_kettle_is_target_reached() {
    let mut rig = Rig::new();
    rig.set_grams(2_100.0);
    rig.ticks(10);
    rig.app.remote_command(7, rig.now);
    rig.tick();
    assert_eq!(rig.mode(), ModeKind::Idle);
    assert!(rig.log.contains(|e| *e
        == ControlEvent::RemoteRejected {
            code: 7,
            reason: RejectReason::TargetReached
        }));
}

#[rstest]
fn remote_fill_while_filling_is_rejected() {
    let mut rig = filling_rig(ApplianceCfg::default());
    rig.app.remote_command(4, rig.now);
    rig.tick();
    assert_eq!(rig.mode(), ModeKind::Filling);
    assert!(rig.log.contains(|e| *e
        == ControlEvent::RemoteRejected {
            code: 4,
            reason: RejectReason::NotIdle
        }));
}

#[rstest]
fn remote_stop_outside_filling_is_silent() {
    let mut rig = Rig::new();
    rig.settle();
    let before = rig.beeps();
    rig.app.remote_command(8, rig.now);
    rig.ticks(10);
    assert_eq!(rig.beeps(), before);
    assert!(rig.log.contains(|e| *e
        == ControlEvent::RemoteStopIgnored {
            mode: ModeKind::Idle
        }));
}
