//! Non-blocking actuator sequencing.
//!
//! `ActuatorSequencer` is the only owner of the output pins. Modes issue
//! intents (pump on, move servo, beep twice) and `update` advances the
//! timed state machines once per tick:
//!
//! - power relay: toggles closer than `power_cooldown_ms` are dropped;
//! - servo: a move is reported complete only after `servo_travel_ms`;
//! - buzzer: tone bursts and the repeating error cadence.
//!
//! A new beep request pre-empts whatever the buzzer is doing.

use std::sync::Arc;

use kettle_traits::Actuators;

use crate::config::ActuatorCfg;
use crate::logger::{ControlEvent, EventLog};
use crate::util::{elapsed_ms, has_elapsed};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoPosition {
    Idle,
    OverKettle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoState {
    Idle,
    Moving { target: ServoPosition, since: u32 },
    OverKettle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeepKind {
    Short,
    Long,
}

/// What the buzzer is doing, for snapshots and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuzzerStatus {
    Idle,
    Playing { kind: BeepKind, count: u8 },
    ErrorLoop,
}

#[derive(Debug, Clone, Copy)]
struct Sequence {
    kind: BeepKind,
    target: u8,
    done: u8,
    tone_on: bool,
    phase_start: u32,
    /// Follow-up burst played after a gap once this one completes.
    then: Option<(BeepKind, u8)>,
}

impl Sequence {
    fn start(kind: BeepKind, count: u8, now: u32, out: &mut dyn Actuators) -> Self {
        out.set_buzzer(true);
        Self {
            kind,
            target: count,
            done: 0,
            tone_on: true,
            phase_start: now,
            then: None,
        }
    }

    /// 3 long + 1 short.
    fn error_burst(now: u32, out: &mut dyn Actuators) -> Self {
        let mut s = Self::start(BeepKind::Long, 3, now, out);
        s.then = Some((BeepKind::Short, 1));
        s
    }

    fn on_ms(&self, unit: u32) -> u32 {
        match self.kind {
            BeepKind::Short => unit,
            BeepKind::Long => unit.saturating_mul(3),
        }
    }

    /// Advance one tick. Returns true when the whole burst has finished.
    fn step(&mut self, now: u32, unit: u32, out: &mut dyn Actuators) -> bool {
        if self.tone_on {
            if !has_elapsed(now, self.phase_start, self.on_ms(unit)) {
                return false;
            }
            out.set_buzzer(false);
            self.tone_on = false;
            self.phase_start = now;
            self.done = self.done.saturating_add(1);
            if self.done >= self.target {
                match self.then.take() {
                    Some((kind, count)) => {
                        self.kind = kind;
                        self.target = count;
                        self.done = 0;
                    }
                    None => return true,
                }
            }
        } else if has_elapsed(now, self.phase_start, unit.saturating_mul(2)) {
            out.set_buzzer(true);
            self.tone_on = true;
            self.phase_start = now;
        }
        false
    }
}

#[derive(Debug, Clone, Copy)]
enum Buzzer {
    Idle,
    Playing(Sequence),
    ErrorLoop {
        cycle_start: u32,
        burst: Option<Sequence>,
    },
}

pub struct ActuatorSequencer {
    out: Box<dyn Actuators>,
    cfg: ActuatorCfg,
    pump_on: bool,
    power_on: bool,
    last_power_toggle: Option<u32>,
    servo: ServoState,
    buzzer: Buzzer,
    log: Arc<dyn EventLog + Send + Sync>,
}

impl ActuatorSequencer {
    /// Takes the outputs and drives them to the safe state.
    pub fn new(
        mut out: Box<dyn Actuators>,
        cfg: ActuatorCfg,
        log: Arc<dyn EventLog + Send + Sync>,
    ) -> Self {
        out.set_pump_relay(false);
        out.set_power_relay(false);
        out.write_servo_angle(cfg.servo_idle_deg);
        out.set_buzzer(false);
        Self {
            out,
            cfg,
            pump_on: false,
            power_on: false,
            last_power_toggle: None,
            servo: ServoState::Idle,
            buzzer: Buzzer::Idle,
            log,
        }
    }

    pub fn config(&self) -> &ActuatorCfg {
        &self.cfg
    }

    // ── pump ─────────────────────────────────────────────────────────────

    pub fn pump_on(&mut self) {
        self.pump_on = true;
        self.out.set_pump_relay(true);
    }

    pub fn pump_off(&mut self) {
        self.pump_on = false;
        self.out.set_pump_relay(false);
    }

    pub fn is_pump_on(&self) -> bool {
        self.pump_on
    }

    // ── power relay ──────────────────────────────────────────────────────

    /// Request a power relay level. Returns whether the relay now has that
    /// level; a toggle inside the cooldown is dropped and returns false.
    pub fn set_power(&mut self, on: bool, now: u32) -> bool {
        if on == self.power_on {
            return true;
        }
        if let Some(last) = self.last_power_toggle
            && !has_elapsed(now, last, self.cfg.power_cooldown_ms)
        {
            self.log.record(ControlEvent::CooldownViolation {
                requested_on: on,
                since_last_ms: elapsed_ms(now, last),
            });
            return false;
        }
        self.write_power(on, now);
        true
    }

    /// Power off regardless of the cooldown.
    pub fn force_power_off(&mut self, now: u32) {
        if self.power_on {
            self.write_power(false, now);
        } else {
            self.out.set_power_relay(false);
        }
    }

    fn write_power(&mut self, on: bool, now: u32) {
        self.power_on = on;
        self.last_power_toggle = Some(now);
        self.out.set_power_relay(on);
        self.log.record(ControlEvent::PowerRelay { on });
    }

    pub fn is_power_on(&self) -> bool {
        self.power_on
    }

    // ── servo ────────────────────────────────────────────────────────────

    fn angle_for(&self, pos: ServoPosition) -> u8 {
        match pos {
            ServoPosition::Idle => self.cfg.servo_idle_deg,
            ServoPosition::OverKettle => self.cfg.servo_kettle_deg,
        }
    }

    fn start_move(&mut self, target: ServoPosition, now: u32) {
        self.out.write_servo_angle(self.angle_for(target));
        self.servo = ServoState::Moving { target, since: now };
    }

    /// Start a move. Ignored while a move is in progress or when the servo
    /// already rests at `pos`.
    pub fn move_servo(&mut self, pos: ServoPosition, now: u32) {
        match (self.servo, pos) {
            (ServoState::Moving { .. }, _)
            | (ServoState::Idle, ServoPosition::Idle)
            | (ServoState::OverKettle, ServoPosition::OverKettle) => {}
            _ => self.start_move(pos, now),
        }
    }

    /// Send the servo home, interrupting a move towards the kettle.
    pub fn park_servo(&mut self, now: u32) {
        match self.servo {
            ServoState::Idle
            | ServoState::Moving {
                target: ServoPosition::Idle,
                ..
            } => {}
            _ => self.start_move(ServoPosition::Idle, now),
        }
    }

    pub fn servo_state(&self) -> ServoState {
        self.servo
    }

    /// Settled at `pos` (travel time elapsed).
    pub fn is_servo_in_position(&self, pos: ServoPosition) -> bool {
        matches!(
            (self.servo, pos),
            (ServoState::Idle, ServoPosition::Idle)
                | (ServoState::OverKettle, ServoPosition::OverKettle)
        )
    }

    // ── buzzer ───────────────────────────────────────────────────────────

    /// Play `count` tones of `kind`, replacing anything in progress.
    pub fn beep(&mut self, kind: BeepKind, count: u8, now: u32) {
        if count == 0 {
            return;
        }
        self.out.set_buzzer(false);
        self.buzzer = Buzzer::Playing(Sequence::start(kind, count, now, self.out.as_mut()));
    }

    pub fn beep_short(&mut self, count: u8, now: u32) {
        self.beep(BeepKind::Short, count, now);
    }

    pub fn beep_long(&mut self, count: u8, now: u32) {
        self.beep(BeepKind::Long, count, now);
    }

    /// Enter the repeating error cadence. The first burst starts now.
    pub fn error_loop(&mut self, now: u32) {
        if matches!(self.buzzer, Buzzer::ErrorLoop { .. }) {
            return;
        }
        self.out.set_buzzer(false);
        self.buzzer = Buzzer::ErrorLoop {
            cycle_start: now,
            burst: Some(Sequence::error_burst(now, self.out.as_mut())),
        };
    }

    pub fn buzzer_status(&self) -> BuzzerStatus {
        match self.buzzer {
            Buzzer::Idle => BuzzerStatus::Idle,
            Buzzer::Playing(s) => BuzzerStatus::Playing {
                kind: s.kind,
                count: s.target,
            },
            Buzzer::ErrorLoop { .. } => BuzzerStatus::ErrorLoop,
        }
    }

    pub fn is_buzzer_on(&self) -> bool {
        match self.buzzer {
            Buzzer::Idle => false,
            Buzzer::Playing(s) => s.tone_on,
            Buzzer::ErrorLoop { burst, .. } => burst.is_some_and(|s| s.tone_on),
        }
    }

    // ── tick ─────────────────────────────────────────────────────────────

    /// Advance servo travel and the buzzer by one tick.
    pub fn update(&mut self, now: u32) {
        if let ServoState::Moving { target, since } = self.servo
            && has_elapsed(now, since, self.cfg.servo_travel_ms)
        {
            self.servo = match target {
                ServoPosition::Idle => ServoState::Idle,
                ServoPosition::OverKettle => ServoState::OverKettle,
            };
        }

        let unit = self.cfg.beep_unit_ms;
        match &mut self.buzzer {
            Buzzer::Idle => {}
            Buzzer::Playing(seq) => {
                let finished = seq.step(now, unit, self.out.as_mut());
                if finished {
                    self.buzzer = Buzzer::Idle;
                }
            }
            Buzzer::ErrorLoop { cycle_start, burst } => {
                if let Some(seq) = burst {
                    let finished = seq.step(now, unit, self.out.as_mut());
                    if finished {
                        *burst = None;
                    }
                }
                if has_elapsed(now, *cycle_start, self.cfg.error_cycle_ms) {
                    *cycle_start = now;
                    *burst = Some(Sequence::error_burst(now, self.out.as_mut()));
                }
            }
        }
    }

    /// Pump off and servo home. Used for every fill abort.
    pub fn emergency_stop(&mut self, now: u32) {
        self.pump_off();
        self.park_servo(now);
    }

    /// Everything off: pump, power (ignoring the cooldown) and servo.
    pub fn shutdown(&mut self, now: u32) {
        self.pump_off();
        self.force_power_off(now);
        self.park_servo(now);
    }
}
