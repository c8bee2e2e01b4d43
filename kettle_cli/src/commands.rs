//! Subcommand bodies.

use std::io::{BufRead, Write};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use eyre::{Result, WrapErr};
use kettle_config::Config;
use kettle_core::{
    CalibrationRecord, ControlEvent, FactorCalibration, ModeKind, RunOutcome, Snapshot,
};
use serde_json::{Value, json};

use crate::cli::{JSON_MODE, ScheduledRemote};
use crate::device::Device;

fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

pub fn snapshot_json(s: &Snapshot) -> Value {
    json!({
        "mode": s.mode.name(),
        "error": s.error.map(|c| c.name()),
        "kettle_present": s.kettle_present,
        "current_g": s.current_g,
        "target_g": s.target_g,
        "start_g": s.start_g,
        "empty_g": s.empty_g,
        "water_g": s.water_g,
        "cups": s.cups,
        "power_on": s.power_on,
        "pump_on": s.pump_on,
        "servo": format!("{:?}", s.servo),
        "calibration_step": s.calibration_step.map(|c| format!("{c:?}")),
        "notice": s.notice.map(|n| n.message()),
        "ready": s.ready,
    })
}

fn snapshot_line(s: &Snapshot) -> String {
    let mut line = format!(
        "mode={} weight={:.1}g water={:.1}g cups={} kettle={} power={} pump={}",
        s.mode,
        s.current_g,
        s.water_g,
        s.cups,
        if s.kettle_present { "yes" } else { "no" },
        if s.power_on { "on" } else { "off" },
        if s.pump_on { "on" } else { "off" },
    );
    if let Some(t) = s.target_g {
        line.push_str(&format!(" target={t:.1}g"));
    }
    if let Some(code) = s.error {
        line.push_str(&format!(" error={}", code.name()));
    }
    if let Some(n) = s.notice {
        line.push_str(&format!(" notice=\"{}\"", n.message()));
    }
    line
}

fn record_json(r: &CalibrationRecord) -> Value {
    json!({
        "empty_weight_g": r.empty_weight_g,
        "factor": r.factor,
        "calibrated": r.calibrated,
        "factor_calibrated": r.factor_calibrated,
    })
}

/// Print `value` as one JSON line, or `text` otherwise.
fn emit(value: Value, text: impl FnOnce() -> String) {
    if json_mode() {
        println!("{value}");
    } else {
        println!("{}", text());
    }
}

fn prompt(question: &str) -> Result<String> {
    let mut err = std::io::stderr();
    write!(err, "{question} ").wrap_err("write prompt")?;
    err.flush().wrap_err("flush prompt")?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .wrap_err("read answer from stdin")?;
    Ok(line.trim().to_string())
}

fn outcome_name(o: RunOutcome) -> &'static str {
    match o {
        RunOutcome::Shutdown => "shutdown",
        RunOutcome::Fault(_) => "fault",
        RunOutcome::Stopped => "stopped",
    }
}

// ── run ──────────────────────────────────────────────────────────────────────

pub fn run(
    cfg: &Config,
    max_ticks: Option<u64>,
    mut remotes: Vec<ScheduledRemote>,
    status_every: Option<u64>,
    virtual_time: bool,
    shutdown: &Arc<AtomicBool>,
) -> Result<()> {
    let mut dev = Device::open(cfg, !virtual_time)?;
    remotes.sort_by_key(|r| r.tick);
    let mut pending = remotes.into_iter().peekable();
    let mut ticks: u64 = 0;

    tracing::info!(
        period_ms = cfg.runner.period_ms,
        max_ticks,
        ready = dev.app.controller().weight().is_ready(),
        "control loop start"
    );

    let Device {
        app,
        plant,
        clock,
        period,
        realtime,
        ..
    } = &mut dev;
    // On a virtual clock nobody hears the error cadence; stop at the fault.
    let hold_in_error = *realtime;
    if hold_in_error {
        tracing::info!("a fault keeps the device in Error mode until Ctrl-C");
    }

    let outcome = app.run_until(&**clock, *period, shutdown, |app, now| {
        ticks += 1;
        if !hold_in_error && app.controller().fault().is_some() {
            return ControlFlow::Break(());
        }
        if let Some(plant) = plant.as_mut() {
            plant.advance(now, app);
        }
        while let Some(r) = pending.next_if(|r| r.tick <= ticks) {
            tracing::info!(code = r.code, tick = ticks, "delivering scheduled remote command");
            app.remote_command(r.code, now);
        }
        if let Some(every) = status_every
            && every > 0
            && ticks % every == 0
        {
            let snap = app.snapshot();
            let mut value = snapshot_json(&snap);
            value["tick"] = json!(ticks);
            emit(value, || format!("tick={ticks} {}", snapshot_line(&snap)));
        }
        if max_ticks.is_some_and(|m| ticks >= m) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });

    let snap = app.snapshot();
    let mut value = snapshot_json(&snap);
    value["outcome"] = json!(outcome_name(outcome));
    value["ticks"] = json!(ticks);
    emit(value, || {
        format!(
            "run finished ({}) after {ticks} ticks: {}",
            outcome_name(outcome),
            snapshot_line(&snap)
        )
    });

    match outcome {
        RunOutcome::Fault(code) => {
            tracing::error!(fault = code.name(), "control loop stopped in Error mode");
            Err(eyre::Report::new(code))
        }
        RunOutcome::Shutdown | RunOutcome::Stopped => Ok(()),
    }
}

// ── calibrate-factor ─────────────────────────────────────────────────────────

pub fn calibrate_factor(
    cfg: &Config,
    known_grams: f32,
    samples: Option<usize>,
    yes: bool,
) -> Result<()> {
    let wanted = samples.unwrap_or(cfg.scale.factor_samples).max(1);
    let mut session =
        FactorCalibration::new(known_grams, wanted).map_err(eyre::Report::new)?;
    let mut dev = Device::open(cfg, false)?;
    dev.warn_if_volatile();
    dev.settle();

    if !yes {
        prompt("Remove everything from the scale, then press Enter.")?;
        dev.settle();
        if !dev.app.controller_mut().weight_mut().tare() {
            eyre::bail!("tare failed: the load cell produced no conversion");
        }
        prompt(&format!(
            "Place the {known_grams:.1} g reference on the scale, then press Enter."
        ))?;
        dev.settle();
    }

    // Every conversion may be late by up to the sensor timeout.
    let period_ms = cfg.runner.period_ms.max(1);
    let max_ticks = wanted + (cfg.scale.sensor_timeout_ms / period_ms) as usize;
    for _ in 0..max_ticks {
        dev.step();
        if let Some(raw) = dev.app.controller().weight().fresh_raw()
            && session.feed(raw)
        {
            break;
        }
    }
    if !session.is_complete() {
        eyre::bail!(
            "only {} of {wanted} raw conversions arrived; check the load cell wiring",
            session.samples()
        );
    }

    let offset = dev.app.controller().weight().tare_offset();
    let factor = session.propose(offset).map_err(eyre::Report::new)?;
    let mean = session.mean_raw().unwrap_or_default();
    tracing::info!(factor, mean_raw = mean, offset, "factor proposed");

    let apply = yes || {
        let answer = prompt(&format!("Proposed factor {factor:.8} g/count. Apply? [y/N]"))?;
        matches!(answer.as_str(), "y" | "Y" | "yes")
    };
    if apply {
        dev.app
            .controller_mut()
            .weight_mut()
            .apply_factor(factor)
            .map_err(eyre::Report::new)?;
    }

    emit(
        json!({
            "factor": factor,
            "mean_raw": mean,
            "tare_offset": offset,
            "samples": session.samples(),
            "applied": apply,
            "persistent": dev.persistent,
        }),
        || {
            if apply {
                format!("Factor {factor:.8} g/count applied ({} samples).", session.samples())
            } else {
                format!("Factor {factor:.8} g/count discarded.")
            }
        },
    );
    Ok(())
}

// ── status ───────────────────────────────────────────────────────────────────

pub fn status(cfg: &Config) -> Result<()> {
    let mut dev = Device::open(cfg, false)?;
    dev.settle();
    let snap = dev.app.snapshot();
    let weight = dev.app.controller().weight();
    let record = weight.record();
    let raw = weight.raw_reading();
    let unfiltered = weight.unfiltered_weight();
    let sim_load = dev.plant.as_ref().map(|p| p.grams());

    let mut value = snapshot_json(&snap);
    value["record"] = record_json(&record);
    value["raw"] = json!(raw);
    value["unfiltered_g"] = json!(unfiltered);
    value["persistent"] = json!(dev.persistent);
    if let Some(g) = sim_load {
        value["sim_load_g"] = json!(g);
    }
    emit(value, || {
        let mut out = snapshot_line(&snap);
        out.push_str(&format!(
            "\nrecord: empty={:.1}g factor={:.8} calibrated={} factor_calibrated={}",
            record.empty_weight_g, record.factor, record.calibrated, record.factor_calibrated
        ));
        match raw {
            Some(r) => out.push_str(&format!("\nraw={r} unfiltered={unfiltered:.1}g")),
            None => out.push_str("\nraw=none (no conversion yet)"),
        }
        if !dev.persistent {
            out.push_str("\nstore: in-memory (set storage.path to persist)");
        }
        out
    });
    Ok(())
}

// ── resets ───────────────────────────────────────────────────────────────────

pub fn reset_calibration(cfg: &Config) -> Result<()> {
    let mut dev = Device::open(cfg, false)?;
    dev.warn_if_volatile();
    dev.app
        .controller_mut()
        .weight_mut()
        .reset_calibration()
        .map_err(eyre::Report::new)?;
    let record = dev.app.controller().weight().record();
    emit(
        json!({ "reset": "calibration", "record": record_json(&record) }),
        || "Calibration erased; the next boot starts from defaults.".to_string(),
    );
    Ok(())
}

pub fn reset_factor(cfg: &Config) -> Result<()> {
    let mut dev = Device::open(cfg, false)?;
    dev.warn_if_volatile();
    dev.app
        .controller_mut()
        .weight_mut()
        .reset_factor()
        .map_err(eyre::Report::new)?;
    let record = dev.app.controller().weight().record();
    emit(
        json!({ "reset": "factor", "record": record_json(&record) }),
        || {
            format!(
                "Factor reset to the default {:.8} g/count; empty weight {:.1} g kept.",
                record.factor, record.empty_weight_g
            )
        },
    );
    Ok(())
}

// ── remote ───────────────────────────────────────────────────────────────────

pub fn remote(cfg: &Config, code: i32) -> Result<()> {
    let mut dev = Device::open(cfg, false)?;
    dev.settle();
    dev.log.clear();
    let now = dev.now();
    dev.app.remote_command(code, now);
    // Let the pending transition commit.
    dev.step();

    let rejected = dev.log.events().into_iter().find_map(|e| match e {
        ControlEvent::RemoteRejected { reason, .. } => Some(reason),
        _ => None,
    });
    let snap = dev.app.snapshot();
    let accepted = rejected.is_none() && snap.mode == ModeKind::Filling;
    let mut value = snapshot_json(&snap);
    value["code"] = json!(code);
    value["accepted"] = json!(accepted);
    value["rejected"] = json!(rejected.map(|r| format!("{r:?}")));
    emit(value, || match rejected {
        Some(reason) => format!("remote {code} rejected: {reason:?}"),
        None if accepted => format!(
            "remote {code} accepted: filling to {:.1} g",
            snap.target_g.unwrap_or_default()
        ),
        None => format!("remote {code}: {}", snapshot_line(&snap)),
    });
    Ok(())
}

// ── self-check ───────────────────────────────────────────────────────────────

pub fn self_check(cfg: &Config) -> Result<()> {
    let mut dev = Device::open(cfg, false)?;
    let period_ms = cfg.runner.period_ms.max(1);
    let ticks = (cfg.scale.sensor_timeout_ms / period_ms).max(1);
    let mut raw = None;
    for _ in 0..ticks {
        dev.step();
        raw = dev.app.controller().weight().fresh_raw();
        if raw.is_some() {
            break;
        }
    }
    let Some(raw) = raw else {
        eyre::bail!(
            "self-check failed: load cell produced no conversion within {} ms",
            cfg.scale.sensor_timeout_ms
        );
    };
    let ready = dev.app.controller().weight().is_ready();
    emit(
        json!({ "ok": true, "raw": raw, "ready": ready }),
        || {
            format!(
                "ok (raw={raw}, factor {})",
                if ready { "calibrated" } else { "NOT calibrated" }
            )
        },
    );
    Ok(())
}
