//! Human-readable error descriptions and structured JSON error formatting.

use kettle_core::{BuildError, CalibrationError, FaultCode, StoreError};

/// Set by `main` on config load/validation failures.
pub const INVALID_CONFIG: &str = "invalid configuration";

fn is_config_error(err: &eyre::Report) -> bool {
    if matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ) {
        return true;
    }
    err.chain()
        .any(|e| e.to_string().to_ascii_lowercase().contains(INVALID_CONFIG))
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(code) = err.downcast_ref::<FaultCode>() {
        return match code {
            FaultCode::NoFlow => "What happened: Filling stopped with a no-flow fault.\nLikely causes: Kettle lifted off the base, empty reservoir, kinked hose, or a dead pump.\nHow to fix: Check the water supply and the pump relay, place the kettle, then restart.".to_string(),
            FaultCode::FillTimeout => "What happened: The fill did not reach its target in time.\nLikely causes: Very slow flow or a target far above the current level.\nHow to fix: Check the pump and hose, or raise fill.timeout_ms in the config.".to_string(),
            FaultCode::SensorTimeout => "What happened: The load cell stopped producing conversions.\nLikely causes: HX711 not wired correctly, no power/ground, or wrong DT/SCK pins.\nHow to fix: Verify [pins] hx711_dt/hx711_sck and the 5V/GND wiring, then restart.".to_string(),
        };
    }

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingLoadCell | BuildError::MissingButton | BuildError::MissingActuators | BuildError::MissingStore => format!(
                "What happened: The appliance could not be assembled ({be}).\nLikely causes: A peripheral failed to initialize.\nHow to fix: Re-run with --log-level=debug to see which one."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Inconsistent values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<CalibrationError>() {
        return match ce {
            CalibrationError::InvalidKnownWeight(_) => format!(
                "What happened: {ce}.\nHow to fix: Pass the reference mass in grams, e.g. `kettlefill calibrate-factor --known-grams 1000`."
            ),
            CalibrationError::DegenerateFactor(_) | CalibrationError::NoSamples => format!(
                "What happened: {ce}.\nLikely causes: The reference mass was not on the scale, or the scale was not emptied before the tare.\nHow to fix: Repeat the calibration and follow the prompts."
            ),
            CalibrationError::InvalidCalibrationWeight { .. } => format!(
                "What happened: {ce}.\nLikely causes: The kettle was not on the scale, or something else was.\nHow to fix: Place only the empty kettle and calibrate again."
            ),
            CalibrationError::Store(se) => store_hint(se),
        };
    }

    if let Some(se) = err.downcast_ref::<StoreError>() {
        return store_hint(se);
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if is_config_error(err) {
        let detail = err.root_cause().to_string();
        return format!(
            "What happened: Configuration is invalid ({detail}).\nLikely causes: Missing [pins] entries, a typo, or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("open hardware peripherals") {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    if lower.contains("self-check failed") || lower.contains("raw conversions arrived") {
        return format!(
            "What happened: {msg}.\nLikely causes: HX711 not wired correctly or not powered.\nHow to fix: Verify DT/SCK pins and power."
        );
    }

    if lower.contains("open calibration store") {
        return format!(
            "What happened: {msg}.\nLikely causes: The storage.path directory does not exist or is not writable.\nHow to fix: Create the directory or point storage.path elsewhere."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn store_hint(se: &StoreError) -> String {
    match se {
        StoreError::OutOfRange { .. } => format!(
            "What happened: {se}.\nLikely causes: storage.base_addr or storage.size do not match the image.\nHow to fix: Fix the [storage] section of the config."
        ),
        StoreError::Io(_) => format!(
            "What happened: {se}.\nLikely causes: The image file is not writable or the disk is full.\nHow to fix: Check storage.path and its permissions."
        ),
    }
}

/// Stable exit codes: 2 for configuration, 3/4/5 for run faults, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(code) = err.downcast_ref::<FaultCode>() {
        return match code {
            FaultCode::NoFlow => 3,
            FaultCode::FillTimeout => 4,
            FaultCode::SensorTimeout => 5,
        };
    }
    if is_config_error(err) {
        return 2;
    }
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = if let Some(code) = err.downcast_ref::<FaultCode>() {
        code.name()
    } else if is_config_error(err) {
        "InvalidConfig"
    } else if err.downcast_ref::<CalibrationError>().is_some() {
        "Calibration"
    } else if err.downcast_ref::<StoreError>().is_some() {
        "Store"
    } else {
        "Error"
    };
    json!({
        "reason": reason,
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
