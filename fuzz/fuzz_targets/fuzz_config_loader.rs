#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse errors and validation errors are both fine; panics are not.
    if let Ok(cfg) = kettle_config::load_toml(data) {
        if cfg.validate().is_ok() {
            // A validated config must always convert into runtime settings.
            let _ = kettle_core::ApplianceCfg::from(&cfg);
        }
    }
});
