#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parsing and validating arbitrary TOML must never panic; both kinds of
    // rejection are fine.
    if let Ok(cfg) = shutter_config::load_toml(data) {
        if cfg.validate().is_ok() {
            for id in cfg.devices.keys() {
                let _ = cfg.device(id);
            }
        }
    }
});
