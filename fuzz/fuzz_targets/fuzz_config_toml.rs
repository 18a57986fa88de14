#![no_main]

use econ_kernel::ScenarioFile;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Parsing a scenario as TOML must never panic, regardless of how
    // malformed the input is.
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = toml::from_str::<ScenarioFile>(s);
    }
});
