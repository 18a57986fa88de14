#![no_main]

use chrono::Utc;
use econ_kernel::state::{CountryState, GlobalState, Macro};
use econ_kernel::step;
use libfuzzer_sys::fuzz_target;
use std::collections::{BTreeMap, BTreeSet};

// Fuzzes `step` with arbitrary numeric macro fields. The reducer formulas
// are ordinary floating point arithmetic with no input validation of
// their own — this exercises that no combination of starting values
// (including NaN/infinity, since the kernel never rejects them up front)
// makes a reducer panic.
fuzz_target!(|data: &[u8]| {
    if data.len() < 32 {
        return;
    }

    let gdp = f64::from_le_bytes(data[0..8].try_into().unwrap());
    let potential_gdp = f64::from_le_bytes(data[8..16].try_into().unwrap());
    let inflation = f64::from_le_bytes(data[16..24].try_into().unwrap());
    let policy_rate = f64::from_le_bytes(data[24..32].try_into().unwrap());

    let state = GlobalState::new().with_country(
        "USA",
        CountryState {
            macro_: Macro {
                gdp: Some(gdp),
                potential_gdp: Some(potential_gdp),
                inflation: Some(inflation),
                policy_rate: Some(policy_rate),
                ..Default::default()
            },
            ..Default::default()
        },
    );

    let _ = step(state, &[], BTreeSet::new(), BTreeMap::new(), Utc::now());
});
