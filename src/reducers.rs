//! The reducer pipeline and implementation registry (component C5, §4.5).
//!
//! `run_pipeline` executes the fixed reducer sequence once per step, in
//! the order the original model specifies. Only `monetary_policy` has more
//! than one registered implementation; the registry still fronts every
//! slot so a scenario can swap in a custom implementation without
//! recompiling the kernel.

use crate::audit::AuditJournal;
use crate::error::{KernelError, Result};
use crate::reducer_formulas as formulas;
use crate::state::{CountryState, GlobalState, Regimes};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

/// A registered reducer implementation: mutates one country's slice,
/// given that country's regime bags and the running audit journal. An
/// `Err` is caught by `run_pipeline` and folded into the audit's error
/// list rather than aborting the step (§7 `ReducerException`).
pub type ReducerFn = fn(&mut CountryState, &Regimes, &mut AuditJournal, &str) -> Result<()>;

/// The fixed order component C5 runs reducers in. `trade_update` is
/// invoked once globally rather than per-country (see `run_pipeline`).
pub const REDUCER_SEQUENCE: [&str; 10] = [
    "output_gap_update",
    "inflation_update",
    "monetary_policy",
    "fiscal_update",
    "debt_update",
    "fx_update",
    "trade_update",
    "labor_supply_update",
    "security_update",
    "bop_settlement",
];

fn registry() -> &'static RwLock<HashMap<(String, String), ReducerFn>> {
    static REGISTRY: OnceLock<RwLock<HashMap<(String, String), ReducerFn>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map: HashMap<(String, String), ReducerFn> = HashMap::new();
        map.insert(
            ("monetary_policy".to_string(), "taylor".to_string()),
            formulas::monetary_policy_taylor,
        );
        map.insert(
            ("monetary_policy".to_string(), "fx_peg".to_string()),
            formulas::monetary_policy_fx_peg,
        );
        map.insert(
            ("output_gap_update".to_string(), "default".to_string()),
            formulas::output_gap_update,
        );
        map.insert(
            ("inflation_update".to_string(), "default".to_string()),
            formulas::inflation_update,
        );
        map.insert(
            ("fiscal_update".to_string(), "default".to_string()),
            formulas::fiscal_update,
        );
        map.insert(
            ("debt_update".to_string(), "default".to_string()),
            formulas::debt_update,
        );
        map.insert(
            ("labor_supply_update".to_string(), "default".to_string()),
            formulas::labor_supply_update,
        );
        map.insert(
            ("security_update".to_string(), "default".to_string()),
            formulas::security_update,
        );
        map.insert(
            ("bop_settlement".to_string(), "default".to_string()),
            formulas::bop_settlement,
        );
        RwLock::new(map)
    })
}

/// Registers (or replaces) an implementation for `reducer_type`/`impl_name`.
/// Scenario authors can call this before running a simulation to install a
/// custom reducer without forking the kernel.
pub fn register_reducer(reducer_type: &str, impl_name: &str, implementation: ReducerFn) {
    registry()
        .write()
        .expect("reducer registry lock poisoned")
        .insert((reducer_type.to_string(), impl_name.to_string()), implementation);
}

pub fn get_reducer_impl(reducer_type: &str, impl_name: &str) -> Option<ReducerFn> {
    registry()
        .read()
        .expect("reducer registry lock poisoned")
        .get(&(reducer_type.to_string(), impl_name.to_string()))
        .copied()
}

/// Lists every registered `(reducer_type, impl_name)` pair, sorted for
/// stable display.
pub fn list_reducer_implementations() -> Vec<(String, String)> {
    let mut entries: Vec<(String, String)> = registry()
        .read()
        .expect("reducer registry lock poisoned")
        .keys()
        .cloned()
        .collect();
    entries.sort();
    entries
}

/// `trigger-installed override > regime-configured rule > first-registered`,
/// per the §4.5.3 selection priority.
fn select_impl_name(state: &GlobalState, reducer_type: &str) -> String {
    if let Some(name) = state.rules.reducer_overrides.get(reducer_type) {
        return name.clone();
    }
    if reducer_type == "monetary_policy" {
        return state.rules.regimes.text("monetary", "rule", "taylor");
    }
    "default".to_string()
}

fn base_country_for_currency(currency: &str) -> &'static str {
    match currency {
        "USD" => "USA",
        "CNY" => "CHN",
        "EUR" => "EUR",
        "JPY" => "JPN",
        "GBP" => "GBR",
        _ => "USA",
    }
}

/// Runs the fixed reducer sequence once against `state`, recording every
/// mutation (and any per-reducer failure) to `audit`. Returns an error
/// only when the base-currency country is missing — the single fatal
/// condition in the error taxonomy (§7); every other failure is caught
/// and folded into `audit.errors` as `"Error in <reducer>: <message>"`.
pub fn run_pipeline(state: &mut GlobalState, audit: &mut AuditJournal) -> Result<()> {
    let base_country = base_country_for_currency(&state.base_ccy).to_string();
    if !state.countries.contains_key(&base_country) {
        warn!(
            "base currency '{}' resolves to country '{}', which is not present in state; aborting step",
            state.base_ccy, base_country
        );
        return Err(KernelError::ConfigurationError(format!(
            "base currency '{}' resolves to country '{}', which is not present in state",
            state.base_ccy, base_country
        )));
    }

    let codes: Vec<String> = state.countries.keys().cloned().collect();
    debug!("running reducer pipeline over {} countries, base={}", codes.len(), base_country);

    for reducer_type in ["output_gap_update", "inflation_update", "monetary_policy", "fiscal_update", "debt_update"] {
        audit.add_reducer(reducer_type);
        for code in &codes {
            run_one(state, audit, reducer_type, code);
        }
    }

    audit.add_reducer("fx_update");
    let base_policy_rate = state
        .countries
        .get(&base_country)
        .and_then(|c| c.macro_.policy_rate)
        .unwrap_or(0.02);
    for code in &codes {
        if *code == base_country {
            continue;
        }
        let regimes = state.rules.regimes.clone();
        if let Some(country) = state.countries.get_mut(code) {
            if let Err(e) = formulas::fx_update(country, &regimes, audit, code, base_policy_rate) {
                warn!("fx_update failed for {}: {}", code, e);
                audit.add_error(format!("Error in fx_update: {}", e));
            }
        }
    }

    audit.add_reducer("trade_update");
    let regimes = state.rules.regimes.clone();
    formulas::trade_update(&mut state.countries, &regimes, audit);

    for reducer_type in ["labor_supply_update", "security_update", "bop_settlement"] {
        audit.add_reducer(reducer_type);
        for code in &codes {
            run_one(state, audit, reducer_type, code);
        }
    }

    state.t += 1;
    Ok(())
}

fn run_one(state: &mut GlobalState, audit: &mut AuditJournal, reducer_type: &str, code: &str) {
    let impl_name = select_impl_name(state, reducer_type);
    let Some(implementation) = get_reducer_impl(reducer_type, &impl_name) else {
        warn!(
            "no implementation '{}' registered for reducer '{}'; skipping {} this step",
            impl_name, reducer_type, code
        );
        audit.add_error(format!(
            "configuration error: no implementation '{}' registered for reducer '{}'",
            impl_name, reducer_type
        ));
        return;
    };
    let regimes = state.rules.regimes.clone();
    if let Some(country) = state.countries.get_mut(code) {
        if let Err(e) = implementation(country, &regimes, audit, code) {
            warn!("reducer '{}' failed for {}: {}", reducer_type, code, e);
            audit.add_error(format!("Error in {}: {}", reducer_type, e));
        }
    }
}
