//! Dotted-path resolver (component C3, §4.3.1).
//!
//! Rather than reflecting over arbitrary struct fields at runtime, every
//! allowed path is compiled by this module into either a small typed
//! scalar cell (for the seven per-country slices) or a map-traversal op
//! (for matrices, regime bags, commodity prices). This is the two-tier
//! "struct prefix + map suffix" resolver the design notes call for.

use crate::error::{KernelError, Result};
use crate::state::{GlobalState, MatrixLayer};
use crate::value::Value;

/// The three patch operations a `PolicyPatch` can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Set,
    Add,
    Mul,
}

fn path_error(path: &str, reason: &str) -> KernelError {
    KernelError::PathError(format!("{} ({})", path, reason))
}

/// Combine an old optional number with a patch op and a value, honoring
/// "add/mul treat a null base as 0/1 respectively".
fn apply_optional_numeric(
    path: &str,
    old: Option<f64>,
    op: PatchOp,
    value: &Value,
) -> Result<Option<f64>> {
    if op == PatchOp::Set && value.is_null() {
        return Ok(None);
    }
    let v = value
        .as_f64()
        .ok_or_else(|| path_error(path, "value is not numeric"))?;
    Ok(Some(match op {
        PatchOp::Set => v,
        PatchOp::Add => old.unwrap_or(0.0) + v,
        PatchOp::Mul => old.unwrap_or(1.0) * v,
    }))
}

fn apply_required_numeric(path: &str, old: f64, op: PatchOp, value: &Value) -> Result<f64> {
    let v = value
        .as_f64()
        .ok_or_else(|| path_error(path, "value is not numeric"))?;
    Ok(match op {
        PatchOp::Set => v,
        PatchOp::Add => old + v,
        PatchOp::Mul => old * v,
    })
}

fn apply_optional_integer(
    path: &str,
    old: Option<i64>,
    op: PatchOp,
    value: &Value,
) -> Result<Option<i64>> {
    if op == PatchOp::Set && value.is_null() {
        return Ok(None);
    }
    let v = value
        .as_f64()
        .ok_or_else(|| path_error(path, "value is not numeric"))?;
    Ok(Some(match op {
        PatchOp::Set => v as i64,
        PatchOp::Add => old.unwrap_or(0) + v as i64,
        PatchOp::Mul => (old.unwrap_or(1) as f64 * v) as i64,
    }))
}

/// Reads a scalar field on one of the seven country slices. Used both by
/// the general path resolver and, narrowly, by the condition evaluator's
/// `country('CODE').path` form.
pub fn country_scalar_get(country: &crate::state::CountryState, slice: &str, field: &str) -> Result<Value> {
    let path = format!("{}.{}", slice, field);
    Ok(match (slice, field) {
        ("macro", "gdp") => Value::from(country.macro_.gdp),
        ("macro", "potential_gdp") => Value::from(country.macro_.potential_gdp),
        ("macro", "inflation") => Value::from(country.macro_.inflation),
        ("macro", "unemployment") => Value::from(country.macro_.unemployment),
        ("macro", "output_gap") => Value::from(country.macro_.output_gap),
        ("macro", "primary_balance") => Value::from(country.macro_.primary_balance),
        ("macro", "debt_gdp") => Value::from(country.macro_.debt_gdp),
        ("macro", "neutral_rate") => Value::from(country.macro_.neutral_rate),
        ("macro", "policy_rate") => Value::from(country.macro_.policy_rate),
        ("macro", "inflation_target") => Value::Number(country.macro_.inflation_target),
        ("macro", "sfa") => Value::Number(country.macro_.sfa),
        ("external", "fx_rate") => Value::from(country.external.fx_rate),
        ("external", "reserves_usd") => Value::from(country.external.reserves_usd),
        ("external", "current_account_gdp") => Value::from(country.external.current_account_gdp),
        ("external", "net_errors_omissions_gdp") => {
            Value::Number(country.external.net_errors_omissions_gdp)
        }
        ("finance", "sovereign_yield") => Value::from(country.finance.sovereign_yield),
        ("finance", "credit_spread") => Value::from(country.finance.credit_spread),
        ("finance", "bank_tier1_ratio") => Value::from(country.finance.bank_tier1_ratio),
        ("finance", "leverage_target") => Value::Number(country.finance.leverage_target),
        ("trade", "exports_gdp") => Value::from(country.trade.exports_gdp),
        ("trade", "imports_gdp") => Value::from(country.trade.imports_gdp),
        ("trade", "tariff_mfn_avg") => Value::from(country.trade.tariff_mfn_avg),
        ("trade", "ntm_index") => Value::from(country.trade.ntm_index),
        ("trade", "terms_of_trade") => Value::Number(country.trade.terms_of_trade),
        ("energy", "energy_stock_to_use") => Value::from(country.energy.energy_stock_to_use),
        ("energy", "food_price_index") => Value::from(country.energy.food_price_index),
        ("energy", "energy_price_index") => Value::from(country.energy.energy_price_index),
        ("security", "milex_gdp") => Value::from(country.security.milex_gdp),
        ("security", "personnel") => Value::from(country.security.personnel),
        ("security", "conflict_intensity") => Value::from(country.security.conflict_intensity),
        ("sentiment", "gdelt_tone") => Value::from(country.sentiment.gdelt_tone),
        ("sentiment", "trends_salience") => Value::from(country.sentiment.trends_salience),
        ("sentiment", "policy_pressure") => Value::from(country.sentiment.policy_pressure),
        ("sentiment", "approval") => Value::from(country.sentiment.approval),
        _ => return Err(path_error(&path, "unknown country field")),
    })
}

/// Applies a patch op to a scalar field on one of the seven country
/// slices, writing the new value in place and returning `(old, new)`.
pub fn country_scalar_apply(
    country: &mut crate::state::CountryState,
    slice: &str,
    field: &str,
    op: PatchOp,
    value: &Value,
) -> Result<(Value, Value)> {
    let path = format!("{}.{}", slice, field);
    macro_rules! opt_f64 {
        ($dst:expr) => {{
            let old = $dst;
            let new = apply_optional_numeric(&path, old, op, value)?;
            $dst = new;
            Ok((Value::from(old), Value::from(new)))
        }};
    }
    macro_rules! req_f64 {
        ($dst:expr) => {{
            let old = $dst;
            let new = apply_required_numeric(&path, old, op, value)?;
            $dst = new;
            Ok((Value::Number(old), Value::Number(new)))
        }};
    }
    match (slice, field) {
        ("macro", "gdp") => opt_f64!(country.macro_.gdp),
        ("macro", "potential_gdp") => opt_f64!(country.macro_.potential_gdp),
        ("macro", "inflation") => opt_f64!(country.macro_.inflation),
        ("macro", "unemployment") => opt_f64!(country.macro_.unemployment),
        ("macro", "output_gap") => opt_f64!(country.macro_.output_gap),
        ("macro", "primary_balance") => opt_f64!(country.macro_.primary_balance),
        ("macro", "debt_gdp") => opt_f64!(country.macro_.debt_gdp),
        ("macro", "neutral_rate") => opt_f64!(country.macro_.neutral_rate),
        ("macro", "policy_rate") => opt_f64!(country.macro_.policy_rate),
        ("macro", "inflation_target") => req_f64!(country.macro_.inflation_target),
        ("macro", "sfa") => req_f64!(country.macro_.sfa),
        ("external", "fx_rate") => opt_f64!(country.external.fx_rate),
        ("external", "reserves_usd") => opt_f64!(country.external.reserves_usd),
        ("external", "current_account_gdp") => opt_f64!(country.external.current_account_gdp),
        ("external", "net_errors_omissions_gdp") => {
            req_f64!(country.external.net_errors_omissions_gdp)
        }
        ("finance", "sovereign_yield") => opt_f64!(country.finance.sovereign_yield),
        ("finance", "credit_spread") => opt_f64!(country.finance.credit_spread),
        ("finance", "bank_tier1_ratio") => opt_f64!(country.finance.bank_tier1_ratio),
        ("finance", "leverage_target") => req_f64!(country.finance.leverage_target),
        ("trade", "exports_gdp") => opt_f64!(country.trade.exports_gdp),
        ("trade", "imports_gdp") => opt_f64!(country.trade.imports_gdp),
        ("trade", "tariff_mfn_avg") => opt_f64!(country.trade.tariff_mfn_avg),
        ("trade", "ntm_index") => opt_f64!(country.trade.ntm_index),
        ("trade", "terms_of_trade") => req_f64!(country.trade.terms_of_trade),
        ("energy", "energy_stock_to_use") => opt_f64!(country.energy.energy_stock_to_use),
        ("energy", "food_price_index") => opt_f64!(country.energy.food_price_index),
        ("energy", "energy_price_index") => opt_f64!(country.energy.energy_price_index),
        ("security", "milex_gdp") => opt_f64!(country.security.milex_gdp),
        ("security", "conflict_intensity") => opt_f64!(country.security.conflict_intensity),
        ("security", "personnel") => {
            let old = country.security.personnel;
            let new = apply_optional_integer(&path, old, op, value)?;
            country.security.personnel = new;
            Ok((Value::from(old), Value::from(new)))
        }
        ("sentiment", "gdelt_tone") => opt_f64!(country.sentiment.gdelt_tone),
        ("sentiment", "trends_salience") => opt_f64!(country.sentiment.trends_salience),
        ("sentiment", "policy_pressure") => opt_f64!(country.sentiment.policy_pressure),
        ("sentiment", "approval") => opt_f64!(country.sentiment.approval),
        _ => Err(path_error(&path, "unknown country field")),
    }
}

fn is_country_slice(name: &str) -> bool {
    matches!(
        name,
        "macro" | "external" | "finance" | "trade" | "energy" | "security" | "sentiment"
    )
}

fn matrix_layer_for_field(name: &str) -> Option<MatrixLayer> {
    match name {
        "trade_matrix" => Some(MatrixLayer::Trade),
        "interbank_matrix" => Some(MatrixLayer::Interbank),
        "alliance_graph" => Some(MatrixLayer::Alliances),
        "sanctions" => Some(MatrixLayer::Sanctions),
        "energy_network" => Some(MatrixLayer::Energy),
        _ => None,
    }
}

/// Resolves and applies a write against `path`, per the patch operation
/// `op`. Returns `(old_value, new_value)` on success.
pub fn resolve_write(
    state: &mut GlobalState,
    path: &str,
    op: PatchOp,
    value: &Value,
) -> Result<(Value, Value)> {
    let segs: Vec<&str> = path.split('.').collect();
    match segs.as_slice() {
        ["t"] => {
            let old = state.t;
            let new_f = apply_required_numeric(path, old as f64, op, value)?;
            state.t = new_f.max(0.0) as u64;
            Ok((Value::Integer(old as i64), Value::Integer(state.t as i64)))
        }
        ["base_ccy"] => {
            if op != PatchOp::Set {
                return Err(path_error(path, "base_ccy only supports set"));
            }
            let new = value
                .as_str()
                .ok_or_else(|| path_error(path, "value is not a string"))?
                .to_string();
            let old = state.base_ccy.clone();
            state.base_ccy = new.clone();
            Ok((Value::Text(old), Value::Text(new)))
        }
        ["countries", code, slice, field] if is_country_slice(slice) => {
            let country = state
                .countries
                .get_mut(*code)
                .ok_or_else(|| path_error(path, "unknown country"))?;
            country_scalar_apply(country, slice, field, op, value)
        }
        ["rules", "rng_seed"] => {
            let old = state.rules.rng_seed;
            let new_f = apply_required_numeric(path, old as f64, op, value)?;
            state.rules.rng_seed = new_f.max(0.0) as u64;
            Ok((
                Value::Integer(old as i64),
                Value::Integer(state.rules.rng_seed as i64),
            ))
        }
        ["rules", "reducer_overrides", target] => {
            if op != PatchOp::Set {
                return Err(path_error(path, "reducer_overrides only supports set"));
            }
            let new = value
                .as_str()
                .ok_or_else(|| path_error(path, "value is not a string"))?
                .to_string();
            let old = state.rules.reducer_overrides.get(*target).cloned();
            state
                .rules
                .reducer_overrides
                .insert(target.to_string(), new.clone());
            Ok((Value::from(old), Value::Text(new)))
        }
        ["rules", "regimes", bag, key] => {
            let bag_map = state
                .rules
                .regimes
                .bag_mut(bag)
                .ok_or_else(|| path_error(path, "unknown regime bag"))?;
            let old = bag_map.get(*key).cloned().unwrap_or(Value::Null);
            let new = if op == PatchOp::Set {
                value.clone()
            } else {
                Value::Number(apply_optional_numeric(path, old.as_f64(), op, value)?.unwrap_or(0.0))
            };
            bag_map.insert(key.to_string(), new.clone());
            Ok((old, new))
        }
        [field, from, to] if matrix_layer_for_field(field).is_some() => {
            let layer = matrix_layer_for_field(field).unwrap();
            if from.is_empty() || to.is_empty() {
                return Err(path_error(path, "matrix keys must be non-empty"));
            }
            let old = state.get_matrix_edge(layer, from, to);
            let new = apply_required_numeric(path, old, op, value)?;
            state.set_matrix_edge(layer, from, to, new)?;
            Ok((Value::Number(old), Value::Number(new)))
        }
        ["io_coefficients", sector_a, sector_b] => {
            if sector_a.is_empty() || sector_b.is_empty() {
                return Err(path_error(path, "sector keys must be non-empty"));
            }
            let old = state
                .io_coefficients
                .get(*sector_a)
                .and_then(|row| row.get(*sector_b))
                .copied()
                .unwrap_or(0.0);
            let new = apply_required_numeric(path, old, op, value)?;
            state
                .io_coefficients
                .entry(sector_a.to_string())
                .or_default()
                .insert(sector_b.to_string(), new);
            Ok((Value::Number(old), Value::Number(new)))
        }
        ["commodity_prices", commodity] => {
            if commodity.is_empty() {
                return Err(path_error(path, "commodity key must be non-empty"));
            }
            let old = state.get_commodity_price(commodity).unwrap_or(0.0);
            let new = apply_required_numeric(path, old, op, value)?;
            state.set_commodity_price(commodity, new)?;
            Ok((Value::Number(old), Value::Number(new)))
        }
        _ => Err(path_error(path, "does not resolve to a known cell")),
    }
}

/// Reads a numeric value off `country('CODE').<dotted-field-path>` for the
/// condition evaluator. Returns `None` when the country or any segment is
/// absent or non-numeric, matching the "missing-value sentinel" contract.
pub fn read_country_numeric(state: &GlobalState, code: &str, field_path: &[&str]) -> Option<f64> {
    let country = state.countries.get(code)?;
    if field_path.len() != 2 {
        return None;
    }
    country_scalar_get(country, field_path[0], field_path[1])
        .ok()
        .and_then(|v| v.as_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::CountryState;

    fn sample_state() -> GlobalState {
        GlobalState::new().with_country(
            "USA",
            CountryState {
                macro_: crate::state::Macro {
                    policy_rate: Some(0.02),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
    }

    #[test]
    fn set_writes_a_scalar_cell() {
        let mut state = sample_state();
        let (old, new) = resolve_write(
            &mut state,
            "countries.USA.macro.policy_rate",
            PatchOp::Set,
            &Value::Number(0.0),
        )
        .unwrap();
        assert_eq!(old, Value::Number(0.02));
        assert_eq!(new, Value::Number(0.0));
        assert_eq!(state.countries["USA"].macro_.policy_rate, Some(0.0));
    }

    #[test]
    fn add_on_null_base_treats_it_as_zero() {
        let mut state = sample_state();
        let (old, new) = resolve_write(
            &mut state,
            "countries.USA.macro.output_gap",
            PatchOp::Add,
            &Value::Number(0.01),
        )
        .unwrap();
        assert_eq!(old, Value::Null);
        assert_eq!(new, Value::Number(0.01));
    }

    #[test]
    fn mul_on_null_base_treats_it_as_one() {
        let mut state = sample_state();
        let (_, new) = resolve_write(
            &mut state,
            "countries.USA.trade.tariff_mfn_avg",
            PatchOp::Mul,
            &Value::Number(2.0),
        )
        .unwrap();
        assert_eq!(new, Value::Number(2.0));
    }

    #[test]
    fn unknown_country_is_a_path_error() {
        let mut state = sample_state();
        let result = resolve_write(
            &mut state,
            "countries.RUS.macro.policy_rate",
            PatchOp::Set,
            &Value::Number(0.0),
        );
        assert!(matches!(result, Err(KernelError::PathError(_))));
    }

    #[test]
    fn matrix_write_creates_intermediate_row() {
        let mut state = sample_state();
        resolve_write(
            &mut state,
            "sanctions.USA.RUS",
            PatchOp::Set,
            &Value::Number(0.8),
        )
        .unwrap();
        assert_eq!(
            state.get_matrix_edge(MatrixLayer::Sanctions, "USA", "RUS"),
            0.8
        );
    }

    #[test]
    fn regime_bag_set_accepts_any_value_type() {
        let mut state = sample_state();
        resolve_write(
            &mut state,
            "rules.regimes.monetary.rule",
            PatchOp::Set,
            &Value::Text("fx_peg".to_string()),
        )
        .unwrap();
        assert_eq!(
            state.rules.regimes.monetary.get("rule"),
            Some(&Value::Text("fx_peg".to_string()))
        );
    }

    #[test]
    fn country_numeric_read_is_none_for_missing_country() {
        let state = sample_state();
        assert_eq!(
            read_country_numeric(&state, "RUS", &["macro", "policy_rate"]),
            None
        );
    }
}
