//! The ten reducer formulas (component C5, §4.5.2).
//!
//! Each function mutates one country's slice in place and records its
//! writes to the audit journal. Preconditions that are not met are a
//! silent skip (`ArithmeticPreconditionMiss`, §7) — not an error.

use crate::audit::AuditJournal;
use crate::error::Result;
use crate::state::{CountryState, Regimes};
use crate::value::Value;
use std::collections::BTreeMap;

fn details(pairs: &[(&str, f64)], formula: &str) -> BTreeMap<String, Value> {
    let mut map = BTreeMap::new();
    for (k, v) in pairs {
        map.insert(k.to_string(), Value::Number(*v));
    }
    map.insert("formula".to_string(), Value::Text(formula.to_string()));
    map
}

/// `shock_adjusted_gdp = gdp * (1 + demand_shock_pct/100)` (local only),
/// `y' = (shock_adjusted_gdp - potential)/potential`. The shock-adjusted
/// GDP is never written back to `macro.gdp` — it only feeds this turn's
/// output gap, the way the original computes it as a local.
pub fn output_gap_update(country: &mut CountryState, regimes: &Regimes, audit: &mut AuditJournal, code: &str) -> Result<()> {
    let (Some(gdp), Some(potential)) = (country.macro_.gdp, country.macro_.potential_gdp) else {
        return Ok(());
    };
    let demand_shock_pct = regimes.number("monetary", "demand_shock_pct", 0.0);
    let shock_adjusted_gdp = gdp * (1.0 + demand_shock_pct / 100.0);
    let new_gap = (shock_adjusted_gdp - potential) / potential;

    let gap_path = format!("countries.{}.macro.output_gap", code);
    audit.record_change(
        gap_path,
        Value::from(country.macro_.output_gap),
        Value::Number(new_gap),
        "output_gap_update",
        BTreeMap::new(),
        details(
            &[("gdp", gdp), ("demand_shock_pct", demand_shock_pct), ("shock_adjusted_gdp", shock_adjusted_gdp), ("potential_gdp", potential)],
            "output_gap",
        ),
    );
    country.macro_.output_gap = Some(new_gap);
    Ok(())
}

const PHILLIPS_BETA: f64 = 0.6;
const PHILLIPS_KAPPA: f64 = 0.1;
const INFLATION_ALPHA: f64 = 0.1;

/// Phillips-curve-anchored inflation update, emitted only if it moves by
/// more than `1e-4`.
pub fn inflation_update(country: &mut CountryState, regimes: &Regimes, audit: &mut AuditJournal, code: &str) -> Result<()> {
    let Some(pi) = country.macro_.inflation else {
        return Ok(());
    };
    let y = country.macro_.output_gap.unwrap_or(0.0);
    let pi_star = country.macro_.inflation_target;
    let supply_shock = regimes.number("monetary", "supply_shock", 0.0);
    let pi_target = PHILLIPS_BETA * pi_star + PHILLIPS_KAPPA * y + supply_shock;
    let new_pi = pi + INFLATION_ALPHA * (pi_target - pi);

    if (new_pi - pi).abs() > 1e-4 {
        let path = format!("countries.{}.macro.inflation", code);
        audit.record_change(
            path,
            Value::Number(pi),
            Value::Number(new_pi),
            "inflation_update",
            BTreeMap::new(),
            details(
                &[("inflation", pi), ("output_gap", y), ("pi_star", pi_star), ("supply_shock", supply_shock)],
                "phillips_curve",
            ),
        );
        country.macro_.inflation = Some(new_pi);
    }
    Ok(())
}

/// `monetary_policy: taylor`. Yields to a trigger that already wrote this
/// step's `policy_rate`, recording a skip marker instead.
pub fn monetary_policy_taylor(
    country: &mut CountryState,
    regimes: &Regimes,
    audit: &mut AuditJournal,
    code: &str,
) -> Result<()> {
    let path = format!("countries.{}.macro.policy_rate", code);
    if audit.has_change_at(&path) {
        let triggers_fired = Value::from(audit.triggers_fired());
        let mut details = BTreeMap::new();
        details.insert(
            "reason".to_string(),
            Value::Text("trigger already set policy_rate this step".to_string()),
        );
        details.insert(
            "trigger_set_value".to_string(),
            Value::from(country.macro_.policy_rate),
        );
        details.insert("triggers_fired".to_string(), triggers_fired);
        audit.record_change(
            format!("countries.{}.macro.policy_rate_taylor_rule_skipped", code),
            Value::Null,
            Value::Bool(true),
            "monetary_policy:taylor",
            BTreeMap::new(),
            details,
        );
        return Ok(());
    }

    let r = country.macro_.policy_rate.unwrap_or(0.02);
    let y = country.macro_.output_gap.unwrap_or(0.0);
    let pi = country.macro_.inflation.unwrap_or(0.0);
    let r_star = country.macro_.neutral_rate.unwrap_or(0.025);
    let pi_star = country.macro_.inflation_target;
    let phi_pi = regimes.number("monetary", "phi_pi", 0.5);
    let phi_y = regimes.number("monetary", "phi_y", 0.5);

    let r_raw = r_star + pi + phi_pi * (pi - pi_star) + phi_y * y;
    let new_r = r_raw.max(0.0);

    if (new_r - r).abs() > 1e-4 {
        audit.record_change(
            path,
            Value::from(country.macro_.policy_rate),
            Value::Number(new_r),
            "monetary_policy:taylor",
            BTreeMap::new(),
            details(
                &[("policy_rate", r), ("inflation", pi), ("output_gap", y), ("r_star", r_star), ("pi_star", pi_star), ("phi_pi", phi_pi), ("phi_y", phi_y)],
                "taylor_rule",
            ),
        );
        country.macro_.policy_rate = Some(new_r);
    }
    Ok(())
}

/// `monetary_policy: fx_peg`. Always emits when the peg adjustment moves
/// the rate, regardless of whether a trigger touched it this step.
pub fn monetary_policy_fx_peg(
    country: &mut CountryState,
    regimes: &Regimes,
    audit: &mut AuditJournal,
    code: &str,
) -> Result<()> {
    let target = regimes.number("monetary", "peg_target", 1.0);
    let k = regimes.number("monetary", "peg_strength", 2.0);
    let r = country.macro_.policy_rate.unwrap_or(0.02);

    let new_r = match country.external.fx_rate {
        Some(s) => {
            let adjustment = k * (s - target);
            (r + adjustment).max(0.0)
        }
        None => r,
    };

    if (new_r - r).abs() > f64::EPSILON {
        let path = format!("countries.{}.macro.policy_rate", code);
        audit.record_change(
            path,
            Value::from(country.macro_.policy_rate),
            Value::Number(new_r),
            "monetary_policy:fx_peg",
            BTreeMap::new(),
            details(
                &[("policy_rate", r), ("fx_rate", country.external.fx_rate.unwrap_or(target)), ("peg_target", target), ("peg_strength", k)],
                "fx_peg",
            ),
        );
        country.macro_.policy_rate = Some(new_r);
    }
    Ok(())
}

/// `pb' = pb + 0.1*w + 0.2*(elasticity_saving*w)`.
pub fn fiscal_update(country: &mut CountryState, regimes: &Regimes, audit: &mut AuditJournal, code: &str) -> Result<()> {
    let (Some(gdp), Some(pb)) = (country.macro_.gdp, country.macro_.primary_balance) else {
        return Ok(());
    };
    let w = regimes.number("fiscal", "wealth_tax_rate", 0.0);
    let elasticity_saving = regimes.number("fiscal", "elasticity_saving", -0.3);
    let tax_revenue_of_gdp = 0.1 * w;
    let saving_response = elasticity_saving * w;
    let new_pb = pb + tax_revenue_of_gdp + 0.2 * saving_response;

    let path = format!("countries.{}.macro.primary_balance", code);
    audit.record_change(
        path,
        Value::Number(pb),
        Value::Number(new_pb),
        "fiscal_update",
        BTreeMap::new(),
        details(
            &[("gdp", gdp), ("primary_balance", pb), ("wealth_tax_rate", w), ("elasticity_saving", elasticity_saving)],
            "wealth_tax_and_saving_response",
        ),
    );
    country.macro_.primary_balance = Some(new_pb);
    Ok(())
}

/// `d' = d*(1+r_real)/(1+g) - pb + sfa`, with `r_real = i - pi`.
pub fn debt_update(country: &mut CountryState, _regimes: &Regimes, audit: &mut AuditJournal, code: &str) -> Result<()> {
    let (Some(d), Some(pb), Some(i), Some(gdp), Some(potential)) = (
        country.macro_.debt_gdp,
        country.macro_.primary_balance,
        country.finance.sovereign_yield,
        country.macro_.gdp,
        country.macro_.potential_gdp,
    ) else {
        return Ok(());
    };
    let pi = country.macro_.inflation.unwrap_or(0.02);
    let sfa = country.macro_.sfa;
    let r_real = i - pi;
    let g = (gdp - potential) / potential;
    let new_d = d * (1.0 + r_real) / (1.0 + g) - pb + sfa;

    let path = format!("countries.{}.macro.debt_gdp", code);
    audit.record_change(
        path,
        Value::Number(d),
        Value::Number(new_d),
        "debt_update",
        BTreeMap::new(),
        details(
            &[("debt_gdp", d), ("primary_balance", pb), ("sovereign_yield", i), ("inflation", pi), ("gdp", gdp), ("potential_gdp", potential), ("sfa", sfa)],
            "debt_dynamics",
        ),
    );
    country.macro_.debt_gdp = Some(new_d);
    Ok(())
}

/// Uncovered interest parity vs. the base-currency country's policy rate.
/// Skipped entirely for the base country itself.
pub fn fx_update(
    country: &mut CountryState,
    regimes: &Regimes,
    audit: &mut AuditJournal,
    code: &str,
    base_policy_rate: f64,
) -> Result<()> {
    let (Some(r_dom), Some(s)) = (country.macro_.policy_rate, country.external.fx_rate) else {
        return Ok(());
    };
    let rho = regimes.number("fx", "uip_rho_base", 0.0);
    let delta_s_expected = r_dom - base_policy_rate + rho;
    let new_s = s * (1.0 + 0.1 * delta_s_expected);

    let path = format!("countries.{}.external.fx_rate", code);
    audit.record_change(
        path,
        Value::Number(s),
        Value::Number(new_s),
        "fx_update",
        BTreeMap::new(),
        details(
            &[("fx_rate", s), ("policy_rate", r_dom), ("base_policy_rate", base_policy_rate), ("uip_rho_base", rho)],
            "uip_formula",
        ),
    );
    country.external.fx_rate = Some(new_s);
    Ok(())
}

/// Global, single-invocation trade reducer. Tariff multiplier and NTM
/// shock from `regimes.trade` are applied uniformly across every country
/// with both trade shares present.
pub fn trade_update(countries: &mut BTreeMap<String, CountryState>, regimes: &Regimes, audit: &mut AuditJournal) {
    let multiplier = regimes.number("trade", "tariff_multiplier", 1.0);
    let ntm_shock = regimes.number("trade", "ntm_shock", 0.0);

    for (code, country) in countries.iter_mut() {
        let (Some(exports), Some(imports)) = (country.trade.exports_gdp, country.trade.imports_gdp) else {
            continue;
        };
        let tariff_mfn_avg = country.trade.tariff_mfn_avg.unwrap_or(0.0);
        let tariff_impact = match country.trade.tariff_mfn_avg {
            Some(mfn) => {
                let effective_tariff = mfn * multiplier;
                -0.5 * (effective_tariff - mfn)
            }
            None => 0.0,
        };
        let ntm_impact = -0.3 * ntm_shock;
        let total = tariff_impact + ntm_impact;

        let new_exports = exports * (1.0 + total);
        let new_imports = imports * (1.0 + total);

        audit.record_change(
            format!("countries.{}.trade.exports_gdp", code),
            Value::Number(exports),
            Value::Number(new_exports),
            "trade_update",
            BTreeMap::new(),
            details(
                &[("exports_gdp", exports), ("tariff_mfn_avg", tariff_mfn_avg), ("tariff_multiplier", multiplier), ("ntm_shock", ntm_shock)],
                "tariff_and_ntm_shock",
            ),
        );
        audit.record_change(
            format!("countries.{}.trade.imports_gdp", code),
            Value::Number(imports),
            Value::Number(new_imports),
            "trade_update",
            BTreeMap::new(),
            details(
                &[("imports_gdp", imports), ("tariff_mfn_avg", tariff_mfn_avg), ("tariff_multiplier", multiplier), ("ntm_shock", ntm_shock)],
                "tariff_and_ntm_shock",
            ),
        );
        country.trade.exports_gdp = Some(new_exports);
        country.trade.imports_gdp = Some(new_imports);
    }
}

/// National-service mobilization lowers measured unemployment, floored at 1%.
pub fn labor_supply_update(country: &mut CountryState, regimes: &Regimes, audit: &mut AuditJournal, code: &str) -> Result<()> {
    let pct = regimes.number("labor", "national_service_pct", 0.0);
    if pct <= 0.0 {
        return Ok(());
    }
    let Some(unemployment) = country.macro_.unemployment else {
        return Ok(());
    };
    let new_unemployment = (unemployment - 0.5 * pct / 100.0).max(0.01);

    let path = format!("countries.{}.macro.unemployment", code);
    audit.record_change(
        path,
        Value::Number(unemployment),
        Value::Number(new_unemployment),
        "labor_supply_update",
        BTreeMap::new(),
        details(&[("unemployment", unemployment), ("national_service_pct", pct)], "national_service_drawdown"),
    );
    country.macro_.unemployment = Some(new_unemployment);
    Ok(())
}

/// Mobilization intensity raises military spending share and personnel.
pub fn security_update(country: &mut CountryState, regimes: &Regimes, audit: &mut AuditJournal, code: &str) -> Result<()> {
    let intensity = regimes.number("security", "mobilization_intensity", 0.0);
    if intensity <= 0.0 {
        return Ok(());
    }
    if let Some(milex_gdp) = country.security.milex_gdp {
        let new_milex = milex_gdp + 0.02 * intensity;
        audit.record_change(
            format!("countries.{}.security.milex_gdp", code),
            Value::Number(milex_gdp),
            Value::Number(new_milex),
            "security_update",
            BTreeMap::new(),
            details(&[("milex_gdp", milex_gdp), ("mobilization_intensity", intensity)], "mobilization"),
        );
        country.security.milex_gdp = Some(new_milex);
    }
    if let Some(personnel) = country.security.personnel {
        let new_personnel = personnel + (intensity * 10000.0).round() as i64;
        audit.record_change(
            format!("countries.{}.security.personnel", code),
            Value::Integer(personnel),
            Value::Integer(new_personnel),
            "security_update",
            BTreeMap::new(),
            details(&[("personnel", personnel as f64), ("mobilization_intensity", intensity)], "mobilization"),
        );
        country.security.personnel = Some(new_personnel);
    }
    Ok(())
}

/// Half of the current-account balance is absorbed into reserves.
pub fn bop_settlement(country: &mut CountryState, _regimes: &Regimes, audit: &mut AuditJournal, code: &str) -> Result<()> {
    let (Some(ca_gdp), Some(gdp), Some(reserves)) = (
        country.external.current_account_gdp,
        country.macro_.gdp,
        country.external.reserves_usd,
    ) else {
        return Ok(());
    };
    let ca_usd = ca_gdp * gdp;
    let new_reserves = reserves + 0.5 * ca_usd;

    let path = format!("countries.{}.external.reserves_usd", code);
    audit.record_change(
        path,
        Value::Number(reserves),
        Value::Number(new_reserves),
        "bop_settlement",
        BTreeMap::new(),
        details(&[("current_account_gdp", ca_gdp), ("gdp", gdp), ("reserves_usd", reserves)], "bop_settlement"),
    );
    country.external.reserves_usd = Some(new_reserves);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{External, Macro};
    use chrono::Utc;

    fn country_with(macro_: Macro) -> CountryState {
        CountryState {
            macro_,
            ..Default::default()
        }
    }

    #[test]
    fn output_gap_skips_without_potential_gdp() {
        let mut country = country_with(Macro {
            gdp: Some(100.0),
            ..Default::default()
        });
        let regimes = Regimes::default();
        let mut audit = AuditJournal::open(1, Utc::now());
        output_gap_update(&mut country, &regimes, &mut audit, "USA").unwrap();
        assert!(audit.field_changes().is_empty());
    }

    #[test]
    fn output_gap_computes_when_both_present() {
        let mut country = country_with(Macro {
            gdp: Some(110.0),
            potential_gdp: Some(100.0),
            ..Default::default()
        });
        let regimes = Regimes::default();
        let mut audit = AuditJournal::open(1, Utc::now());
        output_gap_update(&mut country, &regimes, &mut audit, "USA").unwrap();
        assert_eq!(country.macro_.output_gap, Some(0.1));
    }

    #[test]
    fn inflation_suppresses_tiny_moves() {
        let mut country = country_with(Macro {
            inflation: Some(0.02),
            inflation_target: 0.02,
            ..Default::default()
        });
        let regimes = Regimes::default();
        let mut audit = AuditJournal::open(1, Utc::now());
        inflation_update(&mut country, &regimes, &mut audit, "USA").unwrap();
        assert!(audit.field_changes().is_empty());
        assert_eq!(country.macro_.inflation, Some(0.02));
    }

    #[test]
    fn taylor_rule_yields_to_prior_trigger_write() {
        let mut country = country_with(Macro {
            policy_rate: Some(0.0),
            inflation: Some(0.08),
            output_gap: Some(0.02),
            ..Default::default()
        });
        let regimes = Regimes::default();
        let mut audit = AuditJournal::open(1, Utc::now());
        audit.record_change(
            "countries.USA.macro.policy_rate",
            Value::Null,
            Value::Number(0.0),
            "trigger:emergency_cut",
            BTreeMap::new(),
            BTreeMap::new(),
        );
        monetary_policy_taylor(&mut country, &regimes, &mut audit, "USA").unwrap();
        assert_eq!(country.macro_.policy_rate, Some(0.0));
        assert!(audit
            .field_changes()
            .iter()
            .any(|c| c.field_path == "countries.USA.macro.policy_rate_taylor_rule_skipped"));
    }

    #[test]
    fn taylor_rule_raises_rate_under_high_inflation() {
        let mut country = country_with(Macro {
            policy_rate: Some(0.02),
            inflation: Some(0.08),
            output_gap: Some(0.0),
            ..Default::default()
        });
        let regimes = Regimes::default();
        let mut audit = AuditJournal::open(1, Utc::now());
        monetary_policy_taylor(&mut country, &regimes, &mut audit, "USA").unwrap();
        assert!(country.macro_.policy_rate.unwrap() > 0.08);
    }

    #[test]
    fn fx_peg_pulls_rate_toward_target() {
        let mut country = CountryState {
            macro_: Macro {
                policy_rate: Some(0.02),
                ..Default::default()
            },
            external: External {
                fx_rate: Some(1.2),
                ..Default::default()
            },
            ..Default::default()
        };
        let regimes = Regimes::default();
        let mut audit = AuditJournal::open(1, Utc::now());
        monetary_policy_fx_peg(&mut country, &regimes, &mut audit, "USA").unwrap();
        assert!(country.macro_.policy_rate.unwrap() > 0.02);
    }

    #[test]
    fn trade_update_applies_uniformly_and_skips_missing_shares() {
        let mut countries = BTreeMap::new();
        countries.insert(
            "USA".to_string(),
            CountryState {
                trade: crate::state::Trade {
                    exports_gdp: Some(0.1),
                    imports_gdp: Some(0.12),
                    tariff_mfn_avg: Some(0.03),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        countries.insert("ZZZ".to_string(), CountryState::default());
        let mut regimes = Regimes::default();
        regimes.trade.insert("tariff_multiplier".to_string(), Value::Number(2.0));
        let mut audit = AuditJournal::open(1, Utc::now());
        trade_update(&mut countries, &regimes, &mut audit);
        assert!(countries["USA"].trade.exports_gdp.unwrap() < 0.1);
        assert!(countries["ZZZ"].trade.exports_gdp.is_none());
    }

    #[test]
    fn security_update_rounds_personnel_delta() {
        let mut country = CountryState {
            security: crate::state::Security {
                milex_gdp: Some(0.02),
                personnel: Some(100_000),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut regimes = Regimes::default();
        regimes.security.insert("mobilization_intensity".to_string(), Value::Number(0.5));
        let mut audit = AuditJournal::open(1, Utc::now());
        security_update(&mut country, &regimes, &mut audit, "USA").unwrap();
        assert_eq!(country.security.personnel, Some(105_000));
    }
}
