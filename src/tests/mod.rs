//! End-to-end scenarios driving the public `step` contract across several
//! turns, plus property tests over arbitrary country counts.

use crate::path::PatchOp;
use crate::state::{CountryState, GlobalState, Macro, MatrixLayer, Trade};
use crate::step;
use crate::trigger::{NetworkRewrite, PolicyPatch, Trigger, TriggerAction, TriggerCondition};
use crate::value::Value;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};

fn run_n(
    mut state: GlobalState,
    triggers: &[Trigger],
    turns: usize,
) -> (GlobalState, Vec<crate::StepAudit>, Vec<Vec<String>>, Vec<Vec<String>>) {
    let mut fired_set = BTreeSet::new();
    let mut fire_turn_map = BTreeMap::new();
    let now = Utc::now();
    let mut audits = Vec::with_capacity(turns);
    let mut newly_fired = Vec::with_capacity(turns);
    let mut newly_expired = Vec::with_capacity(turns);

    for _ in 0..turns {
        let result = step(state, triggers, fired_set, fire_turn_map, now);
        state = result.new_state;
        fired_set = result.fired_set;
        fire_turn_map = result.fire_turn_map;
        audits.push(result.audit);
        newly_fired.push(result.newly_fired);
        newly_expired.push(result.newly_expired);
    }

    (state, audits, newly_fired, newly_expired)
}

#[test]
fn taylor_responds_to_inflation_gap() {
    let state = GlobalState::new().with_country(
        "USA",
        CountryState {
            macro_: Macro {
                gdp: Some(100.0),
                potential_gdp: Some(100.0),
                inflation: Some(0.08),
                policy_rate: Some(0.02),
                neutral_rate: Some(0.025),
                inflation_target: 0.02,
                output_gap: Some(0.0),
                ..Default::default()
            },
            ..Default::default()
        },
    );

    let (final_state, _, _, _) = run_n(state, &[], 10);

    let final_rate = final_state.countries["USA"].macro_.policy_rate.unwrap();
    let final_inflation = final_state.countries["USA"].macro_.inflation.unwrap();

    assert!(
        (final_inflation - 0.02).abs() < (0.08_f64 - 0.02).abs(),
        "inflation should have closed toward target: {final_inflation}"
    );
    assert!(
        final_rate > 0.02 + 0.02,
        "policy rate should have tightened well above its starting point: {final_rate}"
    );
}

#[test]
fn emergency_rate_cut_trigger_beats_taylor() {
    let state = GlobalState::new().with_country(
        "USA",
        CountryState {
            macro_: Macro {
                gdp: Some(100.0),
                potential_gdp: Some(100.0),
                inflation: Some(0.08),
                policy_rate: Some(0.02),
                neutral_rate: Some(0.025),
                inflation_target: 0.02,
                output_gap: Some(0.0),
                ..Default::default()
            },
            ..Default::default()
        },
    );

    let triggers = vec![Trigger {
        name: "emergency_cut".to_string(),
        description: None,
        condition: TriggerCondition {
            when: Some("t >= 3".to_string()),
            once: true,
        },
        action: TriggerAction {
            patches: vec![PolicyPatch {
                path: "countries.USA.macro.policy_rate".to_string(),
                op: PatchOp::Set,
                value: Value::Number(0.0),
            }],
            ..Default::default()
        },
        expires_after_turns: None,
    }];

    let (final_state, audits, newly_fired, _) = run_n(state, &triggers, 3);

    assert_eq!(newly_fired[2], vec!["emergency_cut".to_string()]);
    assert_eq!(final_state.countries["USA"].macro_.policy_rate, Some(0.0));

    let third_step = &audits[2];
    let rate_changes: Vec<_> = third_step
        .field_changes
        .iter()
        .filter(|c| c.field_path == "countries.USA.macro.policy_rate")
        .collect();
    assert_eq!(rate_changes.len(), 1);
    assert_eq!(rate_changes[0].reducer_name, "trigger:emergency_cut");

    assert!(third_step
        .field_changes
        .iter()
        .any(|c| c.field_path == "countries.USA.macro.policy_rate_taylor_rule_skipped"));
}

#[test]
fn tariff_escalation_reduces_trade() {
    let state = GlobalState::new()
        .with_country(
            "USA",
            CountryState {
                trade: Trade {
                    exports_gdp: Some(0.1),
                    imports_gdp: Some(0.12),
                    tariff_mfn_avg: Some(0.03),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .with_country(
            "CHN",
            CountryState {
                trade: Trade {
                    exports_gdp: Some(0.2),
                    imports_gdp: Some(0.18),
                    tariff_mfn_avg: Some(0.04),
                    ..Default::default()
                },
                ..Default::default()
            },
        );

    let triggers = vec![Trigger {
        name: "tariff_escalation".to_string(),
        description: None,
        condition: TriggerCondition {
            when: Some("t >= 2".to_string()),
            once: true,
        },
        action: TriggerAction {
            patches: vec![PolicyPatch {
                path: "rules.regimes.trade.tariff_multiplier".to_string(),
                op: PatchOp::Set,
                value: Value::Number(2.0),
            }],
            ..Default::default()
        },
        expires_after_turns: None,
    }];

    let (_, audits, newly_fired, _) = run_n(state, &triggers, 5);

    assert_eq!(newly_fired[1], vec!["tariff_escalation".to_string()]);

    let mut prev_usa_exports = None;
    let mut prev_chn_exports = None;
    for (i, audit) in audits.iter().enumerate().skip(1) {
        let usa_exports = audit
            .field_changes
            .iter()
            .find(|c| c.field_path == "countries.USA.trade.exports_gdp")
            .and_then(|c| c.new_value.as_f64());
        let chn_exports = audit
            .field_changes
            .iter()
            .find(|c| c.field_path == "countries.CHN.trade.exports_gdp")
            .and_then(|c| c.new_value.as_f64());

        if i >= 1 {
            if let (Some(prev), Some(cur)) = (prev_usa_exports, usa_exports) {
                assert!(cur <= prev, "USA exports should not increase post-escalation at step {i}");
            }
            if let (Some(prev), Some(cur)) = (prev_chn_exports, chn_exports) {
                assert!(cur <= prev, "CHN exports should not increase post-escalation at step {i}");
            }
        }
        prev_usa_exports = usa_exports.or(prev_usa_exports);
        prev_chn_exports = chn_exports.or(prev_chn_exports);
    }
}

#[test]
fn network_rewrite_applies_sanctions() {
    let state = GlobalState::new()
        .with_country("USA", CountryState::default())
        .with_country("RUS", CountryState::default())
        .with_country("EU27", CountryState::default());

    let triggers = vec![Trigger {
        name: "sanctions_package".to_string(),
        description: None,
        condition: TriggerCondition {
            when: Some("t >= 1".to_string()),
            once: true,
        },
        action: TriggerAction {
            network_rewrites: vec![NetworkRewrite {
                layer: MatrixLayer::Sanctions,
                edits: vec![
                    ("USA".to_string(), "RUS".to_string(), 0.8),
                    ("EU27".to_string(), "RUS".to_string(), 0.6),
                ],
            }],
            ..Default::default()
        },
        expires_after_turns: None,
    }];

    let (final_state, audits, newly_fired, _) = run_n(state, &triggers, 1);

    assert_eq!(newly_fired[0], vec!["sanctions_package".to_string()]);
    assert_eq!(final_state.get_matrix_edge(MatrixLayer::Sanctions, "USA", "RUS"), 0.8);
    assert_eq!(final_state.get_matrix_edge(MatrixLayer::Sanctions, "EU27", "RUS"), 0.6);

    let changes = &audits[0].field_changes;
    assert!(changes.iter().any(|c| c.field_path == "sanctions_matrix.USA.RUS"));
    assert!(changes.iter().any(|c| c.field_path == "sanctions_matrix.EU27.RUS"));
}

#[test]
fn sunset_policy_expires_after_its_window() {
    let state = GlobalState::new().with_country("USA", CountryState::default());

    let triggers = vec![Trigger {
        name: "temporary_tariff_holiday".to_string(),
        description: None,
        condition: TriggerCondition {
            when: Some("t >= 1".to_string()),
            once: true,
        },
        action: TriggerAction::default(),
        expires_after_turns: Some(4),
    }];

    let (_, _, newly_fired, newly_expired) = run_n(state, &triggers, 5);

    assert_eq!(newly_fired[0], vec!["temporary_tariff_holiday".to_string()]);
    assert_eq!(newly_expired[4], vec!["temporary_tariff_holiday".to_string()]);
}

#[test]
fn missing_base_currency_country_is_fatal_to_the_pipeline() {
    let mut state = GlobalState::new();
    state.base_ccy = "USD".to_string();

    let (final_state, audits, _, _) = run_n(state, &[], 1);

    assert_eq!(final_state.t, 0, "the pipeline never ran, so t never advanced");
    assert!(audits[0].errors.iter().any(|e| e.contains("base currency")));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn policy_rate_never_goes_negative_under_taylor(
            inflation in -0.05_f64..0.2,
            policy_rate in 0.0_f64..0.1,
            steps in 1usize..20,
        ) {
            let state = GlobalState::new().with_country(
                "USA",
                CountryState {
                    macro_: Macro {
                        gdp: Some(100.0),
                        potential_gdp: Some(100.0),
                        inflation: Some(inflation),
                        policy_rate: Some(policy_rate),
                        neutral_rate: Some(0.025),
                        inflation_target: 0.02,
                        output_gap: Some(0.0),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            );

            let (final_state, _, _, _) = run_n(state, &[], steps);
            let final_rate = final_state.countries["USA"].macro_.policy_rate.unwrap();
            prop_assert!(final_rate >= 0.0);
        }

        #[test]
        fn t_advances_by_exactly_one_per_step_when_base_currency_present(
            steps in 1usize..15,
        ) {
            let state = GlobalState::new().with_country("USA", CountryState::default());
            let (final_state, _, _, _) = run_n(state, &[], steps);
            prop_assert_eq!(final_state.t, steps as u64);
        }
    }
}
