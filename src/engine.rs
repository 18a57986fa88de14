//! The kernel's single public operation: `step` (§4.4, §4.5, §5).
//!
//! `step` is a pure function of its four inputs plus a caller-supplied
//! timestamp for audit metadata — no reducer or trigger consults the wall
//! clock for a state calculation. Two copies of state exist only for the
//! span of one call: `prospective` (read-only, `t+1`, used solely to
//! evaluate trigger conditions) and the live state that triggers and
//! reducers actually mutate.

use crate::audit::{AuditJournal, StepAudit};
use crate::reducers::run_pipeline;
use crate::state::GlobalState;
use crate::trigger::{expire_triggers, process_triggers, Trigger};
use chrono::{DateTime, Utc};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// Everything one `step` call produces: the advanced state, its audit
/// record, and the updated trigger bookkeeping the caller must thread
/// into the next call.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub new_state: GlobalState,
    pub audit: StepAudit,
    pub newly_fired: Vec<String>,
    pub newly_expired: Vec<String>,
    pub fired_set: BTreeSet<String>,
    pub fire_turn_map: BTreeMap<String, u64>,
}

/// Advances `state` by one timestep.
///
/// Order of operations, per the concurrency model: a prospective copy of
/// `state` with `t` already advanced is built solely so trigger
/// conditions can reference "the turn this step produces"; triggers then
/// apply their actions to the live state in list order; the fixed
/// reducer sequence runs; `t` increments for real; and finally any
/// triggers past their expiry window are dropped from the bookkeeping
/// maps. A missing base-currency country is the one fatal condition in
/// the error taxonomy — everything else, `step` absorbs into the
/// returned audit's error list and keeps going.
pub fn step(
    mut state: GlobalState,
    triggers: &[Trigger],
    mut fired_set: BTreeSet<String>,
    mut fire_turn_map: BTreeMap<String, u64>,
    now: DateTime<Utc>,
) -> StepResult {
    let mut audit = AuditJournal::open(state.t, now);
    debug!("opening step at t={} with {} triggers registered", state.t, triggers.len());

    let mut prospective = state.clone();
    prospective.t += 1;
    let new_turn = prospective.t;

    let newly_fired = process_triggers(
        &mut state,
        &prospective,
        triggers,
        &mut fired_set,
        &mut fire_turn_map,
        new_turn,
        &mut audit,
    );

    if let Err(e) = run_pipeline(&mut state, &mut audit) {
        audit.add_error(e.to_string());
    }

    let newly_expired = expire_triggers(triggers, &fire_turn_map, state.t);
    for name in &newly_expired {
        fire_turn_map.remove(name);
        fired_set.remove(name);
    }
    debug!(
        "closed step at t={}, {} field changes, {} errors",
        state.t,
        audit.field_changes().len(),
        audit.errors().len()
    );

    StepResult {
        new_state: state,
        audit: audit.finalize(now),
        newly_fired,
        newly_expired,
        fired_set,
        fire_turn_map,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PatchOp;
    use crate::state::{CountryState, Macro};
    use crate::trigger::{PolicyPatch, Trigger, TriggerAction, TriggerCondition};
    use crate::value::Value;

    fn base_state() -> GlobalState {
        GlobalState::new().with_country(
            "USA",
            CountryState {
                macro_: Macro {
                    gdp: Some(100.0),
                    potential_gdp: Some(98.0),
                    inflation: Some(0.03),
                    policy_rate: Some(0.02),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
    }

    #[test]
    fn step_advances_turn_and_returns_empty_bookkeeping_without_triggers() {
        let state = base_state();
        let result = step(state, &[], BTreeSet::new(), BTreeMap::new(), Utc::now());
        assert_eq!(result.new_state.t, 1);
        assert!(result.newly_fired.is_empty());
        assert!(result.newly_expired.is_empty());
    }

    #[test]
    fn trigger_action_applies_before_reducers_run_in_the_same_step() {
        let state = base_state();
        let triggers = vec![Trigger {
            name: "rate_cut".to_string(),
            description: None,
            condition: TriggerCondition {
                when: Some("t >= 1".to_string()),
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
        let result = step(state, &triggers, BTreeSet::new(), BTreeMap::new(), Utc::now());
        assert_eq!(result.newly_fired, vec!["rate_cut".to_string()]);
        // Taylor rule sees the trigger's write this step and yields to it.
        assert_eq!(result.new_state.countries["USA"].macro_.policy_rate, Some(0.0));
        assert!(result
            .audit
            .field_changes
            .iter()
            .any(|c| c.field_path == "countries.USA.macro.policy_rate_taylor_rule_skipped"));
        assert!(result.fired_set.contains("rate_cut"));
        assert_eq!(result.fire_turn_map.get("rate_cut"), Some(&1));
    }

    #[test]
    fn base_currency_missing_is_absorbed_into_audit_errors() {
        let mut state = GlobalState::new();
        state.base_ccy = "USD".to_string();
        let result = step(state, &[], BTreeSet::new(), BTreeMap::new(), Utc::now());
        assert!(result.audit.errors.iter().any(|e| e.contains("base currency")));
        assert_eq!(result.new_state.t, 0, "pipeline never ran, so t never advanced");
    }

    #[test]
    fn expired_triggers_drop_out_of_bookkeeping() {
        let state = base_state();
        let triggers = vec![Trigger {
            name: "temporary_measure".to_string(),
            description: None,
            condition: TriggerCondition {
                when: Some("".to_string()),
                once: true,
            },
            action: TriggerAction::default(),
            expires_after_turns: Some(1),
        }];
        let mut fired_set = BTreeSet::new();
        let mut fire_turn_map = BTreeMap::new();
        fired_set.insert("temporary_measure".to_string());
        fire_turn_map.insert("temporary_measure".to_string(), 0u64);

        let result = step(state, &triggers, fired_set, fire_turn_map, Utc::now());
        assert_eq!(result.newly_expired, vec!["temporary_measure".to_string()]);
        assert!(!result.fired_set.contains("temporary_measure"));
        assert!(!result.fire_turn_map.contains_key("temporary_measure"));
    }
}
