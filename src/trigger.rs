//! The trigger engine (component C4, §4.4).
//!
//! Holds trigger definitions; on each turn selects fireable triggers and
//! applies their action bundle against the live state. Once-only and
//! expiry bookkeeping is caller-owned — the engine takes and returns
//! `(fired_set, fire_turn_map)` so persistence stays external to the
//! kernel, per the design notes.

use crate::audit::AuditJournal;
use crate::condition::eval_condition;
use crate::path::{resolve_write, PatchOp};
use crate::state::{GlobalState, MatrixLayer};
use crate::value::Value;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyPatch {
    pub path: String,
    pub op: PatchOp,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducerOverride {
    pub target: String,
    pub impl_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRewrite {
    pub layer: MatrixLayer,
    pub edits: Vec<(String, String, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInject {
    pub kind: String,
    #[serde(default)]
    pub payload: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerAction {
    pub patches: Vec<PolicyPatch>,
    pub overrides: Vec<ReducerOverride>,
    pub network_rewrites: Vec<NetworkRewrite>,
    pub events: Vec<EventInject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerCondition {
    pub when: Option<String>,
    #[serde(default = "default_once")]
    pub once: bool,
}

fn default_once() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub condition: TriggerCondition,
    #[serde(default)]
    pub action: TriggerAction,
    #[serde(default)]
    pub expires_after_turns: Option<u64>,
}

fn apply_patch(
    live: &mut GlobalState,
    name: &str,
    patch: &PolicyPatch,
    audit: &mut AuditJournal,
) {
    match resolve_write(live, &patch.path, patch.op, &patch.value) {
        Ok((old, new)) => {
            let mut params = BTreeMap::new();
            params.insert("op".to_string(), Value::Text(format!("{:?}", patch.op).to_lowercase()));
            params.insert("value".to_string(), patch.value.clone());
            let mut details = BTreeMap::new();
            details.insert(
                "trigger_action".to_string(),
                Value::Text("policy_patch".to_string()),
            );
            audit.record_change(
                patch.path.clone(),
                old,
                new,
                format!("trigger:{}", name),
                params,
                details,
            );
        }
        Err(e) => {
            warn!("trigger '{}' patch error on '{}': {}", name, patch.path, e);
            audit.add_error(format!(
                "trigger '{}' patch error on '{}': {}",
                name, patch.path, e
            ));
        }
    }
}

fn apply_override(
    live: &mut GlobalState,
    name: &str,
    ov: &ReducerOverride,
    audit: &mut AuditJournal,
) {
    let old = live
        .rules
        .reducer_overrides
        .get(&ov.target)
        .cloned();
    live.rules
        .reducer_overrides
        .insert(ov.target.clone(), ov.impl_name.clone());
    let mut details = BTreeMap::new();
    details.insert(
        "trigger_action".to_string(),
        Value::Text("reducer_override".to_string()),
    );
    audit.record_change(
        format!("rules.reducer_overrides.{}", ov.target),
        Value::from(old),
        Value::Text(ov.impl_name.clone()),
        format!("trigger:{}", name),
        BTreeMap::new(),
        details,
    );
}

fn apply_network_rewrite(
    live: &mut GlobalState,
    name: &str,
    rewrite: &NetworkRewrite,
    audit: &mut AuditJournal,
) {
    for (from, to, weight) in &rewrite.edits {
        let old = live.get_matrix_edge(rewrite.layer, from, to);
        match live.set_matrix_edge(rewrite.layer, from, to, *weight) {
            Ok(()) => {
                let mut details = BTreeMap::new();
                details.insert(
                    "trigger_action".to_string(),
                    Value::Text("network_rewrite".to_string()),
                );
                details.insert("layer".to_string(), Value::Text(rewrite.layer.as_str().to_string()));
                audit.record_change(
                    format!("{}_matrix.{}.{}", rewrite.layer.as_str(), from, to),
                    Value::Number(old),
                    Value::Number(*weight),
                    format!("trigger:{}", name),
                    BTreeMap::new(),
                    details,
                );
            }
            Err(e) => {
                warn!(
                    "trigger '{}' network rewrite error on {}.{}->{}: {}",
                    name,
                    rewrite.layer.as_str(),
                    from,
                    to,
                    e
                );
                audit.add_error(format!(
                    "trigger '{}' network rewrite error on {}.{}->{}: {}",
                    name,
                    rewrite.layer.as_str(),
                    from,
                    to,
                    e
                ));
            }
        }
    }
}

fn apply_event_inject(
    live: &mut GlobalState,
    name: &str,
    inject: &EventInject,
    audit: &mut AuditJournal,
) {
    let injected_at = live.t;
    let index = live.events.pending.len();
    live.events.pending.push(crate::state::Event {
        kind: inject.kind.clone(),
        payload: inject.payload.clone(),
        injected_at_timestep: injected_at,
        status: "pending".to_string(),
    });
    let mut details = BTreeMap::new();
    details.insert(
        "trigger_action".to_string(),
        Value::Text("event_inject".to_string()),
    );
    audit.record_change(
        format!("events.pending[{}]", index),
        Value::Null,
        Value::Text(inject.kind.clone()),
        format!("trigger:{}", name),
        BTreeMap::new(),
        details,
    );
}

/// Evaluates and applies all fireable triggers, in list order, against
/// `live`. Condition evaluation reads `prospective` only. Returns the
/// names that newly fired this step.
pub fn process_triggers(
    live: &mut GlobalState,
    prospective: &GlobalState,
    triggers: &[Trigger],
    fired_set: &mut BTreeSet<String>,
    fire_turn_map: &mut BTreeMap<String, u64>,
    new_turn: u64,
    audit: &mut AuditJournal,
) -> Vec<String> {
    let mut newly_fired = Vec::new();
    for trigger in triggers {
        if trigger.condition.once && fired_set.contains(&trigger.name) {
            continue;
        }
        let when = trigger.condition.when.as_deref().unwrap_or("");
        let fires = match eval_condition(prospective, when) {
            Ok(result) => result,
            Err(e) => {
                warn!("trigger '{}' condition error: {}", trigger.name, e);
                audit.add_error(format!(
                    "trigger '{}' condition error: {}",
                    trigger.name, e
                ));
                false
            }
        };
        if !fires {
            continue;
        }
        debug!("trigger '{}' fired at t={}", trigger.name, new_turn);

        for patch in &trigger.action.patches {
            apply_patch(live, &trigger.name, patch, audit);
        }
        for ov in &trigger.action.overrides {
            apply_override(live, &trigger.name, ov, audit);
        }
        for rewrite in &trigger.action.network_rewrites {
            apply_network_rewrite(live, &trigger.name, rewrite, audit);
        }
        for inject in &trigger.action.events {
            apply_event_inject(live, &trigger.name, inject, audit);
        }

        audit.add_trigger_fired(&trigger.name);
        newly_fired.push(trigger.name.clone());
        if trigger.condition.once {
            fired_set.insert(trigger.name.clone());
        }
        fire_turn_map.entry(trigger.name.clone()).or_insert(new_turn);
    }
    newly_fired
}

/// Returns the names of triggers whose `expires_after_turns` has elapsed
/// as of `current_turn`. The caller removes them from `fire_turn_map` (and
/// `fired_set`, to let `once=true` triggers re-arm).
pub fn expire_triggers(
    triggers: &[Trigger],
    fire_turn_map: &BTreeMap<String, u64>,
    current_turn: u64,
) -> Vec<String> {
    triggers
        .iter()
        .filter_map(|t| {
            let expires_after = t.expires_after_turns?;
            let fired_at = *fire_turn_map.get(&t.name)?;
            if current_turn.saturating_sub(fired_at) >= expires_after {
                Some(t.name.clone())
            } else {
                None
            }
        })
        .collect()
}
