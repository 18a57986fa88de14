//! The per-step audit journal (component C2, §4.2).
//!
//! A mutable buffer attached to a single step. The journal itself applies
//! no filtering — callers (reducers, the trigger engine) decide when a
//! mutation is significant enough to record.

use crate::value::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One audited mutation, in the order it was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field_path: String,
    pub old_value: Value,
    pub new_value: Value,
    pub reducer_name: String,
    pub reducer_params: BTreeMap<String, Value>,
    pub calculation_details: BTreeMap<String, Value>,
    pub change_order: usize,
}

/// The immutable record produced by `AuditJournal::finalize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepAudit {
    pub timestep: u64,
    pub step_start_time: DateTime<Utc>,
    pub step_end_time: DateTime<Utc>,
    pub reducer_sequence: Vec<String>,
    pub field_changes: Vec<FieldChange>,
    pub triggers_fired: Vec<String>,
    pub errors: Vec<String>,
}

/// The mutable journal a step writes into before being finalized.
#[derive(Debug, Clone)]
pub struct AuditJournal {
    timestep: u64,
    step_start_time: DateTime<Utc>,
    reducer_sequence: Vec<String>,
    field_changes: Vec<FieldChange>,
    triggers_fired: Vec<String>,
    errors: Vec<String>,
}

impl AuditJournal {
    /// Opens a new journal for `timestep`, stamping the start time as `now`.
    /// `now` is supplied by the caller (the kernel never reads the wall
    /// clock itself, to keep `step` a pure function of its inputs).
    pub fn open(timestep: u64, now: DateTime<Utc>) -> Self {
        AuditJournal {
            timestep,
            step_start_time: now,
            reducer_sequence: Vec::new(),
            field_changes: Vec::new(),
            triggers_fired: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Appends a FieldChange with the next `change_order`.
    #[allow(clippy::too_many_arguments)]
    pub fn record_change(
        &mut self,
        field_path: impl Into<String>,
        old_value: Value,
        new_value: Value,
        reducer_name: impl Into<String>,
        reducer_params: BTreeMap<String, Value>,
        calculation_details: BTreeMap<String, Value>,
    ) {
        let change_order = self.field_changes.len();
        self.field_changes.push(FieldChange {
            field_path: field_path.into(),
            old_value,
            new_value,
            reducer_name: reducer_name.into(),
            reducer_params,
            calculation_details,
            change_order,
        });
    }

    /// Appends `name` to `reducer_sequence` if not already present,
    /// preserving first-occurrence order.
    pub fn add_reducer(&mut self, name: &str) {
        if !self.reducer_sequence.iter().any(|n| n == name) {
            self.reducer_sequence.push(name.to_string());
        }
    }

    /// Appends `name` to `triggers_fired`, deduplicated.
    pub fn add_trigger_fired(&mut self, name: &str) {
        if !self.triggers_fired.iter().any(|n| n == name) {
            self.triggers_fired.push(name.to_string());
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn field_changes(&self) -> &[FieldChange] {
        &self.field_changes
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn triggers_fired(&self) -> &[String] {
        &self.triggers_fired
    }

    /// Returns true if a FieldChange targeting `field_path` has already
    /// been recorded this step — used by `monetary_policy: taylor`'s
    /// trigger-priority check.
    pub fn has_change_at(&self, field_path: &str) -> bool {
        self.field_changes
            .iter()
            .any(|c| c.field_path == field_path)
    }

    /// Stamps `step_end_time` and yields the immutable `StepAudit`.
    pub fn finalize(self, now: DateTime<Utc>) -> StepAudit {
        StepAudit {
            timestep: self.timestep,
            step_start_time: self.step_start_time,
            step_end_time: now,
            reducer_sequence: self.reducer_sequence,
            field_changes: self.field_changes,
            triggers_fired: self.triggers_fired,
            errors: self.errors,
        }
    }
}
