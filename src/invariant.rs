//! Invariant checking (component C6).
//!
//! Invariants are conditions that should hold after every `step` call.
//! A violation signals a bug in a reducer or trigger, not an expected
//! economic outcome — unlike the `bmp6`/`sfc_light` accounting flags
//! carried on `SimulationRules`, which this module does not interpret
//! (they're advisory metadata for downstream accounting consumers, not
//! something the kernel itself reconciles).
//!
//! # Example
//!
//! ```rust
//! use econ_kernel::invariant::{InvariantChecker, ZeroLowerBoundInvariant};
//! use econ_kernel::state::GlobalState;
//!
//! let checker = InvariantChecker::new(vec![Box::new(ZeroLowerBoundInvariant)]);
//! let state = GlobalState::new();
//! assert!(checker.check_all(&state, None).is_empty());
//! ```

use crate::audit::StepAudit;
use crate::state::GlobalState;
use std::fmt;

/// One failed invariant check.
#[derive(Debug, Clone, PartialEq)]
pub struct InvariantViolation {
    pub invariant_name: String,
    pub description: String,
    pub timestep: u64,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invariant '{}' violated at t={}: {}",
            self.invariant_name, self.timestep, self.description
        )?;
        if let (Some(expected), Some(actual)) = (&self.expected, &self.actual) {
            write!(f, " (expected: {}, actual: {})", expected, actual)?;
        }
        Ok(())
    }
}

impl std::error::Error for InvariantViolation {}

/// A single checkable condition over post-step state and (optionally) the
/// audit that produced it.
pub trait Invariant {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Checks `state` (and `audit`, if the caller has one) and returns any
    /// violations found. Most invariants return at most one.
    fn check(&self, state: &GlobalState, audit: Option<&StepAudit>) -> Vec<InvariantViolation>;
}

/// No policy rate may sit below zero — the zero lower bound.
pub struct ZeroLowerBoundInvariant;

impl Invariant for ZeroLowerBoundInvariant {
    fn name(&self) -> &str {
        "zero_lower_bound"
    }

    fn description(&self) -> &str {
        "policy_rate must never be negative"
    }

    fn check(&self, state: &GlobalState, _audit: Option<&StepAudit>) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        for (code, country) in &state.countries {
            if let Some(rate) = country.macro_.policy_rate {
                if rate < 0.0 {
                    violations.push(InvariantViolation {
                        invariant_name: self.name().to_string(),
                        description: format!("{} policy_rate is below zero", code),
                        timestep: state.t,
                        expected: Some(">= 0.0".to_string()),
                        actual: Some(rate.to_string()),
                    });
                }
            }
        }
        violations
    }
}

/// Unemployment can draw down via national-service mobilization but never
/// below the 0.01 floor the labor-supply reducer enforces.
pub struct UnemploymentFloorInvariant;

impl Invariant for UnemploymentFloorInvariant {
    fn name(&self) -> &str {
        "unemployment_floor"
    }

    fn description(&self) -> &str {
        "unemployment must never fall below 0.01"
    }

    fn check(&self, state: &GlobalState, _audit: Option<&StepAudit>) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        for (code, country) in &state.countries {
            if let Some(rate) = country.macro_.unemployment {
                if rate < 0.01 {
                    violations.push(InvariantViolation {
                        invariant_name: self.name().to_string(),
                        description: format!("{} unemployment fell below the 0.01 floor", code),
                        timestep: state.t,
                        expected: Some(">= 0.01".to_string()),
                        actual: Some(rate.to_string()),
                    });
                }
            }
        }
        violations
    }
}

/// `FieldChange::change_order` must run 0..N-1 with no gaps or repeats,
/// in the order the audit journal recorded them.
pub struct ChangeOrderContiguityInvariant;

impl Invariant for ChangeOrderContiguityInvariant {
    fn name(&self) -> &str {
        "change_order_contiguity"
    }

    fn description(&self) -> &str {
        "field_changes must carry a dense 0..N-1 change_order sequence"
    }

    fn check(&self, state: &GlobalState, audit: Option<&StepAudit>) -> Vec<InvariantViolation> {
        let Some(audit) = audit else {
            return Vec::new();
        };
        for (expected, change) in audit.field_changes.iter().enumerate() {
            if change.change_order != expected {
                return vec![InvariantViolation {
                    invariant_name: self.name().to_string(),
                    description: "change_order sequence has a gap or repeat".to_string(),
                    timestep: state.t,
                    expected: Some(expected.to_string()),
                    actual: Some(change.change_order.to_string()),
                }];
            }
        }
        Vec::new()
    }
}

/// `t` must advance by exactly one turn per completed step.
pub struct MonotonicTurnInvariant {
    pub previous_t: u64,
}

impl Invariant for MonotonicTurnInvariant {
    fn name(&self) -> &str {
        "monotonic_turn_advance"
    }

    fn description(&self) -> &str {
        "t must advance by exactly 1 relative to the previous state"
    }

    fn check(&self, state: &GlobalState, _audit: Option<&StepAudit>) -> Vec<InvariantViolation> {
        if state.t != self.previous_t + 1 {
            vec![InvariantViolation {
                invariant_name: self.name().to_string(),
                description: "t did not advance by exactly one turn".to_string(),
                timestep: state.t,
                expected: Some((self.previous_t + 1).to_string()),
                actual: Some(state.t.to_string()),
            }]
        } else {
            Vec::new()
        }
    }
}

/// A collection of invariants checked together after a step.
pub struct InvariantChecker {
    invariants: Vec<Box<dyn Invariant>>,
}

impl InvariantChecker {
    pub fn new(invariants: Vec<Box<dyn Invariant>>) -> Self {
        InvariantChecker { invariants }
    }

    /// The checks run by default: zero lower bound and the unemployment
    /// floor. Callers add
    /// `ChangeOrderContiguityInvariant`/`MonotonicTurnInvariant` themselves
    /// when they have an audit and a previous turn to compare against.
    pub fn default_checks() -> Self {
        InvariantChecker::new(vec![
            Box::new(ZeroLowerBoundInvariant),
            Box::new(UnemploymentFloorInvariant),
        ])
    }

    pub fn check_all(
        &self,
        state: &GlobalState,
        audit: Option<&StepAudit>,
    ) -> Vec<InvariantViolation> {
        self.invariants
            .iter()
            .flat_map(|inv| inv.check(state, audit))
            .collect()
    }
}
