//! # Deterministic Economic Scenario Kernel
//!
//! A pure, deterministic kernel for simulating national-economy scenarios
//! turn by turn. A world is a typed [`state::GlobalState`] — one entry per
//! country across macro, external, finance, trade, energy/food, security
//! and sentiment slices, plus cross-country matrices for trade, alliances,
//! sanctions, interbank exposure and energy flows. Each turn, a list of
//! [`trigger::Trigger`]s is evaluated against the state and a fixed
//! sequence of ten reducers runs, producing a fully audited
//! [`audit::StepAudit`] of every field it touched.
//!
//! The kernel has no notion of HTTP, a database, or an ingestion pipeline —
//! those are host concerns that sit around [`engine::step`], not inside it.
//! What it does own is file I/O for scenario definitions
//! ([`config::ScenarioFile`]), invariant checking ([`invariant`]), and a
//! parallel batch runner for sweeping many independent scenarios at once
//! ([`batch`]).
//!
//! ## Quick Start
//!
//! ```
//! use econ_kernel::state::{CountryState, GlobalState, Macro};
//! use econ_kernel::engine::step;
//! use std::collections::{BTreeMap, BTreeSet};
//! use chrono::Utc;
//!
//! let state = GlobalState::new().with_country(
//!     "USA",
//!     CountryState {
//!         macro_: Macro {
//!             gdp: Some(100.0),
//!             potential_gdp: Some(98.0),
//!             inflation: Some(0.03),
//!             policy_rate: Some(0.02),
//!             ..Default::default()
//!         },
//!         ..Default::default()
//!     },
//! );
//!
//! let result = step(state, &[], BTreeSet::new(), BTreeMap::new(), Utc::now());
//! assert_eq!(result.new_state.t, 1);
//! ```
//!
//! ## Modules
//!
//! - [`value`] - tagged scalar value used for regime bags and audit records
//! - [`state`] - the typed world-state model (component C1)
//! - [`path`] - dotted-path resolution and mutation (component C3)
//! - [`condition`] - the boolean trigger-condition expression language (component C3)
//! - [`trigger`] - trigger evaluation and action application (component C4)
//! - [`audit`] - the per-step audit journal (component C2)
//! - [`reducers`] - the fixed reducer pipeline and implementation registry (component C5)
//! - [`reducer_formulas`] - the ten built-in reducer implementations (component C5)
//! - [`engine`] - the kernel's single pure public operation, `step`
//! - [`invariant`] - post-step invariant checking (component C6)
//! - [`config`] - scenario file I/O (component C7)
//! - [`batch`] - parallel batch runner for independent scenarios (component C9)
//! - [`completion`] - shell completion script generation for the CLI host
//! - [`error`] - the crate's error type

pub mod audit;
pub mod batch;
pub mod completion;
pub mod condition;
pub mod config;
pub mod engine;
pub mod error;
pub mod invariant;
pub mod path;
pub mod reducer_formulas;
pub mod reducers;
pub mod state;
pub mod trigger;
pub mod value;

pub use audit::{AuditJournal, FieldChange, StepAudit};
pub use config::ScenarioFile;
pub use engine::{step, StepResult};
pub use error::{KernelError, Result};
pub use invariant::{Invariant, InvariantChecker, InvariantViolation};
pub use path::PatchOp;
pub use reducers::REDUCER_SEQUENCE;
pub use state::GlobalState;
pub use trigger::Trigger;
pub use value::Value;

#[cfg(test)]
mod tests;
