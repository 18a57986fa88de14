//! Parallel batch runner (component C9, §5).
//!
//! §5 states that `step` is "re-entrant and safe to execute in parallel on
//! independent data" across distinct `GlobalState` values, since a step owns
//! its working copy for the duration of the call and touches no shared
//! mutable state besides the read-only reducer registry. This module
//! exploits that with `rayon`, fanning independent scenario runs out across
//! a thread pool. It never parallelizes *within* a single step — that would
//! violate the trigger-then-reducer and reducer-order guarantees of §5.

use crate::audit::StepAudit;
use crate::config::ScenarioFile;
use crate::engine::step;
use crate::state::GlobalState;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// The full trajectory of one independent scenario run: its final state and
/// the per-turn audits in step order.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub final_state: GlobalState,
    pub audits: Vec<StepAudit>,
}

/// Advances one scenario `turns` times, threading trigger bookkeeping
/// through each call the way a single-threaded host loop would.
fn run_one(scenario: &ScenarioFile, turns: usize, now: DateTime<Utc>) -> RunOutcome {
    let mut state = scenario.initial_state.clone();
    let mut fired_set = BTreeSet::new();
    let mut fire_turn_map = BTreeMap::new();
    let mut audits = Vec::with_capacity(turns);

    for _ in 0..turns {
        let result = step(state, &scenario.triggers, fired_set, fire_turn_map, now);
        state = result.new_state;
        fired_set = result.fired_set;
        fire_turn_map = result.fire_turn_map;
        audits.push(result.audit);
    }

    RunOutcome {
        final_state: state,
        audits,
    }
}

/// Advances every scenario in `scenarios` by `turns` steps, one scenario per
/// rayon task. Each scenario's own turns run sequentially (a step's
/// ordering guarantees are per-scenario, not global), but independent
/// scenarios run concurrently. `now` stamps every step's audit across every
/// run, matching the single-timestamp-per-batch-call convention the caller
/// (a host driving a Monte Carlo sweep) typically wants for a coherent
/// audit trail.
pub fn run_batch(scenarios: &[ScenarioFile], turns: usize, now: DateTime<Utc>) -> Vec<RunOutcome> {
    scenarios
        .par_iter()
        .map(|scenario| run_one(scenario, turns, now))
        .collect()
}

/// Runs the same scenario `replicas` times, varying only `rules.rng_seed`
/// per run (seed, seed+1, seed+2, ...). Since the kernel's reducers are
/// deterministic given state, this only produces distinct trajectories if
/// the caller's reducer implementations (registered via `register_reducer`)
/// actually consult `rules.rng_seed`; the built-in formulas are
/// seed-independent by design (§5: "no reducer consult... unseeded
/// randomness").
pub fn run_monte_carlo(
    scenario: &ScenarioFile,
    replicas: usize,
    base_seed: u64,
    turns: usize,
    now: DateTime<Utc>,
) -> Vec<RunOutcome> {
    (0..replicas)
        .into_par_iter()
        .map(|i| {
            let mut run = scenario.clone();
            run.initial_state.rules.rng_seed = base_seed + i as u64;
            run_one(&run, turns, now)
        })
        .collect()
}
