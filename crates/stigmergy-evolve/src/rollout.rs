//! Single-genome rollouts: wire a genome into a colony as its builder
//! policy, run it, and report the final lattice plus which rules fired.

use std::sync::{Arc, Mutex};

use stigmergy_core::{BuilderPolicy, Colony, Lattice, Material, Pos, SimulationConfig};
use tracing::trace;

use crate::EvolveError;
use crate::genome::Genome;
use crate::microrule::Microrule;

/// Builder policy driven by a genome: the first rule whose pattern matches
/// the agent's neighbourhood governs the decision, and it deposits only when
/// the local pheromone falls inside its activation window.
pub struct GenomePolicy {
    rules: Vec<Microrule>,
    fired: Arc<Mutex<Vec<bool>>>,
}

impl GenomePolicy {
    #[must_use]
    pub fn new(genome: &Genome) -> Self {
        let rules = genome.rules().to_vec();
        let fired = Arc::new(Mutex::new(vec![false; rules.len()]));
        Self { rules, fired }
    }

    /// Shared handle to the fired-flags buffer, for reading after the colony
    /// has consumed the policy.
    #[must_use]
    pub fn fired_handle(&self) -> Arc<Mutex<Vec<bool>>> {
        Arc::clone(&self.fired)
    }
}

impl BuilderPolicy for GenomePolicy {
    fn decide(&mut self, lattice: &Lattice, pos: Pos) -> Option<Material> {
        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.matches_pattern(lattice, pos) {
                continue;
            }
            // First matching rule governs, window or not.
            let level = lattice.pheromone(pos);
            if level >= rule.range_min && level <= rule.range_max {
                self.fired.lock().expect("fired flags poisoned")[index] = true;
                return Some(rule.deposit);
            }
            return None;
        }
        None
    }
}

/// Final state of one evaluated rollout.
#[derive(Debug)]
pub struct RolloutOutcome {
    pub lattice: Lattice,
    /// Per-rule fired flags, index-aligned with the genome.
    pub fired: Vec<bool>,
    pub steps_run: u64,
}

/// Runs `genome` for up to `max_steps` colony steps with the given seed.
/// Stops early once `idle_window` consecutive steps pass without a deposit;
/// with no deposits the lattice can only keep decaying toward its fixed
/// point, so the final structure is already determined.
pub fn rollout(
    genome: &Genome,
    base: &SimulationConfig,
    max_steps: u64,
    idle_window: u64,
    seed: u64,
) -> Result<RolloutOutcome, EvolveError> {
    let mut config = base.clone();
    config.rng_seed = Some(seed);
    config.history_capacity = 0;

    let policy = GenomePolicy::new(genome);
    let fired_handle = policy.fired_handle();
    let mut colony = Colony::with_policy(config, Box::new(policy))?;

    let mut steps_run = 0;
    let mut idle_steps = 0u64;
    for _ in 0..max_steps {
        let summary = colony.step();
        steps_run += 1;
        if summary.cells_placed > 0 {
            idle_steps = 0;
        } else {
            idle_steps += 1;
            if idle_window > 0 && idle_steps >= idle_window {
                trace!(steps_run, "rollout terminated early, construction stalled");
                break;
            }
        }
    }

    let fired = fired_handle.lock().expect("fired flags poisoned").clone();
    Ok(RolloutOutcome { lattice: colony.into_lattice(), fired, steps_run })
}
