//! Genetic-algorithm layer over the stigmergy simulation.
//!
//! Genomes are ordered lists of [`microrule::Microrule`]s. Each generation
//! every genome drives one colony rollout through [`rollout::GenomePolicy`],
//! the final lattice is scored against a [`fitness::TargetShape`], and the
//! usual trio of roulette selection, two-point crossover, and usage-aware
//! mutation breeds the next population.

pub mod driver;
pub mod fitness;
pub mod genome;
pub mod microrule;
pub mod rollout;
pub mod templates;

use thiserror::Error;

pub use driver::{Evaluated, EvolutionDriver, EvolveConfig, GenerationResult, select_parents};
pub use fitness::TargetShape;
pub use genome::Genome;
pub use microrule::{Microrule, PatternSlot};
pub use rollout::{GenomePolicy, RolloutOutcome, rollout};

/// Errors surfaced by genome construction and the GA driver.
#[derive(Debug, Error)]
pub enum EvolveError {
    /// Rejection sampling could not find a rotationally distinct rule.
    #[error("could not sample a rotationally distinct microrule after {attempts} attempts")]
    RuleSpaceExhausted { attempts: usize },
    #[error("invalid evolution configuration: {0}")]
    InvalidConfig(&'static str),
    #[error(transparent)]
    Colony(#[from] stigmergy_core::ColonyError),
}
