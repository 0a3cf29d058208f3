//! Generation loop: parallel rollouts, roulette selection, crossover,
//! mutation, and elitism.

use rand::Rng;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use stigmergy_core::SimulationConfig;
use tracing::info;

use crate::EvolveError;
use crate::fitness::{self, TargetShape};
use crate::genome::Genome;
use crate::rollout::rollout;

/// GA parameters wrapped around a base simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolveConfig {
    pub simulation: SimulationConfig,
    pub target: TargetShape,
    pub population_size: usize,
    pub generations: u64,
    /// Microrules per genome.
    pub rule_count: usize,
    /// Colony steps per rollout.
    pub rollout_steps: u64,
    /// Consecutive deposit-free steps before a rollout stops early; zero
    /// disables early exit.
    pub idle_window: u64,
    pub rng_seed: Option<u64>,
}

impl Default for EvolveConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            target: TargetShape::Ring { center_x: 30.0, center_z: 30.0, radius: 10.0 },
            population_size: 30,
            generations: 100,
            rule_count: 50,
            rollout_steps: 3_000,
            idle_window: 500,
            rng_seed: None,
        }
    }
}

impl EvolveConfig {
    pub fn validate(&self) -> Result<(), EvolveError> {
        if self.population_size < 2 {
            return Err(EvolveError::InvalidConfig("population_size must be at least 2"));
        }
        if self.rule_count == 0 {
            return Err(EvolveError::InvalidConfig("rule_count must be nonzero"));
        }
        if self.rollout_steps == 0 {
            return Err(EvolveError::InvalidConfig("rollout_steps must be nonzero"));
        }
        self.simulation.validate()?;
        Ok(())
    }
}

/// One genome with the fitness its rollout earned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluated {
    pub genome: Genome,
    pub fitness: f32,
}

/// Immutable record of a completed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub index: u64,
    pub evaluated: Vec<Evaluated>,
    /// Index of the best individual, first-found on ties.
    pub best: usize,
}

impl GenerationResult {
    #[must_use]
    pub fn best_individual(&self) -> &Evaluated {
        &self.evaluated[self.best]
    }
}

/// Drives the GA across generations.
pub struct EvolutionDriver {
    config: EvolveConfig,
    rng: SmallRng,
    /// Every rollout runs against the same simulation seed, so a genome's
    /// fitness is a pure function of its rules and elitism is exactly
    /// monotonic.
    rollout_seed: u64,
    population: Vec<Genome>,
    generation: u64,
    best_per_generation: Vec<f32>,
}

impl EvolutionDriver {
    pub fn new(config: EvolveConfig) -> Result<Self, EvolveError> {
        config.validate()?;
        let mut rng = match config.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        let rollout_seed = rng.random();
        let population = (0..config.population_size)
            .map(|_| Genome::random(config.rule_count, &mut rng))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            config,
            rng,
            rollout_seed,
            population,
            generation: 0,
            best_per_generation: Vec::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &EvolveConfig {
        &self.config
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Simulation seed shared by every evaluation rollout.
    #[must_use]
    pub fn rollout_seed(&self) -> u64 {
        self.rollout_seed
    }

    /// Best fitness observed in each completed generation.
    #[must_use]
    pub fn best_history(&self) -> &[f32] {
        &self.best_per_generation
    }

    /// Evaluates the current population and breeds its successor.
    pub fn run_generation(&mut self) -> Result<GenerationResult, EvolveError> {
        let seed = self.rollout_seed;
        let sim = &self.config.simulation;
        let steps = self.config.rollout_steps;
        let idle = self.config.idle_window;
        let target = &self.config.target;

        let evaluated: Vec<Evaluated> = self
            .population
            .par_iter()
            .map(|genome| {
                let outcome = rollout(genome, sim, steps, idle, seed)?;
                let fitness = fitness::score(&outcome.lattice, target);
                let mut genome = genome.clone();
                genome.apply_usage(&outcome.fired);
                Ok(Evaluated { genome, fitness })
            })
            .collect::<Result<Vec<_>, EvolveError>>()?;

        // First-found on ties.
        let mut best = 0;
        for (i, individual) in evaluated.iter().enumerate() {
            if individual.fitness > evaluated[best].fitness {
                best = i;
            }
        }

        let mut next = Vec::with_capacity(evaluated.len());
        for _ in 0..evaluated.len() {
            let (first, second) = select_parents(&evaluated, &mut self.rng);
            let child = evaluated[first]
                .genome
                .crossover(&evaluated[second].genome, &mut self.rng);
            next.push(child.mutate(&mut self.rng)?);
        }
        // Elitism: the best genome survives unmutated, usage cleared.
        let mut elite = evaluated[best].genome.clone();
        elite.clear_usage();
        next[best] = elite;
        self.population = next;

        self.generation += 1;
        let result = GenerationResult { index: self.generation, evaluated, best };
        let best_fitness = result.best_individual().fitness;
        self.best_per_generation.push(best_fitness);
        info!(
            generation = self.generation,
            best_fitness, best_index = best, "generation complete"
        );
        Ok(result)
    }

    /// Runs the configured number of generations, returning the last result.
    pub fn run(&mut self) -> Result<GenerationResult, EvolveError> {
        let mut last = None;
        for _ in 0..self.config.generations {
            last = Some(self.run_generation()?);
        }
        last.ok_or(EvolveError::InvalidConfig("generations must be nonzero"))
    }
}

/// Fitness-proportionate selection over strictly positive fitness. The first
/// parent is drawn from shares normalized to 100; the pool is then rebuilt
/// without it, shares renormalized over the remainder, and a second distinct
/// parent drawn. Degrades to duplicate (or zeroth) indices when fewer than
/// two individuals score positive.
pub fn select_parents(evaluated: &[Evaluated], rng: &mut SmallRng) -> (usize, usize) {
    let positive: Vec<(usize, f32)> = evaluated
        .iter()
        .enumerate()
        .filter(|(_, e)| e.fitness > 0.0)
        .map(|(i, e)| (i, e.fitness))
        .collect();
    match positive.len() {
        0 => (0, 0),
        1 => (positive[0].0, positive[0].0),
        _ => {
            let first = roulette(&positive, rng);
            let remainder: Vec<(usize, f32)> =
                positive.into_iter().filter(|&(i, _)| i != first).collect();
            (first, roulette(&remainder, rng))
        }
    }
}

fn roulette(pool: &[(usize, f32)], rng: &mut SmallRng) -> usize {
    let total: f32 = pool.iter().map(|&(_, f)| f).sum();
    let choice = rng.random_range(0.0f32..100.0);
    let mut accumulated = 0.0f32;
    for &(index, fitness) in pool {
        accumulated += 100.0 * fitness / total;
        if accumulated >= choice {
            return index;
        }
    }
    // Floating-point shortfall: fall back to the final entry.
    pool.last().map(|&(i, _)| i).unwrap_or(0)
}
