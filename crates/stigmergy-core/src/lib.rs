//! Deterministic stigmergic construction simulation.
//!
//! A [`Colony`] owns a [`Lattice`] of materials, agent counts, and a
//! double-buffered pheromone field. Each step moves every agent, lets each
//! agent attempt a material deposit through a pluggable [`BuilderPolicy`],
//! refreshes queen-cell pheromone emission, and runs one diffusion step.
//! Everything downstream of the configured seed is reproducible.

pub mod diffusion;
pub mod lattice;
pub mod rules;

use std::collections::VecDeque;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use diffusion::{DEFAULT_ALPHA, DEFAULT_DECAY, DiffusionEngine};
pub use lattice::{Dims, Lattice, LatticeError, Material, Pos};
pub use rules::{ConstructionRules, MoveDecision};

/// Pheromone level written at every queen cell each step.
pub const QUEEN_EMISSION: f32 = 5.0;

/// Errors surfaced by colony construction and stepping.
#[derive(Debug, Error)]
pub enum ColonyError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error(transparent)]
    Lattice(#[from] LatticeError),
}

/// Simulation parameters. `validate` is called by [`Colony::new`]; standalone
/// use should call it after hand-editing fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    pub agent_count: usize,
    /// Cells seeded with queen material before the first step.
    pub queen_cells: Vec<(usize, usize, usize)>,
    /// Chance per agent per step of attempting a deposit.
    pub placement_probability: f32,
    pub diffusion_alpha: f32,
    pub pheromone_decay: f32,
    pub queen_emission: f32,
    /// `None` draws a seed from the OS for non-reproducible runs.
    pub rng_seed: Option<u64>,
    /// Step summaries retained in the in-memory history ring.
    pub history_capacity: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: 60,
            height: 60,
            depth: 60,
            agent_count: 300,
            queen_cells: Vec::new(),
            placement_probability: 0.1,
            diffusion_alpha: DEFAULT_ALPHA,
            pheromone_decay: DEFAULT_DECAY,
            queen_emission: QUEEN_EMISSION,
            rng_seed: None,
            history_capacity: 256,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ColonyError> {
        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return Err(ColonyError::InvalidConfig("lattice extents must be nonzero"));
        }
        if !(0.0..=1.0).contains(&self.placement_probability) {
            return Err(ColonyError::InvalidConfig(
                "placement_probability must lie in [0, 1]",
            ));
        }
        if !(self.diffusion_alpha > 0.0 && self.diffusion_alpha <= 1.0 / 6.0) {
            return Err(ColonyError::InvalidConfig(
                "diffusion_alpha must lie in (0, 1/6] for a stable scheme",
            ));
        }
        if !(self.pheromone_decay > 0.0 && self.pheromone_decay <= 1.0) {
            return Err(ColonyError::InvalidConfig(
                "pheromone_decay must lie in (0, 1]",
            ));
        }
        if self.queen_emission < 0.0 {
            return Err(ColonyError::InvalidConfig("queen_emission must be non-negative"));
        }
        let dims = self.dims();
        for &(x, y, z) in &self.queen_cells {
            if !dims.contains(x, y, z) {
                return Err(ColonyError::InvalidConfig("queen cell outside lattice extents"));
            }
        }
        let ring = rules::ConstructionRules::new(dims);
        let free = ring
            .spawn_ring()
            .iter()
            .filter(|p| !self.queen_cells.contains(&(p.x, p.y, p.z)))
            .count();
        if self.agent_count > free {
            return Err(ColonyError::InvalidConfig(
                "more agents requested than free outer-ring spawn cells",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn dims(&self) -> Dims {
        Dims::new(self.width, self.height, self.depth)
    }

    /// RNG seeded from the configured seed, or from OS entropy when absent.
    #[must_use]
    pub fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        }
    }
}

/// Monotonic step counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Tick(pub u64);

impl Tick {
    #[must_use]
    pub fn next(self) -> Tick {
        Tick(self.0 + 1)
    }
}

/// Per-step aggregate metrics, pushed into the colony history and forwarded
/// to the persistence sink.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    pub tick: Tick,
    pub agent_count: u32,
    pub cells_placed: usize,
    pub respawns: usize,
    pub solid_cells: usize,
    pub total_pheromone: f32,
}

/// Sink for step summaries. The storage crate provides a JSONL-backed
/// implementation; [`NullPersistence`] discards everything.
pub trait ColonyPersistence: Send {
    fn record_step(&mut self, summary: &StepSummary);
    fn flush(&mut self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullPersistence;

impl ColonyPersistence for NullPersistence {
    fn record_step(&mut self, _summary: &StepSummary) {}
}

/// Decides whether the agent standing at `pos` deposits material.
///
/// The colony consults the policy only after the placement-probability draw
/// and the geometric predicates have both passed, and always writes the
/// returned material, so a `Some` return means the deposit happened.
pub trait BuilderPolicy: Send {
    fn decide(&mut self, lattice: &Lattice, pos: Pos) -> Option<Material>;
}

/// Fixed-behaviour policy: always deposit cement wherever geometry allows.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBookPolicy;

impl BuilderPolicy for RuleBookPolicy {
    fn decide(&mut self, _lattice: &Lattice, _pos: Pos) -> Option<Material> {
        Some(Material::Cement)
    }
}

/// The simulation runner: lattice plus agents plus the step pipeline.
pub struct Colony {
    config: SimulationConfig,
    lattice: Lattice,
    rules: ConstructionRules,
    diffusion: DiffusionEngine,
    policy: Box<dyn BuilderPolicy>,
    persistence: Box<dyn ColonyPersistence>,
    rng: SmallRng,
    tick: Tick,
    queen_cells: Vec<Pos>,
    history: VecDeque<StepSummary>,
}

impl Colony {
    pub fn new(config: SimulationConfig) -> Result<Self, ColonyError> {
        Self::with_policy(config, Box::new(RuleBookPolicy))
    }

    pub fn with_policy(
        config: SimulationConfig,
        policy: Box<dyn BuilderPolicy>,
    ) -> Result<Self, ColonyError> {
        config.validate()?;
        let mut rng = config.seeded_rng();
        let mut lattice = Lattice::new(config.dims())?;
        let queen_cells: Vec<Pos> = config
            .queen_cells
            .iter()
            .map(|&(x, y, z)| Pos::new(x, y, z))
            .collect();
        for &pos in &queen_cells {
            lattice.set_material(pos, Material::Queen);
        }
        let rules = ConstructionRules::new(config.dims());
        // Scatter agents across the spawn ring, one per cell, skipping cells
        // that already hold an agent or material.
        let mut spawned = 0;
        while spawned < config.agent_count {
            let pos = rules.spawn_cell(&mut rng);
            if lattice.agents_at(pos) == 0 && lattice.material(pos) == Material::Empty {
                lattice.add_agent(pos);
                spawned += 1;
            }
        }
        let diffusion = DiffusionEngine::new(config.diffusion_alpha, config.pheromone_decay);
        let history_capacity = config.history_capacity;
        Ok(Self {
            config,
            lattice,
            rules,
            diffusion,
            policy,
            persistence: Box::new(NullPersistence),
            rng,
            tick: Tick::default(),
            queen_cells,
            history: VecDeque::with_capacity(history_capacity),
        })
    }

    pub fn set_policy(&mut self, policy: Box<dyn BuilderPolicy>) {
        self.policy = policy;
    }

    pub fn set_persistence(&mut self, persistence: Box<dyn ColonyPersistence>) {
        self.persistence = persistence;
    }

    pub fn flush_persistence(&mut self) {
        self.persistence.flush();
    }

    /// Advances the simulation one step: movement, placement, queen emission,
    /// diffusion, bookkeeping.
    pub fn step(&mut self) -> StepSummary {
        let respawns = self.stage_moves();
        let cells_placed = self.stage_placements();
        self.stage_queen_emission();
        self.diffusion.step(&mut self.lattice);

        self.tick = self.tick.next();
        let summary = StepSummary {
            tick: self.tick,
            agent_count: self.lattice.agent_count(),
            cells_placed,
            respawns,
            solid_cells: self.lattice.solid_count(),
            total_pheromone: self.lattice.total_pheromone(),
        };
        if self.history.len() == self.config.history_capacity && self.config.history_capacity > 0 {
            self.history.pop_front();
        }
        if self.config.history_capacity > 0 {
            self.history.push_back(summary);
        }
        self.persistence.record_step(&summary);
        debug!(
            tick = self.tick.0,
            cells_placed, respawns, solid = summary.solid_cells, "colony step"
        );
        summary
    }

    /// Runs `steps` consecutive steps, returning the last summary.
    pub fn run(&mut self, steps: u64) -> StepSummary {
        let mut last = StepSummary {
            tick: self.tick,
            agent_count: self.lattice.agent_count(),
            cells_placed: 0,
            respawns: 0,
            solid_cells: self.lattice.solid_count(),
            total_pheromone: self.lattice.total_pheromone(),
        };
        for _ in 0..steps {
            last = self.step();
        }
        last
    }

    /// Moves every agent once, in deterministic scan order over the snapshot
    /// of positions taken before any agent moves.
    fn stage_moves(&mut self) -> usize {
        let mut respawns = 0;
        for pos in self.lattice.agent_positions() {
            let decision = self.rules.try_move(&self.lattice, pos, &mut self.rng);
            // The agent is guaranteed present: positions were snapshotted and
            // moves only reposition agents.
            self.lattice
                .remove_agent(pos)
                .unwrap_or_else(|err| unreachable!("agent vanished mid-move: {err}"));
            self.lattice.add_agent(decision.destination());
            if matches!(decision, MoveDecision::Respawned(_)) {
                respawns += 1;
            }
        }
        respawns
    }

    /// Gives every agent one placement attempt at its post-move position. A
    /// successful deposit completes the agent's life cycle.
    fn stage_placements(&mut self) -> usize {
        let mut placed = 0;
        for pos in self.lattice.agent_positions() {
            if self.lattice.material(pos) != Material::Empty {
                continue;
            }
            if self.rng.random::<f32>() >= self.config.placement_probability {
                continue;
            }
            if !self.rules.placement_admissible(&self.lattice, pos) {
                continue;
            }
            if let Some(material) = self.policy.decide(&self.lattice, pos) {
                self.lattice.set_material(pos, material);
                let spawn = self.rules.spawn_cell(&mut self.rng);
                self.lattice
                    .remove_agent(pos)
                    .unwrap_or_else(|err| unreachable!("agent vanished mid-placement: {err}"));
                self.lattice.add_agent(spawn);
                placed += 1;
            }
        }
        placed
    }

    /// Queen cells hold their emission level at the start of every diffusion
    /// step.
    fn stage_queen_emission(&mut self) {
        for &pos in &self.queen_cells {
            self.lattice.set_pheromone(pos, self.config.queen_emission);
        }
    }

    #[must_use]
    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    #[must_use]
    pub fn tick(&self) -> Tick {
        self.tick
    }

    #[must_use]
    pub fn history(&self) -> &VecDeque<StepSummary> {
        &self.history
    }

    /// Hands the final lattice back when the run is over.
    #[must_use]
    pub fn into_lattice(self) -> Lattice {
        self.lattice
    }
}
