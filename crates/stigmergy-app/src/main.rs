//! Command-line entry points: plain colony runs and GA evolution.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use stigmergy_core::{Colony, SimulationConfig};
use stigmergy_evolve::{EvolutionDriver, EvolveConfig, TargetShape, rollout};
use stigmergy_storage::{SummaryRecorder, save_snapshot};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "stigmergy",
    about = "Stigmergic construction: swarm simulation and microrule evolution"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a fixed-behaviour colony and write the final lattice snapshot.
    Sim(SimArgs),
    /// Evolve microrule genomes against a target shape.
    Evolve(EvolveArgs),
}

#[derive(Args)]
struct WorldArgs {
    #[arg(long, default_value_t = 60)]
    width: usize,
    #[arg(long, default_value_t = 60)]
    height: usize,
    #[arg(long, default_value_t = 60)]
    depth: usize,
    #[arg(long, default_value_t = 300)]
    agents: usize,
    /// Queen cell as x,y,z; repeatable.
    #[arg(long = "queen", value_parser = parse_cell)]
    queens: Vec<(usize, usize, usize)>,
    #[arg(long)]
    seed: Option<u64>,
}

impl WorldArgs {
    fn to_config(&self) -> SimulationConfig {
        SimulationConfig {
            width: self.width,
            height: self.height,
            depth: self.depth,
            agent_count: self.agents,
            queen_cells: self.queens.clone(),
            rng_seed: self.seed,
            ..SimulationConfig::default()
        }
    }
}

#[derive(Args)]
struct SimArgs {
    #[command(flatten)]
    world: WorldArgs,
    #[arg(long, default_value_t = 3_000)]
    steps: u64,
    /// Final lattice snapshot destination.
    #[arg(long, default_value = "snapshot.json")]
    snapshot: PathBuf,
    /// Optional JSONL step-summary log.
    #[arg(long)]
    summaries: Option<PathBuf>,
}

#[derive(Args)]
struct EvolveArgs {
    #[command(flatten)]
    world: WorldArgs,
    #[arg(long, default_value_t = 30)]
    population: usize,
    #[arg(long, default_value_t = 100)]
    generations: u64,
    /// Microrules per genome.
    #[arg(long, default_value_t = 50)]
    rules: usize,
    /// Colony steps per rollout.
    #[arg(long, default_value_t = 3_000)]
    steps: u64,
    /// Deposit-free steps before a rollout stops early (0 disables).
    #[arg(long, default_value_t = 500)]
    idle_window: u64,
    /// Ring target centre as x,z; defaults to the lattice centre.
    #[arg(long, value_parser = parse_pair)]
    center: Option<(f32, f32)>,
    #[arg(long, default_value_t = 10.0)]
    radius: f32,
    /// Snapshot of the best genome's final build.
    #[arg(long, default_value = "best.json")]
    snapshot: PathBuf,
    /// Where the winning genome is written as JSON.
    #[arg(long, default_value = "genome.json")]
    genome: PathBuf,
}

fn parse_cell(raw: &str) -> Result<(usize, usize, usize), String> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 3 {
        return Err("expected x,y,z".into());
    }
    let parse = |s: &str| s.trim().parse::<usize>().map_err(|e| e.to_string());
    Ok((parse(parts[0])?, parse(parts[1])?, parse(parts[2])?))
}

fn parse_pair(raw: &str) -> Result<(f32, f32), String> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 2 {
        return Err("expected x,z".into());
    }
    let parse = |s: &str| s.trim().parse::<f32>().map_err(|e| e.to_string());
    Ok((parse(parts[0])?, parse(parts[1])?))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run_sim(args: SimArgs) -> Result<()> {
    let config = args.world.to_config();
    let mut colony = Colony::new(config).context("invalid simulation configuration")?;
    if let Some(path) = &args.summaries {
        let recorder =
            SummaryRecorder::create(path).context("failed to create summary log")?;
        colony.set_persistence(Box::new(recorder));
    }
    info!(steps = args.steps, "starting colony run");
    let last = colony.run(args.steps);
    colony.flush_persistence();
    info!(
        solid_cells = last.solid_cells,
        total_pheromone = last.total_pheromone,
        "run complete"
    );
    save_snapshot(&args.snapshot, colony.lattice()).context("failed to write snapshot")?;
    info!(path = %args.snapshot.display(), "snapshot written");
    Ok(())
}

fn run_evolve(args: EvolveArgs) -> Result<()> {
    let simulation = args.world.to_config();
    let (center_x, center_z) = args.center.unwrap_or((
        simulation.width as f32 / 2.0,
        simulation.depth as f32 / 2.0,
    ));
    let config = EvolveConfig {
        simulation,
        target: TargetShape::Ring { center_x, center_z, radius: args.radius },
        population_size: args.population,
        generations: args.generations,
        rule_count: args.rules,
        rollout_steps: args.steps,
        idle_window: args.idle_window,
        rng_seed: args.world.seed,
    };
    let mut driver = EvolutionDriver::new(config).context("invalid evolution configuration")?;
    info!(
        population = args.population,
        generations = args.generations,
        rules = args.rules,
        "starting evolution"
    );
    let mut last = None;
    for _ in 0..args.generations {
        last = Some(driver.run_generation().context("generation failed")?);
    }
    let last = last.context("generation count must be nonzero")?;
    let best = last.best_individual();
    info!(fitness = best.fitness, "evolution complete");

    let genome_file = std::fs::File::create(&args.genome)
        .with_context(|| format!("failed to create {}", args.genome.display()))?;
    serde_json::to_writer_pretty(genome_file, &best.genome)
        .context("failed to serialize best genome")?;
    info!(path = %args.genome.display(), "best genome written");

    // Re-run the winner with the evaluation seed to capture exactly the
    // build that earned its fitness.
    let outcome = rollout(
        &best.genome,
        &driver.config().simulation,
        driver.config().rollout_steps,
        driver.config().idle_window,
        driver.rollout_seed(),
    )
    .context("final showcase rollout failed")?;
    save_snapshot(&args.snapshot, &outcome.lattice).context("failed to write snapshot")?;
    info!(path = %args.snapshot.display(), "best build snapshot written");
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    match Cli::parse().command {
        Command::Sim(args) => run_sim(args),
        Command::Evolve(args) => run_evolve(args),
    }
}
