use criterion::{Criterion, criterion_group, criterion_main};
use stigmergy_core::{Colony, SimulationConfig};

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn bench_colony_step(c: &mut Criterion) {
    let extent = env_usize("STIGMERGY_BENCH_EXTENT", 30);
    let agents = env_usize("STIGMERGY_BENCH_AGENTS", 60);
    let config = SimulationConfig {
        width: extent,
        height: extent,
        depth: extent,
        agent_count: agents,
        queen_cells: vec![(extent / 2, 0, extent / 2)],
        rng_seed: Some(0xC0DE),
        ..SimulationConfig::default()
    };
    let mut colony = Colony::new(config).expect("bench config must validate");

    c.bench_function("colony_step", |b| {
        b.iter(|| {
            std::hint::black_box(colony.step());
        });
    });
}

criterion_group!(benches, bench_colony_step);
criterion_main!(benches);
