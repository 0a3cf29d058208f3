//! End-to-end colony behaviour over longer runs.

use stigmergy_core::{Colony, Material, Pos, SimulationConfig};

fn config(seed: u64) -> SimulationConfig {
    SimulationConfig {
        width: 14,
        height: 8,
        depth: 14,
        agent_count: 12,
        queen_cells: vec![(7, 0, 7)],
        placement_probability: 0.25,
        rng_seed: Some(seed),
        ..SimulationConfig::default()
    }
}

#[test]
fn long_seeded_runs_match_exactly() {
    let mut a = Colony::new(config(2024)).unwrap();
    let mut b = Colony::new(config(2024)).unwrap();
    for _ in 0..300 {
        let sa = a.step();
        let sb = b.step();
        assert_eq!(sa, sb);
    }
    assert_eq!(a.lattice(), b.lattice());
}

#[test]
fn golden_small_world_run_is_pinned() {
    // Reference scenario with hand-captured outputs: any behavioural drift
    // in movement, placement, emission, or diffusion shifts these constants.
    let config = SimulationConfig {
        width: 10,
        height: 10,
        depth: 10,
        agent_count: 1,
        queen_cells: vec![(5, 0, 5)],
        rng_seed: Some(42),
        ..SimulationConfig::default()
    };
    let mut colony = Colony::new(config).unwrap();
    for _ in 0..200 {
        colony.step();
    }
    assert_eq!(colony.lattice().solid_count(), 20);
    assert_eq!(colony.lattice().agent_positions(), vec![Pos::new(8, 0, 3)]);
}

#[test]
fn structure_grows_from_the_floor_up() {
    let mut colony = Colony::new(config(5)).unwrap();
    for _ in 0..400 {
        colony.step();
    }
    let lattice = colony.lattice();
    assert!(lattice.solid_count() > 1, "expected deposits beyond the queen cell");
    // Every cement cell must trace support: floor level, or adjacent to some
    // other solid cell (the geometric predicates forbid free-floating blocks).
    let dims = lattice.dims();
    for x in 0..dims.width {
        for y in 1..dims.height {
            for z in 0..dims.depth {
                if lattice.material(Pos::new(x, y, z)) != Material::Cement {
                    continue;
                }
                let mut attached = false;
                for (dx, dy, dz) in
                    [(1i64, 0i64, 0i64), (-1, 0, 0), (0, 1, 0), (0, -1, 0), (0, 0, 1), (0, 0, -1)]
                {
                    if lattice
                        .observed_material(x as i64 + dx, y as i64 + dy, z as i64 + dz)
                        .is_solid()
                    {
                        attached = true;
                        break;
                    }
                }
                assert!(attached, "floating cement at ({x}, {y}, {z})");
            }
        }
    }
}

#[test]
fn pheromone_field_stays_finite_and_non_negative() {
    let mut colony = Colony::new(config(11)).unwrap();
    for _ in 0..200 {
        colony.step();
        for &v in colony.lattice().pheromone_field() {
            assert!(v.is_finite() && v >= 0.0, "bad pheromone value {v}");
        }
    }
}

#[test]
fn summaries_track_lattice_state() {
    let mut colony = Colony::new(config(17)).unwrap();
    for _ in 0..100 {
        let summary = colony.step();
        assert_eq!(summary.agent_count, 12);
        assert_eq!(summary.solid_cells, colony.lattice().solid_count());
        let total = colony.lattice().total_pheromone();
        assert!((summary.total_pheromone - total).abs() < 1e-3);
    }
}
