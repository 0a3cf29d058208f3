//! Explicit finite-difference pheromone diffusion with multiplicative decay.
//!
//! Each step first decays the whole field, commits it to the previous-step
//! buffer, then applies per-cell exchange deltas computed entirely from that
//! buffer. Solid cells and the floor reflect outgoing pheromone back into the
//! source cell; open lateral and top boundaries let it leak away.

use crate::lattice::{Lattice, Material, PHEROMONE_FLOOR};

/// Default exchange rate per face neighbour. Six neighbours at 1/7 keeps the
/// explicit scheme stable.
pub const DEFAULT_ALPHA: f32 = 1.0 / 7.0;

/// Default per-step multiplicative decay.
pub const DEFAULT_DECAY: f32 = 0.8;

#[derive(Debug, Clone, Copy)]
pub struct DiffusionEngine {
    alpha: f32,
    decay: f32,
}

impl Default for DiffusionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA, DEFAULT_DECAY)
    }
}

impl DiffusionEngine {
    #[must_use]
    pub fn new(alpha: f32, decay: f32) -> Self {
        Self { alpha, decay }
    }

    #[must_use]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    #[must_use]
    pub fn decay(&self) -> f32 {
        self.decay
    }

    /// Runs one diffusion step over the whole lattice.
    pub fn step(&self, lattice: &mut Lattice) {
        for value in lattice.pheromone_field_mut() {
            *value *= self.decay;
        }
        lattice.commit_pheromone();

        let dims = lattice.dims();
        let (w, h, d) = (dims.width, dims.height, dims.depth);
        let mut deltas = vec![0.0f32; dims.cell_count()];
        for x in 0..w {
            for y in 0..h {
                for z in 0..d {
                    let idx = (x * h + y) * d + z;
                    deltas[idx] = self.cell_delta(lattice, x, y, z, idx);
                }
            }
        }

        let field = lattice.pheromone_field_mut();
        for (value, delta) in field.iter_mut().zip(&deltas) {
            *value += delta;
            if *value < PHEROMONE_FLOOR {
                *value = 0.0;
            }
        }
    }

    /// Net exchange for one cell against its six face neighbours, read from
    /// the committed previous-step field.
    fn cell_delta(&self, lattice: &Lattice, x: usize, y: usize, z: usize, idx: usize) -> f32 {
        let dims = lattice.dims();
        let h = dims.height;
        let d = dims.depth;
        let past = lattice.past_pheromone_field();
        let cells = lattice.cells();
        let value = past[idx];
        let mut delta = 0.0f32;

        let mut exchange = |neighbor: Option<usize>, reflective_boundary: bool| {
            match neighbor {
                Some(n_idx) => {
                    // Cement insulates; queen cells carry pheromone and
                    // exchange like open cells so their emission can spread.
                    if cells[n_idx] == Material::Cement {
                        // Reflected: the pheromone that would flow out comes
                        // straight back.
                        delta += self.alpha * value;
                    } else {
                        delta -= self.alpha * (value - past[n_idx]);
                    }
                }
                None => {
                    if reflective_boundary {
                        delta += self.alpha * value;
                    } else {
                        // Open boundary behaves like an empty cell at zero.
                        delta -= self.alpha * value;
                    }
                }
            }
        };

        exchange((x + 1 < dims.width).then(|| idx + h * d), false);
        exchange((x > 0).then(|| idx - h * d), false);
        exchange((y + 1 < dims.height).then(|| idx + d), false);
        // The floor below y = 0 is solid.
        exchange((y > 0).then(|| idx - d), true);
        exchange((z + 1 < dims.depth).then(|| idx + 1), false);
        exchange((z > 0).then(|| idx - 1), false);

        // Cement holds no pheromone of its own to exchange.
        if cells[idx] == Material::Cement { 0.0 } else { delta }
    }
}
