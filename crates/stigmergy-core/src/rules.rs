//! Agent movement and geometric placement predicates.
//!
//! Movement enumerates the 26 unit offsets around an agent, filters them
//! through emptiness, corner-cutting, and surface-adjacency checks, and picks
//! uniformly among the survivors. Leaving the horizontal extent, or having no
//! admissible move at all, completes the agent's life cycle: it respawns on
//! the fixed outer-ring spawn set at floor level.

use rand::Rng;
use rand::rngs::SmallRng;

use crate::lattice::{Dims, Lattice, Material, Pos};

/// Outcome of one movement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDecision {
    /// The agent stepped to a new in-grid cell.
    Moved(Pos),
    /// The agent left the grid or was boxed in, and respawned at a spawn cell.
    Respawned(Pos),
}

impl MoveDecision {
    #[must_use]
    pub fn destination(self) -> Pos {
        match self {
            MoveDecision::Moved(pos) | MoveDecision::Respawned(pos) => pos,
        }
    }
}

/// Movement and placement geometry for a fixed set of lattice extents.
#[derive(Debug, Clone)]
pub struct ConstructionRules {
    dims: Dims,
    spawn_ring: Vec<Pos>,
}

impl ConstructionRules {
    #[must_use]
    pub fn new(dims: Dims) -> Self {
        Self { dims, spawn_ring: build_spawn_ring(dims) }
    }

    /// The fixed floor-level spawn set: the two outermost rings of the
    /// horizontal extent.
    #[must_use]
    pub fn spawn_ring(&self) -> &[Pos] {
        &self.spawn_ring
    }

    #[must_use]
    pub fn spawn_cell(&self, rng: &mut SmallRng) -> Pos {
        self.spawn_ring[rng.random_range(0..self.spawn_ring.len())]
    }

    /// Attempts to move the agent at `pos` one step. The lattice is not
    /// mutated; callers apply the returned decision.
    pub fn try_move(&self, lattice: &Lattice, pos: Pos, rng: &mut SmallRng) -> MoveDecision {
        // Candidate offsets, with `None` marking a horizontal grid exit.
        let mut candidates: Vec<Option<Pos>> = Vec::with_capacity(26);
        for dx in -1i32..=1 {
            for dy in -1i32..=1 {
                for dz in -1i32..=1 {
                    if dx == 0 && dy == 0 && dz == 0 {
                        continue;
                    }
                    let y = pos.y as i64 + dy as i64;
                    if y < 0 || y as usize >= self.dims.height {
                        continue;
                    }
                    match pos.offset(dx, dy, dz, self.dims) {
                        None => candidates.push(None),
                        Some(dest) => {
                            if lattice.material(dest) == Material::Empty
                                && self.path_unobstructed(lattice, pos, dx, dy, dz)
                                && self.has_neighbouring_surface(lattice, dest)
                            {
                                candidates.push(Some(dest));
                            }
                        }
                    }
                }
            }
        }
        if candidates.is_empty() {
            return MoveDecision::Respawned(self.spawn_cell(rng));
        }
        match candidates[rng.random_range(0..candidates.len())] {
            Some(dest) => MoveDecision::Moved(dest),
            None => MoveDecision::Respawned(self.spawn_cell(rng)),
        }
    }

    /// Corner-cutting check: for a move with two or three nonzero axes, at
    /// least one of the single-axis intermediate cells must be empty,
    /// otherwise the agent would squeeze through the shared edge or corner of
    /// diagonally touching solid cells.
    fn path_unobstructed(&self, lattice: &Lattice, pos: Pos, dx: i32, dy: i32, dz: i32) -> bool {
        let axes = (dx != 0) as u8 + (dy != 0) as u8 + (dz != 0) as u8;
        if axes < 2 {
            return true;
        }
        let mut intermediates = Vec::with_capacity(3);
        if dx != 0 {
            intermediates.push((dx, 0, 0));
        }
        if dy != 0 {
            intermediates.push((0, dy, 0));
        }
        if dz != 0 {
            intermediates.push((0, 0, dz));
        }
        intermediates.iter().any(|&(ix, iy, iz)| {
            pos.offset(ix, iy, iz, self.dims)
                .is_some_and(|cell| lattice.material(cell) == Material::Empty)
        })
    }

    /// Surface-adjacency check for a movement destination: floor cells always
    /// qualify; elsewhere at least one in-grid face neighbour must hold
    /// material.
    fn has_neighbouring_surface(&self, lattice: &Lattice, dest: Pos) -> bool {
        if dest.y == 0 {
            return true;
        }
        const FACES: [(i32, i32, i32); 6] =
            [(1, 0, 0), (-1, 0, 0), (0, 1, 0), (0, -1, 0), (0, 0, 1), (0, 0, -1)];
        FACES.iter().any(|&(dx, dy, dz)| {
            dest.offset(dx, dy, dz, self.dims)
                .is_some_and(|cell| lattice.material(cell).is_solid())
        })
    }

    /// Support predicate: the floor, a solid cell directly below, or a solid
    /// cell directly above (while still below the top two layers) all count
    /// as support.
    #[must_use]
    pub fn has_support(&self, lattice: &Lattice, pos: Pos) -> bool {
        if pos.y == 0 {
            return true;
        }
        if lattice.material(Pos::new(pos.x, pos.y - 1, pos.z)).is_solid() {
            return true;
        }
        pos.y < self.dims.height.saturating_sub(2)
            && lattice.material(Pos::new(pos.x, pos.y + 1, pos.z)).is_solid()
    }

    /// Adjacency predicate: some horizontal face neighbour is solid and is
    /// itself supported.
    #[must_use]
    pub fn has_supported_neighbour(&self, lattice: &Lattice, pos: Pos) -> bool {
        let neighbours = [
            (pos.x + 2 < self.dims.width).then(|| Pos::new(pos.x + 1, pos.y, pos.z)),
            (pos.x > 0).then(|| Pos::new(pos.x - 1, pos.y, pos.z)),
            (pos.z + 2 < self.dims.depth).then(|| Pos::new(pos.x, pos.y, pos.z + 1)),
            (pos.z > 0).then(|| Pos::new(pos.x, pos.y, pos.z - 1)),
        ];
        neighbours.into_iter().flatten().any(|cell| {
            lattice.material(cell).is_solid() && self.has_support(lattice, cell)
        })
    }

    /// Three-in-a-row predicate: one of the four horizontal faces presents a
    /// full solid triplet along the perpendicular horizontal axis.
    #[must_use]
    pub fn has_facing_triplet(&self, lattice: &Lattice, pos: Pos) -> bool {
        let Pos { x, y, z } = pos;
        let w = self.dims.width;
        let d = self.dims.depth;
        let solid = |x: usize, z: usize| lattice.material(Pos::new(x, y, z)).is_solid();
        if x + 2 < w && z > 0 && z + 2 < d
            && solid(x + 1, z - 1) && solid(x + 1, z) && solid(x + 1, z + 1)
        {
            return true;
        }
        if x > 0 && z > 0 && z + 2 < d
            && solid(x - 1, z - 1) && solid(x - 1, z) && solid(x - 1, z + 1)
        {
            return true;
        }
        if z + 2 < d && x > 0 && x + 2 < w
            && solid(x - 1, z + 1) && solid(x, z + 1) && solid(x + 1, z + 1)
        {
            return true;
        }
        if z > 0 && x > 0 && x + 2 < w
            && solid(x - 1, z - 1) && solid(x, z - 1) && solid(x + 1, z - 1)
        {
            return true;
        }
        false
    }

    /// True when any of the three geometric placement predicates admits a
    /// deposit at `pos`.
    #[must_use]
    pub fn placement_admissible(&self, lattice: &Lattice, pos: Pos) -> bool {
        self.has_support(lattice, pos)
            || self.has_supported_neighbour(lattice, pos)
            || self.has_facing_triplet(lattice, pos)
    }
}

/// The outer-ring spawn set: for every x, the two outermost z rows; for grids
/// deep enough, the two outermost x columns over the interior z range.
fn build_spawn_ring(dims: Dims) -> Vec<Pos> {
    let mut ring = Vec::new();
    let (w, d) = (dims.width, dims.depth);
    for x in 0..w {
        ring.push(Pos::new(x, 0, 0));
        if d > 1 {
            ring.push(Pos::new(x, 0, 1));
        }
        if d > 2 {
            ring.push(Pos::new(x, 0, d - 2));
        }
        if d > 3 {
            ring.push(Pos::new(x, 0, d - 1));
        }
    }
    if d > 4 {
        for z in 2..d - 2 {
            ring.push(Pos::new(0, 0, z));
            if w > 1 {
                ring.push(Pos::new(1, 0, z));
            }
            if w > 2 {
                ring.push(Pos::new(w - 2, 0, z));
            }
            if w > 3 {
                ring.push(Pos::new(w - 1, 0, z));
            }
        }
    }
    ring.sort_by_key(|p| (p.x, p.z));
    ring.dedup();
    ring
}
