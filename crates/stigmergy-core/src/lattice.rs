//! Flat-array lattice state: cell materials, agent occupancy counts, and the
//! double-buffered pheromone field.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pheromone values below this threshold are snapped to zero after diffusion.
pub const PHEROMONE_FLOOR: f32 = 0.01;

/// Errors raised by lattice accessors and constructors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LatticeError {
    #[error("coordinate ({x}, {y}, {z}) outside lattice extents {dims}")]
    OutOfBounds { x: usize, y: usize, z: usize, dims: Dims },
    #[error("no agent present at ({x}, {y}, {z})")]
    NoAgentAtCell { x: usize, y: usize, z: usize },
    #[error("lattice extents must all be nonzero")]
    EmptyExtents,
}

/// Cell material. Stored as one byte per cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum Material {
    #[default]
    Empty = 0,
    Cement = 1,
    Queen = 2,
}

impl Material {
    /// True for any deposited material (cement or queen substrate).
    #[must_use]
    pub fn is_solid(self) -> bool {
        !matches!(self, Material::Empty)
    }

    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(Material::Empty),
            1 => Some(Material::Cement),
            2 => Some(Material::Queen),
            _ => None,
        }
    }
}

/// Lattice extents along x, y (vertical), and z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dims {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
}

impl Dims {
    #[must_use]
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        Self { width, height, depth }
    }

    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.width * self.height * self.depth
    }

    #[must_use]
    pub fn contains(&self, x: usize, y: usize, z: usize) -> bool {
        x < self.width && y < self.height && z < self.depth
    }

    /// Signed-coordinate containment, for neighbour offsets that may step
    /// outside the grid.
    #[must_use]
    pub fn contains_signed(&self, x: i64, y: i64, z: i64) -> bool {
        x >= 0
            && y >= 0
            && z >= 0
            && (x as usize) < self.width
            && (y as usize) < self.height
            && (z as usize) < self.depth
    }
}

impl std::fmt::Display for Dims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.depth)
    }
}

/// A cell coordinate known to be inside some lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl Pos {
    #[must_use]
    pub fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Applies a signed offset, returning `None` when the result leaves the
    /// given extents.
    #[must_use]
    pub fn offset(self, dx: i32, dy: i32, dz: i32, dims: Dims) -> Option<Pos> {
        let x = self.x as i64 + dx as i64;
        let y = self.y as i64 + dy as i64;
        let z = self.z as i64 + dz as i64;
        dims.contains_signed(x, y, z)
            .then(|| Pos::new(x as usize, y as usize, z as usize))
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// The simulation grid. All four per-cell fields live in flat row-major
/// vectors indexed as `x * height * depth + y * depth + z`.
///
/// The pheromone field is double buffered: diffusion reads `past_pheromone`
/// and writes `pheromone`, so every cell update within one step observes the
/// same previous-step field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    dims: Dims,
    cells: Vec<Material>,
    agents: Vec<u32>,
    pheromone: Vec<f32>,
    past_pheromone: Vec<f32>,
}

impl Lattice {
    pub fn new(dims: Dims) -> Result<Self, LatticeError> {
        if dims.width == 0 || dims.height == 0 || dims.depth == 0 {
            return Err(LatticeError::EmptyExtents);
        }
        let n = dims.cell_count();
        Ok(Self {
            dims,
            cells: vec![Material::Empty; n],
            agents: vec![0; n],
            pheromone: vec![0.0; n],
            past_pheromone: vec![0.0; n],
        })
    }

    #[must_use]
    pub fn dims(&self) -> Dims {
        self.dims
    }

    #[inline]
    #[must_use]
    pub fn index(&self, pos: Pos) -> usize {
        (pos.x * self.dims.height + pos.y) * self.dims.depth + pos.z
    }

    fn checked_index(&self, x: usize, y: usize, z: usize) -> Result<usize, LatticeError> {
        if self.dims.contains(x, y, z) {
            Ok((x * self.dims.height + y) * self.dims.depth + z)
        } else {
            Err(LatticeError::OutOfBounds { x, y, z, dims: self.dims })
        }
    }

    pub fn material_at(&self, x: usize, y: usize, z: usize) -> Result<Material, LatticeError> {
        Ok(self.cells[self.checked_index(x, y, z)?])
    }

    /// Material lookup for positions already validated against the extents.
    #[inline]
    #[must_use]
    pub fn material(&self, pos: Pos) -> Material {
        self.cells[self.index(pos)]
    }

    pub fn set_material(&mut self, pos: Pos, material: Material) {
        let idx = self.index(pos);
        self.cells[idx] = material;
    }

    pub fn set_material_at(
        &mut self,
        x: usize,
        y: usize,
        z: usize,
        material: Material,
    ) -> Result<(), LatticeError> {
        let idx = self.checked_index(x, y, z)?;
        self.cells[idx] = material;
        Ok(())
    }

    pub fn pheromone_at(&self, x: usize, y: usize, z: usize) -> Result<f32, LatticeError> {
        Ok(self.pheromone[self.checked_index(x, y, z)?])
    }

    pub fn set_pheromone_at(
        &mut self,
        x: usize,
        y: usize,
        z: usize,
        value: f32,
    ) -> Result<(), LatticeError> {
        let idx = self.checked_index(x, y, z)?;
        self.pheromone[idx] = value;
        Ok(())
    }

    pub fn agent_count_at(&self, x: usize, y: usize, z: usize) -> Result<u32, LatticeError> {
        Ok(self.agents[self.checked_index(x, y, z)?])
    }

    /// Material as seen by agents probing a possibly out-of-grid neighbour:
    /// cells below the floor read as solid cement, everything else outside
    /// the grid reads as empty.
    #[must_use]
    pub fn observed_material(&self, x: i64, y: i64, z: i64) -> Material {
        if y < 0 {
            return Material::Cement;
        }
        if self.dims.contains_signed(x, y, z) {
            self.cells[(x as usize * self.dims.height + y as usize) * self.dims.depth + z as usize]
        } else {
            Material::Empty
        }
    }

    #[inline]
    #[must_use]
    pub fn agents_at(&self, pos: Pos) -> u32 {
        self.agents[self.index(pos)]
    }

    pub fn add_agent(&mut self, pos: Pos) {
        let idx = self.index(pos);
        self.agents[idx] += 1;
    }

    pub fn remove_agent(&mut self, pos: Pos) -> Result<(), LatticeError> {
        let idx = self.index(pos);
        if self.agents[idx] == 0 {
            return Err(LatticeError::NoAgentAtCell { x: pos.x, y: pos.y, z: pos.z });
        }
        self.agents[idx] -= 1;
        Ok(())
    }

    /// Agent positions in deterministic scan order (x outermost, z
    /// innermost), one entry per agent so multiply-occupied cells repeat.
    #[must_use]
    pub fn agent_positions(&self) -> Vec<Pos> {
        let mut out = Vec::new();
        for x in 0..self.dims.width {
            for y in 0..self.dims.height {
                for z in 0..self.dims.depth {
                    let count = self.agents[(x * self.dims.height + y) * self.dims.depth + z];
                    for _ in 0..count {
                        out.push(Pos::new(x, y, z));
                    }
                }
            }
        }
        out
    }

    #[must_use]
    pub fn agent_count(&self) -> u32 {
        self.agents.iter().sum()
    }

    #[inline]
    #[must_use]
    pub fn pheromone(&self, pos: Pos) -> f32 {
        self.pheromone[self.index(pos)]
    }

    pub fn set_pheromone(&mut self, pos: Pos, value: f32) {
        let idx = self.index(pos);
        self.pheromone[idx] = value;
    }

    #[inline]
    #[must_use]
    pub fn past_pheromone(&self, pos: Pos) -> f32 {
        self.past_pheromone[self.index(pos)]
    }

    /// Copies the live pheromone field into the previous-step buffer.
    pub fn commit_pheromone(&mut self) {
        self.past_pheromone.copy_from_slice(&self.pheromone);
    }

    /// Number of cells holding any deposited material.
    #[must_use]
    pub fn solid_count(&self) -> usize {
        self.cells.iter().filter(|m| m.is_solid()).count()
    }

    #[must_use]
    pub fn total_pheromone(&self) -> f32 {
        self.pheromone.iter().sum()
    }

    #[must_use]
    pub fn cells(&self) -> &[Material] {
        &self.cells
    }

    #[must_use]
    pub fn agents(&self) -> &[u32] {
        &self.agents
    }

    #[must_use]
    pub fn pheromone_field(&self) -> &[f32] {
        &self.pheromone
    }

    pub(crate) fn pheromone_field_mut(&mut self) -> &mut [f32] {
        &mut self.pheromone
    }

    pub(crate) fn past_pheromone_field(&self) -> &[f32] {
        &self.past_pheromone
    }
}
