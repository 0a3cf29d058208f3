//! Persistence for stigmergy runs: whole-lattice JSON snapshots and a
//! line-oriented step-summary recorder.
//!
//! Snapshots serialize the three dense grids as nested arrays indexed
//! `[x][y][z]`. Extents are recovered from the array shape on load, so the
//! format carries no separate header.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use stigmergy_core::{ColonyPersistence, Dims, Lattice, Material, Pos, StepSummary};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON failure: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot shape invalid: {0}")]
    InvalidShape(&'static str),
    #[error("unknown material code {0}")]
    UnknownMaterial(u8),
}

/// Serialized form of a lattice: cell codes, pheromone, and agent counts,
/// all nested `[x][y][z]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub cells: Vec<Vec<Vec<u8>>>,
    pub pheromone: Vec<Vec<Vec<f32>>>,
    pub agents: Vec<Vec<Vec<u32>>>,
}

impl GridSnapshot {
    #[must_use]
    pub fn from_lattice(lattice: &Lattice) -> Self {
        let dims = lattice.dims();
        Self {
            cells: nested_grid(dims, |pos| lattice.material(pos).as_u8()),
            pheromone: nested_grid(dims, |pos| lattice.pheromone(pos)),
            agents: nested_grid(dims, |pos| lattice.agents_at(pos)),
        }
    }

    /// Recovers `(W, H, D)` from the cell array shape, rejecting ragged or
    /// empty nests.
    pub fn dims(&self) -> Result<Dims, StorageError> {
        let width = self.cells.len();
        let height = self.cells.first().map_or(0, Vec::len);
        let depth = self
            .cells
            .first()
            .and_then(|p| p.first())
            .map_or(0, Vec::len);
        if width == 0 || height == 0 || depth == 0 {
            return Err(StorageError::InvalidShape("snapshot has an empty axis"));
        }
        for plane in &self.cells {
            if plane.len() != height {
                return Err(StorageError::InvalidShape("ragged y axis in cell grid"));
            }
            for column in plane {
                if column.len() != depth {
                    return Err(StorageError::InvalidShape("ragged z axis in cell grid"));
                }
            }
        }
        Ok(Dims::new(width, height, depth))
    }

    /// Rebuilds a lattice, validating shape agreement across all three grids
    /// and every material code.
    pub fn into_lattice(self) -> Result<Lattice, StorageError> {
        let dims = self.dims()?;
        check_shape(&self.pheromone, dims, "pheromone grid disagrees on extents")?;
        check_shape(&self.agents, dims, "agent grid disagrees on extents")?;

        let mut lattice =
            Lattice::new(dims).map_err(|_| StorageError::InvalidShape("empty extents"))?;
        for (x, plane) in self.cells.iter().enumerate() {
            for (y, column) in plane.iter().enumerate() {
                for (z, &code) in column.iter().enumerate() {
                    let material =
                        Material::from_u8(code).ok_or(StorageError::UnknownMaterial(code))?;
                    let pos = Pos::new(x, y, z);
                    lattice.set_material(pos, material);
                    lattice.set_pheromone(pos, self.pheromone[x][y][z]);
                    for _ in 0..self.agents[x][y][z] {
                        lattice.add_agent(pos);
                    }
                }
            }
        }
        lattice.commit_pheromone();
        Ok(lattice)
    }
}

fn check_shape<T>(
    grid: &[Vec<Vec<T>>],
    dims: Dims,
    message: &'static str,
) -> Result<(), StorageError> {
    let matches = grid.len() == dims.width
        && grid.iter().all(|plane| {
            plane.len() == dims.height
                && plane.iter().all(|column| column.len() == dims.depth)
        });
    if matches { Ok(()) } else { Err(StorageError::InvalidShape(message)) }
}

fn nested_grid<T>(dims: Dims, f: impl Fn(Pos) -> T) -> Vec<Vec<Vec<T>>> {
    (0..dims.width)
        .map(|x| {
            (0..dims.height)
                .map(|y| (0..dims.depth).map(|z| f(Pos::new(x, y, z))).collect())
                .collect()
        })
        .collect()
}

/// Writes a snapshot of `lattice` to `path` as JSON.
pub fn save_snapshot(path: &Path, lattice: &Lattice) -> Result<(), StorageError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &GridSnapshot::from_lattice(lattice))?;
    writer.flush()?;
    debug!(path = %path.display(), "snapshot written");
    Ok(())
}

/// Loads a snapshot from `path`, recovering extents from the array shape.
pub fn load_snapshot(path: &Path) -> Result<Lattice, StorageError> {
    let file = File::open(path)?;
    let snapshot: GridSnapshot = serde_json::from_reader(BufReader::new(file))?;
    snapshot.into_lattice()
}

/// Step-summary sink appending one JSON document per line. Write failures
/// are logged and swallowed so a full disk cannot abort a long run.
pub struct SummaryRecorder {
    writer: BufWriter<File>,
}

impl SummaryRecorder {
    pub fn create(path: &Path) -> Result<Self, StorageError> {
        Ok(Self { writer: BufWriter::new(File::create(path)?) })
    }
}

impl ColonyPersistence for SummaryRecorder {
    fn record_step(&mut self, summary: &StepSummary) {
        let result = serde_json::to_writer(&mut self.writer, summary)
            .map_err(std::io::Error::from)
            .and_then(|()| self.writer.write_all(b"\n"));
        if let Err(err) = result {
            warn!(%err, "failed to record step summary");
        }
    }

    fn flush(&mut self) {
        if let Err(err) = self.writer.flush() {
            warn!(%err, "failed to flush step summaries");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stigmergy_core::{Colony, SimulationConfig, Tick};

    fn built_lattice() -> Lattice {
        let config = SimulationConfig {
            width: 8,
            height: 5,
            depth: 8,
            agent_count: 5,
            queen_cells: vec![(4, 0, 4)],
            placement_probability: 0.4,
            rng_seed: Some(77),
            ..SimulationConfig::default()
        };
        let mut colony = Colony::new(config).unwrap();
        colony.run(80);
        colony.into_lattice()
    }

    #[test]
    fn snapshot_roundtrips_through_json() {
        let original = built_lattice();
        let snapshot = GridSnapshot::from_lattice(&original);
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: GridSnapshot = serde_json::from_str(&json).unwrap();
        let lattice = restored.into_lattice().unwrap();
        assert_eq!(lattice.cells(), original.cells());
        assert_eq!(lattice.agents(), original.agents());
        assert_eq!(lattice.pheromone_field(), original.pheromone_field());
    }

    #[test]
    fn dims_recovered_from_shape_alone() {
        let lattice = Lattice::new(Dims::new(3, 7, 5)).unwrap();
        let snapshot = GridSnapshot::from_lattice(&lattice);
        assert_eq!(snapshot.dims().unwrap(), Dims::new(3, 7, 5));
    }

    #[test]
    fn ragged_snapshots_are_rejected() {
        let lattice = Lattice::new(Dims::new(3, 3, 3)).unwrap();
        let mut snapshot = GridSnapshot::from_lattice(&lattice);
        snapshot.cells[1].pop();
        assert!(matches!(snapshot.into_lattice(), Err(StorageError::InvalidShape(_))));
    }

    #[test]
    fn mismatched_grid_extents_are_rejected() {
        let lattice = Lattice::new(Dims::new(3, 3, 3)).unwrap();
        let mut snapshot = GridSnapshot::from_lattice(&lattice);
        snapshot.agents.pop();
        assert!(matches!(snapshot.into_lattice(), Err(StorageError::InvalidShape(_))));
    }

    #[test]
    fn unknown_material_codes_are_rejected() {
        let lattice = Lattice::new(Dims::new(2, 2, 2)).unwrap();
        let mut snapshot = GridSnapshot::from_lattice(&lattice);
        snapshot.cells[0][0][0] = 9;
        assert!(matches!(snapshot.into_lattice(), Err(StorageError::UnknownMaterial(9))));
    }

    #[test]
    fn save_and_load_via_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let original = built_lattice();
        save_snapshot(&path, &original).unwrap();
        let loaded = load_snapshot(&path).unwrap();
        assert_eq!(loaded.cells(), original.cells());
    }

    #[test]
    fn recorder_appends_one_line_per_step() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summaries.jsonl");
        {
            let mut recorder = SummaryRecorder::create(&path).unwrap();
            for tick in 1..=3u64 {
                recorder.record_step(&StepSummary {
                    tick: Tick(tick),
                    agent_count: 4,
                    cells_placed: 0,
                    respawns: 1,
                    solid_cells: 2,
                    total_pheromone: 0.5,
                });
            }
            recorder.flush();
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        let parsed: StepSummary = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(parsed.tick, Tick(3));
    }
}
