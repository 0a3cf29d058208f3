//! Microrules: 26-slot neighbourhood patterns with a pheromone activation
//! window, compared up to rotation about the vertical axis.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use stigmergy_core::{Lattice, Material, Pos};

/// Slots in a full Moore neighbourhood.
pub const NEIGHBOURHOOD: usize = 26;

/// One pattern slot: either indifferent or a required material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PatternSlot {
    #[default]
    Any,
    Is(Material),
}

impl PatternSlot {
    fn accepts(self, observed: Material) -> bool {
        match self {
            PatternSlot::Any => true,
            PatternSlot::Is(required) => required == observed,
        }
    }
}

/// Neighbour offsets in canonical slot order: y layer outermost (below,
/// level, above), then z, then x, with the origin skipped. Slot 4 is the cell
/// directly below, slot 21 directly above, slots 10/12/13/15 the four
/// horizontal faces.
#[must_use]
pub fn neighbour_offsets() -> &'static [(i32, i32, i32); NEIGHBOURHOOD] {
    static OFFSETS: OnceLock<[(i32, i32, i32); NEIGHBOURHOOD]> = OnceLock::new();
    OFFSETS.get_or_init(|| {
        let mut offsets = [(0, 0, 0); NEIGHBOURHOOD];
        let mut i = 0;
        for dy in -1i32..=1 {
            for dz in -1i32..=1 {
                for dx in -1i32..=1 {
                    if dx == 0 && dy == 0 && dz == 0 {
                        continue;
                    }
                    offsets[i] = (dx, dy, dz);
                    i += 1;
                }
            }
        }
        offsets
    })
}

/// Slot indices of the six face neighbours, in -y, -z, -x, +x, +z, +y order.
pub const FACE_SLOTS: [usize; 6] = [4, 10, 12, 13, 15, 21];

/// Index-permutation tables for 0, 90, 180, and 270 degree rotation about
/// the vertical axis. `tables[r][i]` is the slot whose offset rotates onto
/// slot `i`, so a rotated pattern is `pattern[tables[r][i]]` at slot `i`.
#[must_use]
pub fn rotation_tables() -> &'static [[usize; NEIGHBOURHOOD]; 4] {
    static TABLES: OnceLock<[[usize; NEIGHBOURHOOD]; 4]> = OnceLock::new();
    TABLES.get_or_init(|| {
        let offsets = neighbour_offsets();
        let index_of = |target: (i32, i32, i32)| {
            offsets
                .iter()
                .position(|&o| o == target)
                .unwrap_or_else(|| unreachable!("rotated offset {target:?} missing"))
        };
        let mut tables = [[0usize; NEIGHBOURHOOD]; 4];
        for (i, &(dx, dy, dz)) in offsets.iter().enumerate() {
            let mut cur = (dx, dz);
            for table in &mut tables {
                table[i] = index_of((cur.0, dy, cur.1));
                // 90 degrees clockwise about y: (x, z) -> (z, -x).
                cur = (cur.1, -cur.0);
            }
        }
        tables
    })
}

/// A single construction rule. Immutable once sampled: GA operators build
/// replacement rules rather than editing in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Microrule {
    pub pattern: [PatternSlot; NEIGHBOURHOOD],
    /// Material deposited when the rule fires.
    pub deposit: Material,
    /// Set once the rule governs a successful deposit during a rollout.
    pub used: bool,
    /// Pheromone activation window at the deposit cell.
    pub range_min: f32,
    pub range_max: f32,
}

impl Microrule {
    /// True when the observed neighbourhood satisfies every non-indifferent
    /// slot and the local pheromone lies inside the activation window.
    #[must_use]
    pub fn activates(&self, lattice: &Lattice, pos: Pos) -> bool {
        self.matches_pattern(lattice, pos) && {
            let level = lattice.pheromone(pos);
            level >= self.range_min && level <= self.range_max
        }
    }

    #[must_use]
    pub fn matches_pattern(&self, lattice: &Lattice, pos: Pos) -> bool {
        neighbour_offsets()
            .iter()
            .zip(&self.pattern)
            .all(|(&(dx, dy, dz), slot)| {
                let observed = lattice.observed_material(
                    pos.x as i64 + dx as i64,
                    pos.y as i64 + dy as i64,
                    pos.z as i64 + dz as i64,
                );
                slot.accepts(observed)
            })
    }

    /// The pattern under each of the four vertical-axis rotations. Index 0 is
    /// the identity.
    #[must_use]
    pub fn rotations(&self) -> [[PatternSlot; NEIGHBOURHOOD]; 4] {
        let tables = rotation_tables();
        std::array::from_fn(|r| std::array::from_fn(|i| self.pattern[tables[r][i]]))
    }

    /// Rotational equivalence: some rotation of `self` matches `other`'s base
    /// orientation slot for slot.
    #[must_use]
    pub fn equivalent(&self, other: &Microrule) -> bool {
        self.rotations().iter().any(|rot| *rot == other.pattern)
    }
}

/// True when `rules` already holds a rotational equivalent of `candidate`.
/// Checked against genomes still under construction, so this takes a slice.
#[must_use]
pub fn contains_equivalent(rules: &[Microrule], candidate: &Microrule) -> bool {
    rules.iter().any(|rule| rule.equivalent(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stigmergy_core::Dims;

    fn rule_with(pattern: [PatternSlot; NEIGHBOURHOOD]) -> Microrule {
        Microrule {
            pattern,
            deposit: Material::Cement,
            used: false,
            range_min: 0.0,
            range_max: 10.0,
        }
    }

    #[test]
    fn face_slots_map_to_face_offsets() {
        let offsets = neighbour_offsets();
        assert_eq!(offsets[4], (0, -1, 0));
        assert_eq!(offsets[21], (0, 1, 0));
        assert_eq!(offsets[12], (-1, 0, 0));
        assert_eq!(offsets[13], (1, 0, 0));
        assert_eq!(offsets[10], (0, 0, -1));
        assert_eq!(offsets[15], (0, 0, 1));
    }

    #[test]
    fn rotation_tables_are_permutations() {
        for table in rotation_tables() {
            let mut seen = [false; NEIGHBOURHOOD];
            for &slot in table {
                assert!(!seen[slot]);
                seen[slot] = true;
            }
        }
    }

    #[test]
    fn identity_rotation_is_first() {
        let expected: Vec<usize> = (0..NEIGHBOURHOOD).collect();
        assert_eq!(rotation_tables()[0].to_vec(), expected);
    }

    #[test]
    fn four_quarter_turns_return_home() {
        let tables = rotation_tables();
        let quarter = &tables[1];
        for start in 0..NEIGHBOURHOOD {
            let mut slot = start;
            for _ in 0..4 {
                slot = quarter[slot];
            }
            assert_eq!(slot, start);
        }
    }

    #[test]
    fn rotation_preserves_the_vertical_axis() {
        let mut pattern = [PatternSlot::Any; NEIGHBOURHOOD];
        pattern[4] = PatternSlot::Is(Material::Cement);
        pattern[21] = PatternSlot::Is(Material::Queen);
        let rule = rule_with(pattern);
        for rot in rule.rotations() {
            assert_eq!(rot[4], PatternSlot::Is(Material::Cement));
            assert_eq!(rot[21], PatternSlot::Is(Material::Queen));
        }
    }

    #[test]
    fn quarter_turn_moves_a_horizontal_face() {
        let mut pattern = [PatternSlot::Any; NEIGHBOURHOOD];
        pattern[13] = PatternSlot::Is(Material::Cement);
        let rule = rule_with(pattern);
        let rotations = rule.rotations();
        // The +x face must visit all four horizontal faces across the turns.
        let mut visited: Vec<usize> = rotations
            .iter()
            .map(|rot| {
                rot.iter()
                    .position(|&s| s == PatternSlot::Is(Material::Cement))
                    .unwrap()
            })
            .collect();
        visited.sort_unstable();
        assert_eq!(visited, vec![10, 12, 13, 15]);
    }

    #[test]
    fn rotated_rules_are_equivalent() {
        let mut pattern = [PatternSlot::Any; NEIGHBOURHOOD];
        pattern[13] = PatternSlot::Is(Material::Cement);
        pattern[15] = PatternSlot::Is(Material::Queen);
        let rule = rule_with(pattern);
        for rot in rule.rotations() {
            assert!(rule.equivalent(&rule_with(rot)));
        }
        let mut different = [PatternSlot::Any; NEIGHBOURHOOD];
        different[13] = PatternSlot::Is(Material::Queen);
        assert!(!rule.equivalent(&rule_with(different)));
    }

    #[test]
    fn pattern_matching_honours_dont_care_slots() {
        let mut lattice = Lattice::new(Dims::new(5, 5, 5)).unwrap();
        let pos = Pos::new(2, 2, 2);
        lattice.set_material(Pos::new(3, 2, 2), Material::Cement);

        let mut pattern = [PatternSlot::Any; NEIGHBOURHOOD];
        pattern[13] = PatternSlot::Is(Material::Cement);
        assert!(rule_with(pattern).matches_pattern(&lattice, pos));

        pattern[10] = PatternSlot::Is(Material::Cement);
        assert!(!rule_with(pattern).matches_pattern(&lattice, pos));
    }

    #[test]
    fn below_floor_matches_cement_requirement() {
        let lattice = Lattice::new(Dims::new(5, 5, 5)).unwrap();
        let mut pattern = [PatternSlot::Any; NEIGHBOURHOOD];
        pattern[4] = PatternSlot::Is(Material::Cement);
        // Floor cells see solid ground below.
        assert!(rule_with(pattern).matches_pattern(&lattice, Pos::new(2, 0, 2)));
        assert!(!rule_with(pattern).matches_pattern(&lattice, Pos::new(2, 1, 2)));
    }

    #[test]
    fn activation_requires_pheromone_window() {
        let mut lattice = Lattice::new(Dims::new(5, 5, 5)).unwrap();
        let pos = Pos::new(2, 2, 2);
        let mut rule = rule_with([PatternSlot::Any; NEIGHBOURHOOD]);
        rule.range_min = 0.5;
        rule.range_max = 2.0;
        assert!(!rule.activates(&lattice, pos));
        lattice.set_pheromone(pos, 1.0);
        assert!(rule.activates(&lattice, pos));
        lattice.set_pheromone(pos, 3.0);
        assert!(!rule.activates(&lattice, pos));
    }
}
