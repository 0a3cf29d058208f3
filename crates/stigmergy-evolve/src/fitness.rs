//! Target geometries and the banded fitness score.

use serde::{Deserialize, Serialize};
use stigmergy_core::{Lattice, Material, Pos};

/// Geometry a rollout is scored against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TargetShape {
    /// A circular wall footprint: material is scored by horizontal distance
    /// from a centre axis, with a height bonus for cells sitting on the ring.
    Ring { center_x: f32, center_z: f32, radius: f32 },
    /// A dome: material is scored by 3D distance from a centre point.
    Dome { center_x: f32, center_y: f32, center_z: f32, radius: f32 },
    /// An alternating cement/queen line along x at fixed (y, z).
    Line { y: usize, z: usize, x_start: usize, x_end: usize },
}

/// Score for one cell's deviation from the target distance: +1 on target,
/// tapering through zero to -1 across one-cell-wide bands.
#[must_use]
pub fn band_score(deviation: f32) -> f32 {
    match deviation {
        d if d <= 0.5 => 1.0,
        d if d <= 1.5 => 0.75,
        d if d <= 2.5 => 0.25,
        d if d <= 3.5 => 0.0,
        d if d <= 4.5 => -0.25,
        d if d <= 5.5 => -0.75,
        _ => -1.0,
    }
}

/// Scores a final lattice against `target` on a 0-to-100-ish scale. Returns
/// exactly 0.0 when no material exists, so empty rollouts never poison
/// selection with NaN.
#[must_use]
pub fn score(lattice: &Lattice, target: &TargetShape) -> f32 {
    match target {
        TargetShape::Ring { center_x, center_z, radius } => {
            radial_score(lattice, |pos| {
                let dx = pos.x as f32 - center_x;
                let dz = pos.z as f32 - center_z;
                (dx * dx + dz * dz).sqrt() - radius
            })
        }
        TargetShape::Dome { center_x, center_y, center_z, radius } => {
            radial_score(lattice, |pos| {
                let dx = pos.x as f32 - center_x;
                let dy = pos.y as f32 - center_y;
                let dz = pos.z as f32 - center_z;
                (dx * dx + dy * dy + dz * dz).sqrt() - radius
            })
        }
        TargetShape::Line { y, z, x_start, x_end } => {
            line_score(lattice, *y, *z, *x_start, *x_end)
        }
    }
}

fn radial_score(lattice: &Lattice, signed_deviation: impl Fn(Pos) -> f32) -> f32 {
    let dims = lattice.dims();
    let mut sum = 0.0f32;
    let mut scored = 0usize;
    let mut height_bonus = 0.0f32;
    for x in 0..dims.width {
        for y in 0..dims.height {
            for z in 0..dims.depth {
                let pos = Pos::new(x, y, z);
                if !lattice.material(pos).is_solid() {
                    continue;
                }
                let deviation = signed_deviation(pos).abs();
                sum += band_score(deviation);
                scored += 1;
                // Building high directly on the target surface pays extra.
                if deviation <= 0.5 {
                    height_bonus = height_bonus.max(4.0 * y as f32);
                }
            }
        }
    }
    if scored == 0 {
        return 0.0;
    }
    100.0 * sum / scored as f32 + height_bonus
}

/// Alternating-line target: even x offsets want cement, odd offsets want the
/// cell clear; queen material counts against either way.
fn line_score(lattice: &Lattice, y: usize, z: usize, x_start: usize, x_end: usize) -> f32 {
    let dims = lattice.dims();
    let mut sum = 0.0f32;
    let mut scored = 0usize;
    for x in x_start..=x_end.min(dims.width.saturating_sub(1)) {
        if !dims.contains(x, y, z) {
            continue;
        }
        let material = lattice.material(Pos::new(x, y, z));
        if material == Material::Empty {
            continue;
        }
        scored += 1;
        let even = (x - x_start) % 2 == 0;
        sum += match (even, material) {
            (true, Material::Cement) => 1.0,
            (true, _) => -1.0,
            (false, _) => -1.0,
        };
    }
    if scored == 0 { 0.0 } else { 100.0 * sum / scored as f32 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stigmergy_core::Dims;

    fn lattice(w: usize, h: usize, d: usize) -> Lattice {
        Lattice::new(Dims::new(w, h, d)).unwrap()
    }

    #[test]
    fn empty_lattice_scores_zero() {
        let lat = lattice(8, 8, 8);
        let target = TargetShape::Ring { center_x: 4.0, center_z: 4.0, radius: 2.0 };
        assert_eq!(score(&lat, &target), 0.0);
    }

    #[test]
    fn band_scores_taper_symmetrically() {
        assert_eq!(band_score(0.0), 1.0);
        assert_eq!(band_score(1.0), 0.75);
        assert_eq!(band_score(2.0), 0.25);
        assert_eq!(band_score(3.0), 0.0);
        assert_eq!(band_score(4.0), -0.25);
        assert_eq!(band_score(5.0), -0.75);
        assert_eq!(band_score(9.0), -1.0);
    }

    #[test]
    fn perfect_ring_scores_one_hundred_plus_height() {
        let mut lat = lattice(9, 6, 9);
        // Four cells exactly radius 2 from (4, 4), one raised to y = 2.
        for (x, y, z) in [(6, 0, 4), (2, 0, 4), (4, 0, 6), (4, 2, 2)] {
            lat.set_material(Pos::new(x, y, z), Material::Cement);
        }
        let target = TargetShape::Ring { center_x: 4.0, center_z: 4.0, radius: 2.0 };
        assert!((score(&lat, &target) - 108.0).abs() < 1e-3);
    }

    #[test]
    fn off_target_material_drags_the_score_down() {
        let mut lat = lattice(16, 4, 16);
        lat.set_material(Pos::new(8, 0, 8), Material::Cement);
        let target = TargetShape::Ring { center_x: 8.0, center_z: 8.0, radius: 7.0 };
        // Centre cell is 7 away from the ring: worst band.
        assert!((score(&lat, &target) - (-100.0)).abs() < 1e-3);
    }

    #[test]
    fn dome_scores_use_three_dimensional_distance() {
        let mut lat = lattice(9, 9, 9);
        lat.set_material(Pos::new(4, 3, 4), Material::Cement);
        let target =
            TargetShape::Dome { center_x: 4.0, center_y: 0.0, center_z: 4.0, radius: 3.0 };
        // On-target at y = 3: 100 from the band plus a 12-point height bonus.
        assert!((score(&lat, &target) - 112.0).abs() < 1e-3);
    }

    #[test]
    fn line_target_rewards_alternation() {
        let mut lat = lattice(10, 3, 3);
        for x in [2, 4, 6] {
            lat.set_material(Pos::new(x, 0, 1), Material::Cement);
        }
        let target = TargetShape::Line { y: 0, z: 1, x_start: 2, x_end: 7 };
        assert!((score(&lat, &target) - 100.0).abs() < 1e-3);
        // Filling an odd slot with cement pulls the score down.
        lat.set_material(Pos::new(3, 0, 1), Material::Cement);
        assert!(score(&lat, &target) < 100.0);
    }
}
