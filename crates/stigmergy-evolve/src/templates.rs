//! Template library for microrule sampling.
//!
//! Each template is a 26-slot probability mask: the chance that sampling
//! binds the slot to a concrete material instead of leaving it indifferent.
//! The shapes are archetypes construction tends to need: pads, walls,
//! pillars, corners, overhangs, and enclosing rings.

use std::sync::OnceLock;

use crate::microrule::{FACE_SLOTS, NEIGHBOURHOOD, neighbour_offsets};

pub const TEMPLATE_COUNT: usize = 12;

type Mask = [f32; NEIGHBOURHOOD];

fn mask_where(base: f32, hot: f32, select: impl Fn(i32, i32, i32) -> bool) -> Mask {
    let offsets = neighbour_offsets();
    std::array::from_fn(|i| {
        let (dx, dy, dz) = offsets[i];
        if select(dx, dy, dz) { hot } else { base }
    })
}

/// The fixed mask library, built once.
#[must_use]
pub fn template_library() -> &'static [Mask; TEMPLATE_COUNT] {
    static LIBRARY: OnceLock<[Mask; TEMPLATE_COUNT]> = OnceLock::new();
    LIBRARY.get_or_init(|| {
        [
            // Floor pad: everything below is likely bound.
            mask_where(0.01, 0.5, |_, dy, _| dy == -1),
            // Wall along x.
            mask_where(0.01, 0.5, |_, _, dz| dz == -1),
            // Wall along z.
            mask_where(0.01, 0.5, |dx, _, _| dx == -1),
            // Pillar: strong vertical binding.
            mask_where(0.02, 0.8, |dx, _, dz| dx == 0 && dz == 0),
            // Corner: two adjoining walls at agent level.
            mask_where(0.01, 0.4, |dx, dy, dz| dy == 0 && (dx == -1 || dz == -1)),
            // Overhang: ceiling above, open below.
            mask_where(0.01, 0.5, |_, dy, _| dy == 1),
            // Ledge: floor pad plus one facing wall.
            mask_where(0.01, 0.4, |dx, dy, _| dy == -1 || dx == 1),
            // Enclosing ring at agent level.
            mask_where(0.01, 0.4, |dx, dy, dz| dy == 0 && (dx != 0 || dz != 0)),
            // Diagonal struts at agent level.
            mask_where(0.01, 0.5, |dx, dy, dz| dy == 0 && dx != 0 && dz != 0),
            // Sparse noise.
            [0.05; NEIGHBOURHOOD],
            // Face neighbours only.
            mask_where(0.005, 0.6, |dx, dy, dz| {
                (dx != 0) as u8 + (dy != 0) as u8 + (dz != 0) as u8 == 1
            }),
            // Dense surround.
            [0.3; NEIGHBOURHOOD],
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_templates_are_valid_probability_masks() {
        for mask in template_library() {
            for &p in mask {
                assert!((0.0..=1.0).contains(&p));
            }
        }
    }

    #[test]
    fn face_only_template_concentrates_on_faces() {
        let mask = &template_library()[10];
        for slot in FACE_SLOTS {
            assert!(mask[slot] > 0.5);
        }
        assert!(mask[0] < 0.01);
    }

    #[test]
    fn pillar_template_binds_vertical_slots() {
        let mask = &template_library()[3];
        assert!(mask[4] > 0.5);
        assert!(mask[21] > 0.5);
        assert!(mask[13] < 0.1);
    }
}
