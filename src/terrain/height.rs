//! Procedural ground height for tiles without an explicit height.
//!
//! Three octaves of hashed value noise (cell sizes 4, 2 and 1 tiles), each
//! smoothed over its 3x3 lattice neighbourhood and cosine-interpolated.
//! Everything works on global tile coordinates, so neighbouring regions
//! meet without seams.

use std::sync::Arc;

use crate::math::Trig;

pub const MIN_HEIGHT: i32 = 10;
pub const MAX_HEIGHT: i32 = 60;

/// Octave offsets; each octave samples a different part of the lattice.
const OCTAVE_OFFSETS: [(i32, i32, i32); 3] = [(45365, 91923, 4), (10294, 37821, 2), (0, 0, 1)];

#[derive(Debug, Clone)]
pub struct HeightField {
    trig: Arc<Trig>,
}

impl HeightField {
    pub fn new(trig: Arc<Trig>) -> Self {
        Self { trig }
    }

    /// Height in `[MIN_HEIGHT, MAX_HEIGHT]` for global tile (`x`, `y`).
    pub fn height(&self, x: i32, y: i32) -> i32 {
        let mut total = 0;
        for (shift, &(ox, oy, scale)) in [0, 1, 2].into_iter().zip(OCTAVE_OFFSETS.iter()) {
            let n = self.interpolated_noise(x.wrapping_add(ox), y.wrapping_add(oy), scale) - 128;
            total += n >> shift;
        }
        let h = (total as f64 * 0.3) as i32 + 35;
        h.clamp(MIN_HEIGHT, MAX_HEIGHT)
    }

    fn interpolated_noise(&self, x: i32, y: i32, scale: i32) -> i32 {
        let cx = x.div_euclid(scale);
        let fx = x.rem_euclid(scale);
        let cy = y.div_euclid(scale);
        let fy = y.rem_euclid(scale);
        let v00 = smoothed_noise(cx, cy);
        let v10 = smoothed_noise(cx.wrapping_add(1), cy);
        let v01 = smoothed_noise(cx, cy.wrapping_add(1));
        let v11 = smoothed_noise(cx.wrapping_add(1), cy.wrapping_add(1));
        let near = self.cosine_lerp(v00, v10, fx, scale);
        let far = self.cosine_lerp(v01, v11, fx, scale);
        self.cosine_lerp(near, far, fy, scale)
    }

    fn cosine_lerp(&self, a: i32, b: i32, frac: i32, scale: i32) -> i32 {
        let f = (65536 - self.trig.cos((frac * 1024 / scale) as usize)) >> 1;
        ((a * (65536 - f)) >> 16) + ((b * f) >> 16)
    }
}

/// Lattice value blended with its 8 neighbours, weights 4:2:1.
fn smoothed_noise(x: i32, y: i32) -> i32 {
    let (xm, xp, ym, yp) = (
        x.wrapping_sub(1),
        x.wrapping_add(1),
        y.wrapping_sub(1),
        y.wrapping_add(1),
    );
    let corners = noise(xm, ym) + noise(xp, ym) + noise(xm, yp) + noise(xp, yp);
    let sides = noise(xm, y) + noise(xp, y) + noise(x, ym) + noise(x, yp);
    let center = noise(x, y);
    center / 4 + sides / 8 + corners / 16
}

/// Integer hash of a lattice point, 0..=255.
pub(crate) fn noise(x: i32, y: i32) -> i32 {
    let mut n = x.wrapping_add(y.wrapping_mul(57));
    n ^= n.wrapping_shl(13);
    let inner = n
        .wrapping_mul(n)
        .wrapping_mul(15731)
        .wrapping_add(789221);
    let v = n.wrapping_mul(inner).wrapping_add(1376312589) & i32::MAX;
    (v >> 19) & 255
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_is_byte_sized() {
        for (x, y) in [(0, 0), (1, 0), (-5, 7), (i32::MAX, i32::MIN), (3200, 3200)] {
            let n = noise(x, y);
            assert!((0..=255).contains(&n), "noise({x},{y}) = {n}");
        }
    }

    #[test]
    fn heights_stay_in_range() {
        let field = HeightField::new(Trig::shared());
        for x in (0..4000).step_by(37) {
            for y in (0..4000).step_by(53) {
                let h = field.height(x + 932731, y + 556238);
                assert!((MIN_HEIGHT..=MAX_HEIGHT).contains(&h));
            }
        }
    }

    #[test]
    fn height_is_a_pure_function_of_position() {
        let a = HeightField::new(Trig::shared());
        let b = HeightField::new(Trig::shared());
        assert_eq!(a.height(933_000, 556_500), b.height(933_000, 556_500));
    }

    #[test]
    fn lattice_points_do_not_interpolate() {
        let field = HeightField::new(Trig::shared());
        // frac 0 -> f = 0 -> pure first corner
        assert_eq!(field.cosine_lerp(200, 10, 0, 4), 200 * 65536 >> 16);
    }
}
