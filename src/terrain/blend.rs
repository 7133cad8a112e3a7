//! Underlay colour blending.
//!
//! A box filter of radius `r` over hue, saturation, lightness, hue weight
//! and tile count, done as two sliding windows: a column window over x
//! keeps per-row sums, then a row window over y sums those. Tiles without
//! an underlay contribute nothing, and nothing outside the region is
//! sampled.

use crate::definitions::floor::FloorHsl;
use crate::math::pack_hsl;

use super::tiles::RegionTileGrid;

/// Tile colour code for "no underlay".
pub const NO_UNDERLAY: i32 = -1;

#[derive(Debug, Clone, Copy, Default)]
struct Sums {
    hue: i32,
    saturation: i32,
    lightness: i32,
    multiplier: i32,
    count: i32,
}

impl Sums {
    fn add(&mut self, c: &FloorHsl) {
        self.hue += c.hue;
        self.saturation += c.saturation;
        self.lightness += c.lightness;
        self.multiplier += c.hue_multiplier;
        self.count += 1;
    }

    fn sub(&mut self, c: &FloorHsl) {
        self.hue -= c.hue;
        self.saturation -= c.saturation;
        self.lightness -= c.lightness;
        self.multiplier -= c.hue_multiplier;
        self.count -= 1;
    }

    fn add_sums(&mut self, o: &Sums) {
        self.hue += o.hue;
        self.saturation += o.saturation;
        self.lightness += o.lightness;
        self.multiplier += o.multiplier;
        self.count += o.count;
    }

    fn sub_sums(&mut self, o: &Sums) {
        self.hue -= o.hue;
        self.saturation -= o.saturation;
        self.lightness -= o.lightness;
        self.multiplier -= o.multiplier;
        self.count -= o.count;
    }

    fn packed(&self) -> i32 {
        if self.count == 0 {
            return NO_UNDERLAY;
        }
        let hue = if self.multiplier > 0 {
            self.hue * 256 / self.multiplier
        } else {
            0
        };
        pack_hsl(hue, self.saturation / self.count, self.lightness / self.count)
    }
}

/// Blended packed HSL for every tile of `plane`, indexed `[x * size + y]`.
/// Tiles without an underlay get [`NO_UNDERLAY`].
///
/// `underlay` maps a tile's underlay id (never 0) to its weighted colour.
pub fn blend_underlays<F>(grid: &RegionTileGrid, plane: usize, radius: usize, underlay: F) -> Vec<i32>
where
    F: Fn(u16) -> Option<FloorHsl>,
{
    let size = grid.size;
    let r = radius as isize;
    let n = size as isize;
    let colour = |x: isize, y: usize| -> Option<FloorHsl> {
        let id = grid.tile(plane, x as usize, y).underlay;
        if id == 0 {
            None
        } else {
            underlay(id)
        }
    };

    let mut out = vec![NO_UNDERLAY; size * size];
    let mut rows = vec![Sums::default(); size];
    for x in -r..n + r {
        let entering = x + r;
        if (0..n).contains(&entering) {
            for (y, row) in rows.iter_mut().enumerate() {
                if let Some(c) = colour(entering, y) {
                    row.add(&c);
                }
            }
        }
        let leaving = x - r - 1;
        if (0..n).contains(&leaving) {
            for (y, row) in rows.iter_mut().enumerate() {
                if let Some(c) = colour(leaving, y) {
                    row.sub(&c);
                }
            }
        }
        if !(0..n).contains(&x) {
            continue;
        }

        let mut window = Sums::default();
        for y in -r..n + r {
            let entering = y + r;
            if (0..n).contains(&entering) {
                window.add_sums(&rows[entering as usize]);
            }
            let leaving = y - r - 1;
            if (0..n).contains(&leaving) {
                window.sub_sums(&rows[leaving as usize]);
            }
            if (0..n).contains(&y) && colour(x, y as usize).is_some() {
                out[x as usize * size + y as usize] = window.packed();
            }
        }
    }
    out
}
