//! Per-tile attribute stream of a region.
//!
//! For every plane, then x, then y, a run of values ends in a height
//! terminator:
//!
//! ```text
//! 0        height implicit (height field on plane 0, plane below - 240 above)
//! 1        explicit height byte follows (1 reads as 0)
//! 2..=49   overlay id follows; shape = (v-2)/4, rotation = (v-2+rot) & 3
//! 50..=81  render flags = v - 49
//! 82..     underlay id = v - 81
//! ```
//!
//! Values are one byte wide in older caches and two bytes in newer ones.

use serde::Serialize;
use tracing::debug;

use super::height::HeightField;
use crate::buffer::Buffer;
use crate::error::{Result, SceneError};
use crate::model::contour::CornerHeights;

pub const PLANES: usize = 4;

/// World units between two height steps stored in the stream.
const HEIGHT_STEP: i32 = 8;
/// Height of an implicit upper plane above the one below it.
const PLANE_HEIGHT: i32 = 240;
/// Offsets applied to global tile coordinates before sampling the field.
const FIELD_OFFSET_X: i32 = 932731;
const FIELD_OFFSET_Y: i32 = 556238;

/// Render flag bits.
pub const FLAG_BLOCKED: u8 = 1;
pub const FLAG_BRIDGE: u8 = 2;
pub const FLAG_ROOF: u8 = 4;
pub const FLAG_HIDDEN_LOW_DETAIL: u8 = 8;
pub const FLAG_VISIBLE_BELOW: u8 = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TileAttributes {
    pub underlay: u16,
    pub overlay: u16,
    pub shape: u8,
    pub rotation: u8,
    pub render_flags: u8,
}

/// Heights of one plane on a `(size + 1)²` corner grid. The extra row and
/// column hold the heights of the neighbouring region's first corners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaneHeights {
    corners: usize,
    values: Vec<i32>,
}

impl PlaneHeights {
    pub fn new(tiles: usize) -> Self {
        let corners = tiles + 1;
        Self {
            corners,
            values: vec![0; corners * corners],
        }
    }

    pub fn get(&self, x: usize, y: usize) -> i32 {
        self.values[x * self.corners + y]
    }

    pub fn set(&mut self, x: usize, y: usize, height: i32) {
        self.values[x * self.corners + y] = height;
    }
}

impl CornerHeights for PlaneHeights {
    fn corners(&self) -> usize {
        self.corners
    }

    fn corner(&self, x: usize, y: usize) -> i32 {
        self.get(x, y)
    }
}

/// Decoded terrain attributes for every plane of a region.
#[derive(Debug, Clone, Serialize)]
pub struct RegionTileGrid {
    pub size: usize,
    /// Global tile coordinate of the south-west corner.
    pub base_x: i32,
    pub base_y: i32,
    pub heights: Vec<PlaneHeights>,
    tiles: Vec<TileAttributes>,
}

impl RegionTileGrid {
    pub fn new(size: usize, base_x: i32, base_y: i32) -> Self {
        Self {
            size,
            base_x,
            base_y,
            heights: (0..PLANES).map(|_| PlaneHeights::new(size)).collect(),
            tiles: vec![TileAttributes::default(); PLANES * size * size],
        }
    }

    fn index(&self, plane: usize, x: usize, y: usize) -> usize {
        (plane * self.size + x) * self.size + y
    }

    pub fn tile(&self, plane: usize, x: usize, y: usize) -> &TileAttributes {
        &self.tiles[self.index(plane, x, y)]
    }

    pub fn tile_mut(&mut self, plane: usize, x: usize, y: usize) -> &mut TileAttributes {
        let i = self.index(plane, x, y);
        &mut self.tiles[i]
    }

    pub fn height(&self, plane: usize, x: usize, y: usize) -> i32 {
        self.heights[plane].get(x, y)
    }

    pub fn render_flags(&self, plane: usize, x: usize, y: usize) -> u8 {
        self.tile(plane, x, y).render_flags
    }

    /// Whether plane 1 at (x, y) is a bridge, which moves everything on it
    /// down one plane for collision purposes.
    pub fn is_bridge(&self, x: usize, y: usize) -> bool {
        self.render_flags(1, x, y) & FLAG_BRIDGE != 0
    }

    fn implicit_height(&self, field: &HeightField, plane: usize, x: usize, y: usize) -> i32 {
        if plane == 0 {
            let gx = self.base_x + x as i32 + FIELD_OFFSET_X;
            let gy = self.base_y + y as i32 + FIELD_OFFSET_Y;
            -field.height(gx, gy) * HEIGHT_STEP
        } else {
            self.height(plane - 1, x, y) - PLANE_HEIGHT
        }
    }

    /// Decode the attribute stream for a region at global tile
    /// (`base_x`, `base_y`).
    pub fn decode(
        data: &[u8],
        size: usize,
        base_x: i32,
        base_y: i32,
        field: &HeightField,
        wide_opcodes: bool,
        rotation_offset: u8,
    ) -> Result<RegionTileGrid> {
        let mut grid = RegionTileGrid::new(size, base_x, base_y);
        let mut buf = Buffer::new(data);
        let read = |buf: &mut Buffer<'_>| -> Result<u16> {
            if wide_opcodes {
                buf.read_u16()
            } else {
                buf.read_u8().map(u16::from)
            }
        };

        for plane in 0..PLANES {
            for x in 0..size {
                for y in 0..size {
                    loop {
                        let value = read(&mut buf)?;
                        match value {
                            0 => {
                                let h = grid.implicit_height(field, plane, x, y);
                                grid.heights[plane].set(x, y, h);
                                break;
                            }
                            1 => {
                                let mut h = buf.read_u8()? as i32;
                                if h == 1 {
                                    h = 0;
                                }
                                let below = if plane == 0 {
                                    0
                                } else {
                                    grid.height(plane - 1, x, y)
                                };
                                grid.heights[plane].set(x, y, below - h * HEIGHT_STEP);
                                break;
                            }
                            2..=49 => {
                                let overlay = read(&mut buf)?;
                                let v = (value - 2) as u8;
                                let tile = grid.tile_mut(plane, x, y);
                                tile.overlay = overlay;
                                tile.shape = v / 4;
                                tile.rotation = v.wrapping_add(rotation_offset) & 3;
                            }
                            50..=81 => {
                                grid.tile_mut(plane, x, y).render_flags = (value - 49) as u8;
                            }
                            _ => grid.tile_mut(plane, x, y).underlay = value - 81,
                        }
                    }
                }
            }
        }

        grid.fill_edge_heights(field);
        if buf.remaining() != 0 {
            return Err(SceneError::corrupt(
                "terrain",
                format!("{} trailing bytes after tile stream", buf.remaining()),
            ));
        }
        debug!(base_x, base_y, size, "decoded terrain attributes");
        Ok(grid)
    }

    /// The last corner row and column belong to the next region. They are
    /// filled from the height field so both regions agree on the seam.
    fn fill_edge_heights(&mut self, field: &HeightField) {
        let n = self.size;
        for plane in 0..PLANES {
            for i in 0..=n {
                for (x, y) in [(n, i), (i, n)] {
                    let h = self.implicit_height(field, plane, x, y);
                    self.heights[plane].set(x, y, h);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Trig;

    fn field() -> HeightField {
        HeightField::new(Trig::shared())
    }

    /// One tile region: values for plane 0 then three implicit planes.
    fn single(plane0: &[u8]) -> Vec<u8> {
        let mut out = plane0.to_vec();
        out.extend_from_slice(&[0, 0, 0]);
        out
    }

    #[test]
    fn explicit_height_and_attributes() {
        // underlay 5, flags 2, overlay 7 shape 2 rot 1, explicit height 10
        let data = single(&[86, 51, 11, 7, 1, 10]);
        let grid = RegionTileGrid::decode(&data, 1, 0, 0, &field(), false, 0).unwrap();
        let t = grid.tile(0, 0, 0);
        assert_eq!(t.underlay, 5);
        assert_eq!(t.render_flags, 2);
        assert_eq!(t.overlay, 7);
        assert_eq!((t.shape, t.rotation), (2, 1));
        assert_eq!(grid.height(0, 0, 0), -80);
        assert_eq!(grid.height(1, 0, 0), -80 - 240);
        assert_eq!(grid.height(3, 0, 0), -80 - 720);
    }

    #[test]
    fn explicit_height_one_means_zero() {
        let data = single(&[1, 1]);
        let grid = RegionTileGrid::decode(&data, 1, 0, 0, &field(), false, 0).unwrap();
        assert_eq!(grid.height(0, 0, 0), 0);
    }

    #[test]
    fn implicit_height_uses_field() {
        let f = field();
        let data = single(&[0]);
        let grid = RegionTileGrid::decode(&data, 1, 3200, 3200, &f, false, 0).unwrap();
        let expected = -f.height(3200 + FIELD_OFFSET_X, 3200 + FIELD_OFFSET_Y) * 8;
        assert_eq!(grid.height(0, 0, 0), expected);
    }

    #[test]
    fn wide_values_carry_large_ids() {
        // underlay 300 -> 381, height implicit
        let mut data = vec![0x01, 0x7D, 0x00, 0x00];
        data.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        let grid = RegionTileGrid::decode(&data, 1, 0, 0, &field(), true, 0).unwrap();
        assert_eq!(grid.tile(0, 0, 0).underlay, 300);
    }

    #[test]
    fn rotation_offset_is_added() {
        let data = single(&[2, 1, 0]);
        let grid = RegionTileGrid::decode(&data, 1, 0, 0, &field(), false, 3).unwrap();
        assert_eq!(grid.tile(0, 0, 0).rotation, 3);
    }

    #[test]
    fn truncated_stream_fails() {
        assert!(RegionTileGrid::decode(&[86], 1, 0, 0, &field(), false, 0).is_err());
    }

    #[test]
    fn seam_matches_next_region() {
        let f = field();
        let zeros = vec![0u8; 4 * 2 * 2];
        let west = RegionTileGrid::decode(&zeros, 2, 100, 0, &f, false, 0).unwrap();
        let east = RegionTileGrid::decode(&zeros, 2, 102, 0, &f, false, 0).unwrap();
        for y in 0..=2 {
            assert_eq!(west.height(0, 2, y), east.height(0, 0, y));
        }
    }
}
