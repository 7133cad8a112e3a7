//! Tile tessellation.
//!
//! Each of the 13 tile shapes lists the local vertices it uses and the
//! triangles built from them. Vertex types name a point on the tile:
//!
//! ```text
//!  7 ---- 6 ---- 5        corners 1 3 5 7, edge midpoints 2 4 6 8,
//!  |  16  11  15 |        inner cross 9..12, inner diagonal 13..16
//!  8  12      10 4
//!  |  13   9  14 |
//!  1 ---- 2 ---- 3        (x grows right, z grows up)
//! ```
//!
//! Triangles are `(overlay, a, b, c)` where `a`, `b`, `c` index the shape's
//! vertex list.

use bytemuck::{Pod, Zeroable};
use serde::Serialize;

use crate::math::VOID_COLOR;

pub const TILE_SIZE: i32 = 128;
pub const SHAPE_COUNT: usize = 13;

const SHAPE_VERTICES: [&[u8]; SHAPE_COUNT] = [
    &[1, 3, 5, 7],
    &[1, 3, 5, 7],
    &[1, 3, 5, 7],
    &[1, 3, 5, 7, 6],
    &[1, 3, 5, 7, 6],
    &[1, 3, 5, 7, 6],
    &[1, 3, 5, 7, 6],
    &[1, 3, 5, 7, 2, 6],
    &[1, 3, 5, 7, 2, 8],
    &[1, 3, 5, 7, 2, 8],
    &[1, 3, 5, 7, 11, 12],
    &[1, 3, 5, 7, 11, 12],
    &[1, 3, 5, 7, 13, 14],
];

const SHAPE_FACES: [&[u8]; SHAPE_COUNT] = [
    &[0, 1, 2, 3, 0, 0, 1, 3],
    &[1, 1, 2, 3, 1, 0, 1, 3],
    &[0, 1, 2, 3, 1, 0, 1, 3],
    &[0, 0, 1, 2, 0, 0, 2, 4, 1, 0, 4, 3],
    &[0, 0, 1, 4, 0, 0, 4, 3, 1, 1, 2, 4],
    &[0, 0, 4, 3, 1, 0, 1, 2, 1, 0, 2, 4],
    &[0, 1, 2, 4, 1, 0, 1, 4, 1, 0, 4, 3],
    &[0, 4, 1, 2, 0, 4, 2, 5, 1, 0, 4, 5, 1, 0, 5, 3],
    &[0, 4, 1, 2, 0, 4, 2, 3, 0, 4, 3, 5, 1, 0, 4, 5],
    &[0, 0, 4, 5, 1, 4, 1, 2, 1, 4, 2, 3, 1, 4, 3, 5],
    &[0, 0, 1, 5, 0, 1, 4, 5, 0, 1, 2, 4, 1, 0, 5, 3, 1, 5, 4, 3, 1, 4, 2, 3],
    &[1, 0, 1, 5, 1, 1, 4, 5, 1, 1, 2, 4, 0, 0, 5, 3, 0, 5, 4, 3, 0, 4, 2, 3],
    &[1, 0, 5, 4, 1, 0, 1, 5, 0, 0, 4, 3, 0, 4, 5, 3, 0, 5, 2, 3, 0, 1, 2, 5],
];

/// Inputs for one tile, corners ordered SW, SE, NE, NW.
#[derive(Debug, Clone, Copy)]
pub struct TileCorners {
    pub heights: [i32; 4],
    /// Shaded underlay colours.
    pub underlay: [i32; 4],
    /// Shaded overlay colours.
    pub overlay: [i32; 4],
    /// Overlay texture, -1 for none.
    pub texture: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize)]
pub struct TileVertex {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    /// Packed HSL.
    pub color: i32,
    pub u: f32,
    pub v: f32,
    pub texture: i32,
}

/// Tessellated geometry of one tile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneTileModel {
    pub shape: u8,
    pub rotation: u8,
    pub triangles: Vec<[TileVertex; 3]>,
}

impl SceneTileModel {
    /// Flat vertex buffer, three vertices per triangle.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.triangles.as_slice())
    }
}

fn rotate_vertex_type(t: u8, rotation: u8) -> u8 {
    let (t, r) = (t as i32, rotation as i32);
    let rotated = match t {
        2 | 4 | 6 | 8 => ((t - 2 * r - 1) & 7) + 1,
        9..=12 => ((t - 9 - r) & 3) + 9,
        13..=16 => ((t - 13 - r) & 3) + 13,
        _ => t,
    };
    rotated as u8
}

/// Local (x, z) plus the corner pair whose values it averages. Pairs of
/// equal corners take that corner's value unchanged.
fn vertex_layout(t: u8) -> (i32, i32, usize, usize) {
    const SW: usize = 0;
    const SE: usize = 1;
    const NE: usize = 2;
    const NW: usize = 3;
    match t {
        1 => (0, 0, SW, SW),
        2 => (64, 0, SW, SE),
        3 => (128, 0, SE, SE),
        4 => (128, 64, SE, NE),
        5 => (128, 128, NE, NE),
        6 => (64, 128, NE, NW),
        7 => (0, 128, NW, NW),
        8 => (0, 64, NW, SW),
        9 => (64, 32, SW, SE),
        10 => (96, 64, SE, NE),
        11 => (64, 96, NE, NW),
        12 => (32, 64, NW, SW),
        13 => (32, 32, SW, SW),
        14 => (96, 32, SE, SE),
        15 => (96, 96, NE, NE),
        _ => (32, 96, NW, NW),
    }
}

fn mix(values: &[i32; 4], a: usize, b: usize) -> i32 {
    if a == b {
        values[a]
    } else {
        (values[a] + values[b]) >> 1
    }
}

struct LocalVertex {
    x: i32,
    z: i32,
    height: i32,
    underlay: i32,
    overlay: i32,
}

/// Tessellate one tile at tile position (`tile_x`, `tile_y`).
///
/// `shape` is 0 for a plain underlay tile, otherwise the overlay shape + 1.
pub fn tessellate(
    shape: u8,
    rotation: u8,
    tile_x: i32,
    tile_y: i32,
    corners: &TileCorners,
) -> SceneTileModel {
    let shape_index = (shape as usize).min(SHAPE_COUNT - 1);
    let rotation = rotation & 3;

    let vertices: Vec<LocalVertex> = SHAPE_VERTICES[shape_index]
        .iter()
        .map(|&t| {
            let (x, z, a, b) = vertex_layout(rotate_vertex_type(t, rotation));
            LocalVertex {
                x,
                z,
                height: mix(&corners.heights, a, b),
                underlay: mix(&corners.underlay, a, b),
                overlay: mix(&corners.overlay, a, b),
            }
        })
        .collect();

    let local = |i: u8| -> usize {
        if i < 4 {
            ((i as i32 - rotation as i32) & 3) as usize
        } else {
            i as usize
        }
    };

    let mut triangles = Vec::new();
    for face in SHAPE_FACES[shape_index].chunks_exact(4) {
        let is_overlay = face[0] == 1;
        let texture = if is_overlay { corners.texture } else { -1 };
        let tri = [local(face[1]), local(face[2]), local(face[3])].map(|i| {
            let v = &vertices[i];
            TileVertex {
                x: tile_x * TILE_SIZE + v.x,
                y: v.height,
                z: tile_y * TILE_SIZE + v.z,
                color: if is_overlay { v.overlay } else { v.underlay },
                u: v.x as f32 / TILE_SIZE as f32,
                v: v.z as f32 / TILE_SIZE as f32,
                texture,
            }
        });
        if tri[0].color == VOID_COLOR && texture < 0 {
            continue;
        }
        triangles.push(tri);
    }

    SceneTileModel {
        shape,
        rotation,
        triangles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn flat(colour: i32) -> TileCorners {
        TileCorners {
            heights: [-80; 4],
            underlay: [colour; 4],
            overlay: [colour + 1; 4],
            texture: -1,
        }
    }

    #[test]
    fn shape_zero_is_two_triangles_on_the_corners() {
        let model = tessellate(0, 0, 0, 0, &flat(1000));
        assert_eq!(model.triangles.len(), 2);
        let points: BTreeSet<(i32, i32)> = model
            .triangles
            .iter()
            .flatten()
            .map(|v| (v.x, v.z))
            .collect();
        let expected: BTreeSet<_> = [(0, 0), (128, 0), (128, 128), (0, 128)].into_iter().collect();
        assert_eq!(points, expected);
        assert!(model.triangles.iter().flatten().all(|v| v.y == -80 && v.color == 1000));
    }

    #[test]
    fn every_shape_and_rotation_stays_on_the_tile() {
        for shape in 0..SHAPE_COUNT as u8 {
            for rotation in 0..4 {
                let model = tessellate(shape, rotation, 2, 3, &flat(1000));
                assert_eq!(model.triangles.len(), SHAPE_FACES[shape as usize].len() / 4);
                for v in model.triangles.iter().flatten() {
                    assert!((256..=384).contains(&v.x));
                    assert!((384..=512).contains(&v.z));
                    assert!((0.0..=1.0).contains(&v.u));
                }
            }
        }
    }

    #[test]
    fn rotation_moves_overlay_half() {
        // shape 2 (overlay shape 1): one underlay and one overlay triangle
        let unrotated = tessellate(2, 0, 0, 0, &flat(1000));
        let rotated = tessellate(2, 1, 0, 0, &flat(1000));
        let overlay_points = |m: &SceneTileModel| -> BTreeSet<(i32, i32)> {
            m.triangles
                .iter()
                .filter(|t| t[0].color == 1001)
                .flatten()
                .map(|v| (v.x, v.z))
                .collect()
        };
        assert_ne!(overlay_points(&unrotated), overlay_points(&rotated));
    }

    #[test]
    fn midpoints_average_corners() {
        let corners = TileCorners {
            heights: [0, -100, -100, 0],
            ..flat(1000)
        };
        // shape 3 uses vertex 6 (north midpoint) between NE and NW
        let model = tessellate(3, 0, 0, 0, &corners);
        let mid = model
            .triangles
            .iter()
            .flatten()
            .find(|v| (v.x, v.z) == (64, 128))
            .copied()
            .unwrap();
        assert_eq!(mid.y, -50);
    }

    #[test]
    fn void_untextured_triangles_are_dropped() {
        let mut corners = flat(VOID_COLOR);
        corners.overlay = [VOID_COLOR; 4];
        assert!(tessellate(0, 0, 0, 0, &corners).triangles.is_empty());
        corners.texture = 5;
        assert_eq!(tessellate(1, 0, 0, 0, &corners).triangles.len(), 2);
    }

    #[test]
    fn vertex_buffer_is_packed() {
        let model = tessellate(0, 0, 0, 0, &flat(1));
        assert_eq!(model.vertex_bytes().len(), 2 * 3 * 28);
    }
}
