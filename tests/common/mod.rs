// Common fixtures for the integration tests: synthetic meshes, definition
// streams and region byte streams.
#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use region_scene::landscape::{encode_spawns, Spawn};
use region_scene::model::{encode, IntermediateMesh, MeshVersion};

/// Axis-aligned box standing on y = 0 (y grows downwards), centred on the
/// origin in x/z.
pub fn box_mesh(size: i32, height: i32, color: u16) -> IntermediateMesh {
    let h = size / 2;
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let mut zs = Vec::new();
    for y in [0, -height] {
        for (x, z) in [(-h, -h), (h, -h), (h, h), (-h, h)] {
            xs.push(x);
            ys.push(y);
            zs.push(z);
        }
    }
    let faces: Vec<[u32; 3]> = vec![
        // bottom, top
        [0, 2, 1],
        [0, 3, 2],
        [4, 5, 6],
        [4, 6, 7],
        // sides
        [0, 1, 5],
        [0, 5, 4],
        [1, 2, 6],
        [1, 6, 5],
        [2, 3, 7],
        [2, 7, 6],
        [3, 0, 4],
        [3, 4, 7],
    ];
    IntermediateMesh {
        vertices_x: Arc::new(xs),
        vertices_y: Arc::new(ys),
        vertices_z: Arc::new(zs),
        face_colors: Arc::new(vec![color; faces.len()]),
        faces: Arc::new(faces),
        ..Default::default()
    }
}

pub fn box_bytes() -> Vec<u8> {
    encode(&box_mesh(64, 128, 0x1234), MeshVersion::V2).expect("box encodes")
}

/// Object definition with a single model (mesh 1) for placement `kind`,
/// followed by `extra` opcodes.
pub fn object_def(kind: u8, extra: &[u8]) -> Vec<u8> {
    let mut out = vec![1, 1, 0, 1, kind];
    out.extend_from_slice(extra);
    out.push(0);
    out
}

pub fn underlay_def(rgb: u32) -> Vec<u8> {
    let [_, r, g, b] = rgb.to_be_bytes();
    vec![1, r, g, b, 0]
}

/// Narrow terrain stream: plane 0 fully covered by `underlay` with implicit
/// heights, upper planes empty.
pub fn ground_terrain(size: usize, underlay: u8) -> Vec<u8> {
    let mut out = Vec::new();
    for _ in 0..size * size {
        out.extend_from_slice(&[81 + underlay, 0]);
    }
    out.extend(std::iter::repeat(0).take(3 * size * size));
    out
}

pub fn spawn(id: u32, kind: u8, rotation: u8, x: u8, y: u8) -> Spawn {
    Spawn {
        id,
        kind,
        rotation,
        local_x: x,
        local_y: y,
        plane: 0,
    }
}

pub fn landscape(spawns: &[Spawn]) -> Vec<u8> {
    let mut sorted = spawns.to_vec();
    sorted.sort_by_key(|s| (s.id, s.plane, s.local_x, s.local_y));
    encode_spawns(&sorted).expect("spawns encode")
}

/// Write `<root>/<dir>/<id>.dat`.
pub fn write_asset(root: &Path, dir: &str, id: u32, bytes: &[u8]) {
    let dir = root.join(dir);
    fs::create_dir_all(&dir).expect("create asset dir");
    fs::write(dir.join(format!("{id}.dat")), bytes).expect("write asset");
}
