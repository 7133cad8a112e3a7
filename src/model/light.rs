//! Per-face-corner colour computation.
//!
//! Lighting runs in two phases so that neighbouring meshes can exchange
//! normals in between:
//!
//! ```text
//! NormalSet::compute(mesh)      face normals -> per-vertex accumulators
//! merge_normals(..)             optional, see merge.rs
//! light_with_normals(..)        accumulators + light vector -> LitMesh
//! ```
//!
//! [`light`] runs both phases back to back.

use std::sync::Arc;

use serde::Serialize;

use super::{Bounds, IntermediateMesh};
use crate::config::LightingParams;
use crate::math::{clamp_lightness, with_lightness};

/// Largest normal component kept before scaling down.
const NORMAL_LIMIT: i64 = 8192;
/// Length of a normalised normal.
const NORMAL_SCALE: i64 = 256;
/// Colour of faces that skip shading.
const UNLIT_COLOR: i32 = 128;

/// Third-colour marker: the face is flat shaded, reuse the first colour.
pub const FLAT_SHADED: i32 = -1;
/// Third-colour marker: the face is not drawn.
pub const HIDDEN_FACE: i32 = -2;

/// Sum of the normals of the faces sharing a vertex, and how many there are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VertexNormal {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub magnitude: i32,
}

impl VertexNormal {
    fn add(&mut self, other: &VertexNormal) {
        self.x += other.x;
        self.y += other.y;
        self.z += other.z;
        self.magnitude += other.magnitude;
    }
}

/// Normals gathered for one mesh, plus anything merged in from neighbours.
#[derive(Debug, Clone, Default)]
pub struct NormalSet {
    pub vertices: Vec<VertexNormal>,
    /// Accumulators including neighbour contributions. Only present once a
    /// merge found a shared vertex.
    pub merged: Option<Vec<VertexNormal>>,
    /// Normals of flat-shaded faces.
    pub faces: Vec<Option<[i32; 3]>>,
    /// Faces buried inside a merged seam.
    pub hidden: Vec<bool>,
}

impl NormalSet {
    pub fn compute(mesh: &IntermediateMesh) -> NormalSet {
        let vc = mesh.vertex_count();
        let fc = mesh.face_count();
        let mut vertices = vec![VertexNormal::default(); vc];
        let mut faces = vec![None; fc];

        for (i, &[a, b, c]) in mesh.faces.iter().enumerate() {
            let (a, b, c) = (a as usize, b as usize, c as usize);
            let [nx, ny, nz] = face_normal(mesh, a, b, c);
            match mesh.render_type(i) {
                0 => {
                    for v in [a, b, c] {
                        vertices[v].add(&VertexNormal {
                            x: nx,
                            y: ny,
                            z: nz,
                            magnitude: 1,
                        });
                    }
                }
                1 => faces[i] = Some([nx, ny, nz]),
                _ => {}
            }
        }

        NormalSet {
            vertices,
            merged: None,
            faces,
            hidden: vec![false; fc],
        }
    }

    pub fn vertex(&self, i: usize) -> VertexNormal {
        match &self.merged {
            Some(merged) => merged[i],
            None => self.vertices[i],
        }
    }
}

fn face_normal(mesh: &IntermediateMesh, a: usize, b: usize, c: usize) -> [i32; 3] {
    let (xs, ys, zs) = (&mesh.vertices_x, &mesh.vertices_y, &mesh.vertices_z);
    let d1 = [
        (xs[b] - xs[a]) as i64,
        (ys[b] - ys[a]) as i64,
        (zs[b] - zs[a]) as i64,
    ];
    let d2 = [
        (xs[c] - xs[a]) as i64,
        (ys[c] - ys[a]) as i64,
        (zs[c] - zs[a]) as i64,
    ];
    let mut n = [
        d1[1] * d2[2] - d2[1] * d1[2],
        d1[2] * d2[0] - d2[2] * d1[0],
        d1[0] * d2[1] - d2[0] * d1[1],
    ];
    while n.iter().any(|v| v.abs() > NORMAL_LIMIT) {
        for v in n.iter_mut() {
            *v >>= 1;
        }
    }
    let len = ((n[0] * n[0] + n[1] * n[1] + n[2] * n[2]) as f64).sqrt() as i64;
    let len = len.max(1);
    n.map(|v| (v * NORMAL_SCALE / len) as i32)
}

/// Lit, renderer-ready mesh. Shares topology and positions with the mesh
/// it was lit from.
#[derive(Debug, Clone, Serialize)]
pub struct LitMesh {
    pub vertices_x: Arc<Vec<i32>>,
    pub vertices_y: Arc<Vec<i32>>,
    pub vertices_z: Arc<Vec<i32>>,
    pub faces: Arc<Vec<[u32; 3]>>,
    /// Packed HSL per corner. A third entry of [`FLAT_SHADED`] or
    /// [`HIDDEN_FACE`] is a marker, not a colour.
    pub face_colors: Arc<Vec<[i32; 3]>>,
    pub face_priorities: Option<Arc<Vec<i8>>>,
    pub priority: u8,
    pub face_alphas: Option<Arc<Vec<i8>>>,
    pub face_textures: Option<Arc<Vec<i16>>>,
    pub face_texture_coords: Option<Arc<Vec<i16>>>,
    pub texture_triangles: Arc<Vec<[u32; 3]>>,
    pub vertex_skins: Option<Arc<Vec<u8>>>,
    pub face_skins: Option<Arc<Vec<u8>>>,
    /// Lighting inputs, kept so contoured copies can be re-lit identically.
    pub ambient: i32,
    pub contrast: i32,
    pub bounds: Bounds,
}

impl LitMesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices_x.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_hidden(&self, face: usize) -> bool {
        self.face_colors[face][2] == HIDDEN_FACE
    }

    /// Copy of this mesh that owns its Y axis; every other array stays
    /// shared.
    pub fn with_own_heights(&self) -> LitMesh {
        LitMesh {
            vertices_y: Arc::new(self.vertices_y.as_ref().clone()),
            ..self.clone()
        }
    }

    pub fn recompute_bounds(&mut self) {
        self.bounds = Bounds::of(&self.vertices_x, &self.vertices_y, &self.vertices_z);
    }
}

/// Light a mesh with its own normals.
pub fn light(
    mesh: &IntermediateMesh,
    ambient: i32,
    contrast: i32,
    light_x: i32,
    light_y: i32,
    light_z: i32,
) -> LitMesh {
    let params = LightingParams {
        ambient,
        contrast,
        light_x,
        light_y,
        light_z,
    };
    light_with_normals(mesh, &NormalSet::compute(mesh), &params)
}

pub fn light_with_normals(
    mesh: &IntermediateMesh,
    normals: &NormalSet,
    params: &LightingParams,
) -> LitMesh {
    let scale = params.scale();
    let shade = |n: &VertexNormal, denominator: i64| params.shade(params.dot(n.x, n.y, n.z), denominator);
    let vertex_light = |v: u32| {
        let n = normals.vertex(v as usize);
        shade(&n, scale.saturating_mul(n.magnitude as i64))
    };
    let flat_light = |face: usize| match normals.faces[face] {
        Some([x, y, z]) => shade(
            &VertexNormal {
                x,
                y,
                z,
                magnitude: 1,
            },
            scale + scale / 2,
        ),
        None => params.ambient,
    };

    let mut colors = Vec::with_capacity(mesh.face_count());
    for (i, &[a, b, c]) in mesh.faces.iter().enumerate() {
        let alpha = mesh.alpha(i);
        let mut render_type = mesh.render_type(i);
        if alpha == -2 {
            render_type = 3;
        }
        if alpha == -1 || normals.hidden.get(i).copied().unwrap_or(false) {
            render_type = 2;
        }
        let base = mesh.face_colors[i] as i32;
        let textured = mesh.texture(i) >= 0;
        let tint = |light: i32| {
            if textured {
                clamp_lightness(light)
            } else {
                with_lightness(base, clamp_lightness(light))
            }
        };

        colors.push(match render_type {
            0 => [tint(vertex_light(a)), tint(vertex_light(b)), tint(vertex_light(c))],
            1 => {
                let color = tint(flat_light(i));
                [color, color, FLAT_SHADED]
            }
            3 => [UNLIT_COLOR, UNLIT_COLOR, FLAT_SHADED],
            _ => [base, base, HIDDEN_FACE],
        });
    }

    LitMesh {
        vertices_x: Arc::clone(&mesh.vertices_x),
        vertices_y: Arc::clone(&mesh.vertices_y),
        vertices_z: Arc::clone(&mesh.vertices_z),
        faces: Arc::clone(&mesh.faces),
        face_colors: Arc::new(colors),
        face_priorities: mesh.face_priorities.clone(),
        priority: mesh.priority,
        face_alphas: mesh.face_alphas.clone(),
        face_textures: mesh.face_textures.clone(),
        face_texture_coords: mesh.face_texture_coords.clone(),
        texture_triangles: Arc::clone(&mesh.texture_triangles),
        vertex_skins: mesh.vertex_skins.clone(),
        face_skins: mesh.face_skins.clone(),
        ambient: params.ambient,
        contrast: params.contrast,
        bounds: mesh.bounds(),
    }
}
