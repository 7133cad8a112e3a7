//! Legacy 3-D object meshes: binary decoding, transforms, lighting and
//! ground contouring.
//!
//! Array storage is split into field groups held behind `Arc`, so derived
//! meshes decide per group whether they share their parent's arrays or own a
//! copy (see [`CloneMode`]).

pub mod contour;
pub mod decode;
pub mod encode;
pub mod layout;
pub mod light;
pub mod merge;
pub mod transform;

use std::sync::Arc;

use serde::Serialize;

pub use contour::{contour, ContourMode};
pub use decode::decode;
pub use encode::encode;
pub use layout::{MeshLayout, MeshVersion};
pub use light::{light, LitMesh, NormalSet, VertexNormal};

/// Sentinel for "no texture" in face texture arrays.
pub const NO_TEXTURE: i16 = -1;

/// One entry of a vertex's animation-group weight list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GroupWeight {
    pub group: u8,
    pub weight: u8,
}

/// Whether a derived mesh shares an array group with its source or takes
/// its own copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneMode {
    Share,
    Copy,
}

impl CloneMode {
    pub fn share_if(share: bool) -> Self {
        if share {
            CloneMode::Share
        } else {
            CloneMode::Copy
        }
    }

    fn apply<T: Clone>(self, arr: &Arc<Vec<T>>) -> Arc<Vec<T>> {
        match self {
            CloneMode::Share => Arc::clone(arr),
            CloneMode::Copy => Arc::new(arr.as_ref().clone()),
        }
    }

    fn apply_opt<T: Clone>(self, arr: &Option<Arc<Vec<T>>>) -> Option<Arc<Vec<T>>> {
        arr.as_ref().map(|a| self.apply(a))
    }
}

/// Per-group clone decisions used by [`IntermediateMesh::derive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshCopyPlan {
    pub positions: CloneMode,
    pub colors: CloneMode,
    pub textures: CloneMode,
    pub alphas: CloneMode,
}

impl MeshCopyPlan {
    pub const SHARE_ALL: MeshCopyPlan = MeshCopyPlan {
        positions: CloneMode::Share,
        colors: CloneMode::Share,
        textures: CloneMode::Share,
        alphas: CloneMode::Share,
    };

    pub const COPY_ALL: MeshCopyPlan = MeshCopyPlan {
        positions: CloneMode::Copy,
        colors: CloneMode::Copy,
        textures: CloneMode::Copy,
        alphas: CloneMode::Copy,
    };
}

/// Decoded, unlit mesh.
///
/// Invariant: every per-vertex array has `vertex_count()` entries, every
/// per-face array has `face_count()` entries, and all indices are in range.
#[derive(Debug, Clone, Default)]
pub struct IntermediateMesh {
    pub vertices_x: Arc<Vec<i32>>,
    pub vertices_y: Arc<Vec<i32>>,
    pub vertices_z: Arc<Vec<i32>>,
    pub vertex_skins: Option<Arc<Vec<u8>>>,
    pub vertex_groups: Option<Arc<Vec<Vec<GroupWeight>>>>,

    pub faces: Arc<Vec<[u32; 3]>>,
    pub face_colors: Arc<Vec<u16>>,
    pub face_render_types: Option<Arc<Vec<u8>>>,
    pub face_priorities: Option<Arc<Vec<i8>>>,
    /// Priority for every face when there is no per-face table.
    pub priority: u8,
    pub face_alphas: Option<Arc<Vec<i8>>>,
    pub face_skins: Option<Arc<Vec<u8>>>,
    pub face_textures: Option<Arc<Vec<i16>>>,
    pub face_texture_coords: Option<Arc<Vec<i16>>>,

    pub texture_render_types: Arc<Vec<u8>>,
    pub texture_triangles: Arc<Vec<[u32; 3]>>,
}

/// Axis-aligned bounds plus the cylinder figures used by contouring and
/// shadow sizing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Bounds {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
    pub min_z: i32,
    pub max_z: i32,
    /// Largest horizontal distance from the origin, rounded up.
    pub xz_radius: i32,
    /// Height above the origin (y grows downwards).
    pub height: i32,
}

impl Bounds {
    pub fn of(xs: &[i32], ys: &[i32], zs: &[i32]) -> Self {
        if xs.is_empty() {
            return Bounds::default();
        }
        let mut b = Bounds {
            min_x: i32::MAX,
            max_x: i32::MIN,
            min_y: i32::MAX,
            max_y: i32::MIN,
            min_z: i32::MAX,
            max_z: i32::MIN,
            xz_radius: 0,
            height: 0,
        };
        let mut max_sq = 0i64;
        for ((&x, &y), &z) in xs.iter().zip(ys).zip(zs) {
            b.min_x = b.min_x.min(x);
            b.max_x = b.max_x.max(x);
            b.min_y = b.min_y.min(y);
            b.max_y = b.max_y.max(y);
            b.min_z = b.min_z.min(z);
            b.max_z = b.max_z.max(z);
            b.height = b.height.max(-y);
            max_sq = max_sq.max(x as i64 * x as i64 + z as i64 * z as i64);
        }
        b.xz_radius = ((max_sq as f64).sqrt() + 0.99) as i32;
        b
    }
}

impl IntermediateMesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices_x.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn texture_triangle_count(&self) -> usize {
        self.texture_triangles.len()
    }

    pub fn render_type(&self, face: usize) -> u8 {
        self.face_render_types.as_ref().map_or(0, |t| t[face])
    }

    pub fn alpha(&self, face: usize) -> i8 {
        self.face_alphas.as_ref().map_or(0, |a| a[face])
    }

    pub fn texture(&self, face: usize) -> i16 {
        self.face_textures.as_ref().map_or(NO_TEXTURE, |t| t[face])
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::of(&self.vertices_x, &self.vertices_y, &self.vertices_z)
    }

    /// Copy of this mesh whose array groups are shared or copied per `plan`.
    /// Topology and the remaining per-face tables are always shared.
    pub fn derive(&self, plan: MeshCopyPlan) -> IntermediateMesh {
        IntermediateMesh {
            vertices_x: plan.positions.apply(&self.vertices_x),
            vertices_y: plan.positions.apply(&self.vertices_y),
            vertices_z: plan.positions.apply(&self.vertices_z),
            vertex_skins: self.vertex_skins.clone(),
            vertex_groups: self.vertex_groups.clone(),
            faces: Arc::clone(&self.faces),
            face_colors: plan.colors.apply(&self.face_colors),
            face_render_types: self.face_render_types.clone(),
            face_priorities: self.face_priorities.clone(),
            priority: self.priority,
            face_alphas: plan.alphas.apply_opt(&self.face_alphas),
            face_skins: self.face_skins.clone(),
            face_textures: plan.textures.apply_opt(&self.face_textures),
            face_texture_coords: self.face_texture_coords.clone(),
            texture_render_types: Arc::clone(&self.texture_render_types),
            texture_triangles: Arc::clone(&self.texture_triangles),
        }
    }

    /// Check the length and index invariants.
    pub fn validate(&self) -> crate::Result<()> {
        use crate::SceneError;

        let vc = self.vertex_count();
        let fc = self.face_count();
        if self.vertices_y.len() != vc || self.vertices_z.len() != vc {
            return Err(SceneError::corrupt("mesh", "vertex axis lengths differ"));
        }
        let per_vertex = [
            self.vertex_skins.as_ref().map(|v| v.len()),
            self.vertex_groups.as_ref().map(|v| v.len()),
        ];
        if per_vertex.iter().flatten().any(|&n| n != vc) {
            return Err(SceneError::corrupt("mesh", "per-vertex table length mismatch"));
        }
        let per_face = [
            Some(self.face_colors.len()),
            self.face_render_types.as_ref().map(|v| v.len()),
            self.face_priorities.as_ref().map(|v| v.len()),
            self.face_alphas.as_ref().map(|v| v.len()),
            self.face_skins.as_ref().map(|v| v.len()),
            self.face_textures.as_ref().map(|v| v.len()),
            self.face_texture_coords.as_ref().map(|v| v.len()),
        ];
        if per_face.iter().flatten().any(|&n| n != fc) {
            return Err(SceneError::corrupt("mesh", "per-face table length mismatch"));
        }
        if self.texture_render_types.len() != self.texture_triangle_count() {
            return Err(SceneError::corrupt("mesh", "texture table length mismatch"));
        }
        let in_range = |tri: &[u32; 3]| tri.iter().all(|&i| (i as usize) < vc);
        if !self.faces.iter().all(in_range) {
            return Err(SceneError::corrupt("mesh", "face index out of range"));
        }
        if !self.texture_triangles.iter().all(in_range) {
            return Err(SceneError::corrupt("mesh", "texture vertex out of range"));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_meshes {
    use super::*;

    /// Axis-aligned box `size` wide and `height` tall standing on the origin,
    /// 8 vertices and 12 faces with a single colour.
    pub fn cube(size: i32, height: i32, color: u16) -> IntermediateMesh {
        let h = size / 2;
        let xs = vec![-h, h, h, -h, -h, h, h, -h];
        let ys = vec![0, 0, 0, 0, -height, -height, -height, -height];
        let zs = vec![-h, -h, h, h, -h, -h, h, h];
        let faces = vec![
            [0, 1, 2],
            [0, 2, 3],
            [4, 6, 5],
            [4, 7, 6],
            [0, 4, 5],
            [0, 5, 1],
            [1, 5, 6],
            [1, 6, 2],
            [2, 6, 7],
            [2, 7, 3],
            [3, 7, 4],
            [3, 4, 0],
        ];
        let fc = faces.len();
        IntermediateMesh {
            vertices_x: Arc::new(xs),
            vertices_y: Arc::new(ys),
            vertices_z: Arc::new(zs),
            faces: Arc::new(faces),
            face_colors: Arc::new(vec![color; fc]),
            ..Default::default()
        }
    }

    /// Single flat triangle in the XZ plane.
    pub fn triangle(color: u16) -> IntermediateMesh {
        IntermediateMesh {
            vertices_x: Arc::new(vec![0, 128, 0]),
            vertices_y: Arc::new(vec![0, 0, 0]),
            vertices_z: Arc::new(vec![0, 0, 128]),
            faces: Arc::new(vec![[0, 1, 2]]),
            face_colors: Arc::new(vec![color]),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_meshes::cube;
    use super::*;

    #[test]
    fn bounds_of_cube() {
        let b = cube(100, 80, 0).bounds();
        assert_eq!((b.min_x, b.max_x), (-50, 50));
        assert_eq!((b.min_y, b.max_y), (-80, 0));
        assert_eq!(b.height, 80);
        // sqrt(50² + 50²) = 70.7 rounds up
        assert_eq!(b.xz_radius, 71);
    }

    #[test]
    fn derive_shares_or_copies_per_group() {
        let mesh = cube(100, 80, 0);
        let plan = MeshCopyPlan {
            positions: CloneMode::Copy,
            ..MeshCopyPlan::SHARE_ALL
        };
        let derived = mesh.derive(plan);
        assert!(!Arc::ptr_eq(&mesh.vertices_x, &derived.vertices_x));
        assert!(Arc::ptr_eq(&mesh.face_colors, &derived.face_colors));
        assert!(Arc::ptr_eq(&mesh.faces, &derived.faces));
        assert_eq!(mesh.vertices_x, derived.vertices_x);
    }

    #[test]
    fn validate_catches_bad_index() {
        let mut mesh = cube(10, 10, 0);
        assert!(mesh.validate().is_ok());
        Arc::make_mut(&mut mesh.faces)[0] = [0, 1, 99];
        assert!(mesh.validate().is_err());
    }
}
