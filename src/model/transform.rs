//! In-place geometric and colour transforms on [`IntermediateMesh`].
//!
//! Every method writes through `Arc::make_mut`, so a mesh obtained from
//! [`IntermediateMesh::derive`] only copies the groups it actually touches
//! when they are still shared. Callers that need the source untouched must
//! derive first; cached meshes are never mutated in place.

use std::sync::Arc;

use super::{IntermediateMesh, NO_TEXTURE};
use crate::math::Trig;

impl IntermediateMesh {
    /// Rotate clockwise (seen from above) by `turns` quarter turns.
    pub fn rotate_quarter(&mut self, turns: u8) {
        let turns = turns & 3;
        if turns == 0 {
            return;
        }
        let xs = Arc::make_mut(&mut self.vertices_x);
        let zs = Arc::make_mut(&mut self.vertices_z);
        for (x, z) in xs.iter_mut().zip(zs.iter_mut()) {
            let (ox, oz) = (*x, *z);
            (*x, *z) = match turns {
                1 => (oz, -ox),
                2 => (-ox, -oz),
                _ => (-oz, ox),
            };
        }
    }

    /// Rotate around the Y axis by `angle` 2048ths of a turn.
    pub fn rotate_y(&mut self, trig: &Trig, angle: usize) {
        let sin = trig.sin(angle);
        let cos = trig.cos(angle);
        let xs = Arc::make_mut(&mut self.vertices_x);
        let zs = Arc::make_mut(&mut self.vertices_z);
        for (x, z) in xs.iter_mut().zip(zs.iter_mut()) {
            let (ox, oz) = (*x, *z);
            *x = (ox * cos + oz * sin) >> 16;
            *z = (oz * cos - ox * sin) >> 16;
        }
    }

    /// Mirror across the XY plane. Winding is reversed so faces keep facing
    /// outwards.
    pub fn mirror(&mut self) {
        for z in Arc::make_mut(&mut self.vertices_z).iter_mut() {
            *z = -*z;
        }
        for face in Arc::make_mut(&mut self.faces).iter_mut() {
            face.swap(0, 2);
        }
        if !self.texture_triangles.is_empty() {
            for tri in Arc::make_mut(&mut self.texture_triangles).iter_mut() {
                tri.swap(0, 2);
            }
        }
    }

    pub fn recolor(&mut self, from: u16, to: u16) {
        if !self.face_colors.contains(&from) {
            return;
        }
        for c in Arc::make_mut(&mut self.face_colors).iter_mut() {
            if *c == from {
                *c = to;
            }
        }
    }

    pub fn retexture(&mut self, from: i16, to: i16) {
        let Some(textures) = self.face_textures.as_mut() else {
            return;
        };
        if !textures.contains(&from) {
            return;
        }
        for t in Arc::make_mut(textures).iter_mut() {
            if *t == from {
                *t = to;
            }
        }
    }

    /// Scale each axis by `factor / 128`.
    pub fn resize(&mut self, x: i32, y: i32, z: i32) {
        for (axis, factor) in [
            (&mut self.vertices_x, x),
            (&mut self.vertices_y, y),
            (&mut self.vertices_z, z),
        ] {
            if factor == 128 {
                continue;
            }
            for v in Arc::make_mut(axis).iter_mut() {
                *v = *v * factor / 128;
            }
        }
    }

    pub fn translate(&mut self, dx: i32, dy: i32, dz: i32) {
        for (axis, delta) in [
            (&mut self.vertices_x, dx),
            (&mut self.vertices_y, dy),
            (&mut self.vertices_z, dz),
        ] {
            if delta == 0 {
                continue;
            }
            for v in Arc::make_mut(axis).iter_mut() {
                *v += delta;
            }
        }
    }

    /// Concatenate several meshes into one. Optional tables present on any
    /// part are filled with neutral values for the parts lacking them.
    pub fn merge(parts: &[&IntermediateMesh]) -> IntermediateMesh {
        match parts {
            [] => return IntermediateMesh::default(),
            [only] => return (*only).clone(),
            _ => {}
        }
        let any = |f: fn(&IntermediateMesh) -> bool| parts.iter().any(|m| f(m));
        let has_render_types = any(|m| m.face_render_types.is_some());
        let has_priorities = any(|m| m.face_priorities.is_some());
        let has_alphas = any(|m| m.face_alphas.is_some());
        let has_face_skins = any(|m| m.face_skins.is_some());
        let has_textures = any(|m| m.face_textures.is_some());
        let has_coords = any(|m| m.face_texture_coords.is_some());
        let has_vertex_skins = any(|m| m.vertex_skins.is_some());
        let has_groups = any(|m| m.vertex_groups.is_some());

        let mut out = MergeBuffers::default();
        // A shared priority survives only if every part agrees on it.
        let first_priority = parts[0].priority;
        let per_face = has_priorities || parts.iter().any(|m| m.priority != first_priority);

        for mesh in parts {
            let vertex_base = out.xs.len() as u32;
            let texture_base = out.texture_triangles.len() as i16;
            let fc = mesh.face_count();
            let vc = mesh.vertex_count();

            out.xs.extend_from_slice(&mesh.vertices_x);
            out.ys.extend_from_slice(&mesh.vertices_y);
            out.zs.extend_from_slice(&mesh.vertices_z);
            if has_vertex_skins {
                match &mesh.vertex_skins {
                    Some(s) => out.vertex_skins.extend_from_slice(s),
                    None => out.vertex_skins.extend(std::iter::repeat(0).take(vc)),
                }
            }
            if has_groups {
                match &mesh.vertex_groups {
                    Some(g) => out.groups.extend(g.iter().cloned()),
                    None => out.groups.extend(std::iter::repeat(Vec::new()).take(vc)),
                }
            }

            out.faces.extend(
                mesh.faces
                    .iter()
                    .map(|f| [f[0] + vertex_base, f[1] + vertex_base, f[2] + vertex_base]),
            );
            out.colors.extend_from_slice(&mesh.face_colors);
            if has_render_types {
                (0..fc).for_each(|i| out.render_types.push(mesh.render_type(i)));
            }
            if per_face {
                match &mesh.face_priorities {
                    Some(p) => out.priorities.extend_from_slice(p),
                    None => out
                        .priorities
                        .extend(std::iter::repeat(mesh.priority as i8).take(fc)),
                }
            }
            if has_alphas {
                (0..fc).for_each(|i| out.alphas.push(mesh.alpha(i)));
            }
            if has_face_skins {
                match &mesh.face_skins {
                    Some(s) => out.face_skins.extend_from_slice(s),
                    None => out.face_skins.extend(std::iter::repeat(0).take(fc)),
                }
            }
            if has_textures {
                (0..fc).for_each(|i| out.textures.push(mesh.texture(i)));
            }
            if has_coords {
                match &mesh.face_texture_coords {
                    Some(c) => out.coords.extend(
                        c.iter()
                            .map(|&c| if c >= 0 { c + texture_base } else { c }),
                    ),
                    None => out.coords.extend(std::iter::repeat(NO_TEXTURE).take(fc)),
                }
            }
            out.texture_render_types
                .extend_from_slice(&mesh.texture_render_types);
            out.texture_triangles.extend(mesh.texture_triangles.iter().map(|t| {
                [t[0] + vertex_base, t[1] + vertex_base, t[2] + vertex_base]
            }));
        }

        IntermediateMesh {
            vertices_x: Arc::new(out.xs),
            vertices_y: Arc::new(out.ys),
            vertices_z: Arc::new(out.zs),
            vertex_skins: has_vertex_skins.then(|| Arc::new(out.vertex_skins)),
            vertex_groups: has_groups.then(|| Arc::new(out.groups)),
            faces: Arc::new(out.faces),
            face_colors: Arc::new(out.colors),
            face_render_types: has_render_types.then(|| Arc::new(out.render_types)),
            face_priorities: per_face.then(|| Arc::new(out.priorities)),
            priority: if per_face { 0 } else { first_priority },
            face_alphas: has_alphas.then(|| Arc::new(out.alphas)),
            face_skins: has_face_skins.then(|| Arc::new(out.face_skins)),
            face_textures: has_textures.then(|| Arc::new(out.textures)),
            face_texture_coords: has_coords.then(|| Arc::new(out.coords)),
            texture_render_types: Arc::new(out.texture_render_types),
            texture_triangles: Arc::new(out.texture_triangles),
        }
    }
}

#[derive(Default)]
struct MergeBuffers {
    xs: Vec<i32>,
    ys: Vec<i32>,
    zs: Vec<i32>,
    vertex_skins: Vec<u8>,
    groups: Vec<Vec<super::GroupWeight>>,
    faces: Vec<[u32; 3]>,
    colors: Vec<u16>,
    render_types: Vec<u8>,
    priorities: Vec<i8>,
    alphas: Vec<i8>,
    face_skins: Vec<u8>,
    textures: Vec<i16>,
    coords: Vec<i16>,
    texture_render_types: Vec<u8>,
    texture_triangles: Vec<[u32; 3]>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_meshes::{cube, triangle};
    use crate::model::MeshCopyPlan;

    #[test]
    fn quarter_turns_compose() {
        let mut mesh = triangle(0);
        mesh.rotate_quarter(1);
        // (128, 0, 0) -> (0, 0, -128)
        assert_eq!((mesh.vertices_x[1], mesh.vertices_z[1]), (0, -128));
        mesh.rotate_quarter(3);
        assert_eq!(*mesh.vertices_x, vec![0, 128, 0]);
        assert_eq!(*mesh.vertices_z, vec![0, 0, 128]);
    }

    #[test]
    fn half_turn_by_angle_matches_quarter_turns() {
        let trig = Trig::new();
        let mut by_angle = cube(128, 64, 0);
        by_angle.rotate_y(&trig, 1024);
        let mut by_quarter = cube(128, 64, 0);
        by_quarter.rotate_quarter(2);
        for i in 0..8 {
            assert!((by_angle.vertices_x[i] - by_quarter.vertices_x[i]).abs() <= 1);
            assert!((by_angle.vertices_z[i] - by_quarter.vertices_z[i]).abs() <= 1);
        }
    }

    #[test]
    fn mirror_negates_z_and_flips_winding() {
        let mut mesh = triangle(0);
        mesh.mirror();
        assert_eq!(*mesh.vertices_z, vec![0, 0, -128]);
        assert_eq!(mesh.faces[0], [2, 1, 0]);
    }

    #[test]
    fn mutation_after_share_leaves_source_alone() {
        let source = cube(64, 64, 5);
        let mut copy = source.derive(MeshCopyPlan::SHARE_ALL);
        copy.translate(10, 0, 0);
        copy.recolor(5, 9);
        assert_eq!(source.vertices_x[0], -32);
        assert_eq!(copy.vertices_x[0], -22);
        assert_eq!(source.face_colors[0], 5);
        assert_eq!(copy.face_colors[0], 9);
        // untouched group is still shared
        assert!(Arc::ptr_eq(&source.vertices_y, &copy.vertices_y));
    }

    #[test]
    fn resize_is_fixed_point() {
        let mut mesh = triangle(0);
        mesh.resize(64, 128, 256);
        assert_eq!(*mesh.vertices_x, vec![0, 64, 0]);
        assert_eq!(*mesh.vertices_z, vec![0, 0, 256]);
    }

    #[test]
    fn merge_offsets_indices_and_fills_tables() {
        let a = triangle(1);
        let mut b = triangle(2);
        b.face_alphas = Some(Arc::new(vec![-1]));
        b.face_textures = Some(Arc::new(vec![3]));
        let merged = IntermediateMesh::merge(&[&a, &b]);
        assert_eq!(merged.vertex_count(), 6);
        assert_eq!(*merged.faces, vec![[0, 1, 2], [3, 4, 5]]);
        assert_eq!(merged.face_alphas.as_deref(), Some(&vec![0, -1]));
        assert_eq!(merged.face_textures.as_deref(), Some(&vec![NO_TEXTURE, 3]));
        assert!(merged.validate().is_ok());
    }
}
