//! Mesh writer, the inverse of [`decode`](super::decode).
//!
//! Used for tooling and for building fixtures. Tables the target version
//! cannot hold are dropped: texture render types and animation groups
//! below version 1, texture coordinates below version 2, and extra group
//! weights below version 3.

use std::io::Cursor;

use binrw::BinWrite;

use super::layout::{MeshFooter, MeshVersion, PER_FACE_PRIORITY};
use super::{IntermediateMesh, NO_TEXTURE};
use crate::buffer::put_signed_smart;
use crate::error::{Result, SceneError};

const WHAT: &str = "mesh";
const SMART_RANGE: std::ops::RangeInclusive<i32> = -16384..=16383;

fn smart(out: &mut Vec<u8>, value: i32, name: &str) -> Result<()> {
    if !SMART_RANGE.contains(&value) {
        return Err(SceneError::corrupt(
            WHAT,
            format!("{name} delta {value} does not fit a signed smart"),
        ));
    }
    put_signed_smart(out, value);
    Ok(())
}

fn section_len(len: usize, name: &str) -> Result<u16> {
    u16::try_from(len)
        .map_err(|_| SceneError::corrupt(WHAT, format!("{name} section is {len} bytes")))
}

fn count<T>(len: usize, name: &str) -> Result<T>
where
    T: TryFrom<usize>,
{
    T::try_from(len).map_err(|_| SceneError::corrupt(WHAT, format!("too many {name}: {len}")))
}

/// Serialise `mesh` in the container format of `version`.
pub fn encode(mesh: &IntermediateMesh, version: MeshVersion) -> Result<Vec<u8>> {
    mesh.validate()?;
    let v = mesh.vertex_count();
    let f = mesh.face_count();
    let t = mesh.texture_triangle_count();
    let newer = version >= MeshVersion::V2;

    if mesh.face_priorities.is_none() && mesh.priority == PER_FACE_PRIORITY {
        return Err(SceneError::corrupt(WHAT, "priority 255 is reserved"));
    }

    // ---- vertices ---------------------------------------------------------
    let mut flags = Vec::with_capacity(v);
    let (mut xs, mut ys, mut zs) = (Vec::new(), Vec::new(), Vec::new());
    let (mut px, mut py, mut pz) = (0i32, 0i32, 0i32);
    for i in 0..v {
        let (x, y, z) = (mesh.vertices_x[i], mesh.vertices_y[i], mesh.vertices_z[i]);
        let mut flag = 0u8;
        if x != px {
            smart(&mut xs, x - px, "vertex x")?;
            flag |= 1;
        }
        if y != py {
            smart(&mut ys, y - py, "vertex y")?;
            flag |= 2;
        }
        if z != pz {
            smart(&mut zs, z - pz, "vertex z")?;
            flag |= 4;
        }
        flags.push(flag);
        (px, py, pz) = (x, y, z);
    }

    let anim_groups = match (&mesh.vertex_groups, version) {
        (None, _) | (Some(_), MeshVersion::V0) => None,
        (Some(groups), MeshVersion::V3) => {
            let mut out = Vec::new();
            for weights in groups.iter() {
                out.push(count::<u8>(weights.len(), "group weights")?);
                for w in weights {
                    out.extend_from_slice(&[w.group, w.weight]);
                }
            }
            Some(out)
        }
        (Some(groups), _) => Some(
            groups
                .iter()
                .map(|w| w.first().map_or(0, |g| g.group))
                .collect::<Vec<u8>>(),
        ),
    };

    // ---- face indices -----------------------------------------------------
    let mut index_types = Vec::with_capacity(f);
    let mut index_data = Vec::new();
    let (mut a, mut b, mut c) = (0u32, 0u32, 0u32);
    let mut last = 0i32;
    for &[na, nb, nc] in mesh.faces.iter() {
        let kind = if na == a && nb == c {
            2
        } else if na == c && nb == b {
            3
        } else if na == b && nb == a {
            4
        } else {
            1
        };
        if kind == 1 {
            for idx in [na, nb] {
                smart(&mut index_data, idx as i32 - last, "face index")?;
                last = idx as i32;
            }
        }
        smart(&mut index_data, nc as i32 - last, "face index")?;
        last = nc as i32;
        index_types.push(kind);
        (a, b, c) = (na, nb, nc);
    }

    // ---- texture coordinates ---------------------------------------------
    let texture_coords = match (&mesh.face_textures, &mesh.face_texture_coords) {
        (Some(textures), Some(coords)) if newer && t > 0 => {
            let mut out = Vec::new();
            for (&texture, &coord) in textures.iter().zip(coords.iter()) {
                if texture != NO_TEXTURE {
                    out.push((coord + 1) as u8);
                }
            }
            Some(out)
        }
        (Some(textures), None) if newer && t > 0 => Some(
            textures
                .iter()
                .filter(|&&texture| texture != NO_TEXTURE)
                .map(|_| 0u8)
                .collect(),
        ),
        _ => None,
    };

    // ---- body -------------------------------------------------------------
    let mut out = Vec::new();
    if version >= MeshVersion::V1 {
        out.extend_from_slice(&mesh.texture_render_types);
    }
    out.extend_from_slice(&flags);
    out.extend_from_slice(&xs);
    out.extend_from_slice(&ys);
    out.extend_from_slice(&zs);
    if let Some(skins) = &mesh.vertex_skins {
        out.extend_from_slice(skins);
    }
    if let Some(groups) = &anim_groups {
        out.extend_from_slice(groups);
    }
    for &color in mesh.face_colors.iter() {
        out.extend_from_slice(&color.to_be_bytes());
    }
    if let Some(types) = &mesh.face_render_types {
        out.extend_from_slice(types);
    }
    if let Some(priorities) = &mesh.face_priorities {
        out.extend(priorities.iter().map(|&p| p as u8));
    }
    if let Some(alphas) = &mesh.face_alphas {
        out.extend(alphas.iter().map(|&a| a as u8));
    }
    if let Some(skins) = &mesh.face_skins {
        out.extend_from_slice(skins);
    }
    if let Some(textures) = &mesh.face_textures {
        for &texture in textures.iter() {
            out.extend_from_slice(&((texture as i32 + 1) as u16).to_be_bytes());
        }
    }
    if let Some(coords) = &texture_coords {
        out.extend_from_slice(coords);
    }
    out.extend_from_slice(&index_types);
    out.extend_from_slice(&index_data);
    for tri in mesh.texture_triangles.iter() {
        for &i in tri {
            out.extend_from_slice(&(i as u16).to_be_bytes());
        }
    }

    // ---- footer -----------------------------------------------------------
    let footer = MeshFooter {
        vertex_count: count(v, "vertices")?,
        face_count: count(f, "faces")?,
        texture_triangle_count: count(t, "texture triangles")?,
        has_render_types: mesh.face_render_types.is_some() as u8,
        priority: if mesh.face_priorities.is_some() {
            PER_FACE_PRIORITY
        } else {
            mesh.priority
        },
        has_alphas: mesh.face_alphas.is_some() as u8,
        has_face_skins: mesh.face_skins.is_some() as u8,
        has_face_textures: mesh.face_textures.is_some() as u8,
        has_vertex_skins: mesh.vertex_skins.is_some() as u8,
        has_anim_groups: anim_groups.is_some() as u8,
        has_trailing_block: 0,
        vertex_x_len: section_len(xs.len(), "vertex x")?,
        vertex_y_len: section_len(ys.len(), "vertex y")?,
        vertex_z_len: section_len(zs.len(), "vertex z")?,
        face_index_len: section_len(index_data.len(), "face index")?,
        texture_coord_len: section_len(texture_coords.as_ref().map_or(0, Vec::len), "texture coordinate")?,
        anim_group_len: section_len(anim_groups.as_ref().map_or(0, Vec::len), "anim group")?,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(version.footer_size()));
    footer
        .write_args(&mut cursor, (version.number(),))
        .map_err(|e| SceneError::corrupt(WHAT, format!("footer write failed: {e}")))?;
    out.extend_from_slice(&cursor.into_inner());
    if let Some(marker) = version.marker() {
        out.extend_from_slice(&marker);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::test_meshes::{cube, triangle};
    use crate::model::{decode, GroupWeight};

    #[test]
    fn footer_sizes_match_versions() {
        let empty = IntermediateMesh::default();
        for version in [MeshVersion::V0, MeshVersion::V1, MeshVersion::V2, MeshVersion::V3] {
            let bytes = encode(&empty, version).unwrap();
            assert_eq!(bytes.len(), version.tail_size(), "{:?}", version);
            assert_eq!(MeshVersion::detect(&bytes), version);
        }
    }

    #[test]
    fn cube_survives_every_version() {
        let mesh = cube(128, 96, 0x2345);
        for version in [MeshVersion::V0, MeshVersion::V1, MeshVersion::V2, MeshVersion::V3] {
            let decoded = decode(&encode(&mesh, version).unwrap()).unwrap();
            assert_eq!(decoded.vertices_x, mesh.vertices_x);
            assert_eq!(decoded.vertices_y, mesh.vertices_y);
            assert_eq!(decoded.vertices_z, mesh.vertices_z);
            assert_eq!(decoded.faces, mesh.faces);
            assert_eq!(decoded.face_colors, mesh.face_colors);
        }
    }

    #[test]
    fn strip_encoding_picks_short_forms() {
        let mut mesh = triangle(7);
        mesh.vertices_x = Arc::new(vec![0, 1, 2, 3]);
        mesh.vertices_y = Arc::new(vec![0; 4]);
        mesh.vertices_z = Arc::new(vec![0; 4]);
        mesh.faces = Arc::new(vec![[0, 1, 2], [0, 2, 3], [3, 2, 1], [2, 3, 0]]);
        mesh.face_colors = Arc::new(vec![7; 4]);
        let bytes = encode(&mesh, MeshVersion::V2).unwrap();
        let layout = crate::model::MeshLayout::compute(&bytes).unwrap();
        assert_eq!(&bytes[layout.face_index_types.clone()], &[1, 2, 3, 4]);
        assert_eq!(decode(&bytes).unwrap().faces, mesh.faces);
    }

    #[test]
    fn optional_tables_round_trip_in_v3() {
        let mut mesh = cube(64, 64, 10);
        let fc = mesh.face_count();
        mesh.face_alphas = Some(Arc::new(vec![-1; fc]));
        mesh.face_render_types = Some(Arc::new(vec![1; fc]));
        mesh.face_priorities = Some(Arc::new(vec![3; fc]));
        let mut textures = vec![NO_TEXTURE; fc];
        textures[0] = 40;
        mesh.face_textures = Some(Arc::new(textures));
        mesh.face_texture_coords = Some(Arc::new({
            let mut c = vec![-1i16; fc];
            c[0] = 0;
            c
        }));
        mesh.texture_triangles = Arc::new(vec![[0, 1, 2]]);
        mesh.texture_render_types = Arc::new(vec![0]);
        mesh.vertex_groups = Some(Arc::new(vec![
            vec![
                GroupWeight { group: 1, weight: 100 },
                GroupWeight { group: 2, weight: 155 },
            ];
            8
        ]));

        let decoded = decode(&encode(&mesh, MeshVersion::V3).unwrap()).unwrap();
        assert_eq!(decoded.face_alphas, mesh.face_alphas);
        assert_eq!(decoded.face_render_types, mesh.face_render_types);
        assert_eq!(decoded.face_priorities, mesh.face_priorities);
        assert_eq!(decoded.face_textures, mesh.face_textures);
        assert_eq!(decoded.face_texture_coords, mesh.face_texture_coords);
        assert_eq!(decoded.texture_triangles, mesh.texture_triangles);
        assert_eq!(decoded.vertex_groups, mesh.vertex_groups);
    }

    #[test]
    fn oversized_delta_is_rejected() {
        let mut mesh = triangle(0);
        mesh.vertices_x = Arc::new(vec![0, 20000, 0]);
        assert!(encode(&mesh, MeshVersion::V2).is_err());
    }
}
