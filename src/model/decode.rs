//! Shared decode routine for all four mesh versions.
//!
//! [`MeshLayout::compute`] turns the footer into section ranges; everything
//! below reads those sections with one cursor per stream. Each cursor is
//! bounded by the end of its own section, so a stream that holds fewer
//! values than the counts demand fails instead of bleeding into the next.

use std::sync::Arc;

use tracing::trace;

use super::layout::{MeshLayout, MeshVersion, PER_FACE_PRIORITY};
use super::{GroupWeight, IntermediateMesh, NO_TEXTURE};
use crate::buffer::Buffer;
use crate::error::{Result, SceneError};

const WHAT: &str = "mesh";

/// Decode a mesh buffer of any supported version.
pub fn decode(data: &[u8]) -> Result<IntermediateMesh> {
    let layout = MeshLayout::compute(data)?;
    decode_with_layout(data, &layout)
}

fn section<'a>(data: &'a [u8], range: &std::ops::Range<usize>) -> Buffer<'a> {
    Buffer::at(&data[..range.end], range.start)
}

fn expect_consumed(buf: &Buffer<'_>, name: &str) -> Result<()> {
    if buf.remaining() != 0 {
        return Err(SceneError::corrupt(
            WHAT,
            format!("{name} section has {} unread bytes", buf.remaining()),
        ));
    }
    Ok(())
}

pub fn decode_with_layout(data: &[u8], layout: &MeshLayout) -> Result<IntermediateMesh> {
    decode_sections(data, layout).map_err(|e| e.into_corrupt(WHAT))
}

fn decode_sections(data: &[u8], layout: &MeshLayout) -> Result<IntermediateMesh> {
    let footer = &layout.footer;
    let vertex_count = footer.vertex_count();
    let face_count = footer.face_count();
    let tex_count = footer.texture_triangle_count();

    // ---- vertices ---------------------------------------------------------
    let mut flags = section(data, &layout.vertex_flags);
    let mut xs = section(data, &layout.vertex_x);
    let mut ys = section(data, &layout.vertex_y);
    let mut zs = section(data, &layout.vertex_z);

    let mut vertices_x = Vec::with_capacity(vertex_count);
    let mut vertices_y = Vec::with_capacity(vertex_count);
    let mut vertices_z = Vec::with_capacity(vertex_count);
    let (mut x, mut y, mut z) = (0i32, 0i32, 0i32);
    for _ in 0..vertex_count {
        let flag = flags.read_u8()?;
        if flag & 1 != 0 {
            x += xs.read_signed_smart()?;
        }
        if flag & 2 != 0 {
            y += ys.read_signed_smart()?;
        }
        if flag & 4 != 0 {
            z += zs.read_signed_smart()?;
        }
        vertices_x.push(x);
        vertices_y.push(y);
        vertices_z.push(z);
    }
    expect_consumed(&xs, "vertex x")?;
    expect_consumed(&ys, "vertex y")?;
    expect_consumed(&zs, "vertex z")?;

    let vertex_skins = match &layout.vertex_skins {
        Some(range) => Some(data[range.clone()].to_vec()),
        None => None,
    };

    let vertex_groups = match &layout.anim_groups {
        Some(range) if layout.version == MeshVersion::V3 => {
            let mut buf = section(data, range);
            let mut groups = Vec::with_capacity(vertex_count);
            for _ in 0..vertex_count {
                let n = buf.read_u8()? as usize;
                let mut weights = Vec::with_capacity(n);
                for _ in 0..n {
                    let group = buf.read_u8()?;
                    let weight = buf.read_u8()?;
                    weights.push(GroupWeight { group, weight });
                }
                groups.push(weights);
            }
            expect_consumed(&buf, "anim group")?;
            Some(groups)
        }
        Some(range) => Some(
            data[range.clone()]
                .iter()
                .map(|&group| vec![GroupWeight { group, weight: 255 }])
                .collect(),
        ),
        None => None,
    };

    // ---- per-face attributes ---------------------------------------------
    let mut colors = section(data, &layout.face_colors);
    let mut face_colors = Vec::with_capacity(face_count);
    for _ in 0..face_count {
        face_colors.push(colors.read_u16()?);
    }

    let face_render_types = layout
        .face_render_types
        .as_ref()
        .map(|r| data[r.clone()].to_vec());
    let face_priorities = layout
        .face_priorities
        .as_ref()
        .map(|r| data[r.clone()].iter().map(|&b| b as i8).collect::<Vec<_>>());
    let face_alphas = layout
        .face_alphas
        .as_ref()
        .map(|r| data[r.clone()].iter().map(|&b| b as i8).collect::<Vec<_>>());
    let face_skins = layout.face_skins.as_ref().map(|r| data[r.clone()].to_vec());

    let face_textures = match &layout.face_textures {
        Some(range) => {
            let mut buf = section(data, range);
            let mut textures = Vec::with_capacity(face_count);
            for _ in 0..face_count {
                textures.push((buf.read_u16()? as i32 - 1) as i16);
            }
            Some(textures)
        }
        None => None,
    };

    // Coordinates only exist for textured faces, so the stream is sparse.
    let face_texture_coords = match (&layout.texture_coords, &face_textures) {
        (Some(range), Some(textures)) => {
            let mut buf = section(data, range);
            let mut coords = Vec::with_capacity(face_count);
            for &texture in textures {
                if texture != NO_TEXTURE {
                    let coord = buf.read_u8()? as i32 - 1;
                    if coord >= tex_count as i32 {
                        return Err(SceneError::corrupt(
                            WHAT,
                            format!("texture coordinate {coord} >= {tex_count}"),
                        ));
                    }
                    coords.push(coord as i16);
                } else {
                    coords.push(-1);
                }
            }
            expect_consumed(&buf, "texture coordinate")?;
            Some(coords)
        }
        _ => None,
    };

    // ---- face indices -----------------------------------------------------
    let mut types = section(data, &layout.face_index_types);
    let mut deltas = section(data, &layout.face_indices);
    let faces = decode_face_indices(&mut types, &mut deltas, face_count, vertex_count)?;
    expect_consumed(&deltas, "face index")?;

    // ---- texture triangles ----------------------------------------------
    let texture_render_types = match &layout.texture_render_types {
        Some(range) => data[range.clone()].to_vec(),
        None => vec![0; tex_count],
    };
    let mut tex = section(data, &layout.texture_vertices);
    let mut texture_triangles = Vec::with_capacity(tex_count);
    for _ in 0..tex_count {
        let tri = [
            tex.read_u16()? as u32,
            tex.read_u16()? as u32,
            tex.read_u16()? as u32,
        ];
        if tri.iter().any(|&i| i as usize >= vertex_count) {
            return Err(SceneError::corrupt(
                WHAT,
                format!("texture triangle {:?} references missing vertex", tri),
            ));
        }
        texture_triangles.push(tri);
    }

    let priority = if footer.priority == PER_FACE_PRIORITY {
        0
    } else {
        footer.priority
    };

    trace!(
        version = layout.version.number(),
        vertex_count,
        face_count,
        tex_count,
        trailing = layout.trailing.as_ref().map_or(0, |r| r.len()),
        "decoded mesh"
    );

    Ok(IntermediateMesh {
        vertices_x: Arc::new(vertices_x),
        vertices_y: Arc::new(vertices_y),
        vertices_z: Arc::new(vertices_z),
        vertex_skins: vertex_skins.map(Arc::new),
        vertex_groups: vertex_groups.map(Arc::new),
        faces: Arc::new(faces),
        face_colors: Arc::new(face_colors),
        face_render_types: face_render_types.map(Arc::new),
        face_priorities: face_priorities.map(Arc::new),
        priority,
        face_alphas: face_alphas.map(Arc::new),
        face_skins: face_skins.map(Arc::new),
        face_textures: face_textures.map(Arc::new),
        face_texture_coords: face_texture_coords.map(Arc::new),
        texture_render_types: Arc::new(texture_render_types),
        texture_triangles: Arc::new(texture_triangles),
    })
}

/// Rebuild triangles from the strip/fan encoding.
///
/// Three registers hold the previous triangle; every delta is relative to
/// the last index read, whichever register it went into.
///
/// ```text
/// 1  a, b, c = three new indices
/// 2  b = c, c = new          (a, old c, new)
/// 3  a = c, c = new          (old c, b, new)
/// 4  swap a and b, c = new   (old b, old a, new)
/// ```
pub fn decode_face_indices(
    types: &mut Buffer<'_>,
    deltas: &mut Buffer<'_>,
    face_count: usize,
    vertex_count: usize,
) -> Result<Vec<[u32; 3]>> {
    let mut faces = Vec::with_capacity(face_count);
    let (mut a, mut b, mut c) = (0i32, 0i32, 0i32);
    let mut last = 0i32;
    for face in 0..face_count {
        let kind = types.read_u8()?;
        match kind {
            1 => {
                a = deltas.read_signed_smart()? + last;
                last = a;
                b = deltas.read_signed_smart()? + last;
                last = b;
                c = deltas.read_signed_smart()? + last;
                last = c;
            }
            2 => {
                b = c;
                c = deltas.read_signed_smart()? + last;
                last = c;
            }
            3 => {
                a = c;
                c = deltas.read_signed_smart()? + last;
                last = c;
            }
            4 => {
                std::mem::swap(&mut a, &mut b);
                c = deltas.read_signed_smart()? + last;
                last = c;
            }
            other => {
                return Err(SceneError::corrupt(
                    WHAT,
                    format!("face {face} has unknown index encoding {other}"),
                ));
            }
        }
        let tri = [a, b, c];
        if tri.iter().any(|&i| i < 0 || i as usize >= vertex_count) {
            return Err(SceneError::corrupt(
                WHAT,
                format!("face {face} indices {:?} out of 0..{vertex_count}", tri),
            ));
        }
        faces.push([a as u32, b as u32, c as u32]);
    }
    Ok(faces)
}
