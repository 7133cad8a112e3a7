//! Mesh container versions and their section layout.
//!
//! Every version stores its header as a footer at the end of the buffer,
//! optionally followed by a two-byte version marker:
//!
//! ```text
//! last two bytes   version   footer size   length fields
//! (-3, -1)         3         25            x, y, z, face index, tex coord, anim groups
//! (-2, -1)         2         23            x, y, z, face index, tex coord
//! (-1, -1)         1         18            x, y, z
//! anything else    0         17            x, y, z
//! ```
//!
//! (The pair is written last byte first: version 3 ends `.. FF FD`.)
//!
//! Sections follow each other from offset 0 in a fixed order; each start is
//! the sum of the sizes before it:
//!
//! ```text
//! texture render types   T           (v1+)
//! vertex flags           V
//! vertex x / y / z       lengths from footer
//! vertex skins           V           (flag)
//! anim groups            V (v1,v2) / length (v3)   (flag)
//! face colours           F * 2
//! face render types      F           (flag)
//! face priorities        F           (priority == 255)
//! face alphas            F           (flag)
//! face skins             F           (flag)
//! face textures          F * 2       (flag)
//! texture coords         length      (v2+, face textures)
//! face index types       F
//! face indices           length (v2+) / up to the texture vertices (v0, v1)
//! texture vertices       T * 6
//! trailing block         up to the footer (v2+, flag)
//! ```

use std::io::Cursor;
use std::ops::Range;

use binrw::{binrw, BinRead};

use crate::error::{Result, SceneError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MeshVersion {
    V0,
    V1,
    V2,
    V3,
}

impl MeshVersion {
    /// Pick the version from the buffer's trailing marker bytes.
    pub fn detect(data: &[u8]) -> MeshVersion {
        let n = data.len();
        if n < 2 {
            return MeshVersion::V0;
        }
        match (data[n - 1] as i8, data[n - 2] as i8) {
            (-3, -1) => MeshVersion::V3,
            (-2, -1) => MeshVersion::V2,
            (-1, -1) => MeshVersion::V1,
            _ => MeshVersion::V0,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            MeshVersion::V0 => 0,
            MeshVersion::V1 => 1,
            MeshVersion::V2 => 2,
            MeshVersion::V3 => 3,
        }
    }

    /// Marker bytes in file order (second-to-last, last).
    pub fn marker(self) -> Option<[u8; 2]> {
        match self {
            MeshVersion::V0 => None,
            MeshVersion::V1 => Some([0xFF, 0xFF]),
            MeshVersion::V2 => Some([0xFF, 0xFE]),
            MeshVersion::V3 => Some([0xFF, 0xFD]),
        }
    }

    pub fn footer_size(self) -> usize {
        match self {
            MeshVersion::V0 => 17,
            MeshVersion::V1 => 18,
            MeshVersion::V2 => 23,
            MeshVersion::V3 => 25,
        }
    }

    /// Bytes between the footer start and the end of the buffer.
    pub fn tail_size(self) -> usize {
        self.footer_size() + if self.marker().is_some() { 2 } else { 0 }
    }
}

/// Counts, presence flags and section lengths stored at the end of a mesh.
#[binrw]
#[brw(big, import(version: u8))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeshFooter {
    pub vertex_count: u16,
    pub face_count: u16,
    pub texture_triangle_count: u8,
    pub has_render_types: u8,
    /// 255 = per-face priority table, otherwise the priority of every face.
    pub priority: u8,
    pub has_alphas: u8,
    pub has_face_skins: u8,
    pub has_face_textures: u8,
    pub has_vertex_skins: u8,
    #[brw(if(version >= 1))]
    pub has_anim_groups: u8,
    #[brw(if(version >= 2))]
    pub has_trailing_block: u8,
    pub vertex_x_len: u16,
    pub vertex_y_len: u16,
    pub vertex_z_len: u16,
    #[brw(if(version >= 2))]
    pub face_index_len: u16,
    #[brw(if(version >= 2))]
    pub texture_coord_len: u16,
    #[brw(if(version >= 3))]
    pub anim_group_len: u16,
}

pub const PER_FACE_PRIORITY: u8 = 255;

impl MeshFooter {
    pub fn vertex_count(&self) -> usize {
        self.vertex_count as usize
    }

    pub fn face_count(&self) -> usize {
        self.face_count as usize
    }

    pub fn texture_triangle_count(&self) -> usize {
        self.texture_triangle_count as usize
    }
}

/// Byte ranges of every section of one mesh buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshLayout {
    pub version: MeshVersion,
    pub footer: MeshFooter,
    /// Start of the footer; no section may extend past it.
    pub body_end: usize,
    pub texture_render_types: Option<Range<usize>>,
    pub vertex_flags: Range<usize>,
    pub vertex_x: Range<usize>,
    pub vertex_y: Range<usize>,
    pub vertex_z: Range<usize>,
    pub vertex_skins: Option<Range<usize>>,
    pub anim_groups: Option<Range<usize>>,
    pub face_colors: Range<usize>,
    pub face_render_types: Option<Range<usize>>,
    pub face_priorities: Option<Range<usize>>,
    pub face_alphas: Option<Range<usize>>,
    pub face_skins: Option<Range<usize>>,
    pub face_textures: Option<Range<usize>>,
    pub texture_coords: Option<Range<usize>>,
    pub face_index_types: Range<usize>,
    pub face_indices: Range<usize>,
    pub texture_vertices: Range<usize>,
    pub trailing: Option<Range<usize>>,
}

/// Hands out consecutive ranges and refuses any that cross `end`.
struct SectionCursor {
    pos: usize,
    end: usize,
}

impl SectionCursor {
    fn next(&mut self, name: &str, len: usize) -> Result<Range<usize>> {
        let start = self.pos;
        let stop = start
            .checked_add(len)
            .filter(|&s| s <= self.end)
            .ok_or_else(|| {
                SceneError::corrupt(
                    "mesh",
                    format!(
                        "{name} section {start}+{len} exceeds body end {}",
                        self.end
                    ),
                )
            })?;
        self.pos = stop;
        Ok(start..stop)
    }

    fn next_if(&mut self, name: &str, present: bool, len: usize) -> Result<Option<Range<usize>>> {
        if present {
            self.next(name, len).map(Some)
        } else {
            Ok(None)
        }
    }
}

impl MeshLayout {
    /// Read the footer and lay out every section of `data`.
    pub fn compute(data: &[u8]) -> Result<MeshLayout> {
        let version = MeshVersion::detect(data);
        let tail = version.tail_size();
        if data.len() < tail {
            return Err(SceneError::corrupt(
                "mesh",
                format!(
                    "{} bytes cannot hold a version {} footer ({} bytes)",
                    data.len(),
                    version.number(),
                    tail
                ),
            ));
        }
        let body_end = data.len() - tail;
        let footer_bytes = &data[body_end..body_end + version.footer_size()];
        let footer = MeshFooter::read_args(&mut Cursor::new(footer_bytes), (version.number(),))
            .map_err(|e| SceneError::corrupt("mesh", format!("unreadable footer: {e}")))?;
        Self::from_footer(version, footer, body_end)
    }

    /// Section ranges implied by a footer for a body of `body_end` bytes.
    pub fn from_footer(version: MeshVersion, footer: MeshFooter, body_end: usize) -> Result<MeshLayout> {
        let v = footer.vertex_count();
        let f = footer.face_count();
        let t = footer.texture_triangle_count();
        let newer = version >= MeshVersion::V2;

        let mut cur = SectionCursor { pos: 0, end: body_end };
        let texture_render_types = cur.next_if("texture render type", version >= MeshVersion::V1, t)?;
        let vertex_flags = cur.next("vertex flag", v)?;
        let vertex_x = cur.next("vertex x", footer.vertex_x_len as usize)?;
        let vertex_y = cur.next("vertex y", footer.vertex_y_len as usize)?;
        let vertex_z = cur.next("vertex z", footer.vertex_z_len as usize)?;
        let vertex_skins = cur.next_if("vertex skin", footer.has_vertex_skins == 1, v)?;
        let anim_len = if version == MeshVersion::V3 {
            footer.anim_group_len as usize
        } else {
            v
        };
        let anim_groups = cur.next_if(
            "anim group",
            version >= MeshVersion::V1 && footer.has_anim_groups == 1,
            anim_len,
        )?;
        let face_colors = cur.next("face colour", f * 2)?;
        let face_render_types = cur.next_if("face render type", footer.has_render_types == 1, f)?;
        let face_priorities = cur.next_if("face priority", footer.priority == PER_FACE_PRIORITY, f)?;
        let face_alphas = cur.next_if("face alpha", footer.has_alphas == 1, f)?;
        let face_skins = cur.next_if("face skin", footer.has_face_skins == 1, f)?;
        let face_textures = cur.next_if("face texture", footer.has_face_textures == 1, f * 2)?;
        let texture_coords = cur.next_if(
            "texture coordinate",
            newer && footer.has_face_textures == 1 && t > 0,
            footer.texture_coord_len as usize,
        )?;
        let face_index_types = cur.next("face index type", f)?;
        let face_index_len = if newer {
            footer.face_index_len as usize
        } else {
            body_end
                .checked_sub(cur.pos + t * 6)
                .ok_or_else(|| SceneError::corrupt("mesh", "no room for face index data"))?
        };
        let face_indices = cur.next("face index", face_index_len)?;
        let texture_vertices = cur.next("texture vertex", t * 6)?;
        let trailing = if newer && footer.has_trailing_block != 0 {
            Some(cur.next("trailing", body_end - cur.pos)?)
        } else {
            None
        };
        if cur.pos != body_end {
            return Err(SceneError::corrupt(
                "mesh",
                format!("{} unaccounted bytes before footer", body_end - cur.pos),
            ));
        }

        Ok(MeshLayout {
            version,
            footer,
            body_end,
            texture_render_types,
            vertex_flags,
            vertex_x,
            vertex_y,
            vertex_z,
            vertex_skins,
            anim_groups,
            face_colors,
            face_render_types,
            face_priorities,
            face_alphas,
            face_skins,
            face_textures,
            texture_coords,
            face_index_types,
            face_indices,
            texture_vertices,
            trailing,
        })
    }
}
