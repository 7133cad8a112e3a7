//! Normal sharing across mesh boundaries.
//!
//! Two meshes placed next to each other (fence segments, roof pieces) are
//! lit as if they were one surface: each vertex of `a` that coincides with
//! a vertex of `b` (after `b` is moved by the offset) picks up the other's
//! accumulated normal.

use super::light::{NormalSet, VertexNormal};
use super::{Bounds, IntermediateMesh};

/// One side of a merge: the mesh and the normals being accumulated for it.
pub struct MergeSide<'a> {
    pub mesh: &'a IntermediateMesh,
    pub normals: &'a mut NormalSet,
}

/// Exchange normals between two meshes. `offset` is the position of `b`
/// relative to `a`. With `hide_seams`, faces whose three vertices all
/// matched are marked hidden on both sides.
///
/// Returns the number of vertex pairs merged.
pub fn merge_normals(
    a: MergeSide<'_>,
    b: MergeSide<'_>,
    offset: (i32, i32, i32),
    hide_seams: bool,
) -> usize {
    let (dx, dy, dz) = offset;
    let ba = a.mesh.bounds();
    let bb = b.mesh.bounds();
    if !overlaps(&ba, &bb, offset) {
        return 0;
    }

    let mut matched_a = vec![false; a.mesh.vertex_count()];
    let mut matched_b = vec![false; b.mesh.vertex_count()];
    let mut pairs = Vec::new();

    for i in 0..a.mesh.vertex_count() {
        if a.normals.vertices[i].magnitude == 0 {
            continue;
        }
        let x = a.mesh.vertices_x[i] - dx;
        let y = a.mesh.vertices_y[i] - dy;
        let z = a.mesh.vertices_z[i] - dz;
        if y < bb.min_y || y > bb.max_y || x < bb.min_x || x > bb.max_x || z < bb.min_z || z > bb.max_z {
            continue;
        }
        for j in 0..b.mesh.vertex_count() {
            if b.normals.vertices[j].magnitude != 0
                && x == b.mesh.vertices_x[j]
                && y == b.mesh.vertices_y[j]
                && z == b.mesh.vertices_z[j]
            {
                pairs.push((i, j));
                matched_a[i] = true;
                matched_b[j] = true;
            }
        }
    }

    if pairs.is_empty() {
        return 0;
    }

    // Contributions always come from the partner's own normals, never from
    // what it already received in an earlier merge.
    let base_a = a.normals.vertices.clone();
    let base_b = b.normals.vertices.clone();
    let merged_a = a.normals.merged.get_or_insert_with(|| base_a.clone());
    for &(i, j) in &pairs {
        add(&mut merged_a[i], &base_b[j]);
    }
    let merged_b = b.normals.merged.get_or_insert_with(|| base_b.clone());
    for &(i, j) in &pairs {
        add(&mut merged_b[j], &base_a[i]);
    }

    if hide_seams {
        hide_enclosed(a.mesh, &matched_a, &mut a.normals.hidden);
        hide_enclosed(b.mesh, &matched_b, &mut b.normals.hidden);
    }
    pairs.len()
}

fn add(into: &mut VertexNormal, other: &VertexNormal) {
    into.x += other.x;
    into.y += other.y;
    into.z += other.z;
    into.magnitude += other.magnitude;
}

fn overlaps(a: &Bounds, b: &Bounds, (dx, dy, dz): (i32, i32, i32)) -> bool {
    a.min_x - dx <= b.max_x
        && a.max_x - dx >= b.min_x
        && a.min_y - dy <= b.max_y
        && a.max_y - dy >= b.min_y
        && a.min_z - dz <= b.max_z
        && a.max_z - dz >= b.min_z
}

fn hide_enclosed(mesh: &IntermediateMesh, matched: &[bool], hidden: &mut Vec<bool>) {
    hidden.resize(mesh.face_count(), false);
    for (face, &[x, y, z]) in mesh.faces.iter().enumerate() {
        if matched[x as usize] && matched[y as usize] && matched[z as usize] {
            hidden[face] = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_meshes::cube;

    #[test]
    fn touching_cubes_share_seam_normals() {
        let a = cube(128, 128, 0);
        let b = cube(128, 128, 0);
        let mut na = NormalSet::compute(&a);
        let mut nb = NormalSet::compute(&b);

        // b sits one cube width along +x, so a's +x face meets b's -x face.
        let merged = merge_normals(
            MergeSide { mesh: &a, normals: &mut na },
            MergeSide { mesh: &b, normals: &mut nb },
            (128, 0, 0),
            false,
        );
        assert_eq!(merged, 4);
        let before = na.vertices[1];
        let after = na.vertex(1);
        assert_eq!(after.magnitude, before.magnitude + nb.vertices[0].magnitude);
        // untouched vertex keeps its own normal
        assert_eq!(na.vertex(0), na.vertices[0]);
        assert!(na.hidden.iter().all(|h| !h));
    }

    #[test]
    fn seam_faces_hidden_on_request() {
        let a = cube(128, 128, 0);
        let b = cube(128, 128, 0);
        let mut na = NormalSet::compute(&a);
        let mut nb = NormalSet::compute(&b);
        merge_normals(
            MergeSide { mesh: &a, normals: &mut na },
            MergeSide { mesh: &b, normals: &mut nb },
            (128, 0, 0),
            true,
        );
        // the two triangles of a's +x side
        assert_eq!(na.hidden.iter().filter(|&&h| h).count(), 2);
        assert_eq!(nb.hidden.iter().filter(|&&h| h).count(), 2);
    }

    #[test]
    fn distant_meshes_do_not_merge() {
        let a = cube(128, 128, 0);
        let mut na = NormalSet::compute(&a);
        let mut nb = NormalSet::compute(&a);
        let merged = merge_normals(
            MergeSide { mesh: &a, normals: &mut na },
            MergeSide { mesh: &a, normals: &mut nb },
            (1024, 0, 0),
            true,
        );
        assert_eq!(merged, 0);
        assert!(na.merged.is_none());
    }
}
