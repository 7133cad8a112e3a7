//! Deferred lighting for meshes placed as [`Renderable::Pending`].
//!
//! Pending meshes on the same or adjacent tiles of a plane exchange normals
//! where their vertices meet, then each is lit once and contoured if it
//! asked for it.

use std::collections::HashMap;
use std::sync::Arc;

use cgmath::Vector3;
use tracing::debug;

use super::{Renderable, Scene};
use crate::model::contour::contour;
use crate::model::light::light_with_normals;
use crate::model::merge::{merge_normals, MergeSide};
use crate::terrain::PlaneHeights;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    FloorDecoration(usize),
    Wall(usize, bool),
    WallDecoration(usize, bool),
    GameObject(usize),
}

struct Entry {
    slot: Slot,
    plane: usize,
    x: usize,
    y: usize,
    position: Vector3<i32>,
    pending: super::PendingMesh,
}

impl Scene {
    /// Light every pending mesh. `heights` holds one grid per plane and is
    /// only used for contouring. Returns how many meshes were lit.
    pub fn finalize_lighting(&mut self, heights: &[PlaneHeights]) -> usize {
        let mut entries = self.collect_pending();
        if entries.is_empty() {
            return 0;
        }

        let mut buckets: HashMap<(usize, usize, usize), Vec<usize>> = HashMap::new();
        for (i, e) in entries.iter().enumerate() {
            buckets.entry((e.plane, e.x, e.y)).or_default().push(i);
        }

        let mut merged_pairs = 0;
        for i in 0..entries.len() {
            let (plane, x, y) = (entries[i].plane, entries[i].x, entries[i].y);
            for nx in x.saturating_sub(1)..=x + 1 {
                for ny in y.saturating_sub(1)..=y + 1 {
                    let Some(bucket) = buckets.get(&(plane, nx, ny)) else {
                        continue;
                    };
                    for &j in bucket.iter().filter(|&&j| j > i) {
                        merged_pairs += merge_entries(&mut entries, i, j);
                    }
                }
            }
        }

        let lit = entries.len();
        for e in entries {
            let mut mesh = Arc::new(light_with_normals(
                &e.pending.mesh,
                &e.pending.normals,
                &e.pending.lighting,
            ));
            if let (Some(mode), Some(grid)) = (e.pending.contour, heights.get(e.plane)) {
                mesh = contour(&mesh, grid, e.position.x, e.position.y, e.position.z, mode);
            }
            if let Some(slot) = self.slot_mut(e.slot) {
                *slot = Renderable::StaticMesh(mesh);
            }
        }
        debug!(lit, merged_pairs, "finalized pending lighting");
        lit
    }

    fn collect_pending(&self) -> Vec<Entry> {
        let mut entries = Vec::new();
        let mut push = |slot, plane, x, y, position, r: &Renderable| {
            if let Renderable::Pending(p) = r {
                entries.push(Entry {
                    slot,
                    plane,
                    x,
                    y,
                    position,
                    pending: p.clone(),
                });
            }
        };
        for plane in 0..self.planes {
            for x in 0..self.size {
                for y in 0..self.size {
                    let i = self.index(plane, x, y);
                    let tile = &self.tiles[i];
                    if let Some(p) = &tile.floor_decoration {
                        push(Slot::FloorDecoration(i), plane, x, y, p.position, &p.renderable);
                    }
                    if let Some(w) = &tile.wall {
                        let pos = w.primary.position;
                        push(Slot::Wall(i, false), plane, x, y, pos, &w.primary.renderable);
                        if let Some(r) = &w.secondary {
                            push(Slot::Wall(i, true), plane, x, y, pos, r);
                        }
                    }
                    if let Some(d) = &tile.wall_decoration {
                        let pos = d.primary.position;
                        push(Slot::WallDecoration(i, false), plane, x, y, pos, &d.primary.renderable);
                        if let Some(r) = &d.secondary {
                            push(Slot::WallDecoration(i, true), plane, x, y, pos, r);
                        }
                    }
                }
            }
        }
        for (i, o) in self.objects.iter().enumerate() {
            let (x, y) = o.origin;
            push(Slot::GameObject(i), o.plane, x, y, o.placement.position, &o.placement.renderable);
        }
        entries
    }

    fn slot_mut(&mut self, slot: Slot) -> Option<&mut Renderable> {
        match slot {
            Slot::FloorDecoration(i) => self.tiles[i].floor_decoration.as_mut().map(|p| &mut p.renderable),
            Slot::Wall(i, second) => self.tiles[i].wall.as_mut().and_then(|w| {
                if second {
                    w.secondary.as_mut()
                } else {
                    Some(&mut w.primary.renderable)
                }
            }),
            Slot::WallDecoration(i, second) => self.tiles[i].wall_decoration.as_mut().and_then(|d| {
                if second {
                    d.secondary.as_mut()
                } else {
                    Some(&mut d.primary.renderable)
                }
            }),
            Slot::GameObject(i) => self.objects.get_mut(i).map(|o| &mut o.placement.renderable),
        }
    }
}

/// Merge entry `j` into entry `i` (`i < j`). The two halves of one wall or
/// decoration keep their seam faces; separate placements hide them.
fn merge_entries(entries: &mut [Entry], i: usize, j: usize) -> usize {
    let (left, right) = entries.split_at_mut(j);
    let (a, b) = (&mut left[i], &mut right[0]);
    let same_object = matches!(
        (a.slot, b.slot),
        (Slot::Wall(p, _), Slot::Wall(q, _)) | (Slot::WallDecoration(p, _), Slot::WallDecoration(q, _)) if p == q
    );
    let offset = b.position - a.position;
    let pairs = merge_normals(
        MergeSide {
            mesh: &a.pending.mesh,
            normals: &mut a.pending.normals,
        },
        MergeSide {
            mesh: &b.pending.mesh,
            normals: &mut b.pending.normals,
        },
        (offset.x, offset.y, offset.z),
        !same_object,
    );
    (pairs > 0) as usize
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cgmath::Vector3;

    use super::super::tests::static_placement;
    use super::super::{GameObject, PendingMesh, Placement, Renderable, Scene};
    use crate::config::LightingParams;
    use crate::landscape::EntityTag;
    use crate::model::test_meshes::cube;
    use crate::model::ContourMode;
    use crate::terrain::PlaneHeights;

    fn pending_object(x: usize, y: usize, contour: Option<ContourMode>) -> GameObject {
        let mesh = Arc::new(cube(128, 128, 0));
        GameObject {
            placement: Placement {
                renderable: Renderable::Pending(PendingMesh::new(mesh, LightingParams::OBJECT, contour)),
                position: Vector3::new(x as i32 * 128 + 64, 0, y as i32 * 128 + 64),
                tag: EntityTag::object(x as u8, y as u8, false, 3),
                kind: 10,
                rotation: 0,
            },
            plane: 0,
            origin: (x, y),
            size: (1, 1),
            angle: 0,
        }
    }

    #[test]
    fn adjacent_pending_meshes_merge_and_light() {
        let mut scene = Scene::new(4, 1);
        scene.add_game_object(pending_object(0, 0, None)).unwrap();
        scene.add_game_object(pending_object(1, 0, None)).unwrap();
        scene.set_floor_decoration(0, 3, 3, static_placement(3, 3));
        assert_eq!(scene.stats().pending, 2);

        let lit = scene.finalize_lighting(&[]);
        assert_eq!(lit, 2);
        assert_eq!(scene.stats().pending, 0);
        // the shared side of each cube is hidden
        let left = scene.game_objects()[0].placement.renderable.lit().unwrap();
        assert_eq!((0..left.face_count()).filter(|&f| left.is_hidden(f)).count(), 2);
    }

    #[test]
    fn distant_pending_meshes_stay_whole() {
        let mut scene = Scene::new(4, 1);
        scene.add_game_object(pending_object(0, 0, None)).unwrap();
        scene.add_game_object(pending_object(3, 0, None)).unwrap();
        scene.finalize_lighting(&[]);
        let mesh = scene.game_objects()[0].placement.renderable.lit().unwrap();
        assert!((0..mesh.face_count()).all(|f| !mesh.is_hidden(f)));
    }

    #[test]
    fn contour_applies_after_lighting() {
        let mut scene = Scene::new(4, 1);
        scene.add_game_object(pending_object(1, 1, Some(ContourMode::Uniform))).unwrap();
        let mut heights = PlaneHeights::new(4);
        for x in 0..5 {
            for y in 0..5 {
                heights.set(x, y, 32);
            }
        }
        scene.finalize_lighting(&[heights]);
        let mesh = scene.game_objects()[0].placement.renderable.lit().unwrap();
        assert_eq!(mesh.vertices_y[0], 32);
    }
}
