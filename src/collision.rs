//! Mutations issued into the host's collision maps.
//!
//! The maps themselves live outside this crate. Every call names the plane
//! the collision belongs to, which is not always the plane the object is
//! drawn on: tiles under a bridge collide one plane lower.

use serde::Serialize;

use crate::terrain::tiles::{RegionTileGrid, FLAG_BLOCKED};

pub trait CollisionMap {
    fn add_wall(&mut self, plane: usize, x: usize, y: usize, kind: u8, rotation: u8, blocks_projectile: bool);
    fn add_object(&mut self, plane: usize, x: usize, y: usize, size_x: usize, size_y: usize, blocks_projectile: bool);
    fn set_blocked_by_floor(&mut self, plane: usize, x: usize, y: usize);
    fn set_blocked_by_floor_decoration(&mut self, _plane: usize, _x: usize, _y: usize) {}
}

/// Ignores everything.
impl CollisionMap for () {
    fn add_wall(&mut self, _: usize, _: usize, _: usize, _: u8, _: u8, _: bool) {}
    fn add_object(&mut self, _: usize, _: usize, _: usize, _: usize, _: usize, _: bool) {}
    fn set_blocked_by_floor(&mut self, _: usize, _: usize, _: usize) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CollisionEvent {
    Wall {
        plane: usize,
        x: usize,
        y: usize,
        kind: u8,
        rotation: u8,
        blocks_projectile: bool,
    },
    Object {
        plane: usize,
        x: usize,
        y: usize,
        size_x: usize,
        size_y: usize,
        blocks_projectile: bool,
    },
    Floor {
        plane: usize,
        x: usize,
        y: usize,
    },
    FloorDecoration {
        plane: usize,
        x: usize,
        y: usize,
    },
}

/// Records every call, in order.
impl CollisionMap for Vec<CollisionEvent> {
    fn add_wall(&mut self, plane: usize, x: usize, y: usize, kind: u8, rotation: u8, blocks_projectile: bool) {
        self.push(CollisionEvent::Wall {
            plane,
            x,
            y,
            kind,
            rotation,
            blocks_projectile,
        });
    }

    fn add_object(&mut self, plane: usize, x: usize, y: usize, size_x: usize, size_y: usize, blocks_projectile: bool) {
        self.push(CollisionEvent::Object {
            plane,
            x,
            y,
            size_x,
            size_y,
            blocks_projectile,
        });
    }

    fn set_blocked_by_floor(&mut self, plane: usize, x: usize, y: usize) {
        self.push(CollisionEvent::Floor { plane, x, y });
    }

    fn set_blocked_by_floor_decoration(&mut self, plane: usize, x: usize, y: usize) {
        self.push(CollisionEvent::FloorDecoration { plane, x, y });
    }
}

/// Plane whose collision map receives changes for a tile drawn on `plane`,
/// or `None` when that falls below the ground plane.
pub fn collision_plane(grid: &RegionTileGrid, plane: usize, x: usize, y: usize) -> Option<usize> {
    if grid.is_bridge(x, y) {
        plane.checked_sub(1)
    } else {
        Some(plane)
    }
}

/// Mark every tile carrying the blocked render flag.
pub fn block_floors(grid: &RegionTileGrid, collision: &mut dyn CollisionMap) -> usize {
    let mut blocked = 0;
    for plane in 0..grid.heights.len() {
        for x in 0..grid.size {
            for y in 0..grid.size {
                if grid.render_flags(plane, x, y) & FLAG_BLOCKED == 0 {
                    continue;
                }
                if let Some(target) = collision_plane(grid, plane, x, y) {
                    collision.set_blocked_by_floor(target, x, y);
                    blocked += 1;
                }
            }
        }
    }
    blocked
}
