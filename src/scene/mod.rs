//! Per-tile scene slots filled by the landscape placer.
//!
//! ```text
//! SceneTile
//!   floor_decoration   Option<Placement>
//!   wall               Option<WallObject>        up to 2 meshes
//!   wall_decoration    Option<WallDecoration>    up to 2 meshes + displacement
//!   game_objects       Vec<GameObjectId>         at most MAX_GAME_OBJECTS
//! ```
//!
//! Game objects live in one arena on the [`Scene`]; every tile of a
//! footprint holds the same id.

mod lighting;
mod renderable;

use cgmath::{Vector2, Vector3};
use serde::Serialize;

use crate::landscape::EntityTag;

pub use renderable::{PendingMesh, Renderable};

/// Game objects a single tile can hold.
pub const MAX_GAME_OBJECTS: usize = 5;

/// A renderable anchored in the world.
#[derive(Debug, Clone)]
pub struct Placement {
    pub renderable: Renderable,
    /// World x, height, world y.
    pub position: Vector3<i32>,
    pub tag: EntityTag,
    pub kind: u8,
    pub rotation: u8,
}

#[derive(Debug, Clone)]
pub struct WallObject {
    pub primary: Placement,
    /// Second half of a corner wall.
    pub secondary: Option<Renderable>,
    /// Edge bits covered by each half.
    pub orientation: u8,
    pub orientation2: u8,
}

#[derive(Debug, Clone)]
pub struct WallDecoration {
    pub primary: Placement,
    pub secondary: Option<Renderable>,
    pub orientation: u8,
    /// Extra yaw in 2048ths, 256 for diagonal decorations.
    pub angle: i32,
    /// Offset away from the wall face.
    pub displacement: Vector2<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct GameObjectId(pub usize);

#[derive(Debug, Clone)]
pub struct GameObject {
    pub placement: Placement,
    pub plane: usize,
    /// South-west tile of the footprint.
    pub origin: (usize, usize),
    /// Footprint in tiles, after rotation.
    pub size: (usize, usize),
    /// Extra yaw in 2048ths.
    pub angle: i32,
}

#[derive(Debug, Clone, Default)]
pub struct SceneTile {
    pub floor_decoration: Option<Placement>,
    pub wall: Option<WallObject>,
    pub wall_decoration: Option<WallDecoration>,
    pub game_objects: Vec<GameObjectId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SceneStats {
    pub floor_decorations: usize,
    pub walls: usize,
    pub wall_decorations: usize,
    pub game_objects: usize,
    pub pending: usize,
}

#[derive(Debug, Clone)]
pub struct Scene {
    size: usize,
    planes: usize,
    tiles: Vec<SceneTile>,
    objects: Vec<GameObject>,
}

impl Scene {
    pub fn new(size: usize, planes: usize) -> Self {
        Self {
            size,
            planes,
            tiles: vec![SceneTile::default(); size * size * planes],
            objects: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn planes(&self) -> usize {
        self.planes
    }

    fn index(&self, plane: usize, x: usize, y: usize) -> usize {
        (plane * self.size + x) * self.size + y
    }

    pub fn tile(&self, plane: usize, x: usize, y: usize) -> &SceneTile {
        &self.tiles[self.index(plane, x, y)]
    }

    pub fn tile_mut(&mut self, plane: usize, x: usize, y: usize) -> &mut SceneTile {
        let i = self.index(plane, x, y);
        &mut self.tiles[i]
    }

    pub fn game_object(&self, id: GameObjectId) -> &GameObject {
        &self.objects[id.0]
    }

    pub fn game_objects(&self) -> &[GameObject] {
        &self.objects
    }

    pub fn set_floor_decoration(&mut self, plane: usize, x: usize, y: usize, placement: Placement) {
        self.tile_mut(plane, x, y).floor_decoration = Some(placement);
    }

    pub fn set_wall(&mut self, plane: usize, x: usize, y: usize, wall: WallObject) {
        self.tile_mut(plane, x, y).wall = Some(wall);
    }

    pub fn set_wall_decoration(&mut self, plane: usize, x: usize, y: usize, decoration: WallDecoration) {
        self.tile_mut(plane, x, y).wall_decoration = Some(decoration);
    }

    pub fn wall_tag(&self, plane: usize, x: usize, y: usize) -> Option<EntityTag> {
        self.tile(plane, x, y).wall.as_ref().map(|w| w.primary.tag)
    }

    /// Scale an existing wall decoration's displacement by `displacement / 16`.
    pub fn rescale_wall_decoration(&mut self, plane: usize, x: usize, y: usize, displacement: i32) {
        if let Some(decoration) = self.tile_mut(plane, x, y).wall_decoration.as_mut() {
            decoration.displacement = decoration.displacement * displacement / 16;
        }
    }

    /// Register a game object in every tile of its footprint. Rejected when
    /// the footprint leaves the scene or any of its tiles is full.
    pub fn add_game_object(&mut self, object: GameObject) -> Option<GameObjectId> {
        let (x0, y0) = object.origin;
        let (sx, sy) = object.size;
        if object.plane >= self.planes || sx == 0 || sy == 0 || x0 + sx > self.size || y0 + sy > self.size {
            return None;
        }
        for x in x0..x0 + sx {
            for y in y0..y0 + sy {
                if self.tile(object.plane, x, y).game_objects.len() >= MAX_GAME_OBJECTS {
                    return None;
                }
            }
        }
        let id = GameObjectId(self.objects.len());
        let plane = object.plane;
        self.objects.push(object);
        for x in x0..x0 + sx {
            for y in y0..y0 + sy {
                self.tile_mut(plane, x, y).game_objects.push(id);
            }
        }
        Some(id)
    }

    /// Every placement in the scene, game objects once each.
    pub fn renderables(&self) -> impl Iterator<Item = &Renderable> {
        let tiles = self.tiles.iter().flat_map(|tile| {
            let floor = tile.floor_decoration.iter().map(|p| &p.renderable);
            let wall = tile
                .wall
                .iter()
                .flat_map(|w| std::iter::once(&w.primary.renderable).chain(w.secondary.iter()));
            let decoration = tile
                .wall_decoration
                .iter()
                .flat_map(|d| std::iter::once(&d.primary.renderable).chain(d.secondary.iter()));
            floor.chain(wall).chain(decoration)
        });
        tiles.chain(self.objects.iter().map(|o| &o.placement.renderable))
    }

    pub fn stats(&self) -> SceneStats {
        let mut stats = SceneStats {
            game_objects: self.objects.len(),
            ..Default::default()
        };
        for tile in &self.tiles {
            stats.floor_decorations += tile.floor_decoration.is_some() as usize;
            stats.walls += tile.wall.is_some() as usize;
            stats.wall_decorations += tile.wall_decoration.is_some() as usize;
        }
        stats.pending = self.renderables().filter(|r| r.is_pending()).count();
        stats
    }
}
