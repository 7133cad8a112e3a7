//! Landscape object placement.
//!
//! ```text
//! type   slot              model type / rotation
//! 0      wall              0 / r
//! 1      wall              1 / r              diagonal corner piece
//! 2      wall (2 meshes)   2 / r+4, 2 / (r+1)&3
//! 3      wall              3 / r              corner post
//! 4..=8  wall decoration   4 / see below
//! 9      game object 1x1   9 / r
//! 10,11  game object       10 / r             11 turns by 45 degrees
//! 12..21 game object       type / r           roofs
//! 22     floor decoration  22 / r
//! ```
//!
//! Decorations: 4 sits on the wall face, 5 is pushed out by the wall's
//! displacement, 6 and 7 sit diagonally (outside and inside), 8 is both
//! diagonal halves at once.

use std::sync::Arc;

use cgmath::{Vector2, Vector3};
use serde::Serialize;
use tracing::{debug, trace, warn};

use super::cache::ObjectModelCache;
use super::spawn::Spawn;
use super::tag::EntityTag;
use crate::collision::{collision_plane, CollisionMap};
use crate::definitions::{AssetSource, DefinitionStore, ObjectDefinition, VarState, Variant};
use crate::error::{Result, SceneError};
use crate::model::contour;
use crate::scene::{GameObject, PendingMesh, Placement, Renderable, Scene, WallDecoration, WallObject};
use crate::terrain::{OcclusionMap, RegionTileGrid, PLANES};

/// Edge bits covered by a straight wall, per rotation.
const WALL_EDGES: [u8; 4] = [1, 2, 4, 8];
/// Corner bits covered by a diagonal or corner piece, per rotation.
const CORNER_EDGES: [u8; 4] = [16, 32, 64, 128];

/// Unit offsets pushing a decoration off a straight wall.
const WALL_DX: [i32; 4] = [1, 0, -1, 0];
const WALL_DY: [i32; 4] = [0, -1, 0, 1];
/// Same for a diagonal decoration.
const DIAGONAL_DX: [i32; 4] = [1, -1, -1, 1];
const DIAGONAL_DY: [i32; 4] = [-1, -1, 1, 1];

const DEFAULT_DISPLACEMENT: i32 = 16;
/// Yaw added to diagonal placements, in 2048ths of a turn.
const DIAGONAL_ANGLE: i32 = 256;
const WALL_SHADOW: i32 = 50;
const MAX_OBJECT_SHADOW: i32 = 30;

const TYPE_DECORATION_MODEL: u8 = 4;
const TYPE_GAME_OBJECT: u8 = 10;
const TYPE_DIAGONAL_OBJECT: u8 = 11;
const TYPE_FLOOR_DECORATION: u8 = 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    OutsideRegion,
    LowDetail,
    MissingAsset,
    TileFull,
    UnknownType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Placed,
    /// Collision applied but nothing to draw: the active variant is hidden
    /// or the definition has no model for the type.
    Invisible,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlacementStats {
    pub placed: usize,
    pub invisible: usize,
    pub skipped: usize,
}

/// Mutable per-region outputs. They must not be shared between two
/// regions being decoded at the same time.
pub struct PlacementTargets<'t> {
    pub scene: &'t mut Scene,
    pub occlusion: &'t mut OcclusionMap,
    pub collision: &'t mut dyn CollisionMap,
}

/// Where one spawn lands.
struct Site {
    plane: usize,
    x: usize,
    y: usize,
    /// Footprint after rotation.
    size_x: usize,
    size_y: usize,
    kind: u8,
    rotation: u8,
    position: Vector3<i32>,
    tag: EntityTag,
    collision_plane: Option<usize>,
}

impl Site {
    fn placement(&self, renderable: Renderable) -> Placement {
        Placement {
            renderable,
            position: self.position,
            tag: self.tag,
            kind: self.kind,
            rotation: self.rotation,
        }
    }
}

pub struct LandscapeObjectPlacer<'a, S> {
    grid: &'a RegionTileGrid,
    definitions: &'a DefinitionStore<S>,
    models: &'a ObjectModelCache,
    vars: &'a dyn VarState,
    low_detail: bool,
}

impl<'a, S: AssetSource> LandscapeObjectPlacer<'a, S> {
    pub fn new(
        grid: &'a RegionTileGrid,
        definitions: &'a DefinitionStore<S>,
        models: &'a ObjectModelCache,
        vars: &'a dyn VarState,
        low_detail: bool,
    ) -> Self {
        Self {
            grid,
            definitions,
            models,
            vars,
            low_detail,
        }
    }

    pub fn place_all(&self, spawns: &[Spawn], targets: &mut PlacementTargets<'_>) -> Result<PlacementStats> {
        let mut stats = PlacementStats::default();
        for spawn in spawns {
            match self.place(spawn, targets)? {
                Outcome::Placed => stats.placed += 1,
                Outcome::Invisible => stats.invisible += 1,
                Outcome::Skipped(_) => stats.skipped += 1,
            }
        }
        debug!(
            spawns = spawns.len(),
            placed = stats.placed,
            invisible = stats.invisible,
            skipped = stats.skipped,
            "placed landscape objects"
        );
        Ok(stats)
    }

    /// Place one spawn. Missing definitions or meshes skip the spawn; any
    /// other error is fatal for the region.
    pub fn place(&self, spawn: &Spawn, targets: &mut PlacementTargets<'_>) -> Result<Outcome> {
        match self.try_place(spawn, targets) {
            Err(SceneError::MissingDefinition { kind, id }) => {
                warn!(object = spawn.id, kind, id, "skipping spawn with missing asset");
                Ok(Outcome::Skipped(SkipReason::MissingAsset))
            }
            other => other,
        }
    }

    fn try_place(&self, spawn: &Spawn, targets: &mut PlacementTargets<'_>) -> Result<Outcome> {
        let (x, y, plane) = (spawn.local_x as usize, spawn.local_y as usize, spawn.plane as usize);
        if x >= self.grid.size || y >= self.grid.size || plane >= PLANES {
            warn!(object = spawn.id, x, y, plane, "spawn outside region");
            return Ok(Outcome::Skipped(SkipReason::OutsideRegion));
        }

        let def = self.definitions.object(spawn.id)?;
        if spawn.kind == TYPE_FLOOR_DECORATION
            && self.low_detail
            && !def.is_interactive()
            && def.interact_type != 1
            && !def.obstructs_ground
        {
            return Ok(Outcome::Skipped(SkipReason::LowDetail));
        }

        let site = self.site(spawn, &def);
        let visual = match def.resolve_variant(self.vars) {
            Variant::Itself => Some(Arc::clone(&def)),
            Variant::Other(id) => Some(self.definitions.object(id)?),
            Variant::Hidden => None,
        };
        trace!(
            object = def.id,
            kind = site.kind,
            rotation = site.rotation,
            x,
            y,
            plane,
            "placing"
        );

        let visible = match site.kind {
            TYPE_FLOOR_DECORATION => {
                let renderable = self.renderable(visual.as_deref(), site.kind, site.rotation, &site)?;
                let visible = renderable.is_some();
                if let Some(renderable) = renderable {
                    targets
                        .scene
                        .set_floor_decoration(plane, x, y, site.placement(renderable));
                }
                if def.interact_type == 1 {
                    if let Some(cp) = site.collision_plane {
                        targets.collision.set_blocked_by_floor_decoration(cp, x, y);
                    }
                }
                visible
            }
            TYPE_GAME_OBJECT | TYPE_DIAGONAL_OBJECT | 12..=21 => {
                let model_kind = if site.kind == TYPE_DIAGONAL_OBJECT {
                    TYPE_GAME_OBJECT
                } else {
                    site.kind
                };
                let renderable = self.renderable(visual.as_deref(), model_kind, site.rotation, &site)?;
                let angle = if site.kind == TYPE_DIAGONAL_OBJECT {
                    DIAGONAL_ANGLE
                } else {
                    0
                };
                let outcome = self.add_game_object(
                    renderable,
                    &site,
                    (site.size_x, site.size_y),
                    angle,
                    def.clipped && site.kind <= TYPE_DIAGONAL_OBJECT,
                    targets,
                );
                if def.interact_type != 0 {
                    if let Some(cp) = site.collision_plane {
                        targets
                            .collision
                            .add_object(cp, x, y, site.size_x, site.size_y, def.blocks_projectile);
                    }
                }
                match outcome {
                    Some(visible) => visible,
                    None => return Ok(Outcome::Skipped(SkipReason::TileFull)),
                }
            }
            9 => {
                let renderable = self.renderable(visual.as_deref(), 9, site.rotation, &site)?;
                let outcome = self.add_game_object(renderable, &site, (1, 1), 0, false, targets);
                if def.interact_type != 0 {
                    if let Some(cp) = site.collision_plane {
                        targets
                            .collision
                            .add_object(cp, x, y, site.size_x, site.size_y, def.blocks_projectile);
                    }
                }
                match outcome {
                    Some(visible) => visible,
                    None => return Ok(Outcome::Skipped(SkipReason::TileFull)),
                }
            }
            0..=3 => self.place_wall(&def, visual.as_deref(), &site, targets)?,
            4..=8 => self.place_decoration(visual.as_deref(), &site, targets)?,
            other => {
                warn!(object = def.id, kind = other, "unknown placement type");
                return Ok(Outcome::Skipped(SkipReason::UnknownType));
            }
        };

        Ok(if visible {
            Outcome::Placed
        } else {
            Outcome::Invisible
        })
    }

    fn site(&self, spawn: &Spawn, def: &ObjectDefinition) -> Site {
        let (x, y, plane) = (spawn.local_x as usize, spawn.local_y as usize, spawn.plane as usize);
        let rotation = spawn.rotation & 3;
        let (size_x, size_y) = if rotation == 1 || rotation == 3 {
            (def.size_y as usize, def.size_x as usize)
        } else {
            (def.size_x as usize, def.size_y as usize)
        };

        // Average of the corners around the footprint centre.
        let limit = self.grid.size;
        let x_lo = (x + (size_x >> 1)).min(limit);
        let x_hi = (x + ((size_x + 1) >> 1)).min(limit);
        let y_lo = (y + (size_y >> 1)).min(limit);
        let y_hi = (y + ((size_y + 1) >> 1)).min(limit);
        let heights = &self.grid.heights[plane];
        let height = (heights.get(x_lo, y_lo)
            + heights.get(x_hi, y_lo)
            + heights.get(x_lo, y_hi)
            + heights.get(x_hi, y_hi))
            >> 2;

        Site {
            plane,
            x,
            y,
            size_x,
            size_y,
            kind: spawn.kind,
            rotation,
            position: Vector3::new(
                ((x << 7) + (size_x << 6)) as i32,
                height,
                ((y << 7) + (size_y << 6)) as i32,
            ),
            tag: EntityTag::object(spawn.local_x, spawn.local_y, def.is_interactive(), def.id),
            collision_plane: collision_plane(self.grid, plane, x, y),
        }
    }

    /// Renderable for `def` at a model type and rotation, or `None` when
    /// there is nothing to draw.
    fn renderable(
        &self,
        def: Option<&ObjectDefinition>,
        model_kind: u8,
        model_rotation: u8,
        site: &Site,
    ) -> Result<Option<Renderable>> {
        let Some(def) = def else {
            return Ok(None);
        };
        let source = self.definitions.source();
        let animated = def.animation_id != -1;

        if def.merge_normals && !animated {
            let model = self.models.model(def, model_kind, model_rotation, source)?;
            return Ok(model.map(|mesh| {
                Renderable::Pending(PendingMesh::new(mesh, self.models.lighting_for(def), def.contour))
            }));
        }

        let Some(lit) = self.models.lit(def, model_kind, model_rotation, source)? else {
            return Ok(None);
        };
        Ok(Some(self.finish(def, lit, model_rotation, site)))
    }

    fn finish(
        &self,
        def: &ObjectDefinition,
        lit: Arc<crate::model::LitMesh>,
        model_rotation: u8,
        site: &Site,
    ) -> Renderable {
        let lit = match def.contour {
            Some(mode) => contour(
                &lit,
                &self.grid.heights[site.plane],
                site.position.x,
                site.position.y,
                site.position.z,
                mode,
            ),
            None => lit,
        };
        if def.animation_id != -1 {
            Renderable::AnimatedPlaceholder {
                definition_id: def.id,
                kind: site.kind,
                rotation: model_rotation,
                animation_id: def.animation_id,
                rest: lit,
            }
        } else {
            Renderable::StaticMesh(lit)
        }
    }

    /// Both halves of a corner wall.
    fn corner_renderables(
        &self,
        def: Option<&ObjectDefinition>,
        site: &Site,
    ) -> Result<Option<(Renderable, Renderable)>> {
        let Some(def) = def else {
            return Ok(None);
        };
        let rotation = site.rotation;
        let second = (rotation + 1) & 3;
        if def.merge_normals && def.animation_id == -1 {
            let a = self.renderable(Some(def), 2, rotation + 4, site)?;
            let b = self.renderable(Some(def), 2, second, site)?;
            return Ok(a.zip(b));
        }
        let Some([a, b]) = self.models.corner_pair(def, rotation, self.definitions.source())? else {
            return Ok(None);
        };
        Ok(Some((
            self.finish(def, a, rotation + 4, site),
            self.finish(def, b, second, site),
        )))
    }

    fn place_wall(
        &self,
        def: &ObjectDefinition,
        visual: Option<&ObjectDefinition>,
        site: &Site,
        targets: &mut PlacementTargets<'_>,
    ) -> Result<bool> {
        let r = site.rotation as usize;
        let (primary, secondary, orientation, orientation2) = if site.kind == 2 {
            let (a, b) = self.corner_renderables(visual, site)?.unzip();
            (a, b, WALL_EDGES[r], WALL_EDGES[(r + 1) & 3])
        } else {
            let edges = if site.kind == 0 { WALL_EDGES[r] } else { CORNER_EDGES[r] };
            (self.renderable(visual, site.kind, site.rotation, site)?, None, edges, 0)
        };

        let visible = primary.is_some();
        if let Some(primary) = primary {
            let wall = WallObject {
                primary: site.placement(primary),
                secondary,
                orientation,
                orientation2,
            };
            targets.scene.set_wall(site.plane, site.x, site.y, wall);
        }
        if def.interact_type != 0 {
            if let Some(cp) = site.collision_plane {
                targets
                    .collision
                    .add_wall(cp, site.x, site.y, site.kind, site.rotation, def.blocks_projectile);
            }
        }
        if def.clipped {
            for (dx, dy) in wall_shadow(site.kind, site.rotation) {
                targets
                    .occlusion
                    .set(site.plane, site.x + dx, site.y + dy, WALL_SHADOW);
            }
        }
        if matches!(site.kind, 0 | 2) && def.decor_displacement != DEFAULT_DISPLACEMENT {
            targets
                .scene
                .rescale_wall_decoration(site.plane, site.x, site.y, def.decor_displacement);
        }
        Ok(visible)
    }

    fn place_decoration(
        &self,
        visual: Option<&ObjectDefinition>,
        site: &Site,
        targets: &mut PlacementTargets<'_>,
    ) -> Result<bool> {
        let rotation = site.rotation;
        let r = rotation as usize;
        let inside = (rotation + 2) & 3;
        let model = |model_rotation: u8| self.renderable(visual, TYPE_DECORATION_MODEL, model_rotation, site);
        let diagonal_offset = |d: i32| Vector2::new(d * DIAGONAL_DX[r], d * DIAGONAL_DY[r]);

        let (primary, secondary, orientation, angle, displacement) = match site.kind {
            4 => (model(rotation)?, None, WALL_EDGES[r], 0, Vector2::new(0, 0)),
            5 => {
                let d = self.wall_displacement(targets.scene, site);
                let offset = Vector2::new(d * WALL_DX[r], d * WALL_DY[r]);
                (model(rotation)?, None, WALL_EDGES[r], 0, offset)
            }
            6 => {
                let d = self.wall_displacement(targets.scene, site) / 2;
                (model(rotation + 4)?, None, rotation, DIAGONAL_ANGLE, diagonal_offset(d))
            }
            7 => (model(inside + 4)?, None, inside, DIAGONAL_ANGLE, Vector2::new(0, 0)),
            _ => {
                let d = self.wall_displacement(targets.scene, site) / 2;
                let inner = model(inside + 4)?;
                (model(rotation + 4)?, inner, rotation, DIAGONAL_ANGLE, diagonal_offset(d))
            }
        };

        let Some(primary) = primary else {
            return Ok(false);
        };
        let decoration = WallDecoration {
            primary: site.placement(primary),
            secondary,
            orientation,
            angle,
            displacement,
        };
        targets
            .scene
            .set_wall_decoration(site.plane, site.x, site.y, decoration);
        Ok(true)
    }

    /// Displacement of the wall already on the tile, or the default.
    fn wall_displacement(&self, scene: &Scene, site: &Site) -> i32 {
        scene
            .wall_tag(site.plane, site.x, site.y)
            .and_then(|tag| self.definitions.object(tag.definition_id).ok())
            .map_or(DEFAULT_DISPLACEMENT, |def| def.decor_displacement)
    }

    /// Register a game object. `None` when the scene rejected it, otherwise
    /// whether anything was drawn.
    fn add_game_object(
        &self,
        renderable: Option<Renderable>,
        site: &Site,
        size: (usize, usize),
        angle: i32,
        casts_shadow: bool,
        targets: &mut PlacementTargets<'_>,
    ) -> Option<bool> {
        let Some(renderable) = renderable else {
            return Some(false);
        };
        let radius = renderable.bounds().xz_radius;
        let object = GameObject {
            placement: site.placement(renderable),
            plane: site.plane,
            origin: (site.x, site.y),
            size,
            angle,
        };
        if targets.scene.add_game_object(object).is_none() {
            trace!(x = site.x, y = site.y, plane = site.plane, "tile full, object rejected");
            return None;
        }
        if casts_shadow {
            let shade = (radius / 4).min(MAX_OBJECT_SHADOW);
            for dx in 0..=size.0 {
                for dy in 0..=size.1 {
                    targets
                        .occlusion
                        .raise(site.plane, site.x + dx, site.y + dy, shade);
                }
            }
        }
        Some(true)
    }
}

/// Corners darkened by a clipped wall, relative to its tile.
fn wall_shadow(kind: u8, rotation: u8) -> Vec<(usize, usize)> {
    const EDGES: [[(usize, usize); 2]; 4] = [
        [(0, 0), (0, 1)],
        [(0, 1), (1, 1)],
        [(1, 0), (1, 1)],
        [(0, 0), (1, 0)],
    ];
    const CORNERS: [(usize, usize); 4] = [(0, 1), (1, 1), (1, 0), (0, 0)];
    let r = rotation as usize & 3;
    match kind {
        0 => EDGES[r].to_vec(),
        2 => EDGES[r].iter().chain(&EDGES[(r + 1) & 3]).copied().collect(),
        _ => vec![CORNERS[r]],
    }
}
