//! Whole-region decoding.
//!
//! ```text
//! terrain bytes ──▶ RegionTileGrid ──▶ floor collision
//! landscape bytes ──▶ spawns ──▶ placer ──▶ Scene ──▶ finalize_lighting
//!                                   └──▶ occlusion ──▶ terrain planes
//! ```
//!
//! A [`RegionLoader`] owns the caches shared by every region it decodes and
//! may be used from several threads at once. Everything a single region
//! writes to lives in the returned [`DecodedRegion`].

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::collision::{block_floors, CollisionEvent};
use crate::config::SceneConfig;
use crate::definitions::{AssetSource, DefinitionStore, StaticVars, VarState};
use crate::error::Result;
use crate::landscape::{
    decode_spawns, CacheStats, LandscapeObjectPlacer, ObjectModelCache, PlacementStats,
    PlacementTargets, Spawn,
};
use crate::math::Trig;
use crate::scene::{Scene, SceneStats};
use crate::terrain::{build_plane, HeightField, OcclusionMap, RegionTileGrid, TerrainPlane, PLANES};

#[derive(Debug, Clone, Serialize)]
pub struct RegionStats {
    pub base_x: i32,
    pub base_y: i32,
    pub spawns: usize,
    pub placement: PlacementStats,
    pub scene: SceneStats,
    /// Meshes lit by the deferred normal-merging pass.
    pub merged_lit: usize,
    pub blocked_floors: usize,
    /// Triangles per plane.
    pub terrain_triangles: Vec<usize>,
}

#[derive(Debug)]
pub struct DecodedRegion {
    pub grid: RegionTileGrid,
    pub scene: Scene,
    pub terrain: Vec<TerrainPlane>,
    pub spawns: Vec<Spawn>,
    pub collision: Vec<CollisionEvent>,
    pub stats: RegionStats,
}

pub struct RegionLoader<S> {
    config: SceneConfig,
    definitions: Arc<DefinitionStore<S>>,
    models: ObjectModelCache,
    field: HeightField,
    vars: Box<dyn VarState + Send + Sync>,
}

impl<S: AssetSource> RegionLoader<S> {
    pub fn new(config: SceneConfig, definitions: Arc<DefinitionStore<S>>) -> Self {
        let trig = Trig::shared();
        Self {
            models: ObjectModelCache::new(Arc::clone(&trig), config.object_lighting),
            field: HeightField::new(trig),
            config,
            definitions,
            vars: Box::new(StaticVars::default()),
        }
    }

    /// Replace the variable values used to pick object variants.
    pub fn with_vars(mut self, vars: impl VarState + Send + Sync + 'static) -> Self {
        self.vars = Box::new(vars);
        self
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn definitions(&self) -> &DefinitionStore<S> {
        &self.definitions
    }

    pub fn model_stats(&self) -> CacheStats {
        self.models.stats()
    }

    /// Decode the region whose south-west tile is (`base_x`, `base_y`).
    pub fn load(&self, base_x: i32, base_y: i32, terrain: &[u8], landscape: &[u8]) -> Result<DecodedRegion> {
        let size = self.config.region_size;
        let grid = RegionTileGrid::decode(
            terrain,
            size,
            base_x,
            base_y,
            &self.field,
            self.config.wide_terrain_opcodes,
            0,
        )?;

        let mut collision = Vec::new();
        let blocked_floors = block_floors(&grid, &mut collision);

        let spawns = decode_spawns(landscape)?;
        let mut scene = Scene::new(size, PLANES);
        let mut occlusion = OcclusionMap::new(size, PLANES);
        let placer = LandscapeObjectPlacer::new(
            &grid,
            &self.definitions,
            &self.models,
            self.vars.as_ref(),
            self.config.low_detail,
        );
        let placement = placer.place_all(
            &spawns,
            &mut PlacementTargets {
                scene: &mut scene,
                occlusion: &mut occlusion,
                collision: &mut collision,
            },
        )?;
        let merged_lit = scene.finalize_lighting(&grid.heights);

        let terrain = (0..PLANES)
            .map(|plane| build_plane(&grid, plane, &occlusion, &self.config, self.definitions.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let stats = RegionStats {
            base_x,
            base_y,
            spawns: spawns.len(),
            placement,
            scene: scene.stats(),
            merged_lit,
            blocked_floors,
            terrain_triangles: terrain.iter().map(TerrainPlane::triangle_count).collect(),
        };
        info!(
            base_x,
            base_y,
            placed = placement.placed,
            skipped = placement.skipped,
            "decoded region"
        );
        debug!(models = ?self.models.stats(), "model cache");

        Ok(DecodedRegion {
            grid,
            scene,
            terrain,
            spawns,
            collision,
            stats,
        })
    }
}
