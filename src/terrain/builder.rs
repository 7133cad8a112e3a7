//! Terrain lighting and per-tile model assembly.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use super::blend::{blend_underlays, NO_UNDERLAY};
use super::shapes::{tessellate, SceneTileModel, TileCorners};
use super::tiles::{PlaneHeights, RegionTileGrid, FLAG_HIDDEN_LOW_DETAIL};
use crate::config::{LightingParams, SceneConfig};
use crate::definitions::floor::{FloorHsl, OverlayDefinition, UnderlayDefinition};
use crate::error::{Result, SceneError};
use crate::math::{pack_hsl, shade_overlay, shade_underlay};
use crate::model::contour::CornerHeights;

/// Where the builder gets floor definitions from. Ids are the 1-based
/// values stored in the tile stream.
pub trait FloorSource {
    fn underlay(&self, id: u16) -> Result<Arc<UnderlayDefinition>>;
    fn overlay(&self, id: u16) -> Result<Arc<OverlayDefinition>>;
    /// Whether a texture id can be resolved. Unresolvable textures are
    /// drawn as plain colour.
    fn has_texture(&self, _texture: i32) -> bool {
        true
    }
}

// ============================================================================
// Light occlusion
// ============================================================================

/// Per-corner darkening written by placed objects, one grid per plane.
#[derive(Debug, Clone, Serialize)]
pub struct OcclusionMap {
    corners: usize,
    planes: Vec<Vec<i32>>,
}

impl OcclusionMap {
    pub fn new(size: usize, planes: usize) -> Self {
        let corners = size + 1;
        Self {
            corners,
            planes: vec![vec![0; corners * corners]; planes],
        }
    }

    pub fn get(&self, plane: usize, x: usize, y: usize) -> i32 {
        self.planes[plane][x * self.corners + y]
    }

    pub fn set(&mut self, plane: usize, x: usize, y: usize, value: i32) {
        if x < self.corners && y < self.corners {
            self.planes[plane][x * self.corners + y] = value;
        }
    }

    /// Raise the value at (x, y) to at least `value`.
    pub fn raise(&mut self, plane: usize, x: usize, y: usize, value: i32) {
        if x < self.corners && y < self.corners {
            let slot = &mut self.planes[plane][x * self.corners + y];
            *slot = (*slot).max(value);
        }
    }
}

// ============================================================================
// Corner lighting
// ============================================================================

/// Light value for every corner of a plane, `[x * corners + y]`.
///
/// The surface normal comes from the height differences of the four
/// neighbouring corners; occlusion from the five-point stencil around the
/// corner is subtracted.
pub fn light_plane(
    heights: &PlaneHeights,
    occlusion: &OcclusionMap,
    plane: usize,
    params: &LightingParams,
) -> Vec<i32> {
    let n = heights.corners();
    let scale = params.scale().max(1);
    let last = n - 1;

    let mut out = vec![0; n * n];
    for x in 0..n {
        let (xm, xp) = (x.saturating_sub(1), (x + 1).min(last));
        for y in 0..n {
            let (ym, yp) = (y.saturating_sub(1), (y + 1).min(last));
            let dx = heights.get(xp, y) - heights.get(xm, y);
            let dy = heights.get(x, yp) - heights.get(x, ym);
            let len = ((dx * dx + 65536 + dy * dy) as f64).sqrt() as i32;
            let nx = (dx << 8) / len;
            let ny = 65536 / len;
            let nz = (dy << 8) / len;
            let light = params.shade(params.dot(nx, ny, nz), scale);
            let shade = (occlusion.get(plane, xm, y) >> 2)
                + (occlusion.get(plane, xp, y) >> 3)
                + (occlusion.get(plane, x, ym) >> 2)
                + (occlusion.get(plane, x, yp) >> 3)
                + (occlusion.get(plane, x, y) >> 1);
            out[x * n + y] = light.saturating_sub(shade);
        }
    }
    out
}

// ============================================================================
// Plane assembly
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct TerrainPlane {
    pub plane: usize,
    pub size: usize,
    /// `[x * size + y]`; `None` for tiles with neither underlay nor overlay.
    pub tiles: Vec<Option<SceneTileModel>>,
}

impl TerrainPlane {
    pub fn tile(&self, x: usize, y: usize) -> Option<&SceneTileModel> {
        self.tiles[x * self.size + y].as_ref()
    }

    pub fn triangle_count(&self) -> usize {
        self.tiles.iter().flatten().map(|t| t.triangles.len()).sum()
    }
}

/// Look a definition up, downgrading "not there" to `None`.
fn optional<T>(result: Result<T>, kind: &str, id: u16) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(SceneError::MissingDefinition { .. }) => {
            warn!(kind, id, "tile references missing floor definition");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Build every tile model of one plane.
pub fn build_plane(
    grid: &RegionTileGrid,
    plane: usize,
    occlusion: &OcclusionMap,
    config: &SceneConfig,
    floors: &impl FloorSource,
) -> Result<TerrainPlane> {
    let size = grid.size;

    let mut underlays: HashMap<u16, Option<FloorHsl>> = HashMap::new();
    let mut overlays: HashMap<u16, Option<(i32, i32)>> = HashMap::new();
    for x in 0..size {
        for y in 0..size {
            let tile = grid.tile(plane, x, y);
            if tile.underlay != 0 && !underlays.contains_key(&tile.underlay) {
                let def = optional(floors.underlay(tile.underlay), "underlay", tile.underlay)?;
                underlays.insert(tile.underlay, def.map(|d| d.hsl));
            }
            if tile.overlay != 0 && !overlays.contains_key(&tile.overlay) {
                let def = optional(floors.overlay(tile.overlay), "overlay", tile.overlay)?;
                overlays.insert(tile.overlay, def.map(|d| overlay_paint(&d, floors)));
            }
        }
    }

    let blended = blend_underlays(grid, plane, config.blend_radius, |id| {
        underlays.get(&id).copied().flatten()
    });
    let light = light_plane(&grid.heights[plane], occlusion, plane, &config.terrain_lighting);
    let corner_count = size + 1;
    let light_at = |x: usize, y: usize| light[x * corner_count + y];

    let mut tiles = Vec::with_capacity(size * size);
    for x in 0..size {
        for y in 0..size {
            let tile = grid.tile(plane, x, y);
            let paint = overlays.get(&tile.overlay).copied().flatten();
            let has_underlay = blended[x * size + y] != NO_UNDERLAY;
            if (!has_underlay && paint.is_none())
                || (config.low_detail && tile.render_flags & FLAG_HIDDEN_LOW_DETAIL != 0)
            {
                tiles.push(None);
                continue;
            }

            let pts = [(x, y), (x + 1, y), (x + 1, y + 1), (x, y + 1)];
            let lights = pts.map(|(cx, cy)| light_at(cx, cy));
            let hsl = blended[x * size + y];
            let (overlay_hsl, texture) = paint.unwrap_or((-2, -1));
            let corners = TileCorners {
                heights: pts.map(|(cx, cy)| grid.height(plane, cx, cy)),
                underlay: lights.map(|l| shade_underlay(hsl, l)),
                overlay: lights.map(|l| shade_overlay(overlay_hsl, l)),
                texture,
            };
            let shape = if paint.is_some() { tile.shape + 1 } else { 0 };
            tiles.push(Some(tessellate(
                shape,
                tile.rotation,
                x as i32,
                y as i32,
                &corners,
            )));
        }
    }

    let plane_model = TerrainPlane { plane, size, tiles };
    debug!(
        plane,
        tiles = plane_model.tiles.iter().flatten().count(),
        triangles = plane_model.triangle_count(),
        "built terrain plane"
    );
    Ok(plane_model)
}

/// Overlay colour code and texture, falling back to plain colour when the
/// texture cannot be resolved.
fn overlay_paint(def: &OverlayDefinition, floors: &impl FloorSource) -> (i32, i32) {
    if def.texture >= 0 && !floors.has_texture(def.texture) {
        warn!(overlay = def.id, texture = def.texture, "missing overlay texture");
        let hsl = &def.hsl;
        return (pack_hsl(hsl.hue, hsl.saturation, hsl.lightness), -1);
    }
    (def.shading_color(), def.texture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{lightness_of, VOID_COLOR};

    struct Floors {
        underlay: Arc<UnderlayDefinition>,
        overlay: Arc<OverlayDefinition>,
    }

    impl FloorSource for Floors {
        fn underlay(&self, id: u16) -> Result<Arc<UnderlayDefinition>> {
            if id == 1 {
                Ok(Arc::clone(&self.underlay))
            } else {
                Err(SceneError::MissingDefinition {
                    kind: "underlay",
                    id: id as u32,
                })
            }
        }

        fn overlay(&self, _id: u16) -> Result<Arc<OverlayDefinition>> {
            Ok(Arc::clone(&self.overlay))
        }
    }

    fn floors() -> Floors {
        Floors {
            underlay: Arc::new(UnderlayDefinition::decode(0, &[1, 0x40, 0x90, 0x30, 0]).unwrap()),
            overlay: Arc::new(OverlayDefinition::decode(0, &[1, 0xFF, 0x00, 0xFF, 0]).unwrap()),
        }
    }

    fn flat_grid(size: usize) -> RegionTileGrid {
        let mut grid = RegionTileGrid::new(size, 0, 0);
        for x in 0..size {
            for y in 0..size {
                grid.tile_mut(0, x, y).underlay = 1;
            }
        }
        grid
    }

    #[test]
    fn flat_ground_gets_ambient_minus_tilt() {
        let grid = flat_grid(4);
        let occlusion = OcclusionMap::new(4, 4);
        let light = light_plane(&grid.heights[0], &occlusion, 0, &LightingParams::TERRAIN);
        // flat normal = (0, 256, 0): 256 * -10 / 213 = -12
        assert!(light.iter().all(|&l| l == 96 - 12));
    }

    #[test]
    fn extreme_light_vector_saturates() {
        let grid = flat_grid(4);
        let occlusion = OcclusionMap::new(4, 4);
        let params = LightingParams {
            ambient: 96,
            contrast: 768,
            light_x: 40_000,
            light_y: 40_000,
            light_z: 0,
        };
        // |light| = 56568, scale = 169704, flat dot = 256 * 40000
        let light = light_plane(&grid.heights[0], &occlusion, 0, &params);
        assert!(light.iter().all(|&l| l == 96 + 60));

        let params = LightingParams {
            ambient: i32::MAX,
            contrast: i32::MAX,
            light_x: i32::MIN,
            light_y: i32::MIN,
            light_z: i32::MIN,
        };
        let light = light_plane(&grid.heights[0], &occlusion, 0, &params);
        assert_eq!(light.len(), 25);
    }

    #[test]
    fn occlusion_darkens_neighbourhood() {
        let grid = flat_grid(4);
        let mut occlusion = OcclusionMap::new(4, 4);
        occlusion.raise(0, 2, 2, 40);
        occlusion.raise(0, 2, 2, 10);
        assert_eq!(occlusion.get(0, 2, 2), 40);
        let light = light_plane(&grid.heights[0], &occlusion, 0, &LightingParams::TERRAIN);
        let n = 5;
        assert_eq!(light[2 * n + 2], 84 - 20);
        assert_eq!(light[n + 2], 84 - 5);
        assert_eq!(light[3 * n + 2], 84 - 10);
    }

    #[test]
    fn plain_tiles_use_blended_underlay() {
        let grid = flat_grid(6);
        let floors = floors();
        let plane = build_plane(&grid, 0, &OcclusionMap::new(6, 4), &SceneConfig::default(), &floors).unwrap();
        let packed = floors.underlay.packed_color();
        let tile = plane.tile(3, 3).unwrap();
        assert_eq!(tile.shape, 0);
        assert_eq!(tile.triangles.len(), 2);
        for v in tile.triangles.iter().flatten() {
            assert_eq!(v.color & !127, packed & !127);
            assert_eq!(lightness_of(v.color), (lightness_of(packed) * 84 / 128).clamp(2, 126));
        }
    }

    #[test]
    fn void_overlay_without_underlay_leaves_hole() {
        let mut grid = RegionTileGrid::new(2, 0, 0);
        grid.tile_mut(0, 0, 0).overlay = 1;
        let plane = build_plane(&grid, 0, &OcclusionMap::new(2, 4), &SceneConfig::default(), &floors()).unwrap();
        let tile = plane.tile(0, 0).unwrap();
        assert!(tile.triangles.iter().flatten().all(|v| v.color != VOID_COLOR));
        assert!(tile.triangles.is_empty());
        assert!(plane.tile(1, 1).is_none());
    }

    #[test]
    fn missing_underlay_is_skipped() {
        let mut grid = RegionTileGrid::new(2, 0, 0);
        grid.tile_mut(0, 0, 0).underlay = 9;
        let plane = build_plane(&grid, 0, &OcclusionMap::new(2, 4), &SceneConfig::default(), &floors()).unwrap();
        assert!(plane.tile(0, 0).is_none());
    }
}
