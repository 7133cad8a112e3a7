//! Ground contouring: bend a lit mesh so its base follows the terrain.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::LitMesh;

/// Terrain corner heights of one plane, indexed in tiles.
pub trait CornerHeights {
    /// Corners per axis (tiles + 1).
    fn corners(&self) -> usize;
    fn corner(&self, x: usize, y: usize) -> i32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContourMode {
    /// Every vertex moves by the terrain offset under it.
    Uniform,
    /// Only vertices below `threshold` (16.16 fraction of the mesh height)
    /// move, fading out towards the threshold.
    Clipped { threshold: i32 },
}

/// Bilinear terrain height at world position (`x`, `z`).
fn sample(heights: &impl CornerHeights, x: i32, z: i32) -> i32 {
    let last = heights.corners().saturating_sub(1);
    let tx = ((x >> 7).max(0) as usize).min(last.saturating_sub(1));
    let tz = ((z >> 7).max(0) as usize).min(last.saturating_sub(1));
    let fx = x & 127;
    let fz = z & 127;
    let near = heights.corner(tx, tz) * (128 - fx) + heights.corner(tx + 1, tz) * fx >> 7;
    let far = heights.corner(tx, tz + 1) * (128 - fx) + heights.corner(tx + 1, tz + 1) * fx >> 7;
    near * (128 - fz) + far * fz >> 7
}

/// Deform `mesh` placed at world (`x`, `y`) whose origin sits at `height`.
///
/// Returns the input `Arc` unchanged when the footprint square lies outside
/// the grid or all four of its corners are at `height`. Otherwise only the
/// Y axis is copied.
pub fn contour(
    mesh: &Arc<LitMesh>,
    heights: &impl CornerHeights,
    x: i32,
    height: i32,
    y: i32,
    mode: ContourMode,
) -> Arc<LitMesh> {
    let radius = mesh.bounds.xz_radius;
    let (x0, x1, y0, y1) = (x - radius, x + radius, y - radius, y + radius);
    let corners = heights.corners() as i32;
    if x0 < 0 || (x1 + 128) >> 7 >= corners || y0 < 0 || (y1 + 128) >> 7 >= corners {
        return Arc::clone(mesh);
    }
    let (tx0, tx1) = ((x0 >> 7) as usize, ((x1 + 127) >> 7) as usize);
    let (ty0, ty1) = ((y0 >> 7) as usize, ((y1 + 127) >> 7) as usize);
    if heights.corner(tx0, ty0) == height
        && heights.corner(tx1, ty0) == height
        && heights.corner(tx0, ty1) == height
        && heights.corner(tx1, ty1) == height
    {
        return Arc::clone(mesh);
    }

    let mut out = mesh.with_own_heights();
    let ys = Arc::make_mut(&mut out.vertices_y);
    match mode {
        ContourMode::Uniform => {
            for (i, vy) in ys.iter_mut().enumerate() {
                let ground = sample(heights, mesh.vertices_x[i] + x, mesh.vertices_z[i] + y);
                *vy += ground - height;
            }
        }
        ContourMode::Clipped { threshold } => {
            let model_height = mesh.bounds.height;
            if model_height <= 0 || threshold <= 0 {
                return Arc::clone(mesh);
            }
            for (i, vy) in ys.iter_mut().enumerate() {
                let ratio = (-*vy << 16) / model_height;
                if ratio < threshold {
                    let ground = sample(heights, mesh.vertices_x[i] + x, mesh.vertices_z[i] + y);
                    *vy += (ground - height) * (threshold - ratio) / threshold;
                }
            }
        }
    }
    out.recompute_bounds();
    Arc::new(out)
}
