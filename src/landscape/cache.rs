//! Object model caches.
//!
//! ```text
//! model id ──decode──▶ meshes
//! (rotation, type, definition) ──select + transform──▶ models ──light──▶ lit
//!                                                           └─corner pair─▶ corners
//! ```
//!
//! Every layer is a [`SharedCache`]: entries are immutable once published
//! and handed out as `Arc`s, so equal keys always yield the same instance.
//! Placements that need to deform a mesh clone it first.

use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

use crate::config::LightingParams;
use crate::definitions::{AssetSource, ObjectDefinition, SharedCache};
use crate::error::{Result, SceneError};
use crate::math::Trig;
use crate::model::light::light_with_normals;
use crate::model::merge::{merge_normals, MergeSide};
use crate::model::{self, IntermediateMesh, LitMesh, MeshCopyPlan, NormalSet};

/// Placement type of a basic wall decoration; its diagonal rotations are
/// built by turning the model 45 degrees.
const TYPE_WALL_DECORATION: u8 = 4;
const TYPE_CORNER_WALL: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ModelKey {
    /// 0..=3, or 4..=7 for the mirrored/diagonal variants.
    pub rotation: u8,
    pub kind: u8,
    pub definition: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub meshes: usize,
    pub models: usize,
    pub lit: usize,
    pub corners: usize,
}

pub struct ObjectModelCache {
    trig: Arc<Trig>,
    lighting: LightingParams,
    meshes: SharedCache<u32, IntermediateMesh>,
    models: SharedCache<ModelKey, IntermediateMesh>,
    lit: SharedCache<ModelKey, LitMesh>,
    corners: SharedCache<ModelKey, [Arc<LitMesh>; 2]>,
}

impl ObjectModelCache {
    pub fn new(trig: Arc<Trig>, lighting: LightingParams) -> Self {
        Self {
            trig,
            lighting,
            meshes: SharedCache::default(),
            models: SharedCache::default(),
            lit: SharedCache::default(),
            corners: SharedCache::default(),
        }
    }

    /// Lighting used for `def`: the base values plus the definition's own
    /// offsets.
    pub fn lighting_for(&self, def: &ObjectDefinition) -> LightingParams {
        self.lighting.with_offsets(def.ambient, def.contrast)
    }

    /// Decoded mesh for a raw model id.
    pub fn mesh(&self, id: u32, source: &dyn AssetSource) -> Result<Arc<IntermediateMesh>> {
        self.meshes.get_or_try_insert(id, || {
            let bytes = source
                .mesh(id)
                .ok_or(SceneError::MissingDefinition { kind: "mesh", id })?;
            trace!(id, len = bytes.len(), "decoding mesh");
            model::decode(&bytes)
        })
    }

    /// Unlit model of `def` for a placement type and rotation. `None` when
    /// the definition has no model for that type.
    pub fn model(
        &self,
        def: &ObjectDefinition,
        kind: u8,
        rotation: u8,
        source: &dyn AssetSource,
    ) -> Result<Option<Arc<IntermediateMesh>>> {
        let Some(ids) = def.models_for(kind) else {
            return Ok(None);
        };
        let key = ModelKey {
            rotation,
            kind,
            definition: def.id,
        };
        self.models
            .get_or_try_insert(key, || self.build_model(def, &ids, kind, rotation, source))
            .map(Some)
    }

    fn build_model(
        &self,
        def: &ObjectDefinition,
        ids: &[u32],
        kind: u8,
        rotation: u8,
        source: &dyn AssetSource,
    ) -> Result<IntermediateMesh> {
        let mirror = def.mirrored ^ (rotation > 3);
        let mut parts = Vec::with_capacity(ids.len());
        for &id in ids {
            let base = self.mesh(id, source)?;
            let mut part = base.derive(MeshCopyPlan::SHARE_ALL);
            if mirror {
                part.mirror();
            }
            parts.push(part);
        }
        let mut mesh = match parts.len() {
            1 => parts.remove(0),
            _ => IntermediateMesh::merge(&parts.iter().collect::<Vec<_>>()),
        };

        if kind == TYPE_WALL_DECORATION && rotation > 3 {
            mesh.rotate_y(&self.trig, 256);
            mesh.translate(45, 0, -45);
        }
        mesh.rotate_quarter(rotation & 3);
        for &(from, to) in &def.recolor {
            mesh.recolor(from, to);
        }
        for &(from, to) in &def.retexture {
            mesh.retexture(from, to);
        }
        if def.model_size_x != 128 || def.model_height != 128 || def.model_size_y != 128 {
            mesh.resize(def.model_size_x, def.model_height, def.model_size_y);
        }
        mesh.translate(def.offset_x, def.offset_height, def.offset_y);
        Ok(mesh)
    }

    /// Lit model, shared between every placement with the same key.
    pub fn lit(
        &self,
        def: &ObjectDefinition,
        kind: u8,
        rotation: u8,
        source: &dyn AssetSource,
    ) -> Result<Option<Arc<LitMesh>>> {
        let Some(model) = self.model(def, kind, rotation, source)? else {
            return Ok(None);
        };
        let key = ModelKey {
            rotation,
            kind,
            definition: def.id,
        };
        let params = self.lighting_for(def);
        self.lit
            .get_or_try_insert(key, || {
                Ok(light_with_normals(&model, &NormalSet::compute(&model), &params))
            })
            .map(Some)
    }

    /// Both halves of a corner wall. They are lit with shared normals so the
    /// joint shades as one surface.
    pub fn corner_pair(
        &self,
        def: &ObjectDefinition,
        rotation: u8,
        source: &dyn AssetSource,
    ) -> Result<Option<[Arc<LitMesh>; 2]>> {
        let rotation = rotation & 3;
        let first = self.model(def, TYPE_CORNER_WALL, rotation + 4, source)?;
        let second = self.model(def, TYPE_CORNER_WALL, (rotation + 1) & 3, source)?;
        let (Some(first), Some(second)) = (first, second) else {
            return Ok(None);
        };
        let key = ModelKey {
            rotation,
            kind: TYPE_CORNER_WALL,
            definition: def.id,
        };
        let params = self.lighting_for(def);
        let pair = self.corners.get_or_try_insert(key, || {
            let mut na = NormalSet::compute(&first);
            let mut nb = NormalSet::compute(&second);
            merge_normals(
                MergeSide {
                    mesh: &first,
                    normals: &mut na,
                },
                MergeSide {
                    mesh: &second,
                    normals: &mut nb,
                },
                (0, 0, 0),
                false,
            );
            Ok([
                Arc::new(light_with_normals(&first, &na, &params)),
                Arc::new(light_with_normals(&second, &nb, &params)),
            ])
        })?;
        Ok(Some([Arc::clone(&pair[0]), Arc::clone(&pair[1])]))
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            meshes: self.meshes.len(),
            models: self.models.len(),
            lit: self.lit.len(),
            corners: self.corners.len(),
        }
    }
}
