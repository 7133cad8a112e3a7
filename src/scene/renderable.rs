//! What a scene slot draws.

use std::sync::Arc;

use crate::config::LightingParams;
use crate::model::{Bounds, ContourMode, IntermediateMesh, LitMesh, NormalSet};

/// An unlit mesh waiting for its neighbours' normals. Resolved into a
/// [`Renderable::StaticMesh`] by [`Scene::finalize_lighting`](super::Scene::finalize_lighting).
#[derive(Debug, Clone)]
pub struct PendingMesh {
    pub mesh: Arc<IntermediateMesh>,
    pub normals: NormalSet,
    pub lighting: LightingParams,
    /// Ground contouring to apply once lit.
    pub contour: Option<ContourMode>,
}

impl PendingMesh {
    pub fn new(
        mesh: Arc<IntermediateMesh>,
        lighting: LightingParams,
        contour: Option<ContourMode>,
    ) -> Self {
        let normals = NormalSet::compute(&mesh);
        Self {
            mesh,
            normals,
            lighting,
            contour,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Renderable {
    StaticMesh(Arc<LitMesh>),
    /// Animated object. Playback is up to the host; `rest` is the unanimated
    /// pose.
    AnimatedPlaceholder {
        definition_id: u32,
        kind: u8,
        rotation: u8,
        animation_id: i32,
        rest: Arc<LitMesh>,
    },
    Pending(PendingMesh),
}

impl Renderable {
    /// The lit mesh to draw, if lighting has happened.
    pub fn lit(&self) -> Option<&Arc<LitMesh>> {
        match self {
            Renderable::StaticMesh(mesh) => Some(mesh),
            Renderable::AnimatedPlaceholder { rest, .. } => Some(rest),
            Renderable::Pending(_) => None,
        }
    }

    pub fn bounds(&self) -> Bounds {
        match self {
            Renderable::StaticMesh(mesh) => mesh.bounds,
            Renderable::AnimatedPlaceholder { rest, .. } => rest.bounds,
            Renderable::Pending(pending) => pending.mesh.bounds(),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Renderable::Pending(_))
    }
}
