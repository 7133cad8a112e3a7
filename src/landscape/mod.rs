//! Landscape object spawns: the spawn stream, entity tags, the per-region
//! model cache and the placer that turns spawns into scene objects.

pub mod cache;
pub mod placer;
pub mod spawn;
pub mod tag;

pub use cache::{CacheStats, ModelKey, ObjectModelCache};
pub use placer::{LandscapeObjectPlacer, Outcome, PlacementStats, PlacementTargets, SkipReason};
pub use spawn::{decode_spawns, encode_spawns, Spawn};
pub use tag::{EntityKind, EntityTag};
