//! Decoder for legacy game regions: object meshes, terrain tiles and the
//! landscape objects placed on them.

pub mod buffer;
pub mod collision;
pub mod config;
pub mod definitions;
pub mod error;
pub mod landscape;
pub mod math;
pub mod model;
pub mod region;
pub mod scene;
pub mod terrain;

pub use config::{LightingParams, SceneConfig};
pub use error::{Result, SceneError};
pub use region::{DecodedRegion, RegionLoader, RegionStats};
