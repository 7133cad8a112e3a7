//! Region terrain: attribute decoding, procedural heights, colour blending,
//! lighting and tile tessellation.
//!
//! ```text
//! tile stream --RegionTileGrid::decode--> attributes + corner heights
//!                                          |
//!   underlay defs --blend_underlays-------+
//!   occlusion map --light_plane-----------+--> build_plane --> SceneTileModel per tile
//! ```

pub mod blend;
pub mod builder;
pub mod height;
pub mod shapes;
pub mod tiles;

pub use blend::blend_underlays;
pub use builder::{build_plane, light_plane, FloorSource, OcclusionMap, TerrainPlane};
pub use height::HeightField;
pub use shapes::{tessellate, SceneTileModel, TileCorners, TileVertex};
pub use tiles::{PlaneHeights, RegionTileGrid, TileAttributes, PLANES};
