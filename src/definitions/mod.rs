//! Object and floor definitions plus the store that decodes and caches
//! them.

pub mod floor;
pub mod object;
pub mod store;

pub use floor::{FloorHsl, OverlayDefinition, UnderlayDefinition};
pub use object::{ObjectDefinition, StaticVars, VarState, Variant};
pub use store::{AssetSource, DefinitionStore, MemorySource, SharedCache};
