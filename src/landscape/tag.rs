//! Entity tags used for picking and the minimap.
//!
//! ```text
//! bit  0..7   local x
//! bit  7..14  local y
//! bit 14..16  entity kind
//! bit 16      interactive
//! bit 17..    definition id
//! ```

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntityKind {
    Player = 0,
    Npc = 1,
    Object = 2,
    Item = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EntityTag {
    pub local_x: u8,
    pub local_y: u8,
    pub kind: EntityKind,
    pub interactive: bool,
    pub definition_id: u32,
}

impl EntityTag {
    pub fn object(local_x: u8, local_y: u8, interactive: bool, definition_id: u32) -> Self {
        Self {
            local_x,
            local_y,
            kind: EntityKind::Object,
            interactive,
            definition_id,
        }
    }

    /// Opaque form handed to external consumers.
    pub fn pack(&self) -> u64 {
        (self.local_x as u64 & 127)
            | (self.local_y as u64 & 127) << 7
            | (self.kind as u64 & 3) << 14
            | (self.interactive as u64) << 16
            | (self.definition_id as u64) << 17
    }

    /// Definition id carried by a packed tag.
    pub fn definition_id_of(packed: u64) -> u32 {
        (packed >> 17) as u32
    }
}
