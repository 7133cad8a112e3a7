//! Landscape object definitions.
//!
//! A definition is an opcode stream terminated by 0. Every opcode the
//! format knows is listed below; anything else is fatal.
//!
//! ```text
//! 1   n, n x (model u16, type u8)        40  recolor  n x (from u16, to u16)
//! 2   name                               41  retexture n x (from u16, to u16)
//! 5   n, n x model u16                   61  category u16
//! 14  size x u8                          62  mirrored
//! 15  size y u8                          64  not clipped
//! 17  not solid, no projectile block     65..67 resize x / height / y u16
//! 18  no projectile block                68  map scene u16
//! 19  wall or door u8                    69  blocking mask u8
//! 21  contour ground (uniform)           70..72 offset x / height / y i16
//! 22  merge normals                      73  obstructs ground
//! 23  model clipped                      74  hollow
//! 24  animation u16                      75  supports items u8
//! 27  interact type 1                    77/92 transforms
//! 28  decoration displacement u8         78  ambient sound u16, distance u8
//! 29  ambient i8                         79  ambient sound set
//! 30..34 action string                   81  contour ground (clipped) u8
//! 39  contrast i8                        82  map icon u16
//! 89  no random animation start          249 params
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::buffer::Buffer;
use crate::error::{Result, SceneError};
use crate::model::ContourMode;

/// Placement type for plain game objects; the only type a definition
/// without per-type models can be placed as.
pub const TYPE_GAME_OBJECT: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ParamValue {
    Int(i32),
    Str(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AmbientSound {
    pub sound_id: i32,
    pub distance: u8,
    pub change_ticks_min: u16,
    pub change_ticks_max: u16,
    pub sound_ids: Vec<u16>,
}

/// Varbit or varp switch selecting another definition at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transforms {
    pub varbit: i32,
    pub varp: i32,
    /// Target ids, -1 meaning "render nothing". The last entry is the
    /// fallback for out-of-range values.
    pub ids: Vec<i32>,
}

/// Source of varbit/varp values for resolving [`Transforms`].
pub trait VarState {
    fn varbit(&self, id: u32) -> i32;
    fn varp(&self, id: u32) -> i32;
}

/// Fixed variable values; anything unset reads as 0.
#[derive(Debug, Clone, Default)]
pub struct StaticVars {
    pub varbits: HashMap<u32, i32>,
    pub varps: HashMap<u32, i32>,
}

impl VarState for StaticVars {
    fn varbit(&self, id: u32) -> i32 {
        self.varbits.get(&id).copied().unwrap_or(0)
    }

    fn varp(&self, id: u32) -> i32 {
        self.varps.get(&id).copied().unwrap_or(0)
    }
}

/// Outcome of resolving a definition's transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// No transforms; use the definition as is.
    Itself,
    Other(u32),
    /// The active variant renders nothing.
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectDefinition {
    pub id: u32,
    pub name: String,
    pub model_ids: Vec<u32>,
    /// Placement type of each entry in `model_ids`, when they are per type.
    pub model_types: Option<Vec<u8>>,
    pub size_x: u8,
    pub size_y: u8,
    /// 0 walkable, 1 blocks like a floor decoration, 2 solid.
    pub interact_type: u8,
    pub blocks_projectile: bool,
    pub wall_or_door: i32,
    pub contour: Option<ContourMode>,
    pub merge_normals: bool,
    pub model_clipped: bool,
    pub animation_id: i32,
    pub decor_displacement: i32,
    pub ambient: i32,
    pub contrast: i32,
    pub actions: [Option<String>; 5],
    pub recolor: Vec<(u16, u16)>,
    pub retexture: Vec<(i16, i16)>,
    pub category: i32,
    pub mirrored: bool,
    pub clipped: bool,
    pub model_size_x: i32,
    pub model_height: i32,
    pub model_size_y: i32,
    pub map_scene_id: i32,
    pub blocking_mask: u8,
    pub offset_x: i32,
    pub offset_height: i32,
    pub offset_y: i32,
    pub obstructs_ground: bool,
    pub hollow: bool,
    pub supports_items: i32,
    pub transforms: Option<Transforms>,
    pub ambient_sound: Option<AmbientSound>,
    pub map_icon_id: i32,
    pub randomize_anim_start: bool,
    pub params: BTreeMap<u32, ParamValue>,
}

impl Default for ObjectDefinition {
    fn default() -> Self {
        Self {
            id: 0,
            name: "null".to_string(),
            model_ids: Vec::new(),
            model_types: None,
            size_x: 1,
            size_y: 1,
            interact_type: 2,
            blocks_projectile: true,
            wall_or_door: -1,
            contour: None,
            merge_normals: false,
            model_clipped: false,
            animation_id: -1,
            decor_displacement: 16,
            ambient: 0,
            contrast: 0,
            actions: Default::default(),
            recolor: Vec::new(),
            retexture: Vec::new(),
            category: -1,
            mirrored: false,
            clipped: true,
            model_size_x: 128,
            model_height: 128,
            model_size_y: 128,
            map_scene_id: -1,
            blocking_mask: 0,
            offset_x: 0,
            offset_height: 0,
            offset_y: 0,
            obstructs_ground: false,
            hollow: false,
            supports_items: -1,
            transforms: None,
            ambient_sound: None,
            map_icon_id: -1,
            randomize_anim_start: true,
            params: BTreeMap::new(),
        }
    }
}

fn u16_or_none(value: u16) -> i32 {
    if value == u16::MAX {
        -1
    } else {
        value as i32
    }
}

impl ObjectDefinition {
    pub fn decode(id: u32, data: &[u8]) -> Result<ObjectDefinition> {
        let mut buf = Buffer::new(data);
        let mut def = ObjectDefinition {
            id,
            ..Default::default()
        };
        loop {
            let opcode = buf.read_u8()?;
            if opcode == 0 {
                break;
            }
            def.apply(opcode, &mut buf)?;
        }
        def.finish();
        Ok(def)
    }

    fn apply(&mut self, opcode: u8, buf: &mut Buffer<'_>) -> Result<()> {
        match opcode {
            1 => {
                let n = buf.read_u8()? as usize;
                let mut ids = Vec::with_capacity(n);
                let mut types = Vec::with_capacity(n);
                for _ in 0..n {
                    ids.push(buf.read_u16()? as u32);
                    types.push(buf.read_u8()?);
                }
                self.model_ids = ids;
                self.model_types = Some(types);
            }
            2 => self.name = buf.read_string()?,
            5 => {
                let n = buf.read_u8()? as usize;
                self.model_ids = (0..n)
                    .map(|_| buf.read_u16().map(u32::from))
                    .collect::<Result<_>>()?;
                self.model_types = None;
            }
            14 => self.size_x = buf.read_u8()?,
            15 => self.size_y = buf.read_u8()?,
            17 => {
                self.interact_type = 0;
                self.blocks_projectile = false;
            }
            18 => self.blocks_projectile = false,
            19 => self.wall_or_door = buf.read_u8()? as i32,
            21 => self.contour = Some(ContourMode::Uniform),
            22 => self.merge_normals = true,
            23 => self.model_clipped = true,
            24 => self.animation_id = u16_or_none(buf.read_u16()?),
            27 => self.interact_type = 1,
            28 => self.decor_displacement = buf.read_u8()? as i32,
            29 => self.ambient = buf.read_i8()? as i32,
            39 => self.contrast = buf.read_i8()? as i32 * 25,
            30..=34 => {
                let action = buf.read_string()?;
                self.actions[(opcode - 30) as usize] =
                    (!action.eq_ignore_ascii_case("hidden")).then_some(action);
            }
            40 => {
                let n = buf.read_u8()? as usize;
                self.recolor = (0..n)
                    .map(|_| -> Result<(u16, u16)> { Ok((buf.read_u16()?, buf.read_u16()?)) })
                    .collect::<Result<_>>()?;
            }
            41 => {
                let n = buf.read_u8()? as usize;
                self.retexture = (0..n)
                    .map(|_| -> Result<(i16, i16)> { Ok((buf.read_i16()?, buf.read_i16()?)) })
                    .collect::<Result<_>>()?;
            }
            61 => self.category = buf.read_u16()? as i32,
            62 => self.mirrored = true,
            64 => self.clipped = false,
            65 => self.model_size_x = buf.read_u16()? as i32,
            66 => self.model_height = buf.read_u16()? as i32,
            67 => self.model_size_y = buf.read_u16()? as i32,
            68 => self.map_scene_id = buf.read_u16()? as i32,
            69 => self.blocking_mask = buf.read_u8()?,
            70 => self.offset_x = buf.read_i16()? as i32,
            71 => self.offset_height = buf.read_i16()? as i32,
            72 => self.offset_y = buf.read_i16()? as i32,
            73 => self.obstructs_ground = true,
            74 => self.hollow = true,
            75 => self.supports_items = buf.read_u8()? as i32,
            77 | 92 => {
                let varbit = u16_or_none(buf.read_u16()?);
                let varp = u16_or_none(buf.read_u16()?);
                let fallback = if opcode == 92 {
                    u16_or_none(buf.read_u16()?)
                } else {
                    -1
                };
                let n = buf.read_u8()? as usize;
                let mut ids = Vec::with_capacity(n + 2);
                for _ in 0..=n {
                    ids.push(u16_or_none(buf.read_u16()?));
                }
                ids.push(fallback);
                self.transforms = Some(Transforms { varbit, varp, ids });
            }
            78 => {
                let sound = self.ambient_sound.get_or_insert_with(AmbientSound::default);
                sound.sound_id = buf.read_u16()? as i32;
                sound.distance = buf.read_u8()?;
            }
            79 => {
                let sound = self.ambient_sound.get_or_insert_with(AmbientSound::default);
                sound.change_ticks_min = buf.read_u16()?;
                sound.change_ticks_max = buf.read_u16()?;
                sound.distance = buf.read_u8()?;
                let n = buf.read_u8()? as usize;
                sound.sound_ids = (0..n).map(|_| buf.read_u16()).collect::<Result<_>>()?;
            }
            81 => {
                self.contour = Some(ContourMode::Clipped {
                    threshold: buf.read_u8()? as i32 * 256,
                })
            }
            82 => self.map_icon_id = buf.read_u16()? as i32,
            89 => self.randomize_anim_start = false,
            249 => {
                let n = buf.read_u8()? as usize;
                for _ in 0..n {
                    let is_string = buf.read_u8()? == 1;
                    let key = buf.read_u24()?;
                    let value = if is_string {
                        ParamValue::Str(buf.read_string()?)
                    } else {
                        ParamValue::Int(buf.read_i32()?)
                    };
                    self.params.insert(key, value);
                }
            }
            _ => {
                return Err(SceneError::UnknownOpcode {
                    kind: "object",
                    opcode,
                })
            }
        }
        Ok(())
    }

    /// Derived defaults that depend on the whole stream.
    fn finish(&mut self) {
        if self.wall_or_door == -1 {
            let has_actions = self.actions.iter().any(Option::is_some);
            let single_game_object = self
                .model_types
                .as_ref()
                .map_or(!self.model_ids.is_empty(), |t| t.first() == Some(&TYPE_GAME_OBJECT));
            self.wall_or_door = (single_game_object || has_actions) as i32;
        }
        if self.hollow {
            self.interact_type = 0;
            self.blocks_projectile = false;
        }
        if self.supports_items == -1 {
            self.supports_items = (self.interact_type != 0) as i32;
        }
    }

    /// Whether the player can interact with it at all.
    pub fn is_interactive(&self) -> bool {
        self.wall_or_door == 1
    }

    /// Model ids usable for placement `kind`, or `None` when the definition
    /// has no model for it.
    pub fn models_for(&self, kind: u8) -> Option<Vec<u32>> {
        match &self.model_types {
            None => (kind == TYPE_GAME_OBJECT && !self.model_ids.is_empty())
                .then(|| self.model_ids.clone()),
            Some(types) => types
                .iter()
                .position(|&t| t == kind)
                .map(|i| vec![self.model_ids[i]]),
        }
    }

    pub fn resolve_variant(&self, vars: &dyn VarState) -> Variant {
        let Some(t) = &self.transforms else {
            return Variant::Itself;
        };
        let value = if t.varbit != -1 {
            vars.varbit(t.varbit as u32)
        } else if t.varp != -1 {
            vars.varp(t.varp as u32)
        } else {
            -1
        };
        let last = t.ids.len().saturating_sub(1);
        let id = if value >= 0 && (value as usize) < last {
            t.ids[value as usize]
        } else {
            t.ids.last().copied().unwrap_or(-1)
        };
        if id < 0 {
            Variant::Hidden
        } else {
            Variant::Other(id as u32)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_u16(out: &mut Vec<u8>, v: u16) {
        out.extend_from_slice(&v.to_be_bytes());
    }

    #[test]
    fn empty_stream_gives_defaults() {
        let def = ObjectDefinition::decode(7, &[0]).unwrap();
        assert_eq!(def.id, 7);
        assert_eq!((def.size_x, def.size_y), (1, 1));
        assert_eq!(def.interact_type, 2);
        assert!(def.clipped);
        assert_eq!(def.decor_displacement, 16);
        assert!(def.contour.is_none());
    }

    #[test]
    fn typed_models_and_flags() {
        let mut data = vec![1, 2];
        push_u16(&mut data, 100);
        data.push(0);
        push_u16(&mut data, 101);
        data.push(10);
        data.extend_from_slice(&[14, 2, 15, 3, 22, 29, 0xF6, 39, 2, 81, 3, 62]);
        data.extend_from_slice(&[30]);
        data.extend_from_slice(b"Open\0");
        data.extend_from_slice(&[31]);
        data.extend_from_slice(b"Hidden\0");
        data.push(0);

        let def = ObjectDefinition::decode(1, &data).unwrap();
        assert_eq!(def.model_ids, vec![100, 101]);
        assert_eq!(def.models_for(0), Some(vec![100]));
        assert_eq!(def.models_for(10), Some(vec![101]));
        assert_eq!(def.models_for(4), None);
        assert_eq!((def.size_x, def.size_y), (2, 3));
        assert!(def.merge_normals);
        assert_eq!(def.ambient, -10);
        assert_eq!(def.contrast, 50);
        assert_eq!(def.contour, Some(ContourMode::Clipped { threshold: 768 }));
        assert!(def.mirrored);
        assert_eq!(def.actions[0].as_deref(), Some("Open"));
        assert!(def.actions[1].is_none());
        assert!(def.is_interactive());
    }

    #[test]
    fn untyped_models_only_place_as_game_objects() {
        let mut data = vec![5, 1];
        push_u16(&mut data, 55);
        data.push(0);
        let def = ObjectDefinition::decode(1, &data).unwrap();
        assert_eq!(def.models_for(10), Some(vec![55]));
        assert_eq!(def.models_for(0), None);
    }

    #[test]
    fn transforms_pick_variant() {
        let mut data = vec![92];
        push_u16(&mut data, 12); // varbit
        push_u16(&mut data, 0xFFFF); // varp
        push_u16(&mut data, 900); // fallback
        data.push(1); // n = 1 -> two ids
        push_u16(&mut data, 500);
        push_u16(&mut data, 0xFFFF);
        data.push(0);
        let def = ObjectDefinition::decode(1, &data).unwrap();

        let mut vars = StaticVars::default();
        assert_eq!(def.resolve_variant(&vars), Variant::Other(500));
        vars.varbits.insert(12, 1);
        assert_eq!(def.resolve_variant(&vars), Variant::Hidden);
        vars.varbits.insert(12, 40);
        assert_eq!(def.resolve_variant(&vars), Variant::Other(900));
    }

    #[test]
    fn params_and_sounds() {
        let mut data = vec![249, 2, 1, 0, 0, 5];
        data.extend_from_slice(b"abc\0");
        data.extend_from_slice(&[0, 0, 0, 6, 0, 0, 1, 0]);
        data.push(78);
        push_u16(&mut data, 2000);
        data.push(4);
        data.push(0);
        let def = ObjectDefinition::decode(1, &data).unwrap();
        assert_eq!(def.params.get(&5), Some(&ParamValue::Str("abc".into())));
        assert_eq!(def.params.get(&6), Some(&ParamValue::Int(256)));
        let sound = def.ambient_sound.unwrap();
        assert_eq!((sound.sound_id, sound.distance), (2000, 4));
    }

    #[test]
    fn unknown_opcode_is_fatal() {
        let err = ObjectDefinition::decode(1, &[200, 0]).unwrap_err();
        assert!(matches!(
            err,
            SceneError::UnknownOpcode {
                kind: "object",
                opcode: 200
            }
        ));
    }
}
