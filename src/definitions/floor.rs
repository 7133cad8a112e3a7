//! Underlay and overlay floor definitions.
//!
//! Both are short opcode streams terminated by 0. Colours arrive as 24-bit
//! RGB and are converted to the 8-bit HSL the terrain code blends in.

use serde::Serialize;

use crate::buffer::Buffer;
use crate::error::{Result, SceneError};
use crate::math::pack_hsl;

/// Overlay RGB that marks water/void tiles.
pub const VOID_RGB: u32 = 0xFF00FF;

/// 8-bit HSL of an RGB colour plus the hue weight used when blending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FloorHsl {
    /// Hue scaled by `hue_multiplier` for underlays, plain 0..255 for
    /// overlays.
    pub hue: i32,
    pub saturation: i32,
    pub lightness: i32,
    pub hue_multiplier: i32,
}

impl FloorHsl {
    /// Plain 8-bit HSL; `hue` is 0..255.
    pub fn from_rgb(rgb: u32) -> FloorHsl {
        let (h, s, l) = rgb_to_hsl(rgb);
        FloorHsl {
            hue: ((h * 256.0) as i32).clamp(0, 255),
            ..Self::weighted(h, s, l)
        }
    }

    /// Underlay form: `hue` is pre-multiplied by `hue_multiplier`, so sums
    /// over many tiles weight each hue by how saturated it is.
    pub fn from_rgb_weighted(rgb: u32) -> FloorHsl {
        let (h, s, l) = rgb_to_hsl(rgb);
        Self::weighted(h, s, l)
    }

    fn weighted(h: f64, s: f64, l: f64) -> FloorHsl {
        let weight = if l > 0.5 { (1.0 - l) * s } else { l * s };
        let hue_multiplier = ((weight * 512.0) as i32).max(1);
        FloorHsl {
            hue: (h * hue_multiplier as f64) as i32,
            saturation: ((s * 256.0) as i32).clamp(0, 255),
            lightness: ((l * 256.0) as i32).clamp(0, 255),
            hue_multiplier,
        }
    }
}

/// Hue, saturation and lightness as fractions of 1.
fn rgb_to_hsl(rgb: u32) -> (f64, f64, f64) {
    let r = ((rgb >> 16) & 0xFF) as f64 / 256.0;
    let g = ((rgb >> 8) & 0xFF) as f64 / 256.0;
    let b = (rgb & 0xFF) as f64 / 256.0;
    let min = r.min(g).min(b);
    let max = r.max(g).max(b);
    let l = (min + max) / 2.0;
    if min == max {
        return (0.0, 0.0, l);
    }
    let d = max - min;
    let s = if l < 0.5 { d / (max + min) } else { d / (2.0 - max - min) };
    let mut h = if r == max {
        (g - b) / d
    } else if g == max {
        2.0 + (b - r) / d
    } else {
        4.0 + (r - g) / d
    };
    h /= 6.0;
    if h < 0.0 {
        h += 1.0;
    }
    (h, s, l)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnderlayDefinition {
    pub id: u32,
    pub rgb: u32,
    /// `hue` here is pre-multiplied by `hue_multiplier`.
    pub hsl: FloorHsl,
}

impl UnderlayDefinition {
    pub fn decode(id: u32, data: &[u8]) -> Result<UnderlayDefinition> {
        let mut buf = Buffer::new(data);
        let mut def = UnderlayDefinition {
            id,
            ..Default::default()
        };
        loop {
            match buf.read_u8()? {
                0 => break,
                1 => def.rgb = buf.read_u24()?,
                opcode => {
                    return Err(SceneError::UnknownOpcode {
                        kind: "underlay",
                        opcode,
                    })
                }
            }
        }
        def.hsl = FloorHsl::from_rgb_weighted(def.rgb);
        Ok(def)
    }

    /// Packed colour of a tile surrounded only by this underlay.
    pub fn packed_color(&self) -> i32 {
        let hsl = &self.hsl;
        pack_hsl(hsl.hue * 256 / hsl.hue_multiplier, hsl.saturation, hsl.lightness)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlayDefinition {
    pub id: u32,
    pub rgb: u32,
    /// Texture id, -1 for none.
    pub texture: i32,
    pub hide_underlay: bool,
    pub secondary_rgb: Option<u32>,
    pub hsl: FloorHsl,
}

impl Default for OverlayDefinition {
    fn default() -> Self {
        Self {
            id: 0,
            rgb: 0,
            texture: -1,
            hide_underlay: true,
            secondary_rgb: None,
            hsl: FloorHsl::default(),
        }
    }
}

impl OverlayDefinition {
    pub fn decode(id: u32, data: &[u8]) -> Result<OverlayDefinition> {
        let mut buf = Buffer::new(data);
        let mut def = OverlayDefinition {
            id,
            ..Default::default()
        };
        loop {
            match buf.read_u8()? {
                0 => break,
                1 => def.rgb = buf.read_u24()?,
                2 => def.texture = buf.read_u8()? as i32,
                5 => def.hide_underlay = false,
                7 => def.secondary_rgb = Some(buf.read_u24()?),
                opcode => {
                    return Err(SceneError::UnknownOpcode {
                        kind: "overlay",
                        opcode,
                    })
                }
            }
        }
        def.hsl = FloorHsl::from_rgb(def.rgb);
        Ok(def)
    }

    /// Colour code handed to tile shading: -1 textured, -2 void, otherwise
    /// packed HSL.
    pub fn shading_color(&self) -> i32 {
        if self.texture >= 0 {
            -1
        } else if self.rgb == VOID_RGB {
            -2
        } else {
            pack_hsl(self.hsl.hue, self.hsl.saturation, self.hsl.lightness)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grey_has_no_saturation() {
        let hsl = FloorHsl::from_rgb(0x808080);
        assert_eq!(hsl.saturation, 0);
        assert_eq!(hsl.lightness, 128);
        assert_eq!(hsl.hue_multiplier, 1);
    }

    #[test]
    fn pure_red_is_hue_zero() {
        let hsl = FloorHsl::from_rgb(0xFF0000);
        assert_eq!(hsl.hue, 0);
        assert!(hsl.saturation > 250);
    }

    #[test]
    fn blue_hue_wraps_forward() {
        // (r - g)/d = 0 on blue -> 4/6 of a turn
        let hsl = FloorHsl::from_rgb(0x0000FF);
        assert_eq!(hsl.hue, 170);
    }

    #[test]
    fn underlay_stream() {
        let def = UnderlayDefinition::decode(3, &[1, 0x20, 0x80, 0x20, 0]).unwrap();
        assert_eq!(def.rgb, 0x208020);
        assert!(def.hsl.hue_multiplier >= 1);
        assert!(def.packed_color() > 0);
    }

    #[test]
    fn overlay_stream_and_sentinels() {
        let def = OverlayDefinition::decode(1, &[1, 0xFF, 0x00, 0xFF, 5, 0]).unwrap();
        assert!(!def.hide_underlay);
        assert_eq!(def.shading_color(), -2);

        let textured = OverlayDefinition::decode(2, &[2, 9, 7, 0, 0, 1, 0]).unwrap();
        assert_eq!(textured.texture, 9);
        assert_eq!(textured.secondary_rgb, Some(1));
        assert_eq!(textured.shading_color(), -1);
    }

    #[test]
    fn unknown_opcode_is_fatal() {
        let err = UnderlayDefinition::decode(0, &[3, 0]).unwrap_err();
        assert!(matches!(
            err,
            SceneError::UnknownOpcode {
                kind: "underlay",
                opcode: 3
            }
        ));
    }
}
