//! Fixed-point trigonometry and packed-HSL colour helpers.
//!
//! Angles are measured in 2048ths of a turn and trig values are scaled by
//! 65536. The tables are built once by [`Trig::new`] and handed to whatever
//! needs them; there is no process-wide table.

use std::sync::Arc;

pub const ANGLE_STEPS: usize = 2048;

/// 2π / 2048, truncated the way the legacy tables were generated.
const ANGLE_UNIT: f64 = 0.003_067_961_5;

/// Packed colour returned for geometry that must not be drawn at all.
pub const VOID_COLOR: i32 = 12_345_678;

/// Precomputed sine and cosine tables.
#[derive(Debug, Clone)]
pub struct Trig {
    sine: Box<[i32; ANGLE_STEPS]>,
    cosine: Box<[i32; ANGLE_STEPS]>,
}

impl Trig {
    pub fn new() -> Self {
        let mut sine = Box::new([0i32; ANGLE_STEPS]);
        let mut cosine = Box::new([0i32; ANGLE_STEPS]);
        for i in 0..ANGLE_STEPS {
            let angle = i as f64 * ANGLE_UNIT;
            sine[i] = (65536.0 * angle.sin()) as i32;
            cosine[i] = (65536.0 * angle.cos()) as i32;
        }
        Self { sine, cosine }
    }

    /// Shared handle for components that keep the tables around.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn sin(&self, angle: usize) -> i32 {
        self.sine[angle & (ANGLE_STEPS - 1)]
    }

    pub fn cos(&self, angle: usize) -> i32 {
        self.cosine[angle & (ANGLE_STEPS - 1)]
    }
}

impl Default for Trig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Packed HSL
// ============================================================================
//
// 16-bit layout: hue(6) << 10 | saturation(3) << 7 | lightness(7)

/// Pack 8-bit hue/saturation/lightness into the 16-bit HSL format.
/// Saturation is halved progressively for very light colours.
pub fn pack_hsl(hue: i32, saturation: i32, lightness: i32) -> i32 {
    let mut saturation = saturation;
    if lightness > 179 {
        saturation /= 2;
    }
    if lightness > 192 {
        saturation /= 2;
    }
    if lightness > 217 {
        saturation /= 2;
    }
    if lightness > 243 {
        saturation /= 2;
    }
    (hue / 4 << 10) + (saturation / 32 << 7) + lightness / 2
}

pub fn lightness_of(hsl: i32) -> i32 {
    hsl & 127
}

/// Replace the lightness bits of a packed colour.
pub fn with_lightness(hsl: i32, lightness: i32) -> i32 {
    (hsl & 0xFF80) | (lightness & 127)
}

pub fn clamp_lightness(light: i32) -> i32 {
    light.clamp(2, 126)
}

/// Shade an underlay colour by a terrain light value. `-1` marks a tile
/// without underlay colour and shades to [`VOID_COLOR`].
pub fn shade_underlay(hsl: i32, light: i32) -> i32 {
    if hsl == -1 {
        return VOID_COLOR;
    }
    let light = (lightness_of(hsl) as i64 * light as i64 / 128).clamp(2, 126) as i32;
    (hsl & 0xFF80) + light
}

/// Shade an overlay colour. `-2` is the water/void marker and shades to
/// [`VOID_COLOR`]; `-1` is the plain-white textured overlay and keeps only
/// the light value.
pub fn shade_overlay(hsl: i32, light: i32) -> i32 {
    match hsl {
        -2 => VOID_COLOR,
        -1 => clamp_lightness(light),
        _ => {
            let light = (lightness_of(hsl) as i64 * light as i64 / 128).clamp(2, 126) as i32;
            (hsl & 0xFF80) + light
        }
    }
}
