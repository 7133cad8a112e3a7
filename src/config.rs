//! Scene decoding options.
//!
//! Everything has a default matching the legacy client, so hosts only
//! override what they need. Files are plain JSON:
//!
//! ```json
//! { "wide_terrain_opcodes": true, "low_detail": false }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Ambient/contrast/light-vector triple fed to a lighting pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightingParams {
    pub ambient: i32,
    pub contrast: i32,
    pub light_x: i32,
    pub light_y: i32,
    pub light_z: i32,
}

impl LightingParams {
    /// Base values for object meshes; definitions add their own ambient
    /// and contrast on top.
    pub const OBJECT: LightingParams = LightingParams {
        ambient: 64,
        contrast: 768,
        light_x: -50,
        light_y: -10,
        light_z: -50,
    };

    pub const TERRAIN: LightingParams = LightingParams {
        ambient: 96,
        contrast: 768,
        light_x: -50,
        light_y: -10,
        light_z: -50,
    };

    /// Divisor applied to `light · normal`: the light vector length times
    /// the contrast, over 256. Computed wide so any configured vector is
    /// accepted.
    pub fn scale(&self) -> i64 {
        let (x, y, z) = (self.light_x as f64, self.light_y as f64, self.light_z as f64);
        let length = (x * x + y * y + z * z).sqrt() as i64;
        length.saturating_mul(self.contrast as i64) >> 8
    }

    /// `light · (x, y, z)`, saturating.
    pub fn dot(&self, x: i32, y: i32, z: i32) -> i64 {
        let term = |l: i32, n: i32| (l as i64).saturating_mul(n as i64);
        term(self.light_x, x)
            .saturating_add(term(self.light_y, y))
            .saturating_add(term(self.light_z, z))
    }

    /// Ambient plus `dot / divisor`, clamped to `i32`. A zero divisor
    /// yields the ambient level.
    pub fn shade(&self, dot: i64, divisor: i64) -> i32 {
        let light = (self.ambient as i64).saturating_add(dot.checked_div(divisor).unwrap_or(0));
        light.clamp(i32::MIN as i64, i32::MAX as i64) as i32
    }

    pub fn with_offsets(self, ambient: i32, contrast: i32) -> Self {
        Self {
            ambient: self.ambient.saturating_add(ambient),
            contrast: self.contrast.saturating_add(contrast),
            ..self
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Tiles per region edge.
    pub region_size: usize,
    /// Terrain attribute values are 2 bytes wide instead of 1 (newer
    /// cache revisions).
    pub wide_terrain_opcodes: bool,
    /// Drop decorative floor objects and upper-plane tiles hidden by the
    /// render flags.
    pub low_detail: bool,
    pub object_lighting: LightingParams,
    pub terrain_lighting: LightingParams,
    /// Half-width of the underlay colour box filter, in tiles.
    pub blend_radius: usize,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            region_size: 64,
            wide_terrain_opcodes: false,
            low_detail: false,
            object_lighting: LightingParams::OBJECT,
            terrain_lighting: LightingParams::TERRAIN,
            blend_radius: 5,
        }
    }
}

impl SceneConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: SceneConfig =
            serde_json::from_str(text).context("Failed to parse scene config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene config {}", path.display()))?;
        Self::from_json(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.region_size == 0 || self.region_size > 128 {
            anyhow::bail!(
                "region_size must be within 1..=128, got {}",
                self.region_size
            );
        }
        if self.blend_radius == 0 {
            anyhow::bail!("blend_radius must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_object_yields_defaults() {
        let config = SceneConfig::from_json("{}").unwrap();
        assert_eq!(config.region_size, 64);
        assert_eq!(config.blend_radius, 5);
        assert!(!config.wide_terrain_opcodes);
        assert_eq!(config.object_lighting, LightingParams::OBJECT);
    }

    #[test]
    fn load_from_file_overrides_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "wide_terrain_opcodes": true, "terrain_lighting": {{ "ambient": 80, "contrast": 700, "light_x": -50, "light_y": -10, "light_z": -50 }} }}"#
        )
        .unwrap();

        let config = SceneConfig::load(file.path()).unwrap();
        assert!(config.wide_terrain_opcodes);
        assert_eq!(config.terrain_lighting.ambient, 80);
        assert_eq!(config.terrain_lighting.contrast, 700);
        assert_eq!(config.region_size, 64);
    }

    #[test]
    fn scale_of_extreme_vector_does_not_wrap() {
        let params = LightingParams {
            ambient: 64,
            contrast: i32::MAX,
            light_x: i32::MAX,
            light_y: i32::MIN,
            light_z: 40_000,
        };
        assert!(params.scale() > 0);
        assert_eq!(params.shade(params.dot(i32::MAX, 0, 0), 1), i32::MAX);
        assert_eq!(params.shade(params.dot(1, 1, 1), 0), 64);
        assert_eq!(LightingParams::OBJECT.scale(), 71 * 768 >> 8);
    }

    #[test]
    fn rejects_zero_region() {
        let err = SceneConfig::from_json(r#"{ "region_size": 0 }"#).unwrap_err();
        assert!(err.to_string().contains("region_size"));
    }

    #[test]
    fn missing_file_has_context() {
        let err = SceneConfig::load(Path::new("/nonexistent/scene.json")).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read scene config"));
    }
}
