//! Engine configuration.
//!
//! Every field has a default, so a config file only needs the keys it wants
//! to change:
//!
//! ```json
//! {
//!   "scene":   { "depth_sort": true },
//!   "physics": { "gravity": [0.0, -20.0, 0.0], "world_scale": 10.0 }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::math::{Color, Vec3};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scene: SceneConfig,
    pub physics: PhysicsConfig,
}

impl EngineConfig {
    /// Parse a JSON configuration string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Scene container settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Render only to an offscreen target, never presented.
    pub virtual_scene: bool,
    /// Destroy removed entities instead of detaching them.
    pub owns_children: bool,
    /// Clear color handed to the dispatcher; `None` leaves the target as is.
    pub clear_color: Option<Color>,
    pub ambient_color: Color,
    pub lighting_enabled: bool,
    /// Reject subtrees whose bounding sphere is outside the camera frustum.
    pub frustum_culling: bool,
    /// Render roots far-to-near from the camera.
    pub depth_sort: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            virtual_scene: false,
            owns_children: false,
            clear_color: None,
            ambient_color: Color::rgb(0.1, 0.1, 0.1),
            lighting_enabled: false,
            frustum_culling: true,
            depth_sort: false,
        }
    }
}

/// Physics bridge settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: Vec3,
    /// Fixed simulation step in seconds.
    pub timestep: f32,
    /// Upper bound on a single frame delta fed to the accumulator.
    pub max_frame_delta: f32,
    /// Scene units per physics unit (e.g. pixels per meter).
    pub world_scale: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            timestep: 1.0 / 60.0,
            max_frame_delta: 0.25,
            world_scale: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn partial_override() {
        let config = EngineConfig::from_json_str(
            r#"{ "scene": { "depth_sort": true }, "physics": { "world_scale": 10.0 } }"#,
        )
        .unwrap();
        assert!(config.scene.depth_sort);
        assert!(config.scene.frustum_culling);
        assert_eq!(config.physics.world_scale, 10.0);
        assert!((config.physics.timestep - 1.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(EngineConfig::from_json_str("{ not json").is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = EngineConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, crate::error::Error::Io(_)));
    }
}
