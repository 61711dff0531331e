//! Demo configuration
//!
//! Every field has a default, so a config file only needs the values it changes.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::Error;
use crate::core::types::Result;

/// Camera placement and projection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub fov_degrees: f32,
    pub far: f32,
}

impl CameraConfig {
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn target(&self) -> Vec3 {
        Vec3::from_array(self.target)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [-1.0, 3.0, -1.0],
            target: [1.0, 0.5, 1.0],
            fov_degrees: 45.0,
            far: 50.0,
        }
    }
}

/// Top-level demo configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub window_width: u32,
    pub window_height: u32,
    /// Instances along X
    pub grid_width: u32,
    /// Instances along Z
    pub grid_depth: u32,
    /// Distance between neighbouring instances
    pub grid_spacing: f32,
    /// Active instance count at startup (clamped to the grid size)
    pub instance_count: u32,
    /// Number of LOD levels generated for the test mesh
    pub lod_count: u32,
    pub lod_pow: f32,
    pub enable_culling: bool,
    /// Frames the CPU may record ahead of the GPU
    pub frames_in_flight: u32,
    pub view_camera: CameraConfig,
    /// Camera whose frustum drives culling
    pub preview_camera: CameraConfig,
    pub debug_port: u16,
    pub vsync: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            grid_width: 200,
            grid_depth: 200,
            grid_spacing: 1.0,
            instance_count: 50,
            lod_count: 5,
            lod_pow: 0.7,
            enable_culling: true,
            frames_in_flight: 2,
            view_camera: CameraConfig::default(),
            preview_camera: CameraConfig {
                far: 40.0,
                ..CameraConfig::default()
            },
            debug_port: meshlod_debug::DEFAULT_PORT,
            vsync: false,
        }
    }
}

impl DemoConfig {
    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Capacity of every per-instance buffer
    pub fn instance_count_max(&self) -> u32 {
        self.grid_width.saturating_mul(self.grid_depth)
    }

    pub fn validate(&self) -> Result<()> {
        if self.instance_count_max() == 0 {
            return Err(Error::Config("instance grid must not be empty".into()));
        }
        if self.instance_count_max() > crate::lod::MAX_INSTANCES {
            return Err(Error::Config(format!(
                "instance grid of {} exceeds {} slots",
                self.instance_count_max(),
                crate::lod::MAX_INSTANCES
            )));
        }
        if self.lod_count == 0 || self.lod_count > crate::lod::MAX_LOD_LEVELS {
            return Err(Error::Config(format!(
                "lod_count must be in 1..={}, got {}",
                crate::lod::MAX_LOD_LEVELS,
                self.lod_count
            )));
        }
        if self.frames_in_flight == 0 {
            return Err(Error::Config("frames_in_flight must be at least 1".into()));
        }
        if !(self.grid_spacing > 0.0) {
            return Err(Error::Config("grid_spacing must be positive".into()));
        }
        for (name, cam) in [("view_camera", &self.view_camera), ("preview_camera", &self.preview_camera)] {
            if !(cam.far > 0.0) || !(cam.fov_degrees > 0.0 && cam.fov_degrees < 180.0) {
                return Err(Error::Config(format!("{name}: far and fov must be positive")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DemoConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.instance_count_max(), 40_000);
        assert_eq!(config.instance_count, 50);
        assert_eq!(config.preview_camera.far, 40.0);
        assert_eq!(config.view_camera.far, 50.0);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.json");
        std::fs::write(&path, r#"{ "instance_count": 1000, "preview_camera": { "far": 25.0 } }"#).unwrap();

        let config = DemoConfig::load(&path).unwrap();
        assert_eq!(config.instance_count, 1000);
        assert_eq!(config.preview_camera.far, 25.0);
        assert_eq!(config.preview_camera.fov_degrees, 45.0);
        assert_eq!(config.grid_width, 200);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("demo.json");
        let mut config = DemoConfig::default();
        config.lod_pow = 0.25;
        config.save(&path).unwrap();
        assert_eq!(DemoConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_lod_count_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{ "lod_count": 9 }"#).unwrap();
        assert!(matches!(DemoConfig::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_grid_beyond_slot_encoding_rejected() {
        let mut config = DemoConfig::default();
        config.grid_width = 20_000;
        config.grid_depth = 20_000;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_json_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(DemoConfig::load(&path), Err(Error::Json(_))));
    }
}
