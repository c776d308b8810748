// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::{VoxelError, MAX_VOLUME_DIMENSION};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Size of the offscreen target the debug drawer renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawerTarget {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Default for DrawerTarget {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// User-facing settings of the voxelization subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxelConfig {
    /// Voxels per axis of the cubic volume.
    pub volume_dimension: u32,
    /// World-space side of the voxelized cube. `None` fits the scene box.
    pub volume_grid_size: Option<f32>,
    /// Voxelize every `framestep` frames.
    pub framestep: u32,
    /// Draw the debug view of the volume every frame.
    pub show_voxels: bool,
    /// Debug drawer target size.
    pub drawer_target: DrawerTarget,
}

impl Default for VoxelConfig {
    fn default() -> Self {
        Self {
            volume_dimension: 128,
            volume_grid_size: None,
            framestep: 1,
            show_voxels: false,
            drawer_target: DrawerTarget::default(),
        }
    }
}

impl VoxelConfig {
    /// Checks every field, returning the first rejected one.
    pub fn validate(&self) -> Result<(), VoxelError> {
        if self.volume_dimension == 0 {
            return Err(VoxelError::invalid_config(
                "volume_dimension",
                "must be at least 1",
            ));
        }
        if self.volume_dimension > MAX_VOLUME_DIMENSION {
            return Err(VoxelError::invalid_config(
                "volume_dimension",
                format!(
                    "{} exceeds the maximum of {MAX_VOLUME_DIMENSION}",
                    self.volume_dimension
                ),
            ));
        }
        if let Some(size) = self.volume_grid_size {
            if !size.is_finite() || size <= 0.0 {
                return Err(VoxelError::invalid_config(
                    "volume_grid_size",
                    format!("{size} is not a positive finite length"),
                ));
            }
        }
        if self.framestep == 0 {
            return Err(VoxelError::invalid_config("framestep", "must be at least 1"));
        }
        if self.drawer_target.width == 0 || self.drawer_target.height == 0 {
            return Err(VoxelError::invalid_config(
                "drawer_target",
                "width and height must be non-zero",
            ));
        }
        Ok(())
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Loads and validates a configuration file.
    pub fn from_file(
        path: impl AsRef<Path>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn to_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = VoxelConfig::default();
        assert_eq!(config.volume_dimension, 128);
        assert_eq!(config.framestep, 1);
        assert!(!config.show_voxels);
        assert!(config.volume_grid_size.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cases = [
            VoxelConfig {
                volume_dimension: 0,
                ..Default::default()
            },
            VoxelConfig {
                volume_dimension: MAX_VOLUME_DIMENSION + 1,
                ..Default::default()
            },
            VoxelConfig {
                framestep: 0,
                ..Default::default()
            },
            VoxelConfig {
                volume_grid_size: Some(-1.0),
                ..Default::default()
            },
            VoxelConfig {
                volume_grid_size: Some(f32::INFINITY),
                ..Default::default()
            },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(VoxelError::InvalidConfig { .. })),
                "{config:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_from_json_partial() {
        let json = r#"{ "volume_dimension": 64, "show_voxels": true }"#;
        let config = VoxelConfig::from_json(json).unwrap();
        assert_eq!(config.volume_dimension, 64);
        assert!(config.show_voxels);
        assert_eq!(config.framestep, 1);
        assert_eq!(config.drawer_target, DrawerTarget::default());
    }

    #[test]
    fn test_from_file_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{ "framestep": 0 }"#).unwrap();
        assert!(VoxelConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let config = VoxelConfig {
            volume_dimension: 32,
            volume_grid_size: Some(12.5),
            framestep: 4,
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voxels.json");
        config.to_file(&path).unwrap();
        let loaded = VoxelConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
