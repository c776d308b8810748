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

//! Debug visualization of the resolved volume.
//!
//! Draws one cube per non-empty voxel, colored with the voxel's resolved
//! value. The pass only reads the volume, so it can run on every frame
//! whether or not the volume was refreshed.

use log::trace;
use vxgi_core::lane::Lane;
use vxgi_core::math::{Mat4, Vec3};
use vxgi_core::voxel::{DrawStats, VoxelError, VoxelRegion};
use vxgi_core::VoxelBackend;

/// Unit cube corners, `[0, 1]³`. Instances scale and offset them per voxel.
pub const CUBE_POSITIONS: [[f32; 3]; 8] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [1.0, 1.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [1.0, 0.0, 1.0],
    [1.0, 1.0, 1.0],
    [0.0, 1.0, 1.0],
];

/// Counter-clockwise triangle list over [`CUBE_POSITIONS`].
#[rustfmt::skip]
pub const CUBE_INDICES: [u16; 36] = [
    0, 2, 1, 0, 3, 2,
    4, 5, 6, 4, 6, 7,
    0, 1, 5, 0, 5, 4,
    3, 7, 6, 3, 6, 2,
    0, 4, 7, 0, 7, 3,
    1, 2, 6, 1, 6, 5,
];

/// Draws the voxel volume as instanced cubes.
#[derive(Debug, Default)]
pub struct VoxelDrawerLane;

impl VoxelDrawerLane {
    /// Creates a new `VoxelDrawerLane`.
    pub fn new() -> Self {
        Self
    }

    /// Draws the last resolved volume with `view_proj`.
    pub fn execute(
        &self,
        backend: &mut dyn VoxelBackend,
        view_proj: &Mat4,
    ) -> Result<DrawStats, VoxelError> {
        let stats = backend.draw_voxels(view_proj)?;
        trace!("Voxel drawer issued {} instances", stats.instances);
        Ok(stats)
    }

    /// A perspective camera looking at `region` from above one corner.
    pub fn overview_camera(region: &VoxelRegion, aspect_ratio: f32) -> Mat4 {
        let center = region.center();
        let distance = region.size * 1.8;
        let eye = center + Vec3::new(1.0, 0.8, 1.2).normalize() * distance;
        let view = Mat4::look_at_rh(eye, center, Vec3::Y).unwrap_or(Mat4::IDENTITY);
        let aspect = if aspect_ratio.is_finite() && aspect_ratio > 0.0 {
            aspect_ratio
        } else {
            1.0
        };
        let projection = Mat4::perspective_rh_zo(
            60f32.to_radians(),
            aspect,
            region.size * 0.01,
            region.size * 4.0,
        );
        projection * view
    }
}

impl Lane for VoxelDrawerLane {
    fn strategy_name(&self) -> &'static str {
        "InstancedCubes"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vxgi_core::math::Aabb;

    #[test]
    fn test_overview_camera_sees_region() {
        let bbox = Aabb::from_min_max(Vec3::ZERO, Vec3::splat(10.0));
        let (region, _) = VoxelRegion::fit(&bbox, None, 8);
        let camera = VoxelDrawerLane::overview_camera(&region, 16.0 / 9.0);
        for corner in region.bounds().corners() {
            let ndc = camera.project_point3(corner);
            assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0, "{ndc:?}");
            assert!((0.0..=1.0).contains(&ndc.z), "{ndc:?}");
        }
    }

    #[test]
    fn test_cube_indices_in_range() {
        assert!(CUBE_INDICES.iter().all(|&i| (i as usize) < CUBE_POSITIONS.len()));
    }
}
