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

//! The world-space cube covered by the voxel volume.

use crate::math::{Aabb, Vec3};

/// Smallest side length a voxel region may have.
///
/// Collapsed scenes (a point, a plane, or nothing at all) are clamped to this
/// so projections stay invertible.
pub const MIN_EXTENT: f32 = 1e-3;

/// The cube of world space mapped onto the voxel grid.
///
/// The region is centred on the scene box. Its side is either the configured
/// grid size or the largest extent of the box, so one voxel spans
/// `size / dimension` world units on every axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelRegion {
    /// Minimum corner of the cube.
    pub min: Vec3,
    /// Side length of the cube.
    pub size: f32,
    /// Voxels per axis.
    pub dimension: u32,
}

impl VoxelRegion {
    /// Fits a region to a scene box.
    ///
    /// `grid_size` overrides the side length; `None` uses the largest box
    /// extent. Invalid boxes are treated as a point at the origin. Returns
    /// the region and whether the side had to be clamped to [`MIN_EXTENT`].
    pub fn fit(scene_box: &Aabb, grid_size: Option<f32>, dimension: u32) -> (Self, bool) {
        let (center, extent) = if scene_box.is_valid() {
            (scene_box.center(), scene_box.size().max_element())
        } else {
            (Vec3::ZERO, 0.0)
        };
        let requested = grid_size.unwrap_or(extent);
        let clamped = !requested.is_finite() || requested < MIN_EXTENT;
        let size = if clamped { MIN_EXTENT } else { requested };

        (
            Self {
                min: center - Vec3::splat(size * 0.5),
                size,
                dimension: dimension.max(1),
            },
            clamped,
        )
    }

    /// Centre of the cube.
    #[inline]
    pub fn center(&self) -> Vec3 {
        self.min + Vec3::splat(self.size * 0.5)
    }

    /// Maximum corner of the cube.
    #[inline]
    pub fn max(&self) -> Vec3 {
        self.min + Vec3::splat(self.size)
    }

    /// The cube as a bounding box.
    #[inline]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_min_max(self.min, self.max())
    }

    /// World-space side length of one voxel.
    #[inline]
    pub fn voxel_size(&self) -> f32 {
        self.size / self.dimension as f32
    }

    /// Maps a world position to the voxel containing it.
    ///
    /// Positions on the far boundary belong to the last voxel. Positions more
    /// than half a voxel outside the cube return `None`.
    pub fn voxel_coord(&self, p: Vec3) -> Option<[u32; 3]> {
        let local = (p - self.min) / self.voxel_size();
        let d = self.dimension as f32;
        let mut coord = [0u32; 3];
        for (axis, c) in coord.iter_mut().enumerate() {
            let v = local[axis];
            if !v.is_finite() || v < -0.5 || v > d + 0.5 {
                return None;
            }
            *c = (v.floor().max(0.0) as u32).min(self.dimension - 1);
        }
        Some(coord)
    }

    /// World-space centre of a voxel.
    #[inline]
    pub fn voxel_center(&self, coord: [u32; 3]) -> Vec3 {
        let s = self.voxel_size();
        self.min
            + Vec3::new(
                (coord[0] as f32 + 0.5) * s,
                (coord[1] as f32 + 0.5) * s,
                (coord[2] as f32 + 0.5) * s,
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fit_uses_largest_extent() {
        let b = Aabb::from_min_max(Vec3::ZERO, Vec3::new(10.0, 4.0, 2.0));
        let (r, clamped) = VoxelRegion::fit(&b, None, 8);
        assert!(!clamped);
        assert_relative_eq!(r.size, 10.0);
        assert_eq!(r.center(), b.center());
        assert_relative_eq!(r.voxel_size(), 1.25);
    }

    #[test]
    fn test_fit_degenerate_box_is_clamped() {
        let (r, clamped) = VoxelRegion::fit(&Aabb::INVALID, None, 4);
        assert!(clamped);
        assert_eq!(r.size, MIN_EXTENT);
        assert_eq!(r.center(), Vec3::ZERO);

        let plane = Aabb::from_min_max(Vec3::new(1.0, 1.0, 1.0), Vec3::new(1.0, 1.0, 1.0));
        let (r, clamped) = VoxelRegion::fit(&plane, None, 4);
        assert!(clamped);
        assert!(r.size > 0.0);
    }

    #[test]
    fn test_fit_respects_grid_size_override() {
        let b = Aabb::from_min_max(Vec3::ZERO, Vec3::ONE);
        let (r, _) = VoxelRegion::fit(&b, Some(4.0), 16);
        assert_eq!(r.size, 4.0);
        assert_eq!(r.min, Vec3::splat(-1.5));
    }

    #[test]
    fn test_voxel_coord_scenario_mapping() {
        let b = Aabb::from_min_max(Vec3::ZERO, Vec3::splat(10.0));
        let (r, _) = VoxelRegion::fit(&b, None, 8);
        assert_eq!(r.voxel_coord(Vec3::splat(5.5)), Some([4, 4, 4]));
        assert_eq!(r.voxel_coord(Vec3::ZERO), Some([0, 0, 0]));
        // The far boundary belongs to the last voxel.
        assert_eq!(r.voxel_coord(Vec3::splat(10.0)), Some([7, 7, 7]));
        assert_eq!(r.voxel_coord(Vec3::new(5.0, 5.0, 20.0)), None);
        assert_eq!(r.voxel_center([4, 4, 4]), Vec3::splat(5.625));
    }
}
