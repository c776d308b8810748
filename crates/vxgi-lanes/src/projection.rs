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

//! Builds the three orthographic view-projections used to rasterize the
//! scene along each world axis.
//!
//! For an axis `A`, the camera sits on the face of the voxel region with the
//! smallest `A` coordinate and looks toward `+A`. The ortho extents equal the
//! region side, so with a `dimension × dimension` viewport one raster pixel
//! covers exactly one voxel column. Depth is padded on both ends so geometry
//! lying exactly on the region faces is never clipped.

use log::warn;
use vxgi_core::math::{Aabb, Mat4, Vec3};
use vxgi_core::voxel::{Axis, VoxelError, VoxelRegion};

/// Fraction of the region side added before the near and after the far plane.
pub const DEPTH_PADDING: f32 = 0.01;

/// Relative corner displacement below which a box is considered unchanged.
pub const REBUILD_EPSILON: f32 = 1e-4;

/// The per-axis view-projection matrices for one scene box.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisProjections {
    matrices: [Mat4; 3],
    region: VoxelRegion,
    source: Aabb,
    grid_size: Option<f32>,
}

impl AxisProjections {
    /// View-projection for `axis`.
    #[inline]
    pub fn get(&self, axis: Axis) -> &Mat4 {
        &self.matrices[axis.index()]
    }

    /// All three matrices in `X, Y, Z` order.
    pub fn iter(&self) -> impl Iterator<Item = (Axis, &Mat4)> {
        Axis::ALL.into_iter().map(move |axis| (axis, self.get(axis)))
    }

    /// The voxel region these matrices cover.
    #[inline]
    pub fn region(&self) -> &VoxelRegion {
        &self.region
    }

    /// The box the matrices were built from.
    #[inline]
    pub fn source_box(&self) -> &Aabb {
        &self.source
    }

    /// Returns `true` if the matrices were built for the given settings.
    pub fn matches(&self, grid_size: Option<f32>, dimension: u32) -> bool {
        self.grid_size == grid_size && self.region.dimension == dimension
    }

    /// Returns `true` if `bbox` differs from the source box by more than the
    /// rebuild tolerance on any corner.
    pub fn needs_rebuild(&self, bbox: &Aabb) -> bool {
        match (self.source.is_valid(), bbox.is_valid()) {
            (false, false) => false,
            (true, true) => {
                let tolerance = REBUILD_EPSILON * self.region.size.max(1.0);
                self.source
                    .corners()
                    .iter()
                    .zip(bbox.corners().iter())
                    .any(|(a, b)| (*a - *b).abs().max_element() > tolerance)
            }
            _ => true,
        }
    }
}

/// Stateless builder for [`AxisProjections`].
pub struct ProjectionBuilder;

impl ProjectionBuilder {
    /// Builds the three projections covering `bbox`.
    ///
    /// Degenerate boxes (a point, a plane, or [`Aabb::INVALID`]) are clamped
    /// to [`MIN_EXTENT`](vxgi_core::voxel::MIN_EXTENT) so every matrix stays
    /// invertible.
    pub fn build(
        bbox: &Aabb,
        grid_size: Option<f32>,
        dimension: u32,
    ) -> Result<AxisProjections, VoxelError> {
        let (region, clamped) = VoxelRegion::fit(bbox, grid_size, dimension);
        if clamped {
            warn!(
                "Voxel region for box {:?} is degenerate; clamped side to {}",
                bbox, region.size
            );
        }

        let center = region.center();
        let half = region.size * 0.5;
        let pad = DEPTH_PADDING * region.size;
        let projection = Mat4::orthographic_rh_zo(-half, half, -half, half, -pad, region.size + pad);

        let mut matrices = [Mat4::IDENTITY; 3];
        for axis in Axis::ALL {
            let eye = center - axis.direction() * half;
            let view = Mat4::look_at_rh(eye, center, axis.up()).ok_or_else(|| {
                VoxelError::Backend(format!("degenerate view for axis {axis} at {eye:?}"))
            })?;
            matrices[axis.index()] = projection * view;
        }

        Ok(AxisProjections {
            matrices,
            region,
            source: *bbox,
            grid_size,
        })
    }
}

/// Maps a world point to the raster pixel it lands on for `axis`, in a
/// `dimension × dimension` viewport with `y` pointing down.
pub fn world_to_pixel(projections: &AxisProjections, axis: Axis, p: Vec3) -> (f32, f32) {
    let ndc = projections.get(axis).project_point3(p);
    let d = projections.region().dimension as f32;
    ((ndc.x + 1.0) * 0.5 * d, (1.0 - ndc.y) * 0.5 * d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scenario_box() -> Aabb {
        Aabb::from_min_max(Vec3::ZERO, Vec3::splat(10.0))
    }

    #[test]
    fn test_corners_land_in_ndc_and_round_trip() {
        let boxes = [
            scenario_box(),
            Aabb::from_min_max(Vec3::new(-3.0, 2.0, -40.0), Vec3::new(7.0, 5.0, 12.0)),
            Aabb::from_min_max(Vec3::splat(1000.0), Vec3::splat(1500.0)),
        ];
        for bbox in boxes {
            let projections = ProjectionBuilder::build(&bbox, None, 64).unwrap();
            for (_, m) in projections.iter() {
                let inverse = m.inverse().expect("projection must be invertible");
                for corner in bbox.corners() {
                    let ndc = m.project_point3(corner);
                    assert!((-1.0 - 1e-4..=1.0 + 1e-4).contains(&ndc.x), "{ndc:?}");
                    assert!((-1.0 - 1e-4..=1.0 + 1e-4).contains(&ndc.y), "{ndc:?}");
                    assert!((0.0..=1.0).contains(&ndc.z), "{ndc:?}");

                    let back = inverse.project_point3(ndc);
                    let tolerance = 1e-4 * bbox.size().max_element().max(1.0);
                    assert!((back - corner).abs().max_element() < tolerance);
                }
            }
        }
    }

    #[test]
    fn test_degenerate_boxes_give_invertible_matrices() {
        let point = Aabb::from_min_max(Vec3::splat(2.0), Vec3::splat(2.0));
        let plane = Aabb::from_min_max(Vec3::ZERO, Vec3::new(4.0, 4.0, 0.0));
        for bbox in [point, plane, Aabb::INVALID] {
            let projections = ProjectionBuilder::build(&bbox, None, 16).unwrap();
            assert!(projections.region().size > 0.0);
            for (_, m) in projections.iter() {
                assert!(m.is_finite());
                assert!(m.inverse().is_some());
            }
        }
    }

    #[test]
    fn test_voxel_centers_hit_pixel_centers() {
        let projections = ProjectionBuilder::build(&scenario_box(), None, 8).unwrap();
        let center = projections.region().voxel_center([4, 4, 4]);
        for axis in Axis::ALL {
            let (px, py) = world_to_pixel(&projections, axis, center);
            assert_relative_eq!(px.fract(), 0.5, epsilon = 1e-4);
            assert_relative_eq!(py.fract(), 0.5, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_needs_rebuild_thresholds() {
        let bbox = scenario_box();
        let projections = ProjectionBuilder::build(&bbox, None, 8).unwrap();
        assert!(!projections.needs_rebuild(&bbox));

        let nudged = Aabb::from_min_max(Vec3::splat(1e-5), Vec3::splat(10.0));
        assert!(!projections.needs_rebuild(&nudged));

        let moved = Aabb::from_min_max(Vec3::ZERO, Vec3::new(10.0, 10.5, 10.0));
        assert!(projections.needs_rebuild(&moved));
        assert!(projections.needs_rebuild(&Aabb::INVALID));

        let empty = ProjectionBuilder::build(&Aabb::INVALID, None, 8).unwrap();
        assert!(!empty.needs_rebuild(&Aabb::INVALID));
    }

    #[test]
    fn test_matches_settings() {
        let projections = ProjectionBuilder::build(&scenario_box(), Some(20.0), 8).unwrap();
        assert!(projections.matches(Some(20.0), 8));
        assert!(!projections.matches(None, 8));
        assert!(!projections.matches(Some(20.0), 16));
        assert_relative_eq!(projections.region().size, 20.0);
    }
}
