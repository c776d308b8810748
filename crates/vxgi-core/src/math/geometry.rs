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

//! Provides geometric primitive shapes for spatial calculations.

use super::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Represents an Axis-Aligned Bounding Box (AABB).
///
/// An AABB is a rectangular prism aligned with the coordinate axes, defined by its
/// minimum and maximum corner points. Scene extents are exchanged as `Aabb`s and
/// drive the voxel projection matrices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct Aabb {
    /// The corner of the box with the smallest coordinates on all axes.
    pub min: Vec3,
    /// The corner of the box with the largest coordinates on all axes.
    pub max: Vec3,
}

impl Aabb {
    /// An invalid `Aabb` where `min` components are positive infinity and `max` are negative infinity.
    ///
    /// This is the neutral element for [`Aabb::merge`] and represents an empty scene.
    pub const INVALID: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Creates a new `Aabb` from two corner points, in any order.
    #[inline]
    pub fn from_min_max(min_pt: Vec3, max_pt: Vec3) -> Self {
        Self {
            min: min_pt.min(max_pt),
            max: min_pt.max(max_pt),
        }
    }

    /// Creates an `Aabb` that tightly encloses a given set of points.
    ///
    /// Returns `None` if the input slice is empty.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        Some(
            rest.iter()
                .fold(Self::from_min_max(*first, *first), |acc, p| acc.grow(*p)),
        )
    }

    /// Returns `true` if `min <= max` on every axis and all components are finite.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.min.x <= self.max.x
            && self.min.y <= self.max.y
            && self.min.z <= self.max.z
    }

    /// The center point of the box.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// The full size of the box along each axis.
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Returns a box enlarged to contain `point`.
    #[inline]
    pub fn grow(&self, point: Vec3) -> Self {
        Self {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    /// Returns the smallest box containing both `self` and `other`.
    #[inline]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Returns `true` if the point lies inside or on the boundary of the box.
    #[inline]
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// The eight corners of the box.
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Computes the box enclosing this box after an affine transform.
    ///
    /// An invalid box stays invalid.
    pub fn transform(&self, matrix: &Mat4) -> Self {
        if !self.is_valid() {
            return Self::INVALID;
        }
        self.corners()
            .iter()
            .fold(Self::INVALID, |acc, c| acc.grow(matrix.transform_point3(*c)))
    }
}

impl Default for Aabb {
    /// Returns [`Aabb::INVALID`], the empty box.
    fn default() -> Self {
        Self::INVALID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_min_max_orders_corners() {
        let b = Aabb::from_min_max(Vec3::new(5.0, -1.0, 2.0), Vec3::new(1.0, 3.0, -2.0));
        assert_eq!(b.min, Vec3::new(1.0, -1.0, -2.0));
        assert_eq!(b.max, Vec3::new(5.0, 3.0, 2.0));
        assert_eq!(b.center(), Vec3::new(3.0, 1.0, 0.0));
        assert_eq!(b.size(), Vec3::new(4.0, 4.0, 4.0));
    }

    #[test]
    fn test_invalid_is_merge_identity() {
        assert!(!Aabb::INVALID.is_valid());
        let b = Aabb::from_min_max(Vec3::ZERO, Vec3::ONE);
        assert_eq!(Aabb::INVALID.merge(&b), b);
        assert_eq!(Aabb::default(), Aabb::INVALID);
    }

    #[test]
    fn test_from_points() {
        assert!(Aabb::from_points(&[]).is_none());
        let b = Aabb::from_points(&[Vec3::new(1.0, 2.0, 3.0), Vec3::new(-1.0, 0.0, 9.0)]).unwrap();
        assert_eq!(b.min, Vec3::new(-1.0, 0.0, 3.0));
        assert_eq!(b.max, Vec3::new(1.0, 2.0, 9.0));
        assert!(b.contains_point(Vec3::new(0.0, 1.0, 5.0)));
        assert!(!b.contains_point(Vec3::new(0.0, 3.0, 5.0)));
    }

    #[test]
    fn test_transform_translates_box() {
        let b = Aabb::from_min_max(Vec3::ZERO, Vec3::ONE);
        let moved = b.transform(&Mat4::from_translation(Vec3::new(2.0, 0.0, -1.0)));
        assert_eq!(moved.min, Vec3::new(2.0, 0.0, -1.0));
        assert_eq!(moved.max, Vec3::new(3.0, 1.0, 0.0));
        assert!(!Aabb::INVALID.transform(&Mat4::IDENTITY).is_valid());
    }
}
