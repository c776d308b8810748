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

//! Flattened addressing of the voxel grid and its backing allocations.

use super::ACCUMULATOR_WORDS;

/// Largest accepted `volume_dimension`.
///
/// 512³ slots of five words is 2.5 GiB of accumulator memory, already past
/// what most adapters allow in a single binding.
pub const MAX_VOLUME_DIMENSION: u32 = 512;

/// Describes the shape of a cubic voxel volume and its accumulator buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeLayout {
    dimension: u32,
}

impl VolumeLayout {
    /// Creates a layout for a `dimension³` grid.
    ///
    /// Returns `None` for a zero dimension.
    pub fn new(dimension: u32) -> Option<Self> {
        (dimension > 0).then_some(Self { dimension })
    }

    /// Voxels per axis.
    #[inline]
    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    /// Total number of voxels (`dimension³`).
    #[inline]
    pub fn voxel_capacity(&self) -> u64 {
        let d = self.dimension as u64;
        d * d * d
    }

    /// Flattens a voxel coordinate to `x + y·d + z·d²`.
    ///
    /// Returns `None` when the coordinate is outside the grid.
    #[inline]
    pub fn flatten(&self, coord: [u32; 3]) -> Option<usize> {
        let d = self.dimension;
        if coord.iter().any(|&c| c >= d) {
            return None;
        }
        let d = d as usize;
        Some(coord[0] as usize + coord[1] as usize * d + coord[2] as usize * d * d)
    }

    /// Inverse of [`VolumeLayout::flatten`].
    #[inline]
    pub fn unflatten(&self, index: usize) -> [u32; 3] {
        let d = self.dimension as usize;
        [
            (index % d) as u32,
            ((index / d) % d) as u32,
            (index / (d * d)) as u32,
        ]
    }

    /// Size in bytes of the RGBA8 volume texture.
    #[inline]
    pub fn volume_bytes(&self) -> u64 {
        self.voxel_capacity() * 4
    }

    /// Size in bytes of the accumulator buffer.
    #[inline]
    pub fn accumulator_bytes(&self) -> u64 {
        self.voxel_capacity() * ACCUMULATOR_WORDS as u64 * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_dimension_is_rejected() {
        assert!(VolumeLayout::new(0).is_none());
    }

    #[test]
    fn test_flatten_unflatten_corners() {
        let layout = VolumeLayout::new(8).unwrap();
        assert_eq!(layout.flatten([0, 0, 0]), Some(0));
        assert_eq!(layout.flatten([7, 7, 7]), Some(511));
        assert_eq!(layout.flatten([1, 2, 3]), Some(1 + 2 * 8 + 3 * 64));
        assert_eq!(layout.unflatten(1 + 2 * 8 + 3 * 64), [1, 2, 3]);
        assert_eq!(layout.flatten([8, 0, 0]), None);
    }

    #[test]
    fn test_allocation_sizes() {
        let layout = VolumeLayout::new(4).unwrap();
        assert_eq!(layout.voxel_capacity(), 64);
        assert_eq!(layout.volume_bytes(), 256);
        assert_eq!(layout.accumulator_bytes(), 64 * 5 * 4);
    }
}
