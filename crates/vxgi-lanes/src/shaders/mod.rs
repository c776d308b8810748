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

//! Built-in WGSL programs of the voxelization pipeline.
//!
//! - [`VOXELIZE_WGSL`]: per-axis conservative rasterization with atomic
//!   accumulation.
//! - [`RESOLVE_WGSL`]: averages the accumulator into the RGBA8 volume.
//! - [`VOXEL_DRAWER_WGSL`]: instanced cube debug view.
//!
//! The uniform structs below match the WGSL layouts byte for byte.

use bytemuck::{Pod, Zeroable};

/// Voxelization shader (vertex pulling, dilation, atomic accumulation).
pub const VOXELIZE_WGSL: &str = include_str!("voxelize.wgsl");

/// Resolve compute shader. Workgroups are `RESOLVE_WORKGROUP_SIZE³`.
pub const RESOLVE_WGSL: &str = include_str!("resolve.wgsl");

/// Voxel drawer shader.
pub const VOXEL_DRAWER_WGSL: &str = include_str!("voxel_drawer.wgsl");

/// Edge length of a resolve workgroup.
pub const RESOLVE_WORKGROUP_SIZE: u32 = 4;

/// Bits per packed coordinate component in the instance list.
pub const INSTANCE_COORD_BITS: u32 = 10;

/// `VoxelizeUniforms` in `voxelize.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct VoxelizeUniforms {
    /// Axis view-projection.
    pub view_proj: [[f32; 4]; 4],
    /// Node model matrix.
    pub model: [[f32; 4]; 4],
    /// Quantized albedo.
    pub albedo: [u32; 4],
    /// Region min corner and voxel size.
    pub region: [f32; 4],
    /// Voxels per axis.
    pub dimension: u32,
    /// Padding to a 16-byte multiple.
    pub _pad: [u32; 3],
}

/// `ResolveParams` in `resolve.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ResolveParams {
    /// Voxels per axis.
    pub dimension: u32,
    /// Padding to a 16-byte multiple.
    pub _pad: [u32; 3],
}

/// `DrawerUniforms` in `voxel_drawer.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DrawerUniforms {
    /// Camera view-projection.
    pub view_proj: [[f32; 4]; 4],
    /// Region min corner and voxel size.
    pub region: [f32; 4],
}

/// `DrawArgs` in `resolve.wgsl`, a `DrawIndexedIndirect` command.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndexedIndirectArgs {
    /// Indices per instance.
    pub index_count: u32,
    /// Instances; incremented by the resolve pass.
    pub instance_count: u32,
    /// First index.
    pub first_index: u32,
    /// Added to every index.
    pub base_vertex: i32,
    /// First instance.
    pub first_instance: u32,
}

/// Unpacks an instance written by the resolve pass.
pub fn unpack_instance(packed: [u32; 2]) -> ([u32; 3], [u8; 4]) {
    let mask = (1 << INSTANCE_COORD_BITS) - 1;
    let coord = [
        packed[0] & mask,
        (packed[0] >> INSTANCE_COORD_BITS) & mask,
        (packed[0] >> (2 * INSTANCE_COORD_BITS)) & mask,
    ];
    (coord, packed[1].to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vxgi_core::voxel::MAX_VOLUME_DIMENSION;

    #[test]
    fn test_uniform_sizes_match_wgsl() {
        assert_eq!(std::mem::size_of::<VoxelizeUniforms>(), 176);
        assert_eq!(std::mem::size_of::<ResolveParams>(), 16);
        assert_eq!(std::mem::size_of::<DrawerUniforms>(), 80);
        assert_eq!(std::mem::size_of::<DrawIndexedIndirectArgs>(), 20);
    }

    #[test]
    fn test_instance_packing_covers_max_dimension() {
        assert!(MAX_VOLUME_DIMENSION <= 1 << INSTANCE_COORD_BITS);
        let packed = [3 | (511 << 10) | (7 << 20), u32::from_le_bytes([1, 2, 3, 4])];
        assert_eq!(unpack_instance(packed), ([3, 511, 7], [1, 2, 3, 4]));
    }

    #[test]
    fn test_shaders_declare_entry_points() {
        assert!(VOXELIZE_WGSL.contains("fn vs_main"));
        assert!(VOXELIZE_WGSL.contains("fn fs_main"));
        assert!(RESOLVE_WGSL.contains("fn cs_main"));
        assert!(VOXEL_DRAWER_WGSL.contains("fn vs_main"));
    }
}
