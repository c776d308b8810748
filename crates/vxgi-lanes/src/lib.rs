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

//! # VXGI Lanes
//!
//! The hot-path strategies of the voxelization subsystem:
//!
//! - [`projection`]: the three axis-aligned orthographic view-projections.
//! - [`voxelize_lane`]: the reset, accumulate and resolve cycle.
//! - [`voxel_drawer_lane`]: debug visualization of the resolved volume.
//! - [`software`]: a CPU implementation of
//!   [`VoxelBackend`](vxgi_core::VoxelBackend) used as the reference for the
//!   GPU path and by tests.
//! - [`shaders`]: the WGSL programs executed by GPU backends.

#![warn(missing_docs)]

pub mod projection;
pub mod shaders;
pub mod software;
pub mod voxel_drawer_lane;
pub mod voxelize_lane;

pub use projection::{AxisProjections, ProjectionBuilder};
pub use software::SoftwareVoxelBackend;
pub use voxel_drawer_lane::VoxelDrawerLane;
pub use voxelize_lane::{VoxelizationCycle, VoxelizeLane};
