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

use std::time::Duration;

/// Running counters exposed by the voxel renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VoxelStats {
    /// Non-empty voxels after the last completed resolve.
    pub voxel_count: u32,
    /// Voxelization cycles run since construction.
    pub cycles_run: u64,
    /// Calls to `render` that did any work.
    pub frames_rendered: u64,
    /// Frame index of the most recent cycle.
    pub last_cycle_frame: Option<u64>,
    /// CPU time spent recording or executing the most recent cycle.
    pub last_cycle_duration: Option<Duration>,
    /// Instances drawn by the most recent drawer pass.
    pub drawn_instances: u32,
}

/// Result of one drawer pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    /// Cube instances issued, one per non-empty voxel.
    ///
    /// Backends that draw indirectly report the host-visible voxel count,
    /// which can trail the instance count the GPU actually drew until the
    /// count readback of the last cycle completes.
    pub instances: u32,
}

/// A single non-empty voxel as seen by the drawer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoxelInstance {
    /// Grid coordinate.
    pub coord: [u32; 3],
    /// Resolved RGBA8 value.
    pub color: [u8; 4],
}
