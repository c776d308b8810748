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

use crate::math::{LinearRgba, Mat4};
use crate::scene::{MeshData, MeshId};
use crate::voxel::{Axis, Barrier, DrawStats, SyncLog, VoxelError, VoxelRegion};

/// Command surface of a voxelization backend.
///
/// A backend owns the voxel volume, the accumulation buffer, and the
/// programs that write and read them. Calls arrive in the order
///
/// ```text
/// reset_atomic_buffer, barrier(ResetToAccumulate),
/// { set_matrices, set_material, draw }*,
/// barrier(AccumulateToResolve), resolve, barrier(ResolveToRead),
/// draw_voxels*
/// ```
///
/// and a backend is free to reject anything else with
/// [`VoxelError::OrderingViolation`]. A reset is accepted at any point and
/// abandons a partial cycle.
pub trait VoxelBackend: Send {
    /// Human-readable backend name.
    fn backend_name(&self) -> &'static str;

    /// (Re)creates the `dimension³` RGBA8 volume, cleared to transparent black.
    fn generate_volumes(&mut self, dimension: u32) -> Result<(), VoxelError>;

    /// (Re)creates the `dimension³` accumulation buffer.
    fn generate_atomic_buffer(&mut self, dimension: u32) -> Result<(), VoxelError>;

    /// Destroys the volume and the accumulation buffer.
    fn release(&mut self);

    /// Dimension of the currently allocated volume, if any.
    fn allocated_dimension(&self) -> Option<u32>;

    /// Zeroes every accumulator slot.
    fn reset_atomic_buffer(&mut self) -> Result<(), VoxelError>;

    /// Orders the steps on either side of `barrier`.
    fn barrier(&mut self, barrier: Barrier) -> Result<(), VoxelError>;

    /// Sets the world-space cube fragments are mapped into.
    fn set_region(&mut self, region: &VoxelRegion) -> Result<(), VoxelError>;

    /// Sets the projection axis, its view-projection and the model matrix
    /// for subsequent draws.
    fn set_matrices(&mut self, axis: Axis, view_proj: &Mat4, model: &Mat4)
        -> Result<(), VoxelError>;

    /// Sets the albedo accumulated by subsequent draws.
    fn set_material(&mut self, albedo: LinearRgba) -> Result<(), VoxelError>;

    /// Rasterizes `mesh` and accumulates its fragments.
    ///
    /// `id` lets a backend cache uploaded geometry between cycles.
    fn draw(&mut self, id: MeshId, mesh: &MeshData) -> Result<(), VoxelError>;

    /// Averages the accumulator into the volume and counts non-empty voxels.
    fn resolve(&mut self) -> Result<(), VoxelError>;

    /// Draws one cube per non-empty voxel of the last resolved volume.
    fn draw_voxels(&mut self, view_proj: &Mat4) -> Result<DrawStats, VoxelError>;

    /// Drops a cycle that failed part way. The last resolved volume stays
    /// readable by [`VoxelBackend::draw_voxels`].
    fn abort_cycle(&mut self) {}

    /// Non-empty voxels after the most recent resolve visible to the host.
    fn voxel_count(&self) -> u32;

    /// Steps recorded since the last reset, for backends that validate order.
    fn sync_log(&self) -> Option<&SyncLog> {
        None
    }
}

impl<B: VoxelBackend + ?Sized> VoxelBackend for Box<B> {
    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }

    fn generate_volumes(&mut self, dimension: u32) -> Result<(), VoxelError> {
        (**self).generate_volumes(dimension)
    }

    fn generate_atomic_buffer(&mut self, dimension: u32) -> Result<(), VoxelError> {
        (**self).generate_atomic_buffer(dimension)
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn allocated_dimension(&self) -> Option<u32> {
        (**self).allocated_dimension()
    }

    fn reset_atomic_buffer(&mut self) -> Result<(), VoxelError> {
        (**self).reset_atomic_buffer()
    }

    fn barrier(&mut self, barrier: Barrier) -> Result<(), VoxelError> {
        (**self).barrier(barrier)
    }

    fn set_region(&mut self, region: &VoxelRegion) -> Result<(), VoxelError> {
        (**self).set_region(region)
    }

    fn set_matrices(
        &mut self,
        axis: Axis,
        view_proj: &Mat4,
        model: &Mat4,
    ) -> Result<(), VoxelError> {
        (**self).set_matrices(axis, view_proj, model)
    }

    fn set_material(&mut self, albedo: LinearRgba) -> Result<(), VoxelError> {
        (**self).set_material(albedo)
    }

    fn draw(&mut self, id: MeshId, mesh: &MeshData) -> Result<(), VoxelError> {
        (**self).draw(id, mesh)
    }

    fn resolve(&mut self) -> Result<(), VoxelError> {
        (**self).resolve()
    }

    fn draw_voxels(&mut self, view_proj: &Mat4) -> Result<DrawStats, VoxelError> {
        (**self).draw_voxels(view_proj)
    }

    fn abort_cycle(&mut self) {
        (**self).abort_cycle()
    }

    fn voxel_count(&self) -> u32 {
        (**self).voxel_count()
    }

    fn sync_log(&self) -> Option<&SyncLog> {
        (**self).sync_log()
    }
}
