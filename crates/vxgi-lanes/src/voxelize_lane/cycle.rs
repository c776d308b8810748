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

//! Typestate wrapper over a [`VoxelBackend`] that fixes the order of a
//! voxelization cycle at compile time.
//!
//! The only way to obtain a [`VoxelizationCycle<Accumulating>`] is through
//! [`VoxelizationCycle::reset`], so no draw can reach the accumulator before
//! it has been cleared in the same cycle.

use crate::projection::AxisProjections;
use std::marker::PhantomData;
use vxgi_core::scene::{Material, SceneNode, SceneProvider};
use vxgi_core::voxel::{Axis, Barrier, VoxelError};
use vxgi_core::VoxelBackend;

/// The cycle has not touched the accumulator yet.
#[derive(Debug)]
pub struct Pending;

/// The accumulator is cleared and draws may accumulate.
#[derive(Debug)]
pub struct Accumulating;

/// The volume has been resolved and is readable.
#[derive(Debug)]
pub struct Resolved;

/// One voxelization cycle in progress.
pub struct VoxelizationCycle<'a, S> {
    backend: &'a mut dyn VoxelBackend,
    projections: &'a AxisProjections,
    axis: Axis,
    _state: PhantomData<S>,
}

impl<'a, S> VoxelizationCycle<'a, S> {
    fn transition<T>(self) -> VoxelizationCycle<'a, T> {
        VoxelizationCycle {
            backend: self.backend,
            projections: self.projections,
            axis: self.axis,
            _state: PhantomData,
        }
    }
}

impl<'a> VoxelizationCycle<'a, Pending> {
    /// Starts a cycle over `backend` using `projections`.
    pub fn new(backend: &'a mut dyn VoxelBackend, projections: &'a AxisProjections) -> Self {
        Self {
            backend,
            projections,
            axis: Axis::X,
            _state: PhantomData,
        }
    }

    /// Clears the accumulator and makes the cleared state visible to draws.
    pub fn reset(self) -> Result<VoxelizationCycle<'a, Accumulating>, VoxelError> {
        self.backend.reset_atomic_buffer()?;
        self.backend.barrier(Barrier::ResetToAccumulate)?;
        self.backend.set_region(self.projections.region())?;
        Ok(self.transition())
    }
}

impl<'a> VoxelizationCycle<'a, Accumulating> {
    /// Selects the axis subsequent node draws are projected along.
    pub fn begin_axis(&mut self, axis: Axis) {
        self.axis = axis;
    }

    /// The axis currently being rasterized.
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Uploads the current axis' view-projection together with `node`'s
    /// model matrix.
    pub fn set_matrices_uniforms(&mut self, node: &SceneNode) -> Result<(), VoxelError> {
        self.backend
            .set_matrices(self.axis, self.projections.get(self.axis), &node.transform)
    }

    /// Uploads `material`'s albedo.
    pub fn set_material_uniforms(&mut self, material: &Material) -> Result<(), VoxelError> {
        self.backend.set_material(material.albedo)
    }

    /// Draws one node of `scene` on the current axis.
    ///
    /// Returns [`VoxelError::MissingResource`] without drawing when the node's
    /// mesh or material is unknown.
    pub fn draw_node(
        &mut self,
        scene: &dyn SceneProvider,
        node: &SceneNode,
    ) -> Result<(), VoxelError> {
        let mesh = scene
            .mesh(node.mesh)
            .ok_or_else(|| VoxelError::MissingResource(format!("mesh {:?}", node.mesh)))?;
        let material = scene.material(node.material).ok_or_else(|| {
            VoxelError::MissingResource(format!("material {:?}", node.material))
        })?;

        self.set_matrices_uniforms(node)?;
        self.set_material_uniforms(material)?;
        self.backend.draw(node.mesh, mesh)
    }

    /// Waits for accumulation, averages the accumulator into the volume, and
    /// publishes the volume to readers.
    pub fn resolve(self) -> Result<VoxelizationCycle<'a, Resolved>, VoxelError> {
        self.backend.barrier(Barrier::AccumulateToResolve)?;
        self.backend.resolve()?;
        self.backend.barrier(Barrier::ResolveToRead)?;
        Ok(self.transition())
    }
}

impl VoxelizationCycle<'_, Resolved> {
    /// Non-empty voxels as currently visible to the host.
    pub fn voxel_count(&self) -> u32 {
        self.backend.voxel_count()
    }
}
