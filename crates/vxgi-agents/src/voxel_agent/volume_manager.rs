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

use log::{error, info};
use vxgi_core::voxel::VoxelError;
use vxgi_core::VoxelBackend;

/// Allocation state of the voxel resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VolumeState {
    /// Nothing allocated yet.
    #[default]
    Unallocated,
    /// Volume and accumulator exist at [`VolumeManager::dimension`].
    Ready,
    /// The last allocation failed; nothing is allocated.
    Disabled,
}

/// Owns the lifetime of the volume and the accumulation buffer on a backend.
#[derive(Debug, Default)]
pub struct VolumeManager {
    dimension: Option<u32>,
    state: VolumeState,
}

impl VolumeManager {
    /// Creates a manager with nothing allocated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dimension of the allocated resources.
    pub fn dimension(&self) -> Option<u32> {
        self.dimension
    }

    /// Current state.
    pub fn state(&self) -> VolumeState {
        self.state
    }

    /// Returns `true` if both resources are allocated.
    pub fn is_ready(&self) -> bool {
        self.state == VolumeState::Ready
    }

    /// Makes sure `backend` holds resources of `dimension³`, destroying and
    /// recreating them on a change.
    ///
    /// A failure releases whatever was allocated and leaves the manager
    /// [`VolumeState::Disabled`].
    pub fn ensure(
        &mut self,
        backend: &mut dyn VoxelBackend,
        dimension: u32,
    ) -> Result<(), VoxelError> {
        if self.is_ready()
            && self.dimension == Some(dimension)
            && backend.allocated_dimension() == Some(dimension)
        {
            return Ok(());
        }

        backend.release();
        self.dimension = None;

        let allocated = backend
            .generate_volumes(dimension)
            .and_then(|()| backend.generate_atomic_buffer(dimension));

        match allocated {
            Ok(()) => {
                info!(
                    "{} backend: voxel resources ready at {dimension}^3",
                    backend.backend_name()
                );
                self.dimension = Some(dimension);
                self.state = VolumeState::Ready;
                Ok(())
            }
            Err(e) => {
                error!(
                    "{} backend: voxel allocation at {dimension}^3 failed: {e}",
                    backend.backend_name()
                );
                backend.release();
                self.state = VolumeState::Disabled;
                Err(e)
            }
        }
    }

    /// Destroys the resources.
    pub fn release(&mut self, backend: &mut dyn VoxelBackend) {
        backend.release();
        self.dimension = None;
        self.state = VolumeState::Unallocated;
    }
}
