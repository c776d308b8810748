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

//! The voxelization lane: one full reset, accumulate and resolve cycle.
//!
//! Every node is drawn once per axis with that axis' orthographic
//! projection. Fragments add their quantized albedo into the voxel they land
//! in; the resolve step divides each sum by its count. Integer sums make the
//! result independent of draw order.

mod cycle;

pub use cycle::{Accumulating, Pending, Resolved, VoxelizationCycle};

use crate::projection::AxisProjections;
use log::{debug, warn};
use vxgi_core::lane::Lane;
use vxgi_core::scene::SceneProvider;
use vxgi_core::voxel::{Axis, VoxelError};
use vxgi_core::VoxelBackend;

/// Summary of one voxelization cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Node draws issued, summed over the three axes.
    pub draws: u32,
    /// Nodes skipped because their mesh or material was missing.
    pub skipped_nodes: u32,
    /// Non-empty voxels visible after the cycle.
    pub voxel_count: u32,
}

/// Fills the voxel volume from the scene.
#[derive(Debug, Default)]
pub struct VoxelizeLane;

impl VoxelizeLane {
    /// Creates a new `VoxelizeLane`.
    pub fn new() -> Self {
        Self
    }

    /// Runs one complete cycle on `backend`.
    pub fn execute(
        &self,
        backend: &mut dyn VoxelBackend,
        projections: &AxisProjections,
        scene: &dyn SceneProvider,
    ) -> Result<CycleReport, VoxelError> {
        let mut report = CycleReport::default();
        let mut cycle = VoxelizationCycle::new(backend, projections).reset()?;

        for axis in Axis::ALL {
            cycle.begin_axis(axis);
            for node in scene.nodes() {
                match cycle.draw_node(scene, node) {
                    Ok(()) => report.draws += 1,
                    Err(VoxelError::MissingResource(what)) => {
                        // Warn once per node, not once per axis.
                        if axis == Axis::X {
                            warn!("Skipping node during voxelization: missing {what}");
                            report.skipped_nodes += 1;
                        }
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let resolved = cycle.resolve()?;
        report.voxel_count = resolved.voxel_count();
        debug!(
            "Voxelization cycle: {} draws, {} skipped nodes, {} voxels",
            report.draws, report.skipped_nodes, report.voxel_count
        );
        Ok(report)
    }
}

impl Lane for VoxelizeLane {
    fn strategy_name(&self) -> &'static str {
        "AtomicAverageVoxelize"
    }
}
