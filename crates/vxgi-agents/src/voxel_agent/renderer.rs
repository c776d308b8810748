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

//! Defines the VoxelRenderer, the orchestrator of the voxelization subsystem.

use super::{SchedulerDecision, UpdateScheduler, VolumeManager};
use log::{debug, error, info, trace};
use std::time::Instant;
use vxgi_core::lane::Lane;
use vxgi_core::math::Mat4;
use vxgi_core::scene::{Material, SceneNode, SceneProvider};
use vxgi_core::voxel::{Axis, VoxelConfig, VoxelError, VoxelStats};
use vxgi_core::{Renderer, VoxelBackend};
use vxgi_lanes::{AxisProjections, ProjectionBuilder, VoxelDrawerLane, VoxelizeLane};

/// Renders a scene into a voxel volume and, optionally, draws the volume.
///
/// Each call to [`Renderer::render`] is one frame:
///
/// 1. The scheduler decides whether this frame re-voxelizes.
/// 2. If it does, the axis projections are rebuilt when the scene box or the
///    grid settings changed, and a full reset, accumulate and resolve cycle
///    runs.
/// 3. If `show_voxels` is set, the drawer renders the last resolved volume.
///
/// An allocation failure disables the renderer; every later `render` returns
/// [`VoxelError::NotAllocated`] until [`VoxelRenderer::reconfigure`]
/// succeeds. Any other failure aborts the cycle and is returned; the
/// following frames draw the last resolved volume.
pub struct VoxelRenderer<B: VoxelBackend> {
    backend: B,
    config: VoxelConfig,
    scheduler: UpdateScheduler,
    volumes: VolumeManager,
    projections: Option<AxisProjections>,
    voxelize_lane: VoxelizeLane,
    drawer_lane: VoxelDrawerLane,
    camera: Option<Mat4>,
    active_axis: Axis,
    stats: VoxelStats,
    disabled_reported: bool,
}

impl<B: VoxelBackend> VoxelRenderer<B> {
    /// Validates `config` and allocates the voxel resources on `backend`.
    pub fn new(mut backend: B, config: VoxelConfig) -> Result<Self, VoxelError> {
        config.validate()?;
        let scheduler = UpdateScheduler::new(config.framestep)?;
        let mut volumes = VolumeManager::new();
        volumes.ensure(&mut backend, config.volume_dimension)?;

        info!(
            "VoxelRenderer: {} backend, {}^3 volume, framestep {}",
            backend.backend_name(),
            config.volume_dimension,
            config.framestep
        );

        Ok(Self {
            backend,
            config,
            scheduler,
            volumes,
            projections: None,
            voxelize_lane: VoxelizeLane::new(),
            drawer_lane: VoxelDrawerLane::new(),
            camera: None,
            active_axis: Axis::X,
            stats: VoxelStats::default(),
            disabled_reported: false,
        })
    }

    /// Applies a new configuration.
    ///
    /// An invalid configuration is rejected and the current one kept. The
    /// resources are recreated when the dimension changes or a previous
    /// allocation failed; a failure here disables the renderer.
    pub fn reconfigure(&mut self, config: VoxelConfig) -> Result<(), VoxelError> {
        config.validate()?;

        self.volumes
            .ensure(&mut self.backend, config.volume_dimension)?;
        self.scheduler.set_update_frequency(config.framestep)?;

        let grid_changed = self.config.volume_grid_size != config.volume_grid_size
            || self.config.volume_dimension != config.volume_dimension;
        if grid_changed {
            self.projections = None;
        }

        info!(
            "VoxelRenderer reconfigured: {}^3 volume, grid size {:?}, framestep {}, show_voxels {}",
            config.volume_dimension, config.volume_grid_size, config.framestep, config.show_voxels
        );
        self.config = config;
        self.disabled_reported = false;
        Ok(())
    }

    /// Sets the voxelization interval in frames. Zero is rejected.
    pub fn set_update_frequency(&mut self, framestep: u32) -> Result<(), VoxelError> {
        self.scheduler.set_update_frequency(framestep)?;
        self.config.framestep = framestep;
        Ok(())
    }

    /// Enables or disables the debug drawer.
    pub fn set_show_voxels(&mut self, show: bool) {
        self.config.show_voxels = show;
    }

    /// Sets the camera used by the debug drawer. `None` uses an overview of
    /// the voxel region.
    pub fn set_camera(&mut self, view_proj: Option<Mat4>) {
        self.camera = view_proj;
    }

    /// Selects the axis used by [`Renderer::set_matrices_uniforms`].
    pub fn set_active_axis(&mut self, axis: Axis) {
        self.active_axis = axis;
    }

    /// Non-empty voxels after the last resolve visible to the host.
    pub fn voxel_count(&self) -> u32 {
        self.backend.voxel_count()
    }

    /// Running counters.
    pub fn stats(&self) -> &VoxelStats {
        &self.stats
    }

    /// The active configuration.
    pub fn config(&self) -> &VoxelConfig {
        &self.config
    }

    /// The current axis projections, once a cycle has run.
    pub fn projections(&self) -> Option<&AxisProjections> {
        self.projections.as_ref()
    }

    /// Returns `true` unless a failed allocation disabled the renderer.
    pub fn is_enabled(&self) -> bool {
        self.volumes.is_ready()
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The backend, mutably.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn refresh_projections(&mut self, scene: &dyn SceneProvider) -> Result<(), VoxelError> {
        let bbox = scene.bounding_box();
        let grid_size = self.config.volume_grid_size;
        let dimension = self.config.volume_dimension;

        let stale = match &self.projections {
            Some(p) => !p.matches(grid_size, dimension) || p.needs_rebuild(&bbox),
            None => true,
        };
        if stale {
            let projections = ProjectionBuilder::build(&bbox, grid_size, dimension)?;
            debug!(
                "Rebuilt voxel projections: region min {:?}, side {}",
                projections.region().min,
                projections.region().size
            );
            self.projections = Some(projections);
        }
        Ok(())
    }

    fn voxelize(&mut self, scene: &dyn SceneProvider, frame: u64) -> Result<(), VoxelError> {
        let start = Instant::now();
        self.refresh_projections(scene)?;
        let projections = self.projections.as_ref().ok_or(VoxelError::NotAllocated)?;

        let report = self
            .voxelize_lane
            .execute(&mut self.backend, projections, scene)?;

        self.stats.cycles_run += 1;
        self.stats.last_cycle_frame = Some(frame);
        self.stats.last_cycle_duration = Some(start.elapsed());
        trace!(
            "Frame {frame}: {} lane ran {} draws",
            self.voxelize_lane.strategy_name(),
            report.draws
        );
        Ok(())
    }

    fn draw(&mut self) -> Result<(), VoxelError> {
        let view_proj = match (self.camera, &self.projections) {
            (Some(camera), _) => camera,
            (None, Some(projections)) => {
                let target = self.config.drawer_target;
                VoxelDrawerLane::overview_camera(
                    projections.region(),
                    target.width as f32 / target.height as f32,
                )
            }
            (None, None) => Mat4::IDENTITY,
        };
        let stats = self.drawer_lane.execute(&mut self.backend, &view_proj)?;
        trace!(
            "{} lane drew {} instances",
            self.drawer_lane.strategy_name(),
            stats.instances
        );
        self.stats.drawn_instances = stats.instances;
        Ok(())
    }
}

impl<B: VoxelBackend> Renderer for VoxelRenderer<B> {
    fn name(&self) -> &'static str {
        "VoxelRenderer"
    }

    fn render(&mut self, scene: &dyn SceneProvider) -> Result<(), VoxelError> {
        if !self.volumes.is_ready() {
            if !self.disabled_reported {
                error!("VoxelRenderer is disabled until it is reconfigured");
                self.disabled_reported = true;
            }
            return Err(VoxelError::NotAllocated);
        }

        let frame = self.scheduler.frame_counter();
        if self.scheduler.tick() == SchedulerDecision::Voxelize {
            let result = self.voxelize(scene, frame);
            self.scheduler.finish_cycle();
            if let Err(e) = result {
                // The last resolved volume stays drawable.
                self.backend.abort_cycle();
                return Err(e);
            }
        }

        if self.config.show_voxels {
            self.draw()?;
        }

        self.stats.voxel_count = self.backend.voxel_count();
        self.stats.frames_rendered += 1;
        Ok(())
    }

    fn set_matrices_uniforms(&mut self, node: &SceneNode) -> Result<(), VoxelError> {
        let projections = self.projections.as_ref().ok_or(VoxelError::NotAllocated)?;
        let axis = self.active_axis;
        self.backend
            .set_matrices(axis, projections.get(axis), &node.transform)
    }

    fn set_material_uniforms(&mut self, material: &Material) -> Result<(), VoxelError> {
        self.backend.set_material(material.albedo)
    }
}

impl<B: VoxelBackend> Drop for VoxelRenderer<B> {
    fn drop(&mut self) {
        self.volumes.release(&mut self.backend);
    }
}
