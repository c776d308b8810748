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

//! CPU implementation of [`VoxelBackend`].
//!
//! Mirrors the GPU path step for step: the same region mapping, the same
//! accumulator encoding and the same conservative coverage rule. It validates
//! pass ordering with a [`SyncValidator`] and exposes the volume contents,
//! which makes it the reference the GPU backend and the tests compare to.

mod raster;

pub use raster::{rasterize_conservative, RasterTriangle, MIN_PROJECTED_AREA};

use log::{debug, info, trace};
use vxgi_core::math::{LinearRgba, Mat4, Vec2};
use vxgi_core::scene::{MeshData, MeshId};
use vxgi_core::voxel::{
    quantize, Accumulator, Axis, Barrier, DrawStats, SyncLog, SyncStep, SyncValidator,
    VolumeLayout, VoxelError, VoxelInstance, VoxelRegion, ACCUMULATOR_WORDS,
};
use vxgi_core::VoxelBackend;

/// Default cap on the memory the backend may allocate for one resource.
pub const DEFAULT_MEMORY_BUDGET: u64 = 1 << 30;

/// A CPU voxelization backend.
#[derive(Debug)]
pub struct SoftwareVoxelBackend {
    memory_budget: u64,
    volume_layout: Option<VolumeLayout>,
    volume: Vec<[u8; 4]>,
    accumulator_layout: Option<VolumeLayout>,
    accumulator: Vec<u32>,
    region: Option<VoxelRegion>,
    axis: Axis,
    view_proj: Mat4,
    model: Mat4,
    albedo: [u32; 4],
    validator: SyncValidator,
    voxel_count: u32,
    instances: Vec<VoxelInstance>,
    last_view_proj: Option<Mat4>,
    fragments: u64,
}

impl Default for SoftwareVoxelBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareVoxelBackend {
    /// Creates a backend with no resources allocated.
    pub fn new() -> Self {
        Self::with_memory_budget(DEFAULT_MEMORY_BUDGET)
    }

    /// Creates a backend that refuses any single allocation above `bytes`.
    pub fn with_memory_budget(bytes: u64) -> Self {
        Self {
            memory_budget: bytes,
            volume_layout: None,
            volume: Vec::new(),
            accumulator_layout: None,
            accumulator: Vec::new(),
            region: None,
            axis: Axis::X,
            view_proj: Mat4::IDENTITY,
            model: Mat4::IDENTITY,
            albedo: quantize(LinearRgba::WHITE),
            validator: SyncValidator::new(),
            voxel_count: 0,
            instances: Vec::new(),
            last_view_proj: None,
            fragments: 0,
        }
    }

    /// The resolved value of one voxel.
    pub fn voxel(&self, coord: [u32; 3]) -> Option<[u8; 4]> {
        let index = self.volume_layout?.flatten(coord)?;
        self.volume.get(index).copied()
    }

    /// The whole resolved volume, in flattened order.
    pub fn volume(&self) -> &[[u8; 4]] {
        &self.volume
    }

    /// The accumulator slot of one voxel.
    pub fn accumulator(&self, coord: [u32; 3]) -> Option<Accumulator> {
        let index = self.accumulator_layout?.flatten(coord)?;
        let start = index * ACCUMULATOR_WORDS;
        self.accumulator
            .get(start..start + ACCUMULATOR_WORDS)
            .map(Accumulator::from_words)
    }

    /// Non-empty voxels of the last resolve, in flattened order.
    pub fn instances(&self) -> &[VoxelInstance] {
        &self.instances
    }

    /// Camera used by the most recent drawer pass.
    pub fn last_view_proj(&self) -> Option<&Mat4> {
        self.last_view_proj.as_ref()
    }

    /// Fragments accumulated since the last reset.
    pub fn fragment_count(&self) -> u64 {
        self.fragments
    }

    fn check_budget(&self, resource: &'static str, bytes: u64) -> Result<(), VoxelError> {
        if bytes > self.memory_budget {
            return Err(VoxelError::Allocation {
                resource,
                details: format!(
                    "{bytes} bytes exceeds the memory budget of {} bytes",
                    self.memory_budget
                ),
            });
        }
        Ok(())
    }

    fn layout_for(dimension: u32) -> Result<VolumeLayout, VoxelError> {
        VolumeLayout::new(dimension)
            .ok_or_else(|| VoxelError::invalid_config("volume_dimension", "must be at least 1"))
    }

    fn allocate_zeroed<T: Clone + Default>(
        resource: &'static str,
        len: usize,
    ) -> Result<Vec<T>, VoxelError> {
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|e| VoxelError::Allocation {
                resource,
                details: e.to_string(),
            })?;
        data.resize(len, T::default());
        Ok(data)
    }

    fn resolved_layouts(&self) -> Result<(VolumeLayout, VolumeLayout), VoxelError> {
        match (self.volume_layout, self.accumulator_layout) {
            (Some(v), Some(a)) => Ok((v, a)),
            _ => Err(VoxelError::NotAllocated),
        }
    }
}

impl VoxelBackend for SoftwareVoxelBackend {
    fn backend_name(&self) -> &'static str {
        "Software"
    }

    fn generate_volumes(&mut self, dimension: u32) -> Result<(), VoxelError> {
        let layout = Self::layout_for(dimension)?;
        self.check_budget("volume", layout.volume_bytes())?;

        // Release before allocating so peak usage stays at one volume.
        self.volume = Vec::new();
        self.volume_layout = None;
        self.volume = Self::allocate_zeroed("volume", layout.voxel_capacity() as usize)?;
        self.volume_layout = Some(layout);
        self.instances.clear();
        self.voxel_count = 0;
        self.validator.restart();

        info!(
            "Software backend allocated {dimension}^3 volume ({} bytes)",
            layout.volume_bytes()
        );
        Ok(())
    }

    fn generate_atomic_buffer(&mut self, dimension: u32) -> Result<(), VoxelError> {
        let layout = Self::layout_for(dimension)?;
        self.check_budget("accumulator", layout.accumulator_bytes())?;

        self.accumulator = Vec::new();
        self.accumulator_layout = None;
        self.accumulator = Self::allocate_zeroed(
            "accumulator",
            layout.voxel_capacity() as usize * ACCUMULATOR_WORDS,
        )?;
        self.accumulator_layout = Some(layout);
        self.validator.restart();

        info!(
            "Software backend allocated {dimension}^3 accumulator ({} bytes)",
            layout.accumulator_bytes()
        );
        Ok(())
    }

    fn release(&mut self) {
        self.volume = Vec::new();
        self.accumulator = Vec::new();
        self.volume_layout = None;
        self.accumulator_layout = None;
        self.instances.clear();
        self.voxel_count = 0;
        self.validator.restart();
    }

    fn allocated_dimension(&self) -> Option<u32> {
        match (self.volume_layout, self.accumulator_layout) {
            (Some(v), Some(a)) if v == a => Some(v.dimension()),
            _ => None,
        }
    }

    fn reset_atomic_buffer(&mut self) -> Result<(), VoxelError> {
        if self.accumulator_layout.is_none() {
            return Err(VoxelError::NotAllocated);
        }
        self.validator.advance(SyncStep::Reset)?;
        self.accumulator.fill(0);
        self.fragments = 0;
        Ok(())
    }

    fn barrier(&mut self, barrier: Barrier) -> Result<(), VoxelError> {
        // Single-threaded: ordering is program order, only validation remains.
        self.validator.advance(SyncStep::Barrier(barrier))
    }

    fn set_region(&mut self, region: &VoxelRegion) -> Result<(), VoxelError> {
        self.region = Some(*region);
        Ok(())
    }

    fn set_matrices(
        &mut self,
        axis: Axis,
        view_proj: &Mat4,
        model: &Mat4,
    ) -> Result<(), VoxelError> {
        self.axis = axis;
        self.view_proj = *view_proj;
        self.model = *model;
        Ok(())
    }

    fn set_material(&mut self, albedo: LinearRgba) -> Result<(), VoxelError> {
        self.albedo = quantize(albedo);
        Ok(())
    }

    fn draw(&mut self, id: MeshId, mesh: &MeshData) -> Result<(), VoxelError> {
        let layout = self.accumulator_layout.ok_or(VoxelError::NotAllocated)?;
        let region = self
            .region
            .ok_or_else(|| VoxelError::Backend("draw issued before set_region".into()))?;
        self.validator.advance(SyncStep::Accumulate(self.axis))?;

        let d = layout.dimension();
        let size = d as f32;
        let view_proj = self.view_proj;
        let model = self.model;
        let albedo = self.albedo;
        let accumulator = &mut self.accumulator;
        let mut fragments = 0u64;

        for tri in mesh.triangles() {
            let world = tri.map(|p| model.transform_point3(p));
            let screen = world.map(|p| {
                let ndc = view_proj.project_point3(p);
                Vec2::new((ndc.x + 1.0) * 0.5 * size, (1.0 - ndc.y) * 0.5 * size)
            });

            rasterize_conservative(&RasterTriangle { screen, world }, d, |_, p| {
                let Some(index) = region.voxel_coord(p).and_then(|c| layout.flatten(c)) else {
                    return;
                };
                let start = index * ACCUMULATOR_WORDS;
                let mut slot = Accumulator::from_words(&accumulator[start..start + ACCUMULATOR_WORDS]);
                slot.add(albedo);
                accumulator[start..start + 4].copy_from_slice(&slot.sum);
                accumulator[start + 4] = slot.count;
                fragments += 1;
            });
        }

        trace!(
            "Software draw of mesh {:?} on axis {}: {} fragments",
            id,
            self.axis,
            fragments
        );
        self.fragments += fragments;
        Ok(())
    }

    fn resolve(&mut self) -> Result<(), VoxelError> {
        let (volume_layout, accumulator_layout) = self.resolved_layouts()?;
        if volume_layout != accumulator_layout {
            return Err(VoxelError::Backend(format!(
                "volume is {}^3 but accumulator is {}^3",
                volume_layout.dimension(),
                accumulator_layout.dimension()
            )));
        }
        self.validator.advance(SyncStep::Resolve)?;

        self.instances.clear();
        for (index, (texel, words)) in self
            .volume
            .iter_mut()
            .zip(self.accumulator.chunks_exact(ACCUMULATOR_WORDS))
            .enumerate()
        {
            let slot = Accumulator::from_words(words);
            *texel = slot.resolve();
            if !slot.is_empty() {
                self.instances.push(VoxelInstance {
                    coord: volume_layout.unflatten(index),
                    color: *texel,
                });
            }
        }
        self.voxel_count = self.instances.len() as u32;

        debug!(
            "Software resolve: {} fragments into {} voxels",
            self.fragments, self.voxel_count
        );
        Ok(())
    }

    fn draw_voxels(&mut self, view_proj: &Mat4) -> Result<DrawStats, VoxelError> {
        if self.volume_layout.is_none() {
            return Err(VoxelError::NotAllocated);
        }
        self.validator.advance(SyncStep::Read)?;
        self.last_view_proj = Some(*view_proj);
        Ok(DrawStats {
            instances: self.instances.len() as u32,
        })
    }

    fn abort_cycle(&mut self) {
        // Resolve writes the volume in one go, so the previous one is intact.
        self.validator.abort();
        self.fragments = 0;
    }

    fn voxel_count(&self) -> u32 {
        self.voxel_count
    }

    fn sync_log(&self) -> Option<&SyncLog> {
        Some(self.validator.log())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::ProjectionBuilder;
    use vxgi_core::math::{Aabb, Vec3};

    fn allocated(d: u32) -> SoftwareVoxelBackend {
        let mut backend = SoftwareVoxelBackend::new();
        backend.generate_volumes(d).unwrap();
        backend.generate_atomic_buffer(d).unwrap();
        backend
    }

    fn run(backend: &mut SoftwareVoxelBackend, bbox: &Aabb, draws: &[(MeshData, LinearRgba)]) {
        let projections = ProjectionBuilder::build(bbox, None, backend.allocated_dimension().unwrap()).unwrap();
        backend.reset_atomic_buffer().unwrap();
        backend.barrier(Barrier::ResetToAccumulate).unwrap();
        backend.set_region(projections.region()).unwrap();
        for (axis, view_proj) in projections.iter() {
            for (i, (mesh, color)) in draws.iter().enumerate() {
                backend.set_matrices(axis, view_proj, &Mat4::IDENTITY).unwrap();
                backend.set_material(*color).unwrap();
                backend.draw(MeshId(i as u32), mesh).unwrap();
            }
        }
        backend.barrier(Barrier::AccumulateToResolve).unwrap();
        backend.resolve().unwrap();
        backend.barrier(Barrier::ResolveToRead).unwrap();
    }

    fn scenario_box() -> Aabb {
        Aabb::from_min_max(Vec3::ZERO, Vec3::splat(10.0))
    }

    fn tiny_triangle() -> MeshData {
        MeshData::triangle(
            Vec3::new(5.5, 5.5, 5.5),
            Vec3::new(5.6, 5.5, 5.5),
            Vec3::new(5.5, 5.6, 5.5),
        )
    }

    #[test]
    fn test_tiny_triangle_fills_one_voxel() {
        let mut backend = allocated(8);
        run(&mut backend, &scenario_box(), &[(tiny_triangle(), LinearRgba::RED)]);
        assert_eq!(backend.voxel_count(), 1);
        assert_eq!(backend.voxel([4, 4, 4]), Some([255, 0, 0, 255]));
        assert_eq!(backend.instances()[0].coord, [4, 4, 4]);
    }

    #[test]
    fn test_tilted_triangle_accumulates_once_per_axis() {
        let mut backend = allocated(8);
        let tilted = MeshData::triangle(
            Vec3::new(5.5, 5.5, 5.5),
            Vec3::new(5.6, 5.5, 5.55),
            Vec3::new(5.5, 5.6, 5.52),
        );
        run(&mut backend, &scenario_box(), &[(tilted, LinearRgba::RED)]);
        assert_eq!(backend.voxel_count(), 1);
        assert_eq!(backend.accumulator([4, 4, 4]).unwrap().count, 3);
        assert_eq!(backend.voxel([4, 4, 4]), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_aborted_cycle_keeps_last_volume_drawable() {
        let mut backend = allocated(8);
        run(&mut backend, &scenario_box(), &[(tiny_triangle(), LinearRgba::RED)]);

        backend.reset_atomic_buffer().unwrap();
        backend.barrier(Barrier::ResetToAccumulate).unwrap();
        backend.abort_cycle();

        let stats = backend.draw_voxels(&Mat4::IDENTITY).unwrap();
        assert_eq!(stats.instances, 1);
        assert_eq!(backend.voxel([4, 4, 4]), Some([255, 0, 0, 255]));
        run(&mut backend, &scenario_box(), &[]);
        assert_eq!(backend.voxel_count(), 0);
    }

    #[test]
    fn test_geometry_outside_region_is_dropped() {
        let mut backend = allocated(8);
        let far = MeshData::triangle(
            Vec3::new(50.0, 50.0, 50.0),
            Vec3::new(51.0, 50.0, 50.0),
            Vec3::new(50.0, 51.0, 50.0),
        );
        run(&mut backend, &scenario_box(), &[(far, LinearRgba::GREEN)]);
        assert_eq!(backend.voxel_count(), 0);
        assert!(backend.volume().iter().all(|v| *v == [0, 0, 0, 0]));
    }

    #[test]
    fn test_reset_clears_previous_cycle() {
        let mut backend = allocated(8);
        run(&mut backend, &scenario_box(), &[(tiny_triangle(), LinearRgba::RED)]);
        run(&mut backend, &scenario_box(), &[]);
        assert_eq!(backend.voxel_count(), 0);
        assert_eq!(backend.voxel([4, 4, 4]), Some([0, 0, 0, 0]));
        assert_eq!(backend.accumulator([4, 4, 4]), Some(Accumulator::default()));
    }

    #[test]
    fn test_draw_before_reset_is_rejected() {
        let mut backend = allocated(8);
        backend.set_region(&VoxelRegion::fit(&scenario_box(), None, 8).0).unwrap();
        let err = backend.draw(MeshId(0), &tiny_triangle()).unwrap_err();
        assert!(matches!(err, VoxelError::OrderingViolation { .. }));
    }

    #[test]
    fn test_unallocated_backend_reports_not_allocated() {
        let mut backend = SoftwareVoxelBackend::new();
        assert_eq!(backend.reset_atomic_buffer(), Err(VoxelError::NotAllocated));
        assert_eq!(backend.resolve(), Err(VoxelError::NotAllocated));
        assert_eq!(backend.allocated_dimension(), None);
    }

    #[test]
    fn test_memory_budget_rejects_large_volumes() {
        let mut backend = SoftwareVoxelBackend::with_memory_budget(1024);
        let err = backend.generate_volumes(64).unwrap_err();
        assert!(err.is_allocation_failure());
        assert!(backend.generate_volumes(4).is_ok());
    }

    #[test]
    fn test_draw_voxels_reports_one_instance_per_voxel() {
        let mut backend = allocated(8);
        let cube = MeshData::cuboid(Vec3::splat(1.0), Vec3::splat(9.0));
        run(&mut backend, &scenario_box(), &[(cube, LinearRgba::WHITE)]);
        let stats = backend.draw_voxels(&Mat4::IDENTITY).unwrap();
        assert_eq!(stats.instances, backend.voxel_count());
        assert!(stats.instances > 0);
        assert!(backend.sync_log().unwrap().precedes(SyncStep::Resolve, SyncStep::Read));
    }
}
