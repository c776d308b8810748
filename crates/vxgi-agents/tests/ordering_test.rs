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

//! Call-order tests for the VoxelRenderer against a recording backend.
//!
//! The mock records every backend call so the tests can check the reset →
//! accumulate → resolve → read ordering without any real rasterization.

use vxgi_agents::VoxelRenderer;
use vxgi_core::math::{LinearRgba, Mat4, Vec3};
use vxgi_core::scene::{Material, MeshData, MeshId, Scene, SceneNode};
use vxgi_core::voxel::{Axis, Barrier, DrawStats, VoxelConfig, VoxelError, VoxelRegion};
use vxgi_core::{Renderer, VoxelBackend};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Generate(u32),
    Release,
    Reset,
    Barrier(Barrier),
    Region,
    Matrices(Axis),
    Material(LinearRgba),
    Draw(MeshId),
    Resolve,
    DrawVoxels,
}

/// Helper: a backend that records calls and fails allocations above `limit`.
#[derive(Debug, Default)]
struct RecordingBackend {
    calls: Vec<Call>,
    dimension: Option<u32>,
    limit: Option<u32>,
}

impl RecordingBackend {
    fn with_limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Default::default()
        }
    }

    fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }
}

impl VoxelBackend for RecordingBackend {
    fn backend_name(&self) -> &'static str {
        "Recording"
    }

    fn generate_volumes(&mut self, dimension: u32) -> Result<(), VoxelError> {
        if self.limit.is_some_and(|limit| dimension > limit) {
            return Err(VoxelError::Allocation {
                resource: "voxel volume",
                details: format!("{dimension}^3 over the test limit"),
            });
        }
        self.calls.push(Call::Generate(dimension));
        self.dimension = Some(dimension);
        Ok(())
    }

    fn generate_atomic_buffer(&mut self, _dimension: u32) -> Result<(), VoxelError> {
        Ok(())
    }

    fn release(&mut self) {
        if self.dimension.take().is_some() {
            self.calls.push(Call::Release);
        }
    }

    fn allocated_dimension(&self) -> Option<u32> {
        self.dimension
    }

    fn reset_atomic_buffer(&mut self) -> Result<(), VoxelError> {
        self.dimension.ok_or(VoxelError::NotAllocated)?;
        self.calls.push(Call::Reset);
        Ok(())
    }

    fn barrier(&mut self, barrier: Barrier) -> Result<(), VoxelError> {
        self.calls.push(Call::Barrier(barrier));
        Ok(())
    }

    fn set_region(&mut self, _region: &VoxelRegion) -> Result<(), VoxelError> {
        self.calls.push(Call::Region);
        Ok(())
    }

    fn set_matrices(
        &mut self,
        axis: Axis,
        _view_proj: &Mat4,
        _model: &Mat4,
    ) -> Result<(), VoxelError> {
        self.calls.push(Call::Matrices(axis));
        Ok(())
    }

    fn set_material(&mut self, albedo: LinearRgba) -> Result<(), VoxelError> {
        self.calls.push(Call::Material(albedo));
        Ok(())
    }

    fn draw(&mut self, id: MeshId, _mesh: &MeshData) -> Result<(), VoxelError> {
        self.calls.push(Call::Draw(id));
        Ok(())
    }

    fn resolve(&mut self) -> Result<(), VoxelError> {
        self.calls.push(Call::Resolve);
        Ok(())
    }

    fn draw_voxels(&mut self, _view_proj: &Mat4) -> Result<DrawStats, VoxelError> {
        self.calls.push(Call::DrawVoxels);
        Ok(DrawStats { instances: 0 })
    }

    fn voxel_count(&self) -> u32 {
        0
    }
}

/// Helper: two nodes sharing one mesh, with distinct materials.
fn two_node_scene() -> Scene {
    let mut scene = Scene::new();
    let mesh = scene.add_mesh(MeshData::cuboid(Vec3::ZERO, Vec3::ONE));
    let red = scene.add_material(Material::new(LinearRgba::RED));
    let blue = scene.add_material(Material::new(LinearRgba::BLUE));
    for (material, offset) in [(red, 0.0), (blue, 2.0)] {
        scene.add_node(SceneNode {
            mesh,
            material,
            transform: Mat4::from_translation(Vec3::new(offset, 0.0, 0.0)),
        });
    }
    scene
}

fn config(framestep: u32, show_voxels: bool) -> VoxelConfig {
    VoxelConfig {
        volume_dimension: 8,
        framestep,
        show_voxels,
        ..Default::default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cycle ordering
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_cycle_runs_in_barrier_order() {
    let scene = two_node_scene();
    let mut renderer = VoxelRenderer::new(RecordingBackend::default(), config(1, true)).unwrap();
    assert_eq!(
        renderer.backend_mut().take_calls(),
        vec![Call::Generate(8)],
        "construction allocates once"
    );

    renderer.render(&scene).unwrap();
    let calls = renderer.backend_mut().take_calls();

    let mut expected = vec![
        Call::Reset,
        Call::Barrier(Barrier::ResetToAccumulate),
        Call::Region,
    ];
    for axis in Axis::ALL {
        for albedo in [LinearRgba::RED, LinearRgba::BLUE] {
            expected.push(Call::Matrices(axis));
            expected.push(Call::Material(albedo));
            expected.push(Call::Draw(MeshId(0)));
        }
    }
    expected.extend([
        Call::Barrier(Barrier::AccumulateToResolve),
        Call::Resolve,
        Call::Barrier(Barrier::ResolveToRead),
        Call::DrawVoxels,
    ]);
    assert_eq!(calls, expected);
}

#[test]
fn test_off_frames_only_draw() {
    let scene = two_node_scene();
    let mut renderer = VoxelRenderer::new(RecordingBackend::default(), config(3, true)).unwrap();
    renderer.backend_mut().take_calls();

    let mut resets = Vec::new();
    for frame in 0..6 {
        renderer.render(&scene).unwrap();
        let calls = renderer.backend_mut().take_calls();
        if calls.contains(&Call::Reset) {
            resets.push(frame);
        } else {
            assert_eq!(calls, vec![Call::DrawVoxels], "frame {frame} only draws");
        }
        assert_eq!(calls.last(), Some(&Call::DrawVoxels));
    }
    assert_eq!(resets, vec![0, 3]);
}

#[test]
fn test_hidden_voxels_skip_the_drawer() {
    let scene = two_node_scene();
    let mut renderer = VoxelRenderer::new(RecordingBackend::default(), config(2, false)).unwrap();
    renderer.backend_mut().take_calls();

    renderer.render(&scene).unwrap();
    renderer.render(&scene).unwrap();
    let calls = renderer.backend_mut().take_calls();
    assert!(!calls.contains(&Call::DrawVoxels));
    assert_eq!(calls.iter().filter(|c| **c == Call::Reset).count(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Resource lifetime
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_dimension_change_recreates_resources() {
    let mut renderer = VoxelRenderer::new(RecordingBackend::default(), config(1, false)).unwrap();
    renderer.backend_mut().take_calls();

    // Same dimension: nothing to do.
    renderer.reconfigure(config(2, false)).unwrap();
    assert!(renderer.backend_mut().take_calls().is_empty());

    let bigger = VoxelConfig {
        volume_dimension: 16,
        ..config(2, false)
    };
    renderer.reconfigure(bigger).unwrap();
    assert_eq!(
        renderer.backend_mut().take_calls(),
        vec![Call::Release, Call::Generate(16)]
    );
}

#[test]
fn test_failed_allocation_reports_not_allocated_until_recovered() {
    let scene = two_node_scene();
    let mut renderer =
        VoxelRenderer::new(RecordingBackend::with_limit(32), config(1, true)).unwrap();

    let too_big = VoxelConfig {
        volume_dimension: 64,
        ..config(1, true)
    };
    assert!(matches!(
        renderer.reconfigure(too_big),
        Err(VoxelError::Allocation { .. })
    ));
    renderer.backend_mut().take_calls();

    for _ in 0..3 {
        assert_eq!(renderer.render(&scene), Err(VoxelError::NotAllocated));
    }
    assert!(
        renderer.backend_mut().take_calls().is_empty(),
        "a disabled renderer must not touch the backend"
    );

    renderer.reconfigure(config(1, true)).unwrap();
    renderer.render(&scene).unwrap();
    assert!(renderer.backend_mut().take_calls().contains(&Call::Resolve));
}
