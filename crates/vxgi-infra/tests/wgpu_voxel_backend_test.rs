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

//! GPU tests for the wgpu voxel backend.
//!
//! Each test needs a real adapter and returns early with a log line when
//! none is available, so they pass on headless CI machines.

use std::sync::Arc;
use vxgi_agents::VoxelRenderer;
use vxgi_core::math::{Aabb, LinearRgba, Mat4, Vec3};
use vxgi_core::scene::{Material, MeshData, MeshId, Scene, SceneNode};
use vxgi_core::voxel::{Barrier, DrawerTarget, SyncStep, VolumeLayout, VoxelConfig, VoxelError};
use vxgi_core::{Renderer, VoxelBackend};
use vxgi_infra::{WgpuGraphicsContext, WgpuVoxelBackend};

const TARGET: DrawerTarget = DrawerTarget {
    width: 64,
    height: 64,
};

/// Helper: a backend on the default adapter, or `None` without one.
fn gpu_backend() -> Option<WgpuVoxelBackend> {
    let _ = env_logger::builder().is_test(true).try_init();
    let context = match WgpuGraphicsContext::new_blocking() {
        Ok(context) => Arc::new(context),
        Err(e) => {
            println!("Skipping wgpu test: {e}");
            return None;
        }
    };
    match WgpuVoxelBackend::new(context, TARGET) {
        Ok(backend) => Some(backend),
        Err(e) => {
            println!("Skipping wgpu test: {e}");
            None
        }
    }
}

/// Helper: the `[(0,0,0), (10,10,10)]` box pinned by zero-area specks, plus
/// the given triangles.
fn scenario_scene(triangles: &[(MeshData, LinearRgba)]) -> Scene {
    let mut scene = Scene::new();
    let speck = scene.add_mesh(MeshData::triangle(Vec3::ZERO, Vec3::ZERO, Vec3::ZERO));
    let white = scene.add_material(Material::new(LinearRgba::WHITE));
    for corner in Aabb::from_min_max(Vec3::ZERO, Vec3::splat(10.0)).corners() {
        scene.add_node(SceneNode {
            mesh: speck,
            material: white,
            transform: Mat4::from_translation(corner),
        });
    }
    for (mesh, color) in triangles {
        let mesh = scene.add_mesh(mesh.clone());
        let material = scene.add_material(Material::new(*color));
        scene.add_node(SceneNode {
            mesh,
            material,
            transform: Mat4::IDENTITY,
        });
    }
    scene
}

fn tiny_triangle_in_voxel_444() -> MeshData {
    MeshData::triangle(
        Vec3::new(5.5, 5.5, 5.5),
        Vec3::new(5.6, 5.5, 5.5),
        Vec3::new(5.5, 5.6, 5.5),
    )
}

fn config(show_voxels: bool) -> VoxelConfig {
    VoxelConfig {
        volume_dimension: 8,
        show_voxels,
        drawer_target: TARGET,
        ..Default::default()
    }
}

fn voxel_index(coord: [u32; 3]) -> usize {
    VolumeLayout::new(8).and_then(|l| l.flatten(coord)).unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Voxelization
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_gpu_scenario_counts_one_voxel() {
    let Some(backend) = gpu_backend() else {
        return;
    };
    let scene = scenario_scene(&[(tiny_triangle_in_voxel_444(), LinearRgba::RED)]);
    let mut renderer = VoxelRenderer::new(backend, config(false)).unwrap();
    renderer.render(&scene).unwrap();
    renderer.backend_mut().wait_idle();

    assert_eq!(renderer.voxel_count(), 1);
    let volume = renderer.backend().read_volume().unwrap();
    assert_eq!(volume.len(), 512);
    assert_eq!(volume[voxel_index([4, 4, 4])], [255, 0, 0, 255]);
    assert_eq!(volume[voxel_index([0, 0, 0])], [0, 0, 0, 0]);
}

#[test]
fn test_gpu_average_matches_integer_rounding() {
    let Some(backend) = gpu_backend() else {
        return;
    };
    let tri = tiny_triangle_in_voxel_444();
    let scene = scenario_scene(&[
        (tri.clone(), LinearRgba::new(0.2, 0.4, 1.0, 1.0)),
        (tri, LinearRgba::new(0.6, 0.0, 0.0, 1.0)),
    ]);
    let mut renderer = VoxelRenderer::new(backend, config(false)).unwrap();
    renderer.render(&scene).unwrap();
    renderer.backend_mut().wait_idle();

    let volume = renderer.backend().read_volume().unwrap();
    assert_eq!(volume[voxel_index([4, 4, 4])], [102, 51, 128, 255]);
}

#[test]
fn test_gpu_cycles_are_bit_identical_and_reset() {
    let Some(backend) = gpu_backend() else {
        return;
    };
    let scene = scenario_scene(&[(
        MeshData::cuboid(Vec3::new(2.0, 3.0, 1.0), Vec3::new(7.0, 6.0, 9.0)),
        LinearRgba::new(0.25, 0.5, 0.75, 1.0),
    )]);
    let mut renderer = VoxelRenderer::new(backend, config(false)).unwrap();

    renderer.render(&scene).unwrap();
    renderer.backend_mut().wait_idle();
    let first = renderer.backend().read_volume().unwrap();
    let count = renderer.voxel_count();
    assert!(count > 0);
    assert_eq!(
        first.iter().filter(|v| **v != [0, 0, 0, 0]).count() as u32,
        count,
        "every counted voxel is non-empty and vice versa"
    );

    renderer.render(&scene).unwrap();
    renderer.backend_mut().wait_idle();
    assert_eq!(renderer.backend().read_volume().unwrap(), first);

    renderer.render(&scenario_scene(&[])).unwrap();
    renderer.backend_mut().wait_idle();
    assert_eq!(renderer.voxel_count(), 0);
    assert!(renderer
        .backend()
        .read_volume()
        .unwrap()
        .iter()
        .all(|v| *v == [0, 0, 0, 0]));
}

// ─────────────────────────────────────────────────────────────────────────────
// Drawer and ordering
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_gpu_drawer_renders_resolved_voxels() {
    let Some(backend) = gpu_backend() else {
        return;
    };
    let scene = scenario_scene(&[(tiny_triangle_in_voxel_444(), LinearRgba::RED)]);
    let mut renderer = VoxelRenderer::new(backend, config(true)).unwrap();
    renderer.render(&scene).unwrap();
    renderer.backend_mut().wait_idle();
    // The drawer of the second frame sees the count of the first cycle.
    renderer.set_update_frequency(100).unwrap();
    renderer.render(&scene).unwrap();
    assert_eq!(renderer.stats().drawn_instances, 1);

    let capture = renderer.backend().read_drawer_target().unwrap();
    assert_eq!((capture.width, capture.height), (64, 64));
    assert_eq!(capture.rgba.len(), 64 * 64 * 4);
    assert!(
        capture.rgba.chunks_exact(4).any(|px| px == [255, 0, 0, 255]),
        "the red voxel is visible from the overview camera"
    );
}

#[test]
fn test_gpu_backend_rejects_out_of_order_steps() {
    let Some(mut backend) = gpu_backend() else {
        return;
    };
    let mesh = tiny_triangle_in_voxel_444();
    assert_eq!(
        backend.draw(MeshId(0), &mesh),
        Err(VoxelError::NotAllocated)
    );

    backend.generate_volumes(8).unwrap();
    backend.generate_atomic_buffer(8).unwrap();
    assert_eq!(backend.allocated_dimension(), Some(8));
    assert!(matches!(
        backend.barrier(Barrier::AccumulateToResolve),
        Err(VoxelError::OrderingViolation { .. })
    ));

    backend.reset_atomic_buffer().unwrap();
    backend.barrier(Barrier::ResetToAccumulate).unwrap();
    assert!(matches!(
        backend.draw_voxels(&Mat4::IDENTITY),
        Err(VoxelError::OrderingViolation { .. })
    ));
    let log = backend.sync_log().unwrap();
    assert!(log.precedes(SyncStep::Reset, SyncStep::Barrier(Barrier::ResetToAccumulate)));

    backend.release();
    assert_eq!(backend.allocated_dimension(), None);
}

#[test]
fn test_gpu_aborted_cycle_keeps_drawer_args() {
    let Some(backend) = gpu_backend() else {
        return;
    };
    let scene = scenario_scene(&[(tiny_triangle_in_voxel_444(), LinearRgba::RED)]);
    let mut renderer = VoxelRenderer::new(backend, config(true)).unwrap();
    renderer.render(&scene).unwrap();
    renderer.backend_mut().wait_idle();

    let backend = renderer.backend_mut();
    backend.reset_atomic_buffer().unwrap();
    backend.barrier(Barrier::ResetToAccumulate).unwrap();
    backend.abort_cycle();
    backend.draw_voxels(&Mat4::IDENTITY).unwrap();
    backend.wait_idle();

    let volume = backend.read_volume().unwrap();
    assert_eq!(volume[voxel_index([4, 4, 4])], [255, 0, 0, 255]);

    renderer.set_update_frequency(100).unwrap();
    renderer.render(&scene).unwrap();
    let capture = renderer.backend().read_drawer_target().unwrap();
    assert!(
        capture.rgba.chunks_exact(4).any(|px| px == [255, 0, 0, 255]),
        "the aborted cycle did not reach the indirect draw args"
    );
}

#[test]
fn test_gpu_meshes_leaving_the_scene_are_evicted() {
    let Some(backend) = gpu_backend() else {
        return;
    };
    let mut renderer = VoxelRenderer::new(backend, config(false)).unwrap();
    renderer
        .render(&scenario_scene(&[(tiny_triangle_in_voxel_444(), LinearRgba::RED)]))
        .unwrap();
    assert!(format!("{:?}", renderer.backend()).contains("cached_meshes: 2"));

    // Only the shared corner speck survives.
    renderer.render(&scenario_scene(&[])).unwrap();
    assert!(format!("{:?}", renderer.backend()).contains("cached_meshes: 1"));
}
