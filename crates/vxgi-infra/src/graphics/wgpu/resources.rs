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

//! GPU allocations owned by the voxel backend.
//!
//! Every allocation is checked against the device limits first and then
//! created inside out-of-memory and validation error scopes, so failures
//! come back as [`VoxelError::Allocation`] instead of an uncaptured error.

use super::context::WgpuGraphicsContext;
use super::pipelines::{DRAWER_DEPTH_FORMAT, DRAWER_FORMAT, RASTER_FORMAT, VOLUME_FORMAT};
use vxgi_core::voxel::{DrawerTarget, VolumeLayout, VoxelError};
use vxgi_lanes::shaders::{DrawIndexedIndirectArgs, ResolveParams};
use vxgi_lanes::voxel_drawer_lane::CUBE_INDICES;
use wgpu::util::DeviceExt;

/// Bytes per entry of the drawer instance list (packed coord, packed color).
pub(crate) const INSTANCE_STRIDE: u64 = 8;

/// Draw arguments before any voxel has been appended.
pub(crate) fn empty_draw_args() -> DrawIndexedIndirectArgs {
    DrawIndexedIndirectArgs {
        index_count: CUBE_INDICES.len() as u32,
        instance_count: 0,
        first_index: 0,
        base_vertex: 0,
        first_instance: 0,
    }
}

/// The RGBA8 volume and everything the resolve and drawer passes write
/// alongside it.
#[derive(Debug)]
pub(crate) struct VolumeResources {
    pub dimension: u32,
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub instances: wgpu::Buffer,
    pub draw_args: wgpu::Buffer,
    /// Copy source that resets `draw_args` inside the cycle encoder.
    pub empty_draw_args: wgpu::Buffer,
    pub resolve_params: wgpu::Buffer,
    /// `dimension²` raster grid of the voxelization pass.
    pub raster_view: wgpu::TextureView,
}

/// The atomic accumulation buffer.
#[derive(Debug)]
pub(crate) struct AccumulatorResources {
    pub dimension: u32,
    pub buffer: wgpu::Buffer,
    pub size: u64,
}

/// Offscreen color and depth target of the debug drawer.
#[derive(Debug)]
pub(crate) struct OffscreenTarget {
    pub width: u32,
    pub height: u32,
    pub color: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    pub depth_view: wgpu::TextureView,
}

fn allocation_error(resource: &'static str, details: impl Into<String>) -> VoxelError {
    VoxelError::Allocation {
        resource,
        details: details.into(),
    }
}

fn layout_for(dimension: u32) -> Result<VolumeLayout, VoxelError> {
    VolumeLayout::new(dimension)
        .ok_or_else(|| VoxelError::invalid_config("volume_dimension", "must be at least 1"))
}

fn check_buffer_size(
    limits: &wgpu::Limits,
    resource: &'static str,
    bytes: u64,
) -> Result<(), VoxelError> {
    let max = limits
        .max_buffer_size
        .min(limits.max_storage_buffer_binding_size as u64);
    if bytes > max {
        return Err(allocation_error(
            resource,
            format!("{bytes} bytes exceed the device limit of {max} bytes"),
        ));
    }
    Ok(())
}

/// Runs `create` inside out-of-memory and validation error scopes.
fn guarded<T>(
    device: &wgpu::Device,
    resource: &'static str,
    create: impl FnOnce() -> T,
) -> Result<T, VoxelError> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    match out_of_memory.or(validation) {
        Some(e) => Err(allocation_error(resource, e.to_string())),
        None => Ok(value),
    }
}

impl VolumeResources {
    pub fn allocate(context: &WgpuGraphicsContext, dimension: u32) -> Result<Self, VoxelError> {
        let layout = layout_for(dimension)?;
        let limits = &context.device_limits;
        if dimension > limits.max_texture_dimension_3d {
            return Err(allocation_error(
                "voxel volume",
                format!(
                    "{dimension}^3 exceeds the 3D texture limit of {}",
                    limits.max_texture_dimension_3d
                ),
            ));
        }
        if dimension > limits.max_texture_dimension_2d {
            return Err(allocation_error(
                "raster target",
                format!(
                    "{dimension}^2 exceeds the 2D texture limit of {}",
                    limits.max_texture_dimension_2d
                ),
            ));
        }
        let instance_bytes = layout.voxel_capacity() * INSTANCE_STRIDE;
        check_buffer_size(limits, "voxel instance list", instance_bytes)?;

        let device = &context.device;
        guarded(device, "voxel volume", || {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Voxel Volume"),
                size: wgpu::Extent3d {
                    width: dimension,
                    height: dimension,
                    depth_or_array_layers: dimension,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D3,
                format: VOLUME_FORMAT,
                usage: wgpu::TextureUsages::STORAGE_BINDING
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

            let instances = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Voxel Instance List"),
                size: instance_bytes,
                usage: wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            });
            let draw_args = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Voxel Draw Args"),
                contents: bytemuck::bytes_of(&empty_draw_args()),
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::INDIRECT
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
            });
            let empty_args = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Voxel Empty Draw Args"),
                contents: bytemuck::bytes_of(&empty_draw_args()),
                usage: wgpu::BufferUsages::COPY_SRC,
            });
            let resolve_params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Resolve Params"),
                contents: bytemuck::bytes_of(&ResolveParams {
                    dimension,
                    _pad: [0; 3],
                }),
                usage: wgpu::BufferUsages::UNIFORM,
            });

            let raster = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Voxelize Raster Target"),
                size: wgpu::Extent3d {
                    width: dimension,
                    height: dimension,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: RASTER_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            let raster_view = raster.create_view(&wgpu::TextureViewDescriptor::default());

            Self {
                dimension,
                texture,
                view,
                instances,
                draw_args,
                empty_draw_args: empty_args,
                resolve_params,
                raster_view,
            }
        })
    }
}

impl AccumulatorResources {
    pub fn allocate(context: &WgpuGraphicsContext, dimension: u32) -> Result<Self, VoxelError> {
        let size = layout_for(dimension)?.accumulator_bytes();
        check_buffer_size(&context.device_limits, "atomic accumulation buffer", size)?;

        let device = &context.device;
        guarded(device, "atomic accumulation buffer", || Self {
            dimension,
            buffer: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Voxel Accumulator"),
                size,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            size,
        })
    }
}

impl OffscreenTarget {
    pub fn new(context: &WgpuGraphicsContext, target: DrawerTarget) -> Result<Self, VoxelError> {
        let width = target.width.max(1);
        let height = target.height.max(1);
        let max = context.device_limits.max_texture_dimension_2d;
        if width > max || height > max {
            return Err(allocation_error(
                "drawer target",
                format!("{width}x{height} exceeds the 2D texture limit of {max}"),
            ));
        }

        let device = &context.device;
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        guarded(device, "drawer target", || {
            let color = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Voxel Drawer Color"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DRAWER_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            });
            let depth = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Voxel Drawer Depth"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DRAWER_DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            Self {
                width,
                height,
                color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
                depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
                color,
            }
        })
    }
}
