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

//! Shader modules, bind group layouts and pipelines of the voxel passes.
//!
//! Everything here is created once per backend instance.

use anyhow::{anyhow, Result};
use std::borrow::Cow;
use std::num::NonZeroU64;
use vxgi_lanes::shaders::{
    DrawerUniforms, ResolveParams, VoxelizeUniforms, RESOLVE_WGSL, VOXELIZE_WGSL,
    VOXEL_DRAWER_WGSL,
};

/// Format of the volume texture.
pub(crate) const VOLUME_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
/// Format of the voxelization raster grid. Nothing is ever written to it.
pub(crate) const RASTER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;
/// Color format of the debug drawer target.
pub(crate) const DRAWER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
/// Depth format of the debug drawer target.
pub(crate) const DRAWER_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[derive(Debug)]
pub(crate) struct VoxelPipelines {
    pub voxelize: wgpu::RenderPipeline,
    /// Group 0: per-draw uniforms (dynamic offset) and the accumulator.
    pub voxelize_frame_layout: wgpu::BindGroupLayout,
    /// Group 1: mesh positions and indices.
    pub voxelize_mesh_layout: wgpu::BindGroupLayout,
    pub resolve: wgpu::ComputePipeline,
    pub resolve_layout: wgpu::BindGroupLayout,
    pub drawer: wgpu::RenderPipeline,
    pub drawer_layout: wgpu::BindGroupLayout,
}

fn uniform_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    size: usize,
    dynamic: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: NonZeroU64::new(size as u64),
        },
        count: None,
    }
}

fn storage_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    read_only: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn shader(device: &wgpu::Device, label: &str, source: &'static str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
    })
}

impl VoxelPipelines {
    pub fn new(device: &wgpu::Device) -> Result<Self> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipelines = Self::create(device);
        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(anyhow!("Failed to create voxel pipelines: {}", e));
        }
        log::info!("Voxel pipelines created (voxelize, resolve, drawer).");
        Ok(pipelines)
    }

    fn create(device: &wgpu::Device) -> Self {
        use wgpu::ShaderStages as S;

        // --- Voxelize ---
        let voxelize_frame_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Voxelize Frame Layout"),
                entries: &[
                    uniform_entry(
                        0,
                        S::VERTEX | S::FRAGMENT,
                        std::mem::size_of::<VoxelizeUniforms>(),
                        true,
                    ),
                    storage_entry(1, S::FRAGMENT, false),
                ],
            });
        let voxelize_mesh_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Voxelize Mesh Layout"),
                entries: &[storage_entry(0, S::VERTEX, true), storage_entry(1, S::VERTEX, true)],
            });
        let voxelize_module = shader(device, "Voxelize Shader", VOXELIZE_WGSL);
        let voxelize_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Voxelize Pipeline Layout"),
                bind_group_layouts: &[&voxelize_frame_layout, &voxelize_mesh_layout],
                push_constant_ranges: &[],
            });
        let voxelize = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Voxelize Pipeline"),
            layout: Some(&voxelize_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &voxelize_module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &voxelize_module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: RASTER_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::empty(),
                })],
                compilation_options: Default::default(),
            }),
            // Both windings must rasterize: every axis sees half the
            // triangles from behind.
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        // --- Resolve ---
        let resolve_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Resolve Layout"),
            entries: &[
                storage_entry(0, S::COMPUTE, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: S::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: VOLUME_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D3,
                    },
                    count: None,
                },
                storage_entry(2, S::COMPUTE, false),
                storage_entry(3, S::COMPUTE, false),
                uniform_entry(4, S::COMPUTE, std::mem::size_of::<ResolveParams>(), false),
            ],
        });
        let resolve_module = shader(device, "Resolve Shader", RESOLVE_WGSL);
        let resolve_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Resolve Pipeline Layout"),
                bind_group_layouts: &[&resolve_layout],
                push_constant_ranges: &[],
            });
        let resolve = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Resolve Pipeline"),
            layout: Some(&resolve_pipeline_layout),
            module: &resolve_module,
            entry_point: Some("cs_main"),
            compilation_options: Default::default(),
            cache: None,
        });

        // --- Drawer ---
        let drawer_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Voxel Drawer Layout"),
            entries: &[
                uniform_entry(0, S::VERTEX, std::mem::size_of::<DrawerUniforms>(), false),
                storage_entry(1, S::VERTEX, true),
            ],
        });
        let drawer_module = shader(device, "Voxel Drawer Shader", VOXEL_DRAWER_WGSL);
        let drawer_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Voxel Drawer Pipeline Layout"),
                bind_group_layouts: &[&drawer_layout],
                push_constant_ranges: &[],
            });
        let drawer = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Voxel Drawer Pipeline"),
            layout: Some(&drawer_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &drawer_module,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x3],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &drawer_module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: DRAWER_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DRAWER_DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            voxelize,
            voxelize_frame_layout,
            voxelize_mesh_layout,
            resolve,
            resolve_layout,
            drawer,
            drawer_layout,
        }
    }
}
