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

//! The wgpu implementation of [`VoxelBackend`].
//!
//! A voxelization cycle is recorded into a single command encoder and
//! submitted at the `ResolveToRead` barrier:
//!
//! - `reset_atomic_buffer` opens the encoder, clears the accumulator and
//!   resets the indirect draw args.
//! - `draw` only records what to draw; the uniforms of every draw go into a
//!   dynamic-offset ring.
//! - `AccumulateToResolve` uploads the ring and records the voxelization
//!   render pass.
//! - `resolve` records the compute pass.
//! - `ResolveToRead` copies the instance counter for readback and submits.
//!
//! The pass boundaries are where wgpu inserts the memory barriers, so each
//! [`Barrier`] maps onto one of them. Nothing reaches the GPU before the
//! submit, so an aborted cycle is dropped with its encoder.

use super::context::WgpuGraphicsContext;
use super::pipelines::VoxelPipelines;
use super::readback::{read_rgba8_texture, CountReadback, DrawerCapture};
use super::resources::{AccumulatorResources, OffscreenTarget, VolumeResources};
use anyhow::anyhow;
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;
use vxgi_core::math::{LinearRgba, Mat4};
use vxgi_core::scene::{MeshData, MeshId};
use vxgi_core::voxel::{
    quantize, Axis, Barrier, DrawStats, DrawerTarget, SyncLog, SyncStep, SyncValidator,
    VoxelError, VoxelRegion,
};
use vxgi_core::VoxelBackend;
use vxgi_lanes::shaders::{DrawerUniforms, VoxelizeUniforms, RESOLVE_WORKGROUP_SIZE};
use vxgi_lanes::voxel_drawer_lane::{CUBE_INDICES, CUBE_POSITIONS};
use wgpu::util::DeviceExt;

const INITIAL_UNIFORM_SLOTS: u64 = 256;

/// Uploaded copy of a mesh, bound as storage buffers for vertex pulling.
#[derive(Debug)]
struct MeshBuffers {
    positions: wgpu::Buffer,
    indices: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    vertex_count: u32,
    /// Cycle in which the contents were last written.
    uploaded_cycle: u64,
}

#[derive(Debug, Clone, Copy)]
struct PendingDraw {
    uniform_offset: u32,
    mesh: MeshId,
    vertex_count: u32,
}

/// Per-draw voxelization uniforms, one aligned slot each.
#[derive(Debug)]
struct UniformRing {
    buffer: wgpu::Buffer,
    stride: u64,
    capacity: u64,
    staging: Vec<u8>,
}

impl UniformRing {
    fn new(device: &wgpu::Device, alignment: u32) -> Self {
        let size = std::mem::size_of::<VoxelizeUniforms>() as u64;
        let stride = size.next_multiple_of(alignment.max(1) as u64);
        Self {
            buffer: Self::create_buffer(device, stride * INITIAL_UNIFORM_SLOTS),
            stride,
            capacity: INITIAL_UNIFORM_SLOTS,
            staging: Vec::new(),
        }
    }

    fn create_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Voxelize Uniform Ring"),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn clear(&mut self) {
        self.staging.clear();
    }

    /// Appends one slot and returns its dynamic offset.
    fn push(&mut self, uniforms: &VoxelizeUniforms) -> u32 {
        let offset = self.staging.len();
        self.staging.extend_from_slice(bytemuck::bytes_of(uniforms));
        self.staging.resize(offset + self.stride as usize, 0);
        offset as u32
    }

    /// Writes the slots to the GPU. Returns `true` if the buffer had to be
    /// recreated, which invalidates bind groups referencing it.
    fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> bool {
        let slots = self.staging.len() as u64 / self.stride;
        let grown = slots > self.capacity;
        if grown {
            self.capacity = slots.next_power_of_two();
            self.buffer = Self::create_buffer(device, self.capacity * self.stride);
            log::debug!("Voxelize uniform ring grown to {} slots", self.capacity);
        }
        if !self.staging.is_empty() {
            queue.write_buffer(&self.buffer, 0, &self.staging);
        }
        grown
    }
}

/// GPU voxelization backend.
///
/// Owns its pipelines, the volume and accumulator, the debug drawer target
/// and a cache of uploaded meshes. The voxel count trails the GPU: it is
/// updated when the readback of a finished cycle has been mapped, which
/// [`WgpuVoxelBackend::poll`] and [`WgpuVoxelBackend::wait_idle`] check for.
pub struct WgpuVoxelBackend {
    context: Arc<WgpuGraphicsContext>,
    pipelines: VoxelPipelines,
    volume: Option<VolumeResources>,
    accumulator: Option<AccumulatorResources>,
    target: OffscreenTarget,

    cube_vertices: wgpu::Buffer,
    cube_indices: wgpu::Buffer,
    drawer_uniforms: wgpu::Buffer,
    uniforms: UniformRing,

    frame_bind_group: Option<wgpu::BindGroup>,
    resolve_bind_group: Option<wgpu::BindGroup>,
    drawer_bind_group: Option<wgpu::BindGroup>,

    meshes: HashMap<MeshId, MeshBuffers>,
    draws: Vec<PendingDraw>,
    encoder: Option<wgpu::CommandEncoder>,
    readback: CountReadback,
    validator: SyncValidator,

    region: Option<VoxelRegion>,
    axis: Axis,
    view_proj: Mat4,
    model: Mat4,
    albedo: [u32; 4],
    cycle: u64,
    voxel_count: u32,
}

impl fmt::Debug for WgpuVoxelBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WgpuVoxelBackend")
            .field("adapter", &self.context.adapter_name)
            .field("dimension", &self.allocated_dimension())
            .field("drawer_target", &(self.target.width, self.target.height))
            .field("cached_meshes", &self.meshes.len())
            .field("phase", &self.validator.phase())
            .field("voxel_count", &self.voxel_count)
            .finish()
    }
}

impl WgpuVoxelBackend {
    /// Creates the pipelines and the debug drawer target. Voxel resources
    /// are allocated later through [`VoxelBackend::generate_volumes`] and
    /// [`VoxelBackend::generate_atomic_buffer`].
    pub fn new(
        context: Arc<WgpuGraphicsContext>,
        drawer_target: DrawerTarget,
    ) -> anyhow::Result<Self> {
        let device = &context.device;
        let pipelines = VoxelPipelines::new(device)?;
        let target = OffscreenTarget::new(&context, drawer_target)
            .map_err(|e| anyhow!("Failed to create the voxel drawer target: {}", e))?;

        let cube_vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Voxel Cube Vertices"),
            contents: bytemuck::cast_slice(&CUBE_POSITIONS),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let cube_indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Voxel Cube Indices"),
            contents: bytemuck::cast_slice(&CUBE_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });
        let drawer_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Voxel Drawer Uniforms"),
            size: std::mem::size_of::<DrawerUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniforms = UniformRing::new(
            device,
            context.device_limits.min_uniform_buffer_offset_alignment,
        );
        let readback = CountReadback::new(device);

        log::info!(
            "WgpuVoxelBackend created on \"{}\" ({:?}), drawer target {}x{}",
            context.adapter_name,
            context.adapter_backend,
            target.width,
            target.height
        );

        Ok(Self {
            context,
            pipelines,
            volume: None,
            accumulator: None,
            target,
            cube_vertices,
            cube_indices,
            drawer_uniforms,
            uniforms,
            frame_bind_group: None,
            resolve_bind_group: None,
            drawer_bind_group: None,
            meshes: HashMap::new(),
            draws: Vec::new(),
            encoder: None,
            readback,
            validator: SyncValidator::new(),
            region: None,
            axis: Axis::X,
            view_proj: Mat4::IDENTITY,
            model: Mat4::IDENTITY,
            albedo: [0; 4],
            cycle: 0,
            voxel_count: 0,
        })
    }

    pub fn context(&self) -> &Arc<WgpuGraphicsContext> {
        &self.context
    }

    /// Picks up a finished voxel-count readback without blocking.
    pub fn poll(&mut self) {
        self.context.poll();
        if let Some(count) = self.readback.try_collect() {
            self.voxel_count = count;
        }
    }

    /// Blocks until the GPU is idle, then picks up the voxel count of the
    /// last submitted cycle.
    pub fn wait_idle(&mut self) {
        self.context.wait_idle();
        if let Some(count) = self.readback.try_collect() {
            self.voxel_count = count;
        }
    }

    /// Reads the resolved volume back, `x + y·d + z·d²` ordered. Blocks.
    pub fn read_volume(&self) -> anyhow::Result<Vec<[u8; 4]>> {
        if self.encoder.is_some() {
            return Err(anyhow!("Cannot read the volume while a cycle is being recorded"));
        }
        let volume = self.volume.as_ref().ok_or(VoxelError::NotAllocated)?;
        let bytes = read_rgba8_texture(&self.context, &volume.texture)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect())
    }

    /// Reads the debug drawer target back. Blocks.
    pub fn read_drawer_target(&self) -> anyhow::Result<DrawerCapture> {
        let rgba = read_rgba8_texture(&self.context, &self.target.color)?;
        Ok(DrawerCapture {
            width: self.target.width,
            height: self.target.height,
            rgba,
        })
    }

    fn no_cycle() -> VoxelError {
        VoxelError::Backend("no voxelization cycle is being recorded".into())
    }

    fn invalidate_bind_groups(&mut self) {
        self.frame_bind_group = None;
        self.resolve_bind_group = None;
        self.drawer_bind_group = None;
    }

    fn ensure_bind_groups(&mut self) -> Result<(), VoxelError> {
        let (Some(volume), Some(accumulator)) = (&self.volume, &self.accumulator) else {
            return Err(VoxelError::NotAllocated);
        };
        let device = &self.context.device;

        if self.frame_bind_group.is_none() {
            self.frame_bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Voxelize Frame Bind Group"),
                layout: &self.pipelines.voxelize_frame_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: &self.uniforms.buffer,
                            offset: 0,
                            size: NonZeroU64::new(std::mem::size_of::<VoxelizeUniforms>() as u64),
                        }),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: accumulator.buffer.as_entire_binding(),
                    },
                ],
            }));
        }

        if self.resolve_bind_group.is_none() {
            self.resolve_bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Resolve Bind Group"),
                layout: &self.pipelines.resolve_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: accumulator.buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&volume.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: volume.draw_args.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: volume.instances.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: volume.resolve_params.as_entire_binding(),
                    },
                ],
            }));
        }

        if self.drawer_bind_group.is_none() {
            self.drawer_bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Voxel Drawer Bind Group"),
                layout: &self.pipelines.drawer_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.drawer_uniforms.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: volume.instances.as_entire_binding(),
                    },
                ],
            }));
        }
        Ok(())
    }

    /// Uploads `mesh` once per cycle and returns how many vertices to draw.
    /// Triangles with out-of-range indices are left out.
    fn upload_mesh(&mut self, id: MeshId, mesh: &MeshData) -> u32 {
        if let Some(cached) = self.meshes.get(&id) {
            if cached.uploaded_cycle == self.cycle {
                return cached.vertex_count;
            }
        }

        let vertex_total = mesh.positions.len();
        let indices: Vec<u32> = mesh
            .indices
            .chunks_exact(3)
            .filter(|tri| tri.iter().all(|&i| (i as usize) < vertex_total))
            .flatten()
            .copied()
            .collect();
        if indices.is_empty() {
            self.meshes.remove(&id);
            return 0;
        }

        let position_bytes: &[u8] = bytemuck::cast_slice(&mesh.positions);
        let index_bytes: &[u8] = bytemuck::cast_slice(&indices);
        let device = &self.context.device;
        let queue = &self.context.queue;

        let fits = self.meshes.get(&id).is_some_and(|cached| {
            cached.positions.size() >= position_bytes.len() as u64
                && cached.indices.size() >= index_bytes.len() as u64
        });
        if fits {
            if let Some(cached) = self.meshes.get_mut(&id) {
                queue.write_buffer(&cached.positions, 0, position_bytes);
                queue.write_buffer(&cached.indices, 0, index_bytes);
                cached.vertex_count = indices.len() as u32;
                cached.uploaded_cycle = self.cycle;
                return cached.vertex_count;
            }
        }

        let positions = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Voxelize Mesh Positions"),
            contents: position_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Voxelize Mesh Indices"),
            contents: index_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Voxelize Mesh Bind Group"),
            layout: &self.pipelines.voxelize_mesh_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: positions.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: index_buffer.as_entire_binding(),
                },
            ],
        });
        log::trace!("Uploaded mesh {:?}: {} vertices", id, indices.len());

        let vertex_count = indices.len() as u32;
        self.meshes.insert(
            id,
            MeshBuffers {
                positions,
                indices: index_buffer,
                bind_group,
                vertex_count,
                uploaded_cycle: self.cycle,
            },
        );
        vertex_count
    }

    fn record_voxelize_pass(&mut self) -> Result<(), VoxelError> {
        let mut encoder = self.encoder.take().ok_or_else(Self::no_cycle)?;
        if self
            .uniforms
            .upload(&self.context.device, &self.context.queue)
        {
            self.frame_bind_group = None;
        }
        self.ensure_bind_groups()?;

        let (Some(volume), Some(frame_bind_group)) = (&self.volume, &self.frame_bind_group) else {
            return Err(VoxelError::NotAllocated);
        };
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Voxelize Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &volume.raster_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Discard,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipelines.voxelize);
            for draw in &self.draws {
                let Some(mesh) = self.meshes.get(&draw.mesh) else {
                    continue;
                };
                pass.set_bind_group(0, frame_bind_group, &[draw.uniform_offset]);
                pass.set_bind_group(1, &mesh.bind_group, &[]);
                pass.draw(0..draw.vertex_count, 0..1);
            }
        }
        log::trace!("Recorded voxelize pass with {} draws", self.draws.len());

        self.encoder = Some(encoder);
        Ok(())
    }

    fn submit_cycle(&mut self) -> Result<(), VoxelError> {
        let mut encoder = self.encoder.take().ok_or_else(Self::no_cycle)?;
        let volume = self.volume.as_ref().ok_or(VoxelError::NotAllocated)?;
        self.readback.record_copy(&mut encoder, &volume.draw_args);

        self.context.queue.submit(Some(encoder.finish()));
        self.readback.schedule_map();
        self.context.poll();

        let cycle = self.cycle;
        let cached = self.meshes.len();
        self.meshes.retain(|_, mesh| mesh.uploaded_cycle == cycle);
        log::debug!(
            "Submitted voxelization cycle {} ({} draws, {} stale meshes evicted)",
            self.cycle,
            self.draws.len(),
            cached - self.meshes.len()
        );
        self.draws.clear();
        Ok(())
    }
}

impl VoxelBackend for WgpuVoxelBackend {
    fn backend_name(&self) -> &'static str {
        "wgpu"
    }

    fn generate_volumes(&mut self, dimension: u32) -> Result<(), VoxelError> {
        self.volume = None;
        self.invalidate_bind_groups();
        let volume = VolumeResources::allocate(&self.context, dimension)?;
        log::info!("WgpuVoxelBackend: {dimension}^3 RGBA8 volume allocated");
        self.volume = Some(volume);
        self.voxel_count = 0;
        Ok(())
    }

    fn generate_atomic_buffer(&mut self, dimension: u32) -> Result<(), VoxelError> {
        self.accumulator = None;
        self.invalidate_bind_groups();
        let accumulator = AccumulatorResources::allocate(&self.context, dimension)?;
        log::info!(
            "WgpuVoxelBackend: accumulation buffer allocated ({} bytes)",
            accumulator.size
        );
        self.accumulator = Some(accumulator);
        Ok(())
    }

    fn release(&mut self) {
        if self.volume.is_some() || self.accumulator.is_some() {
            log::debug!("WgpuVoxelBackend: releasing voxel resources");
        }
        self.volume = None;
        self.accumulator = None;
        self.invalidate_bind_groups();
        self.encoder = None;
        self.draws.clear();
        self.region = None;
        self.validator.restart();
        self.voxel_count = 0;
    }

    fn allocated_dimension(&self) -> Option<u32> {
        match (&self.volume, &self.accumulator) {
            (Some(v), Some(a)) if v.dimension == a.dimension => Some(v.dimension),
            _ => None,
        }
    }

    fn reset_atomic_buffer(&mut self) -> Result<(), VoxelError> {
        let (Some(volume), Some(accumulator)) = (&self.volume, &self.accumulator) else {
            return Err(VoxelError::NotAllocated);
        };
        self.validator.advance(SyncStep::Reset)?;

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Voxelization Cycle Encoder"),
                });
        encoder.clear_buffer(&accumulator.buffer, 0, None);
        encoder.copy_buffer_to_buffer(
            &volume.empty_draw_args,
            0,
            &volume.draw_args,
            0,
            volume.draw_args.size(),
        );

        self.encoder = Some(encoder);
        self.draws.clear();
        self.uniforms.clear();
        self.cycle += 1;
        self.poll();
        Ok(())
    }

    fn barrier(&mut self, barrier: Barrier) -> Result<(), VoxelError> {
        self.validator.advance(SyncStep::Barrier(barrier))?;
        match barrier {
            Barrier::ResetToAccumulate => Ok(()),
            Barrier::AccumulateToResolve => self.record_voxelize_pass(),
            Barrier::ResolveToRead => self.submit_cycle(),
        }
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
        let dimension = self.allocated_dimension().ok_or(VoxelError::NotAllocated)?;
        let region = self
            .region
            .ok_or_else(|| VoxelError::Backend("draw issued before set_region".into()))?;
        self.validator.advance(SyncStep::Accumulate(self.axis))?;

        let vertex_count = self.upload_mesh(id, mesh);
        if vertex_count == 0 {
            log::trace!("Mesh {:?} has no drawable triangles", id);
            return Ok(());
        }

        let uniform_offset = self.uniforms.push(&VoxelizeUniforms {
            view_proj: self.view_proj.to_cols_array_2d(),
            model: self.model.to_cols_array_2d(),
            albedo: self.albedo,
            region: [
                region.min.x,
                region.min.y,
                region.min.z,
                region.voxel_size(),
            ],
            dimension,
            _pad: [0; 3],
        });
        self.draws.push(PendingDraw {
            uniform_offset,
            mesh: id,
            vertex_count,
        });
        Ok(())
    }

    fn resolve(&mut self) -> Result<(), VoxelError> {
        let dimension = self.allocated_dimension().ok_or(VoxelError::NotAllocated)?;
        self.validator.advance(SyncStep::Resolve)?;
        self.ensure_bind_groups()?;

        let encoder = self.encoder.as_mut().ok_or_else(Self::no_cycle)?;
        let groups = dimension.div_ceil(RESOLVE_WORKGROUP_SIZE);
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Voxel Resolve Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipelines.resolve);
        pass.set_bind_group(0, self.resolve_bind_group.as_ref(), &[]);
        pass.dispatch_workgroups(groups, groups, groups);
        Ok(())
    }

    fn draw_voxels(&mut self, view_proj: &Mat4) -> Result<DrawStats, VoxelError> {
        if self.allocated_dimension().is_none() {
            return Err(VoxelError::NotAllocated);
        }
        self.validator.advance(SyncStep::Read)?;
        self.poll();
        self.ensure_bind_groups()?;

        let region = self
            .region
            .map(|r| [r.min.x, r.min.y, r.min.z, r.voxel_size()])
            .unwrap_or([0.0, 0.0, 0.0, 1.0]);
        self.context.queue.write_buffer(
            &self.drawer_uniforms,
            0,
            bytemuck::bytes_of(&DrawerUniforms {
                view_proj: view_proj.to_cols_array_2d(),
                region,
            }),
        );

        let (Some(volume), Some(bind_group)) = (&self.volume, &self.drawer_bind_group) else {
            return Err(VoxelError::NotAllocated);
        };
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Voxel Drawer Encoder"),
                });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Voxel Drawer Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.context.get_clear_color()),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.target.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipelines.drawer);
            pass.set_bind_group(0, bind_group, &[]);
            pass.set_vertex_buffer(0, self.cube_vertices.slice(..));
            pass.set_index_buffer(self.cube_indices.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed_indirect(&volume.draw_args, 0);
        }
        self.context.queue.submit(Some(encoder.finish()));
        self.context.poll();

        Ok(DrawStats {
            instances: self.voxel_count,
        })
    }

    fn abort_cycle(&mut self) {
        if self.encoder.take().is_some() {
            log::debug!("Dropped unsubmitted voxelization cycle {}", self.cycle);
        }
        self.draws.clear();
        self.uniforms.clear();
        self.validator.abort();
    }

    fn voxel_count(&self) -> u32 {
        self.voxel_count
    }

    fn sync_log(&self) -> Option<&SyncLog> {
        Some(self.validator.log())
    }
}

impl Drop for WgpuVoxelBackend {
    fn drop(&mut self) {
        // A mapped or mapping staging buffer must settle before it is dropped.
        if self.readback.is_pending() {
            self.context.wait_idle();
            let _ = self.readback.try_collect();
        }
    }
}
