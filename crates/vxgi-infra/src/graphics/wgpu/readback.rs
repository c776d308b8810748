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

//! GPU to host transfers: the asynchronous voxel-count readback and the
//! blocking texture captures used for debugging.

use super::context::WgpuGraphicsContext;
use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

/// Bytes copied out of the draw arguments: `index_count` and `instance_count`.
const COUNT_READBACK_SIZE: u64 = 8;

/// A tightly packed RGBA8 image read back from the GPU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawerCapture {
    pub width: u32,
    pub height: u32,
    /// Row-major pixels, 4 bytes each, no row padding.
    pub rgba: Vec<u8>,
}

/// Frame-lagged readback of the instance counter written by the resolve pass.
///
/// The count of a cycle becomes visible once its staging buffer has been
/// mapped. While a map is in flight further copies are skipped, so a slow
/// readback only delays the count and never stalls the render thread.
#[derive(Debug)]
pub(crate) struct CountReadback {
    staging: wgpu::Buffer,
    ready: Arc<AtomicBool>,
    pending: bool,
    copied: bool,
}

impl CountReadback {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            staging: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Voxel Count Staging Buffer"),
                size: COUNT_READBACK_SIZE,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            ready: Arc::new(AtomicBool::new(false)),
            pending: false,
            copied: false,
        }
    }

    /// Records the copy of the counter into the staging buffer, unless a
    /// previous readback is still in flight.
    pub fn record_copy(&mut self, encoder: &mut wgpu::CommandEncoder, draw_args: &wgpu::Buffer) {
        if self.pending {
            log::trace!("Voxel count readback still in flight, skipping this cycle.");
            return;
        }
        encoder.copy_buffer_to_buffer(draw_args, 0, &self.staging, 0, COUNT_READBACK_SIZE);
        self.copied = true;
    }

    /// Starts mapping the staging buffer. Must follow the submission that
    /// contains the copy.
    pub fn schedule_map(&mut self) {
        if !self.copied {
            return;
        }
        self.copied = false;
        self.pending = true;

        let flag = self.ready.clone();
        flag.store(false, Ordering::SeqCst);
        self.staging
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |res| {
                if let Err(e) = res {
                    log::error!("Voxel count staging map_async failed: {:?}", e);
                }
                flag.store(true, Ordering::SeqCst);
            });
    }

    /// Returns the count once the mapping has completed.
    pub fn try_collect(&mut self) -> Option<u32> {
        if !self.pending || !self.ready.load(Ordering::SeqCst) {
            return None;
        }
        self.pending = false;

        let data = self.staging.slice(..).get_mapped_range();
        let [_, instance_count]: [u32; 2] =
            bytemuck::pod_read_unaligned(&data[..COUNT_READBACK_SIZE as usize]);
        drop(data);
        self.staging.unmap();
        Some(instance_count)
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}

/// Copies a whole RGBA8 texture (2D or 3D) to the host, blocking until the
/// transfer has finished. Slices of a 3D texture follow each other.
pub(crate) fn read_rgba8_texture(
    context: &WgpuGraphicsContext,
    texture: &wgpu::Texture,
) -> Result<Vec<u8>> {
    let extent = texture.size();
    let depth = match texture.dimension() {
        wgpu::TextureDimension::D3 => extent.depth_or_array_layers,
        _ => 1,
    };
    let row_bytes = extent.width * 4;
    let padded_row_bytes = row_bytes.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
        * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let size = padded_row_bytes as u64 * extent.height as u64 * depth as u64;

    let device = &context.device;
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Texture Capture Staging Buffer"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Texture Capture Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row_bytes),
                rows_per_image: Some(extent.height),
            },
        },
        wgpu::Extent3d {
            width: extent.width,
            height: extent.height,
            depth_or_array_layers: depth,
        },
    );
    context.queue.submit(Some(encoder.finish()));

    let (sender, receiver) = mpsc::channel();
    staging
        .slice(..)
        .map_async(wgpu::MapMode::Read, move |res| {
            let _ = sender.send(res);
        });
    context.wait_idle();
    receiver
        .recv()
        .map_err(|e| anyhow!("Texture capture callback dropped: {}", e))?
        .map_err(|e| anyhow!("Texture capture map failed: {}", e))?;

    let data = staging.slice(..).get_mapped_range();
    let mut pixels =
        Vec::with_capacity(row_bytes as usize * extent.height as usize * depth as usize);
    for row in data.chunks_exact(padded_row_bytes as usize) {
        pixels.extend_from_slice(&row[..row_bytes as usize]);
    }
    drop(data);
    staging.unmap();
    Ok(pixels)
}
