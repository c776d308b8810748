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

// VXGI Sandbox
// Voxelizes a procedural scene for a number of frames and reports the volume.

mod demo_scene;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use demo_scene::DemoScene;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vxgi_agents::VoxelRenderer;
use vxgi_core::voxel::VoxelConfig;
use vxgi_core::{Renderer, VoxelBackend};
use vxgi_infra::{WgpuGraphicsContext, WgpuVoxelBackend};
use vxgi_lanes::SoftwareVoxelBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    /// CPU reference rasterizer
    Software,
    /// GPU passes through wgpu
    Wgpu,
}

#[derive(Debug, Parser)]
#[command(name = "sandbox", about = "Voxelize a procedural scene and report the volume")]
struct Cli {
    /// Voxelization backend
    #[arg(long, value_enum, default_value_t = BackendKind::Software)]
    backend: BackendKind,
    /// Number of frames to render
    #[arg(long, default_value_t = 12)]
    frames: u64,
    /// JSON configuration file (VoxelConfig)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the volume dimension
    #[arg(long)]
    dimension: Option<u32>,
    /// Override the voxelization interval in frames
    #[arg(long)]
    framestep: Option<u32>,
    /// Run the debug drawer every frame
    #[arg(long)]
    show_voxels: bool,
    /// Write a PNG of the result: the drawer target on wgpu, a top-down
    /// view of the volume on the software backend
    #[arg(long)]
    capture: Option<PathBuf>,
    /// Write the effective configuration to this file
    #[arg(long)]
    save_config: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> Result<VoxelConfig> {
    let mut config = match &cli.config {
        Some(path) => VoxelConfig::from_file(path)
            .map_err(|e| anyhow!("Failed to load {}: {e}", path.display()))?,
        None => VoxelConfig::default(),
    };
    if let Some(dimension) = cli.dimension {
        config.volume_dimension = dimension;
    }
    if let Some(framestep) = cli.framestep {
        config.framestep = framestep;
    }
    config.show_voxels |= cli.show_voxels;
    config.validate()?;

    if let Some(path) = &cli.save_config {
        config
            .to_file(path)
            .map_err(|e| anyhow!("Failed to write {}: {e}", path.display()))?;
        log::info!("Configuration written to {}", path.display());
    }
    Ok(config)
}

/// Renders `frames` frames, animating the scene in between.
fn run<B: VoxelBackend>(
    renderer: &mut VoxelRenderer<B>,
    demo: &mut DemoScene,
    frames: u64,
    mut after_frame: impl FnMut(&mut VoxelRenderer<B>),
) -> Result<()> {
    for frame in 0..frames {
        demo.animate(frame);
        renderer
            .render(&demo.scene)
            .with_context(|| format!("Frame {frame} failed"))?;
        after_frame(renderer);

        let stats = renderer.stats();
        if stats.last_cycle_frame == Some(frame) {
            log::info!(
                "Frame {frame}: voxelized in {:.2?}, {} voxels",
                stats.last_cycle_duration.unwrap_or_default(),
                stats.voxel_count
            );
        } else {
            log::debug!("Frame {frame}: draw only");
        }
    }
    Ok(())
}

fn save_png(path: &Path, width: u32, height: u32, rgba: Vec<u8>) -> Result<()> {
    let image = image::RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| anyhow!("Capture size does not match {width}x{height}"))?;
    image
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Capture written to {}", path.display());
    Ok(())
}

/// Top-down view of the volume: the highest non-empty voxel of each column.
fn top_down_view(backend: &SoftwareVoxelBackend, dimension: u32) -> Vec<u8> {
    let mut rgba = Vec::with_capacity((dimension * dimension * 4) as usize);
    for z in 0..dimension {
        for x in 0..dimension {
            let color = (0..dimension)
                .rev()
                .filter_map(|y| backend.voxel([x, y, z]))
                .find(|c| c[3] > 0)
                .unwrap_or([0, 0, 0, 255]);
            rgba.extend_from_slice(&color);
        }
    }
    rgba
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let mut demo = DemoScene::build();

    match cli.backend {
        BackendKind::Software => {
            let mut renderer = VoxelRenderer::new(SoftwareVoxelBackend::new(), config)?;
            run(&mut renderer, &mut demo, cli.frames, |_| {})?;
            log::info!(
                "{}: {} voxels after {} cycles",
                renderer.name(),
                renderer.voxel_count(),
                renderer.stats().cycles_run
            );
            if let Some(path) = &cli.capture {
                let d = renderer.config().volume_dimension;
                save_png(path, d, d, top_down_view(renderer.backend(), d))?;
            }
        }
        BackendKind::Wgpu => {
            let context = Arc::new(WgpuGraphicsContext::new_blocking()?);
            let backend = WgpuVoxelBackend::new(context, config.drawer_target)?;
            let mut renderer = VoxelRenderer::new(backend, config)?;
            run(&mut renderer, &mut demo, cli.frames, |r| r.backend_mut().poll())?;
            renderer.backend_mut().wait_idle();
            log::info!(
                "{}: {} voxels after {} cycles",
                renderer.name(),
                renderer.voxel_count(),
                renderer.stats().cycles_run
            );
            if let Some(path) = &cli.capture {
                let capture = renderer.backend().read_drawer_target()?;
                save_png(path, capture.width, capture.height, capture.rgba)?;
            }
        }
    }
    Ok(())
}
