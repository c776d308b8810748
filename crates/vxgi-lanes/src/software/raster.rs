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

//! Conservative triangle rasterization on a square voxel raster.
//!
//! A pixel is covered when its unit square overlaps the triangle. Each edge
//! function is offset by half the L1 length of its gradient (the largest
//! amount it can change between the pixel centre and a pixel corner), and the
//! candidate pixels are limited to those overlapping the triangle's 2D bounds.
//! That combination over-estimates coverage only near acute corners; the world
//! positions handed out are clamped to the triangle's 3D bounds so those
//! extra fragments never land outside it.

use vxgi_core::math::{Aabb, Vec2, Vec3};

/// Projected areas at or below this are treated as degenerate.
pub const MIN_PROJECTED_AREA: f32 = 1e-8;

/// A triangle ready for rasterization: pixel-space positions plus the world
/// positions interpolated across it.
#[derive(Debug, Clone, Copy)]
pub struct RasterTriangle {
    /// Positions in pixel units, `y` down.
    pub screen: [Vec2; 3],
    /// World-space positions of the same vertices.
    pub world: [Vec3; 3],
}

#[inline]
fn edge_function(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (c.x - a.x) * (b.y - a.y) - (c.y - a.y) * (b.x - a.x)
}

/// Rasterizes `tri` into a `size × size` raster, calling `emit` with the
/// pixel and the clamped world position of every conservatively covered
/// pixel. Returns the number of fragments emitted.
pub fn rasterize_conservative<F>(tri: &RasterTriangle, size: u32, mut emit: F) -> usize
where
    F: FnMut([u32; 2], Vec3),
{
    let [p0, mut p1, mut p2] = tri.screen;
    let [w0_world, mut w1_world, mut w2_world] = tri.world;

    let mut area = edge_function(p0, p1, p2);
    if !area.is_finite() || area.abs() <= MIN_PROJECTED_AREA {
        return 0;
    }
    // Both windings are voxelized.
    if area < 0.0 {
        std::mem::swap(&mut p1, &mut p2);
        std::mem::swap(&mut w1_world, &mut w2_world);
        area = -area;
    }
    let inv_area = 1.0 / area;

    let world_bounds = Aabb::from_min_max(
        w0_world.min(w1_world).min(w2_world),
        w0_world.max(w1_world).max(w2_world),
    );

    let size_f = size as f32;
    let min_x = p0.x.min(p1.x).min(p2.x);
    let max_x = p0.x.max(p1.x).max(p2.x);
    let min_y = p0.y.min(p1.y).min(p2.y);
    let max_y = p0.y.max(p1.y).max(p2.y);
    if max_x < 0.0 || max_y < 0.0 || min_x >= size_f || min_y >= size_f {
        return 0;
    }

    // Pixels whose square [x, x+1) overlaps [min, max].
    let x_start = min_x.floor().max(0.0) as u32;
    let y_start = min_y.floor().max(0.0) as u32;
    let x_end = (max_x.ceil() as u32).clamp(x_start + 1, size);
    let y_end = (max_y.ceil() as u32).clamp(y_start + 1, size);

    // (w0 at p1->p2, w1 at p2->p0, w2 at p0->p1) and their conservative slack.
    let edges = [(p1, p2), (p2, p0), (p0, p1)];
    let slack = edges.map(|(a, b)| 0.5 * ((b.y - a.y).abs() + (b.x - a.x).abs()));

    let mut emitted = 0;
    for y in y_start..y_end {
        for x in x_start..x_end {
            let c = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let w = [
                edge_function(edges[0].0, edges[0].1, c),
                edge_function(edges[1].0, edges[1].1, c),
                edge_function(edges[2].0, edges[2].1, c),
            ];
            if w.iter().zip(slack.iter()).any(|(w, s)| *w < -*s) {
                continue;
            }

            let b = w.map(|w| w * inv_area);
            let world = (w0_world * b[0] + w1_world * b[1] + w2_world * b[2])
                .clamp(world_bounds.min, world_bounds.max);
            emit([x, y], world);
            emitted += 1;
        }
    }
    emitted
}
