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

use crate::scene::{Material, SceneNode, SceneProvider};
use crate::voxel::VoxelError;

/// A renderer the host drives once per frame.
///
/// The two uniform setters are the per-node hooks a renderer exposes while it
/// walks the scene: the owning pass calls them before every draw, and a
/// renderer may also be driven manually through them.
pub trait Renderer: Send {
    /// Human-readable name, used for logging.
    fn name(&self) -> &'static str;

    /// Renders one frame of `scene`.
    fn render(&mut self, scene: &dyn SceneProvider) -> Result<(), VoxelError>;

    /// Uploads the transforms for drawing `node`.
    fn set_matrices_uniforms(&mut self, node: &SceneNode) -> Result<(), VoxelError>;

    /// Uploads the parameters of `material` for the next draw.
    fn set_material_uniforms(&mut self, material: &Material) -> Result<(), VoxelError>;
}
