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

//! The scene interface the voxelizer consumes.
//!
//! Scene loading, asset management and hierarchy evaluation live elsewhere;
//! the voxelizer only needs flattened nodes with world transforms, their
//! meshes and materials, and the scene's bounding box.

mod mesh;

pub use mesh::MeshData;

use crate::math::{Aabb, LinearRgba, Mat4};
use serde::{Deserialize, Serialize};

/// Identifies a mesh inside a [`SceneProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeshId(pub u32);

/// Identifies a material inside a [`SceneProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialId(pub u32);

/// Surface parameters written into each voxel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Material {
    /// Base color. Alpha is the opacity stored in the volume.
    pub albedo: LinearRgba,
}

impl Material {
    /// Creates a material with the given albedo.
    pub const fn new(albedo: LinearRgba) -> Self {
        Self { albedo }
    }
}

/// A drawable instance: one mesh, one material, one world transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneNode {
    /// Geometry to draw.
    pub mesh: MeshId,
    /// Material to draw it with.
    pub material: MaterialId,
    /// Model-to-world transform.
    pub transform: Mat4,
}

/// Read-only view of a scene.
pub trait SceneProvider {
    /// World-space box enclosing every node. [`Aabb::INVALID`] when empty.
    fn bounding_box(&self) -> Aabb;

    /// Nodes in draw order.
    fn nodes(&self) -> &[SceneNode];

    /// Looks up a material.
    fn material(&self, id: MaterialId) -> Option<&Material>;

    /// Looks up a mesh.
    fn mesh(&self, id: MeshId) -> Option<&MeshData>;
}

/// A simple in-memory scene.
///
/// The bounding box is maintained incrementally as nodes are added.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    meshes: Vec<MeshData>,
    materials: Vec<Material>,
    nodes: Vec<SceneNode>,
    bounds: Option<Aabb>,
}

impl Scene {
    /// Creates an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a mesh and returns its id.
    pub fn add_mesh(&mut self, mesh: MeshData) -> MeshId {
        self.meshes.push(mesh);
        MeshId((self.meshes.len() - 1) as u32)
    }

    /// Registers a material and returns its id.
    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        MaterialId((self.materials.len() - 1) as u32)
    }

    /// Appends a node. Nodes whose mesh is unknown still draw (and are
    /// reported by the voxelizer) but do not contribute to the bounds.
    pub fn add_node(&mut self, node: SceneNode) {
        if let Some(local) = self.mesh(node.mesh).and_then(MeshData::bounds) {
            let world = local.transform(&node.transform);
            self.bounds = Some(match self.bounds {
                Some(b) => b.merge(&world),
                None => world,
            });
        }
        self.nodes.push(node);
    }

    /// Mutable access to a node, e.g. to animate it.
    ///
    /// The bounds are recomputed from scratch on the next call to
    /// [`Scene::refresh_bounds`].
    pub fn node_mut(&mut self, index: usize) -> Option<&mut SceneNode> {
        self.nodes.get_mut(index)
    }

    /// Recomputes the bounding box from every node.
    pub fn refresh_bounds(&mut self) {
        let meshes = &self.meshes;
        self.bounds = self
            .nodes
            .iter()
            .filter_map(|node| {
                meshes
                    .get(node.mesh.0 as usize)
                    .and_then(MeshData::bounds)
                    .map(|b| b.transform(&node.transform))
            })
            .reduce(|a, b| a.merge(&b));
    }
}

impl SceneProvider for Scene {
    fn bounding_box(&self) -> Aabb {
        self.bounds.unwrap_or(Aabb::INVALID)
    }

    fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0 as usize)
    }

    fn mesh(&self, id: MeshId) -> Option<&MeshData> {
        self.meshes.get(id.0 as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;

    #[test]
    fn test_empty_scene_has_invalid_bounds() {
        let scene = Scene::new();
        assert!(!scene.bounding_box().is_valid());
        assert!(scene.nodes().is_empty());
    }

    #[test]
    fn test_bounds_follow_node_transforms() {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(MeshData::cuboid(Vec3::ZERO, Vec3::ONE));
        let material = scene.add_material(Material::new(LinearRgba::RED));
        scene.add_node(SceneNode {
            mesh,
            material,
            transform: Mat4::IDENTITY,
        });
        scene.add_node(SceneNode {
            mesh,
            material,
            transform: Mat4::from_translation(Vec3::new(4.0, 0.0, 0.0)),
        });

        let b = scene.bounding_box();
        assert_eq!(b.min, Vec3::ZERO);
        assert_eq!(b.max, Vec3::new(5.0, 1.0, 1.0));

        scene.node_mut(1).unwrap().transform = Mat4::IDENTITY;
        scene.refresh_bounds();
        assert_eq!(scene.bounding_box().max, Vec3::ONE);
    }

    #[test]
    fn test_lookups() {
        let mut scene = Scene::new();
        let material = scene.add_material(Material::new(LinearRgba::GREEN));
        assert_eq!(scene.material(material).unwrap().albedo, LinearRgba::GREEN);
        assert!(scene.material(MaterialId(7)).is_none());
        assert!(scene.mesh(MeshId(0)).is_none());
    }
}
