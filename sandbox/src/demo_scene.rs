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

//! Procedural test scene: a floor, a few pillars and a cube orbiting them.

use vxgi_core::math::{LinearRgba, Mat4, Vec3};
use vxgi_core::scene::{Material, MeshData, Scene, SceneNode, SceneProvider};

const ORBIT_RADIUS: f32 = 5.0;
const ORBIT_SPEED: f32 = 0.15;

/// The scene and the index of its animated node.
pub struct DemoScene {
    pub scene: Scene,
    orbiter: usize,
}

impl DemoScene {
    pub fn build() -> Self {
        let mut scene = Scene::new();

        let floor = scene.add_mesh(MeshData::cuboid(
            Vec3::new(-8.0, -0.5, -8.0),
            Vec3::new(8.0, 0.0, 8.0),
        ));
        let pillar = scene.add_mesh(MeshData::cuboid(
            Vec3::new(-0.5, 0.0, -0.5),
            Vec3::new(0.5, 4.0, 0.5),
        ));
        let cube = scene.add_mesh(MeshData::cuboid(Vec3::splat(-0.5), Vec3::splat(0.5)));

        let grey = scene.add_material(Material::new(LinearRgba::rgb(0.6, 0.6, 0.6)));
        let pillar_colors = [
            LinearRgba::RED,
            LinearRgba::GREEN,
            LinearRgba::BLUE,
            LinearRgba::new(1.0, 0.8, 0.1, 1.0),
        ];
        let orbiter_color = scene.add_material(Material::new(LinearRgba::WHITE));

        scene.add_node(SceneNode {
            mesh: floor,
            material: grey,
            transform: Mat4::IDENTITY,
        });
        for (i, color) in pillar_colors.into_iter().enumerate() {
            let angle = i as f32 * std::f32::consts::FRAC_PI_2;
            let material = scene.add_material(Material::new(color));
            scene.add_node(SceneNode {
                mesh: pillar,
                material,
                transform: Mat4::from_translation(Vec3::new(
                    3.0 * angle.cos(),
                    0.0,
                    3.0 * angle.sin(),
                )),
            });
        }

        let orbiter = scene.nodes().len();
        scene.add_node(SceneNode {
            mesh: cube,
            material: orbiter_color,
            transform: orbit_transform(0),
        });

        Self { scene, orbiter }
    }

    /// Moves the orbiting cube to its position at `frame`.
    pub fn animate(&mut self, frame: u64) {
        if let Some(node) = self.scene.node_mut(self.orbiter) {
            node.transform = orbit_transform(frame);
        }
        self.scene.refresh_bounds();
    }
}

fn orbit_transform(frame: u64) -> Mat4 {
    let angle = frame as f32 * ORBIT_SPEED;
    Mat4::from_translation(Vec3::new(
        ORBIT_RADIUS * angle.cos(),
        2.0,
        ORBIT_RADIUS * angle.sin(),
    ))
}
