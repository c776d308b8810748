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

//! Backend-agnostic rendering contracts of the voxelization subsystem.
//!
//! [`Renderer`] is the high-level contract every renderer kind fulfils so a
//! host can swap them behind a `Box<dyn Renderer>`. [`VoxelBackend`] is the
//! lower-level command surface the voxelization lanes drive; concrete
//! implementations live in `vxgi-lanes` (CPU reference) and `vxgi-infra`
//! (wgpu).

pub mod traits;

pub use self::traits::{Renderer, VoxelBackend};
