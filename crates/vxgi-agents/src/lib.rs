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

//! # VXGI Agents
//!
//! The control layer of the voxelization subsystem. [`VoxelRenderer`] owns a
//! backend and decides, frame by frame, whether to re-voxelize the scene or
//! only draw the existing volume.

#![warn(missing_docs)]

pub mod voxel_agent;

pub use voxel_agent::{
    SchedulerDecision, SchedulerState, UpdateScheduler, VolumeManager, VolumeState, VoxelRenderer,
};
