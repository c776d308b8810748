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

//! # Lane Abstraction
//!
//! A **Lane** is a swappable processing strategy owned by an agent. The
//! voxelization subsystem has two of them: the lane that fills the volume and
//! the lane that draws it for debugging. Each exposes its own typed
//! execution method; this base trait carries what every lane shares.

/// The base trait shared by all lanes.
pub trait Lane: Send + Sync {
    /// Human-readable name identifying this lane's strategy.
    fn strategy_name(&self) -> &'static str;
}
