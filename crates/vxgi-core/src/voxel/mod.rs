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

//! Voxel-volume domain types shared by every backend.
//!
//! Everything a backend needs to agree on lives here: the axis enumeration,
//! the world-space region and its voxel mapping, the flattened volume layout,
//! the accumulator encoding used for order-independent averaging, the
//! synchronization protocol between passes, and the configuration surface.

mod axis;
mod config;
mod encoding;
mod error;
mod layout;
mod region;
mod stats;
mod sync;

pub use axis::*;
pub use config::*;
pub use encoding::*;
pub use error::*;
pub use layout::*;
pub use region::*;
pub use stats::*;
pub use sync::*;
