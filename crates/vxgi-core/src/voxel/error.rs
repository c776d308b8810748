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

use super::{CyclePhase, SyncStep};
use std::fmt;

/// Errors raised by the voxelization subsystem.
#[derive(Debug, Clone, PartialEq)]
pub enum VoxelError {
    /// A configuration value was rejected.
    InvalidConfig {
        /// Name of the offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
    /// The backend could not allocate a voxel resource.
    Allocation {
        /// The resource being allocated ("volume", "accumulator", ...).
        resource: &'static str,
        /// Backend-specific details.
        details: String,
    },
    /// The volume or accumulator has not been allocated, or a previous
    /// allocation failure disabled the subsystem.
    NotAllocated,
    /// A pass was issued out of order.
    OrderingViolation {
        /// The step that was attempted.
        step: SyncStep,
        /// The phase the cycle was in.
        phase: CyclePhase,
    },
    /// A node referenced a mesh or material the scene does not provide.
    MissingResource(String),
    /// Any other backend failure.
    Backend(String),
}

impl VoxelError {
    /// Shorthand for [`VoxelError::InvalidConfig`].
    pub fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        VoxelError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors that leave the subsystem disabled.
    pub fn is_allocation_failure(&self) -> bool {
        matches!(self, VoxelError::Allocation { .. })
    }
}

impl fmt::Display for VoxelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoxelError::InvalidConfig { field, reason } => {
                write!(f, "Invalid voxel configuration for '{field}': {reason}")
            }
            VoxelError::Allocation { resource, details } => {
                write!(f, "Failed to allocate voxel {resource}: {details}")
            }
            VoxelError::NotAllocated => {
                write!(f, "Voxel resources are not allocated.")
            }
            VoxelError::OrderingViolation { step, phase } => {
                write!(f, "Voxelization step '{step}' issued during phase '{phase}'")
            }
            VoxelError::MissingResource(what) => write!(f, "Missing scene resource: {what}"),
            VoxelError::Backend(msg) => write!(f, "Voxel backend failure: {msg}"),
        }
    }
}

impl std::error::Error for VoxelError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxel::Barrier;

    #[test]
    fn test_display_messages() {
        let err = VoxelError::invalid_config("framestep", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "Invalid voxel configuration for 'framestep': must be at least 1"
        );

        let err = VoxelError::OrderingViolation {
            step: SyncStep::Barrier(Barrier::AccumulateToResolve),
            phase: CyclePhase::Idle,
        };
        assert!(err.to_string().contains("AccumulateToResolve"));
    }

    #[test]
    fn test_allocation_failure_classification() {
        let err = VoxelError::Allocation {
            resource: "volume",
            details: "out of memory".into(),
        };
        assert!(err.is_allocation_failure());
        assert!(!VoxelError::NotAllocated.is_allocation_failure());
    }
}
