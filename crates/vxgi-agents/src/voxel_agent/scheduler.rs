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

//! Decides on which frames the volume is rebuilt.

use vxgi_core::voxel::VoxelError;

/// What the renderer should do on a given frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerDecision {
    /// Run a full voxelization cycle (then draw, if enabled).
    Voxelize,
    /// Only draw the existing volume, if enabled.
    DrawOnly,
}

/// Where the scheduler stands within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    /// Waiting for the next trigger frame.
    #[default]
    Idle,
    /// A cycle was triggered and has not finished yet.
    Voxelizing,
}

/// Throttles voxelization to every `framestep` frames.
///
/// Frame `n` voxelizes iff `n % framestep == 0`, counting from zero, so the
/// very first frame always produces a volume.
#[derive(Debug, Clone)]
pub struct UpdateScheduler {
    framestep: u32,
    frame_counter: u64,
    state: SchedulerState,
}

impl UpdateScheduler {
    /// Creates a scheduler, rejecting a zero `framestep`.
    pub fn new(framestep: u32) -> Result<Self, VoxelError> {
        let mut scheduler = Self {
            framestep: 1,
            frame_counter: 0,
            state: SchedulerState::Idle,
        };
        scheduler.set_update_frequency(framestep)?;
        Ok(scheduler)
    }

    /// Sets the interval between cycles. A zero interval is rejected and the
    /// previous value kept.
    pub fn set_update_frequency(&mut self, framestep: u32) -> Result<(), VoxelError> {
        if framestep == 0 {
            return Err(VoxelError::invalid_config("framestep", "must be at least 1"));
        }
        self.framestep = framestep;
        Ok(())
    }

    /// Current interval.
    pub fn framestep(&self) -> u32 {
        self.framestep
    }

    /// Index of the next frame [`tick`](Self::tick) will decide for.
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Current state.
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Decides for the current frame and advances the counter.
    pub fn tick(&mut self) -> SchedulerDecision {
        let frame = self.frame_counter;
        self.frame_counter = self.frame_counter.wrapping_add(1);
        if frame % u64::from(self.framestep) == 0 {
            self.state = SchedulerState::Voxelizing;
            SchedulerDecision::Voxelize
        } else {
            SchedulerDecision::DrawOnly
        }
    }

    /// Marks the triggered cycle as finished.
    pub fn finish_cycle(&mut self) {
        self.state = SchedulerState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framestep_three_schedule() {
        let mut scheduler = UpdateScheduler::new(3).unwrap();
        let decisions: Vec<_> = (0..7).map(|_| scheduler.tick()).collect();
        use SchedulerDecision::*;
        assert_eq!(
            decisions,
            vec![Voxelize, DrawOnly, DrawOnly, Voxelize, DrawOnly, DrawOnly, Voxelize]
        );
    }

    #[test]
    fn test_zero_framestep_keeps_previous_value() {
        let mut scheduler = UpdateScheduler::new(2).unwrap();
        let err = scheduler.set_update_frequency(0).unwrap_err();
        assert!(matches!(err, VoxelError::InvalidConfig { field: "framestep", .. }));
        assert_eq!(scheduler.framestep(), 2);
        assert!(UpdateScheduler::new(0).is_err());
    }

    #[test]
    fn test_state_transitions() {
        let mut scheduler = UpdateScheduler::new(2).unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.tick(), SchedulerDecision::Voxelize);
        assert_eq!(scheduler.state(), SchedulerState::Voxelizing);
        scheduler.finish_cycle();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.tick(), SchedulerDecision::DrawOnly);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.frame_counter(), 2);
    }
}
