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

//! Ordering protocol between the reset, accumulate, resolve and read steps.
//!
//! A cycle always runs
//!
//! ```text
//! Reset -> ResetToAccumulate -> Accumulate(X|Y|Z)* -> AccumulateToResolve
//!       -> Resolve -> ResolveToRead -> Read*
//! ```
//!
//! Backends map each [`Barrier`] onto whatever their API needs (a pass
//! boundary on wgpu, nothing at all on the CPU). [`SyncValidator`] enforces
//! the order and keeps a [`SyncLog`] of the current cycle.

use super::{Axis, VoxelError};
use log::warn;
use std::fmt;

/// A memory dependency between two voxelization steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Barrier {
    /// The cleared accumulator must be visible to the accumulate draws.
    ResetToAccumulate,
    /// Every atomic add must be visible to the resolve step.
    AccumulateToResolve,
    /// The resolved volume must be visible to readers (drawer, GI lookups).
    ResolveToRead,
}

/// Where a voxelization cycle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CyclePhase {
    /// No cycle has run yet.
    #[default]
    Idle,
    /// The accumulator was cleared.
    Reset,
    /// Draws may accumulate.
    Accumulating,
    /// Accumulation is complete; resolve may run.
    Resolving,
    /// The volume has been written but is not yet visible to readers.
    Resolved,
    /// The volume may be read.
    Readable,
}

/// One observable step of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStep {
    /// Clear the accumulator.
    Reset,
    /// A barrier between two steps.
    Barrier(Barrier),
    /// A draw accumulating into the buffer from one axis.
    Accumulate(Axis),
    /// Average the accumulator into the volume.
    Resolve,
    /// A read of the resolved volume.
    Read,
}

impl fmt::Display for Barrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStep::Reset => write!(f, "Reset"),
            SyncStep::Barrier(b) => write!(f, "Barrier({b})"),
            SyncStep::Accumulate(axis) => write!(f, "Accumulate({axis})"),
            SyncStep::Resolve => write!(f, "Resolve"),
            SyncStep::Read => write!(f, "Read"),
        }
    }
}

/// Ordered record of the steps issued since the last reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncLog {
    steps: Vec<SyncStep>,
}

impl SyncLog {
    /// Steps in issue order.
    pub fn steps(&self) -> &[SyncStep] {
        &self.steps
    }

    /// Position of the first occurrence of `step`.
    pub fn position(&self, step: SyncStep) -> Option<usize> {
        self.steps.iter().position(|s| *s == step)
    }

    /// Returns `true` if `first` was issued before every occurrence of `then`.
    pub fn precedes(&self, first: SyncStep, then: SyncStep) -> bool {
        match (self.position(first), self.position(then)) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        }
    }

    fn push(&mut self, step: SyncStep) {
        self.steps.push(step);
    }

    fn clear(&mut self) {
        self.steps.clear();
    }
}

/// Tracks the cycle phase and rejects steps issued out of order.
#[derive(Debug, Clone, Default)]
pub struct SyncValidator {
    phase: CyclePhase,
    log: SyncLog,
    /// Set once a cycle has reached [`CyclePhase::Readable`].
    resolved: bool,
}

impl SyncValidator {
    /// Creates a validator in [`CyclePhase::Idle`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// Steps issued since the last reset.
    pub fn log(&self) -> &SyncLog {
        &self.log
    }

    /// Forgets any partial cycle, e.g. after the resources were recreated.
    pub fn restart(&mut self) {
        self.phase = CyclePhase::Idle;
        self.log.clear();
        self.resolved = false;
    }

    /// Drops a partial cycle and returns to the last readable phase:
    /// [`CyclePhase::Readable`] if a cycle ever resolved, otherwise
    /// [`CyclePhase::Idle`].
    pub fn abort(&mut self) {
        if matches!(self.phase, CyclePhase::Idle | CyclePhase::Readable) {
            return;
        }
        warn!("Aborting voxelization cycle in {:?}", self.phase);
        self.phase = if self.resolved {
            CyclePhase::Readable
        } else {
            CyclePhase::Idle
        };
        self.log.clear();
    }

    /// Validates and records `step`, advancing the phase.
    pub fn advance(&mut self, step: SyncStep) -> Result<(), VoxelError> {
        use CyclePhase as P;

        let next = match (self.phase, step) {
            (P::Idle | P::Readable, SyncStep::Reset) => P::Reset,
            // A failed cycle is abandoned by the next reset.
            (phase, SyncStep::Reset) => {
                warn!("Abandoning voxelization cycle stuck in {phase:?}");
                P::Reset
            }
            (P::Reset, SyncStep::Barrier(Barrier::ResetToAccumulate)) => P::Accumulating,
            (P::Accumulating, SyncStep::Accumulate(_)) => P::Accumulating,
            (P::Accumulating, SyncStep::Barrier(Barrier::AccumulateToResolve)) => P::Resolving,
            (P::Resolving, SyncStep::Resolve) => P::Resolved,
            (P::Resolved, SyncStep::Barrier(Barrier::ResolveToRead)) => P::Readable,
            // Reading before the first cycle sees the cleared volume.
            (P::Idle | P::Readable, SyncStep::Read) => self.phase,
            (phase, step) => return Err(VoxelError::OrderingViolation { step, phase }),
        };

        self.phase = next;
        match step {
            SyncStep::Reset => self.log.clear(),
            // Repeated reads are recorded once per cycle.
            SyncStep::Read if self.log.steps.last() == Some(&SyncStep::Read) => return Ok(()),
            _ => {}
        }
        if next == CyclePhase::Readable {
            self.resolved = true;
        }
        self.log.push(step);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_cycle(v: &mut SyncValidator) -> Result<(), VoxelError> {
        v.advance(SyncStep::Reset)?;
        v.advance(SyncStep::Barrier(Barrier::ResetToAccumulate))?;
        for axis in Axis::ALL {
            v.advance(SyncStep::Accumulate(axis))?;
        }
        v.advance(SyncStep::Barrier(Barrier::AccumulateToResolve))?;
        v.advance(SyncStep::Resolve)?;
        v.advance(SyncStep::Barrier(Barrier::ResolveToRead))
    }

    #[test]
    fn test_full_cycle_is_accepted() {
        let mut v = SyncValidator::new();
        run_cycle(&mut v).unwrap();
        assert_eq!(v.phase(), CyclePhase::Readable);
        v.advance(SyncStep::Read).unwrap();
        assert!(v.log().precedes(SyncStep::Reset, SyncStep::Accumulate(Axis::X)));
        assert!(v.log().precedes(SyncStep::Resolve, SyncStep::Read));

        // A second cycle starts a fresh log.
        run_cycle(&mut v).unwrap();
        assert_eq!(v.log().steps()[0], SyncStep::Reset);
        assert_eq!(v.log().steps().len(), 8);
    }

    #[test]
    fn test_accumulate_without_reset_is_rejected() {
        let mut v = SyncValidator::new();
        let err = v.advance(SyncStep::Accumulate(Axis::Y)).unwrap_err();
        assert_eq!(
            err,
            VoxelError::OrderingViolation {
                step: SyncStep::Accumulate(Axis::Y),
                phase: CyclePhase::Idle,
            }
        );
    }

    #[test]
    fn test_read_mid_cycle_is_rejected() {
        let mut v = SyncValidator::new();
        v.advance(SyncStep::Reset).unwrap();
        v.advance(SyncStep::Barrier(Barrier::ResetToAccumulate)).unwrap();
        assert!(v.advance(SyncStep::Read).is_err());
        assert!(v.advance(SyncStep::Resolve).is_err());
        // A failed step leaves the phase untouched.
        assert_eq!(v.phase(), CyclePhase::Accumulating);
    }

    #[test]
    fn test_restart_returns_to_idle() {
        let mut v = SyncValidator::new();
        v.advance(SyncStep::Reset).unwrap();
        v.restart();
        assert_eq!(v.phase(), CyclePhase::Idle);
        assert!(v.log().steps().is_empty());
    }

    #[test]
    fn test_repeated_reads_are_logged_once() {
        let mut v = SyncValidator::new();
        run_cycle(&mut v).unwrap();
        for _ in 0..1_000 {
            v.advance(SyncStep::Read).unwrap();
        }
        assert_eq!(v.log().steps().len(), 9);
        assert_eq!(v.log().steps().last(), Some(&SyncStep::Read));
    }

    #[test]
    fn test_abort_returns_to_last_readable_phase() {
        let mut v = SyncValidator::new();
        v.advance(SyncStep::Reset).unwrap();
        v.advance(SyncStep::Barrier(Barrier::ResetToAccumulate)).unwrap();
        v.abort();
        assert_eq!(v.phase(), CyclePhase::Idle);
        assert!(v.log().steps().is_empty());

        run_cycle(&mut v).unwrap();
        v.advance(SyncStep::Reset).unwrap();
        v.advance(SyncStep::Barrier(Barrier::ResetToAccumulate)).unwrap();
        v.advance(SyncStep::Accumulate(Axis::Z)).unwrap();
        v.abort();
        assert_eq!(v.phase(), CyclePhase::Readable);
        v.advance(SyncStep::Read).unwrap();
    }

    #[test]
    fn test_abort_keeps_a_finished_cycle() {
        let mut v = SyncValidator::new();
        run_cycle(&mut v).unwrap();
        v.abort();
        assert_eq!(v.phase(), CyclePhase::Readable);
        assert_eq!(v.log().steps().len(), 8);
    }

    #[test]
    fn test_reset_abandons_a_partial_cycle() {
        let mut v = SyncValidator::new();
        v.advance(SyncStep::Reset).unwrap();
        v.advance(SyncStep::Barrier(Barrier::ResetToAccumulate)).unwrap();
        v.advance(SyncStep::Accumulate(Axis::Y)).unwrap();

        v.advance(SyncStep::Reset).unwrap();
        assert_eq!(v.phase(), CyclePhase::Reset);
        assert_eq!(v.log().steps(), &[SyncStep::Reset]);
        run_cycle(&mut v).unwrap();
        assert_eq!(v.phase(), CyclePhase::Readable);
    }
}
