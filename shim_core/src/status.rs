use std::time::Duration;

use crate::config::TimingCfg;

/// Phase of one slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceState {
    /// No trigger seen since the slice started.
    WaitFirstTrigger,
    PreGuard,
    Apply,
    PostGuard,
    Done,
}

impl SliceState {
    /// Window the slice is in `elapsed` after its start.
    pub fn at(elapsed: Duration, timing: &TimingCfg) -> Self {
        let apply_end = timing.guard.saturating_add(timing.acquisition);
        if elapsed < timing.guard {
            Self::PreGuard
        } else if elapsed < apply_end {
            Self::Apply
        } else if elapsed < timing.slice_window() {
            Self::PostGuard
        } else {
            Self::Done
        }
    }

    /// Whether the table setpoint is driven in this state; otherwise outputs are reset.
    pub fn drives_setpoint(self) -> bool {
        self == Self::Apply
    }
}

/// Counters from one sequencer run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub slices_completed: usize,
    pub triggers: u32,
    pub resyncs: u32,
    pub applied_frames: u64,
    pub reset_frames: u64,
    pub failed_frames: u32,
}
