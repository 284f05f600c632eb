use std::time::Duration;

/// Slice window and trigger polling parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingCfg {
    /// Reset interval before and after the apply window.
    pub guard: Duration,
    /// Length of the apply window.
    pub acquisition: Duration,
    /// Inter-trigger gap that restarts the slice window.
    pub resync_threshold: Duration,
    /// Sleep between trigger polls; zero spins.
    pub poll_interval: Duration,
    /// Abort when no trigger arrives for this long.
    pub trigger_timeout: Option<Duration>,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            guard: Duration::from_millis(2500),
            acquisition: Duration::from_secs(5),
            resync_threshold: Duration::from_secs(1),
            poll_interval: Duration::ZERO,
            trigger_timeout: None,
        }
    }
}

impl TimingCfg {
    /// Full slice length: guard, apply window, guard.
    pub fn slice_window(&self) -> Duration {
        self.guard
            .saturating_mul(2)
            .saturating_add(self.acquisition)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SafetyCfg {
    /// Abort after this many frames with failed writes; 0 never aborts.
    pub max_write_failures: u32,
}

/// Output source in dynamic mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DynamicWaveform {
    /// Table row through the preemphasis filter.
    #[default]
    Filtered,
    /// Table row as is.
    Raw,
    /// Sawtooth on every channel, for amplifier bring-up.
    Ramp,
}
