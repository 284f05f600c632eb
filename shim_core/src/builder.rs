//! Type-state builder for `ShimSequencer` and generic `build_sequencer` constructor.
//!
//! The builder enforces at compile time that a DAC, a shim table and a trigger
//! clock are provided before `build()` is available. `try_build()` is always
//! available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use shim_traits::Dac;
use shim_traits::clock::{Clock, MonotonicClock};

use crate::config::{SafetyCfg, TimingCfg};
use crate::error::{BuildError, Result};
use crate::output::DacOutput;
use crate::preemphasis::{FilterCoefficients, PreemphasisEngine};
use crate::routing::{ChannelRouter, DEFAULT_ORDER, channel_count, filter_channel_count};
use crate::sequencer::ShimSequencer;
use crate::table::ShimTable;
use crate::trigger::TriggerClock;

/// Sequencer over a boxed DAC, as produced by the builder.
pub type DynSequencer = ShimSequencer<Box<dyn Dac + Send>>;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `ShimSequencer`. Markers track DAC, table and trigger.
pub struct ShimSequencerBuilder<D, T, G> {
    dac: Option<Box<dyn Dac + Send>>,
    table: Option<ShimTable>,
    trigger: Option<TriggerClock>,
    filter: Option<FilterCoefficients>,
    channel_order: Option<Vec<usize>>,
    timing: Option<TimingCfg>,
    safety: Option<SafetyCfg>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    stop: Option<Arc<AtomicBool>>,
    estimated_tr: Option<Duration>,
    _d: PhantomData<D>,
    _t: PhantomData<T>,
    _g: PhantomData<G>,
}

impl Default for ShimSequencerBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            dac: None,
            table: None,
            trigger: None,
            filter: None,
            channel_order: None,
            timing: None,
            safety: None,
            clock: None,
            stop: None,
            estimated_tr: None,
            _d: PhantomData,
            _t: PhantomData,
            _g: PhantomData,
        }
    }
}

impl DynSequencer {
    /// Start building a sequencer.
    pub fn builder() -> ShimSequencerBuilder<Missing, Missing, Missing> {
        ShimSequencerBuilder::default()
    }
}

/// Optional pieces of a sequencer; defaults apply to anything left `None`.
#[derive(Default)]
pub struct SequencerParts {
    pub filter: Option<FilterCoefficients>,
    pub channel_order: Option<Vec<usize>>,
    pub timing: TimingCfg,
    pub safety: SafetyCfg,
    pub clock: Option<Arc<dyn Clock + Send + Sync>>,
    pub stop: Option<Arc<AtomicBool>>,
    pub estimated_tr: Option<Duration>,
}

/// Routed columns the filter does not cover.
fn unfiltered_columns(columns: &[usize], filter_channels: usize) -> Vec<usize> {
    columns
        .iter()
        .copied()
        .filter(|&c| c >= filter_channels)
        .collect()
}

/// Validate configuration and construct a `ShimSequencer`.
///
/// Shared by `ShimSequencerBuilder::try_build()` and `build_sequencer()`.
fn validate_and_build<D: Dac>(
    dac: D,
    table: ShimTable,
    trigger: TriggerClock,
    parts: SequencerParts,
) -> Result<ShimSequencer<D>> {
    let timing = parts.timing;
    if timing.acquisition.is_zero() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "acquisition window must be > 0",
        )));
    }
    if timing.resync_threshold.is_zero() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "resync threshold must be > 0",
        )));
    }
    if table.width() == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "shim table has no columns",
        )));
    }

    let width = table.width();
    let channels = channel_count(width);
    let order = parts.channel_order.as_deref().unwrap_or(&DEFAULT_ORDER);
    let router = ChannelRouter::new(order, channels, width)?;

    let mut engine = PreemphasisEngine::new(filter_channel_count(channels), width);
    if let Some(filter) = &parts.filter {
        engine.configure(filter);
    }

    if engine.is_configured() {
        let unfiltered = unfiltered_columns(router.columns(), engine.channels());
        if !unfiltered.is_empty() {
            tracing::warn!(
                filter_channels = engine.channels(),
                ?unfiltered,
                "routed columns outside the filter pass through unfiltered"
            );
        }
    }

    let clock: Arc<dyn Clock + Send + Sync> = match parts.clock {
        Some(c) => c,
        None => Arc::new(MonotonicClock::new()),
    };

    tracing::debug!(
        width,
        channels,
        filter_channels = engine.channels(),
        filter_order = engine.order(),
        "sequencer built"
    );

    Ok(ShimSequencer {
        table,
        output: DacOutput::new(dac, router),
        engine,
        trigger,
        clock,
        timing,
        safety: parts.safety,
        stop: parts.stop,
        estimated_tr: parts.estimated_tr,
        zeros: vec![0.0; width],
        scratch: vec![0.0; width],
        failed_frames: 0,
    })
}

impl<D, T, G> ShimSequencerBuilder<D, T, G> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<DynSequencer> {
        let dac = self
            .dac
            .ok_or_else(|| eyre::Report::new(BuildError::MissingDac))?;
        let table = self
            .table
            .ok_or_else(|| eyre::Report::new(BuildError::MissingTable))?;
        let trigger = self
            .trigger
            .ok_or_else(|| eyre::Report::new(BuildError::MissingTrigger))?;

        validate_and_build(
            dac,
            table,
            trigger,
            SequencerParts {
                filter: self.filter,
                channel_order: self.channel_order,
                timing: self.timing.unwrap_or_default(),
                safety: self.safety.unwrap_or_default(),
                clock: self.clock,
                stop: self.stop,
                estimated_tr: self.estimated_tr,
            },
        )
    }
}

/// Chainable setters that do not affect type-state.
impl<D, T, G> ShimSequencerBuilder<D, T, G> {
    pub fn with_filter(mut self, filter: FilterCoefficients) -> Self {
        self.filter = Some(filter);
        self
    }
    /// Override the DAC channel to setpoint column mapping.
    pub fn with_channel_order(mut self, order: Vec<usize>) -> Self {
        self.channel_order = Some(order);
        self
    }
    pub fn with_timing(mut self, timing: TimingCfg) -> Self {
        self.timing = Some(timing);
        self
    }
    pub fn with_safety(mut self, safety: SafetyCfg) -> Self {
        self.safety = Some(safety);
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    /// Abort the run with `ShimError::Stopped` once `stop` is set.
    pub fn with_stop_signal(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }
    /// Sequence repetition time, logged at run start.
    pub fn with_estimated_tr(mut self, tr: Duration) -> Self {
        self.estimated_tr = Some(tr);
        self
    }
}

// Setters that advance type-state

impl<T, G> ShimSequencerBuilder<Missing, T, G> {
    pub fn with_dac(self, dac: impl Dac + Send + 'static) -> ShimSequencerBuilder<Set, T, G> {
        ShimSequencerBuilder {
            dac: Some(Box::new(dac)),
            table: self.table,
            trigger: self.trigger,
            filter: self.filter,
            channel_order: self.channel_order,
            timing: self.timing,
            safety: self.safety,
            clock: self.clock,
            stop: self.stop,
            estimated_tr: self.estimated_tr,
            _d: PhantomData,
            _t: PhantomData,
            _g: PhantomData,
        }
    }
}

impl<D, G> ShimSequencerBuilder<D, Missing, G> {
    pub fn with_table(self, table: ShimTable) -> ShimSequencerBuilder<D, Set, G> {
        ShimSequencerBuilder {
            dac: self.dac,
            table: Some(table),
            trigger: self.trigger,
            filter: self.filter,
            channel_order: self.channel_order,
            timing: self.timing,
            safety: self.safety,
            clock: self.clock,
            stop: self.stop,
            estimated_tr: self.estimated_tr,
            _d: PhantomData,
            _t: PhantomData,
            _g: PhantomData,
        }
    }
}

impl<D, T> ShimSequencerBuilder<D, T, Missing> {
    pub fn with_trigger(self, trigger: TriggerClock) -> ShimSequencerBuilder<D, T, Set> {
        ShimSequencerBuilder {
            dac: self.dac,
            table: self.table,
            trigger: Some(trigger),
            filter: self.filter,
            channel_order: self.channel_order,
            timing: self.timing,
            safety: self.safety,
            clock: self.clock,
            stop: self.stop,
            estimated_tr: self.estimated_tr,
            _d: PhantomData,
            _t: PhantomData,
            _g: PhantomData,
        }
    }
}

impl ShimSequencerBuilder<Set, Set, Set> {
    /// Build the sequencer; only available once DAC, table and trigger are set.
    pub fn build(self) -> Result<DynSequencer> {
        self.try_build()
    }
}

/// Generic constructor that keeps the concrete DAC type.
pub fn build_sequencer<D: Dac>(
    dac: D,
    table: ShimTable,
    trigger: TriggerClock,
    parts: SequencerParts,
) -> Result<ShimSequencer<D>> {
    validate_and_build(dac, table, trigger, parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Cube;
    use crate::mocks::RecordingDac;
    use std::time::Instant;

    fn table19() -> ShimTable {
        ShimTable::from_rows(&[vec![0.0; 19]]).unwrap()
    }

    #[test]
    fn try_build_reports_missing_pieces_in_order() {
        let err = DynSequencer::builder().try_build().unwrap_err();
        assert_eq!(err.downcast_ref::<BuildError>(), Some(&BuildError::MissingDac));

        let err = DynSequencer::builder()
            .with_dac(RecordingDac::new())
            .try_build()
            .unwrap_err();
        assert_eq!(err.downcast_ref::<BuildError>(), Some(&BuildError::MissingTable));

        let err = DynSequencer::builder()
            .with_dac(RecordingDac::new())
            .with_table(table19())
            .try_build()
            .unwrap_err();
        assert_eq!(err.downcast_ref::<BuildError>(), Some(&BuildError::MissingTrigger));
    }

    #[test]
    fn derives_channel_counts_from_table_width() {
        let (_edge, trigger) = TriggerClock::new(Instant::now());
        let seq = DynSequencer::builder()
            .with_dac(RecordingDac::new())
            .with_table(table19())
            .with_trigger(trigger)
            .build()
            .unwrap();
        assert_eq!(seq.channel_count(), 16);
        assert_eq!(seq.engine().channels(), 16);
        assert_eq!(seq.filter_order(), 0);
    }

    #[test]
    fn default_order_leaves_top_columns_outside_the_filter() {
        let order = &DEFAULT_ORDER[..channel_count(19)];
        assert_eq!(unfiltered_columns(order, filter_channel_count(16)), vec![16, 17, 18]);
        assert!(unfiltered_columns(&[4, 0], filter_channel_count(2)).is_empty());
    }

    #[test]
    fn filtered_build_over_wide_table_still_succeeds() {
        let mut cube = Cube::zeros(16, 16, 2);
        cube.lane_mut(4, 4)[0] = 1.0;
        let (_edge, trigger) = TriggerClock::new(Instant::now());
        let seq = DynSequencer::builder()
            .with_dac(RecordingDac::new())
            .with_table(table19())
            .with_trigger(trigger)
            .with_filter(FilterCoefficients::new(cube).unwrap())
            .build()
            .unwrap();
        assert_eq!(seq.filter_order(), 1);
        assert_eq!(seq.engine().channels(), 16);
    }

    #[test]
    fn zero_acquisition_rejected() {
        let (_edge, trigger) = TriggerClock::new(Instant::now());
        let err = build_sequencer(
            RecordingDac::new(),
            table19(),
            trigger,
            SequencerParts {
                timing: TimingCfg {
                    acquisition: Duration::ZERO,
                    ..TimingCfg::default()
                },
                ..SequencerParts::default()
            },
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::InvalidConfig(_))
        ));
    }
}
