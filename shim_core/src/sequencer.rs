//! Trigger-synchronized output of the shim table.
//!
//! Field-camera mode walks the table one slice at a time. Each slice is a
//! window of `guard + acquisition + guard` measured from the slice start; the
//! setpoint is driven only inside the acquisition part and the outputs are
//! reset otherwise. The window position is re-evaluated whenever a new trigger
//! edge arrives, and a gap between edges longer than the resync threshold
//! restarts the window without advancing the slice.
//!
//! Dynamic mode drives the row selected by the trigger counter for as long as
//! the counter stays inside the table.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use shim_traits::{Clock, Dac};

use crate::config::{DynamicWaveform, SafetyCfg, TimingCfg};
use crate::error::{Result, ShimError};
use crate::output::DacOutput;
use crate::preemphasis::PreemphasisEngine;
use crate::status::{RunReport, SliceState};
use crate::table::ShimTable;
use crate::trigger::{TriggerClock, TriggerSnapshot};

/// Ramp waveform bounds and step, in Amps.
pub const RAMP_MIN_A: f32 = -2.5;
pub const RAMP_MAX_A: f32 = 2.5;
pub const RAMP_STEP_A: f32 = 0.001;

/// Next ramp sample: rises by one step and wraps to the minimum at the top.
pub fn ramp_next(value: f32) -> f32 {
    if value >= RAMP_MAX_A {
        RAMP_MIN_A
    } else {
        value + RAMP_STEP_A
    }
}

pub struct ShimSequencer<D: Dac> {
    pub(crate) table: ShimTable,
    pub(crate) output: DacOutput<D>,
    pub(crate) engine: PreemphasisEngine,
    pub(crate) trigger: TriggerClock,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) timing: TimingCfg,
    pub(crate) safety: SafetyCfg,
    pub(crate) stop: Option<Arc<AtomicBool>>,
    pub(crate) estimated_tr: Option<std::time::Duration>,
    pub(crate) zeros: Vec<f32>,
    pub(crate) scratch: Vec<f32>,
    pub(crate) failed_frames: u32,
}

impl<D: Dac> core::fmt::Debug for ShimSequencer<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ShimSequencer")
            .field("slices", &self.table.slices())
            .field("width", &self.table.width())
            .field("channels", &self.output.router().len())
            .field("filter_order", &self.engine.order())
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}

impl<D: Dac> ShimSequencer<D> {
    pub fn table(&self) -> &ShimTable {
        &self.table
    }

    /// DAC channels driven.
    pub fn channel_count(&self) -> usize {
        self.output.router().len()
    }

    pub fn filter_order(&self) -> usize {
        self.engine.order()
    }

    pub fn engine(&self) -> &PreemphasisEngine {
        &self.engine
    }

    pub fn timing(&self) -> &TimingCfg {
        &self.timing
    }

    pub fn trigger(&self) -> &TriggerClock {
        &self.trigger
    }

    /// Drive slice `slice` of the table, optionally through the filter.
    pub fn apply_slice(&mut self, slice: usize, use_filter: bool) -> Result<()> {
        if slice >= self.table.slices() {
            return Err(eyre::Report::new(ShimError::Config(format!(
                "slice {slice} outside a table of {} slices",
                self.table.slices()
            ))));
        }
        let row = self.table.setpoint(slice);
        let out = if use_filter {
            self.engine.apply(row)
        } else {
            row
        };
        let res = self.output.apply_all(out);
        self.note_frame(res)
    }

    /// Drive 0 A on every channel, optionally through the filter.
    pub fn reset_all(&mut self, use_filter: bool) -> Result<()> {
        let out = if use_filter {
            self.engine.apply(&self.zeros)
        } else {
            &self.zeros
        };
        let res = self.output.apply_all(out);
        self.note_frame(res)
    }

    /// Drive an arbitrary full-width setpoint vector.
    pub fn apply_setpoint(&mut self, setpoint: &[f32], use_filter: bool) -> Result<()> {
        if setpoint.len() != self.table.width() {
            return Err(eyre::Report::new(ShimError::Config(format!(
                "setpoint has {} columns, table has {}",
                setpoint.len(),
                self.table.width()
            ))));
        }
        let out = if use_filter {
            self.engine.apply(setpoint)
        } else {
            setpoint
        };
        let res = self.output.apply_all(out);
        self.note_frame(res)
    }

    /// Field-camera run over every slice of the table.
    ///
    /// Outputs are reset (unfiltered, best effort) when the run aborts.
    pub fn run_field_camera(&mut self, use_filter: bool) -> Result<RunReport> {
        self.validate_table()?;
        let mut report = RunReport::default();
        tracing::info!(
            slices = self.table.slices(),
            channels = self.channel_count(),
            filter_order = self.engine.order(),
            use_filter,
            estimated_tr_ms = self.estimated_tr.map(|d| d.as_millis() as u64),
            "field camera run start"
        );
        let res = self.field_camera_slices(use_filter, &mut report);
        report.failed_frames = self.failed_frames;
        match res {
            Ok(()) => {
                tracing::info!(?report, "field camera run complete");
                Ok(report)
            }
            Err(e) => {
                self.abort_reset();
                Err(e)
            }
        }
    }

    /// Dynamic run: drive the row picked by the trigger counter until the
    /// counter leaves the table, then reset.
    pub fn run_dynamic(&mut self, waveform: DynamicWaveform) -> Result<RunReport> {
        self.validate_table()?;
        let mut report = RunReport::default();
        tracing::info!(
            slices = self.table.slices(),
            channels = self.channel_count(),
            ?waveform,
            "dynamic run start"
        );
        let res = self.dynamic_loop(waveform, &mut report);
        // Ramp frames bypass the filter, so its closing reset does too.
        let reset = self.reset_all(waveform == DynamicWaveform::Filtered);
        report.reset_frames += 1;
        report.failed_frames = self.failed_frames;
        res?;
        reset?;
        tracing::info!(?report, "dynamic run complete");
        Ok(report)
    }

    fn validate_table(&self) -> Result<()> {
        if self.table.is_empty() {
            return Err(eyre::Report::new(ShimError::Config(format!(
                "shim table is empty ({} slices x {} channels)",
                self.table.slices(),
                self.table.width()
            ))));
        }
        Ok(())
    }

    fn field_camera_slices(&mut self, use_filter: bool, report: &mut RunReport) -> Result<()> {
        let timing = self.timing.clone();
        for slice in 0..self.table.slices() {
            let mut start = self.clock.now();
            let mut last = self.trigger.snapshot();
            let mut state = SliceState::WaitFirstTrigger;
            tracing::debug!(slice, "slice start");
            loop {
                let window = SliceState::at(self.clock.since(start), &timing);
                if window == SliceState::Done {
                    break;
                }
                if state != SliceState::WaitFirstTrigger && state != window {
                    tracing::debug!(slice, state = ?window, "slice state");
                    state = window;
                }

                let snap = self.wait_for_edge(last, |seq| {
                    if window.drives_setpoint() {
                        report.applied_frames += 1;
                        seq.apply_slice(slice, use_filter)
                    } else {
                        report.reset_frames += 1;
                        seq.reset_all(use_filter)
                    }
                })?;
                report.triggers = report.triggers.wrapping_add(snap.slice.wrapping_sub(last.slice));
                let dt = snap.at.saturating_duration_since(last.at);
                last = snap;

                if state == SliceState::WaitFirstTrigger {
                    state = window;
                }
                if dt > timing.resync_threshold {
                    tracing::info!(
                        slice,
                        gap_ms = dt.as_millis() as u64,
                        "trigger gap above resync threshold, restarting slice window"
                    );
                    report.resyncs += 1;
                    start = self.clock.now();
                }
            }
            report.slices_completed += 1;
            tracing::info!(slice, "slice complete");
        }
        Ok(())
    }

    /// Poll until the trigger counter moves past `last`, calling `frame` on
    /// every poll.
    fn wait_for_edge<F>(&mut self, last: TriggerSnapshot, mut frame: F) -> Result<TriggerSnapshot>
    where
        F: FnMut(&mut Self) -> Result<()>,
    {
        let since = self.clock.now();
        loop {
            self.check_stop()?;
            let snap = self.trigger.snapshot();
            if snap.slice != last.slice {
                return Ok(snap);
            }
            if let Some(limit) = self.timing.trigger_timeout
                && self.clock.since(since) >= limit
            {
                return Err(eyre::Report::new(ShimError::TriggerTimeout(limit)));
            }
            frame(self)?;
            self.clock.sleep(self.timing.poll_interval);
        }
    }

    fn dynamic_loop(&mut self, waveform: DynamicWaveform, report: &mut RunReport) -> Result<()> {
        let base = self.trigger.current_slice();
        let slices = self.table.slices();
        let mut ramp = 0.0f32;
        let mut seen = base;
        let mut last_edge_at = self.clock.now();
        loop {
            self.check_stop()?;
            let now_slice = self.trigger.current_slice();
            let idx = now_slice.wrapping_sub(base) as usize;
            if idx >= slices {
                report.slices_completed = slices;
                report.triggers = now_slice.wrapping_sub(base);
                return Ok(());
            }
            if now_slice == seen {
                if let Some(limit) = self.timing.trigger_timeout
                    && self.clock.since(last_edge_at) >= limit
                {
                    report.slices_completed = idx;
                    return Err(eyre::Report::new(ShimError::TriggerTimeout(limit)));
                }
            } else {
                seen = now_slice;
                last_edge_at = self.clock.now();
                tracing::debug!(slice = idx, "dynamic slice");
            }

            match waveform {
                DynamicWaveform::Filtered => self.apply_slice(idx, true)?,
                DynamicWaveform::Raw => self.apply_slice(idx, false)?,
                DynamicWaveform::Ramp => {
                    self.scratch.fill(ramp);
                    let res = self.output.apply_all(&self.scratch);
                    self.note_frame(res)?;
                    ramp = ramp_next(ramp);
                }
            }
            report.applied_frames += 1;
            self.clock.sleep(self.timing.poll_interval);
        }
    }

    fn check_stop(&self) -> Result<()> {
        if let Some(stop) = &self.stop
            && stop.load(Ordering::Relaxed)
        {
            return Err(eyre::Report::new(ShimError::Stopped));
        }
        Ok(())
    }

    /// Count failed frames; error out once the configured limit is reached.
    fn note_frame(&mut self, res: std::result::Result<(), ShimError>) -> Result<()> {
        match res {
            Ok(()) => Ok(()),
            Err(e @ ShimError::HardwareWrite { .. }) => {
                self.failed_frames = self.failed_frames.saturating_add(1);
                if self.failed_frames == 1 {
                    tracing::warn!(error = %e, "dac write failed");
                } else {
                    tracing::debug!(error = %e, failed_frames = self.failed_frames, "dac write failed");
                }
                let limit = self.safety.max_write_failures;
                if limit > 0 && self.failed_frames >= limit {
                    tracing::error!(failed_frames = self.failed_frames, "write failure limit reached");
                    return Err(eyre::Report::new(ShimError::WriteFailureLimit(
                        self.failed_frames,
                    )));
                }
                Ok(())
            }
            Err(e) => Err(eyre::Report::new(e)),
        }
    }

    fn abort_reset(&mut self) {
        if let Err(e) = self.output.apply_all(&self.zeros) {
            tracing::warn!(error = %e, "output reset after abort failed");
        }
    }
}
