//! Command execution: input loading, backend assembly, and run orchestration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use eyre::WrapErr;
use serde_json::json;
use shim_config::Config;
use shim_core::error::{Result as CoreResult, ShimError};
use shim_core::mocks::RecordingDac;
use shim_core::{
    ChannelRouter, DacOutput, DynSequencer, DynamicWaveform, FilterCoefficients, MAX_CHANNELS,
    RunReport, SafetyCfg, ShimTable, TimingCfg, TriggerClock, channel_count, filter_channel_count,
};
use shim_traits::Dac;

use crate::cli::RtArgs;
use crate::rt::setup_rt_once;

/// Simulated trigger period when neither `[sim]` nor the protocol gives one.
#[cfg(not(feature = "hardware"))]
const DEFAULT_SIM_PERIOD: Duration = Duration::from_millis(100);

fn config_err(e: eyre::Report) -> eyre::Report {
    eyre::Report::new(ShimError::Config(format!("{e:#}")))
}

/// Relative input paths are taken from the config file's directory.
fn resolve(base: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

/// Shim table and optional preemphasis filter named by `[files]`.
pub struct Inputs {
    pub table: ShimTable,
    pub filter: Option<FilterCoefficients>,
}

pub fn load_inputs(cfg: &Config, base: &Path) -> CoreResult<Inputs> {
    let path = resolve(base, &cfg.files.shimvals);
    let data = shim_config::load_matrix(&path, cfg.files.pad_rows).map_err(config_err)?;
    let table = ShimTable::try_from(data).map_err(config_err)?;

    let channels = channel_count(table.width());
    let filter = match &cfg.files.preemph_filter {
        Some(dir) => {
            let bank = shim_config::load_filter_dir(&resolve(base, dir), filter_channel_count(channels))
                .map_err(config_err)?;
            Some(FilterCoefficients::try_from(&bank).map_err(config_err)?)
        }
        None => None,
    };
    tracing::info!(
        slices = table.slices(),
        width = table.width(),
        channels,
        filter_order = filter.as_ref().map_or(0, FilterCoefficients::order),
        "inputs loaded"
    );
    Ok(Inputs { table, filter })
}

/// DAC and trigger source for one run. The trigger source stops when dropped.
pub struct Backend {
    pub dac: Box<dyn Dac + Send>,
    pub trigger: TriggerClock,
    _edge_source: Box<dyn Send>,
}

#[cfg(not(feature = "hardware"))]
pub fn open_dac(_cfg: &Config) -> CoreResult<Box<dyn Dac + Send>> {
    let mut dac = shim_hardware::SimulatedDac::new();
    // Test hook: make one simulated channel fail every write.
    if let Ok(ch) = std::env::var("SHIM_SIM_FAIL_CHANNEL")
        && let Ok(ch) = ch.parse::<u8>()
    {
        tracing::warn!(channel = ch, "simulated dac channel forced to fail");
        dac = dac.failing_on(ch);
    }
    tracing::info!("using simulated dac");
    Ok(Box::new(dac))
}

#[cfg(feature = "hardware")]
pub fn open_dac(cfg: &Config) -> CoreResult<Box<dyn Dac + Send>> {
    let p = &cfg.pins;
    let mut dac = shim_hardware::SpiDac::open(p.spi_bus, p.spi_slave_select, p.spi_clock_hz, p.spi_mode)
        .wrap_err("open spi dac")?;
    dac.init_registers(&shim_hardware::DacRegisters {
        common_offset: cfg.dac.common_offset,
        channel_gain: cfg.dac.channel_gain,
        channel_offset: cfg.dac.channel_offset,
    })
    .wrap_err("initialize dac registers")?;
    Ok(Box::new(dac))
}

#[cfg(not(feature = "hardware"))]
fn open_trigger(cfg: &Config) -> CoreResult<(TriggerClock, Box<dyn Send>)> {
    let period = match cfg.sim.trigger_period_ms {
        Some(ms) => Duration::from_millis(ms),
        None => Duration::try_from_secs_f32(cfg.protocol.estimate_tr_s)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(DEFAULT_SIM_PERIOD),
    };
    let (edge, trigger) = TriggerClock::new(Instant::now());
    let source =
        shim_hardware::SimulatedTrigger::spawn(period, move || edge.on_edge(Instant::now()));
    tracing::info!(period_ms = period.as_millis() as u64, "using simulated trigger");
    Ok((trigger, Box::new(source)))
}

#[cfg(feature = "hardware")]
fn open_trigger(cfg: &Config) -> CoreResult<(TriggerClock, Box<dyn Send>)> {
    let (edge, trigger) = TriggerClock::new(Instant::now());
    let pin = shim_hardware::TriggerPin::attach(cfg.pins.trigger, move || {
        edge.on_edge(Instant::now());
    })
    .wrap_err("attach trigger input")?;
    Ok((trigger, Box::new(pin)))
}

pub fn open_backend(cfg: &Config) -> CoreResult<Backend> {
    let dac = open_dac(cfg)?;
    let (trigger, edge_source) = open_trigger(cfg)?;
    Ok(Backend {
        dac,
        trigger,
        _edge_source: edge_source,
    })
}

fn build(
    cfg: &Config,
    inputs: Inputs,
    dac: Box<dyn Dac + Send>,
    trigger: TriggerClock,
    timing: TimingCfg,
    stop: Option<Arc<AtomicBool>>,
) -> CoreResult<DynSequencer> {
    let mut b = DynSequencer::builder()
        .with_dac(dac)
        .with_table(inputs.table)
        .with_trigger(trigger)
        .with_timing(timing)
        .with_safety(SafetyCfg::from(&cfg.safety));
    if let Some(f) = inputs.filter {
        b = b.with_filter(f);
    }
    if let Some(order) = &cfg.channels.order {
        b = b.with_channel_order(order.clone());
    }
    if let Some(stop) = stop {
        b = b.with_stop_signal(stop);
    }
    if let Ok(tr) = Duration::try_from_secs_f32(cfg.protocol.estimate_tr_s)
        && !tr.is_zero()
    {
        b = b.with_estimated_tr(tr);
    }
    b.build()
}

fn print_report(json_mode: bool, command: &str, report: &RunReport) {
    if json_mode {
        println!(
            "{}",
            json!({
                "command": command,
                "slices": report.slices_completed,
                "triggers": report.triggers,
                "resyncs": report.resyncs,
                "applied_frames": report.applied_frames,
                "reset_frames": report.reset_frames,
                "failed_frames": report.failed_frames,
            })
        );
    } else {
        println!(
            "{command} complete: {} slices, {} triggers, {} resyncs, {} failed frames",
            report.slices_completed, report.triggers, report.resyncs, report.failed_frames
        );
    }
}

pub struct RunOpts<'a> {
    pub no_filter: bool,
    pub acquisition_s: Option<f32>,
    pub rt: &'a RtArgs,
}

pub fn run_field_camera(
    cfg: &Config,
    base: &Path,
    opts: &RunOpts<'_>,
    stop: Arc<AtomicBool>,
    json_mode: bool,
) -> CoreResult<()> {
    let mut timing = TimingCfg::from(cfg);
    if let Some(s) = opts.acquisition_s {
        timing.acquisition = Duration::try_from_secs_f32(s)
            .map_err(|e| eyre::Report::new(ShimError::Config(format!("--acquisition-s: {e}"))))?;
    }
    let inputs = load_inputs(cfg, base)?;
    let backend = open_backend(cfg)?;
    setup_rt_once(opts.rt);

    let use_filter = cfg.protocol.use_filter && !opts.no_filter;
    let mut seq = build(cfg, inputs, backend.dac, backend.trigger, timing, Some(stop))?;
    let report = seq.run_field_camera(use_filter).wrap_err("field camera run")?;
    seq.reset_all(false).wrap_err("final output reset")?;
    print_report(json_mode, "run", &report);
    Ok(())
}

pub fn run_dynamic(
    cfg: &Config,
    base: &Path,
    waveform: Option<DynamicWaveform>,
    rt: &RtArgs,
    stop: Arc<AtomicBool>,
    json_mode: bool,
) -> CoreResult<()> {
    let waveform = waveform.unwrap_or_else(|| cfg.protocol.dynamic_waveform.into());
    let inputs = load_inputs(cfg, base)?;
    let backend = open_backend(cfg)?;
    setup_rt_once(rt);

    let mut seq = build(cfg, inputs, backend.dac, backend.trigger, TimingCfg::from(cfg), Some(stop))?;
    let report = seq.run_dynamic(waveform).wrap_err("dynamic run")?;
    print_report(json_mode, "dynamic", &report);
    Ok(())
}

/// Identity routing over every hardware channel.
fn all_channels() -> CoreResult<ChannelRouter> {
    let order: Vec<usize> = (0..MAX_CHANNELS).collect();
    ChannelRouter::new(&order, MAX_CHANNELS, MAX_CHANNELS)
}

/// Drive 0 A on all 16 DAC channels.
pub fn reset_outputs(dac: Box<dyn Dac + Send>) -> CoreResult<()> {
    let mut out = DacOutput::new(dac, all_channels()?);
    out.apply_all(&[0.0; MAX_CHANNELS])?;
    tracing::info!("all outputs reset to 0 A");
    Ok(())
}

pub fn reset(cfg: &Config, json_mode: bool) -> CoreResult<()> {
    reset_outputs(open_dac(cfg)?)?;
    if json_mode {
        println!("{}", json!({ "command": "reset", "channels": MAX_CHANNELS }));
    } else {
        println!("reset complete: {MAX_CHANNELS} channels at 0 A");
    }
    Ok(())
}

/// Load everything a run needs and push one raw frame, one filtered frame and
/// a reset through a recording DAC.
pub fn self_check(cfg: &Config, base: &Path, json_mode: bool) -> CoreResult<()> {
    let inputs = load_inputs(cfg, base)?;
    let dac = RecordingDac::new();
    let log = dac.log();
    let (_edge, trigger) = TriggerClock::new(Instant::now());
    let mut seq = build(cfg, inputs, Box::new(dac), trigger, TimingCfg::from(cfg), None)?;

    seq.apply_slice(0, false)
        .and_then(|()| seq.apply_slice(0, true))
        .and_then(|()| seq.reset_all(false))
        .wrap_err("dry run")?;

    let table = seq.table();
    if json_mode {
        println!(
            "{}",
            json!({
                "command": "self-check",
                "ok": true,
                "slices": table.slices(),
                "width": table.width(),
                "channels": seq.channel_count(),
                "filter_channels": seq.engine().channels(),
                "filter_order": seq.filter_order(),
                "frames_written": log.len(),
            })
        );
    } else {
        println!(
            "self-check ok: {} slices x {} columns, {} channels, filter order {} over {} channels",
            table.slices(),
            table.width(),
            seq.channel_count(),
            seq.filter_order(),
            seq.engine().channels()
        );
    }
    Ok(())
}
