//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "shim", version, about = "Trigger-synchronized B0 shim controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/shim_config.toml")]
    pub config: PathBuf,

    /// Log and report as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    #[inline]
    pub fn os_default() -> Self {
        if cfg!(target_os = "linux") {
            RtLock::Current
        } else {
            RtLock::None
        }
    }
}

/// Dynamic-mode output source.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum WaveformArg {
    Filtered,
    Raw,
    Ramp,
}

impl From<WaveformArg> for shim_core::DynamicWaveform {
    fn from(w: WaveformArg) -> Self {
        match w {
            WaveformArg::Filtered => Self::Filtered,
            WaveformArg::Raw => Self::Raw,
            WaveformArg::Ramp => Self::Ramp,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct RtArgs {
    /// Enable real-time mode (SCHED_FIFO, affinity, mlockall)
    #[arg(
        long,
        action = ArgAction::SetTrue,
        long_help = "Enable real-time mode on Linux.\n\nAttempts SCHED_FIFO priority, pins the process to one CPU, and calls mlockall to keep the address space in RAM. The trigger poll loop then runs with less jitter, at the cost of one busy core. May require CAP_SYS_NICE / CAP_IPC_LOCK or root."
    )]
    pub rt: bool,
    /// Real-time priority for SCHED_FIFO (1..=max)
    #[arg(long, value_name = "PRIO")]
    pub rt_prio: Option<i32>,
    /// Memory locking mode for --rt: none, current, or all
    #[arg(long, value_enum, value_name = "MODE")]
    pub rt_lock: Option<RtLock>,
    /// CPU index to pin the process to; defaults to 0
    #[arg(long, value_name = "CPU")]
    pub rt_cpu: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Field-camera run: one table row per slice, applied between the guard intervals
    Run {
        /// Drive raw table values instead of filtered ones
        #[arg(long, action = ArgAction::SetTrue)]
        no_filter: bool,
        /// Override protocol.acquisition_s (seconds)
        #[arg(long, value_name = "SECONDS")]
        acquisition_s: Option<f32>,
        #[command(flatten)]
        rt: RtArgs,
    },
    /// Dynamic shimming: drive the row selected by the trigger counter
    Dynamic {
        /// Override protocol.dynamic_waveform
        #[arg(long, value_enum, value_name = "WAVEFORM")]
        waveform: Option<WaveformArg>,
        #[command(flatten)]
        rt: RtArgs,
    },
    /// Run the mode named by protocol.mode with its configured settings
    Start {
        #[command(flatten)]
        rt: RtArgs,
    },
    /// Drive every DAC channel to 0 A
    Reset,
    /// Load config, table and filters, and dry-run the output path
    SelfCheck,
}
