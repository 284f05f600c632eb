#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and input file import for the shim controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - `matrix` reads the shim value table and the preemphasis filter files.
use std::path::PathBuf;

use serde::Deserialize;

pub mod matrix;

pub use matrix::{FilterBank, MatrixData, load_filter_dir, load_matrix, parse_matrix};

/// Hardware limit on shim output channels.
pub const MAX_CHANNELS: usize = 16;

#[derive(Debug, Deserialize)]
pub struct Files {
    /// Shim value table: one row per slice, one column per input channel (Amps).
    pub shimvals: PathBuf,
    /// Directory holding `ch{k}.csv` preemphasis filters. Absent disables preemphasis.
    #[serde(default)]
    pub preemph_filter: Option<PathBuf>,
    /// Zero rows prepended to the shim table.
    #[serde(default)]
    pub pad_rows: usize,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    FieldCamera,
    Dynamic,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Filtered,
    Raw,
    Ramp,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Protocol {
    /// Estimated repetition time of the sequence (s). Informational; the
    /// simulated trigger uses it as its period.
    pub estimate_tr_s: f32,
    /// Length of the apply window per slice (s).
    pub acquisition_s: f32,
    /// Guard interval before and after the apply window (s).
    pub guard_s: f32,
    /// Route setpoints through the preemphasis filter.
    pub use_filter: bool,
    pub mode: RunMode,
    /// Output source in dynamic mode.
    pub dynamic_waveform: Waveform,
}

impl Default for Protocol {
    fn default() -> Self {
        Self {
            estimate_tr_s: 0.0,
            acquisition_s: 5.0,
            guard_s: 2.5,
            use_filter: true,
            mode: RunMode::FieldCamera,
            dynamic_waveform: Waveform::Filtered,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Inter-trigger gap that restarts the current slice window (ms).
    pub resync_threshold_ms: u64,
    /// Sleep between trigger polls (us); 0 spins.
    pub poll_interval_us: u64,
    /// Abort when no trigger arrives for this long (ms); 0 disables.
    pub trigger_timeout_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            resync_threshold_ms: 1000,
            poll_interval_us: 0,
            trigger_timeout_ms: 0,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Channels {
    /// Setpoint column driven by each DAC channel. Defaults to the amplifier wiring.
    pub order: Option<Vec<usize>>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Pins {
    /// BCM pin of the trigger input (wiringPi 0, header pin 11).
    pub trigger: u8,
    pub spi_bus: u8,
    pub spi_slave_select: u8,
    pub spi_clock_hz: u32,
    pub spi_mode: u8,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            trigger: 17,
            spi_bus: 0,
            spi_slave_select: 0,
            spi_clock_hz: 5_000_000,
            spi_mode: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DacCfg {
    pub common_offset: u16,
    pub channel_gain: u16,
    pub channel_offset: u16,
}

impl Default for DacCfg {
    fn default() -> Self {
        Self {
            common_offset: 0x09C0,
            channel_gain: 0x6AAA,
            channel_offset: 0x8000,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Safety {
    /// Abort after this many output frames with failed writes (0 = never).
    pub max_write_failures: u32,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Sim {
    /// Simulated trigger period (ms). Falls back to `protocol.estimate_tr_s`.
    pub trigger_period_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub files: Files,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub channels: Channels,
    #[serde(default)]
    pub pins: Pins,
    #[serde(default)]
    pub dac: DacCfg,
    #[serde(default)]
    pub safety: Safety,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub sim: Sim,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Files
        if self.files.shimvals.as_os_str().is_empty() {
            eyre::bail!("files.shimvals must not be empty");
        }

        // Protocol
        let p = &self.protocol;
        if !p.estimate_tr_s.is_finite() || p.estimate_tr_s < 0.0 {
            eyre::bail!("protocol.estimate_tr_s must be >= 0");
        }
        if !p.acquisition_s.is_finite() || p.acquisition_s <= 0.0 {
            eyre::bail!("protocol.acquisition_s must be > 0");
        }
        if p.acquisition_s > 3600.0 {
            eyre::bail!("protocol.acquisition_s is unreasonably large (>1h)");
        }
        if !p.guard_s.is_finite() || p.guard_s < 0.0 {
            eyre::bail!("protocol.guard_s must be >= 0");
        }
        if p.guard_s > 600.0 {
            eyre::bail!("protocol.guard_s is unreasonably large (>10min)");
        }

        // Timing
        if self.timing.resync_threshold_ms == 0 {
            eyre::bail!("timing.resync_threshold_ms must be >= 1");
        }
        if self.timing.poll_interval_us > 1_000_000 {
            eyre::bail!("timing.poll_interval_us must be <= 1s");
        }

        // Channels
        if let Some(order) = &self.channels.order {
            if order.is_empty() {
                eyre::bail!("channels.order must not be empty");
            }
            if order.len() > MAX_CHANNELS {
                eyre::bail!("channels.order has more than {MAX_CHANNELS} entries");
            }
        }

        // Pins
        if self.pins.spi_mode > 3 {
            eyre::bail!("pins.spi_mode must be in 0..=3");
        }
        if self.pins.spi_clock_hz == 0 {
            eyre::bail!("pins.spi_clock_hz must be > 0");
        }

        // DAC: offset must stay 8 times below the gain
        if u32::from(self.dac.common_offset) * 8 > u32::from(self.dac.channel_gain) {
            eyre::bail!("dac.common_offset must be at most 1/8 of dac.channel_gain");
        }

        // Logging
        if let Some(r) = &self.logging.rotation
            && !matches!(r.as_str(), "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Sim
        if self.sim.trigger_period_ms == Some(0) {
            eyre::bail!("sim.trigger_period_ms must be >= 1");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = load_toml("[files]\nshimvals = \"shimvals.txt\"\n").unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.protocol.acquisition_s, 5.0);
        assert_eq!(cfg.protocol.guard_s, 2.5);
        assert!(cfg.protocol.use_filter);
        assert_eq!(cfg.timing.resync_threshold_ms, 1000);
        assert_eq!(cfg.pins.trigger, 17);
        assert_eq!(cfg.dac.channel_gain, 0x6AAA);
        assert!(cfg.files.preemph_filter.is_none());
    }

    #[test]
    fn missing_files_section_fails_to_parse() {
        assert!(load_toml("[protocol]\nacquisition_s = 1.0\n").is_err());
    }
}
