//! `From`/`TryFrom` implementations bridging `shim_config` types to `shim_core` types.

use std::time::Duration;

use crate::config::{DynamicWaveform, SafetyCfg, TimingCfg};
use crate::error::{Report, Result};
use crate::matrix::{Cube, Matrix};
use crate::preemphasis::FilterCoefficients;
use crate::table::ShimTable;

fn secs(s: f32) -> Duration {
    Duration::try_from_secs_f32(s).unwrap_or(Duration::ZERO)
}

// ── TimingCfg ────────────────────────────────────────────────────────────────

impl From<&shim_config::Config> for TimingCfg {
    fn from(c: &shim_config::Config) -> Self {
        let t = &c.timing;
        Self {
            guard: secs(c.protocol.guard_s),
            acquisition: secs(c.protocol.acquisition_s),
            resync_threshold: Duration::from_millis(t.resync_threshold_ms),
            poll_interval: Duration::from_micros(t.poll_interval_us),
            trigger_timeout: (t.trigger_timeout_ms > 0)
                .then(|| Duration::from_millis(t.trigger_timeout_ms)),
        }
    }
}

// ── SafetyCfg ────────────────────────────────────────────────────────────────

impl From<&shim_config::Safety> for SafetyCfg {
    fn from(c: &shim_config::Safety) -> Self {
        Self {
            max_write_failures: c.max_write_failures,
        }
    }
}

// ── DynamicWaveform ──────────────────────────────────────────────────────────

impl From<shim_config::Waveform> for DynamicWaveform {
    fn from(w: shim_config::Waveform) -> Self {
        match w {
            shim_config::Waveform::Filtered => Self::Filtered,
            shim_config::Waveform::Raw => Self::Raw,
            shim_config::Waveform::Ramp => Self::Ramp,
        }
    }
}

// ── ShimTable ────────────────────────────────────────────────────────────────

impl TryFrom<shim_config::MatrixData> for ShimTable {
    type Error = Report;

    fn try_from(m: shim_config::MatrixData) -> Result<Self> {
        Ok(Self::new(Matrix::from_flat(m.rows, m.cols, m.values)?))
    }
}

// ── FilterCoefficients ───────────────────────────────────────────────────────

impl TryFrom<&shim_config::FilterBank> for FilterCoefficients {
    type Error = Report;

    fn try_from(b: &shim_config::FilterBank) -> Result<Self> {
        if b.order == 0 {
            return Ok(Self::passthrough(b.channels));
        }
        let cube = Cube::from_flat([b.channels, b.channels, 2 * b.order], b.taps.clone())?;
        Self::new(cube)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_maps_zero_timeout_to_none() {
        let cfg = shim_config::load_toml(
            r#"
            [files]
            shimvals = "table.txt"
            [protocol]
            guard_s = 0.5
            acquisition_s = 2.0
            [timing]
            poll_interval_us = 100
            "#,
        )
        .unwrap();
        let t = TimingCfg::from(&cfg);
        assert_eq!(t.guard, Duration::from_millis(500));
        assert_eq!(t.acquisition, Duration::from_secs(2));
        assert_eq!(t.poll_interval, Duration::from_micros(100));
        assert_eq!(t.trigger_timeout, None);
    }

    #[test]
    fn filter_bank_becomes_coefficients() {
        let bank = shim_config::FilterBank {
            channels: 2,
            order: 1,
            taps: vec![1.0, 0.0, 0.5, 0.0, 0.0, 0.0, 1.0, 0.0],
        };
        let f = FilterCoefficients::try_from(&bank).unwrap();
        assert_eq!(f.order(), 1);
        assert_eq!(f.taps().lane(0, 1), &[0.5, 0.0]);
    }

    #[test]
    fn empty_bank_is_passthrough() {
        let f = FilterCoefficients::try_from(&shim_config::FilterBank::passthrough(4)).unwrap();
        assert_eq!(f.order(), 0);
    }
}
