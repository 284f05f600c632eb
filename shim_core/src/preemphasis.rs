//! Cross-channel IIR preemphasis over the shim and gradient channels.
//!
//! Every (input, output) pair has `order` feed-forward taps applied to the
//! input's setpoint history and `order` feedback taps applied to the pair's
//! own output history; each output column sums its pairs. One shared cursor walks both rings backwards, so tap
//! `i` always weights the sample written `i` evaluations ago.

use crate::error::{BuildError, Result};
use crate::matrix::{Cube, Matrix};

/// Filter coefficients laid out `[in][out][2 * order]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCoefficients {
    order: usize,
    taps: Cube,
}

impl FilterCoefficients {
    /// `taps` must be square in its first two dimensions with an even tap count.
    pub fn new(taps: Cube) -> Result<Self> {
        let [outs, ins, width] = taps.dims();
        if outs != ins {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "filter taps must cover every (in, out) channel pair",
            )));
        }
        if width % 2 != 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "filter needs an even number of taps per pair",
            )));
        }
        Ok(Self {
            order: width / 2,
            taps,
        })
    }

    pub fn passthrough(channels: usize) -> Self {
        Self {
            order: 0,
            taps: Cube::zeros(channels, channels, 0),
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn channels(&self) -> usize {
        self.taps.dims()[0]
    }

    pub fn taps(&self) -> &Cube {
        &self.taps
    }
}

#[derive(Debug, Clone)]
pub struct PreemphasisEngine {
    channels: usize,
    order: usize,
    coeffs: Cube,
    setpoint_hist: Matrix,
    output_hist: Cube,
    cursor: usize,
    result: Vec<f32>,
}

impl PreemphasisEngine {
    /// Unconfigured engine over `channels` filter channels for setpoint
    /// vectors of `width` columns. Columns at or beyond `channels` pass
    /// through unchanged.
    pub fn new(channels: usize, width: usize) -> Self {
        Self {
            channels,
            order: 0,
            coeffs: Cube::zeros(0, 0, 0),
            setpoint_hist: Matrix::zeros(0, 0),
            output_hist: Cube::zeros(0, 0, 0),
            cursor: 0,
            result: vec![0.0; width.max(channels)],
        }
    }

    /// Copy `filter` in and clear the histories.
    ///
    /// Pairs the filter does not cover get zero taps; pairs beyond this
    /// engine's channels are ignored. Order 0 makes the engine a pass-through.
    pub fn configure(&mut self, filter: &FilterCoefficients) {
        let order = filter.order();
        let n = self.channels;
        if order == 0 {
            self.order = 0;
            self.coeffs = Cube::zeros(0, 0, 0);
            self.setpoint_hist = Matrix::zeros(0, 0);
            self.output_hist = Cube::zeros(0, 0, 0);
            self.cursor = 0;
            tracing::debug!("preemphasis disabled (order 0)");
            return;
        }
        if filter.channels() != n {
            tracing::debug!(
                filter_channels = filter.channels(),
                engine_channels = n,
                "filter channel count differs from engine; overlapping pairs used"
            );
        }

        let mut coeffs = Cube::zeros(n, n, 2 * order);
        let shared = n.min(filter.channels());
        for r in 0..shared {
            for c in 0..shared {
                coeffs.lane_mut(r, c).copy_from_slice(filter.taps().lane(r, c));
            }
        }
        self.order = order;
        self.coeffs = coeffs;
        self.setpoint_hist = Matrix::zeros(n, order);
        self.output_hist = Cube::zeros(n, n, order);
        self.cursor = 0;
        tracing::debug!(order, channels = n, "preemphasis configured");
    }

    pub fn is_configured(&self) -> bool {
        self.order > 0
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Zero both histories and rewind the cursor.
    pub fn reset_history(&mut self) {
        self.setpoint_hist.fill(0.0);
        self.output_hist.fill(0.0);
        self.cursor = 0;
    }

    /// Filter one setpoint vector. Returns the input unchanged when unconfigured.
    ///
    /// Inputs shorter than the filter channel count read as zero on the
    /// missing channels.
    pub fn apply<'a>(&'a mut self, setpoint: &'a [f32]) -> &'a [f32] {
        if self.order == 0 {
            return setpoint;
        }
        let n = self.channels;
        let order = self.order;
        let cursor = self.cursor;
        let next = if cursor == 0 { order - 1 } else { cursor - 1 };

        for r in 0..n {
            self.setpoint_hist.row_mut(r)[cursor] = setpoint.get(r).copied().unwrap_or(0.0);
        }
        self.result[..n].fill(0.0);

        for r in 0..n {
            let sp = self.setpoint_hist.row(r);
            for c in 0..n {
                let (ff, fb) = self.coeffs.lane(r, c).split_at(order);
                let hist = self.output_hist.lane_mut(r, c);
                let mut acc = 0.0f32;
                for i in 0..order {
                    let idx = (cursor + i) % order;
                    acc += ff[i] * sp[idx];
                    acc -= fb[i] * hist[idx];
                }
                hist[next] = acc;
                self.result[c] += acc;
            }
        }

        let len = setpoint.len().min(self.result.len());
        if len > n {
            self.result[n..len].copy_from_slice(&setpoint[n..len]);
        }
        self.cursor = next;
        &self.result[..len]
    }
}
