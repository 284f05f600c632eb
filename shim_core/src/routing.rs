//! Logical shim channel to setpoint column mapping.

use crate::error::{BuildError, Result};

/// Hardware limit on DAC output channels.
pub const MAX_CHANNELS: usize = 16;
/// Leading gradient columns (x, y, z) of every setpoint vector.
pub const GRADIENT_CHANNELS: usize = 3;

/// Amplifier wiring: DAC channel `i` is driven by setpoint column `DEFAULT_ORDER[i]`.
pub const DEFAULT_ORDER: [usize; MAX_CHANNELS] =
    [4, 0, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18];

/// Output channel count for a table with `total_inputs` columns.
pub fn channel_count(total_inputs: usize) -> usize {
    total_inputs
        .saturating_sub(GRADIENT_CHANNELS)
        .clamp(1, MAX_CHANNELS)
}

/// Channels the preemphasis filter runs over: the outputs plus the gradient
/// columns, capped at the hardware limit.
pub fn filter_channel_count(channel_count: usize) -> usize {
    (channel_count + GRADIENT_CHANNELS).min(MAX_CHANNELS)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRouter {
    columns: Vec<usize>,
}

impl ChannelRouter {
    /// Validate `order` against a table of `width` columns.
    ///
    /// Only the first `channel_count` entries are used; each must name an
    /// existing column.
    pub fn new(order: &[usize], channel_count: usize, width: usize) -> Result<Self> {
        if channel_count == 0 || channel_count > MAX_CHANNELS {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "channel count must be in 1..=16",
            )));
        }
        if order.len() < channel_count {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "channel order is shorter than the channel count",
            )));
        }
        let columns = &order[..channel_count];
        if let Some((channel, &entry)) = columns.iter().enumerate().find(|(_, e)| **e >= width) {
            return Err(eyre::Report::new(BuildError::ChannelOutOfRange {
                channel,
                entry,
                width,
            }));
        }
        Ok(Self {
            columns: columns.to_vec(),
        })
    }

    pub fn with_default_order(channel_count: usize, width: usize) -> Result<Self> {
        Self::new(&DEFAULT_ORDER, channel_count, width)
    }

    /// Setpoint column for DAC channel `channel`.
    #[inline]
    pub fn route(&self, channel: usize) -> Option<usize> {
        self.columns.get(channel).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[usize] {
        &self.columns
    }
}
