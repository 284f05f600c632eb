use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ShimError {
    #[error("configuration error: {0}")]
    Config(String),
    /// At least one channel write failed; the remaining channels were still written.
    #[error(
        "dac write failed on {} channel(s) (mask {failed_mask:#06x}): {last}",
        .failed_mask.count_ones()
    )]
    HardwareWrite { failed_mask: u16, last: String },
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("no trigger received for {0:?}")]
    TriggerTimeout(Duration),
    #[error("write failure limit reached after {0} failed frames")]
    WriteFailureLimit(u32),
    #[error("stopped by request")]
    Stopped,
}

impl ShimError {
    /// DAC channels whose write failed, for `HardwareWrite`.
    pub fn failed_channels(&self) -> impl Iterator<Item = u8> + '_ {
        let mask = match self {
            ShimError::HardwareWrite { failed_mask, .. } => *failed_mask,
            _ => 0,
        };
        (0..16u8).filter(move |ch| mask & (1 << ch) != 0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing dac")]
    MissingDac,
    #[error("missing shim value table")]
    MissingTable,
    #[error("missing trigger clock")]
    MissingTrigger,
    #[error(
        "channel order entry {entry} for dac channel {channel} is outside the {width}-column table"
    )]
    ChannelOutOfRange {
        channel: usize,
        entry: usize,
        width: usize,
    },
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
