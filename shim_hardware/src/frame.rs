//! Register-level framing for the 16-channel shim DAC.
//!
//! Every transfer is three bytes: a register address followed by a big-endian
//! 16-bit value. The same framing is used for the one-off calibration
//! registers written at start-up and for the per-channel output codes.

use crate::error::{HwError, Result};

/// Number of output channels on the DAC.
pub const DAC_CHANNELS: u8 = 16;

/// Bytes per SPI transfer.
pub const FRAME_LEN: usize = 3;

pub type Frame = [u8; FRAME_LEN];

/// Common offset register, first DAC group.
pub const REG_COMMON_OFFSET_0: u8 = 0x02;
/// Common offset register, second DAC group.
pub const REG_COMMON_OFFSET_1: u8 = 0x03;
/// Per-channel gain register base (`+ channel`).
pub const REG_GAIN_BASE: u8 = 0x48;
/// Per-channel offset register base (`+ channel`).
pub const REG_OFFSET_BASE: u8 = 0x88;
/// Per-channel output data register base (`+ channel`).
pub const REG_DATA_BASE: u8 = 0xC8;

/// Values programmed into the calibration registers at start-up.
///
/// The common offset must stay 8 times smaller than the channel gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DacRegisters {
    pub common_offset: u16,
    /// Gain applied per channel; `0x6AAA` converts the 12 V span to 5 V.
    pub channel_gain: u16,
    pub channel_offset: u16,
}

impl Default for DacRegisters {
    fn default() -> Self {
        Self {
            common_offset: 0x09C0,
            channel_gain: 0x6AAA,
            channel_offset: 0x8000,
        }
    }
}

#[inline]
fn frame(register: u8, value: u16) -> Frame {
    let [hi, lo] = value.to_be_bytes();
    [register, hi, lo]
}

#[inline]
fn check_channel(channel: u8) -> Result<()> {
    if channel >= DAC_CHANNELS {
        return Err(HwError::Channel(channel));
    }
    Ok(())
}

/// Frame that sets the output code of one channel.
pub fn data_frame(channel: u8, code: u16) -> Result<Frame> {
    check_channel(channel)?;
    Ok(frame(REG_DATA_BASE + channel, code))
}

/// Start-up sequence: both common offsets, then gain and offset for every channel.
pub fn init_frames(regs: &DacRegisters) -> Vec<Frame> {
    let mut out = Vec::with_capacity(2 + 2 * usize::from(DAC_CHANNELS));
    out.push(frame(REG_COMMON_OFFSET_0, regs.common_offset));
    out.push(frame(REG_COMMON_OFFSET_1, regs.common_offset));
    for ch in 0..DAC_CHANNELS {
        out.push(frame(REG_GAIN_BASE + ch, regs.channel_gain));
        out.push(frame(REG_OFFSET_BASE + ch, regs.channel_offset));
    }
    out
}
