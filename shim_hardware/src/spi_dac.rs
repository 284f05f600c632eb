//! SPI-attached shim DAC on the Raspberry Pi.

use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use shim_traits::Dac;
use tracing::{debug, trace};

use crate::error::{HwError, Result};
use crate::frame::{self, DAC_CHANNELS, DacRegisters, FRAME_LEN, Frame};

pub struct SpiDac {
    spi: Spi,
}

fn bus(n: u8) -> Result<Bus> {
    Ok(match n {
        0 => Bus::Spi0,
        1 => Bus::Spi1,
        2 => Bus::Spi2,
        other => return Err(HwError::Spi(format!("unsupported spi bus {other}"))),
    })
}

fn slave_select(n: u8) -> Result<SlaveSelect> {
    Ok(match n {
        0 => SlaveSelect::Ss0,
        1 => SlaveSelect::Ss1,
        2 => SlaveSelect::Ss2,
        other => return Err(HwError::Spi(format!("unsupported slave select {other}"))),
    })
}

fn mode(n: u8) -> Result<Mode> {
    Ok(match n {
        0 => Mode::Mode0,
        1 => Mode::Mode1,
        2 => Mode::Mode2,
        3 => Mode::Mode3,
        other => return Err(HwError::Spi(format!("unsupported spi mode {other}"))),
    })
}

impl SpiDac {
    /// Open the bus. Does not touch the DAC registers; see `init_registers`.
    pub fn open(bus_n: u8, ss_n: u8, clock_hz: u32, mode_n: u8) -> Result<Self> {
        let spi = Spi::new(bus(bus_n)?, slave_select(ss_n)?, clock_hz, mode(mode_n)?)
            .map_err(|e| HwError::Spi(format!("open spi{bus_n}.{ss_n}: {e}")))?;
        debug!(bus = bus_n, ss = ss_n, clock_hz, mode = mode_n, "spi dac opened");
        Ok(Self { spi })
    }

    /// Program common offsets and per-channel gain/offset, then drive every
    /// output to midscale (0 A).
    pub fn init_registers(&mut self, regs: &DacRegisters) -> Result<()> {
        for f in frame::init_frames(regs) {
            self.transfer(&f)?;
        }
        for ch in 0..DAC_CHANNELS {
            self.transfer(&frame::data_frame(ch, 0x8000)?)?;
        }
        debug!(?regs, "dac registers initialised");
        Ok(())
    }

    fn transfer(&mut self, f: &Frame) -> Result<()> {
        let written = self
            .spi
            .write(f)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        if written != FRAME_LEN {
            return Err(HwError::ShortTransfer {
                written,
                expected: FRAME_LEN,
            });
        }
        trace!(frame = ?f, "spi frame");
        Ok(())
    }
}

impl Dac for SpiDac {
    fn write(
        &mut self,
        channel: u8,
        code: u16,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let f = frame::data_frame(channel, code)?;
        self.transfer(&f)?;
        Ok(())
    }
}
