//! Routed, quantized writes of a setpoint vector to every DAC channel.

use shim_traits::Dac;

use crate::error::ShimError;
use crate::hw_error::map_hw_error;
use crate::quantize::{DacCode, quantize};
use crate::routing::ChannelRouter;

pub struct DacOutput<D: Dac> {
    dac: D,
    router: ChannelRouter,
}

impl<D: Dac> core::fmt::Debug for DacOutput<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DacOutput")
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

impl<D: Dac> DacOutput<D> {
    pub fn new(dac: D, router: ChannelRouter) -> Self {
        Self { dac, router }
    }

    pub fn router(&self) -> &ChannelRouter {
        &self.router
    }

    /// Single transfer to one channel.
    pub fn write(&mut self, channel: u8, code: DacCode) -> Result<(), ShimError> {
        self.dac
            .write(channel, code.0)
            .map_err(|e| map_hw_error(&*e))
    }

    /// Write `setpoints[route(i)]` to DAC channel `i` for every routed channel.
    ///
    /// Every channel is attempted; failures are collected into one
    /// `HardwareWrite` error.
    pub fn apply_all(&mut self, setpoints: &[f32]) -> Result<(), ShimError> {
        debug_assert!(
            self.router.columns().iter().all(|&c| c < setpoints.len()),
            "setpoint vector narrower than the routed columns"
        );
        let mut failed_mask = 0u16;
        let mut last = None;
        for (ch, &col) in self.router.columns().iter().enumerate() {
            let code = quantize(setpoints.get(col).copied().unwrap_or(0.0));
            #[allow(clippy::cast_possible_truncation)]
            let channel = ch as u8;
            if let Err(e) = self
                .dac
                .write(channel, code.0)
                .map_err(|e| map_hw_error(&*e))
            {
                tracing::debug!(channel, code = code.0, error = %e, "dac write failed");
                failed_mask |= 1 << ch;
                last = Some(e.to_string());
            }
        }
        match last {
            None => Ok(()),
            Some(last) => Err(ShimError::HardwareWrite { failed_mask, last }),
        }
    }
}
