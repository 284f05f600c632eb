//! Scanner trigger input on a GPIO pin.

use rppal::gpio::{Gpio, InputPin, Level, Trigger};

use crate::error::{HwError, Result};

/// Rising-edge trigger input. The callback runs on rppal's interrupt thread
/// for as long as this value is alive.
pub struct TriggerPin {
    pin: InputPin,
}

impl TriggerPin {
    /// Attach `on_edge` to rising edges on BCM pin `bcm`.
    pub fn attach<F>(bcm: u8, mut on_edge: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut pin = gpio
            .get(bcm)
            .map_err(|e| HwError::Gpio(format!("open trigger pin {bcm}: {e}")))?
            .into_input_pulldown();
        pin.set_async_interrupt(Trigger::RisingEdge, move |level: Level| {
            if level == Level::High {
                on_edge();
            }
        })
        .map_err(|e| HwError::Gpio(format!("trigger interrupt on pin {bcm}: {e}")))?;
        tracing::info!(pin = bcm, "trigger input armed (rising edge)");
        Ok(Self { pin })
    }
}

impl Drop for TriggerPin {
    fn drop(&mut self) {
        if let Err(e) = self.pin.clear_async_interrupt() {
            tracing::warn!(error = %e, "failed to clear trigger interrupt");
        }
    }
}
