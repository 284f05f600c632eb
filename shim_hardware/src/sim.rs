//! Simulated backends used when the `hardware` feature is off.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use shim_traits::Dac;

use crate::error::HwError;
use crate::frame::{self, DAC_CHANNELS};

/// In-memory DAC that keeps the last code written to every channel.
#[derive(Debug)]
pub struct SimulatedDac {
    codes: [u16; DAC_CHANNELS as usize],
    writes: u64,
    failing_channel: Option<u8>,
}

impl Default for SimulatedDac {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDac {
    pub fn new() -> Self {
        Self {
            codes: [0x8000; DAC_CHANNELS as usize],
            writes: 0,
            failing_channel: None,
        }
    }

    /// Make every write to `channel` fail with an SPI error.
    pub fn failing_on(mut self, channel: u8) -> Self {
        self.failing_channel = Some(channel);
        self
    }

    /// Last code written to `channel`, if the channel exists.
    pub fn code(&self, channel: u8) -> Option<u16> {
        self.codes.get(usize::from(channel)).copied()
    }

    /// Total number of successful writes.
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl Dac for SimulatedDac {
    fn write(
        &mut self,
        channel: u8,
        code: u16,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let frame = frame::data_frame(channel, code)?;
        if self.failing_channel == Some(channel) {
            return Err(Box::new(HwError::Spi(format!(
                "simulated transfer failure on channel {channel}"
            ))));
        }
        self.codes[usize::from(channel)] = code;
        self.writes = self.writes.saturating_add(1);
        tracing::trace!(channel, code, ?frame, "dac write (simulated)");
        Ok(())
    }
}

/// Background thread standing in for the scanner trigger line.
///
/// Calls `on_edge` once per `period` until dropped; the thread is woken and
/// joined on drop.
pub struct SimulatedTrigger {
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl SimulatedTrigger {
    pub fn spawn<F>(period: Duration, mut on_edge: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let period = period.max(Duration::from_micros(100));

        let join_handle = std::thread::spawn(move || {
            let mut next = Instant::now() + period;
            loop {
                let now = Instant::now();
                if now < next {
                    std::thread::park_timeout(next - now);
                }
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                // park_timeout may return early
                if Instant::now() >= next {
                    on_edge();
                    next += period;
                }
            }
            tracing::trace!("simulated trigger thread exiting");
        });
        tracing::debug!(period_us = period.as_micros() as u64, "simulated trigger started");

        Self {
            shutdown,
            join_handle: Some(join_handle),
        }
    }
}

impl Drop for SimulatedTrigger {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            handle.thread().unpark();
            if let Err(e) = handle.join() {
                tracing::warn!(?e, "simulated trigger thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_dac_records_last_code() {
        let mut dac = SimulatedDac::new();
        dac.write(3, 0x1234).unwrap();
        dac.write(3, 0x4321).unwrap();
        assert_eq!(dac.code(3), Some(0x4321));
        assert_eq!(dac.code(0), Some(0x8000));
        assert_eq!(dac.writes(), 2);
    }

    #[test]
    fn simulated_dac_rejects_unknown_channel() {
        let mut dac = SimulatedDac::new();
        assert!(dac.write(16, 0).is_err());
        assert_eq!(dac.writes(), 0);
    }

    #[test]
    fn failing_channel_errors_without_touching_others() {
        let mut dac = SimulatedDac::new().failing_on(2);
        assert!(dac.write(2, 0x0001).is_err());
        dac.write(1, 0x0001).unwrap();
        assert_eq!(dac.code(2), Some(0x8000));
        assert_eq!(dac.code(1), Some(0x0001));
    }
}
