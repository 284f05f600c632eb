//! In-memory DAC used by tests and the CLI self-check.

use std::sync::{Arc, Mutex};

use shim_traits::Dac;

/// Shared view of what a `RecordingDac` wrote.
#[derive(Debug, Clone, Default)]
pub struct WriteLog {
    writes: Arc<Mutex<Vec<(u8, u16)>>>,
}

impl WriteLog {
    /// Every successful `(channel, code)` write, in order.
    pub fn writes(&self) -> Vec<(u8, u16)> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.writes.lock().map(|w| w.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Last code written to `channel`.
    pub fn last_code(&self, channel: u8) -> Option<u16> {
        self.writes
            .lock()
            .ok()?
            .iter()
            .rev()
            .find(|(ch, _)| *ch == channel)
            .map(|(_, code)| *code)
    }

    pub fn clear(&self) {
        if let Ok(mut w) = self.writes.lock() {
            w.clear();
        }
    }

    fn push(&self, channel: u8, code: u16) {
        if let Ok(mut w) = self.writes.lock() {
            w.push((channel, code));
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingDac {
    log: WriteLog,
    failing: u16,
}

impl RecordingDac {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every write to `channel`.
    pub fn failing_on(mut self, channel: u8) -> Self {
        self.failing |= 1 << channel;
        self
    }

    pub fn log(&self) -> WriteLog {
        self.log.clone()
    }
}

impl Dac for RecordingDac {
    fn write(
        &mut self,
        channel: u8,
        code: u16,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if channel >= 16 {
            return Err(format!("dac channel {channel} out of range").into());
        }
        if self.failing & (1 << channel) != 0 {
            return Err(format!("write to channel {channel} rejected").into());
        }
        self.log.push(channel, code);
        Ok(())
    }
}
