pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Multi-channel DAC driving the shim amplifier inputs.
///
/// One call is one synchronous bus transfer; implementations are not required
/// to be reentrant.
pub trait Dac {
    fn write(
        &mut self,
        channel: u8,
        code: u16,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: Dac + ?Sized> Dac for Box<T> {
    fn write(
        &mut self,
        channel: u8,
        code: u16,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).write(channel, code)
    }
}
