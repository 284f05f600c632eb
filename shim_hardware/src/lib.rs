pub mod error;
pub mod frame;
pub mod sim;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod spi_dac;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod trigger_pin;

pub use frame::DacRegisters;
pub use sim::{SimulatedDac, SimulatedTrigger};
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use spi_dac::SpiDac;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use trigger_pin::TriggerPin;
