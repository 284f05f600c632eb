use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("spi error: {0}")]
    Spi(String),
    #[error("dac channel {0} out of range")]
    Channel(u8),
    #[error("short spi transfer: wrote {written} of {expected} bytes")]
    ShortTransfer { written: usize, expected: usize },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
