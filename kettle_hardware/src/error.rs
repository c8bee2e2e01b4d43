use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("hx711 conversion not ready")]
    NotReady,
    #[error("store access out of range: {len} bytes at {addr} (image is {size} bytes)")]
    OutOfRange { addr: usize, len: usize, size: usize },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
