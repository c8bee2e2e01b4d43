use thiserror::Error;

/// Fatal operation faults; only reachable as the payload of the Error mode.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FaultCode {
    #[error("weight sensor stopped producing conversions")]
    SensorTimeout,
    #[error("no water flow (kettle removed or weight not increasing)")]
    NoFlow,
    #[error("fill exceeded its time limit")]
    FillTimeout,
}

impl FaultCode {
    pub fn name(self) -> &'static str {
        match self {
            Self::SensorTimeout => "SensorTimeout",
            Self::NoFlow => "NoFlow",
            Self::FillTimeout => "FillTimeout",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("calibration record does not fit: {len} bytes at {addr} in a {size}-byte image")]
    OutOfRange { addr: usize, len: usize, size: usize },
    #[error("store i/o failed: {0}")]
    Io(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("empty weight {grams:.1} g outside plausible range ({min:.0}, {max:.0}) g")]
    InvalidCalibrationWeight { grams: f32, min: f32, max: f32 },
    #[error("known weight must be a positive number of grams, got {0}")]
    InvalidKnownWeight(f32),
    #[error("no raw conversions available")]
    NoSamples,
    #[error("computed factor {0} is not usable (is the reference mass on the scale?)")]
    DegenerateFactor(f32),
    #[error("calibration could not be persisted: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing load cell")]
    MissingLoadCell,
    #[error("missing button input")]
    MissingButton,
    #[error("missing actuator outputs")]
    MissingActuators,
    #[error("missing calibration store")]
    MissingStore,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
