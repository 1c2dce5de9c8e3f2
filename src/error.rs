use thiserror::Error;

/// PDR engine error types
///
/// Only configuration problems surface as errors. Numeric edge cases in the
/// sample stream are absorbed by the estimators and reported as events.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PdrError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown angle range mode: {0}")]
    UnknownAngleRange(String),

    #[error("Invalid timestep: {0} ms")]
    InvalidTimestep(f64),
}

/// Result type for engine construction and validation
pub type PdrResult<T> = Result<T, PdrError>;
