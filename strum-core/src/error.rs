//! Error types for the pitch detection core.

use thiserror::Error;

/// Errors surfaced by the detection pipeline and its collaborators.
///
/// A cycle that runs to completion without finding a periodic signal is
/// *not* an error; estimators report that as `Ok(None)`.
#[derive(Debug, Error)]
pub enum TunerError {
    /// A caller precondition was violated (empty buffer, bad time step, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be parsed or failed validation.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The sampler could not deliver a frame.
    #[error("Capture error: {0}")]
    Capture(String),

    /// A telemetry sink rejected a record.
    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TunerError>;
