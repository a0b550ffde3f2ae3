use thiserror::Error;

/// Errors raised by the motion-to-decision-to-actuation pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The recording window closed without a single accepted sample.
    #[error("session recorded zero samples")]
    EmptySession,

    /// A converted reading was NaN or infinite and was not fed to the filter.
    #[error("non-finite sensor reading on {axis}: {value}")]
    InvalidSensorReading { axis: &'static str, value: f64 },

    #[error("invalid drive parameter: {0}")]
    InvalidDriveParameter(String),

    /// Operator interrupt observed while driving the motor.
    #[error("drive aborted by operator")]
    Aborted,

    /// A hardware collaborator reported a failure.
    #[error("hardware failure: {0}")]
    Hardware(String),
}

pub type Result<T> = std::result::Result<T, Error>;
