//! Error types for the motion core

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Failures that terminate a command or prevent it from starting.
///
/// Obstacle stops, turn timeouts and cancellations are ordinary outcomes and
/// live in the controller outcome enums instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Gyro or range sensor could not be read
    #[error("Sensor unavailable ({sensor}): {reason}")]
    SensorUnavailable {
        /// Name of the failing sensor
        sensor: String,
        /// Driver supplied reason
        reason: String,
    },

    /// Motor output could not be written
    #[error("Actuator fault: {0}")]
    ActuatorFault(String),

    /// Command parameters out of range
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Calibration requested while the wheels are being driven
    #[error("Calibration skipped: robot is not stationary")]
    CalibrationSkipped,

    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Control thread is not running or went away
    #[error("Motion service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Lifecycle transition not allowed in the current state
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialisation error
    #[error("Config write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    /// JSON command batch could not be decoded
    #[error("Command batch error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a `SensorUnavailable` error from a sensor name and any displayable reason
    pub fn sensor(sensor: &str, reason: impl std::fmt::Display) -> Self {
        Error::SensorUnavailable {
            sensor: sensor.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for failures that mean the hardware can no longer be trusted
    pub fn is_hardware_fault(&self) -> bool {
        matches!(
            self,
            Error::SensorUnavailable { .. } | Error::ActuatorFault(_)
        )
    }
}
