//! Motion commands and the JSON batches they arrive in
//!
//! Upstream sends a JSON array of objects tagged by `command`, e.g.
//! `[{"command": "turn_left", "degrees": 90}, {"command": "drive_forward", "seconds": 2}]`.
//! Parameters are optional and default to 2 s and 90°.

use crate::common::TurnDirection;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const DEFAULT_SECONDS: f64 = 2.0;
const DEFAULT_DEGREES: f64 = 90.0;

/// Tag used by the translator for requests the robot cannot perform
const UNSUPPORTED_TAG: &str = "unsupported";

fn default_seconds() -> f64 {
    DEFAULT_SECONDS
}

fn default_degrees() -> f64 {
    DEFAULT_DEGREES
}

/// The seven motion command kinds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum MotionCommand {
    DriveForward {
        #[serde(default = "default_seconds")]
        seconds: f64,
    },
    DriveBackward {
        #[serde(default = "default_seconds")]
        seconds: f64,
    },
    TurnLeft {
        #[serde(default = "default_degrees")]
        degrees: f64,
    },
    TurnRight {
        #[serde(default = "default_degrees")]
        degrees: f64,
    },
    TurnAround,
    Stop,
    DriveUntilObstacle,
}

impl MotionCommand {
    /// Check parameters before any hardware is touched.
    ///
    /// Durations must be finite and non-negative. Angles must lie in
    /// (0, 180]; a relative heading never exceeds 180° in magnitude, so a
    /// larger target could never be reached.
    pub fn validate(&self) -> Result<()> {
        match *self {
            MotionCommand::DriveForward { seconds } | MotionCommand::DriveBackward { seconds } => {
                to_duration(seconds).map(|_| ())
            }
            MotionCommand::TurnLeft { degrees } | MotionCommand::TurnRight { degrees } => {
                if !degrees.is_finite() || degrees <= 0.0 || degrees > 180.0 {
                    return Err(Error::InvalidCommand(format!(
                        "turn angle must be within (0, 180] degrees, got {}",
                        degrees
                    )));
                }
                Ok(())
            }
            MotionCommand::TurnAround | MotionCommand::Stop | MotionCommand::DriveUntilObstacle => {
                Ok(())
            }
        }
    }

    /// Validated run time for the timed drive commands
    pub fn duration(&self) -> Result<Option<Duration>> {
        match *self {
            MotionCommand::DriveForward { seconds } | MotionCommand::DriveBackward { seconds } => {
                to_duration(seconds).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Direction and angle for the turning commands
    pub fn turn(&self) -> Option<(TurnDirection, f64)> {
        match *self {
            MotionCommand::TurnLeft { degrees } => Some((TurnDirection::Left, degrees)),
            MotionCommand::TurnRight { degrees } => Some((TurnDirection::Right, degrees)),
            MotionCommand::TurnAround => Some((TurnDirection::Right, 180.0)),
            _ => None,
        }
    }

    /// Human readable description used for status events
    pub fn describe(&self) -> String {
        match *self {
            MotionCommand::DriveForward { seconds } => {
                format!("Driving forward for {} s", seconds)
            }
            MotionCommand::DriveBackward { seconds } => {
                format!("Driving backward for {} s", seconds)
            }
            MotionCommand::TurnLeft { degrees } => format!("Turning left {}°", degrees),
            MotionCommand::TurnRight { degrees } => format!("Turning right {}°", degrees),
            MotionCommand::TurnAround => "Turning around (180°)".to_string(),
            MotionCommand::Stop => "Stopping".to_string(),
            MotionCommand::DriveUntilObstacle => {
                "Driving forward until an obstacle is detected".to_string()
            }
        }
    }
}

impl fmt::Display for MotionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MotionCommand::DriveForward { .. } => "drive_forward",
            MotionCommand::DriveBackward { .. } => "drive_backward",
            MotionCommand::TurnLeft { .. } => "turn_left",
            MotionCommand::TurnRight { .. } => "turn_right",
            MotionCommand::TurnAround => "turn_around",
            MotionCommand::Stop => "stop",
            MotionCommand::DriveUntilObstacle => "drive_until_obstacle",
        };
        f.write_str(name)
    }
}

fn to_duration(seconds: f64) -> Result<Duration> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(Error::InvalidCommand(format!(
            "duration must be a finite, non-negative number of seconds, got {}",
            seconds
        )));
    }
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| Error::InvalidCommand(format!("duration {} s: {}", seconds, e)))
}

/// One element of a decoded batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEntry {
    Command(MotionCommand),
    /// Translator reply for a request outside the robot's abilities
    Notice(String),
    /// Raw JSON of an entry that is not a known command
    Unrecognized(String),
}

/// Decode a JSON command batch.
///
/// The batch itself must be a JSON array. Individual entries that do not
/// decode are kept as `Unrecognized` so the rest of the batch still runs.
pub fn parse_batch(json: &str) -> Result<Vec<BatchEntry>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
    Ok(values.into_iter().map(parse_entry).collect())
}

fn parse_entry(value: serde_json::Value) -> BatchEntry {
    if value.get("command").and_then(|c| c.as_str()) == Some(UNSUPPORTED_TAG) {
        let message = value
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("That command cannot be carried out");
        return BatchEntry::Notice(message.to_string());
    }

    let raw = value.to_string();
    match serde_json::from_value::<MotionCommand>(value) {
        Ok(command) => BatchEntry::Command(command),
        Err(e) => {
            log::warn!("Skipping unrecognized batch entry {}: {}", raw, e);
            BatchEntry::Unrecognized(raw)
        }
    }
}
