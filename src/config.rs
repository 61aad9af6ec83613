//! Configuration for the motion core
//!
//! Loaded from a TOML file. Every section is optional and falls back to the
//! tuning of the reference robot (MPU-6050 gyro, HC-SR04 range sensor, L298N
//! driven DC motors).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GyroDriveConfig {
    pub heading: HeadingConfig,
    pub obstacle: ObstacleConfig,
    pub hold: HoldConfig,
    pub turn: TurnConfig,
    pub reverse: ReverseConfig,
    pub status: StatusConfig,
    pub logging: LoggingConfig,
    pub simulation: SimulationConfig,
}

/// Heading estimator tuning
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HeadingConfig {
    /// Rates below this magnitude (°/s) are treated as sensor noise
    pub stationary_threshold_dps: f64,
    /// Samples averaged by a calibration run
    pub calibration_samples: usize,
    /// Pause between calibration samples
    pub calibration_interval_ms: u64,
}

impl Default for HeadingConfig {
    fn default() -> Self {
        Self {
            stationary_threshold_dps: 0.3,
            calibration_samples: 200,
            calibration_interval_ms: 10,
        }
    }
}

impl HeadingConfig {
    pub fn calibration_interval(&self) -> Duration {
        Duration::from_millis(self.calibration_interval_ms)
    }
}

/// Obstacle guard tuning
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObstacleConfig {
    /// Forward motion stops when the range reading drops below this
    pub stop_distance_cm: f64,
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            stop_distance_cm: 40.0,
        }
    }
}

/// PID gains
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl PidGains {
    pub const fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }

    fn validate(&self, section: &str) -> Result<()> {
        if !(self.kp.is_finite() && self.ki.is_finite() && self.kd.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "{}: gains must be finite",
                section
            )));
        }
        Ok(())
    }
}

/// Straight-line heading-hold tuning
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HoldConfig {
    /// Base power for both wheels
    pub speed: f64,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Heading errors at or below this magnitude are ignored
    pub deadband_deg: f64,
    /// Correction is limited to ±max_correction before mixing
    pub max_correction: f64,
    pub tick_ms: u64,
}

impl Default for HoldConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            kp: 0.02,
            ki: 0.005,
            kd: 0.08,
            deadband_deg: 0.0,
            max_correction: 0.5,
            tick_ms: 20,
        }
    }
}

impl HoldConfig {
    pub fn gains(&self) -> PidGains {
        PidGains::new(self.kp, self.ki, self.kd)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// In-place turn tuning
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TurnConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Turn is complete once the remaining angle is at or below this
    pub tolerance_deg: f64,
    pub timeout_ms: u64,
    pub min_speed: f64,
    pub max_speed: f64,
    /// Converts the PID output (degrees) into a power magnitude
    pub speed_scale: f64,
    pub tick_ms: u64,
    /// Re-run gyro calibration before every turn
    pub recalibrate: bool,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            kp: 1.2,
            ki: 0.0,
            kd: 0.15,
            tolerance_deg: 1.0,
            timeout_ms: 10_000,
            min_speed: 0.15,
            max_speed: 0.5,
            speed_scale: 0.1,
            tick_ms: 20,
            recalibrate: false,
        }
    }
}

impl TurnConfig {
    pub fn gains(&self) -> PidGains {
        PidGains::new(self.kp, self.ki, self.kd)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// How `drive_backward` is carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReverseMode {
    /// Pivot 180° to the right, then hold heading forward
    TurnAround,
    /// Drive both wheels backward with a mirrored heading correction
    Reverse,
}

/// Backward motion tuning
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReverseConfig {
    pub mode: ReverseMode,
    /// Gains for the 180° pivot
    pub turn_gains: PidGains,
    /// Gains for the heading hold that follows
    pub hold_gains: PidGains,
}

impl Default for ReverseConfig {
    fn default() -> Self {
        Self {
            mode: ReverseMode::TurnAround,
            turn_gains: PidGains::new(1.0, 0.0, 0.0),
            hold_gains: PidGains::new(0.015, 0.005, 0.08),
        }
    }
}

/// Status feed retention
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StatusConfig {
    pub capacity: usize,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self { capacity: 20 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error); RUST_LOG overrides
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Simulated platform parameters
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Wheel surface speed at full power (m/s)
    pub wheel_top_speed: f64,
    /// Distance between the wheels (m)
    pub track_width: f64,
    /// Constant gyro bias (°/s)
    pub gyro_bias_dps: f64,
    /// Wall straight ahead of the start pose (m); none when absent
    pub wall_distance_m: Option<f64>,
    /// Range sensor saturation distance (cm)
    pub range_max_cm: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            wheel_top_speed: 0.5,
            track_width: 0.15,
            gyro_bias_dps: 0.0,
            wall_distance_m: Some(3.0),
            range_max_cm: 100.0,
        }
    }
}

impl GyroDriveConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: GyroDriveConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values the controllers cannot run with
    pub fn validate(&self) -> Result<()> {
        self.hold.gains().validate("hold")?;
        self.turn.gains().validate("turn")?;
        self.reverse.turn_gains.validate("reverse.turn_gains")?;
        self.reverse.hold_gains.validate("reverse.hold_gains")?;

        if self.hold.tick_ms == 0 || self.turn.tick_ms == 0 {
            return Err(Error::InvalidConfig("tick_ms must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.hold.speed) {
            return Err(Error::InvalidConfig("hold.speed must be within [0, 1]".into()));
        }
        if !(self.hold.max_correction >= 0.0) || !(self.hold.deadband_deg >= 0.0) {
            return Err(Error::InvalidConfig(
                "hold.max_correction and hold.deadband_deg must be non-negative".into(),
            ));
        }
        if !(0.0 <= self.turn.min_speed
            && self.turn.min_speed <= self.turn.max_speed
            && self.turn.max_speed <= 1.0)
        {
            return Err(Error::InvalidConfig(
                "turn speeds must satisfy 0 <= min_speed <= max_speed <= 1".into(),
            ));
        }
        if !(self.turn.tolerance_deg > 0.0) {
            return Err(Error::InvalidConfig("turn.tolerance_deg must be positive".into()));
        }
        if !(self.turn.speed_scale.is_finite()) {
            return Err(Error::InvalidConfig("turn.speed_scale must be finite".into()));
        }
        if !(self.heading.stationary_threshold_dps >= 0.0) {
            return Err(Error::InvalidConfig(
                "heading.stationary_threshold_dps must be non-negative".into(),
            ));
        }
        if !(self.obstacle.stop_distance_cm >= 0.0) {
            return Err(Error::InvalidConfig(
                "obstacle.stop_distance_cm must be non-negative".into(),
            ));
        }
        if self.status.capacity == 0 {
            return Err(Error::InvalidConfig("status.capacity must be at least 1".into()));
        }
        Ok(())
    }
}
