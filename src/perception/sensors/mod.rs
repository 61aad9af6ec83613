//! Sensor interfaces for the motion core
//!
//! The control loops need exactly two readings from the platform: a
//! single-axis angular rate and a forward range. Implementations report
//! failures as `Error::SensorUnavailable`.

pub mod mpu6050;

use crate::error::Result;

/// A generic sensor interface
pub trait Sensor {
    /// Get the sensor name
    fn name(&self) -> &str;
}

/// Single-axis angular rate sensor (yaw), counter-clockwise positive
pub trait RateSensor: Sensor + Send {
    /// Read the current rate in degrees per second
    fn read_rate_dps(&mut self) -> Result<f64>;
}

/// Forward-facing distance sensor
pub trait RangeSensor: Sensor + Send {
    /// Read the current distance in centimetres
    fn read_distance_cm(&mut self) -> Result<f64>;
}
