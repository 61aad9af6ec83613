//! Obstacle guard

use super::sensors::RangeSensor;
use crate::error::{Error, Result};

/// Wraps the forward range sensor and trips on a single close reading.
///
/// No smoothing or debouncing: one reading below the threshold is enough to
/// stop forward motion.
pub struct ObstacleGuard {
    sensor: Box<dyn RangeSensor>,
    latest_cm: Option<f64>,
}

impl ObstacleGuard {
    pub fn new(sensor: Box<dyn RangeSensor>) -> Self {
        ObstacleGuard {
            sensor,
            latest_cm: None,
        }
    }

    /// Take a fresh reading in centimetres
    pub fn poll(&mut self) -> Result<f64> {
        let distance = self.sensor.read_distance_cm()?;
        // +inf is a legitimate "no echo" reading
        if distance.is_nan() || distance < 0.0 {
            self.latest_cm = None;
            return Err(Error::sensor(
                self.sensor.name(),
                format!("implausible distance {}", distance),
            ));
        }
        self.latest_cm = Some(distance);
        Ok(distance)
    }

    /// True iff the latest reading is below `threshold_cm`
    pub fn is_blocked(&self, threshold_cm: f64) -> bool {
        self.latest_cm.map_or(false, |d| d < threshold_cm)
    }

    /// Most recent successful reading
    pub fn latest(&self) -> Option<f64> {
        self.latest_cm
    }

    pub fn into_sensor(self) -> Box<dyn RangeSensor> {
        self.sensor
    }
}
