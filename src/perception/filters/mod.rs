//! Filtering for sensor data

/// A generic filter interface
pub trait Filter<T> {
    /// Filter the input data
    fn filter(&self, input: T) -> T;
}

/// Zeroes inputs whose magnitude is below a threshold.
///
/// Used on gyro rates to stop bias drift from accumulating while the robot
/// is still, and on heading errors to keep the hold loop from chasing noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deadband {
    threshold: f64,
}

impl Deadband {
    pub fn new(threshold: f64) -> Self {
        Deadband {
            threshold: threshold.abs(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Filter<f64> for Deadband {
    fn filter(&self, input: f64) -> f64 {
        if input.abs() < self.threshold {
            0.0
        } else {
            input
        }
    }
}
