//! Platform boundary: time source and the hardware bundle handed to the
//! control thread.
pub mod mock;
pub mod sim;

use crate::control::drivetrain::WheelDrive;
use crate::perception::sensors::{RangeSensor, RateSensor};
use std::time::{Duration, Instant};

/// Monotonic time source with a blocking sleep.
///
/// Controllers take every timestamp and every pause from here, so tests and
/// the simulator can run on virtual time.
pub trait Clock: Send {
    /// Time elapsed since the clock's epoch
    fn now(&self) -> Duration;

    /// Block for `duration`
    fn sleep(&mut self, duration: Duration);
}

/// Wall-clock implementation backed by `Instant`
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Everything the control thread owns exclusively
pub struct Hardware {
    pub clock: Box<dyn Clock>,
    pub gyro: Box<dyn RateSensor>,
    pub range: Box<dyn RangeSensor>,
    pub wheels: Box<dyn WheelDrive>,
}

impl Hardware {
    pub fn new(
        clock: Box<dyn Clock>,
        gyro: Box<dyn RateSensor>,
        range: Box<dyn RangeSensor>,
        wheels: Box<dyn WheelDrive>,
    ) -> Self {
        Hardware {
            clock,
            gyro,
            range,
            wheels,
        }
    }
}
