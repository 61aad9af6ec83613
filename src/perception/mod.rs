//! Perception: gyro heading and forward obstacle detection
pub mod filters;
pub mod heading;
pub mod obstacle;
pub mod sensors;

pub use self::heading::HeadingEstimator;
pub use self::obstacle::ObstacleGuard;
pub use self::sensors::{RangeSensor, RateSensor, Sensor};
