//! Closed-loop motion control
pub mod cancel;
pub mod drivetrain;
pub mod heading_hold;
pub mod pid;
pub mod turn;

use self::cancel::CancelToken;
use self::drivetrain::Drivetrain;
use crate::config::GyroDriveConfig;
use crate::error::Result;
use crate::perception::{HeadingEstimator, ObstacleGuard};
use crate::platform::{Clock, Hardware};
use std::time::Duration;

pub use self::heading_hold::{HeadingHoldController, HoldLimit, HoldOutcome, HoldRequest};
pub use self::turn::{TurnController, TurnOutcome, TurnRequest};

/// Hardware-facing state owned by the control thread.
///
/// Only one controller borrows it at a time, which is what serialises
/// commands.
pub struct ControlContext {
    pub heading: HeadingEstimator,
    pub obstacle: ObstacleGuard,
    pub drivetrain: Drivetrain,
    pub clock: Box<dyn Clock>,
    pub cancel: CancelToken,
    calibration_samples: usize,
    calibration_interval: Duration,
}

impl ControlContext {
    pub fn new(hardware: Hardware, config: &GyroDriveConfig, cancel: CancelToken) -> Self {
        ControlContext {
            heading: HeadingEstimator::new(hardware.gyro, &config.heading),
            obstacle: ObstacleGuard::new(hardware.range),
            drivetrain: Drivetrain::new(hardware.wheels),
            clock: hardware.clock,
            cancel,
            calibration_samples: config.heading.calibration_samples,
            calibration_interval: config.heading.calibration_interval(),
        }
    }

    /// Hand the devices back, e.g. for a later re-activation
    pub fn into_hardware(self) -> Hardware {
        Hardware::new(
            self.clock,
            self.heading.into_sensor(),
            self.obstacle.into_sensor(),
            self.drivetrain.into_inner(),
        )
    }

    /// Run a gyro calibration with the configured sample count
    pub fn calibrate(&mut self) -> Result<f64> {
        self.heading.calibrate(
            self.calibration_samples,
            self.calibration_interval,
            self.clock.as_mut(),
            &self.drivetrain,
        )
    }

    /// Zero the heading at the current time
    pub fn reset_heading(&mut self) {
        let now = self.clock.now();
        self.heading.reset_heading(now);
    }

    /// Stop the wheels after a controller loop exits, whatever the result.
    ///
    /// When the loop already failed, a failing halt is logged and the
    /// original error is returned.
    pub fn halt_after<T>(&mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.drivetrain.halt()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(halt_err) = self.drivetrain.halt() {
                    log::error!("Halt after failure also failed: {}", halt_err);
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::WheelCommand;
    use crate::error::Error;
    use crate::platform::mock::{
        scripted_hardware, RecordingWheels, ScriptedRangeSensor, ScriptedRateSensor, WheelEvent,
    };

    #[test]
    fn test_halt_after_error_keeps_original_error() {
        let (hw, probes) = scripted_hardware(
            ScriptedRateSensor::new(vec![0.0]),
            ScriptedRangeSensor::new(vec![100.0]),
            RecordingWheels::new(),
        );
        let mut ctx = ControlContext::new(hw, &GyroDriveConfig::default(), CancelToken::new());
        ctx.drivetrain
            .drive(WheelCommand::forward(1.0), WheelCommand::forward(1.0))
            .unwrap();

        let result: Result<()> = ctx.halt_after(Err(Error::sensor("gyro", "gone")));
        assert!(matches!(result, Err(Error::SensorUnavailable { .. })));
        assert_eq!(probes.wheels.events().last(), Some(&WheelEvent::Halt));
        assert!(ctx.drivetrain.is_stationary());
    }

    #[test]
    fn test_calibrate_uses_configured_samples() {
        let (hw, probes) = scripted_hardware(
            ScriptedRateSensor::new(vec![0.5]),
            ScriptedRangeSensor::new(vec![100.0]),
            RecordingWheels::new(),
        );
        let mut config = GyroDriveConfig::default();
        config.heading.calibration_samples = 20;
        let mut ctx = ControlContext::new(hw, &config, CancelToken::new());

        assert_eq!(ctx.calibrate().unwrap(), 0.5);
        assert_eq!(probes.gyro_reads.get(), 20);
        assert_eq!(probes.clock.now(), Duration::from_millis(200));

        let hw = ctx.into_hardware();
        assert_eq!(hw.clock.now(), Duration::from_millis(200));
    }
}
