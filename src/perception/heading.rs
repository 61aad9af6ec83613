//! Heading estimation from a single-axis gyro
//!
//! The heading is relative: it is zeroed at the start of every command and
//! integrated from bias-corrected yaw rate, wrapped into (-180, 180].

use super::filters::{Deadband, Filter};
use super::sensors::RateSensor;
use crate::common::wrap_degrees;
use crate::config::HeadingConfig;
use crate::control::drivetrain::Drivetrain;
use crate::error::{Error, Result};
use crate::platform::Clock;
use std::time::Duration;

/// Integrates yaw rate into a bounded heading
pub struct HeadingEstimator {
    gyro: Box<dyn RateSensor>,
    heading: f64,
    offset: f64,
    stationary: Deadband,
    last_sample: Option<Duration>,
}

impl HeadingEstimator {
    pub fn new(gyro: Box<dyn RateSensor>, config: &HeadingConfig) -> Self {
        HeadingEstimator {
            gyro,
            heading: 0.0,
            offset: 0.0,
            stationary: Deadband::new(config.stationary_threshold_dps),
            last_sample: None,
        }
    }

    /// Average `samples` raw readings into the bias offset.
    ///
    /// Refused with `CalibrationSkipped` while the drivetrain is moving. Zero
    /// samples leaves a zero offset.
    pub fn calibrate(
        &mut self,
        samples: usize,
        interval: Duration,
        clock: &mut dyn Clock,
        drivetrain: &Drivetrain,
    ) -> Result<f64> {
        if !drivetrain.is_stationary() {
            log::warn!("Gyro calibration refused: wheels are being driven");
            return Err(Error::CalibrationSkipped);
        }
        if samples == 0 {
            log::warn!("Gyro calibration requested with zero samples, using zero offset");
            self.offset = 0.0;
            return Ok(self.offset);
        }

        log::info!("Calibrating gyro over {} samples, keep the robot still", samples);
        let mut total = 0.0;
        for i in 0..samples {
            total += self.read_raw()?;
            clock.sleep(interval);
            if (i + 1) % 50 == 0 {
                log::debug!("Calibration progress: {}/{}", i + 1, samples);
            }
        }
        self.offset = total / samples as f64;
        log::info!("Gyro calibration complete, offset {:.3}°/s", self.offset);
        Ok(self.offset)
    }

    fn read_raw(&mut self) -> Result<f64> {
        let rate = self.gyro.read_rate_dps()?;
        if !rate.is_finite() {
            return Err(Error::sensor(
                self.gyro.name(),
                format!("non-finite rate {}", rate),
            ));
        }
        Ok(rate)
    }

    /// Bias-corrected rate with stationary noise suppressed
    pub fn rate(&mut self) -> Result<f64> {
        let rate = self.read_raw()? - self.offset;
        Ok(self.stationary.filter(rate))
    }

    /// Read one rate sample and integrate it over `dt`
    pub fn update_heading(&mut self, dt: Duration) -> Result<f64> {
        if dt.is_zero() {
            return Ok(self.heading);
        }
        let rate = self.rate()?;
        self.heading = wrap_degrees(self.heading + rate * dt.as_secs_f64());
        Ok(self.heading)
    }

    /// Integrate from the previous sample time up to `now`
    pub fn sample(&mut self, now: Duration) -> Result<f64> {
        let dt = match self.last_sample {
            Some(last) => now.saturating_sub(last),
            None => Duration::ZERO,
        };
        let heading = self.update_heading(dt)?;
        self.last_sample = Some(now);
        Ok(heading)
    }

    /// Zero the heading and restart integration at `now`
    pub fn reset_heading(&mut self, now: Duration) {
        self.heading = 0.0;
        self.last_sample = Some(now);
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn into_sensor(self) -> Box<dyn RateSensor> {
        self.gyro
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::WheelCommand;
    use crate::platform::mock::{ManualClock, RecordingWheels, ScriptedRateSensor};
    use approx::assert_abs_diff_eq;

    const TICK: Duration = Duration::from_millis(20);

    fn estimator(rates: Vec<f64>) -> HeadingEstimator {
        HeadingEstimator::new(
            Box::new(ScriptedRateSensor::new(rates)),
            &HeadingConfig::default(),
        )
    }

    #[test]
    fn test_reset_then_read_is_zero() {
        let mut est = estimator(vec![50.0]);
        est.update_heading(Duration::from_secs(1)).unwrap();
        assert_abs_diff_eq!(est.heading(), 50.0, epsilon = 1e-9);
        est.reset_heading(Duration::from_secs(1));
        assert_eq!(est.heading(), 0.0);
    }

    #[test]
    fn test_integrates_rate_times_dt() {
        let mut est = estimator(vec![10.0, 10.0, -5.0]);
        est.update_heading(Duration::from_millis(500)).unwrap();
        est.update_heading(Duration::from_millis(500)).unwrap();
        assert_abs_diff_eq!(est.heading(), 10.0, epsilon = 1e-9);
        est.update_heading(Duration::from_secs(1)).unwrap();
        assert_abs_diff_eq!(est.heading(), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_dt_does_not_read_sensor() {
        let gyro = ScriptedRateSensor::new(vec![100.0]);
        let reads = gyro.read_counter();
        let mut est = HeadingEstimator::new(Box::new(gyro), &HeadingConfig::default());
        est.reset_heading(Duration::from_secs(2));
        assert_eq!(est.sample(Duration::from_secs(2)).unwrap(), 0.0);
        assert_eq!(reads.get(), 0);
        est.sample(Duration::from_millis(2100)).unwrap();
        assert_eq!(reads.get(), 1);
        assert_abs_diff_eq!(est.heading(), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_stationary_noise_is_suppressed() {
        let mut est = estimator(vec![0.29, -0.2, 0.1, -0.29]);
        for _ in 0..4 {
            est.update_heading(Duration::from_secs(1)).unwrap();
        }
        assert_eq!(est.heading(), 0.0);
    }

    #[test]
    fn test_wraps_into_half_open_range() {
        let mut est = estimator(vec![170.0, 170.0, -400.0, 1e9, -7.5e8, f64::MAX / 4.0]);
        for _ in 0..6 {
            let h = est.update_heading(Duration::from_secs(1)).unwrap();
            assert!(h > -180.0 && h <= 180.0, "heading {} out of range", h);
        }
    }

    #[test]
    fn test_net_zero_rotation_returns_to_start() {
        let rates: Vec<f64> = [45.0, 90.0, -30.0, -105.0, 12.5, -12.5]
            .iter()
            .flat_map(|r| std::iter::repeat(*r).take(10))
            .collect();
        let mut est = estimator(rates.clone());
        for _ in 0..rates.len() {
            est.update_heading(TICK).unwrap();
        }
        assert!(est.heading().abs() <= 0.3);
    }

    #[test]
    fn test_non_finite_rate_is_sensor_error() {
        let mut est = estimator(vec![f64::NAN]);
        assert!(matches!(
            est.update_heading(TICK),
            Err(Error::SensorUnavailable { .. })
        ));
        assert_eq!(est.heading(), 0.0);
    }

    #[test]
    fn test_calibration_averages_and_removes_bias() {
        let mut samples = vec![1.0, 2.0, 3.0, 2.0];
        samples.extend([2.5, 2.5]);
        let mut est = estimator(samples);
        let mut clock = ManualClock::new();
        let drivetrain = Drivetrain::new(Box::new(RecordingWheels::new()));

        let offset = est
            .calibrate(4, Duration::from_millis(10), &mut clock, &drivetrain)
            .unwrap();
        assert_abs_diff_eq!(offset, 2.0, epsilon = 1e-12);
        assert_eq!(clock.now(), Duration::from_millis(40));

        // 2.5 - 2.0 is above the stationary threshold
        assert_abs_diff_eq!(est.rate().unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_calibration_with_zero_samples_gives_zero_offset() {
        let mut est = estimator(vec![5.0]);
        let mut clock = ManualClock::new();
        let drivetrain = Drivetrain::new(Box::new(RecordingWheels::new()));
        assert_eq!(
            est.calibrate(0, Duration::from_millis(10), &mut clock, &drivetrain)
                .unwrap(),
            0.0
        );
        assert_eq!(clock.now(), Duration::ZERO);
    }

    #[test]
    fn test_calibration_refused_while_moving() {
        let mut est = estimator(vec![5.0]);
        let mut clock = ManualClock::new();
        let mut drivetrain = Drivetrain::new(Box::new(RecordingWheels::new()));
        drivetrain
            .drive(WheelCommand::forward(0.5), WheelCommand::forward(0.5))
            .unwrap();

        assert!(matches!(
            est.calibrate(10, Duration::from_millis(10), &mut clock, &drivetrain),
            Err(Error::CalibrationSkipped)
        ));
        assert_eq!(est.offset(), 0.0);

        drivetrain.halt().unwrap();
        assert!(est
            .calibrate(2, Duration::from_millis(10), &mut clock, &drivetrain)
            .is_ok());
    }
}
