//! Straight-line driving with gyro heading hold
//!
//! Both wheels run at a base power; a PID correction on the heading error is
//! added to one side and subtracted from the other. The heading is zeroed when
//! the run starts, so the controller holds whatever orientation the robot had
//! at that moment. Forward runs check the obstacle guard every tick before
//! computing a correction.

use super::pid::Pid;
use super::ControlContext;
use crate::common::{WheelCommand, WheelDirection};
use crate::config::{HoldConfig, ObstacleConfig, PidGains};
use crate::error::Result;
use crate::perception::filters::{Deadband, Filter};
use std::time::Duration;

/// When a hold run ends on its own
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HoldLimit {
    /// Stop once this much time has elapsed
    For(Duration),
    /// Run until the obstacle guard trips
    UntilObstacle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldRequest {
    pub direction: WheelDirection,
    pub limit: HoldLimit,
}

impl HoldRequest {
    pub fn forward(duration: Duration) -> Self {
        HoldRequest {
            direction: WheelDirection::Forward,
            limit: HoldLimit::For(duration),
        }
    }

    pub fn backward(duration: Duration) -> Self {
        HoldRequest {
            direction: WheelDirection::Backward,
            limit: HoldLimit::For(duration),
        }
    }

    pub fn until_obstacle() -> Self {
        HoldRequest {
            direction: WheelDirection::Forward,
            limit: HoldLimit::UntilObstacle,
        }
    }
}

/// How a hold run ended. The wheels are halted in every case.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HoldOutcome {
    /// Requested duration elapsed
    Completed {
        elapsed: Duration,
        ticks: u32,
        heading: f64,
    },
    /// Range reading dropped below the stop distance
    ObstacleStop {
        distance_cm: f64,
        elapsed: Duration,
        ticks: u32,
    },
    Cancelled { elapsed: Duration, ticks: u32 },
}

impl HoldOutcome {
    pub fn elapsed(&self) -> Duration {
        match self {
            HoldOutcome::Completed { elapsed, .. }
            | HoldOutcome::ObstacleStop { elapsed, .. }
            | HoldOutcome::Cancelled { elapsed, .. } => *elapsed,
        }
    }
}

/// PID heading-hold loop for straight travel
#[derive(Debug, Clone)]
pub struct HeadingHoldController {
    speed: f64,
    gains: PidGains,
    deadband: Deadband,
    max_correction: f64,
    tick: Duration,
    stop_distance_cm: f64,
}

impl HeadingHoldController {
    pub fn from_config(hold: &HoldConfig, obstacle: &ObstacleConfig) -> Self {
        HeadingHoldController {
            speed: hold.speed,
            gains: hold.gains(),
            deadband: Deadband::new(hold.deadband_deg),
            max_correction: hold.max_correction.abs(),
            tick: hold.tick(),
            stop_distance_cm: obstacle.stop_distance_cm,
        }
    }

    /// Same tuning with different gains
    pub fn with_gains(mut self, gains: PidGains) -> Self {
        self.gains = gains;
        self
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Drive until the limit, an obstacle, cancellation or a hardware error
    pub fn run(&self, ctx: &mut ControlContext, request: HoldRequest) -> Result<HoldOutcome> {
        log::info!(
            "Heading hold {:?} ({:?}) at speed {:.2}",
            request.direction,
            request.limit,
            self.speed
        );
        let result = self.control_loop(ctx, request);
        ctx.halt_after(result)
    }

    fn control_loop(&self, ctx: &mut ControlContext, request: HoldRequest) -> Result<HoldOutcome> {
        let start = ctx.clock.now();
        ctx.heading.reset_heading(start);
        let mut pid = Pid::new(self.gains, start, 0.0);
        let mut ticks = 0u32;

        loop {
            let now = ctx.clock.now();
            let elapsed = now.saturating_sub(start);

            if let HoldLimit::For(duration) = request.limit {
                if elapsed >= duration {
                    let heading = ctx.heading.heading();
                    log::info!(
                        "Heading hold complete after {:.2}s, heading {:.2}°",
                        elapsed.as_secs_f64(),
                        heading
                    );
                    return Ok(HoldOutcome::Completed {
                        elapsed,
                        ticks,
                        heading,
                    });
                }
            }

            if ctx.cancel.is_cancelled() {
                log::info!("Heading hold cancelled after {} ticks", ticks);
                return Ok(HoldOutcome::Cancelled { elapsed, ticks });
            }

            // The range sensor faces forward; it says nothing about reversing
            if request.direction == WheelDirection::Forward {
                let distance_cm = ctx.obstacle.poll()?;
                if ctx.obstacle.is_blocked(self.stop_distance_cm) {
                    log::info!("Obstacle detected at {:.1} cm, stopping", distance_cm);
                    return Ok(HoldOutcome::ObstacleStop {
                        distance_cm,
                        elapsed,
                        ticks,
                    });
                }
            }

            let heading = ctx.heading.sample(now)?;
            let error = self.deadband.filter(heading);
            let terms = pid.update(error, now);
            let correction = self.limit_correction(terms.output());
            let (left, right) = self.wheel_commands(request.direction, correction);
            ctx.drivetrain.drive(left, right)?;

            log::debug!(
                "Heading {:.2}° | error {:.2}° | P {:.3} I {:.3} D {:.3} | correction {:.3} | L {:.2} R {:.2}",
                heading,
                error,
                terms.p,
                terms.i,
                terms.d,
                correction,
                left.power.value(),
                right.power.value()
            );

            ticks += 1;
            ctx.clock.sleep(self.tick);
        }
    }

    fn limit_correction(&self, correction: f64) -> f64 {
        if correction.is_nan() {
            0.0
        } else {
            correction.clamp(-self.max_correction, self.max_correction)
        }
    }

    /// Mix a heading correction into per-wheel commands.
    ///
    /// A positive heading (counter-clockwise drift) speeds up the wheel that
    /// turns the chassis back clockwise: the left one going forward, the
    /// right one going backward.
    pub fn wheel_commands(
        &self,
        direction: WheelDirection,
        correction: f64,
    ) -> (WheelCommand, WheelCommand) {
        let (left, right) = match direction {
            WheelDirection::Forward => (self.speed + correction, self.speed - correction),
            WheelDirection::Backward => (self.speed - correction, self.speed + correction),
        };
        (
            WheelCommand::new(direction, left),
            WheelCommand::new(direction, right),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Power;
    use crate::control::cancel::CancelToken;
    use crate::config::GyroDriveConfig;
    use crate::error::Error;
    use crate::platform::Clock;
    use crate::platform::mock::{
        scripted_hardware, MockProbes, RecordingWheels, ScriptedRangeSensor, ScriptedRateSensor,
        WheelEvent,
    };

    fn setup(
        gyro: ScriptedRateSensor,
        range: ScriptedRangeSensor,
    ) -> (ControlContext, MockProbes, HeadingHoldController) {
        let config = GyroDriveConfig::default();
        let (hw, probes) = scripted_hardware(gyro, range, RecordingWheels::new());
        let ctx = ControlContext::new(hw, &config, CancelToken::new());
        let controller = HeadingHoldController::from_config(&config.hold, &config.obstacle);
        (ctx, probes, controller)
    }

    #[test]
    fn test_runs_for_duration_on_fixed_ticks() {
        let (mut ctx, probes, hold) = setup(
            ScriptedRateSensor::new(vec![0.0]),
            ScriptedRangeSensor::new(vec![100.0]),
        );
        let outcome = hold
            .run(&mut ctx, HoldRequest::forward(Duration::from_secs(1)))
            .unwrap();

        assert_eq!(
            outcome,
            HoldOutcome::Completed {
                elapsed: Duration::from_secs(1),
                ticks: 50,
                heading: 0.0
            }
        );
        assert_eq!(probes.wheels.drive_count(), 50);
        assert!(probes.wheels.ends_halted());
        assert_eq!(probes.range_reads.get(), 50);
    }

    #[test]
    fn test_obstacle_after_tick_five_aborts_at_tick_six() {
        let (mut ctx, probes, hold) = setup(
            ScriptedRateSensor::new(vec![0.0]),
            ScriptedRangeSensor::new(vec![100.0, 100.0, 100.0, 100.0, 100.0, 12.0]),
        );
        let outcome = hold
            .run(&mut ctx, HoldRequest::forward(Duration::from_secs(1)))
            .unwrap();

        assert_eq!(
            outcome,
            HoldOutcome::ObstacleStop {
                distance_cm: 12.0,
                elapsed: Duration::from_millis(100),
                ticks: 5
            }
        );
        assert_eq!(probes.range_reads.get(), 6);
        assert_eq!(probes.wheels.drive_count(), 5);
        assert!(probes.wheels.ends_halted());
        assert_eq!(probes.clock.now(), Duration::from_millis(100));
    }

    #[test]
    fn test_until_obstacle_has_no_time_cap() {
        let mut distances = vec![90.0; 1000];
        distances.push(35.0);
        let (mut ctx, probes, hold) = setup(
            ScriptedRateSensor::new(vec![0.0]),
            ScriptedRangeSensor::new(distances),
        );
        let outcome = hold.run(&mut ctx, HoldRequest::until_obstacle()).unwrap();

        assert!(matches!(outcome, HoldOutcome::ObstacleStop { ticks: 1000, .. }));
        assert_eq!(outcome.elapsed(), Duration::from_secs(20));
        assert!(probes.wheels.ends_halted());
    }

    #[test]
    fn test_drift_is_corrected_toward_start_heading() {
        // Constant counter-clockwise drift of 10°/s
        let (mut ctx, probes, hold) = setup(
            ScriptedRateSensor::new(vec![10.0]),
            ScriptedRangeSensor::new(vec![100.0]),
        );
        hold.run(&mut ctx, HoldRequest::forward(Duration::from_millis(200)))
            .unwrap();

        let events = probes.wheels.events();
        let Some(WheelEvent::Drive(left, right)) = events.iter().rev().nth(1).copied() else {
            panic!("expected a drive event before the halt");
        };
        assert!(left.power.value() > right.power.value());
        assert_eq!(left.direction, WheelDirection::Forward);
        assert_eq!(right.direction, WheelDirection::Forward);
    }

    #[test]
    fn test_backward_mirrors_correction_and_skips_guard() {
        let (mut ctx, probes, hold) = setup(
            ScriptedRateSensor::new(vec![10.0]),
            ScriptedRangeSensor::new(vec![5.0]),
        );
        let outcome = hold
            .run(&mut ctx, HoldRequest::backward(Duration::from_millis(200)))
            .unwrap();

        assert!(matches!(outcome, HoldOutcome::Completed { ticks: 10, .. }));
        assert_eq!(probes.range_reads.get(), 0);
        let (left, right) = hold.wheel_commands(WheelDirection::Backward, 0.25);
        assert_eq!(left, WheelCommand::backward(0.75));
        assert_eq!(right, WheelCommand::backward(1.0));
    }

    #[test]
    fn test_gyro_failure_halts_and_reports() {
        let (mut ctx, probes, hold) = setup(
            ScriptedRateSensor::new(vec![0.0]).failing_after(3),
            ScriptedRangeSensor::new(vec![100.0]),
        );
        let result = hold.run(&mut ctx, HoldRequest::forward(Duration::from_secs(1)));

        assert!(matches!(result, Err(Error::SensorUnavailable { .. })));
        assert!(probes.wheels.ends_halted());
        assert!(ctx.drivetrain.is_stationary());
    }

    #[test]
    fn test_range_failure_halts_and_reports() {
        let (mut ctx, probes, hold) = setup(
            ScriptedRateSensor::new(vec![0.0]),
            ScriptedRangeSensor::new(vec![100.0]).failing_after(4),
        );
        let result = hold.run(&mut ctx, HoldRequest::until_obstacle());

        assert!(matches!(result, Err(Error::SensorUnavailable { .. })));
        assert_eq!(probes.range_reads.get(), 5);
        assert_eq!(probes.wheels.drive_count(), 4);
        assert!(probes.wheels.ends_halted());
        assert!(ctx.drivetrain.is_stationary());
    }

    #[test]
    fn test_cancel_stops_at_next_tick() {
        let (mut ctx, probes, hold) = setup(
            ScriptedRateSensor::new(vec![0.0]),
            ScriptedRangeSensor::new(vec![100.0]),
        );
        ctx.cancel.cancel();
        let outcome = hold.run(&mut ctx, HoldRequest::until_obstacle()).unwrap();

        assert_eq!(
            outcome,
            HoldOutcome::Cancelled {
                elapsed: Duration::ZERO,
                ticks: 0
            }
        );
        assert_eq!(probes.wheels.events(), vec![WheelEvent::Halt]);
    }

    #[test]
    fn test_wheel_power_always_in_range() {
        let config = GyroDriveConfig::default();
        for gains in [
            PidGains::new(1e308, 1e-300, 1e308),
            PidGains::new(-1e308, 5.0, 0.0),
            PidGains::new(0.02, 0.005, 0.08),
        ] {
            let hold = HeadingHoldController::from_config(&config.hold, &config.obstacle)
                .with_gains(gains);
            let mut pid = Pid::new(gains, Duration::ZERO, 0.0);
            for (i, error) in [1e300, -1e300, f64::INFINITY, f64::NAN, 179.9, -0.0]
                .iter()
                .enumerate()
            {
                let output = pid
                    .update(*error, Duration::from_millis(20 * (i as u64 + 1)))
                    .output();
                let correction = hold.limit_correction(output);
                for direction in [WheelDirection::Forward, WheelDirection::Backward] {
                    let (left, right) = hold.wheel_commands(direction, correction);
                    for power in [left.power, right.power] {
                        assert!(power >= Power::ZERO && power <= Power::FULL);
                    }
                }
            }
        }
    }
}
