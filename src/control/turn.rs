//! In-place pivot turns to a target angle
//!
//! One power magnitude is applied to both wheels in opposite senses; the PID
//! output only sets how fast the chassis pivots, never a per-wheel
//! correction. The turn ends when the remaining angle is within tolerance or
//! the timeout elapses, and the two endings are reported separately.

use super::pid::Pid;
use super::ControlContext;
use crate::common::TurnDirection;
use crate::config::{PidGains, TurnConfig};
use crate::error::Result;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnRequest {
    pub direction: TurnDirection,
    /// Magnitude of the turn; the sign is ignored
    pub degrees: f64,
    /// Halt and re-run gyro calibration before turning
    pub recalibrate: bool,
}

impl TurnRequest {
    pub fn new(direction: TurnDirection, degrees: f64) -> Self {
        TurnRequest {
            direction,
            degrees,
            recalibrate: false,
        }
    }

    pub fn left(degrees: f64) -> Self {
        Self::new(TurnDirection::Left, degrees)
    }

    pub fn right(degrees: f64) -> Self {
        Self::new(TurnDirection::Right, degrees)
    }

    pub fn with_recalibration(mut self, recalibrate: bool) -> Self {
        self.recalibrate = recalibrate;
        self
    }
}

/// How a turn ended. The wheels are halted in every case.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TurnOutcome {
    /// Remaining angle within tolerance
    Reached {
        heading: f64,
        elapsed: Duration,
        ticks: u32,
    },
    /// Timeout elapsed before the angle was reached
    TimedOut {
        heading: f64,
        elapsed: Duration,
        ticks: u32,
    },
    Cancelled {
        heading: f64,
        elapsed: Duration,
        ticks: u32,
    },
}

impl TurnOutcome {
    pub fn elapsed(&self) -> Duration {
        match self {
            TurnOutcome::Reached { elapsed, .. }
            | TurnOutcome::TimedOut { elapsed, .. }
            | TurnOutcome::Cancelled { elapsed, .. } => *elapsed,
        }
    }

    pub fn heading(&self) -> f64 {
        match self {
            TurnOutcome::Reached { heading, .. }
            | TurnOutcome::TimedOut { heading, .. }
            | TurnOutcome::Cancelled { heading, .. } => *heading,
        }
    }
}

/// PID pivot-turn loop
#[derive(Debug, Clone)]
pub struct TurnController {
    gains: PidGains,
    tolerance_deg: f64,
    timeout: Duration,
    min_speed: f64,
    max_speed: f64,
    speed_scale: f64,
    tick: Duration,
}

impl TurnController {
    pub fn from_config(config: &TurnConfig) -> Self {
        TurnController {
            gains: config.gains(),
            tolerance_deg: config.tolerance_deg,
            timeout: config.timeout(),
            min_speed: config.min_speed,
            max_speed: config.max_speed,
            speed_scale: config.speed_scale,
            tick: config.tick(),
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

    pub fn run(&self, ctx: &mut ControlContext, request: TurnRequest) -> Result<TurnOutcome> {
        log::info!(
            "Turning {} {:.1}°{}",
            request.direction,
            request.degrees.abs(),
            if request.recalibrate {
                " after recalibration"
            } else {
                ""
            }
        );
        let result = self.control_loop(ctx, request);
        ctx.halt_after(result)
    }

    fn control_loop(&self, ctx: &mut ControlContext, request: TurnRequest) -> Result<TurnOutcome> {
        if request.recalibrate {
            ctx.drivetrain.halt()?;
            ctx.calibrate()?;
        }

        let target = request.degrees.abs();
        let start = ctx.clock.now();
        ctx.heading.reset_heading(start);
        let mut pid = Pid::new(self.gains, start, target);
        let mut ticks = 0u32;

        loop {
            let now = ctx.clock.now();
            let elapsed = now.saturating_sub(start);
            let heading = ctx.heading.sample(now)?;
            ticks += 1;

            let remaining = target - heading.abs();
            if remaining <= self.tolerance_deg {
                log::info!(
                    "Turn complete: {:.1}° in {:.2}s ({} ticks)",
                    heading.abs(),
                    elapsed.as_secs_f64(),
                    ticks
                );
                return Ok(TurnOutcome::Reached {
                    heading,
                    elapsed,
                    ticks,
                });
            }
            if elapsed >= self.timeout {
                log::warn!(
                    "Turn timed out after {:.2}s at {:.1}° of {:.1}°",
                    elapsed.as_secs_f64(),
                    heading.abs(),
                    target
                );
                return Ok(TurnOutcome::TimedOut {
                    heading,
                    elapsed,
                    ticks,
                });
            }
            if ctx.cancel.is_cancelled() {
                log::info!("Turn cancelled at {:.1}°", heading.abs());
                return Ok(TurnOutcome::Cancelled {
                    heading,
                    elapsed,
                    ticks,
                });
            }

            let terms = pid.update(remaining, now);
            let speed = self.turn_speed(terms.output());
            ctx.drivetrain.pivot(request.direction, speed)?;

            log::debug!(
                "Target {:.1}° | now {:.1}° | remaining {:.1}° | speed {:.2}",
                target,
                heading.abs(),
                remaining,
                speed
            );

            ctx.clock.sleep(self.tick);
        }
    }

    /// Map the PID output onto a pivot power within [min_speed, max_speed]
    pub fn turn_speed(&self, control: f64) -> f64 {
        let speed = control.abs() * self.speed_scale;
        if speed.is_nan() {
            self.min_speed
        } else {
            speed.clamp(self.min_speed, self.max_speed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::WheelCommand;
    use crate::control::cancel::CancelToken;
    use crate::config::GyroDriveConfig;
    use crate::error::Error;
    use crate::platform::mock::{
        scripted_hardware, MockProbes, RecordingWheels, ScriptedRangeSensor, ScriptedRateSensor,
        WheelEvent,
    };

    fn setup_with(
        config: &GyroDriveConfig,
        gyro: ScriptedRateSensor,
    ) -> (ControlContext, MockProbes, TurnController) {
        let (hw, probes) = scripted_hardware(
            gyro,
            ScriptedRangeSensor::new(vec![100.0]),
            RecordingWheels::new(),
        );
        let ctx = ControlContext::new(hw, config, CancelToken::new());
        (ctx, probes, TurnController::from_config(&config.turn))
    }

    fn setup(gyro: ScriptedRateSensor) -> (ControlContext, MockProbes, TurnController) {
        setup_with(&GyroDriveConfig::default(), gyro)
    }

    #[test]
    fn test_reaches_target_exactly_at_tick_three() {
        // Tick 1 at t=0 takes no sample; ticks 2 and 3 integrate 40° then 50°
        let (mut ctx, probes, turn) = setup(ScriptedRateSensor::new(vec![2000.0, 2500.0, 0.0]));
        let outcome = turn.run(&mut ctx, TurnRequest::right(90.0)).unwrap();

        match outcome {
            TurnOutcome::Reached {
                heading,
                elapsed,
                ticks,
            } => {
                assert_eq!(ticks, 3);
                assert_eq!(elapsed, Duration::from_millis(40));
                assert!((heading - 90.0).abs() < 1e-9);
            }
            other => panic!("expected Reached, got {:?}", other),
        }
        assert_eq!(probes.wheels.drive_count(), 2);
        assert!(probes.wheels.ends_halted());
    }

    #[test]
    fn test_times_out_within_one_tick_of_limit() {
        let (mut ctx, probes, turn) = setup(ScriptedRateSensor::new(vec![0.0]));
        let outcome = turn.run(&mut ctx, TurnRequest::left(90.0)).unwrap();

        let TurnOutcome::TimedOut { elapsed, heading, .. } = outcome else {
            panic!("expected TimedOut, got {:?}", outcome);
        };
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed <= Duration::from_secs(10) + turn.tick());
        assert_eq!(heading, 0.0);
        assert!(probes.wheels.ends_halted());
        assert!(ctx.drivetrain.is_stationary());
    }

    #[test]
    fn test_pivot_directions() {
        let (mut ctx, probes, turn) = setup(ScriptedRateSensor::new(vec![-3000.0]));
        turn.run(&mut ctx, TurnRequest::left(45.0)).unwrap();

        let events = probes.wheels.events();
        let WheelEvent::Drive(left, right) = events[0] else {
            panic!("expected drive first");
        };
        // Far from target: full clamp to max_speed
        assert_eq!(left, WheelCommand::backward(0.5));
        assert_eq!(right, WheelCommand::forward(0.5));
    }

    #[test]
    fn test_sign_of_heading_is_ignored() {
        // Clockwise rotation gives a negative heading; magnitude still counts
        let (mut ctx, _probes, turn) = setup(ScriptedRateSensor::new(vec![-1000.0]));
        let outcome = turn.run(&mut ctx, TurnRequest::right(60.0)).unwrap();
        assert!(matches!(outcome, TurnOutcome::Reached { ticks: 4, .. }));
        assert!(outcome.heading() < 0.0);
    }

    #[test]
    fn test_turn_speed_bounds() {
        let turn = TurnController::from_config(&GyroDriveConfig::default().turn);
        assert_eq!(turn.turn_speed(108.0), 0.5);
        assert_eq!(turn.turn_speed(-2.0), 0.2);
        assert_eq!(turn.turn_speed(0.5), 0.15);
        assert_eq!(turn.turn_speed(f64::NAN), 0.15);
        assert_eq!(turn.turn_speed(f64::INFINITY), 0.5);
    }

    #[test]
    fn test_recalibration_runs_before_turn() {
        let mut config = GyroDriveConfig::default();
        config.heading.calibration_samples = 10;
        // Ten samples of pure bias, then the turn sees the biased rate
        let mut rates = vec![0.5; 10];
        rates.extend([0.5, 0.5, 0.5]);
        let (mut ctx, probes, turn) = setup_with(&config, ScriptedRateSensor::new(rates));

        let request = TurnRequest::right(10.0).with_recalibration(true);
        let outcome = turn.run(&mut ctx, request).unwrap();

        assert_eq!(ctx.heading.offset(), 0.5);
        assert!(matches!(outcome, TurnOutcome::TimedOut { heading, .. } if heading == 0.0));
        assert_eq!(probes.wheels.events()[0], WheelEvent::Halt);
    }

    #[test]
    fn test_gyro_failure_mid_turn_halts() {
        let (mut ctx, probes, turn) =
            setup(ScriptedRateSensor::new(vec![100.0]).failing_after(2));
        let result = turn.run(&mut ctx, TurnRequest::right(90.0));
        assert!(matches!(result, Err(Error::SensorUnavailable { .. })));
        assert!(probes.wheels.ends_halted());
    }

    #[test]
    fn test_cancelled_turn_reports_cancelled() {
        let (mut ctx, probes, turn) = setup(ScriptedRateSensor::new(vec![10.0]));
        ctx.cancel.cancel();
        let outcome = turn.run(&mut ctx, TurnRequest::right(90.0)).unwrap();
        assert!(matches!(outcome, TurnOutcome::Cancelled { ticks: 1, .. }));
        assert_eq!(probes.wheels.events(), vec![WheelEvent::Halt]);
    }
}
