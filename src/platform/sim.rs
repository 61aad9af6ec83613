//! Deterministic simulated two-wheeled robot
//!
//! Physics advance only when the simulated clock is slept on, so a control
//! loop running against the simulator executes in virtual time. Wheel surface
//! speed is power × top speed; yaw rate is (v_right − v_left) / track width,
//! counter-clockwise positive. The range sensor looks along the heading at a
//! wall perpendicular to the start heading.

use super::{Clock, Hardware};
use crate::common::WheelCommand;
use crate::config::SimulationConfig;
use crate::control::drivetrain::WheelDrive;
use crate::error::Result;
use crate::perception::sensors::{RangeSensor, RateSensor, Sensor};
use nalgebra::{Point2, UnitComplex, Vector2};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug)]
struct SimState {
    config: SimulationConfig,
    time: Duration,
    position: Point2<f64>,
    yaw: UnitComplex<f64>,
    left: f64,
    right: f64,
}

impl SimState {
    fn wheel_speeds(&self) -> (f64, f64) {
        (
            self.left * self.config.wheel_top_speed,
            self.right * self.config.wheel_top_speed,
        )
    }

    /// Yaw rate in rad/s
    fn yaw_rate(&self) -> f64 {
        let (vl, vr) = self.wheel_speeds();
        (vr - vl) / self.config.track_width
    }

    fn step(&mut self, dt: Duration) {
        let dt_s = dt.as_secs_f64();
        let (vl, vr) = self.wheel_speeds();
        let v = (vl + vr) / 2.0;
        let dtheta = self.yaw_rate() * dt_s;

        // Midpoint heading for the translation
        let mid = self.yaw * UnitComplex::new(dtheta / 2.0);
        self.position += mid * Vector2::new(v * dt_s, 0.0);
        self.yaw *= UnitComplex::new(dtheta);
        self.time += dt;
    }

    fn range_cm(&self) -> f64 {
        let max = self.config.range_max_cm;
        let Some(wall) = self.config.wall_distance_m else {
            return max;
        };
        let direction = self.yaw * Vector2::x();
        if direction.x <= 1e-9 {
            return max;
        }
        let distance = (wall - self.position.x) / direction.x;
        if distance < 0.0 {
            max
        } else {
            (distance * 100.0).min(max)
        }
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Observer handle on the simulated world
#[derive(Debug, Clone)]
pub struct SimRobot {
    state: Arc<Mutex<SimState>>,
}

impl SimRobot {
    pub fn new(config: &SimulationConfig) -> Self {
        SimRobot {
            state: Arc::new(Mutex::new(SimState {
                config: config.clone(),
                time: Duration::ZERO,
                position: Point2::origin(),
                yaw: UnitComplex::identity(),
                left: 0.0,
                right: 0.0,
            })),
        }
    }

    /// Clock, gyro, range sensor and wheels all bound to this world
    pub fn hardware(&self) -> Hardware {
        Hardware::new(
            Box::new(SimClock {
                state: Arc::clone(&self.state),
            }),
            Box::new(SimGyro {
                state: Arc::clone(&self.state),
            }),
            Box::new(SimRange {
                state: Arc::clone(&self.state),
            }),
            Box::new(SimWheels {
                state: Arc::clone(&self.state),
            }),
        )
    }

    pub fn time(&self) -> Duration {
        lock(&self.state).time
    }

    pub fn position(&self) -> Point2<f64> {
        lock(&self.state).position
    }

    /// World heading in degrees, counter-clockwise positive, in (-180, 180]
    pub fn yaw_degrees(&self) -> f64 {
        lock(&self.state).yaw.angle().to_degrees()
    }

    /// Signed wheel powers as (left, right)
    pub fn wheel_powers(&self) -> (f64, f64) {
        let state = lock(&self.state);
        (state.left, state.right)
    }

    pub fn is_moving(&self) -> bool {
        let (left, right) = self.wheel_powers();
        left != 0.0 || right != 0.0
    }
}

struct SimClock {
    state: Arc<Mutex<SimState>>,
}

impl Clock for SimClock {
    fn now(&self) -> Duration {
        lock(&self.state).time
    }

    fn sleep(&mut self, duration: Duration) {
        lock(&self.state).step(duration);
    }
}

struct SimGyro {
    state: Arc<Mutex<SimState>>,
}

impl Sensor for SimGyro {
    fn name(&self) -> &str {
        "sim_gyro"
    }
}

impl RateSensor for SimGyro {
    fn read_rate_dps(&mut self) -> Result<f64> {
        let state = lock(&self.state);
        Ok(state.yaw_rate().to_degrees() + state.config.gyro_bias_dps)
    }
}

struct SimRange {
    state: Arc<Mutex<SimState>>,
}

impl Sensor for SimRange {
    fn name(&self) -> &str {
        "sim_range"
    }
}

impl RangeSensor for SimRange {
    fn read_distance_cm(&mut self) -> Result<f64> {
        Ok(lock(&self.state).range_cm())
    }
}

struct SimWheels {
    state: Arc<Mutex<SimState>>,
}

impl WheelDrive for SimWheels {
    fn drive(&mut self, left: WheelCommand, right: WheelCommand) -> Result<()> {
        let mut state = lock(&self.state);
        state.left = left.signed_power();
        state.right = right.signed_power();
        Ok(())
    }

    fn halt(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.left = 0.0;
        state.right = 0.0;
        Ok(())
    }
}
