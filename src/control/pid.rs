//! PID law shared by the heading-hold and turn controllers

use crate::config::PidGains;
use std::time::Duration;

/// Smallest time step fed to the integral and derivative terms (seconds)
const MIN_DT: f64 = 0.001;

/// Individual contributions of one PID evaluation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PidTerms {
    pub p: f64,
    pub i: f64,
    pub d: f64,
}

impl PidTerms {
    pub fn output(&self) -> f64 {
        self.p + self.i + self.d
    }
}

/// Per-invocation PID state.
///
/// Created fresh for every controller run, so no integral carries over
/// between commands. The integral is bounded by ±1/ki.
#[derive(Debug, Clone)]
pub struct Pid {
    gains: PidGains,
    integral: f64,
    integral_limit: f64,
    previous_error: f64,
    previous_time: Duration,
}

impl Pid {
    /// Start a run at `now` with `initial_error` as the derivative reference
    pub fn new(gains: PidGains, now: Duration, initial_error: f64) -> Self {
        Pid {
            gains,
            integral: 0.0,
            integral_limit: Self::integral_limit(&gains),
            previous_error: sanitize(initial_error),
            previous_time: now,
        }
    }

    /// Windup bound for the given gains; unbounded when ki is zero
    pub fn integral_limit(gains: &PidGains) -> f64 {
        if gains.ki != 0.0 && gains.ki.is_finite() {
            1.0 / gains.ki.abs()
        } else {
            f64::INFINITY
        }
    }

    /// Evaluate the law for `error` observed at `now`
    pub fn update(&mut self, error: f64, now: Duration) -> PidTerms {
        let error = sanitize(error);
        let dt = now
            .saturating_sub(self.previous_time)
            .as_secs_f64()
            .max(MIN_DT);

        let integral = self.integral + error * dt;
        self.integral = if integral.is_nan() {
            0.0
        } else {
            integral.clamp(-self.integral_limit, self.integral_limit)
        };
        let derivative = (error - self.previous_error) / dt;

        self.previous_error = error;
        self.previous_time = now;

        PidTerms {
            p: term(self.gains.kp, error),
            i: term(self.gains.ki, self.integral),
            d: term(self.gains.kd, derivative),
        }
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}

/// gain * value, where a zero gain silences the term even for infinite input
fn term(gain: f64, value: f64) -> f64 {
    if gain == 0.0 {
        0.0
    } else {
        gain * value
    }
}
