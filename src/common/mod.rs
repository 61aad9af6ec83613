//! Common utilities and types shared by perception and control

use serde::{Deserialize, Serialize};

/// Rotational sense of a single wheel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WheelDirection {
    Forward,
    Backward,
}

impl WheelDirection {
    /// The opposite rotational sense
    pub fn reversed(self) -> Self {
        match self {
            WheelDirection::Forward => WheelDirection::Backward,
            WheelDirection::Backward => WheelDirection::Forward,
        }
    }
}

/// Motor power magnitude, always within [0, 1].
///
/// Non-finite inputs collapse to the nearest safe value: NaN becomes 0,
/// +inf becomes 1.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Power(f64);

impl Power {
    pub const ZERO: Power = Power(0.0);
    pub const FULL: Power = Power(1.0);

    /// Clamp an arbitrary value into a valid power
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            Power(0.0)
        } else {
            Power(value.clamp(0.0, 1.0))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0.0
    }
}

/// Direction and power for one side of the drivetrain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelCommand {
    pub direction: WheelDirection,
    pub power: Power,
}

impl WheelCommand {
    pub fn new(direction: WheelDirection, power: f64) -> Self {
        WheelCommand {
            direction,
            power: Power::new(power),
        }
    }

    pub fn forward(power: f64) -> Self {
        Self::new(WheelDirection::Forward, power)
    }

    pub fn backward(power: f64) -> Self {
        Self::new(WheelDirection::Backward, power)
    }

    /// Signed power, positive when driving forward
    pub fn signed_power(&self) -> f64 {
        match self.direction {
            WheelDirection::Forward => self.power.value(),
            WheelDirection::Backward => -self.power.value(),
        }
    }
}

/// Direction of an in-place pivot turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnDirection {
    Left,
    Right,
}

impl TurnDirection {
    /// Wheel senses for the pivot as (left, right).
    /// Right spins the left wheel forward and the right wheel backward.
    pub fn wheel_directions(self) -> (WheelDirection, WheelDirection) {
        match self {
            TurnDirection::Right => (WheelDirection::Forward, WheelDirection::Backward),
            TurnDirection::Left => (WheelDirection::Backward, WheelDirection::Forward),
        }
    }
}

impl std::fmt::Display for TurnDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnDirection::Left => write!(f, "left"),
            TurnDirection::Right => write!(f, "right"),
        }
    }
}

/// Wrap an angle in degrees into (-180, 180]
pub fn wrap_degrees(angle: f64) -> f64 {
    // rem_euclid may return exactly 360.0 for tiny negative inputs
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}
