//! Wheel actuation
//!
//! `WheelDrive` is the only path from the controllers to the motors. Writes
//! are open loop: nothing is read back from the hardware. The `Drivetrain`
//! wrapper remembers whether the last write left the wheels stopped so that
//! gyro calibration can insist on a stationary robot.

use crate::common::{TurnDirection, WheelCommand, WheelDirection};
use crate::error::{Error, Result};
use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;

/// Per-wheel motor output for a two-wheeled chassis
pub trait WheelDrive: Send {
    /// Set direction and power for both wheels
    fn drive(&mut self, left: WheelCommand, right: WheelCommand) -> Result<()>;

    /// Stop both wheels immediately
    fn halt(&mut self) -> Result<()>;
}

/// Wheel output plus stationarity bookkeeping
pub struct Drivetrain {
    wheels: Box<dyn WheelDrive>,
    moving: bool,
}

impl Drivetrain {
    pub fn new(wheels: Box<dyn WheelDrive>) -> Self {
        Drivetrain {
            wheels,
            moving: false,
        }
    }

    pub fn drive(&mut self, left: WheelCommand, right: WheelCommand) -> Result<()> {
        // Assume motion until the write is known to have stopped the wheels
        self.moving = true;
        self.wheels.drive(left, right)?;
        self.moving = !(left.power.is_zero() && right.power.is_zero());
        Ok(())
    }

    /// Spin in place with the same power on both wheels in opposite senses
    pub fn pivot(&mut self, direction: TurnDirection, power: f64) -> Result<()> {
        let (left, right) = direction.wheel_directions();
        self.drive(WheelCommand::new(left, power), WheelCommand::new(right, power))
    }

    pub fn halt(&mut self) -> Result<()> {
        self.wheels.halt()?;
        self.moving = false;
        Ok(())
    }

    pub fn is_stationary(&self) -> bool {
        !self.moving
    }

    pub fn into_inner(self) -> Box<dyn WheelDrive> {
        self.wheels
    }
}

/// One side of an L298N-style H-bridge: two direction inputs and a PWM enable
pub struct HBridgeWheel<F, B, E> {
    forward: F,
    backward: B,
    enable: E,
}

impl<F, B, E> HBridgeWheel<F, B, E>
where
    F: OutputPin,
    B: OutputPin,
    E: SetDutyCycle,
{
    pub fn new(forward: F, backward: B, enable: E) -> Self {
        Self {
            forward,
            backward,
            enable,
        }
    }

    fn apply(&mut self, command: WheelCommand) -> Result<()> {
        match command.direction {
            WheelDirection::Forward => {
                self.backward.set_low().map_err(pin_fault)?;
                self.forward.set_high().map_err(pin_fault)?;
            }
            WheelDirection::Backward => {
                self.forward.set_low().map_err(pin_fault)?;
                self.backward.set_high().map_err(pin_fault)?;
            }
        }
        let max = self.enable.max_duty_cycle();
        let duty = (command.power.value() * max as f64).round() as u16;
        self.enable.set_duty_cycle(duty.min(max)).map_err(pwm_fault)
    }

    fn stop(&mut self) -> Result<()> {
        self.enable.set_duty_cycle_fully_off().map_err(pwm_fault)?;
        self.forward.set_low().map_err(pin_fault)?;
        self.backward.set_low().map_err(pin_fault)
    }
}

fn pin_fault<E: std::fmt::Debug>(e: E) -> Error {
    Error::ActuatorFault(format!("direction pin: {:?}", e))
}

fn pwm_fault<E: std::fmt::Debug>(e: E) -> Error {
    Error::ActuatorFault(format!("pwm: {:?}", e))
}

/// Left and right H-bridge channels driven as one `WheelDrive`
pub struct DualHBridge<LF, LB, LE, RF, RB, RE> {
    left: HBridgeWheel<LF, LB, LE>,
    right: HBridgeWheel<RF, RB, RE>,
}

impl<LF, LB, LE, RF, RB, RE> DualHBridge<LF, LB, LE, RF, RB, RE>
where
    LF: OutputPin,
    LB: OutputPin,
    LE: SetDutyCycle,
    RF: OutputPin,
    RB: OutputPin,
    RE: SetDutyCycle,
{
    /// Build the driver and put both wheels in the stopped state
    pub fn new(
        left: HBridgeWheel<LF, LB, LE>,
        right: HBridgeWheel<RF, RB, RE>,
    ) -> Result<Self> {
        let mut driver = Self { left, right };
        driver.stop_both()?;
        Ok(driver)
    }

    fn stop_both(&mut self) -> Result<()> {
        // Try both sides even if one fails
        let left = self.left.stop();
        let right = self.right.stop();
        left.and(right)
    }
}

impl<LF, LB, LE, RF, RB, RE> WheelDrive for DualHBridge<LF, LB, LE, RF, RB, RE>
where
    LF: OutputPin + Send,
    LB: OutputPin + Send,
    LE: SetDutyCycle + Send,
    RF: OutputPin + Send,
    RB: OutputPin + Send,
    RE: SetDutyCycle + Send,
{
    fn drive(&mut self, left: WheelCommand, right: WheelCommand) -> Result<()> {
        self.left.apply(left)?;
        self.right.apply(right)
    }

    fn halt(&mut self) -> Result<()> {
        self.stop_both()
    }
}
