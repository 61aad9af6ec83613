//! Motion command dispatcher
//!
//! Idle → Executing(command) → Idle. Exactly one controller runs at a time
//! because the dispatcher owns the `ControlContext` and runs each controller
//! to completion before returning.

use super::command::{BatchEntry, MotionCommand};
use super::status::StatusFeed;
use crate::config::{GyroDriveConfig, ReverseMode};
use crate::control::{
    ControlContext, HeadingHoldController, HoldOutcome, HoldRequest, TurnController, TurnOutcome,
    TurnRequest,
};
use crate::error::{Error, Result};
use crate::platform::Hardware;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DispatcherState {
    Idle,
    Executing(MotionCommand),
}

/// Result of one command. The wheels are stopped in every case.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandOutcome {
    /// Duration elapsed or target angle reached
    Completed { elapsed: Duration, heading: f64 },
    /// Forward motion aborted by the obstacle guard
    ObstacleStop { distance_cm: f64, elapsed: Duration },
    /// Turn gave up before reaching the target angle
    TurnTimeout { heading: f64, elapsed: Duration },
    Cancelled { elapsed: Duration },
    /// `stop`: wheels halted, no controller entered
    Halted,
}

impl CommandOutcome {
    pub fn elapsed(&self) -> Duration {
        match self {
            CommandOutcome::Completed { elapsed, .. }
            | CommandOutcome::ObstacleStop { elapsed, .. }
            | CommandOutcome::TurnTimeout { elapsed, .. }
            | CommandOutcome::Cancelled { elapsed } => *elapsed,
            CommandOutcome::Halted => Duration::ZERO,
        }
    }

    fn describe(&self) -> String {
        match self {
            CommandOutcome::Completed { elapsed, .. } => {
                format!("completed in {:.2} s", elapsed.as_secs_f64())
            }
            CommandOutcome::ObstacleStop { distance_cm, .. } => {
                format!("stopped, obstacle at {:.1} cm", distance_cm)
            }
            CommandOutcome::TurnTimeout { heading, .. } => {
                format!("timed out at {:.1}°", heading.abs())
            }
            CommandOutcome::Cancelled { .. } => "cancelled".to_string(),
            CommandOutcome::Halted => "motors halted".to_string(),
        }
    }
}

impl From<HoldOutcome> for CommandOutcome {
    fn from(outcome: HoldOutcome) -> Self {
        match outcome {
            HoldOutcome::Completed {
                elapsed, heading, ..
            } => CommandOutcome::Completed { elapsed, heading },
            HoldOutcome::ObstacleStop {
                distance_cm,
                elapsed,
                ..
            } => CommandOutcome::ObstacleStop {
                distance_cm,
                elapsed,
            },
            HoldOutcome::Cancelled { elapsed, .. } => CommandOutcome::Cancelled { elapsed },
        }
    }
}

impl From<TurnOutcome> for CommandOutcome {
    fn from(outcome: TurnOutcome) -> Self {
        match outcome {
            TurnOutcome::Reached {
                heading, elapsed, ..
            } => CommandOutcome::Completed { elapsed, heading },
            TurnOutcome::TimedOut {
                heading, elapsed, ..
            } => CommandOutcome::TurnTimeout { heading, elapsed },
            TurnOutcome::Cancelled { elapsed, .. } => CommandOutcome::Cancelled { elapsed },
        }
    }
}

/// What happened to one batch entry
#[derive(Debug, Clone, PartialEq)]
pub enum EntryReport {
    Executed {
        command: MotionCommand,
        outcome: CommandOutcome,
    },
    /// Failed validation or a non-hardware error; nothing was driven
    Rejected {
        command: MotionCommand,
        reason: String,
    },
    Notice(String),
    Skipped(String),
}

/// Per-entry results of a batch, in execution order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub entries: Vec<EntryReport>,
    /// Hardware failure that ended the batch early
    pub fault: Option<Error>,
}

impl BatchReport {
    /// Outcomes of the commands that actually ran
    pub fn outcomes(&self) -> Vec<CommandOutcome> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                EntryReport::Executed { outcome, .. } => Some(*outcome),
                _ => None,
            })
            .collect()
    }
}

pub struct MotionDispatcher {
    ctx: ControlContext,
    hold: HeadingHoldController,
    turn: TurnController,
    reverse_hold: HeadingHoldController,
    reverse_turn: TurnController,
    reverse_mode: ReverseMode,
    recalibrate: bool,
    status: StatusFeed,
    state: DispatcherState,
}

impl MotionDispatcher {
    pub fn new(ctx: ControlContext, config: &GyroDriveConfig, status: StatusFeed) -> Self {
        let hold = HeadingHoldController::from_config(&config.hold, &config.obstacle);
        let turn = TurnController::from_config(&config.turn);
        MotionDispatcher {
            ctx,
            reverse_hold: hold.clone().with_gains(config.reverse.hold_gains),
            reverse_turn: turn.clone().with_gains(config.reverse.turn_gains),
            hold,
            turn,
            reverse_mode: config.reverse.mode,
            recalibrate: config.turn.recalibrate,
            status,
            state: DispatcherState::Idle,
        }
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    pub fn status(&self) -> &StatusFeed {
        &self.status
    }

    /// Heading relative to the start of the last command
    pub fn heading(&self) -> f64 {
        self.ctx.heading.heading()
    }

    /// Calibrate the gyro bias; the robot must be standing still
    pub fn calibrate(&mut self) -> Result<f64> {
        self.status.post("Calibrating gyro, keep the robot still");
        let offset = self.ctx.calibrate()?;
        self.status
            .post(format!("Gyro calibrated, offset {:.3}°/s", offset));
        Ok(offset)
    }

    /// Run one command to completion.
    ///
    /// Invalid parameters are rejected before any hardware write. Errors
    /// from the hardware are returned after the wheels have been halted.
    pub fn execute(&mut self, command: MotionCommand) -> Result<CommandOutcome> {
        self.ctx.cancel.clear();
        self.execute_command(command)
    }

    fn execute_command(&mut self, command: MotionCommand) -> Result<CommandOutcome> {
        if let Err(e) = command.validate() {
            log::warn!("Rejected {}: {}", command, e);
            self.status
                .post(format!("Rejected {}: {}", command.describe(), e));
            return Err(e);
        }

        self.ctx.reset_heading();
        self.state = DispatcherState::Executing(command);
        self.status.post(command.describe());

        let result = self.run(command);
        self.state = DispatcherState::Idle;

        match &result {
            Ok(outcome) => {
                log::info!("{} {}", command, outcome.describe());
                self.status
                    .post(format!("{}: {}", command.describe(), outcome.describe()));
            }
            Err(e) => {
                log::error!("{} aborted: {}", command, e);
                self.status
                    .post(format!("{} aborted: {}", command.describe(), e));
            }
        }
        result
    }

    fn run(&mut self, command: MotionCommand) -> Result<CommandOutcome> {
        match command {
            MotionCommand::DriveForward { .. } => {
                let duration = command.duration()?.unwrap_or_default();
                let outcome = self.hold.run(&mut self.ctx, HoldRequest::forward(duration))?;
                Ok(outcome.into())
            }
            MotionCommand::DriveBackward { .. } => {
                let duration = command.duration()?.unwrap_or_default();
                self.drive_backward(duration)
            }
            MotionCommand::TurnLeft { .. }
            | MotionCommand::TurnRight { .. }
            | MotionCommand::TurnAround => {
                let Some((direction, degrees)) = command.turn() else {
                    return Err(Error::InvalidCommand(format!("{} is not a turn", command)));
                };
                let request =
                    TurnRequest::new(direction, degrees).with_recalibration(self.recalibrate);
                let outcome = self.turn.run(&mut self.ctx, request)?;
                Ok(outcome.into())
            }
            MotionCommand::Stop => {
                self.ctx.drivetrain.halt()?;
                Ok(CommandOutcome::Halted)
            }
            MotionCommand::DriveUntilObstacle => {
                let outcome = self.hold.run(&mut self.ctx, HoldRequest::until_obstacle())?;
                Ok(outcome.into())
            }
        }
    }

    fn drive_backward(&mut self, duration: Duration) -> Result<CommandOutcome> {
        match self.reverse_mode {
            ReverseMode::Reverse => {
                let outcome = self
                    .hold
                    .run(&mut self.ctx, HoldRequest::backward(duration))?;
                Ok(outcome.into())
            }
            ReverseMode::TurnAround => {
                // Face the other way, then hold heading forward
                let request = TurnRequest::right(180.0).with_recalibration(self.recalibrate);
                let turn = self.reverse_turn.run(&mut self.ctx, request)?;
                match turn {
                    TurnOutcome::Cancelled { elapsed, .. } => {
                        return Ok(CommandOutcome::Cancelled { elapsed })
                    }
                    TurnOutcome::TimedOut { heading, .. } => {
                        self.status.post(format!(
                            "Turn-around timed out at {:.1}°, driving on",
                            heading.abs()
                        ));
                    }
                    TurnOutcome::Reached { .. } => {}
                }

                let hold = self
                    .reverse_hold
                    .run(&mut self.ctx, HoldRequest::forward(duration))?;
                let hold = CommandOutcome::from(hold);
                let elapsed = turn.elapsed() + hold.elapsed();
                // A missed turn outranks a completed drive
                let outcome = match (hold, turn) {
                    (CommandOutcome::Completed { .. }, TurnOutcome::TimedOut { heading, .. }) => {
                        CommandOutcome::TurnTimeout { heading, elapsed }
                    }
                    (CommandOutcome::Completed { heading, .. }, _) => {
                        CommandOutcome::Completed { elapsed, heading }
                    }
                    (CommandOutcome::ObstacleStop { distance_cm, .. }, _) => {
                        CommandOutcome::ObstacleStop {
                            distance_cm,
                            elapsed,
                        }
                    }
                    (CommandOutcome::Cancelled { .. }, _) => CommandOutcome::Cancelled { elapsed },
                    (other, _) => other,
                };
                Ok(outcome)
            }
        }
    }

    /// Run a decoded batch strictly in order.
    ///
    /// Obstacle stops, turn timeouts and rejected commands do not affect the
    /// remaining entries. A cancellation at any point ends the batch, and so
    /// does a hardware fault, which is kept in the report.
    pub fn execute_batch(&mut self, entries: Vec<BatchEntry>) -> BatchReport {
        let mut report = BatchReport::default();
        self.ctx.cancel.clear();
        self.status
            .post(format!("Executing batch of {} entries", entries.len()));

        for entry in entries {
            match entry {
                BatchEntry::Command(command) => match self.execute_command(command) {
                    Ok(outcome) => {
                        report.entries.push(EntryReport::Executed { command, outcome });
                    }
                    Err(e) if e.is_hardware_fault() => {
                        report.fault = Some(e);
                        break;
                    }
                    Err(e) => report.entries.push(EntryReport::Rejected {
                        command,
                        reason: e.to_string(),
                    }),
                },
                BatchEntry::Notice(message) => {
                    self.status.post(message.clone());
                    report.entries.push(EntryReport::Notice(message));
                }
                BatchEntry::Unrecognized(raw) => {
                    self.status.post(format!("Skipped unrecognized entry {}", raw));
                    report.entries.push(EntryReport::Skipped(raw));
                }
            }

            // Also catches a cancel that lands between two entries
            if self.ctx.cancel.is_cancelled() {
                self.status.post("Batch cancelled");
                break;
            }
        }

        self.status.post("Idle, waiting for commands");
        report
    }

    /// Hand the devices back once the control thread is done with them
    pub fn into_hardware(self) -> Hardware {
        self.ctx.into_hardware()
    }
}
