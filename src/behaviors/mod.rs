//! Command handling on top of the controllers
pub mod command;
pub mod dispatcher;
pub mod service;
pub mod status;

pub use self::command::{parse_batch, BatchEntry, MotionCommand};
pub use self::dispatcher::{
    BatchReport, CommandOutcome, DispatcherState, EntryReport, MotionDispatcher,
};
pub use self::service::{MotionHandle, MotionService};
pub use self::status::{StatusEvent, StatusFeed};
