//! Motion service: the control thread and its handle
//!
//! The hardware moves onto a dedicated `motion-control` thread when the
//! service is activated. Requests arrive over a tokio channel and are served
//! one at a time; each carries a oneshot for its reply. Deactivation closes
//! the cancel token, so the running command stops and anything still queued
//! is refused, then joins the thread and takes the hardware back.

use super::command::{parse_batch, BatchEntry, MotionCommand};
use super::dispatcher::{BatchReport, CommandOutcome, MotionDispatcher};
use super::status::{StatusEvent, StatusFeed};
use crate::config::GyroDriveConfig;
use crate::control::cancel::CancelToken;
use crate::control::ControlContext;
use crate::error::{Error, Result};
use crate::lifecycle::{LifecycleNode, LifecycleNodeBase, State};
use crate::platform::Hardware;
use std::any::Any;
use std::thread::{self, JoinHandle};
use tokio::sync::{mpsc, oneshot};

enum Request {
    Command {
        command: MotionCommand,
        reply: oneshot::Sender<Result<CommandOutcome>>,
    },
    Batch {
        entries: Vec<BatchEntry>,
        reply: oneshot::Sender<Result<BatchReport>>,
    },
    Shutdown,
}

fn unavailable() -> Error {
    Error::ServiceUnavailable("control thread is not running".to_string())
}

fn shutting_down() -> Error {
    Error::ServiceUnavailable("motion service is shutting down".to_string())
}

/// Cloneable handle for submitting commands to the control thread
#[derive(Clone)]
pub struct MotionHandle {
    requests: mpsc::UnboundedSender<Request>,
    cancel: CancelToken,
    status: StatusFeed,
}

impl MotionHandle {
    /// Run one command and wait for its outcome
    pub async fn execute(&self, command: MotionCommand) -> Result<CommandOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Command { command, reply })?;
        rx.await.map_err(|_| unavailable())?
    }

    /// Run a batch in order and wait for the report
    pub async fn execute_batch(&self, entries: Vec<BatchEntry>) -> Result<BatchReport> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Batch { entries, reply })?;
        rx.await.map_err(|_| unavailable())?
    }

    /// Decode a JSON batch and run it
    pub async fn submit_json(&self, json: &str) -> Result<BatchReport> {
        let entries = parse_batch(json)?;
        self.execute_batch(entries).await
    }

    /// Blocking form of `execute`; must not be called from an async context
    pub fn blocking_execute(&self, command: MotionCommand) -> Result<CommandOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Command { command, reply })?;
        rx.blocking_recv().map_err(|_| unavailable())?
    }

    /// Blocking form of `execute_batch`; must not be called from an async context
    pub fn blocking_execute_batch(&self, entries: Vec<BatchEntry>) -> Result<BatchReport> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Batch { entries, reply })?;
        rx.blocking_recv().map_err(|_| unavailable())?
    }

    /// Ask the running controller to stop at its next tick
    pub fn cancel(&self) {
        log::info!("Cancellation requested");
        self.cancel.cancel();
    }

    pub fn status(&self) -> Vec<StatusEvent> {
        self.status.recent()
    }

    pub fn current_status(&self) -> Option<StatusEvent> {
        self.status.current()
    }

    fn send(&self, request: Request) -> Result<()> {
        self.requests.send(request).map_err(|_| unavailable())
    }
}

/// Lifecycle node owning the motion hardware
pub struct MotionService {
    base: LifecycleNodeBase,
    config: GyroDriveConfig,
    hardware: Option<Hardware>,
    worker: Option<JoinHandle<Hardware>>,
    handle: Option<MotionHandle>,
    status: StatusFeed,
    cancel: CancelToken,
}

impl MotionService {
    pub fn new(config: GyroDriveConfig, hardware: Hardware) -> Self {
        let status = StatusFeed::new(config.status.capacity);
        MotionService {
            base: LifecycleNodeBase::new("motion_service"),
            config,
            hardware: Some(hardware),
            worker: None,
            handle: None,
            status,
            cancel: CancelToken::new(),
        }
    }

    /// Handle to the control thread while the service is active
    pub fn handle(&self) -> Option<MotionHandle> {
        self.handle.clone()
    }

    pub fn status(&self) -> &StatusFeed {
        &self.status
    }

    pub fn state(&self) -> State {
        self.base.get_state()
    }

    /// Take the hardware back out of an inactive service
    pub fn take_hardware(&mut self) -> Option<Hardware> {
        self.hardware.take()
    }
}

fn control_thread(
    hardware: Hardware,
    config: GyroDriveConfig,
    status: StatusFeed,
    cancel: CancelToken,
    mut requests: mpsc::UnboundedReceiver<Request>,
) -> Hardware {
    let ctx = ControlContext::new(hardware, &config, cancel.clone());
    let mut dispatcher = MotionDispatcher::new(ctx, &config, status);

    if let Err(e) = dispatcher.calibrate() {
        log::error!("Startup calibration failed: {}", e);
        dispatcher
            .status()
            .post(format!("Startup calibration failed: {}", e));
    }
    dispatcher.status().post("Idle, waiting for commands");

    while let Some(request) = requests.blocking_recv() {
        match request {
            Request::Shutdown => break,
            // Queued behind a shutdown: refuse without touching the wheels
            Request::Command { reply, .. } if cancel.is_closed() => {
                let _ = reply.send(Err(shutting_down()));
            }
            Request::Batch { reply, .. } if cancel.is_closed() => {
                let _ = reply.send(Err(shutting_down()));
            }
            Request::Command { command, reply } => {
                let _ = reply.send(dispatcher.execute(command));
            }
            Request::Batch { entries, reply } => {
                let _ = reply.send(Ok(dispatcher.execute_batch(entries)));
            }
        }
    }

    log::info!("Control thread exiting");
    dispatcher.into_hardware()
}

impl LifecycleNode for MotionService {
    fn on_configure(&mut self) -> Result<()> {
        self.base.require(State::Unconfigured, "configure")?;
        log::info!("Configuring {}", self.base.name);
        self.config.validate()?;
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_activate(&mut self) -> Result<()> {
        self.base.require(State::Inactive, "activate")?;
        let hardware = self
            .hardware
            .take()
            .ok_or_else(|| Error::Lifecycle("motion hardware already taken".to_string()))?;

        // Fresh token per activation; the last deactivation closed the old one
        self.cancel = CancelToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let config = self.config.clone();
        let status = self.status.clone();
        let cancel = self.cancel.clone();
        let worker = thread::Builder::new()
            .name("motion-control".to_string())
            .spawn(move || control_thread(hardware, config, status, cancel, rx))?;

        self.worker = Some(worker);
        self.handle = Some(MotionHandle {
            requests: tx,
            cancel: self.cancel.clone(),
            status: self.status.clone(),
        });
        log::info!("Activating {}", self.base.name);
        self.base.set_state(State::Active);
        Ok(())
    }

    fn on_deactivate(&mut self) -> Result<()> {
        self.base.require(State::Active, "deactivate")?;
        log::info!("Deactivating {}", self.base.name);
        self.cancel.close();
        if let Some(handle) = self.handle.take() {
            // A closed channel means the thread is already gone; join reports it
            let _ = handle.requests.send(Request::Shutdown);
        }
        if let Some(worker) = self.worker.take() {
            let hardware = worker.join().map_err(|_| {
                Error::ServiceUnavailable("control thread panicked".to_string())
            })?;
            self.hardware = Some(hardware);
        }
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_cleanup(&mut self) -> Result<()> {
        self.base.require(State::Inactive, "clean up")?;
        log::info!("Cleaning up {}", self.base.name);
        self.base.set_state(State::Unconfigured);
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
