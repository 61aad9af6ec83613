//! Scripted hardware for tests and demos
//!
//! Sensors replay a fixed list of readings, the wheel drive records every
//! write, and the clock only moves when slept on.

use super::{Clock, Hardware};
use crate::common::WheelCommand;
use crate::control::drivetrain::WheelDrive;
use crate::error::{Error, Result};
use crate::perception::sensors::{RangeSensor, RateSensor, Sensor};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Virtual clock; clones share the same time
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        self.nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    fn sleep(&mut self, duration: Duration) {
        self.advance(duration);
    }
}

/// Shared count of sensor reads
#[derive(Debug, Clone, Default)]
pub struct ReadCounter(Arc<AtomicUsize>);

impl ReadCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// Replays readings in order, then repeats the last one
#[derive(Debug)]
struct Script {
    values: Vec<f64>,
    reads: ReadCounter,
    fail_after: Option<usize>,
}

impl Script {
    fn new(values: Vec<f64>) -> Self {
        Script {
            values,
            reads: ReadCounter::default(),
            fail_after: None,
        }
    }

    fn next(&mut self, name: &str) -> Result<f64> {
        let index = self.reads.bump();
        if self.fail_after.map_or(false, |n| index >= n) {
            return Err(Error::sensor(name, "scripted failure"));
        }
        Ok(self
            .values
            .get(index)
            .or_else(|| self.values.last())
            .copied()
            .unwrap_or(0.0))
    }
}

/// Gyro that returns a scripted list of rates (°/s)
#[derive(Debug)]
pub struct ScriptedRateSensor {
    script: Script,
}

impl ScriptedRateSensor {
    pub fn new(rates: Vec<f64>) -> Self {
        Self {
            script: Script::new(rates),
        }
    }

    /// Every read from the `n`th (zero based) onward fails
    pub fn failing_after(mut self, n: usize) -> Self {
        self.script.fail_after = Some(n);
        self
    }

    pub fn read_counter(&self) -> ReadCounter {
        self.script.reads.clone()
    }
}

impl Sensor for ScriptedRateSensor {
    fn name(&self) -> &str {
        "scripted_gyro"
    }
}

impl RateSensor for ScriptedRateSensor {
    fn read_rate_dps(&mut self) -> Result<f64> {
        self.script.next("scripted_gyro")
    }
}

/// Range sensor that returns a scripted list of distances (cm)
#[derive(Debug)]
pub struct ScriptedRangeSensor {
    script: Script,
}

impl ScriptedRangeSensor {
    pub fn new(distances: Vec<f64>) -> Self {
        Self {
            script: Script::new(distances),
        }
    }

    /// Every read from the `n`th (zero based) onward fails
    pub fn failing_after(mut self, n: usize) -> Self {
        self.script.fail_after = Some(n);
        self
    }

    pub fn read_counter(&self) -> ReadCounter {
        self.script.reads.clone()
    }
}

impl Sensor for ScriptedRangeSensor {
    fn name(&self) -> &str {
        "scripted_range"
    }
}

impl RangeSensor for ScriptedRangeSensor {
    fn read_distance_cm(&mut self) -> Result<f64> {
        self.script.next("scripted_range")
    }
}

/// One write seen by `RecordingWheels`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WheelEvent {
    Drive(WheelCommand, WheelCommand),
    Halt,
}

/// Shared view of the recorded wheel writes
#[derive(Debug, Clone, Default)]
pub struct WheelLog(Arc<Mutex<Vec<WheelEvent>>>);

impl WheelLog {
    pub fn events(&self) -> Vec<WheelEvent> {
        lock(&self.0).clone()
    }

    pub fn drive_count(&self) -> usize {
        lock(&self.0)
            .iter()
            .filter(|e| matches!(e, WheelEvent::Drive(..)))
            .count()
    }

    /// True when the last recorded write was a halt
    pub fn ends_halted(&self) -> bool {
        matches!(lock(&self.0).last(), Some(WheelEvent::Halt))
    }

    fn push(&self, event: WheelEvent) {
        lock(&self.0).push(event);
    }
}

/// Wheel drive that records every command
#[derive(Debug, Default)]
pub struct RecordingWheels {
    log: WheelLog,
    writes: usize,
    fail_after: Option<usize>,
}

impl RecordingWheels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write from the `n`th (zero based) onward fails, halts included
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn log(&self) -> WheelLog {
        self.log.clone()
    }

    fn check(&mut self) -> Result<()> {
        let index = self.writes;
        self.writes += 1;
        if self.fail_after.map_or(false, |n| index >= n) {
            return Err(Error::ActuatorFault("scripted failure".into()));
        }
        Ok(())
    }
}

impl WheelDrive for RecordingWheels {
    fn drive(&mut self, left: WheelCommand, right: WheelCommand) -> Result<()> {
        self.check()?;
        self.log.push(WheelEvent::Drive(left, right));
        Ok(())
    }

    fn halt(&mut self) -> Result<()> {
        self.check()?;
        self.log.push(WheelEvent::Halt);
        Ok(())
    }
}

/// Handles kept by a test after the hardware moves into a controller
#[derive(Debug, Clone)]
pub struct MockProbes {
    pub clock: ManualClock,
    pub wheels: WheelLog,
    pub gyro_reads: ReadCounter,
    pub range_reads: ReadCounter,
}

/// Bundle scripted sensors with a manual clock and recording wheels
pub fn scripted_hardware(
    gyro: ScriptedRateSensor,
    range: ScriptedRangeSensor,
    wheels: RecordingWheels,
) -> (Hardware, MockProbes) {
    let clock = ManualClock::new();
    let probes = MockProbes {
        clock: clock.clone(),
        wheels: wheels.log(),
        gyro_reads: gyro.read_counter(),
        range_reads: range.read_counter(),
    };
    let hardware = Hardware::new(
        Box::new(clock),
        Box::new(gyro),
        Box::new(range),
        Box::new(wheels),
    );
    (hardware, probes)
}
