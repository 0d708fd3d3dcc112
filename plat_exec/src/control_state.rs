//! # Control state
//!
//! State shared between the drive loop, the control server and the sequencer worker.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{Mutex, MutexGuard, RwLock};

use comms_if::plat::{MotorCommand, Track};
use log::warn;

use crate::{
    drive_ctrl::TrackPair,
    motor_driver::MotorDriver,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The target of each track.
///
/// A single slot, each write replaces the previous target. Both tracks live under the same lock
/// so a reader never sees half of a pair written by the sequencer.
#[derive(Debug, Default)]
pub struct TargetSlot {
    targets: Mutex<TrackPair<Option<MotorCommand>>>,
}

/// State shared by every part of the platform executable.
pub struct ControlState {
    /// Targets demanded by the active control channel.
    pub target: TargetSlot,

    /// Commands applied by the drive controller on the last cycle.
    current: RwLock<TrackPair<MotorCommand>>,

    /// The hardware driving the tracks.
    driver: Mutex<Box<dyn MotorDriver>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TargetSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read both targets.
    pub fn get(&self) -> TrackPair<Option<MotorCommand>> {
        *lock(&self.targets)
    }

    /// Set the target of the track named by the command.
    pub fn set(&self, cmd: MotorCommand) {
        *lock(&self.targets).get_mut(cmd.side) = Some(cmd);
    }

    /// Set the targets of both tracks.
    pub fn set_pair(&self, pair: TrackPair<MotorCommand>) {
        *lock(&self.targets) = pair.map(|_, cmd| Some(cmd));
    }

    /// Demand both tracks stop.
    pub fn stop(&self) {
        self.set_pair(TrackPair::stopped());
    }
}

impl ControlState {
    pub fn new(driver: Box<dyn MotorDriver>) -> Self {
        Self {
            target: TargetSlot::new(),
            current: RwLock::new(TrackPair::stopped()),
            driver: Mutex::new(driver),
        }
    }

    /// Commands applied by the drive controller on the last cycle.
    pub fn current(&self) -> TrackPair<MotorCommand> {
        match self.current.read() {
            Ok(c) => *c,
            Err(e) => *e.into_inner(),
        }
    }

    /// Publish the commands applied this cycle.
    pub fn set_current(&self, current: TrackPair<MotorCommand>) {
        match self.current.write() {
            Ok(mut c) => *c = current,
            Err(e) => *e.into_inner() = current,
        }
    }

    /// Lock the motor driver.
    pub fn driver(&self) -> MutexGuard<'_, Box<dyn MotorDriver>> {
        lock(&self.driver)
    }

    /// Read the fault signals of both drivers.
    ///
    /// A fault line that can't be read is reported as a fault.
    pub fn faults(&self) -> TrackPair<bool> {
        let driver = self.driver();

        TrackPair::new(Track::Left, Track::Right).map(|_, track| {
            driver.read_fault(track).unwrap_or_else(|e| {
                warn!("Could not read the {:?} fault line: {}", track, e);
                true
            })
        })
    }
}

/// Lock a mutex, recovering it if a panicking thread poisoned it.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(g) => g,
        Err(e) => {
            warn!("Recovering a poisoned lock");
            e.into_inner()
        }
    }
}
