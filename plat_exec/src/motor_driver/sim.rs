//! Simulated motor driver

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::plat::{Direction, Track};
use log::{info, trace};

use super::{check_frequency, DriverError, MotorDriver};
use crate::drive_ctrl::{Microstepping, TrackPair};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// State of one simulated stepper driver board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimTrackState {
    pub dir: Direction,
    pub microsteps: Microstepping,
    pub step_freq_hz: f64,

    /// True while the driver is supplying drive current (not asleep).
    pub enabled: bool,

    /// Level of the fault output, set by tests to inject faults.
    pub fault: bool,
}

/// A motor driver that records what it was told to do.
#[derive(Debug, Clone)]
pub struct SimDriver {
    tracks: TrackPair<SimTrackState>,

    /// Number of direction/microstepping and frequency calls received.
    num_calls: usize,

    shut_down: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SimTrackState {
    fn default() -> Self {
        Self {
            dir: Direction::Forward,
            microsteps: Microstepping::Sixteenth,
            step_freq_hz: 0.0,
            enabled: false,
            fault: false,
        }
    }
}

impl Default for SimDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimDriver {
    pub fn new() -> Self {
        info!("Using the simulated motor driver");

        Self {
            tracks: TrackPair::default(),
            num_calls: 0,
            shut_down: false,
        }
    }

    /// The last state applied to a track.
    pub fn track(&self, track: Track) -> SimTrackState {
        *self.tracks.get(track)
    }

    /// Set the fault output of a track.
    pub fn set_fault(&mut self, track: Track, fault: bool) {
        self.tracks.get_mut(track).fault = fault;
    }

    pub fn num_calls(&self) -> usize {
        self.num_calls
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    fn check_running(&self) -> Result<(), DriverError> {
        if self.shut_down {
            Err(DriverError::ShutDown)
        }
        else {
            Ok(())
        }
    }
}

impl MotorDriver for SimDriver {
    fn set_direction_and_microstepping(
        &mut self,
        track: Track,
        dir: Direction,
        microsteps: Microstepping
    ) -> Result<(), DriverError> {
        self.check_running()?;

        let state = self.tracks.get_mut(track);
        state.dir = dir;
        state.microsteps = microsteps;
        self.num_calls += 1;

        trace!("SimDriver {:?}: {:?} at {:?} microstepping", track, dir, microsteps);

        Ok(())
    }

    fn set_step_frequency(&mut self, track: Track, freq_hz: f64) -> Result<(), DriverError> {
        self.check_running()?;
        check_frequency(freq_hz)?;

        let state = self.tracks.get_mut(track);
        state.step_freq_hz = freq_hz;
        state.enabled = freq_hz > 0.0;
        self.num_calls += 1;

        trace!("SimDriver {:?}: {:.1} Hz", track, freq_hz);

        Ok(())
    }

    fn read_fault(&self, track: Track) -> Result<bool, DriverError> {
        Ok(self.tracks.get(track).fault)
    }

    fn shutdown(&mut self) -> Result<(), DriverError> {
        for state in [&mut self.tracks.left, &mut self.tracks.right].iter_mut() {
            state.step_freq_hz = 0.0;
            state.enabled = false;
        }
        self.shut_down = true;

        info!("SimDriver shut down");

        Ok(())
    }
}
