//! Drive control module
//!
//! Converts the per-track targets into ramped, coupled motor commands once per cycle. The
//! controller never jumps to a target: each cycle it moves the applied speed by at most the
//! acceleration or deceleration step, brakes to standstill before reversing, and then caps the
//! pair of tracks so they can't be driven far apart.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod cmd;
mod limits;
mod params;
mod ramp;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::plat::{MotorCommand, Track};
use serde::Serialize;

// Internal
pub use cmd::*;
pub use params::*;
pub use state::*;
pub(crate) use limits::enforce_coupling;
pub(crate) use ramp::ramp_towards;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of full steps per revolution of the drive steppers.
pub const STEPS_PER_REV: f64 = 200.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A value held for each of the two tracks.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TrackPair<T> {
    pub left: T,
    pub right: T,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during DriveCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum DriveCtrlError {
    #[error("Target for the {0:?} track is invalid: {1:?}")]
    InvalidTarget(Track, MotorCommand),

    #[error("Target for the {0:?} track was set on the wrong side: {1:?}")]
    WrongSide(Track, MotorCommand),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<T> TrackPair<T> {
    pub fn new(left: T, right: T) -> Self {
        Self { left, right }
    }

    pub fn get(&self, track: Track) -> &T {
        match track {
            Track::Left => &self.left,
            Track::Right => &self.right,
        }
    }

    pub fn get_mut(&mut self, track: Track) -> &mut T {
        match track {
            Track::Left => &mut self.left,
            Track::Right => &mut self.right,
        }
    }

    /// Apply `f` to both values, left first.
    pub fn map<U, F>(self, mut f: F) -> TrackPair<U>
    where
        F: FnMut(Track, T) -> U,
    {
        TrackPair {
            left: f(Track::Left, self.left),
            right: f(Track::Right, self.right),
        }
    }

    /// Iterate over `(track, value)`, left first.
    pub fn iter(&self) -> impl Iterator<Item = (Track, &T)> {
        std::iter::once((Track::Left, &self.left)).chain(std::iter::once((Track::Right, &self.right)))
    }
}

impl TrackPair<MotorCommand> {
    /// Both tracks stopped.
    pub fn stopped() -> Self {
        Self::new(MotorCommand::stop(Track::Left), MotorCommand::stop(Track::Right))
    }
}

/// Check that a command can be applied to the given track.
pub fn validate_cmd(track: Track, cmd: &MotorCommand) -> Result<(), DriveCtrlError> {
    if !cmd.rpm.is_finite() || cmd.rpm < 0.0 {
        return Err(DriveCtrlError::InvalidTarget(track, *cmd))
    }
    if cmd.side != track {
        return Err(DriveCtrlError::WrongSide(track, *cmd))
    }

    Ok(())
}
