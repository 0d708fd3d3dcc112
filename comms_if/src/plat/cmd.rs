//! # Motor commands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A speed and direction demand for the drive motor of one track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorCommand {
    /// Rotational speed of the track's drive motor.
    ///
    /// Units: revolutions/minute, never negative
    pub rpm: f64,

    /// Direction the track is driven in.
    pub dir: Direction,

    /// The track this command is for.
    pub side: Track,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// One of the two independently driven tracks.
///
/// Serialised as `0` for the left and `1` for the right track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Track {
    Left,
    Right,
}

/// Direction of travel of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "Vorwärts")]
    Forward,

    #[serde(rename = "Rückwärts")]
    Backward,
}

#[derive(Debug, thiserror::Error)]
#[error("{0} is not a valid track identifier, expected 0 (left) or 1 (right)")]
pub struct InvalidTrack(pub u8);

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MotorCommand {
    pub fn new(rpm: f64, dir: Direction, side: Track) -> Self {
        Self { rpm, dir, side }
    }

    /// A command bringing the given track to a standstill.
    pub fn stop(side: Track) -> Self {
        Self {
            rpm: 0.0,
            dir: Direction::Forward,
            side,
        }
    }

    /// True if the command demands no motion.
    pub fn is_stopped(&self) -> bool {
        self.rpm == 0.0
    }
}

impl From<Track> for u8 {
    fn from(track: Track) -> Self {
        match track {
            Track::Left => 0,
            Track::Right => 1,
        }
    }
}

impl TryFrom<u8> for Track {
    type Error = InvalidTrack;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Track::Left),
            1 => Ok(Track::Right),
            v => Err(InvalidTrack(v)),
        }
    }
}
