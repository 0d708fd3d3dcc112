//! # Platform requests
//!
//! Requests are sent by a client on the request socket, each one answered by exactly one
//! [`PlatResponse`]. Program progress is published separately as [`PlatProgress`] messages.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::{AutoProgram, MotorCommand, PlatformMode, Status};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A request made by a client of the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlatRequest {
    /// Read the current drive status.
    GetStatus,

    /// Change the control mode.
    SetMode(PlatformMode),

    /// Compile and store a new autonomous program.
    UploadProgram(AutoProgram),

    /// Stop both tracks immediately.
    Stop,

    /// Open a manual control session.
    ConnectManual,

    /// Set the target of one track, only valid inside a manual session.
    Drive(MotorCommand),

    /// Open an automatic session, running the stored program.
    StartAuto,

    /// Close the current session, cancelling any running program.
    Disconnect,
}

/// Response to a [`PlatRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlatResponse {
    /// The request was executed.
    Ok,

    /// The program was compiled into the given number of steps.
    Steps(usize),

    /// The current drive status.
    Status(Status),

    /// The request was valid but not allowed in the current state.
    Rejected(String),

    /// The request could not be parsed.
    Invalid(String),
}

/// Messages published while an automatic program runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PlatProgress {
    /// Fraction of the program's steps completed, between 0 and 1.
    Progress(f64),

    /// The program ran to completion, the session is closed.
    Finished,
}
