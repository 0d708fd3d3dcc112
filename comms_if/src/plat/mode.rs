//! # Platform mode and status

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::MotorCommand;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Snapshot of the platform's drive state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    /// True if the left motor driver signals a fault.
    pub fault_left: bool,

    /// True if the right motor driver signals a fault.
    pub fault_right: bool,

    /// The target demanded for the left track, if one was ever set.
    pub current_target_left: Option<MotorCommand>,

    /// The target demanded for the right track, if one was ever set.
    pub current_target_right: Option<MotorCommand>,

    /// The ramped command currently applied to the left track.
    pub current_instruction_left: MotorCommand,

    /// The ramped command currently applied to the right track.
    pub current_instruction_right: MotorCommand,

    /// The active control mode.
    pub mode: PlatformMode,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Steering mode of the platform, deciding which control channel may drive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformMode {
    /// No channel may drive the platform.
    None,

    /// Reserved for a bluetooth remote, no channel in this software drives in this mode.
    Bluetooth,

    /// Live operator control through a manual session.
    #[serde(rename = "HTTPManual")]
    ManualControl,

    /// Execution of an uploaded program through an automatic session.
    #[serde(rename = "HTTPAutomatic")]
    AutomaticControl,
}

impl Default for PlatformMode {
    fn default() -> Self {
        PlatformMode::None
    }
}
