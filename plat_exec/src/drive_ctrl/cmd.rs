//! Motor outputs computed by DriveCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::plat::MotorCommand;
use serde::Serialize;

use super::STEPS_PER_REV;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Everything the motor driver needs to drive one track for a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackOutput {
    /// The ramped and coupled command.
    pub cmd: MotorCommand,

    /// Microstepping mode to drive the motor in.
    pub microsteps: Microstepping,

    /// Frequency of the step signal, zero when the track is stopped.
    ///
    /// Units: Hz
    pub step_freq_hz: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Microstepping modes used to drive the steppers.
///
/// Finer stepping is smoother but needs a higher step rate for the same speed, so faster speeds
/// use coarser modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Microstepping {
    Half,
    Quarter,
    Eighth,
    Sixteenth,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Microstepping {
    /// Select the microstepping mode for the given speed.
    pub fn for_rpm(rpm: f64) -> Self {
        if rpm <= 50.0 {
            Microstepping::Sixteenth
        }
        else if rpm <= 100.0 {
            Microstepping::Eighth
        }
        else if rpm <= 200.0 {
            Microstepping::Quarter
        }
        else {
            Microstepping::Half
        }
    }

    /// Number of microsteps per full step.
    pub fn factor(self) -> f64 {
        match self {
            Microstepping::Half => 2.0,
            Microstepping::Quarter => 4.0,
            Microstepping::Eighth => 8.0,
            Microstepping::Sixteenth => 16.0,
        }
    }

    /// Levels of the driver's mode pins `[M0, M1, M2]` selecting this mode (DRV8825 table).
    pub fn mode_pins(self) -> [bool; 3] {
        match self {
            Microstepping::Half => [true, false, false],
            Microstepping::Quarter => [false, true, false],
            Microstepping::Eighth => [true, true, false],
            Microstepping::Sixteenth => [false, false, true],
        }
    }
}

impl TrackOutput {
    /// Derive the driver outputs for a command.
    pub fn from_cmd(cmd: MotorCommand) -> Self {
        let microsteps = Microstepping::for_rpm(cmd.rpm);

        Self {
            cmd,
            microsteps,
            step_freq_hz: step_frequency_hz(cmd.rpm, microsteps),
        }
    }
}

/// Step signal frequency needed to turn a motor at `rpm` in the given microstepping mode.
pub fn step_frequency_hz(rpm: f64, microsteps: Microstepping) -> f64 {
    rpm / 60.0 * STEPS_PER_REV * microsteps.factor()
}
