//! # Motor driver module
//!
//! Abstracts the hardware driving the two track steppers. Each track has a stepper driver board
//! (DRV8825) taking a direction input, three microstepping mode inputs, a step signal and a
//! sleep input, and signalling faults on an active low output.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod params;

/// Driver recording the demanded state, for host builds and tests.
pub mod sim;

/// [`MotorDriver`] implementation for the Raspberry Pi GPIO and hardware PWM peripherals.
#[cfg(all(target_arch = "arm", target_os = "linux"))]
pub mod rpi;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use params::*;
pub use sim::SimDriver;

#[cfg(all(target_arch = "arm", target_os = "linux"))]
pub use rpi::RpiDriver;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::plat::{Direction, Track};

use crate::drive_ctrl::{OutputData, Microstepping};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Trait to provide a unified API for the track motor drivers.
pub trait MotorDriver: Send {

    /// Set the direction and microstepping mode of a track's stepper.
    fn set_direction_and_microstepping(
        &mut self,
        track: Track,
        dir: Direction,
        microsteps: Microstepping
    ) -> Result<(), DriverError>;

    /// Set the step signal frequency of a track.
    ///
    /// A frequency of zero stops the step signal and disables the drive current of the track,
    /// any other frequency enables it. Negative or non-finite frequencies are rejected.
    fn set_step_frequency(&mut self, track: Track, freq_hz: f64) -> Result<(), DriverError>;

    /// Read the fault signal of a track's driver, `true` if the driver reports a fault.
    fn read_fault(&self, track: Track) -> Result<bool, DriverError>;

    /// Stop both tracks and release the hardware.
    fn shutdown(&mut self) -> Result<(), DriverError>;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    #[error("Could not configure the motor driver: {0}")]
    ConfigurationError(String),

    #[error("Step frequency must be finite and not negative, found {0}")]
    InvalidFrequency(f64),

    #[error("A PWM error occured: {0}")]
    Pwm(String),

    #[error("The driver has been shut down")]
    ShutDown,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Apply the drive controller output for both tracks.
///
/// Each track is given its direction and microstepping, then its step frequency. Both tracks are
/// always attempted, the first error is returned.
pub fn dispatch<D: MotorDriver + ?Sized>(
    driver: &mut D,
    output: &OutputData
) -> Result<(), DriverError> {
    let mut result = Ok(());

    for (track, out) in output.iter() {
        let res = driver
            .set_direction_and_microstepping(track, out.cmd.dir, out.microsteps)
            .and_then(|_| driver.set_step_frequency(track, out.step_freq_hz));

        if let Err(e) = res {
            if result.is_ok() {
                result = Err(e);
            }
        }
    }

    result
}

/// Check a step frequency is one a driver can apply.
pub(crate) fn check_frequency(freq_hz: f64) -> Result<(), DriverError> {
    if freq_hz.is_finite() && freq_hz >= 0.0 {
        Ok(())
    }
    else {
        Err(DriverError::InvalidFrequency(freq_hz))
    }
}
