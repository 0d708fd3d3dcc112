//! Motor driver parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Pin assignments of the motor driver boards.
///
/// Pins are BCM GPIO numbers. Per-track values are given as `[left, right]`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Params {
    /// Fault outputs of the driver boards, active low.
    pub fault_pins: [u8; 2],

    /// Direction inputs.
    pub dir_pins: [u8; 2],

    /// Level of the direction input that drives the track forwards. The motors are mounted
    /// mirrored so the two tracks use opposite levels.
    pub forward_level_high: [bool; 2],

    /// Sleep inputs, low puts the driver to sleep and removes drive current.
    pub sleep_pins: [u8; 2],

    /// Microstepping mode inputs M0, M1 and M2.
    pub m0_pins: [u8; 2],
    pub m1_pins: [u8; 2],
    pub m2_pins: [u8; 2],

    /// Hardware PWM channel generating each track's step signal (0 or 1).
    pub step_pwm_channels: [u8; 2],

    /// Duty cycle of the step signal.
    pub step_duty_cycle: f64,

    /// Status LED, lit while the driver is running.
    pub status_led_pin: u8,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            fault_pins: [6, 5],
            dir_pins: [3, 2],
            forward_level_high: [true, false],
            sleep_pins: [22, 23],
            m0_pins: [19, 9],
            m1_pins: [20, 10],
            m2_pins: [21, 11],
            step_pwm_channels: [0, 1],
            step_duty_cycle: 0.5,
            status_led_pin: 14,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_params_file() {
        let params: Params = util::params::from_str(
            include_str!("../../../params/motor_driver.toml")
        ).unwrap();

        assert_eq!(params, Params::default());
    }
}
