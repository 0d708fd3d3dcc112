//! Parameters structure for DriveCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for drive control.
///
/// The same parameters are used by the profile compiler, so that the timing of a compiled
/// program matches what the controller will do with it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Params {

    // ---- TIMING ----

    /// Period of the control cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    // ---- RAMP ----

    /// Maximum speed increase in one cycle.
    ///
    /// Units: revolutions/minute
    pub accel_rpm_per_cycle: f64,

    /// Maximum speed decrease in one cycle.
    ///
    /// Units: revolutions/minute
    pub decel_rpm_per_cycle: f64,

    // ---- COUPLING ----

    /// Maximum amount a track may run faster than the other when both run in the same
    /// direction, or when one of them is stopped.
    ///
    /// Units: revolutions/minute
    pub unary_limit_rpm: f64,

    /// Maximum speed of both tracks when they run in opposite directions.
    ///
    /// Units: revolutions/minute
    pub contrary_limit_rpm: f64,
}

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("Parameter {0} must be finite and greater than zero, found {1}")]
    NotPositive(&'static str, f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            cycle_period_s: 0.1,
            accel_rpm_per_cycle: 8.0,
            decel_rpm_per_cycle: 25.0,
            unary_limit_rpm: 125.0,
            contrary_limit_rpm: 50.0,
        }
    }
}

impl Params {

    /// Determines if the parameters are valid.
    pub fn are_valid(&self) -> Result<(), ParamsError> {
        let checks = [
            ("cycle_period_s", self.cycle_period_s),
            ("accel_rpm_per_cycle", self.accel_rpm_per_cycle),
            ("decel_rpm_per_cycle", self.decel_rpm_per_cycle),
            ("unary_limit_rpm", self.unary_limit_rpm),
            ("contrary_limit_rpm", self.contrary_limit_rpm),
        ];

        for &(name, val) in checks.iter() {
            if !val.is_finite() || val <= 0.0 {
                return Err(ParamsError::NotPositive(name, val))
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_params_file() {
        let p: Params = util::params::from_str(include_str!("../../../params/drive_ctrl.toml"))
            .unwrap();
        assert_eq!(p, Params::default());
        assert!(p.are_valid().is_ok());
    }

    #[test]
    fn test_invalid() {
        let p = Params {
            decel_rpm_per_cycle: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            p.are_valid(),
            Err(ParamsError::NotPositive("decel_rpm_per_cycle", _))
        ));
    }
}
