//! Profile compiler parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::drive_ctrl::ParamsError;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters used to turn high level instructions into timed steps.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProfileParams {
    /// Cruise speed of straight manouvres.
    ///
    /// Units: rpm
    pub straight_rpm: f64,

    /// Cruise speed of point turns.
    ///
    /// Units: rpm
    pub turn_rpm: f64,

    /// Distance a track moves for one revolution of its motor.
    ///
    /// Units: meters
    pub track_circumference_m: f64,

    /// Distance between the centres of the two tracks. Each track travels along a circle of
    /// this diameter during a point turn.
    ///
    /// Units: meters
    pub track_gauge_m: f64,

    /// Duration of the stop inserted after every manouvre.
    ///
    /// Units: seconds
    pub spacer_duration_s: f64,
}

impl ProfileParams {
    /// Distance each track travels to turn the vehicle by one degree.
    ///
    /// Units: meters
    pub fn one_degree_distance_m(&self) -> f64 {
        self.track_gauge_m * std::f64::consts::PI / 360.0
    }

    /// Check the parameters are usable.
    pub fn are_valid(&self) -> Result<(), ParamsError> {
        let checks = [
            ("straight_rpm", self.straight_rpm),
            ("turn_rpm", self.turn_rpm),
            ("track_circumference_m", self.track_circumference_m),
            ("track_gauge_m", self.track_gauge_m),
            ("spacer_duration_s", self.spacer_duration_s),
        ];

        for &(name, val) in checks.iter() {
            if !val.is_finite() || val <= 0.0 {
                return Err(ParamsError::NotPositive(name, val))
            }
        }

        Ok(())
    }
}

impl Default for ProfileParams {
    fn default() -> Self {
        Self {
            straight_rpm: 100.0,
            turn_rpm: 50.0,
            track_circumference_m: 0.47 / 2.5 / 2.0,
            track_gauge_m: 0.205,
            spacer_duration_s: 0.5,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_params_file() {
        let params: ProfileParams = util::params::from_str(
            include_str!("../../../params/auto.toml")
        ).unwrap();

        assert!(params.are_valid().is_ok());
        assert_eq!(params.straight_rpm, 100.0);
        assert!((params.track_circumference_m - 0.094).abs() < 1e-12);
        assert!((params.one_degree_distance_m() - 0.001_788_962).abs() < 1e-8);
    }
}
