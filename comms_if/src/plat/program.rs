//! # Autonomous programs
//!
//! A program is an ordered list of [`HighLevelInstruction`]s. On the wire every instruction
//! carries a `type` and only the fields that type needs, so the fields are optional here and
//! the platform rejects instructions missing a required field when compiling the program.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::Direction;

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// An ordered list of instructions, executed first to last.
pub type AutoProgram = Vec<HighLevelInstruction>;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single driving instruction of an autonomous program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighLevelInstruction {
    /// The kind of manouvre.
    #[serde(rename = "type")]
    pub driving_type: DrivingType,

    /// Time to drive for, required by [`DrivingType::StraightTime`].
    ///
    /// Units: seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    /// Angle to turn by, required by [`DrivingType::Turn`]. Positive angles turn right.
    ///
    /// Units: degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degrees: Option<f64>,

    /// Direction of travel, required by both straight types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,

    /// Distance to drive, required by [`DrivingType::StraightDistance`].
    ///
    /// Units: meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DrivingType {
    /// Drive straight for a fixed time.
    StraightTime,

    /// Drive straight for a fixed distance.
    StraightDistance,

    /// Turn on the spot by a fixed angle.
    Turn,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl HighLevelInstruction {
    pub fn straight_time(duration_s: f64, direction: Direction) -> Self {
        Self {
            driving_type: DrivingType::StraightTime,
            duration: Some(duration_s),
            degrees: None,
            direction: Some(direction),
            distance: None,
        }
    }

    pub fn straight_distance(distance_m: f64, direction: Direction) -> Self {
        Self {
            driving_type: DrivingType::StraightDistance,
            duration: None,
            degrees: None,
            direction: Some(direction),
            distance: Some(distance_m),
        }
    }

    pub fn turn(degrees: f64) -> Self {
        Self {
            driving_type: DrivingType::Turn,
            duration: None,
            degrees: Some(degrees),
            direction: None,
            distance: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_program() {
        let json = r#"[
            {"type": "straightTime", "duration": 2.0, "direction": "Vorwärts"},
            {"type": "turn", "degrees": -90},
            {"type": "straightDistance", "distance": 1.5, "direction": "Rückwärts"}
        ]"#;

        let program: AutoProgram = serde_json::from_str(json).unwrap();

        assert_eq!(program, vec![
            HighLevelInstruction::straight_time(2.0, Direction::Forward),
            HighLevelInstruction::turn(-90.0),
            HighLevelInstruction::straight_distance(1.5, Direction::Backward),
        ]);
    }

    #[test]
    fn test_missing_fields_still_parse() {
        // Completeness is checked by the compiler, not by the wire format
        let inst: HighLevelInstruction =
            serde_json::from_str(r#"{"type": "straightDistance"}"#).unwrap();
        assert_eq!(inst.distance, None);
        assert_eq!(inst.direction, None);
    }
}
