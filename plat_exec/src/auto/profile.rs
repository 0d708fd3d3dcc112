//! # Motion profile compiler
//!
//! Turns a list of [`HighLevelInstruction`]s into a [`Program`] of timed track targets. Every
//! manouvre compiles to a cruise step holding the manouvre's speed, a brake step holding a zero
//! speed until the controller has ramped down, and a spacer step letting the tracks settle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::plat::{Direction, DrivingType, HighLevelInstruction, MotorCommand, Track};
use log::debug;
use serde::Serialize;

use super::{
    params::ProfileParams,
    ramp_sim::{RampModel, RampPlan},
};
use crate::drive_ctrl::{self, ParamsError, TrackPair};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Longest time a single step may hold its targets.
///
/// Units: seconds
pub const MAX_STEP_DURATION_S: f64 = 24.0 * 3600.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A pair of track targets held for a fixed time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LowLevelStep {
    /// Time the targets are held for.
    ///
    /// Units: seconds
    pub duration_s: f64,

    /// Targets of both tracks.
    pub target: TrackPair<MotorCommand>,
}

/// A compiled program, never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    steps: Vec<LowLevelStep>,
}

/// Compiles instructions using the drive controller's ramp.
#[derive(Debug, Clone)]
pub struct ProfileCompiler {
    params: ProfileParams,
    model: RampModel,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A validated high level instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Maneuver {
    StraightByTime {
        duration_s: f64,
        dir: Direction,
    },
    StraightByDistance {
        distance_m: f64,
        dir: Direction,
    },
    /// Point turn, positive angles turn right.
    TurnByDegrees {
        degrees: f64,
    },
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CompileError {
    #[error("The program contains no instructions")]
    EmptyProgram,

    #[error("Instruction {index} ({driving_type:?}) is missing the `{field}` field")]
    MissingField {
        index: usize,
        driving_type: DrivingType,
        field: &'static str,
    },

    #[error("Instruction {index} has an invalid `{field}` of {value}")]
    InvalidValue {
        index: usize,
        field: &'static str,
        value: f64,
    },

    #[error(
        "Instruction {index} lasts {duration_s} s but braking from cruise speed alone takes \
         {min_s} s"
    )]
    DurationTooShort {
        index: usize,
        duration_s: f64,
        min_s: f64,
    },

    #[error("Instruction {index} needs a step of {duration_s} s, steps may last at most {max_s} s")]
    StepTooLong {
        index: usize,
        duration_s: f64,
        max_s: f64,
    },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Maneuver {
    /// Validate an instruction, `index` is its position in the program.
    pub fn from_instruction(
        index: usize,
        inst: &HighLevelInstruction
    ) -> Result<Self, CompileError> {
        let missing = |field: &'static str| CompileError::MissingField {
            index,
            driving_type: inst.driving_type,
            field,
        };

        let maneuver = match inst.driving_type {
            DrivingType::StraightTime => Maneuver::StraightByTime {
                duration_s: inst.duration.ok_or_else(|| missing("duration"))?,
                dir: inst.direction.ok_or_else(|| missing("direction"))?,
            },
            DrivingType::StraightDistance => Maneuver::StraightByDistance {
                distance_m: inst.distance.ok_or_else(|| missing("distance"))?,
                dir: inst.direction.ok_or_else(|| missing("direction"))?,
            },
            DrivingType::Turn => Maneuver::TurnByDegrees {
                degrees: inst.degrees.ok_or_else(|| missing("degrees"))?,
            },
        };

        let (field, value, valid) = match maneuver {
            Maneuver::StraightByTime { duration_s, .. } =>
                ("duration", duration_s, duration_s.is_finite() && duration_s > 0.0),
            Maneuver::StraightByDistance { distance_m, .. } =>
                ("distance", distance_m, distance_m.is_finite() && distance_m > 0.0),
            Maneuver::TurnByDegrees { degrees } =>
                ("degrees", degrees, degrees.is_finite() && degrees != 0.0),
        };

        if !valid {
            return Err(CompileError::InvalidValue { index, field, value })
        }

        Ok(maneuver)
    }
}

impl Program {
    pub fn steps(&self) -> &[LowLevelStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false, compiled programs hold at least one manouvre.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Time the program takes to run.
    ///
    /// Units: seconds
    pub fn duration_s(&self) -> f64 {
        self.steps.iter().map(|s| s.duration_s).sum()
    }
}

impl ProfileCompiler {
    pub fn new(
        params: ProfileParams,
        ctrl_params: &drive_ctrl::Params
    ) -> Result<Self, ParamsError> {
        params.are_valid()?;
        ctrl_params.are_valid()?;

        let model = RampModel::new(ctrl_params, params.track_circumference_m);

        Ok(Self { params, model })
    }

    pub fn params(&self) -> &ProfileParams {
        &self.params
    }

    pub fn model(&self) -> &RampModel {
        &self.model
    }

    /// Time the controller takes to stop from the straight cruise speed, not counting the tick
    /// that reaches zero.
    ///
    /// Units: seconds
    pub fn straight_slowdown_s(&self) -> f64 {
        self.model.braking(self.params.straight_rpm).time_s
    }

    /// Compile a whole program.
    ///
    /// Every instruction is validated before any is compiled, so an invalid program produces
    /// nothing.
    pub fn compile(&self, program: &[HighLevelInstruction]) -> Result<Program, CompileError> {
        if program.is_empty() {
            return Err(CompileError::EmptyProgram)
        }

        let maneuvers = program
            .iter()
            .enumerate()
            .map(|(i, inst)| Maneuver::from_instruction(i, inst))
            .collect::<Result<Vec<_>, _>>()?;

        let slowdown_s = self.straight_slowdown_s();
        for (index, m) in maneuvers.iter().enumerate() {
            if let Maneuver::StraightByTime { duration_s, .. } = *m {
                if duration_s <= slowdown_s {
                    return Err(CompileError::DurationTooShort {
                        index,
                        duration_s,
                        min_s: slowdown_s,
                    })
                }
            }
        }

        let mut steps = Vec::with_capacity(maneuvers.len() * 3);
        for (index, m) in maneuvers.iter().enumerate() {
            let first = steps.len();
            self.compile_maneuver(m, &mut steps);

            let too_long = |s: &&LowLevelStep| {
                !s.duration_s.is_finite() || s.duration_s > MAX_STEP_DURATION_S
            };
            if let Some(s) = steps[first..].iter().find(too_long) {
                return Err(CompileError::StepTooLong {
                    index,
                    duration_s: s.duration_s,
                    max_s: MAX_STEP_DURATION_S,
                })
            }

            steps.push(LowLevelStep {
                duration_s: self.params.spacer_duration_s,
                target: TrackPair::stopped(),
            });
        }

        let program = Program { steps };

        debug!(
            "Compiled {} instructions into {} steps lasting {:.2} s",
            maneuvers.len(), program.len(), program.duration_s()
        );

        Ok(program)
    }

    /// Append the cruise and brake steps of a manouvre.
    fn compile_maneuver(&self, maneuver: &Maneuver, steps: &mut Vec<LowLevelStep>) {
        match *maneuver {
            Maneuver::StraightByTime { duration_s, dir } => {
                let slowdown_s = self.straight_slowdown_s();
                let dirs = TrackPair::new(dir, dir);

                steps.push(step(duration_s - slowdown_s, self.params.straight_rpm, dirs));
                steps.push(step(slowdown_s.max(self.model.cycle_period_s()), 0.0, dirs));
            },
            Maneuver::StraightByDistance { distance_m, dir } => {
                let plan = self.model.plan(distance_m, self.params.straight_rpm);
                self.push_plan(&plan, TrackPair::new(dir, dir), steps);
            },
            Maneuver::TurnByDegrees { degrees } => {
                let distance_m = degrees.abs() * self.params.one_degree_distance_m();
                let plan = self.model.plan(distance_m, self.params.turn_rpm);

                let dirs = if degrees > 0.0 {
                    TrackPair::new(Direction::Forward, Direction::Backward)
                }
                else {
                    TrackPair::new(Direction::Backward, Direction::Forward)
                };

                self.push_plan(&plan, dirs, steps);
            },
        }
    }

    fn push_plan(&self, plan: &RampPlan, dirs: TrackPair<Direction>, steps: &mut Vec<LowLevelStep>) {
        steps.push(step(plan.cruise_time_s(&self.model), plan.cruise_rpm, dirs));
        steps.push(step(
            plan.braking.time_s.max(self.model.cycle_period_s()),
            0.0,
            dirs
        ));
    }
}

/// A step holding both tracks at `rpm`.
fn step(duration_s: f64, rpm: f64, dirs: TrackPair<Direction>) -> LowLevelStep {
    LowLevelStep {
        duration_s,
        target: dirs.map(|track: Track, dir| MotorCommand::new(rpm, dir, track)),
    }
}
