//! Implementations for the DriveCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::Serialize;

// Internal
use super::{
    enforce_coupling, ramp_towards, validate_cmd,
    DriveCtrlError, Microstepping, Params, ParamsError, TrackOutput, TrackPair};
use comms_if::plat::{Direction, MotorCommand, Track};
use util::{
    module::State,
    archive::{get_elapsed_seconds, ArchiveError, Archived, Archiver},
    session::Session};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drive control module state
pub struct DriveCtrl {

    pub(crate) params: Params,

    /// The command currently applied to each track.
    current: TrackPair<MotorCommand>,

    report: StatusReport,

    output: Option<TrackPair<TrackOutput>>,
    arch_output: Archiver,
}

/// Input data to DriveCtrl.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputData {
    /// The target for each track, or `None` if no target has been set for that track yet.
    pub target: TrackPair<Option<MotorCommand>>,
}

/// Output of DriveCtrl that the motor driver must execute.
pub type OutputData = TrackPair<TrackOutput>;

/// Status report for DriveCtrl processing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatusReport {
    /// True for each track whose speed was capped by the coupling limit.
    pub coupling_limited: TrackPair<bool>,

    /// True if the tracks were driven in opposite directions.
    pub contrary: bool,
}

/// Flat row written to the drive control archive each cycle.
#[derive(Serialize)]
struct OutputRecord {
    time_s: f64,
    left_rpm: f64,
    left_dir: Direction,
    left_microsteps: Microstepping,
    left_step_freq_hz: f64,
    left_limited: bool,
    right_rpm: f64,
    right_dir: Direction,
    right_microsteps: Microstepping,
    right_step_freq_hz: f64,
    right_limited: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for DriveCtrl {
    fn default() -> Self {
        Self {
            params: Params::default(),
            current: TrackPair::stopped(),
            report: StatusReport::default(),
            output: None,
            arch_output: Archiver::default(),
        }
    }
}

impl DriveCtrl {
    /// The command currently applied to each track.
    pub fn current(&self) -> TrackPair<MotorCommand> {
        self.current
    }

    /// The parameters the controller was initialised with.
    pub fn params(&self) -> &Params {
        &self.params
    }
}

impl State for DriveCtrl {
    type InitData = Params;
    type InitError = ParamsError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = DriveCtrlError;

    /// Initialise the DriveCtrl module.
    ///
    /// Expected init data is the loaded parameters, which are checked before use.
    fn init(&mut self, init_data: Self::InitData, session: Option<&Session>)
        -> Result<(), Self::InitError>
    {
        init_data.are_valid()?;
        self.params = init_data;

        // Archiving is best effort, the controller must run without it
        if let Some(session) = session {
            match Archiver::from_path(session, "drive_ctrl/output.csv") {
                Ok(a) => self.arch_output = a,
                Err(e) => log::warn!("Cannot archive DriveCtrl output: {}", e),
            }
        }

        self.current = TrackPair::stopped();
        self.output = None;

        Ok(())
    }

    /// Perform cyclic processing of drive control.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        // Check both targets before touching any state
        for (track, target) in input_data.target.iter() {
            if let Some(t) = target {
                validate_cmd(track, t)?;
            }
        }

        // Ramp each track towards its target
        let mut next = self.current;
        for (track, target) in input_data.target.iter() {
            if let Some(t) = target {
                *next.get_mut(track) = ramp_towards(self.current.get(track), t, &self.params);
            }
        }

        let contrary = next.left.dir != next.right.dir
            && next.left.rpm != 0.0
            && next.right.rpm != 0.0;
        let coupling_limited = enforce_coupling(&mut next, &self.params);

        self.current = next;
        self.report = StatusReport {
            coupling_limited,
            contrary,
        };

        let output = next.map(|_, cmd| TrackOutput::from_cmd(cmd));

        trace!(
            "DriveCtrl output:\n    left: {:.1} rpm {:?} ({:.1} Hz)\n    right: {:.1} rpm {:?} ({:.1} Hz)",
            output.left.cmd.rpm, output.left.cmd.dir, output.left.step_freq_hz,
            output.right.cmd.rpm, output.right.cmd.dir, output.right.step_freq_hz
        );

        self.output = Some(output);

        Ok((output, self.report))
    }
}

impl Archived for DriveCtrl {
    fn write(&mut self) -> Result<(), ArchiveError> {
        let output = match self.output {
            Some(o) => o,
            None => return Ok(())
        };

        self.arch_output.serialise(OutputRecord {
            time_s: get_elapsed_seconds(),
            left_rpm: output.left.cmd.rpm,
            left_dir: output.left.cmd.dir,
            left_microsteps: output.left.microsteps,
            left_step_freq_hz: output.left.step_freq_hz,
            left_limited: *self.report.coupling_limited.get(Track::Left),
            right_rpm: output.right.cmd.rpm,
            right_dir: output.right.cmd.dir,
            right_microsteps: output.right.microsteps,
            right_step_freq_hz: output.right.step_freq_hz,
            right_limited: *self.report.coupling_limited.get(Track::Right),
        })
    }
}
