//! # Platform control
//!
//! The single entry point of every control channel. The mode decides which channel may drive
//! the platform, and a session gives one client of that channel exclusive control:
//!
//! - `ManualControl`: a [`ManualSession`] sets the track targets directly.
//! - `AutomaticControl`: an uploaded program is compiled, and an automatic session runs it on the
//!   [`Sequencer`].
//! - `None` and `Bluetooth`: nothing drives the platform.
//!
//! Leaving manual control always stops the vehicle and ends any running program.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, RwLock,
    },
};

use comms_if::plat::{HighLevelInstruction, MotorCommand, PlatformMode, Status};
use log::{debug, info};

use crate::{
    auto::{
        CompileError, ProfileCompiler, ProgressSink, Program, RunId, RunOutcome, Sequencer,
        SequencerError,
    },
    control_state::{lock, ControlState},
    drive_ctrl::{validate_cmd, DriveCtrlError},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Platform control, cheap to clone and share between threads.
#[derive(Clone)]
pub struct PlatCtrl {
    inner: Arc<Inner>,
}

/// Exclusive manual control of the platform.
///
/// The session ends when this handle is dropped or [`ManualSession::end`] is called, and the
/// vehicle is stopped.
pub struct ManualSession {
    inner: Arc<Inner>,
    id: u64,
    ended: bool,
}

struct Inner {
    control: Arc<ControlState>,

    gate: Mutex<Gate>,

    program: RwLock<Option<Arc<Program>>>,
    compiler: ProfileCompiler,
    sequencer: Sequencer,

    next_session_id: AtomicU64,
}

/// Mode and session, held under one lock so they change together.
#[derive(Debug)]
struct Gate {
    mode: PlatformMode,
    session: Option<ActiveSession>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActiveSession {
    Manual(u64),
    Automatic {
        id: u64,
        run_id: RunId,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Cannot start a session in {0:?} mode")]
    WrongMode(PlatformMode),

    #[error("Another session is already active")]
    AlreadyActive,

    #[error("No program has been uploaded")]
    NoProgram,

    #[error("The session has been revoked")]
    Revoked,

    #[error("Invalid command: {0}")]
    InvalidCommand(DriveCtrlError),

    #[error("Could not start the program: {0}")]
    Sequencer(SequencerError),
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Programs can only be uploaded in automatic mode, the platform is in {0:?} mode")]
    WrongMode(PlatformMode),

    #[error("Programs cannot be uploaded while a session is active")]
    SessionActive,

    #[error("Could not compile the program: {0}")]
    Compile(CompileError),
}

/// Error changing mode. Every mode change is currently accepted.
#[derive(Debug)]
pub enum ModeError {}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PlatCtrl {
    /// Create the controller in mode `None` with no program.
    pub fn new(control: Arc<ControlState>, compiler: ProfileCompiler) -> Self {
        Self {
            inner: Arc::new(Inner {
                control,
                gate: Mutex::new(Gate {
                    mode: PlatformMode::None,
                    session: None,
                }),
                program: RwLock::new(None),
                compiler,
                sequencer: Sequencer::new(),
                next_session_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn control(&self) -> &Arc<ControlState> {
        &self.inner.control
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.inner.sequencer
    }

    pub fn mode(&self) -> PlatformMode {
        lock(&self.inner.gate).mode
    }

    /// True if a manual or automatic session is active.
    pub fn session_active(&self) -> bool {
        lock(&self.inner.gate).session.is_some()
    }

    /// Snapshot of the platform's drive state.
    pub fn get_status(&self) -> Status {
        let control = &self.inner.control;
        let faults = control.faults();
        let target = control.target.get();
        let current = control.current();

        Status {
            fault_left: faults.left,
            fault_right: faults.right,
            current_target_left: target.left,
            current_target_right: target.right,
            current_instruction_left: current.left,
            current_instruction_right: current.right,
            mode: self.mode(),
        }
    }

    /// Change the control mode.
    ///
    /// Any mode other than `ManualControl` stops the vehicle. Sessions the new mode no longer
    /// allows are revoked, only a manual session survives a change to `ManualControl`. A revoked
    /// automatic session's program is cancelled before this returns.
    pub fn set_mode(&self, mode: PlatformMode) -> Result<(), ModeError> {
        let cancel_run = {
            let mut gate = lock(&self.inner.gate);

            if gate.mode != mode {
                info!("Mode changed from {:?} to {:?}", gate.mode, mode);
            }
            gate.mode = mode;

            let keep = mode == PlatformMode::ManualControl
                && matches!(gate.session, Some(ActiveSession::Manual(_)));
            let revoked = if keep { None } else { gate.session.take() };

            if mode != PlatformMode::ManualControl {
                self.inner.control.target.stop();
            }

            match revoked {
                Some(ActiveSession::Automatic { run_id, .. }) => {
                    info!("Automatic session revoked");
                    Some(run_id)
                },
                Some(ActiveSession::Manual(id)) => {
                    info!("Manual session {} revoked", id);
                    None
                },
                None => None
            }
        };

        // The sequencer's finish callback takes the gate lock, so cancel outside of it
        if let Some(run_id) = cancel_run {
            self.inner.sequencer.cancel_run(run_id);
        }

        Ok(())
    }

    /// Compile and store a new program, returning its number of steps.
    ///
    /// The stored program is only replaced if the new one compiles.
    pub fn upload_program(
        &self,
        program: &[HighLevelInstruction]
    ) -> Result<usize, UploadError> {
        let gate = lock(&self.inner.gate);

        if gate.mode != PlatformMode::AutomaticControl {
            return Err(UploadError::WrongMode(gate.mode))
        }
        if gate.session.is_some() {
            return Err(UploadError::SessionActive)
        }

        let compiled = self.inner.compiler.compile(program).map_err(UploadError::Compile)?;
        let num_steps = compiled.len();

        match self.inner.program.write() {
            Ok(mut p) => *p = Some(Arc::new(compiled)),
            Err(e) => *e.into_inner() = Some(Arc::new(compiled)),
        }

        info!("Program of {} instructions uploaded ({} steps)", program.len(), num_steps);

        Ok(num_steps)
    }

    /// True if a program has been uploaded.
    pub fn has_program(&self) -> bool {
        self.program().is_some()
    }

    /// Open a manual session.
    pub fn begin_manual_session(&self) -> Result<ManualSession, SessionError> {
        let mut gate = lock(&self.inner.gate);

        if gate.mode != PlatformMode::ManualControl {
            return Err(SessionError::WrongMode(gate.mode))
        }
        if gate.session.is_some() {
            return Err(SessionError::AlreadyActive)
        }

        let id = self.inner.next_session_id.fetch_add(1, Ordering::SeqCst);
        gate.session = Some(ActiveSession::Manual(id));

        info!("Manual session {} started", id);

        Ok(ManualSession {
            inner: self.inner.clone(),
            id,
            ended: false,
        })
    }

    /// Open an automatic session, running the uploaded program and reporting progress to `sink`.
    ///
    /// The session ends by itself when the program finishes or is cancelled.
    pub fn begin_automatic_session(
        &self,
        sink: Box<dyn ProgressSink>
    ) -> Result<(), SessionError> {
        let mut gate = lock(&self.inner.gate);

        if gate.mode != PlatformMode::AutomaticControl {
            return Err(SessionError::WrongMode(gate.mode))
        }
        if gate.session.is_some() {
            return Err(SessionError::AlreadyActive)
        }

        let program = self.program().ok_or(SessionError::NoProgram)?;
        let id = self.inner.next_session_id.fetch_add(1, Ordering::SeqCst);

        let inner = self.inner.clone();
        let run_id = self.inner.sequencer.start_run(
            program,
            self.inner.control.clone(),
            sink,
            move |outcome: RunOutcome| {
                let mut gate = lock(&inner.gate);
                if let Some(ActiveSession::Automatic { id: active, .. }) = gate.session {
                    if active == id {
                        gate.session = None;
                        info!("Automatic session {} ended ({:?})", id, outcome);
                    }
                }
            }
        ).map_err(SessionError::Sequencer)?;

        gate.session = Some(ActiveSession::Automatic { id, run_id });

        info!("Automatic session {} started", id);

        Ok(())
    }

    /// End the automatic session, cancelling its program if still running.
    pub fn end_automatic_session(&self) {
        let run_id = {
            let mut gate = lock(&self.inner.gate);
            match gate.session {
                Some(ActiveSession::Automatic { id, run_id }) => {
                    gate.session = None;
                    info!("Automatic session {} ended by the client", id);
                    Some(run_id)
                },
                _ => None
            }
        };

        if let Some(run_id) = run_id {
            self.inner.sequencer.cancel_run(run_id);
        }
    }

    /// Demand both tracks stop.
    ///
    /// A running program is cancelled first, ending its automatic session, so it can't set a
    /// new target afterwards. A manual session stays open.
    pub fn request_stop(&self) {
        info!("Stop requested");

        let run_id = match lock(&self.inner.gate).session {
            Some(ActiveSession::Automatic { run_id, .. }) => Some(run_id),
            _ => None
        };

        // The run's finish callback closes the session, it takes the gate lock
        if let Some(run_id) = run_id {
            self.inner.sequencer.cancel_run(run_id);
        }

        self.inner.control.target.stop();
    }

    fn program(&self) -> Option<Arc<Program>> {
        match self.inner.program.read() {
            Ok(p) => p.clone(),
            Err(e) => e.into_inner().clone(),
        }
    }
}

impl fmt::Display for ModeError {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

impl std::error::Error for ModeError {}

impl ManualSession {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Set the target of the track named by the command.
    pub fn set_target(&self, cmd: MotorCommand) -> Result<(), SessionError> {
        let gate = lock(&self.inner.gate);

        if gate.session != Some(ActiveSession::Manual(self.id)) {
            return Err(SessionError::Revoked)
        }

        validate_cmd(cmd.side, &cmd).map_err(SessionError::InvalidCommand)?;

        debug!("Manual target: {:?}", cmd);
        self.inner.control.target.set(cmd);

        Ok(())
    }

    /// True until the session is ended or revoked.
    pub fn is_active(&self) -> bool {
        lock(&self.inner.gate).session == Some(ActiveSession::Manual(self.id))
    }

    /// End the session and stop the vehicle.
    pub fn end(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.ended {
            return
        }
        self.ended = true;

        let mut gate = lock(&self.inner.gate);
        if gate.session == Some(ActiveSession::Manual(self.id)) {
            gate.session = None;
            self.inner.control.target.stop();
            info!("Manual session {} ended", self.id);
        }
        else {
            debug!("Manual session {} was revoked before it ended", self.id);
        }
    }
}

impl Drop for ManualSession {
    fn drop(&mut self) {
        self.release();
    }
}
