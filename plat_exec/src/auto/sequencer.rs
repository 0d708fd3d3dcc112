//! # Program sequencer
//!
//! Walks a compiled program on a worker thread. At the start of each step the worker sets the
//! track targets and reports progress, then sleeps for the step's duration on the cancel
//! channel, so a cancel wakes it immediately.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        mpsc::{channel, Receiver, RecvTimeoutError, Sender},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
};

use log::{debug, error, info, warn};
use util::time::seconds_to_std;

use super::{profile::Program, progress::ProgressSink};
use crate::control_state::{lock, ControlState};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Executes one program at a time.
pub struct Sequencer {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
    next_run_id: AtomicU64,
}

/// Identifies one run of a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunId(u64);

struct Shared {
    state: Mutex<SequencerState>,

    /// Index of the step being executed, zero when no program runs.
    position: AtomicUsize,
}

/// Ends a run when dropped, whether the worker returned or panicked.
struct RunGuard<F: FnOnce(RunOutcome)> {
    control: Arc<ControlState>,
    shared: Arc<Shared>,
    outcome: RunOutcome,
    on_finish: Option<F>,
}

struct Worker {
    run_id: RunId,
    control: Arc<ControlState>,
    cancel_tx: Sender<()>,
    join_handle: JoinHandle<()>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    /// No program has run yet.
    Idle,

    /// A program is running.
    Running,

    /// The last program ran to completion.
    Completed,

    /// The last program was cancelled or its progress peer went away.
    Cancelled,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
    Disconnected,
}

#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error("A program is already running")]
    AlreadyRunning,

    #[error("Could not start the sequencer worker: {0}")]
    SpawnFailed(std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Sequencer {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SequencerState::Idle),
                position: AtomicUsize::new(0),
            }),
            worker: Mutex::new(None),
            next_run_id: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SequencerState {
        *lock(&self.shared.state)
    }

    /// Index of the step currently executed.
    pub fn position(&self) -> usize {
        self.shared.position.load(Ordering::SeqCst)
    }

    /// Start running `program`.
    ///
    /// When the run ends the vehicle is stopped, then `on_finish` is called on the worker thread.
    /// The returned id can be used to cancel this run only.
    pub fn start_run<F>(
        &self,
        program: Arc<Program>,
        control: Arc<ControlState>,
        sink: Box<dyn ProgressSink>,
        on_finish: F,
    ) -> Result<RunId, SequencerError>
    where
        F: FnOnce(RunOutcome) + Send + 'static,
    {
        let mut worker = lock(&self.worker);

        {
            let mut state = lock(&self.shared.state);
            if *state == SequencerState::Running {
                return Err(SequencerError::AlreadyRunning)
            }
            *state = SequencerState::Running;
        }

        // The previous worker has finished its run, it is only returning from `on_finish`, so
        // its handle can be dropped.
        worker.take();

        let (cancel_tx, cancel_rx) = channel();
        let shared = self.shared.clone();
        let worker_control = control.clone();
        let run_id = RunId(self.next_run_id.fetch_add(1, Ordering::SeqCst));

        info!("Starting program of {} steps ({:.1} s)", program.len(), program.duration_s());

        let join_handle = thread::Builder::new()
            .name("sequencer".into())
            .spawn(move || {
                let mut guard = RunGuard {
                    control,
                    shared,
                    outcome: RunOutcome::Cancelled,
                    on_finish: Some(on_finish),
                };

                guard.outcome = run(&program, &guard.control, sink, &cancel_rx, &guard.shared);
            });

        match join_handle {
            Ok(join_handle) => {
                *worker = Some(Worker { run_id, control: worker_control, cancel_tx, join_handle });
                Ok(run_id)
            },
            Err(e) => {
                *lock(&self.shared.state) = SequencerState::Cancelled;
                Err(SequencerError::SpawnFailed(e))
            }
        }
    }

    /// Cancel the running program and wait for the worker to stop the vehicle.
    ///
    /// Does nothing unless a program is running. Returns true if a run was cancelled.
    ///
    /// Must not be called from the `on_finish` callback or while holding a lock that callback
    /// takes.
    pub fn cancel(&self) -> bool {
        self.cancel_if(|_| true)
    }

    /// Cancel the run with the given id, if it is still running.
    ///
    /// Same as [`Sequencer::cancel`] but leaves any later run alone.
    pub fn cancel_run(&self, run_id: RunId) -> bool {
        self.cancel_if(|id| id == run_id)
    }

    fn cancel_if<P: FnOnce(RunId) -> bool>(&self, pred: P) -> bool {
        let worker = {
            let mut worker = lock(&self.worker);
            if self.state() != SequencerState::Running {
                return false
            }

            let selected = match worker.as_ref() {
                Some(w) => pred(w.run_id),
                None => false,
            };
            if !selected {
                return false
            }

            worker.take()
        };

        match worker {
            Some(w) => {
                debug!("Cancelling the running program");

                // The worker may have just finished and dropped its receiver
                w.cancel_tx.send(()).ok();

                if w.join_handle.join().is_err() {
                    warn!("The sequencer worker panicked");
                    self.shared.position.store(0, Ordering::SeqCst);
                    *lock(&self.shared.state) = SequencerState::Cancelled;
                    w.control.target.stop();
                }

                true
            },
            None => false
        }
    }
}

impl<F: FnOnce(RunOutcome)> Drop for RunGuard<F> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("Sequencer worker panicked, stopping the vehicle");
        }

        self.control.target.stop();
        self.shared.position.store(0, Ordering::SeqCst);
        *lock(&self.shared.state) = match self.outcome {
            RunOutcome::Completed => SequencerState::Completed,
            _ => SequencerState::Cancelled,
        };

        info!("Program run ended: {:?}", self.outcome);

        if let Some(on_finish) = self.on_finish.take() {
            on_finish(self.outcome);
        }
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Execute the steps of a program, returning how the run ended.
fn run(
    program: &Program,
    control: &ControlState,
    mut sink: Box<dyn ProgressSink>,
    cancel_rx: &Receiver<()>,
    shared: &Shared,
) -> RunOutcome {
    let num_steps = program.len() as f64;

    for (idx, step) in program.steps().iter().enumerate() {
        if !sink.is_connected() {
            return RunOutcome::Disconnected
        }

        shared.position.store(idx, Ordering::SeqCst);
        control.target.set_pair(step.target);

        if let Err(e) = sink.send_progress(idx as f64 / num_steps) {
            warn!("Abandoning program: {}", e);
            return RunOutcome::Disconnected
        }

        debug!("Step {}: {:?} for {:.2} s", idx, step.target, step.duration_s);

        match cancel_rx.recv_timeout(seconds_to_std(step.duration_s)) {
            Err(RecvTimeoutError::Timeout) => (),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return RunOutcome::Cancelled,
        }
    }

    if let Err(e) = sink.send_progress(1.0) {
        warn!("Could not report completion: {}", e);
    }
    sink.close();

    RunOutcome::Completed
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        auto::{ChannelSink, ProfileCompiler, ProfileParams},
        drive_ctrl::{self, TrackPair},
        motor_driver::SimDriver,
    };
    use comms_if::plat::{Direction, HighLevelInstruction, MotorCommand, PlatProgress};
    use std::time::Duration;

    fn control() -> Arc<ControlState> {
        Arc::new(ControlState::new(Box::new(SimDriver::new())))
    }

    fn program(duration_s: f64) -> Arc<Program> {
        let compiler = ProfileCompiler::new(
            ProfileParams {
                spacer_duration_s: 0.05,
                ..ProfileParams::default()
            },
            &drive_ctrl::Params::default()
        ).unwrap();

        Arc::new(compiler.compile(&[
            HighLevelInstruction::straight_time(duration_s, Direction::Forward)
        ]).unwrap())
    }

    /// Sink which fails hard once the first step has been applied.
    struct PanickingSink;

    impl ProgressSink for PanickingSink {
        fn send_progress(&mut self, _: f64) -> Result<(), crate::auto::SinkError> {
            panic!("progress sink failed")
        }

        fn is_connected(&self) -> bool {
            true
        }

        fn close(&mut self) {}
    }

    fn stopped() -> TrackPair<Option<MotorCommand>> {
        TrackPair::stopped().map(|_, c| Some(c))
    }

    #[test]
    fn test_cancel_idle() {
        let seq = Sequencer::new();
        assert!(!seq.cancel());
        assert_eq!(seq.state(), SequencerState::Idle);
    }

    #[test]
    fn test_run_to_completion() {
        let seq = Sequencer::new();
        let ctrl = control();
        let (tx, rx) = channel();
        let (done_tx, done_rx) = channel();

        seq.start_run(
            program(0.4),
            ctrl.clone(),
            Box::new(ChannelSink::new(tx)),
            move |outcome| done_tx.send(outcome).unwrap()
        ).unwrap();

        assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap(), RunOutcome::Completed);

        let msgs: Vec<PlatProgress> = rx.try_iter().collect();
        assert_eq!(msgs, vec![
            PlatProgress::Progress(0.0),
            PlatProgress::Progress(1.0 / 3.0),
            PlatProgress::Progress(2.0 / 3.0),
            PlatProgress::Progress(1.0),
            PlatProgress::Finished,
        ]);

        assert_eq!(seq.state(), SequencerState::Completed);
        assert_eq!(seq.position(), 0);
        assert_eq!(ctrl.target.get(), stopped());
    }

    #[test]
    fn test_cancel_running() {
        let seq = Sequencer::new();
        let ctrl = control();
        let (tx, _rx) = channel();
        let (done_tx, done_rx) = channel();

        let first_id = seq.start_run(
            program(60.0),
            ctrl.clone(),
            Box::new(ChannelSink::new(tx)),
            move |outcome| done_tx.send(outcome).unwrap()
        ).unwrap();

        assert!(matches!(
            seq.start_run(program(1.0), ctrl.clone(), Box::new(ChannelSink::new(channel().0)), |_| ()),
            Err(SequencerError::AlreadyRunning)
        ));

        // Wait for the first step to be applied
        while ctrl.target.get().left.map(|c| c.rpm) != Some(100.0) {
            thread::sleep(Duration::from_millis(1));
        }

        assert!(seq.cancel());
        assert_eq!(seq.state(), SequencerState::Cancelled);
        assert_eq!(ctrl.target.get(), stopped());
        assert_eq!(done_rx.try_recv().unwrap(), RunOutcome::Cancelled);

        // A new run can start after a cancel, old ids don't cancel it
        let (tx, _rx) = channel();
        let old_id = first_id;
        let new_id = seq.start_run(program(60.0), ctrl, Box::new(ChannelSink::new(tx)), |_| ())
            .unwrap();
        assert_ne!(old_id, new_id);
        assert_eq!(seq.state(), SequencerState::Running);
        assert!(!seq.cancel_run(old_id));
        assert!(seq.cancel_run(new_id));
    }

    #[test]
    fn test_disconnect_abandons_run() {
        let seq = Sequencer::new();
        let ctrl = control();
        let (tx, rx) = channel();
        let (done_tx, done_rx) = channel();
        drop(rx);

        seq.start_run(
            program(60.0),
            ctrl.clone(),
            Box::new(ChannelSink::new(tx)),
            move |outcome| done_tx.send(outcome).unwrap()
        ).unwrap();

        assert_eq!(
            done_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            RunOutcome::Disconnected
        );
        assert_eq!(ctrl.target.get(), stopped());
    }

    #[test]
    fn test_worker_panic_stops_vehicle() {
        let seq = Sequencer::new();
        let ctrl = control();
        let (done_tx, done_rx) = channel();

        seq.start_run(
            program(60.0),
            ctrl.clone(),
            Box::new(PanickingSink),
            move |outcome| done_tx.send(outcome).unwrap()
        ).unwrap();

        assert_eq!(
            done_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            RunOutcome::Cancelled
        );
        assert_eq!(seq.state(), SequencerState::Cancelled);
        assert_eq!(ctrl.target.get(), stopped());

        // Nothing is left running to cancel
        assert!(!seq.cancel());
        assert_eq!(ctrl.target.get(), stopped());
    }
}
