//! # Drive loop
//!
//! Runs the drive controller at a fixed rate on its own thread. Each cycle reads the targets,
//! processes the controller, dispatches the output to the motor driver and publishes the
//! applied commands.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc::{channel, RecvTimeoutError, Sender},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{info, trace, warn};
use util::{archive::Archived, module::State, time::seconds_to_std};

use crate::{
    control_state::ControlState,
    drive_ctrl::{DriveCtrl, InputData, StatusReport},
    motor_driver,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Handle to the running drive loop, stops the loop when dropped.
pub struct DriveLoop {
    stop_tx: Option<Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
    stats: Arc<LoopStats>,
}

#[derive(Debug, Default)]
struct LoopStats {
    num_cycles: AtomicU64,
    num_overruns: AtomicU64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DriveLoop {
    /// Start the loop with an initialised controller.
    pub fn start(
        mut ctrl: DriveCtrl,
        control: Arc<ControlState>
    ) -> Result<Self, std::io::Error> {
        let (stop_tx, stop_rx) = channel::<()>();
        let stats = Arc::new(LoopStats::default());
        let thread_stats = stats.clone();
        let period = seconds_to_std(ctrl.params().cycle_period_s);

        let join_handle = thread::Builder::new()
            .name("drive_loop".into())
            .spawn(move || {
                info!("Drive loop running every {:?}", period);

                let mut next_deadline = Instant::now() + period;

                loop {
                    tick(&mut ctrl, &control);
                    thread_stats.num_cycles.fetch_add(1, Ordering::Relaxed);

                    let now = Instant::now();
                    let wait = match next_deadline.checked_duration_since(now) {
                        Some(d) => d,
                        None => {
                            let overrun = now - next_deadline;
                            thread_stats.num_overruns.fetch_add(1, Ordering::Relaxed);
                            warn!("Drive cycle overran by {:.06} s", overrun.as_secs_f64());

                            // Skip the missed deadlines rather than running cycles back to back
                            if overrun >= period {
                                next_deadline = now;
                            }
                            Duration::from_secs(0)
                        }
                    };

                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => (),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    next_deadline += period;
                }

                info!("Drive loop stopped");
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            join_handle: Some(join_handle),
            stats,
        })
    }

    /// Number of cycles run so far.
    pub fn num_cycles(&self) -> u64 {
        self.stats.num_cycles.load(Ordering::Relaxed)
    }

    /// Number of cycles which ended after their deadline.
    pub fn num_overruns(&self) -> u64 {
        self.stats.num_overruns.load(Ordering::Relaxed)
    }

    /// Stop the loop and wait for the current cycle to end.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            tx.send(()).ok();
        }

        if let Some(jh) = self.join_handle.take() {
            if jh.join().is_err() {
                warn!("The drive loop thread panicked");
            }
        }
    }
}

impl Drop for DriveLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Run a single drive cycle.
///
/// Errors never leave the cycle: a rejected target leaves the controller unchanged and nothing
/// is dispatched, a driver error is logged and the applied commands are still published.
pub fn tick(ctrl: &mut DriveCtrl, control: &ControlState) -> Option<StatusReport> {
    let input = InputData {
        target: control.target.get(),
    };

    let (output, report) = match ctrl.proc(&input) {
        Ok(o) => o,
        Err(e) => {
            warn!("DriveCtrl rejected the target: {}", e);
            return None
        }
    };

    if let Err(e) = motor_driver::dispatch(&mut **control.driver(), &output) {
        warn!("Motor driver error: {}", e);
    }

    control.set_current(ctrl.current());

    if let Err(e) = ctrl.write() {
        trace!("Could not archive DriveCtrl: {}", e);
    }

    Some(report)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        drive_ctrl::{self, TrackPair},
        motor_driver::SimDriver,
    };
    use comms_if::plat::{Direction, MotorCommand, Track};

    fn ctrl() -> DriveCtrl {
        let mut c = DriveCtrl::default();
        c.init(drive_ctrl::Params::default(), None).unwrap();
        c
    }

    #[test]
    fn test_tick() {
        let mut c = ctrl();
        let control = ControlState::new(Box::new(SimDriver::new()));

        control.target.set(MotorCommand::new(50.0, Direction::Forward, Track::Left));
        assert!(tick(&mut c, &control).is_some());

        let current = control.current();
        assert_eq!(current.left.rpm, 8.0);
        assert_eq!(current.right, MotorCommand::stop(Track::Right));
    }

    #[test]
    fn test_rejected_target() {
        let mut c = ctrl();
        let control = ControlState::new(Box::new(SimDriver::new()));

        control.target.set_pair(TrackPair::new(
            MotorCommand::new(std::f64::INFINITY, Direction::Forward, Track::Left),
            MotorCommand::stop(Track::Right),
        ));
        assert!(tick(&mut c, &control).is_none());
        assert_eq!(control.current(), TrackPair::stopped());
    }

    #[test]
    fn test_loop_runs_and_stops() {
        let mut c = DriveCtrl::default();
        c.init(drive_ctrl::Params {
            cycle_period_s: 0.01,
            ..drive_ctrl::Params::default()
        }, None).unwrap();

        let control = Arc::new(ControlState::new(Box::new(SimDriver::new())));
        control.target.set(MotorCommand::new(200.0, Direction::Backward, Track::Right));

        let mut drive_loop = DriveLoop::start(c, control.clone()).unwrap();
        thread::sleep(Duration::from_millis(200));
        drive_loop.stop();

        assert!(drive_loop.num_cycles() > 2);
        assert!(control.current().right.rpm > 0.0);
        assert_eq!(control.current().right.dir, Direction::Backward);
    }
}
