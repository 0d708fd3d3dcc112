//! Platform control against the simulated driver, with the drive loop running.

use std::{
    sync::{mpsc::channel, Arc, Barrier},
    thread,
    time::{Duration, Instant},
};

use comms_if::plat::{
    Direction, HighLevelInstruction, MotorCommand, PlatProgress, PlatformMode, Track,
};
use plat_lib::{
    auto::{ChannelSink, ProfileCompiler, ProfileParams, SequencerState},
    control_state::ControlState,
    drive_ctrl::{self, DriveCtrl, TrackPair},
    drive_loop::DriveLoop,
    motor_driver::SimDriver,
    plat_ctrl::{PlatCtrl, SessionError},
};
use util::module::State;

/// Drive controller running ten times faster than on the vehicle.
fn fast_params() -> drive_ctrl::Params {
    drive_ctrl::Params {
        cycle_period_s: 0.01,
        ..drive_ctrl::Params::default()
    }
}

fn platform() -> (PlatCtrl, DriveLoop) {
    let control = Arc::new(ControlState::new(Box::new(SimDriver::new())));

    let compiler = ProfileCompiler::new(
        ProfileParams {
            spacer_duration_s: 0.05,
            ..ProfileParams::default()
        },
        &fast_params()
    ).unwrap();

    let mut ctrl = DriveCtrl::default();
    ctrl.init(fast_params(), None).unwrap();
    let drive_loop = DriveLoop::start(ctrl, control.clone()).unwrap();

    (PlatCtrl::new(control, compiler), drive_loop)
}

/// Wait until the drive loop has brought both tracks to a stop.
fn wait_stopped(plat: &PlatCtrl) -> bool {
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(5) {
        if plat.control().current() == TrackPair::stopped() {
            return true
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn test_concurrent_manual_sessions() {
    let (plat, _drive_loop) = platform();
    plat.set_mode(PlatformMode::ManualControl).unwrap();

    let num_threads = 8;
    let barrier = Arc::new(Barrier::new(num_threads));
    let (tx, rx) = channel();

    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let plat = plat.clone();
            let barrier = barrier.clone();
            let tx = tx.clone();
            thread::spawn(move || {
                barrier.wait();
                let result = plat.begin_manual_session();
                tx.send(result.is_ok()).unwrap();

                // Hold any session until every thread has tried
                barrier.wait();
                drop(result);
            })
        })
        .collect();

    drop(tx);
    for h in handles {
        h.join().unwrap();
    }

    let successes = rx.iter().filter(|ok| *ok).count();
    assert_eq!(successes, 1);
    assert!(!plat.session_active());
}

#[test]
fn test_manual_drive_and_mode_change() {
    let (plat, _drive_loop) = platform();
    plat.set_mode(PlatformMode::ManualControl).unwrap();

    let session = plat.begin_manual_session().unwrap();
    session.set_target(MotorCommand::new(80.0, Direction::Forward, Track::Left)).unwrap();
    session.set_target(MotorCommand::new(80.0, Direction::Forward, Track::Right)).unwrap();

    let start = Instant::now();
    while plat.control().current().left.rpm < 80.0 {
        assert!(start.elapsed() < Duration::from_secs(5), "Tracks never reached their target");
        thread::sleep(Duration::from_millis(5));
    }

    plat.set_mode(PlatformMode::Bluetooth).unwrap();

    assert!(matches!(
        session.set_target(MotorCommand::new(10.0, Direction::Forward, Track::Left)),
        Err(SessionError::Revoked)
    ));
    assert!(wait_stopped(&plat));
    assert_eq!(plat.get_status().mode, PlatformMode::Bluetooth);
}

#[test]
fn test_program_runs_to_completion() {
    let (plat, _drive_loop) = platform();
    plat.set_mode(PlatformMode::AutomaticControl).unwrap();

    let num_steps = plat.upload_program(&[
        HighLevelInstruction::straight_time(0.3, Direction::Forward),
        HighLevelInstruction::turn(-45.0),
    ]).unwrap();
    assert_eq!(num_steps, 6);

    let (tx, rx) = channel();
    plat.begin_automatic_session(Box::new(ChannelSink::new(tx))).unwrap();

    let mut msgs = Vec::new();
    let mut max_rpm: f64 = 0.0;
    let start = Instant::now();

    loop {
        assert!(start.elapsed() < Duration::from_secs(10), "Program never finished");

        max_rpm = max_rpm.max(plat.control().current().left.rpm);

        match rx.recv_timeout(Duration::from_millis(5)) {
            Ok(PlatProgress::Finished) => break,
            Ok(msg) => msgs.push(msg),
            Err(_) => (),
        }
    }

    let expected: Vec<_> = (0..=num_steps)
        .map(|i| PlatProgress::Progress(i as f64 / num_steps as f64))
        .collect();
    assert_eq!(msgs, expected);

    assert!(max_rpm > 0.0);
    assert!(wait_stopped(&plat));
    assert_eq!(plat.sequencer().state(), SequencerState::Completed);

    // The session closes itself once the program has run
    let start = Instant::now();
    while plat.session_active() {
        assert!(start.elapsed() < Duration::from_secs(1));
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_stop_cancels_program() {
    let (plat, _drive_loop) = platform();
    plat.set_mode(PlatformMode::AutomaticControl).unwrap();

    // A short first step, so the run crosses a step boundary soon after the stop
    plat.upload_program(&[
        HighLevelInstruction::straight_time(0.4, Direction::Forward),
        HighLevelInstruction::straight_time(30.0, Direction::Forward),
    ]).unwrap();

    let (tx, rx) = channel();
    plat.begin_automatic_session(Box::new(ChannelSink::new(tx))).unwrap();
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(1)).unwrap(),
        PlatProgress::Progress(0.0)
    );
    thread::sleep(Duration::from_millis(50));

    plat.request_stop();

    assert_eq!(plat.sequencer().state(), SequencerState::Cancelled);
    assert!(!plat.session_active());

    // Well past the end of the first manouvre the targets must still be stop
    thread::sleep(Duration::from_millis(1200));
    assert_eq!(
        plat.control().target.get(),
        TrackPair::stopped().map(|_, c| Some(c))
    );
    assert!(wait_stopped(&plat));
    assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![]);
}

#[test]
fn test_stop_while_idle() {
    let (plat, _drive_loop) = platform();

    plat.request_stop();
    assert!(wait_stopped(&plat));
    assert_eq!(
        plat.control().target.get(),
        TrackPair::stopped().map(|_, c| Some(c))
    );

    let status = plat.get_status();
    assert_eq!(status.mode, PlatformMode::None);
    assert!(!status.fault_left && !status.fault_right);
}
