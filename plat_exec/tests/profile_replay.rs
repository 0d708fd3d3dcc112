//! Replays compiled programs through the drive controller, checking the tracks travel the
//! distance they were asked to.

use comms_if::plat::{Direction, HighLevelInstruction, Track};
use plat_lib::{
    auto::{ProfileCompiler, ProfileParams, Program},
    drive_ctrl::{self, DriveCtrl, InputData, TrackPair},
};
use util::module::State;

fn compiler() -> ProfileCompiler {
    ProfileCompiler::new(ProfileParams::default(), &drive_ctrl::Params::default()).unwrap()
}

/// Run every step of the program for its duration, returning the distance covered by `track`.
///
/// Distances are signed, forwards is positive.
fn replay(compiler: &ProfileCompiler, program: &Program, track: Track) -> f64 {
    let mut ctrl = DriveCtrl::default();
    ctrl.init(drive_ctrl::Params::default(), None).unwrap();

    let model = compiler.model();
    let mut distance_m = 0.0;

    for step in program.steps() {
        let ticks = (step.duration_s / model.cycle_period_s()).round() as usize;
        let input = InputData {
            target: step.target.map(|_, c| Some(c)),
        };

        for _ in 0..ticks {
            ctrl.proc(&input).unwrap();

            let cmd = *ctrl.current().get(track);
            let tick_m = model.tick_distance_m(cmd.rpm);
            distance_m += match cmd.dir {
                Direction::Forward => tick_m,
                Direction::Backward => -tick_m,
            };
        }
    }

    // The program must leave the tracks stopped
    assert_eq!(ctrl.current(), TrackPair::stopped());

    distance_m
}

#[test]
fn test_straight_distance_replay() {
    let c = compiler();

    for &distance_m in [0.005, 0.02, 0.1, 0.35, 1.0, 2.37, 10.0].iter() {
        let program = c
            .compile(&[HighLevelInstruction::straight_distance(distance_m, Direction::Forward)])
            .unwrap();

        let cruise_rpm = c.model().plan(distance_m, c.params().straight_rpm).cruise_rpm;
        let tolerance_m = c.model().tick_distance_m(cruise_rpm) + 1e-9;

        for &track in [Track::Left, Track::Right].iter() {
            let travelled_m = replay(&c, &program, track);
            assert!(
                (travelled_m - distance_m).abs() <= tolerance_m,
                "{:?} track travelled {} m of {} m",
                track, travelled_m, distance_m
            );
        }
    }
}

#[test]
fn test_turn_replay() {
    let c = compiler();

    for &degrees in [15.0, 90.0, 180.0, 360.0].iter() {
        let distance_m = degrees * c.params().one_degree_distance_m();
        let cruise_rpm = c.model().plan(distance_m, c.params().turn_rpm).cruise_rpm;
        let tick_m = c.model().tick_distance_m(cruise_rpm);

        // The track driving backwards first spends a tick changing direction
        let forward_tolerance_m = tick_m + 1e-9;
        let backward_tolerance_m = 2.0 * tick_m + 1e-9;

        let right_turn = c.compile(&[HighLevelInstruction::turn(degrees)]).unwrap();
        let left_turn = c.compile(&[HighLevelInstruction::turn(-degrees)]).unwrap();

        for (program, forward, backward) in [
            (&right_turn, Track::Left, Track::Right),
            (&left_turn, Track::Right, Track::Left),
        ].iter() {
            let forward_m = replay(&c, program, *forward);
            assert!(
                (forward_m - distance_m).abs() <= forward_tolerance_m,
                "{} deg: {:?} track travelled {} m of {} m",
                degrees, forward, forward_m, distance_m
            );

            let backward_m = -replay(&c, program, *backward);
            assert!(
                (backward_m - distance_m).abs() <= backward_tolerance_m,
                "{} deg: {:?} track travelled {} m of {} m",
                degrees, backward, backward_m, distance_m
            );
            assert!(backward_m <= forward_m + 1e-9);
        }
    }
}

#[test]
fn test_sequence_replay() {
    let c = compiler();

    let program = c.compile(&[
        HighLevelInstruction::straight_distance(0.5, Direction::Forward),
        HighLevelInstruction::straight_time(1.0, Direction::Forward),
        HighLevelInstruction::straight_distance(0.25, Direction::Forward),
    ]).unwrap();

    assert_eq!(program.len(), 9);

    // One second at cruise less the time to ramp up, plus the ramp down after it
    let travelled_m = replay(&c, &program, Track::Left);
    assert!(travelled_m > 0.75);
    assert!(travelled_m < 0.75 + c.model().speed_m_s(c.params().straight_rpm) * 1.0 + 0.05);
}
