//! Track coupling limits

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::plat::{MotorCommand, Track};

use super::{Params, TrackPair};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Cap the speeds of both tracks so they don't block.
///
/// If the tracks run in the same direction, or one is stopped, neither may run more than
/// `unary_limit_rpm` faster than the other. Tracks running in opposite directions are both
/// capped at `contrary_limit_rpm`. Both caps are computed from the uncapped pair.
///
/// Returns which tracks were limited.
pub(crate) fn enforce_coupling(
    cmds: &mut TrackPair<MotorCommand>,
    params: &Params
) -> TrackPair<bool> {
    let left_rpm = cmds.left.rpm;
    let right_rpm = cmds.right.rpm;

    let max = if cmds.left.dir == cmds.right.dir || left_rpm == 0.0 || right_rpm == 0.0 {
        TrackPair::new(
            right_rpm + params.unary_limit_rpm,
            left_rpm + params.unary_limit_rpm
        )
    }
    else {
        TrackPair::new(params.contrary_limit_rpm, params.contrary_limit_rpm)
    };

    let mut limited = TrackPair::new(false, false);

    for &track in [Track::Left, Track::Right].iter() {
        let cmd = cmds.get_mut(track);
        let max_rpm = *max.get(track);
        if cmd.rpm > max_rpm {
            cmd.rpm = max_rpm;
            *limited.get_mut(track) = true;
        }
    }

    limited
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::plat::Direction;

    fn pair(l: f64, ld: Direction, r: f64, rd: Direction) -> TrackPair<MotorCommand> {
        TrackPair::new(
            MotorCommand::new(l, ld, Track::Left),
            MotorCommand::new(r, rd, Track::Right)
        )
    }

    #[test]
    fn test_unary() {
        let p = Params::default();
        let mut cmds = pair(200.0, Direction::Forward, 50.0, Direction::Forward);
        let limited = enforce_coupling(&mut cmds, &p);
        assert_eq!(cmds.left.rpm, 175.0);
        assert_eq!(cmds.right.rpm, 50.0);
        assert_eq!(limited, TrackPair::new(true, false));
    }

    #[test]
    fn test_one_stopped() {
        let p = Params::default();
        let mut cmds = pair(0.0, Direction::Backward, 150.0, Direction::Forward);
        let limited = enforce_coupling(&mut cmds, &p);
        assert_eq!(cmds.right.rpm, 125.0);
        assert_eq!(limited, TrackPair::new(false, true));
    }

    #[test]
    fn test_contrary() {
        let p = Params::default();
        let mut cmds = pair(60.0, Direction::Forward, 40.0, Direction::Backward);
        let limited = enforce_coupling(&mut cmds, &p);
        assert_eq!(cmds.left.rpm, 50.0);
        assert_eq!(cmds.right.rpm, 40.0);
        assert_eq!(limited, TrackPair::new(true, false));
    }

    #[test]
    fn test_within_limits() {
        let p = Params::default();
        let mut cmds = pair(100.0, Direction::Forward, 100.0, Direction::Forward);
        assert_eq!(enforce_coupling(&mut cmds, &p), TrackPair::new(false, false));
        assert_eq!(cmds, pair(100.0, Direction::Forward, 100.0, Direction::Forward));
    }
}
