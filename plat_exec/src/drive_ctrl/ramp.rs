//! Acceleration and braking ramp

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::plat::MotorCommand;

use super::Params;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Move `current` one cycle towards `target`.
///
/// The speed changes by at most `accel_rpm_per_cycle` up or `decel_rpm_per_cycle` down. If the
/// target is in the other direction the track brakes first, and the direction only flips on
/// the cycle the speed reaches zero.
pub(crate) fn ramp_towards(
    current: &MotorCommand,
    target: &MotorCommand,
    params: &Params
) -> MotorCommand {
    let mut next = *current;

    if target.dir == current.dir {
        if target.rpm > current.rpm {
            next.rpm = (current.rpm + params.accel_rpm_per_cycle).min(target.rpm);
        }
        else if target.rpm < current.rpm {
            next.rpm = (current.rpm - params.decel_rpm_per_cycle).max(target.rpm);
        }
    }
    else if current.rpm - params.decel_rpm_per_cycle > 0.0 {
        next.rpm = current.rpm - params.decel_rpm_per_cycle;
    }
    else {
        next.rpm = 0.0;
        next.dir = target.dir;
    }

    next
}
