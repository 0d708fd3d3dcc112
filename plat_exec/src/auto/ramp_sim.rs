//! # Ramp simulation
//!
//! Predicts what the drive controller does when given a new target, tick by tick, so the
//! compiler can time a manouvre without running the controller. The model must match
//! [`crate::drive_ctrl`]: speed rises by the acceleration step each tick until the ceiling is
//! reached and falls by the deceleration step when braking, and a track covers the distance of
//! its new speed during each tick.
//!
//! Plans assume the track already points the right way. A stopped track whose last direction
//! differs spends its first tick changing direction at zero speed, so it starts one tick late and
//! loses the distance of one cruise tick against the plan. This affects the backward track of a
//! turn, or any manouvre reversing the previous one.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use crate::drive_ctrl;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Tick model of one track under the drive controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampModel {
    cycle_period_s: f64,
    accel_rpm_per_cycle: f64,
    decel_rpm_per_cycle: f64,
    circumference_m: f64,
}

/// Braking from a speed to standstill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Braking {
    /// Number of ticks until the speed reaches zero, including the tick that reaches it.
    pub ticks: u32,

    /// Time to hold the brake target before the speed is zero. The last tick reaches zero and
    /// covers no distance so it is not counted.
    ///
    /// Units: seconds
    pub time_s: f64,

    /// Distance travelled while braking.
    ///
    /// Units: meters
    pub distance_m: f64,
}

/// How a track covers a distance: accelerate, cruise, brake.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampPlan {
    /// Speed held once accelerated.
    ///
    /// Units: rpm
    pub cruise_rpm: f64,

    /// Number of accelerating ticks.
    pub accel_ticks: u32,

    /// Distance covered while accelerating.
    ///
    /// Units: meters
    pub accel_distance_m: f64,

    /// Braking from the cruise speed.
    pub braking: Braking,

    /// Distance left to cover at the cruise speed.
    ///
    /// Units: meters
    pub remaining_m: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RampModel {
    pub fn new(ctrl_params: &drive_ctrl::Params, circumference_m: f64) -> Self {
        Self {
            cycle_period_s: ctrl_params.cycle_period_s,
            accel_rpm_per_cycle: ctrl_params.accel_rpm_per_cycle,
            decel_rpm_per_cycle: ctrl_params.decel_rpm_per_cycle,
            circumference_m,
        }
    }

    pub fn cycle_period_s(&self) -> f64 {
        self.cycle_period_s
    }

    /// Ground speed of a track driven at `rpm`.
    ///
    /// Units: meters/second
    pub fn speed_m_s(&self, rpm: f64) -> f64 {
        rpm / 60.0 * self.circumference_m
    }

    /// Distance covered in one tick at `rpm`.
    pub fn tick_distance_m(&self, rpm: f64) -> f64 {
        self.speed_m_s(rpm) * self.cycle_period_s
    }

    /// Simulate braking from `rpm` to standstill.
    pub fn braking(&self, rpm: f64) -> Braking {
        let mut speed = rpm;
        let mut ticks = 0u32;
        let mut distance_m = 0.0;

        while speed > 0.0 {
            speed = (speed - self.decel_rpm_per_cycle).max(0.0);
            ticks += 1;
            distance_m += self.tick_distance_m(speed);
        }

        Braking {
            ticks,
            time_s: ticks.saturating_sub(1) as f64 * self.cycle_period_s,
            distance_m,
        }
    }

    /// Plan covering `distance_m` from standstill without exceeding `ceiling_rpm`.
    ///
    /// The track accelerates as long as it can still brake within the distance. Each increment
    /// is only accepted if the distance of the accelerating ticks so far, the increment's own
    /// tick and the braking distance from the new speed all fit. If not even the first
    /// increment fits the plan cruises at the first increment's speed for the whole distance.
    pub fn plan(&self, distance_m: f64, ceiling_rpm: f64) -> RampPlan {
        let mut rpm = 0.0;
        let mut accel_ticks = 0u32;
        let mut accel_distance_m = 0.0;
        let mut braking = self.braking(0.0);

        while rpm < ceiling_rpm {
            let next = (rpm + self.accel_rpm_per_cycle).min(ceiling_rpm);
            let step_m = self.tick_distance_m(next);
            let next_braking = self.braking(next);

            if accel_distance_m + step_m + next_braking.distance_m > distance_m {
                break
            }

            rpm = next;
            accel_ticks += 1;
            accel_distance_m += step_m;
            braking = next_braking;
        }

        if accel_ticks == 0 {
            let cruise_rpm = self.accel_rpm_per_cycle.min(ceiling_rpm);
            return RampPlan {
                cruise_rpm,
                accel_ticks: 0,
                accel_distance_m: 0.0,
                braking: self.braking(cruise_rpm),
                remaining_m: distance_m,
            }
        }

        RampPlan {
            cruise_rpm: rpm,
            accel_ticks,
            accel_distance_m,
            braking,
            remaining_m: (distance_m - accel_distance_m - braking.distance_m).max(0.0),
        }
    }
}

impl RampPlan {
    /// Time to hold the cruise target, accelerating included.
    ///
    /// Units: seconds
    pub fn cruise_time_s(&self, model: &RampModel) -> f64 {
        self.accel_ticks as f64 * model.cycle_period_s
            + self.remaining_m / model.speed_m_s(self.cruise_rpm)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn model() -> RampModel {
        RampModel::new(&drive_ctrl::Params::default(), 0.094)
    }

    #[test]
    fn test_braking() {
        let m = model();

        // 100 -> 75 -> 50 -> 25 -> 0
        let b = m.braking(100.0);
        assert_eq!(b.ticks, 4);
        assert!((b.time_s - 0.3).abs() < 1e-12);
        let expected = m.tick_distance_m(75.0) + m.tick_distance_m(50.0) + m.tick_distance_m(25.0);
        assert!((b.distance_m - expected).abs() < 1e-12);

        // Low speeds stop in a single tick
        let b = m.braking(8.0);
        assert_eq!(b.ticks, 1);
        assert_eq!(b.time_s, 0.0);
        assert_eq!(b.distance_m, 0.0);

        assert_eq!(m.braking(0.0).ticks, 0);
    }

    #[test]
    fn test_long_distance_reaches_ceiling() {
        let m = model();
        let plan = m.plan(2.0, 100.0);

        assert_eq!(plan.cruise_rpm, 100.0);
        assert_eq!(plan.accel_ticks, 13);
        assert!(plan.remaining_m > 0.0);
        let total = plan.accel_distance_m + plan.braking.distance_m + plan.remaining_m;
        assert!((total - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_distance_stops_below_ceiling() {
        let m = model();
        let plan = m.plan(0.02, 100.0);

        assert!(plan.cruise_rpm < 100.0);
        assert!(plan.accel_ticks > 0);
        assert!(plan.accel_distance_m + plan.braking.distance_m <= 0.02);
        assert!(plan.remaining_m >= 0.0);
    }

    #[test]
    fn test_tiny_distance_cruises_slowly() {
        let m = model();
        // One tick at 8 rpm covers more than this
        let plan = m.plan(0.0005, 100.0);

        assert_eq!(plan.accel_ticks, 0);
        assert_eq!(plan.cruise_rpm, 8.0);
        assert_eq!(plan.remaining_m, 0.0005);
        assert!((plan.cruise_time_s(&m) - 0.0005 / m.speed_m_s(8.0)).abs() < 1e-12);
    }

    #[test]
    fn test_ceiling_below_first_increment() {
        let m = model();
        let plan = m.plan(1.0, 5.0);

        assert_eq!(plan.cruise_rpm, 5.0);
        assert_eq!(plan.accel_ticks, 1);
    }
}
