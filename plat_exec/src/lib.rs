//! # Platform library.
//!
//! This library allows the executable, the integration tests and the benchmarks to access items
//! defined inside the platform crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Autonomous programs - compiles high level instructions into timed steps and runs them
pub mod auto;

/// State shared between the drive loop and the control channels
pub mod control_state;

/// Control server - accepts requests from clients over zmq
pub mod ctrl_server;

/// Drive controller - ramps the tracks towards their targets
pub mod drive_ctrl;

/// Drive loop - runs the drive controller at a fixed rate
pub mod drive_loop;

/// Motor drivers - applies the drive controller output to the stepper drivers
pub mod motor_driver;

/// Parameters for the platform executable
pub mod params;

/// Platform control - mode and session gate in front of the drive loop
pub mod plat_ctrl;
