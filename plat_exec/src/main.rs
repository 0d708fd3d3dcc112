//! # Platform Control Executable
//!
//! This executable drives the two tracks of the platform. Initialisation consists of:
//!
//!     - Session, logging and parameters
//!     - Motor driver and shared control state
//!     - Drive loop, running the drive controller on its own thread
//!     - Control server, through which clients set the mode, drive manually or run programs
//!
//! The main thread then serves client requests until the server fails, at which point the
//! vehicle is stopped and the motor driver shut down.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Result};
use log::{error, info, warn};
use std::sync::Arc;

// Internal
use plat_lib::{
    auto::{ProfileCompiler, ProfileParams},
    control_state::ControlState,
    ctrl_server::CtrlServer,
    drive_ctrl::{self, DriveCtrl},
    drive_loop::DriveLoop,
    motor_driver::{MotorDriver, SimDriver},
    params::PlatExecParams,
    plat_ctrl::PlatCtrl,
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {

    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    let session = Session::new(
        "plat_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Debug, &session)
        .wrap_err("Failed to initialise logging")?;

    info!("Platform Control Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    info!("Initialising...");

    // ---- LOAD PARAMETERS ----

    let exec_params: PlatExecParams = util::params::load("plat_exec.toml")
        .wrap_err("Could not load the executable parameters")?;
    let drive_params: drive_ctrl::Params = util::params::load("drive_ctrl.toml")
        .wrap_err("Could not load the drive controller parameters")?;
    let profile_params: ProfileParams = util::params::load("auto.toml")
        .wrap_err("Could not load the autonomous program parameters")?;

    info!("Parameters loaded");

    // ---- MODULE INITIALISATION ----

    let driver = init_driver(&exec_params)?;
    let control = Arc::new(ControlState::new(driver));

    let compiler = ProfileCompiler::new(profile_params, &drive_params)
        .wrap_err("Invalid autonomous program parameters")?;

    let mut drive_ctrl = DriveCtrl::default();
    drive_ctrl.init(drive_params, Some(&session))
        .wrap_err("Failed to initialise DriveCtrl")?;

    info!("DriveCtrl initialised");

    let mut drive_loop = DriveLoop::start(drive_ctrl, control.clone())
        .wrap_err("Failed to start the drive loop")?;

    let plat = PlatCtrl::new(control.clone(), compiler);

    let mut server = CtrlServer::new(&exec_params, plat.clone())
        .wrap_err("Failed to initialise server")?;

    info!("Server initialised");

    // ---- MAIN LOOP ----

    info!("Initialisation complete, serving requests in mode {:?}", plat.mode());

    let result = server.run();

    if let Err(ref e) = result {
        error!("Control server failed: {}", e);
    }

    // ---- SHUTDOWN ----

    info!("Stopping the vehicle");

    plat.end_automatic_session();
    control.target.stop();
    drive_loop.stop();

    info!(
        "Drive loop ran {} cycles, {} overran",
        drive_loop.num_cycles(),
        drive_loop.num_overruns()
    );

    if let Err(e) = control.driver().shutdown() {
        warn!("Could not shut down the motor driver: {}", e);
    }

    info!("End of execution");

    result.wrap_err("Control server failed")
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Create the motor driver for this target.
///
/// The hardware driver is only available on the Raspberry Pi, other targets always simulate.
fn init_driver(params: &PlatExecParams) -> Result<Box<dyn MotorDriver>> {
    if params.simulate_driver {
        info!("Motor driver simulation requested");
    }

    #[cfg(all(target_arch = "arm", target_os = "linux"))]
    {
        if !params.simulate_driver {
            let driver_params: plat_lib::motor_driver::Params =
                util::params::load("motor_driver.toml")
                    .wrap_err("Could not load the motor driver parameters")?;

            let driver = plat_lib::motor_driver::RpiDriver::new(&driver_params)
                .wrap_err("Failed to initialise the motor driver")?;

            info!("Motor driver initialised");

            return Ok(Box::new(driver))
        }
    }

    Ok(Box::new(SimDriver::new()))
}
