//! # MPC Control Executable
//!
//! This executable serves the receding horizon controller to the vehicle simulator bridge:
//! - Receives telemetry events on a REP socket
//! - Runs one controller cycle per telemetry event
//! - Replies with a steering command, or the manual event when there is nothing to command

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Control server abstraction.
mod ctrl_server;

/// Parameters for the MPC executable.
mod params;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Result};
use comms_if::msg::Event;
use log::{debug, info, trace, warn};
use std::time::Instant;

// Internal
use ctrl_server::CtrlServer;
use mpc_lib::ctrl::Controller;
use params::MpcExecParams;
use util::{
    archive::Archived,
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

    let session = Session::new("mpc_exec", "sessions").wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("MPC Control Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    info!("Initialising...");

    // ---- LOAD PARAMETERS ----

    let params: MpcExecParams =
        util::params::load("mpc_exec.toml").wrap_err("Failed to load the executable parameters")?;

    info!("Parameters loaded");

    // ---- MODULE INITIALISATION ----

    let mut ctrl = Controller::init("mpc_ctrl.toml", &session)
        .wrap_err("Failed to initialise the controller")?;

    info!(
        "Controller initialised (N = {}, dt = {} s, latency = {} s)",
        ctrl.params().mpc.horizon.n_steps,
        ctrl.params().mpc.horizon.dt_s,
        ctrl.params().latency_s
    );

    // ---- SERVER INITIALISATION ----

    let mut server = CtrlServer::new(&params).wrap_err("Failed to initialise server")?;

    info!("Server listening on {}", params.telemetry_endpoint);

    // ---- MAIN LOOP ----

    info!("Initialisation complete, entering main loop");

    let mut manual_mode = false;

    loop {
        let event = match server.get_event() {
            Some(e) => e,
            None => {
                trace!("No telemetry received (client connected: {})", server.connected());
                continue;
            }
        };

        let cycle_start = Instant::now();

        let reply = match event {
            Ok(Event::Telemetry(telem)) => {
                if manual_mode {
                    info!("Telemetry received, leaving manual mode");
                    manual_mode = false;
                }

                match ctrl.proc(&telem) {
                    Ok((cmd, report)) => {
                        trace!("Cycle {} report: {:?}", report.cycle, report);

                        if params.archive {
                            if let Err(e) = ctrl.write() {
                                warn!("Could not archive the controller status: {}", e);
                            }
                        }

                        server.send_steer(&cmd)
                    }
                    Err(e) => {
                        warn!("Rejected telemetry: {}", e);
                        server.send_manual()
                    }
                }
            }
            Ok(Event::Manual) => {
                if !manual_mode {
                    info!("No data in telemetry, vehicle is in manual mode");
                    manual_mode = true;
                }
                server.send_manual()
            }
            Ok(Event::Other(name)) => {
                debug!("Ignoring \"{}\" event", name);
                server.send_manual()
            }
            Err(e) => {
                warn!("Could not decode event: {}", e);
                server.send_manual()
            }
        };

        if let Err(e) = reply {
            warn!("Could not send reply to client: {}", e);
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_s = cycle_start.elapsed().as_secs_f64();
        if cycle_s > params.control_period_s {
            warn!(
                "Cycle overran the control period by {:.06} s",
                cycle_s - params.control_period_s
            );
        } else {
            trace!("Cycle took {:.06} s", cycle_s);
        }
    }
}
