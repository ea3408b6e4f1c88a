//! # Controller loop
//!
//! Runs the whole pipeline for one telemetry event and produces the command to send back.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod params;
mod state;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use params::*;
pub use state::*;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use crate::{frame::FrameError, mpc::ParamsError, ref_curve::FitError};
use util::{archive::ArchiveError, params::LoadError};

// ------------------------------------------------------------------------------------------------
// ENUMERATIONS
// ------------------------------------------------------------------------------------------------

/// Malformed telemetry. The cycle is rejected and no command is produced.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CtrlError {
    #[error("The vehicle pose or speed is not finite")]
    NonFinitePose,

    #[error("At least 2 waypoints are needed to fit a reference curve, found {0}")]
    InsufficientWaypoints(usize),

    #[error("Could not transform the waypoints: {0}")]
    Frame(#[from] FrameError),

    #[error("Could not fit the reference curve: {0}")]
    Fit(#[from] FitError),
}

/// Errors raised while initialising the controller.
#[derive(Debug, thiserror::Error)]
pub enum CtrlInitError {
    #[error("Could not load the controller parameters: {0}")]
    Load(#[from] LoadError),

    #[error("Invalid controller parameters: {0}")]
    Params(#[from] ParamsError),

    #[error("Could not create the controller archive: {0}")]
    Archive(#[from] ArchiveError),
}
