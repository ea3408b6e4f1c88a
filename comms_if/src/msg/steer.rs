//! # Steer command message

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Actuation command sent back to the simulator in reply to a telemetry event.
///
/// The `next_*` and `mpc_*` lists are for display only and are given in the vehicle frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SteerCommand {
    /// Steering demand in the simulator's convention
    pub steering_angle: f64,

    /// Throttle demand
    pub throttle: f64,

    /// X positions of the reference curve samples
    pub next_x: Vec<f64>,

    /// Y positions of the reference curve samples
    pub next_y: Vec<f64>,

    /// X positions of the predicted trajectory
    pub mpc_x: Vec<f64>,

    /// Y positions of the predicted trajectory
    pub mpc_y: Vec<f64>,
}
