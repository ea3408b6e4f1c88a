//! # Telemetry message

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Vehicle telemetry sent by the simulator once per cycle.
///
/// All positions are in the world frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Telemetry {
    /// World X position of the vehicle
    pub x: f64,

    /// World Y position of the vehicle
    pub y: f64,

    /// Heading of the vehicle in radians, counter-clockwise from world +X
    pub psi: f64,

    /// Forward speed of the vehicle
    pub speed: f64,

    /// World X positions of the reference waypoints
    pub ptsx: Vec<f64>,

    /// World Y positions of the reference waypoints
    pub ptsy: Vec<f64>,

    /// Steering angle currently applied, in the simulator's convention
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steering_angle: Option<f64>,

    /// Throttle currently applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle: Option<f64>,
}
