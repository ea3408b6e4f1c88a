//! # MPC Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Deserialize, Debug, Clone)]
pub struct MpcExecParams {
    /// Endpoint the telemetry socket binds to
    pub telemetry_endpoint: String,

    /// Time to wait for a telemetry event before logging and waiting again
    ///
    /// Units: milliseconds
    pub recv_timeout_ms: i32,

    /// Expected time between telemetry events, cycles longer than this are reported
    ///
    /// Units: seconds
    pub control_period_s: f64,

    /// Write the controller's status report to the session archive
    pub archive: bool,
}
