//! # MPC library.
//!
//! The controller pipeline which turns vehicle telemetry into an actuation command: waypoints
//! are moved into the vehicle frame, a reference curve is fitted through them, the measured state
//! is projected forward over the actuation latency and a receding horizon optimisation chooses
//! the next steering and acceleration demands.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Controller loop - runs the whole pipeline for one telemetry event
pub mod ctrl;

/// Frame transform - moves world frame waypoints into the vehicle frame
pub mod frame;

/// Latency compensation - predicts the state at the time the command takes effect
pub mod latency;

/// Receding horizon optimiser
pub mod mpc;

/// Reference curve - polynomial fitted through the waypoints
pub mod ref_curve;

/// Kinematic bicycle model
pub mod vehicle_model;
