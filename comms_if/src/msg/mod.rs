//! # Message definitions
//!
//! The simulator bridge speaks in socket.io style event frames: a `42` prefix followed by a JSON
//! array holding the event name and its payload, for example `42["telemetry",{...}]`.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod event;
mod steer;
mod telemetry;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use event::*;
pub use steer::SteerCommand;
pub use telemetry::Telemetry;
