//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Telemetry and command message definitions, and the event envelope they travel in
pub mod msg;

/// Network module
pub mod net;
