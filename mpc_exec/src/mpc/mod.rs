//! # Receding horizon optimiser
//!
//! Chooses the actuations over a fixed horizon which keep the vehicle on the reference curve at
//! the reference speed, subject to the kinematic model, the actuator limits and an optional
//! corridor around the curve. Only the first actuation is applied, the problem is solved again
//! on the next cycle.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod cost;
mod layout;
mod lm;
mod params;
mod solver;
mod trajectory;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use params::*;
pub use solver::*;
pub use trajectory::*;

// ------------------------------------------------------------------------------------------------
// ENUMERATIONS
// ------------------------------------------------------------------------------------------------

/// Ways in which a solve can fail. All of them are recoverable, the controller falls back to a
/// safe command for the cycle.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum SolveFailure {
    #[error("Solve exceeded its time budget after {iterations} iterations ({elapsed_s:.4} s)")]
    Timeout { iterations: usize, elapsed_s: f64 },

    #[error("Solve did not converge within {iterations} iterations")]
    NotConverged { iterations: usize },

    #[error("No trajectory satisfies the corridor constraints (violation {violation:.4})")]
    Infeasible { violation: f64 },

    #[error("Solution violates the vehicle dynamics (defect {defect:.3e})")]
    DynamicsViolated { defect: f64 },

    #[error("The objective became non-finite")]
    Numerical,
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
