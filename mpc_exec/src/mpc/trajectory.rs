//! Predicted trajectory produced by one solve

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Serialize;

use crate::vehicle_model::{Actuation, VehicleState};

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// One step of a trajectory: the state and the actuation applied from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrajectoryStep {
    pub state: VehicleState,
    pub actuation: Actuation,
}

/// The states and actuations over the horizon.
///
/// The last step's actuation does not affect any state, it repeats the previous step's value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    steps: Vec<TrajectoryStep>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Trajectory {
    pub(crate) fn new(steps: Vec<TrajectoryStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[TrajectoryStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The actuation to apply now.
    pub fn first_actuation(&self) -> Option<Actuation> {
        self.steps.first().map(|s| s.actuation)
    }

    /// Predicted positions, as separate x and y lists.
    pub fn positions(&self) -> (Vec<f64>, Vec<f64>) {
        self.steps.iter().map(|s| (s.state.x, s.state.y)).unzip()
    }

    /// All actuations over the horizon.
    pub fn actuations(&self) -> Vec<Actuation> {
        self.steps.iter().map(|s| s.actuation).collect()
    }
}
