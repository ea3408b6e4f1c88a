//! # Latency compensation
//!
//! Commands take effect some time after the telemetry they respond to was measured. The measured
//! state is projected forward over that delay with the actuation already being applied, so that
//! the optimiser plans from where the vehicle will be.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use crate::vehicle_model::{Actuation, KinematicModel, TrackingReference, VehicleState};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct LatencyCompensator {
    pub model: KinematicModel,

    /// Units: seconds
    pub latency_s: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LatencyCompensator {
    pub fn new(model: KinematicModel, latency_s: f64) -> Self {
        Self { model, latency_s }
    }

    /// Predict the state after the latency has elapsed.
    ///
    /// A zero (or negative) latency returns `state` untouched.
    pub fn compensate<R>(
        &self,
        state: &VehicleState,
        previous: &Actuation,
        reference: &R,
    ) -> VehicleState
    where
        R: TrackingReference + ?Sized,
    {
        if self.latency_s <= 0.0 {
            return *state;
        }

        self.model.step(state, previous, self.latency_s, reference)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::vehicle_model::FrozenErrors;

    #[test]
    fn test_zero_latency_is_identity() {
        let comp = LatencyCompensator::new(KinematicModel::default(), 0.0);
        let state = VehicleState::new(0.3, -0.2, 0.1, 12.0).with_errors(0.4, -0.05);

        let out = comp.compensate(&state, &Actuation::new(0.3, 1.0), &FrozenErrors);

        assert_eq!(out, state);
    }

    #[test]
    fn test_projection_uses_previous_actuation() {
        let model = KinematicModel::default();
        let comp = LatencyCompensator::new(model, 0.1);
        let state = VehicleState::new(0.0, 0.0, 0.0, 10.0);
        let prev = Actuation::new(0.1, 0.5);

        let out = comp.compensate(&state, &prev, &FrozenErrors);

        assert_eq!(out, model.step(&state, &prev, 0.1, &FrozenErrors));
        assert!((out.x - 1.0).abs() < 1e-12);
        assert!(out.psi > 0.0);
        assert!((out.v - 10.05).abs() < 1e-12);
    }
}
