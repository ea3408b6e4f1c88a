//! # Kinematic vehicle model
//!
//! Discrete time kinematic bicycle model. Both the latency compensation and the optimiser's
//! dynamics go through [`KinematicModel::step`], so there is a single definition of how the
//! vehicle moves.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Serialize;
use util::maths::wrap_pi;

use crate::ref_curve::{HeadingErrorMode, ReferenceCurve};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// State of the vehicle, including its tracking errors against the reference curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VehicleState {
    pub x: f64,
    pub y: f64,

    /// Heading
    ///
    /// Units: radians
    pub psi: f64,

    /// Forward speed
    pub v: f64,

    /// Cross track error, `y - f(x)`
    pub cte: f64,

    /// Heading error, vehicle heading minus the curve's tangent direction
    ///
    /// Units: radians
    pub epsi: f64,
}

/// A single steering and acceleration demand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Actuation {
    /// Front wheel steering angle, positive turns left.
    ///
    /// Units: radians
    pub steer_rad: f64,

    /// Longitudinal acceleration
    pub accel: f64,
}

/// Kinematic bicycle model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicModel {
    /// Distance from the front axle to the centre of gravity.
    ///
    /// Units: meters
    pub lf_m: f64,
}

/// Tracking errors which stay at the values held in the state.
///
/// Use when there is no curve to measure against, the model then propagates the errors purely
/// from the state's own `cte` and `epsi`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrozenErrors;

/// Tracking errors measured against a reference curve at the state's own station.
#[derive(Debug, Clone, Copy)]
pub struct TrackedCurve<'a> {
    pub curve: &'a ReferenceCurve,
    pub mode: HeadingErrorMode,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Source of the tracking errors the model propagates from.
pub trait TrackingReference {
    /// Return `(cte, epsi)` for the given state.
    fn errors_at(&self, state: &VehicleState) -> (f64, f64);
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VehicleState {
    /// Create a state with zero tracking errors.
    pub fn new(x: f64, y: f64, psi: f64, v: f64) -> Self {
        Self {
            x,
            y,
            psi,
            v,
            cte: 0.0,
            epsi: 0.0,
        }
    }

    pub fn with_errors(self, cte: f64, epsi: f64) -> Self {
        Self { cte, epsi, ..self }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.psi.is_finite()
            && self.v.is_finite()
            && self.cte.is_finite()
            && self.epsi.is_finite()
    }
}

impl Actuation {
    pub fn new(steer_rad: f64, accel: f64) -> Self {
        Self { steer_rad, accel }
    }
}

impl Default for KinematicModel {
    fn default() -> Self {
        Self { lf_m: 2.67 }
    }
}

impl KinematicModel {
    pub fn new(lf_m: f64) -> Self {
        Self { lf_m }
    }

    /// Advance `state` by `dt` seconds under `act`.
    ///
    /// ```text
    /// x'    = x + v cos(psi) dt
    /// y'    = y + v sin(psi) dt
    /// psi'  = psi + (v / Lf) delta dt
    /// v'    = v + a dt
    /// cte'  = cte_ref + v sin(epsi_ref) dt
    /// epsi' = epsi_ref + (v / Lf) delta dt
    /// ```
    ///
    /// where `cte_ref` and `epsi_ref` come from `reference`.
    pub fn step<R>(
        &self,
        state: &VehicleState,
        act: &Actuation,
        dt: f64,
        reference: &R,
    ) -> VehicleState
    where
        R: TrackingReference + ?Sized,
    {
        let (cte_ref, epsi_ref) = reference.errors_at(state);
        let yaw_rate = state.v / self.lf_m * act.steer_rad;

        VehicleState {
            x: state.x + state.v * state.psi.cos() * dt,
            y: state.y + state.v * state.psi.sin() * dt,
            psi: state.psi + yaw_rate * dt,
            v: state.v + act.accel * dt,
            cte: cte_ref + state.v * epsi_ref.sin() * dt,
            epsi: epsi_ref + yaw_rate * dt,
        }
    }
}

impl TrackingReference for FrozenErrors {
    fn errors_at(&self, state: &VehicleState) -> (f64, f64) {
        (state.cte, state.epsi)
    }
}

impl<'a> TrackedCurve<'a> {
    pub fn new(curve: &'a ReferenceCurve, mode: HeadingErrorMode) -> Self {
        Self { curve, mode }
    }
}

impl<'a> TrackingReference for TrackedCurve<'a> {
    fn errors_at(&self, state: &VehicleState) -> (f64, f64) {
        (
            state.y - self.curve.eval(state.x),
            wrap_pi(state.psi - self.curve.desired_heading(state.x, self.mode)),
        )
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::FRAC_PI_4;

    const TOL: f64 = 1e-12;

    #[test]
    fn test_zero_actuation_moves_along_heading() {
        let model = KinematicModel::default();
        let state = VehicleState::new(1.0, 2.0, FRAC_PI_4, 10.0).with_errors(0.5, 0.0);

        let next = model.step(&state, &Actuation::default(), 0.1, &FrozenErrors);

        let dist = ((next.x - state.x).powi(2) + (next.y - state.y).powi(2)).sqrt();
        assert!((dist - 1.0).abs() < TOL);
        assert!((next.x - state.x - next.y + state.y).abs() < TOL);
        assert_eq!(next.psi, state.psi);
        assert_eq!(next.v, state.v);
        assert_eq!(next.cte, state.cte);
        assert_eq!(next.epsi, state.epsi);
    }

    #[test]
    fn test_steer_and_accel() {
        let model = KinematicModel::new(2.0);
        let state = VehicleState::new(0.0, 0.0, 0.0, 4.0).with_errors(0.0, 0.1);

        let next = model.step(&state, &Actuation::new(0.2, 1.0), 0.5, &FrozenErrors);

        // Positive steering turns left
        assert!((next.psi - 0.2).abs() < TOL);
        assert!((next.v - 4.5).abs() < TOL);
        assert!((next.cte - 4.0 * (0.1f64).sin() * 0.5).abs() < TOL);
        assert!((next.epsi - 0.3).abs() < TOL);
    }

    #[test]
    fn test_tracked_curve_matches_consistent_state() {
        let curve = ReferenceCurve::from_coeffs(vec![0.5, 0.1, 0.01]);
        let mode = HeadingErrorMode::Exact;
        let reference = TrackedCurve::new(&curve, mode);

        // Build a state whose stored errors agree with the curve
        let state = VehicleState::new(3.0, 1.0, 0.2, 5.0);
        let cte = state.y - curve.eval(state.x);
        let epsi = state.psi - curve.desired_heading(state.x, mode);
        let state = state.with_errors(cte, epsi);

        let model = KinematicModel::default();
        let act = Actuation::new(0.05, -0.3);

        let tracked = model.step(&state, &act, 0.1, &reference);
        let frozen = model.step(&state, &act, 0.1, &FrozenErrors);

        assert!((tracked.cte - frozen.cte).abs() < TOL);
        assert!((tracked.epsi - frozen.epsi).abs() < TOL);
    }
}
