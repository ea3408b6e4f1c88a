//! Objective, rollout and constraint checks for one optimisation problem
//!
//! The decision variables are the actuations only. States are produced by rolling the kinematic
//! model forward from the initial state, so the dynamics equality constraints hold by
//! construction and are verified with [`Problem::constraint_defects`] before a result is used.
//!
//! Every objective term is a weighted square, so the objective is held as a residual vector `r`
//! with `cost = r . r` and each residual already scaled by the square root of its weight.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{DMatrix, DVector};

use super::{layout::VarLayout, params::MpcParams};
use crate::{
    ref_curve::ReferenceCurve,
    vehicle_model::{KinematicModel, TrackedCurve, VehicleState},
};

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// A single receding horizon problem: fixed initial state and reference curve.
pub(crate) struct Problem<'a> {
    params: &'a MpcParams,
    layout: VarLayout,
    model: KinematicModel,
    initial: VehicleState,
    reference: TrackedCurve<'a>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<'a> Problem<'a> {
    pub fn new(
        params: &'a MpcParams,
        layout: VarLayout,
        model: KinematicModel,
        initial: VehicleState,
        curve: &'a ReferenceCurve,
    ) -> Self {
        Self {
            params,
            layout,
            model,
            initial,
            reference: TrackedCurve::new(curve, params.heading_error),
        }
    }

    /// Roll the model forward under the actuation block, giving the full variable vector.
    pub fn rollout(&self, act_block: &DVector<f64>) -> DVector<f64> {
        let layout = &self.layout;
        let acts = layout.unpack_actuations(act_block);

        let mut vars = layout.zeros();
        let mut state = self.initial;
        layout.set_state(&mut vars, 0, &state);

        for (k, act) in acts.iter().enumerate() {
            layout.set_actuation(&mut vars, k, act);
            state = self
                .model
                .step(&state, act, self.params.horizon.dt_s, &self.reference);
            layout.set_state(&mut vars, k + 1, &state);
        }

        vars
    }

    /// Weighted residuals of the objective for a rolled out variable vector.
    pub fn residuals(&self, vars: &DVector<f64>) -> DVector<f64> {
        let layout = &self.layout;
        let w = &self.params.weights;
        let corridor = &self.params.corridor;
        let n = layout.n_states();
        let m = layout.n_actuations();

        let mut r = Vec::with_capacity(3 * n + 4 * m + 2 * n);

        // Tracking and speed
        for k in 0..n {
            let s = layout.state(vars, k);
            r.push(w.cte.sqrt() * s.cte);
            r.push(w.epsi.sqrt() * s.epsi);
            r.push(w.speed.sqrt() * (s.v - self.params.ref_speed));
        }

        // Actuator use
        for k in 0..m {
            let a = layout.actuation(vars, k);
            r.push(w.steer.sqrt() * a.steer_rad);
            r.push(w.accel.sqrt() * a.accel);
        }

        // Smoothness
        for k in 1..m {
            let prev = layout.actuation(vars, k - 1);
            let a = layout.actuation(vars, k);
            r.push(w.steer_rate.sqrt() * (a.steer_rad - prev.steer_rad));
            r.push(w.accel_rate.sqrt() * (a.accel - prev.accel));
        }

        // Corridor penalty, state 0 is fixed so it is not penalised
        let wc = corridor.weight.sqrt();
        for k in 1..n {
            let s = layout.state(vars, k);
            if let Some(max) = corridor.max_cte_m {
                r.push(wc * excess(s.cte, max));
            }
            if let Some(max) = corridor.max_epsi_rad {
                r.push(wc * excess(s.epsi, max));
            }
        }

        DVector::from_vec(r)
    }

    /// Residuals as a function of the actuation block.
    pub fn residuals_at(&self, act_block: &DVector<f64>) -> DVector<f64> {
        self.residuals(&self.rollout(act_block))
    }

    /// Objective value for a rolled out variable vector.
    pub fn cost(&self, vars: &DVector<f64>) -> f64 {
        self.residuals(vars).norm_squared()
    }

    /// Jacobian of the residuals with respect to the actuation block, by central differences.
    pub fn jacobian(&self, act_block: &DVector<f64>, num_residuals: usize) -> DMatrix<f64> {
        let h = self.params.solver.fd_step;
        let mut jac = DMatrix::zeros(num_residuals, act_block.len());
        let mut perturbed = act_block.clone();

        for j in 0..act_block.len() {
            let orig = perturbed[j];

            perturbed[j] = orig + h;
            let r_plus = self.residuals_at(&perturbed);
            perturbed[j] = orig - h;
            let r_minus = self.residuals_at(&perturbed);
            perturbed[j] = orig;

            jac.set_column(j, &((r_plus - r_minus) / (2.0 * h)));
        }

        jac
    }

    /// Largest violation of the dynamics equality constraints in a flattened vector.
    ///
    /// Covers both the initial state condition and every model step.
    pub fn constraint_defects(&self, vars: &DVector<f64>) -> f64 {
        let layout = &self.layout;
        let dt = self.params.horizon.dt_s;

        let mut max_defect = state_diff(&layout.state(vars, 0), &self.initial);

        for k in 0..layout.n_actuations() {
            let predicted = self.model.step(
                &layout.state(vars, k),
                &layout.actuation(vars, k),
                dt,
                &self.reference,
            );
            max_defect = max_defect.max(state_diff(&layout.state(vars, k + 1), &predicted));
        }

        max_defect
    }

    /// Largest amount by which any state after the first leaves the corridor.
    pub fn corridor_violation(&self, vars: &DVector<f64>) -> f64 {
        let corridor = &self.params.corridor;
        let mut max_violation = 0f64;

        for k in 1..self.layout.n_states() {
            let s = self.layout.state(vars, k);
            if let Some(max) = corridor.max_cte_m {
                max_violation = max_violation.max(excess(s.cte, max));
            }
            if let Some(max) = corridor.max_epsi_rad {
                max_violation = max_violation.max(excess(s.epsi, max));
            }
        }

        max_violation
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Amount by which `|value|` exceeds `max`, zero inside the limit.
fn excess(value: f64, max: f64) -> f64 {
    (value.abs() - max).max(0.0)
}

/// Largest absolute element-wise difference between two states.
///
/// NaN in either state gives infinity so that it can never pass a tolerance check.
fn state_diff(a: &VehicleState, b: &VehicleState) -> f64 {
    let diffs = [
        a.x - b.x,
        a.y - b.y,
        a.psi - b.psi,
        a.v - b.v,
        a.cte - b.cte,
        a.epsi - b.epsi,
    ];

    diffs.iter().fold(0f64, |m, d| {
        if d.is_nan() {
            std::f64::INFINITY
        } else {
            m.max(d.abs())
        }
    })
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::vehicle_model::Actuation;

    fn problem_parts() -> (MpcParams, ReferenceCurve) {
        let mut params = MpcParams::default();
        params.horizon.n_steps = 5;
        (params, ReferenceCurve::from_coeffs(vec![0.0, 0.04, 0.0016]))
    }

    #[test]
    fn test_rollout_has_no_defects() {
        let (params, curve) = problem_parts();
        let layout = VarLayout::new(params.horizon.n_steps);
        let initial = VehicleState::new(0.0, 0.0, 0.0, 10.0).with_errors(0.0, -(0.04f64).atan());
        let problem = Problem::new(&params, layout, KinematicModel::default(), initial, &curve);

        let acts = vec![Actuation::new(0.05, 0.5); layout.n_actuations()];
        let vars = problem.rollout(&layout.pack_actuations(&acts));

        assert_eq!(layout.state(&vars, 0), initial);
        assert_eq!(problem.constraint_defects(&vars), 0.0);

        // Perturbing a state is picked up
        let mut broken = vars.clone();
        broken[2] += 0.1;
        assert!((problem.constraint_defects(&broken) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_cost_terms() {
        let mut params = MpcParams::default();
        params.horizon.n_steps = 3;
        params.ref_speed = 0.0;
        params.weights = crate::mpc::CostWeights {
            cte: 0.0,
            epsi: 0.0,
            speed: 0.0,
            steer: 1.0,
            accel: 0.0,
            steer_rate: 2.0,
            accel_rate: 0.0,
        };
        let curve = ReferenceCurve::from_coeffs(vec![0.0, 0.0]);
        let layout = VarLayout::new(3);
        let problem = Problem::new(
            &params,
            layout,
            KinematicModel::default(),
            VehicleState::default(),
            &curve,
        );

        let acts = vec![Actuation::new(0.1, 0.0), Actuation::new(0.3, 0.0)];
        let vars = problem.rollout(&layout.pack_actuations(&acts));

        // steer: 0.1^2 + 0.3^2, rate: 2 * 0.2^2
        assert!((problem.cost(&vars) - (0.01 + 0.09 + 0.08)).abs() < 1e-12);
    }

    #[test]
    fn test_jacobian_matches_linear_terms() {
        let mut params = MpcParams::default();
        params.horizon.n_steps = 3;
        let curve = ReferenceCurve::from_coeffs(vec![0.0, 0.0]);
        let layout = VarLayout::new(3);
        let problem = Problem::new(
            &params,
            layout,
            KinematicModel::default(),
            VehicleState::new(0.0, 0.0, 0.0, 5.0),
            &curve,
        );

        let block = layout.pack_actuations(&[Actuation::new(0.0, 0.2), Actuation::new(0.0, 0.1)]);
        let r = problem.residuals_at(&block);
        let jac = problem.jacobian(&block, r.len());

        assert_eq!(jac.nrows(), r.len());
        assert_eq!(jac.ncols(), 4);

        // Residual 3 * n is the first steering magnitude term, linear in steer_0 only
        let row = 3 * layout.n_states();
        assert!((jac[(row, 0)] - params.weights.steer.sqrt()).abs() < 1e-6);
        assert!(jac[(row, 1)].abs() < 1e-6);
    }

    #[test]
    fn test_corridor_violation() {
        let (mut params, curve) = problem_parts();
        params.corridor.max_cte_m = Some(0.05);
        let layout = VarLayout::new(params.horizon.n_steps);
        let problem = Problem::new(
            &params,
            layout,
            KinematicModel::default(),
            VehicleState::new(0.0, 0.0, 0.0, 10.0),
            &curve,
        );

        let block = layout.pack_actuations(&vec![Actuation::default(); layout.n_actuations()]);
        let vars = problem.rollout(&block);
        assert!(problem.corridor_violation(&vars) > 0.05);

        let mut params_wide = params.clone();
        params_wide.corridor.max_cte_m = Some(100.0);
        let problem = Problem::new(
            &params_wide,
            layout,
            KinematicModel::default(),
            VehicleState::new(0.0, 0.0, 0.0, 10.0),
            &curve,
        );
        assert_eq!(problem.corridor_violation(&problem.rollout(&block)), 0.0);
    }
}
