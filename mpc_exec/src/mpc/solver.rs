//! Receding horizon solver
//!
//! Projected Levenberg-Marquardt over the actuation block. Each iteration:
//!
//! 1. Rolls out the current actuations and evaluates the residuals.
//! 2. Builds the Jacobian by central differences.
//! 3. Freezes actuations sitting on a bound whose gradient points out of the box.
//! 4. Solves the damped normal equations for the free actuations with a Cholesky factorisation.
//! 5. Projects the step back into the box and accepts it if the cost falls.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, trace};
use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use std::time::Instant;

use super::{
    cost::Problem, layout::VarLayout, lm::AdaptiveDamping, trajectory::Trajectory, MpcParams,
    ParamsError, SolveFailure,
};
use crate::{
    ref_curve::ReferenceCurve,
    vehicle_model::{Actuation, KinematicModel, VehicleState},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Distance from a bound within which an actuation is treated as sitting on it.
const ACTIVE_BOUND_TOL: f64 = 1e-12;

/// Smallest diagonal scaling used for the damping term.
const MIN_DIAG_SCALE: f64 = 1e-9;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// The receding horizon optimiser.
#[derive(Debug, Clone)]
pub struct Mpc {
    params: MpcParams,
    layout: VarLayout,
    model: KinematicModel,
}

/// A successful solve.
#[derive(Debug, Clone, Serialize)]
pub struct Solution {
    pub trajectory: Trajectory,

    /// Number of Levenberg-Marquardt iterations performed.
    pub iterations: usize,

    /// Final objective value.
    pub cost: f64,

    /// Units: seconds
    pub solve_time_s: f64,

    /// Largest dynamics defect in the returned trajectory.
    pub max_defect: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Mpc {
    /// Create a new optimiser, validating the parameters.
    pub fn new(params: MpcParams) -> Result<Self, ParamsError> {
        params.validate()?;

        Ok(Self {
            layout: VarLayout::new(params.horizon.n_steps),
            model: KinematicModel::new(params.lf_m),
            params,
        })
    }

    pub fn params(&self) -> &MpcParams {
        &self.params
    }

    /// Solve for the trajectory starting at `initial` which best tracks `curve`.
    ///
    /// `warm_start` is the previous solution's actuations. It is shifted forward by one step
    /// before use, and ignored if warm starting is disabled.
    pub fn solve(
        &self,
        initial: &VehicleState,
        curve: &ReferenceCurve,
        warm_start: Option<&[Actuation]>,
    ) -> Result<Solution, SolveFailure> {
        let start = Instant::now();
        let solver = &self.params.solver;

        if !initial.is_finite() {
            return Err(SolveFailure::Numerical);
        }

        let problem = Problem::new(&self.params, self.layout, self.model, *initial, curve);
        let (lower, upper) = self.bound_vectors();

        let mut u = self.initial_guess(warm_start);
        project(&mut u, &lower, &upper);

        let mut r = problem.residuals_at(&u);
        let mut cost = r.norm_squared();
        let mut damping = AdaptiveDamping::default();
        let mut iterations = 0;
        let mut converged = false;

        while iterations < solver.max_iterations {
            if !cost.is_finite() {
                return Err(SolveFailure::Numerical);
            }

            let elapsed_s = start.elapsed().as_secs_f64();
            if elapsed_s > solver.max_solve_time_s {
                return Err(SolveFailure::Timeout {
                    iterations,
                    elapsed_s,
                });
            }

            iterations += 1;

            let jac = problem.jacobian(&u, r.len());
            let grad = jac.transpose() * &r;

            // Select the free variables
            let free: Vec<usize> = (0..u.len())
                .filter(|&j| {
                    let width = upper[j] - lower[j];
                    let at_lower = u[j] <= lower[j] + ACTIVE_BOUND_TOL && grad[j] > 0.0;
                    let at_upper = u[j] >= upper[j] - ACTIVE_BOUND_TOL && grad[j] < 0.0;
                    width > ACTIVE_BOUND_TOL && !at_lower && !at_upper
                })
                .collect();

            let max_grad = free.iter().fold(0f64, |m, &j| m.max(grad[j].abs()));
            if free.is_empty() || max_grad <= solver.grad_tol * cost.max(1.0) {
                converged = true;
                break;
            }

            let step = match damped_step(&jac, &grad, &free, damping.lambda()) {
                Some(s) => s,
                None => {
                    damping.reject_step();
                    if damping.is_stuck() {
                        converged = true;
                        break;
                    }
                    continue;
                }
            };

            let mut u_new = &u + &step;
            project(&mut u_new, &lower, &upper);
            let applied = &u_new - &u;

            let predicted = cost - (&r + &jac * &applied).norm_squared();
            let r_new = problem.residuals_at(&u_new);
            let cost_new = r_new.norm_squared();
            let step_size = applied.amax();

            if cost_new.is_finite() && cost_new < cost {
                let reduction = cost - cost_new;
                let rho = if predicted > 0.0 {
                    reduction / predicted
                } else {
                    0.0
                };
                damping.update(rho);

                u = u_new;
                r = r_new;
                cost = cost_new;

                trace!(
                    "MPC iteration {}: cost {:.6e}, rho {:.3}, lambda {:.1e}",
                    iterations,
                    cost,
                    rho,
                    damping.lambda()
                );

                if step_size < solver.step_tol || reduction <= solver.cost_tol * cost.max(1.0) {
                    converged = true;
                    break;
                }
            } else {
                damping.reject_step();
                if step_size < solver.step_tol || damping.is_stuck() {
                    converged = true;
                    break;
                }
            }
        }

        if !converged {
            return Err(SolveFailure::NotConverged { iterations });
        }

        let vars = problem.rollout(&u);

        let max_defect = problem.constraint_defects(&vars);
        if !(max_defect <= solver.defect_tol) {
            return Err(SolveFailure::DynamicsViolated { defect: max_defect });
        }

        let violation = problem.corridor_violation(&vars);
        if violation > self.params.corridor.tol {
            return Err(SolveFailure::Infeasible { violation });
        }

        let cost = problem.cost(&vars);
        if !cost.is_finite() {
            return Err(SolveFailure::Numerical);
        }

        let solve_time_s = start.elapsed().as_secs_f64();

        debug!(
            "MPC solved in {} iterations ({:.3} ms), cost {:.6e}",
            iterations,
            solve_time_s * 1e3,
            cost
        );

        Ok(Solution {
            trajectory: self.layout.to_trajectory(&vars),
            iterations,
            cost,
            solve_time_s,
            max_defect,
        })
    }

    /// Lower and upper bounds of the actuation block.
    fn bound_vectors(&self) -> (DVector<f64>, DVector<f64>) {
        let b = &self.params.bounds;
        let m = self.layout.n_actuations();

        let lower = self.layout.pack_actuations(&vec![
            Actuation::new(-b.max_steer_rad, b.min_accel);
            m
        ]);
        let upper = self.layout.pack_actuations(&vec![
            Actuation::new(b.max_steer_rad, b.max_accel);
            m
        ]);

        (lower, upper)
    }

    /// Starting actuations, the previous solution shifted by one step or all zero.
    fn initial_guess(&self, warm_start: Option<&[Actuation]>) -> DVector<f64> {
        let m = self.layout.n_actuations();

        let prev = match warm_start {
            Some(p) if self.params.solver.warm_start && !p.is_empty() => p,
            _ => return self.layout.pack_actuations(&vec![Actuation::default(); m]),
        };

        let shifted: Vec<Actuation> = (0..m)
            .map(|k| prev[(k + 1).min(prev.len() - 1)])
            .collect();

        self.layout.pack_actuations(&shifted)
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Clamp every element into its bounds.
fn project(u: &mut DVector<f64>, lower: &DVector<f64>, upper: &DVector<f64>) {
    for j in 0..u.len() {
        u[j] = u[j].max(lower[j]).min(upper[j]);
    }
}

/// Solve `(Jf' Jf + lambda D) h = -gf` over the free variables, returning the full length step.
fn damped_step(
    jac: &DMatrix<f64>,
    grad: &DVector<f64>,
    free: &[usize],
    lambda: f64,
) -> Option<DVector<f64>> {
    let nf = free.len();

    let jf = DMatrix::from_fn(jac.nrows(), nf, |i, c| jac[(i, free[c])]);
    let mut hess = jf.transpose() * &jf;
    for c in 0..nf {
        let d = hess[(c, c)].max(MIN_DIAG_SCALE);
        hess[(c, c)] += lambda * d;
    }

    let neg_grad = DVector::from_fn(nf, |c, _| -grad[free[c]]);
    let hf = hess.cholesky()?.solve(&neg_grad);

    if hf.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let mut step = DVector::zeros(grad.len());
    for (c, &j) in free.iter().enumerate() {
        step[j] = hf[c];
    }

    Some(step)
}
