//! Layout of the optimiser's flattened variable vector
//!
//! The vector holds `N` states and `N - 1` actuations, each quantity stored contiguously:
//!
//! ```text
//! [x_0 .. x_N-1, y.., psi.., v.., cte.., epsi.., steer_0 .. steer_N-2, accel_0 .. accel_N-2]
//! ```

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::DVector;

use super::trajectory::{Trajectory, TrajectoryStep};
use crate::vehicle_model::{Actuation, VehicleState};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of values in one state.
pub(crate) const STATE_DIM: usize = 6;

/// Number of values in one actuation.
pub(crate) const ACT_DIM: usize = 2;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct VarLayout {
    n: usize,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VarLayout {
    pub fn new(n_steps: usize) -> Self {
        Self { n: n_steps }
    }

    pub fn n_states(&self) -> usize {
        self.n
    }

    pub fn n_actuations(&self) -> usize {
        self.n.saturating_sub(1)
    }

    /// Total length of the vector.
    pub fn len(&self) -> usize {
        STATE_DIM * self.n + ACT_DIM * self.n_actuations()
    }

    /// Offset of the first actuation value.
    pub fn actuation_start(&self) -> usize {
        STATE_DIM * self.n
    }

    fn steer_start(&self) -> usize {
        self.actuation_start()
    }

    fn accel_start(&self) -> usize {
        self.actuation_start() + self.n_actuations()
    }

    pub fn zeros(&self) -> DVector<f64> {
        DVector::zeros(self.len())
    }

    pub fn state(&self, vars: &DVector<f64>, k: usize) -> VehicleState {
        let n = self.n;
        VehicleState {
            x: vars[k],
            y: vars[n + k],
            psi: vars[2 * n + k],
            v: vars[3 * n + k],
            cte: vars[4 * n + k],
            epsi: vars[5 * n + k],
        }
    }

    pub fn set_state(&self, vars: &mut DVector<f64>, k: usize, state: &VehicleState) {
        let n = self.n;
        vars[k] = state.x;
        vars[n + k] = state.y;
        vars[2 * n + k] = state.psi;
        vars[3 * n + k] = state.v;
        vars[4 * n + k] = state.cte;
        vars[5 * n + k] = state.epsi;
    }

    pub fn actuation(&self, vars: &DVector<f64>, k: usize) -> Actuation {
        Actuation {
            steer_rad: vars[self.steer_start() + k],
            accel: vars[self.accel_start() + k],
        }
    }

    pub fn set_actuation(&self, vars: &mut DVector<f64>, k: usize, act: &Actuation) {
        vars[self.steer_start() + k] = act.steer_rad;
        vars[self.accel_start() + k] = act.accel;
    }

    /// Pack actuations into the compact `[steer.., accel..]` block the solver iterates on.
    pub fn pack_actuations(&self, acts: &[Actuation]) -> DVector<f64> {
        let m = self.n_actuations();
        DVector::from_fn(ACT_DIM * m, |i, _| {
            if i < m {
                acts[i].steer_rad
            } else {
                acts[i - m].accel
            }
        })
    }

    /// Unpack the compact actuation block.
    pub fn unpack_actuations(&self, block: &DVector<f64>) -> Vec<Actuation> {
        let m = self.n_actuations();
        (0..m)
            .map(|k| Actuation {
                steer_rad: block[k],
                accel: block[m + k],
            })
            .collect()
    }

    /// Convert a flattened vector into a trajectory.
    pub fn to_trajectory(&self, vars: &DVector<f64>) -> Trajectory {
        let mut last = Actuation::default();

        let steps = (0..self.n)
            .map(|k| {
                if k < self.n_actuations() {
                    last = self.actuation(vars, k);
                }
                TrajectoryStep {
                    state: self.state(vars, k),
                    actuation: last,
                }
            })
            .collect();

        Trajectory::new(steps)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_offsets() {
        let layout = VarLayout::new(4);
        assert_eq!(layout.len(), 6 * 4 + 2 * 3);
        assert_eq!(layout.actuation_start(), 24);

        let mut vars = layout.zeros();
        let state = VehicleState::new(1.0, 2.0, 3.0, 4.0).with_errors(5.0, 6.0);
        layout.set_state(&mut vars, 2, &state);
        layout.set_actuation(&mut vars, 1, &Actuation::new(0.1, 0.2));

        assert_eq!(vars[2], 1.0);
        assert_eq!(vars[4 + 2], 2.0);
        assert_eq!(vars[5 * 4 + 2], 6.0);
        assert_eq!(vars[24 + 1], 0.1);
        assert_eq!(vars[24 + 3 + 1], 0.2);
        assert_eq!(layout.state(&vars, 2), state);
    }

    #[test]
    fn test_trajectory_repeats_last_actuation() {
        let layout = VarLayout::new(3);
        let mut vars = layout.zeros();
        layout.set_actuation(&mut vars, 0, &Actuation::new(0.1, 0.5));
        layout.set_actuation(&mut vars, 1, &Actuation::new(0.2, -0.5));

        let traj = layout.to_trajectory(&vars);

        assert_eq!(traj.len(), 3);
        assert_eq!(traj.first_actuation(), Some(Actuation::new(0.1, 0.5)));
        assert_eq!(traj.steps()[2].actuation, traj.steps()[1].actuation);
    }

    #[test]
    fn test_pack_unpack() {
        let layout = VarLayout::new(3);
        let acts = vec![Actuation::new(0.1, 0.5), Actuation::new(0.2, -0.5)];

        let block = layout.pack_actuations(&acts);
        assert_eq!(block.len(), 4);
        assert_eq!(block[1], 0.2);
        assert_eq!(block[2], 0.5);
        assert_eq!(layout.unpack_actuations(&block), acts);
    }
}
