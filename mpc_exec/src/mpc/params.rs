//! Parameters structure for the receding horizon optimiser

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::ref_curve::HeadingErrorMode;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Parameters for the optimiser. Fixed at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct MpcParams {
    pub horizon: HorizonConfig,

    /// Distance from the front axle to the centre of gravity.
    ///
    /// Units: meters
    pub lf_m: f64,

    /// Speed the vehicle should hold.
    pub ref_speed: f64,

    /// How the desired heading is derived from the reference curve.
    #[serde(default)]
    pub heading_error: HeadingErrorMode,

    pub bounds: ActuatorBounds,

    pub weights: CostWeights,

    #[serde(default)]
    pub corridor: CorridorParams,

    #[serde(default)]
    pub solver: SolverParams,
}

/// Horizon over which trajectories are optimised.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct HorizonConfig {
    /// Number of states in the horizon (N).
    pub n_steps: usize,

    /// Time between states.
    ///
    /// Units: seconds
    pub dt_s: f64,
}

/// Physical limits of the actuators.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct ActuatorBounds {
    /// Largest steering angle either side of straight ahead.
    ///
    /// Units: radians
    pub max_steer_rad: f64,

    pub min_accel: f64,

    pub max_accel: f64,
}

/// Weights of each term in the objective.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct CostWeights {
    pub cte: f64,
    pub epsi: f64,
    pub speed: f64,
    pub steer: f64,
    pub accel: f64,
    pub steer_rate: f64,
    pub accel_rate: f64,
}

/// Optional bounds on the tracking errors along the horizon.
///
/// These are the only constraints that can make the problem infeasible.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorridorParams {
    /// Units: map units
    pub max_cte_m: Option<f64>,

    /// Units: radians
    pub max_epsi_rad: Option<f64>,

    /// Weight of the exterior penalty applied while solving.
    pub weight: f64,

    /// Violation above which a solution is reported as infeasible.
    pub tol: f64,
}

/// Settings for the Levenberg-Marquardt iteration.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct SolverParams {
    pub max_iterations: usize,

    /// Wall clock budget for one solve.
    ///
    /// Units: seconds
    pub max_solve_time_s: f64,

    /// Converged when the step's largest element is below this.
    pub step_tol: f64,

    /// Converged when the relative cost reduction is below this.
    pub cost_tol: f64,

    /// Converged when the projected gradient's largest element is below this.
    pub grad_tol: f64,

    /// Largest allowed dynamics defect in a returned trajectory.
    pub defect_tol: f64,

    /// Finite difference step used for the Jacobian.
    pub fd_step: f64,

    /// Start from the previous solution shifted by one step.
    pub warm_start: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParamsError {
    #[error("The horizon must have at least 2 steps, found {0}")]
    HorizonTooShort(usize),

    #[error("Expected a positive {0}, found {1}")]
    NotPositive(&'static str, f64),

    #[error("Expected a non-negative {0}, found {1}")]
    Negative(&'static str, f64),

    #[error("Acceleration bounds are inverted (min {0} > max {1})")]
    InvertedAccelBounds(f64, f64),

    #[error("The solver must be allowed at least one iteration")]
    NoIterations,

    #[error("Expected a reference curve degree of at least 1, found {0}")]
    InvalidDegree(usize),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for MpcParams {
    fn default() -> Self {
        Self {
            horizon: HorizonConfig {
                n_steps: 10,
                dt_s: 0.1,
            },
            lf_m: 2.67,
            ref_speed: 40.0,
            heading_error: HeadingErrorMode::default(),
            bounds: ActuatorBounds {
                max_steer_rad: 25f64.to_radians(),
                min_accel: -1.0,
                max_accel: 1.0,
            },
            weights: CostWeights::default(),
            corridor: CorridorParams::default(),
            solver: SolverParams::default(),
        }
    }
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            cte: 2000.0,
            epsi: 2000.0,
            speed: 1.0,
            steer: 5.0,
            accel: 5.0,
            steer_rate: 200.0,
            accel_rate: 10.0,
        }
    }
}

impl Default for CorridorParams {
    fn default() -> Self {
        Self {
            max_cte_m: None,
            max_epsi_rad: None,
            weight: 1e4,
            tol: 1e-3,
        }
    }
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            max_solve_time_s: 0.05,
            step_tol: 1e-8,
            cost_tol: 1e-10,
            grad_tol: 1e-8,
            defect_tol: 1e-6,
            fd_step: 1e-6,
            warm_start: true,
        }
    }
}

impl MpcParams {
    /// Check that the parameters describe a solvable problem.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.horizon.n_steps < 2 {
            return Err(ParamsError::HorizonTooShort(self.horizon.n_steps));
        }

        positive("horizon.dt_s", self.horizon.dt_s)?;
        positive("lf_m", self.lf_m)?;
        non_negative("bounds.max_steer_rad", self.bounds.max_steer_rad)?;

        if !(self.bounds.min_accel <= self.bounds.max_accel) {
            return Err(ParamsError::InvertedAccelBounds(
                self.bounds.min_accel,
                self.bounds.max_accel,
            ));
        }

        let w = &self.weights;
        for (name, value) in [
            ("weights.cte", w.cte),
            ("weights.epsi", w.epsi),
            ("weights.speed", w.speed),
            ("weights.steer", w.steer),
            ("weights.accel", w.accel),
            ("weights.steer_rate", w.steer_rate),
            ("weights.accel_rate", w.accel_rate),
        ]
        .iter()
        {
            non_negative(*name, *value)?;
        }

        if let Some(m) = self.corridor.max_cte_m {
            non_negative("corridor.max_cte_m", m)?;
        }
        if let Some(m) = self.corridor.max_epsi_rad {
            non_negative("corridor.max_epsi_rad", m)?;
        }
        non_negative("corridor.weight", self.corridor.weight)?;
        non_negative("corridor.tol", self.corridor.tol)?;

        if self.solver.max_iterations < 1 {
            return Err(ParamsError::NoIterations);
        }
        positive("solver.max_solve_time_s", self.solver.max_solve_time_s)?;
        positive("solver.fd_step", self.solver.fd_step)?;
        non_negative("solver.defect_tol", self.solver.defect_tol)?;

        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn positive(name: &'static str, value: f64) -> Result<(), ParamsError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ParamsError::NotPositive(name, value))
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ParamsError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ParamsError::Negative(name, value))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
