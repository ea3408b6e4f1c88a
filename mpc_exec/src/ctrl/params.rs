//! Parameters structure for the controller loop

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;
use util::maths::lin_map;

use crate::mpc::{MpcParams, ParamsError};

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Parameters for the controller, loaded from `mpc_ctrl.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct CtrlParams {
    /// Delay between telemetry being measured and a command taking effect.
    ///
    /// Units: seconds
    pub latency_s: f64,

    /// Degree of the reference curve.
    pub poly_degree: usize,

    pub mpc: MpcParams,

    pub fallback: FallbackParams,

    pub display: DisplayParams,

    #[serde(default)]
    pub output: SteeringConvention,
}

/// Command sent when the optimiser fails.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct FallbackParams {
    /// Units: radians
    pub steer_rad: f64,

    pub throttle: f64,
}

/// Sampling of the reference curve sent back for display.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct DisplayParams {
    /// Units: map units
    pub ref_sample_step_m: f64,

    pub ref_sample_count: usize,
}

/// How steering angles are expressed on the wire.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct SteeringConvention {
    /// Send steering as a fraction of the steering limit, in [-1, 1].
    pub normalise_steering: bool,

    /// Positive steering on the wire turns right.
    pub invert_steering: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for CtrlParams {
    fn default() -> Self {
        Self {
            latency_s: 0.1,
            poly_degree: 3,
            mpc: MpcParams::default(),
            fallback: FallbackParams {
                steer_rad: 0.0,
                throttle: 0.4,
            },
            display: DisplayParams {
                ref_sample_step_m: 5.0,
                ref_sample_count: 20,
            },
            output: SteeringConvention::default(),
        }
    }
}

impl CtrlParams {
    /// Check the controller's own parameters and the optimiser's.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if !(self.latency_s >= 0.0 && self.latency_s.is_finite()) {
            return Err(ParamsError::Negative("latency_s", self.latency_s));
        }

        if self.poly_degree < 1 {
            return Err(ParamsError::InvalidDegree(self.poly_degree));
        }

        if !(self.display.ref_sample_step_m > 0.0) {
            return Err(ParamsError::NotPositive(
                "display.ref_sample_step_m",
                self.display.ref_sample_step_m,
            ));
        }

        self.mpc.validate()
    }
}

impl SteeringConvention {
    /// Convert a model steering angle into the wire convention.
    pub fn to_wire(&self, steer_rad: f64, max_steer_rad: f64) -> f64 {
        let mut s = steer_rad;

        if self.normalise_steering {
            s = if max_steer_rad > 0.0 {
                lin_map((-max_steer_rad, max_steer_rad), (-1.0, 1.0), s)
            } else {
                0.0
            };
        }

        if self.invert_steering {
            s = -s;
        }

        s
    }

    /// Convert a wire steering value back into a model steering angle.
    pub fn from_wire(&self, wire: f64, max_steer_rad: f64) -> f64 {
        let mut s = wire;

        if self.invert_steering {
            s = -s;
        }

        if self.normalise_steering {
            s = lin_map((-1.0, 1.0), (-max_steer_rad, max_steer_rad), s);
        }

        s
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
