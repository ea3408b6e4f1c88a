//! # Frame transform
//!
//! Waypoints arrive in the world frame. The controller works in the vehicle frame, which has the
//! vehicle at the origin with its heading along +X.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{Isometry2, Point2, Translation2, UnitComplex};
use serde::Serialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Position and heading of the vehicle in the world frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WorldPose {
    /// Units: map units
    pub x: f64,

    /// Units: map units
    pub y: f64,

    /// Heading, counter-clockwise from world +X.
    ///
    /// Units: radians
    pub psi: f64,
}

/// A set of waypoints held as separate coordinate lists of equal length.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Waypoints {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FrameError {
    #[error("Waypoint coordinate lists have different lengths ({0} x, {1} y)")]
    LengthMismatch(usize, usize),

    #[error("Pose or waypoints contain a non-finite value")]
    NonFinite,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl WorldPose {
    pub fn new(x: f64, y: f64, psi: f64) -> Self {
        Self { x, y, psi }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.psi.is_finite()
    }
}

impl Waypoints {
    /// Number of waypoints.
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Transform world frame waypoints into the frame of a vehicle at `pose`.
///
/// Each point is translated by the negative vehicle position and then rotated by the negative
/// vehicle heading, i.e. the inverse of the vehicle to world isometry.
pub fn to_vehicle_frame(pose: &WorldPose, xs: &[f64], ys: &[f64]) -> Result<Waypoints, FrameError> {
    if xs.len() != ys.len() {
        return Err(FrameError::LengthMismatch(xs.len(), ys.len()));
    }

    if !pose.is_finite() || xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
        return Err(FrameError::NonFinite);
    }

    // Affine transform from the vehicle frame to the world frame
    let veh_to_world = Isometry2::from_parts(
        Translation2::new(pose.x, pose.y),
        UnitComplex::from_angle(pose.psi),
    );

    let (xs, ys): (Vec<f64>, Vec<f64>) = xs
        .iter()
        .zip(ys.iter())
        .map(|(&x, &y)| {
            let p = veh_to_world.inverse_transform_point(&Point2::new(x, y));
            (p.x, p.y)
        })
        .unzip();

    Ok(Waypoints { xs, ys })
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
