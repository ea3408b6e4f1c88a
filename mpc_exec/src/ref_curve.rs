//! # Reference curve
//!
//! A polynomial `y = f(x)` fitted through the waypoints in the vehicle frame. The curve is
//! regenerated every cycle and never modified once fitted.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Diagonal elements of R smaller than this fraction of the largest one mark the design matrix
/// as rank deficient.
const RANK_TOL: f64 = 1e-10;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Polynomial reference curve, coefficients stored lowest power first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceCurve {
    coeffs: Vec<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// How the desired heading is derived from the curve's slope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeadingErrorMode {
    /// `atan(f'(x))`
    Exact,

    /// `f'(x)`, only valid while the curve is close to the vehicle's heading.
    SmallAngle,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FitError {
    #[error("Station and value lists have different lengths ({0} x, {1} y)")]
    LengthMismatch(usize, usize),

    #[error("Cannot fit a degree {degree} polynomial through {points} points")]
    InvalidDegree { degree: usize, points: usize },

    #[error("The stations do not determine a unique polynomial (repeated stations?)")]
    Singular,

    #[error("The fit inputs or result contain a non-finite value")]
    NonFinite,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for HeadingErrorMode {
    fn default() -> Self {
        HeadingErrorMode::Exact
    }
}

impl ReferenceCurve {
    /// Build a curve directly from its coefficients, lowest power first.
    pub fn from_coeffs(coeffs: Vec<f64>) -> Self {
        Self { coeffs }
    }

    /// Least squares fit of a polynomial of the given degree through `(xs, ys)`.
    ///
    /// The Vandermonde system is solved with a Householder QR factorisation. Stations are scaled
    /// into [-1, 1] before the factorisation to keep the columns comparable in size.
    pub fn fit(xs: &[f64], ys: &[f64], degree: usize) -> Result<Self, FitError> {
        if xs.len() != ys.len() {
            return Err(FitError::LengthMismatch(xs.len(), ys.len()));
        }

        if degree < 1 || degree + 1 > xs.len() {
            return Err(FitError::InvalidDegree {
                degree,
                points: xs.len(),
            });
        }

        if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
            return Err(FitError::NonFinite);
        }

        let scale = xs.iter().fold(0f64, |m, x| m.max(x.abs()));
        let scale = if scale > 0.0 { scale } else { 1.0 };

        let num_cols = degree + 1;
        let a = DMatrix::from_fn(xs.len(), num_cols, |i, j| (xs[i] / scale).powi(j as i32));
        let b = DVector::from_column_slice(ys);

        let qr = a.qr();
        let r = qr.r();

        let max_diag = r.diagonal().iter().fold(0f64, |m, d| m.max(d.abs()));
        if max_diag == 0.0 || r.diagonal().iter().any(|d| d.abs() <= RANK_TOL * max_diag) {
            return Err(FitError::Singular);
        }

        let qtb = qr.q().transpose() * b;
        let scaled = r.solve_upper_triangular(&qtb).ok_or(FitError::Singular)?;

        let coeffs: Vec<f64> = scaled
            .iter()
            .enumerate()
            .map(|(k, c)| c / scale.powi(k as i32))
            .collect();

        if coeffs.iter().any(|c| !c.is_finite()) {
            return Err(FitError::NonFinite);
        }

        Ok(Self { coeffs })
    }

    /// Coefficients, lowest power first.
    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    /// Evaluate `f(x)`.
    pub fn eval(&self, x: f64) -> f64 {
        self.coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
    }

    /// Evaluate `f'(x)`.
    pub fn derivative(&self, x: f64) -> f64 {
        self.coeffs
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .fold(0.0, |acc, (k, c)| acc * x + (k as f64) * c)
    }

    /// Direction of the curve's tangent at `x`.
    pub fn desired_heading(&self, x: f64, mode: HeadingErrorMode) -> f64 {
        match mode {
            HeadingErrorMode::Exact => self.derivative(x).atan(),
            HeadingErrorMode::SmallAngle => self.derivative(x),
        }
    }

    /// Sample the curve at `x = 0, step, 2 step, ...` for display.
    pub fn sample(&self, step: f64, count: usize) -> (Vec<f64>, Vec<f64>) {
        (0..count)
            .map(|i| {
                let x = i as f64 * step;
                (x, self.eval(x))
            })
            .unzip()
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_eval_and_derivative() {
        // f(x) = 1 + 2x - x^2 + 0.5x^3
        let curve = ReferenceCurve::from_coeffs(vec![1.0, 2.0, -1.0, 0.5]);

        assert_eq!(curve.degree(), 3);
        assert_eq!(curve.eval(0.0), 1.0);
        assert_eq!(curve.eval(2.0), 1.0 + 4.0 - 4.0 + 4.0);
        assert_eq!(curve.derivative(0.0), 2.0);
        assert_eq!(curve.derivative(2.0), 2.0 - 4.0 + 6.0);
    }

    #[test]
    fn test_exact_interpolation() {
        let xs = [0.0, 25.0, 50.0, 80.0];
        let ys = [0.0, 2.0, 6.0, -3.0];

        let curve = ReferenceCurve::fit(&xs, &ys, 3).unwrap();

        for (x, y) in xs.iter().zip(ys.iter()) {
            assert!((curve.eval(*x) - y).abs() < 1e-8);
        }
    }

    #[test]
    fn test_least_squares_recovers_quadratic() {
        let xs: Vec<f64> = (0..8).map(|i| i as f64 * 10.0).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 0.5 - 0.1 * x + 0.002 * x * x).collect();

        let curve = ReferenceCurve::fit(&xs, &ys, 2).unwrap();

        assert!((curve.coeffs()[0] - 0.5).abs() < 1e-9);
        assert!((curve.coeffs()[1] + 0.1).abs() < 1e-9);
        assert!((curve.coeffs()[2] - 0.002).abs() < 1e-9);
    }

    #[test]
    fn test_fit_errors() {
        assert_eq!(
            ReferenceCurve::fit(&[0.0, 1.0], &[0.0], 1),
            Err(FitError::LengthMismatch(2, 1))
        );
        assert_eq!(
            ReferenceCurve::fit(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0], 3),
            Err(FitError::InvalidDegree {
                degree: 3,
                points: 3
            })
        );
        assert_eq!(
            ReferenceCurve::fit(&[0.0, 1.0], &[0.0, 1.0], 0),
            Err(FitError::InvalidDegree {
                degree: 0,
                points: 2
            })
        );
        assert_eq!(
            ReferenceCurve::fit(&[5.0, 5.0, 5.0], &[0.0, 1.0, 2.0], 2),
            Err(FitError::Singular)
        );
        assert_eq!(
            ReferenceCurve::fit(&[0.0, 1.0], &[0.0, std::f64::NAN], 1),
            Err(FitError::NonFinite)
        );
    }

    #[test]
    fn test_desired_heading() {
        let curve = ReferenceCurve::from_coeffs(vec![0.0, 1.0]);

        let heading = curve.desired_heading(3.0, HeadingErrorMode::Exact);
        assert!((heading - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
        assert_eq!(curve.desired_heading(3.0, HeadingErrorMode::SmallAngle), 1.0);
        assert_eq!(HeadingErrorMode::default(), HeadingErrorMode::Exact);
    }

    #[test]
    fn test_sample() {
        let curve = ReferenceCurve::from_coeffs(vec![1.0, 0.5]);
        let (xs, ys) = curve.sample(5.0, 20);

        assert_eq!(xs.len(), 20);
        assert_eq!(ys.len(), 20);
        assert_eq!(xs[0], 0.0);
        assert_eq!(xs[19], 95.0);
        assert_eq!(ys[2], 6.0);
    }
}
