//! Adaptive damping for the Levenberg-Marquardt iteration

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Damping factor adjusted from the quality of each step.
///
/// `rho` is the ratio of the actual cost reduction to the reduction predicted by the linearised
/// model. Good agreement lets the iteration move towards Gauss-Newton, poor agreement moves it
/// towards small gradient descent steps.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AdaptiveDamping {
    lambda: f64,
    factor: f64,
    min_lambda: f64,
    max_lambda: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for AdaptiveDamping {
    fn default() -> Self {
        Self {
            lambda: 1e-3,
            factor: 10.0,
            min_lambda: 1e-7,
            max_lambda: 1e7,
        }
    }
}

impl AdaptiveDamping {
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Update the damping after an accepted step.
    pub fn update(&mut self, rho: f64) {
        if rho > 0.75 {
            self.lambda = (self.lambda / self.factor).max(self.min_lambda);
        } else if rho > 0.25 {
            self.lambda = (self.lambda / self.factor.sqrt()).max(self.min_lambda);
        } else if rho < 0.0 {
            self.lambda = (self.lambda * self.factor).min(self.max_lambda);
        }
    }

    /// Increase the damping after a rejected step.
    pub fn reject_step(&mut self) {
        self.lambda = (self.lambda * self.factor).min(self.max_lambda);
    }

    /// True once the damping has saturated, further steps will not make progress.
    pub fn is_stuck(&self) -> bool {
        self.lambda >= self.max_lambda * 0.99
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_damping_updates() {
        let mut d = AdaptiveDamping::default();

        d.update(0.9);
        assert!((d.lambda() - 1e-4).abs() < 1e-18);

        d.update(0.1);
        assert!((d.lambda() - 1e-4).abs() < 1e-18);

        d.reject_step();
        assert!((d.lambda() - 1e-3).abs() < 1e-15);

        for _ in 0..20 {
            d.reject_step();
        }
        assert!(d.is_stuck());

        for _ in 0..40 {
            d.update(1.0);
        }
        assert!((d.lambda() - 1e-7).abs() < 1e-20);
    }
}
