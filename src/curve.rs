//! Piecewise-linear scalar function
//!
//! Used for the normalized fiber length dependence of the maintenance heat
//! rate. Outside the sampled range the function continues along the first or
//! last segment.

use serde::{Deserialize, Serialize};

use crate::error::{MetabolicsError, MetabolicsResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PiecewiseLinearFunction {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl PiecewiseLinearFunction {
    /// Build from matching x/y samples. x must be strictly increasing.
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> MetabolicsResult<Self> {
        let curve = Self { x, y };
        curve.validate()?;
        Ok(curve)
    }

    pub fn from_points(points: &[(f64, f64)]) -> MetabolicsResult<Self> {
        let (x, y) = points.iter().copied().unzip();
        Self::new(x, y)
    }

    /// Default maintenance heat multiplier: unity at optimal length, 0.5 at the extremes.
    pub fn default_maintenance_curve() -> Self {
        Self {
            x: vec![0.0, 0.5, 1.0, 1.5, 10.0],
            y: vec![0.5, 0.5, 1.0, 0.5, 0.5],
        }
    }

    /// Deserialised curves bypass `new`, so this runs again during probe validation.
    pub fn validate(&self) -> MetabolicsResult<()> {
        if self.x.is_empty() {
            return Err(MetabolicsError::configuration(
                "piecewise linear function needs at least one point",
            ));
        }
        if self.x.len() != self.y.len() {
            return Err(MetabolicsError::configuration(format!(
                "piecewise linear function has {} x values but {} y values",
                self.x.len(),
                self.y.len()
            )));
        }
        if self
            .x
            .iter()
            .chain(self.y.iter())
            .any(|value| !value.is_finite())
        {
            return Err(MetabolicsError::configuration(
                "piecewise linear function contains a non-finite point",
            ));
        }
        if self.y.iter().any(|&value| value < 0.0) {
            return Err(MetabolicsError::configuration(
                "piecewise linear function y values must not be negative",
            ));
        }
        if self.x.windows(2).any(|pair| pair[1] <= pair[0]) {
            return Err(MetabolicsError::configuration(
                "piecewise linear function x values must be strictly increasing",
            ));
        }
        Ok(())
    }

    pub fn evaluate(&self, at: f64) -> f64 {
        let n = self.x.len();
        match n {
            0 => return 0.0,
            1 => return self.y[0],
            _ => {}
        }

        // Segment index: the first segment below range, the last segment above range.
        let segment = if at <= self.x[0] {
            0
        } else if at >= self.x[n - 1] {
            n - 2
        } else {
            // partition_point returns the first x strictly greater than `at`
            self.x.partition_point(|&xi| xi <= at) - 1
        };

        let (x0, x1) = (self.x[segment], self.x[segment + 1]);
        let (y0, y1) = (self.y[segment], self.y[segment + 1]);
        let slope = (y1 - y0) / (x1 - x0);
        y0 + slope * (at - x0)
    }
}

impl Default for PiecewiseLinearFunction {
    fn default() -> Self {
        Self::default_maintenance_curve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_default_curve_samples() {
        let curve = PiecewiseLinearFunction::default_maintenance_curve();
        assert_abs_diff_eq!(curve.evaluate(1.0), 1.0);
        assert_abs_diff_eq!(curve.evaluate(0.5), 0.5);
        assert_abs_diff_eq!(curve.evaluate(1.5), 0.5);
        // Midway up the ascending limb
        assert_abs_diff_eq!(curve.evaluate(0.75), 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(curve.evaluate(1.25), 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_flat_tails_extrapolate_flat() {
        let curve = PiecewiseLinearFunction::default_maintenance_curve();
        assert_abs_diff_eq!(curve.evaluate(-1.0), 0.5);
        assert_abs_diff_eq!(curve.evaluate(20.0), 0.5);
    }

    #[test]
    fn test_sloped_extrapolation() {
        let curve = PiecewiseLinearFunction::from_points(&[(0.0, 0.0), (1.0, 2.0)]).unwrap();
        assert_abs_diff_eq!(curve.evaluate(2.0), 4.0);
        assert_abs_diff_eq!(curve.evaluate(-1.0), -2.0);
    }

    #[test]
    fn test_single_point_is_constant() {
        let curve = PiecewiseLinearFunction::from_points(&[(1.0, 0.8)]).unwrap();
        assert_abs_diff_eq!(curve.evaluate(-5.0), 0.8);
        assert_abs_diff_eq!(curve.evaluate(5.0), 0.8);
    }

    #[test]
    fn test_rejects_bad_points() {
        assert!(PiecewiseLinearFunction::new(vec![], vec![]).is_err());
        assert!(PiecewiseLinearFunction::new(vec![0.0, 1.0], vec![1.0]).is_err());
        assert!(PiecewiseLinearFunction::new(vec![1.0, 1.0], vec![0.0, 1.0]).is_err());
        assert!(PiecewiseLinearFunction::new(vec![0.0, f64::NAN], vec![0.0, 1.0]).is_err());
        assert!(PiecewiseLinearFunction::new(vec![0.0, 1.0], vec![1.0, -0.1]).is_err());
    }
}
