//! Multivariate Gaussian distribution used as a mixture component

use crate::error::{HmmError, Result};
use crate::linalg::{determinant, mahalanobis_distance};
use ndarray::{Array1, Array2};
use std::f64::consts::PI;

/// Multivariate Gaussian distribution
#[derive(Debug, Clone, PartialEq)]
pub struct MultivariateGaussian {
    /// Mean vector
    pub mean: Array1<f64>,
    /// Covariance matrix
    pub covariance: Array2<f64>,
}

impl MultivariateGaussian {
    /// Create new multivariate Gaussian, checking that the shapes agree
    pub fn new(mean: Array1<f64>, covariance: Array2<f64>) -> Result<Self> {
        let d = mean.len();
        if d == 0 {
            return Err(HmmError::invalid("Gaussian dimension must be positive"));
        }
        if covariance.dim() != (d, d) {
            return Err(HmmError::invalid(format!(
                "size of mean ({}) and covariance ({}x{}) do not agree",
                d,
                covariance.nrows(),
                covariance.ncols()
            )));
        }
        Ok(Self { mean, covariance })
    }

    /// Zero mean and zero covariance, awaiting parameters
    pub fn zeros(dim: usize) -> Result<Self> {
        Self::new(Array1::zeros(dim), Array2::zeros((dim, dim)))
    }

    /// Create with identity covariance
    pub fn with_identity(mean: Array1<f64>) -> Result<Self> {
        let d = mean.len();
        Self::new(mean, Array2::eye(d))
    }

    /// Dimension of the distribution
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Squared Mahalanobis distance of `x` from the mean
    pub fn mahalanobis(&self, x: &Array1<f64>) -> Result<f64> {
        self.check_point(x)?;
        mahalanobis_distance(x, &self.mean, &self.covariance)
    }

    /// Probability density at a point
    ///
    /// `(2π)^(-d/2) |Σ|^(-1/2) exp(-0.5 (x-μ)' Σ^-1 (x-μ))`
    pub fn pdf(&self, x: &Array1<f64>) -> Result<f64> {
        self.check_point(x)?;

        let det = determinant(&self.covariance)?;
        if det <= 0.0 || !det.is_finite() {
            return Err(HmmError::SingularCovariance { determinant: det });
        }

        let d = self.dim() as f64;
        let normalization = 1.0 / ((2.0 * PI).powf(d / 2.0) * det.sqrt());
        let exponent = -0.5 * mahalanobis_distance(x, &self.mean, &self.covariance)?;

        Ok(normalization * exponent.exp())
    }

    /// Log probability density at a point
    ///
    /// Stays finite far from the mean, where [`pdf`](Self::pdf) underflows to zero.
    pub fn log_pdf(&self, x: &Array1<f64>) -> Result<f64> {
        self.check_point(x)?;

        let det = determinant(&self.covariance)?;
        if det <= 0.0 || !det.is_finite() {
            return Err(HmmError::SingularCovariance { determinant: det });
        }

        let d = self.dim() as f64;
        let distance = mahalanobis_distance(x, &self.mean, &self.covariance)?;
        Ok(-0.5 * (d * (2.0 * PI).ln() + det.ln() + distance))
    }

    fn check_point(&self, x: &Array1<f64>) -> Result<()> {
        if x.len() != self.dim() {
            return Err(HmmError::invalid(format!(
                "point has dimension {}, distribution has {}",
                x.len(),
                self.dim()
            )));
        }
        Ok(())
    }
}
