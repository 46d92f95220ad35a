//! Gaussian mixture model density

use super::gaussian::MultivariateGaussian;
use crate::error::{HmmError, Result};
use colored::Colorize;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Weighted mixture of multivariate Gaussians sharing one dimension
#[derive(Debug, Clone)]
pub struct GaussianMixture {
    dim: usize,
    priors: Vec<f64>,
    components: Vec<MultivariateGaussian>,
}

impl GaussianMixture {
    /// Single component with weight 1
    pub fn single(mean: Array1<f64>, covariance: Array2<f64>) -> Result<Self> {
        let component = MultivariateGaussian::new(mean, covariance)?;
        Ok(Self {
            dim: component.dim(),
            priors: vec![1.0],
            components: vec![component],
        })
    }

    /// `n_components` zero-initialized components (zero weights, means and covariances)
    pub fn zeros(dim: usize, n_components: usize) -> Result<Self> {
        if n_components == 0 {
            return Err(HmmError::invalid("mixture needs at least one component"));
        }
        let components = (0..n_components)
            .map(|_| MultivariateGaussian::zeros(dim))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            dim,
            priors: vec![0.0; n_components],
            components,
        })
    }

    /// Number of mixture components
    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    /// Data dimension
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Mixture weights
    pub fn priors(&self) -> &[f64] {
        &self.priors
    }

    /// Component `k`, if it exists
    pub fn component(&self, k: usize) -> Option<&MultivariateGaussian> {
        self.components.get(k)
    }

    pub fn set_prior(&mut self, k: usize, weight: f64) -> Result<()> {
        self.check_component(k)?;
        if !(0.0..=1.0).contains(&weight) {
            return Err(HmmError::invalid(format!(
                "mixture weight must be in [0, 1], got {}",
                weight
            )));
        }
        self.priors[k] = weight;
        Ok(())
    }

    pub fn set_mean(&mut self, k: usize, mean: Array1<f64>) -> Result<()> {
        self.check_component(k)?;
        if mean.len() != self.dim {
            return Err(HmmError::invalid(format!(
                "mean has dimension {}, mixture has {}",
                mean.len(),
                self.dim
            )));
        }
        self.components[k].mean = mean;
        Ok(())
    }

    pub fn set_covariance(&mut self, k: usize, covariance: Array2<f64>) -> Result<()> {
        self.check_component(k)?;
        if covariance.dim() != (self.dim, self.dim) {
            return Err(HmmError::invalid(format!(
                "covariance is {}x{}, mixture dimension is {}",
                covariance.nrows(),
                covariance.ncols(),
                self.dim
            )));
        }
        self.components[k].covariance = covariance;
        Ok(())
    }

    /// Density of `x` under component `k` alone
    pub fn component_density(&self, x: &Array1<f64>, k: usize) -> Result<f64> {
        self.check_component(k)?;
        self.components[k].pdf(x).map_err(|e| {
            if let HmmError::SingularCovariance { determinant } = e {
                tracing::warn!(
                    "Component {} has a singular covariance (det = {})",
                    k,
                    determinant
                );
            }
            e
        })
    }

    /// Weighted mixture density `sum_k prior_k * N(x; mean_k, cov_k)`
    pub fn mixture_density(&self, x: &Array1<f64>) -> Result<f64> {
        let mut density = 0.0;
        for (k, prior) in self.priors.iter().enumerate() {
            density += prior * self.component_density(x, k)?;
        }
        Ok(density)
    }

    /// Serializable copy of the parameters
    pub fn snapshot(&self) -> GmmSnapshot {
        GmmSnapshot {
            priors: self.priors.clone(),
            means: self.components.iter().map(|c| c.mean.to_vec()).collect(),
            covariances: self
                .components
                .iter()
                .map(|c| {
                    c.covariance
                        .rows()
                        .into_iter()
                        .map(|r| r.to_vec())
                        .collect::<Vec<_>>()
                })
                .collect(),
        }
    }

    /// Load from a JSON snapshot file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let snapshot: GmmSnapshot = serde_json::from_str(&text)?;
        Self::try_from(snapshot)
    }

    /// Save as a JSON snapshot file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Print the parameters of one component
    pub fn print_parameters(&self, k: usize) {
        let Some(component) = self.components.get(k) else {
            return;
        };
        println!("{}", format!("Parameters for component {}", k).bold());
        println!("  Prior: {:.4}", self.priors[k]);
        println!("  Mean: {:?}", component.mean.to_vec());
        println!("  Covariance:");
        for row in component.covariance.rows() {
            println!("    {:?}", row.to_vec());
        }
    }

    fn check_component(&self, k: usize) -> Result<()> {
        if k >= self.components.len() {
            return Err(HmmError::invalid(format!(
                "component {} out of range (mixture has {})",
                k,
                self.components.len()
            )));
        }
        Ok(())
    }
}

/// Plain-data form of a [`GaussianMixture`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmmSnapshot {
    pub priors: Vec<f64>,
    pub means: Vec<Vec<f64>>,
    pub covariances: Vec<Vec<Vec<f64>>>,
}

impl TryFrom<GmmSnapshot> for GaussianMixture {
    type Error = HmmError;

    fn try_from(snapshot: GmmSnapshot) -> Result<Self> {
        let n = snapshot.priors.len();
        if n == 0 || snapshot.means.len() != n || snapshot.covariances.len() != n {
            return Err(HmmError::invalid(format!(
                "snapshot has {} priors, {} means and {} covariances",
                n,
                snapshot.means.len(),
                snapshot.covariances.len()
            )));
        }

        let dim = snapshot.means[0].len();
        let mut mixture = Self::zeros(dim, n)?;
        for (k, ((prior, mean), cov)) in snapshot
            .priors
            .into_iter()
            .zip(snapshot.means)
            .zip(snapshot.covariances)
            .enumerate()
        {
            let rows = cov.len();
            if cov.iter().any(|row| row.len() != dim) {
                return Err(HmmError::invalid(format!(
                    "covariance {} has rows of the wrong length",
                    k
                )));
            }
            let flat: Vec<f64> = cov.into_iter().flatten().collect();
            let covariance = Array2::from_shape_vec((rows, dim), flat).map_err(|_| {
                HmmError::invalid(format!("covariance {} is not a {}x{} matrix", k, dim, dim))
            })?;
            mixture.set_prior(k, prior)?;
            mixture.set_mean(k, Array1::from(mean))?;
            mixture.set_covariance(k, covariance)?;
        }
        Ok(mixture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_single_component() {
        let gmm = GaussianMixture::single(array![0.0, 0.0], Array2::eye(2)).unwrap();
        assert_eq!(gmm.n_components(), 1);
        assert_eq!(gmm.dim(), 2);

        let x = array![0.3, -0.2];
        let mixture = gmm.mixture_density(&x).unwrap();
        let component = gmm.component_density(&x, 0).unwrap();
        assert!((mixture - component).abs() < 1e-15);
    }

    #[test]
    fn test_single_rejects_mismatched_shapes() {
        assert!(GaussianMixture::single(array![0.0, 0.0], Array2::eye(3)).is_err());
    }

    #[test]
    fn test_weighted_mixture() {
        let mut gmm = GaussianMixture::zeros(1, 2).unwrap();
        gmm.set_prior(0, 0.3).unwrap();
        gmm.set_mean(0, array![0.0]).unwrap();
        gmm.set_covariance(0, array![[1.0]]).unwrap();
        gmm.set_prior(1, 0.7).unwrap();
        gmm.set_mean(1, array![2.0]).unwrap();
        gmm.set_covariance(1, array![[4.0]]).unwrap();

        let density = gmm.mixture_density(&array![1.0]).unwrap();
        assert!((density - 0.19581408172324782).abs() < 1e-12);
    }

    #[test]
    fn test_zero_initialized_is_singular() {
        let gmm = GaussianMixture::zeros(2, 3).unwrap();
        assert!(matches!(
            gmm.mixture_density(&array![0.0, 0.0]),
            Err(HmmError::SingularCovariance { .. })
        ));
        // Failed queries leave the parameters alone
        assert_eq!(gmm.component(1).unwrap().covariance, Array2::<f64>::zeros((2, 2)));
    }

    #[test]
    fn test_setter_validation() {
        let mut gmm = GaussianMixture::zeros(2, 1).unwrap();
        assert!(gmm.set_mean(0, array![1.0]).is_err());
        assert!(gmm.set_covariance(0, Array2::eye(3)).is_err());
        assert!(gmm.set_prior(1, 0.5).is_err());
        assert!(gmm.set_prior(0, 1.5).is_err());
        assert!(GaussianMixture::zeros(2, 0).is_err());
        assert!(GaussianMixture::zeros(0, 2).is_err());
    }

    #[test]
    fn test_snapshot_conversion() {
        let gmm = GaussianMixture::single(array![1.0, 2.0], array![[2.0, 0.5], [0.5, 1.0]])
            .unwrap();
        let restored = GaussianMixture::try_from(gmm.snapshot()).unwrap();
        assert_eq!(restored.component(0), gmm.component(0));
        assert_eq!(restored.priors(), &[1.0]);
    }
}
