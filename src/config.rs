//! Training configuration

use crate::error::{HmmError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How forward/backward tables are kept within floating-point range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scaling {
    /// Raw joint probabilities; underflows on long sequences
    None,
    /// Each forward column is normalized by its sum, backward columns share the same factors
    #[default]
    PerStep,
}

/// Baum-Welch trainer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Minimum log-likelihood improvement to keep iterating
    pub tolerance: f64,
    /// Hard cap on EM iterations
    pub max_iterations: usize,
    /// Forward/backward scaling mode
    pub scaling: Scaling,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 100,
            scaling: Scaling::PerStep,
        }
    }
}

impl TrainerConfig {
    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set convergence tolerance
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set iteration cap
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set scaling mode
    pub fn with_scaling(mut self, scaling: Scaling) -> Self {
        self.scaling = scaling;
        self
    }

    /// Check that the values are usable
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(HmmError::invalid(format!(
                "tolerance must be a finite non-negative number, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(HmmError::invalid("max_iterations must be at least 1"));
        }
        Ok(())
    }
}
