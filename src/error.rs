//! Error types for the HMM toolkit

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, HmmError>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum HmmError {
    /// Bad construction parameters, sequence lengths or dimensions
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Matrix has a zero determinant and cannot be inverted
    #[error("Matrix is singular")]
    SingularMatrix,

    /// Covariance matrix is not invertible (or not positive definite)
    #[error("Singular covariance matrix (determinant = {determinant})")]
    SingularCovariance { determinant: f64 },

    /// Posterior mass collapsed to zero
    #[error("Degenerate model: {0}")]
    Degenerate(String),

    /// Unscaled probabilities fell below the floating-point range
    #[error("Numeric underflow: {0}")]
    NumericUnderflow(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reading/writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl HmmError {
    /// Shorthand for an `InvalidInput` error
    pub fn invalid(msg: impl Into<String>) -> Self {
        HmmError::InvalidInput(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HmmError::SingularCovariance { determinant: 0.0 };
        assert_eq!(
            err.to_string(),
            "Singular covariance matrix (determinant = 0)"
        );

        let err = HmmError::invalid("sequence too short");
        assert_eq!(err.to_string(), "Invalid input: sequence too short");
        assert!(matches!(err, HmmError::InvalidInput(_)));
    }
}
