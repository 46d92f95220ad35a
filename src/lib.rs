//! # HMM Toolkit
//!
//! Discrete-observation Hidden Markov Models fitted with the Baum-Welch (EM)
//! algorithm, decoded with Viterbi, plus a Gaussian mixture density for
//! continuous-valued observations.
//!
//! ## Features
//!
//! - Forward/backward tables with optional per-step scaling
//! - State and transition posteriors (gamma, xi)
//! - Baum-Welch training with convergence reporting
//! - Viterbi most-likely state path
//! - Multivariate Gaussian mixtures with cofactor-based linear algebra
//!
//! ## Quick Start
//!
//! ```rust
//! use hmm_toolkit::{BaumWelchTrainer, DiscreteHMM};
//!
//! let mut hmm = DiscreteHMM::from_parts(
//!     vec![0.5, 0.5],
//!     vec![vec![0.5, 0.5], vec![0.5, 0.5]],
//!     vec![vec![0.6, 0.4], vec![0.4, 0.6]],
//! )?;
//! let report = BaumWelchTrainer::default().train(&mut hmm, &[0, 1, 0, 1, 0, 1])?;
//! assert!(report.converged());
//!
//! let path = hmm.decode(&[0, 1, 0])?;
//! assert_eq!(path.states.len(), 3);
//! # Ok::<(), hmm_toolkit::HmmError>(())
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod linalg;
pub mod models;
pub mod training;

pub use config::{Scaling, TrainerConfig};
pub use data::ObservationSequence;
pub use error::{HmmError, Result};
pub use models::{
    DiscreteHMM, Evaluation, GaussianMixture, HMMParams, ModelSnapshot, MultivariateGaussian,
    ViterbiPath,
};
pub use training::{BaumWelchTrainer, TrainingReport, TrainingStatus};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Scaling, TrainerConfig};
    pub use crate::data::ObservationSequence;
    pub use crate::error::{HmmError, Result};
    pub use crate::models::{
        DiscreteHMM, Evaluation, GaussianMixture, HMMParams, MultivariateGaussian, ViterbiPath,
    };
    pub use crate::training::{BaumWelchTrainer, TrainingReport, TrainingStatus};
}
