//! HMM models module
//!
//! Provides a discrete-observation HMM with Forward-Backward and Viterbi
//! algorithms, and a Gaussian mixture density.

mod algorithms;
mod gaussian;
mod gmm;
mod hmm;
mod viterbi;

pub use algorithms::{Evaluation, Trellis};
pub use gaussian::MultivariateGaussian;
pub use gmm::{GaussianMixture, GmmSnapshot};
pub use hmm::{DiscreteHMM, HMMParams, ModelSnapshot};
pub use viterbi::{viterbi, ViterbiPath};
