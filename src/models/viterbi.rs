//! Viterbi decoding - most likely state sequence

use super::hmm::HMMParams;
use crate::error::{HmmError, Result};
use ndarray::Array2;

/// Decoded state path and its joint probability with the observations
#[derive(Debug, Clone, PartialEq)]
pub struct ViterbiPath {
    /// One state per observation
    pub states: Vec<usize>,
    /// `ln P(states, observations | model)`; negative infinity when the observations are impossible
    pub log_probability: f64,
    /// `P(states, observations | model)`, which underflows to zero on long sequences
    pub probability: f64,
}

impl ViterbiPath {
    /// True when the model cannot produce the observations at all
    pub fn is_impossible(&self) -> bool {
        self.log_probability == f64::NEG_INFINITY
    }
}

/// Viterbi algorithm - finds most likely state sequence
///
/// Runs in the log domain so long sequences do not underflow. Zero
/// probabilities map to negative infinity and ties go to the lowest state index.
///
/// # Arguments
/// * `params` - Model parameters
/// * `observations` - Symbol indices (length >= 1)
pub fn viterbi(params: &HMMParams, observations: &[usize]) -> Result<ViterbiPath> {
    if observations.is_empty() {
        return Err(HmmError::invalid("cannot decode an empty observation sequence"));
    }
    params.check_shape()?;
    params.check_observations(observations)?;

    let t_len = observations.len();
    let n = params.n_states;

    let log_initial = params.initial_probs.mapv(f64::ln);
    let log_trans = params.transition_matrix.mapv(f64::ln);
    let log_emit = params.emission_matrix.mapv(f64::ln);

    // Delta: best path log probability ending in state j at time t
    let mut delta = Array2::<f64>::zeros((n, t_len));
    // Psi: backpointers for path reconstruction
    let mut psi = Array2::<usize>::zeros((n, t_len));

    // Initialization (t = 0)
    for j in 0..n {
        delta[[j, 0]] = log_initial[j] + log_emit[[j, observations[0]]];
    }

    // Recursion
    for t in 1..t_len {
        for j in 0..n {
            let mut best_val = f64::NEG_INFINITY;
            let mut best_state = 0;

            for i in 0..n {
                let val = delta[[i, t - 1]] + log_trans[[i, j]];
                if val > best_val {
                    best_val = val;
                    best_state = i;
                }
            }

            delta[[j, t]] = best_val + log_emit[[j, observations[t]]];
            psi[[j, t]] = best_state;
        }
    }

    // Termination
    let mut best_final_state = 0;
    let mut best_final_log = f64::NEG_INFINITY;
    for j in 0..n {
        if delta[[j, t_len - 1]] > best_final_log {
            best_final_log = delta[[j, t_len - 1]];
            best_final_state = j;
        }
    }

    // Backtracking
    let mut states = vec![0; t_len];
    states[t_len - 1] = best_final_state;
    for t in (0..t_len - 1).rev() {
        states[t] = psi[[states[t + 1], t + 1]];
    }

    Ok(ViterbiPath {
        states,
        log_probability: best_final_log,
        probability: best_final_log.exp(),
    })
}
