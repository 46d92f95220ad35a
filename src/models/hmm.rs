//! Discrete-observation Hidden Markov Model

use super::algorithms::Evaluation;
use super::viterbi::{viterbi, ViterbiPath};
use crate::config::Scaling;
use crate::error::{HmmError, Result};
use colored::Colorize;
use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tolerance on row sums when validating explicit parameters
const ROW_SUM_TOLERANCE: f64 = 1e-6;

/// HMM parameters
#[derive(Debug, Clone, PartialEq)]
pub struct HMMParams {
    /// Number of hidden states
    pub n_states: usize,
    /// Size of the observation alphabet
    pub n_symbols: usize,
    /// Initial state probabilities (N)
    pub initial_probs: Array1<f64>,
    /// State transition matrix (N x N), row = from state
    pub transition_matrix: Array2<f64>,
    /// Emission matrix (N x K), row = state, column = symbol
    pub emission_matrix: Array2<f64>,
}

impl HMMParams {
    /// Uniform priors, transitions and emissions
    pub fn uniform(n_states: usize, n_symbols: usize) -> Result<Self> {
        check_counts(n_states, n_symbols)?;
        Ok(Self {
            n_states,
            n_symbols,
            initial_probs: Array1::from_elem(n_states, 1.0 / n_states as f64),
            transition_matrix: Array2::from_elem((n_states, n_states), 1.0 / n_states as f64),
            emission_matrix: Array2::from_elem((n_states, n_symbols), 1.0 / n_symbols as f64),
        })
    }

    /// Random row-normalized parameters, useful to break the symmetry of a uniform start
    pub fn random<R: Rng + ?Sized>(n_states: usize, n_symbols: usize, rng: &mut R) -> Result<Self> {
        check_counts(n_states, n_symbols)?;

        let mut initial_probs = Array1::from_shape_fn(n_states, |_| rng.gen::<f64>() + 0.1);
        let sum = initial_probs.sum();
        initial_probs /= sum;

        let mut transition_matrix =
            Array2::from_shape_fn((n_states, n_states), |_| rng.gen::<f64>() + 0.1);
        normalize_rows(&mut transition_matrix);

        let mut emission_matrix =
            Array2::from_shape_fn((n_states, n_symbols), |_| rng.gen::<f64>() + 0.1);
        normalize_rows(&mut emission_matrix);

        Ok(Self {
            n_states,
            n_symbols,
            initial_probs,
            transition_matrix,
            emission_matrix,
        })
    }

    /// Explicit parameters, validated for shape and stochasticity
    pub fn new(
        initial_probs: Array1<f64>,
        transition_matrix: Array2<f64>,
        emission_matrix: Array2<f64>,
    ) -> Result<Self> {
        let params = Self {
            n_states: initial_probs.len(),
            n_symbols: emission_matrix.ncols(),
            initial_probs,
            transition_matrix,
            emission_matrix,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check shapes, entry ranges and row sums
    pub fn validate(&self) -> Result<()> {
        self.check_shape()?;

        check_distribution(self.initial_probs.view(), "priors")?;
        for (i, row) in self.transition_matrix.rows().into_iter().enumerate() {
            check_distribution(row, &format!("transition row {}", i))?;
        }
        for (i, row) in self.emission_matrix.rows().into_iter().enumerate() {
            check_distribution(row, &format!("emission row {}", i))?;
        }
        Ok(())
    }

    /// Check that the array shapes agree with `n_states` and `n_symbols`
    pub fn check_shape(&self) -> Result<()> {
        check_counts(self.n_states, self.n_symbols)?;
        let n = self.n_states;

        if self.initial_probs.len() != n {
            return Err(HmmError::invalid(format!(
                "expected {} priors, got {}",
                n,
                self.initial_probs.len()
            )));
        }
        if self.transition_matrix.dim() != (n, n) {
            return Err(HmmError::invalid(format!(
                "transition matrix must be {}x{}, got {:?}",
                n,
                n,
                self.transition_matrix.dim()
            )));
        }
        if self.emission_matrix.dim() != (n, self.n_symbols) {
            return Err(HmmError::invalid(format!(
                "emission matrix must be {}x{}, got {:?}",
                n,
                self.n_symbols,
                self.emission_matrix.dim()
            )));
        }
        Ok(())
    }

    /// Check that every symbol is inside the alphabet
    pub fn check_observations(&self, observations: &[usize]) -> Result<()> {
        if let Some((t, &symbol)) = observations
            .iter()
            .enumerate()
            .find(|(_, &symbol)| symbol >= self.n_symbols)
        {
            return Err(HmmError::invalid(format!(
                "observation {} at position {} is outside the alphabet of {} symbols",
                symbol, t, self.n_symbols
            )));
        }
        Ok(())
    }
}

fn check_counts(n_states: usize, n_symbols: usize) -> Result<()> {
    if n_states == 0 {
        return Err(HmmError::invalid("number of states must be positive"));
    }
    if n_symbols == 0 {
        return Err(HmmError::invalid("number of observation symbols must be positive"));
    }
    Ok(())
}

fn check_distribution(probs: ArrayView1<f64>, name: &str) -> Result<()> {
    if probs.iter().any(|p| !p.is_finite() || *p < 0.0 || *p > 1.0) {
        return Err(HmmError::invalid(format!(
            "{} contains values outside [0, 1]",
            name
        )));
    }
    let sum = probs.sum();
    if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
        return Err(HmmError::invalid(format!(
            "{} sums to {}, expected 1",
            name, sum
        )));
    }
    Ok(())
}

fn normalize_rows(matrix: &mut Array2<f64>) {
    for mut row in matrix.rows_mut() {
        let sum = row.sum();
        row /= sum;
    }
}

/// Discrete Hidden Markov Model
#[derive(Debug, Clone)]
pub struct DiscreteHMM {
    params: HMMParams,
}

impl DiscreteHMM {
    /// Uniformly initialized model
    pub fn new(n_states: usize, n_symbols: usize) -> Result<Self> {
        Ok(Self {
            params: HMMParams::uniform(n_states, n_symbols)?,
        })
    }

    /// Create with specified parameters
    pub fn with_params(params: HMMParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Create from nested vectors (priors, transition rows, emission rows)
    pub fn from_parts(
        priors: Vec<f64>,
        transitions: Vec<Vec<f64>>,
        emissions: Vec<Vec<f64>>,
    ) -> Result<Self> {
        let params = HMMParams::new(
            Array1::from(priors),
            rows_to_array(transitions, "transition")?,
            rows_to_array(emissions, "emission")?,
        )?;
        Ok(Self { params })
    }

    /// Number of states
    pub fn n_states(&self) -> usize {
        self.params.n_states
    }

    /// Size of the observation alphabet
    pub fn n_symbols(&self) -> usize {
        self.params.n_symbols
    }

    /// Read-only view of all parameters
    pub fn params(&self) -> &HMMParams {
        &self.params
    }

    pub(crate) fn params_mut(&mut self) -> &mut HMMParams {
        &mut self.params
    }

    /// Initial state probabilities
    pub fn initial_probs(&self) -> &Array1<f64> {
        &self.params.initial_probs
    }

    /// Get the transition matrix
    pub fn transition_matrix(&self) -> &Array2<f64> {
        &self.params.transition_matrix
    }

    /// Get the emission matrix
    pub fn emission_matrix(&self) -> &Array2<f64> {
        &self.params.emission_matrix
    }

    /// Forward/backward evaluation of a sequence with raw (unscaled) probabilities
    pub fn evaluate<'a>(&'a self, observations: &'a [usize]) -> Result<Evaluation<'a>> {
        Evaluation::new(&self.params, observations, Scaling::None)
    }

    /// Forward/backward evaluation with an explicit scaling mode
    pub fn evaluate_with<'a>(
        &'a self,
        observations: &'a [usize],
        scaling: Scaling,
    ) -> Result<Evaluation<'a>> {
        Evaluation::new(&self.params, observations, scaling)
    }

    /// `ln P(observations | model)`
    ///
    /// Computed with per-step scaling, so it stays finite for long sequences.
    /// Returns negative infinity for sequences the model cannot produce.
    pub fn sequence_log_likelihood(&self, observations: &[usize]) -> Result<f64> {
        Ok(self
            .evaluate_with(observations, Scaling::PerStep)?
            .log_likelihood())
    }

    /// Prior probability of a state path, ignoring observations
    pub fn state_sequence_probability(&self, states: &[usize]) -> Result<f64> {
        let Some(&first) = states.first() else {
            return Err(HmmError::invalid("state sequence is empty"));
        };
        if let Some(&bad) = states.iter().find(|&&s| s >= self.params.n_states) {
            return Err(HmmError::invalid(format!(
                "state {} out of range (model has {})",
                bad, self.params.n_states
            )));
        }

        let probability = states
            .windows(2)
            .map(|w| self.params.transition_matrix[[w[0], w[1]]])
            .product::<f64>()
            * self.params.initial_probs[first];
        Ok(probability)
    }

    /// Most likely state sequence (Viterbi)
    pub fn decode(&self, observations: &[usize]) -> Result<ViterbiPath> {
        viterbi(&self.params, observations)
    }

    /// Sample a (states, observations) pair of the given length
    pub fn sample<R: Rng + ?Sized>(&self, length: usize, rng: &mut R) -> (Vec<usize>, Vec<usize>) {
        let mut states = Vec::with_capacity(length);
        let mut observations = Vec::with_capacity(length);

        for t in 0..length {
            let state = if t == 0 {
                sample_discrete(self.params.initial_probs.view(), rng)
            } else {
                let previous = states[t - 1];
                sample_discrete(self.params.transition_matrix.row(previous), rng)
            };
            states.push(state);
            observations.push(sample_discrete(self.params.emission_matrix.row(state), rng));
        }

        (states, observations)
    }

    /// Immutable copy of the parameters in plain-data form
    pub fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            priors: self.params.initial_probs.to_vec(),
            transitions: array_to_rows(&self.params.transition_matrix),
            emissions: array_to_rows(&self.params.emission_matrix),
        }
    }

    /// Save the model as JSON
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Load a model saved with [`DiscreteHMM::save_json`]
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let snapshot: ModelSnapshot = serde_json::from_str(&text)?;
        Self::try_from(snapshot)
    }

    /// Print priors, transitions and emissions
    pub fn print_parameters(&self) {
        println!("\n{}", "Prior probabilities:".bold());
        print!("  ");
        for p in self.params.initial_probs.iter() {
            print!("{:.4}  ", p);
        }
        println!();

        println!("\n{}", "Transition matrix:".bold());
        for (i, row) in self.params.transition_matrix.rows().into_iter().enumerate() {
            print!("  State {}: ", i);
            for p in row.iter() {
                print!("{:.4}  ", p);
            }
            println!();
        }

        println!("\n{}", "Emission matrix:".bold());
        for (i, row) in self.params.emission_matrix.rows().into_iter().enumerate() {
            print!("  State {}: ", i);
            for p in row.iter() {
                print!("{:.4}  ", p);
            }
            println!();
        }
    }
}

/// Plain-data form of a [`DiscreteHMM`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub priors: Vec<f64>,
    pub transitions: Vec<Vec<f64>>,
    pub emissions: Vec<Vec<f64>>,
}

impl TryFrom<ModelSnapshot> for DiscreteHMM {
    type Error = HmmError;

    fn try_from(snapshot: ModelSnapshot) -> Result<Self> {
        Self::from_parts(snapshot.priors, snapshot.transitions, snapshot.emissions)
    }
}

fn rows_to_array(rows: Vec<Vec<f64>>, name: &str) -> Result<Array2<f64>> {
    let n_rows = rows.len();
    let n_cols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|row| row.len() != n_cols) {
        return Err(HmmError::invalid(format!("{} rows have unequal lengths", name)));
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((n_rows, n_cols), flat)
        .map_err(|e| HmmError::invalid(format!("{} matrix: {}", name, e)))
}

fn array_to_rows(matrix: &Array2<f64>) -> Vec<Vec<f64>> {
    matrix.rows().into_iter().map(|row| row.to_vec()).collect()
}

/// Sample from discrete distribution
fn sample_discrete<R: Rng + ?Sized>(probs: ArrayView1<f64>, rng: &mut R) -> usize {
    let u: f64 = rng.gen();
    let mut cumsum = 0.0;
    for (i, &p) in probs.iter().enumerate() {
        cumsum += p;
        if u < cumsum {
            return i;
        }
    }
    probs.len() - 1
}
