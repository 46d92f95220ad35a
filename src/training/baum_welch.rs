//! Baum-Welch (EM) training for discrete HMMs

use crate::config::{Scaling, TrainerConfig};
use crate::error::{HmmError, Result};
use crate::models::{DiscreteHMM, Evaluation, HMMParams, Trellis};
use colored::Colorize;
use ndarray::{Array2, Array3};
use std::fmt;

/// Trainer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingStatus {
    Initialized,
    Iterating,
    /// Log-likelihood improvement dropped below the tolerance
    Converged,
    /// Stopped by the iteration cap
    IterationLimitReached,
}

impl fmt::Display for TrainingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingStatus::Initialized => write!(f, "Initialized"),
            TrainingStatus::Iterating => write!(f, "Iterating"),
            TrainingStatus::Converged => write!(f, "Converged"),
            TrainingStatus::IterationLimitReached => write!(f, "Iteration limit reached"),
        }
    }
}

/// Which parameter row an M-step update had to skip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    Transition,
    Emission,
}

/// A state with zero posterior mass whose parameters were left unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DegenerateUpdate {
    pub iteration: usize,
    pub state: usize,
    pub parameter: ParameterKind,
}

/// Log-likelihood after one EM iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationRecord {
    pub iteration: usize,
    pub log_likelihood: f64,
}

/// Outcome of a training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub status: TrainingStatus,
    /// Number of EM iterations performed
    pub iterations: usize,
    /// Log-likelihood of the starting parameters
    pub initial_log_likelihood: f64,
    /// Log-likelihood of the final parameters
    pub log_likelihood: f64,
    pub history: Vec<IterationRecord>,
    pub degenerate_updates: Vec<DegenerateUpdate>,
}

impl TrainingReport {
    /// True if training stopped on the tolerance rather than the cap
    pub fn converged(&self) -> bool {
        self.status == TrainingStatus::Converged
    }

    /// Print a training summary
    pub fn print_summary(&self) {
        println!("\n{}", "=== Training Summary ===".bold());
        let status = match self.status {
            TrainingStatus::Converged => self.status.to_string().green(),
            _ => self.status.to_string().yellow(),
        };
        println!("  Status: {}", status);
        println!("  Iterations: {}", self.iterations);
        println!("  Initial log-likelihood: {:.6}", self.initial_log_likelihood);
        println!("  Final log-likelihood: {:.6}", self.log_likelihood);

        if !self.history.is_empty() {
            println!("\n  Iteration  Log-likelihood");
            for record in &self.history {
                println!("  {:>9}  {:.6}", record.iteration, record.log_likelihood);
            }
        }

        if !self.degenerate_updates.is_empty() {
            println!(
                "\n  {}",
                format!(
                    "{} parameter rows kept their previous values (zero posterior mass)",
                    self.degenerate_updates.len()
                )
                .yellow()
            );
        }
    }
}

/// Posterior tables for one training call
///
/// Owned by the trainer and recomputed on every iteration.
#[derive(Debug)]
struct TrainingSession<'a> {
    observations: &'a [usize],
    scaling: Scaling,
    /// `[state, time]`
    gamma: Array2<f64>,
    /// `[from, to, time]`
    xi: Array3<f64>,
    /// Tables from the last `score` call, valid until the parameters change
    trellis: Option<Trellis>,
}

impl<'a> TrainingSession<'a> {
    fn new(n_states: usize, observations: &'a [usize], scaling: Scaling) -> Self {
        let len = observations.len();
        Self {
            observations,
            scaling,
            gamma: Array2::zeros((n_states, len)),
            xi: Array3::zeros((n_states, n_states, len - 1)),
            trellis: None,
        }
    }

    /// Log-likelihood of `params`, keeping the trellis for the next E-step
    fn score(&mut self, params: &HMMParams) -> Result<f64> {
        let evaluation = Evaluation::new(params, self.observations, self.scaling)?;
        let log_likelihood = evaluation.log_likelihood();
        if log_likelihood == f64::NEG_INFINITY {
            // Reuse the posterior check to classify the zero
            evaluation.state_posterior(0, self.observations.len() - 1)?;
        }
        self.trellis = Some(evaluation.into_trellis());
        Ok(log_likelihood)
    }

    /// Compute gamma and xi under the current parameters
    fn e_step(&mut self, params: &HMMParams) -> Result<()> {
        let evaluation = match self.trellis.take() {
            Some(trellis) => {
                Evaluation::from_trellis(params, self.observations, self.scaling, trellis)
            }
            None => Evaluation::new(params, self.observations, self.scaling)?,
        };
        self.gamma = evaluation.gamma()?;
        self.xi = evaluation.xi()?;
        Ok(())
    }

    /// Closed-form re-estimation. Rows with zero posterior mass keep their values.
    fn m_step(&self, params: &mut HMMParams, iteration: usize) -> Vec<DegenerateUpdate> {
        let n = params.n_states;
        let len = self.observations.len();
        let mut skipped = Vec::new();

        for s in 0..n {
            params.initial_probs[s] = self.gamma[[s, 0]];
        }

        for i in 0..n {
            let denominator: f64 = (0..len - 1).map(|t| self.gamma[[i, t]]).sum();
            if denominator > 0.0 {
                for j in 0..n {
                    let numerator: f64 = (0..len - 1).map(|t| self.xi[[i, j, t]]).sum();
                    params.transition_matrix[[i, j]] = numerator / denominator;
                }
            } else {
                tracing::warn!(
                    "Iteration {}: state {} has no posterior mass before the last step, keeping its transitions",
                    iteration,
                    i
                );
                skipped.push(DegenerateUpdate {
                    iteration,
                    state: i,
                    parameter: ParameterKind::Transition,
                });
            }
        }

        for s in 0..n {
            let denominator: f64 = self.gamma.row(s).sum();
            if denominator > 0.0 {
                for symbol in 0..params.n_symbols {
                    let numerator: f64 = self
                        .observations
                        .iter()
                        .enumerate()
                        .filter(|(_, &o)| o == symbol)
                        .map(|(t, _)| self.gamma[[s, t]])
                        .sum();
                    params.emission_matrix[[s, symbol]] = numerator / denominator;
                }
            } else {
                tracing::warn!(
                    "Iteration {}: state {} has no posterior mass, keeping its emissions",
                    iteration,
                    s
                );
                skipped.push(DegenerateUpdate {
                    iteration,
                    state: s,
                    parameter: ParameterKind::Emission,
                });
            }
        }

        skipped
    }
}

/// Baum-Welch trainer
#[derive(Debug, Clone, Default)]
pub struct BaumWelchTrainer {
    config: TrainerConfig,
}

impl BaumWelchTrainer {
    /// Create a trainer from a configuration
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    /// Set convergence tolerance
    pub fn with_tol(mut self, tolerance: f64) -> Self {
        self.config.tolerance = tolerance;
        self
    }

    /// Set maximum number of iterations
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set scaling mode
    pub fn with_scaling(mut self, scaling: Scaling) -> Self {
        self.config.scaling = scaling;
        self
    }

    /// Current configuration
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Fit `hmm` to one observation sequence, updating it in place
    ///
    /// Fails with `InvalidInput` for sequences shorter than 2 or symbols outside
    /// the alphabet, and with `Degenerate` (or `NumericUnderflow` without
    /// scaling) if the sequence has zero probability under the model.
    pub fn train(&self, hmm: &mut DiscreteHMM, observations: &[usize]) -> Result<TrainingReport> {
        self.config.validate()?;
        if observations.len() < 2 {
            return Err(HmmError::invalid(format!(
                "training needs at least 2 observations, got {}",
                observations.len()
            )));
        }
        hmm.params().check_observations(observations)?;

        let mut session = TrainingSession::new(hmm.n_states(), observations, self.config.scaling);
        let mut status = TrainingStatus::Initialized;

        let initial_log_likelihood = session.score(hmm.params())?;
        tracing::info!(
            "Training {}-state HMM on {} observations (initial log-likelihood {:.6})",
            hmm.n_states(),
            observations.len(),
            initial_log_likelihood
        );

        // Work on a copy so a failed iteration leaves the caller's model untouched
        let mut params = hmm.params().clone();
        let mut previous = initial_log_likelihood;
        let mut history = Vec::new();
        let mut degenerate_updates = Vec::new();
        let mut iterations = 0;

        while status != TrainingStatus::Converged {
            if iterations == self.config.max_iterations {
                status = TrainingStatus::IterationLimitReached;
                break;
            }
            status = TrainingStatus::Iterating;
            iterations += 1;

            session.e_step(&params)?;
            degenerate_updates.extend(session.m_step(&mut params, iterations));

            let current = session.score(&params)?;
            if current.is_nan() {
                return Err(HmmError::Degenerate(format!(
                    "log-likelihood became NaN at iteration {}",
                    iterations
                )));
            }

            history.push(IterationRecord {
                iteration: iterations,
                log_likelihood: current,
            });
            tracing::debug!("Iteration {}: log-likelihood = {:.6}", iterations, current);

            if current - previous < self.config.tolerance {
                status = TrainingStatus::Converged;
            }
            previous = current;
        }

        match status {
            TrainingStatus::Converged => {
                tracing::info!("Converged after {} iterations", iterations)
            }
            _ => tracing::info!(
                "Stopped after reaching the limit of {} iterations",
                self.config.max_iterations
            ),
        }

        *hmm.params_mut() = params;

        Ok(TrainingReport {
            status,
            iterations,
            initial_log_likelihood,
            log_likelihood: previous,
            history,
            degenerate_updates,
        })
    }
}
