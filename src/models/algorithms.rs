//! HMM algorithms: Forward-Backward and posterior computation
//!
//! Tables are indexed `[state, time]`. The emission used at time `t` is always
//! that of `observations[t]`.

use super::hmm::HMMParams;
use crate::config::Scaling;
use crate::error::{HmmError, Result};
use ndarray::{Array1, Array2, Array3};

/// Forward (alpha) and backward (beta) tables for one observation sequence
///
/// With [`Scaling::PerStep`] column `t` of alpha is divided by
/// `c_t = sum_i alpha[i, t]` and column `t` of beta by `c_{t+1}`.
#[derive(Debug, Clone)]
pub struct Trellis {
    alpha: Array2<f64>,
    beta: Array2<f64>,
    scales: Option<Array1<f64>>,
}

impl Trellis {
    /// Fill both tables in a single left-to-right and right-to-left pass.
    ///
    /// The sequence must be non-empty and inside the alphabet, and the
    /// parameter shapes must agree; [`Evaluation::new`] checks both.
    pub(crate) fn compute(params: &HMMParams, observations: &[usize], scaling: Scaling) -> Self {
        let n = params.n_states;
        let len = observations.len();
        let a = &params.transition_matrix;
        let b = &params.emission_matrix;

        let mut alpha = Array2::zeros((n, len));
        let mut scales = match scaling {
            Scaling::None => None,
            Scaling::PerStep => Some(Array1::zeros(len)),
        };

        // Initialization
        for s in 0..n {
            alpha[[s, 0]] = params.initial_probs[s] * b[[s, observations[0]]];
        }
        rescale_column(&mut alpha, 0, scales.as_mut());

        // Recursion
        for t in 1..len {
            for s in 0..n {
                let mut sum = 0.0;
                for i in 0..n {
                    sum += alpha[[i, t - 1]] * a[[i, s]];
                }
                alpha[[s, t]] = sum * b[[s, observations[t]]];
            }
            rescale_column(&mut alpha, t, scales.as_mut());
        }

        let mut beta = Array2::zeros((n, len));
        for s in 0..n {
            beta[[s, len - 1]] = 1.0;
        }

        for t in (0..len - 1).rev() {
            let next = observations[t + 1];
            for s in 0..n {
                let mut sum = 0.0;
                for j in 0..n {
                    sum += a[[s, j]] * b[[j, next]] * beta[[j, t + 1]];
                }
                beta[[s, t]] = sum;
            }

            if let Some(c) = scales.as_ref().map(|scales| scales[t + 1]) {
                if c > 0.0 {
                    beta.column_mut(t).mapv_inplace(|v| v / c);
                }
            }
        }

        Self {
            alpha,
            beta,
            scales,
        }
    }

    /// Sequence length
    pub fn len(&self) -> usize {
        self.alpha.ncols()
    }

    /// True for an empty table
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forward table `[state, time]`
    pub fn alpha(&self) -> &Array2<f64> {
        &self.alpha
    }

    /// Backward table `[state, time]`
    pub fn beta(&self) -> &Array2<f64> {
        &self.beta
    }

    /// Per-step scale factors, when scaling is enabled
    pub fn scales(&self) -> Option<&Array1<f64>> {
        self.scales.as_ref()
    }

    /// `ln P(observations | model)`, negative infinity when the sequence is impossible
    pub fn log_likelihood(&self) -> f64 {
        match &self.scales {
            Some(scales) => {
                if scales.iter().any(|&c| c <= 0.0) {
                    f64::NEG_INFINITY
                } else {
                    scales.iter().map(|c| c.ln()).sum()
                }
            }
            None => self.alpha.column(self.len() - 1).sum().ln(),
        }
    }
}

fn rescale_column(table: &mut Array2<f64>, t: usize, scales: Option<&mut Array1<f64>>) {
    if let Some(scales) = scales {
        let c = table.column(t).sum();
        scales[t] = c;
        if c > 0.0 {
            table.column_mut(t).mapv_inplace(|v| v / c);
        }
    }
}

/// A model bound to one observation sequence, with its memoized trellis
#[derive(Debug, Clone)]
pub struct Evaluation<'a> {
    params: &'a HMMParams,
    observations: &'a [usize],
    scaling: Scaling,
    trellis: Trellis,
}

impl<'a> Evaluation<'a> {
    /// Validate the sequence and run forward-backward
    pub fn new(params: &'a HMMParams, observations: &'a [usize], scaling: Scaling) -> Result<Self> {
        if observations.is_empty() {
            return Err(HmmError::invalid("observation sequence is empty"));
        }
        params.check_shape()?;
        params.check_observations(observations)?;

        Ok(Self {
            params,
            observations,
            scaling,
            trellis: Trellis::compute(params, observations, scaling),
        })
    }

    /// Rebind a trellis already computed for exactly these parameters and observations
    pub(crate) fn from_trellis(
        params: &'a HMMParams,
        observations: &'a [usize],
        scaling: Scaling,
        trellis: Trellis,
    ) -> Self {
        Self {
            params,
            observations,
            scaling,
            trellis,
        }
    }

    /// Give up the borrow on the parameters, keeping the tables
    pub(crate) fn into_trellis(self) -> Trellis {
        self.trellis
    }

    /// Sequence length
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Always false: empty sequences are rejected on construction
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// The underlying tables
    pub fn trellis(&self) -> &Trellis {
        &self.trellis
    }

    /// `ln P(observations | model)`
    pub fn log_likelihood(&self) -> f64 {
        self.trellis.log_likelihood()
    }

    /// Alpha: probability of the prefix up to `t` ending in `state`
    /// (scaled when the evaluation uses per-step scaling)
    pub fn forward_probability(&self, state: usize, t: usize) -> Result<f64> {
        self.check_state(state)?;
        self.check_time(t, self.len())?;
        Ok(self.trellis.alpha[[state, t]])
    }

    /// Beta: probability of the suffix after `t` given `state` at `t`
    /// (scaled when the evaluation uses per-step scaling)
    pub fn backward_probability(&self, state: usize, t: usize) -> Result<f64> {
        self.check_state(state)?;
        self.check_time(t, self.len())?;
        Ok(self.trellis.beta[[state, t]])
    }

    /// Gamma: `P(state at t | observations)`
    pub fn state_posterior(&self, state: usize, t: usize) -> Result<f64> {
        self.check_state(state)?;
        self.check_time(t, self.len())?;
        let z = self.occupancy_normalizer(t)?;
        Ok(self.occupancy_weight(state, t) / z)
    }

    /// Xi: `P(state i at t, state j at t + 1 | observations)` for `t <= L - 2`
    pub fn pair_posterior(&self, i: usize, j: usize, t: usize) -> Result<f64> {
        self.check_state(i)?;
        self.check_state(j)?;
        self.check_time(t, self.len() - 1)?;
        let z = self.pair_normalizer(t)?;
        Ok(self.pair_weight(i, j, t) / z)
    }

    /// Full gamma table `[state, time]`
    pub fn gamma(&self) -> Result<Array2<f64>> {
        let n = self.params.n_states;
        let mut gamma = Array2::zeros((n, self.len()));
        for t in 0..self.len() {
            let z = self.occupancy_normalizer(t)?;
            for s in 0..n {
                gamma[[s, t]] = self.occupancy_weight(s, t) / z;
            }
        }
        Ok(gamma)
    }

    /// Full xi table `[from, to, time]`, time running over `0..L-1`
    pub fn xi(&self) -> Result<Array3<f64>> {
        let n = self.params.n_states;
        let steps = self.len() - 1;
        let mut xi = Array3::zeros((n, n, steps));
        for t in 0..steps {
            let z = self.pair_normalizer(t)?;
            for i in 0..n {
                for j in 0..n {
                    xi[[i, j, t]] = self.pair_weight(i, j, t) / z;
                }
            }
        }
        Ok(xi)
    }

    fn occupancy_weight(&self, state: usize, t: usize) -> f64 {
        self.trellis.alpha[[state, t]] * self.trellis.beta[[state, t]]
    }

    fn occupancy_normalizer(&self, t: usize) -> Result<f64> {
        let z: f64 = (0..self.params.n_states)
            .map(|s| self.occupancy_weight(s, t))
            .sum();
        if z > 0.0 {
            Ok(z)
        } else {
            Err(self.zero_mass_error(t))
        }
    }

    fn pair_weight(&self, i: usize, j: usize, t: usize) -> f64 {
        let next = self.observations[t + 1];
        self.trellis.alpha[[i, t]]
            * self.params.transition_matrix[[i, j]]
            * self.params.emission_matrix[[j, next]]
            * self.trellis.beta[[j, t + 1]]
    }

    fn pair_normalizer(&self, t: usize) -> Result<f64> {
        let n = self.params.n_states;
        let mut z = 0.0;
        for i in 0..n {
            for j in 0..n {
                z += self.pair_weight(i, j, t);
            }
        }
        if z > 0.0 {
            Ok(z)
        } else {
            Err(self.zero_mass_error(t))
        }
    }

    /// Tell an impossible sequence apart from raw probabilities underflowing
    fn zero_mass_error(&self, t: usize) -> HmmError {
        if self.scaling == Scaling::None {
            let scaled = Trellis::compute(self.params, self.observations, Scaling::PerStep);
            let log_likelihood = scaled.log_likelihood();
            if log_likelihood.is_finite() {
                return HmmError::NumericUnderflow(format!(
                    "posterior normalizer at t = {} is zero without scaling (log-likelihood {:.4})",
                    t, log_likelihood
                ));
            }
        }
        HmmError::Degenerate(format!(
            "no state can account for the observations at t = {}",
            t
        ))
    }

    fn check_state(&self, state: usize) -> Result<()> {
        if state >= self.params.n_states {
            return Err(HmmError::invalid(format!(
                "state {} out of range (model has {})",
                state, self.params.n_states
            )));
        }
        Ok(())
    }

    fn check_time(&self, t: usize, limit: usize) -> Result<()> {
        if t >= limit {
            return Err(HmmError::invalid(format!(
                "time step {} out of range (limit {})",
                t, limit
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn create_test_hmm() -> HMMParams {
        // 2-state HMM
        HMMParams::new(
            array![0.6, 0.4],
            array![[0.7, 0.3], [0.4, 0.6]],
            array![[0.9, 0.1], [0.2, 0.8]],
        )
        .unwrap()
    }

    #[test]
    fn test_forward_by_hand() {
        let params = create_test_hmm();
        let obs = [0, 0, 1];
        let eval = Evaluation::new(&params, &obs, Scaling::None).unwrap();

        assert!((eval.forward_probability(0, 0).unwrap() - 0.54).abs() < 1e-12);
        assert!((eval.forward_probability(1, 0).unwrap() - 0.08).abs() < 1e-12);
        assert!((eval.forward_probability(0, 1).unwrap() - 0.369).abs() < 1e-12);
        assert!((eval.forward_probability(1, 1).unwrap() - 0.042).abs() < 1e-12);
        assert!((eval.forward_probability(0, 2).unwrap() - 0.02751).abs() < 1e-12);
        assert!((eval.forward_probability(1, 2).unwrap() - 0.10872).abs() < 1e-12);
        assert!((eval.log_likelihood() - 0.13623_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_backward_by_hand() {
        let params = create_test_hmm();
        let obs = [0, 0, 1];
        let eval = Evaluation::new(&params, &obs, Scaling::None).unwrap();

        assert_eq!(eval.backward_probability(0, 2).unwrap(), 1.0);
        // beta_0(1) = 0.7 * 0.1 + 0.3 * 0.8
        assert!((eval.backward_probability(0, 1).unwrap() - 0.31).abs() < 1e-12);

        // sum_s pi_s b_s(o_0) beta_s(0) equals the forward likelihood
        let backward_total: f64 = (0..2)
            .map(|s| {
                params.initial_probs[s]
                    * params.emission_matrix[[s, obs[0]]]
                    * eval.backward_probability(s, 0).unwrap()
            })
            .sum();
        assert!((backward_total - 0.13623).abs() < 1e-12);
    }

    #[test]
    fn test_posteriors_sum_to_one() {
        let params = create_test_hmm();
        let obs = [0, 1, 1, 0, 1, 0, 0];
        let eval = Evaluation::new(&params, &obs, Scaling::None).unwrap();

        for t in 0..obs.len() {
            let sum: f64 = (0..2).map(|s| eval.state_posterior(s, t).unwrap()).sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
        for t in 0..obs.len() - 1 {
            let mut sum = 0.0;
            for i in 0..2 {
                for j in 0..2 {
                    sum += eval.pair_posterior(i, j, t).unwrap();
                }
            }
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_xi_marginalizes_to_gamma() {
        let params = create_test_hmm();
        let obs = [1, 0, 0, 1];
        let eval = Evaluation::new(&params, &obs, Scaling::None).unwrap();
        let gamma = eval.gamma().unwrap();
        let xi = eval.xi().unwrap();

        for t in 0..obs.len() - 1 {
            for i in 0..2 {
                let row_sum = xi[[i, 0, t]] + xi[[i, 1, t]];
                assert!((row_sum - gamma[[i, t]]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_scaling_preserves_posteriors() {
        let params = create_test_hmm();
        let obs = [0, 1, 1, 1, 0, 1, 0, 0, 1];
        let raw = Evaluation::new(&params, &obs, Scaling::None).unwrap();
        let scaled = Evaluation::new(&params, &obs, Scaling::PerStep).unwrap();

        assert!((raw.log_likelihood() - scaled.log_likelihood()).abs() < 1e-9);

        let g_raw = raw.gamma().unwrap();
        let g_scaled = scaled.gamma().unwrap();
        for (a, b) in g_raw.iter().zip(g_scaled.iter()) {
            assert!((a - b).abs() < 1e-9);
        }

        let x_raw = raw.xi().unwrap();
        let x_scaled = scaled.xi().unwrap();
        for (a, b) in x_raw.iter().zip(x_scaled.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_index_checks() {
        let params = create_test_hmm();
        let obs = [0, 1];
        let eval = Evaluation::new(&params, &obs, Scaling::None).unwrap();
        assert!(eval.forward_probability(2, 0).is_err());
        assert!(eval.backward_probability(0, 2).is_err());
        assert!(eval.pair_posterior(0, 0, 1).is_err());
        assert!(Evaluation::new(&params, &[], Scaling::None).is_err());
        assert!(Evaluation::new(&params, &[0, 5], Scaling::None).is_err());
    }

    #[test]
    fn test_rejects_mismatched_shapes() {
        let mut params = create_test_hmm();
        params.transition_matrix = array![[1.0]];
        assert!(matches!(
            Evaluation::new(&params, &[0, 1], Scaling::PerStep),
            Err(HmmError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_impossible_sequence_is_degenerate() {
        // State 0 only emits symbol 0 and never leaves
        let params = HMMParams::new(
            array![1.0, 0.0],
            array![[1.0, 0.0], [0.0, 1.0]],
            array![[1.0, 0.0], [0.0, 1.0]],
        )
        .unwrap();
        let obs = [0, 1];
        let eval = Evaluation::new(&params, &obs, Scaling::None).unwrap();
        assert_eq!(eval.log_likelihood(), f64::NEG_INFINITY);
        assert!(matches!(
            eval.state_posterior(0, 0),
            Err(HmmError::Degenerate(_))
        ));
    }

    #[test]
    fn test_long_sequence_underflow() {
        let params = HMMParams::uniform(2, 4).unwrap();
        let obs: Vec<usize> = (0..2000).map(|t| t % 4).collect();

        let raw = Evaluation::new(&params, &obs, Scaling::None).unwrap();
        assert!(matches!(
            raw.state_posterior(0, 0),
            Err(HmmError::NumericUnderflow(_))
        ));

        let scaled = Evaluation::new(&params, &obs, Scaling::PerStep).unwrap();
        assert!((scaled.log_likelihood() - 2000.0 * 0.25_f64.ln()).abs() < 1e-6);
        assert!((scaled.state_posterior(1, 1500).unwrap() - 0.5).abs() < 1e-9);
    }
}
