//! Integration tests for the HMM toolkit

use approx::{assert_abs_diff_eq, assert_relative_eq};
use hmm_toolkit::linalg::{determinant, inverse, mahalanobis_distance};
use hmm_toolkit::models::GmmSnapshot;
use hmm_toolkit::prelude::*;
use ndarray::{array, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn weather_model() -> DiscreteHMM {
    DiscreteHMM::from_parts(
        vec![0.6, 0.4],
        vec![vec![0.7, 0.3], vec![0.4, 0.6]],
        vec![vec![0.9, 0.1], vec![0.2, 0.8]],
    )
    .unwrap()
}

#[test]
fn test_viterbi_toy_model() {
    let hmm = weather_model();
    let path = hmm.decode(&[0, 0, 1]).unwrap();

    assert_eq!(path.states, vec![0, 0, 1]);
    assert_abs_diff_eq!(path.probability, 0.6 * 0.9 * 0.7 * 0.9 * 0.3 * 0.8, epsilon = 1e-9);
}

/// Joint log probability of a state path with the observations
fn joint_log_probability(hmm: &DiscreteHMM, states: &[usize], observations: &[usize]) -> f64 {
    let p = hmm.params();
    let mut total =
        p.initial_probs[states[0]].ln() + p.emission_matrix[[states[0], observations[0]]].ln();
    for t in 1..states.len() {
        total += p.transition_matrix[[states[t - 1], states[t]]].ln()
            + p.emission_matrix[[states[t], observations[t]]].ln();
    }
    total
}

/// Best path score by max-sum recursion, no backpointers
fn best_log_score(hmm: &DiscreteHMM, observations: &[usize]) -> f64 {
    let p = hmm.params();
    let n = hmm.n_states();
    let mut scores: Vec<f64> = (0..n)
        .map(|s| p.initial_probs[s].ln() + p.emission_matrix[[s, observations[0]]].ln())
        .collect();
    for &symbol in &observations[1..] {
        scores = (0..n)
            .map(|j| {
                let best = (0..n)
                    .map(|i| scores[i] + p.transition_matrix[[i, j]].ln())
                    .fold(f64::NEG_INFINITY, f64::max);
                best + p.emission_matrix[[j, symbol]].ln()
            })
            .collect();
    }
    scores.into_iter().fold(f64::NEG_INFINITY, f64::max)
}

#[test]
fn test_viterbi_long_sampled_sequence() {
    let hmm = DiscreteHMM::from_parts(
        vec![0.5, 0.5],
        vec![vec![0.8, 0.2], vec![0.3, 0.7]],
        vec![vec![0.7, 0.3], vec![0.2, 0.8]],
    )
    .unwrap();
    let mut rng = StdRng::seed_from_u64(1);
    let (true_states, observations) = hmm.sample(3000, &mut rng);

    let path = hmm.decode(&observations).unwrap();
    assert_eq!(path.states.len(), 3000);
    assert!(!path.is_impossible());

    let reference = best_log_score(&hmm, &observations);
    assert_relative_eq!(path.log_probability, reference, max_relative = 1e-9);
    assert_relative_eq!(
        joint_log_probability(&hmm, &path.states, &observations),
        path.log_probability,
        max_relative = 1e-9
    );
    assert!(path.log_probability >= joint_log_probability(&hmm, &true_states, &observations));
    assert!(path.log_probability <= hmm.sequence_log_likelihood(&observations).unwrap());
}

#[test]
fn test_posteriors_on_random_models() {
    let mut rng = StdRng::seed_from_u64(2024);

    for _ in 0..5 {
        let params = HMMParams::random(3, 4, &mut rng).unwrap();
        let hmm = DiscreteHMM::with_params(params).unwrap();
        let (_, observations) = hmm.sample(12, &mut rng);
        let eval = hmm.evaluate(&observations).unwrap();

        for t in 0..observations.len() {
            let total: f64 = (0..3).map(|s| eval.state_posterior(s, t).unwrap()).sum();
            assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);
        }
        for t in 0..observations.len() - 1 {
            let mut total = 0.0;
            for i in 0..3 {
                for j in 0..3 {
                    total += eval.pair_posterior(i, j, t).unwrap();
                }
            }
            assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_em_monotonicity_from_random_starts() {
    let mut rng = StdRng::seed_from_u64(99);
    let generator = weather_model();
    let (_, observations) = generator.sample(40, &mut rng);

    for _ in 0..3 {
        let params = HMMParams::random(2, 2, &mut rng).unwrap();
        let mut hmm = DiscreteHMM::with_params(params).unwrap();
        let report = BaumWelchTrainer::default()
            .with_max_iterations(50)
            .train(&mut hmm, &observations)
            .unwrap();

        let mut previous = report.initial_log_likelihood;
        for record in &report.history {
            assert!(record.log_likelihood >= previous - 1e-9);
            previous = record.log_likelihood;
        }
        assert_relative_eq!(
            report.log_likelihood,
            hmm.sequence_log_likelihood(&observations).unwrap(),
            epsilon = 1e-12
        );
    }
}

#[test]
fn test_alternating_sequence_end_to_end() {
    let mut hmm = DiscreteHMM::from_parts(
        vec![0.5, 0.5],
        vec![vec![0.5, 0.5], vec![0.5, 0.5]],
        vec![vec![0.6, 0.4], vec![0.3, 0.7]],
    )
    .unwrap();
    let observations = ObservationSequence::parse("0,1,0,1,0,1").unwrap();

    let report = BaumWelchTrainer::new(TrainerConfig::default())
        .train(&mut hmm, &observations)
        .unwrap();

    assert_eq!(report.status, TrainingStatus::Converged);
    assert!(report.iterations < 100);
    assert!(hmm.transition_matrix()[[0, 1]] > hmm.transition_matrix()[[0, 0]]);
    assert!(hmm.transition_matrix()[[1, 0]] > hmm.transition_matrix()[[1, 1]]);

    // The fitted model decodes the training sequence as alternating states
    let path = hmm.decode(&observations).unwrap();
    for t in 1..path.states.len() {
        assert_ne!(path.states[t], path.states[t - 1]);
    }
}

#[test]
fn test_raw_and_scaled_training_agree() {
    let observations = [0, 0, 1, 1, 0, 1, 1, 1, 0];
    let start = DiscreteHMM::from_parts(
        vec![0.5, 0.5],
        vec![vec![0.6, 0.4], vec![0.3, 0.7]],
        vec![vec![0.7, 0.3], vec![0.2, 0.8]],
    )
    .unwrap();

    let mut raw = start.clone();
    let raw_report = BaumWelchTrainer::default()
        .with_scaling(Scaling::None)
        .with_max_iterations(10)
        .train(&mut raw, &observations)
        .unwrap();

    let mut scaled = start;
    let scaled_report = BaumWelchTrainer::default()
        .with_scaling(Scaling::PerStep)
        .with_max_iterations(10)
        .train(&mut scaled, &observations)
        .unwrap();

    assert_eq!(raw_report.iterations, scaled_report.iterations);
    for (a, b) in raw
        .transition_matrix()
        .iter()
        .zip(scaled.transition_matrix().iter())
    {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
    }
}

#[test]
fn test_long_sequence_needs_scaling() {
    let mut rng = StdRng::seed_from_u64(5);
    let generator = DiscreteHMM::new(2, 4).unwrap();
    let (_, observations) = generator.sample(1500, &mut rng);

    let mut hmm = DiscreteHMM::with_params(HMMParams::random(2, 4, &mut rng).unwrap()).unwrap();
    let result = BaumWelchTrainer::default()
        .with_scaling(Scaling::None)
        .train(&mut hmm, &observations);
    assert!(matches!(result, Err(HmmError::NumericUnderflow(_))));

    let report = BaumWelchTrainer::default()
        .with_scaling(Scaling::PerStep)
        .with_max_iterations(5)
        .train(&mut hmm, &observations)
        .unwrap();
    assert!(report.log_likelihood.is_finite());
}

#[test]
fn test_inverse_round_trip_random_matrices() {
    use rand::Rng;
    let mut rng = StdRng::seed_from_u64(11);

    for size in 1..=4 {
        // Diagonally dominant, hence non-singular
        let m = Array2::from_shape_fn((size, size), |(i, j)| {
            let v: f64 = rng.gen_range(-1.0..1.0);
            if i == j {
                v + size as f64 + 1.0
            } else {
                v
            }
        });
        assert!(determinant(&m).unwrap().abs() > 0.0);

        let product = m.dot(&inverse(&m).unwrap());
        for ((i, j), v) in product.indexed_iter() {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert_abs_diff_eq!(*v, expected, epsilon = 1e-6);
        }
    }
}

#[test]
fn test_mahalanobis_properties() {
    let cov = array![[1.5, 0.2, 0.0], [0.2, 1.0, 0.1], [0.0, 0.1, 0.5]];
    let mean = array![0.0, 1.0, -1.0];

    assert_eq!(mahalanobis_distance(&mean, &mean, &cov).unwrap(), 0.0);
    let d = mahalanobis_distance(&array![1.0, 0.0, 0.0], &mean, &cov).unwrap();
    assert!(d > 0.0);
}

#[test]
fn test_gmm_from_snapshot() {
    let snapshot = GmmSnapshot {
        priors: vec![0.3, 0.7],
        means: vec![vec![0.0], vec![2.0]],
        covariances: vec![vec![vec![1.0]], vec![vec![4.0]]],
    };
    let gmm = GaussianMixture::try_from(snapshot).unwrap();

    assert_relative_eq!(
        gmm.mixture_density(&array![1.0]).unwrap(),
        0.19581408172324782,
        epsilon = 1e-12
    );
}

#[test]
fn test_gmm_singular_covariance_fails() {
    let gmm = GaussianMixture::single(array![0.0, 0.0], Array2::zeros((2, 2))).unwrap();
    assert!(matches!(
        gmm.mixture_density(&array![0.0, 0.0]),
        Err(HmmError::SingularCovariance { .. })
    ));
    assert!(matches!(
        gmm.component_density(&array![0.0, 0.0, 0.0], 0),
        Err(HmmError::InvalidInput(_))
    ));
}

#[test]
fn test_model_save_and_load() {
    let hmm = weather_model();
    let path = std::env::temp_dir().join("hmm_toolkit_model_test.json");
    hmm.save_json(&path).unwrap();

    let loaded = DiscreteHMM::load_json(&path).unwrap();
    assert_eq!(loaded.params(), hmm.params());
    std::fs::remove_file(&path).ok();
}
