//! Example: learning an alternating pattern
//!
//! Trains a 2-state HMM on a strictly alternating symbol sequence, then
//! decodes it and evaluates a Gaussian mixture density.
//!
//! Run with: cargo run --example alternating

use hmm_toolkit::prelude::*;
use ndarray::array;

fn main() -> anyhow::Result<()> {
    println!("=== Alternating Sequence ===\n");

    let observations = ObservationSequence::parse("0 1 0 1 0 1 0 1")?;

    // A perfectly uniform start is a fixed point of EM, so break the symmetry
    let mut hmm = DiscreteHMM::from_parts(
        vec![0.5, 0.5],
        vec![vec![0.5, 0.5], vec![0.5, 0.5]],
        vec![vec![0.6, 0.4], vec![0.4, 0.6]],
    )?;

    let report = BaumWelchTrainer::default().train(&mut hmm, &observations)?;
    report.print_summary();
    hmm.print_parameters();

    let path = hmm.decode(&observations)?;
    println!("\nViterbi path: {:?}", path.states);
    println!("Path probability: {:.6}", path.probability);
    println!("Path log probability: {:.6}", path.log_probability);

    println!("\n=== Gaussian Mixture ===\n");
    let mut gmm = GaussianMixture::zeros(2, 2)?;
    gmm.set_prior(0, 0.4)?;
    gmm.set_mean(0, array![0.0, 0.0])?;
    gmm.set_covariance(0, array![[1.0, 0.0], [0.0, 1.0]])?;
    gmm.set_prior(1, 0.6)?;
    gmm.set_mean(1, array![3.0, 3.0])?;
    gmm.set_covariance(1, array![[2.0, 0.5], [0.5, 1.0]])?;

    for point in [array![0.0, 0.0], array![1.5, 1.5], array![3.0, 3.0]] {
        println!(
            "  density at {:?}: {:.6}",
            point.to_vec(),
            gmm.mixture_density(&point)?
        );
    }

    Ok(())
}
