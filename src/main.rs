//! HMM Toolkit CLI
//!
//! Command-line interface for training, decoding and scoring discrete HMMs

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use hmm_toolkit::{
    models::{DiscreteHMM, GaussianMixture, HMMParams},
    BaumWelchTrainer, ObservationSequence, TrainerConfig,
};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hmm_toolkit")]
#[command(about = "Discrete HMM training (Baum-Welch), Viterbi decoding and GMM densities")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train an HMM on one observation sequence
    Train {
        /// CSV file of symbol indices
        #[arg(short, long, conflicts_with = "sequence")]
        input: Option<String>,

        /// Inline symbol list (e.g. "0,1,0,1")
        #[arg(short, long)]
        sequence: Option<String>,

        /// Number of hidden states
        #[arg(short = 'n', long, default_value = "2")]
        n_states: usize,

        /// Alphabet size (defaults to the largest symbol + 1)
        #[arg(short = 'k', long)]
        n_symbols: Option<usize>,

        /// JSON trainer configuration
        #[arg(short, long)]
        config: Option<String>,

        /// Convergence tolerance (overrides config)
        #[arg(long)]
        tol: Option<f64>,

        /// Maximum iterations (overrides config)
        #[arg(long)]
        n_iter: Option<usize>,

        /// Start from uniform parameters instead of random ones
        #[arg(long)]
        uniform_init: bool,

        /// Seed for random initialization
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Where to save the trained model (JSON)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Most likely state sequence under a saved model
    Decode {
        /// Model JSON file
        #[arg(short, long)]
        model: String,

        /// CSV file of symbol indices
        #[arg(short, long, conflicts_with = "sequence")]
        input: Option<String>,

        /// Inline symbol list
        #[arg(short, long)]
        sequence: Option<String>,
    },

    /// Log-likelihood of a sequence under a saved model
    Score {
        /// Model JSON file
        #[arg(short, long)]
        model: String,

        /// CSV file of symbol indices
        #[arg(short, long, conflicts_with = "sequence")]
        input: Option<String>,

        /// Inline symbol list
        #[arg(short, long)]
        sequence: Option<String>,
    },

    /// Draw a sequence from a saved model
    Sample {
        /// Model JSON file
        #[arg(short, long)]
        model: String,

        /// Sequence length
        #[arg(short, long, default_value = "20")]
        length: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Write the observations to this CSV file
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Density of a point under a Gaussian mixture
    Density {
        /// GMM JSON file
        #[arg(short, long)]
        gmm: String,

        /// Comma-separated coordinates
        #[arg(short, long, allow_hyphen_values = true)]
        point: String,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("hmm_toolkit=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            input,
            sequence,
            n_states,
            n_symbols,
            config,
            tol,
            n_iter,
            uniform_init,
            seed,
            output,
        } => {
            let observations = load_observations(input.as_deref(), sequence.as_deref())?;
            let mut config = match config {
                Some(path) => TrainerConfig::from_json_file(path)?,
                None => TrainerConfig::default(),
            };
            if let Some(tol) = tol {
                config = config.with_tolerance(tol);
            }
            if let Some(n_iter) = n_iter {
                config = config.with_max_iterations(n_iter);
            }
            let n_symbols = n_symbols.unwrap_or_else(|| observations.alphabet_size());
            observations.validate(n_symbols)?;
            let mut hmm = initial_model(n_states, n_symbols, uniform_init, seed)?;
            train_model(&mut hmm, &observations, config, output.as_deref())?;
        }
        Commands::Decode {
            model,
            input,
            sequence,
        } => {
            let observations = load_observations(input.as_deref(), sequence.as_deref())?;
            decode_sequence(&model, &observations)?;
        }
        Commands::Score {
            model,
            input,
            sequence,
        } => {
            let observations = load_observations(input.as_deref(), sequence.as_deref())?;
            score_sequence(&model, &observations)?;
        }
        Commands::Sample {
            model,
            length,
            seed,
            output,
        } => {
            sample_sequence(&model, length, seed, output.as_deref())?;
        }
        Commands::Density { gmm, point } => {
            gmm_density(&gmm, &point)?;
        }
    }

    Ok(())
}

fn load_observations(input: Option<&str>, sequence: Option<&str>) -> Result<ObservationSequence> {
    let observations = match (input, sequence) {
        (Some(path), _) => ObservationSequence::from_csv(path)?,
        (None, Some(text)) => ObservationSequence::parse(text)?,
        (None, None) => anyhow::bail!("Provide observations with --input or --sequence"),
    };
    println!("Loaded {} observations", observations.len());
    Ok(observations)
}

/// Starting parameters for training: seeded random unless a uniform start is requested
fn initial_model(
    n_states: usize,
    n_symbols: usize,
    uniform: bool,
    seed: u64,
) -> Result<DiscreteHMM> {
    if uniform {
        if n_states > 1 {
            tracing::warn!(
                "Uniform start is a fixed point of Baum-Welch: all {} states will stay identical",
                n_states
            );
        }
        return Ok(DiscreteHMM::new(n_states, n_symbols)?);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    Ok(DiscreteHMM::with_params(HMMParams::random(
        n_states, n_symbols, &mut rng,
    )?)?)
}

fn train_model(
    hmm: &mut DiscreteHMM,
    observations: &ObservationSequence,
    config: TrainerConfig,
    output: Option<&str>,
) -> Result<()> {
    println!(
        "{}",
        format!(
            "Training {}-state HMM over {} symbols (max {} iterations)...",
            hmm.n_states(),
            hmm.n_symbols(),
            config.max_iterations
        )
        .cyan()
    );

    let report = BaumWelchTrainer::new(config).train(hmm, observations)?;
    report.print_summary();
    hmm.print_parameters();

    if let Some(path) = output {
        hmm.save_json(path)?;
        println!("\n{}", format!("Saved model to {}", path).green());
    }

    Ok(())
}

fn decode_sequence(model: &str, observations: &ObservationSequence) -> Result<()> {
    let hmm = DiscreteHMM::load_json(model)?;
    let path = hmm.decode(observations)?;

    println!("\n{}", "=== Viterbi Path ===".bold());
    let states: Vec<String> = path.states.iter().map(|s| s.to_string()).collect();
    println!("  States: {}", states.join(" "));
    if path.is_impossible() {
        println!("  {}", "Observations are impossible under this model".red());
    } else {
        println!("  Probability: {:.6e}", path.probability);
        println!("  Log probability: {:.6}", path.log_probability);
    }

    Ok(())
}

fn score_sequence(model: &str, observations: &ObservationSequence) -> Result<()> {
    let hmm = DiscreteHMM::load_json(model)?;
    let log_likelihood = hmm.sequence_log_likelihood(observations)?;

    println!("\n{}", "=== Sequence Score ===".bold());
    println!("  Log-likelihood: {:.6}", log_likelihood);
    println!(
        "  Per observation: {:.6}",
        log_likelihood / observations.len() as f64
    );

    Ok(())
}

fn sample_sequence(model: &str, length: usize, seed: u64, output: Option<&str>) -> Result<()> {
    let hmm = DiscreteHMM::load_json(model)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let (states, observations) = hmm.sample(length, &mut rng);

    println!("\n{}", "=== Sampled Sequence ===".bold());
    for (t, (state, symbol)) in states.iter().zip(observations.iter()).enumerate() {
        println!("  t={:<4} state={} symbol={}", t, state, symbol);
    }

    if let Some(path) = output {
        ObservationSequence::new(observations).to_csv(path)?;
        println!("{}", format!("Saved observations to {}", path).green());
    }

    Ok(())
}

fn gmm_density(gmm_path: &str, point: &str) -> Result<()> {
    let gmm = GaussianMixture::load_json(gmm_path)?;
    let coordinates = point
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let x = Array1::from(coordinates);

    println!("\n{}", "=== GMM Density ===".bold());
    for k in 0..gmm.n_components() {
        match gmm.component_density(&x, k) {
            Ok(p) => {
                let log_density = match gmm.component(k) {
                    Some(component) => component.log_pdf(&x)?,
                    None => f64::NEG_INFINITY,
                };
                println!(
                    "  Component {}: {:.6e} (log density {:.6})",
                    k, p, log_density
                );
            }
            Err(e) => println!("  Component {}: {}", k, e.to_string().red()),
        }
    }

    let density = gmm.mixture_density(&x)?;
    println!("  Mixture: {}", format!("{:.6e}", density).green());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_start_breaks_symmetry() {
        let hmm = initial_model(2, 2, false, 42).unwrap();
        assert_ne!(hmm.emission_matrix().row(0), hmm.emission_matrix().row(1));

        let mut trained = hmm.clone();
        BaumWelchTrainer::default()
            .train(&mut trained, &[0, 1, 0, 1, 0, 1])
            .unwrap();
        assert_ne!(trained.params(), hmm.params());
    }

    #[test]
    fn test_uniform_start_on_request() {
        let hmm = initial_model(3, 2, true, 42).unwrap();
        assert_eq!(hmm.params(), &HMMParams::uniform(3, 2).unwrap());
    }

    #[test]
    fn test_seed_is_reproducible() {
        let a = initial_model(3, 4, false, 7).unwrap();
        let b = initial_model(3, 4, false, 7).unwrap();
        assert_eq!(a.params(), b.params());
    }
}
