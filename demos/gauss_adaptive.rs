//! Samples a strongly correlated 2D Gaussian with and without adaptation and compares
//! the mixing of both runs.

use adaptive_mcmc::config::SamplerConfig;
use adaptive_mcmc::distributions::Gaussian;
use adaptive_mcmc::metropolis_hastings::MultiChainSampler;
use adaptive_mcmc::stats::{autocorrelation, diagnose};
use nalgebra::{DMatrix, DVector};
use std::error::Error;
use std::time::Instant;

const N_ITERATIONS: usize = 20_000;
const BURNIN: usize = 10_000;

fn main() -> Result<(), Box<dyn Error>> {
    let target = Gaussian::new(
        DVector::from_vec(vec![3.0, 1.0]),
        DMatrix::from_row_slice(2, 2, &[1.0, 1.99, 1.99, 4.0]),
    )?;
    let initial_states = [vec![0.0, 1.0], vec![2.0, 2.0]];

    for adapt in [false, true] {
        let base = SamplerConfig::new(&[0.0, 0.0], DMatrix::identity(2, 2))
            .n_iterations(N_ITERATIONS)
            .target_accept_rate(0.2)
            .adapt(adapt);
        let sampler = MultiChainSampler::from_initial_states(&target, &base, &initial_states)
            .set_seed(42);

        let start = Instant::now();
        let chains = sampler.run_progress()?;
        println!("\nadapt = {adapt}, {:?} elapsed", start.elapsed());

        for (i, chain) in chains.iter().enumerate() {
            println!(
                "chain {i}: acceptance {:.3}, mean {:.3}",
                chain.acceptance_rate(),
                chain.mean(BURNIN)?
            );
        }
        let rho = autocorrelation(&chains[0], BURNIN, 5)?;
        println!("autocorrelation of chain 0, lags 0..=5:\n{rho:.3}");
        println!("{}", diagnose(&chains, BURNIN)?);
    }
    Ok(())
}
