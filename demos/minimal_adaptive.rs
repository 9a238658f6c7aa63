use adaptive_mcmc::config::SamplerConfig;
use adaptive_mcmc::distributions::Gaussian;
use adaptive_mcmc::metropolis_hastings::MultiChainSampler;
use adaptive_mcmc::stats::diagnose;
use nalgebra::{DMatrix, DVector};

fn main() {
    let target = Gaussian::new(DVector::zeros(2), DMatrix::identity(2, 2))
        .expect("Expected a valid target");
    let base = SamplerConfig::new(&[0.0, 0.0], DMatrix::identity(2, 2)).n_iterations(1_000);

    // Four chains from different corners, chain i seeded with 42 + i
    let chains = MultiChainSampler::from_initial_states(
        target,
        &base,
        &[
            vec![-5.0, -5.0],
            vec![-5.0, 5.0],
            vec![5.0, -5.0],
            vec![5.0, 5.0],
        ],
    )
    .set_seed(42)
    .run()
    .expect("Expected sampling to succeed");

    // Discard the first 100 draws of every chain as burn-in
    assert_eq!(chains.len(), 4);
    assert_eq!(chains[0].post_burn_in(100).unwrap().nrows(), 900);

    let result = diagnose(&chains, 100).expect("Expected diagnostics to succeed");
    println!("{result}");
}
