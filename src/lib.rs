//! Adaptive random-walk Metropolis-Hastings with multi-chain convergence diagnostics.
//!
//! The proposal covariance of every chain is learned on the fly: a Robbins-Monro recursion
//! tracks the running mean and covariance of the chain and steers a global log-scale towards
//! a target acceptance rate. Finished chains are summarized with the potential scale reduction,
//! the effective sample size and the autocorrelation function in [`stats`].
//!
//! ```rust
//! use adaptive_mcmc::config::SamplerConfig;
//! use adaptive_mcmc::distributions::Gaussian;
//! use adaptive_mcmc::metropolis_hastings::MultiChainSampler;
//! use adaptive_mcmc::stats::diagnose;
//! use nalgebra::{DMatrix, DVector};
//!
//! let target = Gaussian::new(DVector::from_vec(vec![1.0, -1.0]), DMatrix::identity(2, 2)).unwrap();
//! let base = SamplerConfig::new(&[0.0, 0.0], DMatrix::identity(2, 2)).n_iterations(2_000);
//! let chains = MultiChainSampler::from_initial_states(target, &base, &[vec![-3.0, 3.0], vec![3.0, -3.0]])
//!     .set_seed(7)
//!     .run()
//!     .unwrap();
//! let result = diagnose(&chains, 1_000).unwrap();
//! assert!(result.is_converged(1.1));
//! ```

pub mod chain;
pub mod config;
pub mod core;
pub mod distributions;
pub mod error;
pub mod metropolis_hastings;
pub mod proposal;
pub mod stats;
