/*!
# Adaptive Metropolis–Hastings Sampler

This module implements a random-walk Metropolis–Hastings sampler whose Gaussian proposal tunes
itself while the chain runs (see [`crate::proposal`]). The proposal is symmetric, so the acceptance
test only compares target log-densities.

## Overview

- **[`AdaptiveChain`]**: one chain, advanced with [`MarkovChain::step`]. It owns its position, the
  cached log-density of that position, a [`ProposalState`] and its random number generator.
- **[`AdaptiveSampler`]**: runs one chain from a [`SamplerConfig`] and returns a [`ChainRecord`].
- **[`MultiChainSampler`]**: runs several independent chains in parallel (one Rayon task each).
  Chain `i` is seeded with `seed + i`.

Chains share nothing mutable. Each iteration is one indivisible unit
(propose, evaluate, accept or reject, adapt), and cancellation is only observed between units.

## Example Usage

```rust
use adaptive_mcmc::distributions::Gaussian;
use adaptive_mcmc::config::SamplerConfig;
use adaptive_mcmc::metropolis_hastings::AdaptiveSampler;
use nalgebra::{DMatrix, DVector};

let target = Gaussian::new(
    DVector::from_vec(vec![3.0, 1.0]),
    DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 2.0]),
)
.unwrap();
let config = SamplerConfig::new(&[0.0, 0.0], DMatrix::identity(2, 2))
    .n_iterations(2_000)
    .target_accept_rate(0.3)
    .set_seed(42);

let chain = AdaptiveSampler::new(target, config).run().unwrap();
assert_eq!(chain.len(), 2_000);
assert!((0.0..=1.0).contains(&chain.acceptance_rate()));
```
*/

use indicatif::{MultiProgress, ProgressBar};
use log::info;
use rand::prelude::*;
use rayon::prelude::*;
use std::sync::atomic::AtomicBool;

use crate::chain::ChainRecord;
use crate::config::SamplerConfig;
use crate::core::{progress_style, run_chain, run_chain_progress, run_chain_until, MarkovChain};
use crate::distributions::Target;
use crate::error::Result;
use crate::proposal::ProposalState;

/// A single chain of the adaptive Metropolis–Hastings algorithm.
#[derive(Debug, Clone)]
pub struct AdaptiveChain<D> {
    /// The target distribution to sample from.
    pub target: D,
    current_state: Vec<f64>,
    current_lp: f64,
    proposal: ProposalState,
    target_accept_rate: f64,
    n_accepted: usize,
    last_accepted: bool,
    /// The chain-specific random seed.
    pub seed: u64,
    rng: SmallRng,
}

impl<D: Target> AdaptiveChain<D> {
    /**
    Creates a chain at `config.initial_state`.

    The configuration is validated against the target first, so a dimension mismatch or a
    non-positive-definite initial scale is reported before any sampling happens.
    */
    pub fn new(target: D, config: &SamplerConfig) -> Result<Self> {
        config.validate(target.dim())?;
        let proposal = ProposalState::new(
            &config.initial_state,
            &config.initial_scale,
            config.schedule,
            config.adapt,
        )?;
        let current_lp = finite_or_neg_inf(target.unnorm_log_prob(&config.initial_state));
        Ok(Self {
            target,
            current_state: config.initial_state.clone(),
            current_lp,
            proposal,
            target_accept_rate: config.target_accept_rate,
            n_accepted: 0,
            last_accepted: false,
            seed: config.seed,
            rng: SmallRng::seed_from_u64(config.seed),
        })
    }

    pub fn proposal(&self) -> &ProposalState {
        &self.proposal
    }

    pub fn n_accepted(&self) -> usize {
        self.n_accepted
    }

    /// Iterations completed so far.
    pub fn iteration(&self) -> u64 {
        self.proposal.iteration()
    }

    /// Cached log-density of the current state (`-inf` if it was not finite).
    pub fn current_log_density(&self) -> f64 {
        self.current_lp
    }

    /// Whether the most recent iteration accepted its proposal.
    pub fn last_accepted(&self) -> bool {
        self.last_accepted
    }
}

impl<D: Target> MarkovChain<f64> for AdaptiveChain<D> {
    /**
    Performs one adaptive Metropolis–Hastings iteration.

    A candidate is drawn from the current proposal and accepted with probability
    \(\min(1, \exp(\log p(y) - \log p(x)))\) against one fresh uniform draw. A non-finite
    \(\log p(y)\) always rejects. Afterwards the proposal observes the (possibly unchanged)
    state.
    */
    fn step(&mut self) -> &[f64] {
        let proposed = self.proposal.propose(&self.current_state, &mut self.rng);
        let proposed_lp = self.target.unnorm_log_prob(&proposed);
        let log_accept_ratio = if proposed_lp.is_finite() {
            proposed_lp - self.current_lp
        } else {
            f64::NEG_INFINITY
        };
        let u: f64 = self.rng.gen();
        self.last_accepted = log_accept_ratio > u.ln();
        if self.last_accepted {
            self.current_state = proposed;
            self.current_lp = proposed_lp;
            self.n_accepted += 1;
        }
        self.proposal
            .observe(&self.current_state, self.last_accepted, self.target_accept_rate);
        &self.current_state
    }

    fn current_state(&self) -> &[f64] {
        &self.current_state
    }
}

fn finite_or_neg_inf(lp: f64) -> f64 {
    if lp.is_finite() {
        lp
    } else {
        f64::NEG_INFINITY
    }
}

/**
Runs one adaptive chain from a configuration.

```rust
use adaptive_mcmc::config::SamplerConfig;
use adaptive_mcmc::distributions::FnTarget;
use adaptive_mcmc::metropolis_hastings::AdaptiveSampler;
use nalgebra::DMatrix;

// Half-normal on x > 0: log-density is -inf elsewhere.
let target = FnTarget::new(1, |x: &[f64]| if x[0] > 0.0 { -0.5 * x[0] * x[0] } else { f64::NEG_INFINITY });
let config = SamplerConfig::new(&[1.0], DMatrix::identity(1, 1)).n_iterations(500).set_seed(3);
let chain = AdaptiveSampler::new(target, config).run().unwrap();
assert!(chain.samples().iter().all(|&x| x > 0.0));
```
*/
#[derive(Debug, Clone)]
pub struct AdaptiveSampler<D> {
    /// The target distribution we want to sample from.
    pub target: D,
    /// Parameters of the run.
    pub config: SamplerConfig,
}

impl<D: Target> AdaptiveSampler<D> {
    pub fn new(target: D, config: SamplerConfig) -> Self {
        Self { target, config }
    }

    /// A fresh chain borrowing this sampler's target, for step-wise driving.
    pub fn chain(&self) -> Result<AdaptiveChain<&D>> {
        AdaptiveChain::new(&self.target, &self.config)
    }

    /// Runs `config.n_iterations` iterations and returns the finished chain.
    pub fn run(&self) -> Result<ChainRecord> {
        let mut chain = self.chain()?;
        log_start(&self.config, 0);
        let samples = run_chain(&mut chain, self.config.n_iterations);
        Ok(finish(samples, &chain, 0))
    }

    /// Like [`AdaptiveSampler::run`], but stops early once `stop` is raised.
    ///
    /// The record then holds only the completed iterations, and its acceptance rate is
    /// relative to those.
    pub fn run_until(&self, stop: &AtomicBool) -> Result<ChainRecord> {
        let mut chain = self.chain()?;
        log_start(&self.config, 0);
        let samples = run_chain_until(&mut chain, self.config.n_iterations, stop);
        Ok(finish(samples, &chain, 0))
    }
}

fn log_start(config: &SamplerConfig, index: usize) {
    info!(
        "chain {index}: sampling {} iterations in {} dimensions (adapt: {}, target acceptance: {}, seed: {})",
        config.n_iterations,
        config.dim(),
        config.adapt,
        config.target_accept_rate,
        config.seed
    );
}

fn finish<D: Target>(
    samples: ndarray::Array2<f64>,
    chain: &AdaptiveChain<D>,
    index: usize,
) -> ChainRecord {
    let record = ChainRecord::new(samples, chain.n_accepted());
    info!(
        "chain {index}: finished {} iterations, acceptance rate {:.3}, final log-scale {:.3}",
        record.len(),
        record.acceptance_rate(),
        chain.proposal().log_scale()
    );
    record
}

/**
Runs several independent adaptive chains against one target.

Each chain has its own configuration; chains typically differ in their initial state.
[`MultiChainSampler::set_seed`] gives chain `i` the seed `seed + i`.

```rust
use adaptive_mcmc::config::SamplerConfig;
use adaptive_mcmc::distributions::Gaussian;
use adaptive_mcmc::metropolis_hastings::MultiChainSampler;
use nalgebra::{DMatrix, DVector};

let target = Gaussian::new(DVector::zeros(2), DMatrix::identity(2, 2)).unwrap();
let base = SamplerConfig::new(&[0.0, 0.0], DMatrix::identity(2, 2)).n_iterations(1_000);
let sampler = MultiChainSampler::from_initial_states(target, &base, &[vec![-3.0, 3.0], vec![3.0, -3.0]])
    .set_seed(42);
assert_eq!(sampler.configs[1].seed, 43);

let chains = sampler.run().unwrap();
assert_eq!(chains.len(), 2);
assert!(chains.iter().all(|c| c.len() == 1_000));
```
*/
#[derive(Debug, Clone)]
pub struct MultiChainSampler<D> {
    /// The target distribution shared by all chains.
    pub target: D,
    /// One configuration per chain.
    pub configs: Vec<SamplerConfig>,
}

impl<D> MultiChainSampler<D>
where
    D: Target + Sync,
{
    pub fn new(target: D, configs: Vec<SamplerConfig>) -> Self {
        Self { target, configs }
    }

    /// One chain per entry of `initial_states`, otherwise configured like `base`.
    pub fn from_initial_states(target: D, base: &SamplerConfig, initial_states: &[Vec<f64>]) -> Self {
        let configs = initial_states
            .iter()
            .map(|state| base.clone().initial_state(state))
            .collect();
        Self { target, configs }
    }

    /// Seeds chain `i` with `seed + i`.
    pub fn set_seed(mut self, seed: u64) -> Self {
        for (i, config) in self.configs.iter_mut().enumerate() {
            config.seed = seed.wrapping_add(i as u64);
        }
        self
    }

    /// Builds every chain up front, so all configuration errors surface before sampling.
    fn chains(&self) -> Result<Vec<AdaptiveChain<&D>>> {
        self.configs
            .iter()
            .map(|config| AdaptiveChain::new(&self.target, config))
            .collect()
    }

    /// Runs all chains in parallel and returns their records in configuration order.
    pub fn run(&self) -> Result<Vec<ChainRecord>> {
        let mut chains = self.chains()?;
        let records = chains
            .par_iter_mut()
            .zip(self.configs.par_iter())
            .enumerate()
            .map(|(i, (chain, config))| {
                log_start(config, i);
                let samples = run_chain(chain, config.n_iterations);
                finish(samples, chain, i)
            })
            .collect();
        Ok(records)
    }

    /// Runs all chains in parallel, drawing one progress bar per chain.
    pub fn run_progress(&self) -> Result<Vec<ChainRecord>> {
        let mut chains = self.chains()?;
        let multi = MultiProgress::new();
        let pb_style = progress_style();

        let records = chains
            .par_iter_mut()
            .zip(self.configs.par_iter())
            .enumerate()
            .map(|(i, (chain, config))| {
                let pb = multi.add(ProgressBar::new(config.n_iterations as u64));
                pb.set_prefix(format!("Chain {i}"));
                pb.set_style(pb_style.clone());

                log_start(config, i);
                let samples = run_chain_progress(chain, config.n_iterations, &pb);
                let record = finish(samples, chain, i);
                pb.finish_with_message(format!("accept {:.2}", record.acceptance_rate()));
                record
            })
            .collect();
        Ok(records)
    }
}
