/*!
# Core Chain Driving Utilities.

This module provides the machinery for advancing a Markov chain and collecting its states:
- The [`MarkovChain<T>`] trait, which abstracts a single MCMC chain.
- [`run_chain`], [`run_chain_progress`] and [`run_chain_until`] for executing a single chain and
  collecting its states into an [`ndarray::Array2`].
- [`progress_style`], the bar style shared by every progress-reporting runner.

A chain is only ever interrupted between two calls to [`MarkovChain::step`], never inside one, so a
stopped chain is always left in a consistent state.
*/

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::prelude::*;
use num_traits::Zero;
use std::sync::atomic::{AtomicBool, Ordering};

/// A trait that abstracts a single MCMC chain.
///
/// A type implementing [`MarkovChain<T>`] must provide:
/// - `step()`: advances the chain one iteration and returns a reference to the updated state.
/// - `current_state()`: returns a reference to the current state without modifying the chain.
pub trait MarkovChain<T> {
    /// Performs one iteration of the chain and returns a reference to the new state.
    fn step(&mut self) -> &[T];

    /// Returns a reference to the current state of the chain without advancing it.
    fn current_state(&self) -> &[T];
}

/// Runs a single MCMC chain for `n_steps` iterations.
///
/// Returns an array of shape `[n_steps, D]`; row `i` is the state after iteration `i`.
pub fn run_chain<T, M>(chain: &mut M, n_steps: usize) -> Array2<T>
where
    M: MarkovChain<T>,
    T: Clone + Zero,
{
    collect(chain, n_steps, None, None)
}

/// Runs a single MCMC chain for `n_steps` iterations while advancing `pb`.
pub fn run_chain_progress<T, M>(chain: &mut M, n_steps: usize, pb: &ProgressBar) -> Array2<T>
where
    M: MarkovChain<T>,
    T: Clone + Zero,
{
    pb.set_length(n_steps as u64);
    collect(chain, n_steps, None, Some(pb))
}

/// Runs a single MCMC chain for at most `n_steps` iterations, checking `stop` before each one.
///
/// Once `stop` is set the chain finishes the iteration in flight and the collected rows are
/// returned; the array then has fewer than `n_steps` rows.
pub fn run_chain_until<T, M>(chain: &mut M, n_steps: usize, stop: &AtomicBool) -> Array2<T>
where
    M: MarkovChain<T>,
    T: Clone + Zero,
{
    collect(chain, n_steps, Some(stop), None)
}

fn collect<T, M>(
    chain: &mut M,
    n_steps: usize,
    stop: Option<&AtomicBool>,
    pb: Option<&ProgressBar>,
) -> Array2<T>
where
    M: MarkovChain<T>,
    T: Clone + Zero,
{
    let dim = chain.current_state().len();
    let mut out = Array2::<T>::zeros((n_steps, dim));
    let mut done = 0;

    for i in 0..n_steps {
        if stop.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            break;
        }
        let state = chain.step();
        out.row_mut(i)
            .iter_mut()
            .zip(state.iter())
            .for_each(|(slot, x)| *slot = x.clone());
        done += 1;

        if let Some(pb) = pb {
            pb.inc(1);
        }
    }

    if done < n_steps {
        out.slice_move(s![..done, ..])
    } else {
        out
    }
}

/// The progress bar style used for chain runs.
pub fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        .expect("Expected progress bar template to be valid")
        .progress_chars("##-")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counts up by one in every coordinate.
    struct Counter {
        state: Vec<u32>,
    }

    impl MarkovChain<u32> for Counter {
        fn step(&mut self) -> &[u32] {
            self.state.iter_mut().for_each(|x| *x += 1);
            &self.state
        }

        fn current_state(&self) -> &[u32] {
            &self.state
        }
    }

    /// Raises `flag` once its own state reaches `at`.
    struct StopAfter<'a> {
        inner: Counter,
        flag: &'a AtomicBool,
        at: u32,
    }

    impl MarkovChain<u32> for StopAfter<'_> {
        fn step(&mut self) -> &[u32] {
            self.inner.step();
            if self.inner.state[0] >= self.at {
                self.flag.store(true, Ordering::Relaxed);
            }
            &self.inner.state
        }

        fn current_state(&self) -> &[u32] {
            &self.inner.state
        }
    }

    #[test]
    fn run_chain_collects_every_step() {
        let mut chain = Counter {
            state: vec![0, 10],
        };
        let out = run_chain(&mut chain, 3);
        assert_eq!(out, array![[1, 11], [2, 12], [3, 13]]);
        assert_eq!(chain.current_state(), &[3, 13]);
    }

    #[test]
    fn progress_runner_counts_steps() {
        let mut chain = Counter { state: vec![0] };
        let pb = ProgressBar::hidden();
        let out = run_chain_progress(&mut chain, 25, &pb);
        assert_eq!(out.nrows(), 25);
        assert_eq!(pb.position(), 25);
    }

    #[test]
    fn stop_flag_truncates_between_steps() {
        let flag = AtomicBool::new(false);
        let mut chain = StopAfter {
            inner: Counter { state: vec![0] },
            flag: &flag,
            at: 4,
        };
        let out = run_chain_until(&mut chain, 100, &flag);
        assert_eq!(out, array![[1], [2], [3], [4]]);
    }

    #[test]
    fn preset_stop_flag_runs_nothing() {
        let flag = AtomicBool::new(true);
        let mut chain = Counter { state: vec![0, 0] };
        let out = run_chain_until(&mut chain, 10, &flag);
        assert_eq!(out.dim(), (0, 2));
        assert_eq!(chain.current_state(), &[0, 0]);
    }
}
