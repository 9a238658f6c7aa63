//! The record a sampler run leaves behind.

use ndarray::prelude::*;
use ndarray_stats::CorrelationExt;

use crate::error::{McmcError, Result};

/// Samples of one finished chain plus its acceptance bookkeeping.
///
/// Rows of [`ChainRecord::samples`] are iterations, columns are dimensions. Rejected
/// iterations repeat the previous state, so the row count always equals the number
/// of iterations run.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainRecord {
    samples: Array2<f64>,
    n_accepted: usize,
}

impl ChainRecord {
    pub(crate) fn new(samples: Array2<f64>, n_accepted: usize) -> Self {
        debug_assert!(n_accepted <= samples.nrows());
        Self {
            samples,
            n_accepted,
        }
    }

    /// Builds a record from externally produced draws.
    ///
    /// A move counts as accepted whenever a row differs from the one before it.
    pub fn from_samples(samples: Array2<f64>) -> Self {
        let n_accepted = samples
            .outer_iter()
            .zip(samples.outer_iter().skip(1))
            .filter(|(prev, next)| prev != next)
            .count();
        Self {
            samples,
            n_accepted,
        }
    }

    /// Number of recorded iterations.
    pub fn len(&self) -> usize {
        self.samples.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.nrows() == 0
    }

    pub fn dim(&self) -> usize {
        self.samples.ncols()
    }

    pub fn n_accepted(&self) -> usize {
        self.n_accepted
    }

    /// `n_accepted / len`, or `0.0` for an empty record.
    pub fn acceptance_rate(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.n_accepted as f64 / self.len() as f64
        }
    }

    pub fn samples(&self) -> ArrayView2<'_, f64> {
        self.samples.view()
    }

    pub fn into_samples(self) -> Array2<f64> {
        self.samples
    }

    pub fn final_state(&self) -> Option<ArrayView1<'_, f64>> {
        self.len().checked_sub(1).map(|last| self.samples.row(last))
    }

    /// Samples left after dropping the first `burn_in` iterations.
    pub fn post_burn_in(&self, burn_in: usize) -> Result<ArrayView2<'_, f64>> {
        if burn_in >= self.len() {
            return Err(McmcError::BurnInTooLong {
                burn_in,
                len: self.len(),
            });
        }
        Ok(self.samples.slice(s![burn_in.., ..]))
    }

    /// Per-dimension mean of the post-burn-in samples.
    pub fn mean(&self, burn_in: usize) -> Result<Array1<f64>> {
        let kept = self.post_burn_in(burn_in)?;
        Ok(kept
            .mean_axis(Axis(0))
            .expect("Expected a non-empty post-burn-in window"))
    }

    /// Unbiased sample covariance of the post-burn-in samples.
    ///
    /// With a single post-burn-in sample every entry is `NaN`.
    pub fn covariance(&self, burn_in: usize) -> Result<Array2<f64>> {
        let kept = self.post_burn_in(burn_in)?;
        if kept.nrows() < 2 {
            return Ok(Array2::from_elem((self.dim(), self.dim()), f64::NAN));
        }
        Ok(kept
            .t()
            .cov(1.0)
            .expect("Expected covariance of a non-empty window to succeed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn record() -> ChainRecord {
        ChainRecord::from_samples(array![
            [0.0, 1.0],
            [0.0, 1.0],
            [1.0, 2.0],
            [2.0, 2.0],
            [2.0, 2.0],
            [3.0, 4.0],
        ])
    }

    #[test]
    fn acceptance_is_inferred_from_moves() {
        let chain = record();
        assert_eq!(chain.len(), 6);
        assert_eq!(chain.dim(), 2);
        assert_eq!(chain.n_accepted(), 3);
        assert_abs_diff_eq!(chain.acceptance_rate(), 0.5);
        assert_eq!(chain.final_state().unwrap(), array![3.0, 4.0]);
    }

    #[test]
    fn burn_in_is_dropped_before_summaries() {
        let chain = record();
        let mean = chain.mean(2).unwrap();
        assert_abs_diff_eq!(mean, array![2.0, 2.5], epsilon = 1e-12);

        let cov = chain.covariance(2).unwrap();
        // dim 0: [1, 2, 2, 3], dim 1: [2, 2, 2, 4]
        assert_abs_diff_eq!(cov[(0, 0)], 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cov[(1, 1)], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cov[(0, 1)], 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn burn_in_must_leave_samples() {
        let chain = record();
        assert_eq!(
            chain.post_burn_in(6).unwrap_err(),
            McmcError::BurnInTooLong { burn_in: 6, len: 6 }
        );
        assert!(chain.covariance(5).unwrap()[(0, 0)].is_nan());
    }

    #[test]
    fn empty_record() {
        let chain = ChainRecord::from_samples(Array2::zeros((0, 3)));
        assert!(chain.is_empty());
        assert_eq!(chain.acceptance_rate(), 0.0);
        assert!(chain.final_state().is_none());
    }
}
