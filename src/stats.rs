/*!
# Convergence Diagnostics

Post-hoc summaries of finished chains:
- [`potential_scale_reduction`] and [`split_potential_scale_reduction`] compare the
  between-chain and within-chain variances of two or more chains.
- [`effective_sample_size`] sums the per-chain effective sample sizes.
- [`autocorrelation`] returns the normalized autocorrelation function of a single chain.
- [`diagnose`] bundles the first two into a [`DiagnosticResult`].

Every function first drops `burn_in` iterations from each chain. Chains of unequal length are
then truncated to the shortest post-burn-in length, keeping the first draws after burn-in.
*/

use log::warn;
use ndarray::{concatenate, prelude::*, stack};
use ndarray_stats::QuantileExt;
use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};
use std::fmt;

use crate::chain::ChainRecord;
use crate::error::{McmcError, Result};

const MIN_CHAINS: usize = 2;

/// Series up to this length use the direct autocovariance sum instead of the FFT.
const BRUTE_FORCE_MAX_LEN: usize = 100;

/// Potential scale reduction and effective sample size per dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticResult {
    pub potential_scale_reduction: Array1<f64>,
    pub effective_sample_size: Array1<f64>,
    pub n_chains: usize,
    /// Post-burn-in draws per chain after truncation to the shortest chain.
    pub draws_per_chain: usize,
}

impl DiagnosticResult {
    pub fn dim(&self) -> usize {
        self.potential_scale_reduction.len()
    }

    /// Largest potential scale reduction over all dimensions; `NaN` if any entry is `NaN`.
    pub fn max_potential_scale_reduction(&self) -> f64 {
        self.potential_scale_reduction
            .max()
            .copied()
            .unwrap_or(f64::NAN)
    }

    pub fn min_effective_sample_size(&self) -> f64 {
        self.effective_sample_size
            .min()
            .copied()
            .unwrap_or(f64::NAN)
    }

    /// `true` when every dimension's potential scale reduction is finite and below `threshold`.
    pub fn is_converged(&self, threshold: f64) -> bool {
        self.potential_scale_reduction
            .iter()
            .all(|&r| r.is_finite() && r < threshold)
    }
}

impl fmt::Display for DiagnosticResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} chains x {} draws",
            self.n_chains, self.draws_per_chain
        )?;
        writeln!(f, "{:>5} {:>10} {:>12}", "dim", "psr", "ess")?;
        for (i, (psr, ess)) in self
            .potential_scale_reduction
            .iter()
            .zip(self.effective_sample_size.iter())
            .enumerate()
        {
            writeln!(f, "{i:>5} {psr:>10.4} {ess:>12.1}")?;
        }
        Ok(())
    }
}

/// Computes potential scale reduction and effective sample size in one pass over the chains.
pub fn diagnose(chains: &[ChainRecord], burn_in: usize) -> Result<DiagnosticResult> {
    let sample = post_burn_in_stack(chains, burn_in)?;
    let (n_chains, draws_per_chain, _) = sample.dim();
    Ok(DiagnosticResult {
        potential_scale_reduction: psrf(sample.view()),
        effective_sample_size: ess(sample.view()),
        n_chains,
        draws_per_chain,
    })
}

/// Per-dimension potential scale reduction of at least two chains.
///
/// With `m` chains of `n` post-burn-in draws, `W` the mean of the per-chain sample variances
/// and `B = n / (m - 1) * sum_j (mean_j - mean)^2`, the result is
/// `sqrt(((n - 1) / n * W + B / n) / W)`.
///
/// Values near 1 indicate that the chains agree. A dimension with zero within-chain variance
/// yields `NaN` (or infinity when the chain means differ).
///
/// # Examples
///
/// ```rust
/// use adaptive_mcmc::chain::ChainRecord;
/// use adaptive_mcmc::stats::potential_scale_reduction;
/// use ndarray::array;
///
/// let a = ChainRecord::from_samples(array![[0.0], [1.0], [0.0], [1.0]]);
/// let b = ChainRecord::from_samples(array![[1.0], [0.0], [1.0], [0.0]]);
/// let psr = potential_scale_reduction(&[a, b], 0).unwrap();
/// assert!((psr[0] - (0.75_f64).sqrt()).abs() < 1e-12);
/// ```
pub fn potential_scale_reduction(chains: &[ChainRecord], burn_in: usize) -> Result<Array1<f64>> {
    let sample = post_burn_in_stack(chains, burn_in)?;
    Ok(psrf(sample.view()))
}

/// Potential scale reduction after splitting every chain into its first and last half.
///
/// Unlike the plain variant this also flags a single chain that drifts during the run.
/// Needs at least four post-burn-in draws per chain.
pub fn split_potential_scale_reduction(
    chains: &[ChainRecord],
    burn_in: usize,
) -> Result<Array1<f64>> {
    let sample = post_burn_in_stack(chains, burn_in)?;
    let n = sample.dim().1;
    if n < 4 {
        return Err(McmcError::TooFewDraws { min: 4, found: n });
    }
    Ok(psrf(splitcat(sample.view()).view()))
}

/// Per-dimension effective sample size summed over the chains.
///
/// For every chain and dimension the integrated autocorrelation time is accumulated until the
/// first autocorrelation that is not positive, and the chain contributes `n / tau` draws.
/// A dimension that is constant after burn-in in some chain contributes `0.0` from that chain.
pub fn effective_sample_size(chains: &[ChainRecord], burn_in: usize) -> Result<Array1<f64>> {
    let sample = post_burn_in_stack(chains, burn_in)?;
    Ok(ess(sample.view()))
}

/// Normalized autocorrelation of one chain for lags `0..=max_lag`.
///
/// Row `k` holds the lag-`k` autocorrelation of every dimension; row 0 is exactly 1.0.
/// Dimensions that are constant after burn-in are all `NaN`.
pub fn autocorrelation(chain: &ChainRecord, burn_in: usize, max_lag: usize) -> Result<Array2<f64>> {
    let kept = chain.post_burn_in(burn_in)?;
    if chain.dim() == 0 {
        return Err(McmcError::EmptyChains);
    }
    let n = kept.nrows();
    if max_lag >= n {
        return Err(McmcError::InvalidMaxLag {
            max_lag,
            available: n,
        });
    }
    Ok(autocorr(kept).slice_move(s![..=max_lag, ..]))
}

/// Integrated autocorrelation time `1 + 2 * sum_k rho_k` of one autocorrelation sequence.
///
/// `rho[0]` is skipped and the sum stops before the first lag whose autocorrelation is not
/// positive (or is `NaN`).
pub fn integrated_autocorrelation_time(rho: ArrayView1<f64>) -> f64 {
    let tail: f64 = rho
        .iter()
        .skip(1)
        .take_while(|&&r| r > 0.0)
        .sum();
    1.0 + 2.0 * tail
}

/// Stacks the post-burn-in windows into a `(chains, draws, dims)` array.
fn post_burn_in_stack(chains: &[ChainRecord], burn_in: usize) -> Result<Array3<f64>> {
    if chains.len() < MIN_CHAINS {
        return Err(McmcError::TooFewChains {
            min: MIN_CHAINS,
            found: chains.len(),
        });
    }
    let dim = chains[0].dim();
    if dim == 0 {
        return Err(McmcError::EmptyChains);
    }
    if let Some(other) = chains.iter().find(|c| c.dim() != dim) {
        return Err(McmcError::InconsistentDimensions {
            expected: dim,
            found: other.dim(),
        });
    }

    let kept = chains
        .iter()
        .map(|c| c.post_burn_in(burn_in))
        .collect::<Result<Vec<_>>>()?;
    let n = kept
        .iter()
        .map(|k| k.nrows())
        .min()
        .expect("Expected at least one chain");
    let windows: Vec<ArrayView2<f64>> = kept.iter().map(|k| k.slice(s![..n, ..])).collect();
    Ok(stack(Axis(0), &windows).expect("Expected stacking equally shaped chains to succeed"))
}

/// Takes a (chains, draws, dims) view and returns a (2 * chains, draws / 2, dims) array
/// holding the first and last half of every chain.
fn splitcat(sample: ArrayView3<f64>) -> Array3<f64> {
    let n = sample.dim().1;
    let half = n / 2;
    let first = sample.slice(s![.., ..half, ..]);
    let last = sample.slice(s![.., (n - half).., ..]);
    concatenate(Axis(0), &[first, last]).expect("Expected stacking two halves to succeed")
}

fn psrf(sample: ArrayView3<f64>) -> Array1<f64> {
    let (m, n, d) = sample.dim();
    let n = n as f64;
    let values: Vec<f64> = (0..d)
        .into_par_iter()
        .map(|p| {
            let draws = sample.index_axis(Axis(2), p); // (chains, draws)
            let chain_means = draws
                .mean_axis(Axis(1))
                .expect("Expected computing chain means to succeed");
            let grand_mean = chain_means
                .mean()
                .expect("Expected computing the grand mean to succeed");
            let between =
                n * chain_means.mapv(|x| (x - grand_mean).powi(2)).sum() / (m - 1) as f64;
            let within = draws
                .var_axis(Axis(1), 1.0)
                .mean()
                .expect("Expected computing within-chain variances to succeed");
            let var = (n - 1.0) / n * within + between / n;
            (var / within).sqrt()
        })
        .collect();
    Array1::from_vec(values)
}

fn ess(sample: ArrayView3<f64>) -> Array1<f64> {
    let d = sample.dim().2;
    sample
        .outer_iter()
        .fold(Array1::zeros(d), |total, chain| total + chain_ess(chain))
}

fn chain_ess(series: ArrayView2<f64>) -> Array1<f64> {
    let n = series.nrows() as f64;
    let rho = autocorr(series);
    rho.axis_iter(Axis(1))
        .enumerate()
        .map(|(p, col)| {
            if col[0].is_nan() {
                warn!("Dimension {p} is constant after burn-in; its effective sample size is 0");
                0.0
            } else {
                n / integrated_autocorrelation_time(col)
            }
        })
        .collect()
}

/// Autocovariance normalized by lag 0; constant columns become `NaN`.
fn autocorr(series: ArrayView2<f64>) -> Array2<f64> {
    let mut rho = autocov(series);
    for (p, mut col) in rho.axis_iter_mut(Axis(1)).enumerate() {
        let raw = series.column(p);
        let first = raw[0];
        if raw.iter().all(|&x| x == first) {
            col.fill(f64::NAN);
            continue;
        }
        let c0 = col[0];
        col.mapv_inplace(|c| c / c0);
        col[0] = 1.0;
    }
    rho
}

/// Biased (divide by `n`) autocovariance of every column for lags `0..n`.
fn autocov(series: ArrayView2<f64>) -> Array2<f64> {
    if series.nrows() <= BRUTE_FORCE_MAX_LEN {
        autocov_bf(series)
    } else {
        autocov_fft(series)
    }
}

fn autocov_fft(series: ArrayView2<f64>) -> Array2<f64> {
    let (n, d) = series.dim();
    // Zero-pad to avoid wrap-around.
    let n_padded = (2 * n - 1).next_power_of_two();
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n_padded);
    let ffti = planner.plan_fft_inverse(n_padded);

    let columns: Vec<Vec<f64>> = (0..d)
        .into_par_iter()
        .map(|p| {
            let traj = series.column(p);
            let traj_mean = traj.sum() / n as f64;
            let mut x: Vec<Complex<f64>> = traj
                .iter()
                .map(|&xi| Complex::new(xi - traj_mean, 0.0))
                .chain(std::iter::repeat(Complex::new(0.0, 0.0)).take(n_padded - n))
                .collect();
            fft.process(&mut x);
            x.iter_mut().for_each(|xi| *xi = Complex::new(xi.norm_sqr(), 0.0));
            ffti.process(&mut x);
            // rustfft leaves the inverse unnormalized
            x.iter()
                .take(n)
                .map(|xi| xi.re / n_padded as f64 / n as f64)
                .collect::<Vec<f64>>()
        })
        .collect();
    Array2::from_shape_fn((n, d), |(lag, p)| columns[p][lag])
}

fn autocov_bf(series: ArrayView2<f64>) -> Array2<f64> {
    let (n, d) = series.dim();
    let mut out = Array2::zeros((n, d));
    for (p, mut out_col) in out.axis_iter_mut(Axis(1)).enumerate() {
        let traj = series.column(p);
        let centered = &traj - traj.sum() / n as f64;
        for lag in 0..n {
            out_col[lag] = (0..n - lag)
                .map(|t| centered[t] * centered[t + lag])
                .sum::<f64>()
                / n as f64;
        }
    }
    out
}
