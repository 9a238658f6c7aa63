/*!
Target distributions for the adaptive sampler.

The sampler only ever talks to a target through the [`Target`] trait: a declared
domain dimension and an unnormalized log-density. Anything that can produce a
log-posterior value for a parameter vector can be sampled, including plain closures
wrapped in [`FnTarget`].

A d-dimensional [`Gaussian`] is provided as a reference target for tests and demos.

# Examples

```rust
use adaptive_mcmc::distributions::{FnTarget, Gaussian, Target};
use nalgebra::{DMatrix, DVector};

// A closure-backed target over R^2.
let banana = FnTarget::new(2, |x: &[f64]| {
    let y = x[1] - x[0] * x[0];
    -0.5 * (x[0] * x[0] + 10.0 * y * y)
});
assert_eq!(banana.dim(), 2);
assert_eq!(banana.unnorm_log_prob(&[0.0, 0.0]), 0.0);

// A correlated Gaussian.
let gauss = Gaussian::new(
    DVector::from_vec(vec![3.0, 1.0]),
    DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 2.0]),
)
.unwrap();
assert_eq!(gauss.unnorm_log_prob(&[3.0, 1.0]), 0.0);
```
*/

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use rand::Rng;
use rand_distr::StandardNormal;
use std::f64::consts::PI;

use crate::error::{McmcError, Result};
use crate::proposal::is_symmetric;

/// A target distribution from which we want to sample.
///
/// `unnorm_log_prob` may return `-inf` or `NaN` for parameter vectors outside the
/// support; the sampler treats any non-finite value as an automatic rejection.
pub trait Target {
    /// Dimension of the parameter vectors this target accepts.
    fn dim(&self) -> usize;

    /// Returns the log of the unnormalized density for state `theta`.
    fn unnorm_log_prob(&self, theta: &[f64]) -> f64;
}

impl<T: Target + ?Sized> Target for &T {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn unnorm_log_prob(&self, theta: &[f64]) -> f64 {
        (**self).unnorm_log_prob(theta)
    }
}

/// Wraps a closure as a [`Target`] with an explicitly declared dimension.
#[derive(Clone)]
pub struct FnTarget<F> {
    dim: usize,
    log_density: F,
}

impl<F> FnTarget<F>
where
    F: Fn(&[f64]) -> f64,
{
    /// Creates a target over `R^dim` whose unnormalized log-density is `log_density`.
    pub fn new(dim: usize, log_density: F) -> Self {
        Self { dim, log_density }
    }
}

impl<F> Target for FnTarget<F>
where
    F: Fn(&[f64]) -> f64,
{
    fn dim(&self) -> usize {
        self.dim
    }

    fn unnorm_log_prob(&self, theta: &[f64]) -> f64 {
        (self.log_density)(theta)
    }
}

/**
A d-dimensional Gaussian distribution parameterized by a mean vector and a
symmetric positive-definite covariance matrix.

The covariance is factorized once at construction; every density evaluation is a
triangular solve.

# Examples

```rust
use adaptive_mcmc::distributions::{Gaussian, Target};
use nalgebra::{DMatrix, DVector};

let gauss = Gaussian::new(DVector::zeros(3), DMatrix::identity(3, 3)).unwrap();
let lp = gauss.log_prob(&[0.0, 0.0, 0.0]);
assert!((lp + 1.5 * (2.0 * std::f64::consts::PI).ln()).abs() < 1e-12);
assert_eq!(gauss.dim(), 3);
```
*/
#[derive(Clone, Debug)]
pub struct Gaussian {
    pub mean: DVector<f64>,
    pub cov: DMatrix<f64>,
    chol: Cholesky<f64, Dyn>,
    log_det: f64,
}

impl Gaussian {
    /// Creates a Gaussian, failing if `cov` is not square, does not match the mean,
    /// or is not symmetric positive-definite.
    pub fn new(mean: DVector<f64>, cov: DMatrix<f64>) -> Result<Self> {
        let dim = mean.len();
        if cov.nrows() != dim || cov.ncols() != dim {
            return Err(McmcError::InvalidScaleShape {
                rows: cov.nrows(),
                cols: cov.ncols(),
                dim,
            });
        }
        if !is_symmetric(&cov) {
            return Err(McmcError::NotPositiveDefinite { parameter: "cov" });
        }
        let chol = Cholesky::new(cov.clone())
            .ok_or(McmcError::NotPositiveDefinite { parameter: "cov" })?;
        let log_det = 2.0 * chol.l_dirty().diagonal().iter().map(|l| l.ln()).sum::<f64>();
        Ok(Self {
            mean,
            cov,
            chol,
            log_det,
        })
    }

    /// Computes the fully normalized log-density.
    pub fn log_prob(&self, theta: &[f64]) -> f64 {
        let d = self.mean.len() as f64;
        -0.5 * (d * (2.0 * PI).ln() + self.log_det) + self.unnorm_log_prob(theta)
    }

    /// Draws one exact sample using the Cholesky factor of the covariance.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        let z = DVector::<f64>::from_fn(self.mean.len(), |_, _| rng.sample(StandardNormal));
        (&self.mean + self.chol.l() * z).iter().copied().collect()
    }
}

impl Target for Gaussian {
    fn dim(&self) -> usize {
        self.mean.len()
    }

    fn unnorm_log_prob(&self, theta: &[f64]) -> f64 {
        let diff = DVector::from_column_slice(theta) - &self.mean;
        let solved = self.chol.solve(&diff);
        -0.5 * diff.dot(&solved)
    }
}
