/*!
Invocation parameters for a sampler run.

Every run is described by an explicit [`SamplerConfig`]; there is no ambient state.
The random seed in particular is part of the configuration, so two runs with equal
configurations produce identical chains.

```rust
use adaptive_mcmc::config::SamplerConfig;
use nalgebra::DMatrix;

let config = SamplerConfig::new(&[0.0, 1.0], DMatrix::identity(2, 2))
    .n_iterations(5_000)
    .target_accept_rate(0.2)
    .set_seed(42);
assert!(config.validate(2).is_ok());
assert!(config.validate(3).is_err());
```
*/

use nalgebra::{Cholesky, DMatrix};
use rand::{thread_rng, Rng};

use crate::error::{McmcError, Result};
use crate::proposal::{is_symmetric, AdaptationSchedule};

/// All parameters of a single chain run.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    /// Number of iterations, and hence recorded samples. Must be at least 1.
    pub n_iterations: usize,
    /// Starting point of the chain.
    pub initial_state: Vec<f64>,
    /// Symmetric positive-definite covariance of the first proposals.
    pub initial_scale: DMatrix<f64>,
    /// Whether the proposal adapts during the run.
    pub adapt: bool,
    /// Acceptance rate the scale adaptation aims for; must lie in `(0, 1)`.
    pub target_accept_rate: f64,
    /// Seed of the chain's random number generator.
    pub seed: u64,
    /// Step-size schedule of the adaptation.
    pub schedule: AdaptationSchedule,
}

impl SamplerConfig {
    /// Creates a configuration with 10,000 adaptive iterations targeting an
    /// acceptance rate of 0.234 and a randomly drawn seed.
    pub fn new(initial_state: &[f64], initial_scale: DMatrix<f64>) -> Self {
        Self {
            n_iterations: 10_000,
            initial_state: initial_state.to_vec(),
            initial_scale,
            adapt: true,
            target_accept_rate: 0.234,
            seed: thread_rng().gen::<u64>(),
            schedule: AdaptationSchedule::default(),
        }
    }

    pub fn n_iterations(mut self, n_iterations: usize) -> Self {
        self.n_iterations = n_iterations;
        self
    }

    pub fn adapt(mut self, adapt: bool) -> Self {
        self.adapt = adapt;
        self
    }

    pub fn target_accept_rate(mut self, rate: f64) -> Self {
        self.target_accept_rate = rate;
        self
    }

    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn schedule(mut self, schedule: AdaptationSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Replaces the initial state, keeping everything else.
    pub fn initial_state(mut self, initial_state: &[f64]) -> Self {
        self.initial_state = initial_state.to_vec();
        self
    }

    pub fn dim(&self) -> usize {
        self.initial_state.len()
    }

    /// Checks the configuration against a target of dimension `target_dim`.
    ///
    /// Reports the first offending parameter.
    pub fn validate(&self, target_dim: usize) -> Result<()> {
        if self.n_iterations < 1 {
            return Err(McmcError::InvalidIterations(self.n_iterations));
        }
        if !(self.target_accept_rate > 0.0 && self.target_accept_rate < 1.0) {
            return Err(McmcError::InvalidTargetAcceptRate(self.target_accept_rate));
        }
        self.schedule.validate()?;
        if self.dim() != target_dim {
            return Err(McmcError::DimensionMismatch {
                expected: target_dim,
                found: self.dim(),
            });
        }
        if let Some((index, &value)) = self
            .initial_state
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite())
        {
            return Err(McmcError::NonFiniteInitialState { index, value });
        }
        let (rows, cols) = self.initial_scale.shape();
        if rows != self.dim() || cols != self.dim() {
            return Err(McmcError::InvalidScaleShape {
                rows,
                cols,
                dim: self.dim(),
            });
        }
        if !is_symmetric(&self.initial_scale)
            || Cholesky::new(self.initial_scale.clone()).is_none()
        {
            return Err(McmcError::NotPositiveDefinite {
                parameter: "initial_scale",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SamplerConfig {
        SamplerConfig::new(&[0.0, 0.0], DMatrix::identity(2, 2)).set_seed(1)
    }

    #[test]
    fn builder_sets_fields() {
        let config = base()
            .n_iterations(123)
            .adapt(false)
            .target_accept_rate(0.4)
            .initial_state(&[1.0, 2.0]);
        assert_eq!(config.n_iterations, 123);
        assert!(!config.adapt);
        assert_eq!(config.target_accept_rate, 0.4);
        assert_eq!(config.initial_state, vec![1.0, 2.0]);
        assert_eq!(config.seed, 1);
        assert!(config.validate(2).is_ok());
    }

    #[test]
    fn each_violation_names_its_parameter() {
        assert_eq!(
            base().n_iterations(0).validate(2),
            Err(McmcError::InvalidIterations(0))
        );
        assert_eq!(
            base().target_accept_rate(1.0).validate(2),
            Err(McmcError::InvalidTargetAcceptRate(1.0))
        );
        assert_eq!(
            base().validate(3),
            Err(McmcError::DimensionMismatch {
                expected: 3,
                found: 2
            })
        );
        assert!(matches!(
            base().initial_state(&[0.0, f64::NAN]).validate(2),
            Err(McmcError::NonFiniteInitialState { index: 1, .. })
        ));
        let mut wrong_shape = base();
        wrong_shape.initial_scale = DMatrix::identity(3, 3);
        assert_eq!(
            wrong_shape.validate(2),
            Err(McmcError::InvalidScaleShape {
                rows: 3,
                cols: 3,
                dim: 2
            })
        );
        let mut indefinite = base();
        indefinite.initial_scale = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -1.0]);
        assert_eq!(
            indefinite.validate(2),
            Err(McmcError::NotPositiveDefinite {
                parameter: "initial_scale"
            })
        );
    }

    #[test]
    fn schedule_is_validated() {
        let config = base().schedule(AdaptationSchedule {
            decay: 1.5,
            ..Default::default()
        });
        assert!(matches!(
            config.validate(2),
            Err(McmcError::InvalidSchedule {
                parameter: "decay",
                ..
            })
        ));
    }
}
