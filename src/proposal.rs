/*!
# Adaptive Gaussian Proposal

The proposal used by the adaptive sampler is a random walk

\[
y = x + e^{s_t} L_t z, \qquad z \sim \mathcal{N}(0, I_d),
\]

where \(L_t\) is the lower Cholesky factor of the regularized running covariance
\(C_t + \varepsilon I\) and \(s_t\) is the log-scale.

After every iteration \(t\) (accepted or not) the state \(x_t\) is folded into the
running moments with step size \(\gamma_t = (t + t_0)^{-\kappa}\):

\[
\mu \leftarrow \mu + \gamma_t (x_t - \mu), \qquad
C \leftarrow C + \gamma_t \big((x_t - \mu)(x_t - \mu)^\top - C\big),
\]

and the log-scale follows a Robbins–Monro recursion towards the target acceptance rate:

\[
s \leftarrow s + \gamma_t (\mathbb{1}[\text{accepted}] - \alpha^\star).
\]

Since \(\kappa \in (0.5, 1]\), \(\gamma_t \to 0\) and the adaptation diminishes, which keeps
the target distribution stationary for the chain.
*/

use log::debug;
use nalgebra::{Cholesky, DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::{McmcError, Result};

/// Relative tolerance used when checking a matrix for symmetry.
const SYMMETRY_TOL: f64 = 1e-10;

/// Step-size schedule for the diminishing adaptation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptationSchedule {
    /// Decay exponent \(\kappa\) of the step size; must lie in `(0.5, 1]`.
    pub decay: f64,
    /// Offset \(t_0 \ge 0\) added to the iteration index, damping the first updates.
    pub offset: f64,
    /// Ridge \(\varepsilon > 0\) added to the running covariance before factorization.
    pub regularization: f64,
}

impl Default for AdaptationSchedule {
    fn default() -> Self {
        Self {
            decay: 2.0 / 3.0,
            offset: 10.0,
            regularization: 1e-6,
        }
    }
}

impl AdaptationSchedule {
    /// Step size \(\gamma_t = (t + t_0)^{-\kappa}\) for the `t`-th update (1-based).
    pub fn step_size(&self, t: u64) -> f64 {
        (t as f64 + self.offset).powf(-self.decay)
    }

    /// Checks that the schedule guarantees diminishing adaptation.
    pub fn validate(&self) -> Result<()> {
        if !(self.decay > 0.5 && self.decay <= 1.0) {
            return Err(McmcError::InvalidSchedule {
                parameter: "decay",
                value: self.decay,
            });
        }
        if !(self.offset >= 0.0 && self.offset.is_finite()) {
            return Err(McmcError::InvalidSchedule {
                parameter: "offset",
                value: self.offset,
            });
        }
        if !(self.regularization > 0.0 && self.regularization.is_finite()) {
            return Err(McmcError::InvalidSchedule {
                parameter: "regularization",
                value: self.regularization,
            });
        }
        Ok(())
    }
}

/**
Running state of the adaptive proposal for one chain.

The raw running covariance is always symmetric but may become singular; it is only
read through its regularized Cholesky factor, so proposal draws never fail. When the
factorization fails anyway (e.g. after overflow), the previous factor is kept.

A frozen state (`adaptive == false`) draws from the Cholesky factor of the initial
scale and never changes its covariance or log-scale.
*/
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalState {
    running_mean: DVector<f64>,
    running_cov: DMatrix<f64>,
    log_scale: f64,
    iteration: u64,
    factor: DMatrix<f64>,
    schedule: AdaptationSchedule,
    adaptive: bool,
}

impl ProposalState {
    /// Creates a proposal centred on `initial` with covariance `initial_scale`.
    ///
    /// Fails if `initial_scale` has the wrong shape or is not symmetric
    /// positive-definite.
    pub fn new(
        initial: &[f64],
        initial_scale: &DMatrix<f64>,
        schedule: AdaptationSchedule,
        adaptive: bool,
    ) -> Result<Self> {
        let dim = initial.len();
        if initial_scale.nrows() != dim || initial_scale.ncols() != dim {
            return Err(McmcError::InvalidScaleShape {
                rows: initial_scale.nrows(),
                cols: initial_scale.ncols(),
                dim,
            });
        }
        if !is_symmetric(initial_scale) {
            return Err(McmcError::NotPositiveDefinite {
                parameter: "initial_scale",
            });
        }
        let running_cov = (initial_scale + initial_scale.transpose()) * 0.5;
        let factor = if adaptive {
            regularized_cholesky(&running_cov, schedule.regularization)
        } else {
            Cholesky::new(running_cov.clone()).map(|c| c.l())
        }
        .ok_or(McmcError::NotPositiveDefinite {
            parameter: "initial_scale",
        })?;

        Ok(Self {
            running_mean: DVector::from_column_slice(initial),
            running_cov,
            log_scale: 0.0,
            iteration: 0,
            factor,
            schedule,
            adaptive,
        })
    }

    pub fn dim(&self) -> usize {
        self.running_mean.len()
    }

    pub fn running_mean(&self) -> &DVector<f64> {
        &self.running_mean
    }

    pub fn running_cov(&self) -> &DMatrix<f64> {
        &self.running_cov
    }

    pub fn log_scale(&self) -> f64 {
        self.log_scale
    }

    /// Number of iterations observed so far.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn is_adaptive(&self) -> bool {
        self.adaptive
    }

    pub fn schedule(&self) -> &AdaptationSchedule {
        &self.schedule
    }

    /// Lower-triangular factor currently used for proposals (before scaling).
    pub fn factor(&self) -> &DMatrix<f64> {
        &self.factor
    }

    /// Covariance of the proposal increment, \(e^{2s} L L^\top\).
    pub fn proposal_cov(&self) -> DMatrix<f64> {
        (&self.factor * self.factor.transpose()) * (2.0 * self.log_scale).exp()
    }

    /// Draws a candidate `current + exp(log_scale) * L * z`.
    pub fn propose<R: Rng + ?Sized>(&self, current: &[f64], rng: &mut R) -> Vec<f64> {
        let z = DVector::<f64>::from_fn(self.dim(), |_, _| rng.sample(StandardNormal));
        let step = (&self.factor * z) * self.log_scale.exp();
        current.iter().zip(step.iter()).map(|(x, dx)| x + dx).collect()
    }

    /**
    Folds the post-decision state `x` of one iteration into the proposal.

    The iteration counter always advances. Mean, covariance and log-scale only move
    when the state is adaptive.
    */
    pub fn observe(&mut self, x: &[f64], accepted: bool, target_accept_rate: f64) {
        self.iteration += 1;
        if !self.adaptive {
            return;
        }
        let gamma = self.schedule.step_size(self.iteration);
        let x = DVector::from_column_slice(x);

        self.running_mean += (&x - &self.running_mean) * gamma;
        let centered = &x - &self.running_mean;
        let outer = &centered * centered.transpose();
        self.running_cov += (outer - &self.running_cov) * gamma;

        let indicator = if accepted { 1.0 } else { 0.0 };
        self.log_scale += gamma * (indicator - target_accept_rate);

        match regularized_cholesky(&self.running_cov, self.schedule.regularization) {
            Some(l) => self.factor = l,
            None => debug!(
                "regularized covariance lost positive-definiteness at iteration {}; keeping previous factor",
                self.iteration
            ),
        }
    }
}

/// Lower Cholesky factor of `cov + eps * I`, or `None` if it does not exist.
pub fn regularized_cholesky(cov: &DMatrix<f64>, eps: f64) -> Option<DMatrix<f64>> {
    let dim = cov.nrows();
    let ridged = cov + DMatrix::<f64>::identity(dim, dim) * eps;
    if ridged.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Cholesky::new(ridged).map(|c| c.l())
}

/// Whether `m` is square and symmetric up to a small relative tolerance.
pub fn is_symmetric(m: &DMatrix<f64>) -> bool {
    if m.nrows() != m.ncols() {
        return false;
    }
    (0..m.nrows()).all(|i| {
        (0..i).all(|j| {
            let (a, b) = (m[(i, j)], m[(j, i)]);
            (a - b).abs() <= SYMMETRY_TOL * a.abs().max(b.abs()).max(1.0)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn step_size_diminishes() {
        let schedule = AdaptationSchedule::default();
        let steps: Vec<f64> = [1, 10, 100, 10_000, 1_000_000]
            .iter()
            .map(|&t| schedule.step_size(t))
            .collect();
        assert!(steps.windows(2).all(|w| w[1] < w[0]));
        assert!(steps[0] < 1.0);
        assert!(*steps.last().unwrap() < 1e-3);
    }

    #[test]
    fn schedule_validation_rejects_constant_rates() {
        let constant = AdaptationSchedule {
            decay: 0.0,
            ..Default::default()
        };
        assert_eq!(
            constant.validate(),
            Err(McmcError::InvalidSchedule {
                parameter: "decay",
                value: 0.0
            })
        );
        let no_ridge = AdaptationSchedule {
            regularization: 0.0,
            ..Default::default()
        };
        assert!(no_ridge.validate().is_err());
        assert!(AdaptationSchedule::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_definite_scale() {
        let scale = DMatrix::from_row_slice(2, 2, &[1.0, 3.0, 3.0, 1.0]);
        let err = ProposalState::new(&[0.0, 0.0], &scale, Default::default(), true).unwrap_err();
        assert_eq!(
            err,
            McmcError::NotPositiveDefinite {
                parameter: "initial_scale"
            }
        );

        let asymmetric = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.0, 1.0]);
        assert!(ProposalState::new(&[0.0, 0.0], &asymmetric, Default::default(), false).is_err());
    }

    #[test]
    fn frozen_state_never_moves() {
        let scale = DMatrix::from_row_slice(2, 2, &[2.0, 0.3, 0.3, 1.0]);
        let mut state = ProposalState::new(&[0.0, 0.0], &scale, Default::default(), false).unwrap();
        let factor = state.factor().clone();
        for i in 0..500 {
            state.observe(&[i as f64, -(i as f64)], i % 3 == 0, 0.25);
        }
        assert_eq!(state.iteration(), 500);
        assert_eq!(state.log_scale(), 0.0);
        assert_eq!(state.running_cov(), &scale);
        assert_eq!(state.factor(), &factor);
        assert_abs_diff_eq!(state.proposal_cov(), scale, epsilon = 1e-12);
    }

    #[test]
    fn log_scale_follows_acceptance() {
        let scale = DMatrix::identity(1, 1);
        let mut always = ProposalState::new(&[0.0], &scale, Default::default(), true).unwrap();
        let mut never = always.clone();
        for _ in 0..100 {
            always.observe(&[0.0], true, 0.3);
            never.observe(&[0.0], false, 0.3);
        }
        assert!(always.log_scale() > 0.0);
        assert!(never.log_scale() < 0.0);
    }

    #[test]
    fn degenerate_covariance_is_regularized() {
        let scale = DMatrix::identity(2, 2);
        let mut state = ProposalState::new(&[1.0, 1.0], &scale, Default::default(), true).unwrap();
        // The chain never moves, so the running covariance collapses towards zero.
        for _ in 0..20_000 {
            state.observe(&[1.0, 1.0], false, 0.2);
        }
        assert!(state.running_cov()[(0, 0)] < 1e-2);
        let l = state.factor();
        assert!(l[(0, 0)] > 0.0 && l[(1, 1)] > 0.0);

        let mut rng = SmallRng::seed_from_u64(7);
        let y = state.propose(&[1.0, 1.0], &mut rng);
        assert!(y.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn running_moments_track_observed_states() {
        let scale = DMatrix::identity(2, 2);
        let mut state = ProposalState::new(&[0.0, 0.0], &scale, Default::default(), true).unwrap();
        let mut rng = SmallRng::seed_from_u64(11);
        for _ in 0..200_000 {
            let a: f64 = rng.sample(StandardNormal);
            let b: f64 = rng.sample(StandardNormal);
            state.observe(&[5.0 + 2.0 * a, -1.0 + 0.5 * b], true, 0.2);
        }
        assert_abs_diff_eq!(state.running_mean()[0], 5.0, epsilon = 0.2);
        assert_abs_diff_eq!(state.running_mean()[1], -1.0, epsilon = 0.1);
        assert_abs_diff_eq!(state.running_cov()[(0, 0)], 4.0, epsilon = 0.5);
        assert_abs_diff_eq!(state.running_cov()[(1, 1)], 0.25, epsilon = 0.05);
        assert_eq!(state.running_cov()[(0, 1)], state.running_cov()[(1, 0)]);
    }

    #[test]
    fn proposals_are_reproducible() {
        let scale = DMatrix::from_row_slice(2, 2, &[1.0, 0.9, 0.9, 1.0]);
        let state = ProposalState::new(&[0.0, 0.0], &scale, Default::default(), true).unwrap();
        let a = state.propose(&[0.0, 0.0], &mut SmallRng::seed_from_u64(3));
        let b = state.propose(&[0.0, 0.0], &mut SmallRng::seed_from_u64(3));
        assert_eq!(a, b);
    }
}
