//! Error type shared by the sampler configuration and the diagnostics.

use thiserror::Error;

/// Errors reported before sampling starts or when diagnostics are requested.
///
/// Numerical trouble during sampling (non-finite log-densities, a degenerate
/// running covariance) is never reported through this type; it shows up as a
/// depressed acceptance rate and a small effective sample size instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum McmcError {
    #[error("initial state has dimension {found}, but the target expects {expected}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("initial state must be finite; component {index} is {value}")]
    NonFiniteInitialState { index: usize, value: f64 },
    #[error("initial scale must be a {dim}x{dim} matrix, got {rows}x{cols}")]
    InvalidScaleShape { rows: usize, cols: usize, dim: usize },
    #[error("{parameter} must be symmetric positive-definite")]
    NotPositiveDefinite { parameter: &'static str },
    #[error("n_iterations must be at least 1, got {0}")]
    InvalidIterations(usize),
    #[error("target_accept_rate must lie in (0, 1), got {0}")]
    InvalidTargetAcceptRate(f64),
    #[error("adaptation schedule parameter {parameter} is out of range: {value}")]
    InvalidSchedule { parameter: &'static str, value: f64 },
    #[error("diagnostics need at least {min} chains; found {found}")]
    TooFewChains { min: usize, found: usize },
    #[error("burn-in ({burn_in}) must be smaller than the chain length ({len})")]
    BurnInTooLong { burn_in: usize, len: usize },
    #[error("need at least {min} post-burn-in draws per chain; found {found}")]
    TooFewDraws { min: usize, found: usize },
    #[error("chains disagree on dimension: expected {expected}, found {found}")]
    InconsistentDimensions { expected: usize, found: usize },
    #[error("max_lag ({max_lag}) must be smaller than the post-burn-in length ({available})")]
    InvalidMaxLag { max_lag: usize, available: usize },
    #[error("chains must have at least one dimension")]
    EmptyChains,
}

/// Convenience alias for `Result<T, McmcError>`.
pub type Result<T> = std::result::Result<T, McmcError>;
