//! Linear state estimator
//!
//! This module holds the estimator and everything it owns or hands out:
//!
//! - [`StateEstimator`] - Predict/correct orchestration, one call per tick
//! - [`ModelParameters`] - Immutable F, B, H, Q, R
//! - [`EstimatorState`] - Owned (x, P) belief
//! - [`FilterStep`] - Per-tick output record
//! - [`EstimatorError`] - Construction and per-tick failures

pub mod config;
pub mod errors;
pub mod filter;
pub mod output;
pub mod types;

pub use config::{
    CovarianceUpdateForm, EstimatorConfig, ModelParameters, ModelSnapshot, NoiseTuning,
    NumericTolerances,
};
pub use errors::EstimatorError;
pub use filter::{run_estimator, run_parallel, StateEstimator};
pub use output::{CorrectionOutcome, EstimateHistory, FilterStep, Innovation};
pub use types::{validate_covariance, EstimatorState, Tick};
